//! EPP `<host>` object mapping (RFC 5732).

use super::xml::{Name, Node};
use super::{Element, ObjectElement, Resolved, Resolver, ResponseData, Schema};
use crate::error::Result;

/// The IETF URN for the EPP host namespace.
/// See <https://www.iana.org/assignments/xml-registry/ns/host-1.0.txt>.
pub const NS: &str = "urn:ietf:params:xml:ns:host-1.0";

const PREFIX: &str = "host";

/// Schema for the EPP `<host>` object type.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSchema;

impl Resolver for HostSchema {
    fn resolve(&self, name: &Name) -> Option<Resolved> {
        if name.ns != NS {
            return None;
        }
        match name.local.as_str() {
            "check" => Some(Resolved::Object(Box::new(HostCheck::default()))),
            "chkData" => Some(Resolved::Data(Box::new(HostCheckData::default()))),
            _ => None,
        }
    }
}

impl Schema for HostSchema {
    fn name(&self) -> &'static str {
        PREFIX
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[NS]
    }
}

/// A `<host:check>` payload: host names to query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostCheck {
    pub names: Vec<String>,
}

impl HostCheck {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Element for HostCheck {
    fn xml_name(&self) -> Name {
        Name::new(NS, "check")
    }

    fn encode(&self) -> Result<Node> {
        let mut node = Node::prefixed(PREFIX, NS, "check").with_ns_decl();
        for name in &self.names {
            node = node.child(Node::prefixed(PREFIX, NS, "name").text(name));
        }
        Ok(node)
    }

    fn decode(&mut self, node: &Node, _resolver: &dyn Resolver) -> Result<()> {
        self.names = node.find_all(NS, "name").map(|c| c.text.clone()).collect();
        Ok(())
    }
}

impl ObjectElement for HostCheck {}

/// One `<host:cd>` entry in a check response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostCheckResult {
    pub name: String,
    /// `avail` attribute of `<host:name>`.
    pub available: bool,
    pub reason: Option<String>,
}

/// A `<host:chkData>` response payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostCheckData {
    pub results: Vec<HostCheckResult>,
}

impl Element for HostCheckData {
    fn xml_name(&self) -> Name {
        Name::new(NS, "chkData")
    }

    fn encode(&self) -> Result<Node> {
        let mut node = Node::prefixed(PREFIX, NS, "chkData").with_ns_decl();
        for result in &self.results {
            let mut cd = Node::prefixed(PREFIX, NS, "cd").child(
                Node::prefixed(PREFIX, NS, "name")
                    .attr("avail", if result.available { "1" } else { "0" })
                    .text(&result.name),
            );
            if let Some(reason) = &result.reason {
                cd = cd.child(Node::prefixed(PREFIX, NS, "reason").text(reason));
            }
            node = node.child(cd);
        }
        Ok(node)
    }

    fn decode(&mut self, node: &Node, _resolver: &dyn Resolver) -> Result<()> {
        self.results = node
            .find_all(NS, "cd")
            .map(|cd| {
                let name = cd.find(NS, "name");
                HostCheckResult {
                    name: name.map(|n| n.text.clone()).unwrap_or_default(),
                    available: name
                        .and_then(|n| n.attr_value("avail"))
                        .map(|v| v == "1" || v == "true")
                        .unwrap_or_default(),
                    reason: cd.child_text(NS, "reason").map(str::to_string),
                }
            })
            .collect();
        Ok(())
    }
}

impl ResponseData for HostCheckData {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{xml, SchemaSet};

    #[test]
    fn test_check_roundtrip() {
        let check = HostCheck::new(["ns1.example.com"]);
        let out =
            String::from_utf8(xml::write_document(&check.encode().unwrap()).unwrap()).unwrap();
        assert_eq!(
            out,
            concat!(
                r#"<host:check xmlns:host="urn:ietf:params:xml:ns:host-1.0">"#,
                "<host:name>ns1.example.com</host:name></host:check>",
            )
        );

        let node = xml::parse(out.as_bytes()).unwrap();
        let mut back = HostCheck::default();
        back.decode(&node, &SchemaSet::empty()).unwrap();
        assert_eq!(back, check);
    }
}
