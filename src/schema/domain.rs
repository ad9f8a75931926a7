//! EPP `<domain>` object mapping (RFC 5731).

use super::xml::{Name, Node};
use super::{Element, ObjectElement, Resolved, Resolver, ResponseData, Schema};
use crate::error::Result;

/// The IETF URN for the EPP domain namespace.
/// See <https://www.iana.org/assignments/xml-registry/ns/domain-1.0.txt>.
pub const NS: &str = "urn:ietf:params:xml:ns:domain-1.0";

const PREFIX: &str = "domain";

/// Schema for the EPP `<domain>` object type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainSchema;

impl Resolver for DomainSchema {
    fn resolve(&self, name: &Name) -> Option<Resolved> {
        if name.ns != NS {
            return None;
        }
        match name.local.as_str() {
            "check" => Some(Resolved::Object(Box::new(DomainCheck::default()))),
            "chkData" => Some(Resolved::Data(Box::new(DomainCheckData::default()))),
            _ => None,
        }
    }
}

impl Schema for DomainSchema {
    fn name(&self) -> &'static str {
        PREFIX
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[NS]
    }
}

/// A `<domain:check>` payload: domain names to query for availability.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainCheck {
    pub names: Vec<String>,
}

impl DomainCheck {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Element for DomainCheck {
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

impl ObjectElement for DomainCheck {}

/// One `<domain:cd>` entry in a check response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainCheckResult {
    pub name: String,
    /// `avail` attribute of `<domain:name>`.
    pub available: bool,
    /// `<domain:reason>`: why the name is unavailable.
    pub reason: Option<String>,
}

/// A `<domain:chkData>` response payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainCheckData {
    pub results: Vec<DomainCheckResult>,
}

impl Element for DomainCheckData {
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
                DomainCheckResult {
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

impl ResponseData for DomainCheckData {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{xml, SchemaSet};

    #[test]
    fn test_check_encodes_with_prefix() {
        let check = DomainCheck::new(["example.com", "example.net"]);
        let out = String::from_utf8(xml::write_document(&check.encode().unwrap()).unwrap())
            .unwrap();
        assert_eq!(
            out,
            concat!(
                r#"<domain:check xmlns:domain="urn:ietf:params:xml:ns:domain-1.0">"#,
                "<domain:name>example.com</domain:name>",
                "<domain:name>example.net</domain:name></domain:check>",
            )
        );
    }

    #[test]
    fn test_check_decode() {
        let input = concat!(
            r#"<domain:check xmlns:domain="urn:ietf:params:xml:ns:domain-1.0">"#,
            "<domain:name>example.com</domain:name></domain:check>",
        );
        let node = xml::parse(input.as_bytes()).unwrap();
        let mut check = DomainCheck::default();
        check.decode(&node, &SchemaSet::empty()).unwrap();
        assert_eq!(check, DomainCheck::new(["example.com"]));
    }

    #[test]
    fn test_chk_data_roundtrip() {
        let data = DomainCheckData {
            results: vec![
                DomainCheckResult {
                    name: "example.com".to_string(),
                    available: true,
                    reason: None,
                },
                DomainCheckResult {
                    name: "example.net".to_string(),
                    available: false,
                    reason: Some("In use".to_string()),
                },
            ],
        };
        let out =
            String::from_utf8(xml::write_document(&data.encode().unwrap()).unwrap()).unwrap();
        assert!(out.contains(r#"<domain:name avail="1">example.com</domain:name>"#));
        assert!(out.contains("<domain:reason>In use</domain:reason>"));

        let node = xml::parse(out.as_bytes()).unwrap();
        let mut back = DomainCheckData::default();
        back.decode(&node, &SchemaSet::empty()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_schema_resolves_only_own_namespace() {
        let schema = DomainSchema;
        assert!(schema.resolve(&Name::new(NS, "check")).is_some());
        assert!(schema.resolve(&Name::new(NS, "chkData")).is_some());
        assert!(schema.resolve(&Name::new(NS, "bogus")).is_none());
        assert!(schema
            .resolve(&Name::new("urn:ietf:params:xml:ns:host-1.0", "check"))
            .is_none());
    }
}
