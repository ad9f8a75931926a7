//! EPP `<contact>` object mapping (RFC 5733).

use super::xml::{Name, Node};
use super::{Element, ObjectElement, Resolved, Resolver, ResponseData, Schema};
use crate::error::Result;

/// The IETF URN for the EPP contact namespace.
/// See <https://www.iana.org/assignments/xml-registry/ns/contact-1.0.txt>.
pub const NS: &str = "urn:ietf:params:xml:ns:contact-1.0";

const PREFIX: &str = "contact";

/// Schema for the EPP `<contact>` object type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactSchema;

impl Resolver for ContactSchema {
    fn resolve(&self, name: &Name) -> Option<Resolved> {
        if name.ns != NS {
            return None;
        }
        match name.local.as_str() {
            "check" => Some(Resolved::Object(Box::new(ContactCheck::default()))),
            "chkData" => Some(Resolved::Data(Box::new(ContactCheckData::default()))),
            _ => None,
        }
    }
}

impl Schema for ContactSchema {
    fn name(&self) -> &'static str {
        PREFIX
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[NS]
    }
}

/// A `<contact:check>` payload: contact identifiers to query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactCheck {
    pub ids: Vec<String>,
}

impl ContactCheck {
    pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl Element for ContactCheck {
    fn xml_name(&self) -> Name {
        Name::new(NS, "check")
    }

    fn encode(&self) -> Result<Node> {
        let mut node = Node::prefixed(PREFIX, NS, "check").with_ns_decl();
        for id in &self.ids {
            node = node.child(Node::prefixed(PREFIX, NS, "id").text(id));
        }
        Ok(node)
    }

    fn decode(&mut self, node: &Node, _resolver: &dyn Resolver) -> Result<()> {
        self.ids = node.find_all(NS, "id").map(|c| c.text.clone()).collect();
        Ok(())
    }
}

impl ObjectElement for ContactCheck {}

/// One `<contact:cd>` entry in a check response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactCheckResult {
    pub id: String,
    /// `avail` attribute of `<contact:id>`.
    pub available: bool,
    pub reason: Option<String>,
}

/// A `<contact:chkData>` response payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactCheckData {
    pub results: Vec<ContactCheckResult>,
}

impl Element for ContactCheckData {
    fn xml_name(&self) -> Name {
        Name::new(NS, "chkData")
    }

    fn encode(&self) -> Result<Node> {
        let mut node = Node::prefixed(PREFIX, NS, "chkData").with_ns_decl();
        for result in &self.results {
            let mut cd = Node::prefixed(PREFIX, NS, "cd").child(
                Node::prefixed(PREFIX, NS, "id")
                    .attr("avail", if result.available { "1" } else { "0" })
                    .text(&result.id),
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
                let id = cd.find(NS, "id");
                ContactCheckResult {
                    id: id.map(|n| n.text.clone()).unwrap_or_default(),
                    available: id
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

impl ResponseData for ContactCheckData {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{xml, SchemaSet};

    #[test]
    fn test_check_roundtrip() {
        let check = ContactCheck::new(["sh8013", "sah8013"]);
        let out =
            String::from_utf8(xml::write_document(&check.encode().unwrap()).unwrap()).unwrap();
        assert_eq!(
            out,
            concat!(
                r#"<contact:check xmlns:contact="urn:ietf:params:xml:ns:contact-1.0">"#,
                "<contact:id>sh8013</contact:id>",
                "<contact:id>sah8013</contact:id></contact:check>",
            )
        );

        let node = xml::parse(out.as_bytes()).unwrap();
        let mut back = ContactCheck::default();
        back.decode(&node, &SchemaSet::empty()).unwrap();
        assert_eq!(back, check);
    }
}
