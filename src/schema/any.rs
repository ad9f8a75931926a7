//! Generic XML node for unrecognized elements.

use super::xml::{Name, Node};
use super::{Action, Element, ExtensionElement, ObjectElement, Resolver, ResponseData};
use crate::error::Result;

/// An arbitrary XML element and its contents, kept verbatim.
///
/// Produced when decoding encounters an element no registered schema
/// claims: the tag, attributes and inner XML survive untouched, so a
/// message carrying unknown extensions re-encodes byte-equivalent (modulo
/// insignificant whitespace). Usable in any polymorphic position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnyElement {
    node: Node,
}

impl AnyElement {
    /// Wraps a parsed subtree.
    pub fn from_node(node: Node) -> Self {
        Self { node }
    }

    /// The preserved subtree.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Consumes the wrapper, returning the subtree.
    pub fn into_node(self) -> Node {
        self.node
    }
}

impl Element for AnyElement {
    fn xml_name(&self) -> Name {
        self.node.name.clone()
    }

    fn encode(&self) -> Result<Node> {
        Ok(self.node.clone())
    }

    fn decode(&mut self, node: &Node, _resolver: &dyn Resolver) -> Result<()> {
        self.node = node.clone();
        Ok(())
    }
}

impl Action for AnyElement {}
impl ObjectElement for AnyElement {}
impl ExtensionElement for AnyElement {}
impl ResponseData for AnyElement {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{xml, SchemaSet};

    #[test]
    fn test_preserves_subtree_verbatim() {
        let input = br#"<foo:bar xmlns:foo="urn:example:foo-1.0" a="1"><foo:baz>x</foo:baz></foo:bar>"#;
        let node = xml::parse(input).unwrap();

        let mut any = AnyElement::default();
        any.decode(&node, &SchemaSet::empty()).unwrap();
        assert_eq!(any.xml_name(), Name::new("urn:example:foo-1.0", "bar"));

        let out = xml::write_document(&any.encode().unwrap()).unwrap();
        assert_eq!(&out[..], &input[..]);
    }
}
