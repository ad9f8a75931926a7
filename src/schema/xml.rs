//! Namespace-aware XML tree, parsed with `quick-xml`.
//!
//! The codec works over a lightweight [`Node`] tree rather than a token
//! stream: a data unit payload is parsed once, typed values decode
//! themselves from subtrees, and encoders build subtrees back up. This
//! keeps the resolver a plain parameter threaded through nested decodes and
//! makes unknown-element preservation trivial: an unclaimed subtree is
//! kept verbatim (tag, attributes, children) and re-serialized as read.
//!
//! Whitespace-only character data is insignificant in EPP and is dropped on
//! parse; everything else survives a parse/write round-trip byte-equivalent.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;

use crate::error::{EppError, Result};

/// A resolved XML name: namespace URI plus local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    /// Namespace URI; empty for unqualified names.
    pub ns: String,
    /// Local part of the tag, without any prefix.
    pub local: String,
}

impl Name {
    /// Creates a resolved name.
    pub fn new(ns: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            local: local.into(),
        }
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ns.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.ns, self.local)
        }
    }
}

/// An attribute as written on the wire. Keys are kept raw (including
/// `xmlns` declarations); values are stored unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub key: String,
    pub value: String,
}

/// One XML element: resolved name, the tag as written, attributes in
/// document order, child elements, and concatenated character data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    /// Resolved (namespace, local) name.
    pub name: Name,
    /// Qualified tag as written, e.g. `domain:check`.
    pub tag: String,
    pub attrs: Vec<Attr>,
    pub children: Vec<Node>,
    pub text: String,
    /// Emit as `<tag/>` when the element is empty.
    pub self_closing: bool,
}

impl Node {
    /// An element in namespace `ns`, written with its bare local name
    /// (the namespace is inherited from an enclosing default declaration).
    pub fn element(ns: impl Into<String>, local: impl Into<String>) -> Self {
        let local = local.into();
        Self {
            name: Name::new(ns, local.clone()),
            tag: local,
            ..Self::default()
        }
    }

    /// An element written with a `prefix:local` tag.
    pub fn prefixed(
        prefix: &str,
        ns: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        let local = local.into();
        Self {
            name: Name::new(ns, local.clone()),
            tag: format!("{prefix}:{local}"),
            ..Self::default()
        }
    }

    /// Adds the `xmlns` (or `xmlns:prefix`) declaration for this element's
    /// own namespace.
    pub fn with_ns_decl(self) -> Self {
        let key = match self.tag.split_once(':') {
            Some((prefix, _)) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        let ns = self.name.ns.clone();
        self.attr(key, ns)
    }

    /// Appends an attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push(Attr {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Appends a child element.
    pub fn child(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    /// Appends child elements.
    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes);
        self
    }

    /// Sets the character data.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Marks the element to be written self-closing when empty.
    pub fn self_closing(mut self) -> Self {
        self.self_closing = true;
        self
    }

    /// Whether this element has the given resolved name.
    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.name.ns == ns && self.name.local == local
    }

    /// First child with the given resolved name.
    pub fn find(&self, ns: &str, local: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.is(ns, local))
    }

    /// All children with the given resolved name.
    pub fn find_all<'a>(
        &'a self,
        ns: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.is(ns, local))
    }

    /// Value of the attribute with the given raw key.
    pub fn attr_value(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Character data of the first child with the given resolved name.
    pub fn child_text(&self, ns: &str, local: &str) -> Option<&str> {
        self.find(ns, local).map(|c| c.text.as_str())
    }
}

/// Parses a document into its root element.
///
/// Empty input, unparsable input, and undeclared namespace prefixes are
/// [`EppError::MalformedFrame`].
pub fn parse(data: &[u8]) -> Result<Node> {
    let mut reader = NsReader::from_reader(data);
    let mut stack: Vec<Node> = Vec::new();

    loop {
        match reader.read_resolved_event()? {
            (resolution, Event::Start(start)) => {
                let node = node_from_start(resolution, &start)?;
                stack.push(node);
            }
            (resolution, Event::Empty(start)) => {
                let mut node = node_from_start(resolution, &start)?;
                node.self_closing = true;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            (_, Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| EppError::malformed("unbalanced end tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            (_, Event::Text(text)) => {
                let text = text.unescape()?;
                if let Some(current) = stack.last_mut() {
                    if !text.trim().is_empty() {
                        current.text.push_str(text.trim());
                    }
                }
            }
            (_, Event::CData(cdata)) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            (_, Event::Eof) => {
                return Err(EppError::malformed("unexpected end of document"));
            }
            // XML declarations, comments, PIs and doctypes carry no EPP
            // content.
            _ => {}
        }
    }
}

fn node_from_start(resolution: ResolveResult<'_>, start: &BytesStart<'_>) -> Result<Node> {
    let ns = match resolution {
        ResolveResult::Bound(Namespace(ns)) => String::from_utf8_lossy(ns).into_owned(),
        ResolveResult::Unbound => String::new(),
        ResolveResult::Unknown(prefix) => {
            return Err(EppError::malformed(format!(
                "undeclared namespace prefix {:?}",
                String::from_utf8_lossy(&prefix)
            )));
        }
    };
    let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        attrs.push(Attr {
            key: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value: attr.unescape_value()?.into_owned(),
        });
    }

    Ok(Node {
        name: Name::new(ns, local),
        tag,
        attrs,
        children: Vec::new(),
        text: String::new(),
        self_closing: false,
    })
}

/// Serializes `root` (no XML declaration).
pub fn write_document(root: &Node) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_node<W: std::io::Write>(writer: &mut Writer<W>, node: &Node) -> Result<()> {
    let mut start = BytesStart::new(node.tag.as_str());
    for attr in &node.attrs {
        start.push_attribute((attr.key.as_str(), attr.value.as_str()));
    }

    let empty = node.children.is_empty() && node.text.is_empty();
    if empty && node.self_closing {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if !node.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&node.text)))?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
    Ok(())
}
