//! Schema registry and extensible XML codec.
//!
//! EPP's XML grammar is open: object mappings (`domain`, `contact`, `host`)
//! and protocol extensions each live in their own namespace, and third
//! parties add new ones without touching the core message types. The codec
//! supports that through a [`Resolver`]: a mapping from an XML
//! `(namespace, local-name)` pair to a freshly constructed value that knows
//! how to decode itself.
//!
//! - [`Schema`] is a named resolver claiming one or more namespace URIs.
//! - [`SchemaSet`] composes schemas; resolution tries each in order and the
//!   first claim wins, so callers can layer overrides.
//! - Elements no resolver claims decode into [`AnyElement`], which keeps
//!   the subtree verbatim so unknown extensions round-trip without loss.
//!
//! The resolver is threaded explicitly through every nested decode; there
//! is no global registry.

pub mod any;
pub mod contact;
pub mod domain;
pub mod epp;
pub mod host;
pub mod xml;

use std::fmt;
use std::sync::Arc;

pub use any::AnyElement;
pub use xml::{Name, Node};

use crate::error::Result;

/// Object-safe XML codec implemented by every polymorphic EPP element.
pub trait Element: fmt::Debug + Send + Sync {
    /// Resolved XML name this element encodes as.
    fn xml_name(&self) -> Name;

    /// Builds the element's XML subtree.
    fn encode(&self) -> Result<Node>;

    /// Populates the element from `node`, consulting `resolver` for any
    /// nested polymorphic children.
    fn decode(&mut self, node: &Node, resolver: &dyn Resolver) -> Result<()>;
}

/// An EPP command action: the first child of `<command>`.
pub trait Action: Element {}

/// An object-mapping payload carried inside an action (for example
/// `<domain:check>` inside `<check>`).
pub trait ObjectElement: Element {}

/// A protocol extension element carried inside `<extension>`.
pub trait ExtensionElement: Element {}

/// Object-specific response data carried inside `<resData>`.
pub trait ResponseData: Element {}

/// A freshly constructed value handed back by a resolver, tagged with the
/// capability it may fill. Values are newly allocated per resolution and
/// owned by the caller.
pub enum Resolved {
    Action(Box<dyn Action>),
    Object(Box<dyn ObjectElement>),
    Extension(Box<dyn ExtensionElement>),
    Data(Box<dyn ResponseData>),
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Action(v) => write!(f, "Resolved::Action({v:?})"),
            Resolved::Object(v) => write!(f, "Resolved::Object({v:?})"),
            Resolved::Extension(v) => write!(f, "Resolved::Extension({v:?})"),
            Resolved::Data(v) => write!(f, "Resolved::Data({v:?})"),
        }
    }
}

/// Maps an XML name to a freshly constructed target value.
///
/// Returns `None` for names it does not recognize; the codec then falls
/// back to [`AnyElement`].
pub trait Resolver: Send + Sync {
    fn resolve(&self, name: &Name) -> Option<Resolved>;
}

/// A named [`Resolver`] claiming one or more namespace URIs.
pub trait Schema: Resolver {
    /// Short label, e.g. `"epp"` or `"domain"`. Also used as the xmlns
    /// prefix when encoding elements of this schema.
    fn name(&self) -> &'static str;

    /// Namespace URIs recognized by this schema, in order of preference.
    /// Never empty.
    fn namespaces(&self) -> &'static [&'static str];
}

/// An ordered composition of schemas.
///
/// Resolution tries each schema in registration order; the first to return
/// a value wins.
#[derive(Clone, Default)]
pub struct SchemaSet {
    schemas: Vec<Arc<dyn Schema>>,
}

impl SchemaSet {
    /// An empty set; every name falls back to [`AnyElement`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Composes the given schemas in order.
    pub fn new(schemas: Vec<Arc<dyn Schema>>) -> Self {
        Self { schemas }
    }

    /// The default set: core EPP plus the standard `domain`, `contact` and
    /// `host` object mappings.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(epp::EppSchema),
            Arc::new(domain::DomainSchema),
            Arc::new(contact::ContactSchema),
            Arc::new(host::HostSchema),
        ])
    }

    /// Appends a schema with lowest precedence.
    pub fn push(&mut self, schema: Arc<dyn Schema>) {
        self.schemas.push(schema);
    }

    /// The registered schemas, in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Schema>> {
        self.schemas.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl Resolver for SchemaSet {
    fn resolve(&self, name: &Name) -> Option<Resolved> {
        self.schemas.iter().find_map(|s| s.resolve(name))
    }
}

impl fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.schemas.iter().map(|s| s.name()))
            .finish()
    }
}

/// Decodes `node` as a command action, falling back to [`AnyElement`].
pub fn decode_action(node: &Node, resolver: &dyn Resolver) -> Result<Box<dyn Action>> {
    match resolver.resolve(&node.name) {
        Some(Resolved::Action(mut action)) => {
            action.decode(node, resolver)?;
            Ok(action)
        }
        _ => Ok(Box::new(AnyElement::from_node(node.clone()))),
    }
}

/// Decodes `node` as an object-mapping payload, falling back to
/// [`AnyElement`].
pub fn decode_object(node: &Node, resolver: &dyn Resolver) -> Result<Box<dyn ObjectElement>> {
    match resolver.resolve(&node.name) {
        Some(Resolved::Object(mut object)) => {
            object.decode(node, resolver)?;
            Ok(object)
        }
        _ => Ok(Box::new(AnyElement::from_node(node.clone()))),
    }
}

/// Decodes `node` as an extension element, falling back to [`AnyElement`].
pub fn decode_extension(
    node: &Node,
    resolver: &dyn Resolver,
) -> Result<Box<dyn ExtensionElement>> {
    match resolver.resolve(&node.name) {
        Some(Resolved::Extension(mut ext)) => {
            ext.decode(node, resolver)?;
            Ok(ext)
        }
        _ => Ok(Box::new(AnyElement::from_node(node.clone()))),
    }
}

/// Decodes `node` as response data, falling back to [`AnyElement`].
pub fn decode_data(node: &Node, resolver: &dyn Resolver) -> Result<Box<dyn ResponseData>> {
    match resolver.resolve(&node.name) {
        Some(Resolved::Data(mut data)) => {
            data.decode(node, resolver)?;
            Ok(data)
        }
        _ => Ok(Box::new(AnyElement::from_node(node.clone()))),
    }
}
