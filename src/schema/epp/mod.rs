//! Core EPP message bodies and the `<epp>` envelope codec (RFC 5730).
//!
//! A data unit payload is UTF-8 XML rooted at
//! `<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">` with exactly one child
//! drawn from {`hello`, `greeting`, `command`, `response`, `extension`} -
//! the closed [`Body`] union. Everything below that is open: command
//! actions, object payloads, response data and extensions are dispatched
//! through the [`Resolver`](crate::schema::Resolver) threaded into
//! [`EppCodec::unmarshal`].

pub mod command;
pub mod greeting;
pub mod response;

pub use command::{
    Check, Command, Create, Delete, Info, Login, Logout, Poll, PollOp, Renew, Transfer,
    TransferOp, Update,
};
pub use greeting::{
    Access, Dcp, Expiry, Greeting, Ours, Purpose, Recipient, ServiceExtension, ServiceMenu,
    Statement,
};
pub use response::{
    CommandResult, ExtensionValue, Message, MessageQueue, Response, ResultCode, TransactionId,
};

use crate::error::{EppError, Result};
use crate::schema::xml::{self, Name, Node};
use crate::schema::{
    decode_extension, ExtensionElement, Resolved, Resolver, Schema, SchemaSet,
};

/// The IETF URN for the EPP namespace.
/// See <https://www.iana.org/assignments/xml-registry/ns/epp-1.0.txt>.
pub const NS: &str = "urn:ietf:params:xml:ns:epp-1.0";

/// The IETF URN for the EPP common namespace.
/// See <https://www.iana.org/assignments/xml-registry/ns/eppcom-1.0.txt>.
pub const COMMON_NS: &str = "urn:ietf:params:xml:ns:eppcom-1.0";

/// A valid EPP body: the single child of `<epp>`.
#[derive(Debug)]
pub enum Body {
    /// `<hello/>`: request a fresh `<greeting>`.
    Hello,
    /// `<greeting>`: server capabilities announcement.
    Greeting(Greeting),
    /// `<command>`: a client operation.
    Command(Command),
    /// `<response>`: the server's answer to a command.
    Response(Response),
    /// A bare `<extension>` body.
    Extensions(Vec<Box<dyn ExtensionElement>>),
}

impl Body {
    /// The greeting carried by this body, if any.
    pub fn as_greeting(&self) -> Option<&Greeting> {
        match self {
            Body::Greeting(greeting) => Some(greeting),
            _ => None,
        }
    }

    /// The response carried by this body, if any.
    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Body::Response(response) => Some(response),
            _ => None,
        }
    }
}

/// Marshals and unmarshals [`Body`] values to and from data unit payloads,
/// consulting the composed schema resolver for every element the envelope
/// does not itself define.
#[derive(Debug, Clone, Default)]
pub struct EppCodec {
    schemas: SchemaSet,
}

impl EppCodec {
    /// A codec resolving with `schemas`.
    pub fn new(schemas: SchemaSet) -> Self {
        Self { schemas }
    }

    /// A codec with the standard schema set (epp, domain, contact, host).
    pub fn standard() -> Self {
        Self::new(SchemaSet::standard())
    }

    /// The composed resolver.
    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    /// Serializes `body` wrapped in the `<epp>` envelope.
    pub fn marshal(&self, body: &Body) -> Result<Vec<u8>> {
        let child = match body {
            Body::Hello => Node::element(NS, "hello").self_closing(),
            Body::Greeting(greeting) => greeting.encode_node()?,
            Body::Command(command) => command.encode_node()?,
            Body::Response(response) => response.encode_node()?,
            Body::Extensions(extensions) => {
                let mut node = Node::element(NS, "extension");
                for extension in extensions {
                    node = node.child(extension.encode()?);
                }
                node
            }
        };
        let root = Node::element(NS, "epp").with_ns_decl().child(child);
        xml::write_document(&root)
    }

    /// Parses a data unit payload into a [`Body`].
    ///
    /// Anything that is not an `<epp>` envelope with exactly one known
    /// child (the empty payload included) is [`EppError::MalformedFrame`].
    pub fn unmarshal(&self, data: &[u8]) -> Result<Body> {
        let root = xml::parse(data)?;
        if !root.is(NS, "epp") {
            return Err(EppError::malformed(format!(
                "unexpected root element {}",
                root.name
            )));
        }
        let child = match root.children.as_slice() {
            [child] => child,
            [] => return Err(EppError::malformed("<epp> without a body element")),
            _ => return Err(EppError::malformed("<epp> with more than one body element")),
        };
        if child.name.ns != NS {
            return Err(EppError::malformed(format!(
                "unexpected body element {}",
                child.name
            )));
        }
        match child.name.local.as_str() {
            "hello" => Ok(Body::Hello),
            "greeting" => Ok(Body::Greeting(Greeting::decode_node(child)?)),
            "command" => Ok(Body::Command(Command::decode_node(child, &self.schemas)?)),
            "response" => Ok(Body::Response(Response::decode_node(
                child,
                &self.schemas,
            )?)),
            "extension" => {
                let mut extensions = Vec::new();
                for ext in &child.children {
                    extensions.push(decode_extension(ext, &self.schemas)?);
                }
                Ok(Body::Extensions(extensions))
            }
            other => Err(EppError::malformed(format!(
                "unknown epp body element <{other}>"
            ))),
        }
    }
}

/// The core EPP schema: resolves the protocol-level command actions.
///
/// Body elements (`hello`, `greeting`, ...) are decoded by the envelope
/// codec itself and need no resolver entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct EppSchema;

impl Resolver for EppSchema {
    fn resolve(&self, name: &Name) -> Option<Resolved> {
        if name.ns != NS {
            return None;
        }
        let action: Box<dyn crate::schema::Action> = match name.local.as_str() {
            "login" => Box::new(Login::default()),
            "logout" => Box::new(Logout),
            "check" => Box::new(Check::default()),
            "create" => Box::new(Create::default()),
            "delete" => Box::new(Delete::default()),
            "info" => Box::new(Info::default()),
            "poll" => Box::new(Poll::default()),
            "renew" => Box::new(Renew::default()),
            "transfer" => Box::new(Transfer::default()),
            "update" => Box::new(Update::default()),
            _ => return None,
        };
        Some(Resolved::Action(action))
    }
}

impl Schema for EppSchema {
    fn name(&self) -> &'static str {
        "epp"
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[NS, COMMON_NS]
    }
}
