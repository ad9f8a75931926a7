//! EPP client `<command>` and the core command actions (RFC 5730 §2.5,
//! §2.9).
//!
//! The action slot of a `<command>` is open: object mappings and future
//! protocol revisions contribute their own action elements through the
//! resolver. The actions defined here are the protocol-level ones from
//! RFC 5730; the payload-carrying ones (`<check>`, `<create>`, ...) wrap an
//! object-specific element resolved as
//! [`Resolved::Object`](crate::schema::Resolved::Object).

use super::NS;
use crate::error::Result;
use crate::schema::xml::{Name, Node};
use crate::schema::{
    decode_action, decode_extension, decode_object, Action, Element, ExtensionElement,
    ObjectElement, Resolver,
};

/// An EPP client `<command>`: one action, optional extensions, and an
/// optional client transaction identifier.
#[derive(Debug, Default)]
pub struct Command {
    /// The action element naming the operation.
    pub action: Option<Box<dyn Action>>,
    /// `<extension>` children.
    pub extensions: Vec<Box<dyn ExtensionElement>>,
    /// `<clTRID>`: client transaction identifier. Clients maintain their own
    /// identifier space to ensure uniqueness.
    pub client_transaction_id: Option<String>,
}

impl Command {
    /// A command wrapping `action`.
    pub fn new(action: impl Action + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
            ..Self::default()
        }
    }

    /// Sets the client transaction ID.
    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.client_transaction_id = Some(id.into());
        self
    }

    /// Appends an extension.
    pub fn with_extension(mut self, ext: impl ExtensionElement + 'static) -> Self {
        self.extensions.push(Box::new(ext));
        self
    }

    pub(crate) fn encode_node(&self) -> Result<Node> {
        let mut node = Node::element(NS, "command");
        if let Some(action) = &self.action {
            node = node.child(action.encode()?);
        }
        if !self.extensions.is_empty() {
            let mut ext = Node::element(NS, "extension");
            for extension in &self.extensions {
                ext = ext.child(extension.encode()?);
            }
            node = node.child(ext);
        }
        if let Some(id) = &self.client_transaction_id {
            node = node.child(Node::element(NS, "clTRID").text(id));
        }
        Ok(node)
    }

    pub(crate) fn decode_node(node: &Node, resolver: &dyn Resolver) -> Result<Self> {
        let mut command = Command::default();
        for child in &node.children {
            if child.is(NS, "extension") {
                for ext in &child.children {
                    command.extensions.push(decode_extension(ext, resolver)?);
                }
            } else if child.is(NS, "clTRID") {
                command.client_transaction_id = Some(child.text.clone());
            } else if command.action.is_none() {
                command.action = Some(decode_action(child, resolver)?);
            }
        }
        Ok(command)
    }
}

/// An EPP `<login>` command action (RFC 5730 §2.9.1.1).
#[derive(Debug, Clone, PartialEq)]
pub struct Login {
    /// `<clID>`: client identifier.
    pub client_id: String,
    /// `<pw>`: plain text password.
    pub password: String,
    /// `<newPW>`: optional password change.
    pub new_password: Option<String>,
    /// `<options>/<version>`: protocol version.
    pub version: String,
    /// `<options>/<lang>`: text response language.
    pub language: String,
    /// `<svcs>/<objURI>`: object namespace URIs to use in the session.
    pub objects: Vec<String>,
    /// `<svcs>/<svcExtension>/<extURI>`: extension namespace URIs.
    pub extensions: Vec<String>,
}

impl Default for Login {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            password: String::new(),
            new_password: None,
            version: "1.0".to_string(),
            language: "en".to_string(),
            objects: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

impl Element for Login {
    fn xml_name(&self) -> Name {
        Name::new(NS, "login")
    }

    fn encode(&self) -> Result<Node> {
        let mut node = Node::element(NS, "login")
            .child(Node::element(NS, "clID").text(&self.client_id))
            .child(Node::element(NS, "pw").text(&self.password));
        if let Some(new_password) = &self.new_password {
            node = node.child(Node::element(NS, "newPW").text(new_password));
        }
        node = node.child(
            Node::element(NS, "options")
                .child(Node::element(NS, "version").text(&self.version))
                .child(Node::element(NS, "lang").text(&self.language)),
        );
        let mut svcs = Node::element(NS, "svcs");
        for uri in &self.objects {
            svcs = svcs.child(Node::element(NS, "objURI").text(uri));
        }
        if !self.extensions.is_empty() {
            let mut ext = Node::element(NS, "svcExtension");
            for uri in &self.extensions {
                ext = ext.child(Node::element(NS, "extURI").text(uri));
            }
            svcs = svcs.child(ext);
        }
        Ok(node.child(svcs))
    }

    fn decode(&mut self, node: &Node, _resolver: &dyn Resolver) -> Result<()> {
        self.client_id = node.child_text(NS, "clID").unwrap_or_default().to_string();
        self.password = node.child_text(NS, "pw").unwrap_or_default().to_string();
        self.new_password = node.child_text(NS, "newPW").map(str::to_string);
        if let Some(options) = node.find(NS, "options") {
            if let Some(version) = options.child_text(NS, "version") {
                self.version = version.to_string();
            }
            if let Some(lang) = options.child_text(NS, "lang") {
                self.language = lang.to_string();
            }
        }
        if let Some(svcs) = node.find(NS, "svcs") {
            self.objects = svcs
                .find_all(NS, "objURI")
                .map(|c| c.text.to_string())
                .collect();
            if let Some(ext) = svcs.find(NS, "svcExtension") {
                self.extensions = ext
                    .find_all(NS, "extURI")
                    .map(|c| c.text.to_string())
                    .collect();
            }
        }
        Ok(())
    }
}

impl Action for Login {}

/// An EPP `<logout>` command action (RFC 5730 §2.9.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Logout;

impl Element for Logout {
    fn xml_name(&self) -> Name {
        Name::new(NS, "logout")
    }

    fn encode(&self) -> Result<Node> {
        Ok(Node::element(NS, "logout").self_closing())
    }

    fn decode(&mut self, _node: &Node, _resolver: &dyn Resolver) -> Result<()> {
        Ok(())
    }
}

impl Action for Logout {}

/// Declares a command action that wraps a single object-mapping payload,
/// e.g. `<check><domain:check>...</domain:check></check>`.
macro_rules! object_action {
    ($(#[$doc:meta])* $name:ident, $local:literal) => {
        $(#[$doc])*
        #[derive(Debug, Default)]
        pub struct $name {
            /// The object-specific payload, resolved by namespace.
            pub payload: Option<Box<dyn ObjectElement>>,
        }

        impl $name {
            /// An action wrapping `payload`.
            pub fn new(payload: impl ObjectElement + 'static) -> Self {
                Self {
                    payload: Some(Box::new(payload)),
                }
            }
        }

        impl Element for $name {
            fn xml_name(&self) -> Name {
                Name::new(NS, $local)
            }

            fn encode(&self) -> Result<Node> {
                let mut node = Node::element(NS, $local);
                if let Some(payload) = &self.payload {
                    node = node.child(payload.encode()?);
                }
                Ok(node)
            }

            fn decode(&mut self, node: &Node, resolver: &dyn Resolver) -> Result<()> {
                self.payload = match node.children.first() {
                    Some(child) => Some(decode_object(child, resolver)?),
                    None => None,
                };
                Ok(())
            }
        }

        impl Action for $name {}
    };
}

object_action!(
    /// An EPP `<check>` command action (RFC 5730 §2.9.2.1).
    Check,
    "check"
);
object_action!(
    /// An EPP `<create>` command action (RFC 5730 §2.9.3.1).
    Create,
    "create"
);
object_action!(
    /// An EPP `<delete>` command action (RFC 5730 §2.9.3.2).
    Delete,
    "delete"
);
object_action!(
    /// An EPP `<info>` command action (RFC 5730 §2.9.2.2).
    Info,
    "info"
);
object_action!(
    /// An EPP `<renew>` command action (RFC 5730 §2.9.3.3).
    Renew,
    "renew"
);
object_action!(
    /// An EPP `<update>` command action (RFC 5730 §2.9.3.5).
    Update,
    "update"
);

/// `op` attribute of an EPP `<poll>` command (RFC 5730 §2.9.2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollOp {
    /// Request the message at the head of the queue.
    #[default]
    Req,
    /// Acknowledge and dequeue a message.
    Ack,
}

impl PollOp {
    fn as_str(self) -> &'static str {
        match self {
            PollOp::Req => "req",
            PollOp::Ack => "ack",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "ack" => PollOp::Ack,
            _ => PollOp::Req,
        }
    }
}

/// An EPP `<poll>` command action (RFC 5730 §2.9.2.3).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Poll {
    pub op: PollOp,
    /// `msgID` attribute; required for acknowledgements.
    pub message_id: Option<String>,
}

impl Element for Poll {
    fn xml_name(&self) -> Name {
        Name::new(NS, "poll")
    }

    fn encode(&self) -> Result<Node> {
        let mut node = Node::element(NS, "poll")
            .attr("op", self.op.as_str())
            .self_closing();
        if let Some(id) = &self.message_id {
            node = node.attr("msgID", id);
        }
        Ok(node)
    }

    fn decode(&mut self, node: &Node, _resolver: &dyn Resolver) -> Result<()> {
        self.op = PollOp::parse(node.attr_value("op").unwrap_or_default());
        self.message_id = node.attr_value("msgID").map(str::to_string);
        Ok(())
    }
}

impl Action for Poll {}

/// `op` attribute of an EPP `<transfer>` command (RFC 5730 §2.9.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferOp {
    #[default]
    Request,
    Approve,
    Cancel,
    Query,
    Reject,
}

impl TransferOp {
    fn as_str(self) -> &'static str {
        match self {
            TransferOp::Request => "request",
            TransferOp::Approve => "approve",
            TransferOp::Cancel => "cancel",
            TransferOp::Query => "query",
            TransferOp::Reject => "reject",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "approve" => TransferOp::Approve,
            "cancel" => TransferOp::Cancel,
            "query" => TransferOp::Query,
            "reject" => TransferOp::Reject,
            _ => TransferOp::Request,
        }
    }
}

/// An EPP `<transfer>` command action (RFC 5730 §2.9.3.4).
#[derive(Debug, Default)]
pub struct Transfer {
    pub op: TransferOp,
    /// The object-specific payload, resolved by namespace.
    pub payload: Option<Box<dyn ObjectElement>>,
}

impl Element for Transfer {
    fn xml_name(&self) -> Name {
        Name::new(NS, "transfer")
    }

    fn encode(&self) -> Result<Node> {
        let mut node = Node::element(NS, "transfer").attr("op", self.op.as_str());
        if let Some(payload) = &self.payload {
            node = node.child(payload.encode()?);
        }
        Ok(node)
    }

    fn decode(&mut self, node: &Node, resolver: &dyn Resolver) -> Result<()> {
        self.op = TransferOp::parse(node.attr_value("op").unwrap_or_default());
        self.payload = match node.children.first() {
            Some(child) => Some(decode_object(child, resolver)?),
            None => None,
        };
        Ok(())
    }
}

impl Action for Transfer {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{xml, SchemaSet};

    fn encode(command: &Command) -> String {
        let node = command.encode_node().unwrap();
        String::from_utf8(xml::write_document(&node).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_command() {
        assert_eq!(encode(&Command::default()), "<command></command>");
    }

    #[test]
    fn test_logout_command() {
        let command = Command::new(Logout).with_transaction_id("ABC-123");
        assert_eq!(
            encode(&command),
            "<command><logout/><clTRID>ABC-123</clTRID></command>"
        );
    }

    #[test]
    fn test_login_roundtrip() {
        let login = Login {
            client_id: "ClientX".to_string(),
            password: "foo-BAR2".to_string(),
            new_password: Some("bar-FOO2".to_string()),
            objects: vec![
                "urn:ietf:params:xml:ns:domain-1.0".to_string(),
                "urn:ietf:params:xml:ns:host-1.0".to_string(),
            ],
            extensions: vec!["urn:example:fee-1.0".to_string()],
            ..Login::default()
        };
        let node = login.encode().unwrap();
        let out = String::from_utf8(xml::write_document(&node).unwrap()).unwrap();
        let expected = concat!(
            "<login><clID>ClientX</clID><pw>foo-BAR2</pw><newPW>bar-FOO2</newPW>",
            "<options><version>1.0</version><lang>en</lang></options>",
            "<svcs><objURI>urn:ietf:params:xml:ns:domain-1.0</objURI>",
            "<objURI>urn:ietf:params:xml:ns:host-1.0</objURI>",
            "<svcExtension><extURI>urn:example:fee-1.0</extURI></svcExtension></svcs></login>",
        );
        assert_eq!(out, expected);

        // Decode from the namespaced form.
        let namespaced = expected.replacen("<login>", &format!(r#"<login xmlns="{NS}">"#), 1);
        let parsed = xml::parse(namespaced.as_bytes()).unwrap();
        let mut back = Login::default();
        back.decode(&parsed, &SchemaSet::empty()).unwrap();
        assert_eq!(back, login);
    }

    #[test]
    fn test_poll_attributes() {
        let poll = Poll {
            op: PollOp::Ack,
            message_id: Some("12345".to_string()),
        };
        let out = String::from_utf8(xml::write_document(&poll.encode().unwrap()).unwrap()).unwrap();
        assert_eq!(out, r#"<poll op="ack" msgID="12345"/>"#);

        let parsed = xml::parse(out.as_bytes()).unwrap();
        let mut back = Poll::default();
        back.decode(&parsed, &SchemaSet::empty()).unwrap();
        assert_eq!(back, poll);
    }

    #[test]
    fn test_transfer_op_defaults_to_request() {
        assert_eq!(TransferOp::parse("bogus"), TransferOp::Request);
        let out = String::from_utf8(
            xml::write_document(&Transfer::default().encode().unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(out, r#"<transfer op="request"></transfer>"#);
    }

    #[test]
    fn test_command_decode_routes_children() {
        let input = format!(
            concat!(
                r#"<command xmlns="{ns}">"#,
                "<logout/>",
                r#"<extension><unknown:thing xmlns:unknown="urn:example:unknown-1.0"/></extension>"#,
                "<clTRID>TX-1</clTRID>",
                "</command>",
            ),
            ns = NS
        );
        let node = xml::parse(input.as_bytes()).unwrap();
        let command = Command::decode_node(&node, &SchemaSet::standard()).unwrap();

        let action = command.action.expect("action");
        assert_eq!(action.xml_name(), Name::new(NS, "logout"));
        assert_eq!(command.extensions.len(), 1);
        assert_eq!(
            command.extensions[0].xml_name(),
            Name::new("urn:example:unknown-1.0", "thing")
        );
        assert_eq!(command.client_transaction_id.as_deref(), Some("TX-1"));
    }
}
