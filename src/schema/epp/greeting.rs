//! EPP server `<greeting>` and its data collection policy types
//! (RFC 5730 §2.4).

use super::NS;
use crate::error::Result;
use crate::schema::xml::Node;

/// An EPP server `<greeting>` message: the first data unit on any session,
/// announcing the server's identity and capabilities.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Greeting {
    /// `<svID>`: server name.
    pub server_name: String,
    /// `<svDate>`: server timestamp, RFC 3339, passed through verbatim.
    pub server_date: Option<String>,
    /// `<svcMenu>`: services the server offers.
    pub service_menu: Option<ServiceMenu>,
    /// `<dcp>`: data collection policy.
    pub dcp: Option<Dcp>,
}

impl Greeting {
    pub(crate) fn encode_node(&self) -> Result<Node> {
        let mut node = Node::element(NS, "greeting");
        if !self.server_name.is_empty() {
            node = node.child(Node::element(NS, "svID").text(&self.server_name));
        }
        if let Some(date) = &self.server_date {
            node = node.child(Node::element(NS, "svDate").text(date));
        }
        if let Some(menu) = &self.service_menu {
            node = node.child(menu.encode_node());
        }
        if let Some(dcp) = &self.dcp {
            node = node.child(dcp.encode_node());
        }
        Ok(node)
    }

    pub(crate) fn decode_node(node: &Node) -> Result<Self> {
        let mut greeting = Greeting {
            server_name: node.child_text(NS, "svID").unwrap_or_default().to_string(),
            server_date: node.child_text(NS, "svDate").map(str::to_string),
            ..Self::default()
        };
        if let Some(menu) = node.find(NS, "svcMenu") {
            greeting.service_menu = Some(ServiceMenu::decode_node(menu));
        }
        if let Some(dcp) = node.find(NS, "dcp") {
            greeting.dcp = Some(Dcp::decode_node(dcp));
        }
        Ok(greeting)
    }
}

/// An EPP `<svcMenu>` element: protocol versions, languages and object
/// namespace URIs the server supports.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceMenu {
    pub versions: Vec<String>,
    pub languages: Vec<String>,
    /// `<objURI>`: object namespace URIs.
    pub objects: Vec<String>,
    pub service_extension: Option<ServiceExtension>,
}

impl ServiceMenu {
    fn encode_node(&self) -> Node {
        let mut node = Node::element(NS, "svcMenu");
        for version in &self.versions {
            node = node.child(Node::element(NS, "version").text(version));
        }
        for lang in &self.languages {
            node = node.child(Node::element(NS, "lang").text(lang));
        }
        for uri in &self.objects {
            node = node.child(Node::element(NS, "objURI").text(uri));
        }
        if let Some(ext) = &self.service_extension {
            node = node.child(ext.encode_node("svcExtension"));
        }
        node
    }

    fn decode_node(node: &Node) -> Self {
        Self {
            versions: collect_texts(node, "version"),
            languages: collect_texts(node, "lang"),
            objects: collect_texts(node, "objURI"),
            service_extension: node
                .find(NS, "svcExtension")
                .map(ServiceExtension::decode_node),
        }
    }
}

/// An EPP `<svcExtension>` element: extension namespace URIs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceExtension {
    /// `<extURI>`: extension namespace URIs.
    pub extensions: Vec<String>,
}

impl ServiceExtension {
    pub(crate) fn encode_node(&self, local: &str) -> Node {
        let mut node = Node::element(NS, local);
        for uri in &self.extensions {
            node = node.child(Node::element(NS, "extURI").text(uri));
        }
        node
    }

    pub(crate) fn decode_node(node: &Node) -> Self {
        Self {
            extensions: collect_texts(node, "extURI"),
        }
    }
}

/// An EPP `<dcp>` element: the server's data collection policy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dcp {
    pub access: Access,
    pub statements: Vec<Statement>,
    pub expiry: Option<Expiry>,
}

impl Dcp {
    fn encode_node(&self) -> Node {
        let mut node = Node::element(NS, "dcp").child(self.access.encode_node());
        for statement in &self.statements {
            node = node.child(statement.encode_node());
        }
        if let Some(expiry) = &self.expiry {
            node = node.child(expiry.encode_node());
        }
        node
    }

    fn decode_node(node: &Node) -> Self {
        Self {
            access: node
                .find(NS, "access")
                .map(Access::decode_node)
                .unwrap_or_default(),
            statements: node
                .find_all(NS, "statement")
                .map(Statement::decode_node)
                .collect(),
            expiry: node.find(NS, "expiry").and_then(Expiry::decode_node),
        }
    }
}

/// An EPP server's scope of data access, serialized as a single
/// self-closing child of `<access>` named for the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// No variant present, or an unrecognized one.
    #[default]
    Unspecified,
    Null,
    None,
    Personal,
    Other,
    PersonalAndOther,
    All,
}

impl Access {
    /// The XML local name for this variant, if any.
    pub fn local(self) -> Option<&'static str> {
        match self {
            Access::Unspecified => None,
            Access::Null => Some("null"),
            Access::None => Some("none"),
            Access::Personal => Some("personal"),
            Access::Other => Some("other"),
            Access::PersonalAndOther => Some("personalAndOther"),
            Access::All => Some("all"),
        }
    }

    /// Parses an XML local name; unknown names yield
    /// [`Access::Unspecified`].
    pub fn parse(local: &str) -> Self {
        match local {
            "null" => Access::Null,
            "none" => Access::None,
            "personal" => Access::Personal,
            "other" => Access::Other,
            "personalAndOther" => Access::PersonalAndOther,
            "all" => Access::All,
            _ => Access::Unspecified,
        }
    }

    fn encode_node(self) -> Node {
        let mut node = Node::element(NS, "access");
        if let Some(local) = self.local() {
            node = node.child(Node::element(NS, local).self_closing());
        }
        node
    }

    fn decode_node(node: &Node) -> Self {
        node.children
            .iter()
            .filter(|c| c.name.ns == NS)
            .map(|c| Access::parse(&c.name.local))
            .next()
            .unwrap_or_default()
    }
}

/// An EPP server's purpose for data collection; a bitset over
/// {admin, contact, provisioning, other}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Purpose(u8);

impl Purpose {
    pub const ADMIN: Purpose = Purpose(0b0001);
    pub const CONTACT: Purpose = Purpose(0b0010);
    pub const PROVISIONING: Purpose = Purpose(0b0100);
    pub const OTHER: Purpose = Purpose(0b1000);

    const LOCALS: [(Purpose, &'static str); 4] = [
        (Purpose::ADMIN, "admin"),
        (Purpose::CONTACT, "contact"),
        (Purpose::PROVISIONING, "provisioning"),
        (Purpose::OTHER, "other"),
    ];

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Purpose) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parses whitespace-separated purpose names; unrecognized names are
    /// ignored.
    pub fn parse(s: &str) -> Self {
        let mut purpose = Purpose::default();
        for token in s.split_whitespace() {
            for (flag, local) in Purpose::LOCALS {
                if token == local {
                    purpose = purpose | flag;
                }
            }
        }
        purpose
    }

    fn encode_node(self) -> Node {
        let mut node = Node::element(NS, "purpose");
        for (flag, local) in Purpose::LOCALS {
            if self.contains(flag) {
                node = node.child(Node::element(NS, local).self_closing());
            }
        }
        node
    }

    fn decode_node(node: &Node) -> Self {
        let mut purpose = Purpose::parse(&node.text);
        for child in node.children.iter().filter(|c| c.name.ns == NS) {
            purpose = purpose | Purpose::parse(&child.name.local);
        }
        purpose
    }
}

impl std::ops::BitOr for Purpose {
    type Output = Purpose;
    fn bitor(self, rhs: Purpose) -> Purpose {
        Purpose(self.0 | rhs.0)
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (flag, local) in Purpose::LOCALS {
            if self.contains(flag) {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{local}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// An EPP `<statement>` element: purpose and recipients of collected data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub purpose: Purpose,
    pub recipient: Recipient,
}

impl Statement {
    fn encode_node(&self) -> Node {
        Node::element(NS, "statement")
            .child(self.purpose.encode_node())
            .child(self.recipient.encode_node())
    }

    fn decode_node(node: &Node) -> Self {
        Self {
            purpose: node
                .find(NS, "purpose")
                .map(Purpose::decode_node)
                .unwrap_or_default(),
            recipient: node
                .find(NS, "recipient")
                .map(Recipient::decode_node)
                .unwrap_or_default(),
        }
    }
}

/// An EPP `<recipient>` element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recipient {
    pub other: bool,
    pub ours: Option<Ours>,
    pub public: bool,
    pub same: bool,
    pub unrelated: bool,
}

impl Recipient {
    fn encode_node(&self) -> Node {
        let mut node = Node::element(NS, "recipient");
        if self.other {
            node = node.child(Node::element(NS, "other").self_closing());
        }
        if let Some(ours) = &self.ours {
            node = node.child(ours.encode_node());
        }
        if self.public {
            node = node.child(Node::element(NS, "public").self_closing());
        }
        if self.same {
            node = node.child(Node::element(NS, "same").self_closing());
        }
        if self.unrelated {
            node = node.child(Node::element(NS, "unrelated").self_closing());
        }
        node
    }

    fn decode_node(node: &Node) -> Self {
        Self {
            other: node.find(NS, "other").is_some(),
            ours: node.find(NS, "ours").map(Ours::decode_node),
            public: node.find(NS, "public").is_some(),
            same: node.find(NS, "same").is_some(),
            unrelated: node.find(NS, "unrelated").is_some(),
        }
    }
}

/// An `<ours>` recipient; self-closing when no description is present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ours {
    /// `<recDesc>`: description of the recipient.
    pub description: String,
}

impl Ours {
    fn encode_node(&self) -> Node {
        if self.description.is_empty() {
            Node::element(NS, "ours").self_closing()
        } else {
            Node::element(NS, "ours")
                .child(Node::element(NS, "recDesc").text(&self.description))
        }
    }

    fn decode_node(node: &Node) -> Self {
        Self {
            description: node
                .child_text(NS, "recDesc")
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// An EPP `<expiry>` element: data retention duration.
#[derive(Debug, Clone, PartialEq)]
pub enum Expiry {
    /// `<absolute>`: RFC 3339 timestamp, passed through verbatim.
    Absolute(String),
    /// `<relative>`: ISO 8601 duration, passed through verbatim.
    Relative(String),
}

impl Expiry {
    fn encode_node(&self) -> Node {
        let node = Node::element(NS, "expiry");
        match self {
            Expiry::Absolute(ts) => node.child(Node::element(NS, "absolute").text(ts)),
            Expiry::Relative(dur) => node.child(Node::element(NS, "relative").text(dur)),
        }
    }

    fn decode_node(node: &Node) -> Option<Self> {
        if let Some(ts) = node.child_text(NS, "absolute") {
            return Some(Expiry::Absolute(ts.to_string()));
        }
        node.child_text(NS, "relative")
            .map(|dur| Expiry::Relative(dur.to_string()))
    }
}

fn collect_texts(node: &Node, local: &str) -> Vec<String> {
    node.find_all(NS, local)
        .map(|c| c.text.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::xml;

    fn encode(greeting: &Greeting) -> String {
        let node = greeting.encode_node().unwrap();
        String::from_utf8(xml::write_document(&node).unwrap()).unwrap()
    }

    fn decode(input: &str) -> Greeting {
        let node = xml::parse(input.as_bytes()).unwrap();
        Greeting::decode_node(&node).unwrap()
    }

    #[test]
    fn test_empty_greeting() {
        assert_eq!(encode(&Greeting::default()), "<greeting></greeting>");
    }

    #[test]
    fn test_simple_greeting_roundtrip() {
        let greeting = Greeting {
            server_name: "Test EPP Server".to_string(),
            server_date: Some("2000-01-01T00:00:00Z".to_string()),
            ..Greeting::default()
        };
        let xml_text = encode(&greeting);
        assert_eq!(
            xml_text,
            "<greeting><svID>Test EPP Server</svID><svDate>2000-01-01T00:00:00Z</svDate></greeting>"
        );
        // The decoder sees the element inside the epp default namespace.
        let namespaced = format!(
            r#"<greeting xmlns="{NS}"><svID>Test EPP Server</svID><svDate>2000-01-01T00:00:00Z</svDate></greeting>"#
        );
        assert_eq!(decode(&namespaced), greeting);
    }

    #[test]
    fn test_service_menu_and_empty_dcp() {
        let greeting = Greeting {
            server_name: "s".to_string(),
            service_menu: Some(ServiceMenu {
                versions: vec!["1.0".to_string()],
                languages: vec!["en".to_string(), "fr".to_string()],
                objects: vec!["urn:ietf:params:xml:ns:domain-1.0".to_string()],
                service_extension: None,
            }),
            dcp: Some(Dcp::default()),
            ..Greeting::default()
        };
        let expected = concat!(
            "<greeting><svID>s</svID>",
            "<svcMenu><version>1.0</version><lang>en</lang><lang>fr</lang>",
            "<objURI>urn:ietf:params:xml:ns:domain-1.0</objURI></svcMenu>",
            "<dcp><access></access></dcp></greeting>",
        );
        assert_eq!(encode(&greeting), expected);
    }

    #[test]
    fn test_access_variants() {
        for (access, local) in [
            (Access::Null, "null"),
            (Access::None, "none"),
            (Access::Personal, "personal"),
            (Access::Other, "other"),
            (Access::PersonalAndOther, "personalAndOther"),
            (Access::All, "all"),
        ] {
            let node = access.encode_node();
            let out = String::from_utf8(xml::write_document(&node).unwrap()).unwrap();
            assert_eq!(out, format!("<access><{local}/></access>"));
            assert_eq!(Access::parse(local), access);
        }
        assert_eq!(Access::parse("bogus"), Access::Unspecified);
        let out =
            String::from_utf8(xml::write_document(&Access::Unspecified.encode_node()).unwrap())
                .unwrap();
        assert_eq!(out, "<access></access>");
    }

    #[test]
    fn test_purpose_bitset() {
        let p = Purpose::ADMIN | Purpose::OTHER;
        assert!(p.contains(Purpose::ADMIN));
        assert!(!p.contains(Purpose::CONTACT));
        assert_eq!(p.to_string(), "admin other");
        assert_eq!(Purpose::parse("admin  other"), p);
        assert_eq!(Purpose::parse("admin bogus other"), p);
        assert!(Purpose::parse("").is_empty());
    }

    #[test]
    fn test_purpose_encodes_subset_of_children() {
        let node = (Purpose::CONTACT | Purpose::PROVISIONING).encode_node();
        let out = String::from_utf8(xml::write_document(&node).unwrap()).unwrap();
        assert_eq!(out, "<purpose><contact/><provisioning/></purpose>");
    }

    #[test]
    fn test_dcp_statement_roundtrip() {
        let greeting = Greeting {
            dcp: Some(Dcp {
                access: Access::PersonalAndOther,
                statements: vec![Statement {
                    purpose: Purpose::ADMIN,
                    recipient: Recipient {
                        ours: Some(Ours {
                            description: "Registry".to_string(),
                        }),
                        public: true,
                        ..Recipient::default()
                    },
                }],
                expiry: Some(Expiry::Relative("P1Y".to_string())),
            }),
            ..Greeting::default()
        };
        let inner = concat!(
            "<dcp><access><personalAndOther/></access>",
            "<statement><purpose><admin/></purpose>",
            "<recipient><ours><recDesc>Registry</recDesc></ours><public/></recipient>",
            "</statement><expiry><relative>P1Y</relative></expiry></dcp>",
        );
        assert_eq!(encode(&greeting), format!("<greeting>{inner}</greeting>"));

        let namespaced = format!(r#"<greeting xmlns="{NS}">{inner}</greeting>"#);
        assert_eq!(decode(&namespaced), greeting);
    }

    #[test]
    fn test_empty_ours_self_closes() {
        let recipient = Recipient {
            ours: Some(Ours::default()),
            ..Recipient::default()
        };
        let out =
            String::from_utf8(xml::write_document(&recipient.encode_node()).unwrap()).unwrap();
        assert_eq!(out, "<recipient><ours/></recipient>");
    }
}
