//! EPP server `<response>` and its result machinery (RFC 5730 §2.6, §3).

use super::NS;
use crate::error::{EppError, Result};
use crate::schema::xml::Node;
use crate::schema::{decode_data, decode_extension, ExtensionElement, Resolver, ResponseData};

/// An EPP server `<response>`.
#[derive(Debug, Default)]
pub struct Response {
    /// One or more `<result>` elements describing success or failure.
    pub results: Vec<CommandResult>,
    /// `<msgQ>`: messages queued for client retrieval.
    pub message_queue: Option<MessageQueue>,
    /// `<resData>` children, specific to the command and object.
    pub data: Vec<Box<dyn ResponseData>>,
    /// `<extension>` children.
    pub extensions: Vec<Box<dyn ExtensionElement>>,
    /// `<trID>`: client and server transaction identifiers.
    pub transaction_id: TransactionId,
}

impl Response {
    /// A response carrying a single result with the code's standard message.
    pub fn with_code(code: ResultCode) -> Self {
        Self {
            results: vec![CommandResult::new(code)],
            ..Self::default()
        }
    }

    pub(crate) fn encode_node(&self) -> Result<Node> {
        let mut node = Node::element(NS, "response");
        for result in &self.results {
            node = node.child(result.encode_node());
        }
        if let Some(queue) = &self.message_queue {
            node = node.child(queue.encode_node());
        }
        if !self.data.is_empty() {
            let mut res_data = Node::element(NS, "resData");
            for data in &self.data {
                res_data = res_data.child(data.encode()?);
            }
            node = node.child(res_data);
        }
        if !self.extensions.is_empty() {
            let mut ext = Node::element(NS, "extension");
            for extension in &self.extensions {
                ext = ext.child(extension.encode()?);
            }
            node = node.child(ext);
        }
        Ok(node.child(self.transaction_id.encode_node()))
    }

    pub(crate) fn decode_node(node: &Node, resolver: &dyn Resolver) -> Result<Self> {
        let mut response = Response {
            results: node
                .find_all(NS, "result")
                .map(CommandResult::decode_node)
                .collect::<Result<_>>()?,
            message_queue: node.find(NS, "msgQ").map(MessageQueue::decode_node),
            transaction_id: node
                .find(NS, "trID")
                .map(TransactionId::decode_node)
                .unwrap_or_default(),
            ..Self::default()
        };
        if let Some(res_data) = node.find(NS, "resData") {
            for child in &res_data.children {
                response.data.push(decode_data(child, resolver)?);
            }
        }
        if let Some(ext) = node.find(NS, "extension") {
            for child in &ext.children {
                response.extensions.push(decode_extension(child, resolver)?);
            }
        }
        Ok(response)
    }
}

/// An EPP `<result>` element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandResult {
    /// `code` attribute.
    pub code: ResultCode,
    /// `<msg>`: human-readable message.
    pub message: Message,
    /// `<value>` children, kept verbatim.
    pub values: Vec<Node>,
    /// `<extValue>` children.
    pub extension_values: Vec<ExtensionValue>,
}

impl CommandResult {
    /// A result carrying the code's standard message.
    pub fn new(code: ResultCode) -> Self {
        Self {
            code,
            message: Message::new(code.message()),
            ..Self::default()
        }
    }

    fn encode_node(&self) -> Node {
        let mut node = Node::element(NS, "result")
            .attr("code", self.code.0.to_string())
            .child(self.message.encode_node("msg"));
        for value in &self.values {
            node = node.child(value.clone());
        }
        for ext_value in &self.extension_values {
            node = node.child(ext_value.encode_node());
        }
        node
    }

    fn decode_node(node: &Node) -> Result<Self> {
        let code = node
            .attr_value("code")
            .ok_or_else(|| EppError::malformed("<result> without code attribute"))?;
        let code = code
            .parse::<u16>()
            .map_err(|_| EppError::malformed(format!("invalid result code {code:?}")))?;
        Ok(Self {
            code: ResultCode(code),
            message: node
                .find(NS, "msg")
                .map(Message::decode_node)
                .unwrap_or_default(),
            values: node.find_all(NS, "value").cloned().collect(),
            extension_values: node
                .find_all(NS, "extValue")
                .map(ExtensionValue::decode_node)
                .collect(),
        })
    }
}

/// A human-readable message with a `lang` attribute (default `"en"`).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub lang: String,
    pub value: String,
}

impl Message {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            lang: "en".to_string(),
            value: value.into(),
        }
    }

    fn encode_node(&self, local: &str) -> Node {
        Node::element(NS, local)
            .attr("lang", &self.lang)
            .text(&self.value)
    }

    fn decode_node(node: &Node) -> Self {
        Self {
            lang: node.attr_value("lang").unwrap_or("en").to_string(),
            value: node.text.clone(),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new("")
    }
}

/// An `<extValue>` element: an extension-defined value with a reason.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionValue {
    /// `<value>` child, kept verbatim.
    pub value: Option<Node>,
    /// `<reason>`: why the value is noteworthy.
    pub reason: Message,
}

impl ExtensionValue {
    fn encode_node(&self) -> Node {
        let mut node = Node::element(NS, "extValue");
        if let Some(value) = &self.value {
            node = node.child(value.clone());
        }
        node.child(self.reason.encode_node("reason"))
    }

    fn decode_node(node: &Node) -> Self {
        Self {
            value: node.find(NS, "value").cloned(),
            reason: node
                .find(NS, "reason")
                .map(Message::decode_node)
                .unwrap_or_default(),
        }
    }
}

/// An EPP `<trID>` element; both children are always emitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionId {
    /// `<clTRID>`: echo of the client-generated transaction ID.
    pub client: String,
    /// `<svTRID>`: server-generated transaction ID.
    pub server: String,
}

impl TransactionId {
    fn encode_node(&self) -> Node {
        Node::element(NS, "trID")
            .child(Node::element(NS, "clTRID").text(&self.client))
            .child(Node::element(NS, "svTRID").text(&self.server))
    }

    fn decode_node(node: &Node) -> Self {
        Self {
            client: node.child_text(NS, "clTRID").unwrap_or_default().to_string(),
            server: node.child_text(NS, "svTRID").unwrap_or_default().to_string(),
        }
    }
}

/// An EPP `<msgQ>` element (RFC 5730 §2.9.2.3).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageQueue {
    /// `count` attribute: number of queued messages.
    pub count: u64,
    /// `id` attribute: identifier of the message at the head of the queue.
    pub id: String,
    /// `<qDate>`: when the message was enqueued; poll responses only.
    pub date: Option<String>,
    /// `<msg>`: human-readable message; poll responses only.
    pub message: Option<Message>,
}

impl MessageQueue {
    fn encode_node(&self) -> Node {
        let mut node = Node::element(NS, "msgQ")
            .attr("count", self.count.to_string())
            .attr("id", &self.id);
        // A queue notice without children collapses to a single
        // self-closing tag.
        if self.date.is_none() && self.message.is_none() {
            return node.self_closing();
        }
        if let Some(date) = &self.date {
            node = node.child(Node::element(NS, "qDate").text(date));
        }
        if let Some(message) = &self.message {
            node = node.child(message.encode_node("msg"));
        }
        node
    }

    fn decode_node(node: &Node) -> Self {
        Self {
            count: node
                .attr_value("count")
                .and_then(|c| c.parse().ok())
                .unwrap_or_default(),
            id: node.attr_value("id").unwrap_or_default().to_string(),
            date: node.child_text(NS, "qDate").map(str::to_string),
            message: node.find(NS, "msg").map(Message::decode_node),
        }
    }
}

/// An EPP result code (RFC 5730 §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResultCode(pub u16);

impl Default for ResultCode {
    fn default() -> Self {
        ResultCode::COMMAND_SUCCESSFUL
    }
}

impl ResultCode {
    pub const COMMAND_SUCCESSFUL: ResultCode = ResultCode(1000);
    pub const ACTION_PENDING: ResultCode = ResultCode(1001);
    pub const NO_MESSAGES: ResultCode = ResultCode(1300);
    pub const ACK_TO_DEQUEUE: ResultCode = ResultCode(1301);
    pub const ENDING_SESSION: ResultCode = ResultCode(1500);
    pub const UNKNOWN_COMMAND: ResultCode = ResultCode(2000);
    pub const COMMAND_SYNTAX_ERROR: ResultCode = ResultCode(2001);
    pub const COMMAND_USE_ERROR: ResultCode = ResultCode(2002);
    pub const REQUIRED_PARAMETER_MISSING: ResultCode = ResultCode(2003);
    pub const PARAMETER_RANGE_ERROR: ResultCode = ResultCode(2004);
    pub const PARAMETER_SYNTAX_ERROR: ResultCode = ResultCode(2005);
    pub const UNIMPLEMENTED_VERSION: ResultCode = ResultCode(2100);
    pub const UNIMPLEMENTED_COMMAND: ResultCode = ResultCode(2101);
    pub const UNIMPLEMENTED_OPTION: ResultCode = ResultCode(2102);
    pub const UNIMPLEMENTED_EXTENSION: ResultCode = ResultCode(2103);
    pub const BILLING_FAILURE: ResultCode = ResultCode(2104);
    pub const NOT_ELIGIBLE_FOR_RENEWAL: ResultCode = ResultCode(2105);
    pub const NOT_ELIGIBLE_FOR_TRANSFER: ResultCode = ResultCode(2106);
    pub const AUTHENTICATION_ERROR: ResultCode = ResultCode(2200);
    pub const AUTHORIZATION_ERROR: ResultCode = ResultCode(2201);
    pub const INVALID_AUTHORIZATION_INFO: ResultCode = ResultCode(2202);
    pub const OBJECT_PENDING_TRANSFER: ResultCode = ResultCode(2300);
    pub const OBJECT_NOT_PENDING_TRANSFER: ResultCode = ResultCode(2301);
    pub const OBJECT_EXISTS: ResultCode = ResultCode(2302);
    pub const OBJECT_DOES_NOT_EXIST: ResultCode = ResultCode(2303);
    pub const STATUS_PROHIBITS_OPERATION: ResultCode = ResultCode(2304);
    pub const ASSOCIATION_PROHIBITS_OPERATION: ResultCode = ResultCode(2305);
    pub const PARAMETER_POLICY_ERROR: ResultCode = ResultCode(2306);
    pub const UNIMPLEMENTED_OBJECT_SERVICE: ResultCode = ResultCode(2307);
    pub const DATA_MANAGEMENT_POLICY_VIOLATION: ResultCode = ResultCode(2308);
    pub const COMMAND_FAILED: ResultCode = ResultCode(2400);
    pub const COMMAND_FAILED_CLOSING: ResultCode = ResultCode(2500);
    pub const AUTHENTICATION_ERROR_CLOSING: ResultCode = ResultCode(2501);
    pub const SESSION_LIMIT_EXCEEDED: ResultCode = ResultCode(2502);

    /// The standard human-readable message for this code.
    pub fn message(self) -> &'static str {
        match self.0 {
            1000 => "Command completed successfully",
            1001 => "Command completed successfully; action pending",
            1300 => "Command completed successfully; no messages",
            1301 => "Command completed successfully; ack to dequeue",
            1500 => "Command completed successfully; ending session",
            2000 => "Unknown command",
            2001 => "Command syntax error",
            2002 => "Command use error",
            2003 => "Required parameter missing",
            2004 => "Parameter value range error",
            2005 => "Parameter value syntax error",
            2100 => "Unimplemented protocol version",
            2101 => "Unimplemented command",
            2102 => "Unimplemented option",
            2103 => "Unimplemented extension",
            2104 => "Billing failure",
            2105 => "Object is not eligible for renewal",
            2106 => "Object is not eligible for transfer",
            2200 => "Authentication error",
            2201 => "Authorization error",
            2202 => "Invalid authorization information",
            2300 => "Object pending transfer",
            2301 => "Object not pending transfer",
            2302 => "Object exists",
            2303 => "Object does not exist",
            2304 => "Object status prohibits operation",
            2305 => "Object association prohibits operation",
            2306 => "Parameter value policy error",
            2307 => "Unimplemented object service",
            2308 => "Data management policy violation",
            2400 => "Command failed",
            2500 => "Command failed; server closing connection",
            2501 => "Authentication error; server closing connection",
            2502 => "Session limit exceeded; server closing connection",
            _ => "Unknown result code",
        }
    }

    /// Whether the command succeeded (1xxx codes).
    pub fn is_success(self) -> bool {
        self.0 < 2000
    }

    /// Whether the server will close the connection after this result.
    pub fn is_fatal(self) -> bool {
        (2500..=2502).contains(&self.0)
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{xml, SchemaSet};

    fn encode(response: &Response) -> String {
        let node = response.encode_node().unwrap();
        String::from_utf8(xml::write_document(&node).unwrap()).unwrap()
    }

    fn decode(input: &str) -> Response {
        let node = xml::parse(input.as_bytes()).unwrap();
        Response::decode_node(&node, &SchemaSet::standard()).unwrap()
    }

    #[test]
    fn test_empty_response_keeps_trid() {
        assert_eq!(
            encode(&Response::default()),
            "<response><trID><clTRID></clTRID><svTRID></svTRID></trID></response>"
        );
    }

    #[test]
    fn test_success_result() {
        let response = Response::with_code(ResultCode::COMMAND_SUCCESSFUL);
        assert_eq!(
            encode(&response),
            concat!(
                r#"<response><result code="1000">"#,
                r#"<msg lang="en">Command completed successfully</msg></result>"#,
                "<trID><clTRID></clTRID><svTRID></svTRID></trID></response>",
            )
        );
    }

    #[test]
    fn test_multiple_results_roundtrip() {
        let mut response = Response::default();
        response
            .results
            .push(CommandResult::new(ResultCode::PARAMETER_RANGE_ERROR));
        response
            .results
            .push(CommandResult::new(ResultCode::PARAMETER_SYNTAX_ERROR));
        response.transaction_id = TransactionId {
            client: "12345".to_string(),
            server: "abcde".to_string(),
        };

        let out = encode(&response);
        assert!(out.contains(r#"<result code="2004"><msg lang="en">Parameter value range error</msg></result>"#));
        assert!(out.contains(r#"<result code="2005">"#));
        assert!(out.contains("<trID><clTRID>12345</clTRID><svTRID>abcde</svTRID></trID>"));

        let namespaced = out.replacen("<response>", &format!(r#"<response xmlns="{NS}">"#), 1);
        let back = decode(&namespaced);
        assert_eq!(back.results, response.results);
        assert_eq!(back.transaction_id, response.transaction_id);
    }

    #[test]
    fn test_ext_value_reason() {
        let mut result = CommandResult::new(ResultCode::BILLING_FAILURE);
        result.extension_values.push(ExtensionValue {
            value: None,
            reason: Message::new("Command exceeds available balance"),
        });
        let mut response = Response::default();
        response.results.push(result);

        let out = encode(&response);
        assert!(out.contains(
            r#"<extValue><reason lang="en">Command exceeds available balance</reason></extValue>"#
        ));
    }

    #[test]
    fn test_msgq_self_closes_without_children() {
        let mut response = Response::with_code(ResultCode::ACK_TO_DEQUEUE);
        response.message_queue = Some(MessageQueue {
            count: 5,
            id: "12345".to_string(),
            date: None,
            message: None,
        });
        assert!(encode(&response).contains(r#"<msgQ count="5" id="12345"/>"#));

        response.message_queue = Some(MessageQueue {
            count: 5,
            id: "12345".to_string(),
            date: Some("2000-06-08T22:00:00.0Z".to_string()),
            message: Some(Message::new("Transfer requested.")),
        });
        assert!(encode(&response).contains(concat!(
            r#"<msgQ count="5" id="12345"><qDate>2000-06-08T22:00:00.0Z</qDate>"#,
            r#"<msg lang="en">Transfer requested.</msg></msgQ>"#,
        )));
    }

    #[test]
    fn test_result_code_messages() {
        assert_eq!(
            ResultCode::COMMAND_SUCCESSFUL.message(),
            "Command completed successfully"
        );
        assert_eq!(ResultCode::BILLING_FAILURE.message(), "Billing failure");
        assert_eq!(ResultCode(9999).message(), "Unknown result code");
        assert!(ResultCode::COMMAND_SUCCESSFUL.is_success());
        assert!(!ResultCode::COMMAND_FAILED.is_success());
        assert!(ResultCode::SESSION_LIMIT_EXCEEDED.is_fatal());
        assert!(!ResultCode::COMMAND_FAILED.is_fatal());
    }

    #[test]
    fn test_result_without_code_is_malformed() {
        let node = xml::parse(format!(r#"<response xmlns="{NS}"><result/></response>"#).as_bytes())
            .unwrap();
        let err = Response::decode_node(&node, &SchemaSet::empty()).unwrap_err();
        assert!(matches!(err, crate::EppError::MalformedFrame { .. }));
    }
}
