//! Wire codec for the stdio side of the relay.
//!
//! The transport is strict line framing: one JSON document per line, one
//! line per JSON document. Decoding turns an input line into a
//! [`NormalizedMessage`] (platform tag injected, request id extracted);
//! encoding turns an [`OutboundMessage`] back into a single compact JSON
//! line.
//!
//! The id handling is deliberately pedantic. JSON-RPC distinguishes a
//! message *without* an `id` key (a notification, never answered) from one
//! whose `id` is present but `null` or `0` (a request, always answered).
//! [`RequestId`] keeps all three states apart so the relay never invents or
//! drops a response.

use serde_json::{Map, Value, json};
use thiserror::Error;

/// Platform tag stamped on every outbound message that doesn't carry one.
pub const PLATFORM: &str = "claude";

/// A line that failed to parse as JSON.
///
/// Rendered as `Parse error: {detail}` to match the `-32700` response text.
#[derive(Debug, Error)]
#[error("Parse error: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// The three states an inbound `id` field can be in.
///
/// `Absent` marks a notification. `Null` and `Value` both mark requests;
/// the original value (including `null` and `0`) is echoed back verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestId {
    /// No `id` key on the message.
    Absent,
    /// `id` key present with value `null`.
    Null,
    /// `id` key present with a non-null value.
    Value(Value),
}

impl RequestId {
    /// Whether this message is a notification (no response expected).
    pub fn is_absent(&self) -> bool {
        matches!(self, RequestId::Absent)
    }

    /// The id to put on a response, or `None` for notifications.
    pub fn response_id(&self) -> Option<Value> {
        match self {
            RequestId::Absent => None,
            RequestId::Null => Some(Value::Null),
            RequestId::Value(v) => Some(v.clone()),
        }
    }
}

/// A decoded inbound message, ready to forward upstream.
///
/// The payload is kept as raw JSON rather than a typed struct: the relay
/// forwards every field verbatim, including ones it has never heard of, and
/// non-object payloads are forwarded too (they count as notifications since
/// they cannot carry an `id` key).
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    payload: Value,
    id: RequestId,
}

impl NormalizedMessage {
    /// The full message body to serialize as the HTTP request body.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The extracted request id.
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

/// Parse one input line into a normalized message.
///
/// Injects `platform: "claude"` when the message is an object and the key
/// is absent or null; an existing value, even a falsy one like `""` or
/// `false`, is left untouched. Blank lines are the caller's problem: the
/// serve loop skips them before decoding.
pub fn decode(line: &str) -> Result<NormalizedMessage, DecodeError> {
    let mut payload: Value = serde_json::from_str(line)?;

    if let Some(object) = payload.as_object_mut() {
        match object.get("platform") {
            None | Some(Value::Null) => {
                object.insert("platform".to_string(), json!(PLATFORM));
            }
            Some(_) => {}
        }
    }

    let id = match payload.as_object() {
        Some(object) => match object.get("id") {
            None => RequestId::Absent,
            Some(Value::Null) => RequestId::Null,
            Some(v) => RequestId::Value(v.clone()),
        },
        None => RequestId::Absent,
    };

    Ok(NormalizedMessage { payload, id })
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// One response on its way back to the client.
///
/// Exactly one of `result`/`error` appears in the serialized form.
/// `Passthrough` carries a backend-supplied JSON-RPC object whose id has
/// already been enforced non-null by the relay engine.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Result { id: Value, result: Value },
    Error { id: Value, error: RpcError },
    Passthrough(Value),
}

impl OutboundMessage {
    /// A success response wrapping `result`.
    pub fn result(id: Value, result: Value) -> Self {
        OutboundMessage::Result { id, result }
    }

    /// An error response without diagnostic data.
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        OutboundMessage::Error {
            id,
            error: RpcError {
                code,
                message: message.into(),
                data: None,
            },
        }
    }

    /// An error response carrying diagnostic data.
    pub fn error_with_data(id: Value, code: i64, message: impl Into<String>, data: Value) -> Self {
        OutboundMessage::Error {
            id,
            error: RpcError {
                code,
                message: message.into(),
                data: Some(data),
            },
        }
    }

    /// The `-32700` response for a line that failed to decode.
    ///
    /// The id is `null`: the malformed input's own id, if it had one, is
    /// unrecoverable.
    pub fn parse_error(error: &DecodeError) -> Self {
        OutboundMessage::error(Value::Null, -32700, error.to_string())
    }

    fn to_value(&self) -> Value {
        match self {
            OutboundMessage::Result { id, result } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result,
            }),
            OutboundMessage::Error { id, error } => {
                let mut object = Map::new();
                object.insert("jsonrpc".to_string(), json!("2.0"));
                object.insert("id".to_string(), id.clone());
                object.insert(
                    "error".to_string(),
                    serde_json::to_value(error).unwrap_or_else(|_| json!(null)),
                );
                Value::Object(object)
            }
            OutboundMessage::Passthrough(value) => value.clone(),
        }
    }
}

/// Serialize one response as a single line: compact JSON plus one `\n`.
pub fn encode(message: &OutboundMessage) -> String {
    let mut line = message.to_value().to_string();
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn injects_platform_when_absent() {
        let msg = decode(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        assert_eq!(msg.payload()["platform"], "claude");
    }

    #[test]
    fn injects_platform_when_null() {
        let msg = decode(r#"{"jsonrpc":"2.0","method":"ping","platform":null}"#).unwrap();
        assert_eq!(msg.payload()["platform"], "claude");
    }

    #[test]
    fn preserves_existing_platform_including_falsy_values() {
        let msg = decode(r#"{"method":"ping","platform":"vscode"}"#).unwrap();
        assert_eq!(msg.payload()["platform"], "vscode");

        let msg = decode(r#"{"method":"ping","platform":""}"#).unwrap();
        assert_eq!(msg.payload()["platform"], "");

        let msg = decode(r#"{"method":"ping","platform":false}"#).unwrap();
        assert_eq!(msg.payload()["platform"], false);
    }

    #[test]
    fn platform_injection_is_idempotent() {
        let once = decode(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        let line = once.payload().to_string();
        let twice = decode(&line).unwrap();
        assert_eq!(once.payload()["platform"], twice.payload()["platform"]);
    }

    #[test]
    fn missing_id_is_a_notification() {
        let msg = decode(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        assert!(msg.id().is_absent());
        assert_eq!(msg.id().response_id(), None);
    }

    #[test]
    fn null_id_is_still_a_request() {
        let msg = decode(r#"{"jsonrpc":"2.0","method":"ping","id":null}"#).unwrap();
        assert_eq!(*msg.id(), RequestId::Null);
        assert_eq!(msg.id().response_id(), Some(Value::Null));
    }

    #[test]
    fn zero_id_is_preserved() {
        let msg = decode(r#"{"jsonrpc":"2.0","method":"ping","id":0}"#).unwrap();
        assert_eq!(*msg.id(), RequestId::Value(json!(0)));
        assert_eq!(msg.id().response_id(), Some(json!(0)));
    }

    #[test]
    fn non_object_payload_is_forwarded_as_notification() {
        let msg = decode("5").unwrap();
        assert_eq!(*msg.payload(), json!(5));
        assert!(msg.id().is_absent());
    }

    #[test]
    fn unknown_fields_survive_decode() {
        let msg = decode(r#"{"method":"x","id":1,"custom":{"a":[1,2]}}"#).unwrap();
        assert_eq!(msg.payload()["custom"]["a"][1], 2);
    }

    #[test]
    fn decode_failure_renders_parse_error() {
        let err = decode("not json").unwrap_err();
        assert!(err.to_string().starts_with("Parse error: "));
    }

    #[test]
    fn encode_is_one_compact_line() {
        let line = encode(&OutboundMessage::result(json!(5), json!({"tools": []})));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        expect![[r#"{"id":5,"jsonrpc":"2.0","result":{"tools":[]}}"#]]
            .assert_eq(line.trim_end());
    }

    #[test]
    fn encode_error_omits_absent_data() {
        let line = encode(&OutboundMessage::error(json!(1), -32603, "boom"));
        expect![[r#"{"error":{"code":-32603,"message":"boom"},"id":1,"jsonrpc":"2.0"}"#]]
            .assert_eq(line.trim_end());
    }

    #[test]
    fn encode_error_includes_data_when_present() {
        let line = encode(&OutboundMessage::error_with_data(
            json!("a"),
            500,
            "API error: 500",
            json!({"detail": "oops"}),
        ));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["error"]["data"]["detail"], "oops");
    }

    #[test]
    fn parse_error_has_null_id_and_32700() {
        let err = decode("{bad").unwrap_err();
        let line = encode(&OutboundMessage::parse_error(&err));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["id"], Value::Null);
        assert_eq!(parsed["error"]["code"], -32700);
        assert!(
            parsed["error"]["message"]
                .as_str()
                .unwrap()
                .starts_with("Parse error: ")
        );
    }
}
