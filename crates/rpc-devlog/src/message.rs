//! Message payloads and pluggable message formatting.
//!
//! Calls carry either a structured protocol message (a type name plus its
//! fields) or an arbitrary JSON value. How either is turned into display text
//! is decided by a [`MessageFormatter`]:
//!
//! - [`TextFormatter`] (default): `field: value` lines for structured
//!   messages, nested messages in `name {` ... `}` blocks, pretty JSON for
//!   arbitrary values
//! - [`JsonFormatter`]: JSON for everything
//!
//! Any `Fn(&Message) -> Result<String, FormatError>` is also a formatter.

use serde::Serialize;
use serde_json::Value;
use std::io;
use thiserror::Error;

/// Error produced by a [`MessageFormatter`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormatError {
    /// A structured message whose fields are not an object
    #[error("{type_name} is not a structured message")]
    NotAMessage {
        /// Declared message type
        type_name: String,
    },
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Formatter-specific failure
    #[error("{0}")]
    Custom(String),
}

/// A message payload passed through an RPC call or stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A protocol message with a fully-qualified type name.
    Structured {
        /// Fully-qualified message type, e.g. `echo.v1.EchoRequest`
        type_name: String,
        /// Message fields, normally a JSON object
        fields: Value,
    },
    /// Any other value.
    Value(Value),
}

impl Message {
    /// Creates a structured message.
    pub fn structured(type_name: impl Into<String>, fields: impl Into<Value>) -> Self {
        Self::Structured {
            type_name: type_name.into(),
            fields: fields.into(),
        }
    }

    /// Serializes a value into a structured message.
    pub fn from_serialize<T: Serialize>(
        type_name: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::structured(type_name, serde_json::to_value(value)?))
    }

    /// Type name of a structured message.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Structured { type_name, .. } => Some(type_name),
            Self::Value(_) => None,
        }
    }

    /// The underlying JSON data.
    pub fn json(&self) -> &Value {
        match self {
            Self::Structured { fields, .. } => fields,
            Self::Value(value) => value,
        }
    }

    /// Length in bytes of the compact JSON encoding, computed without
    /// allocating the encoding.
    pub fn encoded_len(&self) -> usize {
        let mut counter = ByteCounter(0);
        match serde_json::to_writer(&mut counter, self.json()) {
            Ok(()) => counter.0,
            Err(_) => 0,
        }
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Turns a message into display text.
///
/// Returned text may span several lines; the logger indents each line. One
/// trailing newline is tolerated.
pub trait MessageFormatter: Send + Sync {
    /// Formats a message for display.
    fn format(&self, message: &Message) -> Result<String, FormatError>;
}

impl<F> MessageFormatter for F
where
    F: Fn(&Message) -> Result<String, FormatError> + Send + Sync,
{
    fn format(&self, message: &Message) -> Result<String, FormatError> {
        self(message)
    }
}

/// Protobuf-text style formatter.
///
/// Structured messages render one `field: value` line per field, nested
/// objects as `field {` blocks and arrays as repeated fields. Null fields are
/// treated as unset and omitted. Arbitrary values render as pretty JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl TextFormatter {
    const INDENT: &'static str = "  ";

    fn write_fields(
        out: &mut String,
        fields: &serde_json::Map<String, Value>,
        depth: usize,
    ) -> Result<(), FormatError> {
        for (name, value) in fields {
            Self::write_field(out, name, value, depth)?;
        }
        Ok(())
    }

    fn write_field(
        out: &mut String,
        name: &str,
        value: &Value,
        depth: usize,
    ) -> Result<(), FormatError> {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    Self::write_field(out, name, item, depth)?;
                }
            }
            Value::Object(map) => {
                Self::indent(out, depth);
                out.push_str(name);
                out.push_str(" {\n");
                Self::write_fields(out, map, depth + 1)?;
                Self::indent(out, depth);
                out.push_str("}\n");
            }
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                Self::indent(out, depth);
                out.push_str(name);
                out.push_str(": ");
                // serde_json quotes and escapes strings for us
                out.push_str(&serde_json::to_string(value)?);
                out.push('\n');
            }
        }
        Ok(())
    }

    fn indent(out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str(Self::INDENT);
        }
    }
}

impl MessageFormatter for TextFormatter {
    fn format(&self, message: &Message) -> Result<String, FormatError> {
        match message {
            Message::Structured { type_name, fields } => match fields {
                Value::Object(map) => {
                    let mut out = String::new();
                    Self::write_fields(&mut out, map, 0)?;
                    Ok(out)
                }
                _ => Err(FormatError::NotAMessage {
                    type_name: type_name.clone(),
                }),
            },
            Message::Value(value) => Ok(serde_json::to_string_pretty(value)?),
        }
    }
}

/// JSON formatter for all messages.
#[derive(Debug, Clone, Copy)]
pub struct JsonFormatter {
    /// Pretty-print over multiple lines
    pub multiline: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self { multiline: true }
    }
}

impl JsonFormatter {
    /// Single-line JSON output.
    pub fn compact() -> Self {
        Self { multiline: false }
    }
}

impl MessageFormatter for JsonFormatter {
    fn format(&self, message: &Message) -> Result<String, FormatError> {
        let text = if self.multiline {
            serde_json::to_string_pretty(message.json())?
        } else {
            serde_json::to_string(message.json())?
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_formatter_scalars() {
        let msg = Message::structured("echo.v1.EchoRequest", json!({"text": "hi"}));
        assert_eq!(TextFormatter.format(&msg).unwrap(), "text: \"hi\"\n");

        let msg = Message::structured("echo.v1.Counter", json!({"count": 2, "done": false}));
        let text = TextFormatter.format(&msg).unwrap();
        assert!(text.contains("count: 2\n"));
        assert!(text.contains("done: false\n"));
    }

    #[test]
    fn test_text_formatter_nested_and_repeated() {
        let msg = Message::structured("demo.v1.User", json!({"address": {"city": "Oslo"}}));
        assert_eq!(
            TextFormatter.format(&msg).unwrap(),
            "address {\n  city: \"Oslo\"\n}\n"
        );

        let msg = Message::structured("demo.v1.User", json!({"tags": ["a", "b"], "gone": null}));
        assert_eq!(TextFormatter.format(&msg).unwrap(), "tags: \"a\"\ntags: \"b\"\n");
    }

    #[test]
    fn test_text_formatter_rejects_non_object_message() {
        let msg = Message::structured("demo.v1.Broken", json!(42));
        let err = TextFormatter.format(&msg).unwrap_err();
        assert_eq!(err.to_string(), "demo.v1.Broken is not a structured message");
    }

    #[test]
    fn test_text_formatter_plain_value_is_json() {
        let msg = Message::from(json!([1, 2]));
        assert_eq!(TextFormatter.format(&msg).unwrap(), "[\n  1,\n  2\n]");
    }

    #[test]
    fn test_json_formatter_compact() {
        let msg = Message::structured("x.Y", json!({"a": 1}));
        assert_eq!(JsonFormatter::compact().format(&msg).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_closure_formatter() {
        let formatter = |_: &Message| -> Result<String, FormatError> { Ok("fixed".to_string()) };
        assert_eq!(formatter.format(&Message::from(json!(null))).unwrap(), "fixed");
    }

    #[test]
    fn test_encoded_len_matches_compact_json() {
        let msg = Message::structured("x.Y", json!({"text": "hi"}));
        assert_eq!(msg.encoded_len(), "{\"text\":\"hi\"}".len());
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Ping {
            seq: u32,
        }
        let msg = Message::from_serialize("demo.v1.Ping", &Ping { seq: 7 }).unwrap();
        assert_eq!(msg.type_name(), Some("demo.v1.Ping"));
        assert_eq!(msg.json(), &json!({"seq": 7}));
    }
}
