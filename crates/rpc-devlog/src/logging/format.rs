//! Record rendering.
//!
//! Every function here appends to the end of a caller-supplied buffer and does
//! nothing else: no I/O, no locking, no framework calls. A record looks like:
//!
//! ```text
//! [2024-05-01T10:00:00.000000000+00:00] /echo.v1.EchoService/Echo unary grpc 10.0.0.7:5123
//!   Headers:
//!     authorization: [** REDACTED **]
//!   Request:
//!     text: "hi"
//!   Response:
//!     text: "hi"
//!   Completed in: 1.2ms
//! ```

use chrono::{DateTime, Local};
use std::error::Error as StdError;
use std::fmt::{self, Write};
use std::time::Duration;

use super::constants::{BLOCK_INDENT, LINE_INDENT, NONE_PLACEHOLDER};
use super::redaction::Redactor;
use super::types::CallContext;
use crate::error::RpcError;
use crate::headers::Headers;
use crate::message::{Message, MessageFormatter};

/// Direction of a stream message relative to the local side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent to the peer
    Sent,
    /// Received from the peer
    Received,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => f.write_str("Sent"),
            Self::Received => f.write_str("Received"),
        }
    }
}

/// Appends `"[<time>] "`; does nothing when `format` is empty.
pub fn write_timestamp(buf: &mut String, time: &DateTime<Local>, format: &str) {
    if format.is_empty() {
        return;
    }
    let start = buf.len();
    buf.push('[');
    if write!(buf, "{}", time.format(format)).is_err() {
        buf.truncate(start);
        return;
    }
    buf.push_str("] ");
}

/// Appends `procedure stream-type protocol addr` and the correlation id line.
pub fn write_call_line(buf: &mut String, ctx: &CallContext) {
    buf.push_str(&ctx.procedure);
    let _ = write!(buf, " {}", ctx.stream_type);
    for part in [&ctx.peer.protocol, &ctx.peer.addr] {
        if !part.is_empty() {
            buf.push(' ');
            buf.push_str(part);
        }
    }
    if let Some(id) = &ctx.correlation_id {
        buf.push_str(BLOCK_INDENT);
        buf.push_str("Request-ID: ");
        buf.push_str(id);
    }
}

/// Appends a titled header block; empty header sets render nothing.
///
/// Names are sorted case-insensitively. Redacted names show the marker
/// instead of their values, however many values they have.
pub fn write_headers(buf: &mut String, title: &str, headers: &Headers, redactor: &Redactor) {
    if headers.is_empty() {
        return;
    }
    buf.push_str(BLOCK_INDENT);
    buf.push_str(title);
    buf.push(':');
    for entry in headers.sorted() {
        buf.push_str(LINE_INDENT);
        buf.push_str(&entry.name);
        buf.push_str(": ");
        if redactor.is_redacted(&entry.name) {
            buf.push_str(&redactor.redact(&entry.values));
            continue;
        }
        for (i, value) in entry.values.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            buf.push_str(value);
        }
    }
}

/// Appends the `Context:` block; writes nothing for empty context data.
pub fn write_context(buf: &mut String, context: &[(String, String)]) {
    if context.is_empty() {
        return;
    }
    buf.push_str(BLOCK_INDENT);
    buf.push_str("Context:");
    for (key, value) in context {
        buf.push_str(LINE_INDENT);
        buf.push_str(key);
        buf.push_str(": ");
        buf.push_str(value);
    }
}

/// Appends a message body, one indented line per line of formatted text.
///
/// An absent message renders as `(none)`. A formatter failure renders a
/// bracketed diagnostic in place of the body; the record is never aborted.
pub fn write_message(buf: &mut String, message: Option<&Message>, formatter: &dyn MessageFormatter) {
    let Some(message) = message else {
        buf.push_str(LINE_INDENT);
        buf.push_str(NONE_PLACEHOLDER);
        return;
    };

    match formatter.format(message) {
        Ok(text) => write_indented(buf, &text),
        Err(e) => {
            tracing::warn!(
                error = %e,
                message_type = message.type_name().unwrap_or("-"),
                "Failed to format message for logging"
            );
            buf.push_str(LINE_INDENT);
            let _ = write!(buf, "[cannot format message: {e}]");
        }
    }
}

fn write_indented(buf: &mut String, text: &str) {
    let text = text.strip_suffix('\n').unwrap_or(text);
    for line in text.split('\n') {
        if line.is_empty() {
            tracing::warn!(formatted = %text, "Empty line in formatted message");
            continue;
        }
        buf.push_str(LINE_INDENT);
        buf.push_str(line);
    }
}

/// Appends an error block.
///
/// Structured RPC errors (found anywhere in the `source()` chain) also render
/// their code, metadata and detail payloads.
pub fn write_error(
    buf: &mut String,
    err: &(dyn StdError + 'static),
    redactor: &Redactor,
    formatter: &dyn MessageFormatter,
) {
    buf.push_str(BLOCK_INDENT);
    let _ = write!(buf, "Error: {err}");

    let Some(rpc) = RpcError::find_in(err) else {
        return;
    };
    buf.push_str(BLOCK_INDENT);
    let _ = write!(buf, "Code: {}", rpc.code);
    write_headers(buf, "Metadata", &rpc.metadata, redactor);
    for detail in &rpc.details {
        buf.push_str(BLOCK_INDENT);
        buf.push_str("Detail: ");
        buf.push_str(detail.type_name().unwrap_or("value"));
        write_message(buf, Some(detail), formatter);
    }
}

/// Appends a labelled block followed by a message body.
pub fn write_message_block(
    buf: &mut String,
    label: &str,
    message: Option<&Message>,
    formatter: &dyn MessageFormatter,
) {
    buf.push_str(BLOCK_INDENT);
    buf.push_str(label);
    buf.push(':');
    write_message(buf, message, formatter);
}

/// Appends `label: <elapsed>`.
pub fn write_duration(buf: &mut String, label: &str, elapsed: Duration) {
    buf.push_str(BLOCK_INDENT);
    let _ = write!(buf, "{label}: {elapsed:?}");
}

/// Appends the header line of a stream message record.
pub fn write_stream_message(
    buf: &mut String,
    direction: Direction,
    sequence: u64,
    message: &Message,
    formatter: &dyn MessageFormatter,
) {
    let _ = write!(
        buf,
        "{direction} message #{sequence} ({} bytes):",
        message.encoded_len()
    );
    write_message(buf, Some(message), formatter);
}

/// Appends the informational end-of-stream line.
pub fn write_stream_closed(buf: &mut String) {
    buf.push_str("Stream closed by peer");
}

/// Appends the stream totals line.
pub fn write_stream_totals(buf: &mut String, elapsed: Duration, sent: u64, received: u64) {
    buf.push_str(BLOCK_INDENT);
    let _ = write!(
        buf,
        "Stream ended in {elapsed:?} (sent: {sent}, received: {received})"
    );
}
