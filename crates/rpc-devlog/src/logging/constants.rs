//! Constants and default values for the logging module.
//!
//! This module centralizes the defaults used throughout the logger so they
//! can be adjusted in one place.

/// Default timestamp format (RFC 3339 with nanoseconds).
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f%:z";

/// Default replacement for redacted header and metadata values.
pub const DEFAULT_REDACTION_MARKER: &str = "[** REDACTED **]";

/// Initial capacity of a freshly allocated scratch buffer.
pub const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Default ceiling on the capacity of a buffer returned to the pool.
///
/// Buffers that grew past this while rendering an unusually large record are
/// dropped instead of being kept for reuse.
pub const DEFAULT_MAX_BUFFER_CAPACITY: usize = 64 * 1024;

/// Default maximum number of idle buffers kept by a pool.
pub const DEFAULT_MAX_POOLED_BUFFERS: usize = 64;

/// Length of the short request ID format (first N characters of UUID).
pub const SHORT_ID_LENGTH: usize = 8;

/// Placeholder rendered for an absent message.
pub const NONE_PLACEHOLDER: &str = "(none)";

/// Indentation of block titles inside a record.
pub(crate) const BLOCK_INDENT: &str = "\n  ";

/// Indentation of lines inside a block.
pub(crate) const LINE_INDENT: &str = "\n    ";

/// Default number of records buffered per broadcast subscriber.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 10;

/// Default idle time before an SSE keep-alive ping is sent.
pub const DEFAULT_PING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15);
