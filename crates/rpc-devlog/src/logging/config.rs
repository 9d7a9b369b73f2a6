//! Configuration for the call logger.
//!
//! [`LoggerConfig`] uses the builder pattern. It is moved into the logger by
//! [`Logger::new`](super::Logger::new), validated, and shared read-only by
//! every call from then on.

use chrono::format::{Item, StrftimeItems};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::constants::{
    DEFAULT_MAX_BUFFER_CAPACITY, DEFAULT_MAX_POOLED_BUFFERS, DEFAULT_REDACTION_MARKER,
    DEFAULT_TIME_FORMAT,
};
use super::types::CallContext;
use crate::headers::Headers;
use crate::message::{MessageFormatter, TextFormatter};

/// Supplies extra key/value pairs rendered in the `Context:` block of call
/// and end records. Receives the call context and the request headers.
pub type ContextExtractor = dyn Fn(&CallContext, &Headers) -> Vec<(String, String)> + Send + Sync;

/// Replaces the value of a redacted header or metadata entry.
pub type RedactFn = dyn Fn(&str) -> String + Send + Sync;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The timestamp format contains an unknown strftime specifier
    #[error("invalid time format: {0:?}")]
    InvalidTimeFormat(String),
    /// The redaction marker must not be empty
    #[error("redaction marker must not be empty")]
    EmptyRedactionMarker,
    /// The pool must be allowed to keep at least one idle buffer
    #[error("max_pooled_buffers must be greater than 0")]
    InvalidPoolSize,
}

/// Configuration for RPC call logging.
#[derive(Clone)]
pub struct LoggerConfig {
    /// strftime format for record timestamps; empty disables timestamps.
    pub time_format: String,
    /// Whether request/response headers are rendered.
    pub show_headers: bool,
    /// Header and metadata names whose values are redacted (case-insensitive).
    pub redacted_headers: HashSet<String>,
    /// Replacement rendered for redacted values.
    pub redaction_marker: String,
    /// Computes the replacement from the original value; takes precedence
    /// over `redaction_marker`.
    pub redact_fn: Option<Arc<RedactFn>>,
    /// Turns message payloads into display text.
    pub formatter: Arc<dyn MessageFormatter>,
    /// Buffers with more retained capacity than this are not pooled;
    /// `None` keeps every buffer.
    pub max_buffer_capacity: Option<usize>,
    /// Maximum number of idle buffers kept for reuse.
    pub max_pooled_buffers: usize,
    /// Request header that carries a caller-supplied correlation id.
    pub correlation_header: Option<String>,
    /// Generate a request id for calls without a caller-supplied one.
    pub generate_request_ids: bool,
    /// Per-call context data source.
    pub context_extractor: Option<Arc<ContextExtractor>>,
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("time_format", &self.time_format)
            .field("show_headers", &self.show_headers)
            .field("redacted_headers", &self.redacted_headers)
            .field("redaction_marker", &self.redaction_marker)
            .field("redact_fn", &self.redact_fn.as_ref().map(|_| "<fn>"))
            .field("formatter", &"<dyn MessageFormatter>")
            .field("max_buffer_capacity", &self.max_buffer_capacity)
            .field("max_pooled_buffers", &self.max_pooled_buffers)
            .field("correlation_header", &self.correlation_header)
            .field("generate_request_ids", &self.generate_request_ids)
            .field("context_extractor", &self.context_extractor.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            show_headers: false,
            redacted_headers: HashSet::new(),
            redaction_marker: DEFAULT_REDACTION_MARKER.to_string(),
            redact_fn: None,
            formatter: Arc::new(TextFormatter),
            max_buffer_capacity: Some(DEFAULT_MAX_BUFFER_CAPACITY),
            max_pooled_buffers: DEFAULT_MAX_POOLED_BUFFERS,
            correlation_header: None,
            generate_request_ids: false,
            context_extractor: None,
        }
    }
}

impl LoggerConfig {
    /// Creates a new logging configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the strftime format for timestamps. An empty string disables them.
    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }

    /// Disables timestamps.
    pub fn without_timestamps(mut self) -> Self {
        self.time_format.clear();
        self
    }

    /// Sets whether request/response headers are rendered.
    pub fn with_headers(mut self, show: bool) -> Self {
        self.show_headers = show;
        self
    }

    /// Adds a header name to the redaction set.
    pub fn redact_header(mut self, name: impl Into<String>) -> Self {
        self.redacted_headers.insert(name.into());
        self
    }

    /// Adds multiple header names to the redaction set.
    pub fn redact_headers(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for name in names {
            self.redacted_headers.insert(name.into());
        }
        self
    }

    /// Sets the replacement string for redacted values.
    pub fn with_redaction_marker(mut self, marker: impl Into<String>) -> Self {
        self.redaction_marker = marker.into();
        self
    }

    /// Computes redacted values with `redact` instead of the fixed marker.
    pub fn with_redact_fn(mut self, redact: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.redact_fn = Some(Arc::new(redact));
        self
    }

    /// Sets the message formatter.
    pub fn with_formatter(mut self, formatter: impl MessageFormatter + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Sets the capacity ceiling for pooled buffers.
    pub fn with_max_buffer_capacity(mut self, bytes: usize) -> Self {
        self.max_buffer_capacity = Some(bytes);
        self
    }

    /// Pools buffers regardless of their capacity.
    pub fn without_buffer_ceiling(mut self) -> Self {
        self.max_buffer_capacity = None;
        self
    }

    /// Sets how many idle buffers the pool may keep.
    pub fn with_max_pooled_buffers(mut self, count: usize) -> Self {
        self.max_pooled_buffers = count;
        self
    }

    /// Reads the correlation id of each call from this request header.
    pub fn with_correlation_header(mut self, name: impl Into<String>) -> Self {
        self.correlation_header = Some(name.into());
        self
    }

    /// Generates a short request id for calls that carry none.
    pub fn with_generated_request_ids(mut self, enabled: bool) -> Self {
        self.generate_request_ids = enabled;
        self
    }

    /// Renders the pairs returned by `extractor` in every call and end record.
    pub fn with_context_extractor(
        mut self,
        extractor: impl Fn(&CallContext, &Headers) -> Vec<(String, String)> + Send + Sync + 'static,
    ) -> Self {
        self.context_extractor = Some(Arc::new(extractor));
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if StrftimeItems::new(&self.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidTimeFormat(self.time_format.clone()));
        }
        if self.redaction_marker.is_empty() {
            return Err(ConfigError::EmptyRedactionMarker);
        }
        if self.max_pooled_buffers == 0 {
            return Err(ConfigError::InvalidPoolSize);
        }
        Ok(())
    }
}
