//! The call logger.
//!
//! [`Logger`] owns everything shared by the calls it observes: the frozen
//! configuration, the redaction set, the buffer pool and the output sink.
//! Cloning it is cheap; all clones write to the same destination.

use chrono::Local;
use std::error::Error as StdError;
use std::io::Write;
use std::sync::Arc;

use super::config::{ConfigError, LoggerConfig};
use super::format;
use super::pool::BufferPool;
use super::redaction::Redactor;
use super::sink::SinkWriter;
use super::types::CallContext;
use super::{stream, unary};
use crate::headers::Headers;
use crate::interceptor::{Interceptor, StreamingClientFunc, StreamingHandlerFunc, UnaryFunc};
use crate::message::MessageFormatter;

/// Development-time logging interceptor for RPC calls.
///
/// # Example
///
/// ```rust,ignore
/// use rpc_devlog::prelude::*;
///
/// let logger = Logger::new(
///     std::io::stderr(),
///     LoggerConfig::new().with_headers(true).redact_header("authorization"),
/// )?;
/// let handler = chain_unary(&[Arc::new(logger)], handler);
/// ```
#[derive(Debug, Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

/// State shared by every call a logger observes.
#[derive(Debug)]
pub(crate) struct LoggerInner {
    pub(crate) config: LoggerConfig,
    pub(crate) redactor: Redactor,
    pub(crate) pool: BufferPool,
    sink: SinkWriter,
}

impl Logger {
    /// Creates a logger writing complete records to `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(output: impl Write + Send + 'static, config: LoggerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(LoggerInner {
                redactor: Redactor::new(&config),
                pool: BufferPool::from_config(&config),
                sink: SinkWriter::new(output),
                config,
            }),
        })
    }

    /// Creates a logger with default configuration.
    pub fn with_defaults(output: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                redactor: Redactor::default(),
                pool: BufferPool::from_config(&LoggerConfig::default()),
                sink: SinkWriter::new(output),
                config: LoggerConfig::default(),
            }),
        }
    }

    /// The configuration this logger was built with.
    pub fn config(&self) -> &LoggerConfig {
        &self.inner.config
    }

    /// The scratch-buffer pool.
    pub fn pool(&self) -> &BufferPool {
        &self.inner.pool
    }
}

impl Interceptor for Logger {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        unary::wrap(Arc::clone(&self.inner), next)
    }

    fn wrap_streaming_handler(&self, next: StreamingHandlerFunc) -> StreamingHandlerFunc {
        stream::wrap_handler(Arc::clone(&self.inner), next)
    }

    fn wrap_streaming_client(&self, next: StreamingClientFunc) -> StreamingClientFunc {
        stream::wrap_client(Arc::clone(&self.inner), next)
    }
}

impl LoggerInner {
    pub(crate) fn formatter(&self) -> &dyn MessageFormatter {
        self.config.formatter.as_ref()
    }

    /// Timestamp of the call start, call line, context data and (if enabled)
    /// request headers.
    pub(crate) fn write_call_header(&self, buf: &mut String, ctx: &CallContext, headers: &Headers) {
        format::write_timestamp(buf, &ctx.started_at, &self.config.time_format);
        format::write_call_line(buf, ctx);
        format::write_context(buf, &ctx.context);
        if self.config.show_headers {
            format::write_headers(buf, "Headers", headers, &self.redactor);
        }
    }

    /// Current timestamp and procedure, the prefix of every event record.
    pub(crate) fn write_event_prefix(&self, buf: &mut String, ctx: &CallContext) {
        format::write_timestamp(buf, &Local::now(), &self.config.time_format);
        buf.push_str(&ctx.procedure);
        if let Some(id) = &ctx.correlation_id {
            buf.push_str(" (");
            buf.push_str(id);
            buf.push(')');
        }
        buf.push(' ');
    }

    pub(crate) fn write_response_headers(&self, buf: &mut String, headers: &Headers) {
        if self.config.show_headers {
            format::write_headers(buf, "Response headers", headers, &self.redactor);
        }
    }

    pub(crate) fn write_error(&self, buf: &mut String, err: &(dyn StdError + 'static)) {
        format::write_error(buf, err, &self.redactor, self.formatter());
    }

    /// Writes one complete record. Failures are reported, never returned.
    pub(crate) fn emit(&self, record: &str) {
        if let Err(e) = self.sink.write(record.as_bytes()) {
            tracing::warn!(error = %e, bytes = record.len(), "Failed to write log record");
        }
    }
}
