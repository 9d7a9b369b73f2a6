//! Human-readable RPC call logging
//!
//! Renders every call that passes through the interceptor chain as a compact,
//! multi-line text record: procedure, peer, headers, payloads, errors and
//! timing. Built for development, where reading a log should be enough to see
//! what the client and the server said to each other.
//!
//! # Architecture
//!
//! - **types**: Per-call context and generated request ids
//! - **config**: [`LoggerConfig`] with builder pattern and validation
//! - **constants**: Defaults used throughout the module
//! - **redaction**: Case-insensitive header redaction
//! - **pool**: Scratch-buffer pool for record construction
//! - **format**: Pure rendering functions for each part of a record
//! - **sink**: Serialized writes to the output destination
//! - **logger**: [`Logger`], the interceptor itself
//! - **broadcast**: Live fan-out of records to subscribers and SSE
//!
//! # Guarantees
//!
//! - Each record is built privately and written with one write under the
//!   sink lock, so records of concurrent calls never interleave.
//! - Logging never changes a call's result. Formatter and sink failures are
//!   reported through `tracing` and otherwise ignored.
//! - Redacted header and error-metadata values never reach the output.
//!
//! # Basic Usage
//!
//! ```rust,ignore
//! use rpc_devlog::prelude::*;
//!
//! let config = LoggerConfig::new()
//!     .with_headers(true)
//!     .redact_headers(["authorization", "cookie"])
//!     .with_correlation_header("x-request-id");
//!
//! let logger = Logger::new(std::io::stderr(), config)?;
//! let handler = chain_unary(&[Arc::new(logger)], handler);
//! ```
//!
//! ## Streaming records to a browser
//!
//! ```rust,ignore
//! let broadcaster = LogBroadcaster::default();
//! let logger = Logger::new(broadcaster.clone(), LoggerConfig::new())?;
//!
//! // per connected client
//! serve_sse(broadcaster.subscribe(), socket, DEFAULT_PING_INTERVAL, closed).await?;
//! ```

pub mod broadcast;
pub mod config;
pub mod constants;
pub mod format;
pub mod logger;
pub mod pool;
pub mod redaction;
pub mod sink;
mod stream;
pub mod types;
mod unary;

pub use broadcast::{LogBroadcaster, Subscription, serve_sse};
pub use config::{ConfigError, ContextExtractor, LoggerConfig, RedactFn};
pub use constants::*;
pub use logger::Logger;
pub use pool::{BufferPool, PooledBuffer};
pub use redaction::Redactor;
pub use sink::{MemoryWriter, SinkWriter};
pub use types::{CallContext, RequestId};
