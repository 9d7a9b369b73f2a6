#![warn(missing_docs)]
//! # rpc-devlog
//!
//! Development-time logging interceptor for RPC frameworks.
//!
//! ## Overview
//!
//! Plug a [`Logger`] into the interceptor chain and every call that passes
//! through it is written to an output destination as a readable text record:
//! - **Unary calls**: request, response or error, and duration in one record
//! - **Streams**: a start record, one record per message, and totals at the end
//! - **Headers**: optional, sorted, with case-insensitive redaction
//! - **Errors**: code, metadata and detail payloads of structured errors
//! - **Live view**: [`LogBroadcaster`] fans records out to subscribers and SSE
//!
//! ## Architecture
//!
//! ```text
//!   caller ──► Logger::wrap_unary ──► next ──► handler
//!                 │  pooled buffer: timestamp, call line, headers, request
//!                 │  ... awaits next, no lock held ...
//!                 │  response or error block, duration
//!                 ▼
//!             SinkWriter (one locked write per record) ──► io::Write
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rpc_devlog::prelude::*;
//!
//! let echo = unary_fn(|req: UnaryRequest| async move {
//!     Ok(UnaryResponse { headers: Headers::new(), message: req.message })
//! });
//!
//! let logger = Logger::new(
//!     std::io::stderr(),
//!     LoggerConfig::new().with_headers(true).redact_header("authorization"),
//! )?;
//! let echo = chain_unary(&[Arc::new(logger)], echo);
//!
//! let request = UnaryRequest::new(
//!     "/echo.v1.EchoService/Echo",
//!     Peer::new("127.0.0.1:5123", "grpc"),
//!     Some(Message::structured("echo.v1.EchoRequest", json!({"text": "hi"}))),
//! );
//! echo(request).await?;
//! ```
//!
//! produces:
//!
//! ```text
//! [2024-05-01T10:00:00.000000000+00:00] /echo.v1.EchoService/Echo unary grpc 127.0.0.1:5123
//!   Request:
//!     text: "hi"
//!   Response:
//!     text: "hi"
//!   Completed in: 41.2µs
//! ```

mod error;
mod headers;
pub mod interceptor;
pub mod logging;
mod message;

#[cfg(test)]
mod tests;

// Public API
pub use error::{BoxError, Code, RpcError};
pub use headers::{HeaderEntry, Headers};
pub use interceptor::{
    Interceptor, Peer, Spec, StreamType, StreamingClientConn, StreamingClientFunc,
    StreamingHandlerConn, StreamingHandlerFunc, UnaryFunc, UnaryRequest, UnaryResponse,
    chain_streaming_client, chain_streaming_handler, chain_unary, handler_fn, unary_fn,
};
pub use logging::{
    CallContext, ConfigError, ContextExtractor, LogBroadcaster, Logger, LoggerConfig,
    MemoryWriter, RequestId, Subscription, serve_sse,
};
pub use message::{FormatError, JsonFormatter, Message, MessageFormatter, TextFormatter};

/// Prelude for convenient imports
///
/// ```rust,ignore
/// use rpc_devlog::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BoxError, Code, Headers, Interceptor, JsonFormatter, LogBroadcaster, Logger,
        LoggerConfig, MemoryWriter, Message, MessageFormatter, Peer, RpcError, Spec, StreamType,
        StreamingClientConn, StreamingHandlerConn, TextFormatter, UnaryFunc, UnaryRequest,
        UnaryResponse, chain_streaming_client, chain_streaming_handler, chain_unary, handler_fn,
        serve_sse, unary_fn,
    };
    pub use std::sync::Arc;
}
