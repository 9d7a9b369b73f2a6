//! Interception points exposed by the host RPC framework
//!
//! The framework owns the transport. It hands an interceptor the downstream
//! operation to wrap and gets back a wrapped operation with the same shape:
//!
//! - [`UnaryFunc`]: one request, one response
//! - [`StreamingHandlerFunc`]: server side of a stream, driven by a handler
//! - [`StreamingClientFunc`]: client side of a stream, returns a connection
//!
//! Interceptors compose in onion order; the first one in a chain sees the call
//! first and the result last.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

use crate::error::BoxError;
use crate::headers::Headers;
use crate::message::Message;

/// Shape of a call.
#[derive(Clone, Debug, PartialEq, Eq, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum StreamType {
    /// One request, one response
    Unary,
    /// Client sends many messages, server replies once
    Client,
    /// Client sends once, server replies with many messages
    Server,
    /// Both sides send many messages
    Bidi,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unary => write!(f, "unary"),
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
            Self::Bidi => write!(f, "bidi"),
        }
    }
}

/// Static description of the procedure being called.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    /// Full procedure name (e.g., "/echo.v1.EchoService/Echo")
    pub procedure: String,
    /// Shape of the call
    pub stream_type: StreamType,
}

impl Spec {
    /// Creates a spec.
    pub fn new(procedure: impl Into<String>, stream_type: StreamType) -> Self {
        Self {
            procedure: procedure.into(),
            stream_type,
        }
    }
}

/// The remote side of a call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Network address (e.g., "127.0.0.1:51234")
    pub addr: String,
    /// Wire protocol (e.g., "grpc", "connect", "grpcweb")
    pub protocol: String,
}

impl Peer {
    /// Creates a peer.
    pub fn new(addr: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            protocol: protocol.into(),
        }
    }
}

/// Request passed through a unary interceptor.
#[derive(Clone, Debug)]
pub struct UnaryRequest {
    /// Procedure description
    pub spec: Spec,
    /// Remote side
    pub peer: Peer,
    /// Request headers
    pub headers: Headers,
    /// Request payload, if any
    pub message: Option<Message>,
}

impl UnaryRequest {
    /// Creates a unary request with no headers.
    pub fn new(procedure: impl Into<String>, peer: Peer, message: Option<Message>) -> Self {
        Self {
            spec: Spec::new(procedure, StreamType::Unary),
            peer,
            headers: Headers::new(),
            message,
        }
    }

    /// Sets a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// Response produced by a unary call.
#[derive(Clone, Debug, Default)]
pub struct UnaryResponse {
    /// Response headers
    pub headers: Headers,
    /// Response payload, if any
    pub message: Option<Message>,
}

impl UnaryResponse {
    /// Creates a response carrying a message.
    pub fn new(message: Message) -> Self {
        Self {
            headers: Headers::new(),
            message: Some(message),
        }
    }
}

/// Downstream unary operation.
pub type UnaryFunc =
    Arc<dyn Fn(UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, BoxError>> + Send + Sync>;

/// Server side of a streaming call.
///
/// `receive` yields `Ok(None)` once the client has finished sending.
#[async_trait]
pub trait StreamingHandlerConn: Send + Sync {
    /// Procedure description.
    fn spec(&self) -> &Spec;
    /// Remote side.
    fn peer(&self) -> &Peer;
    /// Headers sent by the client.
    fn request_headers(&self) -> &Headers;
    /// Headers sent back to the client.
    fn response_headers(&self) -> Headers {
        Headers::new()
    }
    /// Sends one message to the client.
    async fn send(&self, message: &Message) -> Result<(), BoxError>;
    /// Receives the next message from the client.
    async fn receive(&self) -> Result<Option<Message>, BoxError>;
}

/// Downstream streaming handler.
pub type StreamingHandlerFunc = Arc<
    dyn Fn(Arc<dyn StreamingHandlerConn>) -> BoxFuture<'static, Result<(), BoxError>>
        + Send
        + Sync,
>;

/// Client side of a streaming call.
///
/// `receive` yields `Ok(None)` once the server has closed the stream.
#[async_trait]
pub trait StreamingClientConn: Send + Sync {
    /// Procedure description.
    fn spec(&self) -> &Spec;
    /// Remote side.
    fn peer(&self) -> &Peer;
    /// Headers sent to the server.
    fn request_headers(&self) -> &Headers;
    /// Headers received from the server.
    fn response_headers(&self) -> Headers {
        Headers::new()
    }
    /// Sends one message to the server.
    async fn send(&self, message: &Message) -> Result<(), BoxError>;
    /// Signals that no more messages will be sent.
    async fn close_request(&self) -> Result<(), BoxError>;
    /// Receives the next message from the server.
    async fn receive(&self) -> Result<Option<Message>, BoxError>;
    /// Releases the response side of the stream.
    async fn close_response(&self) -> Result<(), BoxError>;
}

/// Factory for client stream connections.
pub type StreamingClientFunc = Arc<dyn Fn(Spec) -> Arc<dyn StreamingClientConn> + Send + Sync>;

/// Wraps the framework's extension points.
///
/// Every method defaults to passing `next` through unchanged, so an
/// interceptor only overrides the shapes it cares about.
///
/// # Example
/// ```rust,ignore
/// struct Audit;
///
/// impl Interceptor for Audit {
///     fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
///         unary_fn(move |req| {
///             let next = next.clone();
///             async move {
///                 println!("-> {}", req.spec.procedure);
///                 next(req).await
///             }
///         })
///     }
/// }
/// ```
pub trait Interceptor: Send + Sync {
    /// Wraps a unary call.
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        next
    }

    /// Wraps a server-side streaming handler.
    fn wrap_streaming_handler(&self, next: StreamingHandlerFunc) -> StreamingHandlerFunc {
        next
    }

    /// Wraps a client-side stream factory.
    fn wrap_streaming_client(&self, next: StreamingClientFunc) -> StreamingClientFunc {
        next
    }
}

/// Create a [`UnaryFunc`] from an async function
///
/// # Example
/// ```rust,ignore
/// let echo = unary_fn(|req: UnaryRequest| async move {
///     Ok(UnaryResponse { headers: Headers::new(), message: req.message })
/// });
/// ```
pub fn unary_fn<F, Fut>(f: F) -> UnaryFunc
where
    F: Fn(UnaryRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<UnaryResponse, BoxError>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Create a [`StreamingHandlerFunc`] from an async function
pub fn handler_fn<F, Fut>(f: F) -> StreamingHandlerFunc
where
    F: Fn(Arc<dyn StreamingHandlerConn>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |conn| Box::pin(f(conn)))
}

/// Applies interceptors to a unary handler; the first interceptor is outermost.
pub fn chain_unary(interceptors: &[Arc<dyn Interceptor>], handler: UnaryFunc) -> UnaryFunc {
    interceptors
        .iter()
        .rev()
        .fold(handler, |next, interceptor| interceptor.wrap_unary(next))
}

/// Applies interceptors to a streaming handler; the first interceptor is outermost.
pub fn chain_streaming_handler(
    interceptors: &[Arc<dyn Interceptor>],
    handler: StreamingHandlerFunc,
) -> StreamingHandlerFunc {
    interceptors
        .iter()
        .rev()
        .fold(handler, |next, interceptor| {
            interceptor.wrap_streaming_handler(next)
        })
}

/// Applies interceptors to a client stream factory; the first interceptor is outermost.
pub fn chain_streaming_client(
    interceptors: &[Arc<dyn Interceptor>],
    client: StreamingClientFunc,
) -> StreamingClientFunc {
    interceptors
        .iter()
        .rev()
        .fold(client, |next, interceptor| {
            interceptor.wrap_streaming_client(next)
        })
}
