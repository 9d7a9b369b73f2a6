//! Streaming call logging.
//!
//! A stream produces a start record, one record per message, and an end record
//! with totals. The wrapped connections delegate every operation to the
//! connection they wrap and log around it.
//!
//! Each direction has its own lock, held across the underlying operation, the
//! counter increment and the record write. Sequence numbers in each direction
//! are therefore strictly increasing in output order, and a receive blocked on
//! the peer never stalls a concurrent send.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

use super::format::{self, Direction};
use super::logger::LoggerInner;
use super::types::CallContext;
use crate::error::BoxError;
use crate::headers::Headers;
use crate::interceptor::{
    Peer, Spec, StreamingClientConn, StreamingClientFunc, StreamingHandlerConn,
    StreamingHandlerFunc, handler_fn,
};
use crate::message::Message;

// =============================================================================
// Per-stream state
// =============================================================================

/// Error reported by an end record.
enum EndError<'a> {
    /// The stream completed without a terminal error.
    None,
    /// The error the stream terminated with.
    Terminal(&'a (dyn StdError + 'static)),
    /// Repeats the most recent failed operation, if there was one.
    LastFailure,
}

/// Counters and locks for one stream.
struct StreamLog {
    logger: Arc<LoggerInner>,
    ctx: CallContext,
    sent: AtomicU64,
    received: AtomicU64,
    send_lock: AsyncMutex<()>,
    receive_lock: AsyncMutex<()>,
    /// Rendered error block of the most recent failed operation.
    last_error: Mutex<Option<String>>,
}

impl StreamLog {
    fn new(logger: Arc<LoggerInner>, ctx: CallContext) -> Self {
        Self {
            logger,
            ctx,
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            send_lock: AsyncMutex::new(()),
            receive_lock: AsyncMutex::new(()),
            last_error: Mutex::new(None),
        }
    }

    fn log_started(&self, request_headers: &Headers) {
        tracing::debug!(
            procedure = %self.ctx.procedure,
            stream_type = %self.ctx.stream_type,
            "Stream started"
        );
        let mut record = self.logger.pool.acquire();
        self.logger.write_call_header(&mut record, &self.ctx, request_headers);
        record.push_str("\n  Stream started\n");
        self.logger.emit(&record);
    }

    async fn send<F>(&self, message: &Message, send: F) -> Result<(), BoxError>
    where
        F: Future<Output = Result<(), BoxError>>,
    {
        let _guard = self.send_lock.lock().await;
        let result = send.await;

        let mut record = self.logger.pool.acquire();
        self.logger.write_event_prefix(&mut record, &self.ctx);
        match &result {
            Ok(()) => {
                let sequence = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
                format::write_stream_message(
                    &mut record,
                    Direction::Sent,
                    sequence,
                    message,
                    self.logger.formatter(),
                );
            }
            Err(err) => self.write_failure(&mut record, "Send error", &**err),
        }
        record.push('\n');
        self.logger.emit(&record);
        result
    }

    async fn receive<F>(&self, receive: F) -> Result<Option<Message>, BoxError>
    where
        F: Future<Output = Result<Option<Message>, BoxError>>,
    {
        let _guard = self.receive_lock.lock().await;
        let result = receive.await;

        let mut record = self.logger.pool.acquire();
        self.logger.write_event_prefix(&mut record, &self.ctx);
        match &result {
            Ok(Some(message)) => {
                let sequence = self.received.fetch_add(1, Ordering::SeqCst) + 1;
                format::write_stream_message(
                    &mut record,
                    Direction::Received,
                    sequence,
                    message,
                    self.logger.formatter(),
                );
            }
            Ok(None) => format::write_stream_closed(&mut record),
            Err(err) => self.write_failure(&mut record, "Receive error", &**err),
        }
        record.push('\n');
        self.logger.emit(&record);
        result
    }

    /// Logs a failed close operation as its own record.
    fn log_close_failure(&self, label: &str, err: &(dyn StdError + 'static)) {
        let mut record = self.logger.pool.acquire();
        self.logger.write_event_prefix(&mut record, &self.ctx);
        self.write_failure(&mut record, label, err);
        record.push('\n');
        self.logger.emit(&record);
    }

    fn write_failure(&self, buf: &mut String, label: &str, err: &(dyn StdError + 'static)) {
        buf.push_str(label);
        let start = buf.len();
        self.logger.write_error(buf, err);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(buf[start..].to_string());
    }

    /// Emits the end record.
    fn log_ended(&self, outcome: EndError<'_>, response_headers: &Headers) {
        let sent = self.sent.load(Ordering::SeqCst);
        let received = self.received.load(Ordering::SeqCst);
        let elapsed = self.ctx.elapsed();
        tracing::debug!(
            procedure = %self.ctx.procedure,
            sent,
            received,
            elapsed_ms = elapsed.as_millis() as u64,
            failed = matches!(outcome, EndError::Terminal(_)),
            "Stream ended"
        );

        let mut record = self.logger.pool.acquire();
        self.logger.write_event_prefix(&mut record, &self.ctx);
        record.push_str("Stream finished");
        format::write_context(&mut record, &self.ctx.context);
        self.logger.write_response_headers(&mut record, response_headers);
        match outcome {
            EndError::Terminal(err) => self.logger.write_error(&mut record, err),
            EndError::LastFailure => {
                let last = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(block) = last.as_deref() {
                    record.push_str(block);
                }
            }
            EndError::None => {}
        }
        format::write_stream_totals(&mut record, elapsed, sent, received);
        record.push('\n');
        self.logger.emit(&record);
    }
}

// =============================================================================
// Handler side
// =============================================================================

pub(crate) fn wrap_handler(logger: Arc<LoggerInner>, next: StreamingHandlerFunc) -> StreamingHandlerFunc {
    handler_fn(move |conn: Arc<dyn StreamingHandlerConn>| {
        let logger = Arc::clone(&logger);
        let next = Arc::clone(&next);
        async move {
            let ctx = CallContext::for_call(
                conn.spec(),
                conn.peer(),
                conn.request_headers(),
                &logger.config,
            );
            let log = Arc::new(StreamLog::new(logger, ctx));
            log.log_started(conn.request_headers());

            let wrapped: Arc<dyn StreamingHandlerConn> = Arc::new(LoggingHandlerConn {
                inner: Arc::clone(&conn),
                log: Arc::clone(&log),
            });
            let result = next(wrapped).await;

            let outcome = match &result {
                Ok(()) => EndError::None,
                Err(err) => EndError::Terminal(&**err),
            };
            log.log_ended(outcome, &conn.response_headers());
            result
        }
    })
}

/// Server-side connection that logs every message it carries.
struct LoggingHandlerConn {
    inner: Arc<dyn StreamingHandlerConn>,
    log: Arc<StreamLog>,
}

#[async_trait]
impl StreamingHandlerConn for LoggingHandlerConn {
    fn spec(&self) -> &Spec {
        self.inner.spec()
    }

    fn peer(&self) -> &Peer {
        self.inner.peer()
    }

    fn request_headers(&self) -> &Headers {
        self.inner.request_headers()
    }

    fn response_headers(&self) -> Headers {
        self.inner.response_headers()
    }

    async fn send(&self, message: &Message) -> Result<(), BoxError> {
        self.log.send(message, self.inner.send(message)).await
    }

    async fn receive(&self) -> Result<Option<Message>, BoxError> {
        self.log.receive(self.inner.receive()).await
    }
}

// =============================================================================
// Client side
// =============================================================================

pub(crate) fn wrap_client(logger: Arc<LoggerInner>, next: StreamingClientFunc) -> StreamingClientFunc {
    Arc::new(move |spec: Spec| {
        let conn = next(spec);
        let ctx = CallContext::for_call(
            conn.spec(),
            conn.peer(),
            conn.request_headers(),
            &logger.config,
        );
        let log = StreamLog::new(Arc::clone(&logger), ctx);
        log.log_started(conn.request_headers());

        Arc::new(LoggingClientConn {
            inner: conn,
            log,
            ended: AtomicBool::new(false),
        }) as Arc<dyn StreamingClientConn>
    })
}

/// Client-side connection that logs every message it carries.
///
/// The end record is written once, by `close_response` or on drop. Without a
/// terminal error it repeats the last failed operation.
struct LoggingClientConn {
    inner: Arc<dyn StreamingClientConn>,
    log: StreamLog,
    ended: AtomicBool,
}

impl LoggingClientConn {
    fn finish(&self, err: Option<&(dyn StdError + 'static)>) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            let outcome = err.map_or(EndError::LastFailure, EndError::Terminal);
            self.log.log_ended(outcome, &self.inner.response_headers());
        }
    }
}

#[async_trait]
impl StreamingClientConn for LoggingClientConn {
    fn spec(&self) -> &Spec {
        self.inner.spec()
    }

    fn peer(&self) -> &Peer {
        self.inner.peer()
    }

    fn request_headers(&self) -> &Headers {
        self.inner.request_headers()
    }

    fn response_headers(&self) -> Headers {
        self.inner.response_headers()
    }

    async fn send(&self, message: &Message) -> Result<(), BoxError> {
        self.log.send(message, self.inner.send(message)).await
    }

    async fn close_request(&self) -> Result<(), BoxError> {
        let result = self.inner.close_request().await;
        if let Err(err) = &result {
            self.log.log_close_failure("Close request error", &**err);
        }
        result
    }

    async fn receive(&self) -> Result<Option<Message>, BoxError> {
        self.log.receive(self.inner.receive()).await
    }

    async fn close_response(&self) -> Result<(), BoxError> {
        let result = self.inner.close_response().await;
        match &result {
            Ok(()) => self.finish(None),
            Err(err) => {
                self.log.log_close_failure("Close response error", &**err);
                self.finish(Some(&**err));
            }
        }
        result
    }
}

impl Drop for LoggingClientConn {
    fn drop(&mut self) {
        self.finish(None);
    }
}
