//! Live fan-out of log records.
//!
//! [`LogBroadcaster`] is an output destination: hand it to
//! [`Logger::new`](super::Logger::new) and every record is copied to each
//! current [`Subscription`]. Delivery is best effort. A subscriber whose buffer
//! is full misses the record; the logger never waits for a slow reader.
//!
//! [`serve_sse`] streams one subscription as server-sent events.

use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::constants::DEFAULT_SUBSCRIBER_CAPACITY;

/// SSE comment frame used as a keep-alive.
pub const SSE_PING: &[u8] = b":\n\n";

struct BroadcastInner {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<Arc<str>>>>,
    next_id: AtomicU64,
    capacity: usize,
    dropped: AtomicU64,
}

impl BroadcastInner {
    fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Copies each written record to every subscriber.
#[derive(Clone)]
pub struct LogBroadcaster {
    inner: Arc<BroadcastInner>,
}

impl std::fmt::Debug for LogBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.inner.capacity)
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl LogBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` records per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BroadcastInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Registers a new subscriber. It receives records written from now on.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        tracing::debug!(subscriber = id, "Log subscriber added");
        Subscription {
            id,
            receiver: rx,
            broadcaster: Arc::downgrade(&self.inner),
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of per-subscriber deliveries skipped because a buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Delivers one record to every subscriber without waiting.
    pub fn publish(&self, record: &[u8]) {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subscribers.is_empty() {
            return;
        }

        let record: Arc<str> = Arc::from(String::from_utf8_lossy(record));
        subscribers.retain(|id, tx| match tx.try_send(Arc::clone(&record)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(subscriber = id, "Log subscriber lagging, record skipped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

impl Write for LogBroadcaster {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.publish(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Receiving end of a broadcaster registration; deregisters on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Arc<str>>,
    broadcaster: Weak<BroadcastInner>,
}

impl Subscription {
    /// Waits for the next record. Returns `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }

    /// Takes the next record if one is buffered.
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.broadcaster.upgrade() {
            inner.unsubscribe(self.id);
            tracing::debug!(subscriber = self.id, "Log subscriber removed");
        }
    }
}

/// Appends `record` to `out` as one SSE event, one `data:` line per line.
pub fn encode_sse_event(out: &mut Vec<u8>, record: &str) {
    let record = record.strip_suffix('\n').unwrap_or(record);
    for line in record.split('\n') {
        out.extend_from_slice(b"data: ");
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    out.push(b'\n');
}

/// Streams a subscription to `writer` as server-sent events.
///
/// A keep-alive ping is written after each `ping_interval` without a record.
/// Returns when `shutdown` completes, the broadcaster is dropped, or a write
/// fails.
///
/// # Errors
///
/// Returns the first write error.
pub async fn serve_sse<W, S>(
    mut subscription: Subscription,
    mut writer: W,
    ping_interval: Duration,
    shutdown: S,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let ping = tokio::time::sleep(ping_interval);
    tokio::pin!(ping);
    let mut frame = Vec::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            record = subscription.recv() => {
                let Some(record) = record else { break };
                frame.clear();
                encode_sse_event(&mut frame, &record);
                writer.write_all(&frame).await?;
                writer.flush().await?;
            }
            _ = &mut ping => {
                writer.write_all(SSE_PING).await?;
                writer.flush().await?;
            }
        }
        ping.as_mut().reset(tokio::time::Instant::now() + ping_interval);
    }
    Ok(())
}
