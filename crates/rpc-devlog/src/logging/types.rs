//! Core types for the logging module.
//!
//! - RequestId: generated identifier for correlating the records of one call
//! - CallContext: everything the logger knows about a call while it runs

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::config::LoggerConfig;
use super::constants::SHORT_ID_LENGTH;
use crate::headers::Headers;
use crate::interceptor::{Peer, Spec, StreamType};

/// Unique identifier for a call, used when the caller supplied none.
///
/// Uses UUID v7 for time-ordered, sortable identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext)))
    }

    /// Returns the short form of the request ID (first N characters).
    pub fn short(&self) -> String {
        let full = self.0.to_string();
        full.chars().take(SHORT_ID_LENGTH).collect()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

/// Per-call state owned by one interceptor invocation.
///
/// Created on call or stream entry and dropped when it completes; never
/// shared between calls.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Full procedure name
    pub procedure: String,
    /// Shape of the call
    pub stream_type: StreamType,
    /// Remote side
    pub peer: Peer,
    /// Wall-clock time the call started
    pub started_at: DateTime<Local>,
    /// Optional correlation identifier
    pub correlation_id: Option<String>,
    /// Extracted context data, sorted by key
    pub context: Vec<(String, String)>,
    start: Instant,
}

impl CallContext {
    /// Creates a context that starts now.
    pub fn new(spec: &Spec, peer: &Peer) -> Self {
        Self {
            procedure: spec.procedure.clone(),
            stream_type: spec.stream_type,
            peer: peer.clone(),
            started_at: Local::now(),
            correlation_id: None,
            context: Vec::new(),
            start: Instant::now(),
        }
    }

    /// Creates a context and resolves its correlation identifier from the
    /// configured header, or generates one when enabled. Context data is
    /// extracted once, here.
    pub(crate) fn for_call(
        spec: &Spec,
        peer: &Peer,
        headers: &Headers,
        config: &LoggerConfig,
    ) -> Self {
        let supplied = config
            .correlation_header
            .as_deref()
            .and_then(|name| headers.get(name))
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let correlation_id = supplied.or_else(|| {
            config
                .generate_request_ids
                .then(|| RequestId::new().short())
        });
        let mut ctx = Self::new(spec, peer).with_correlation_id(correlation_id);
        if let Some(extractor) = &config.context_extractor {
            let mut context = extractor(&ctx, headers);
            context.sort_by(|a, b| a.0.cmp(&b.0));
            ctx.context = context;
        }
        ctx
    }

    /// Sets the correlation identifier.
    pub fn with_correlation_id(mut self, id: Option<String>) -> Self {
        self.correlation_id = id;
        self
    }

    /// Time since the call started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
