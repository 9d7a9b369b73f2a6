//! Header and metadata redaction.
//!
//! Names are lowercased once when the logger is built, so each lookup costs a
//! single lowercase conversion of the header name.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::config::{LoggerConfig, RedactFn};

/// Case-insensitive set of header names whose values must not be logged.
#[derive(Clone, Default)]
pub struct Redactor {
    names_lower: HashSet<String>,
    marker: String,
    redact_fn: Option<Arc<RedactFn>>,
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor")
            .field("names_lower", &self.names_lower)
            .field("marker", &self.marker)
            .field("redact_fn", &self.redact_fn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Redactor {
    /// Creates a redactor from configuration.
    pub fn new(config: &LoggerConfig) -> Self {
        let mut redactor = Self::from_names(
            config.redacted_headers.iter().map(String::as_str),
            &config.redaction_marker,
        );
        redactor.redact_fn = config.redact_fn.clone();
        redactor
    }

    /// Creates a redactor from a list of names and a marker.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>, marker: &str) -> Self {
        Self {
            names_lower: names.into_iter().map(str::to_ascii_lowercase).collect(),
            marker: marker.to_string(),
            redact_fn: None,
        }
    }

    /// Returns true if values of this header are redacted.
    pub fn is_redacted(&self, name: &str) -> bool {
        !self.names_lower.is_empty() && self.names_lower.contains(&name.to_ascii_lowercase())
    }

    /// Replacement rendered for redacted values.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Replacement for a redacted entry with the given values, joined by
    /// `", "` before being passed to a custom redaction function.
    pub fn redact(&self, values: &[String]) -> Cow<'_, str> {
        match &self.redact_fn {
            Some(redact) => Cow::Owned(redact(&values.join(", "))),
            None => Cow::Borrowed(&self.marker),
        }
    }
}
