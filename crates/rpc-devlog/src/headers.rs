//! Multi-valued request/response headers and error metadata.

use serde::{Deserialize, Serialize};

/// A single header name with all of its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Name as first inserted
    pub name: String,
    /// Values in insertion order
    pub values: Vec<String>,
}

/// Header map with case-insensitive names.
///
/// The spelling of the first insertion of a name is kept for display. Lookups
/// and merges ignore ASCII case, matching how HTTP and gRPC treat header names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, merging with an existing entry of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].values.push(value),
            None => self.entries.push(HeaderEntry {
                name,
                values: vec![value],
            }),
        }
    }

    /// Replaces all values of a header with a single value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].values = vec![value],
            None => self.entries.push(HeaderEntry {
                name,
                values: vec![value],
            }),
        }
    }

    /// Builder-style [`Headers::append`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// Returns the first value of a header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Returns every value of a header.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|idx| self.entries[idx].values.as_slice())
            .unwrap_or(&[])
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no headers are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    /// Entries sorted case-insensitively by name, ties broken by spelling.
    pub fn sorted(&self) -> Vec<&HeaderEntry> {
        let mut sorted: Vec<&HeaderEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            a.name
                .to_ascii_lowercase()
                .cmp(&b.name.to_ascii_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        sorted
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_merges_case_insensitively() {
        let mut headers = Headers::new();
        headers.append("Accept", "text/plain");
        headers.append("accept", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_all("ACCEPT"), ["text/plain", "application/json"]);
        assert_eq!(headers.iter().next().unwrap().name, "Accept");
    }

    #[test]
    fn test_insert_replaces() {
        let mut headers = Headers::new().with("x-id", "1").with("x-id", "2");
        headers.insert("X-Id", "3");
        assert_eq!(headers.get_all("x-id"), ["3"]);
    }

    #[test]
    fn test_sorted_ignores_case() {
        let headers: Headers = [("b", "1"), ("A", "2"), ("c", "3")].into_iter().collect();
        let names: Vec<&str> = headers.sorted().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["A", "b", "c"]);
    }

    #[test]
    fn test_missing_header() {
        let headers = Headers::new();
        assert!(headers.get("missing").is_none());
        assert!(headers.get_all("missing").is_empty());
    }
}
