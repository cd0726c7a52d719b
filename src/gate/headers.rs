//! Framework-independent view of request headers.
//!
//! The gate never touches a framework's header collection directly. Adapters
//! convert whatever representation their transport uses into an ordered
//! sequence of `(name, value)` pairs, and the gate reads it through the
//! [`HeaderSource`] capability. This keeps `evaluate` pure and identical
//! across deployment shapes.

use std::fmt;

/// Ordered, case-insensitive read access to request headers.
pub trait HeaderSource {
    /// The `(name, value)` pairs in the order they were received.
    fn entries(&self) -> &[(String, String)];

    /// First value whose name matches case-insensitively.
    fn get(&self, name: &str) -> Option<&str> {
        self.entries()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Owned header snapshot used by both adapters.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    /// Build from explicit pairs. Order is preserved.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    /// Snapshot an `http::HeaderMap`.
    ///
    /// A header value that is not valid UTF-8 is an internal validation
    /// failure: the adapters surface it as a 500 rather than silently
    /// dropping the header and mis-evaluating the request.
    pub fn from_header_map(map: &http::HeaderMap) -> Result<Self, HeaderError> {
        let mut entries = Vec::with_capacity(map.len());
        for (name, value) in map {
            let value = value
                .to_str()
                .map_err(|_| HeaderError::InvalidValue(name.as_str().to_string()))?;
            entries.push((name.as_str().to_string(), value.to_string()));
        }
        Ok(Self { entries })
    }
}

impl HeaderSource for RequestHeaders {
    fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

/// Errors while snapshotting headers from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Header value was not valid UTF-8.
    InvalidValue(String),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue(name) => write!(f, "Invalid value for header `{}`", name),
        }
    }
}

impl std::error::Error for HeaderError {}
