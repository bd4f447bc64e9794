//! Minimal HTTP/1.1 GET requests written verbatim over an AT socket.
//!
//! The module never parses full responses: success is detected by finding
//! the status line and checking it for `200`.

/// Marker identifying the status line of a response.
pub const STATUS_LINE: &str = "HTTP/1.1";

/// Status code that counts as success.
pub const STATUS_OK: &str = "200";

/// A GET request under construction.
///
/// Query values are appended exactly as given; callers percent-encode user
/// text with [`espat_core::urlencode::encode`] first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpGet {
    target: String,
    has_query: bool,
    host: Option<String>,
}

impl HttpGet {
    /// Start a request for `path` (which may already carry a query string).
    pub fn new(path: impl Into<String>) -> Self {
        let target = path.into();
        let has_query = target.contains('?');
        Self {
            target,
            has_query,
            host: None,
        }
    }

    /// Append `key=value` to the query string.
    pub fn query(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.push_separator();
        self.target.push_str(key);
        self.target.push('=');
        self.target.push_str(&value.to_string());
        self
    }

    /// Append a bare `key` with no value to the query string.
    pub fn query_flag(mut self, key: &str) -> Self {
        self.push_separator();
        self.target.push_str(key);
        self
    }

    /// Add a `Host:` header for name-based virtual hosting.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Request target (path and query).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Render the request line and headers, each terminated by `\r\n`.
    ///
    /// The blank line ending the header block is not included; the link adds
    /// a final `\r\n` when the payload is written.
    pub fn to_wire(&self) -> String {
        let mut wire = format!("GET {} HTTP/1.1\r\n", self.target);
        if let Some(host) = &self.host {
            wire.push_str("Host: ");
            wire.push_str(host);
            wire.push_str("\r\n");
        }
        wire
    }

    fn push_separator(&mut self) {
        self.target.push(if self.has_query { '&' } else { '?' });
        self.has_query = true;
    }
}

/// Check if a line is an HTTP status line reporting success.
///
/// Only the code after the version counts; the `+IPD,<len>:` prefix the
/// module puts in front may contain anything.
pub fn is_success_status(line: &str) -> bool {
    line.split_once(STATUS_LINE)
        .map_or(false, |(_, rest)| rest.trim_start().starts_with(STATUS_OK))
}
