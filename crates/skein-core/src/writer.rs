//! Response sink
//!
//! Handlers write through [`ResponseWriter`] immediately; there is no layer
//! that collects several attempts and picks one. The writer follows
//! single-header-write transport semantics:
//!
//! - headers are mutable until the status line is written
//! - the first [`ResponseWriter::write_header`] wins, later calls are ignored
//! - [`ResponseWriter::write`] implicitly writes `200 OK` when no status was written
//!
//! Callers should use one status-determining write per request. Doing more
//! never corrupts the response, but only the first one counts.

use crate::response::{Headers, Response, StatusCode};
use bytes::BytesMut;

/// Write-once response sink for one request
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: Headers,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the status line has been written
    pub fn header_written(&self) -> bool {
        self.status.is_some()
    }

    /// The written status, if any
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Current value of a response header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing earlier values. Returns false once headers are sent.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) -> bool {
        if self.header_written() {
            tracing::debug!(header = name, "header set after status was written, ignored");
            return false;
        }
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        true
    }

    /// Append a header value (e.g. `set-cookie`). Returns false once headers are sent.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> bool {
        if self.header_written() {
            tracing::debug!(header = name, "header added after status was written, ignored");
            return false;
        }
        self.headers.push((name.to_string(), value.into()));
        true
    }

    /// Write the status line. Only the first call has any effect.
    pub fn write_header(&mut self, status: StatusCode) -> bool {
        if let Some(current) = self.status {
            tracing::warn!(
                current = current.as_u16(),
                ignored = status.as_u16(),
                "superfluous write_header call"
            );
            return false;
        }
        self.status = Some(status);
        true
    }

    /// Append body bytes, writing `200 OK` first if no status was written
    pub fn write(&mut self, data: &[u8]) -> usize {
        if !self.header_written() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
        data.len()
    }

    /// Number of body bytes written so far
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Finish the response. A writer that never wrote anything yields an empty 200.
    pub fn into_response(self) -> Response {
        Response {
            status: self.status.unwrap_or(StatusCode::OK),
            headers: self.headers,
            body: self.body.freeze(),
        }
    }
}
