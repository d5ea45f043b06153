//! Request logging middleware

use crate::context::{handler, Handler};
use crate::StatusCode;
use std::time::Instant;

/// Log method, path, final status and latency of every request it wraps
pub fn logger() -> Handler {
    handler(|c| {
        let start = Instant::now();
        let method = c.method();
        let path = c.path().to_string();

        c.next();

        let code = c.status_code().unwrap_or(StatusCode::OK);
        let status = code.as_u16();
        let elapsed_us = start.elapsed().as_micros() as u64;
        if code.is_server_error() {
            tracing::error!(%method, %path, status, elapsed_us, "request completed");
        } else if code.is_client_error() {
            tracing::warn!(%method, %path, status, elapsed_us, "request completed");
        } else {
            tracing::info!(%method, %path, status, elapsed_us, "request completed");
        }
    })
}
