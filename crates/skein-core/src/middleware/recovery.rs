//! Panic recovery middleware

use crate::context::{handler, Handler};
use crate::StatusCode;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Turn a panic anywhere further down the chain into a 500 response
pub fn recovery() -> Handler {
    handler(|c| {
        let outcome = catch_unwind(AssertUnwindSafe(|| c.next()));
        if let Err(payload) = outcome {
            let reason = panic_message(payload.as_ref());
            tracing::error!(method = %c.method(), path = %c.path(), panic = %reason, "handler panicked");
            c.fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
