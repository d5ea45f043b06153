//! Built-in middleware
//!
//! Both are plain [`crate::Handler`]s and compose with user middleware through
//! [`crate::RouterGroup::use_middleware`].

pub mod logger;
pub mod recovery;

pub use logger::logger;
pub use recovery::recovery;
