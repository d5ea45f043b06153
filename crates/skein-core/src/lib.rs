//! skein-core: Embeddable HTTP request dispatch
//!
//! Route groups with prefixes and middleware, a per-method trie route table,
//! and a per-request [`Context`] that walks an onion-style handler chain.
//!
//! ```
//! use skein_core::{handler, Engine, Method, RequestBuilder};
//!
//! let engine = Engine::new();
//! let api = engine.group("/api");
//! api.get("/user/:id", handler(|c| {
//!     let id = c.param("id").to_string();
//!     c.string(200, id);
//! }))
//! .unwrap();
//!
//! let res = engine
//!     .build()
//!     .serve(RequestBuilder::new(Method::Get, "/api/user/7").build());
//! assert_eq!(res.body_string().as_deref(), Some("7"));
//! ```
//!
//! ## Features
//! - `native` - HTTP/1.1 server with tokio/hyper

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod bind;
pub mod config;
pub mod context;
pub mod cookie;
pub mod engine;
pub mod error;
pub mod form;
pub mod group;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod request;
pub mod response;
pub mod router;
pub mod writer;

#[cfg(feature = "native")]
pub mod server;

// Re-exports
pub use bind::{FormValues, FromForm};
pub use config::ServerConfig;
pub use context::{handler, ChainFlow, ChainState, Context, Handler};
pub use cookie::{Cookie, CookieJar, SameSite};
pub use engine::{Dispatcher, Engine};
pub use error::{Error, Result};
pub use form::{FormFile, MultipartForm};
pub use group::{RouteMiss, RouterGroup};
pub use handlers::{StaticFileConfig, StaticFiles};
pub use logging::init_logging;
pub use request::{Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};
pub use router::{RouteMatch, RouteTable};
pub use writer::ResponseWriter;

#[cfg(feature = "native")]
pub use server::ConnectionTracker;
