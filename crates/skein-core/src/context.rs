//! Per-request context and handler chain execution
//!
//! A [`Context`] is created for every inbound request and owned by the task
//! serving it. It carries the parsed request, the captured path parameters,
//! the assembled handler chain (group middleware followed by the terminal
//! handler) and the response sink.
//!
//! The chain cursor moves through three states:
//!
//! ```text
//! NotStarted (index = -1) --next()--> Running(i) --...--> Completed (index >= len)
//! ```
//!
//! Code a handler runs before calling [`Context::next`] executes on the way
//! in (registration order); code after it executes on the way out (reverse
//! order). [`Context::fail`] jumps the cursor to the end, so nothing further
//! runs once a failure is signalled.

use crate::bind::{FormValues, FromForm};
use crate::cookie::Cookie;
use crate::form::{FormFile, MultipartForm};
use crate::response::{Response, StatusCode};
use crate::writer::ResponseWriter;
use crate::{Error, Method, Request, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Request handler and middleware signature
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Box a closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Where the chain cursor currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    NotStarted,
    Running(usize),
    Completed,
}

/// What happens when a handler returns without calling `next()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainFlow {
    /// The chain stops; later handlers never run
    #[default]
    Explicit,
    /// The cursor advances and the following handler runs anyway
    Implicit,
}

/// Per-request state handed to every handler
pub struct Context {
    request: Request,
    writer: ResponseWriter,
    params: HashMap<String, String>,
    pattern: Option<String>,
    handlers: Vec<Handler>,
    index: isize,
    flow: ChainFlow,
    multipart: Option<MultipartForm>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("params", &self.params)
            .field("handlers", &self.handlers.len())
            .field("state", &self.state())
            .finish()
    }
}

impl Context {
    /// Create a context with an empty chain
    pub fn new(request: Request) -> Self {
        Self {
            request,
            writer: ResponseWriter::new(),
            params: HashMap::new(),
            pattern: None,
            handlers: Vec::new(),
            index: -1,
            flow: ChainFlow::default(),
            multipart: None,
        }
    }

    pub(crate) fn with_chain(request: Request, handlers: Vec<Handler>, flow: ChainFlow) -> Self {
        Self {
            handlers,
            flow,
            ..Self::new(request)
        }
    }

    /// Append a handler to the chain
    pub fn push_handler(&mut self, handler: Handler) {
        self.handlers.push(handler);
    }

    /// Install the router's captures and the matched pattern
    pub fn set_route(&mut self, pattern: impl Into<String>, params: HashMap<String, String>) {
        self.pattern = Some(pattern.into());
        self.params = params;
    }

    // ---------------------------------------------------------------------
    // Chain control
    // ---------------------------------------------------------------------

    /// Run the rest of the chain from the next handler on
    pub fn next(&mut self) {
        self.index += 1;
        while let Some(handler) = self.current_handler() {
            handler(self);
            match self.flow {
                ChainFlow::Explicit => {
                    // Whatever ran inside has already driven the chain as far as it goes
                    self.index = self.index.max(self.handlers.len() as isize);
                }
                ChainFlow::Implicit => self.index += 1,
            }
        }
    }

    fn current_handler(&self) -> Option<Handler> {
        usize::try_from(self.index)
            .ok()
            .and_then(|i| self.handlers.get(i))
            .cloned()
    }

    /// Stop the chain without writing anything
    pub fn abort(&mut self) {
        self.index = self.handlers.len() as isize;
    }

    /// Stop the chain and respond with `{"message": ...}` and `code`
    pub fn fail(&mut self, code: impl Into<StatusCode>, message: impl Into<String>) {
        self.abort();
        self.json(code, &serde_json::json!({ "message": message.into() }));
    }

    /// Whether the cursor has run off the end of the chain
    pub fn is_aborted(&self) -> bool {
        self.state() == ChainState::Completed
    }

    pub fn state(&self) -> ChainState {
        match usize::try_from(self.index) {
            Err(_) => ChainState::NotStarted,
            Ok(i) if i >= self.handlers.len() => ChainState::Completed,
            Ok(i) => ChainState::Running(i),
        }
    }

    /// Number of handlers in the assembled chain
    pub fn chain_len(&self) -> usize {
        self.handlers.len()
    }

    // ---------------------------------------------------------------------
    // Request accessors
    // ---------------------------------------------------------------------

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn path(&self) -> &str {
        &self.request.path
    }

    pub fn method(&self) -> Method {
        self.request.method
    }

    /// The registered pattern that matched, if any
    pub fn route_pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Captured path parameter, empty when absent
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).map(|s| s.as_str()).unwrap_or_default()
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Query string value, empty when absent
    pub fn query(&self, key: &str) -> String {
        self.request.query_params().remove(key).unwrap_or_default()
    }

    /// Form value: urlencoded body, then multipart fields, then query string
    pub fn post_form(&mut self, key: &str) -> String {
        if let Some(value) = self.request.form_params().remove(key) {
            return value;
        }
        if let Ok(form) = self.multipart() {
            if let Some(value) = form.value(key) {
                return value.to_string();
            }
        }
        self.query(key)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    pub fn body(&self) -> &bytes::Bytes {
        &self.request.body
    }

    /// Cookie value sent by the client
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.request.cookies().get_value(name).map(|v| v.to_string())
    }

    /// Decoded multipart body, parsed on first use
    pub fn multipart(&mut self) -> Result<&MultipartForm> {
        if self.multipart.is_none() {
            let content_type = self
                .request
                .content_type()
                .ok_or_else(|| Error::Multipart("request has no content-type".to_string()))?;
            let form = MultipartForm::parse(content_type, &self.request.body)?;
            self.multipart = Some(form);
        }
        self.multipart
            .as_ref()
            .ok_or_else(|| Error::Internal("multipart cache empty".to_string()))
    }

    /// Uploaded file by form field name
    pub fn form_file(&mut self, field: &str) -> Result<FormFile> {
        self.multipart()?
            .file(field)
            .cloned()
            .ok_or_else(|| Error::MissingFile(field.to_string()))
    }

    /// Bind the query string into `T`
    pub fn bind_query<T: FromForm>(&self) -> Result<T> {
        T::from_form(&FormValues::new(self.request.query_params()))
    }

    /// Bind urlencoded body values, with the query string filling gaps
    pub fn bind_form<T: FromForm>(&self) -> Result<T> {
        let mut values = self.request.form_params();
        for (k, v) in self.request.query_params() {
            values.entry(k).or_insert(v);
        }
        T::from_form(&FormValues::new(values))
    }

    /// Decode the body as JSON
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.request.body)?)
    }

    // ---------------------------------------------------------------------
    // Response writers
    // ---------------------------------------------------------------------

    /// The status that reached the sink, if one has been written
    pub fn status_code(&self) -> Option<StatusCode> {
        self.writer.status()
    }

    pub fn writer(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    /// Write the status line. Only the first status write of a request counts.
    pub fn status(&mut self, code: impl Into<StatusCode>) {
        self.writer.write_header(code.into());
    }

    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        self.writer.set_header(key, value);
    }

    pub fn set_cookie(&mut self, cookie: &Cookie) {
        self.writer.add_header("set-cookie", cookie.to_header_value());
    }

    /// Plain-text response
    pub fn string(&mut self, code: impl Into<StatusCode>, body: impl AsRef<str>) {
        self.set_header("content-type", "text/plain; charset=utf-8");
        self.status(code);
        self.writer.write(body.as_ref().as_bytes());
    }

    /// Pre-rendered HTML response
    pub fn html(&mut self, code: impl Into<StatusCode>, body: impl AsRef<str>) {
        self.set_header("content-type", "text/html; charset=utf-8");
        self.status(code);
        self.writer.write(body.as_ref().as_bytes());
    }

    /// JSON response; an unserializable value turns into a 500
    pub fn json<T: Serialize + ?Sized>(&mut self, code: impl Into<StatusCode>, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.set_header("content-type", "application/json");
                self.status(code);
                self.writer.write(&body);
            }
            Err(e) => {
                tracing::error!(error = %e, path = %self.request.path, "json encoding failed");
                self.string(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
        }
    }

    /// Raw bytes
    pub fn data(&mut self, code: impl Into<StatusCode>, data: &[u8]) {
        self.status(code);
        self.writer.write(data);
    }

    /// Copy a prepared response into the sink
    pub fn write_response(&mut self, response: Response) {
        for (name, value) in &response.headers {
            self.writer.add_header(name, value.clone());
        }
        self.writer.write_header(response.status);
        if !response.body.is_empty() {
            self.writer.write(&response.body);
        }
    }

    /// Finish the request and hand the response to the transport
    pub fn into_response(self) -> Response {
        self.writer.into_response()
    }
}
