//! Native HTTP/1.1 server
//!
//! Accepts connections with tokio, speaks HTTP through hyper, and runs each
//! request through a [`Dispatcher`]. Handlers are synchronous, so chains run
//! on the blocking pool and never stall the accept loop.

use crate::request::decode_path;
use crate::{
    Dispatcher, Engine, Error, Method, Request, Response, ResponseBuilder, Result, ServerConfig,
    StatusCode,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Create a listening socket with address reuse and Nagle disabled
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Bind a tokio listener for `config`
pub fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let socket = create_optimized_socket(&config.addr()?)?;
    Ok(TcpListener::from_std(socket.into())?)
}

/// Convert a hyper request, buffering at most `limit` body bytes
pub async fn from_hyper_request(req: hyper::Request<Incoming>, limit: usize) -> Result<Request> {
    let method: Method = req.method().as_str().parse()?;

    if let Some(size) = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if size > limit {
            return Err(Error::BodyTooLarge { size, limit });
        }
    }

    let (parts, body) = req.into_parts();
    let mut request = Request::new(method, decode_path(parts.uri.path()));
    request.query = parts.uri.query().map(str::to_string);
    for (name, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            request.headers.push((name.to_string(), v.to_string()));
        }
    }

    request.body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            return Err(Error::BodyTooLarge {
                size: limit + 1,
                limit,
            })
        }
        Err(e) => return Err(Error::Internal(format!("reading body: {}", e))),
    };

    Ok(request)
}

/// Convert a response; headers hyper rejects are dropped with a warning
pub fn to_hyper_response(res: Response) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(res.body));
    *response.status_mut() = hyper::StatusCode::from_u16(res.status.0)
        .unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);

    let headers = response.headers_mut();
    for (name, value) in &res.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "dropping invalid response header"),
        }
    }

    response
}

/// Response for a request that never reached the dispatcher
fn rejection(err: &Error) -> Response {
    let status = match err {
        Error::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::InvalidMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
        _ => StatusCode::BAD_REQUEST,
    };
    let body = serde_json::json!({ "message": err.to_string() }).to_string();

    ResponseBuilder::new(status)
        .header("content-type", "application/json")
        .body(body)
        .build()
}

async fn handle_request(
    dispatcher: Dispatcher,
    req: hyper::Request<Incoming>,
    limit: usize,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let request = match from_hyper_request(req, limit).await {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "request rejected");
            return Ok(to_hyper_response(rejection(&e)));
        }
    };

    let response = match tokio::task::spawn_blocking(move || dispatcher.serve(request)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "handler task failed");
            Response::new(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    Ok(to_hyper_response(response))
}

/// Tracks active connections for graceful shutdown
#[derive(Debug)]
pub struct ConnectionTracker {
    active: AtomicU64,
    shutting_down: AtomicBool,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            active: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Current active connection count
    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop admitting new connections
    pub fn start_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Wait until every connection has closed or `timeout` elapses.
    /// Returns false on timeout.
    pub async fn drain(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }
}

impl Dispatcher {
    /// Serve connections from `listener` until `shutdown` resolves, then
    /// drain open connections for up to `config.drain_timeout_ms`
    pub async fn serve_until<F>(
        &self,
        listener: TcpListener,
        config: &ServerConfig,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper_util::rt::TokioIo;

        let tracker = Arc::new(ConnectionTracker::new());
        let limit = config.max_body_size;
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, routes = self.routes().len(), "listening");
        }

        tokio::pin!(shutdown);
        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(error = %e, "set_nodelay failed");
            }

            let dispatcher = self.clone();
            let conn_tracker = tracker.clone();
            conn_tracker.increment();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| handle_request(dispatcher.clone(), req, limit));

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(%peer, error = %e, "connection error");
                }
                conn_tracker.decrement();
            });
        }

        tracker.start_shutdown();
        drop(listener);
        let open = tracker.count();
        tracing::info!(open, "shutting down");
        if !tracker
            .drain(Duration::from_millis(config.drain_timeout_ms))
            .await
        {
            tracing::warn!(open = tracker.count(), "drain timed out");
        }

        Ok(())
    }
}

impl Engine {
    /// Build a dispatcher and serve it until Ctrl-C
    pub async fn run(&self, config: &ServerConfig) -> Result<()> {
        self.run_until(config, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Build a dispatcher and serve it until `shutdown` resolves
    pub async fn run_until<F>(&self, config: &ServerConfig, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = bind(config)?;
        self.build().serve_until(listener, config, shutdown).await
    }

    /// Start a multi-thread runtime sized by `config.workers` and run on it
    pub fn run_blocking(&self, config: &ServerConfig) -> Result<()> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.workers.max(1))
            .enable_all()
            .build()?
            .block_on(self.run(config))
    }
}
