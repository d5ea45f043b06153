//! Static file serving
//!
//! Backs [`crate::RouterGroup::static_files`]. The route captures the file
//! path as the `filepath` parameter; this handler maps it under a root
//! directory and answers with the file, a 304, or a 404.

use crate::{Method, Request, Response, ResponseBuilder, StatusCode};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Static file configuration
#[derive(Debug, Clone)]
pub struct StaticFileConfig {
    /// Root directory
    pub root: PathBuf,
    /// File served for directory requests
    pub index: String,
    /// Cache max-age in seconds
    pub max_age: u32,
    /// Enable ETag
    pub etag: bool,
    /// Extra headers on every file response
    pub headers: HashMap<String, String>,
    /// Serve dot files
    pub hidden: bool,
}

impl Default for StaticFileConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index: "index.html".to_string(),
            max_age: 3600,
            etag: true,
            headers: HashMap::new(),
            hidden: false,
        }
    }
}

impl StaticFileConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = name.into();
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }

    pub fn etag(mut self, enabled: bool) -> Self {
        self.etag = enabled;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Static file handler
#[derive(Debug, Clone)]
pub struct StaticFiles {
    config: StaticFileConfig,
}

impl StaticFiles {
    pub fn new(config: StaticFileConfig) -> Self {
        Self { config }
    }

    /// Serve static files from directory
    pub fn serve(root: impl Into<PathBuf>) -> Self {
        Self::new(StaticFileConfig::new(root))
    }

    /// Answer a request for `file`, relative to the configured root
    pub fn handle(&self, method: Method, file: &str, req: &Request) -> Response {
        if method != Method::Get && method != Method::Head {
            return ResponseBuilder::new(StatusCode::METHOD_NOT_ALLOWED)
                .body("Method not allowed")
                .build();
        }

        let Some(relative) = self.sanitize_path(file) else {
            return Response::not_found();
        };
        let mut full_path = self.config.root.join(relative);

        let mut meta = match std::fs::metadata(&full_path) {
            Ok(meta) => meta,
            Err(_) => return Response::not_found(),
        };
        if meta.is_dir() {
            full_path = full_path.join(&self.config.index);
            meta = match std::fs::metadata(&full_path) {
                Ok(meta) if meta.is_file() => meta,
                _ => return Response::not_found(),
            };
        }

        let etag = self.config.etag.then(|| generate_etag(&meta));
        if let (Some(etag), Some(if_none_match)) = (&etag, req.header("if-none-match")) {
            if if_none_match == etag {
                return ResponseBuilder::new(StatusCode::NOT_MODIFIED).build();
            }
        }

        let content = match std::fs::read(&full_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %full_path.display(), error = %e, "static file read failed");
                return Response::not_found();
            }
        };

        let mut builder = ResponseBuilder::new(StatusCode::OK)
            .header("content-type", mime_type(&full_path));
        if let Some(etag) = etag {
            builder = builder.header("etag", etag);
        }
        if self.config.max_age > 0 {
            builder = builder.header("cache-control", format!("max-age={}", self.config.max_age));
        }
        for (k, v) in &self.config.headers {
            builder = builder.header(k.clone(), v.clone());
        }

        if method == Method::Head {
            builder
                .header("content-length", content.len().to_string())
                .build()
        } else {
            builder.body(content).build()
        }
    }

    /// Normalize a request path; rejects traversal and (unless enabled) dot files
    fn sanitize_path(&self, path: &str) -> Option<PathBuf> {
        let path = path.trim_start_matches('/');

        if !self.config.hidden && path.split('/').any(|s| s.starts_with('.') && s != ".") {
            return None;
        }

        let mut result = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(c) => result.push(c),
                Component::ParentDir => return None,
                _ => {}
            }
        }

        Some(result)
    }
}

fn generate_etag(meta: &std::fs::Metadata) -> String {
    use std::time::UNIX_EPOCH;

    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    format!("\"{:x}-{:x}\"", mtime, meta.len())
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff2" => "font/woff2",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestBuilder;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("skein-static-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(dir.join("css")).unwrap();
        std::fs::write(dir.join("css/a.css"), "body{}").unwrap();
        std::fs::write(dir.join("index.html"), "<h1>hi</h1>").unwrap();
        dir
    }

    fn get(path: &str) -> Request {
        RequestBuilder::new(Method::Get, path).build()
    }

    #[test]
    fn test_sanitize_path() {
        let handler = StaticFiles::serve(".");

        assert!(handler.sanitize_path("index.html").is_some());
        assert!(handler.sanitize_path("/css/style.css").is_some());
        assert!(handler.sanitize_path("../etc/passwd").is_none());
        assert!(handler.sanitize_path("css/../../etc").is_none());
        assert!(handler.sanitize_path(".env").is_none());
    }

    #[test]
    fn test_serves_file_with_headers() {
        let dir = scratch_dir("serve");
        let files = StaticFiles::serve(&dir);

        let res = files.handle(Method::Get, "css/a.css", &get("/assets/css/a.css"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some("text/css; charset=utf-8"));
        assert_eq!(res.body_string().as_deref(), Some("body{}"));
        assert!(res.header("etag").is_some());
        assert_eq!(res.header("cache-control"), Some("max-age=3600"));

        let etag = res.header("etag").unwrap().to_string();
        let cached = RequestBuilder::new(Method::Get, "/assets/css/a.css")
            .header("if-none-match", etag)
            .build();
        let res = files.handle(Method::Get, "css/a.css", &cached);
        assert_eq!(res.status, StatusCode::NOT_MODIFIED);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_directory_index_and_missing() {
        let dir = scratch_dir("index");
        let files = StaticFiles::serve(&dir);

        let res = files.handle(Method::Get, "", &get("/assets/"));
        assert_eq!(res.body_string().as_deref(), Some("<h1>hi</h1>"));

        let res = files.handle(Method::Get, "nope.txt", &get("/assets/nope.txt"));
        assert_eq!(res.status, StatusCode::NOT_FOUND);

        let res = files.handle(Method::Post, "css/a.css", &get("/assets/css/a.css"));
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(mime_type(Path::new("image.PNG")), "image/png");
        assert_eq!(mime_type(Path::new("unknown")), "application/octet-stream");
    }
}
