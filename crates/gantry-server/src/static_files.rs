//! Static directory serving.
//!
//! [`StaticDir`] is an ordinary handler: it reads the file path from a route
//! parameter, resolves it below a base directory and writes the file
//! straight to the sink.
//!
//! ```rust
//! use gantry_server::{Group, StaticDir};
//!
//! let root = Group::root();
//! root.get("/assets/*path", StaticDir::new("./public", "path").limit(64))
//!     .unwrap();
//! ```

use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gantry_core::{Context, Handler, HttpError, Outcome, Response};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use http::{HeaderValue, Method, StatusCode};

use crate::semaphore::Semaphore;

const INDEX_FILE: &str = "index.html";
const CHUNK_SIZE: usize = 64 * 1024;

/// Serves files from a directory.
///
/// Directories serve their `index.html`. Without one they answer 404,
/// or an HTML index of their entries when [`listing`](StaticDir::listing)
/// is enabled. Paths containing `..` or hidden segments are refused with
/// 403. Missing files answer 404, other I/O failures 500.
#[derive(Debug, Clone)]
pub struct StaticDir {
    root: PathBuf,
    param: String,
    limit: Option<Arc<Semaphore>>,
    listing: bool,
}

impl StaticDir {
    /// Serves `dir`, taking the relative path from route parameter `param`.
    pub fn new(dir: impl Into<PathBuf>, param: impl Into<String>) -> Self {
        Self {
            root: dir.into(),
            param: param.into(),
            limit: None,
            listing: false,
        }
    }

    /// Lists directories that have no `index.html`. Off by default.
    ///
    /// Hidden entries are left out.
    pub fn listing(mut self, enabled: bool) -> Self {
        self.listing = enabled;
        self
    }

    /// Serves at most `n` files at a time; `0` removes the limit.
    ///
    /// Requests over the limit block their worker until a slot frees.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = (n > 0).then(|| Arc::new(Semaphore::new(n)));
        self
    }

    /// Returns the base directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, raw: &str) -> Result<PathBuf, StaticError> {
        let decoded = urlencoding::decode(raw).map_err(|_| StaticError::NotFound)?;

        let mut relative = PathBuf::new();
        for segment in decoded.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => return Err(StaticError::Forbidden("directory traversal not allowed")),
                s if s.starts_with('.') => {
                    return Err(StaticError::Forbidden("hidden files not allowed"))
                }
                s => relative.push(s),
            }
        }

        let root = self.root.canonicalize()?;
        let path = root.join(relative).canonicalize()?;

        // Symlinks may point anywhere.
        if !path.starts_with(&root) {
            return Err(StaticError::Forbidden("path escapes root directory"));
        }
        Ok(path)
    }

    fn open(&self, raw: &str) -> Result<Target, StaticError> {
        let mut path = self.resolve(raw)?;
        let mut meta = fs::metadata(&path)?;

        if meta.is_dir() {
            let index = path.join(INDEX_FILE);
            match fs::metadata(&index) {
                Ok(index_meta) => {
                    path = index;
                    meta = index_meta;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound && self.listing => {
                    return Ok(Target::Listing(path));
                }
                Err(e) => return Err(e.into()),
            }
        }
        if !meta.is_file() {
            return Err(StaticError::NotFound);
        }

        let file = File::open(&path)?;
        Ok(Target::File(path, file, meta))
    }

    fn serve(&self, ctx: &mut Context<'_>) -> Result<Outcome, StaticError> {
        let raw = ctx.param(&self.param).unwrap_or_default().to_string();
        let (path, mut file, meta) = match self.open(&raw)? {
            Target::File(path, file, meta) => (path, file, meta),
            Target::Listing(dir) => {
                let body = render_listing(&dir, ctx.path())?;
                return Ok(Response::html(body).into());
            }
        };

        let headers = ctx.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime_type(&path)));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(meta.len()));
        if let Ok(modified) = meta.modified() {
            if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
                headers.insert(LAST_MODIFIED, value);
            }
        }
        ctx.set_status(StatusCode::OK);

        if ctx.method() == Method::HEAD {
            return Ok(Outcome::Proceed);
        }

        // The head is out; failures from here on can only be logged.
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => return Ok(Outcome::Proceed),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "static file read failed");
                    return Ok(Outcome::Proceed);
                }
            };
            if let Err(e) = ctx.writer_mut().write_all(&buf[..n]) {
                tracing::debug!(path = %path.display(), error = %e, "client went away");
                return Ok(Outcome::Proceed);
            }
        }
    }
}

impl Handler for StaticDir {
    fn call(&self, ctx: &mut Context<'_>) -> Outcome {
        let _permit = self.limit.as_deref().map(Semaphore::acquire);

        match self.serve(ctx) {
            Ok(outcome) => outcome,
            Err(StaticError::NotFound) => Response::not_found().into(),
            Err(StaticError::Forbidden(reason)) => {
                Response::from_error(&HttpError::forbidden(reason)).into()
            }
            Err(StaticError::Io(e)) => {
                tracing::error!(root = %self.root.display(), error = %e, "static file error");
                Response::internal_error().into()
            }
        }
    }
}

enum Target {
    File(PathBuf, File, Metadata),
    Listing(PathBuf),
}

/// Renders a directory as a list of links, directories first.
fn render_listing(dir: &Path, request_path: &str) -> io::Result<String> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type()?.is_dir();
        entries.push((!is_dir, name));
    }
    entries.sort();

    let base = request_path.trim_end_matches('/');
    let title = escape_html(if base.is_empty() { "/" } else { base });
    let mut html = format!(
        "<!doctype html>\n<meta charset=\"utf-8\">\n<title>Index of {title}</title>\n<h1>Index of {title}</h1>\n<pre>\n"
    );
    for (is_file, name) in &entries {
        let slash = if *is_file { "" } else { "/" };
        html.push_str(&format!(
            "<a href=\"{base}/{href}{slash}\">{label}{slash}</a>\n",
            href = urlencoding::encode(name),
            label = escape_html(name),
        ));
    }
    html.push_str("</pre>\n");
    Ok(html)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

enum StaticError {
    NotFound,
    Forbidden(&'static str),
    Io(io::Error),
}

impl From<io::Error> for StaticError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Io(e),
        }
    }
}

fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "mp4" => "video/mp4",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use gantry_core::{boxed, BufferedWriter, Params};
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("app.js"), "let x = 1;").unwrap();
        fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.html"), "docs").unwrap();
        fs::write(dir.path().join("docs/read me.txt"), "spaced").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        dir
    }

    fn serve(files: &StaticDir, method: Method, path: &str) -> http::Response<Bytes> {
        let request = http::Request::builder()
            .method(method)
            .uri("/static")
            .body(Bytes::new())
            .unwrap();
        let mut params = Params::new();
        params.push("path", path);

        let mut writer = BufferedWriter::new();
        let mut ctx = Context::new(request, &mut writer)
            .with_params(params)
            .with_chain(vec![boxed(files.clone())]);
        ctx.run();
        drop(ctx);
        writer.into_response()
    }

    #[test]
    fn test_serves_file_with_headers() {
        let dir = site();
        let files = StaticDir::new(dir.path(), "path");

        let response = serve(&files, Method::GET, "app.js");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"let x = 1;");
        assert_eq!(response.headers()[CONTENT_TYPE], "text/javascript; charset=utf-8");
        assert_eq!(response.headers()[CONTENT_LENGTH], "10");
        assert!(response.headers().contains_key(LAST_MODIFIED));
    }

    #[test]
    fn test_directory_serves_index() {
        let dir = site();
        let files = StaticDir::new(dir.path(), "path");

        assert_eq!(serve(&files, Method::GET, "").body().as_ref(), b"<h1>home</h1>");
        assert_eq!(serve(&files, Method::GET, "docs/").body().as_ref(), b"docs");
        assert_eq!(
            serve(&files, Method::GET, "empty").status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_listing_disabled_by_default() {
        let dir = site();
        fs::write(dir.path().join("empty/notes.txt"), "n").unwrap();
        let files = StaticDir::new(dir.path(), "path");
        assert_eq!(serve(&files, Method::GET, "empty").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_listing_enabled() {
        let dir = site();
        let gallery = dir.path().join("gallery");
        fs::create_dir(&gallery).unwrap();
        fs::create_dir(gallery.join("sub")).unwrap();
        fs::write(gallery.join("b.png"), "png").unwrap();
        fs::write(gallery.join("a <b>.txt"), "txt").unwrap();
        fs::write(gallery.join(".secret"), "s").unwrap();
        let files = StaticDir::new(dir.path(), "path").listing(true);

        let response = serve(&files, Method::GET, "gallery");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");

        let html = String::from_utf8(response.body().to_vec()).unwrap();
        let sub = html.find(r#"<a href="/static/sub/">sub/</a>"#).unwrap();
        let txt = html
            .find(r#"<a href="/static/a%20%3Cb%3E.txt">a &lt;b&gt;.txt</a>"#)
            .unwrap();
        let png = html.find(r#"<a href="/static/b.png">b.png</a>"#).unwrap();
        assert!(sub < txt && txt < png);
        assert!(!html.contains("secret"));

        // An index still wins over the listing.
        assert_eq!(serve(&files, Method::GET, "docs").body().as_ref(), b"docs");
    }

    #[test]
    fn test_percent_encoded_name() {
        let dir = site();
        let files = StaticDir::new(dir.path(), "path");
        assert_eq!(
            serve(&files, Method::GET, "docs/read%20me.txt").body().as_ref(),
            b"spaced"
        );
    }

    #[test]
    fn test_traversal_and_hidden_refused() {
        let dir = site();
        let files = StaticDir::new(dir.path().join("docs"), "path");

        assert_eq!(serve(&files, Method::GET, "../app.js").status(), StatusCode::FORBIDDEN);
        assert_eq!(serve(&files, Method::GET, "%2e%2e/app.js").status(), StatusCode::FORBIDDEN);

        let files = StaticDir::new(dir.path(), "path");
        assert_eq!(serve(&files, Method::GET, ".env").status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = site();
        let files = StaticDir::new(dir.path(), "path");
        let response = serve(&files, Method::GET, "nope.css");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let files = StaticDir::new("/definitely/not/here", "path");
        assert_eq!(serve(&files, Method::GET, "x").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_head_sends_no_body() {
        let dir = site();
        let files = StaticDir::new(dir.path(), "path");
        let response = serve(&files, Method::HEAD, "app.js");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "10");
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_limit_releases_permits() {
        let dir = site();
        let files = StaticDir::new(dir.path(), "path").limit(1);
        for _ in 0..3 {
            assert_eq!(serve(&files, Method::GET, "app.js").status(), StatusCode::OK);
            assert_eq!(serve(&files, Method::GET, "nope").status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(files.limit.as_ref().map(|s| s.available()), Some(1));
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type(Path::new("a.HTML")), "text/html; charset=utf-8");
        assert_eq!(mime_type(Path::new("a.woff2")), "font/woff2");
        assert_eq!(mime_type(Path::new("Makefile")), "application/octet-stream");
    }
}
