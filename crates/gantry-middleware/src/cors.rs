//! CORS (Cross-Origin Resource Sharing) middleware.
//!
//! [`Cors`] is an ordinary handler. Used as middleware it decorates
//! browser requests from allowed origins with the CORS response headers and
//! answers `OPTIONS` preflights with `204 No Content`. Requests without an
//! `Origin` header, or from an origin outside the allow list, pass through
//! untouched.
//!
//! Preflights only reach middleware if some route matches them, so
//! [`Cors::install`] also registers a catch-all `OPTIONS` route on the given
//! groups.
//!
//! ## Example
//!
//! ```
//! use gantry_middleware::Cors;
//! use gantry_server::Group;
//! use http::Method;
//!
//! let root = Group::root();
//! let api = root.sub_group("/api", "api", []).unwrap();
//!
//! let cors = Cors::builder()
//!     .allow_origin("https://app.example.com")
//!     .allow_methods([Method::GET, Method::POST])
//!     .allow_headers(["content-type", "authorization"])
//!     .build();
//!
//! api.use_handler(cors.clone()).unwrap();
//! cors.install(&[&api]).unwrap();
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use gantry_core::{BoxHandler, ConfigError, Context, Handler, Outcome, Response};
use gantry_server::Group;
use http::header::{HeaderName, HeaderValue, ORIGIN};
use http::Method;

/// CORS header names.
pub mod headers {
    use http::header::HeaderName;

    /// `Access-Control-Allow-Origin`.
    pub const ALLOW_ORIGIN: HeaderName = http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
    /// `Access-Control-Allow-Credentials`.
    pub const ALLOW_CREDENTIALS: HeaderName = http::header::ACCESS_CONTROL_ALLOW_CREDENTIALS;
    /// `Access-Control-Allow-Methods`.
    pub const ALLOW_METHODS: HeaderName = http::header::ACCESS_CONTROL_ALLOW_METHODS;
    /// `Access-Control-Allow-Headers`.
    pub const ALLOW_HEADERS: HeaderName = http::header::ACCESS_CONTROL_ALLOW_HEADERS;
    /// `Access-Control-Max-Age`.
    pub const MAX_AGE: HeaderName = http::header::ACCESS_CONTROL_MAX_AGE;
    /// `Access-Control-Request-Method` (preflight).
    pub const REQUEST_METHOD: HeaderName = http::header::ACCESS_CONTROL_REQUEST_METHOD;
    /// `Access-Control-Request-Headers` (preflight).
    pub const REQUEST_HEADERS: HeaderName = http::header::ACCESS_CONTROL_REQUEST_HEADERS;
}

/// Preflight cache lifetime sent in `Access-Control-Max-Age`.
pub const MAX_AGE_SECS: u32 = 86_400;

/// Pattern of the catch-all preflight route registered by [`Cors::install`].
pub const PREFLIGHT_PATTERN: &str = "/*cors";

#[derive(Debug)]
struct CorsConfig {
    /// Joined method list, or `None` to echo the preflight's request.
    methods: Option<HeaderValue>,
    /// Joined header list, or `None` to echo the preflight's request.
    headers: Option<HeaderValue>,
    /// Allowed origins; empty allows every origin.
    origins: HashSet<String>,
}

/// CORS handler. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Cors {
    config: Arc<CorsConfig>,
}

/// Builder for [`Cors`].
///
/// Every list left empty mirrors the request: any origin is accepted and
/// preflights get back the method and headers they asked for.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct CorsBuilder {
    methods: Vec<Method>,
    headers: Vec<String>,
    origins: HashSet<String>,
}

impl CorsBuilder {
    /// Creates a builder that mirrors every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an allowed method.
    pub fn allow_method(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    /// Adds allowed methods.
    pub fn allow_methods<I>(self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        methods.into_iter().fold(self, Self::allow_method)
    }

    /// Adds an allowed request header.
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        let header = header.into().to_ascii_lowercase();
        if !self.headers.contains(&header) {
            self.headers.push(header);
        }
        self
    }

    /// Adds allowed request headers.
    pub fn allow_headers<I, S>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        headers.into_iter().fold(self, Self::allow_header)
    }

    /// Adds an allowed origin.
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.origins.insert(origin.into());
        self
    }

    /// Adds allowed origins.
    pub fn allow_origins<I, S>(self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        origins.into_iter().fold(self, Self::allow_origin)
    }

    /// Builds the handler.
    ///
    /// Header names that cannot form a header value are dropped.
    pub fn build(self) -> Cors {
        let methods = join(self.methods.iter().map(Method::as_str));
        let headers = join(
            self.headers
                .iter()
                .filter(|h| HeaderName::try_from(h.as_str()).is_ok())
                .map(String::as_str),
        );

        Cors {
            config: Arc::new(CorsConfig {
                methods,
                headers,
                origins: self.origins,
            }),
        }
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> Option<HeaderValue> {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        None
    } else {
        HeaderValue::from_str(&joined).ok()
    }
}

impl Cors {
    /// Starts a builder.
    pub fn builder() -> CorsBuilder {
        CorsBuilder::new()
    }

    /// Creates a handler that mirrors every request.
    #[must_use]
    pub fn permissive() -> Self {
        CorsBuilder::new().build()
    }

    /// Returns true if `origin` may make cross-origin requests.
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.config.origins.is_empty() || self.config.origins.contains(origin)
    }

    /// Registers this handler as `OPTIONS /*cors` on every group, so
    /// preflights for paths below them resolve.
    ///
    /// Fails on the first group that is sealed or already has a catch-all
    /// `OPTIONS` route.
    pub fn install(&self, groups: &[&Group]) -> Result<(), ConfigError> {
        let handler: BoxHandler = Arc::new(self.clone());
        for group in groups {
            group.add_boxed(Method::OPTIONS, PREFLIGHT_PATTERN, BoxHandler::clone(&handler))?;
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Outcome {
        let Some(origin) = ctx.request().headers().get(ORIGIN).cloned() else {
            return Outcome::Proceed;
        };
        let allowed = origin.to_str().is_ok_and(|o| self.is_allowed(o));
        if !allowed {
            return Outcome::Proceed;
        }

        let requested_method = ctx.request().headers().get(headers::REQUEST_METHOD).cloned();
        let requested_headers = ctx.request().headers().get(headers::REQUEST_HEADERS).cloned();

        let out = ctx.headers_mut();
        out.insert(headers::ALLOW_ORIGIN, origin);
        out.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        if let Some(methods) = self.config.methods.clone().or(requested_method) {
            out.insert(headers::ALLOW_METHODS, methods);
        }
        if let Some(list) = self.config.headers.clone().or(requested_headers) {
            out.insert(headers::ALLOW_HEADERS, list);
        }
        out.insert(headers::MAX_AGE, HeaderValue::from(MAX_AGE_SECS));

        if *ctx.method() == Method::OPTIONS {
            Response::no_content().into()
        } else {
            Outcome::Proceed
        }
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self::permissive()
    }
}

impl Handler for Cors {
    fn call(&self, ctx: &mut Context<'_>) -> Outcome {
        self.apply(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_test::TestClient;
    use http::StatusCode;

    fn app(cors: &Cors) -> Group {
        let root = Group::root();
        root.use_handler(cors.clone()).unwrap();
        root.get("/items", |_: &mut Context<'_>| Response::text("items"))
            .unwrap();
        cors.install(&[&root]).unwrap();
        root
    }

    #[test]
    fn test_no_origin_passes_through() {
        let root = app(&Cors::permissive());
        let response = TestClient::new(&root).get("/items").send().unwrap();
        response
            .assert_status(StatusCode::OK)
            .assert_no_header("access-control-allow-origin")
            .assert_body_eq("items");
    }

    #[test]
    fn test_permissive_echoes_request() {
        let root = app(&Cors::permissive());
        let response = TestClient::new(&root)
            .options("/items")
            .header("origin", "https://a.example")
            .header("access-control-request-method", "PUT")
            .header("access-control-request-headers", "x-token")
            .send()
            .unwrap();

        response
            .assert_status(StatusCode::NO_CONTENT)
            .assert_header("access-control-allow-origin", "https://a.example")
            .assert_header("access-control-allow-credentials", "true")
            .assert_header("access-control-allow-methods", "PUT")
            .assert_header("access-control-allow-headers", "x-token")
            .assert_header("access-control-max-age", "86400");
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_configured_lists_win() {
        let cors = Cors::builder()
            .allow_origin("https://a.example")
            .allow_methods([Method::GET, Method::POST, Method::GET])
            .allow_headers(["Content-Type", "X-Token"])
            .build();
        let root = app(&cors);

        let response = TestClient::new(&root)
            .get("/items")
            .header("origin", "https://a.example")
            .header("access-control-request-method", "DELETE")
            .send()
            .unwrap();
        response
            .assert_status(StatusCode::OK)
            .assert_header("access-control-allow-methods", "GET, POST")
            .assert_header("access-control-allow-headers", "content-type, x-token")
            .assert_body_eq("items");
    }

    #[test]
    fn test_unlisted_origin_is_untouched() {
        let cors = Cors::builder().allow_origin("https://a.example").build();
        let root = app(&cors);
        let client = TestClient::new(&root);

        client
            .get("/items")
            .header("origin", "https://evil.example")
            .send()
            .unwrap()
            .assert_status(StatusCode::OK)
            .assert_no_header("access-control-allow-origin");

        // The preflight route proceeds to the end of its chain.
        client
            .options("/items")
            .header("origin", "https://evil.example")
            .send()
            .unwrap()
            .assert_status(StatusCode::NOT_FOUND)
            .assert_no_header("access-control-allow-origin");
    }

    #[test]
    fn test_install_on_sub_group_only() {
        let root = Group::root();
        let api = root.sub_group("/api", "api", []).unwrap();
        api.get("/x", |_: &mut Context<'_>| Response::text("x")).unwrap();
        root.get("/y", |_: &mut Context<'_>| Response::text("y")).unwrap();
        Cors::permissive().install(&[&api]).unwrap();

        let client = TestClient::new(&root);
        client
            .options("/api/x")
            .header("origin", "https://a.example")
            .send()
            .unwrap()
            .assert_status(StatusCode::NO_CONTENT)
            .assert_header("access-control-allow-origin", "https://a.example");

        client
            .options("/y")
            .header("origin", "https://a.example")
            .send()
            .unwrap()
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_install_twice_conflicts() {
        let root = Group::root();
        let cors = Cors::permissive();
        cors.install(&[&root]).unwrap();
        assert!(cors.install(&[&root]).is_err());
    }
}
