//! Test response wrapper.

use std::fmt;

use bytes::Bytes;
use gantry_server::DispatchReport;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;

use crate::capture::CapturingWriter;
use crate::error::TestError;

/// A captured response with assertion helpers.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    status_calls: usize,
    report: DispatchReport,
}

impl TestResponse {
    pub(crate) fn new(writer: CapturingWriter, report: DispatchReport) -> Self {
        let status_calls = writer.status_calls();
        let (status, headers, body) = writer.into_parts();
        Self {
            status,
            headers,
            body: Bytes::from(body),
            status_calls,
            report,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON value.
    pub fn json_value(&self) -> Result<serde_json::Value, TestError> {
        self.json()
    }

    /// Returns how many times the chain set a status.
    #[must_use]
    pub fn status_calls(&self) -> usize {
        self.status_calls
    }

    /// Returns true if a handler panicked.
    #[must_use]
    pub fn faulted(&self) -> bool {
        self.report.faulted
    }

    /// Returns the dispatch report.
    #[must_use]
    pub fn report(&self) -> &DispatchReport {
        &self.report
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status differs.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts a header value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("header '{name}' not found in {:?}", self.headers));
        assert_eq!(actual, expected, "header '{name}'");
        self
    }

    /// Asserts a header is absent.
    ///
    /// # Panics
    ///
    /// Panics if the header is present.
    pub fn assert_no_header(&self, name: &str) -> &Self {
        assert!(
            !self.headers.contains_key(name),
            "header '{name}' unexpectedly present: {:?}",
            self.headers.get(name)
        );
        self
    }

    /// Asserts the content type starts with `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the content type is missing or differs.
    pub fn assert_content_type(&self, expected: &str) -> &Self {
        let actual = self.header_str(header::CONTENT_TYPE.as_str()).unwrap_or("");
        assert!(
            actual.starts_with(expected),
            "content type: expected '{expected}', got '{actual}'"
        );
        self
    }

    /// Asserts the body text.
    ///
    /// # Panics
    ///
    /// Panics if the body differs.
    pub fn assert_body_eq(&self, expected: &str) -> &Self {
        assert_eq!(String::from_utf8_lossy(&self.body), expected, "body mismatch");
        self
    }

    /// Asserts the JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or differs.
    pub fn assert_json_eq(&self, expected: &serde_json::Value) -> &Self {
        match self.json_value() {
            Ok(actual) => assert_eq!(&actual, expected, "JSON body mismatch"),
            Err(err) => panic!("body is not JSON ({err}): {}", String::from_utf8_lossy(&self.body)),
        }
        self
    }

    /// Asserts one field of the JSON body, addressed by a dotted path such
    /// as `error.code` or `items.0.name`.
    ///
    /// # Panics
    ///
    /// Panics if the field is missing or differs.
    pub fn assert_json_field(&self, path: &str, expected: &serde_json::Value) -> &Self {
        let json = match self.json_value() {
            Ok(json) => json,
            Err(err) => panic!("body is not JSON ({err})"),
        };
        let actual = json_path(&json, path)
            .unwrap_or_else(|| panic!("JSON path '{path}' not found in {json}"));
        assert_eq!(actual, expected, "JSON field '{path}'");
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("faulted", &self.report.faulted)
            .finish()
    }
}

fn json_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match segment.parse::<usize>() {
            Ok(index) => current.get(index),
            Err(_) => current.get(segment),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::{Context, Response};
    use gantry_server::Group;
    use serde_json::json;

    use crate::TestClient;

    #[test]
    fn test_json_path() {
        let value = json!({ "user": { "tags": ["admin", "ops"] } });
        assert_eq!(json_path(&value, "user.tags.1"), Some(&json!("ops")));
        assert_eq!(json_path(&value, "user.missing"), None);
    }

    #[test]
    fn test_panicking_route_is_reported() {
        let root = Group::root();
        root.get("/boom", |_: &mut Context<'_>| -> Response { panic!("boom") })
            .unwrap();

        let response = TestClient::new(&root).get("/boom").send().unwrap();
        response
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
            .assert_content_type("application/json")
            .assert_json_field("error.code", &json!("INTERNAL_ERROR"));
        assert!(response.faulted());
        assert_eq!(response.status_calls(), 1);
    }

    #[test]
    fn test_headers_from_middleware_survive() {
        let root = Group::root();
        root.use_handler(|ctx: &mut Context<'_>| {
            ctx.headers_mut().insert("x-trace", "t1".parse().unwrap());
        })
        .unwrap();
        root.get("/", |_: &mut Context<'_>| Response::text("hi")).unwrap();

        let response = TestClient::new(&root).get("/").send().unwrap();
        response
            .assert_header("x-trace", "t1")
            .assert_no_header("allow")
            .assert_body_eq("hi");
        assert_eq!(response.report().route.as_deref(), Some("/"));
    }
}
