//! HTTP method dispatch for a single path.
//!
//! [`MethodRouter`] maps HTTP methods to values registered for one path
//! pattern. Extension methods are supported alongside the standard ones.

use http::Method;

/// Maps HTTP methods to values for one route.
///
/// # Example
///
/// ```rust
/// use gantry_router::MethodRouter;
/// use http::Method;
///
/// let router = MethodRouter::new()
///     .get("listUsers")
///     .post("createUser");
///
/// assert_eq!(router.lookup(&Method::GET), Some(&"listUsers"));
/// assert_eq!(router.lookup(&Method::DELETE), None);
/// assert_eq!(router.allow_header(), "GET, POST");
/// ```
#[derive(Debug, Clone)]
pub struct MethodRouter<T> {
    /// Registered entries in registration order.
    entries: Vec<(Method, T)>,
}

impl<T> Default for MethodRouter<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> MethodRouter<T> {
    /// Creates an empty method router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `method`, replacing nothing.
    ///
    /// Returns the value back if the method was already taken.
    pub fn insert(&mut self, method: Method, value: T) -> Result<(), T> {
        if self.contains(&method) {
            return Err(value);
        }
        self.entries.push((method, value));
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert). An already registered
    /// method keeps its original value.
    #[must_use]
    pub fn method(mut self, method: Method, value: T) -> Self {
        let _ = self.insert(method, value);
        self
    }

    /// Registers a GET value.
    #[must_use]
    pub fn get(self, value: T) -> Self {
        self.method(Method::GET, value)
    }

    /// Registers a POST value.
    #[must_use]
    pub fn post(self, value: T) -> Self {
        self.method(Method::POST, value)
    }

    /// Registers a PUT value.
    #[must_use]
    pub fn put(self, value: T) -> Self {
        self.method(Method::PUT, value)
    }

    /// Registers a DELETE value.
    #[must_use]
    pub fn delete(self, value: T) -> Self {
        self.method(Method::DELETE, value)
    }

    /// Registers a PATCH value.
    #[must_use]
    pub fn patch(self, value: T) -> Self {
        self.method(Method::PATCH, value)
    }

    /// Registers an OPTIONS value.
    #[must_use]
    pub fn options(self, value: T) -> Self {
        self.method(Method::OPTIONS, value)
    }

    /// Returns the value registered for `method`.
    #[must_use]
    pub fn lookup(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, v)| v)
    }

    /// Returns true if `method` has a value.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.entries.iter().any(|(m, _)| m == method)
    }

    /// Returns the registered methods in registration order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Formats the registered methods for an `Allow` header.
    #[must_use]
    pub fn allow_header(&self) -> String {
        self.entries
            .iter()
            .map(|(m, _)| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns true if no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
