//! High-level router API.

use http::Method;

use crate::error::InsertError;
use crate::method_router::MethodRouter;
use crate::node::Node;
use crate::params::Params;
use crate::{Match, RouteMatch};

/// A radix tree router mapping `(method, pattern)` to values of type `T`.
///
/// # Route priority
///
/// At every depth the router tries, in order:
///
/// 1. **Literal segments** (`/files/special`)
/// 2. **Parameter segments** (`/files/{name}`)
/// 3. **Wildcards** (`/files/*path`)
///
/// A branch that fails further down is abandoned and the next candidate at
/// the same depth is tried.
///
/// # Example
///
/// ```rust
/// use gantry_router::{Match, Router};
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert(Method::GET, "/files/*path", "wildcard").unwrap();
/// router.insert(Method::GET, "/files/special", "literal").unwrap();
///
/// match router.match_route(&Method::GET, "/files/special") {
///     Match::Found(m) => assert_eq!(*m.value, "literal"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    route_count: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `value` for `method` on `pattern`.
    ///
    /// # Errors
    ///
    /// [`InsertError::Conflict`] if the method is already registered on an
    /// equivalent pattern, [`InsertError::InvalidPattern`] if the pattern is
    /// malformed.
    pub fn insert(&mut self, method: Method, pattern: &str, value: T) -> Result<(), InsertError> {
        self.root.insert(method, pattern, value)?;
        self.route_count += 1;
        Ok(())
    }

    /// Matches a request against the router.
    ///
    /// A route registered for `method` is preferred even when a
    /// higher-priority pattern matches the path for other methods only. If
    /// no route has the method, every pattern matching the path contributes
    /// to the [`Match::MethodNotAllowed`] list; with none it is
    /// [`Match::NotFound`].
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Match<'_, T> {
        if let Some((methods, params)) = self.root.match_method(method, path) {
            if let Some(value) = methods.lookup(method) {
                return Match::Found(RouteMatch::new(value, params));
            }
        }
        let allowed = self.root.allowed_methods(path);
        if allowed.is_empty() {
            Match::NotFound
        } else {
            Match::MethodNotAllowed { allowed }
        }
    }

    /// Matches a path regardless of method.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        self.root.match_path(path)
    }

    /// Returns the number of registered `(method, pattern)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}
