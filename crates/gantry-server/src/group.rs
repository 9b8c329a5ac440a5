//! Route groups.
//!
//! A [`Group`] is a prefixed, nestable set of routes and middleware. All
//! groups of one tree share a single route table; each route remembers the
//! group that registered it so its middleware can be resolved at dispatch
//! time, root first.
//!
//! ```text
//! root            use(log)
//! └── /api        use(auth)
//!     └── /v1     use(flag)
//!         GET /ping  ->  [log, auth, flag, ping]
//! ```
//!
//! Children are owned by their parent; the parent link is weak.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use gantry_core::{boxed, BoxHandler, ConfigError, Handler};
use gantry_router::Router;
use http::Method;
use parking_lot::RwLock;

/// Route table shared by every group of one tree.
#[derive(Default)]
pub(crate) struct RouteTable {
    pub(crate) router: RwLock<Router<RouteEntry>>,
    sealed: AtomicBool,
}

impl RouteTable {
    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

/// A registered terminal handler and the group that owns it.
#[derive(Clone)]
pub(crate) struct RouteEntry {
    pub(crate) owner: Weak<GroupInner>,
    pub(crate) handler: BoxHandler,
    pub(crate) pattern: Arc<str>,
}

pub(crate) struct GroupInner {
    name: String,
    prefix: String,
    full_prefix: String,
    parent: Weak<GroupInner>,
    table: Arc<RouteTable>,
    state: RwLock<GroupState>,
}

#[derive(Default)]
struct GroupState {
    middleware: Vec<BoxHandler>,
    children: Vec<Group>,
    routes: Vec<(Method, String)>,
}

/// A named, prefixed collection of routes and middleware.
///
/// Cheap to clone; clones refer to the same group.
///
/// ```rust
/// use gantry_core::{Context, Response};
/// use gantry_server::Group;
///
/// let root = Group::root();
/// let api = root.sub_group("/api", "api", Vec::new()).unwrap();
/// api.get("/ping", |_: &mut Context<'_>| Response::text("pong")).unwrap();
///
/// assert_eq!(api.full_prefix(), "/api");
/// assert!(api.get("/ping", |_: &mut Context<'_>| ()).is_err());
/// ```
#[derive(Clone)]
pub struct Group {
    inner: Arc<GroupInner>,
}

impl Group {
    /// Creates the root of a new group tree.
    #[must_use]
    pub fn root() -> Self {
        Self {
            inner: Arc::new(GroupInner {
                name: String::new(),
                prefix: String::new(),
                full_prefix: String::new(),
                parent: Weak::new(),
                table: Arc::default(),
                state: RwLock::default(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<GroupInner>) -> Self {
        Self { inner }
    }

    /// Returns the group's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the prefix relative to the parent, normalized.
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Returns the prefix including every ancestor's. Empty for the root.
    pub fn full_prefix(&self) -> &str {
        &self.inner.full_prefix
    }

    /// Returns the parent group, or `None` for the root.
    pub fn parent(&self) -> Option<Group> {
        self.inner.parent.upgrade().map(Group::from_inner)
    }

    /// Returns the direct children in creation order.
    pub fn children(&self) -> Vec<Group> {
        self.inner.state.read().children.clone()
    }

    /// Returns the `(method, full pattern)` pairs registered on this group.
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.inner.state.read().routes.clone()
    }

    /// Returns true once the server has started and the tree is read-only.
    pub fn is_sealed(&self) -> bool {
        self.inner.table.is_sealed()
    }

    pub(crate) fn table(&self) -> &Arc<RouteTable> {
        &self.inner.table
    }

    /// Seals the whole tree. Further registration fails.
    pub(crate) fn seal(&self) {
        let _guard = self.inner.table.router.write();
        self.inner.table.sealed.store(true, Ordering::Release);
    }

    fn check_open(
        &self,
        operation: &'static str,
        target: impl FnOnce() -> String,
    ) -> Result<(), ConfigError> {
        if self.is_sealed() {
            return Err(ConfigError::Sealed {
                operation,
                target: target(),
            });
        }
        Ok(())
    }

    fn display_prefix(&self) -> String {
        if self.inner.full_prefix.is_empty() {
            "/".to_string()
        } else {
            self.inner.full_prefix.clone()
        }
    }

    /// Appends middleware. Call order is execution order.
    ///
    /// Applies to every route on this group and its descendants, including
    /// ones registered earlier.
    pub fn use_handler<H: Handler>(&self, handler: H) -> Result<&Self, ConfigError> {
        self.use_handlers([boxed(handler)])
    }

    /// Appends several middleware handlers.
    pub fn use_handlers<I>(&self, handlers: I) -> Result<&Self, ConfigError>
    where
        I: IntoIterator<Item = BoxHandler>,
    {
        self.check_open("add middleware to", || self.display_prefix())?;
        self.inner.state.write().middleware.extend(handlers);
        Ok(self)
    }

    /// Registers a terminal handler under this group's prefix.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Sealed`] after the server started,
    /// [`ConfigError::DuplicateRoute`] if the method is already registered
    /// on the same full pattern anywhere in the tree, and
    /// [`ConfigError::InvalidPattern`] for malformed patterns.
    pub fn add_route<H: Handler>(
        &self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&Self, ConfigError> {
        self.add_boxed(method, pattern, boxed(handler))
    }

    /// Like [`add_route`](Self::add_route) for an already boxed handler.
    pub fn add_boxed(
        &self,
        method: Method,
        pattern: &str,
        handler: BoxHandler,
    ) -> Result<&Self, ConfigError> {
        let full = route_pattern(&self.inner.full_prefix, pattern);

        {
            let mut router = self.inner.table.router.write();
            // Checked under the lock so registration cannot race `seal`.
            self.check_open("add route", || format!("{method} {full}"))?;

            let entry = RouteEntry {
                owner: Arc::downgrade(&self.inner),
                handler,
                pattern: Arc::from(full.as_str()),
            };
            router.insert(method.clone(), &full, entry)?;
        }

        tracing::debug!(group = %self.inner.name, %method, pattern = %full, "route registered");
        self.inner.state.write().routes.push((method, full));
        Ok(self)
    }

    /// Registers a `GET` route.
    pub fn get<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, ConfigError> {
        self.add_route(Method::GET, pattern, handler)
    }

    /// Registers a `POST` route.
    pub fn post<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, ConfigError> {
        self.add_route(Method::POST, pattern, handler)
    }

    /// Registers a `PUT` route.
    pub fn put<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, ConfigError> {
        self.add_route(Method::PUT, pattern, handler)
    }

    /// Registers a `PATCH` route.
    pub fn patch<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, ConfigError> {
        self.add_route(Method::PATCH, pattern, handler)
    }

    /// Registers a `DELETE` route.
    pub fn delete<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, ConfigError> {
        self.add_route(Method::DELETE, pattern, handler)
    }

    /// Registers an `OPTIONS` route.
    pub fn options<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, ConfigError> {
        self.add_route(Method::OPTIONS, pattern, handler)
    }

    /// Registers a `HEAD` route.
    pub fn head<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, ConfigError> {
        self.add_route(Method::HEAD, pattern, handler)
    }

    /// Creates a child group mounted at `prefix` with its own middleware.
    ///
    /// An empty prefix mounts the child at the parent's path, which is how
    /// middleware is scoped to a subset of routes without changing URLs.
    pub fn sub_group<I>(
        &self,
        prefix: &str,
        name: &str,
        middleware: I,
    ) -> Result<Group, ConfigError>
    where
        I: IntoIterator<Item = BoxHandler>,
    {
        let full_prefix = join_prefix(&self.inner.full_prefix, prefix);
        self.check_open("create sub-group", || {
            if full_prefix.is_empty() {
                "/".to_string()
            } else {
                full_prefix.clone()
            }
        })?;

        let child = Group {
            inner: Arc::new(GroupInner {
                name: name.to_string(),
                prefix: join_prefix("", prefix),
                full_prefix,
                parent: Arc::downgrade(&self.inner),
                table: Arc::clone(&self.inner.table),
                state: RwLock::new(GroupState {
                    middleware: middleware.into_iter().collect(),
                    ..GroupState::default()
                }),
            }),
        };

        self.inner.state.write().children.push(child.clone());
        Ok(child)
    }

    /// Resolves the middleware that runs before this group's routes:
    /// the root's first, this group's last.
    pub fn effective_middleware(&self) -> Vec<BoxHandler> {
        effective_middleware(&self.inner)
    }
}

pub(crate) fn effective_middleware(group: &Arc<GroupInner>) -> Vec<BoxHandler> {
    let mut lineage = vec![Arc::clone(group)];
    while let Some(parent) = lineage.last().and_then(|g| g.parent.upgrade()) {
        lineage.push(parent);
    }

    lineage
        .iter()
        .rev()
        .flat_map(|g| g.state.read().middleware.clone())
        .collect()
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Group")
            .field("name", &self.inner.name)
            .field("full_prefix", &self.inner.full_prefix)
            .field("middleware", &state.middleware.len())
            .field("routes", &state.routes)
            .field("children", &state.children.len())
            .finish()
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::root()
    }
}

/// Joins two prefixes into `/a/b` form; empty when both are empty.
fn join_prefix(base: &str, rel: &str) -> String {
    let mut out = String::with_capacity(base.len() + rel.len() + 1);
    for segment in base.split('/').chain(rel.split('/')).filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    out
}

fn route_pattern(prefix: &str, pattern: &str) -> String {
    let full = join_prefix(prefix, pattern);
    if full.is_empty() {
        "/".to_string()
    } else {
        full
    }
}
