//! Radix tree node implementation.
//!
//! Each node owns one path segment. Children are split by kind so the
//! matcher can try them in priority order: literal, parameter, wildcard.

use std::cell::RefCell;

use http::Method;

use crate::error::InsertError;
use crate::method_router::MethodRouter;
use crate::params::Params;

/// Kind of path segment held by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal segment (e.g. `users`).
    Static,
    /// Named single-segment parameter (`{id}` or `:id`).
    Param(String),
    /// Catch-all wildcard (`*path`), always the last segment.
    Wildcard(String),
}

/// A node in the radix tree.
#[derive(Debug, Clone)]
pub struct Node<T> {
    /// The path segment this node represents.
    pub segment: String,

    /// The kind of segment.
    pub kind: SegmentKind,

    /// Values for this node, if a route ends here.
    pub methods: Option<MethodRouter<T>>,

    /// Literal children, sorted by segment for binary search.
    pub static_children: Vec<Node<T>>,

    /// Parameter child (at most one per node).
    pub param_child: Option<Box<Node<T>>>,

    /// Wildcard child (at most one per node, always a leaf).
    pub wildcard_child: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    fn with_kind(segment: String, kind: SegmentKind) -> Self {
        Self {
            segment,
            kind,
            methods: None,
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    /// Creates a literal node.
    #[must_use]
    pub fn new_static(segment: impl Into<String>) -> Self {
        Self::with_kind(segment.into(), SegmentKind::Static)
    }

    /// Creates a parameter node.
    #[must_use]
    pub fn new_param(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_kind(format!("{{{name}}}"), SegmentKind::Param(name))
    }

    /// Creates a wildcard node.
    #[must_use]
    pub fn new_wildcard(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_kind(format!("*{name}"), SegmentKind::Wildcard(name))
    }

    /// Creates the root node of a tree.
    #[must_use]
    pub fn root() -> Self {
        Self::new_static("")
    }

    /// Inserts `value` for `method` at `pattern`.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is malformed, if a parameter or wildcard name
    /// disagrees with an existing route at the same position, or if the
    /// method is already registered on this node.
    pub fn insert(&mut self, method: Method, pattern: &str, value: T) -> Result<(), InsertError> {
        let segments = parse_pattern(pattern)?;

        let mut node = self;
        for (segment, kind) in segments {
            node = match kind {
                SegmentKind::Static => node.static_child_mut(segment),
                SegmentKind::Param(name) => {
                    let child = node
                        .param_child
                        .get_or_insert_with(|| Box::new(Node::new_param(name.clone())));
                    if child.kind != SegmentKind::Param(name) {
                        return Err(InsertError::InvalidPattern {
                            pattern: pattern.to_string(),
                            reason: "parameter name differs from an existing route at the same position",
                        });
                    }
                    &mut **child
                }
                SegmentKind::Wildcard(name) => {
                    let child = node
                        .wildcard_child
                        .get_or_insert_with(|| Box::new(Node::new_wildcard(name.clone())));
                    if child.kind != SegmentKind::Wildcard(name) {
                        return Err(InsertError::InvalidPattern {
                            pattern: pattern.to_string(),
                            reason: "wildcard name differs from an existing route at the same position",
                        });
                    }
                    &mut **child
                }
            };
        }

        node.methods
            .get_or_insert_with(MethodRouter::new)
            .insert(method.clone(), value)
            .map_err(|_| InsertError::Conflict {
                method,
                pattern: pattern.to_string(),
            })
    }

    fn static_child_mut(&mut self, segment: String) -> &mut Node<T> {
        let index = match self
            .static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment.as_str()))
        {
            Ok(index) => index,
            Err(index) => {
                self.static_children.insert(index, Node::new_static(segment));
                index
            }
        };
        &mut self.static_children[index]
    }

    /// Matches a request path against the tree.
    ///
    /// Returns the method table of the matching node together with the
    /// captured parameters.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        self.match_where(path, |_| true)
    }

    /// Matches a path, only accepting nodes that have a value for `method`.
    ///
    /// A better-ranked node that lacks the method does not shadow a
    /// lower-ranked one that has it.
    #[must_use]
    pub fn match_method(&self, method: &Method, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        self.match_where(path, |methods| methods.lookup(method).is_some())
    }

    /// Returns the methods of every pattern matching `path`, best match
    /// first, without duplicates.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let seen = RefCell::new(Vec::new());
        // Rejecting every leaf makes the matcher visit all of them.
        self.match_where(path, |methods| {
            let mut seen = seen.borrow_mut();
            for method in methods.allowed_methods() {
                if !seen.contains(&method) {
                    seen.push(method);
                }
            }
            false
        });
        seen.into_inner()
    }

    fn match_where<F>(&self, path: &str, accept: F) -> Option<(&MethodRouter<T>, Params)>
    where
        F: Fn(&MethodRouter<T>) -> bool,
    {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        let methods = self.match_segments(&segments, &mut params, &accept)?;
        Some((methods, params))
    }

    fn match_segments<'a, F>(
        &'a self,
        segments: &[&str],
        params: &mut Params,
        accept: &F,
    ) -> Option<&'a MethodRouter<T>>
    where
        F: Fn(&MethodRouter<T>) -> bool,
    {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.methods.as_ref().filter(|m| accept(m));
        };

        if let Some(child) = self.find_static_child(segment) {
            if let Some(found) = child.match_segments(remaining, params, accept) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push(name.clone(), *segment);
                if let Some(found) = child.match_segments(remaining, params, accept) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let (SegmentKind::Wildcard(name), Some(methods)) = (&child.kind, &child.methods) {
                if accept(methods) {
                    params.push(name.clone(), segments.join("/"));
                    return Some(methods);
                }
            }
        }

        None
    }

    fn find_static_child(&self, segment: &str) -> Option<&Node<T>> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}

/// Splits a pattern into typed segments, validating it on the way.
pub(crate) fn parse_pattern(pattern: &str) -> Result<Vec<(String, SegmentKind)>, InsertError> {
    let invalid = |reason| InsertError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    let raw: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let mut segments = Vec::with_capacity(raw.len());

    for (i, s) in raw.iter().enumerate() {
        let kind = if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if name.is_empty() {
                return Err(invalid("empty parameter name"));
            }
            SegmentKind::Param(name.to_string())
        } else if let Some(name) = s.strip_prefix(':') {
            if name.is_empty() {
                return Err(invalid("empty parameter name"));
            }
            SegmentKind::Param(name.to_string())
        } else if let Some(name) = s.strip_prefix('*') {
            if i + 1 != raw.len() {
                return Err(invalid("wildcard must be the last segment"));
            }
            let name = if name.is_empty() { "*" } else { name };
            SegmentKind::Wildcard(name.to_string())
        } else {
            SegmentKind::Static
        };
        segments.push(((*s).to_string(), kind));
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(routes: &[&'static str]) -> Node<&'static str> {
        let mut root = Node::root();
        for route in routes {
            root.insert(Method::GET, route, *route).unwrap();
        }
        root
    }

    fn matched(root: &Node<&'static str>, path: &str) -> Option<(&'static str, Params)> {
        root.match_path(path)
            .and_then(|(m, p)| m.lookup(&Method::GET).map(|v| (*v, p)))
    }

    #[test]
    fn test_parse_pattern_kinds() {
        let segments = parse_pattern("/users/{id}/:tab/*rest").unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].1, SegmentKind::Static);
        assert_eq!(segments[1].1, SegmentKind::Param("id".to_string()));
        assert_eq!(segments[2].1, SegmentKind::Param("tab".to_string()));
        assert_eq!(segments[3].1, SegmentKind::Wildcard("rest".to_string()));
    }

    #[test]
    fn test_parse_pattern_bare_wildcard() {
        let segments = parse_pattern("/files/*").unwrap();
        assert_eq!(segments[1].1, SegmentKind::Wildcard("*".to_string()));
    }

    #[test]
    fn test_parse_pattern_rejects_inner_wildcard() {
        let err = parse_pattern("/files/*path/more").unwrap_err();
        assert!(matches!(err, InsertError::InvalidPattern { .. }));
    }

    #[test]
    fn test_parse_pattern_rejects_empty_param() {
        assert!(parse_pattern("/users/{}").is_err());
        assert!(parse_pattern("/users/:").is_err());
    }

    #[test]
    fn test_literal_beats_wildcard() {
        let root = tree(&["/files/*", "/files/special"]);

        let (route, params) = matched(&root, "/files/special").unwrap();
        assert_eq!(route, "/files/special");
        assert!(params.is_empty());

        let (route, params) = matched(&root, "/files/other/thing").unwrap();
        assert_eq!(route, "/files/*");
        assert_eq!(params.get("*"), Some("other/thing"));
    }

    #[test]
    fn test_literal_beats_param() {
        let root = tree(&["/users/{id}", "/users/me"]);

        assert_eq!(matched(&root, "/users/me").unwrap().0, "/users/me");
        let (route, params) = matched(&root, "/users/7").unwrap();
        assert_eq!(route, "/users/{id}");
        assert_eq!(params.get("id"), Some("7"));
    }

    #[test]
    fn test_backtracking_discards_stray_params() {
        let root = tree(&["/a/{x}/deep", "/a/*rest"]);

        let (route, params) = matched(&root, "/a/b/c").unwrap();
        assert_eq!(route, "/a/*rest");
        assert_eq!(params.get("x"), None);
        assert_eq!(params.get("rest"), Some("b/c"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_static_dead_end_falls_back_to_param() {
        let root = tree(&["/users/me/settings", "/users/{id}"]);

        let (route, params) = matched(&root, "/users/me").unwrap();
        assert_eq!(route, "/users/{id}");
        assert_eq!(params.get("id"), Some("me"));
    }

    #[test]
    fn test_conflicting_param_names_rejected() {
        let mut root = Node::root();
        root.insert(Method::GET, "/users/{id}", 1).unwrap();
        let err = root.insert(Method::POST, "/users/{name}", 2).unwrap_err();
        assert!(matches!(err, InsertError::InvalidPattern { .. }));
    }

    #[test]
    fn test_duplicate_route_conflicts() {
        let mut root = Node::root();
        root.insert(Method::GET, "/ping", 1).unwrap();
        let err = root.insert(Method::GET, "/ping/", 2).unwrap_err();
        assert_eq!(
            err,
            InsertError::Conflict {
                method: Method::GET,
                pattern: "/ping/".to_string()
            }
        );
    }

    #[test]
    fn test_colon_and_brace_params_share_node() {
        let mut root = Node::root();
        root.insert(Method::GET, "/items/:id", "get").unwrap();
        root.insert(Method::DELETE, "/items/{id}", "delete").unwrap();

        let (methods, params) = root.match_path("/items/9").unwrap();
        assert_eq!(methods.lookup(&Method::GET), Some(&"get"));
        assert_eq!(methods.lookup(&Method::DELETE), Some(&"delete"));
        assert_eq!(params.get("id"), Some("9"));
    }

    #[test]
    fn test_method_match_skips_shadowing_literal() {
        let mut root = Node::root();
        root.insert(Method::GET, "/items", "list").unwrap();
        root.insert(Method::OPTIONS, "/*any", "preflight").unwrap();

        let (methods, params) = root.match_method(&Method::OPTIONS, "/items").unwrap();
        assert_eq!(methods.lookup(&Method::OPTIONS), Some(&"preflight"));
        assert_eq!(params.get("any"), Some("items"));

        let (methods, _) = root.match_path("/items").unwrap();
        assert_eq!(methods.lookup(&Method::GET), Some(&"list"));
        assert!(root.match_method(&Method::DELETE, "/items").is_none());
    }

    #[test]
    fn test_root_route() {
        let root = tree(&["/"]);
        assert_eq!(matched(&root, "/").unwrap().0, "/");
        assert!(matched(&root, "/nope").is_none());
    }
}
