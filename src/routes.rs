//! Route keys, specificity ordering, and the dispatch table.
//!
//! Routes are declared as symbolic keys — `<verb>_<segment>_<segment>…`,
//! with `$name` marking a path variable:
//!
//! ```text
//! get_users_$id    →  GET  /users/:id
//! post_orders      →  POST /orders
//! get              →  GET  /
//! ```
//!
//! The table is an **ordered** list tried front to back; the first pattern
//! that structurally matches the request path wins. Because a variable
//! segment is a wildcard relative to a static one, correctness of
//! first-match lookup depends entirely on the order — which is why the
//! table is sorted by specificity at build time and immutable afterwards.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RouteError;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// The sigil marking a variable segment in a route key.
const VAR_SIGIL: char = '$';

// ── Segments and normalized routes ────────────────────────────────────────────

/// One `/`-delimited element of a path pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Segment {
    Static(String),
    Variable(String),
}

/// A route key parsed into its method and path pattern.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct NormalizedRoute {
    pub(crate) method: Method,
    pub(crate) segments: Vec<Segment>,
}

impl NormalizedRoute {
    /// Parses a route key. Reported errors name the offending key so a bad
    /// entry is diagnosable from the startup failure alone.
    pub(crate) fn parse(key: &str) -> Result<Self, RouteError> {
        let mut tokens = key.split('_');
        let verb = tokens.next().unwrap_or("");
        if verb.is_empty() {
            return Err(RouteError::EmptyKey);
        }
        let method = Method::from_key_token(verb).ok_or_else(|| RouteError::UnknownMethod {
            key: key.to_owned(),
            token: verb.to_owned(),
        })?;

        let mut segments = Vec::new();
        for token in tokens {
            if let Some(name) = token.strip_prefix(VAR_SIGIL) {
                if name.is_empty() {
                    return Err(RouteError::EmptyVariable { key: key.to_owned() });
                }
                segments.push(Segment::Variable(name.to_owned()));
            } else {
                segments.push(Segment::Static(token.to_owned()));
            }
        }
        Ok(Self { method, segments })
    }

    /// Renders the pattern with the router's `:name` variable syntax,
    /// always anchored with a leading `/`.
    pub(crate) fn pattern(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_owned();
        }
        let mut out = String::new();
        for seg in &self.segments {
            out.push('/');
            match seg {
                Segment::Static(s) => out.push_str(s),
                Segment::Variable(name) => {
                    out.push(':');
                    out.push_str(name);
                }
            }
        }
        out
    }
}

// ── Specificity ───────────────────────────────────────────────────────────────

/// Total order over path patterns such that, tried front to back, the most
/// specific pattern matches first for any concrete path.
///
/// Walk segment indices left to right:
/// - a longer pattern sorts before its strict prefix;
/// - at the first differing index, a static segment beats a variable;
/// - two variables are ordered by longer name first (both are wildcards at
///   that position, so this only affects registration/display order, never
///   which pattern matches);
/// - two differing statics can never both match one path, so their relative
///   order is immaterial and the walk continues;
/// - fully equal patterns are `Equal` — the build sort is stable, so ties
///   keep their declaration order.
pub(crate) fn specificity(a: &[Segment], b: &[Segment]) -> Ordering {
    for i in 0.. {
        match (a.get(i), b.get(i)) {
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
            (Some(x), Some(y)) => match (x, y) {
                (Segment::Static(_), Segment::Variable(_)) => return Ordering::Less,
                (Segment::Variable(_), Segment::Static(_)) => return Ordering::Greater,
                (Segment::Variable(n), Segment::Variable(m)) if n.len() != m.len() => {
                    return m.len().cmp(&n.len());
                }
                _ => {}
            },
        }
    }
    Ordering::Equal
}

// ── Route declaration builder ─────────────────────────────────────────────────

/// Collects `(route key, handler)` declarations. Each [`Routes::on`] call
/// returns `self` so declarations chain naturally; [`Routes::build`]
/// validates every key and produces the sorted [`RouteTable`].
///
/// ```rust,no_run
/// # use courier::{HttpContext, HandlerError, Reply, Routes};
/// # async fn list_users(_: HttpContext) -> Result<Reply, HandlerError> { todo!() }
/// # async fn get_user(_: HttpContext) -> Result<Reply, HandlerError> { todo!() }
/// let table = Routes::new()
///     .on("get_users", list_users)
///     .on("get_users_$id", get_user)
///     .build()
///     .expect("invalid route key");
/// ```
pub struct Routes {
    declared: Vec<(String, BoxedHandler)>,
}

impl Routes {
    pub fn new() -> Self {
        Self { declared: Vec::new() }
    }

    /// Declare a handler under a route key. Declaration order is irrelevant
    /// except among patterns of equal specificity, where it is preserved.
    pub fn on(mut self, key: &str, handler: impl Handler) -> Self {
        self.declared.push((key.to_owned(), handler.into_boxed_handler()));
        self
    }

    /// Validates every key and sorts the entries by specificity.
    pub fn build(self) -> Result<RouteTable, RouteError> {
        let mut entries = Vec::with_capacity(self.declared.len());
        for (key, handler) in self.declared {
            let route = NormalizedRoute::parse(&key)?;
            entries.push(RouteEntry { route, handler });
        }
        // Stable sort: equal-specificity routes keep declaration order.
        entries.sort_by(|a, b| specificity(&a.route.segments, &b.route.segments));
        Ok(RouteTable { entries })
    }
}

impl Default for Routes {
    fn default() -> Self {
        Self::new()
    }
}

// ── RouteTable ────────────────────────────────────────────────────────────────

pub(crate) struct RouteEntry {
    pub(crate) route: NormalizedRoute,
    pub(crate) handler: BoxedHandler,
}

/// The dispatch table: routes in specificity order, first match wins.
///
/// Built once at startup via [`Routes::build`], immutable afterwards, shared
/// across connection tasks behind an `Arc`.
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes().collect::<Vec<_>>())
            .finish()
    }
}

impl RouteTable {
    /// The registered routes in dispatch order. Exposed for startup logging
    /// and introspection.
    pub fn routes(&self) -> impl Iterator<Item = (Method, String)> + '_ {
        self.entries.iter().map(|e| (e.route.method, e.route.pattern()))
    }

    /// First structural match in table order, binding path variables.
    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let concrete: Vec<&str> = split_path(path);
        for entry in &self.entries {
            if entry.route.method != method {
                continue;
            }
            if let Some(params) = match_segments(&entry.route.segments, &concrete) {
                return Some((Arc::clone(&entry.handler), params));
            }
        }
        None
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Matches a pattern against concrete path segments, binding variables.
fn match_segments(pattern: &[Segment], concrete: &[&str]) -> Option<HashMap<String, String>> {
    if pattern.len() != concrete.len() {
        return None;
    }
    let mut params = HashMap::new();
    for (seg, got) in pattern.iter().zip(concrete) {
        match seg {
            Segment::Static(s) => {
                if s != got {
                    return None;
                }
            }
            Segment::Variable(name) => {
                params.insert(name.clone(), (*got).to_owned());
            }
        }
    }
    Some(params)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::reply::Reply;
    use crate::context::HttpContext;

    fn seg(pattern: &str) -> Vec<Segment> {
        pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Variable(name.to_owned()),
                None => Segment::Static(s.to_owned()),
            })
            .collect()
    }

    #[test]
    fn normalizes_variable_key() {
        let r = NormalizedRoute::parse("get_users_$id").unwrap();
        assert_eq!(r.method, Method::Get);
        assert_eq!(r.pattern(), "/users/:id");
    }

    #[test]
    fn normalizes_static_key() {
        let r = NormalizedRoute::parse("post_orders").unwrap();
        assert_eq!(r.method, Method::Post);
        assert_eq!(r.pattern(), "/orders");
    }

    #[test]
    fn bare_verb_maps_to_root() {
        let r = NormalizedRoute::parse("get").unwrap();
        assert_eq!(r.pattern(), "/");
    }

    #[test]
    fn rejects_unknown_verb() {
        let err = NormalizedRoute::parse("users_$id").unwrap_err();
        assert!(matches!(err, RouteError::UnknownMethod { .. }));
    }

    #[test]
    fn rejects_empty_key_and_bare_sigil() {
        assert_eq!(NormalizedRoute::parse("").unwrap_err(), RouteError::EmptyKey);
        assert!(matches!(
            NormalizedRoute::parse("get_users_$").unwrap_err(),
            RouteError::EmptyVariable { .. }
        ));
    }

    #[test]
    fn static_sorts_before_variable() {
        assert_eq!(specificity(&seg("/users/active"), &seg("/users/:id")), Ordering::Less);
        assert_eq!(specificity(&seg("/users/:id"), &seg("/users/active")), Ordering::Greater);
    }

    #[test]
    fn longer_pattern_sorts_before_prefix() {
        assert_eq!(specificity(&seg("/users/:id/posts"), &seg("/users/:id")), Ordering::Less);
        assert_eq!(specificity(&seg("/users"), &seg("/users/:id")), Ordering::Greater);
    }

    #[test]
    fn variable_name_length_breaks_ties() {
        assert_eq!(specificity(&seg("/users/:ident"), &seg("/users/:id")), Ordering::Less);
    }

    #[test]
    fn equal_patterns_compare_equal() {
        assert_eq!(specificity(&seg("/users/:id"), &seg("/users/:id")), Ordering::Equal);
        assert_eq!(specificity(&seg("/"), &seg("/")), Ordering::Equal);
    }

    async fn stub(_ctx: HttpContext) -> Result<Reply, HandlerError> {
        Ok(Reply::scalar(serde_json::Value::Null))
    }

    #[test]
    fn lookup_prefers_most_specific() {
        let table = Routes::new()
            .on("get_users_$id", stub)
            .on("get_users_active", stub)
            .build()
            .unwrap();

        let order: Vec<String> = table.routes().map(|(_, p)| p).collect();
        assert_eq!(order, vec!["/users/active", "/users/:id"]);

        // The static route shadows the variable one for its exact path.
        let (_, params) = table.lookup(Method::Get, "/users/active").unwrap();
        assert!(params.is_empty());

        let (_, params) = table.lookup(Method::Get, "/users/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn lookup_respects_method() {
        let table = Routes::new().on("post_orders", stub).build().unwrap();
        assert!(table.lookup(Method::Post, "/orders").is_some());
        assert!(table.lookup(Method::Get, "/orders").is_none());
    }

    #[test]
    fn build_reports_bad_key() {
        let err = Routes::new().on("fetch_users", stub).build().unwrap_err();
        assert!(matches!(err, RouteError::UnknownMethod { .. }));
    }

    #[test]
    fn sort_is_stable_for_equal_routes() {
        // Two distinct variable names of equal length are equal-specificity;
        // the stable sort must keep declaration order.
        let table = Routes::new()
            .on("get_items_$ab", stub)
            .on("get_items_$cd", stub)
            .build()
            .unwrap();
        let order: Vec<String> = table.routes().map(|(_, p)| p).collect();
        assert_eq!(order, vec!["/items/:ab", "/items/:cd"]);
    }
}
