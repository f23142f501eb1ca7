// Route table: registration, precedence and lookup

use crate::context::Role;
use crate::handler::Handler;
use crate::logging::{debug, info};
use crate::method::{HttpMethod, MethodMask};
use crate::pattern::{PatternError, RouteParams, RoutePattern, normalize_escapes};
use crate::static_assets::{StaticFileHandler, StaticFiles};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A compiled route. Immutable once built.
#[derive(Clone)]
pub struct Route {
    pub pattern: RoutePattern,
    pub methods: MethodMask,
    /// Least privileged role allowed through. `Guest` means public.
    pub role: Role,
    pub handler: Arc<dyn Handler>,
}

impl Route {
    pub fn new(
        methods: impl Into<MethodMask>,
        template: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: RoutePattern::compile(template)?,
            methods: methods.into(),
            role: Role::Guest,
            handler,
        })
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// HEAD is served wherever GET is.
    pub fn allows(&self, method: HttpMethod) -> bool {
        self.methods.allows(method)
            || (method == HttpMethod::HEAD && self.methods.allows(HttpMethod::GET))
    }

    pub fn template(&self) -> &str {
        self.pattern.template()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.template())
            .field("methods", &self.methods.methods())
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Errors raised while assembling a route table.
#[derive(Debug, Error)]
pub enum RouteBuildError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Unknown handler: {0}")]
    UnknownHandler(String),

    #[error("Invalid route: {0}")]
    Invalid(String),

    #[error("Failed to load routes: {0}")]
    Load(String),
}

/// Result of a table lookup.
#[derive(Debug)]
pub enum RouteMatch {
    Found {
        route: Arc<Route>,
        params: RouteParams,
    },
    /// The path matched but no matching route accepts the method.
    MethodNotAllowed(Vec<HttpMethod>),
    NotFound,
}

/// The complete, immutable set of routes.
///
/// Static routes are looked up by exact path. Dynamic routes are scanned in
/// precedence order, fixed when the table is built:
///
/// 1. more fully-literal path segments first,
/// 2. then fewer greedy `path` captures,
/// 3. then fewer captures,
/// 4. then registration order.
#[derive(Debug, Default)]
pub struct RouteTable {
    static_routes: HashMap<String, Vec<Arc<Route>>>,
    dynamic_routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// Resolve `method raw_path` to exactly one route.
    pub fn lookup(&self, method: &str, raw_path: &str) -> RouteMatch {
        let method = HttpMethod::from_str(method);
        let mut allowed = MethodMask::NONE;
        let raw_path = normalize_escapes(raw_path);
        let raw_path = raw_path.as_ref();

        let statics = self
            .static_routes
            .get(raw_path)
            .into_iter()
            .flatten()
            .map(|route| (route, RouteParams::new()));
        let dynamics = self
            .dynamic_routes
            .iter()
            .filter_map(|route| route.pattern.matches(raw_path).map(|params| (route, params)));

        for (route, params) in statics.chain(dynamics) {
            match method {
                Some(m) if route.allows(m) => {
                    return RouteMatch::Found {
                        route: route.clone(),
                        params,
                    };
                }
                _ => allowed = allowed | route.methods,
            }
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            if allowed.allows(HttpMethod::GET) {
                allowed = allowed | HttpMethod::HEAD;
            }
            RouteMatch::MethodNotAllowed(allowed.methods())
        }
    }

    pub fn len(&self) -> usize {
        self.static_routes.values().map(Vec::len).sum::<usize>() + self.dynamic_routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dynamic routes in scan order.
    pub fn dynamic_routes(&self) -> impl Iterator<Item = &Route> {
        self.dynamic_routes.iter().map(|r| r.as_ref())
    }

    pub fn static_templates(&self) -> impl Iterator<Item = &str> {
        self.static_routes
            .values()
            .filter_map(|routes| routes.first())
            .map(|route| route.template())
    }
}

/// Collects routes and compiles them into a [`RouteTable`].
///
/// Pattern errors are held until [`build`](Self::build), which fails on the
/// first one.
///
/// ```
/// use trestle_core::handler::{handler_fn, HandlerResult};
/// use trestle_core::routing::{RouteMatch, RouteTable};
///
/// let show = handler_fn(|_ctx| Box::pin(async { Ok(HandlerResult::text("article")) }));
/// let table = RouteTable::builder()
///     .get("/article/<int:id>", show)
///     .build()
///     .unwrap();
///
/// match table.lookup("GET", "/article/42") {
///     RouteMatch::Found { params, .. } => assert_eq!(params.get_int("id"), Some(42)),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
    error: Option<RouteBuildError>,
    static_files: Option<Arc<dyn StaticFiles>>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `template` for `methods`.
    pub fn route(
        self,
        methods: impl Into<MethodMask>,
        template: &str,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.route_with_role(methods, template, Role::Guest, handler)
    }

    pub fn route_with_role(
        mut self,
        methods: impl Into<MethodMask>,
        template: &str,
        role: Role,
        handler: Arc<dyn Handler>,
    ) -> Self {
        match Route::new(methods, template, handler) {
            Ok(route) => self.routes.push(route.with_role(role)),
            Err(e) => {
                self.error.get_or_insert(e.into());
            }
        }
        self
    }

    /// Register an already compiled route.
    pub fn add(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn get(self, template: &str, handler: Arc<dyn Handler>) -> Self {
        self.route(MethodMask::GET, template, handler)
    }

    pub fn post(self, template: &str, handler: Arc<dyn Handler>) -> Self {
        self.route(MethodMask::POST, template, handler)
    }

    pub fn any(self, template: &str, handler: Arc<dyn Handler>) -> Self {
        self.route(MethodMask::ANY, template, handler)
    }

    /// Append `GET|HEAD /static/<path:path>` and `/favicon.ico` served from `files`.
    pub fn with_static_files(mut self, files: Arc<dyn StaticFiles>) -> Self {
        self.static_files = Some(files);
        self
    }

    pub fn build(mut self) -> Result<RouteTable, RouteBuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        if let Some(files) = self.static_files.take() {
            let methods = MethodMask::GET | MethodMask::HEAD;
            self.routes.push(Route::new(
                methods,
                "/static/<path:path>",
                Arc::new(StaticFileHandler::new(files.clone())),
            )?);
            self.routes.push(Route::new(
                methods,
                "/favicon.ico",
                Arc::new(StaticFileHandler::fixed(files, "favicon.ico")),
            )?);
        }

        let mut table = RouteTable::default();
        let mut dynamic = Vec::new();

        for (index, route) in self.routes.into_iter().enumerate() {
            if route.methods.is_empty() {
                return Err(RouteBuildError::Invalid(format!(
                    "{} accepts no methods",
                    route.template()
                )));
            }
            debug!(
                pattern = %route.template(),
                methods = ?route.methods.methods(),
                role = ?route.role,
                "Registering route"
            );
            if route.pattern.is_static() {
                table
                    .static_routes
                    .entry(route.pattern.encoded_template().to_string())
                    .or_default()
                    .push(Arc::new(route));
            } else {
                dynamic.push((index, route));
            }
        }

        dynamic.sort_by_key(|(index, route)| {
            (
                Reverse(route.pattern.literal_segments()),
                route.pattern.greedy_captures(),
                route.pattern.captures().len(),
                *index,
            )
        });
        table.dynamic_routes = dynamic
            .into_iter()
            .map(|(_, route)| Arc::new(route))
            .collect();

        info!(
            static_routes = table.static_routes.len(),
            dynamic_routes = table.dynamic_routes.len(),
            "Route table built"
        );
        Ok(table)
    }
}

/// Something that can produce a fresh route table, e.g. for hot reload.
pub trait RouteSource: Send + Sync {
    fn build(&self) -> Result<RouteTable, RouteBuildError>;

    /// Files whose modification should trigger a rebuild.
    fn watch_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

impl<F> RouteSource for F
where
    F: Fn() -> Result<RouteTable, RouteBuildError> + Send + Sync,
{
    fn build(&self) -> Result<RouteTable, RouteBuildError> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, HandlerResult};

    fn named(name: &'static str) -> Arc<dyn Handler> {
        handler_fn(move |_ctx| Box::pin(async move { Ok(HandlerResult::text(name)) }))
    }

    fn matched(table: &RouteTable, method: &str, path: &str) -> Option<String> {
        match table.lookup(method, path) {
            RouteMatch::Found { route, .. } => Some(route.template().to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_static_exact_match_only() {
        let table = RouteTable::builder()
            .get("/about", named("about"))
            .build()
            .unwrap();
        assert_eq!(matched(&table, "GET", "/about").as_deref(), Some("/about"));
        assert!(matches!(table.lookup("GET", "/about/"), RouteMatch::NotFound));
        assert!(matches!(table.lookup("GET", "/About"), RouteMatch::NotFound));
    }

    #[test]
    fn test_static_beats_dynamic_in_any_order() {
        let a = RouteTable::builder()
            .get("/article/<id>", named("dyn"))
            .get("/article/new", named("static"))
            .build()
            .unwrap();
        let b = RouteTable::builder()
            .get("/article/new", named("static"))
            .get("/article/<id>", named("dyn"))
            .build()
            .unwrap();
        for table in [&a, &b] {
            assert_eq!(matched(table, "GET", "/article/new").as_deref(), Some("/article/new"));
            assert_eq!(matched(table, "GET", "/article/9").as_deref(), Some("/article/<id>"));
        }
    }

    #[test]
    fn test_non_ascii_routes_match_encoded_paths() {
        let table = RouteTable::builder()
            .get("/关于", named("about"))
            .get("/wiki/页面/<id>", named("page"))
            .get("/about us", named("spaced"))
            .build()
            .unwrap();

        assert_eq!(matched(&table, "GET", "/%E5%85%B3%E4%BA%8E").as_deref(), Some("/关于"));
        assert_eq!(matched(&table, "GET", "/%e5%85%b3%e4%ba%8e").as_deref(), Some("/关于"));
        assert_eq!(matched(&table, "GET", "/about%20us").as_deref(), Some("/about us"));

        match table.lookup("GET", "/wiki/%E9%A1%B5%E9%9D%A2/42") {
            RouteMatch::Found { route, params } => {
                assert_eq!(route.template(), "/wiki/页面/<id>");
                assert_eq!(params.get_str("id"), Some("42"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut templates: Vec<_> = table.static_templates().collect();
        templates.sort_unstable();
        assert_eq!(templates, vec!["/about us", "/关于"]);
    }

    #[test]
    fn test_dynamic_precedence() {
        let table = RouteTable::builder()
            .get("/<path:rest>", named("catch-all"))
            .get("/wiki/<path:page>", named("wiki-path"))
            .get("/wiki/<a>/<b>", named("wiki-two"))
            .get("/wiki/<page>/edit", named("wiki-edit"))
            .build()
            .unwrap();

        let order: Vec<_> = table.dynamic_routes().map(|r| r.template().to_string()).collect();
        assert_eq!(
            order,
            vec!["/wiki/<page>/edit", "/wiki/<a>/<b>", "/wiki/<path:page>", "/<path:rest>"]
        );

        assert_eq!(matched(&table, "GET", "/wiki/home/edit").as_deref(), Some("/wiki/<page>/edit"));
        assert_eq!(matched(&table, "GET", "/wiki/home/raw").as_deref(), Some("/wiki/<a>/<b>"));
        assert_eq!(matched(&table, "GET", "/wiki/a/b/c").as_deref(), Some("/wiki/<path:page>"));
        assert_eq!(matched(&table, "GET", "/elsewhere").as_deref(), Some("/<path:rest>"));
    }

    #[test]
    fn test_method_not_allowed_lists_union() {
        let table = RouteTable::builder()
            .get("/post/<id>", named("show"))
            .route(MethodMask::PUT | MethodMask::DELETE, "/post/<int:id>", named("edit"))
            .build()
            .unwrap();

        match table.lookup("POST", "/post/5") {
            RouteMatch::MethodNotAllowed(allowed) => assert_eq!(
                allowed,
                vec![HttpMethod::GET, HttpMethod::PUT, HttpMethod::DELETE, HttpMethod::HEAD]
            ),
            other => panic!("expected 405, got {:?}", other),
        }
        assert_eq!(matched(&table, "DELETE", "/post/5").as_deref(), Some("/post/<int:id>"));
        assert!(matches!(table.lookup("DELETE", "/post/x"), RouteMatch::MethodNotAllowed(_)));
        assert!(matches!(table.lookup("BREW", "/post/5"), RouteMatch::MethodNotAllowed(_)));
    }

    #[test]
    fn test_head_follows_get() {
        let table = RouteTable::builder()
            .get("/feed", named("feed"))
            .build()
            .unwrap();
        assert_eq!(matched(&table, "HEAD", "/feed").as_deref(), Some("/feed"));
    }

    #[test]
    fn test_build_reports_first_pattern_error() {
        let err = RouteTable::builder()
            .get("/ok", named("ok"))
            .get("/bad/<1id>", named("bad"))
            .get("/worse/<", named("worse"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RouteBuildError::Pattern(PatternError::NameStartsWithDigit(_))));
    }

    #[test]
    fn test_closure_route_source() {
        let source = || RouteTable::builder().get("/", named("home")).build();
        let table = RouteSource::build(&source).unwrap();
        assert_eq!(table.len(), 1);
        assert!(source.watch_paths().is_empty());
    }
}
