//! Request dispatch.
//!
//! The [`Dispatcher`] owns the live route table and turns one
//! [`RawRequest`] into one [`TransportResponse`]:
//!
//! 1. in debug mode, rebuild the table if its source changed;
//! 2. look the path up (static key first, then the ordered dynamic routes);
//! 3. bind a [`RequestContext`], run the filters, check the route's role;
//! 4. call the handler and render its [`HandlerResult`];
//! 5. translate any error, or panic, into a response exactly once.
//!
//! The route table is the only state shared between requests. It is never
//! mutated; a rebuild swaps in a whole new table.

use crate::context::{authorize, RequestContext};
use crate::filter::{Filter, FilterChain};
use crate::handler::HandlerResult;
use crate::logging::{debug, error, info, warn};
use crate::pattern::RouteParams;
use crate::reload::ReloadWatcher;
use crate::request::{RawRequest, Request};
use crate::response::{TransportBody, TransportResponse};
use crate::routing::{Route, RouteBuildError, RouteMatch, RouteSource, RouteTable};
use crate::template::{NoRenderer, TemplateRenderer};
use crate::Error;
use arc_swap::ArcSwap;
use bytes::Bytes;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Routes requests to handlers.
pub struct Dispatcher {
    table: ArcSwap<RouteTable>,
    source: Option<Arc<dyn RouteSource>>,
    reload: ReloadWatcher,
    filters: FilterChain,
    renderer: Arc<dyn TemplateRenderer>,
    debug: bool,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Snapshot of the live route table.
    pub fn routes(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Atomically replace the route table.
    pub fn replace_routes(&self, table: RouteTable) {
        self.table.store(Arc::new(table));
    }

    /// Force a rebuild before the next request (debug mode only).
    pub fn mark_dirty(&self) {
        self.reload.mark_dirty();
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Rebuild from the route source and swap the new table in.
    ///
    /// On failure the current table stays live.
    pub fn reload(&self) -> Result<(), RouteBuildError> {
        let Some(source) = &self.source else {
            return Ok(());
        };
        match source.build() {
            Ok(table) => {
                info!(routes = table.len(), "Route table reloaded");
                self.replace_routes(table);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Route table rebuild failed; keeping previous table");
                Err(e)
            }
        }
    }

    fn reload_if_dirty(&self) {
        if self.debug && self.reload.take_dirty() {
            // Failure is already logged and the old table kept.
            let _ = self.reload();
        }
    }

    /// Handle one request.
    pub async fn dispatch(&self, raw: RawRequest) -> TransportResponse {
        self.reload_if_dirty();
        let table = self.table.load_full();

        let request = Request::new(raw);
        let method = request.method();
        let path = request.raw_path().to_string();
        debug!(method = %method, path = %path, "Dispatching request");

        let lookup = table.lookup(&method, &path);
        let mut ctx = RequestContext::new(request, RouteParams::new());

        let outcome = match lookup {
            RouteMatch::Found { route, params } => {
                ctx.params = params;
                AssertUnwindSafe(self.run(&route, &mut ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(Error::Internal(panic_message(panic))))
            }
            RouteMatch::MethodNotAllowed(allowed) => Err(Error::MethodNotAllowed {
                method: method.clone(),
                path: path.clone(),
                allowed,
            }),
            RouteMatch::NotFound => Err(Error::NotFound(path.clone())),
        };

        if let Err(err) = outcome {
            self.translate(&mut ctx, err);
        }

        let response = std::mem::take(&mut ctx.response);
        let elapsed = ctx.elapsed();
        drop(ctx);

        debug!(
            method = %method,
            path = %path,
            status = response.status_code(),
            elapsed_us = elapsed.as_micros() as u64,
            "Request complete"
        );

        let mut transport = response.into_transport();
        if method == "HEAD" {
            transport.body = TransportBody::Full(Bytes::new());
        }
        transport
    }

    async fn run(&self, route: &Route, ctx: &mut RequestContext) -> Result<(), Error> {
        self.filters.run(ctx).await?;
        authorize(route.role, ctx.identity.as_ref())?;

        match route.handler.call(ctx).await? {
            HandlerResult::Body(body) => ctx.response.write(body),
            HandlerResult::Render { template, model } => {
                let body = self.renderer.render(&template, &model).await?;
                ctx.response.write(body);
            }
            HandlerResult::Stream(stream) => ctx.response.set_stream(stream),
        }
        Ok(())
    }

    /// Turn an error into the response. Cookies already set survive.
    fn translate(&self, ctx: &mut RequestContext, err: Error) {
        let status = err.http_status();
        let message = if err.is_signal() {
            debug!(status = status.code(), error = %err, "Request ended with HTTP signal");
            err.to_string()
        } else {
            error!(
                method = %ctx.request.method(),
                path = %ctx.request.raw_path(),
                tenant = ?ctx.tenant_id(),
                error = ?err,
                "Request failed"
            );
            status.reason().to_string()
        };

        let response = &mut ctx.response;
        response.reset_for_error();
        response.set_http_status(status);
        for (name, value) in err.headers() {
            response.set_header(name, value);
        }
        response.set_content_type("application/json");
        response.write(
            serde_json::json!({ "error": message, "status": status.code() }).to_string(),
        );
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.load().len())
            .field("filters", &self.filters)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", message)
    } else {
        "handler panicked".to_string()
    }
}

/// Assembles a [`Dispatcher`].
pub struct DispatcherBuilder {
    table: Option<RouteTable>,
    source: Option<Arc<dyn RouteSource>>,
    filters: FilterChain,
    renderer: Arc<dyn TemplateRenderer>,
    debug: bool,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            table: None,
            source: None,
            filters: FilterChain::new(),
            renderer: Arc::new(NoRenderer),
            debug: false,
        }
    }

    /// Serve a fixed route table.
    pub fn routes(mut self, table: RouteTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Build routes from `source`, and rebuild them when it changes in debug mode.
    pub fn source<S: RouteSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Append a filter. Filters run in registration order.
    pub fn filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.use_filter(filter);
        self
    }

    pub fn filter_arc(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn renderer<R: TemplateRenderer + 'static>(mut self, renderer: R) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn renderer_arc(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Build the initial table. A broken source fails here, at startup.
    pub fn build(self) -> Result<Dispatcher, RouteBuildError> {
        let table = match (self.table, &self.source) {
            (Some(table), _) => table,
            (None, Some(source)) => source.build()?,
            (None, None) => RouteTable::default(),
        };

        let reload = match &self.source {
            Some(source) if self.debug => {
                let paths = source.watch_paths();
                ReloadWatcher::watch(&paths).unwrap_or_else(|e| {
                    warn!(error = %e, "Route reload disabled");
                    ReloadWatcher::new()
                })
            }
            _ => ReloadWatcher::new(),
        };

        info!(
            routes = table.len(),
            filters = self.filters.len(),
            debug = self.debug,
            "Dispatcher ready"
        );

        Ok(Dispatcher {
            table: ArcSwap::from_pointee(table),
            source: self.source,
            reload,
            filters: self.filters,
            renderer: self.renderer,
            debug: self.debug,
        })
    }
}
