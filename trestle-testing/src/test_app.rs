// Test Application Builder

use crate::TestClient;
use std::sync::Arc;
use trestle_core::{
    Dispatcher, Filter, Handler, RouteBuildError, RouteTable, RouteTableBuilder, TemplateRenderer,
};

/// Collects routes and filters into a dispatcher for a test.
pub struct TestAppBuilder {
    routes: RouteTableBuilder,
    filters: Vec<Arc<dyn Filter>>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            routes: RouteTable::builder(),
            filters: Vec::new(),
            renderer: None,
        }
    }

    pub fn get(mut self, template: &str, handler: Arc<dyn Handler>) -> Self {
        self.routes = self.routes.get(template, handler);
        self
    }

    pub fn post(mut self, template: &str, handler: Arc<dyn Handler>) -> Self {
        self.routes = self.routes.post(template, handler);
        self
    }

    /// Edit the route table builder directly.
    pub fn routes(mut self, f: impl FnOnce(RouteTableBuilder) -> RouteTableBuilder) -> Self {
        self.routes = f(self.routes);
        self
    }

    pub fn filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn renderer<R: TemplateRenderer + 'static>(mut self, renderer: R) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn build(self) -> Result<TestClient, RouteBuildError> {
        let mut builder = Dispatcher::builder().routes(self.routes.build()?);
        for filter in self.filters {
            builder = builder.filter_arc(filter);
        }
        if let Some(renderer) = self.renderer {
            builder = builder.renderer_arc(renderer);
        }
        Ok(TestClient::new(Arc::new(builder.build()?)))
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
