// Request filters run before the handler

use crate::context::RequestContext;
use crate::logging::{debug, trace};
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;

/// A step that prepares the request context before the handler runs.
///
/// Filters bind the tenant, the identity, the locale and similar
/// request-scoped state. Returning an error aborts the request and the
/// dispatcher translates it like any handler error.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), Error>;
}

/// Filters applied in registration order.
#[derive(Clone)]
pub struct FilterChain {
    filters: Arc<Vec<Arc<dyn Filter>>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            filters: Arc::new(Vec::new()),
        }
    }

    /// Add a filter to the end of the chain
    pub fn use_filter<F: Filter + 'static>(&mut self, filter: F) {
        self.push(Arc::new(filter));
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        let mut filters = (*self.filters).clone();
        filters.push(filter);
        self.filters = Arc::new(filters);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every filter, stopping at the first error.
    pub async fn run(&self, ctx: &mut RequestContext) -> Result<(), Error> {
        debug!(
            filter_count = self.filters.len(),
            path = %ctx.request.raw_path(),
            "Running filter chain"
        );
        for filter in self.filters.iter() {
            trace!(filter = filter.name(), "Applying filter");
            filter.apply(ctx).await?;
        }
        Ok(())
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::RouteParams;
    use crate::request::{RawRequest, Request};

    struct Tag(&'static str);

    #[async_trait]
    impl Filter for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn apply(&self, ctx: &mut RequestContext) -> Result<(), Error> {
            ctx.locale.push_str(self.0);
            Ok(())
        }
    }

    struct Reject;

    #[async_trait]
    impl Filter for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        async fn apply(&self, _ctx: &mut RequestContext) -> Result<(), Error> {
            Err(Error::Forbidden("closed".into()))
        }
    }

    fn context() -> RequestContext {
        let mut ctx = RequestContext::new(
            Request::new(RawRequest::new("GET", "/")),
            RouteParams::new(),
        );
        ctx.locale.clear();
        ctx
    }

    #[tokio::test]
    async fn test_runs_in_order() {
        let mut chain = FilterChain::new();
        chain.use_filter(Tag("a"));
        chain.use_filter(Tag("b"));
        chain.use_filter(Tag("c"));

        let mut ctx = context();
        chain.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.locale, "abc");
    }

    #[tokio::test]
    async fn test_stops_at_first_error() {
        let mut chain = FilterChain::new();
        chain.use_filter(Tag("a"));
        chain.use_filter(Reject);
        chain.use_filter(Tag("b"));

        let mut ctx = context();
        let err = chain.run(&mut ctx).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(ctx.locale, "a");
    }
}
