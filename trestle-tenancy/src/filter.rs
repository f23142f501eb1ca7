//! Tenant filter
//!
//! Binds the tenant resolved from the `Host` header to the request context.

use crate::resolver::{TenantError, TenantResolver};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use trestle_core::{Error, Filter, RequestContext};

/// Resolves the tenant for every request.
///
/// An unknown host is a 404 and a disabled tenant a 403. With
/// [`TenantFilter::with_optional`] an unknown host proceeds without a tenant
/// instead.
pub struct TenantFilter {
    resolver: Arc<dyn TenantResolver>,
    optional: bool,
}

impl TenantFilter {
    pub fn new(resolver: Arc<dyn TenantResolver>) -> Self {
        Self {
            resolver,
            optional: false,
        }
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

#[async_trait]
impl Filter for TenantFilter {
    fn name(&self) -> &'static str {
        "tenant"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), Error> {
        let host = ctx.request.host().to_string();

        match self.resolver.resolve(&host).await {
            Ok(tenant) => {
                debug!(tenant = %tenant.id, host = %host, "Tenant resolved");
                ctx.tenant = Some(tenant);
                Ok(())
            }
            Err(TenantError::NotFound(_) | TenantError::ResolutionFailed(_)) if self.optional => {
                debug!(host = %host, "No tenant for host");
                Ok(())
            }
            Err(err @ TenantError::Storage(_)) => {
                warn!(host = %host, error = %err, "Tenant lookup failed");
                Err(err.into())
            }
            Err(err) => {
                debug!(host = %host, error = %err, "Tenant rejected");
                Err(err.into())
            }
        }
    }
}
