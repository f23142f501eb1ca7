//! Tenant Resolution
//!
//! Maps the request host to the site that serves it.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use trestle_core::Tenant;

/// Tenant resolution errors
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Invalid tenant identifier: {0}")]
    Invalid(String),

    #[error("Tenant resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("Tenant is inactive")]
    Inactive,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<TenantError> for trestle_core::Error {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NotFound(_) => trestle_core::Error::NotFound(err.to_string()),
            TenantError::Inactive => trestle_core::Error::Forbidden(err.to_string()),
            TenantError::Invalid(_) | TenantError::ResolutionFailed(_) => {
                trestle_core::Error::BadRequest(err.to_string())
            }
            TenantError::Storage(_) => trestle_core::Error::Internal(err.to_string()),
        }
    }
}

/// Tenant resolver trait
///
/// Given the request host, produce the tenant, [`TenantError::NotFound`] or
/// [`TenantError::Inactive`].
#[async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<Tenant, TenantError>;
}

/// Tenant store trait (implement with your database)
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Find tenant by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>, TenantError>;

    /// Find tenant by name/slug
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, TenantError>;

    /// Find tenant by domain. `domain` is already normalized.
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, TenantError>;
}

/// Lowercase `host`, drop the port and any trailing dot.
///
/// ```
/// use trestle_tenancy::normalize_host;
///
/// assert_eq!(normalize_host("Acme.Example.com:8080"), "acme.example.com");
/// assert_eq!(normalize_host("[::1]:8080"), "[::1]");
/// ```
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split(':').next().unwrap_or(host)
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn ensure_active(tenant: Tenant) -> Result<Tenant, TenantError> {
    if tenant.active {
        Ok(tenant)
    } else {
        Err(TenantError::Inactive)
    }
}

/// Resolves the tenant whose domain equals the request host.
pub struct HostTenantResolver {
    store: Arc<dyn TenantStore>,
    strip_www: bool,
}

impl HostTenantResolver {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self {
            store,
            strip_www: false,
        }
    }

    /// Also try the host without a leading `www.` when the full host is unknown.
    pub fn with_strip_www(mut self, strip_www: bool) -> Self {
        self.strip_www = strip_www;
        self
    }
}

#[async_trait]
impl TenantResolver for HostTenantResolver {
    async fn resolve(&self, host: &str) -> Result<Tenant, TenantError> {
        let domain = normalize_host(host);
        if domain.is_empty() {
            return Err(TenantError::ResolutionFailed("Missing Host header".to_string()));
        }

        let mut tenant = self.store.find_by_domain(&domain).await?;
        if tenant.is_none()
            && self.strip_www
            && let Some(bare) = domain.strip_prefix("www.")
        {
            tenant = self.store.find_by_domain(bare).await?;
        }

        ensure_active(tenant.ok_or(TenantError::NotFound(domain))?)
    }
}

/// Subdomain-based tenant resolver
///
/// Resolves tenant from subdomain (e.g., `acme.example.com` -> tenant "acme").
pub struct SubdomainTenantResolver {
    store: Arc<dyn TenantStore>,
    base_domain: String,
}

impl SubdomainTenantResolver {
    pub fn new(store: Arc<dyn TenantStore>, base_domain: impl Into<String>) -> Self {
        Self {
            store,
            base_domain: normalize_host(&base_domain.into()),
        }
    }

    /// Extract subdomain from host header
    fn extract_subdomain(&self, host: &str) -> Option<String> {
        let subdomain = host.strip_suffix(&format!(".{}", self.base_domain))?;
        (!subdomain.is_empty() && !subdomain.contains('.')).then(|| subdomain.to_string())
    }
}

#[async_trait]
impl TenantResolver for SubdomainTenantResolver {
    async fn resolve(&self, host: &str) -> Result<Tenant, TenantError> {
        let host = normalize_host(host);
        let subdomain = self
            .extract_subdomain(&host)
            .ok_or_else(|| TenantError::ResolutionFailed(format!("No subdomain in: {}", host)))?;

        let tenant = self
            .store
            .find_by_name(&subdomain)
            .await?
            .ok_or(TenantError::NotFound(subdomain))?;
        ensure_active(tenant)
    }
}

/// In-memory tenant store keyed by id.
#[derive(Debug, Default)]
pub struct MemoryTenantStore {
    tenants: RwLock<HashMap<String, Tenant>>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        let store = Self::new();
        for tenant in tenants {
            store.insert(tenant);
        }
        store
    }

    /// Add or replace a tenant.
    pub fn insert(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.id.clone(), tenant);
    }

    pub fn remove(&self, id: &str) -> Option<Tenant> {
        self.tenants.write().remove(id)
    }

    /// Enable or disable a tenant. Returns false if it is unknown.
    pub fn set_active(&self, id: &str, active: bool) -> bool {
        match self.tenants.write().get_mut(id) {
            Some(tenant) => {
                tenant.active = active;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.read().is_empty()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>, TenantError> {
        Ok(self.tenants.read().get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, TenantError> {
        Ok(self
            .tenants
            .read()
            .values()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, TenantError> {
        Ok(self
            .tenants
            .read()
            .values()
            .find(|t| {
                t.domain
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(domain))
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<MemoryTenantStore> {
        Arc::new(MemoryTenantStore::with_tenants([
            Tenant::new("tenant-1", "acme").with_domain("acme.example.com"),
            Tenant::new("tenant-2", "globex").with_domain("globex.example.com"),
            Tenant::new("tenant-3", "initech")
                .with_domain("initech.example.com")
                .with_active(false),
        ]))
    }

    #[tokio::test]
    async fn test_host_resolver() {
        let resolver = HostTenantResolver::new(store());

        let tenant = resolver.resolve("ACME.example.com:8080").await.unwrap();
        assert_eq!(tenant.id, "tenant-1");

        assert!(matches!(
            resolver.resolve("unknown.example.com").await,
            Err(TenantError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve("initech.example.com").await,
            Err(TenantError::Inactive)
        ));
        assert!(matches!(
            resolver.resolve("").await,
            Err(TenantError::ResolutionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_strip_www() {
        let plain = HostTenantResolver::new(store());
        assert!(plain.resolve("www.acme.example.com").await.is_err());

        let resolver = HostTenantResolver::new(store()).with_strip_www(true);
        let tenant = resolver.resolve("www.acme.example.com").await.unwrap();
        assert_eq!(tenant.name, "acme");
    }

    #[tokio::test]
    async fn test_subdomain_resolver() {
        let resolver = SubdomainTenantResolver::new(store(), "example.com");
        let tenant = resolver.resolve("globex.example.com").await.unwrap();
        assert_eq!(tenant.id, "tenant-2");
        assert!(resolver.resolve("example.com").await.is_err());
        assert!(resolver.resolve("a.b.example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_set_active() {
        let store = store();
        assert!(store.set_active("tenant-3", true));
        assert!(!store.set_active("missing", true));
        let resolver = HostTenantResolver::new(store);
        assert!(resolver.resolve("initech.example.com").await.is_ok());
    }

    #[test]
    fn test_error_status() {
        let status = |e: TenantError| trestle_core::Error::from(e).status_code();
        assert_eq!(status(TenantError::NotFound("x".into())), 404);
        assert_eq!(status(TenantError::Inactive), 403);
        assert_eq!(status(TenantError::Invalid("x".into())), 400);
        assert_eq!(status(TenantError::Storage("x".into())), 500);
    }
}
