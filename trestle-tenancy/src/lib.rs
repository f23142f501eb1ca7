//! Multi-Tenancy for Trestle
//!
//! One deployment serves many sites. Each request is bound to the site named
//! by its `Host` header before any session or handler code runs, so that
//! accounts and cookies never cross from one site to another.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use trestle_core::{Dispatcher, Tenant};
//! use trestle_tenancy::*;
//!
//! let store = Arc::new(MemoryTenantStore::with_tenants([
//!     Tenant::new("t-1", "acme").with_domain("acme.example.com"),
//! ]));
//! let resolver = Arc::new(HostTenantResolver::new(store).with_strip_www(true));
//!
//! let dispatcher = Dispatcher::builder()
//!     .filter(TenantFilter::new(resolver))
//!     .build()
//!     .unwrap();
//! # let _ = dispatcher;
//! ```

pub mod filter;
pub mod resolver;

pub use filter::TenantFilter;
pub use resolver::{
    HostTenantResolver, MemoryTenantStore, SubdomainTenantResolver, TenantError, TenantResolver,
    TenantStore, normalize_host,
};
