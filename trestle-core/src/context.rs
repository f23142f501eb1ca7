//! Per-request scope.
//!
//! A [`RequestContext`] is created by the dispatcher for every matched
//! request, passed by `&mut` through the filters and the handler, and dropped
//! on every exit path, panics included. Nothing in it outlives the request.

use crate::extensions::Extensions;
use crate::logging::trace;
use crate::pattern::RouteParams;
use crate::request::Request;
use crate::response::Response;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Permission level. Lower values are more privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Administrator,
    Editor,
    Author,
    Contributor,
    Subscriber,
    Guest,
}

impl Role {
    pub fn level(&self) -> u32 {
        match self {
            Role::SuperAdmin => 0,
            Role::Administrator => 1,
            Role::Editor => 2,
            Role::Author => 4,
            Role::Contributor => 8,
            Role::Subscriber => 64,
            Role::Guest => 0x1000_0000,
        }
    }

    pub fn from_level(level: u32) -> Option<Self> {
        [
            Role::SuperAdmin,
            Role::Administrator,
            Role::Editor,
            Role::Author,
            Role::Contributor,
            Role::Subscriber,
            Role::Guest,
        ]
        .into_iter()
        .find(|role| role.level() == level)
    }

    /// Parse `"editor"`, `"super_admin"` and friends.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "super_admin" | "superadmin" => Some(Role::SuperAdmin),
            "administrator" | "admin" => Some(Role::Administrator),
            "editor" => Some(Role::Editor),
            "author" => Some(Role::Author),
            "contributor" => Some(Role::Contributor),
            "subscriber" => Some(Role::Subscriber),
            "guest" => Some(Role::Guest),
            _ => None,
        }
    }

    /// Whether a holder of `self` meets the `required` level.
    pub fn permits(&self, required: Role) -> bool {
        self.level() <= required.level()
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Guest
    }
}

/// The authenticated subject bound to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub provider: String,
    pub subject_id: String,
    pub tenant_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// A site in a multi-tenant deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: String,

    /// Tenant name/slug
    pub name: String,

    /// Host the site is served under
    pub domain: Option<String>,

    /// Disabled tenants are refused with 403.
    pub active: bool,

    pub metadata: HashMap<String, String>,
}

impl Tenant {
    /// ```
    /// use trestle_core::Tenant;
    ///
    /// let tenant = Tenant::new("t-1", "acme").with_domain("acme.example.com");
    /// assert!(tenant.active);
    /// ```
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain: None,
            active: true,
            metadata: HashMap::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Everything one request may read or write.
#[derive(Debug)]
pub struct RequestContext {
    pub request: Request,
    pub response: Response,
    /// Typed values captured from the path.
    pub params: RouteParams,
    pub tenant: Option<Tenant>,
    pub identity: Option<Identity>,
    pub locale: String,
    pub extensions: Extensions,
    started: Instant,
}

impl RequestContext {
    pub fn new(request: Request, params: RouteParams) -> Self {
        Self {
            request,
            response: Response::new(),
            params,
            tenant: None,
            identity: None,
            locale: "en".to_string(),
            extensions: Extensions::new(),
            started: Instant::now(),
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant.as_ref().map(|t| t.id.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        trace!(
            path = %self.request.raw_path(),
            tenant = ?self.tenant_id(),
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "Request context released"
        );
    }
}

/// Check `identity` against a route's required role.
///
/// Public routes (`Role::Guest`) always pass. Otherwise a missing identity is
/// a 401 and an insufficient one a 403.
pub fn authorize(required: Role, identity: Option<&Identity>) -> Result<(), Error> {
    if required == Role::Guest {
        return Ok(());
    }
    match identity {
        None => Err(Error::Unauthorized("Authentication required".to_string())),
        Some(identity) if identity.role.permits(required) => Ok(()),
        Some(_) => Err(Error::Forbidden("Insufficient role".to_string())),
    }
}
