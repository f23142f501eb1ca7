//! Route manifests
//!
//! Routes can be declared in a TOML file instead of code:
//!
//! ```toml
//! [[route]]
//! pattern = "/article/<int:id>"
//! handler = "article.show"
//!
//! [[route]]
//! pattern = "/admin/article/<int:id>"
//! methods = ["GET", "POST"]
//! handler = "article.edit"
//! role = "editor"
//! ```
//!
//! Handler names resolve through a [`HandlerRegistry`]. A
//! [`ManifestRouteSource`] rebuilds the table from the file, so a dispatcher
//! in debug mode picks up edits without a restart.

use crate::{ConfigError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use trestle_core::{
    Handler, MethodMask, Role, RouteBuildError, RouteSource, RouteTable, StaticFiles,
};

fn default_methods() -> Vec<String> {
    vec!["GET".to_string()]
}

/// One `[[route]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteEntry {
    pub pattern: String,
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
    pub handler: String,
    /// Least privileged role allowed through. Public when absent.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RouteManifest {
    #[serde(default, rename = "route")]
    pub routes: Vec<RouteEntry>,
}

impl RouteManifest {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("Route manifest: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Compile the manifest into a route table.
    ///
    /// Fails on the first unknown handler, role or method.
    pub fn build_table(
        &self,
        registry: &HandlerRegistry,
        static_files: Option<Arc<dyn StaticFiles>>,
    ) -> std::result::Result<RouteTable, RouteBuildError> {
        let mut builder = RouteTable::builder();

        for entry in &self.routes {
            let handler = registry
                .get(&entry.handler)
                .ok_or_else(|| RouteBuildError::UnknownHandler(entry.handler.clone()))?;

            let methods = MethodMask::parse(entry.methods.iter().map(String::as_str))
                .filter(|mask| !mask.is_empty())
                .ok_or_else(|| {
                    RouteBuildError::Invalid(format!(
                        "{}: bad methods {:?}",
                        entry.pattern, entry.methods
                    ))
                })?;

            let role = match &entry.role {
                Some(name) => Role::from_name(name).ok_or_else(|| {
                    RouteBuildError::Invalid(format!("{}: unknown role {}", entry.pattern, name))
                })?,
                None => Role::Guest,
            };

            builder = builder.route_with_role(methods, &entry.pattern, role, handler);
        }

        if let Some(files) = static_files {
            builder = builder.with_static_files(files);
        }
        builder.build()
    }
}

/// Handlers by the name a manifest refers to them with.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.insert(name, handler);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

/// Builds routes from a manifest file, re-reading it on every build.
pub struct ManifestRouteSource {
    path: PathBuf,
    registry: HandlerRegistry,
    static_files: Option<Arc<dyn StaticFiles>>,
}

impl ManifestRouteSource {
    pub fn new(path: impl Into<PathBuf>, registry: HandlerRegistry) -> Self {
        Self {
            path: path.into(),
            registry,
            static_files: None,
        }
    }

    pub fn with_static_files(mut self, files: Arc<dyn StaticFiles>) -> Self {
        self.static_files = Some(files);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RouteSource for ManifestRouteSource {
    fn build(&self) -> std::result::Result<RouteTable, RouteBuildError> {
        let manifest = RouteManifest::load(&self.path)?;
        let table = manifest.build_table(&self.registry, self.static_files.clone())?;
        info!(path = %self.path.display(), routes = table.len(), "Routes built from manifest");
        Ok(table)
    }

    fn watch_paths(&self) -> Vec<PathBuf> {
        vec![self.path.clone()]
    }
}
