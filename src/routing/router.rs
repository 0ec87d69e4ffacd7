//! Service lookup.
//!
//! # Responsibilities
//! - Hold the compiled service-name → backend table
//! - Resolve the first path segment of a request to a backend
//!
//! # Design Decisions
//! - Immutable after construction; reloads build a new table
//! - Exact, case-sensitive name match
//! - Unknown names are an explicit `None`, never a default backend

use std::collections::HashMap;

use crate::config::validation::{resolve_base_url, ValidationError};
use crate::config::ServiceConfig;

/// A resolved backend for one service prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoute {
    pub name: String,
    /// Base URL without trailing slash.
    pub base_url: String,
    pub strip_service_segment: bool,
}

/// Service-name → backend table.
#[derive(Debug, Clone, Default)]
pub struct ServiceMap {
    routes: HashMap<String, ServiceRoute>,
}

impl ServiceMap {
    /// Build the table, resolving base URLs from the environment.
    pub fn from_config(services: &[ServiceConfig]) -> Result<Self, ValidationError> {
        let mut routes = HashMap::with_capacity(services.len());
        for service in services {
            let base_url = resolve_base_url(service)?;
            tracing::debug!(service = %service.name, base_url = %base_url, "Registered service");
            routes.insert(
                service.name.clone(),
                ServiceRoute {
                    name: service.name.clone(),
                    base_url,
                    strip_service_segment: service.strip_service_segment,
                },
            );
        }
        Ok(Self { routes })
    }

    pub fn resolve(&self, name: &str) -> Option<&ServiceRoute> {
        self.routes.get(name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
