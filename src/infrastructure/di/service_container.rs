//! Service container for dependency injection
//!
//! Wires up the tree services with their remote dependency.

use std::sync::Arc;

use crate::application::services::{ReorderCoordinator, TreeStore};
use crate::config::Settings;
use crate::infrastructure::http::HttpCategoryService;
use crate::infrastructure::traits::CategoryService;
use crate::infrastructure::InfraResult;

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Remote category service
    pub categories: Arc<dyn CategoryService>,

    /// Owner of the mirrored forest
    pub store: Arc<TreeStore>,

    /// Sibling moves
    pub reorder: ReorderCoordinator,
}

impl ServiceContainer {
    /// Create a new service container talking to the configured REST API.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        let categories = Arc::new(HttpCategoryService::new(&settings)?);
        Ok(Self::with_deps(settings, categories))
    }

    /// Create a service container with a custom category service (for testing).
    pub fn with_deps(settings: Settings, categories: Arc<dyn CategoryService>) -> Self {
        let settings = Arc::new(settings);
        let store = Arc::new(TreeStore::new(Arc::clone(&categories)));
        let reorder = ReorderCoordinator::new(Arc::clone(&categories), Arc::clone(&store));

        Self {
            settings,
            categories,
            store,
            reorder,
        }
    }
}
