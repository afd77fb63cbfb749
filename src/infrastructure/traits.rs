//! I/O boundary traits for testability
//!
//! The remote category service is the only external collaborator of the tree
//! engine. Services hold it as `Arc<dyn CategoryService>` so tests can swap in
//! an in-memory double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CategoryId, CategoryNode};
use crate::infrastructure::RemoteError;

/// Metadata returned by an accepted position update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub id: CategoryId,
    pub position: i64,
    pub version: u64,
}

/// Remote category service.
#[async_trait]
pub trait CategoryService: Send + Sync {
    /// Root categories, without children.
    async fn fetch_roots(&self) -> Result<Vec<CategoryNode>, RemoteError>;

    /// One level of children below `parent`.
    async fn fetch_children(&self, parent: &CategoryId) -> Result<Vec<CategoryNode>, RemoteError>;

    /// Move a category to `position`, guarded by optimistic concurrency on
    /// `expected_version`. The server bumps the version on success.
    async fn update_position(
        &self,
        id: &CategoryId,
        position: i64,
        expected_version: u64,
    ) -> Result<CategoryUpdate, RemoteError>;
}
