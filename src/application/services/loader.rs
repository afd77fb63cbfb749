//! Incremental loading of the category tree.
//!
//! Roots are fetched together with their first level of children. Every other
//! level is fetched on demand, again prefetching one level below it so the
//! leaf flag of each visible node is known.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::mutator::sort_by_position;
use crate::domain::{CategoryId, CategoryNode, Forest};
use crate::infrastructure::traits::CategoryService;

/// Fetches forest levels from the remote category service.
#[derive(Clone)]
pub struct LazyLoader {
    service: Arc<dyn CategoryService>,
}

impl LazyLoader {
    pub fn new(service: Arc<dyn CategoryService>) -> Self {
        Self { service }
    }

    /// Fetch all roots sorted by position, each with its children attached.
    ///
    /// A root whose children cannot be fetched stays in the forest with
    /// unknown children; only a failure to fetch the roots fails the load.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_roots(&self) -> ApplicationResult<Forest> {
        let roots = self
            .service
            .fetch_roots()
            .await
            .map_err(|e| ApplicationError::load_failed("roots", e))?;
        debug!("load_roots: fetched {} roots", roots.len());

        let roots = self.prefetch(sort_by_position(roots)).await;
        Ok(Forest::new(roots))
    }

    /// Fetch one level of children below `key`, sorted by position.
    ///
    /// Returned nodes have unknown children.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_children(&self, key: &CategoryId) -> ApplicationResult<Vec<CategoryNode>> {
        let children = self
            .service
            .fetch_children(key)
            .await
            .map_err(|e| ApplicationError::load_failed(key.to_string(), e))?;
        debug!("load_children: {} children below {}", children.len(), key);
        Ok(sort_by_position(
            children.into_iter().map(CategoryNode::unloaded).collect(),
        ))
    }

    /// Fetch the children below `key` and prefetch each child's own children.
    pub async fn load_children_prefetched(
        &self,
        key: &CategoryId,
    ) -> ApplicationResult<Vec<CategoryNode>> {
        let children = self.load_children(key).await?;
        Ok(self.prefetch(children).await)
    }

    /// Attach one level of children to every node, fetched concurrently.
    async fn prefetch(&self, nodes: Vec<CategoryNode>) -> Vec<CategoryNode> {
        join_all(nodes.into_iter().map(|node| async move {
            match self.load_children(&node.id).await {
                Ok(children) => node.with_children(children),
                Err(e) => {
                    warn!("prefetch of {} failed, children stay unknown: {}", node.id, e);
                    node.unloaded()
                }
            }
        }))
        .await
    }
}
