//! Owner of the mirrored forest.
//!
//! The store publishes immutable `Arc<Forest>` snapshots. Every structural
//! change builds a new forest from the latest snapshot, so a reader holding an
//! older snapshot (and addresses computed against it) is never disturbed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use crate::application::events::{self, TreeEvent};
use crate::application::services::LazyLoader;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::mutator::{find_by_key, first_leaf_in_forest, replace_by_key, swap_siblings};
use crate::domain::{CategoryId, CategoryNode, DomainError, Forest};
use crate::infrastructure::traits::CategoryService;

/// Loading lifecycle of a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded { leaf: bool },
    Failed { message: String },
}

#[derive(Default)]
struct StoreState {
    forest: Arc<Forest>,
    generation: u64,
    selected: Option<CategoryId>,
    // Only transient states; loaded/unloaded is read off the forest.
    pending: HashMap<CategoryId, LoadState>,
}

/// Forest owner: drives the loader on expansion and publishes snapshots.
pub struct TreeStore {
    loader: LazyLoader,
    state: RwLock<StoreState>,
    events: broadcast::Sender<TreeEvent>,
}

impl TreeStore {
    pub fn new(service: Arc<dyn CategoryService>) -> Self {
        Self {
            loader: LazyLoader::new(service),
            state: RwLock::new(StoreState::default()),
            events: events::channel(),
        }
    }

    /// Load the roots (with one level prefetched) and pick the initial selection.
    ///
    /// The selection is the first leaf below the first root, if any.
    #[instrument(level = "debug", skip(self))]
    pub async fn initialize(&self) -> ApplicationResult<(Arc<Forest>, Option<CategoryId>)> {
        let forest = match self.loader.load_roots().await {
            Ok(forest) => forest,
            Err(e) => {
                self.emit(TreeEvent::LoadFailed {
                    key: None,
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        let selected = first_leaf_in_forest(&forest).cloned();
        debug!("initialize: {} roots, selected={:?}", forest.len(), selected);

        let snapshot = {
            let mut state = self.write();
            state.selected = selected.clone();
            state.pending.clear();
            self.publish_locked(&mut state, forest)
        };
        Ok((snapshot, selected))
    }

    /// Fetch the children of `key` (prefetching one level below them) and
    /// attach them to the node in the latest forest.
    ///
    /// On failure the node keeps its previous state and the error is both
    /// returned and emitted as `TreeEvent::LoadFailed`.
    #[instrument(level = "debug", skip(self))]
    pub async fn expand(&self, key: &CategoryId) -> ApplicationResult<Arc<Forest>> {
        {
            let mut state = self.write();
            if find_by_key(&state.forest, key).is_none() {
                return Err(DomainError::NodeNotFound(key.clone()).into());
            }
            state.pending.insert(key.clone(), LoadState::Loading);
        }

        let children = match self.loader.load_children_prefetched(key).await {
            Ok(children) => children,
            Err(e) => {
                self.write().pending.insert(
                    key.clone(),
                    LoadState::Failed {
                        message: e.to_string(),
                    },
                );
                self.emit(TreeEvent::LoadFailed {
                    key: Some(key.clone()),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let mut state = self.write();
        state.pending.remove(key);
        // Re-locate in the latest forest: other operations may have published since.
        let updated = match find_by_key(&state.forest, key) {
            Some(latest) => latest.clone().with_children(children),
            None => {
                warn!("expand: {} vanished while loading, result dropped", key);
                return Ok(Arc::clone(&state.forest));
            }
        };
        let (forest, replaced) = replace_by_key(&state.forest, updated);
        if !replaced {
            return Ok(Arc::clone(&state.forest));
        }
        Ok(self.publish_locked(&mut state, forest))
    }

    /// Latest published snapshot.
    pub fn current_forest(&self) -> Arc<Forest> {
        Arc::clone(&self.read().forest)
    }

    /// Leaf chosen by the last `initialize`.
    pub fn selected_leaf(&self) -> Option<CategoryId> {
        self.read().selected.clone()
    }

    /// Number of snapshots published so far.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Load state of a node, `None` if the key is not in the forest.
    pub fn load_state(&self, key: &CategoryId) -> Option<LoadState> {
        let state = self.read();
        let node = find_by_key(&state.forest, key)?;
        if let Some(pending) = state.pending.get(key) {
            return Some(pending.clone());
        }
        Some(match &node.children {
            Some(_) => LoadState::Loaded { leaf: node.leaf },
            None => LoadState::Unloaded,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    /// Commit a confirmed sibling swap to the latest forest.
    ///
    /// Only `position` and `version` are taken from the confirmed copies; all
    /// other state (loaded children in particular) comes from the latest forest.
    pub(crate) fn apply_swap(
        &self,
        parent_key: Option<&CategoryId>,
        first: &CategoryNode,
        second: &CategoryNode,
    ) -> ApplicationResult<Arc<Forest>> {
        let mut state = self.write();
        let first = confirmed_copy(&state.forest, first)?;
        let second = confirmed_copy(&state.forest, second)?;
        let forest = swap_siblings(&state.forest, parent_key, first, second)?;
        Ok(self.publish_locked(&mut state, forest))
    }

    pub(crate) fn emit(&self, event: TreeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_locked(&self, state: &mut StoreState, forest: Forest) -> Arc<Forest> {
        state.generation += 1;
        state.forest = Arc::new(forest);
        debug!("published forest generation {}", state.generation);
        self.emit(TreeEvent::ForestPublished {
            generation: state.generation,
        });
        Arc::clone(&state.forest)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn confirmed_copy(forest: &Forest, confirmed: &CategoryNode) -> ApplicationResult<CategoryNode> {
    let latest = find_by_key(forest, &confirmed.id)
        .ok_or_else(|| ApplicationError::from(DomainError::NodeNotFound(confirmed.id.clone())))?;
    let mut copy = latest.clone();
    copy.position = confirmed.position;
    copy.version = confirmed.version;
    Ok(copy)
}
