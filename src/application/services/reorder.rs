//! Sibling reordering through two independent remote position updates.
//!
//! A move swaps the positions of a node (A) and its neighbour (B):
//!
//! 1. `PATCH A { position: B.position, version: A.version }`
//! 2. `PATCH B { position: A.position, version: B.version }`
//!
//! The local forest only changes after both writes succeed. If the second
//! write fails, A is written back to its old position with `A.version + 1`
//! (the first write already bumped it). The rollback is attempted once.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::application::events::TreeEvent;
use crate::application::services::TreeStore;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::mutator::address_of;
use crate::domain::{CategoryId, CategoryNode, DomainError, Forest, NodeAddress};
use crate::infrastructure::traits::CategoryService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Swap with the previous sibling.
    Up,
    /// Swap with the next sibling.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// Index of the sibling to swap with, `None` at either end of the list.
fn neighbour_index(index: usize, len: usize, direction: Direction) -> Option<usize> {
    match direction {
        Direction::Up => index.checked_sub(1),
        Direction::Down => (index + 1 < len).then_some(index + 1),
    }
}

/// Whether the addressed node can move in `direction` within this snapshot.
pub fn can_move(forest: &Forest, address: &NodeAddress, direction: Direction) -> bool {
    address
        .resolve_parent(forest)
        .map(|parent| {
            let len = parent.children().len();
            address.index() < len && neighbour_index(address.index(), len, direction).is_some()
        })
        .unwrap_or(false)
}

/// Executes moves against the remote service and commits them to the store.
///
/// Callers must not issue overlapping moves concurrently; moves are neither
/// serialized nor cancelled here.
pub struct ReorderCoordinator {
    service: Arc<dyn CategoryService>,
    store: Arc<TreeStore>,
}

impl ReorderCoordinator {
    pub fn new(service: Arc<dyn CategoryService>, store: Arc<TreeStore>) -> Self {
        Self { service, store }
    }

    /// `can_move` against the store's current snapshot, by key.
    pub fn can_move_key(&self, key: &CategoryId, direction: Direction) -> bool {
        let forest = self.store.current_forest();
        address_of(&forest, key)
            .map(|address| can_move(&forest, &address, direction))
            .unwrap_or(false)
    }

    /// Move the node found by key in the current snapshot.
    pub async fn move_key(&self, key: &CategoryId, direction: Direction) -> ApplicationResult<bool> {
        let forest = self.store.current_forest();
        match address_of(&forest, key) {
            Some(address) => self.move_node(&address, direction).await,
            None => {
                let e = ApplicationError::from(DomainError::NodeNotFound(key.clone()));
                self.store.emit(TreeEvent::ReorderFailed {
                    key: key.clone(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Swap the addressed node with its neighbour in `direction`.
    ///
    /// Returns `Ok(false)` without any remote call when the node is already
    /// first (up) or last (down). Every failure leaves the local forest
    /// unchanged, is returned, and is emitted on the event channel.
    #[instrument(level = "debug", skip(self), fields(address = %address))]
    pub async fn move_node(&self, address: &NodeAddress, direction: Direction) -> ApplicationResult<bool> {
        let snapshot = self.store.current_forest();
        let acted_on = address
            .resolve(&snapshot)
            .map(|node| node.id.clone())
            .unwrap_or_else(|_| CategoryId::new(address.to_string()));

        let result = self.swap(&snapshot, address, direction).await;
        if let Err(e) = &result {
            let message = e.to_string();
            self.store.emit(match e {
                ApplicationError::CompensationFailed { .. } => TreeEvent::CompensationFailed {
                    key: acted_on,
                    message,
                },
                _ => TreeEvent::ReorderFailed {
                    key: acted_on,
                    message,
                },
            });
        }
        result
    }

    async fn swap(
        &self,
        snapshot: &Forest,
        address: &NodeAddress,
        direction: Direction,
    ) -> ApplicationResult<bool> {
        let (parent_key, a, b) = {
            let parent = address.resolve_parent(snapshot)?;
            let siblings = parent.children();
            let index = address.index();
            if index >= siblings.len() {
                return Err(DomainError::AddressNotFound {
                    address: address.to_string(),
                }
                .into());
            }
            let Some(other) = neighbour_index(index, siblings.len(), direction) else {
                debug!("{} cannot move {}", siblings[index].id, direction);
                return Ok(false);
            };
            (
                parent.key().cloned(),
                siblings[index].clone(),
                siblings[other].clone(),
            )
        };
        info!("moving {} {} (swap with {})", a.id, direction, b.id);

        self.service
            .update_position(&a.id, b.position, a.version)
            .await
            .map_err(|source| ApplicationError::UpdateRejected {
                id: a.id.clone(),
                source,
            })?;

        if let Err(original) = self
            .service
            .update_position(&b.id, a.position, b.version)
            .await
        {
            warn!("update of {} failed, rolling back {}: {}", b.id, a.id, original);
            return match self
                .service
                .update_position(&a.id, a.position, a.version + 1)
                .await
            {
                Ok(_) => Err(ApplicationError::UpdateRejected {
                    id: b.id.clone(),
                    source: original,
                }),
                Err(compensation) => {
                    error!(
                        "rollback of {} failed, remote position is stale: {}",
                        a.id, compensation
                    );
                    Err(ApplicationError::CompensationFailed {
                        id: a.id.clone(),
                        original,
                        compensation,
                    })
                }
            };
        }

        let a_confirmed = confirmed(&a, b.position);
        let b_confirmed = confirmed(&b, a.position);
        self.store
            .apply_swap(parent_key.as_ref(), &a_confirmed, &b_confirmed)?;
        Ok(true)
    }
}

/// Local copy matching the server's state after an accepted update.
fn confirmed(node: &CategoryNode, position: i64) -> CategoryNode {
    let mut copy = node.clone();
    copy.position = position;
    copy.version = node.version + 1;
    copy
}
