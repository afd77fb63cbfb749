//! Notifications for the presentation layer.

use tokio::sync::broadcast;

use crate::domain::CategoryId;

/// Buffered events per subscriber before slow receivers start lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// A new forest snapshot replaced the previous one.
    ForestPublished { generation: u64 },
    /// Roots (`key == None`) or a node's children could not be fetched.
    LoadFailed {
        key: Option<CategoryId>,
        message: String,
    },
    /// A move was aborted; local order is unchanged.
    ReorderFailed { key: CategoryId, message: String },
    /// The rollback write failed; remote and local order may disagree.
    CompensationFailed { key: CategoryId, message: String },
}

pub(crate) fn channel() -> broadcast::Sender<TreeEvent> {
    let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tx
}
