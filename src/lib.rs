//! Lazy, client-side mirror of a remote category tree.
//!
//! The forest is loaded level by level as it is explored, addressed by
//! sibling-index paths instead of parent pointers, and reordered through a
//! two-step remote protocol with compensation when the second step fails.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;

pub use application::services::{Direction, LazyLoader, LoadState, ReorderCoordinator, TreeStore};
pub use application::{ApplicationError, ApplicationResult, TreeEvent};
pub use domain::{CategoryId, CategoryNode, DomainError, Forest, NodeAddress};
