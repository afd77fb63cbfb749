//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on the remote boundary trait (`CategoryService`)
//! but are themselves concrete structs, not traits.

mod loader;
mod reorder;
mod store;

pub use loader::LazyLoader;
pub use reorder::{can_move, Direction, ReorderCoordinator};
pub use store::{LoadState, TreeStore};
