//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod address;
pub mod entities;
pub mod error;
pub mod mutator;

pub use address::{NodeAddress, ParentRef};
pub use entities::*;
pub use error::{DomainError, DomainResult};
