//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on the remote boundary trait.

pub mod error;
pub mod events;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use events::TreeEvent;
