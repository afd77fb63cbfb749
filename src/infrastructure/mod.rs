//! Infrastructure layer: remote service implementations and DI container
//!
//! This layer implements the I/O boundary traits and wires up services.

pub mod di;
pub mod error;
pub mod http;
pub mod traits;

pub use error::{InfraError, InfraResult, RemoteError};
