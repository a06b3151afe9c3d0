//! Domain layer for the Chorecast chore scheduler
//!
//! This module contains the recurrence and occurrence models, the port
//! traits the services depend on, and the domain error type.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
