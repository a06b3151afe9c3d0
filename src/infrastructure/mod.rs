//! Infrastructure layer
//!
//! Configuration loading and logging setup. Persistence adapters live
//! under `crate::adapters`.

pub mod config;
pub mod logging;
