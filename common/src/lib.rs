//! Common Utilities and Types Library
//! 
//! This crate provides shared types, measurement value conversions and the
//! discrete-event scheduler used across the LTE UE implementation.

pub mod scheduler;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use scheduler::{EventError, EventId, EventResult, Scheduler, SchedulerError};
pub use types::*;
pub use utils::*;
