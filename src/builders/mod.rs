//! Builders assembling the scheduler stack from configuration.

pub mod scheduler_builder;

pub use scheduler_builder::{build_cache, build_scheduler, build_scheduler_from_env, build_tracker};
