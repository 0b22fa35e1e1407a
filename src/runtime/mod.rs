//! Runtime adapters and status API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{health, snapshot, Health, StatusSnapshot};
pub use tokio_spawner::TokioSpawner;
