//! Infrastructure adapters for operation queues.

pub mod queue;
pub use queue::InMemoryQueue;
