//! Tests for the in-memory queue backend

use github_throttle::core::{OperationQueue, ThrottleError};
use github_throttle::infra::queue::memory::InMemoryQueue;

#[test]
fn test_interleaved_fifo() {
    let mut q = InMemoryQueue::new(3);
    q.enqueue(1).unwrap();
    q.enqueue(2).unwrap();
    assert_eq!(q.dequeue(), Some(1));
    q.enqueue(3).unwrap();
    q.enqueue(4).unwrap();
    assert!(matches!(q.enqueue(5), Err(ThrottleError::QueueFull(_))));
    assert_eq!(q.drain(), vec![2, 3, 4]);
    assert_eq!(q.dequeue(), None);
}

#[test]
fn test_zero_depth_rejects_everything() {
    let mut q = InMemoryQueue::new(0);
    assert!(q.enqueue("x").is_err());
    assert!(q.is_empty());
}
