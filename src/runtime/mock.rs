//! Mock runtime for testing
//!
//! Sleeps complete immediately and are recorded, so tests can assert the
//! back-off schedule without waiting for it. Spawned tasks are either
//! dropped or run to completion on the calling thread.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{AsyncRuntime, BoxFuture, JoinHandle};

/// Spawn behavior for MockRuntime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSpawnBehavior {
    /// Drop tasks immediately (don't execute)
    Drop,
    /// Block on tasks synchronously using a simple executor
    BlockSync,
}

/// Mock async runtime for testing
#[derive(Clone, Debug)]
pub struct MockRuntime {
    behavior: MockSpawnBehavior,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    /// Create a new mock runtime that drops spawned tasks
    pub fn new() -> Self {
        Self::with_behavior(MockSpawnBehavior::Drop)
    }

    /// Create a mock runtime with specific behavior
    pub fn with_behavior(behavior: MockSpawnBehavior) -> Self {
        Self {
            behavior,
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock runtime that runs spawned tasks synchronously
    pub fn blocking() -> Self {
        Self::with_behavior(MockSpawnBehavior::BlockSync)
    }

    /// Every requested sleep, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    /// Sum of requested sleeps.
    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }
}

impl AsyncRuntime for MockRuntime {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.behavior {
            MockSpawnBehavior::Drop => {
                drop(task);
                JoinHandle::new(())
            }
            MockSpawnBehavior::BlockSync => {
                futures::executor::block_on(task);
                JoinHandle::new(())
            }
        }
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.sleeps.lock().push(duration);
        Box::pin(futures::future::ready(()))
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_mock_runtime_drop() {
        let runtime = MockRuntime::new();
        let handle = runtime.spawn(async {
            panic!("Should not run");
        });
        let _ = handle;
    }

    #[test]
    fn test_mock_runtime_blocking() {
        let runtime = MockRuntime::blocking();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        runtime.spawn(async move {
            ran_clone.store(true, Ordering::SeqCst);
        });

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_sleeps_are_recorded() {
        let runtime = MockRuntime::new();
        futures::executor::block_on(async {
            runtime.sleep(Duration::from_millis(100)).await;
            runtime.sleep(Duration::from_millis(200)).await;
        });
        assert_eq!(
            runtime.sleeps(),
            [Duration::from_millis(100), Duration::from_millis(200)]
        );
        assert_eq!(runtime.total_slept(), Duration::from_millis(300));
    }
}
