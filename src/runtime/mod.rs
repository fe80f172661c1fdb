//! Async runtime abstraction
//!
//! The engine needs two things from a runtime: a timer for retry back-off
//! and a way to run a preload in the background. Both go through
//! [`AsyncRuntime`] so the engine works on Tokio or on a test executor.

pub mod mock;
#[cfg(feature = "runtime-tokio")]
pub mod tokio_impl;

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed future that can be sent across threads
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Handle to a spawned async task
///
/// This is a type-erased handle; downcast it to the runtime's own handle
/// type to await or abort the task.
#[derive(Debug)]
pub struct JoinHandle {
    inner: Box<dyn std::any::Any + Send>,
}

impl JoinHandle {
    /// Create a new join handle
    pub fn new<T: Send + 'static>(handle: T) -> Self {
        Self {
            inner: Box::new(handle),
        }
    }

    /// Try to downcast to a specific handle type
    pub fn downcast<T: 'static>(self) -> Option<T> {
        self.inner.downcast::<T>().ok().map(|b| *b)
    }
}

/// Async runtime trait
///
/// # Example
/// ```ignore
/// let runtime = TokioRuntime::new();
/// runtime.sleep(Duration::from_millis(100)).await;
/// runtime.spawn(async { /* background work */ });
/// ```
pub trait AsyncRuntime: Send + Sync + Clone + Debug + 'static {
    /// Spawn an async task
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static;

    /// Complete after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Get the name of this runtime (for debugging)
    fn runtime_name(&self) -> &'static str;
}

// Re-export implementations
pub use mock::MockRuntime;

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::TokioRuntime;
