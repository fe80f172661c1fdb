//! Tokio async runtime implementation

use std::future::Future;
use std::time::Duration;

use super::{AsyncRuntime, BoxFuture, JoinHandle};

/// Tokio-based runtime
///
/// Spawns onto and sleeps on the ambient Tokio runtime.
#[derive(Clone, Debug, Default, Copy)]
pub struct TokioRuntime;

impl TokioRuntime {
    /// Create a new Tokio runtime adapter
    pub fn new() -> Self {
        Self
    }
}

impl AsyncRuntime for TokioRuntime {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        JoinHandle::new(handle)
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_tokio_spawn() {
        let runtime = TokioRuntime::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        let handle = runtime.spawn(async move {
            ran_clone.store(true, Ordering::SeqCst);
        });

        let inner = handle.downcast::<tokio::task::JoinHandle<()>>();
        assert!(inner.is_some());
        if let Some(inner) = inner {
            inner.await.unwrap();
        }
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_tokio_sleep() {
        let runtime = TokioRuntime::new();
        let start = std::time::Instant::now();
        runtime.sleep(Duration::from_millis(10)).await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_tokio_runtime_name() {
        assert_eq!(TokioRuntime::new().runtime_name(), "Tokio");
    }
}
