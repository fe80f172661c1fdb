//! In-memory source for testing
//!
//! Serves registered byte blobs and can be scripted to fail a locator a
//! fixed number of times or forever. Every fetch is recorded.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::AssetSource;

/// Failure script for one locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Fail the next `n` fetches, then serve normally
    Times(u32),
    /// Fail every fetch
    Always,
}

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<String, Bytes>,
    failures: HashMap<String, MockFailure>,
    requests: Vec<String>,
}

/// Mock source for testing
///
/// Clones share state, so a test can keep one clone for assertions while
/// the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    state: Arc<RwLock<MockState>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_file(self, locator: &str, bytes: impl Into<Bytes>) -> Self {
        self.insert(locator, bytes);
        self
    }

    pub fn insert(&self, locator: &str, bytes: impl Into<Bytes>) {
        self.state
            .write()
            .files
            .insert(locator.to_string(), bytes.into());
    }

    pub fn fail(&self, locator: &str, failure: MockFailure) {
        self.state
            .write()
            .failures
            .insert(locator.to_string(), failure);
    }

    pub fn fail_always(&self, locator: &str) {
        self.fail(locator, MockFailure::Always);
    }

    pub fn fail_times(&self, locator: &str, times: u32) {
        self.fail(locator, MockFailure::Times(times));
    }

    /// Number of fetches seen for `locator`.
    pub fn attempts(&self, locator: &str) -> usize {
        self.state
            .read()
            .requests
            .iter()
            .filter(|requested| requested.as_str() == locator)
            .count()
    }

    /// Every fetched locator, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state.read().requests.clone()
    }
}

#[async_trait]
impl AssetSource for MockSource {
    async fn fetch(&self, locator: &str) -> Result<Bytes> {
        let mut state = self.state.write();
        state.requests.push(locator.to_string());

        match state.failures.get_mut(locator) {
            Some(MockFailure::Always) => {
                return Err(anyhow!("scripted failure for {locator}"));
            }
            Some(MockFailure::Times(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                return Err(anyhow!("scripted failure for {locator}"));
            }
            _ => {}
        }

        state
            .files
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow!("not found: {locator}"))
    }

    fn source_name(&self) -> &'static str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_serves_files() {
        let source = MockSource::new().with_file("a.json", "{}");
        assert_eq!(&block_on(source.fetch("a.json")).unwrap()[..], b"{}");
        assert!(block_on(source.fetch("b.json")).is_err());
        assert_eq!(source.requests(), ["a.json", "b.json"]);
    }

    #[test]
    fn test_scripted_failures() {
        let source = MockSource::new().with_file("a", "x").with_file("b", "y");
        source.fail_times("a", 2);
        source.fail_always("b");

        assert!(block_on(source.fetch("a")).is_err());
        assert!(block_on(source.fetch("a")).is_err());
        assert!(block_on(source.fetch("a")).is_ok());
        for _ in 0..4 {
            assert!(block_on(source.fetch("b")).is_err());
        }
        assert_eq!(source.attempts("a"), 3);
        assert_eq!(source.attempts("b"), 4);
    }

    #[test]
    fn test_clones_share_state() {
        let source = MockSource::new();
        let observer = source.clone();
        source.insert("late", "bytes");
        assert!(block_on(source.fetch("late")).is_ok());
        assert_eq!(observer.attempts("late"), 1);
    }
}
