//! Preload notifications and the sinks that receive them
//!
//! Sinks are fire-and-forget: the orchestrator never waits on one and never
//! sees a failure from one.

use std::sync::Arc;

use futures::channel::mpsc;
use parking_lot::Mutex;

use super::manifest::AssetKind;

/// Snapshot of a run's progress
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadProgress {
    pub loaded_count: usize,
    pub total_count: usize,
    /// `0.0..=100.0`; 100 for an empty manifest.
    pub percent: f64,
    pub current_asset_key: Option<String>,
    pub phase: Option<AssetKind>,
}

impl PreloadProgress {
    pub fn new(total_count: usize) -> Self {
        Self {
            loaded_count: 0,
            total_count,
            percent: percent(0, total_count),
            current_asset_key: None,
            phase: None,
        }
    }

    /// Counts one finished asset of `phase`.
    pub(crate) fn advance(&mut self, phase: AssetKind, key: &str) {
        self.loaded_count += 1;
        self.percent = percent(self.loaded_count, self.total_count);
        self.current_asset_key = Some(key.to_string());
        self.phase = Some(phase);
    }

    pub fn is_done(&self) -> bool {
        self.loaded_count >= self.total_count
    }
}

impl Default for PreloadProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

fn percent(loaded: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        loaded as f64 / total as f64 * 100.0
    }
}

/// Notification emitted by a preload run
#[derive(Debug, Clone, PartialEq)]
pub enum PreloadEvent {
    Started { total: usize },
    Progress(PreloadProgress),
    Completed { total: usize, loaded: usize },
    /// A fatal failure; always the last event of its run.
    Error { key: String, message: String },
    /// The run stopped at an asset boundary after `abort()`.
    Cancelled { loaded: usize, total: usize },
}

/// Receives preload notifications
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PreloadEvent);
}

impl<F> EventSink for F
where
    F: Fn(PreloadEvent) + Send + Sync,
{
    fn emit(&self, event: PreloadEvent) {
        self(event)
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: PreloadEvent) {}
}

/// Keeps every event in memory, mainly for tests and diagnostics
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<PreloadEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PreloadEvent> {
        self.events.lock().clone()
    }

    pub fn last(&self) -> Option<PreloadEvent> {
        self.events.lock().last().cloned()
    }

    /// Only the progress snapshots, in emission order.
    pub fn progress(&self) -> Vec<PreloadProgress> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PreloadEvent::Progress(progress) => Some(progress.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PreloadEvent) {
        self.events.lock().push(event);
    }
}

/// Forwards events into an unbounded channel
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<PreloadEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PreloadEvent>) {
        let (sender, receiver) = mpsc::unbounded();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: PreloadEvent) {
        let _ = self.sender.unbounded_send(event);
    }
}
