//! Periodic frame-count notifications.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use log::debug;
use serde::Serialize;

/// Frames between notifications unless configured otherwise.
pub const DEFAULT_INTERVAL: u64 = 30;

/// Per-observer queue depth. Events beyond this are dropped for that observer.
const OBSERVER_CAPACITY: usize = 16;

/// Emitted every `interval` successful frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsEvent {
    /// Successful frames written in the current session.
    pub frame_count: u64,
}

/// Fans [`StatsEvent`]s out to observers without ever blocking the caller.
pub struct StatsReporter {
    interval: u64,
    observers: Vec<SyncSender<StatsEvent>>,
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl StatsReporter {
    /// Create a reporter firing every `interval` frames. Zero is treated as one.
    #[must_use]
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            observers: Vec::new(),
        }
    }

    /// Configured interval.
    pub const fn interval(&self) -> u64 {
        self.interval
    }

    /// Whether `frame_count` is a notification point.
    pub const fn should_emit(&self, frame_count: u64) -> bool {
        frame_count != 0 && frame_count % self.interval == 0
    }

    /// Register an observer.
    pub fn subscribe(&mut self) -> Receiver<StatsEvent> {
        let (tx, rx) = mpsc::sync_channel(OBSERVER_CAPACITY);
        self.observers.push(tx);
        rx
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Notify observers if `frame_count` is a notification point.
    ///
    /// Returns the event when one was due, whether or not anyone received it.
    pub fn record(&mut self, frame_count: u64) -> Option<StatsEvent> {
        if !self.should_emit(frame_count) {
            return None;
        }

        let event = StatsEvent { frame_count };
        self.observers.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Stats observer lagging, dropped event at frame {frame_count}");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });

        Some(event)
    }
}
