//! Event bus for task lifecycle events
//!
//! Thin wrapper around [`tokio::sync::broadcast`] fanning out a closed set of
//! typed lifecycle events to interested observers. Delivery within one task's
//! log stream matches arrival order; no ordering is promised across tasks.

use crate::registry::TaskStatus;
use serde::Serialize;
use tokio::sync::broadcast;

/// Lifecycle event published by the registry
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// One line of worker diagnostic output was recorded for a task
    Log {
        id: String,
        text: String,
        /// Unix timestamp in milliseconds
        timestamp: i64,
    },
    /// A task's worker process exited on its own
    Ended {
        id: String,
        exit_code: Option<i32>,
        status: TaskStatus,
    },
    /// A task was stopped by explicit request
    Stopped { id: String },
}

/// Broadcast channel for task lifecycle events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// The send error is ignored when there are no active subscribers; a
    /// task's terminal status remains inspectable on its record regardless.
    pub fn publish(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to the bus and return a new receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
