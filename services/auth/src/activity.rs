//! User interaction signals and the bus they travel on
//!
//! The front end publishes every interaction it sees; a running session
//! monitor holds one subscription and drops it on teardown.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Interaction that counts as user activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivitySignal {
    #[serde(rename = "mousedown")]
    PointerDown,
    #[serde(rename = "mousemove")]
    PointerMove,
    #[serde(rename = "keypress")]
    KeyPress,
    #[serde(rename = "scroll")]
    Scroll,
    #[serde(rename = "touchstart")]
    TouchStart,
    #[serde(rename = "click")]
    Click,
}

impl ActivitySignal {
    /// Get the event name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivitySignal::PointerDown => "mousedown",
            ActivitySignal::PointerMove => "mousemove",
            ActivitySignal::KeyPress => "keypress",
            ActivitySignal::Scroll => "scroll",
            ActivitySignal::TouchStart => "touchstart",
            ActivitySignal::Click => "click",
        }
    }
}

impl fmt::Display for ActivitySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fan-out channel for activity signals
#[derive(Debug, Clone)]
pub struct ActivityBus {
    sender: broadcast::Sender<ActivitySignal>,
}

impl ActivityBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a signal, returning how many listeners received it
    pub fn publish(&self, signal: ActivitySignal) -> usize {
        // No listeners simply means no session is being monitored
        self.sender.send(signal).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivitySignal> {
        self.sender.subscribe()
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ActivityBus {
    fn default() -> Self {
        Self::new(64)
    }
}
