use std::fmt;

use tokio::sync::mpsc;

use crate::models::ComputedCheckout;

/// Buffer size for the engine's event channel.
/// One refresh emits a status per account plus a view and a final status.
pub const EVENT_CHANNEL_SIZE: usize = 32;

/// Progress reported alongside the checkout views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// A load started; cached data is being read
    Loading,
    /// Fetching checkouts for the named account
    UpdatingAccount(String),
    /// A load or refresh failed; cached data stays on screen
    Error(String),
    /// Nothing in progress
    Idle,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Loading => write!(f, "Loading..."),
            SyncStatus::UpdatingAccount(name) => write!(f, "Updating {}...", name),
            SyncStatus::Error(msg) => write!(f, "Error: {}", msg),
            SyncStatus::Idle => write!(f, "Up to date"),
        }
    }
}

/// Everything the engine pushes to whoever renders checkouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Assembled view, ordered by real due date
    Checkouts(Vec<ComputedCheckout>),
    /// The view is empty
    NoCheckouts,
    Status(SyncStatus),
}

impl SyncEvent {
    /// Wrap a view, using the explicit empty signal for no checkouts
    pub fn view(checkouts: Vec<ComputedCheckout>) -> Self {
        if checkouts.is_empty() {
            SyncEvent::NoCheckouts
        } else {
            SyncEvent::Checkouts(checkouts)
        }
    }
}

pub fn event_channel() -> (mpsc::Sender<SyncEvent>, mpsc::Receiver<SyncEvent>) {
    mpsc::channel(EVENT_CHANNEL_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_view_is_no_checkouts() {
        assert_eq!(SyncEvent::view(vec![]), SyncEvent::NoCheckouts);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            SyncStatus::UpdatingAccount("Kids card".to_string()).to_string(),
            "Updating Kids card..."
        );
        assert_eq!(SyncStatus::Idle.to_string(), "Up to date");
    }
}
