//! Keeping the checkout view in step with the library.
//!
//! The `SyncEngine` serves cached checkouts immediately and refreshes them
//! in the background when the cache is from an earlier day or a refresh is
//! forced. Views and progress are pushed as `SyncEvent`s over an mpsc
//! channel.

pub mod clock;
pub mod engine;
pub mod error;
pub mod events;

pub use clock::{Clock, SystemClock};
pub use engine::{EngineState, LoadOutcome, SyncEngine};
pub use error::SyncError;
pub use events::{event_channel, SyncEvent, SyncStatus, EVENT_CHANNEL_SIZE};
