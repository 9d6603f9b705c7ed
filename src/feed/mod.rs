//! # Message Feed
//!
//! Moves inbound MQTT lines from the transport task into the list the UI
//! renders. Producers append to a shared [`IngestBuffer`]; a single periodic
//! [`FeedPoller`](poller::FeedPoller) drains it into a capped
//! [`DisplayWindow`] on every tick, unless a sheet is open.
//!
//! ```text
//! MqttHandler ──append──▶ IngestBuffer ──drain (tick, gate open)──▶ DisplayWindow ──watch──▶ UI
//! ```
//!
//! Both the buffer and the window keep the most recent [`MAX_NUM_MESSAGES`]
//! entries and silently drop the oldest ones on overflow.

pub mod gate;
pub mod ingest;
pub mod poller;
pub mod window;

use std::time::Duration;

pub use gate::{DrainGate, GateState, Sheet, TickOutcome};
pub use ingest::IngestBuffer;
pub use window::{DisplayRecord, DisplayWindow};

/// Capacity of both the ingest buffer and the display window.
pub const MAX_NUM_MESSAGES: usize = 50;

/// Period of the drain tick.
pub const TICK_PERIOD: Duration = Duration::from_millis(500);
