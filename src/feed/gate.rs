//! Drain gate: decides whether a tick may move lines into the window.
//!
//! ```text
//!            tick (no sheet)              drain done
//!   Idle ───────────────────▶ Draining ───────────────▶ Idle
//!    ▲ │                                                  │
//!    │ └──── sheet opened ───▶ ModalOpen ◀── sheet opened ┘
//!    └────── sheet closed ───────┘
//! ```
//!
//! Ticks while a sheet is open are no-ops; lines keep piling up in the
//! ingest buffer until the sheet closes and the next tick drains them.

use std::fmt;
use tracing::{debug, trace};

use super::{DisplayWindow, IngestBuffer};

/// Modal forms that can be opened over the message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sheet {
    Subscribe,
    Unsubscribe,
    Publish,
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Sheet::Subscribe => write!(f, "Subscribe"),
            Sheet::Unsubscribe => write!(f, "Unsubscribe"),
            Sheet::Publish => write!(f, "Publish"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Idle,
    ModalOpen(Sheet),
    Draining,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A sheet was open; nothing moved.
    Suppressed(Sheet),
    /// The buffer was drained; holds the number of lines appended.
    Drained(usize),
}

#[derive(Debug, Default)]
pub struct DrainGate {
    state: GateState,
}

impl DrainGate {
    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn open_sheet(&mut self, sheet: Sheet) {
        if self.state != GateState::ModalOpen(sheet) {
            debug!("Sheet {} opened, pausing drains", sheet);
        }
        self.state = GateState::ModalOpen(sheet);
    }

    pub fn close_sheet(&mut self) {
        if let GateState::ModalOpen(sheet) = self.state {
            debug!("Sheet {} closed, resuming drains", sheet);
            self.state = GateState::Idle;
        }
    }

    /// Applies the sheet the UI currently shows.
    pub fn sync_sheet(&mut self, sheet: Option<Sheet>) {
        match sheet {
            Some(sheet) => self.open_sheet(sheet),
            None => self.close_sheet(),
        }
    }

    /// Runs one tick: drains `buffer` into `window` unless a sheet is open.
    pub fn tick(&mut self, buffer: &IngestBuffer, window: &mut DisplayWindow) -> TickOutcome {
        if let GateState::ModalOpen(sheet) = self.state {
            trace!("Tick suppressed while {} sheet is open", sheet);
            return TickOutcome::Suppressed(sheet);
        }

        self.state = GateState::Draining;
        let lines = buffer.drain_all();
        let drained = window.append_drained(lines);
        self.state = GateState::Idle;

        if drained > 0 {
            debug!(
                "Drained {} lines into display window ({} evicted from buffer so far)",
                drained,
                buffer.dropped()
            );
        }
        TickOutcome::Drained(drained)
    }
}
