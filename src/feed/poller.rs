//! Feed Poller - periodic drain task
//!
//! Owns the [`DrainGate`] and the [`DisplayWindow`]. Every [`TICK_PERIOD`] it
//! picks up the sheet the UI currently shows, runs one gated drain and
//! publishes the window to the UI. Publishing goes through
//! `watch::Sender::send_if_modified`, so the UI is only woken when the
//! records actually changed.
//!
//! The per-tick cycle is a small typestate machine:
//!
//! ```text
//! FeedPoller<Waiting> ─tick()─▶ FeedPoller<Publishing(TickOutcome)> ─publish()─▶ FeedPoller<Waiting>
//! ```

use statum::{machine, state};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{
    DisplayWindow, DrainGate, GateState, IngestBuffer, Sheet, TickOutcome, TICK_PERIOD,
};

#[state]
#[derive(Debug, Clone)]
pub enum PollerState {
    Waiting,
    Publishing(TickOutcome),
}

#[machine]
#[derive(Debug)]
pub struct FeedPoller<S: PollerState> {
    // Shared with the transport task
    ingest: IngestBuffer,

    window: DisplayWindow,

    gate: DrainGate,

    // Sheet currently shown by the UI
    sheet_rx: watch::Receiver<Option<Sheet>>,

    // Window snapshots for the UI
    window_tx: watch::Sender<DisplayWindow>,
}

impl<S: PollerState> FeedPoller<S> {
    pub fn window(&self) -> &DisplayWindow {
        &self.window
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }
}

impl FeedPoller<Waiting> {
    /// Creates a poller with an empty window and returns the receiver the UI
    /// renders from.
    pub fn create(
        ingest: IngestBuffer,
        sheet_rx: watch::Receiver<Option<Sheet>>,
    ) -> (Self, watch::Receiver<DisplayWindow>) {
        let window = DisplayWindow::new();
        let (window_tx, window_rx) = watch::channel(window.clone());
        debug!("Created watch channel for display window snapshots");

        let poller = Self::new(ingest, window, DrainGate::default(), sheet_rx, window_tx);
        (poller, window_rx)
    }

    pub fn tick(mut self) -> FeedPoller<Publishing> {
        let sheet = *self.sheet_rx.borrow_and_update();
        self.gate.sync_sheet(sheet);

        let outcome = self.gate.tick(&self.ingest, &mut self.window);
        self.transition_with(outcome)
    }
}

impl FeedPoller<Publishing> {
    pub fn publish(self) -> FeedPoller<Waiting> {
        let changed = matches!(self.get_state_data(), Some(TickOutcome::Drained(n)) if *n > 0);

        if changed {
            let window = &self.window;
            let sent = self.window_tx.send_if_modified(|current| {
                if current == window {
                    false
                } else {
                    *current = window.clone();
                    true
                }
            });
            if sent {
                debug!("Published display window with {} records", window.len());
            }
        }

        self.transition()
    }
}

/// Handle of the spawned poller task.
#[derive(Debug)]
pub struct FeedPollerHandle {
    task: JoinHandle<()>,
}

impl FeedPollerHandle {
    /// Spawns the poller on the current tokio runtime.
    pub fn spawn(
        ingest: IngestBuffer,
        sheet_rx: watch::Receiver<Option<Sheet>>,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<DisplayWindow>) {
        let (poller, window_rx) = FeedPoller::create(ingest, sheet_rx);

        info!("Spawning feed poller task");
        let task = tokio::spawn(run_poller_loop(poller, TICK_PERIOD, cancel));

        (Self { task }, window_rx)
    }

    /// Waits for the task to finish after its token was cancelled.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Feed poller task panicked: {}", e);
        }
    }
}

async fn run_poller_loop(
    mut poller: FeedPoller<Waiting>,
    period: Duration,
    cancel: CancellationToken,
) {
    info!("Starting feed poller loop with {:?} period", period);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Feed poller cancelled");
                break;
            }

            _ = interval.tick() => {
                poller = poller.tick().publish();
            }
        }
    }
}
