//! Realtime board: owns a [`BoardSession`] on its own task and publishes
//! snapshots to any number of readers.
//!
//! ARCHITECTURE
//! ============
//! ```text
//! Transport ──TransportEvent──▶ board task ──watch<BoardSnapshot>──▶ readers
//!                                   ▲
//!             RealtimeBoard ──BoardCommand (reset / stop)
//! ```
//! The task is the only writer. It applies one event or command at a time and
//! publishes afterwards, so a reader never sees half of an update.
//!
//! Drill-downs run on the caller's task. A drill-down never reads the snapshot
//! while a reset is queued: it waits for the reset to be applied first. The
//! reset epoch only advances after the new snapshot is published, so a fetch
//! that finishes after a reset or a stop sees the epoch move and is discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Bootstrap, OrderDetailsSource};
use crate::drilldown::{OrderDrilldown, merge_details};
use crate::layout::{BoardSnapshot, LayoutConfig};
use crate::session::BoardSession;
use crate::transport::{Topics, Transport, TransportEvent};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const COMMAND_CHANNEL_CAPACITY: usize = 8;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("unknown box: {0}")]
    UnknownBox(String),
    #[error("box {0} has no active order")]
    NoActiveOrder(String),
    #[error("order detail fetch failed: {0}")]
    DetailFetch(#[from] ApiError),
    #[error("board is stopped")]
    Stopped,
    #[error("board was reset while the request was in flight")]
    Stale,
}

impl BoardError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownBox(_) => "E_UNKNOWN_BOX",
            Self::NoActiveOrder(_) => "E_NO_ACTIVE_ORDER",
            Self::DetailFetch(_) => "E_DETAIL_FETCH",
            Self::Stopped => "E_BOARD_STOPPED",
            Self::Stale => "E_BOARD_STALE",
        }
    }
}

/// Topic naming and grid shape for a board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardOptions {
    pub topics: Topics,
    pub layout: LayoutConfig,
}

enum BoardCommand {
    Reset(Bootstrap, oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
}

pub struct RealtimeBoard {
    commands: mpsc::Sender<BoardCommand>,
    snapshot: watch::Receiver<BoardSnapshot>,
    /// Resets sent to the task and not yet acknowledged.
    pending_resets: AtomicU64,
    /// Completed resets, plus one for `stop` to wake waiting drill-downs.
    epoch: watch::Sender<u64>,
    stopped: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl RealtimeBoard {
    /// Build the board from `bootstrap` and open the transport.
    ///
    /// The bootstrap snapshot is available immediately. A transport that fails
    /// to start is logged; the board then keeps serving bootstrap data.
    pub async fn start(transport: Arc<dyn Transport>, options: BoardOptions, bootstrap: Bootstrap) -> Self {
        let session = BoardSession::new(Arc::clone(&transport), options.topics, options.layout, bootstrap);
        let (snapshot_tx, snapshot) = watch::channel(session.snapshot());
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (commands, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let task = tokio::spawn(run_board(session, events_rx, commands_rx, snapshot_tx));
        if let Err(e) = transport.connect(events_tx).await {
            warn!(error = %e, "board: transport failed to start, serving bootstrap data only");
        }
        info!("board: started");

        Self {
            commands,
            snapshot,
            pending_resets: AtomicU64::new(0),
            epoch: watch::Sender::new(0),
            stopped: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
        }
    }

    /// Tear down every subscription and close the transport. Safe to repeat.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.epoch.send_modify(|epoch| *epoch += 1);

        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(BoardCommand::Stop(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "board: task ended abnormally");
            }
        }
        info!("board: stopped");
    }

    /// Replace the bootstrap lists and rebuild subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Stopped`] after [`Self::stop`].
    pub async fn reset(&self, bootstrap: Bootstrap) -> Result<(), BoardError> {
        if self.is_stopped() {
            return Err(BoardError::Stopped);
        }
        self.pending_resets.fetch_add(1, Ordering::SeqCst);

        let (done_tx, done_rx) = oneshot::channel();
        let applied = match self.commands.send(BoardCommand::Reset(bootstrap, done_tx)).await {
            Ok(()) => done_rx.await.map_err(|_| BoardError::Stopped),
            Err(_) => Err(BoardError::Stopped),
        };

        // Decrement first; a drill-down woken by the epoch must see no reset pending.
        self.pending_resets.fetch_sub(1, Ordering::SeqCst);
        self.epoch.send_modify(|epoch| *epoch += 1);
        applied
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    // =========================================================================
    // READERS
    // =========================================================================

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that is notified whenever the snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.snapshot.clone()
    }

    /// Fetch the full order behind `box_identifier` and lay the live state
    /// over it.
    ///
    /// # Errors
    ///
    /// - [`BoardError::UnknownBox`] / [`BoardError::NoActiveOrder`] when there is
    ///   nothing to fetch.
    /// - [`BoardError::DetailFetch`] when the source fails.
    /// - [`BoardError::Stopped`] / [`BoardError::Stale`] when the board was
    ///   stopped or reset before the fetch returned. The result is discarded.
    pub async fn drill_down(
        &self,
        box_identifier: &str,
        source: &dyn OrderDetailsSource,
    ) -> Result<OrderDrilldown, BoardError> {
        let epoch = self.settled_epoch().await?;

        let live = self
            .snapshot
            .borrow()
            .find(box_identifier)
            .cloned()
            .ok_or_else(|| BoardError::UnknownBox(box_identifier.to_owned()))?;
        let Some(order_service_id) = live.order_service_id.clone().filter(|id| !id.is_blank()) else {
            return Err(BoardError::NoActiveOrder(box_identifier.to_owned()));
        };

        debug!(box_identifier, %order_service_id, "board: fetching order details");
        let details = source.order_details(&order_service_id).await?;

        if self.is_stopped() {
            return Err(BoardError::Stopped);
        }
        if self.pending_resets.load(Ordering::SeqCst) > 0 || *self.epoch.borrow() != epoch {
            return Err(BoardError::Stale);
        }
        Ok(merge_details(&live, order_service_id, details))
    }

    /// Wait until no reset is queued and return the epoch the published
    /// snapshot belongs to.
    async fn settled_epoch(&self) -> Result<u64, BoardError> {
        let mut epochs = self.epoch.subscribe();
        loop {
            if self.is_stopped() {
                return Err(BoardError::Stopped);
            }
            if self.pending_resets.load(Ordering::SeqCst) == 0 {
                return Ok(*epochs.borrow_and_update());
            }
            // The sender lives in `self`, so this only fails once the board is gone.
            let _ = epochs.changed().await;
        }
    }
}

// =============================================================================
// BOARD TASK
// =============================================================================

async fn run_board(
    mut session: BoardSession,
    mut events: mpsc::Receiver<TransportEvent>,
    mut commands: mpsc::Receiver<BoardCommand>,
    snapshot_tx: watch::Sender<BoardSnapshot>,
) {
    let mut events_open = true;
    loop {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(event) => {
                    if session.handle_event(event).await {
                        publish(&session, &snapshot_tx);
                    }
                }
                None => {
                    debug!("board: transport event channel closed");
                    events_open = false;
                }
            },
            command = commands.recv() => match command {
                Some(BoardCommand::Reset(bootstrap, done)) => {
                    session.reset(bootstrap).await;
                    publish(&session, &snapshot_tx);
                    let _ = done.send(());
                }
                Some(BoardCommand::Stop(done)) => {
                    session.teardown().await;
                    publish(&session, &snapshot_tx);
                    let _ = done.send(());
                    break;
                }
                None => {
                    session.teardown().await;
                    break;
                }
            },
        }
    }
}

fn publish(session: &BoardSession, snapshot_tx: &watch::Sender<BoardSnapshot>) {
    let next = session.snapshot();
    snapshot_tx.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

#[cfg(test)]
#[path = "realtime_test.rs"]
mod tests;
