//! Pipelined server dispatcher.
//!
//! [`DataUnitServer`] lets the application handle requests concurrently
//! while guaranteeing that responses are written in the exact order the
//! requests arrived:
//!
//! ```text
//! serve() ──► read mutex ──► (data unit, Responder #n)
//!                                       │
//!                  handler task (any completion order)
//!                                       │
//! respond() ─► write mutex ─► n == first_unwritten ? write + drain
//!                                                  : deposit in slot n, wait
//! ```
//!
//! A [`DataUnitResponder`] is callable at most once; further calls return
//! [`EppError::MultipleResponse`] without touching the connection. An
//! out-of-order response is deposited into a sparse slot and its caller
//! waits until an earlier responder drains it.
//!
//! The out-of-order window is bounded: [`serve`] holds a semaphore permit
//! per outstanding responder, so a full window stalls new reads
//! (backpressure) instead of growing the pending array without bound.
//!
//! [`serve`]: DataUnitServer::serve

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{oneshot, Mutex, OwnedSemaphorePermit, Semaphore};

use super::conn::{CloseReason, DataUnitConn};
use crate::error::{EppError, Result};

/// Capacity the pending array is compacted to after a full drain.
const PENDING_CAP: usize = 32;

/// Default out-of-order window when none is configured.
pub const DEFAULT_PIPELINE: usize = 32;

/// A filled slot carries the response payload and the channel by which the
/// depositing responder learns its write completed.
type PendingSlot = Option<(Bytes, oneshot::Sender<Result<()>>)>;

struct WriteState {
    /// Sequence number of the oldest request without a written response.
    first_unwritten: u64,
    /// Sparse slots for responses that arrived out of order. Slot `i` holds
    /// the response to request `first_unwritten + 1 + i`.
    pending: VecDeque<PendingSlot>,
}

/// Ordered pipelined responses over one data unit connection.
pub struct DataUnitServer {
    conn: Arc<DataUnitConn>,
    /// Serializes reads; requests are numbered in arrival order under this
    /// lock.
    reading: Mutex<u64>,
    writing: Arc<Mutex<WriteState>>,
    window: Arc<Semaphore>,
}

impl DataUnitServer {
    /// Creates a dispatcher over `conn` with the default pipeline window.
    pub fn new(conn: Arc<DataUnitConn>) -> Self {
        Self::with_pipeline(conn, DEFAULT_PIPELINE)
    }

    /// Creates a dispatcher tolerating at most `pipeline` outstanding
    /// responders before `serve` stalls.
    pub fn with_pipeline(conn: Arc<DataUnitConn>, pipeline: usize) -> Self {
        Self {
            conn,
            reading: Mutex::new(0),
            writing: Arc::new(Mutex::new(WriteState {
                first_unwritten: 0,
                pending: VecDeque::new(),
            })),
            window: Arc::new(Semaphore::new(pipeline.max(1))),
        }
    }

    /// Reads one request from the client and returns it with the
    /// [`DataUnitResponder`] that answers it.
    ///
    /// Safe to call from multiple tasks; each request may then be handled in
    /// its own task. Stalls when `pipeline` responders are already
    /// outstanding.
    pub async fn serve(&self) -> Result<(Bytes, DataUnitResponder)> {
        let permit = Arc::clone(&self.window)
            .acquire_owned()
            .await
            .map_err(|_| self.conn.close_error())?;

        let mut reads = self.reading.lock().await;
        let index = *reads;
        *reads += 1;

        let responder = DataUnitResponder {
            index,
            calls: AtomicU64::new(0),
            conn: Arc::clone(&self.conn),
            writing: Arc::clone(&self.writing),
            _permit: permit,
        };

        let data = self.conn.read_data_unit().await?;
        Ok((data, responder))
    }

    /// Access to the underlying connection.
    pub fn conn(&self) -> &Arc<DataUnitConn> {
        &self.conn
    }

    /// Closes the underlying connection; pending and subsequent `serve` and
    /// `respond` calls fail with the close error.
    pub async fn close(&self) {
        self.close_with(CloseReason::Connection).await;
    }

    /// Closes the underlying connection, reporting `reason` to blocked and
    /// subsequent operations.
    pub async fn close_with(&self, reason: CloseReason) {
        self.conn.close_with(reason).await;
        self.writing.lock().await.fail_pending(&self.conn);
    }
}

impl WriteState {
    /// Completes every deposited slot with the connection's close error.
    fn fail_pending(&mut self, conn: &DataUnitConn) {
        for slot in self.pending.drain(..) {
            if let Some((_, tx)) = slot {
                let _ = tx.send(Err(conn.close_error()));
            }
        }
    }
}

impl std::fmt::Debug for DataUnitServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataUnitServer").finish_non_exhaustive()
    }
}

/// Single-use handle by which a server task answers exactly one request.
///
/// Always handed out alongside the request, even one that later fails to
/// decode, so malformed requests can still be answered with an EPP error
/// result. Dropping a responder without calling [`respond`] permanently
/// wedges response ordering at its slot; handlers must respond exactly once.
///
/// [`respond`]: DataUnitResponder::respond
pub struct DataUnitResponder {
    index: u64,
    calls: AtomicU64,
    conn: Arc<DataUnitConn>,
    writing: Arc<Mutex<WriteState>>,
    _permit: OwnedSemaphorePermit,
}

impl DataUnitResponder {
    /// Arrival-order sequence number of the request this responder answers.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Writes `payload` as the response, blocking until this response's turn
    /// in arrival order has come and the unit is written.
    ///
    /// The first invocation performs the write (or fails for I/O reasons);
    /// every later invocation returns [`EppError::MultipleResponse`] and
    /// performs no I/O.
    pub async fn respond(&self, payload: &[u8]) -> Result<()> {
        let count = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if count != 1 {
            return Err(EppError::MultipleResponse {
                index: self.index,
                count,
            });
        }

        let waiter = {
            let mut state = self.writing.lock().await;
            let offset = self.index - state.first_unwritten;

            if offset > 0 {
                // Not the oldest outstanding request: deposit and wait for an
                // earlier responder to drain this slot.
                let slot = offset as usize - 1;
                while state.pending.len() <= slot {
                    state.pending.push_back(None);
                }
                let (tx, rx) = oneshot::channel();
                state.pending[slot] = Some((Bytes::copy_from_slice(payload), tx));
                Some(rx)
            } else {
                self.conn.write_data_unit(payload).await?;
                state.first_unwritten += 1;
                self.drain(&mut state).await;
                None
            }
        };

        match waiter {
            None => Ok(()),
            Some(rx) => match rx.await {
                Ok(result) => result,
                Err(_) => Err(self.conn.close_error()),
            },
        }
    }

    /// Writes the contiguous run of already-filled slots following a
    /// successful write, signalling each depositor. Called with the write
    /// lock held.
    async fn drain(&self, state: &mut WriteState) {
        while matches!(state.pending.front(), Some(Some(_))) {
            let Some(Some((data, tx))) = state.pending.pop_front() else {
                break;
            };
            let result = self.conn.write_data_unit(&data).await;
            let failed = result.is_err();
            let _ = tx.send(result);
            if failed {
                break;
            }
            state.first_unwritten += 1;
        }
        // Bound the sparse array so pathological reorder patterns cannot
        // grow it without limit.
        if state.pending.is_empty() && state.pending.capacity() > PENDING_CAP {
            state.pending.shrink_to(PENDING_CAP);
        }
    }
}

impl std::fmt::Debug for DataUnitResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataUnitResponder")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
