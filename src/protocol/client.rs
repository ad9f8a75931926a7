//! Pipelined client dispatcher.
//!
//! [`DataUnitClient`] multiplexes any number of concurrent [`exchange`]
//! calls onto a single data unit connection while preserving the strict
//! request/response pairing EPP servers assume per connection:
//!
//! ```text
//! caller 1 ─┐                          ┌─ reply 1
//! caller 2 ─┼─► write mutex ═══ wire ═══► read mutex ─┼─ reply 2
//! caller N ─┘    (FIFO queue of reply slots)          └─ reply N
//! ```
//!
//! Each caller, under the write mutex, writes its request and appends a
//! fresh one-shot reply slot to the tail of the queue; the queue position
//! uniquely identifies the exchange. A detached receive task is spawned per
//! exchange: under the read mutex it pops the head slot, reads the next
//! data unit, and delivers it. Because writes are totally ordered, reads are
//! totally ordered, and the server replies in order, the N-th writer always
//! receives the N-th reply.
//!
//! Cancelling an exchange (dropping its future) abandons the reply slot:
//! the receive task still fills it and the result is discarded, so
//! subsequent callers stay aligned with the correct data unit.
//!
//! [`exchange`]: DataUnitClient::exchange

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{oneshot, Mutex};

use super::conn::DataUnitConn;
use crate::error::Result;

/// Ordered pipelined exchange over one data unit connection.
///
/// Cheap to clone; all clones share the same connection and queue.
#[derive(Clone)]
pub struct DataUnitClient {
    conn: Arc<DataUnitConn>,
    /// Serializes request writes; queue slots are appended under this lock
    /// so queue order equals wire order.
    writing: Arc<Mutex<()>>,
    /// Serializes response reads.
    reading: Arc<Mutex<()>>,
    /// Reply slots in wire order; the head belongs to the next data unit.
    queue: Arc<Mutex<VecDeque<oneshot::Sender<Result<Bytes>>>>>,
}

impl DataUnitClient {
    /// Creates a dispatcher over `conn`.
    pub fn new(conn: Arc<DataUnitConn>) -> Self {
        Self {
            conn,
            writing: Arc::new(Mutex::new(())),
            reading: Arc::new(Mutex::new(())),
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Sends `payload` and returns the server's reply to it.
    ///
    /// Blocks until the paired response arrives or the connection is closed.
    /// Safe to call from any number of tasks concurrently; replies are
    /// matched to callers by FIFO position, never by content.
    pub async fn exchange(&self, payload: &[u8]) -> Result<Bytes> {
        let rx = self.send(payload).await?;
        self.spawn_receive();
        match rx.await {
            Ok(result) => result,
            // Slot dropped without a result: the connection went away.
            Err(_) => Err(self.conn.close_error()),
        }
    }

    /// Access to the underlying connection.
    pub fn conn(&self) -> &Arc<DataUnitConn> {
        &self.conn
    }

    /// Closes the underlying connection. Every pending exchange resolves
    /// with [`EppError::ClosedConnection`](crate::EppError::ClosedConnection)
    /// once its receive task observes the close.
    pub async fn close(&self) {
        self.conn.close().await;
    }

    /// Writes the request and enqueues a reply slot, atomically with respect
    /// to other senders.
    async fn send(&self, payload: &[u8]) -> Result<oneshot::Receiver<Result<Bytes>>> {
        let _guard = self.writing.lock().await;
        self.conn.write_data_unit(payload).await?;
        let (tx, rx) = oneshot::channel();
        self.queue.lock().await.push_back(tx);
        Ok(rx)
    }

    /// Spawns a detached task that reads exactly one data unit and delivers
    /// it to the head reply slot. One receive task exists per enqueued slot,
    /// so the queue always drains even when callers are cancelled.
    fn spawn_receive(&self) {
        let conn = Arc::clone(&self.conn);
        let reading = Arc::clone(&self.reading);
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            let _guard = reading.lock().await;
            let slot = queue.lock().await.pop_front();
            let Some(slot) = slot else {
                return;
            };
            let result = conn.read_data_unit().await;
            // The caller may have been cancelled; the reply is discarded.
            let _ = slot.send(result);
        });
    }
}

impl std::fmt::Debug for DataUnitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataUnitClient").finish_non_exhaustive()
    }
}
