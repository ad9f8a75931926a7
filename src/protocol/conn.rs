//! Data unit connection over a bidirectional byte stream.
//!
//! [`DataUnitConn`] wraps an already-connected byte channel (TCP, TLS, or
//! an in-memory duplex; anything `AsyncRead + AsyncWrite`) and exposes
//! sequential reads and writes of whole data units:
//!
//! - concurrent readers are serialized among themselves,
//! - concurrent writers are serialized among themselves,
//! - a reader and a writer may run in parallel (full duplex),
//! - closing unblocks any in-flight read or write with
//!   [`EppError::ClosedConnection`].
//!
//! The connection does not interpret payloads and promises no buffering
//! across data unit boundaries.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex};

use super::wire_format;
use crate::error::{EppError, Result};

/// Type-erased read half of the underlying stream.
type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Type-erased write half of the underlying stream.
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Why the connection was closed; decides the error reported to blocked
/// and subsequent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Local close or peer disconnect.
    Connection,
    /// The owning listener shut down.
    Server,
}

impl CloseReason {
    fn to_error(self) -> EppError {
        match self {
            CloseReason::Connection => EppError::ClosedConnection,
            CloseReason::Server => EppError::ServerClosed,
        }
    }
}

/// A bidirectional EPP data unit connection.
pub struct DataUnitConn {
    reader: Mutex<BoxedReader>,
    writer: Mutex<BoxedWriter>,
    closed: watch::Sender<Option<CloseReason>>,
}

impl DataUnitConn {
    /// Wraps `stream`, taking exclusive ownership of it.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (r, w) = tokio::io::split(stream);
        let (closed, _) = watch::channel(None);
        Self {
            reader: Mutex::new(Box::new(r) as BoxedReader),
            writer: Mutex::new(Box::new(w) as BoxedWriter),
            closed,
        }
    }

    /// Reads one data unit, blocking until a full unit is available, the
    /// connection is closed, or the stream fails.
    pub async fn read_data_unit(&self) -> Result<Bytes> {
        let mut closed = self.closed.subscribe();
        if let Some(reason) = *closed.borrow() {
            return Err(reason.to_error());
        }
        let mut reader = self.reader.lock().await;
        tokio::select! {
            res = wire_format::read_data_unit(&mut *reader) => res,
            reason = wait_closed(&mut closed) => Err(reason.to_error()),
        }
    }

    /// Writes one data unit, blocking until it is fully written, the
    /// connection is closed, or the stream fails.
    pub async fn write_data_unit(&self, payload: &[u8]) -> Result<()> {
        let mut closed = self.closed.subscribe();
        if let Some(reason) = *closed.borrow() {
            return Err(reason.to_error());
        }
        let mut writer = self.writer.lock().await;
        tokio::select! {
            res = wire_format::write_data_unit(&mut *writer, payload) => res,
            reason = wait_closed(&mut closed) => Err(reason.to_error()),
        }
    }

    /// Closes the connection, unblocking all in-flight reads and writes with
    /// [`EppError::ClosedConnection`]. Idempotent.
    pub async fn close(&self) {
        self.close_with(CloseReason::Connection).await;
    }

    /// Closes the connection, reporting `reason` to blocked and subsequent
    /// operations.
    pub async fn close_with(&self, reason: CloseReason) {
        let newly_closed = self.closed.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(reason);
                true
            } else {
                false
            }
        });
        if newly_closed {
            // Blocked writers observe the signal and release the lock.
            let mut writer = self.writer.lock().await;
            let _ = writer.shutdown().await;
        }
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    /// The error a closed connection reports, defaulting to
    /// [`EppError::ClosedConnection`] when still open.
    pub fn close_error(&self) -> EppError {
        self.closed
            .borrow()
            .unwrap_or(CloseReason::Connection)
            .to_error()
    }
}

impl std::fmt::Debug for DataUnitConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataUnitConn")
            .field("closed", &*self.closed.borrow())
            .finish()
    }
}

/// Resolves once the connection is closed.
async fn wait_closed(rx: &mut watch::Receiver<Option<CloseReason>>) -> CloseReason {
    loop {
        if let Some(reason) = *rx.borrow_and_update() {
            return reason;
        }
        if rx.changed().await.is_err() {
            // Sender lives as long as the connection; treat loss as close.
            return CloseReason::Connection;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_read_write_roundtrip() {
        let (a, b) = tokio::io::duplex(4096);
        let left = DataUnitConn::new(a);
        let right = DataUnitConn::new(b);

        left.write_data_unit(b"<hello/>").await.unwrap();
        let got = right.read_data_unit().await.unwrap();
        assert_eq!(&got[..], b"<hello/>");
    }

    #[tokio::test]
    async fn test_full_duplex() {
        let (a, b) = tokio::io::duplex(4096);
        let left = Arc::new(DataUnitConn::new(a));
        let right = Arc::new(DataUnitConn::new(b));

        // A read blocked on one side must not prevent a write on the same side.
        let reader = {
            let left = Arc::clone(&left);
            tokio::spawn(async move { left.read_data_unit().await })
        };
        left.write_data_unit(b"ping").await.unwrap();
        assert_eq!(&right.read_data_unit().await.unwrap()[..], b"ping");
        right.write_data_unit(b"pong").await.unwrap();
        assert_eq!(&reader.await.unwrap().unwrap()[..], b"pong");
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_read() {
        let (a, _b) = tokio::io::duplex(4096);
        let conn = Arc::new(DataUnitConn::new(a));

        let pending = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.read_data_unit().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        conn.close().await;

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, EppError::ClosedConnection));
    }

    #[tokio::test]
    async fn test_operations_after_close() {
        let (a, _b) = tokio::io::duplex(4096);
        let conn = DataUnitConn::new(a);
        conn.close().await;

        assert!(conn.is_closed());
        assert!(matches!(
            conn.read_data_unit().await.unwrap_err(),
            EppError::ClosedConnection
        ));
        assert!(matches!(
            conn.write_data_unit(b"x").await.unwrap_err(),
            EppError::ClosedConnection
        ));
    }

    #[tokio::test]
    async fn test_close_with_server_reason() {
        let (a, _b) = tokio::io::duplex(4096);
        let conn = DataUnitConn::new(a);
        conn.close_with(CloseReason::Server).await;
        assert!(matches!(
            conn.read_data_unit().await.unwrap_err(),
            EppError::ServerClosed
        ));
        // First reason wins.
        conn.close().await;
        assert!(matches!(conn.close_error(), EppError::ServerClosed));
    }

    #[tokio::test]
    async fn test_peer_disconnect_reads_as_closed() {
        let (a, b) = tokio::io::duplex(4096);
        let conn = DataUnitConn::new(a);
        drop(b);
        let err = conn.read_data_unit().await.unwrap_err();
        assert!(matches!(err, EppError::ClosedConnection));
    }
}
