//! EPP data unit framing (RFC 5734).
//!
//! Each data unit on the wire is a 4-byte header followed by the payload:
//!
//! ```text
//! ┌───────────────────────────┬─────────────────┐
//! │ length (u32, big-endian)  │ payload (UTF-8) │
//! └───────────────────────────┴─────────────────┘
//! ```
//!
//! The length is the total size of the data unit, *inclusive* of the 4-byte
//! header. The minimum valid value is therefore 4 (an empty payload). This
//! layer imposes no structure on the payload; XML well-formedness is the
//! codec's concern.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{EppError, Result};

/// Header size in bytes (fixed, exactly 4).
pub const HEADER_SIZE: usize = 4;

/// Maximum payload size a data unit can carry.
pub const MAX_PAYLOAD_SIZE: u32 = u32::MAX - HEADER_SIZE as u32;

/// Reads a single EPP data unit from `r`, returning the payload.
///
/// Fails with [`EppError::TruncatedFrame`] if the declared size is below
/// the 4-byte minimum or the stream ends mid-unit, and with
/// [`EppError::ClosedConnection`] on a clean EOF between units. A
/// zero-length payload is returned as empty [`Bytes`].
pub async fn read_data_unit<R>(r: &mut R) -> Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    // A clean EOF on a unit boundary is the peer closing the connection; an
    // EOF inside a unit is a framing error.
    let mut header = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = r.read(&mut header[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                EppError::ClosedConnection
            } else {
                EppError::TruncatedFrame
            });
        }
        filled += n;
    }

    let size = u32::from_be_bytes(header);
    if size < HEADER_SIZE as u32 {
        return Err(EppError::TruncatedFrame);
    }

    let len = (size - HEADER_SIZE as u32) as usize;
    if len == 0 {
        return Ok(Bytes::new());
    }

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).await.map_err(truncated_on_eof)?;
    Ok(Bytes::from(payload))
}

/// Writes a single EPP data unit to `w`.
///
/// The payload is prefixed with its total size (payload + 4-byte header) in
/// network byte order. Fails if the payload exceeds [`MAX_PAYLOAD_SIZE`].
pub async fn write_data_unit<W>(w: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if payload.len() as u64 > MAX_PAYLOAD_SIZE as u64 {
        return Err(EppError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "data unit payload exceeds u32 size limit",
        )));
    }

    let size = payload.len() as u32 + HEADER_SIZE as u32;
    w.write_all(&size.to_be_bytes()).await?;
    if !payload.is_empty() {
        w.write_all(payload).await?;
    }
    w.flush().await?;
    Ok(())
}

/// A short read in the middle of a data unit is a framing error, not a
/// generic I/O error.
fn truncated_on_eof(err: std::io::Error) -> EppError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        EppError::TruncatedFrame
    } else {
        EppError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn roundtrip(payload: &[u8]) -> Bytes {
        let mut buf = Vec::new();
        write_data_unit(&mut buf, payload).await.unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());
        read_data_unit(&mut Cursor::new(buf)).await.unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip_simple() {
        let got = roundtrip(b"<epp/>").await;
        assert_eq!(&got[..], b"<epp/>");
    }

    #[tokio::test]
    async fn test_roundtrip_empty_payload() {
        let got = roundtrip(b"").await;
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_header_is_inclusive_big_endian() {
        let mut buf = Vec::new();
        write_data_unit(&mut buf, b"hello").await.unwrap();
        // 5 payload bytes + 4 header bytes = 9, big endian.
        assert_eq!(&buf[..HEADER_SIZE], &[0, 0, 0, 9]);
        assert_eq!(&buf[HEADER_SIZE..], b"hello");
    }

    #[tokio::test]
    async fn test_size_below_minimum_is_truncated() {
        for size in 0u32..4 {
            let buf = size.to_be_bytes().to_vec();
            let err = read_data_unit(&mut Cursor::new(buf)).await.unwrap_err();
            assert!(matches!(err, EppError::TruncatedFrame), "size {}", size);
        }
    }

    #[tokio::test]
    async fn test_short_payload_is_truncated() {
        // Header declares 10 payload bytes, stream carries 3.
        let mut buf = 14u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"abc");
        let err = read_data_unit(&mut Cursor::new(buf)).await.unwrap_err();
        assert!(matches!(err, EppError::TruncatedFrame));
    }

    #[tokio::test]
    async fn test_short_header_is_truncated() {
        let err = read_data_unit(&mut Cursor::new(vec![0u8, 0]))
            .await
            .unwrap_err();
        assert!(matches!(err, EppError::TruncatedFrame));
    }

    #[tokio::test]
    async fn test_clean_eof_is_closed_connection() {
        let err = read_data_unit(&mut Cursor::new(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, EppError::ClosedConnection));
    }

    #[tokio::test]
    async fn test_back_to_back_units() {
        let mut buf = Vec::new();
        write_data_unit(&mut buf, b"first").await.unwrap();
        write_data_unit(&mut buf, b"second").await.unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(&read_data_unit(&mut cursor).await.unwrap()[..], b"first");
        assert_eq!(&read_data_unit(&mut cursor).await.unwrap()[..], b"second");
    }
}
