//! Low-level EPP data unit transport.
//!
//! Layers, leaves first:
//!
//! - [`wire_format`]: RFC 5734 framing: a 4-byte big-endian length prefix
//!   (inclusive of itself) followed by the payload.
//! - [`conn`]: [`DataUnitConn`]: serialized full-duplex frame I/O over one
//!   byte channel, with close semantics.
//! - [`client`]: [`DataUnitClient`]: pipelined, order-preserving
//!   request/response exchange for the client side.
//! - [`server`]: [`DataUnitServer`]: concurrent request handling with
//!   responses written in strict arrival order.
//!
//! This layer moves opaque byte payloads; XML encoding and decoding live in
//! [`crate::schema`].

pub mod client;
pub mod conn;
pub mod server;
pub mod wire_format;

pub use client::DataUnitClient;
pub use conn::{CloseReason, DataUnitConn};
pub use server::{DataUnitResponder, DataUnitServer, DEFAULT_PIPELINE};
pub use wire_format::{read_data_unit, write_data_unit, HEADER_SIZE, MAX_PAYLOAD_SIZE};
