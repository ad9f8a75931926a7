//! # eppwire
//!
//! Low-level client and server for the Extensible Provisioning Protocol
//! (EPP, [RFC 5730]) over its TCP data unit framing ([RFC 5734]).
//!
//! ## Architecture
//!
//! - **Data plane** ([`protocol`]): length-prefixed data unit framing over
//!   any `AsyncRead + AsyncWrite` byte channel, with pipelined
//!   order-preserving dispatch on both sides: concurrent client exchanges
//!   paired to replies by FIFO position, concurrent server handlers whose
//!   responses are written in strict arrival order.
//! - **Codec** ([`schema`]): a namespace-driven XML codec. The `<epp>`
//!   envelope and its five body elements are a closed union; command
//!   actions, object payloads, response data and extensions dispatch
//!   through composable [`Schema`](schema::Schema) resolvers, so third
//!   parties extend the grammar without touching the core types. Unclaimed
//!   elements round-trip verbatim.
//! - **Facades** ([`Client`], [`Session`]): the greeting handshake, default
//!   timeouts, and transaction-ID diagnostics on top of the dispatchers.
//!
//! Dialing, TLS and listener loops stay outside this crate: both facades
//! take an already-connected byte stream.
//!
//! ## Example
//!
//! ```ignore
//! use eppwire::{Client, Options};
//! use eppwire::schema::epp::{Body, Command, Login};
//!
//! let stream = tokio::net::TcpStream::connect("epp.example:700").await?;
//! let (client, greeting) = Client::connect(stream, Options::default()).await?;
//! println!("server: {}", greeting.server_name);
//!
//! let login = Login {
//!     client_id: "ClientX".into(),
//!     password: "secret".into(),
//!     ..Login::default()
//! };
//! let reply = client
//!     .exchange(&Body::Command(Command::new(login).with_transaction_id("ABC-1")))
//!     .await?;
//! ```
//!
//! [RFC 5730]: https://datatracker.ietf.org/doc/rfc5730/
//! [RFC 5734]: https://datatracker.ietf.org/doc/rfc5734/

pub mod error;
pub mod options;
pub mod protocol;
pub mod schema;

mod client;
mod server;

pub use client::Client;
pub use error::{EppError, Result};
pub use options::Options;
pub use server::{serve, Incoming, Responder, Session};
