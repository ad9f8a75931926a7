//! Low-level EPP server session (RFC 5730).
//!
//! [`serve`] sends the initial `<greeting>` over an accepted byte stream
//! and returns a [`Session`]. The application then loops on
//! [`Session::accept`], handling each request in its own task; the
//! [`Responder`] handed out with every request enforces that responses hit
//! the wire in the exact order the requests arrived, whatever order the
//! handlers finish in.
//!
//! # Example
//!
//! ```ignore
//! use eppwire::{serve, Options};
//! use eppwire::schema::epp::{Body, Greeting, Response, ResultCode};
//!
//! let greeting = Body::Greeting(Greeting::default());
//! let session = serve(stream, &greeting, Options::default()).await?;
//! loop {
//!     let incoming = session.accept().await?;
//!     tokio::spawn(async move {
//!         let reply = match incoming.body {
//!             Ok(body) => handle(body),
//!             // Malformed requests still get an answer.
//!             Err(_) => Body::Response(Response::with_code(ResultCode::COMMAND_SYNTAX_ERROR)),
//!         };
//!         incoming.responder.respond(&reply).await
//!     });
//! }
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::options::Options;
use crate::protocol::{CloseReason, DataUnitConn, DataUnitResponder, DataUnitServer};
use crate::schema::epp::{Body, EppCodec};

/// Services `stream` as an EPP server session, sending `greeting` to the
/// peer first.
pub async fn serve<S>(stream: S, greeting: &Body, options: Options) -> Result<Session>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
{
    let conn = Arc::new(DataUnitConn::new(stream));
    let codec = EppCodec::new(options.schemas);

    let data = codec.marshal(greeting)?;
    conn.write_data_unit(&data).await?;

    Ok(Session {
        inner: Arc::new(SessionInner {
            dispatcher: DataUnitServer::with_pipeline(conn, options.pipeline),
            codec,
        }),
    })
}

/// One server-side EPP session.
///
/// Cheap to clone; all clones share the connection. Safe to use from any
/// number of tasks concurrently.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    dispatcher: DataUnitServer,
    codec: EppCodec,
}

/// One inbound request: the decoded body (or the decode failure, which can
/// still be answered) and the responder for it.
#[derive(Debug)]
pub struct Incoming {
    /// The request body; `Err` carries the codec failure for a request that
    /// arrived intact but did not parse as EPP.
    pub body: Result<Body>,
    /// Always present, so malformed requests can be answered with an EPP
    /// error result.
    pub responder: Responder,
}

impl Session {
    /// Reads one request from the client.
    ///
    /// Connection-level failures surface as the outer error; a payload that
    /// fails to decode is returned as `Incoming { body: Err(..), .. }` with
    /// a usable responder. Each accepted request may be handled in its own
    /// task.
    pub async fn accept(&self) -> Result<Incoming> {
        let (data, responder) = self.inner.dispatcher.serve().await?;
        Ok(Incoming {
            body: self.inner.codec.unmarshal(&data),
            responder: Responder {
                inner: responder,
                codec: self.inner.codec.clone(),
            },
        })
    }

    /// Closes the session. In-flight and subsequent accepts and responds
    /// fail with [`EppError::ClosedConnection`](crate::EppError::ClosedConnection).
    pub async fn close(&self) {
        self.inner.dispatcher.close().await;
    }

    /// Closes the session on behalf of a shutting-down listener; pending
    /// operations observe [`EppError::ServerClosed`](crate::EppError::ServerClosed)
    /// instead.
    pub async fn shutdown(&self) {
        self.inner.dispatcher.close_with(CloseReason::Server).await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

/// Single-use handle by which a handler answers exactly one request.
///
/// The first [`respond`](Responder::respond) performs the write (blocking
/// until this response's turn in arrival order); every later call returns
/// [`EppError::MultipleResponse`](crate::EppError::MultipleResponse)
/// without touching the connection. Handlers must respond exactly once -
/// translate cancellation into an EPP error response rather than dropping
/// the responder, or response ordering wedges at this slot.
#[derive(Debug)]
pub struct Responder {
    inner: DataUnitResponder,
    codec: EppCodec,
}

impl Responder {
    /// Arrival-order sequence number of the request this responder answers.
    pub fn index(&self) -> u64 {
        self.inner.index()
    }

    /// Marshals `body` and writes it as the response.
    pub async fn respond(&self, body: &Body) -> Result<()> {
        let data = self.codec.marshal(body)?;
        self.inner.respond(&data).await
    }
}
