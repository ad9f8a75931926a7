//! Low-level EPP client (RFC 5730).
//!
//! A [`Client`] wraps one data unit connection and multiplexes concurrent
//! [`exchange`] calls onto it in strict FIFO order. Construction spawns a
//! background read of the server's initial `<greeting>`; every exchange
//! waits for that greeting before writing its first data unit, as the
//! protocol requires.
//!
//! # Example
//!
//! ```ignore
//! use eppwire::{Client, Options};
//! use eppwire::schema::epp::Body;
//!
//! let stream = tokio::net::TcpStream::connect("epp.example:700").await?;
//! let (client, greeting) = Client::connect(stream, Options::default()).await?;
//! println!("connected to {}", greeting.server_name);
//!
//! let reply = client.exchange(&Body::Hello).await?;
//! client.close().await;
//! ```
//!
//! [`exchange`]: Client::exchange

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::watch;

use crate::error::{EppError, Result};
use crate::options::Options;
use crate::protocol::{DataUnitClient, DataUnitConn};
use crate::schema::epp::{Body, EppCodec, Greeting};

/// A low-level EPP client over one connection.
///
/// Cheap to clone; all clones share the connection. Safe to use from any
/// number of tasks concurrently.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    dispatcher: DataUnitClient,
    codec: EppCodec,
    timeout: Option<std::time::Duration>,
    /// Latest greeting, plus the one-shot "first greeting received" signal
    /// (the Pending -> non-Pending transition).
    greeting: watch::Sender<GreetingState>,
    /// Client transaction IDs currently on the wire.
    in_flight_ids: StdMutex<HashSet<String>>,
}

#[derive(Debug, Clone)]
enum GreetingState {
    Pending,
    Ready(Greeting),
    Failed(Arc<EppError>),
}

impl Client {
    /// Creates a client over `stream` and waits for the server's initial
    /// `<greeting>`, returning both.
    pub async fn connect<S>(stream: S, options: Options) -> Result<(Client, Greeting)>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
    {
        let client = Client::new(stream, options);
        let greeting = client.greeting().await?;
        Ok((client, greeting))
    }

    /// Creates a client over `stream` without waiting for the greeting.
    ///
    /// The greeting is read in the background; [`exchange`](Self::exchange)
    /// blocks on it before writing anything.
    pub fn new<S>(stream: S, options: Options) -> Client
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
    {
        let conn = Arc::new(DataUnitConn::new(stream));
        let (greeting, _) = watch::channel(GreetingState::Pending);
        let inner = Arc::new(ClientInner {
            dispatcher: DataUnitClient::new(conn),
            codec: EppCodec::new(options.schemas),
            timeout: options.timeout,
            greeting,
            in_flight_ids: StdMutex::new(HashSet::new()),
        });

        let reader = Arc::clone(&inner);
        tokio::spawn(async move {
            reader.read_initial_greeting().await;
        });

        Client { inner }
    }

    /// Sends `body` and returns the server's reply to it.
    ///
    /// Blocks until the first greeting has been received, then until the
    /// paired response arrives, the configured timeout elapses, or the
    /// connection is closed. Replies are matched to callers strictly by
    /// FIFO position; a reply whose `<clTRID>` disagrees with the command
    /// it answers is logged as a diagnostic and delivered anyway.
    pub async fn exchange(&self, body: &Body) -> Result<Body> {
        match self.inner.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange_inner(body))
                .await
                .map_err(|_| {
                    EppError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "exchange deadline exceeded",
                    ))
                })?,
            None => self.exchange_inner(body).await,
        }
    }

    /// Sends `<hello/>` and returns the fresh `<greeting>`, which also
    /// replaces the cached one.
    pub async fn hello(&self) -> Result<Greeting> {
        match self.exchange(&Body::Hello).await? {
            Body::Greeting(greeting) => Ok(greeting),
            other => Err(EppError::malformed(format!(
                "expected <greeting> in reply to <hello>, got {other:?}"
            ))),
        }
    }

    /// The latest cached greeting, waiting for the first one if necessary.
    pub async fn greeting(&self) -> Result<Greeting> {
        let mut rx = self.inner.greeting.subscribe();
        let state = rx
            .wait_for(|state| !matches!(state, GreetingState::Pending))
            .await
            .map_err(|_| EppError::ClosedConnection)?;
        match &*state {
            GreetingState::Ready(greeting) => Ok(greeting.clone()),
            GreetingState::Failed(err) => Err(clone_error(err)),
            GreetingState::Pending => Err(EppError::ClosedConnection),
        }
    }

    /// Closes the connection. Every pending exchange resolves with
    /// [`EppError::ClosedConnection`]; subsequent operations fail the same
    /// way.
    pub async fn close(&self) {
        self.inner.dispatcher.close().await;
        // Unblock anything still waiting on the greeting barrier.
        self.inner.greeting.send_if_modified(|state| {
            if matches!(state, GreetingState::Pending) {
                *state = GreetingState::Failed(Arc::new(EppError::ClosedConnection));
                true
            } else {
                false
            }
        });
    }

    async fn exchange_inner(&self, body: &Body) -> Result<Body> {
        self.await_greeting().await?;

        let sent_id = match body {
            Body::Command(command) => command.client_transaction_id.clone(),
            _ => None,
        };
        let _id_guard = match &sent_id {
            Some(id) => Some(IdGuard::register(&self.inner, id.clone())?),
            None => None,
        };

        let data = self.inner.codec.marshal(body)?;
        let reply = self.inner.dispatcher.exchange(&data).await?;
        let reply = self.inner.codec.unmarshal(&reply)?;

        match &reply {
            // A greeting in response position answers a <hello>; refresh the
            // cache without re-arming the first-greeting signal.
            Body::Greeting(greeting) => self.inner.store_greeting(greeting.clone()),
            Body::Response(response) => {
                if let Some(sent) = &sent_id {
                    if &response.transaction_id.client != sent {
                        // Strict FIFO: diagnostic only, the frame is
                        // delivered to this caller regardless.
                        let err = EppError::InvalidTransactionId {
                            id: response.transaction_id.client.clone(),
                        };
                        tracing::warn!(expected = %sent, "{err}");
                    }
                }
            }
            _ => {}
        }
        Ok(reply)
    }

    /// The greeting barrier: resolves once the first greeting (or a
    /// connection failure) has been observed.
    async fn await_greeting(&self) -> Result<()> {
        let mut rx = self.inner.greeting.subscribe();
        let state = rx
            .wait_for(|state| !matches!(state, GreetingState::Pending))
            .await
            .map_err(|_| EppError::ClosedConnection)?;
        match &*state {
            GreetingState::Failed(err) => Err(clone_error(err)),
            _ => Ok(()),
        }
    }
}

impl ClientInner {
    /// Reads and decodes exactly one data unit as the initial greeting.
    async fn read_initial_greeting(&self) {
        let result = match self.dispatcher.conn().read_data_unit().await {
            Ok(data) => self.codec.unmarshal(&data),
            Err(err) => Err(err),
        };
        let state = match result {
            Ok(Body::Greeting(greeting)) => GreetingState::Ready(greeting),
            Ok(other) => {
                tracing::error!("initial frame was not a <greeting>: {other:?}");
                GreetingState::Failed(Arc::new(EppError::malformed(
                    "initial frame was not a <greeting>",
                )))
            }
            Err(err) => GreetingState::Failed(Arc::new(err)),
        };
        self.greeting.send_if_modified(|current| {
            if matches!(current, GreetingState::Pending) {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    fn store_greeting(&self, greeting: Greeting) {
        self.greeting
            .send_replace(GreetingState::Ready(greeting));
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

/// Registration of an in-flight client transaction ID; removed on drop so
/// cancelled exchanges free their ID.
struct IdGuard {
    inner: Arc<ClientInner>,
    id: String,
}

impl IdGuard {
    fn register(inner: &Arc<ClientInner>, id: String) -> Result<IdGuard> {
        let mut ids = inner
            .in_flight_ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !ids.insert(id.clone()) {
            return Err(EppError::DuplicateTransactionId { id });
        }
        drop(ids);
        Ok(IdGuard {
            inner: Arc::clone(inner),
            id,
        })
    }
}

impl Drop for IdGuard {
    fn drop(&mut self) {
        let mut ids = self
            .inner
            .in_flight_ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.remove(&self.id);
    }
}

/// Watch cells hand out shared references; errors crossing them are
/// reproduced rather than moved.
fn clone_error(err: &EppError) -> EppError {
    match err {
        EppError::Io(io) => EppError::Io(std::io::Error::new(io.kind(), io.to_string())),
        EppError::ClosedConnection => EppError::ClosedConnection,
        EppError::ServerClosed => EppError::ServerClosed,
        EppError::TruncatedFrame => EppError::TruncatedFrame,
        EppError::InvalidTransactionId { id } => {
            EppError::InvalidTransactionId { id: id.clone() }
        }
        EppError::DuplicateTransactionId { id } => {
            EppError::DuplicateTransactionId { id: id.clone() }
        }
        EppError::MultipleResponse { index, count } => EppError::MultipleResponse {
            index: *index,
            count: *count,
        },
        EppError::MalformedFrame { cause } => EppError::MalformedFrame {
            cause: cause.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire_format;
    use crate::schema::epp::{Command, Logout, Response, ResultCode};

    fn greeting_payload() -> Vec<u8> {
        EppCodec::standard()
            .marshal(&Body::Greeting(Greeting {
                server_name: "test".to_string(),
                ..Greeting::default()
            }))
            .unwrap()
    }

    /// A peer that sends its greeting immediately, then echoes a canned
    /// response per request.
    fn spawn_greeting_peer(stream: tokio::io::DuplexStream) {
        tokio::spawn(async move {
            let (mut r, mut w) = tokio::io::split(stream);
            wire_format::write_data_unit(&mut w, &greeting_payload())
                .await
                .unwrap();
            let codec = EppCodec::standard();
            while let Ok(data) = wire_format::read_data_unit(&mut r).await {
                let reply = match codec.unmarshal(&data) {
                    Ok(Body::Hello) => Body::Greeting(Greeting {
                        server_name: "refreshed".to_string(),
                        ..Greeting::default()
                    }),
                    Ok(Body::Command(command)) => {
                        let mut response = Response::with_code(ResultCode::COMMAND_SUCCESSFUL);
                        response.transaction_id.client =
                            command.client_transaction_id.unwrap_or_default();
                        response.transaction_id.server = "sv-1".to_string();
                        Body::Response(response)
                    }
                    _ => Body::Response(Response::with_code(ResultCode::COMMAND_SYNTAX_ERROR)),
                };
                let bytes = codec.marshal(&reply).unwrap();
                if wire_format::write_data_unit(&mut w, &bytes).await.is_err() {
                    break;
                }
            }
        });
    }

    #[tokio::test]
    async fn test_connect_returns_greeting() {
        let (a, b) = tokio::io::duplex(4096);
        spawn_greeting_peer(b);
        let (client, greeting) = Client::connect(a, Options::default()).await.unwrap();
        assert_eq!(greeting.server_name, "test");
        // Cached copy is immediately available.
        assert_eq!(client.greeting().await.unwrap().server_name, "test");
    }

    #[tokio::test]
    async fn test_exchange_command() {
        let (a, b) = tokio::io::duplex(4096);
        spawn_greeting_peer(b);
        let (client, _) = Client::connect(a, Options::default()).await.unwrap();

        let body = Body::Command(Command::new(Logout).with_transaction_id("TX-1"));
        match client.exchange(&body).await.unwrap() {
            Body::Response(response) => {
                assert_eq!(response.results[0].code, ResultCode::COMMAND_SUCCESSFUL);
                assert_eq!(response.transaction_id.client, "TX-1");
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hello_refreshes_cached_greeting() {
        let (a, b) = tokio::io::duplex(4096);
        spawn_greeting_peer(b);
        let (client, first) = Client::connect(a, Options::default()).await.unwrap();
        assert_eq!(first.server_name, "test");

        let refreshed = client.hello().await.unwrap();
        assert_eq!(refreshed.server_name, "refreshed");
        assert_eq!(client.greeting().await.unwrap().server_name, "refreshed");
    }

    #[tokio::test]
    async fn test_duplicate_transaction_id_rejected() {
        let (a, b) = tokio::io::duplex(4096);
        let client = Client::new(a, Options::default());
        // Hold the peer side without answering so the first exchange stays
        // in flight.
        let (mut peer_r, mut peer_w) = tokio::io::split(b);
        wire_format::write_data_unit(&mut peer_w, &greeting_payload())
            .await
            .unwrap();

        let body = Body::Command(Command::new(Logout).with_transaction_id("DUP-1"));
        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.exchange(&body).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let body = Body::Command(Command::new(Logout).with_transaction_id("DUP-1"));
        let err = client.exchange(&body).await.unwrap_err();
        assert!(matches!(err, EppError::DuplicateTransactionId { ref id } if id == "DUP-1"));

        // Answer the first so it completes and frees its ID.
        let _req = wire_format::read_data_unit(&mut peer_r).await.unwrap();
        let codec = EppCodec::standard();
        let mut response = Response::with_code(ResultCode::COMMAND_SUCCESSFUL);
        response.transaction_id.client = "DUP-1".to_string();
        let bytes = codec.marshal(&Body::Response(response)).unwrap();
        wire_format::write_data_unit(&mut peer_w, &bytes)
            .await
            .unwrap();
        first.await.unwrap().unwrap();

        // Now the ID is free again.
        let body = Body::Command(Command::new(Logout).with_transaction_id("DUP-1"));
        let again = {
            let client = client.clone();
            tokio::spawn(async move { client.exchange(&body).await })
        };
        let _req = wire_format::read_data_unit(&mut peer_r).await.unwrap();
        let mut response = Response::with_code(ResultCode::COMMAND_SUCCESSFUL);
        response.transaction_id.client = "DUP-1".to_string();
        let bytes = codec.marshal(&Body::Response(response)).unwrap();
        wire_format::write_data_unit(&mut peer_w, &bytes)
            .await
            .unwrap();
        again.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_timeout_option() {
        let (a, b) = tokio::io::duplex(4096);
        let options = Options::default().with_timeout(std::time::Duration::from_millis(50));
        let client = Client::new(a, options);
        // Greeting arrives, but no response ever does.
        let (_peer_r, mut peer_w) = tokio::io::split(b);
        wire_format::write_data_unit(&mut peer_w, &greeting_payload())
            .await
            .unwrap();

        let err = client.exchange(&Body::Hello).await.unwrap_err();
        match err {
            EppError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::TimedOut),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_unblocks_greeting_waiters() {
        let (a, _b) = tokio::io::duplex(4096);
        let client = Client::new(a, Options::default());

        let waiting = {
            let client = client.clone();
            tokio::spawn(async move { client.greeting().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        client.close().await;

        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(err, EppError::ClosedConnection));
    }
}
