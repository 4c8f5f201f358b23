use crate::core::config::UserDataStreamConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::Parameters;
use crate::core::kernel::rest::RequestClient;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Method;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Callback for failures that happen off the caller's path (keepalive, best-effort close)
pub type ErrorObserver = Arc<dyn Fn(&ExchangeError) + Send + Sync>;

/// Read-only handle to an open user data stream
///
/// Closing is owned by the session; the handle only exposes the push messages.
#[derive(Debug, Clone)]
pub struct UserDataStream {
    url: String,
    events: broadcast::Sender<String>,
    connected: Arc<AtomicBool>,
}

impl UserDataStream {
    /// Socket URL, `<stream host>/ws/<listen key>`
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Receive raw text frames pushed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Event type (`e` field) of a push message
pub fn event_type(message: &str) -> Option<String> {
    serde_json::from_str::<Value>(message)
        .ok()?
        .get("e")?
        .as_str()
        .map(str::to_string)
}

struct ActiveSession {
    generation: u64,
    rest_host: String,
    stream: UserDataStream,
    sink: WsSink,
    keepalive: JoinHandle<()>,
    reader: JoinHandle<()>,
}

enum SessionState {
    Uninitialized,
    Open(ActiveSession),
    Closed,
}

struct SessionInner {
    client: Arc<RequestClient>,
    listen_key_path: &'static str,
    config: UserDataStreamConfig,
    // serializes open and teardown
    transition: tokio::sync::Mutex<()>,
    state: Mutex<SessionState>,
    observer: RwLock<Option<ErrorObserver>>,
    generation: AtomicU64,
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_open(&self) -> bool {
        matches!(*self.lock_state(), SessionState::Open(_))
    }

    fn report(&self, error: &ExchangeError) {
        let observer = self
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer(error);
        }
    }

    async fn create_listen_key(&self, rest_host: &str) -> Result<String, ExchangeError> {
        let body = self
            .client
            .private_request_raw(Method::POST, rest_host, self.listen_key_path, Parameters::new())
            .await?;

        body.get("listenKey")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ExchangeError::DeserializationError("Missing listenKey in response".to_string())
            })
    }

    async fn keepalive_listen_key(&self, rest_host: &str) -> Result<(), ExchangeError> {
        self.client
            .private_request_raw(Method::PUT, rest_host, self.listen_key_path, Parameters::new())
            .await
            .map(|_| ())
    }

    async fn close_listen_key(&self, rest_host: &str) -> Result<(), ExchangeError> {
        self.client
            .private_request_raw(Method::DELETE, rest_host, self.listen_key_path, Parameters::new())
            .await
            .map(|_| ())
    }

    async fn connect(&self, url: &str) -> Result<WsStream, ExchangeError> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let (socket, _) = timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                ExchangeError::NetworkError("User data stream connection timeout".to_string())
            })?
            .map_err(|e| {
                ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e))
            })?;
        Ok(socket)
    }

    /// Close the active session. `generation` restricts the teardown to one session so a
    /// late remote-close notification cannot tear down its successor.
    ///
    /// Returns `false` when there was nothing to close.
    #[instrument(skip(self), fields(exchange = %self.client.exchange_name()))]
    async fn teardown(&self, generation: Option<u64>, explicit: bool) -> bool {
        let _transition = self.transition.lock().await;

        let active = {
            let mut state = self.lock_state();
            let matches = match &*state {
                SessionState::Open(active) => generation.map_or(true, |g| g == active.generation),
                _ => false,
            };
            if !matches {
                return false;
            }
            match std::mem::replace(&mut *state, SessionState::Closed) {
                SessionState::Open(active) => active,
                _ => return false,
            }
        };

        // timer first, so no keepalive can hit a revoked key
        active.keepalive.abort();
        active.stream.connected.store(false, Ordering::SeqCst);

        let ActiveSession {
            generation,
            rest_host,
            mut sink,
            reader,
            ..
        } = active;

        if explicit {
            let close_timeout = Duration::from_millis(self.config.connect_timeout_ms);
            match timeout(close_timeout, sink.send(Message::Close(None))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Failed to send close frame: {}", e),
                Err(_) => debug!("Timed out sending close frame"),
            }
        }

        if let Err(e) = self.close_listen_key(&rest_host).await {
            warn!("Failed to close listen key: {}", e);
            self.report(&e);
        }

        reader.abort();
        drop(sink);

        info!(generation, explicit, "User data stream closed");
        true
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let SessionState::Open(active) = state {
            active.keepalive.abort();
            active.reader.abort();
        }
    }
}

async fn keepalive_loop(inner: Weak<SessionInner>, rest_host: String, period: Duration) {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };

        match inner.keepalive_listen_key(&rest_host).await {
            Ok(()) => debug!("Listen key kept alive"),
            Err(e) => {
                warn!("Listen key keepalive failed: {}", e);
                inner.report(&e);
            }
        }
    }
}

async fn read_loop(
    inner: Weak<SessionInner>,
    generation: u64,
    mut source: WsSource,
    stream: UserDataStream,
) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                // no subscribers is not an error
                let _ = stream.events.send(text);
            }
            Ok(Message::Close(frame)) => {
                debug!(?frame, "User data stream closed by remote");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("User data stream error: {}", e);
                if let Some(inner) = inner.upgrade() {
                    inner.report(&ExchangeError::NetworkError(format!(
                        "User data stream error: {}",
                        e
                    )));
                }
                break;
            }
        }
    }

    stream.connected.store(false, Ordering::SeqCst);

    // teardown aborts this task, so it runs on its own
    if let Some(inner) = inner.upgrade() {
        tokio::spawn(async move {
            inner.teardown(Some(generation), false).await;
        });
    }
}

/// Listen-key lifecycle for one authenticated market
///
/// At most one session is open at a time. Opening creates a listen key, connects to
/// `<stream host>/ws/<listen key>` and arms the keepalive timer. A session ends either on
/// `close` or when the remote side drops the socket; both paths cancel the timer, then
/// revoke the key best-effort.
pub struct UserDataSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for UserDataSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDataSession")
            .field("listen_key_path", &self.inner.listen_key_path)
            .field("open", &self.inner.is_open())
            .finish_non_exhaustive()
    }
}

impl UserDataSession {
    pub fn new(
        client: Arc<RequestClient>,
        listen_key_path: &'static str,
        config: UserDataStreamConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                client,
                listen_key_path,
                config,
                transition: tokio::sync::Mutex::new(()),
                state: Mutex::new(SessionState::Uninitialized),
                observer: RwLock::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Register the callback for keepalive and close failures
    pub fn set_error_observer(&self, observer: Option<ErrorObserver>) {
        *self
            .inner
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = observer;
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Create a listen key and connect the user data stream
    #[instrument(skip(self), fields(exchange = %self.inner.client.exchange_name()))]
    pub async fn open(
        &self,
        rest_host: &str,
        stream_host: &str,
    ) -> Result<UserDataStream, ExchangeError> {
        let _transition = self.inner.transition.lock().await;

        let already_open = self.inner.is_open();
        if already_open {
            return Err(ExchangeError::AlreadyInitialized);
        }

        let listen_key = self.inner.create_listen_key(rest_host).await?;
        let url = format!("{}/ws/{}", stream_host.trim_end_matches('/'), listen_key);

        let socket = match self.inner.connect(&url).await {
            Ok(socket) => socket,
            Err(e) => {
                if let Err(close_err) = self.inner.close_listen_key(rest_host).await {
                    warn!("Failed to close unused listen key: {}", close_err);
                }
                return Err(e);
            }
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (events, _) = broadcast::channel(self.inner.config.message_buffer_size.max(1));
        let stream = UserDataStream {
            url,
            events,
            connected: Arc::new(AtomicBool::new(true)),
        };

        let (sink, source) = socket.split();
        let reader = tokio::spawn(read_loop(
            Arc::downgrade(&self.inner),
            generation,
            source,
            stream.clone(),
        ));
        let keepalive = tokio::spawn(keepalive_loop(
            Arc::downgrade(&self.inner),
            rest_host.to_string(),
            self.inner.config.keepalive_interval,
        ));

        *self.inner.lock_state() = SessionState::Open(ActiveSession {
            generation,
            rest_host: rest_host.to_string(),
            stream: stream.clone(),
            sink,
            keepalive,
            reader,
        });

        info!(generation, "User data stream opened");
        Ok(stream)
    }

    /// Close the session if one is open
    pub async fn close(&self) {
        if !self.inner.teardown(None, true).await {
            debug!("No user data stream to close");
        }
    }

    /// Handle to the live stream
    pub fn stream(&self) -> Result<UserDataStream, ExchangeError> {
        match &*self.inner.lock_state() {
            SessionState::Uninitialized => Err(ExchangeError::AccountDataNotInitialized),
            SessionState::Closed => Err(ExchangeError::StreamNotReady),
            SessionState::Open(active) => Ok(active.stream.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ClientOptions;

    fn session() -> UserDataSession {
        let client = RequestClient::new("test", ClientOptions::default(), None).unwrap();
        UserDataSession::new(
            Arc::new(client),
            "/fapi/v1/listenKey",
            UserDataStreamConfig::default(),
        )
    }

    #[test]
    fn test_event_type() {
        assert_eq!(
            event_type(r#"{"e":"ORDER_TRADE_UPDATE","E":1}"#).as_deref(),
            Some("ORDER_TRADE_UPDATE")
        );
        assert_eq!(event_type(r#"{"E":1}"#), None);
        assert_eq!(event_type("not json"), None);
    }

    #[test]
    fn test_stream_before_open() {
        let session = session();
        assert!(!session.is_open());
        assert!(matches!(
            session.stream(),
            Err(ExchangeError::AccountDataNotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_open_without_credentials_fails_locally() {
        let session = session();
        let result = session.open("http://127.0.0.1:9", "ws://127.0.0.1:9").await;
        assert!(matches!(result, Err(ExchangeError::AuthenticationRequired)));
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_close_when_not_open_is_noop() {
        let session = session();
        session.close().await;
        assert!(matches!(
            session.stream(),
            Err(ExchangeError::AccountDataNotInitialized)
        ));
    }
}
