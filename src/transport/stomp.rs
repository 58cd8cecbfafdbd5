//! STOMP over WebSocket transport.
//!
//! DESIGN
//! ======
//! `connect` spawns one background task that owns the socket. The task runs
//! sessions back to back: open the socket, CONNECT, wait for CONNECTED, then
//! pump inbound MESSAGE frames into the event channel and outbound frames
//! (SUBSCRIBE / UNSUBSCRIBE) onto the socket. When a session ends for any
//! reason other than `disconnect`, the task sleeps for the fixed reconnect
//! delay and starts over.
//!
//! Callers reach the socket only through an unbounded frame queue that exists
//! while a session is up, so `subscribe` never waits on network I/O.
//!
//! ERROR HANDLING
//! ==============
//! Socket failures and broker ERROR frames end the session and are logged;
//! they are never surfaced to the board beyond a `Disconnected` event. A
//! frame that fails to decode is logged and skipped without ending the session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use frames::{Command, Frame, HEADER_DESTINATION, HEADER_MESSAGE};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{SubscriptionHandle, Transport, TransportError, TransportEvent};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// How long `disconnect` waits for the session task before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompConfig {
    /// `ws://` or `wss://` endpoint of the broker.
    pub url: String,
    pub reconnect_delay: Duration,
    /// Bound on socket open plus the CONNECT / CONNECTED exchange.
    pub connect_timeout: Duration,
}

impl StompConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), reconnect_delay: DEFAULT_RECONNECT_DELAY, connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }
}

/// State shared between the transport handle and its session task.
#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    /// Sessions established so far; stamps every subscription handle.
    session: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
}

impl Shared {
    fn set_outbound(&self, tx: Option<mpsc::UnboundedSender<Frame>>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = tx;
    }

    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = outbound.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        tx.send(frame).map_err(|_| TransportError::NotConnected)
    }
}

pub struct StompTransport {
    config: StompConfig,
    shared: Arc<Shared>,
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StompTransport {
    #[must_use]
    pub fn new(config: StompConfig) -> Self {
        let (stop, _) = watch::channel(false);
        Self { config, shared: Arc::new(Shared::default()), stop, task: Mutex::new(None) }
    }
}

impl Drop for StompTransport {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

#[async_trait]
impl Transport for StompTransport {
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        let host = endpoint_host(&self.config.url)?;

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        self.stop.send_replace(false);
        let stop = self.stop.subscribe();
        info!(url = %self.config.url, "stomp: starting");
        *task = Some(tokio::spawn(connection_loop(
            self.config.clone(),
            host,
            Arc::clone(&self.shared),
            events,
            stop,
        )));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, topic: &str) -> Result<SubscriptionHandle, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let session = self.shared.session.load(Ordering::SeqCst);
        let id = format!("sub-{}", Uuid::new_v4());
        self.shared.send(Frame::subscribe(&id, topic))?;
        debug!(%topic, %id, session, "stomp: subscribe");
        Ok(SubscriptionHandle { id, topic: topic.to_owned(), session })
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), TransportError> {
        if handle.session != self.shared.session.load(Ordering::SeqCst) {
            debug!(topic = %handle.topic, id = %handle.id, "stomp: handle from an earlier session, nothing to cancel");
            return Ok(());
        }
        match self.shared.send(Frame::unsubscribe(&handle.id)) {
            Ok(()) => {
                debug!(topic = %handle.topic, id = %handle.id, "stomp: unsubscribe");
                Ok(())
            }
            Err(TransportError::NotConnected) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.stop.send_replace(true);
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut task) = task {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("stomp: session task did not stop in time, aborting");
                task.abort();
            }
            info!(url = %self.config.url, "stomp: stopped");
        }
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.set_outbound(None);
        Ok(())
    }
}

// =============================================================================
// SESSION TASK
// =============================================================================

async fn connection_loop(
    config: StompConfig,
    host: String,
    shared: Arc<Shared>,
    events: mpsc::Sender<TransportEvent>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }

        match run_session(&config, &host, &shared, &events, &mut stop).await {
            Ok(()) => info!(url = %config.url, "stomp: session closed"),
            Err(e) => warn!(url = %config.url, error = %e, "stomp: session failed"),
        }

        let was_connected = shared.connected.swap(false, Ordering::SeqCst);
        shared.set_outbound(None);

        if *stop.borrow() || events.is_closed() {
            break;
        }
        if was_connected {
            let _ = events.send(TransportEvent::Disconnected).await;
        }

        debug!(delay_ms = config.reconnect_delay.as_millis(), "stomp: reconnecting");
        tokio::select! {
            () = tokio::time::sleep(config.reconnect_delay) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

/// One connected session. Returns `Ok` only for a requested shutdown.
async fn run_session(
    config: &StompConfig,
    host: &str,
    shared: &Shared,
    events: &mpsc::Sender<TransportEvent>,
    stop: &mut watch::Receiver<bool>,
) -> Result<(), TransportError> {
    let socket = tokio::select! {
        result = tokio::time::timeout(config.connect_timeout, handshake(&config.url, host)) => {
            result.map_err(|_| TransportError::Timeout)??
        }
        _ = stop.changed() => return Ok(()),
    };
    let (mut write, mut read) = socket.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
    shared.set_outbound(Some(outbound_tx));
    shared.session.fetch_add(1, Ordering::SeqCst);
    shared.connected.store(true, Ordering::SeqCst);
    info!(url = %config.url, "stomp: connected");
    if events.send(TransportEvent::Connected).await.is_err() {
        return Ok(());
    }

    loop {
        tokio::select! {
            message = read.next() => {
                let Some(message) = message else {
                    return Err(TransportError::Closed);
                };
                let message = message?;
                if let Message::Close(_) = message {
                    return Err(TransportError::Closed);
                }
                let frame = match message_frame(&message) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(error = %e, "stomp: dropping undecodable frame");
                        continue;
                    }
                };
                handle_frame(frame, events).await?;
            }
            Some(frame) = outbound_rx.recv() => {
                write.send(to_message(&frame)).await?;
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    let _ = write.send(to_message(&Frame::disconnect())).await;
                    let _ = write.close().await;
                    return Ok(());
                }
            }
        }
    }
}

/// Open the socket and complete the CONNECT / CONNECTED exchange.
async fn handshake(url: &str, host: &str) -> Result<WsStream, TransportError> {
    let (mut socket, _) = connect_async(url).await?;
    socket.send(to_message(&Frame::connect(host, (0, 0)))).await?;
    loop {
        let Some(message) = socket.next().await else {
            return Err(TransportError::Closed);
        };
        let message = message?;
        if let Message::Close(_) = message {
            return Err(TransportError::Closed);
        }
        let Some(frame) = message_frame(&message)? else {
            continue;
        };
        match frame.command {
            Command::Connected => return Ok(socket),
            Command::Error => return Err(broker_error(&frame)),
            other => debug!(command = %other, "stomp: ignoring frame before CONNECTED"),
        }
    }
}

async fn handle_frame(frame: Frame, events: &mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
    match frame.command {
        Command::Message => {
            let Some(topic) = frame.header(HEADER_DESTINATION) else {
                warn!("stomp: MESSAGE without destination");
                return Ok(());
            };
            let body = match frame.body_text() {
                Ok(body) => body.to_owned(),
                Err(e) => {
                    warn!(%topic, error = %e, "stomp: MESSAGE body is not text");
                    return Ok(());
                }
            };
            let event = TransportEvent::Message { topic: topic.to_owned(), body };
            events.send(event).await.map_err(|_| TransportError::Closed)
        }
        Command::Error => Err(broker_error(&frame)),
        other => {
            debug!(command = %other, "stomp: ignoring frame");
            Ok(())
        }
    }
}

fn broker_error(frame: &Frame) -> TransportError {
    let summary = frame.header(HEADER_MESSAGE).unwrap_or("unspecified");
    let detail = frame.body_text().unwrap_or_default();
    if detail.is_empty() {
        TransportError::Broker(summary.to_owned())
    } else {
        TransportError::Broker(format!("{summary}: {detail}"))
    }
}

fn to_message(frame: &Frame) -> Message {
    let text = String::from_utf8_lossy(&frames::encode_frame(frame)).into_owned();
    Message::Text(text.into())
}

/// Decode a socket message. `Ok(None)` for heart-beats and control messages.
fn message_frame(message: &Message) -> Result<Option<Frame>, TransportError> {
    let bytes: &[u8] = match message {
        Message::Text(text) => text.as_bytes(),
        Message::Binary(bytes) => bytes.as_ref(),
        _ => return Ok(None),
    };
    if frames::is_heartbeat(bytes) {
        return Ok(None);
    }
    Ok(Some(frames::decode_frame(bytes)?))
}

/// `host[:port]` of a `ws://` / `wss://` URL, sent in the CONNECT frame.
fn endpoint_host(url: &str) -> Result<String, TransportError> {
    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .ok_or_else(|| TransportError::InvalidUrl(url.to_owned()))?;
    let host = rest.split(['/', '?']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(TransportError::InvalidUrl(url.to_owned()));
    }
    Ok(host.to_owned())
}

#[cfg(test)]
#[path = "stomp_test.rs"]
mod tests;
