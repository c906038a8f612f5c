//! One peer connection: a duplex ordered stream of binary websocket frames.
//!
//! Each session runs as a dedicated task that exclusively owns its
//! websocket and per-session state, so every callback that touches them is
//! serialized by construction (the strand of the design). All handoffs to
//! the coordinator go through a bounded channel, and the read loop does not
//! take the next frame until the coordinator has accepted the previous
//! message, so the socket can never outrun the application.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use icp_channel::merkle::Digest;

use crate::chain::ChainHead;
use crate::error::{Error, ErrorDetail};
use crate::message::{Hello, Ping, Pong, RelayId, RelayMessage};
use crate::util::{host_now, random_digest};

pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_session_id() -> SessionId {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// What a session reports to the coordinator.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A new session exists; the coordinator registers the handle.
    Opened(SessionHandle),
    /// The peer introduced itself; the coordinator dedups by relay id.
    Hello { session: SessionId, hello: Hello },
    /// An application message to translate into local transactions.
    Message {
        session: SessionId,
        message: RelayMessage,
    },
    /// The peer advertised its chain head in a ping.
    PeerHead { session: SessionId, head: ChainHead },
    /// The transport is gone; the coordinator unregisters the handle.
    Closed { session: SessionId },
}

/// What the coordinator sends into a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionInput {
    Message(RelayMessage),
    UpdateHead(ChainHead),
    Close,
}

/// The coordinator's grip on a session: its id, the peer relay id once the
/// hello arrived, and the input channel into the session task.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    pub peer_id: Option<RelayId>,
    input: mpsc::Sender<SessionInput>,
}

impl SessionHandle {
    pub fn new(id: SessionId, input: mpsc::Sender<SessionInput>) -> Self {
        Self {
            id,
            peer_id: None,
            input,
        }
    }

    pub async fn send(&self, message: RelayMessage) -> Result<(), Error> {
        self.input
            .send(SessionInput::Message(message))
            .await
            .map_err(|_| Error::session_closed(self.id))
    }

    pub async fn update_head(&self, head: ChainHead) -> Result<(), Error> {
        self.input
            .send(SessionInput::UpdateHead(head))
            .await
            .map_err(|_| Error::session_closed(self.id))
    }

    pub async fn close(&self) {
        let _ = self.input.send(SessionInput::Close).await;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SendState {
    Idle,
    Sending,
}

struct Session<S> {
    id: SessionId,
    ws: WebSocketStream<S>,
    local_hello: Hello,
    local_head: ChainHead,
    ping_interval: Duration,
    events: mpsc::Sender<SessionEvent>,
    input: mpsc::Receiver<SessionInput>,
    msg_queue: VecDeque<RelayMessage>,
    state: SendState,
    peer_id: Option<RelayId>,
    sent_hello: bool,
    recv_hello: bool,
    /// The ping whose pong is still outstanding.
    ping_in_flight: Option<Digest>,
    last_ping_at: Option<Instant>,
    /// A received ping not yet answered.
    pending_pong: Option<Ping>,
}

/// Spawns the session task over an established websocket and returns the
/// handle the coordinator keeps. The hello goes out immediately.
pub fn spawn<S>(
    id: SessionId,
    ws: WebSocketStream<S>,
    local_hello: Hello,
    local_head: ChainHead,
    ping_interval: Duration,
    events: mpsc::Sender<SessionEvent>,
) -> (SessionHandle, tokio::task::JoinHandle<()>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (input_tx, input_rx) = mpsc::channel(64);

    let session = Session {
        id,
        ws,
        local_hello,
        local_head,
        ping_interval,
        events,
        input: input_rx,
        msg_queue: VecDeque::new(),
        state: SendState::Idle,
        peer_id: None,
        sent_hello: false,
        recv_hello: false,
        ping_in_flight: None,
        last_ping_at: None,
        pending_pong: None,
    };

    let join = tokio::spawn(session.run());
    (SessionHandle::new(id, input_tx), join)
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn run(mut self) {
        info!(session = self.id, "open session");

        if let Err(e) = self.do_hello().await {
            error!(session = self.id, "hello: {}", e);
            return self.shutdown().await;
        }

        let mut ticker = tokio::time::interval(self.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = self.ws.next() => {
                    match frame {
                        None => {
                            debug!(session = self.id, "transport closed");
                            break;
                        }
                        Some(Err(e)) => {
                            error!(session = self.id, "read: {}", e);
                            break;
                        }
                        Some(Ok(WsMessage::Binary(bytes))) => {
                            if !self.handle_frame(&bytes).await {
                                break;
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) => {
                            debug!(session = self.id, "close on read");
                            break;
                        }
                        // Transport-level ping/pong; the websocket layer
                        // answers these itself.
                        Some(Ok(_)) => {}
                    }
                }
                input = self.input.recv() => {
                    match input {
                        Some(SessionInput::Message(message)) => self.buffer_send(message),
                        Some(SessionInput::UpdateHead(head)) => self.local_head = head,
                        Some(SessionInput::Close) | None => break,
                    }
                }
                _ = ticker.tick() => {}
            }

            // The send pump runs after every completed read, write and
            // timer tick.
            if let Err(e) = self.maybe_send_next_message().await {
                error!(session = self.id, "write: {}", e);
                break;
            }
        }

        self.shutdown().await;
    }

    async fn shutdown(mut self) {
        let _ = self.ws.close(None).await;
        let _ = self
            .events
            .send(SessionEvent::Closed { session: self.id })
            .await;
        info!(session = self.id, "close session");
    }

    /// Decodes and dispatches one frame; returns `false` when the session
    /// must close.
    async fn handle_frame(&mut self, bytes: &[u8]) -> bool {
        let message = match RelayMessage::decode_frame(bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!(session = self.id, "close bad payload: {}", e);
                self.close_bad_payload().await;
                return false;
            }
        };

        match self.on_message(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(session = self.id, "{}", e);
                if matches!(e.detail(), ErrorDetail::HelloExpected(_)) {
                    self.close_bad_payload().await;
                }
                false
            }
        }
    }

    async fn close_bad_payload(&mut self) {
        let frame = CloseFrame {
            code: CloseCode::Invalid,
            reason: "bad payload".into(),
        };
        if let Err(e) = self.ws.close(Some(frame)).await {
            debug!(session = self.id, "close: {}", e);
        }
    }

    async fn do_hello(&mut self) -> Result<(), Error> {
        let hello = self.local_hello.clone();
        self.send(&RelayMessage::Hello(hello)).await?;
        self.sent_hello = true;
        Ok(())
    }

    async fn on_message(&mut self, message: RelayMessage) -> Result<(), Error> {
        if !self.recv_hello {
            return match message {
                RelayMessage::Hello(hello) => self.on_hello(hello).await,
                _ => Err(Error::hello_expected()),
            };
        }

        match message {
            RelayMessage::Hello(hello) => self.on_hello(hello).await,
            RelayMessage::Ping(ping) => self.on_ping(ping).await,
            RelayMessage::Pong(pong) => self.on_pong(pong),
            message => self
                .events
                .send(SessionEvent::Message {
                    session: self.id,
                    message,
                })
                .await
                .map_err(|_| Error::coordinator_gone()),
        }
    }

    async fn on_hello(&mut self, hello: Hello) -> Result<(), Error> {
        info!(
            session = self.id,
            peer.id = %hello.id,
            peer.chain_id = %hello.chain_id,
            peer.contract = %hello.contract,
            "received hello"
        );

        if hello.chain_id != self.local_hello.chain_id {
            return Err(Error::chain_id_mismatch(
                self.local_hello.chain_id.clone(),
                hello.chain_id,
            ));
        }
        if hello.id == self.local_hello.id {
            debug!(session = self.id, "connected to self");
            return Err(Error::self_connect());
        }

        self.peer_id = Some(hello.id);
        self.recv_hello = true;

        self.events
            .send(SessionEvent::Hello {
                session: self.id,
                hello,
            })
            .await
            .map_err(|_| Error::coordinator_gone())
    }

    async fn on_ping(&mut self, ping: Ping) -> Result<(), Error> {
        let head = ping.head;
        self.pending_pong = Some(ping);

        self.events
            .send(SessionEvent::PeerHead {
                session: self.id,
                head,
            })
            .await
            .map_err(|_| Error::coordinator_gone())
    }

    fn on_pong(&mut self, pong: Pong) -> Result<(), Error> {
        match self.ping_in_flight.take() {
            Some(code) if code == pong.code => Ok(()),
            _ => Err(Error::ping_mismatch()),
        }
    }

    fn buffer_send(&mut self, message: RelayMessage) {
        self.msg_queue.push_back(message);
    }

    /// Writes everything currently eligible, in priority order: answer a
    /// pending ping, originate a ping, then drain application messages.
    /// Each write completes before the next begins, so at most one is ever
    /// in flight.
    async fn maybe_send_next_message(&mut self) -> Result<(), Error> {
        debug_assert_eq!(self.state, SendState::Idle);

        if !self.sent_hello || !self.recv_hello {
            return Ok(());
        }

        loop {
            if self.send_pong().await? {
                continue;
            }
            if self.send_ping().await? {
                continue;
            }
            match self.msg_queue.pop_front() {
                Some(message) => self.send(&message).await?,
                None => return Ok(()),
            }
        }
    }

    async fn send_pong(&mut self) -> Result<bool, Error> {
        let Some(ping) = self.pending_pong.take() else {
            return Ok(false);
        };

        self.send(&RelayMessage::Pong(Pong {
            sent: host_now(),
            code: ping.code,
        }))
        .await?;
        Ok(true)
    }

    async fn send_ping(&mut self) -> Result<bool, Error> {
        if self.ping_in_flight.is_some() {
            return Ok(false);
        }
        if let Some(at) = self.last_ping_at {
            if at.elapsed() < self.ping_interval {
                return Ok(false);
            }
        }

        let code = random_digest();
        self.ping_in_flight = Some(code);
        self.last_ping_at = Some(Instant::now());

        self.send(&RelayMessage::Ping(Ping {
            sent: host_now(),
            code,
            head: self.local_head,
        }))
        .await?;
        Ok(true)
    }

    async fn send(&mut self, message: &RelayMessage) -> Result<(), Error> {
        self.state = SendState::Sending;
        let result = self
            .ws
            .send(WsMessage::Binary(message.encode_frame()))
            .await
            .map_err(Error::transport);
        self.state = SendState::Idle;
        result
    }
}
