//! Wires the relay together: spawns the coordinator, accepts inbound peer
//! connections, and dials configured peers with a reconnect loop.

use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{accept_async, client_async};
use tracing::{error, info, warn};

use crate::chain::{ChainEvent, ChainHandle, ChainHead};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::Error;
use crate::message::Hello;
use crate::session::{self, next_session_id, SessionEvent};
use crate::util::random_digest;

/// A running relay: feed local chain blocks into `chain_events`; dropping
/// the handle lets the coordinator and its sessions wind down.
pub struct RelayHandle {
    pub chain_events: mpsc::Sender<ChainEvent>,
    pub coordinator: JoinHandle<()>,
}

/// Starts the coordinator, the listener (when configured) and one dialer
/// per configured peer.
pub async fn spawn<Chain>(config: Config, chain: Chain) -> Result<RelayHandle, Error>
where
    Chain: ChainHandle,
{
    let local_hello = Hello {
        id: random_digest(),
        chain_id: config.chain.id.clone(),
        contract: config.chain.local_contract.clone(),
        peer_contract: config.chain.peer_contract.clone(),
    };
    info!(relay.id = %local_hello.id, "starting relay");

    let local_head = chain.head();
    let (coordinator, inputs) = Coordinator::new(
        local_hello.id,
        chain,
        config.chain.local_contract.clone(),
        config.chain.peer_contract.clone(),
    );
    let coordinator = tokio::spawn(coordinator.run());

    if let Some(listen_addr) = &config.chain.listen_addr {
        let listener = bind_listener(listen_addr, config.global.socket_buffer_bytes).await?;
        info!(addr = %listen_addr, "listening for peer relays");
        tokio::spawn(accept_loop(
            listener,
            config.clone(),
            local_hello.clone(),
            local_head,
            inputs.session_events.clone(),
        ));
    }

    for peer in &config.chain.peers {
        tokio::spawn(dial_loop(
            peer.clone(),
            config.clone(),
            local_hello.clone(),
            local_head,
            inputs.session_events.clone(),
        ));
    }

    Ok(RelayHandle {
        chain_events: inputs.chain_events,
        coordinator,
    })
}

async fn bind_listener(addr: &str, buffer_bytes: u32) -> Result<TcpListener, Error> {
    let addr: SocketAddr = lookup_host(addr)
        .await
        .map_err(Error::io)?
        .next()
        .ok_or_else(|| Error::invalid_peer_address(addr.to_string()))?;

    let socket = new_socket(&addr, buffer_bytes)?;
    socket.set_reuseaddr(true).map_err(Error::io)?;
    socket.bind(addr).map_err(Error::io)?;
    socket.listen(64).map_err(Error::io)
}

fn new_socket(addr: &SocketAddr, buffer_bytes: u32) -> Result<TcpSocket, Error> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(Error::io)?;

    // Large buffers absorb block bursts without waiting on acks.
    socket
        .set_send_buffer_size(buffer_bytes)
        .map_err(Error::io)?;
    socket
        .set_recv_buffer_size(buffer_bytes)
        .map_err(Error::io)?;
    Ok(socket)
}

async fn accept_loop(
    listener: TcpListener,
    config: Config,
    local_hello: Hello,
    local_head: ChainHead,
    events: mpsc::Sender<SessionEvent>,
) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("accept: {}", e);
                continue;
            }
        };
        info!(peer = %peer_addr, "inbound connection");

        if let Err(e) = stream.set_nodelay(true) {
            warn!(peer = %peer_addr, "set nodelay: {}", e);
        }

        let ws = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                error!(peer = %peer_addr, "handshake: {}", e);
                continue;
            }
        };

        let (handle, _join) = session::spawn(
            next_session_id(),
            ws,
            local_hello.clone(),
            local_head,
            config.global.ping_interval(),
            events.clone(),
        );
        if events.send(SessionEvent::Opened(handle)).await.is_err() {
            // Coordinator is gone; stop accepting.
            return;
        }
    }
}

/// Dials one configured peer forever, reconnecting after the configured
/// delay whenever the session ends.
async fn dial_loop(
    peer: String,
    config: Config,
    local_hello: Hello,
    local_head: ChainHead,
    events: mpsc::Sender<SessionEvent>,
) {
    loop {
        match connect(&peer, &config, &local_hello, local_head, &events).await {
            Ok(join) => {
                // Wait for the session to end before redialing.
                let _ = join.await;
                warn!(peer = %peer, "session ended, reconnecting");
            }
            Err(e) => {
                warn!(peer = %peer, "connect failed: {}", e);
            }
        }

        if events.is_closed() {
            return;
        }
        sleep(config.global.reconnect_delay()).await;
    }
}

async fn connect(
    peer: &str,
    config: &Config,
    local_hello: &Hello,
    local_head: ChainHead,
    events: &mpsc::Sender<SessionEvent>,
) -> Result<JoinHandle<()>, Error> {
    let addr = lookup_host(peer)
        .await
        .map_err(|e| Error::connect(peer.to_string(), e))?
        .next()
        .ok_or_else(|| Error::invalid_peer_address(peer.to_string()))?;

    let socket = new_socket(&addr, config.global.socket_buffer_bytes)?;
    let stream: TcpStream = socket
        .connect(addr)
        .await
        .map_err(|e| Error::connect(peer.to_string(), e))?;
    stream.set_nodelay(true).map_err(Error::io)?;

    let url = format!("ws://{peer}/");
    let (ws, _response) = client_async(url, stream).await.map_err(Error::handshake)?;
    info!(peer = %peer, "outbound connection established");

    let (handle, join) = session::spawn(
        next_session_id(),
        ws,
        local_hello.clone(),
        local_head,
        config.global.ping_interval(),
        events.clone(),
    );
    events
        .send(SessionEvent::Opened(handle))
        .await
        .map_err(|_| Error::coordinator_gone())?;

    Ok(join)
}
