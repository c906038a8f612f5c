//! The application side of the relay: one task owning the session registry,
//! both chain heads, and the translation of peer messages into local chain
//! transactions.
//!
//! Sessions never share state with the coordinator; everything crosses the
//! channel as a [`SessionEvent`], and everything going back crosses the
//! session handle. No locks are held anywhere across an await.

use std::collections::HashMap;

use codec::Encode;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use icp_channel::identifier::AccountId;
use icp_channel::packet::IcpAction;

use crate::chain::{Action, ActionName, ChainEvent, ChainHandle, ChainHead};
use crate::error::Error;
use crate::message::{BlockHeaderWithMerklePath, IcpActions, RelayId, RelayMessage};
use crate::session::{SessionEvent, SessionHandle, SessionId};

pub struct Coordinator<Chain> {
    id: RelayId,
    chain: Chain,
    local_contract: AccountId,
    peer_contract: AccountId,
    sessions: HashMap<SessionId, SessionHandle>,
    peer_head: ChainHead,
    local_head: ChainHead,
    session_events: mpsc::Receiver<SessionEvent>,
    chain_events: mpsc::Receiver<ChainEvent>,
}

/// Senders feeding a coordinator: sessions post their events on the first,
/// the local chain subscription posts blocks on the second.
pub struct CoordinatorInputs {
    pub session_events: mpsc::Sender<SessionEvent>,
    pub chain_events: mpsc::Sender<ChainEvent>,
}

impl<Chain: ChainHandle> Coordinator<Chain> {
    pub fn new(
        id: RelayId,
        chain: Chain,
        local_contract: AccountId,
        peer_contract: AccountId,
    ) -> (Self, CoordinatorInputs) {
        let (session_tx, session_rx) = mpsc::channel(32);
        let (chain_tx, chain_rx) = mpsc::channel(32);

        let local_head = chain.head();
        let coordinator = Self {
            id,
            chain,
            local_contract,
            peer_contract,
            sessions: HashMap::new(),
            peer_head: ChainHead::default(),
            local_head,
            session_events: session_rx,
            chain_events: chain_rx,
        };
        let inputs = CoordinatorInputs {
            session_events: session_tx,
            chain_events: chain_tx,
        };
        (coordinator, inputs)
    }

    pub fn id(&self) -> RelayId {
        self.id
    }

    pub fn local_contract(&self) -> &AccountId {
        &self.local_contract
    }

    pub fn peer_contract(&self) -> &AccountId {
        &self.peer_contract
    }

    pub fn peer_head(&self) -> ChainHead {
        self.peer_head
    }

    /// The local chain's production tip. Only ever advertised to peers in
    /// pings; header contiguity is gated on the contract's fork store.
    pub fn local_head(&self) -> ChainHead {
        self.local_head
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn for_each_session(&self, mut f: impl FnMut(&SessionHandle)) {
        for handle in self.sessions.values() {
            f(handle);
        }
    }

    /// Runs until every input channel is closed.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.session_events.recv() => {
                    match event {
                        Some(event) => self.handle_session_event(event).await,
                        None => break,
                    }
                }
                event = self.chain_events.recv() => {
                    match event {
                        Some(event) => self.handle_chain_event(event).await,
                        None => break,
                    }
                }
            }
        }
        info!("coordinator stopped");
    }

    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened(handle) => {
                debug!(session = handle.id, "session registered");
                self.sessions.insert(handle.id, handle);
            }
            SessionEvent::Hello { session, hello } => {
                if let Some(handle) = self.sessions.get_mut(&session) {
                    handle.peer_id = Some(hello.id);
                }
                self.close_redundant_sessions(hello.id).await;
            }
            SessionEvent::PeerHead { head, .. } => {
                if head.block_num >= self.peer_head.block_num {
                    self.peer_head = head;
                }
            }
            SessionEvent::Message { session, message } => {
                if let Err(e) = self.on_peer_message(message) {
                    warn!(session, "failed to apply peer message: {}", e);
                }
            }
            SessionEvent::Closed { session } => {
                self.on_session_close(session);
            }
        }
    }

    pub fn on_session_close(&mut self, session: SessionId) {
        if self.sessions.remove(&session).is_some() {
            info!(session, "session unregistered");
        }
    }

    /// Keeps the most recent session per peer relay id and closes the rest.
    async fn close_redundant_sessions(&mut self, peer_id: RelayId) {
        let Some(keep) = self
            .sessions
            .values()
            .filter(|handle| handle.peer_id == Some(peer_id))
            .map(|handle| handle.id)
            .max()
        else {
            return;
        };

        for handle in self.sessions.values() {
            if handle.peer_id == Some(peer_id) && handle.id != keep {
                warn!(session = handle.id, "closing redundant connection");
                handle.close().await;
            }
        }
    }

    /// Translates one peer message into local chain transactions.
    fn on_peer_message(&mut self, message: RelayMessage) -> Result<(), Error> {
        match message {
            RelayMessage::ChannelSeed(seed) => self.push_transaction(vec![Action {
                name: ActionName::OpenChannel,
                data: seed.seed,
            }]),
            RelayMessage::BlockHeaderWithMerklePath(batch) => {
                // Contiguity is judged against the channel contract's fork
                // store over the peer chain, not against our own chain's
                // production tip; the two run at independent heights.
                let fork_head = self.chain.fork_head().ok_or_else(Error::channel_not_open)?;
                let first_num = batch.first_block_num();
                if first_num != fork_head.block_num + 1 {
                    return Err(Error::head_gap(fork_head.block_num, first_num));
                }
                self.push_transaction(vec![Action {
                    name: ActionName::AddBlocks,
                    data: batch.encode(),
                }])
            }
            RelayMessage::IcpActions(actions) => self.apply_icp_actions(actions),
            // Session-level messages never reach the coordinator.
            RelayMessage::Hello(_) | RelayMessage::Ping(_) | RelayMessage::Pong(_) => Ok(()),
        }
    }

    fn apply_icp_actions(&mut self, actions: IcpActions) -> Result<(), Error> {
        if !actions.is_aligned() {
            return Err(Error::misaligned_actions(
                actions.peer_actions.len(),
                actions.actions.len(),
                actions.action_receipts.len(),
            ));
        }

        let block_id = actions.block_header.id();
        self.push_transaction(vec![Action {
            name: ActionName::AddBlock,
            data: actions.block_header.encode(),
        }])?;

        for i in 0..actions.peer_actions.len() {
            let payload = IcpAction {
                action_bytes: actions.actions[i].clone(),
                receipt_bytes: actions.action_receipts[i].clone(),
                block_id,
                action_digests: actions.action_digests.clone(),
            };
            self.push_transaction(vec![Action {
                name: actions.peer_actions[i].into(),
                data: payload.encode(),
            }])?;
        }
        Ok(())
    }

    pub fn push_transaction(&mut self, actions: Vec<Action>) -> Result<(), Error> {
        self.chain.submit_transaction(actions)
    }

    pub async fn handle_chain_event(&mut self, event: ChainEvent) {
        match event {
            ChainEvent::NewBlock {
                header,
                action_digests,
                channel_actions,
            } => {
                self.local_head = ChainHead {
                    block_num: header.block_num,
                    block_id: header.id(),
                };

                let message = if channel_actions.is_empty() {
                    RelayMessage::BlockHeaderWithMerklePath(BlockHeaderWithMerklePath {
                        block_header: header,
                        merkle_path: Vec::new(),
                    })
                } else {
                    let mut peer_actions = Vec::with_capacity(channel_actions.len());
                    let mut actions = Vec::with_capacity(channel_actions.len());
                    let mut action_receipts = Vec::with_capacity(channel_actions.len());
                    for action in channel_actions {
                        peer_actions.push(action.name);
                        actions.push(action.action_bytes);
                        action_receipts.push(action.receipt_bytes);
                    }
                    RelayMessage::IcpActions(IcpActions {
                        block_header: header,
                        action_digests,
                        peer_actions,
                        actions,
                        action_receipts,
                    })
                };

                self.broadcast(message).await;
            }
        }
    }

    /// Sends a message to every operational session and refreshes their
    /// idea of the local head.
    async fn broadcast(&mut self, message: RelayMessage) {
        let local_head = self.local_head;
        for handle in self.sessions.values() {
            if handle.peer_id.is_none() {
                continue;
            }
            if let Err(e) = handle.update_head(local_head).await {
                debug!(session = handle.id, "head update: {}", e);
            }
            if let Err(e) = handle.send(message.clone()).await {
                debug!(session = handle.id, "broadcast: {}", e);
            }
        }
    }
}
