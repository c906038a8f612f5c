//! Abstraction over the local chain: submitting signed transactions and
//! observing new blocks. The wallet and the host RPC live behind this
//! trait; the relay core only sees actions and events.

use codec::{Decode, Encode};

use icp_channel::header::{BlockHeader, BlockId};
use icp_channel::identifier::ChainId;
use icp_channel::merkle::Digest;

use crate::error::Error;
use crate::message::PeerActionName;

/// The tip of a chain, as advertised in pings and tracked by the
/// coordinator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct ChainHead {
    pub block_num: u32,
    pub block_id: BlockId,
}

/// Names of the channel contract actions the relay submits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActionName {
    OpenChannel,
    AddBlocks,
    AddBlock,
    OnPacket,
    OnReceipt,
    OnCleanup,
}

impl ActionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::OpenChannel => "openchannel",
            ActionName::AddBlocks => "addblocks",
            ActionName::AddBlock => "addblock",
            ActionName::OnPacket => "onpacket",
            ActionName::OnReceipt => "onreceipt",
            ActionName::OnCleanup => "oncleanup",
        }
    }
}

impl From<PeerActionName> for ActionName {
    fn from(name: PeerActionName) -> Self {
        match name {
            PeerActionName::OnPacket => ActionName::OnPacket,
            PeerActionName::OnReceipt => ActionName::OnReceipt,
            PeerActionName::OnCleanup => ActionName::OnCleanup,
        }
    }
}

/// One action of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub name: ActionName,
    pub data: Vec<u8>,
}

/// A channel action observed in a locally produced block, ready to be
/// proven to the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelAction {
    pub name: PeerActionName,
    pub action_bytes: Vec<u8>,
    pub receipt_bytes: Vec<u8>,
}

/// Events pushed by the local chain subscription into the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    NewBlock {
        header: BlockHeader,
        action_digests: Vec<Digest>,
        channel_actions: Vec<ChannelAction>,
    },
}

/// Handle to the local chain. Submission is fire-and-forget from the
/// relay's perspective: signing and inclusion are the host's business.
pub trait ChainHandle: Send + Sync + 'static {
    fn id(&self) -> ChainId;

    /// The local chain's own production tip, advertised to peers in pings.
    fn head(&self) -> ChainHead;

    /// The local channel contract's view of the peer chain: its fork store
    /// head, or `None` while the channel is not open. Inbound header
    /// batches must extend this head, never [`head`](ChainHandle::head) —
    /// the two chains run at independent heights.
    fn fork_head(&self) -> Option<ChainHead>;

    fn submit_transaction(&self, actions: Vec<Action>) -> Result<(), Error>;
}

pub mod mock {
    //! A recording chain handle for tests.

    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone)]
    pub struct MockChain {
        id: ChainId,
        state: Arc<Mutex<MockChainState>>,
    }

    #[derive(Default)]
    struct MockChainState {
        head: ChainHead,
        fork_head: Option<ChainHead>,
        submitted: Vec<Vec<Action>>,
    }

    impl MockChain {
        pub fn new(id: ChainId) -> Self {
            Self {
                id,
                state: Arc::new(Mutex::new(MockChainState::default())),
            }
        }

        pub fn set_head(&self, head: ChainHead) {
            self.state.lock().expect("mock chain lock").head = head;
        }

        pub fn set_fork_head(&self, head: ChainHead) {
            self.state.lock().expect("mock chain lock").fork_head = Some(head);
        }

        /// Every transaction submitted so far, in order.
        pub fn submitted(&self) -> Vec<Vec<Action>> {
            self.state.lock().expect("mock chain lock").submitted.clone()
        }
    }

    impl ChainHandle for MockChain {
        fn id(&self) -> ChainId {
            self.id.clone()
        }

        fn head(&self) -> ChainHead {
            self.state.lock().expect("mock chain lock").head
        }

        fn fork_head(&self) -> Option<ChainHead> {
            self.state.lock().expect("mock chain lock").fork_head
        }

        fn submit_transaction(&self, actions: Vec<Action>) -> Result<(), Error> {
            self.state
                .lock()
                .expect("mock chain lock")
                .submitted
                .push(actions);
            Ok(())
        }
    }
}
