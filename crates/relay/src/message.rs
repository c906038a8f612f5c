//! The off-chain wire: the `icp_message` tagged union and its binary
//! framing.
//!
//! Each websocket frame carries exactly one message: a little-endian `u32`
//! tag followed by the SCALE payload. Tags are stable; an unknown tag or a
//! frame that does not consume cleanly is a `bad_payload` and closes the
//! session.

use codec::{Decode, Encode};

pub(crate) use icp_channel::header::{BlockHeader, BlockHeaderWithMerklePath};
use icp_channel::identifier::{AccountId, ChainId};
use icp_channel::merkle::Digest;
use icp_channel::timestamp::Timestamp;

use crate::chain::ChainHead;
use crate::error::Error;

/// Identity of a relay process, drawn at startup.
pub type RelayId = Digest;

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Hello {
    pub id: RelayId,
    pub chain_id: ChainId,
    pub contract: AccountId,
    pub peer_contract: AccountId,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Ping {
    pub sent: Timestamp,
    pub code: Digest,
    /// The sender's local chain head, so the peer can trigger catch-up.
    pub head: ChainHead,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Pong {
    pub sent: Timestamp,
    pub code: Digest,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ChannelSeed {
    /// SCALE encoding of a trusted `BlockHeaderState`.
    pub seed: Vec<u8>,
}

/// Which proven peer action a carried triple maps to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum PeerActionName {
    OnPacket,
    OnReceipt,
    OnCleanup,
}

/// Channel actions executed in one block, with everything the peer contract
/// needs to verify them: the header, the full digest list under its action
/// Merkle root, and the index-aligned name/action/receipt triples.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct IcpActions {
    pub block_header: BlockHeader,
    pub action_digests: Vec<Digest>,
    pub peer_actions: Vec<PeerActionName>,
    pub actions: Vec<Vec<u8>>,
    pub action_receipts: Vec<Vec<u8>>,
}

impl IcpActions {
    pub fn is_aligned(&self) -> bool {
        self.peer_actions.len() == self.actions.len()
            && self.actions.len() == self.action_receipts.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayMessage {
    Hello(Hello),
    Ping(Ping),
    Pong(Pong),
    ChannelSeed(ChannelSeed),
    BlockHeaderWithMerklePath(BlockHeaderWithMerklePath),
    IcpActions(IcpActions),
}

mod tag {
    pub const HELLO: u32 = 0;
    pub const PING: u32 = 1;
    pub const PONG: u32 = 2;
    pub const CHANNEL_SEED: u32 = 3;
    pub const BLOCK_HEADER_WITH_MERKLE_PATH: u32 = 4;
    pub const ICP_ACTIONS: u32 = 5;
}

impl RelayMessage {
    /// Encodes one wire frame: tag then payload.
    pub fn encode_frame(&self) -> Vec<u8> {
        let (tag, payload) = match self {
            RelayMessage::Hello(msg) => (tag::HELLO, msg.encode()),
            RelayMessage::Ping(msg) => (tag::PING, msg.encode()),
            RelayMessage::Pong(msg) => (tag::PONG, msg.encode()),
            RelayMessage::ChannelSeed(msg) => (tag::CHANNEL_SEED, msg.encode()),
            RelayMessage::BlockHeaderWithMerklePath(msg) => {
                (tag::BLOCK_HEADER_WITH_MERKLE_PATH, msg.encode())
            }
            RelayMessage::IcpActions(msg) => (tag::ICP_ACTIONS, msg.encode()),
        };

        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.extend_from_slice(&tag.to_le_bytes());
        frame.extend_from_slice(&payload);
        frame
    }

    /// Decodes one wire frame. The payload must decode fully: trailing
    /// bytes are as much of a protocol violation as an unknown tag.
    pub fn decode_frame(frame: &[u8]) -> Result<RelayMessage, Error> {
        if frame.len() < 4 {
            return Err(Error::bad_payload());
        }

        let tag = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let mut payload = &frame[4..];

        let message = match tag {
            tag::HELLO => {
                RelayMessage::Hello(Hello::decode(&mut payload).map_err(Error::codec)?)
            }
            tag::PING => RelayMessage::Ping(Ping::decode(&mut payload).map_err(Error::codec)?),
            tag::PONG => RelayMessage::Pong(Pong::decode(&mut payload).map_err(Error::codec)?),
            tag::CHANNEL_SEED => RelayMessage::ChannelSeed(
                ChannelSeed::decode(&mut payload).map_err(Error::codec)?,
            ),
            tag::BLOCK_HEADER_WITH_MERKLE_PATH => RelayMessage::BlockHeaderWithMerklePath(
                BlockHeaderWithMerklePath::decode(&mut payload).map_err(Error::codec)?,
            ),
            tag::ICP_ACTIONS => {
                let actions = IcpActions::decode(&mut payload).map_err(Error::codec)?;
                if !actions.is_aligned() {
                    return Err(Error::misaligned_actions(
                        actions.peer_actions.len(),
                        actions.actions.len(),
                        actions.action_receipts.len(),
                    ));
                }
                RelayMessage::IcpActions(actions)
            }
            unknown => return Err(Error::unknown_tag(unknown)),
        };

        if !payload.is_empty() {
            return Err(Error::bad_payload());
        }

        Ok(message)
    }
}

impl From<Hello> for RelayMessage {
    fn from(msg: Hello) -> Self {
        RelayMessage::Hello(msg)
    }
}

impl From<Ping> for RelayMessage {
    fn from(msg: Ping) -> Self {
        RelayMessage::Ping(msg)
    }
}

impl From<Pong> for RelayMessage {
    fn from(msg: Pong) -> Self {
        RelayMessage::Pong(msg)
    }
}

impl From<ChannelSeed> for RelayMessage {
    fn from(msg: ChannelSeed) -> Self {
        RelayMessage::ChannelSeed(msg)
    }
}

impl From<BlockHeaderWithMerklePath> for RelayMessage {
    fn from(msg: BlockHeaderWithMerklePath) -> Self {
        RelayMessage::BlockHeaderWithMerklePath(msg)
    }
}

impl From<IcpActions> for RelayMessage {
    fn from(msg: IcpActions) -> Self {
        RelayMessage::IcpActions(msg)
    }
}
