//! The on-chain action surface of the channel contract.

use crate::identifier::AccountId;
use crate::packet::{IcpAction, Sequence};
use crate::timestamp::Timestamp;

/// One contract action, as dispatched by the host into
/// [`handler::deliver`](crate::handler::deliver).
///
/// Byte arguments (`seed`, `header`, `batch`) are opaque to the host and
/// decoded by the handlers with the channel codec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelMsg {
    SetPeer { peer: AccountId },
    SetMaxPackets { max: u32 },
    SetMaxBlocks { max: u32 },
    OpenChannel { seed: Vec<u8> },
    CloseChannel,
    AddBlock { header: Vec<u8> },
    AddBlocks { batch: Vec<u8> },
    SendAction {
        seq: Sequence,
        send_action: Vec<u8>,
        expiration: Timestamp,
        receipt_action: Vec<u8>,
    },
    OnPacket { action: IcpAction },
    OnReceipt { action: IcpAction },
    OnCleanup { action: IcpAction },
    Cleanup { start: Sequence, end: Sequence },
    /// Re-emits the canonical bytes of an old packet and/or receipt; a zero
    /// sequence skips that side.
    GenProof {
        packet_seq: Sequence,
        receipt_seq: Sequence,
    },
    Prune { start: Sequence, end: Sequence },
}
