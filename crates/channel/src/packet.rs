//! Packets, receipts, and the proven cross-chain action input.

use core::fmt::{self, Display};

use codec::{Decode, Encode};

use crate::header::BlockId;
use crate::merkle::Digest;
use crate::timestamp::Timestamp;

/// A direction-local monotonic sequence number.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode,
)]
pub struct Sequence(u64);

impl Sequence {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn increment(&self) -> Sequence {
        Sequence(self.0 + 1)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Sequence {
    fn from(seq: u64) -> Self {
        Sequence(seq)
    }
}

impl From<Sequence> for u64 {
    fn from(seq: Sequence) -> Self {
        seq.0
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a locally sent packet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum PacketStatus {
    Unreceipted,
    Receipted,
    Expired,
}

/// Outcome of the peer-side delivery, mirrored back in the receipt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum ReceiptStatus {
    Executed,
    Expired,
}

/// A locally sent packet awaiting its mirrored receipt.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Packet {
    pub seq: Sequence,
    pub expiration: Timestamp,
    pub send_action: Vec<u8>,
    pub receipt_action: Vec<u8>,
    pub status: PacketStatus,
    /// Sequence of the peer receipt that settled this packet, recorded at
    /// `onreceipt` and consulted by `oncleanup`.
    pub receipt_seq: Option<Sequence>,
}

impl Packet {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, PacketStatus::Unreceipted)
    }
}

/// A receipt written for an inbound peer packet.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Receipt {
    pub seq: Sequence,
    pub packet_seq: Sequence,
    pub status: ReceiptStatus,
    /// Execution output of the inbound action; empty when the packet
    /// expired in transit.
    pub payload: Vec<u8>,
    /// Number of the proven block that carried the packet.
    pub block_num: u32,
}

/// Canonical bytes of a sent packet: what `sendaction` emits inline for the
/// relay to scrape, and what the peer's `onpacket` decodes.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct PacketData {
    pub seq: Sequence,
    pub expiration: Timestamp,
    pub payload: Vec<u8>,
}

/// Canonical bytes of a receipt, shipped back in the reverse direction and
/// decoded by the peer's `onreceipt`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ReceiptData {
    pub seq: Sequence,
    pub packet_seq: Sequence,
    pub status: ReceiptStatus,
    pub payload: Vec<u8>,
}

/// Canonical bytes of a receipt cleanup, decoded by the peer's `oncleanup`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CleanupData {
    pub start_seq: Sequence,
    pub end_seq: Sequence,
}

/// What the action Merkle tree commits to: the digest of the action binds
/// the receipt to the exact bytes that were executed.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ActionReceipt {
    pub act_digest: Digest,
    pub global_sequence: u64,
}

impl ActionReceipt {
    pub fn digest(&self) -> Digest {
        Digest::of(&self.encode())
    }
}

/// A proven cross-chain action: the raw action and its receipt as executed
/// on the peer chain, the block that carried them, and the full digest list
/// reconstructing that block's action Merkle root.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct IcpAction {
    pub action_bytes: Vec<u8>,
    pub receipt_bytes: Vec<u8>,
    pub block_id: BlockId,
    pub action_digests: Vec<Digest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_cursor() {
        let s = Sequence::default();
        assert!(s.is_zero());
        assert_eq!(s.increment(), Sequence::from(1));
        assert_eq!(u64::from(Sequence::from(7).increment()), 8);
    }

    #[test]
    fn packet_data_round_trip() {
        let data = PacketData {
            seq: Sequence::from(3),
            expiration: Timestamp::from_unix_seconds(42),
            payload: b"transfer".to_vec(),
        };
        let bytes = data.encode();
        let decoded = PacketData::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn action_receipt_binding() {
        let action = b"payload".to_vec();
        let receipt = ActionReceipt {
            act_digest: Digest::of(&action),
            global_sequence: 9,
        };
        assert_eq!(receipt.digest(), Digest::of(&receipt.encode()));
        assert_ne!(receipt.act_digest, Digest::of(b"tampered"));
    }
}
