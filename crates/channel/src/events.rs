//! Events emitted by the channel handlers.
//!
//! `PacketSent`, `ReceiptWritten` and `ReceiptsCleaned` carry the canonical
//! bytes the relay scrapes off the block and proves to the peer contract.

use core::fmt::{self, Display};

use crate::header::BlockId;
use crate::packet::{ReceiptStatus, Sequence};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOpened {
    pub block_id: BlockId,
    pub block_num: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockAppended {
    pub block_id: BlockId,
    pub block_num: u32,
    pub lib: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketSent {
    pub seq: Sequence,
    /// SCALE encoding of [`PacketData`](crate::packet::PacketData).
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketReceived {
    pub seq: Sequence,
    pub status: ReceiptStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptWritten {
    pub seq: Sequence,
    /// SCALE encoding of [`ReceiptData`](crate::packet::ReceiptData).
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketReceipted {
    pub packet_seq: Sequence,
    pub status: ReceiptStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketsErased {
    pub start: Sequence,
    pub end: Sequence,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptsCleaned {
    pub start: Sequence,
    pub end: Sequence,
    /// SCALE encoding of [`CleanupData`](crate::packet::CleanupData).
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptsPruned {
    pub start: Sequence,
    pub end: Sequence,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    ChannelOpened(ChannelOpened),
    ChannelClosed,
    BlockAppended(BlockAppended),
    PacketSent(PacketSent),
    PacketReceived(PacketReceived),
    ReceiptWritten(ReceiptWritten),
    PacketReceipted(PacketReceipted),
    PacketsErased(PacketsErased),
    ReceiptsCleaned(ReceiptsCleaned),
    ReceiptsPruned(ReceiptsPruned),
}

impl Display for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelEvent::ChannelOpened(ev) => {
                write!(f, "channel opened at block {} ({})", ev.block_num, ev.block_id)
            }
            ChannelEvent::ChannelClosed => write!(f, "channel closed"),
            ChannelEvent::BlockAppended(ev) => {
                write!(f, "block {} appended, lib {}", ev.block_num, ev.lib)
            }
            ChannelEvent::PacketSent(ev) => write!(f, "packet {} sent", ev.seq),
            ChannelEvent::PacketReceived(ev) => {
                write!(f, "packet {} received ({:?})", ev.seq, ev.status)
            }
            ChannelEvent::ReceiptWritten(ev) => write!(f, "receipt {} written", ev.seq),
            ChannelEvent::PacketReceipted(ev) => {
                write!(f, "packet {} receipted ({:?})", ev.packet_seq, ev.status)
            }
            ChannelEvent::PacketsErased(ev) => {
                write!(f, "packets [{}, {}] erased", ev.start, ev.end)
            }
            ChannelEvent::ReceiptsCleaned(ev) => {
                write!(f, "receipts [{}, {}] cleaned", ev.start, ev.end)
            }
            ChannelEvent::ReceiptsPruned(ev) => {
                write!(f, "receipts [{}, {}] pruned", ev.start, ev.end)
            }
        }
    }
}

impl From<ChannelOpened> for ChannelEvent {
    fn from(ev: ChannelOpened) -> Self {
        ChannelEvent::ChannelOpened(ev)
    }
}

impl From<BlockAppended> for ChannelEvent {
    fn from(ev: BlockAppended) -> Self {
        ChannelEvent::BlockAppended(ev)
    }
}

impl From<PacketSent> for ChannelEvent {
    fn from(ev: PacketSent) -> Self {
        ChannelEvent::PacketSent(ev)
    }
}

impl From<PacketReceived> for ChannelEvent {
    fn from(ev: PacketReceived) -> Self {
        ChannelEvent::PacketReceived(ev)
    }
}

impl From<ReceiptWritten> for ChannelEvent {
    fn from(ev: ReceiptWritten) -> Self {
        ChannelEvent::ReceiptWritten(ev)
    }
}

impl From<PacketReceipted> for ChannelEvent {
    fn from(ev: PacketReceipted) -> Self {
        ChannelEvent::PacketReceipted(ev)
    }
}

impl From<PacketsErased> for ChannelEvent {
    fn from(ev: PacketsErased) -> Self {
        ChannelEvent::PacketsErased(ev)
    }
}

impl From<ReceiptsCleaned> for ChannelEvent {
    fn from(ev: ReceiptsCleaned) -> Self {
        ChannelEvent::ReceiptsCleaned(ev)
    }
}

impl From<ReceiptsPruned> for ChannelEvent {
    fn from(ev: ReceiptsPruned) -> Self {
        ChannelEvent::ReceiptsPruned(ev)
    }
}
