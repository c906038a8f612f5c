//! Host context traits: everything the channel handlers read from and write
//! to the host chain.
//!
//! The host provides atomic commit or rollback around every delivered
//! message; handlers are free to mutate through [`ChannelKeeper`] and rely
//! on the transaction aborting on error.

use crate::error::Error;
use crate::fork::ForkStore;
use crate::packet::{Packet, Receipt, ReceiptData, Sequence};
use crate::peer::{Meter, PeerRecord};
use crate::timestamp::Timestamp;

/// Read access to the channel tables and the host environment.
pub trait ChannelReader {
    fn fork_store(&self) -> &ForkStore;

    fn peer(&self) -> PeerRecord;

    fn meter(&self) -> Meter;

    fn packet(&self, seq: Sequence) -> Option<Packet>;

    /// All stored packets, ascending by sequence.
    fn packets(&self) -> Vec<Packet>;

    fn receipt(&self, seq: Sequence) -> Option<Receipt>;

    /// The oldest stored receipt sequence, if any receipts remain.
    fn oldest_receipt_seq(&self) -> Option<Sequence>;

    /// The host chain's current block timestamp.
    fn host_timestamp(&self) -> Timestamp;

    /// Whether the enclosing transaction carries the contract owner's
    /// authority.
    fn owner_authorized(&self) -> bool;
}

/// Write access to the channel tables and the host dispatch.
pub trait ChannelKeeper: ChannelReader {
    fn fork_store_mut(&mut self) -> &mut ForkStore;

    fn set_peer(&mut self, peer: PeerRecord);

    fn set_meter(&mut self, meter: Meter);

    fn store_packet(&mut self, packet: Packet);

    fn remove_packet(&mut self, seq: Sequence);

    fn store_receipt(&mut self, receipt: Receipt);

    fn remove_receipt(&mut self, seq: Sequence);

    /// Wipes every channel table; `closechannel` is irreversible.
    fn clear_channel(&mut self);

    /// Executes a proven inbound action inline and returns its output.
    /// Semantics are the host dispatcher's.
    fn execute_inbound(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error>;

    /// Runs the receipt action a sender attached to its packet, with the
    /// mirrored receipt as input.
    fn execute_receipt(&mut self, receipt_action: &[u8], receipt: &ReceiptData)
        -> Result<(), Error>;
}
