//! An in-memory host implementing the context traits, used to test the
//! handlers and to drive a whole channel without a chain underneath.

use std::collections::BTreeMap;

use crate::context::{ChannelKeeper, ChannelReader};
use crate::error::Error;
use crate::fork::ForkStore;
use crate::header::{BlockHeader, BlockHeaderState};
use crate::merkle::Digest;
use crate::packet::{Packet, Receipt, ReceiptData, Sequence};
use crate::peer::{Meter, PeerRecord};
use crate::timestamp::Timestamp;

/// A mock channel host: in-memory tables, a settable clock, and a recording
/// dispatcher.
///
/// `execute_inbound` records every executed payload and returns its digest
/// as the execution output; `execute_receipt` records the receipt-action
/// invocations. Tests assert on both.
#[derive(Clone, Debug)]
pub struct MockContext {
    fork_store: ForkStore,
    peer: PeerRecord,
    meter: Meter,
    packets: BTreeMap<Sequence, Packet>,
    receipts: BTreeMap<Sequence, Receipt>,
    host_time: Timestamp,
    owner_auth: bool,
    executed: Vec<Vec<u8>>,
    receipt_calls: Vec<(Vec<u8>, ReceiptData)>,
}

impl Default for MockContext {
    fn default() -> Self {
        Self {
            fork_store: ForkStore::new(),
            peer: PeerRecord::default(),
            meter: Meter::default(),
            packets: BTreeMap::new(),
            receipts: BTreeMap::new(),
            host_time: Timestamp::from_unix_seconds(1_700_000_000),
            owner_auth: true,
            executed: Vec::new(),
            receipt_calls: Vec::new(),
        }
    }
}

impl MockContext {
    pub fn with_open_channel(mut self, seed: BlockHeaderState) -> Self {
        self.fork_store
            .init(seed)
            .expect("mock channel opened twice");
        self
    }

    pub fn with_max_packets(mut self, max_packets: u32) -> Self {
        self.meter.max_packets = max_packets;
        self
    }

    pub fn with_owner_auth(mut self, owner_auth: bool) -> Self {
        self.owner_auth = owner_auth;
        self
    }

    pub fn with_host_time(mut self, host_time: Timestamp) -> Self {
        self.host_time = host_time;
        self
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.host_time = self.host_time.plus_seconds(secs);
    }

    /// Appends a peer header straight into the fork store, returning the
    /// accumulated state of the new block.
    pub fn append_peer_header(&mut self, header: BlockHeader) -> BlockHeaderState {
        let id = header.id();
        self.fork_store
            .add_header(header)
            .expect("mock peer header rejected");
        self.fork_store
            .find(&id)
            .cloned()
            .expect("appended header vanished")
    }

    /// The best known peer chain tip.
    pub fn peer_tip(&self) -> BlockHeaderState {
        self.fork_store
            .head_state()
            .cloned()
            .expect("mock channel is not open")
    }

    pub fn insert_receipt(&mut self, receipt: Receipt) {
        self.receipts.insert(receipt.seq, receipt);
    }

    /// Payloads executed through the host dispatch, in order.
    pub fn executed(&self) -> &[Vec<u8>] {
        &self.executed
    }

    /// Receipt-action invocations, in order.
    pub fn receipt_calls(&self) -> &[(Vec<u8>, ReceiptData)] {
        &self.receipt_calls
    }
}

impl ChannelReader for MockContext {
    fn fork_store(&self) -> &ForkStore {
        &self.fork_store
    }

    fn peer(&self) -> PeerRecord {
        self.peer.clone()
    }

    fn meter(&self) -> Meter {
        self.meter
    }

    fn packet(&self, seq: Sequence) -> Option<Packet> {
        self.packets.get(&seq).cloned()
    }

    fn packets(&self) -> Vec<Packet> {
        self.packets.values().cloned().collect()
    }

    fn receipt(&self, seq: Sequence) -> Option<Receipt> {
        self.receipts.get(&seq).cloned()
    }

    fn oldest_receipt_seq(&self) -> Option<Sequence> {
        self.receipts.keys().next().copied()
    }

    fn host_timestamp(&self) -> Timestamp {
        self.host_time
    }

    fn owner_authorized(&self) -> bool {
        self.owner_auth
    }
}

impl ChannelKeeper for MockContext {
    fn fork_store_mut(&mut self) -> &mut ForkStore {
        &mut self.fork_store
    }

    fn set_peer(&mut self, peer: PeerRecord) {
        self.peer = peer;
    }

    fn set_meter(&mut self, meter: Meter) {
        self.meter = meter;
    }

    fn store_packet(&mut self, packet: Packet) {
        self.packets.insert(packet.seq, packet);
    }

    fn remove_packet(&mut self, seq: Sequence) {
        self.packets.remove(&seq);
    }

    fn store_receipt(&mut self, receipt: Receipt) {
        self.receipts.insert(receipt.seq, receipt);
    }

    fn remove_receipt(&mut self, seq: Sequence) {
        self.receipts.remove(&seq);
    }

    fn clear_channel(&mut self) {
        self.fork_store.clear();
        self.packets.clear();
        self.receipts.clear();
        self.peer = PeerRecord::default();
        self.meter = Meter::default();
    }

    fn execute_inbound(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        self.executed.push(payload.to_vec());
        Ok(Digest::of(payload).as_bytes().to_vec())
    }

    fn execute_receipt(
        &mut self,
        receipt_action: &[u8],
        receipt: &ReceiptData,
    ) -> Result<(), Error> {
        self.receipt_calls
            .push((receipt_action.to_vec(), receipt.clone()));
        Ok(())
    }
}
