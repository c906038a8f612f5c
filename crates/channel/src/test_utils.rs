//! Builders for peer chains and proven action blocks, shared by the handler
//! tests and by consumers driving a mock channel.

use codec::Encode;

use crate::header::{BlockHeader, BlockHeaderState, BlockId, ProducerSchedule};
use crate::identifier::AccountId;
use crate::merkle::{merkle_root, Digest};
use crate::packet::{ActionReceipt, IcpAction};
use crate::timestamp::Timestamp;

const NAMES: [&str; 8] = [
    "alpha", "bravo", "carol", "delta", "echo", "frank", "gamma", "hotel",
];

pub fn dummy_producers(count: usize) -> Vec<AccountId> {
    (0..count)
        .map(|i| {
            let name = NAMES
                .get(i)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("producer{i}"));
            name.parse().expect("dummy producer name")
        })
        .collect()
}

pub fn dummy_schedule(count: usize) -> ProducerSchedule {
    ProducerSchedule {
        version: 0,
        producers: dummy_producers(count),
    }
}

fn raw_block_id(block_num: u32) -> BlockId {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&block_num.to_be_bytes());
    BlockId::new(Digest::from(bytes))
}

/// A trust seed at the given height, confirmed by the whole schedule.
pub fn dummy_seed(block_num: u32, schedule: ProducerSchedule) -> BlockHeaderState {
    let header = BlockHeader {
        timestamp: Timestamp::from_unix_seconds(1_699_999_000),
        producer: schedule.producers[0].clone(),
        block_num,
        previous: raw_block_id(block_num.saturating_sub(1)),
        action_mroot: Digest::zero(),
        schedule_version: schedule.version,
        new_producers: None,
    };
    BlockHeaderState::genesis(header, schedule)
}

fn rotation(parent: &BlockHeaderState) -> AccountId {
    let producers = &parent.active_schedule.producers;
    producers[(parent.block_num as usize + 1) % producers.len()].clone()
}

/// A well-formed child of `parent` by the given producer, with an empty
/// action Merkle root.
pub fn child_header(parent: &BlockHeaderState, producer: AccountId) -> BlockHeader {
    BlockHeader {
        timestamp: parent.header.timestamp.plus_seconds(1),
        producer,
        block_num: parent.block_num + 1,
        previous: parent.id,
        action_mroot: Digest::zero(),
        schedule_version: parent.active_schedule.version,
        new_producers: None,
    }
}

/// A linked chain of `count` headers on top of `seed`, rotating through the
/// producer schedule.
pub fn make_chain(seed: &BlockHeaderState, count: usize) -> Vec<BlockHeader> {
    let mut headers = Vec::with_capacity(count);
    let mut state = seed.clone();
    for _ in 0..count {
        let header = child_header(&state, rotation(&state));
        state = state.next(header.clone()).expect("dummy chain header");
        headers.push(header);
    }
    headers
}

/// A block carrying executed channel actions, together with everything a
/// relay would scrape off it to prove those actions to the peer.
#[derive(Clone, Debug)]
pub struct ActionBlock {
    pub header: BlockHeader,
    pub action_digests: Vec<Digest>,
    pub actions: Vec<Vec<u8>>,
    pub receipt_bytes: Vec<Vec<u8>>,
}

impl ActionBlock {
    /// The proven cross-chain input for the `index`-th carried action.
    pub fn icp_action(&self, index: usize) -> IcpAction {
        IcpAction {
            action_bytes: self.actions[index].clone(),
            receipt_bytes: self.receipt_bytes[index].clone(),
            block_id: self.header.id(),
            action_digests: self.action_digests.clone(),
        }
    }
}

/// Builds a child block of `parent` whose action Merkle root commits to the
/// given action payloads.
pub fn make_action_block(parent: &BlockHeaderState, actions: &[Vec<u8>]) -> ActionBlock {
    let receipt_bytes: Vec<Vec<u8>> = actions
        .iter()
        .enumerate()
        .map(|(i, action)| {
            ActionReceipt {
                act_digest: Digest::of(action),
                global_sequence: i as u64,
            }
            .encode()
        })
        .collect();

    let action_digests: Vec<Digest> =
        receipt_bytes.iter().map(|bytes| Digest::of(bytes)).collect();

    let mut header = child_header(parent, rotation(parent));
    header.action_mroot = merkle_root(&action_digests);

    ActionBlock {
        header,
        action_digests,
        actions: actions.to_vec(),
        receipt_bytes,
    }
}
