//! Peer chain headers and the accumulated light-client state per header.

use std::collections::BTreeMap;

use codec::{Decode, Encode};
use core::fmt::{self, Display};

use crate::error::Error;
use crate::identifier::AccountId;
use crate::merkle::Digest;
use crate::timestamp::Timestamp;

/// Identifier of a peer chain block.
///
/// The first four bytes carry the block number big-endian, so the number of
/// any referenced block can be recovered without looking the header up.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct BlockId(Digest);

impl BlockId {
    pub fn new(digest: Digest) -> Self {
        Self(digest)
    }

    /// The block number embedded in the id.
    pub fn number(&self) -> u32 {
        let bytes = self.0.as_bytes();
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn digest(&self) -> &Digest {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

/// The ordered set of accounts allowed to produce blocks, with a version
/// bumped on every schedule change.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ProducerSchedule {
    pub version: u32,
    pub producers: Vec<AccountId>,
}

impl ProducerSchedule {
    pub fn contains(&self, producer: &AccountId) -> bool {
        self.producers.iter().any(|p| p == producer)
    }

    /// Number of producers whose confirmation makes a block irreversible.
    pub fn threshold(&self) -> usize {
        self.producers.len() * 2 / 3 + 1
    }
}

/// A peer chain block header, the opaque fixed-schema record shipped by the
/// relay and decoded by the channel contract.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BlockHeader {
    pub timestamp: Timestamp,
    pub producer: AccountId,
    pub block_num: u32,
    pub previous: BlockId,
    pub action_mroot: Digest,
    pub schedule_version: u32,
    pub new_producers: Option<ProducerSchedule>,
}

impl BlockHeader {
    /// Content hash of the header, with the block number folded into the
    /// first four bytes.
    pub fn id(&self) -> BlockId {
        let mut bytes = *Digest::of(&self.encode()).as_bytes();
        bytes[..4].copy_from_slice(&self.block_num.to_be_bytes());
        BlockId::new(Digest::from(bytes))
    }

    pub fn num_from_id(id: &BlockId) -> u32 {
        id.number()
    }
}

/// A batch of headers for catch-up: the connecting ancestors in ascending
/// order followed by the tip header being announced.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BlockHeaderWithMerklePath {
    pub block_header: BlockHeader,
    pub merkle_path: Vec<BlockHeader>,
}

impl BlockHeaderWithMerklePath {
    /// The number of the first header in the batch.
    pub fn first_block_num(&self) -> u32 {
        self.merkle_path
            .first()
            .map(|h| h.block_num)
            .unwrap_or(self.block_header.block_num)
    }

    /// The headers in application order.
    pub fn into_headers(self) -> Vec<BlockHeader> {
        let mut headers = self.merkle_path;
        headers.push(self.block_header);
        headers
    }
}

/// A header plus the light-client state accumulated along its fork: the
/// active and pending producer schedules, each producer's latest block, and
/// the derived last-irreversible block number.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BlockHeaderState {
    pub id: BlockId,
    pub block_num: u32,
    pub header: BlockHeader,
    pub active_schedule: ProducerSchedule,
    pub pending_schedule: Option<ProducerSchedule>,
    pub last_produced: BTreeMap<AccountId, u32>,
    pub dpos_irreversible_blocknum: u32,
}

impl BlockHeaderState {
    /// Builds the trust seed state installed by `openchannel`: the seed block
    /// is taken as confirmed by the whole schedule and irreversible.
    pub fn genesis(header: BlockHeader, schedule: ProducerSchedule) -> Self {
        let last_produced = schedule
            .producers
            .iter()
            .cloned()
            .map(|p| (p, header.block_num))
            .collect();

        Self {
            id: header.id(),
            block_num: header.block_num,
            dpos_irreversible_blocknum: header.block_num,
            active_schedule: schedule,
            pending_schedule: None,
            last_produced,
            header,
        }
    }

    /// Applies a child header, producing the child state.
    ///
    /// Checks linkage, producer membership and schedule promotion, then
    /// recomputes the last-irreversible block number: the highest block that
    /// at least 2/3+1 of the active schedule has produced at or after.
    /// The result never decreases across a fork.
    pub fn next(&self, header: BlockHeader) -> Result<BlockHeaderState, Error> {
        if header.previous != self.id {
            return Err(Error::unlinkable(header.previous));
        }
        if header.block_num != self.block_num + 1 {
            return Err(Error::bad_block_num(self.block_num, header.block_num));
        }

        let mut active = self.active_schedule.clone();
        let mut pending = self.pending_schedule.clone();
        let mut last_produced = self.last_produced.clone();

        if header.schedule_version == active.version + 1 {
            match pending.take() {
                Some(next) if next.version == header.schedule_version => {
                    // Producers leaving the schedule stop counting towards
                    // irreversibility; joiners start from the current LIB.
                    last_produced.retain(|p, _| next.contains(p));
                    for p in &next.producers {
                        last_produced
                            .entry(p.clone())
                            .or_insert(self.dpos_irreversible_blocknum);
                    }
                    active = next;
                }
                _ => return Err(Error::bad_schedule(header.schedule_version)),
            }
        } else if header.schedule_version != active.version {
            return Err(Error::bad_schedule(header.schedule_version));
        }

        if !active.contains(&header.producer) {
            return Err(Error::unknown_producer(header.producer.clone()));
        }

        if let Some(np) = &header.new_producers {
            if np.version != active.version + 1 {
                return Err(Error::bad_schedule(np.version));
            }
            pending = Some(np.clone());
        }

        last_produced.insert(header.producer.clone(), header.block_num);

        let mut nums: Vec<u32> = active
            .producers
            .iter()
            .map(|p| last_produced.get(p).copied().unwrap_or(0))
            .collect();
        nums.sort_unstable();
        let candidate = nums[nums.len() - active.threshold()];
        let dpos_irreversible_blocknum = candidate.max(self.dpos_irreversible_blocknum);

        let id = header.id();
        Ok(BlockHeaderState {
            id,
            block_num: header.block_num,
            header,
            active_schedule: active,
            pending_schedule: pending,
            last_produced,
            dpos_irreversible_blocknum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorDetail;
    use crate::test_utils::{child_header, dummy_schedule, dummy_seed};

    #[test]
    fn id_embeds_block_num() {
        let seed = dummy_seed(100, dummy_schedule(4));
        assert_eq!(seed.id.number(), 100);
        assert_eq!(BlockHeader::num_from_id(&seed.id), 100);
    }

    #[test]
    fn lib_advances_with_rotation() {
        let schedule = dummy_schedule(4);
        let mut state = dummy_seed(100, schedule.clone());

        // With 4 producers the threshold is 3: after three distinct
        // producers have extended the chain, the LIB reaches block 101.
        for i in 0..3u32 {
            let producer = schedule.producers[(i as usize + 1) % 4].clone();
            let header = child_header(&state, producer);
            state = state.next(header).unwrap();
        }

        assert_eq!(state.block_num, 103);
        assert_eq!(state.dpos_irreversible_blocknum, 101);
    }

    #[test]
    fn single_producer_finalizes_immediately() {
        let schedule = dummy_schedule(1);
        let seed = dummy_seed(10, schedule.clone());
        let header = child_header(&seed, schedule.producers[0].clone());
        let state = seed.next(header).unwrap();

        assert_eq!(state.dpos_irreversible_blocknum, 11);
    }

    #[test]
    fn rejects_foreign_producer() {
        let seed = dummy_seed(1, dummy_schedule(2));
        let mut header = child_header(&seed, seed.active_schedule.producers[0].clone());
        header.producer = "outsider".parse().unwrap();

        let err = seed.next(header).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::UnknownProducer(_)));
    }

    #[test]
    fn rejects_unlinked_header() {
        let seed = dummy_seed(1, dummy_schedule(1));
        let other = dummy_seed(7, dummy_schedule(1));
        let header = child_header(&other, other.active_schedule.producers[0].clone());

        let err = seed.next(header).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::Unlinkable(_)));
    }

    #[test]
    fn schedule_promotion() {
        let schedule = dummy_schedule(1);
        let seed = dummy_seed(1, schedule.clone());

        let next_schedule = ProducerSchedule {
            version: 1,
            producers: schedule.producers.clone(),
        };

        let mut announce = child_header(&seed, schedule.producers[0].clone());
        announce.new_producers = Some(next_schedule.clone());
        let state = seed.next(announce).unwrap();
        assert_eq!(state.pending_schedule, Some(next_schedule));

        let mut adopt = child_header(&state, schedule.producers[0].clone());
        adopt.schedule_version = 1;
        let state = state.next(adopt).unwrap();
        assert_eq!(state.active_schedule.version, 1);
        assert_eq!(state.pending_schedule, None);

        // A version bump without a pending schedule is rejected.
        let mut bogus = child_header(&state, schedule.producers[0].clone());
        bogus.schedule_version = 2;
        let err = state.next(bogus).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::BadSchedule(_)));
    }
}
