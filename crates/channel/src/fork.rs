//! The fork store: the contract's light-client database of peer headers.
//!
//! An id-keyed arena of [`BlockHeaderState`]s with a secondary
//! `block_num -> ids` index; parent edges are ids, never references. The
//! store tracks a `head` (best fork tip) and a `lib` watermark (last
//! irreversible block number), prunes losing forks once they fall behind
//! the watermark, and bounds the canonical history it retains.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::Error;
use crate::header::{BlockHeader, BlockHeaderState, BlockId};
use crate::merkle::Digest;

/// Canonical headers retained below the irreversibility watermark, unless
/// the owner configures another bound. Proofs may only reference retained
/// blocks; `genproof` covers anything older.
pub const DEFAULT_MAX_BLOCKS: u32 = 1024;

/// Outcome of inserting a single header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The header was already present; insertion is idempotent.
    Duplicate,
}

#[derive(Clone, Debug)]
pub struct ForkStore {
    states: HashMap<BlockId, BlockHeaderState>,
    by_num: BTreeMap<u32, BTreeSet<BlockId>>,
    head: Option<BlockId>,
    lib: u32,
    max_blocks: u32,
}

impl Default for ForkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ForkStore {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            by_num: BTreeMap::new(),
            head: None,
            lib: 0,
            max_blocks: DEFAULT_MAX_BLOCKS,
        }
    }

    pub fn is_open(&self) -> bool {
        self.head.is_some()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn lib(&self) -> u32 {
        self.lib
    }

    pub fn head_id(&self) -> Option<BlockId> {
        self.head
    }

    pub fn set_max_blocks(&mut self, max_blocks: u32) {
        self.max_blocks = max_blocks.max(1);
        self.prune();
    }

    /// Installs the trust seed as the sole entry, head and lib.
    pub fn init(&mut self, seed: BlockHeaderState) -> Result<(), Error> {
        if self.is_open() {
            return Err(Error::already_open());
        }
        self.lib = seed.block_num;
        self.head = Some(seed.id);
        self.insert_state(seed);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.by_num.clear();
        self.head = None;
        self.lib = 0;
    }

    pub fn find(&self, id: &BlockId) -> Option<&BlockHeaderState> {
        self.states.get(id)
    }

    pub fn head_state(&self) -> Result<&BlockHeaderState, Error> {
        self.head
            .as_ref()
            .and_then(|id| self.states.get(id))
            .ok_or_else(Error::not_open)
    }

    /// Inserts one header, linking it to its stored parent.
    ///
    /// On success the head is recomputed as the tip with the greatest
    /// `(lib, block_num)` key (ties to the smaller id), the lib watermark
    /// advances, and losing forks behind the watermark are pruned.
    pub fn add_header(&mut self, header: BlockHeader) -> Result<AddOutcome, Error> {
        if !self.is_open() {
            return Err(Error::not_open());
        }

        let id = header.id();
        if self.states.contains_key(&id) {
            return Ok(AddOutcome::Duplicate);
        }

        let parent = self
            .states
            .get(&header.previous)
            .ok_or_else(|| Error::unlinkable(header.previous))?;
        let state = parent.next(header)?;

        self.insert_state(state);
        self.update_head();
        self.advance_lib();
        self.prune();

        Ok(AddOutcome::Added)
    }

    /// Inserts a batch of headers atomically. The first header must extend
    /// the current head by exactly one; any unlinkable or invalid header
    /// fails the whole batch.
    pub fn add_header_batch(&mut self, headers: Vec<BlockHeader>) -> Result<(), Error> {
        if headers.is_empty() {
            return Err(Error::empty_batch());
        }

        let head = self.head_state()?;
        let first = &headers[0];
        if first.block_num != head.block_num + 1 {
            return Err(Error::bad_block_num(head.block_num, first.block_num));
        }
        if first.previous != head.id {
            return Err(Error::unlinkable(first.previous));
        }

        let mut staged = self.clone();
        for header in headers {
            staged.add_header(header)?;
        }
        *self = staged;
        Ok(())
    }

    /// Removes a block and every descendant of it.
    pub fn remove(&mut self, id: &BlockId) {
        let mut doomed = vec![*id];
        let mut index = 0;
        while index < doomed.len() {
            let parent = doomed[index];
            for (child, state) in &self.states {
                if state.header.previous == parent {
                    doomed.push(*child);
                }
            }
            index += 1;
        }

        for id in doomed {
            self.remove_one(&id);
        }

        if self.head.map(|h| !self.states.contains_key(&h)).unwrap_or(false) {
            self.update_head();
        }
    }

    /// Whether `ancestor` lies on the `previous` chain of `descendant`
    /// (inclusive).
    pub fn is_ancestor(&self, descendant: &BlockId, ancestor: &BlockId) -> bool {
        let target_num = ancestor.number();
        let mut cursor = *descendant;
        loop {
            if cursor == *ancestor {
                return true;
            }
            if cursor.number() <= target_num {
                return false;
            }
            match self.states.get(&cursor) {
                Some(state) => cursor = state.header.previous,
                None => return false,
            }
        }
    }

    /// The action Merkle root of the canonical block at `block_num`, if it
    /// is still retained.
    pub fn merkle_root_at(&self, block_num: u32) -> Option<Digest> {
        let head_id = self.head?;
        let ids = self.by_num.get(&block_num)?;
        ids.iter()
            .find(|id| self.is_ancestor(&head_id, id))
            .and_then(|id| self.states.get(id))
            .map(|state| state.header.action_mroot)
    }

    fn insert_state(&mut self, state: BlockHeaderState) {
        self.by_num.entry(state.block_num).or_default().insert(state.id);
        self.states.insert(state.id, state);
    }

    fn remove_one(&mut self, id: &BlockId) {
        if let Some(state) = self.states.remove(id) {
            if let Some(ids) = self.by_num.get_mut(&state.block_num) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_num.remove(&state.block_num);
                }
            }
        }
    }

    fn update_head(&mut self) {
        let mut best: Option<&BlockHeaderState> = None;
        for state in self.states.values() {
            best = match best {
                None => Some(state),
                Some(current) => {
                    let current_key = (current.dpos_irreversible_blocknum, current.block_num);
                    let state_key = (state.dpos_irreversible_blocknum, state.block_num);
                    if state_key > current_key || (state_key == current_key && state.id < current.id)
                    {
                        Some(state)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        self.head = best.map(|state| state.id);
    }

    fn advance_lib(&mut self) {
        if let Some(head) = self.head.and_then(|id| self.states.get(&id)) {
            // Invariant: the watermark never moves backwards, whatever fork
            // the head lands on.
            if head.dpos_irreversible_blocknum > self.lib {
                self.lib = head.dpos_irreversible_blocknum;
            }
        }
    }

    fn prune(&mut self) {
        let Some(head_id) = self.head else { return };

        let canonical: HashSet<BlockId> = {
            let mut ids = HashSet::new();
            let mut cursor = head_id;
            while let Some(state) = self.states.get(&cursor) {
                ids.insert(cursor);
                cursor = state.header.previous;
            }
            ids
        };

        // Losing forks: any tip below the watermark that is not canonical
        // goes, along with its branch up to the fork point.
        let tips: Vec<BlockId> = self
            .states
            .keys()
            .filter(|id| !self.states.values().any(|s| s.header.previous == **id))
            .copied()
            .collect();

        for tip in tips {
            if canonical.contains(&tip) || tip.number() >= self.lib {
                continue;
            }
            let mut cursor = tip;
            loop {
                let Some(state) = self.states.get(&cursor) else { break };
                let parent = state.header.previous;
                self.remove_one(&cursor);
                let parent_is_shared = canonical.contains(&parent)
                    || self.states.values().any(|s| s.header.previous == parent);
                if parent_is_shared || !self.states.contains_key(&parent) {
                    break;
                }
                cursor = parent;
            }
        }

        // Retention window over the canonical history.
        let min_keep = self.lib.saturating_sub(self.max_blocks.saturating_sub(1));
        let stale: Vec<BlockId> = self
            .by_num
            .range(..min_keep)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        for id in stale {
            self.remove_one(&id);
        }
    }
}
