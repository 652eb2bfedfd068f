//! Era entropy.
//!
//! The seed of era `n` is derived from the blocks created between its booking block and its key
//! block: every such block contributes its magic bit. The blocks are folded in hash order, so the
//! result does not depend on the order in which they arrived.

use std::{
    cmp::Reverse,
    collections::HashMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use datasize::DataSize;
use itertools::Itertools;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::era_clock::EraClock;
use crate::{
    components::consensus::highway_core::state::State,
    crypto::{hash::Hasher, Digest},
    types::{BlockHash, Chainspec, EraId, Timestamp},
};

/// The random seed of an era.
#[derive(Copy, Clone, DataSize, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct EntropySeed(Digest);

impl EntropySeed {
    /// Returns the seed digest.
    pub fn digest(&self) -> &Digest {
        &self.0
    }

    /// Returns the first eight bytes of the seed as a little-endian integer.
    pub fn as_u64(&self) -> u64 {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&self.0.inner()[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl Display for EntropySeed {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "seed({})", self.0)
    }
}

/// An attempt to collect entropy too early.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EntropyError {
    /// The entropy window of the era has not closed yet.
    #[error("entropy window of {era_id} is open until {key_block_time}, now is {now}")]
    WindowOpen {
        /// The era whose seed was requested.
        era_id: EraId,
        /// The end of the window.
        key_block_time: Timestamp,
        /// The time of the request.
        now: Timestamp,
    },
}

/// Derives and caches the entropy seed of every era.
///
/// Each era's seed is latched the first time it is computed. Blocks arriving later never change
/// it, even if they fall into the window.
#[derive(Debug)]
pub(crate) struct EntropyCollector {
    era_clock: EraClock,
    genesis_name: String,
    genesis_timestamp: Timestamp,
    seeds: Mutex<HashMap<EraId, Arc<OnceCell<EntropySeed>>>>,
}

impl EntropyCollector {
    pub(crate) fn new(chainspec: &Chainspec) -> Self {
        EntropyCollector {
            era_clock: EraClock::new(&chainspec.highway_config),
            genesis_name: chainspec.genesis_config.name.clone(),
            genesis_timestamp: chainspec.genesis_config.timestamp,
            seeds: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the seed of `era_id`, computing it from `state` if it is not cached yet.
    ///
    /// Fails if `now` is not after the era's key block time.
    pub(crate) fn collect(
        &self,
        era_id: EraId,
        state: &State,
        now: Timestamp,
    ) -> Result<EntropySeed, EntropyError> {
        let cell = self.cell(era_id);
        if let Some(seed) = cell.get() {
            return Ok(*seed);
        }
        let key_block_time = self.era_clock.key_block_time(era_id);
        if now <= key_block_time {
            return Err(EntropyError::WindowOpen {
                era_id,
                key_block_time,
                now,
            });
        }
        Ok(*cell.get_or_init(|| self.compute(era_id, state)))
    }

    /// Latches the degraded seed for an era that is started before any block could exist.
    pub(crate) fn collect_without_blocks(&self, era_id: EraId) -> EntropySeed {
        *self.cell(era_id).get_or_init(|| self.degraded_seed(era_id))
    }

    /// Returns the seed of `era_id` if it has already been computed.
    pub(crate) fn cached(&self, era_id: EraId) -> Option<EntropySeed> {
        self.seeds
            .lock()
            .get(&era_id)
            .and_then(|cell| cell.get().copied())
    }

    /// Returns the seed derived from the genesis parameters alone.
    pub(crate) fn genesis_seed(&self, era_id: EraId) -> EntropySeed {
        let mut hasher = Hasher::new();
        hasher.update(self.genesis_name.as_bytes());
        hasher.update_u64(self.genesis_timestamp.millis());
        hasher.update(era_id.to_le_bytes());
        EntropySeed(hasher.finalize())
    }

    /// Returns the booking block of `era_id`: the highest block created no later than the end of
    /// the booking block window. Ties go to the smallest hash.
    pub(crate) fn booking_block(&self, era_id: EraId, state: &State) -> Option<BlockHash> {
        let window = self.era_clock.booking_block_window(era_id);
        state
            .blocks()
            .filter(|(block, _)| block.timestamp() <= window.end)
            .max_by_key(|(block, height)| (*height, Reverse(*block.hash())))
            .map(|(block, _)| *block.hash())
    }

    /// Returns the key block of `era_id`: the highest descendant of the booking block created no
    /// later than the key block time. Ties go to the smallest hash.
    pub(crate) fn key_block(
        &self,
        era_id: EraId,
        booking_block: &BlockHash,
        state: &State,
    ) -> Option<BlockHash> {
        let key_block_time = self.era_clock.key_block_time(era_id);
        state
            .descendants_or_self(booking_block)
            .into_iter()
            .filter_map(|hash| {
                let block = state.block(&hash)?;
                let height = state.height(&hash)?;
                (block.timestamp() <= key_block_time).then(|| (height, Reverse(hash)))
            })
            .max()
            .map(|(_, Reverse(hash))| hash)
    }

    fn cell(&self, era_id: EraId) -> Arc<OnceCell<EntropySeed>> {
        Arc::clone(self.seeds.lock().entry(era_id).or_default())
    }

    fn compute(&self, era_id: EraId, state: &State) -> EntropySeed {
        let booking_block = match self.booking_block(era_id, state) {
            Some(hash) => hash,
            None => return self.degraded_seed(era_id),
        };
        let key_block = self
            .key_block(era_id, &booking_block, state)
            .unwrap_or(booking_block);
        let ancestors = state.ancestors_or_self(&key_block);
        let window: Vec<_> = state
            .descendants_or_self(&booking_block)
            .into_iter()
            .filter(|hash| ancestors.contains(hash))
            .filter_map(|hash| state.block(&hash).map(|block| (hash, block.magic_bit())))
            .sorted()
            .collect();

        let mut hasher = Hasher::new();
        hasher.update(era_id.to_le_bytes());
        hasher.update(booking_block.inner());
        hasher.update(key_block.inner());
        for (hash, magic_bit) in &window {
            hasher.update(hash.inner());
            hasher.update([u8::from(*magic_bit)]);
        }
        let seed = EntropySeed(hasher.finalize());
        debug!(
            %era_id,
            %booking_block,
            %key_block,
            block_count = window.len(),
            %seed,
            "collected era entropy"
        );
        seed
    }

    fn degraded_seed(&self, era_id: EraId) -> EntropySeed {
        let seed = self.genesis_seed(era_id);
        warn!(
            %era_id,
            %seed,
            "no booking block for era; using seed derived from genesis parameters"
        );
        seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::consensus::highway_core::validators::Validators,
        testing::{self, validator_weights},
        types::{Block, BlockHeader, TimeDiff},
    };

    const ERA: EraId = EraId::new(0);
    const MINUTE: u64 = 60_000;

    fn new_state() -> State {
        let validators = Validators::from_weights(validator_weights(&[("alice", 1), ("bob", 1)]))
            .expect("valid weights");
        let mut state = State::new();
        state.start_era(
            ERA,
            Arc::new(validators),
            genesis() + TimeDiff::from_millis(60 * MINUTE),
        );
        state
    }

    fn genesis() -> Timestamp {
        testing::local_chainspec().highway_config.genesis_era_start
    }

    fn add(
        state: &mut State,
        creator: &str,
        timestamp: Timestamp,
        parents: &[BlockHash],
        magic_bit: bool,
    ) -> BlockHash {
        let mut header = BlockHeader::new(creator.into(), ERA, timestamp);
        header.parent_hashes = parents.iter().copied().collect();
        header.magic_bit = magic_bit;
        let block = Block::new(header, vec![]);
        let hash = *block.hash();
        state.add_block(block).expect("block should be valid");
        hash
    }

    /// Builds the chain `root <- booking <- key <- late` around era 1's entropy window.
    fn window_chain(state: &mut State, booking_magic_bit: bool) -> [BlockHash; 4] {
        let era_start = genesis() + TimeDiff::from_millis(60 * MINUTE);
        let booking_time = era_start - TimeDiff::from_millis(10 * MINUTE);
        let root = add(state, "alice", booking_time - TimeDiff::from_millis(MINUTE), &[], false);
        let booking = add(
            state,
            "bob",
            booking_time + TimeDiff::from_millis(1),
            &[root],
            booking_magic_bit,
        );
        let key = add(
            state,
            "alice",
            booking_time + TimeDiff::from_millis(5 * MINUTE),
            &[booking],
            true,
        );
        let late = add(
            state,
            "bob",
            booking_time + TimeDiff::from_millis(6 * MINUTE),
            &[key],
            true,
        );
        [root, booking, key, late]
    }

    #[test]
    fn should_pick_booking_and_key_blocks() {
        let collector = EntropyCollector::new(&testing::local_chainspec());
        let mut state = new_state();
        let [_, booking, key, _] = window_chain(&mut state, true);
        let era_id = EraId::new(1);
        assert_eq!(collector.booking_block(era_id, &state), Some(booking));
        assert_eq!(collector.key_block(era_id, &booking, &state), Some(key));
    }

    #[test]
    fn should_break_booking_block_ties_by_smallest_hash() {
        let collector = EntropyCollector::new(&testing::local_chainspec());
        let mut state = new_state();
        let time = genesis() - TimeDiff::from_millis(11 * MINUTE);
        let first = add(&mut state, "alice", time, &[], false);
        let second = add(&mut state, "bob", time, &[], false);
        assert_eq!(
            collector.booking_block(ERA, &state),
            Some(first.min(second))
        );
    }

    #[test]
    fn should_refuse_to_collect_open_window() {
        let collector = EntropyCollector::new(&testing::local_chainspec());
        let state = new_state();
        let era_id = EraId::new(1);
        let key_block_time = genesis() + TimeDiff::from_millis(55 * MINUTE);
        assert_eq!(
            collector.collect(era_id, &state, key_block_time),
            Err(EntropyError::WindowOpen {
                era_id,
                key_block_time,
                now: key_block_time
            })
        );
        assert_eq!(collector.cached(era_id), None);
    }

    #[test]
    fn collection_is_idempotent() {
        let chainspec = testing::local_chainspec();
        let collector = EntropyCollector::new(&chainspec);
        let mut state = new_state();
        let [_, _, _, late] = window_chain(&mut state, true);
        let era_id = EraId::new(1);
        let now = genesis() + TimeDiff::from_millis(59 * MINUTE);

        let seed = collector.collect(era_id, &state, now).expect("window closed");
        assert_eq!(collector.collect(era_id, &state, now), Ok(seed));
        assert_eq!(collector.cached(era_id), Some(seed));

        // Blocks after the key block time do not contribute, whether or not the seed is cached.
        add(&mut state, "alice", now, &[late], false);
        assert_eq!(collector.collect(era_id, &state, now), Ok(seed));
        let fresh = EntropyCollector::new(&chainspec);
        assert_eq!(fresh.collect(era_id, &state, now), Ok(seed));
        assert_ne!(seed, collector.genesis_seed(era_id));
    }

    #[test]
    fn magic_bit_changes_seed() {
        let chainspec = testing::local_chainspec();
        let t0 = genesis();
        let booking_time = t0 - TimeDiff::from_millis(10 * MINUTE);
        let now = t0 + TimeDiff::from_millis(1);

        let seed_with = |magic_bit: bool| {
            let mut state = new_state();
            let booking = add(
                &mut state,
                "alice",
                booking_time + TimeDiff::from_millis(1),
                &[],
                magic_bit,
            );
            let key = add(
                &mut state,
                "bob",
                booking_time + TimeDiff::from_millis(5 * MINUTE),
                &[booking],
                false,
            );
            let collector = EntropyCollector::new(&chainspec);
            assert_eq!(collector.booking_block(ERA, &state), Some(booking));
            assert_eq!(collector.key_block(ERA, &booking, &state), Some(key));
            collector.collect(ERA, &state, now).expect("window closed")
        };
        assert_ne!(seed_with(true), seed_with(false));
    }

    #[test]
    fn should_fall_back_to_genesis_seed() {
        let collector = EntropyCollector::new(&testing::local_chainspec());
        let state = new_state();
        let now = genesis() + TimeDiff::from_millis(120 * MINUTE);
        let era_1 = collector.collect(EraId::new(1), &state, now).expect("window closed");
        assert_eq!(era_1, collector.genesis_seed(EraId::new(1)));
        assert_ne!(era_1, collector.genesis_seed(EraId::new(2)));
        assert_eq!(collector.collect_without_blocks(ERA), collector.genesis_seed(ERA));
    }
}
