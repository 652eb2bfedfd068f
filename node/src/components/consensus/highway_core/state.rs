//! The protocol state: all blocks appended to the DAG, and for every era the votes they cast.

mod panorama;
mod vote;
mod weight;

#[cfg(test)]
mod tests;

pub(crate) use panorama::{Observation, Panorama};
pub(crate) use vote::Vote;
pub(crate) use weight::Weight;

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    iter,
    sync::Arc,
};

use datasize::DataSize;
use thiserror::Error;
use tracing::warn;

use crate::{
    components::consensus::highway_core::validators::{ValidatorIndex, Validators},
    types::{Block, BlockHash, DeployHash, EraId, Timestamp, ValidatorId},
};

/// A block that cannot be appended to the DAG.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddBlockError {
    /// The block's era has not been started.
    #[error("{era_id} has not started")]
    UnknownEra {
        /// The block's era.
        era_id: EraId,
    },
    /// The block's creator is not bonded in the block's era.
    #[error("{creator} is not a validator in {era_id}")]
    Creator {
        /// The block's creator.
        creator: ValidatorId,
        /// The block's era.
        era_id: EraId,
    },
    /// A parent or justification has not been appended yet.
    #[error("missing dependency {0}")]
    MissingDependency(BlockHash),
    /// The block cites a block of a later era.
    #[error("block cites {cited} of the later {cited_era}")]
    LaterEra {
        /// The cited block.
        cited: BlockHash,
        /// The cited block's era.
        cited_era: EraId,
    },
    /// The block cites more than one earlier block of its own creator.
    #[error("block cites more than one vote by its own creator")]
    OwnJustifications,
    /// The block is dated earlier than a block it cites.
    #[error("block dated {timestamp} cites {cited} dated {cited_timestamp}")]
    EarlierThanCited {
        /// The cited block.
        cited: BlockHash,
        /// The cited block's timestamp.
        cited_timestamp: Timestamp,
        /// The block's timestamp.
        timestamp: Timestamp,
    },
    /// The block is dated at or after the end of its era.
    #[error("block dated {timestamp} is past the end {end_time} of {era_id}")]
    AfterEraEnd {
        /// The block's era.
        era_id: EraId,
        /// The end of the block's era.
        end_time: Timestamp,
        /// The block's timestamp.
        timestamp: Timestamp,
    },
}

/// The result of a successful append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AddOutcome {
    /// The block was new.
    Added {
        /// Whether the block revealed its creator as an equivocator.
        new_equivocator: bool,
    },
    /// The block had already been appended; nothing changed.
    Duplicate,
}

/// The votes of one era, over that era's validator set.
#[derive(DataSize, Debug)]
pub(crate) struct EraVotes {
    validators: Arc<Validators<ValidatorId>>,
    /// Blocks of this era must be dated before this.
    end_time: Timestamp,
    votes: HashMap<BlockHash, Vote>,
    /// The latest vote or fault of every validator, over all votes appended so far.
    panorama: Panorama,
}

impl EraVotes {
    fn new(validators: Arc<Validators<ValidatorId>>, end_time: Timestamp) -> Self {
        let panorama = Panorama::new(validators.len());
        EraVotes {
            validators,
            end_time,
            votes: HashMap::new(),
            panorama,
        }
    }

    /// Returns the era's validator set.
    pub(crate) fn validators(&self) -> &Arc<Validators<ValidatorId>> {
        &self.validators
    }

    /// Returns the sum of all validators' weights.
    pub(crate) fn total_weight(&self) -> Weight {
        self.validators.total_weight()
    }

    /// Returns the `idx`th validator's weight.
    pub(crate) fn weight(&self, idx: ValidatorIndex) -> Weight {
        self.validators.weight(idx)
    }

    /// Returns the panorama of everything appended so far.
    pub(crate) fn panorama(&self) -> &Panorama {
        &self.panorama
    }

    /// Returns the vote cast by the block with the given hash.
    pub(crate) fn vote(&self, hash: &BlockHash) -> Option<&Vote> {
        self.votes.get(hash)
    }

    /// Returns the number of votes in this era.
    pub(crate) fn vote_count(&self) -> usize {
        self.votes.len()
    }

    /// Returns whether the validator has been seen equivocating.
    pub(crate) fn is_faulty(&self, idx: ValidatorIndex) -> bool {
        self.panorama.get(idx).map_or(false, Observation::is_faulty)
    }

    /// Returns the total weight of all known-faulty validators.
    pub(crate) fn faulty_weight(&self) -> Weight {
        self.panorama
            .iter_faulty()
            .map(|idx| self.weight(idx))
            .sum()
    }

    /// Returns an iterator over votes (with hashes) by the same creator, in reverse chronological
    /// order, starting with the specified vote.
    pub(crate) fn swimlane<'a>(
        &'a self,
        hash: &'a BlockHash,
    ) -> impl Iterator<Item = (&'a BlockHash, &'a Vote)> {
        let mut next = Some(hash);
        iter::from_fn(move || {
            let current = next?;
            let vote = self.vote(current)?;
            next = vote.previous();
            Some((current, vote))
        })
    }

    /// Returns the hash of the vote with the given sequence number in the swimlane starting at
    /// `hash`.
    fn find_in_swimlane<'a>(&'a self, hash: &'a BlockHash, seq_number: u64) -> Option<&'a BlockHash> {
        self.swimlane(hash)
            .find(|(_, vote)| vote.seq_number <= seq_number)
            .filter(|(_, vote)| vote.seq_number == seq_number)
            .map(|(hash, _)| hash)
    }

    /// Combines two observations of the same validator.
    ///
    /// Two correct observations are compatible if one vote is in the other's swimlane; the later
    /// one wins. Otherwise the validator has equivocated.
    fn merge(&self, obs0: Observation, obs1: Observation) -> Observation {
        match (obs0, obs1) {
            (Observation::Faulty, _) | (_, Observation::Faulty) => Observation::Faulty,
            (Observation::None, obs) | (obs, Observation::None) => obs,
            (Observation::Correct(hash0), Observation::Correct(hash1)) => {
                if hash0 == hash1 {
                    return Observation::Correct(hash0);
                }
                let (seq0, seq1) = match (self.vote(&hash0), self.vote(&hash1)) {
                    (Some(vote0), Some(vote1)) => (vote0.seq_number, vote1.seq_number),
                    _ => return Observation::Faulty,
                };
                let (later, earlier, earlier_seq) = if seq0 >= seq1 {
                    (hash0, hash1, seq1)
                } else {
                    (hash1, hash0, seq0)
                };
                if self.find_in_swimlane(&later, earlier_seq) == Some(&earlier) {
                    Observation::Correct(later)
                } else {
                    Observation::Faulty
                }
            }
        }
    }

    /// Adds the vote cast by a new block, whose cited blocks are all known.
    ///
    /// Returns whether the vote revealed its creator as faulty for the first time.
    fn add_vote(
        &mut self,
        hash: BlockHash,
        creator: ValidatorIndex,
        cited: &[BlockHash],
    ) -> Result<bool, AddBlockError> {
        let mut panorama = Panorama::new(self.validators.len());
        let mut own_citations = 0;
        for cited_hash in cited {
            // Blocks of earlier eras are not votes in this one.
            let cited_vote = match self.votes.get(cited_hash) {
                Some(vote) => vote,
                None => continue,
            };
            if cited_vote.creator == creator {
                own_citations += 1;
            }
            for (idx, obs) in cited_vote.panorama.enumerate() {
                panorama[idx] = self.merge(panorama[idx], *obs);
            }
            let cited_creator = cited_vote.creator;
            panorama[cited_creator] =
                self.merge(panorama[cited_creator], Observation::Correct(*cited_hash));
        }
        if own_citations > 1 {
            return Err(AddBlockError::OwnJustifications);
        }

        let previous = panorama[creator].correct().copied();
        let seq_number = previous
            .and_then(|prev| self.vote(&prev))
            .map_or(0, |prev_vote| prev_vote.seq_number + 1);
        let new_obs = match (self.panorama[creator], panorama[creator]) {
            (Observation::Faulty, _) | (_, Observation::Faulty) => Observation::Faulty,
            (latest, cited_own) if latest == cited_own => Observation::Correct(hash),
            _ => Observation::Faulty,
        };
        let new_equivocator = new_obs.is_faulty() && !self.panorama[creator].is_faulty();
        self.panorama[creator] = new_obs;
        self.votes.insert(
            hash,
            Vote {
                panorama,
                seq_number,
                creator,
                previous,
            },
        );
        Ok(new_equivocator)
    }
}

#[derive(DataSize, Debug)]
struct BlockEntry {
    block: Arc<Block>,
    height: u64,
}

/// The DAG of all appended blocks, with the vote overlay of every started era.
///
/// The state only grows: blocks are never removed, so anything derived from a snapshot stays
/// valid as a lower bound for every later snapshot.
#[derive(DataSize, Debug, Default)]
pub(crate) struct State {
    blocks: HashMap<BlockHash, BlockEntry>,
    children: HashMap<BlockHash, Vec<BlockHash>>,
    eras: BTreeMap<EraId, EraVotes>,
    deploys: HashSet<DeployHash>,
}

impl State {
    pub(crate) fn new() -> Self {
        State::default()
    }

    /// Registers the validator set of a new era, whose blocks must be dated before `end_time`.
    /// Returns `false` if the era had already started.
    pub(crate) fn start_era(
        &mut self,
        era_id: EraId,
        validators: Arc<Validators<ValidatorId>>,
        end_time: Timestamp,
    ) -> bool {
        if self.eras.contains_key(&era_id) {
            return false;
        }
        self.eras.insert(era_id, EraVotes::new(validators, end_time));
        true
    }

    /// Returns the votes of the given era, if it has started.
    pub(crate) fn era_votes(&self, era_id: EraId) -> Option<&EraVotes> {
        self.eras.get(&era_id)
    }

    /// Appends a block whose dependencies are all known.
    pub(crate) fn add_block(&mut self, block: Block) -> Result<AddOutcome, AddBlockError> {
        let hash = *block.hash();
        if self.blocks.contains_key(&hash) {
            return Ok(AddOutcome::Duplicate);
        }
        let era_id = block.era_id();
        let era = self
            .eras
            .get(&era_id)
            .ok_or(AddBlockError::UnknownEra { era_id })?;
        let creator = era
            .validators
            .get_index(block.creator())
            .ok_or_else(|| AddBlockError::Creator {
                creator: block.creator().clone(),
                era_id,
            })?;
        let timestamp = block.timestamp();
        if timestamp >= era.end_time {
            return Err(AddBlockError::AfterEraEnd {
                era_id,
                end_time: era.end_time,
                timestamp,
            });
        }
        let cited: Vec<BlockHash> = block.header().cited().copied().collect();
        for cited_hash in &cited {
            let entry = self
                .blocks
                .get(cited_hash)
                .ok_or(AddBlockError::MissingDependency(*cited_hash))?;
            if entry.block.era_id() > era_id {
                return Err(AddBlockError::LaterEra {
                    cited: *cited_hash,
                    cited_era: entry.block.era_id(),
                });
            }
            if entry.block.timestamp() > timestamp {
                return Err(AddBlockError::EarlierThanCited {
                    cited: *cited_hash,
                    cited_timestamp: entry.block.timestamp(),
                    timestamp,
                });
            }
        }
        let height = block
            .parent_hashes()
            .iter()
            .filter_map(|parent| self.height(parent))
            .max()
            .map_or(0, |max_parent_height| max_parent_height + 1);

        let era = self
            .eras
            .get_mut(&era_id)
            .ok_or(AddBlockError::UnknownEra { era_id })?;
        let new_equivocator = era.add_vote(hash, creator, &cited)?;
        if new_equivocator {
            warn!(%era_id, creator = %block.creator(), %hash, "validator equivocated");
        }

        for parent in block.parent_hashes() {
            self.children.entry(*parent).or_default().push(hash);
        }
        self.deploys
            .extend(block.deploys().iter().map(|deploy| *deploy.hash()));
        self.blocks.insert(
            hash,
            BlockEntry {
                block: Arc::new(block),
                height,
            },
        );
        Ok(AddOutcome::Added { new_equivocator })
    }

    /// Returns the state as it was when it held exactly the blocks dated at or before `until`.
    ///
    /// Cited blocks are never dated later than their citing block, so these blocks form a valid
    /// DAG on their own, and replaying them yields the same votes and panoramas.
    pub(crate) fn dated_until(&self, until: Timestamp) -> Result<State, AddBlockError> {
        let mut snapshot = State::new();
        for (era_id, era) in &self.eras {
            snapshot.start_era(*era_id, Arc::clone(&era.validators), era.end_time);
        }
        let mut included: Vec<&Arc<Block>> = self
            .blocks
            .values()
            .map(|entry| &entry.block)
            .filter(|block| block.timestamp() <= until)
            .collect();
        included.sort_by_key(|block| (block.timestamp(), *block.hash()));
        for block in included {
            // Blocks with equal timestamps may cite each other in any order.
            let mut to_add = vec![Arc::clone(block)];
            while let Some(current) = to_add.last().cloned() {
                if snapshot.blocks.contains_key(current.hash()) {
                    to_add.pop();
                    continue;
                }
                let missing: Vec<Arc<Block>> = current
                    .header()
                    .cited()
                    .filter(|cited| !snapshot.blocks.contains_key(*cited))
                    .filter_map(|cited| self.block(cited).cloned())
                    .collect();
                if missing.is_empty() {
                    to_add.pop();
                    snapshot.add_block((*current).clone())?;
                } else {
                    to_add.extend(missing);
                }
            }
        }
        Ok(snapshot)
    }

    /// Returns the block with the given hash.
    pub(crate) fn block(&self, hash: &BlockHash) -> Option<&Arc<Block>> {
        self.blocks.get(hash).map(|entry| &entry.block)
    }

    /// Returns the height of the block with the given hash: zero for blocks without parents.
    pub(crate) fn height(&self, hash: &BlockHash) -> Option<u64> {
        self.blocks.get(hash).map(|entry| entry.height)
    }

    /// Returns the number of appended blocks. Every append increases it.
    pub(crate) fn version(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Returns all blocks with their heights, in no particular order.
    pub(crate) fn blocks(&self) -> impl Iterator<Item = (&Arc<Block>, u64)> {
        self.blocks
            .values()
            .map(|entry| (&entry.block, entry.height))
    }

    /// Returns the blocks of one era, in no particular order.
    pub(crate) fn blocks_in_era(&self, era_id: EraId) -> impl Iterator<Item = &Arc<Block>> {
        self.blocks
            .values()
            .map(|entry| &entry.block)
            .filter(move |block| block.era_id() == era_id)
    }

    /// Returns the hashes of all deploys included in appended blocks.
    pub(crate) fn deploys(&self) -> &HashSet<DeployHash> {
        &self.deploys
    }

    /// Returns the block and all blocks that have it as an ancestor.
    pub(crate) fn descendants_or_self(&self, hash: &BlockHash) -> HashSet<BlockHash> {
        self.closure(hash, |current| {
            self.children
                .get(current)
                .map_or(&[][..], |children| children.as_slice())
                .iter()
        })
    }

    /// Returns the block and all its ancestors.
    pub(crate) fn ancestors_or_self(&self, hash: &BlockHash) -> HashSet<BlockHash> {
        self.closure(hash, |current| {
            self.block(current)
                .into_iter()
                .flat_map(|block| block.parent_hashes().iter())
        })
    }

    /// Returns whether `ancestor` is `descendant` itself or one of its ancestors.
    pub(crate) fn is_ancestor_or_self(&self, ancestor: &BlockHash, descendant: &BlockHash) -> bool {
        let ancestor_height = match self.height(ancestor) {
            Some(height) => height,
            None => return false,
        };
        let mut visited = HashSet::new();
        let mut to_visit = vec![*descendant];
        while let Some(current) = to_visit.pop() {
            if current == *ancestor {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(entry) = self.blocks.get(&current) {
                // Parents are strictly lower, so nothing at or below the ancestor's height leads
                // to it.
                if entry.height > ancestor_height {
                    to_visit.extend(entry.block.parent_hashes().iter().copied());
                }
            }
        }
        false
    }

    fn closure<'a, F, I>(&'a self, start: &BlockHash, next: F) -> HashSet<BlockHash>
    where
        F: Fn(&BlockHash) -> I,
        I: Iterator<Item = &'a BlockHash>,
    {
        let mut result = HashSet::new();
        if !self.blocks.contains_key(start) {
            return result;
        }
        let mut queue = VecDeque::new();
        queue.push_back(*start);
        while let Some(current) = queue.pop_front() {
            if result.insert(current) {
                queue.extend(next(&current).copied());
            }
        }
        result
    }
}
