//! Summit-based finality detection.
//!
//! A level-0 summit for a block `B` consists of the votes in each validator's latest streak of
//! votes for `B` or its descendants. A level-`k` summit is a committee of validators whose votes
//! each see level-`(k-1)` votes of committee members with a combined weight above the quorum.
//! The finality quorum is strictly more than `1/2 + ftt` of the era's stake: `B` is final once it
//! has a level-1 summit with that quorum. Equivocating validators are excluded from all
//! committees.


use std::{
    collections::{BTreeMap, HashMap, HashSet},
    convert::TryFrom,
    fmt::{self, Display, Formatter},
    iter,
    sync::atomic::{AtomicBool, Ordering},
};

use num::rational::Ratio;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use super::{
    state::{EraVotes, State, Vote, Weight},
    validators::ValidatorIndex,
};
use crate::types::{chainspec::MAX_SUMMIT_LEVEL, BlockHash, EraId};

/// The summit a block has reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summit {
    /// The block the summit is for.
    pub block_hash: BlockHash,
    /// The number of consecutive summit levels reached with the finality quorum, up to
    /// `MAX_SUMMIT_LEVEL`. Level 1 and above means the block is final.
    pub level: u8,
    /// The greatest fraction `q` of the era's stake such that a committee exists whose members'
    /// latest votes are for the block and each see votes for it with at least `q` of the stake.
    pub quorum_level: Ratio<u64>,
    /// The fraction of the era's stake of honest validators whose latest vote is for the block.
    pub supporting_stake_fraction: Ratio<u64>,
}

impl Summit {
    /// Returns whether the block is final.
    pub fn is_finalized(&self) -> bool {
        self.level >= 1
    }

    /// Combines a newly computed summit with an earlier one. Levels never go down.
    fn merged_with(self, earlier: &Summit) -> Summit {
        Summit {
            block_hash: self.block_hash,
            level: self.level.max(earlier.level),
            quorum_level: self.quorum_level.max(earlier.quorum_level),
            supporting_stake_fraction: self.supporting_stake_fraction,
        }
    }
}

impl Display for Summit {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "level-{} summit for {} (quorum {}, support {})",
            self.level, self.block_hash, self.quorum_level, self.supporting_stake_fraction
        )
    }
}

/// A failed summit computation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FinalityError {
    /// The block has not been appended to the DAG.
    #[error("unknown block {0}")]
    UnknownBlock(BlockHash),
    /// The block's era has no validator set.
    #[error("{0} has not started")]
    UnknownEra(EraId),
    /// The detector was cancelled, e.g. because the node is shutting down.
    #[error("summit computation cancelled")]
    Cancelled,
}

#[derive(Debug)]
struct CachedSummit {
    version: u64,
    summit: Summit,
}

/// An incremental finality detector.
///
/// It caches the summit of every block it was asked about, keyed by the DAG version, and must
/// always be applied to the same growing `State`. Finality, once recorded, is never removed.
#[derive(Debug)]
pub(crate) struct FinalityDetector {
    /// The fault tolerance threshold, as a fraction of the total weight.
    ftt: Ratio<u64>,
    cache: Mutex<HashMap<BlockHash, CachedSummit>>,
    finalized: RwLock<HashSet<BlockHash>>,
    /// Eras for which exceeding the FTT has already been reported.
    ftt_exceeded: Mutex<HashSet<EraId>>,
    cancelled: AtomicBool,
}

impl FinalityDetector {
    pub(crate) fn new(ftt: Ratio<u64>) -> Self {
        FinalityDetector {
            ftt,
            cache: Mutex::new(HashMap::new()),
            finalized: RwLock::new(HashSet::new()),
            ftt_exceeded: Mutex::new(HashSet::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns the summit for `block_hash` in the given state.
    pub(crate) fn summit_for(
        &self,
        block_hash: &BlockHash,
        state: &State,
    ) -> Result<Summit, FinalityError> {
        self.check_cancelled()?;
        let block = state
            .block(block_hash)
            .ok_or(FinalityError::UnknownBlock(*block_hash))?;
        let version = state.version();
        if let Some(cached) = self.cache.lock().get(block_hash) {
            if cached.version == version {
                return Ok(cached.summit.clone());
            }
        }
        let era_id = block.era_id();
        let era = state
            .era_votes(era_id)
            .ok_or(FinalityError::UnknownEra(era_id))?;
        self.check_fault_tolerance(era_id, era);

        let computed = self.compute(block_hash, era, state)?;
        let summit = {
            let mut cache = self.cache.lock();
            let (summit, version) = match cache.get(block_hash) {
                Some(cached) => (
                    computed.merged_with(&cached.summit),
                    cached.version.max(version),
                ),
                None => (computed, version),
            };
            cache.insert(
                *block_hash,
                CachedSummit {
                    version,
                    summit: summit.clone(),
                },
            );
            summit
        };
        if summit.is_finalized() && self.finalized.write().insert(*block_hash) {
            info!(
                %block_hash,
                %era_id,
                level = summit.level,
                quorum = %summit.quorum_level,
                "block finalized"
            );
        }
        Ok(summit)
    }

    /// Computes the summit of a block in a state that is not the live DAG, e.g. a past snapshot
    /// of it. Nothing is cached or recorded.
    pub(crate) fn summit_in_snapshot(
        &self,
        block_hash: &BlockHash,
        snapshot: &State,
    ) -> Result<Summit, FinalityError> {
        self.check_cancelled()?;
        let block = snapshot
            .block(block_hash)
            .ok_or(FinalityError::UnknownBlock(*block_hash))?;
        let era_id = block.era_id();
        let era = snapshot
            .era_votes(era_id)
            .ok_or(FinalityError::UnknownEra(era_id))?;
        self.compute(block_hash, era, snapshot)
    }

    /// Returns whether the block has been found to be final.
    pub(crate) fn is_finalized(&self, block_hash: &BlockHash) -> bool {
        self.finalized.read().contains(block_hash)
    }

    /// Returns the number of blocks found to be final.
    pub(crate) fn finalized_count(&self) -> usize {
        self.finalized.read().len()
    }

    /// Returns the fraction of the era's stake held by validators seen equivocating.
    pub(crate) fn faulty_fraction(&self, era: &EraVotes) -> Ratio<u64> {
        era.faulty_weight().fraction_of(era.total_weight())
    }

    /// Makes in-flight and future computations return `FinalityError::Cancelled`.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check_cancelled(&self) -> Result<(), FinalityError> {
        if self.is_cancelled() {
            return Err(FinalityError::Cancelled);
        }
        Ok(())
    }

    fn check_fault_tolerance(&self, era_id: EraId, era: &EraVotes) {
        let faulty_fraction = self.faulty_fraction(era);
        if faulty_fraction > self.ftt && self.ftt_exceeded.lock().insert(era_id) {
            error!(
                %era_id,
                %faulty_fraction,
                ftt = %self.ftt,
                "equivocating stake exceeds the fault tolerance threshold"
            );
        }
    }

    fn compute(
        &self,
        block_hash: &BlockHash,
        era: &EraVotes,
        state: &State,
    ) -> Result<Summit, FinalityError> {
        let total_weight = era.total_weight();
        let descendants = state.descendants_or_self(block_hash);
        let sec0 = Section::level0(&descendants, era);
        let support = sec0.weight();
        let quorum = sec0.max_committee_quorum();
        let level = self.summit_level(&sec0, total_weight)?;
        debug!(%block_hash, level, %quorum, %support, "computed summit");
        Ok(Summit {
            block_hash: *block_hash,
            level,
            quorum_level: quorum.fraction_of(total_weight),
            supporting_stake_fraction: support.fraction_of(total_weight),
        })
    }

    /// Returns the number of consecutive summit levels, up to `MAX_SUMMIT_LEVEL`, whose
    /// committees each exceed the finality quorum.
    fn summit_level(&self, sec0: &Section, total_weight: Weight) -> Result<u8, FinalityError> {
        let quorum = self.finality_quorum(total_weight);
        let sections_iter = iter::successors(Some(sec0.clone()), |sec| {
            if self.is_cancelled() {
                None
            } else {
                sec.next(quorum)
            }
        });
        let lvl = sections_iter
            .skip(1)
            .take(usize::from(MAX_SUMMIT_LEVEL))
            .count();
        self.check_cancelled()?;
        Ok(u8::try_from(lvl).unwrap_or(MAX_SUMMIT_LEVEL))
    }

    /// Returns the smallest weight strictly greater than `(1/2 + ftt) * total_w`.
    fn finality_quorum(&self, total_w: Weight) -> Weight {
        let ftt_numer = u128::from(*self.ftt.numer());
        let ftt_denom = u128::from(*self.ftt.denom());
        let numerator = u128::from(total_w).saturating_mul(ftt_denom + 2 * ftt_numer);
        let denominator = 2 * ftt_denom;
        Weight(u64::try_from(numerator / denominator + 1).unwrap_or(u64::MAX))
    }
}

/// A list containing the earliest level-n messages of each member of some committee, for some n.
#[derive(Clone, Debug)]
struct Section<'a> {
    /// Assigns to each member of a committee the sequence number of the earliest message that
    /// qualifies them for that committee.
    sequence_numbers: BTreeMap<ValidatorIndex, u64>,
    /// The era whose votes form the section.
    era: &'a EraVotes,
}

impl<'a> Section<'a> {
    /// Creates a section assigning to each honest validator their level-0 vote, i.e. the oldest
    /// vote in their current streak of votes in `descendants`, or nothing if their latest vote
    /// is not in `descendants`.
    fn level0(descendants: &HashSet<BlockHash>, era: &'a EraVotes) -> Self {
        let to_lvl0vote = |(idx, hash): (ValidatorIndex, &'a BlockHash)| {
            era.swimlane(hash)
                .take_while(|(vote_hash, _)| descendants.contains(*vote_hash))
                .last()
                .map(|(_, vote)| (idx, vote.seq_number))
        };
        let correct_votes = era
            .panorama()
            .enumerate()
            .filter_map(|(idx, obs)| obs.correct().map(|hash| (idx, hash)));
        Section {
            sequence_numbers: correct_votes.filter_map(to_lvl0vote).collect(),
            era,
        }
    }

    /// Returns the total weight of the section's members.
    fn weight(&self) -> Weight {
        self.sequence_numbers
            .keys()
            .map(|idx| self.era.weight(*idx))
            .sum()
    }

    /// Returns a section `s` of votes each of which can see a quorum of votes in `self` by
    /// validators that are part of `s`.
    fn next(&self, quorum: Weight) -> Option<Self> {
        let (committee, _pruned) =
            self.prune_committee(quorum, self.sequence_numbers.keys().cloned().collect());
        if committee.is_empty() {
            None
        } else {
            Some(self.next_from_committee(quorum, &committee))
        }
    }

    /// Returns the greatest quorum for which some subset of the members forms a committee.
    fn max_committee_quorum(&self) -> Weight {
        let (mut committee, _pruned) =
            self.prune_committee(Weight(1), self.sequence_numbers.keys().cloned().collect());
        let mut max_quorum = Weight(0);
        while let Some(quorum) = self.committee_quorum(&committee) {
            max_quorum = max_quorum.max(quorum);
            let higher_quorum = match quorum.0.checked_add(1) {
                Some(higher_quorum) => Weight(higher_quorum),
                None => break,
            };
            let (new_committee, _pruned) = self.prune_committee(higher_quorum, committee);
            committee = new_committee;
        }
        max_quorum
    }

    /// Returns the greatest subset of the `committee` of validators whose latest votes can see a
    /// quorum of votes by the subset in `self`.
    ///
    /// The first returned value is the pruned committee, the second one are the validators that
    /// were pruned.
    fn prune_committee(
        &self,
        quorum: Weight,
        mut committee: Vec<ValidatorIndex>,
    ) -> (Vec<ValidatorIndex>, Vec<ValidatorIndex>) {
        let mut pruned = Vec::new();
        loop {
            let sees_quorum = |&idx: &ValidatorIndex| {
                self.latest_vote(idx)
                    .map_or(false, |vote| self.seen_weight(vote, &committee) >= quorum)
            };
            let (new_committee, new_pruned): (Vec<_>, Vec<_>) =
                committee.iter().cloned().partition(sees_quorum);
            if new_pruned.is_empty() {
                return (new_committee, pruned);
            }
            pruned.extend(new_pruned);
            committee = new_committee;
        }
    }

    /// The maximal quorum for which this is a committee, i.e. the minimum seen weight of the
    /// members.
    fn committee_quorum(&self, committee: &[ValidatorIndex]) -> Option<Weight> {
        committee
            .iter()
            .filter_map(|idx| self.latest_vote(*idx))
            .map(|vote| self.seen_weight(vote, committee))
            .min()
    }

    /// Returns the section containing the earliest vote of each of the `committee` members that
    /// can see a quorum of votes by `committee` members in `self`.
    fn next_from_committee(&self, quorum: Weight, committee: &[ValidatorIndex]) -> Self {
        let find_first_lvl_n = |&idx: &ValidatorIndex| {
            let latest = self.era.panorama().get(idx)?.correct()?;
            self.era
                .swimlane(latest)
                .take_while(|(_, vote)| self.seen_weight(vote, committee) >= quorum)
                .last()
                .map(|(_, vote)| (idx, vote.seq_number))
        };
        Section {
            sequence_numbers: committee.iter().filter_map(find_first_lvl_n).collect(),
            era: self.era,
        }
    }

    fn latest_vote(&self, idx: ValidatorIndex) -> Option<&'a Vote> {
        let era = self.era;
        let hash = era.panorama().get(idx)?.correct()?;
        era.vote(hash)
    }

    /// Returns the total weight of the `committee`'s members whose message in this section is seen
    /// by `vote`.
    fn seen_weight(&self, vote: &Vote, committee: &[ValidatorIndex]) -> Weight {
        let to_weight = |&idx: &ValidatorIndex| self.era.weight(idx);
        let is_seen = |&&idx: &&ValidatorIndex| self.can_see(vote, idx);
        committee.iter().filter(is_seen).map(to_weight).sum()
    }

    /// Returns whether `vote` can see `idx`'s vote in `self`, where `vote` is considered to see
    /// itself.
    fn can_see(&self, vote: &Vote, idx: ValidatorIndex) -> bool {
        self.sequence_numbers.get(&idx).map_or(false, |self_sn| {
            if vote.creator == idx {
                vote.seq_number >= *self_sn
            } else {
                let sees_self_sn = |hash: &BlockHash| {
                    self.era
                        .vote(hash)
                        .map_or(false, |seen| seen.seq_number >= *self_sn)
                };
                vote.panorama
                    .get(idx)
                    .and_then(|obs| obs.correct())
                    .map_or(false, sees_self_sn)
            }
        })
    }
}
