//! The voting period on an era's switch block.
//!
//! The period starts at the era's voting start. With a summit level configured it ends as soon as
//! some switch block candidate reaches that level. Otherwise it ends at the fixed voting end, and
//! the best candidate dated by then is decided, even if it is not final. Such a decision is stamped
//! with the voting end, however late it is noticed.

use std::cmp::Reverse;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::era_clock::Era;
use crate::{
    components::consensus::{
        highway_core::finality_detector::Summit, FinalityConfidence, FinalityDecision,
    },
    types::{chainspec::VotingPeriod, Timestamp},
};

/// The phase of a voting period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum VotingState {
    /// Votes are being collected.
    Open,
    /// The switch block has been decided, but the next era has not started yet.
    Decided(FinalityDecision),
    /// The next era has started.
    Closed(FinalityDecision),
}

/// Decides the switch block of one era.
///
/// All transitions happen under a single lock, so each one is performed by exactly one caller;
/// everyone else observes a no-op.
#[derive(Debug)]
pub(crate) struct SwitchBlockVoting {
    era: Era,
    period: VotingPeriod,
    state: Mutex<VotingState>,
}

impl SwitchBlockVoting {
    pub(crate) fn new(era: Era, period: VotingPeriod) -> Self {
        SwitchBlockVoting {
            era,
            period,
            state: Mutex::new(VotingState::Open),
        }
    }

    /// Returns the current phase.
    pub(crate) fn state(&self) -> VotingState {
        self.state.lock().clone()
    }

    /// Returns the decision, once there is one.
    pub(crate) fn decision(&self) -> Option<FinalityDecision> {
        match &*self.state.lock() {
            VotingState::Open => None,
            VotingState::Decided(decision) | VotingState::Closed(decision) => Some(decision.clone()),
        }
    }

    /// Tries to end the voting period at `now`, given the summits of the era's switch block
    /// candidates. With a fixed voting end, these must be computed over the blocks dated at or
    /// before it.
    ///
    /// Returns the decision if this call made it, `None` if the period is still open or was
    /// already decided before.
    pub(crate) fn poll(&self, now: Timestamp, candidates: &[Summit]) -> Option<FinalityDecision> {
        if now < self.era.voting_start {
            return None;
        }
        let mut state = self.state.lock();
        if *state != VotingState::Open {
            return None;
        }
        let decision = match self.period {
            VotingPeriod::SummitLevel(level) => {
                let summit = best(candidates.iter().filter(|summit| summit.level >= level))?;
                info!(
                    era_id = %self.era.id,
                    %summit,
                    "switch block reached the configured summit level"
                );
                self.decide(Some(summit), FinalityConfidence::Summit, now)
            }
            VotingPeriod::Duration(_) => {
                let voting_end = self.era.voting_end.unwrap_or(self.era.voting_start);
                if now < voting_end {
                    return None;
                }
                match best(candidates.iter()) {
                    Some(summit) if summit.is_finalized() => {
                        info!(era_id = %self.era.id, %summit, "switch block decided at voting end");
                        self.decide(Some(summit), FinalityConfidence::Summit, voting_end)
                    }
                    best_seen => {
                        warn!(
                            era_id = %self.era.id,
                            %voting_end,
                            switch_block = ?best_seen.map(|summit| summit.block_hash),
                            "voting period timed out without a final switch block"
                        );
                        self.decide(best_seen, FinalityConfidence::Timeout, voting_end)
                    }
                }
            }
        };
        *state = VotingState::Decided(decision.clone());
        Some(decision)
    }

    /// Moves a decided voting period to `Closed`. Returns the decision if this call closed it.
    pub(crate) fn close(&self) -> Option<FinalityDecision> {
        let mut state = self.state.lock();
        match &*state {
            VotingState::Decided(decision) => {
                let decision = decision.clone();
                debug!(era_id = %self.era.id, "closing voting period");
                *state = VotingState::Closed(decision.clone());
                Some(decision)
            }
            VotingState::Open | VotingState::Closed(_) => None,
        }
    }

    fn decide(
        &self,
        summit: Option<&Summit>,
        confidence: FinalityConfidence,
        decided_at: Timestamp,
    ) -> FinalityDecision {
        FinalityDecision {
            era_id: self.era.id,
            block_hash: summit.map(|summit| summit.block_hash),
            confidence,
            decided_at,
        }
    }
}

/// Returns the candidate with the highest level, quorum and support, in that order. Remaining
/// ties go to the smallest hash.
fn best<'a, I>(candidates: I) -> Option<&'a Summit>
where
    I: Iterator<Item = &'a Summit>,
{
    candidates.max_by_key(|summit| {
        (
            summit.level,
            summit.quorum_level,
            summit.supporting_stake_fraction,
            Reverse(summit.block_hash),
        )
    })
}
