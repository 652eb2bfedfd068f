//! The consensus component: summit-based finality over a block DAG, divided into eras.
//!
//! Each era has a fixed validator set whose weights are derived from the entropy seed collected
//! at the end of the previous era. An era ends when its switch block is decided, either because
//! it reached a summit of the configured level or because the voting period timed out.

mod engine_handle;
mod era_supervisor;
mod error;
pub(crate) mod highway_core;
mod metrics;
mod traits;

use std::fmt::{self, Display, Formatter};

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::types::{BlockHash, EraId, Timestamp};

pub use engine_handle::EngineHandle;
pub use era_supervisor::{EntropyError, EntropySeed, Era, EraClock, EraSupervisor, TimeWindow};
pub use error::Error;
pub use highway_core::{
    finality_detector::{FinalityError, Summit},
    state::AddBlockError,
    validators::WeightsError,
};
pub use traits::{Clock, SystemClock, ValidatorWeightsProvider};

/// How a switch block decision was reached.
#[derive(Clone, Copy, DataSize, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalityConfidence {
    /// The block reached a summit while voting was open.
    Summit,
    /// The voting period ended first; the block is the best candidate seen, or none.
    Timeout,
}

impl Display for FinalityConfidence {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        match self {
            FinalityConfidence::Summit => write!(formatter, "summit"),
            FinalityConfidence::Timeout => write!(formatter, "timeout"),
        }
    }
}

/// The switch block decision of an era.
#[derive(Clone, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityDecision {
    /// The era whose voting period produced the decision.
    pub era_id: EraId,
    /// The decided switch block. `None` if the voting period timed out without any candidate.
    pub block_hash: Option<BlockHash>,
    /// How the decision was reached.
    pub confidence: FinalityConfidence,
    /// When the decision was made.
    pub decided_at: Timestamp,
}

/// An event produced by the consensus engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ConsensusEvent {
    /// An era's switch block has been decided.
    Finalized(FinalityDecision),
    /// A new era has started.
    EraTransition {
        /// The era that ended.
        old_era_id: EraId,
        /// The era that started.
        new_era_id: EraId,
        /// The seed the new era's validator weights were derived from.
        entropy_seed: EntropySeed,
    },
}

impl Display for ConsensusEvent {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        match self {
            ConsensusEvent::Finalized(decision) => match decision.block_hash {
                Some(block_hash) => write!(
                    formatter,
                    "switch block {} of {} decided by {}",
                    block_hash, decision.era_id, decision.confidence
                ),
                None => write!(
                    formatter,
                    "no switch block for {} decided by {}",
                    decision.era_id, decision.confidence
                ),
            },
            ConsensusEvent::EraTransition {
                old_era_id,
                new_era_id,
                entropy_seed,
            } => write!(
                formatter,
                "transition from {} to {} with {}",
                old_era_id, new_era_id, entropy_seed
            ),
        }
    }
}
