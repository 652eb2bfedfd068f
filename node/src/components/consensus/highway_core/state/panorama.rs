use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::{
    components::consensus::highway_core::validators::{ValidatorIndex, ValidatorMap},
    types::BlockHash,
};

/// The observed behavior of a validator at some point in time.
#[derive(Clone, Copy, DataSize, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub(crate) enum Observation {
    /// No vote by that validator was observed yet.
    None,
    /// The validator's latest vote.
    Correct(BlockHash),
    /// The validator has been seen voting on two forks of its own swimlane.
    Faulty,
}

impl Default for Observation {
    fn default() -> Self {
        Observation::None
    }
}

impl Observation {
    /// Returns the vote hash, if this is a correct observation.
    pub(crate) fn correct(&self) -> Option<&BlockHash> {
        match self {
            Self::None | Self::Faulty => None,
            Self::Correct(hash) => Some(hash),
        }
    }

    pub(crate) fn is_correct(&self) -> bool {
        matches!(self, Self::Correct(_))
    }

    pub(crate) fn is_faulty(&self) -> bool {
        matches!(self, Self::Faulty)
    }
}

/// The latest votes observed from every validator of an era.
pub(crate) type Panorama = ValidatorMap<Observation>;

impl Panorama {
    /// Creates a new, empty panorama.
    pub(crate) fn new(num_validators: usize) -> Panorama {
        (0..num_validators).map(|_| Observation::None).collect()
    }

    /// Returns an iterator over all hashes of the honest validators' latest messages.
    pub(crate) fn iter_correct(&self) -> impl Iterator<Item = &BlockHash> {
        self.iter().filter_map(Observation::correct)
    }

    /// Returns the indices of all validators seen as faulty.
    pub(crate) fn iter_faulty(&self) -> impl Iterator<Item = ValidatorIndex> + '_ {
        self.enumerate()
            .filter(|(_, obs)| obs.is_faulty())
            .map(|(idx, _)| idx)
    }
}
