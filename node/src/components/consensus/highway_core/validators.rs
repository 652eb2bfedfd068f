use std::{
    collections::{BTreeMap, HashMap},
    fmt::{self, Display, Formatter},
    hash::Hash,
    iter::FromIterator,
    ops::{Index, IndexMut},
    slice,
};

use datasize::DataSize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Weight;

/// The index of a validator, in a list of all validators, ordered by ID.
#[derive(
    Copy, Clone, DataSize, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub(crate) struct ValidatorIndex(pub(crate) u32);

impl From<u32> for ValidatorIndex {
    fn from(idx: u32) -> Self {
        ValidatorIndex(idx)
    }
}

impl Display for ValidatorIndex {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "validator {}", self.0)
    }
}

/// Information about a validator: their ID and weight.
#[derive(Clone, DataSize, Debug, Eq, PartialEq)]
pub(crate) struct Validator<VID> {
    weight: Weight,
    id: VID,
}

impl<VID, W: Into<Weight>> From<(VID, W)> for Validator<VID> {
    fn from((id, weight): (VID, W)) -> Validator<VID> {
        Validator {
            id,
            weight: weight.into(),
        }
    }
}

impl<VID> Validator<VID> {
    pub(crate) fn id(&self) -> &VID {
        &self.id
    }

    pub(crate) fn weight(&self) -> Weight {
        self.weight
    }
}

/// An invalid weight table.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WeightsError {
    /// The table is empty or all weights are zero.
    #[error("the validator weights add up to zero")]
    ZeroTotalWeight,
    /// The weights add up to more than `u64::MAX`.
    #[error("the validator weights overflow")]
    TotalWeightOverflow,
}

/// The validator IDs and weight map of one era.
///
/// Validators are indexed in the order of their IDs, so every node derives the same indices from
/// the same weight table.
#[derive(Clone, DataSize, Debug)]
pub(crate) struct Validators<VID> {
    index_by_id: HashMap<VID, ValidatorIndex>,
    validators: Vec<Validator<VID>>,
    total_weight: Weight,
}

impl<VID: Ord + Hash + Clone> Validators<VID> {
    /// Creates the validator set from a weight table, rejecting tables that cannot form a quorum.
    pub(crate) fn from_weights(weights: BTreeMap<VID, u64>) -> Result<Self, WeightsError> {
        let total_weight = weights
            .values()
            .try_fold(Weight(0), |sum, weight| sum.checked_add(Weight(*weight)))
            .ok_or(WeightsError::TotalWeightOverflow)?;
        if total_weight == Weight(0) {
            return Err(WeightsError::ZeroTotalWeight);
        }
        Ok(weights.into_iter().collect())
    }
}

impl<VID: Eq + Hash> Validators<VID> {
    pub(crate) fn len(&self) -> usize {
        self.validators.len()
    }

    pub(crate) fn total_weight(&self) -> Weight {
        self.total_weight
    }

    pub(crate) fn get_index(&self, id: &VID) -> Option<ValidatorIndex> {
        self.index_by_id.get(id).copied()
    }

    pub(crate) fn get_by_index(&self, idx: ValidatorIndex) -> Option<&Validator<VID>> {
        self.validators.get(idx.0 as usize)
    }

    /// Returns the weight of the validator at `idx`, or zero if there is no such validator.
    pub(crate) fn weight(&self, idx: ValidatorIndex) -> Weight {
        self.get_by_index(idx).map_or(Weight(0), Validator::weight)
    }

    pub(crate) fn enumerate(&self) -> impl Iterator<Item = (ValidatorIndex, &Validator<VID>)> {
        self.validators
            .iter()
            .enumerate()
            .map(|(idx, v)| (ValidatorIndex(idx as u32), v))
    }

    /// Returns a map with the same value for every validator.
    pub(crate) fn map_with<T: Clone>(&self, value: T) -> ValidatorMap<T> {
        ValidatorMap(vec![value; self.validators.len()])
    }
}

impl<VID: Ord + Hash + Clone, W: Into<Weight>> FromIterator<(VID, W)> for Validators<VID> {
    fn from_iter<I: IntoIterator<Item = (VID, W)>>(ii: I) -> Validators<VID> {
        let mut validators: Vec<_> = ii.into_iter().map(Validator::from).collect();
        validators.sort_by(|val0, val1| val0.id.cmp(&val1.id));
        let index_by_id = validators
            .iter()
            .enumerate()
            .map(|(idx, val)| (val.id.clone(), ValidatorIndex(idx as u32)))
            .collect();
        let total_weight = validators
            .iter()
            .fold(Weight(0), |sum, val| Weight(sum.0.saturating_add(val.weight.0)));
        Validators {
            index_by_id,
            validators,
            total_weight,
        }
    }
}

/// A value for each validator of an era, indexed by [`ValidatorIndex`].
#[derive(Clone, DataSize, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct ValidatorMap<T>(Vec<T>);

impl<T> ValidatorMap<T> {
    /// Returns the value for the given validator, if the index is in range.
    pub(crate) fn get(&self, idx: ValidatorIndex) -> Option<&T> {
        self.0.get(idx.0 as usize)
    }

    /// Returns the number of values. This must equal the number of validators.
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns an iterator over all values.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    /// Returns an iterator over all values, by validator index.
    pub(crate) fn enumerate(&self) -> impl Iterator<Item = (ValidatorIndex, &T)> {
        self.iter()
            .enumerate()
            .map(|(idx, value)| (ValidatorIndex(idx as u32), value))
    }
}

impl<T> FromIterator<T> for ValidatorMap<T> {
    fn from_iter<I: IntoIterator<Item = T>>(ii: I) -> ValidatorMap<T> {
        ValidatorMap(ii.into_iter().collect())
    }
}

impl<T> Index<ValidatorIndex> for ValidatorMap<T> {
    type Output = T;

    fn index(&self, vidx: ValidatorIndex) -> &T {
        &self.0[vidx.0 as usize]
    }
}

impl<T> IndexMut<ValidatorIndex> for ValidatorMap<T> {
    fn index_mut(&mut self, vidx: ValidatorIndex) -> &mut T {
        &mut self.0[vidx.0 as usize]
    }
}

impl<'a, T> IntoIterator for &'a ValidatorMap<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
