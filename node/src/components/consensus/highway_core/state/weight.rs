use std::{
    fmt::{self, Display, Formatter},
    iter::Sum,
};

use datasize::DataSize;
use derive_more::{Add, AddAssign, From, Sub, SubAssign, Sum};
use num::rational::Ratio;

/// A vote weight: the stake a validator contributes to quorums.
#[derive(
    Copy,
    Clone,
    DataSize,
    Default,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Add,
    Sub,
    AddAssign,
    SubAssign,
    Sum,
    From,
)]
pub(crate) struct Weight(pub(crate) u64);

impl Weight {
    /// Checked addition. Returns `None` if overflow occurred.
    pub fn checked_add(self, rhs: Weight) -> Option<Weight> {
        Some(Weight(self.0.checked_add(rhs.0)?))
    }

    /// Returns this weight as a fraction of `total`. A zero total yields zero.
    pub fn fraction_of(self, total: Weight) -> Ratio<u64> {
        if total.0 == 0 {
            return Ratio::from_integer(0);
        }
        Ratio::new(self.0.min(total.0), total.0)
    }
}

impl<'a> Sum<&'a Weight> for Weight {
    fn sum<I: Iterator<Item = &'a Weight>>(iter: I) -> Self {
        Weight(iter.fold(0u64, |sum, w| sum.saturating_add(w.0)))
    }
}

impl From<Weight> for u128 {
    fn from(Weight(w): Weight) -> u128 {
        u128::from(w)
    }
}

impl Display for Weight {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_express_fractions_in_lowest_terms() {
        assert_eq!(Weight(2).fraction_of(Weight(4)), Ratio::new(1, 2));
        assert_eq!(Weight(3).fraction_of(Weight(0)), Ratio::from_integer(0));
        assert_eq!(Weight(5).fraction_of(Weight(4)), Ratio::from_integer(1));
        assert_eq!(
            vec![Weight(u64::MAX), Weight(1)].iter().sum::<Weight>(),
            Weight(u64::MAX)
        );
    }
}
