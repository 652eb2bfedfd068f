use std::{
    collections::BTreeMap,
    fmt::Debug,
    sync::atomic::{AtomicU64, Ordering},
};

use super::EntropySeed;
use crate::types::{EraId, Timestamp, ValidatorId};

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// The system wall clock, made monotonic: it never returns an earlier time than it already has.
#[derive(Debug, Default)]
pub struct SystemClock {
    latest: AtomicU64,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        SystemClock::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let now = Timestamp::now().millis();
        let latest = self.latest.fetch_max(now, Ordering::SeqCst);
        Timestamp::from(latest.max(now))
    }
}

/// Provides the weight table of each new era.
///
/// Validator selection is outside the consensus core; the seed is passed in so the provider can
/// use it.
pub trait ValidatorWeightsProvider: Send + Sync + Debug {
    /// Returns the weights of the validators of `era_id`.
    fn validator_weights(&self, era_id: EraId, seed: &EntropySeed) -> BTreeMap<ValidatorId, u64>;
}

/// A fixed table is used for every era.
impl ValidatorWeightsProvider for BTreeMap<ValidatorId, u64> {
    fn validator_weights(&self, _era_id: EraId, _seed: &EntropySeed) -> BTreeMap<ValidatorId, u64> {
        self.clone()
    }
}
