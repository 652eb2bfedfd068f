//! Era boundaries.
//!
//! Eras tile the timeline contiguously from the genesis era start: era `n` starts at
//! `genesis_era_start + n * era_duration`. Everything here is a pure function of the
//! [`HighwayConfig`].

use std::fmt::{self, Display, Formatter};

use datasize::DataSize;
use serde::Serialize;

use crate::types::{
    chainspec::{HighwayConfig, VotingPeriod},
    EraId, TimeDiff, Timestamp,
};

/// A closed interval of time.
#[derive(Clone, Copy, DataSize, Debug, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    /// The first instant of the window.
    pub start: Timestamp,
    /// The last instant of the window.
    pub end: Timestamp,
}

impl TimeWindow {
    /// Returns whether `time` lies within the window, bounds included.
    pub fn contains(&self, time: Timestamp) -> bool {
        self.start <= time && time <= self.end
    }
}

/// The fixed boundaries of one era.
#[derive(Clone, Copy, DataSize, Debug, PartialEq, Eq, Serialize)]
pub struct Era {
    /// The era's index.
    pub id: EraId,
    /// The first instant of the era.
    pub start_time: Timestamp,
    /// The first instant after the era; the next era's start time.
    pub end_time: Timestamp,
    /// The time before `start_time` at which the booking block is picked.
    pub booking_block_time: Timestamp,
    /// The time at which the entropy collection for this era ends.
    pub key_block_time: Timestamp,
    /// The time from which the switch block of this era can be decided: the next era's key block
    /// time, so that the next era's entropy is complete when this one is handed over.
    pub voting_start: Timestamp,
    /// The fixed end of the voting period, or `None` if it only ends with a summit.
    pub voting_end: Option<Timestamp>,
}

impl Era {
    /// Returns whether `time` is within `[start_time, end_time)`.
    pub fn contains(&self, time: Timestamp) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

impl Display for Era {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "{} [{}, {})",
            self.id, self.start_time, self.end_time
        )
    }
}

/// Computes era boundaries from the genesis parameters.
#[derive(Clone, Copy, DataSize, Debug)]
pub struct EraClock {
    config: HighwayConfig,
}

impl EraClock {
    /// Creates a clock for a validated highway config.
    pub fn new(config: &HighwayConfig) -> Self {
        EraClock { config: *config }
    }

    /// Returns the way voting periods end.
    pub fn voting_period(&self) -> VotingPeriod {
        self.config.voting_period()
    }

    /// Returns the era with the given index.
    pub fn era(&self, era_id: EraId) -> Era {
        let start_time = self.start_time(era_id);
        let end_time = self.start_time(era_id.successor());
        let booking_block_time = self.booking_block_time(era_id);
        let key_block_time = self.key_block_time(era_id);
        let voting_start = self.key_block_time(era_id.successor());
        let voting_end = match self.voting_period() {
            VotingPeriod::Duration(duration) => Some(voting_start.saturating_add(duration)),
            VotingPeriod::SummitLevel(_) => None,
        };
        Era {
            id: era_id,
            start_time,
            end_time,
            booking_block_time,
            key_block_time,
            voting_start,
            voting_end,
        }
    }

    /// Returns the era whose `[start_time, end_time)` contains `time`, or `None` before genesis.
    pub fn era_index_for(&self, time: Timestamp) -> Option<EraId> {
        let since_genesis = time
            .millis()
            .checked_sub(self.config.genesis_era_start.millis())?;
        Some(EraId::new(since_genesis / self.config.era_duration.millis()))
    }

    /// Returns the era containing `time`, or `None` before genesis.
    pub fn era_for(&self, time: Timestamp) -> Option<Era> {
        self.era_index_for(time).map(|era_id| self.era(era_id))
    }

    /// Returns the interval in which the booking block of `era_id` must have been created.
    ///
    /// The booking block is the highest block with a timestamp up to the window's end.
    pub fn booking_block_window(&self, era_id: EraId) -> TimeWindow {
        let start = self.booking_block_time(era_id);
        TimeWindow {
            start,
            end: start.saturating_add(self.config.booking_block_leeway),
        }
    }

    /// Returns the time by which the entropy for `era_id` has been collected.
    pub fn key_block_time(&self, era_id: EraId) -> Timestamp {
        self.booking_block_time(era_id)
            .saturating_add(self.config.entropy_duration)
    }

    fn start_time(&self, era_id: EraId) -> Timestamp {
        let offset = TimeDiff::from_millis(
            self.config
                .era_duration
                .millis()
                .saturating_mul(era_id.value()),
        );
        self.config.genesis_era_start.saturating_add(offset)
    }

    fn booking_block_time(&self, era_id: EraId) -> Timestamp {
        self.start_time(era_id)
            .saturating_sub(self.config.booking_duration)
    }
}
