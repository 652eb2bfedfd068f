use thiserror::Error;

use super::highway_config::MAX_SUMMIT_LEVEL;
use crate::{types::TimeDiff, utils::ReadFileError};

/// Error returned when loading or validating a chainspec.
///
/// Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum Error {
    /// Error while decoding the chainspec from TOML format.
    #[error("decoding from TOML error: {0}")]
    DecodingFromToml(#[from] toml::de::Error),

    /// Error loading the chainspec.
    #[error("could not load chainspec: {0}")]
    LoadChainspec(#[from] ReadFileError),

    /// The `ftt` value could not be read as an exact decimal fraction.
    #[error("invalid ftt '{value}': {reason}")]
    InvalidFtt {
        /// The value as it appears in the file.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The chainspec was decoded but its values are inconsistent.
    #[error("invalid chainspec: {0}")]
    Invalid(#[from] ValidationError),
}

/// A chainspec value that is out of range or inconsistent with another value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The genesis name is empty.
    #[error("genesis name must not be empty")]
    EmptyName,

    /// The fault tolerance threshold is not in `[0, 0.5)`.
    #[error("ftt must be in the range [0, 0.5), got {0}")]
    FttOutOfRange(String),

    /// The era duration is zero.
    #[error("era-duration must be greater than zero")]
    ZeroEraDuration,

    /// The booking block of an era would be picked before the previous era starts.
    #[error("booking-duration ({booking_duration}) must not exceed era-duration ({era_duration})")]
    BookingBeforePreviousEra {
        /// The configured booking duration.
        booking_duration: TimeDiff,
        /// The configured era duration.
        era_duration: TimeDiff,
    },

    /// The entropy window would end after the era starts.
    #[error(
        "entropy-duration ({entropy_duration}) must not exceed booking-duration \
         ({booking_duration})"
    )]
    EntropyAfterEraStart {
        /// The configured entropy duration.
        entropy_duration: TimeDiff,
        /// The configured booking duration.
        booking_duration: TimeDiff,
    },

    /// The booking block leeway reaches into the key block window.
    #[error("booking-block-leeway ({leeway}) must be shorter than entropy-duration ({entropy_duration})")]
    LeewayTooLong {
        /// The configured leeway.
        leeway: TimeDiff,
        /// The configured entropy duration.
        entropy_duration: TimeDiff,
    },

    /// Both voting period settings are non-zero, so neither takes precedence.
    #[error(
        "only one of voting-period-duration ({duration}) and voting-period-summit-level \
         ({summit_level}) may be non-zero"
    )]
    AmbiguousVotingPeriod {
        /// The configured voting period duration.
        duration: TimeDiff,
        /// The configured summit level.
        summit_level: u8,
    },

    /// Both voting period settings are zero, so the voting period would never end.
    #[error("one of voting-period-duration and voting-period-summit-level must be non-zero")]
    UnboundedVotingPeriod,

    /// The summit level is higher than the finality detector can compute.
    #[error("voting-period-summit-level must not exceed {}, got {0}", MAX_SUMMIT_LEVEL)]
    SummitLevelTooHigh(u8),

    /// The opcode scaling factor has a zero numerator or denominator.
    #[error("opcodes-multiplier and opcodes-divisor must be non-zero, got {multiplier}/{divisor}")]
    ZeroOpcodeScale {
        /// The configured multiplier.
        multiplier: u32,
        /// The configured divisor.
        divisor: u32,
    },
}
