use datasize::DataSize;
use num::rational::Ratio;

use super::error::ValidationError;
use crate::types::{TimeDiff, Timestamp};

/// The highest summit level the finality detector computes, and thus the highest level the
/// voting period can wait for.
pub const MAX_SUMMIT_LEVEL: u8 = 16;

/// The era timing and finality parameters.
#[derive(Copy, Clone, DataSize, PartialEq, Eq, Debug)]
pub struct HighwayConfig {
    /// The start of the genesis era.
    pub genesis_era_start: Timestamp,
    /// The fixed length of every era.
    pub era_duration: TimeDiff,
    /// How long before an era's start its booking block is picked.
    pub booking_duration: TimeDiff,
    /// How long after the booking block the key block is picked, collecting magic bits on the
    /// way.
    pub entropy_duration: TimeDiff,
    /// The length of the voting period; effective if `voting_period_summit_level` is zero.
    pub voting_period_duration: TimeDiff,
    /// The summit level that ends the voting period; effective if non-zero.
    pub voting_period_summit_level: u8,
    /// The relative fault tolerance threshold.
    #[data_size(skip)]
    pub ftt: Ratio<u64>,
    /// The width of the booking block window.
    pub booking_block_leeway: TimeDiff,
}

/// How the voting period on an era's switch block ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VotingPeriod {
    /// Open-ended, until some switch block candidate reaches a summit of this level.
    SummitLevel(u8),
    /// Ends a fixed time after it starts, regardless of finality.
    Duration(TimeDiff),
}

impl HighwayConfig {
    /// The default booking block leeway, used when the chainspec omits it.
    pub const DEFAULT_BOOKING_BLOCK_LEEWAY: TimeDiff = TimeDiff::from_seconds(1);

    /// Checks whether the values set in the config are consistent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ftt >= Ratio::new(1, 2) {
            return Err(ValidationError::FttOutOfRange(self.ftt.to_string()));
        }
        if self.era_duration.is_zero() {
            return Err(ValidationError::ZeroEraDuration);
        }
        if self.booking_duration > self.era_duration {
            return Err(ValidationError::BookingBeforePreviousEra {
                booking_duration: self.booking_duration,
                era_duration: self.era_duration,
            });
        }
        if self.entropy_duration > self.booking_duration {
            return Err(ValidationError::EntropyAfterEraStart {
                entropy_duration: self.entropy_duration,
                booking_duration: self.booking_duration,
            });
        }
        if self.booking_block_leeway >= self.entropy_duration {
            return Err(ValidationError::LeewayTooLong {
                leeway: self.booking_block_leeway,
                entropy_duration: self.entropy_duration,
            });
        }
        match (
            self.voting_period_duration.is_zero(),
            self.voting_period_summit_level,
        ) {
            (false, level) if level > 0 => Err(ValidationError::AmbiguousVotingPeriod {
                duration: self.voting_period_duration,
                summit_level: level,
            }),
            (true, 0) => Err(ValidationError::UnboundedVotingPeriod),
            (_, level) if level > MAX_SUMMIT_LEVEL => {
                Err(ValidationError::SummitLevelTooHigh(level))
            }
            _ => Ok(()),
        }
    }

    /// Returns the effective voting period setting.
    ///
    /// Only meaningful for a validated config.
    pub fn voting_period(&self) -> VotingPeriod {
        if self.voting_period_summit_level > 0 {
            VotingPeriod::SummitLevel(self.voting_period_summit_level)
        } else {
            VotingPeriod::Duration(self.voting_period_duration)
        }
    }
}

/// The maximum number of decimal places accepted for `ftt`.
pub(super) const MAX_FTT_DECIMALS: usize = 9;

/// Parses a non-negative decimal number such as `0.01` into an exact fraction.
pub(super) fn parse_decimal_ratio(value: &str) -> Result<Ratio<u64>, &'static str> {
    let value = value.trim();
    let (int_part, frac_part) = value.split_once('.').unwrap_or((value, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err("expected a decimal number");
    }
    let is_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if !is_digits(int_part) || !is_digits(frac_part) {
        return Err("expected a non-negative decimal number");
    }
    if frac_part.len() > MAX_FTT_DECIMALS {
        return Err("at most 9 decimal places are supported");
    }
    let parse = |part: &str| {
        if part.is_empty() {
            Ok(0)
        } else {
            part.parse::<u64>().map_err(|_| "value too large")
        }
    };
    let denominator = 10u64.pow(frac_part.len() as u32);
    let numerator = parse(int_part)?
        .checked_mul(denominator)
        .and_then(|int| int.checked_add(parse(frac_part).ok()?))
        .ok_or("value too large")?;
    Ok(Ratio::new(numerator, denominator))
}

/// Formats a fraction with a power-of-ten denominator as a decimal number.
pub(super) fn format_decimal_ratio(ratio: Ratio<u64>) -> String {
    let scale = 10u128.pow(MAX_FTT_DECIMALS as u32);
    let scaled = u128::from(*ratio.numer()) * scale / u128::from(*ratio.denom());
    let int_part = scaled / scale;
    let frac_part = format!("{:09}", scaled % scale);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}
