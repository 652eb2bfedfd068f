//! Helper structs for parsing a chainspec configuration file into its domain object.
//!
//! The `[highway]` section carries `ftt` as a TOML number or string, which is converted into an
//! exact fraction here so that no floating point value reaches the consensus arithmetic.

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use super::{
    highway_config::{format_decimal_ratio, parse_decimal_ratio},
    Chainspec, DeployConfig, Error, GenesisConfig, HighwayConfig, WasmCosts,
};
use crate::types::{TimeDiff, Timestamp};

/// A decimal number as written in the TOML file.
#[derive(PartialEq, Serialize, Deserialize, Debug)]
#[serde(untagged)]
enum TomlDecimal {
    Integer(u64),
    Float(f64),
    Text(String),
}

impl TomlDecimal {
    fn as_text(&self) -> String {
        match self {
            TomlDecimal::Integer(value) => value.to_string(),
            TomlDecimal::Float(value) => value.to_string(),
            TomlDecimal::Text(value) => value.clone(),
        }
    }
}

#[derive(PartialEq, Serialize, Deserialize, Debug)]
// Disallow unknown fields to ensure config files and command-line overrides contain valid keys.
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct TomlHighway {
    genesis_era_start: Timestamp,
    era_duration: TimeDiff,
    booking_duration: TimeDiff,
    entropy_duration: TimeDiff,
    #[serde(default)]
    voting_period_duration: TimeDiff,
    #[serde(default)]
    voting_period_summit_level: u8,
    ftt: TomlDecimal,
    #[serde(default = "default_booking_block_leeway")]
    booking_block_leeway: TimeDiff,
}

fn default_booking_block_leeway() -> TimeDiff {
    HighwayConfig::DEFAULT_BOOKING_BLOCK_LEEWAY
}

/// A chainspec configuration as laid out in the TOML-encoded configuration file.
#[derive(PartialEq, Serialize, Deserialize, Debug)]
// Disallow unknown fields to ensure config files and command-line overrides contain valid keys.
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub(super) struct TomlChainspec {
    genesis: GenesisConfig,
    highway: TomlHighway,
    deploys: DeployConfig,
    wasm_costs: WasmCosts,
}

impl From<&Chainspec> for TomlChainspec {
    fn from(chainspec: &Chainspec) -> Self {
        let highway = &chainspec.highway_config;
        TomlChainspec {
            genesis: chainspec.genesis_config.clone(),
            highway: TomlHighway {
                genesis_era_start: highway.genesis_era_start,
                era_duration: highway.era_duration,
                booking_duration: highway.booking_duration,
                entropy_duration: highway.entropy_duration,
                voting_period_duration: highway.voting_period_duration,
                voting_period_summit_level: highway.voting_period_summit_level,
                ftt: TomlDecimal::Text(format_decimal_ratio(highway.ftt)),
                booking_block_leeway: highway.booking_block_leeway,
            },
            deploys: chainspec.deploy_config,
            wasm_costs: chainspec.wasm_costs,
        }
    }
}

impl TryFrom<TomlChainspec> for Chainspec {
    type Error = Error;

    fn try_from(toml_chainspec: TomlChainspec) -> Result<Self, Self::Error> {
        let TomlChainspec {
            genesis,
            highway,
            deploys,
            wasm_costs,
        } = toml_chainspec;
        let ftt_text = highway.ftt.as_text();
        let ftt = parse_decimal_ratio(&ftt_text).map_err(|reason| Error::InvalidFtt {
            value: ftt_text.clone(),
            reason,
        })?;
        let highway_config = HighwayConfig {
            genesis_era_start: highway.genesis_era_start,
            era_duration: highway.era_duration,
            booking_duration: highway.booking_duration,
            entropy_duration: highway.entropy_duration,
            voting_period_duration: highway.voting_period_duration,
            voting_period_summit_level: highway.voting_period_summit_level,
            ftt,
            booking_block_leeway: highway.booking_block_leeway,
        };
        Ok(Chainspec {
            genesis_config: genesis,
            highway_config,
            deploy_config: deploys,
            wasm_costs,
        })
    }
}

/// Parses and validates a chainspec from its TOML text.
pub(super) fn parse_toml(toml_text: &str) -> Result<Chainspec, Error> {
    let toml_chainspec: TomlChainspec = toml::from_str(toml_text)?;
    let chainspec = Chainspec::try_from(toml_chainspec)?;
    chainspec.validate()?;
    Ok(chainspec)
}

/// Encodes a chainspec as TOML text.
pub(super) fn to_toml(chainspec: &Chainspec) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&TomlChainspec::from(chainspec))
}
