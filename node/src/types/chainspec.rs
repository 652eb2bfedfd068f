//! The chainspec is a set of configuration options for the network. All validators must apply the
//! same set of options in order to join and act as a peer in a given network.

mod deploy_config;
mod error;
mod genesis_config;
mod highway_config;
mod parse_toml;
mod wasm_config;

use std::path::Path;

use datasize::DataSize;
use tracing::{error, info};

pub use deploy_config::DeployConfig;
pub use error::{Error, ValidationError};
pub use genesis_config::GenesisConfig;
pub use highway_config::{HighwayConfig, VotingPeriod, MAX_SUMMIT_LEVEL};
pub use wasm_config::WasmCosts;

use crate::utils;

/// A collection of configuration settings describing the state of the system at genesis and the
/// protocol parameters it runs under.
#[derive(Clone, DataSize, PartialEq, Eq, Debug)]
pub struct Chainspec {
    /// The `[genesis]` section.
    pub genesis_config: GenesisConfig,
    /// The `[highway]` section.
    pub highway_config: HighwayConfig,
    /// The `[deploys]` section.
    pub deploy_config: DeployConfig,
    /// The `[wasm-costs]` section.
    pub wasm_costs: WasmCosts,
}

impl Chainspec {
    /// Reads, parses and validates the chainspec at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let bytes = utils::read_file(path.as_ref())?;
        let toml_text = String::from_utf8_lossy(&bytes);
        let chainspec = Self::from_toml(&toml_text)?;
        info!(
            path = %path.as_ref().display(),
            name = %chainspec.genesis_config.name,
            version = %chainspec.genesis_config.protocol_version,
            "loaded chainspec"
        );
        Ok(chainspec)
    }

    /// Parses and validates a chainspec from its TOML text.
    pub fn from_toml(toml_text: &str) -> Result<Self, Error> {
        parse_toml::parse_toml(toml_text)
    }

    /// Encodes the chainspec as TOML text.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        parse_toml::to_toml(self)
    }

    /// Checks whether the values set in the chainspec are consistent.
    ///
    /// A chainspec that fails validation must not be used to start the node.
    pub fn validate(&self) -> Result<(), Error> {
        let result = self.check_values();
        if let Err(ref invalid) = result {
            error!(%invalid, "chainspec validation failed");
        }
        result.map_err(Error::from)
    }

    fn check_values(&self) -> Result<(), ValidationError> {
        if self.genesis_config.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        self.highway_config.validate()?;
        let costs = &self.wasm_costs;
        if costs.opcodes_multiplier == 0 || costs.opcodes_divisor == 0 {
            return Err(ValidationError::ZeroOpcodeScale {
                multiplier: costs.opcodes_multiplier,
                divisor: costs.opcodes_divisor,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use num::rational::Ratio;

    use super::*;
    use crate::types::{TimeDiff, Timestamp};

    const LOCAL_CHAINSPEC: &str = include_str!("../../../resources/local/chainspec.toml");

    #[test]
    fn should_parse_local_chainspec() {
        let chainspec = Chainspec::from_toml(LOCAL_CHAINSPEC).unwrap();
        let highway = &chainspec.highway_config;
        assert_eq!(highway.ftt, Ratio::new(1, 100));
        assert_eq!(highway.era_duration, TimeDiff::from_millis(3_600_000));
        assert_eq!(highway.booking_block_leeway, TimeDiff::from_seconds(1));
        assert_eq!(highway.voting_period(), VotingPeriod::Duration(TimeDiff::from_seconds(1)));
        assert_eq!(chainspec.deploy_config.max_ttl, TimeDiff::from_millis(86_400_000));
        assert_eq!(chainspec.deploy_config.block_gas_limit(), None);
        assert_eq!(chainspec.wasm_costs, WasmCosts::default());
        assert_eq!(
            chainspec.genesis_config.protocol_version,
            semver::Version::new(1, 0, 0)
        );
    }

    #[test]
    fn toml_roundtrip() {
        let chainspec = Chainspec::from_toml(LOCAL_CHAINSPEC).unwrap();
        let encoded = chainspec.to_toml().unwrap();
        let decoded = Chainspec::from_toml(&encoded).unwrap();
        assert_eq!(chainspec, decoded);
    }

    #[test]
    fn should_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chainspec.toml");
        fs::write(&path, LOCAL_CHAINSPEC).unwrap();
        let chainspec = Chainspec::from_path(&path).unwrap();
        assert_eq!(
            chainspec.highway_config.genesis_era_start,
            "2021-01-01T00:00:00Z".parse::<Timestamp>().unwrap()
        );

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Chainspec::from_path(&missing),
            Err(Error::LoadChainspec(_))
        ));
    }

    #[test]
    fn should_accept_ftt_as_string_or_integer() {
        let as_string = LOCAL_CHAINSPEC.replace("ftt = 0.01", "ftt = \"0.25\"");
        let chainspec = Chainspec::from_toml(&as_string).unwrap();
        assert_eq!(chainspec.highway_config.ftt, Ratio::new(1, 4));

        let as_integer = LOCAL_CHAINSPEC.replace("ftt = 0.01", "ftt = 0");
        let chainspec = Chainspec::from_toml(&as_integer).unwrap();
        assert_eq!(chainspec.highway_config.ftt, Ratio::new(0, 1));
    }

    #[test]
    fn should_fail_fast_on_invalid_values() {
        let too_high = LOCAL_CHAINSPEC.replace("ftt = 0.01", "ftt = 0.5");
        assert!(matches!(
            Chainspec::from_toml(&too_high),
            Err(Error::Invalid(ValidationError::FttOutOfRange(_)))
        ));

        let negative = LOCAL_CHAINSPEC.replace("ftt = 0.01", "ftt = -0.1");
        assert!(matches!(
            Chainspec::from_toml(&negative),
            Err(Error::InvalidFtt { .. })
        ));

        let both_voting = LOCAL_CHAINSPEC.replace(
            "voting-period-summit-level = 0",
            "voting-period-summit-level = 3",
        );
        assert!(matches!(
            Chainspec::from_toml(&both_voting),
            Err(Error::Invalid(ValidationError::AmbiguousVotingPeriod { .. }))
        ));

        let zero_divisor = LOCAL_CHAINSPEC.replace("opcodes-divisor = 8", "opcodes-divisor = 0");
        assert!(matches!(
            Chainspec::from_toml(&zero_divisor),
            Err(Error::Invalid(ValidationError::ZeroOpcodeScale { .. }))
        ));

        let unknown_key = LOCAL_CHAINSPEC.replace("[deploys]", "[deploys]\nmax-payment-cost = 1");
        assert!(matches!(
            Chainspec::from_toml(&unknown_key),
            Err(Error::DecodingFromToml(_))
        ));
    }
}
