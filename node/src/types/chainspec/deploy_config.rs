use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::types::TimeDiff;

/// Limits applied to deploys and to the blocks that include them.
#[derive(Copy, Clone, DataSize, PartialEq, Eq, Serialize, Deserialize, Debug)]
// Disallow unknown fields to ensure config files and command-line overrides contain valid keys.
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct DeployConfig {
    /// The maximum age of a deploy, and the maximum time to live it may declare.
    #[serde(rename = "max-ttl-millis")]
    pub max_ttl: TimeDiff,
    /// The maximum number of dependencies a deploy may declare.
    pub max_dependencies: u8,
    /// The maximum serialized size of a block.
    pub max_block_size_bytes: u32,
    /// The maximum total gas cost of a block's deploys. `0` means unlimited.
    pub max_block_cost: u64,
}

impl DeployConfig {
    /// Returns the block gas limit, or `None` if blocks may have any total cost.
    pub fn block_gas_limit(&self) -> Option<u64> {
        if self.max_block_cost == 0 {
            None
        } else {
            Some(self.max_block_cost)
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        DeployConfig {
            max_ttl: TimeDiff::from_millis(86_400_000),
            max_dependencies: 10,
            max_block_size_bytes: 10_485_760,
            max_block_cost: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_roundtrip() {
        let config = DeployConfig {
            max_block_cost: 100,
            ..Default::default()
        };
        let encoded = toml::to_string_pretty(&config).unwrap();
        assert!(encoded.contains("max-ttl-millis"));
        let decoded: DeployConfig = toml::from_str(&encoded).unwrap();
        assert_eq!(config, decoded);
    }

    #[test]
    fn zero_block_cost_is_unlimited() {
        assert_eq!(DeployConfig::default().block_gas_limit(), None);
        let limited = DeployConfig {
            max_block_cost: 100,
            ..Default::default()
        };
        assert_eq!(limited.block_gas_limit(), Some(100));
    }
}
