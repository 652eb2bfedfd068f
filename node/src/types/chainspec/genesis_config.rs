use datasize::DataSize;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// The `[genesis]` section of the chainspec.
#[derive(Clone, DataSize, PartialEq, Eq, Serialize, Deserialize, Debug)]
// Disallow unknown fields to ensure config files and command-line overrides contain valid keys.
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct GenesisConfig {
    /// The name of the chain.
    pub name: String,
    /// The genesis timestamp.
    pub timestamp: Timestamp,
    /// The protocol version this chainspec describes.
    #[data_size(skip)]
    pub protocol_version: Version,
}
