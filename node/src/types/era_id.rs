use std::fmt::{self, Display, Formatter};

use datasize::DataSize;
use serde::{Deserialize, Serialize};

/// The index of an era, counting from the genesis era `0`.
#[derive(
    DataSize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    Default,
)]
pub struct EraId(u64);

impl EraId {
    /// Creates a new era ID.
    pub const fn new(value: u64) -> EraId {
        EraId(value)
    }

    /// Returns the underlying index.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Returns the ID of the era that follows this one.
    #[must_use]
    pub fn successor(self) -> EraId {
        EraId(self.0.saturating_add(1))
    }

    /// Returns the ID of the previous era, or `None` for the genesis era.
    pub fn predecessor(self) -> Option<EraId> {
        self.0.checked_sub(1).map(EraId)
    }

    /// Returns the little-endian bytes of the index, as fed into hashes.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl Display for EraId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "era {}", self.0)
    }
}

impl From<u64> for EraId {
    fn from(value: u64) -> Self {
        EraId(value)
    }
}

impl From<EraId> for u64 {
    fn from(era_id: EraId) -> Self {
        era_id.0
    }
}
