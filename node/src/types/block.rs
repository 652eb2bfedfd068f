use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
};

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use super::{Deploy, EraId, Timestamp};
use crate::crypto::{hash::Hasher, Digest};

/// A cryptographic hash identifying a [`Block`].
#[derive(
    Copy,
    Clone,
    DataSize,
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    Debug,
    Default,
)]
pub struct BlockHash(Digest);

impl BlockHash {
    /// Constructs a new `BlockHash`.
    pub fn new(hash: Digest) -> Self {
        BlockHash(hash)
    }

    /// Returns the wrapped inner hash.
    pub fn inner(&self) -> &Digest {
        &self.0
    }
}

impl Display for BlockHash {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "block-hash({})", self.0)
    }
}

impl From<Digest> for BlockHash {
    fn from(digest: Digest) -> Self {
        Self(digest)
    }
}

/// The identity of a validator, as used in the per-era weight tables.
#[derive(
    Clone, DataSize, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, Debug, Default,
)]
pub struct ValidatorId(String);

impl ValidatorId {
    /// Creates a new validator ID.
    pub fn new<S: Into<String>>(id: S) -> Self {
        ValidatorId(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ValidatorId {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<&str> for ValidatorId {
    fn from(id: &str) -> Self {
        ValidatorId(id.to_string())
    }
}

/// The header portion of a [`Block`].
#[derive(Clone, DataSize, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct BlockHeader {
    /// The blocks this block builds on.
    pub parent_hashes: BTreeSet<BlockHash>,
    /// The latest blocks by other validators the creator had seen; together with the parents
    /// they form the block's panorama.
    pub justifications: BTreeSet<BlockHash>,
    /// The validator that created the block.
    pub creator: ValidatorId,
    /// The era the block belongs to.
    pub era_id: EraId,
    /// The time at which the block was created.
    pub timestamp: Timestamp,
    /// The creator's contribution to the era entropy.
    pub magic_bit: bool,
    /// Whether the creator proposes this block as the last one of its era.
    pub is_switch_block: bool,
}

impl BlockHeader {
    /// Creates a header for a block without parents or justifications.
    pub fn new(creator: ValidatorId, era_id: EraId, timestamp: Timestamp) -> Self {
        BlockHeader {
            parent_hashes: BTreeSet::new(),
            justifications: BTreeSet::new(),
            creator,
            era_id,
            timestamp,
            magic_bit: false,
            is_switch_block: false,
        }
    }

    /// Returns the parents and justifications together: every block this block cites.
    pub fn cited(&self) -> impl Iterator<Item = &BlockHash> {
        self.parent_hashes
            .iter()
            .chain(self.justifications.difference(&self.parent_hashes))
    }
}

/// A block in the DAG, with the deploys it includes.
#[derive(Clone, DataSize, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct Block {
    hash: BlockHash,
    header: BlockHeader,
    deploys: Vec<Deploy>,
}

impl Block {
    /// Creates a new block, hashing its header and the hashes of its deploys.
    pub fn new(header: BlockHeader, deploys: Vec<Deploy>) -> Self {
        let mut hasher = Hasher::new();
        hasher.update_u64(header.parent_hashes.len() as u64);
        for parent in &header.parent_hashes {
            hasher.update(parent.inner());
        }
        hasher.update_u64(header.justifications.len() as u64);
        for justification in &header.justifications {
            hasher.update(justification.inner());
        }
        hasher.update_u64(header.creator.as_str().len() as u64);
        hasher.update(header.creator.as_str());
        hasher.update_u64(header.era_id.value());
        hasher.update_u64(header.timestamp.millis());
        hasher.update([u8::from(header.magic_bit), u8::from(header.is_switch_block)]);
        for deploy in &deploys {
            hasher.update(deploy.hash().inner());
        }
        Block {
            hash: BlockHash(hasher.finalize()),
            header,
            deploys,
        }
    }

    /// Returns the block hash.
    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    /// Returns the block header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Returns the included deploys, in block order.
    pub fn deploys(&self) -> &[Deploy] {
        &self.deploys
    }

    /// Returns the hashes of the parent blocks.
    pub fn parent_hashes(&self) -> &BTreeSet<BlockHash> {
        &self.header.parent_hashes
    }

    /// Returns the creator of the block.
    pub fn creator(&self) -> &ValidatorId {
        &self.header.creator
    }

    /// Returns the era the block belongs to.
    pub fn era_id(&self) -> EraId {
        self.header.era_id
    }

    /// Returns the block's timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    /// Returns the block's magic bit.
    pub fn magic_bit(&self) -> bool {
        self.header.magic_bit
    }

    /// Returns whether this block is a switch block candidate.
    pub fn is_switch_block(&self) -> bool {
        self.header.is_switch_block
    }
}

impl Display for Block {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "block[{}, {}, created by {} at {}, {} parents, {} deploys]",
            self.hash,
            self.header.era_id,
            self.header.creator,
            self.header.timestamp,
            self.header.parent_hashes.len(),
            self.deploys.len()
        )
    }
}
