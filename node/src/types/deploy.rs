use std::fmt::{self, Display, Formatter};

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::{
    crypto::{hash::Hasher, Digest},
    types::{TimeDiff, Timestamp},
};

/// The cryptographic hash of a [`Deploy`].
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
pub struct DeployHash(Digest);

impl DeployHash {
    /// Constructs a new `DeployHash`.
    pub fn new(hash: Digest) -> Self {
        DeployHash(hash)
    }

    /// Returns the wrapped inner hash.
    pub fn inner(&self) -> &Digest {
        &self.0
    }
}

impl Display for DeployHash {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "deploy-hash({})", self.0)
    }
}

impl From<Digest> for DeployHash {
    fn from(digest: Digest) -> Self {
        Self(digest)
    }
}

/// The cost class of a session code instruction.
#[derive(Copy, Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub enum OpcodeClass {
    /// Any opcode without a dedicated multiplier.
    Regular,
    /// Integer and float division and remainder.
    Div,
    /// Integer and float multiplication.
    Mul,
    /// Memory loads and stores.
    Mem,
    /// Memory growth; the operand is the number of 64kb pages.
    MemGrow,
    /// Bulk memory copy; the operand is the number of bytes.
    MemCopy,
}

impl OpcodeClass {
    fn tag(self) -> u8 {
        match self {
            OpcodeClass::Regular => 0,
            OpcodeClass::Div => 1,
            OpcodeClass::Mul => 2,
            OpcodeClass::Mem => 3,
            OpcodeClass::MemGrow => 4,
            OpcodeClass::MemCopy => 5,
        }
    }
}

/// A single instruction of a deploy's session code, as seen by the gas cost model.
#[derive(Copy, Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct Instruction {
    /// The cost class.
    pub class: OpcodeClass,
    /// The operand size: pages for `MemGrow`, bytes for `MemCopy`, ignored otherwise.
    pub operand_size: u64,
}

impl Instruction {
    /// Creates an instruction without an operand.
    pub fn new(class: OpcodeClass) -> Self {
        Instruction {
            class,
            operand_size: 0,
        }
    }

    /// Creates an instruction with an operand.
    pub fn with_operand(class: OpcodeClass, operand_size: u64) -> Self {
        Instruction {
            class,
            operand_size,
        }
    }
}

/// The header portion of a [`Deploy`].
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct DeployHeader {
    /// The time at which the deploy was issued.
    pub timestamp: Timestamp,
    /// How long after `timestamp` the deploy may still be included in a block.
    pub ttl: TimeDiff,
    /// The deploys that must be executed before this one.
    pub dependencies: Vec<DeployHash>,
    /// The highest stack the session code declares it will use.
    pub max_stack_height: u32,
}

impl DeployHeader {
    /// Creates a header without dependencies.
    pub fn new(timestamp: Timestamp, ttl: TimeDiff) -> Self {
        DeployHeader {
            timestamp,
            ttl,
            dependencies: vec![],
            max_stack_height: 0,
        }
    }
}

/// A deploy; a unit of submitted work with a time to live and explicit dependencies.
#[derive(Clone, DataSize, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct Deploy {
    hash: DeployHash,
    header: DeployHeader,
    session: Vec<Instruction>,
}

impl Deploy {
    /// Constructs a new deploy, hashing its contents.
    pub fn new(header: DeployHeader, session: Vec<Instruction>) -> Deploy {
        let hash = Self::compute_hash(&header, &session);
        Deploy {
            hash,
            header,
            session,
        }
    }

    /// Constructs a deploy under an already known hash.
    ///
    /// Used for deploys received from peers, whose hashes are verified outside the consensus
    /// core.
    pub fn with_hash(hash: DeployHash, header: DeployHeader, session: Vec<Instruction>) -> Deploy {
        Deploy {
            hash,
            header,
            session,
        }
    }

    fn compute_hash(header: &DeployHeader, session: &[Instruction]) -> DeployHash {
        let mut hasher = Hasher::new();
        hasher.update_u64(header.timestamp.millis());
        hasher.update_u64(header.ttl.millis());
        hasher.update_u64(header.dependencies.len() as u64);
        for dependency in &header.dependencies {
            hasher.update(dependency.inner());
        }
        hasher.update_u64(u64::from(header.max_stack_height));
        for instruction in session {
            hasher.update([instruction.class.tag()]);
            hasher.update_u64(instruction.operand_size);
        }
        DeployHash(hasher.finalize())
    }

    /// Returns the hash of this deploy.
    pub fn hash(&self) -> &DeployHash {
        &self.hash
    }

    /// Returns the header of this deploy.
    pub fn header(&self) -> &DeployHeader {
        &self.header
    }

    /// Returns the session code instructions.
    pub fn session(&self) -> &[Instruction] {
        &self.session
    }

    /// Returns the time at which the deploy was issued.
    pub fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    /// Returns the declared time to live.
    pub fn ttl(&self) -> TimeDiff {
        self.header.ttl
    }

    /// Returns the declared dependencies.
    pub fn dependencies(&self) -> &[DeployHash] {
        &self.header.dependencies
    }
}

impl Display for Deploy {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "deploy[{}, issued {}, ttl {}, {} dependencies]",
            self.hash,
            self.header.timestamp,
            self.header.ttl,
            self.header.dependencies.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_covers_header_and_session() {
        let header = DeployHeader::new(Timestamp::from(1_000), TimeDiff::from_seconds(60));
        let deploy = Deploy::new(header.clone(), vec![Instruction::new(OpcodeClass::Regular)]);
        let same = Deploy::new(header.clone(), vec![Instruction::new(OpcodeClass::Regular)]);
        assert_eq!(deploy.hash(), same.hash());

        let other_session = Deploy::new(header.clone(), vec![Instruction::new(OpcodeClass::Div)]);
        assert_ne!(deploy.hash(), other_session.hash());

        let mut dependent_header = header;
        dependent_header.dependencies.push(*deploy.hash());
        let dependent = Deploy::new(dependent_header, vec![]);
        assert_ne!(deploy.hash(), dependent.hash());
    }
}
