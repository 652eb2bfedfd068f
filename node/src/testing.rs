//! Testing utilities.
//!
//! Contains helpers to aid writing tests of the consensus core: the example chainspec, named
//! hashes and a controllable clock.

mod test_clock;

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    crypto::Digest,
    types::{Block, BlockHash, BlockHeader, Chainspec, DeployHash, EraId, Timestamp, ValidatorId},
};

pub(crate) use test_clock::TestClock;

/// The chainspec shipped in `resources/local`.
pub(crate) const LOCAL_CHAINSPEC: &str = include_str!("../../resources/local/chainspec.toml");

/// The random number generator used in tests.
pub(crate) type TestRng = ChaCha8Rng;

/// Returns the parsed example chainspec.
pub(crate) fn local_chainspec() -> Chainspec {
    Chainspec::from_toml(LOCAL_CHAINSPEC).expect("example chainspec should be valid")
}

/// Returns a deploy hash derived from a human-readable name.
pub(crate) fn named_deploy_hash(name: &str) -> DeployHash {
    DeployHash::new(Digest::hash(name.as_bytes()))
}

/// Returns a seeded random number generator, so failures can be reproduced.
pub(crate) fn test_rng(seed: u64) -> TestRng {
    TestRng::seed_from_u64(seed)
}

/// Returns a weight table from `(validator, weight)` pairs.
pub(crate) fn validator_weights(weights: &[(&str, u64)]) -> BTreeMap<ValidatorId, u64> {
    weights
        .iter()
        .map(|(id, weight)| (ValidatorId::from(*id), *weight))
        .collect()
}

/// Returns a block without deploys, with the given blocks as its parents.
pub(crate) fn test_block(
    creator: &str,
    era_id: EraId,
    timestamp: Timestamp,
    parents: &[BlockHash],
) -> Block {
    let mut header = BlockHeader::new(creator.into(), era_id, timestamp);
    header.parent_hashes = parents.iter().copied().collect();
    Block::new(header, vec![])
}
