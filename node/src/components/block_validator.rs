//! Block validation
//!
//! The block validator checks a candidate block's aggregate limits and the admissibility of every
//! deploy it includes, before the block is allowed into the DAG. A block is either admitted as a
//! whole or rejected with the first violated limit.


use std::collections::HashSet;

use datasize::DataSize;
use thiserror::Error;
use tracing::debug;

use crate::{
    components::{
        deploy_acceptor::{DeployAcceptor, DeployIndex, DeployRejection},
        gas_cost_model::GasCostModel,
    },
    types::{chainspec::DeployConfig, Block, Chainspec, DeployHash},
};

/// The reason a block was not admitted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BlockRejection {
    /// The same deploy is included more than once.
    #[error("deploy {deploy_hash} is included more than once")]
    DuplicateDeploy {
        /// The duplicated deploy.
        deploy_hash: DeployHash,
    },
    /// An included deploy failed deploy admission.
    #[error("invalid deploy {deploy_hash}: {rejection}")]
    InvalidDeploy {
        /// The offending deploy.
        deploy_hash: DeployHash,
        /// Why it was rejected.
        rejection: DeployRejection,
    },
    /// The serialized block is larger than `max-block-size-bytes`.
    #[error("block size of {got} bytes exceeds the maximum of {max}")]
    BlockSize {
        /// The configured maximum.
        max: u32,
        /// The serialized size of the block.
        got: u64,
    },
    /// The deploys' total gas cost is higher than `max-block-cost`.
    #[error("block gas cost of {got} exceeds the limit of {max}")]
    GasLimit {
        /// The configured limit.
        max: u64,
        /// The total gas cost of the block's deploys.
        got: u64,
    },
    /// The block could not be serialized to determine its size.
    #[error("could not serialize block: {0}")]
    Serialization(String),
}

/// The aggregates of an admitted block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockTotals {
    /// The serialized size in bytes.
    pub size_bytes: u64,
    /// The total gas cost of the included deploys.
    pub gas_cost: u64,
}

/// Validates candidate blocks against the era-wide limits.
#[derive(Clone, DataSize, Debug)]
pub struct BlockValidator {
    deploy_config: DeployConfig,
    deploy_acceptor: DeployAcceptor,
    gas_cost_model: GasCostModel,
}

impl BlockValidator {
    /// Creates a new block validator.
    pub fn new(chainspec: &Chainspec) -> Self {
        BlockValidator {
            deploy_config: chainspec.deploy_config,
            deploy_acceptor: DeployAcceptor::new(chainspec),
            gas_cost_model: GasCostModel::new(chainspec.wasm_costs),
        }
    }

    /// Admits or rejects a candidate block.
    ///
    /// Every deploy is checked against the block's own timestamp, with dependencies resolving to
    /// `known_deploys` or to deploys of the same block.
    pub fn admit<I>(&self, block: &Block, known_deploys: &I) -> Result<BlockTotals, BlockRejection>
    where
        I: DeployIndex + ?Sized,
    {
        let result = self.check(block, known_deploys);
        match result {
            Ok(totals) => debug!(
                block_hash = %block.hash(),
                size_bytes = totals.size_bytes,
                gas_cost = totals.gas_cost,
                "block admitted"
            ),
            Err(ref rejection) => debug!(block_hash = %block.hash(), %rejection, "block rejected"),
        }
        result
    }

    fn check<I>(&self, block: &Block, known_deploys: &I) -> Result<BlockTotals, BlockRejection>
    where
        I: DeployIndex + ?Sized,
    {
        let mut seen = HashSet::new();
        if let Some(duplicate) = block
            .deploys()
            .iter()
            .find(|deploy| !seen.insert(*deploy.hash()))
        {
            return Err(BlockRejection::DuplicateDeploy {
                deploy_hash: *duplicate.hash(),
            });
        }

        for deploy in block.deploys() {
            self.deploy_acceptor
                .admit_in_block(deploy, block.timestamp(), known_deploys, block.deploys())
                .map_err(|rejection| BlockRejection::InvalidDeploy {
                    deploy_hash: *deploy.hash(),
                    rejection,
                })?;
        }

        let size_bytes = bincode::serialized_size(block)
            .map_err(|error| BlockRejection::Serialization(error.to_string()))?;
        let max_size = self.deploy_config.max_block_size_bytes;
        if size_bytes > u64::from(max_size) {
            return Err(BlockRejection::BlockSize {
                max: max_size,
                got: size_bytes,
            });
        }

        let gas_cost = block
            .deploys()
            .iter()
            .map(|deploy| self.gas_cost_model.deploy_cost(deploy))
            .fold(0u64, u64::saturating_add);
        if let Some(max) = self.deploy_config.block_gas_limit() {
            if gas_cost > max {
                return Err(BlockRejection::GasLimit { max, got: gas_cost });
            }
        }

        Ok(BlockTotals {
            size_bytes,
            gas_cost,
        })
    }
}
