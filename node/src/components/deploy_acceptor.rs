#[cfg(test)]
mod tests;

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    hash::BuildHasher,
};

use datasize::DataSize;
use thiserror::Error;
use tracing::debug;

use crate::{
    components::gas_cost_model::{GasCostModel, StackHeightExceeded},
    types::{chainspec::DeployConfig, Chainspec, Deploy, DeployHash, TimeDiff, Timestamp},
};

/// The reason a deploy was not admitted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeployRejection {
    /// The deploy is older than its own time to live or than the chainspec's maximum.
    #[error("deploy issued at {issued} is expired at {current_time} (time to live {ttl})")]
    Expired {
        /// When the deploy was issued.
        issued: Timestamp,
        /// The time the deploy was checked against.
        current_time: Timestamp,
        /// The smaller of the declared and the maximum time to live.
        ttl: TimeDiff,
    },
    /// The deploy declares more dependencies than allowed.
    #[error("deploy has {got} dependencies, the maximum is {max}")]
    TooManyDependencies {
        /// The configured maximum.
        max: u8,
        /// The number of declared dependencies.
        got: usize,
    },
    /// A dependency is neither known nor included in the same block.
    #[error("unknown dependency {dependency}")]
    UnknownDependency {
        /// The first dependency that did not resolve.
        dependency: DeployHash,
    },
    /// The deploy depends on itself through deploys in the same block.
    #[error("cyclic dependency through {dependency}")]
    CyclicDependency {
        /// The direct dependency through which the cycle runs.
        dependency: DeployHash,
    },
    /// The deploy declares a time to live above the chainspec's maximum.
    #[error("time to live {got} exceeds the maximum of {max_ttl}")]
    ExcessiveTimeToLive {
        /// The configured maximum.
        max_ttl: TimeDiff,
        /// The declared time to live.
        got: TimeDiff,
    },
    /// The deploy's declared stack height is too high.
    #[error(transparent)]
    StackHeightExceeded(#[from] StackHeightExceeded),
}

/// An index of the deploys that are already known to the node.
///
/// Dependencies are resolved against it without fetching or blocking.
pub trait DeployIndex {
    /// Returns whether the deploy with the given hash is known.
    fn contains_deploy(&self, deploy_hash: &DeployHash) -> bool;
}

impl<S: BuildHasher> DeployIndex for HashSet<DeployHash, S> {
    fn contains_deploy(&self, deploy_hash: &DeployHash) -> bool {
        self.contains(deploy_hash)
    }
}

impl DeployIndex for BTreeSet<DeployHash> {
    fn contains_deploy(&self, deploy_hash: &DeployHash) -> bool {
        self.contains(deploy_hash)
    }
}

impl<V, S: BuildHasher> DeployIndex for HashMap<DeployHash, V, S> {
    fn contains_deploy(&self, deploy_hash: &DeployHash) -> bool {
        self.contains_key(deploy_hash)
    }
}

impl<V> DeployIndex for BTreeMap<DeployHash, V> {
    fn contains_deploy(&self, deploy_hash: &DeployHash) -> bool {
        self.contains_key(deploy_hash)
    }
}

/// Validates single deploys against the chainspec's deploy limits.
///
/// Admission has no side effects: the same inputs always yield the same verdict.
#[derive(Clone, DataSize, Debug)]
pub struct DeployAcceptor {
    deploy_config: DeployConfig,
    gas_cost_model: GasCostModel,
}

impl DeployAcceptor {
    /// Creates a new deploy acceptor.
    pub fn new(chainspec: &Chainspec) -> Self {
        DeployAcceptor {
            deploy_config: chainspec.deploy_config,
            gas_cost_model: GasCostModel::new(chainspec.wasm_costs),
        }
    }

    /// Returns the gas cost model used for the static checks.
    pub fn gas_cost_model(&self) -> &GasCostModel {
        &self.gas_cost_model
    }

    /// Admits a deploy on its own, e.g. when received from a client.
    pub fn admit<I>(
        &self,
        deploy: &Deploy,
        current_time: Timestamp,
        known_deploys: &I,
    ) -> Result<(), DeployRejection>
    where
        I: DeployIndex + ?Sized,
    {
        self.admit_in_block(deploy, current_time, known_deploys, &[])
    }

    /// Admits a deploy as part of a block containing `block_deploys`.
    ///
    /// Dependencies may resolve to deploys of the same block, but the dependency relation among
    /// them must be acyclic. The checks run in a fixed order and the first failure is returned.
    pub fn admit_in_block<I>(
        &self,
        deploy: &Deploy,
        current_time: Timestamp,
        known_deploys: &I,
        block_deploys: &[Deploy],
    ) -> Result<(), DeployRejection>
    where
        I: DeployIndex + ?Sized,
    {
        let result = self.check(deploy, current_time, known_deploys, block_deploys);
        if let Err(ref rejection) = result {
            debug!(deploy_hash = %deploy.hash(), %rejection, "deploy rejected");
        }
        result
    }

    fn check<I>(
        &self,
        deploy: &Deploy,
        current_time: Timestamp,
        known_deploys: &I,
        block_deploys: &[Deploy],
    ) -> Result<(), DeployRejection>
    where
        I: DeployIndex + ?Sized,
    {
        let max_ttl = self.deploy_config.max_ttl;
        let ttl = deploy.ttl().min(max_ttl);
        if current_time.saturating_diff(deploy.timestamp()) > ttl {
            return Err(DeployRejection::Expired {
                issued: deploy.timestamp(),
                current_time,
                ttl,
            });
        }

        let max_dependencies = self.deploy_config.max_dependencies;
        if deploy.dependencies().len() > usize::from(max_dependencies) {
            return Err(DeployRejection::TooManyDependencies {
                max: max_dependencies,
                got: deploy.dependencies().len(),
            });
        }

        let in_block: HashMap<&DeployHash, &Deploy> = block_deploys
            .iter()
            .map(|block_deploy| (block_deploy.hash(), block_deploy))
            .collect();
        if let Some(dependency) = deploy.dependencies().iter().find(|dependency| {
            !known_deploys.contains_deploy(dependency) && !in_block.contains_key(dependency)
        }) {
            return Err(DeployRejection::UnknownDependency {
                dependency: *dependency,
            });
        }

        if let Some(dependency) = find_cycle(deploy, &in_block) {
            return Err(DeployRejection::CyclicDependency { dependency });
        }

        if deploy.ttl() > max_ttl {
            return Err(DeployRejection::ExcessiveTimeToLive {
                max_ttl,
                got: deploy.ttl(),
            });
        }

        self.gas_cost_model
            .check_stack_height(deploy.header().max_stack_height)?;
        Ok(())
    }
}

/// Returns the direct dependency of `deploy` from which `deploy` itself is reachable, following
/// only dependencies included in the same block.
fn find_cycle(deploy: &Deploy, in_block: &HashMap<&DeployHash, &Deploy>) -> Option<DeployHash> {
    deploy.dependencies().iter().copied().find(|start| {
        let mut visited = HashSet::new();
        let mut to_visit = vec![*start];
        while let Some(hash) = to_visit.pop() {
            if hash == *deploy.hash() {
                return true;
            }
            if !visited.insert(hash) {
                continue;
            }
            if let Some(next) = in_block.get(&hash) {
                to_visit.extend(next.dependencies().iter().copied());
            }
        }
        false
    })
}
