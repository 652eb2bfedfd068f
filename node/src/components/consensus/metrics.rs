use prometheus::{IntCounter, IntGauge, Registry};

use super::FinalityConfidence;
use crate::utils::registered_metric::{RegisteredMetric, RegistryExt};

/// Metrics to track consensus.
#[derive(Debug)]
pub(super) struct Metrics {
    /// The current era.
    pub(super) current_era: RegisteredMetric<IntGauge>,
    /// Number of blocks found to be final so far.
    pub(super) finalized_block_count: RegisteredMetric<IntGauge>,
    /// Switch blocks decided because they reached a summit.
    switch_blocks_by_summit: RegisteredMetric<IntCounter>,
    /// Switch blocks decided at the voting end without being final.
    switch_blocks_by_timeout: RegisteredMetric<IntCounter>,
    /// Blocks rejected by admission or by the DAG.
    pub(super) rejected_blocks: RegisteredMetric<IntCounter>,
}

impl Metrics {
    pub(super) fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let current_era =
            registry.new_int_gauge("consensus_current_era", "the current era in consensus")?;
        let finalized_block_count = registry.new_int_gauge(
            "consensus_finalized_block_count",
            "the number of blocks finalized so far",
        )?;
        let switch_blocks_by_summit = registry.new_int_counter(
            "consensus_switch_blocks_by_summit",
            "number of switch blocks decided by reaching a summit",
        )?;
        let switch_blocks_by_timeout = registry.new_int_counter(
            "consensus_switch_blocks_by_timeout",
            "number of switch blocks decided by the voting period timing out",
        )?;
        let rejected_blocks = registry.new_int_counter(
            "consensus_rejected_blocks",
            "number of blocks that were not added to the DAG",
        )?;

        Ok(Metrics {
            current_era,
            finalized_block_count,
            switch_blocks_by_summit,
            switch_blocks_by_timeout,
            rejected_blocks,
        })
    }

    /// Records a switch block decision.
    pub(super) fn switch_block_decided(&self, confidence: FinalityConfidence) {
        match confidence {
            FinalityConfidence::Summit => self.switch_blocks_by_summit.inc(),
            FinalityConfidence::Timeout => self.switch_blocks_by_timeout.inc(),
        }
    }

    #[cfg(test)]
    pub(super) fn switch_block_counts(&self) -> (u64, u64) {
        (
            self.switch_blocks_by_summit.get(),
            self.switch_blocks_by_timeout.get(),
        )
    }
}
