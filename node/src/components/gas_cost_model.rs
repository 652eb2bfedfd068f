//! The gas cost model of deploy session code.
//!
//! All arithmetic is done on integers, so every node charges bit-identical amounts. The per-opcode
//! table entries are scaled by `opcodes-multiplier / opcodes-divisor`, rounding up; memory growth
//! and memory copy are charged per page and per byte without scaling.

use datasize::DataSize;
use thiserror::Error;

use crate::{
    types::{chainspec::WasmCosts, Deploy, Instruction, OpcodeClass},
    utils::div_round_up,
};

/// A deploy declares a stack deeper than the configured limit.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("declared stack height {got} exceeds the maximum of {max}")]
pub struct StackHeightExceeded {
    /// The configured maximum stack height.
    pub max: u32,
    /// The stack height declared by the deploy.
    pub got: u32,
}

/// Maps opcode classes to their gas cost.
#[derive(Clone, Copy, DataSize, Debug)]
pub struct GasCostModel {
    costs: WasmCosts,
}

impl GasCostModel {
    /// Creates a cost model from the chainspec's cost table.
    pub fn new(costs: WasmCosts) -> Self {
        GasCostModel { costs }
    }

    /// Returns the underlying cost table.
    pub fn costs(&self) -> &WasmCosts {
        &self.costs
    }

    /// Returns the cost of a single instruction executed on fresh memory.
    ///
    /// For `MemGrow` the operand is the number of pages, for `MemCopy` the number of bytes; the
    /// operand is ignored for all other classes.
    pub fn cost(&self, class: OpcodeClass, operand_size: u64) -> u64 {
        let mut profile = CostProfile::default();
        self.add_to_profile(&mut profile, Instruction::with_operand(class, operand_size));
        self.profile_cost(&profile)
    }

    /// Returns the total cost of a deploy's session code.
    ///
    /// The opcode table entries of all instructions are summed before scaling, so the result does
    /// not depend on how the code is split into instructions. Memory growth is free until the
    /// cumulative number of grown pages exceeds `mem-initial-pages`.
    pub fn deploy_cost(&self, deploy: &Deploy) -> u64 {
        let mut profile = CostProfile::default();
        for instruction in deploy.session() {
            self.add_to_profile(&mut profile, *instruction);
        }
        self.profile_cost(&profile)
    }

    /// Checks a declared stack height against `max-stack-height`.
    ///
    /// This is a static check performed before execution.
    pub fn check_stack_height(&self, declared: u32) -> Result<(), StackHeightExceeded> {
        if declared > self.costs.max_stack_height {
            return Err(StackHeightExceeded {
                max: self.costs.max_stack_height,
                got: declared,
            });
        }
        Ok(())
    }

    /// Returns the unscaled table entry of an opcode class.
    fn table_entry(&self, class: OpcodeClass) -> u64 {
        let regular = u64::from(self.costs.regular);
        let multiplier = match class {
            OpcodeClass::Regular => 1,
            OpcodeClass::Div => self.costs.div_multiplier,
            OpcodeClass::Mul => self.costs.mul_multiplier,
            OpcodeClass::Mem => self.costs.mem_multiplier,
            OpcodeClass::MemGrow | OpcodeClass::MemCopy => 0,
        };
        regular.saturating_mul(u64::from(multiplier))
    }

    fn add_to_profile(&self, profile: &mut CostProfile, instruction: Instruction) {
        match instruction.class {
            OpcodeClass::MemGrow => {
                let free_pages = u64::from(self.costs.mem_initial_pages);
                let before = profile.grown_pages.max(free_pages);
                profile.grown_pages = profile.grown_pages.saturating_add(instruction.operand_size);
                let charged_pages = profile.grown_pages.saturating_sub(before);
                profile.memory = profile.memory.saturating_add(
                    charged_pages.saturating_mul(u64::from(self.costs.mem_grow_per_page)),
                );
            }
            OpcodeClass::MemCopy => {
                profile.memory = profile.memory.saturating_add(
                    instruction
                        .operand_size
                        .saturating_mul(u64::from(self.costs.mem_copy_per_byte)),
                );
            }
            class => {
                profile.opcode_units = profile
                    .opcode_units
                    .saturating_add(self.table_entry(class));
            }
        }
    }

    fn profile_cost(&self, profile: &CostProfile) -> u64 {
        let scaled = u128::from(profile.opcode_units)
            * u128::from(self.costs.opcodes_multiplier);
        let opcodes = div_round_up(scaled, u128::from(self.costs.opcodes_divisor))
            .map_or(u64::MAX, |cost| cost.min(u128::from(u64::MAX)) as u64);
        opcodes.saturating_add(profile.memory)
    }
}

/// Running totals while charging a sequence of instructions.
#[derive(Default, Debug)]
struct CostProfile {
    /// Sum of the unscaled opcode table entries.
    opcode_units: u64,
    /// Cumulative number of pages grown so far.
    grown_pages: u64,
    /// Memory growth and copy charges.
    memory: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeployHeader, TimeDiff, Timestamp};

    fn unscaled_costs() -> WasmCosts {
        WasmCosts {
            opcodes_multiplier: 1,
            opcodes_divisor: 1,
            ..WasmCosts::default()
        }
    }

    fn deploy_with(session: Vec<Instruction>) -> Deploy {
        let header = DeployHeader::new(Timestamp::from(0), TimeDiff::from_seconds(60));
        Deploy::new(header, session)
    }

    #[test]
    fn should_apply_multipliers() {
        let model = GasCostModel::new(unscaled_costs());
        assert_eq!(model.cost(OpcodeClass::Regular, 0), 1);
        assert_eq!(model.cost(OpcodeClass::Div, 0), 16);
        assert_eq!(model.cost(OpcodeClass::Mul, 0), 4);
        assert_eq!(model.cost(OpcodeClass::Mem, 0), 2);
        assert_eq!(model.cost(OpcodeClass::MemCopy, 100), 100);
    }

    #[test]
    fn should_scale_opcodes_rounding_up() {
        // The defaults scale opcode entries by 3/8.
        let model = GasCostModel::new(WasmCosts::default());
        assert_eq!(model.cost(OpcodeClass::Regular, 0), 1);
        assert_eq!(model.cost(OpcodeClass::Div, 0), 6);
        assert_eq!(model.cost(OpcodeClass::Mul, 0), 2);
        assert_eq!(model.cost(OpcodeClass::Mem, 0), 1);

        // Eight regular opcodes are three units, not eight rounded-up ones.
        let deploy = deploy_with(vec![Instruction::new(OpcodeClass::Regular); 8]);
        assert_eq!(model.deploy_cost(&deploy), 3);
    }

    #[test]
    fn should_charge_memory_growth_beyond_initial_pages() {
        let costs = WasmCosts {
            mem_initial_pages: 4,
            mem_grow_per_page: 10,
            ..unscaled_costs()
        };
        let model = GasCostModel::new(costs);
        assert_eq!(model.cost(OpcodeClass::MemGrow, 4), 0);
        assert_eq!(model.cost(OpcodeClass::MemGrow, 6), 20);

        // Growth is cumulative across instructions.
        let deploy = deploy_with(vec![
            Instruction::with_operand(OpcodeClass::MemGrow, 3),
            Instruction::with_operand(OpcodeClass::MemGrow, 3),
            Instruction::new(OpcodeClass::Regular),
        ]);
        assert_eq!(model.deploy_cost(&deploy), 2 * 10 + 1);
    }

    #[test]
    fn should_saturate_instead_of_overflowing() {
        let costs = WasmCosts {
            mem_copy_per_byte: u32::MAX,
            ..unscaled_costs()
        };
        let model = GasCostModel::new(costs);
        assert_eq!(model.cost(OpcodeClass::MemCopy, u64::MAX), u64::MAX);
    }

    #[test]
    fn should_check_stack_height_statically() {
        let model = GasCostModel::new(WasmCosts::default());
        assert_eq!(model.check_stack_height(65_536), Ok(()));
        assert_eq!(
            model.check_stack_height(65_537),
            Err(StackHeightExceeded {
                max: 65_536,
                got: 65_537
            })
        );
    }
}
