use datasize::DataSize;
use serde::{Deserialize, Serialize};

/// The gas cost table for the opcodes of a deploy's session code.
///
/// The per-opcode entries (`regular` and the three multipliers) are scaled by
/// `opcodes-multiplier / opcodes-divisor` before being charged.
#[derive(Copy, Clone, DataSize, PartialEq, Eq, Serialize, Deserialize, Debug)]
// Disallow unknown fields to ensure config files and command-line overrides contain valid keys.
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct WasmCosts {
    /// Default opcode cost.
    pub regular: u32,
    /// Div operations multiplier.
    pub div_multiplier: u32,
    /// Mul operations multiplier.
    pub mul_multiplier: u32,
    /// Memory (load/store) operations multiplier.
    pub mem_multiplier: u32,
    /// Amount of free memory (in 64kb pages) each contract can use for stack.
    pub mem_initial_pages: u32,
    /// Grow memory cost, per page (64kb).
    pub mem_grow_per_page: u32,
    /// Memory copy cost, per byte.
    pub mem_copy_per_byte: u32,
    /// Max stack height (native WebAssembly stack limiter).
    pub max_stack_height: u32,
    /// Cost of wasm opcode is calculated as `TABLE_ENTRY * opcodes_multiplier / opcodes_divisor`.
    pub opcodes_multiplier: u32,
    /// Cost of wasm opcode is calculated as `TABLE_ENTRY * opcodes_multiplier / opcodes_divisor`.
    pub opcodes_divisor: u32,
}

impl Default for WasmCosts {
    fn default() -> Self {
        WasmCosts {
            regular: 1,
            div_multiplier: 16,
            mul_multiplier: 4,
            mem_multiplier: 2,
            mem_initial_pages: 4096,
            mem_grow_per_page: 8192,
            mem_copy_per_byte: 1,
            max_stack_height: 64 * 1024,
            opcodes_multiplier: 3,
            opcodes_divisor: 8,
        }
    }
}
