//! Common types used across multiple components.

mod block;
pub mod chainspec;
mod deploy;
mod era_id;
mod timestamp;

pub use block::{Block, BlockHash, BlockHeader, ValidatorId};
pub use chainspec::Chainspec;
pub use datasize::DataSize;
pub use deploy::{Deploy, DeployHash, DeployHeader, Instruction, OpcodeClass};
pub use era_id::EraId;
pub use timestamp::{TimeDiff, Timestamp};
