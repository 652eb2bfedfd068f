//! # Era consensus core
//!
//! This crate contains the era-based consensus core of a proof-of-stake node: the era lifecycle
//! (booking block, key block, entropy collection, voting period and switch block), the
//! summit-based finality detector and the deploy and block admission rules that gate which blocks
//! may enter the DAG the detector analyzes.
//!
//! ## Application structure
//!
//! The engine is the [`EraSupervisor`](components::consensus::EraSupervisor). It is usually
//! reached through an [`EngineHandle`](components::consensus::EngineHandle), which callers take
//! as an explicit dependency.

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_qualifications
)]

pub mod components;
pub mod crypto;
pub mod logging;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
pub mod utils;

pub use components::{
    block_validator::{BlockRejection, BlockTotals, BlockValidator},
    consensus::{
        Clock, ConsensusEvent, EngineHandle, EntropySeed, Era, EraSupervisor,
        Error as ConsensusError, FinalityConfidence, FinalityDecision, Summit, SystemClock,
        ValidatorWeightsProvider,
    },
    deploy_acceptor::{DeployAcceptor, DeployIndex, DeployRejection},
    gas_cost_model::{GasCostModel, StackHeightExceeded},
};
pub use types::{
    chainspec::{Chainspec, Error as ChainspecError},
    Block, BlockHash, BlockHeader, Deploy, DeployHash, DeployHeader, EraId, Instruction,
    OpcodeClass, TimeDiff, Timestamp, ValidatorId,
};
