use thiserror::Error;

use super::{AddBlockError, EntropyError, FinalityError, WeightsError};
use crate::{
    components::block_validator::BlockRejection,
    types::{chainspec, EraId},
};

/// An error returned by the consensus engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The chainspec failed validation.
    #[error(transparent)]
    Chainspec(#[from] chainspec::Error),

    /// The weights provider returned an unusable table.
    #[error("invalid validator weights for {era_id}: {source}")]
    Weights {
        /// The era the table is for.
        era_id: EraId,
        /// What is wrong with it.
        #[source]
        source: WeightsError,
    },

    /// The block failed admission.
    #[error(transparent)]
    BlockRejected(#[from] BlockRejection),

    /// The block could not be appended to the DAG.
    #[error(transparent)]
    AddBlock(#[from] AddBlockError),

    /// A summit could not be computed.
    #[error(transparent)]
    Finality(#[from] FinalityError),

    /// An era seed could not be collected.
    #[error(transparent)]
    Entropy(#[from] EntropyError),

    /// The metrics could not be registered.
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),

    /// The engine has been shut down.
    #[error("consensus engine is shut down")]
    ShutDown,
}
