use datasize::DataSize;

use crate::{
    components::consensus::highway_core::{state::Panorama, validators::ValidatorIndex},
    types::BlockHash,
};

/// The vote a block casts on behalf of its creator.
#[derive(Clone, DataSize, Debug, Eq, PartialEq)]
pub(crate) struct Vote {
    /// The latest votes and faults the creator observed through the block's citations.
    pub(crate) panorama: Panorama,
    /// The number of earlier votes by the same creator in this era.
    pub(crate) seq_number: u64,
    /// The validator who created the block.
    pub(crate) creator: ValidatorIndex,
    /// The creator's previous vote, if any.
    pub(crate) previous: Option<BlockHash>,
}

impl Vote {
    /// Returns the creator's previous vote.
    pub(crate) fn previous(&self) -> Option<&BlockHash> {
        self.previous.as_ref()
    }
}
