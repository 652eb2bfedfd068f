use std::sync::Arc;

use super::{entropy::EntropySeed, era_clock::Era, switch_block_voting::SwitchBlockVoting};
use crate::{
    components::consensus::highway_core::validators::Validators,
    types::{chainspec::VotingPeriod, EraId, ValidatorId},
};

/// An era the engine has started: its boundaries, seed, validator set and switch block voting.
///
/// Everything but the voting state is fixed when the era starts. The weight table is never
/// changed in place; the next era gets a new one.
#[derive(Debug)]
pub(crate) struct ActiveEra {
    era: Era,
    seed: EntropySeed,
    validators: Arc<Validators<ValidatorId>>,
    pub(super) voting: SwitchBlockVoting,
}

impl ActiveEra {
    pub(crate) fn new(
        era: Era,
        seed: EntropySeed,
        validators: Arc<Validators<ValidatorId>>,
        voting_period: VotingPeriod,
    ) -> Self {
        ActiveEra {
            era,
            seed,
            validators,
            voting: SwitchBlockVoting::new(era, voting_period),
        }
    }

    pub(crate) fn id(&self) -> EraId {
        self.era.id
    }

    pub(crate) fn era(&self) -> &Era {
        &self.era
    }

    pub(crate) fn seed(&self) -> EntropySeed {
        self.seed
    }

    pub(crate) fn validators(&self) -> &Arc<Validators<ValidatorId>> {
        &self.validators
    }
}
