//! The era supervisor runs the consensus core: it admits blocks into the DAG, answers finality
//! queries, decides each era's switch block and starts the next era with a fresh seed and weight
//! table.
//!
//! All state sits behind interior locks, so the supervisor can be shared between threads through
//! an [`EngineHandle`](super::EngineHandle). Locks are always taken in the order active eras,
//! then DAG state, then the finality detector's cache.

mod entropy;
mod era;
mod era_clock;
mod switch_block_voting;

use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use prometheus::Registry;
use tracing::{debug, info};

use crate::{
    components::{
        block_validator::BlockValidator,
        consensus::{
            highway_core::{
                finality_detector::{FinalityDetector, Summit},
                state::State,
                validators::Validators,
            },
            metrics::Metrics,
            traits::{Clock, ValidatorWeightsProvider},
            ConsensusEvent, Error, FinalityDecision,
        },
    },
    types::{chainspec::VotingPeriod, Block, BlockHash, Chainspec, EraId, Timestamp, ValidatorId},
};

pub(crate) use self::switch_block_voting::VotingState;
pub use self::{
    entropy::{EntropyError, EntropySeed},
    era_clock::{Era, EraClock, TimeWindow},
};
use self::{entropy::EntropyCollector, era::ActiveEra};

/// The consensus engine.
pub struct EraSupervisor {
    era_clock: EraClock,
    voting_period: VotingPeriod,
    block_validator: BlockValidator,
    clock: Arc<dyn Clock>,
    weights_provider: Arc<dyn ValidatorWeightsProvider>,
    active_eras: RwLock<ActiveEras>,
    state: RwLock<State>,
    finality_detector: FinalityDetector,
    entropy: EntropyCollector,
    metrics: Metrics,
    shut_down: AtomicBool,
}

impl Debug for EraSupervisor {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        let active_eras = self.active_eras.read();
        formatter
            .debug_struct("EraSupervisor")
            .field("current_era", &active_eras.current.id())
            .field("seed", &active_eras.current.seed())
            .field("active_eras", &active_eras.by_id.keys().collect::<Vec<_>>())
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish()
    }
}

impl EraSupervisor {
    /// Creates a new engine and starts the genesis era.
    ///
    /// The chainspec is validated first; an invalid one is a fatal error.
    pub fn new(
        chainspec: Chainspec,
        clock: Arc<dyn Clock>,
        weights_provider: Arc<dyn ValidatorWeightsProvider>,
        registry: &Registry,
    ) -> Result<Self, Error> {
        chainspec.validate()?;
        let era_clock = EraClock::new(&chainspec.highway_config);
        let entropy = EntropyCollector::new(&chainspec);
        let metrics = Metrics::new(registry)?;

        let genesis_era = era_clock.era(EraId::new(0));
        let seed = entropy.collect_without_blocks(genesis_era.id);
        let validators = Self::validators_for(weights_provider.as_ref(), genesis_era.id, &seed)?;
        let mut state = State::new();
        state.start_era(genesis_era.id, Arc::clone(&validators), genesis_era.end_time);
        let voting_period = era_clock.voting_period();
        let active_eras = ActiveEras::new(ActiveEra::new(
            genesis_era,
            seed,
            validators,
            voting_period,
        ));
        metrics.current_era.set(0);
        info!(era = %genesis_era, %seed, "starting genesis era");

        Ok(EraSupervisor {
            era_clock,
            voting_period,
            block_validator: BlockValidator::new(&chainspec),
            clock,
            weights_provider,
            active_eras: RwLock::new(active_eras),
            state: RwLock::new(state),
            finality_detector: FinalityDetector::new(chainspec.highway_config.ftt),
            entropy,
            metrics,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Admits a block and appends it to the DAG, then advances the voting period and era.
    ///
    /// Rejected blocks leave the DAG unchanged. Appending a known block again is a no-op.
    pub fn add_block(&self, block: Block) -> Result<Vec<ConsensusEvent>, Error> {
        self.check_running()?;
        let block_hash = *block.hash();
        let result = self.append(block);
        if let Err(ref error) = result {
            debug!(%block_hash, %error, "block not added");
            self.metrics.rejected_blocks.inc();
        }
        result?;
        self.advance(self.clock.now())
    }

    /// Returns the current summit of a block.
    pub fn summit_for(&self, block_hash: &BlockHash) -> Result<Summit, Error> {
        self.check_running()?;
        let state = self.state.read();
        let summit = self.finality_detector.summit_for(block_hash, &state)?;
        self.update_finalized_count();
        Ok(summit)
    }

    /// Returns whether the block has been found to be final.
    pub fn is_finalized(&self, block_hash: &BlockHash) -> bool {
        self.finality_detector.is_finalized(block_hash)
    }

    /// Returns the seed of an era, once it has been collected.
    pub fn entropy_seed(&self, era_id: EraId) -> Option<EntropySeed> {
        self.entropy.cached(era_id)
    }

    /// Returns the boundaries of an era. Eras that have not started have boundaries too.
    pub fn era(&self, era_id: EraId) -> Era {
        self.era_clock.era(era_id)
    }

    /// Returns the era that has most recently started.
    pub fn current_era(&self) -> Era {
        *self.current_active_era().era()
    }

    /// Returns the weight table of a started era.
    pub fn validator_weights(&self, era_id: EraId) -> Option<BTreeMap<ValidatorId, u64>> {
        let active_era = self.active_eras.read().get(era_id)?;
        let weights = active_era
            .validators()
            .enumerate()
            .map(|(_, validator)| (validator.id().clone(), validator.weight().0))
            .collect();
        Some(weights)
    }

    /// Returns the switch block decision of an era, once it has been made.
    pub fn switch_block_decision(&self, era_id: EraId) -> Option<FinalityDecision> {
        let active_era = self.active_eras.read().get(era_id)?;
        active_era.voting.decision()
    }

    /// Checks the voting deadlines and pending era transitions at the current time.
    ///
    /// Must be called regularly, e.g. at the voting end of the current era.
    pub fn handle_timer(&self) -> Result<Vec<ConsensusEvent>, Error> {
        self.check_running()?;
        self.advance(self.clock.now())
    }

    /// Stops the engine: in-flight summit computations are abandoned and further calls fail.
    ///
    /// Finality that has already been recorded stays recorded.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.finality_detector.cancel();
            info!(
                finalized_blocks = self.finality_detector.finalized_count(),
                "consensus engine shut down"
            );
        }
    }

    fn check_running(&self) -> Result<(), Error> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(Error::ShutDown);
        }
        Ok(())
    }

    fn append(&self, block: Block) -> Result<(), Error> {
        let mut state = self.state.write();
        self.block_validator.admit(&block, state.deploys())?;
        state.add_block(block)?;
        Ok(())
    }

    fn current_active_era(&self) -> Arc<ActiveEra> {
        Arc::clone(&self.active_eras.read().current)
    }

    /// Polls the current era's voting period and starts the following eras as long as possible.
    fn advance(&self, now: Timestamp) -> Result<Vec<ConsensusEvent>, Error> {
        let mut events = Vec::new();
        loop {
            let current = self.current_active_era();
            if let Some(decision) = self.poll_voting(&current, now)? {
                events.push(ConsensusEvent::Finalized(decision));
            }
            match self.try_start_next_era(&current, now)? {
                Some(event) => events.push(event),
                None => break,
            }
        }
        self.update_finalized_count();
        Ok(events)
    }

    fn poll_voting(
        &self,
        active_era: &ActiveEra,
        now: Timestamp,
    ) -> Result<Option<FinalityDecision>, Error> {
        if now < active_era.era().voting_start
            || active_era.voting.state() != VotingState::Open
        {
            return Ok(None);
        }
        let era_id = active_era.id();
        let candidates = match (self.voting_period, active_era.era().voting_end) {
            (VotingPeriod::Duration(_), Some(voting_end)) => {
                if now < voting_end {
                    return Ok(None);
                }
                // The decision only depends on the blocks dated within the voting period, no
                // matter how late the deadline is noticed.
                let snapshot = self.state.read().dated_until(voting_end)?;
                snapshot
                    .blocks_in_era(era_id)
                    .filter(|block| block.is_switch_block())
                    .map(|block| {
                        self.finality_detector
                            .summit_in_snapshot(block.hash(), &snapshot)
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            _ => {
                let state = self.state.read();
                state
                    .blocks_in_era(era_id)
                    .filter(|block| block.is_switch_block())
                    .map(|block| self.finality_detector.summit_for(block.hash(), &state))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        let decision = active_era.voting.poll(now, &candidates);
        if let Some(ref decision) = decision {
            self.metrics.switch_block_decided(decision.confidence);
        }
        Ok(decision)
    }

    /// Starts the era after `current` if its switch block is decided and the next seed can be
    /// collected. Only one caller can make the transition.
    fn try_start_next_era(
        &self,
        current: &ActiveEra,
        now: Timestamp,
    ) -> Result<Option<ConsensusEvent>, Error> {
        if !matches!(current.voting.state(), VotingState::Decided(_)) {
            return Ok(None);
        }
        let next_era = self.era_clock.era(current.id().successor());
        let seed = {
            let state = self.state.read();
            match self.entropy.collect(next_era.id, &state, now) {
                Ok(seed) => seed,
                Err(error) => {
                    debug!(%error, "postponing era transition");
                    return Ok(None);
                }
            }
        };
        let validators = Self::validators_for(self.weights_provider.as_ref(), next_era.id, &seed)?;

        let mut active_eras = self.active_eras.write();
        if active_eras.by_id.contains_key(&next_era.id) || current.voting.close().is_none() {
            return Ok(None);
        }
        self.state
            .write()
            .start_era(next_era.id, Arc::clone(&validators), next_era.end_time);
        active_eras.insert(ActiveEra::new(
            next_era,
            seed,
            validators,
            self.voting_period,
        ));
        self.metrics.current_era.set(next_era.id.value() as i64);
        info!(
            old_era_id = %current.id(),
            era = %next_era,
            %seed,
            "starting next era"
        );
        Ok(Some(ConsensusEvent::EraTransition {
            old_era_id: current.id(),
            new_era_id: next_era.id,
            entropy_seed: seed,
        }))
    }

    fn validators_for(
        weights_provider: &dyn ValidatorWeightsProvider,
        era_id: EraId,
        seed: &EntropySeed,
    ) -> Result<Arc<Validators<ValidatorId>>, Error> {
        let weights = weights_provider.validator_weights(era_id, seed);
        Validators::from_weights(weights)
            .map(Arc::new)
            .map_err(|source| Error::Weights { era_id, source })
    }

    fn update_finalized_count(&self) {
        self.metrics
            .finalized_block_count
            .set(self.finality_detector.finalized_count() as i64);
    }
}

/// The eras started so far.
#[derive(Debug)]
struct ActiveEras {
    /// The most recently started era.
    current: Arc<ActiveEra>,
    by_id: BTreeMap<EraId, Arc<ActiveEra>>,
}

impl ActiveEras {
    fn new(genesis_era: ActiveEra) -> Self {
        let current = Arc::new(genesis_era);
        let mut by_id = BTreeMap::new();
        by_id.insert(current.id(), Arc::clone(&current));
        ActiveEras { current, by_id }
    }

    fn get(&self, era_id: EraId) -> Option<Arc<ActiveEra>> {
        self.by_id.get(&era_id).cloned()
    }

    /// Adds a newly started era, which becomes the current one.
    fn insert(&mut self, active_era: ActiveEra) {
        let active_era = Arc::new(active_era);
        self.by_id.insert(active_era.id(), Arc::clone(&active_era));
        self.current = active_era;
    }
}
