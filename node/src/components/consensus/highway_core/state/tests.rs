use std::sync::Arc;

use super::*;
use crate::{
    testing::{test_block, validator_weights},
    types::{BlockHeader, TimeDiff, Timestamp},
};

const ERA: EraId = EraId::new(0);

fn era_end() -> Timestamp {
    Timestamp::from(100)
}

fn new_state() -> State {
    let validators =
        Validators::from_weights(validator_weights(&[("alice", 3), ("bob", 4), ("carol", 5)]))
            .expect("valid weights");
    let mut state = State::new();
    assert!(state.start_era(ERA, Arc::new(validators), era_end()));
    state
}

fn add(state: &mut State, creator: &str, timestamp: u64, parents: &[BlockHash]) -> BlockHash {
    let block = test_block(creator, ERA, Timestamp::from(timestamp), parents);
    let hash = *block.hash();
    assert_eq!(
        state.add_block(block),
        Ok(AddOutcome::Added {
            new_equivocator: false
        })
    );
    hash
}

fn index(state: &State, id: &str) -> ValidatorIndex {
    state
        .era_votes(ERA)
        .and_then(|era| era.validators().get_index(&ValidatorId::from(id)))
        .expect("validator should exist")
}

#[test]
fn should_track_heights_and_version() {
    let mut state = new_state();
    let a0 = add(&mut state, "alice", 1, &[]);
    let b0 = add(&mut state, "bob", 2, &[a0]);
    let c0 = add(&mut state, "carol", 3, &[a0]);
    let a1 = add(&mut state, "alice", 4, &[b0, c0]);
    assert_eq!(state.height(&a0), Some(0));
    assert_eq!(state.height(&b0), Some(1));
    assert_eq!(state.height(&a1), Some(2));
    assert_eq!(state.version(), 4);

    let duplicate = test_block("alice", ERA, Timestamp::from(1), &[]);
    assert_eq!(state.add_block(duplicate), Ok(AddOutcome::Duplicate));
    assert_eq!(state.version(), 4);
}

#[test]
fn should_reject_invalid_blocks() {
    let mut state = new_state();
    let missing = test_block("alice", ERA, Timestamp::from(1), &[]);
    let orphan = test_block("bob", ERA, Timestamp::from(2), &[*missing.hash()]);
    assert_eq!(
        state.add_block(orphan),
        Err(AddBlockError::MissingDependency(*missing.hash()))
    );

    let stranger = test_block("mallory", ERA, Timestamp::from(2), &[]);
    assert_eq!(
        state.add_block(stranger),
        Err(AddBlockError::Creator {
            creator: "mallory".into(),
            era_id: ERA
        })
    );

    let next_era = test_block("alice", ERA.successor(), Timestamp::from(2), &[]);
    assert_eq!(
        state.add_block(next_era),
        Err(AddBlockError::UnknownEra {
            era_id: ERA.successor()
        })
    );
    assert_eq!(state.version(), 0);
}

#[test]
fn should_reject_citing_later_era() {
    let mut state = new_state();
    let validators = Validators::from_weights(validator_weights(&[("alice", 1)])).expect("valid");
    assert!(state.start_era(
        ERA.successor(),
        Arc::new(validators),
        Timestamp::MAX
    ));
    let replacement = Validators::from_weights(validator_weights(&[("bob", 1)])).expect("valid");
    assert!(!state.start_era(
        ERA.successor(),
        Arc::new(replacement),
        Timestamp::MAX
    ));

    let later = test_block("alice", ERA.successor(), Timestamp::from(1), &[]);
    let later_hash = *later.hash();
    assert!(state.add_block(later).is_ok());
    let earlier = test_block("bob", ERA, Timestamp::from(2), &[later_hash]);
    assert_eq!(
        state.add_block(earlier),
        Err(AddBlockError::LaterEra {
            cited: later_hash,
            cited_era: ERA.successor()
        })
    );
}

#[test]
fn should_reject_blocks_dated_out_of_order() {
    let mut state = new_state();
    let a0 = add(&mut state, "alice", 10, &[]);
    let b0 = add(&mut state, "bob", 10, &[a0]);

    let backdated = test_block("carol", ERA, Timestamp::from(9), &[b0]);
    assert_eq!(
        state.add_block(backdated),
        Err(AddBlockError::EarlierThanCited {
            cited: b0,
            cited_timestamp: Timestamp::from(10),
            timestamp: Timestamp::from(9),
        })
    );

    let at_era_end = test_block("carol", ERA, era_end(), &[b0]);
    assert_eq!(
        state.add_block(at_era_end),
        Err(AddBlockError::AfterEraEnd {
            era_id: ERA,
            end_time: era_end(),
            timestamp: era_end(),
        })
    );
    assert_eq!(state.version(), 2);

    let last = era_end() - TimeDiff::from_millis(1);
    assert!(state.add_block(test_block("carol", ERA, last, &[b0])).is_ok());
}

#[test]
fn should_replay_blocks_dated_until() {
    let mut state = new_state();
    let a0 = add(&mut state, "alice", 1, &[]);
    let b0 = add(&mut state, "bob", 2, &[a0]);
    let c0 = add(&mut state, "carol", 2, &[b0]);
    let a1 = add(&mut state, "alice", 3, &[c0]);

    let snapshot = state.dated_until(Timestamp::from(2)).expect("valid snapshot");
    assert_eq!(snapshot.version(), 3);
    assert!(snapshot.block(&c0).is_some());
    assert!(snapshot.block(&a1).is_none());
    assert_eq!(snapshot.height(&c0), state.height(&c0));
    let era = snapshot.era_votes(ERA).expect("era started");
    assert_eq!(
        era.panorama()[index(&snapshot, "carol")],
        Observation::Correct(c0)
    );
    assert_eq!(
        era.panorama()[index(&snapshot, "alice")],
        Observation::Correct(a0)
    );
    assert_eq!(state.dated_until(Timestamp::zero()).map(|s| s.version()), Ok(0));
}

#[test]
fn should_derive_panorama_from_citations() {
    let mut state = new_state();
    let a0 = add(&mut state, "alice", 1, &[]);
    let b0 = add(&mut state, "bob", 2, &[a0]);
    let mut header = BlockHeader::new("carol".into(), ERA, Timestamp::from(3));
    header.parent_hashes.insert(b0);
    let c0 = Block::new(header, vec![]);
    let c0_hash = *c0.hash();
    assert!(state.add_block(c0).is_ok());

    let era = state.era_votes(ERA).expect("era started");
    let vote = era.vote(&c0_hash).expect("vote exists");
    assert_eq!(vote.seq_number, 0);
    assert_eq!(vote.previous(), None);
    assert_eq!(vote.panorama[index(&state, "alice")], Observation::Correct(a0));
    assert_eq!(vote.panorama[index(&state, "bob")], Observation::Correct(b0));
    assert_eq!(vote.panorama[index(&state, "carol")], Observation::None);
    assert_eq!(era.panorama().iter_correct().count(), 3);
}

#[test]
fn should_number_votes_along_the_swimlane() {
    let mut state = new_state();
    let a0 = add(&mut state, "alice", 1, &[]);
    let a1 = add(&mut state, "alice", 2, &[a0]);
    let a2 = add(&mut state, "alice", 3, &[a1]);
    let era = state.era_votes(ERA).expect("era started");
    let swimlane: Vec<_> = era
        .swimlane(&a2)
        .map(|(hash, vote)| (*hash, vote.seq_number))
        .collect();
    assert_eq!(swimlane, vec![(a2, 2), (a1, 1), (a0, 0)]);
    assert!(!era.is_faulty(index(&state, "alice")));
}

#[test]
fn should_mark_equivocators_faulty_once() {
    let mut state = new_state();
    let a0 = add(&mut state, "alice", 1, &[]);
    add(&mut state, "alice", 2, &[a0]);
    let fork = test_block("alice", ERA, Timestamp::from(3), &[a0]);
    assert_eq!(
        state.add_block(fork),
        Ok(AddOutcome::Added {
            new_equivocator: true
        })
    );
    let another_fork = test_block("alice", ERA, Timestamp::from(4), &[]);
    assert_eq!(
        state.add_block(another_fork),
        Ok(AddOutcome::Added {
            new_equivocator: false
        })
    );
    let era = state.era_votes(ERA).expect("era started");
    assert!(era.is_faulty(index(&state, "alice")));
    assert_eq!(era.faulty_weight(), Weight(3));
}

#[test]
fn should_see_equivocation_through_citations() {
    let mut state = new_state();
    let a0 = add(&mut state, "alice", 1, &[]);
    let a1 = add(&mut state, "alice", 2, &[a0]);
    let a1_fork = test_block("alice", ERA, Timestamp::from(3), &[a0]);
    let a1_fork_hash = *a1_fork.hash();
    assert!(state.add_block(a1_fork).is_ok());
    let b0 = add(&mut state, "bob", 4, &[a1, a1_fork_hash]);
    let era = state.era_votes(ERA).expect("era started");
    let vote = era.vote(&b0).expect("vote exists");
    assert!(vote.panorama[index(&state, "alice")].is_faulty());
}

#[test]
fn should_reject_multiple_own_citations() {
    let mut state = new_state();
    let a0 = add(&mut state, "alice", 1, &[]);
    let a1 = add(&mut state, "alice", 2, &[a0]);
    let a2 = test_block("alice", ERA, Timestamp::from(3), &[a0, a1]);
    assert_eq!(state.add_block(a2), Err(AddBlockError::OwnJustifications));
}

#[test]
fn should_walk_ancestry() {
    let mut state = new_state();
    let a0 = add(&mut state, "alice", 1, &[]);
    let b0 = add(&mut state, "bob", 2, &[a0]);
    let c0 = add(&mut state, "carol", 3, &[a0]);
    let a1 = add(&mut state, "alice", 4, &[b0]);

    let descendants = state.descendants_or_self(&b0);
    assert_eq!(descendants, vec![b0, a1].into_iter().collect());
    let ancestors = state.ancestors_or_self(&a1);
    assert_eq!(ancestors, vec![a0, b0, a1].into_iter().collect());
    assert!(state.is_ancestor_or_self(&a0, &a1));
    assert!(state.is_ancestor_or_self(&a1, &a1));
    assert!(!state.is_ancestor_or_self(&c0, &a1));
    assert!(!state.is_ancestor_or_self(&a1, &a0));
    assert!(state.descendants_or_self(&BlockHash::default()).is_empty());
}

#[test]
fn should_index_included_deploys() {
    use crate::{testing::named_deploy_hash, types::{Deploy, DeployHeader}};

    let mut state = new_state();
    let deploy = Deploy::with_hash(
        named_deploy_hash("transfer"),
        DeployHeader::new(Timestamp::from(1), TimeDiff::from_seconds(60)),
        vec![],
    );
    let block = Block::new(
        BlockHeader::new("bob".into(), ERA, Timestamp::from(2)),
        vec![deploy],
    );
    assert!(state.add_block(block).is_ok());
    assert!(state.deploys().contains(&named_deploy_hash("transfer")));
}
