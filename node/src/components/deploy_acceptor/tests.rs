use std::collections::HashSet;

use super::*;
use crate::{
    crypto::Digest,
    testing::{self, named_deploy_hash},
    types::{DeployHeader, Instruction, OpcodeClass},
};

const NOW: u64 = 1_700_000_000_000;

fn acceptor() -> DeployAcceptor {
    DeployAcceptor::new(&testing::local_chainspec())
}

fn max_ttl() -> TimeDiff {
    testing::local_chainspec().deploy_config.max_ttl
}

fn deploy_issued_at(timestamp: Timestamp, dependencies: Vec<DeployHash>) -> Deploy {
    let mut header = DeployHeader::new(timestamp, max_ttl());
    header.dependencies = dependencies;
    Deploy::new(header, vec![Instruction::new(OpcodeClass::Regular)])
}

fn named_deploy(name: &str, dependencies: &[&str]) -> Deploy {
    let mut header = DeployHeader::new(Timestamp::from(NOW), max_ttl());
    header.dependencies = dependencies.iter().map(|dep| named_deploy_hash(dep)).collect();
    Deploy::with_hash(named_deploy_hash(name), header, vec![])
}

#[test]
fn should_accept_valid_deploy() {
    let deploy = deploy_issued_at(Timestamp::from(NOW), vec![]);
    let known: HashSet<DeployHash> = HashSet::new();
    assert_eq!(acceptor().admit(&deploy, Timestamp::from(NOW), &known), Ok(()));
}

#[test]
fn should_reject_deploy_one_millisecond_past_max_ttl() {
    let issued = Timestamp::from(NOW);
    let deploy = deploy_issued_at(issued, vec![]);
    let known: HashSet<DeployHash> = HashSet::new();
    let acceptor = acceptor();

    let at_limit = issued + max_ttl();
    assert_eq!(acceptor.admit(&deploy, at_limit, &known), Ok(()));

    let past_limit = at_limit + TimeDiff::from_millis(1);
    assert_eq!(
        acceptor.admit(&deploy, past_limit, &known),
        Err(DeployRejection::Expired {
            issued,
            current_time: past_limit,
            ttl: max_ttl(),
        })
    );
}

#[test]
fn should_apply_declared_ttl() {
    let mut header = DeployHeader::new(Timestamp::from(NOW), TimeDiff::from_seconds(10));
    header.max_stack_height = 10;
    let deploy = Deploy::new(header, vec![]);
    let known: HashSet<DeployHash> = HashSet::new();
    let late = Timestamp::from(NOW) + TimeDiff::from_millis(10_001);
    assert!(matches!(
        acceptor().admit(&deploy, late, &known),
        Err(DeployRejection::Expired { .. })
    ));
}

#[test]
fn should_reject_too_many_dependencies() {
    let max_dependencies = testing::local_chainspec().deploy_config.max_dependencies;
    let dependencies: Vec<DeployHash> = (0..=max_dependencies)
        .map(|index| DeployHash::new(Digest::hash([index])))
        .collect();
    let known: HashSet<DeployHash> = dependencies.iter().copied().collect();

    let deploy = deploy_issued_at(Timestamp::from(NOW), dependencies.clone());
    assert_eq!(
        acceptor().admit(&deploy, Timestamp::from(NOW), &known),
        Err(DeployRejection::TooManyDependencies {
            max: max_dependencies,
            got: usize::from(max_dependencies) + 1,
        })
    );

    let deploy = deploy_issued_at(
        Timestamp::from(NOW),
        dependencies[..usize::from(max_dependencies)].to_vec(),
    );
    assert_eq!(acceptor().admit(&deploy, Timestamp::from(NOW), &known), Ok(()));
}

#[test]
fn should_reject_unknown_dependency_without_fetching() {
    let known_hash = named_deploy_hash("known");
    let unknown_hash = named_deploy_hash("unknown");
    let known: BTreeSet<DeployHash> = vec![known_hash].into_iter().collect();
    let deploy = deploy_issued_at(Timestamp::from(NOW), vec![known_hash, unknown_hash]);
    assert_eq!(
        acceptor().admit(&deploy, Timestamp::from(NOW), &known),
        Err(DeployRejection::UnknownDependency {
            dependency: unknown_hash
        })
    );
}

#[test]
fn should_resolve_dependencies_within_block() {
    let first = named_deploy("first", &[]);
    let second = named_deploy("second", &["first"]);
    let block_deploys = vec![first, second.clone()];
    let known: HashSet<DeployHash> = HashSet::new();
    assert_eq!(
        acceptor().admit_in_block(&second, Timestamp::from(NOW), &known, &block_deploys),
        Ok(())
    );
    assert_eq!(
        acceptor().admit(&second, Timestamp::from(NOW), &known),
        Err(DeployRejection::UnknownDependency {
            dependency: named_deploy_hash("first")
        })
    );
}

#[test]
fn should_reject_three_cycle_within_block() {
    let a = named_deploy("a", &["b"]);
    let b = named_deploy("b", &["c"]);
    let c = named_deploy("c", &["a"]);
    let block_deploys = vec![a.clone(), b.clone(), c.clone()];
    let known: HashSet<DeployHash> = HashSet::new();
    let acceptor = acceptor();
    for (deploy, through) in &[(a, "b"), (b, "c"), (c, "a")] {
        assert_eq!(
            acceptor.admit_in_block(deploy, Timestamp::from(NOW), &known, &block_deploys),
            Err(DeployRejection::CyclicDependency {
                dependency: named_deploy_hash(through)
            })
        );
    }
}

#[test]
fn should_ignore_cycles_through_known_deploys_outside_block() {
    // `b` was included in an earlier block; only dependencies within this block can form a cycle.
    let a = named_deploy("a", &["b"]);
    let known: HashSet<DeployHash> = vec![named_deploy_hash("b")].into_iter().collect();
    assert_eq!(
        acceptor().admit_in_block(&a, Timestamp::from(NOW), &known, &[a.clone()]),
        Ok(())
    );
}

#[test]
fn should_check_in_order() {
    // Expired and with too many dependencies: expiry is reported.
    let dependencies: Vec<DeployHash> = (0..20u8)
        .map(|index| DeployHash::new(Digest::hash([index])))
        .collect();
    let deploy = deploy_issued_at(Timestamp::from(NOW), dependencies);
    let known: HashSet<DeployHash> = HashSet::new();
    let late = Timestamp::from(NOW) + max_ttl() + TimeDiff::from_millis(1);
    assert!(matches!(
        acceptor().admit(&deploy, late, &known),
        Err(DeployRejection::Expired { .. })
    ));
}

#[test]
fn should_reject_excessive_ttl_and_stack_height() {
    let known: HashSet<DeployHash> = HashSet::new();
    let long_ttl = max_ttl() + TimeDiff::from_millis(1);
    let deploy = Deploy::new(DeployHeader::new(Timestamp::from(NOW), long_ttl), vec![]);
    assert_eq!(
        acceptor().admit(&deploy, Timestamp::from(NOW), &known),
        Err(DeployRejection::ExcessiveTimeToLive {
            max_ttl: max_ttl(),
            got: long_ttl,
        })
    );

    let mut header = DeployHeader::new(Timestamp::from(NOW), max_ttl());
    header.max_stack_height = 65_537;
    let deploy = Deploy::new(header, vec![]);
    assert!(matches!(
        acceptor().admit(&deploy, Timestamp::from(NOW), &known),
        Err(DeployRejection::StackHeightExceeded(_))
    ));
}

#[test]
fn should_be_idempotent() {
    let deploy = deploy_issued_at(Timestamp::from(NOW), vec![named_deploy_hash("missing")]);
    let known: HashSet<DeployHash> = HashSet::new();
    let acceptor = acceptor();
    let first = acceptor.admit(&deploy, Timestamp::from(NOW), &known);
    let second = acceptor.admit(&deploy, Timestamp::from(NOW), &known);
    assert!(first.is_err());
    assert_eq!(first, second);
}
