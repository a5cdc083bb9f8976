use super::*;
use crate::config::EngineConfig;

fn small_sites() -> SiteManager {
    SiteManager::new(EngineConfig {
        site_count: 2,
        var_count: 4,
        initial_value_scale: 10,
    })
}

fn ts_map(pairs: &[(TranId, Timestamp)]) -> HashMap<TranId, Timestamp> {
    pairs.iter().copied().collect()
}

#[test]
fn two_readers_share_a_lock() {
    let sites = small_sites();
    let mut lm = LockManager::new();
    assert!(matches!(lm.try_read(1, 2, &sites), LockOutcome::Granted(_)));
    assert!(matches!(lm.try_read(2, 2, &sites), LockOutcome::Granted(_)));
}

#[test]
fn writer_blocks_other_readers_and_writers() {
    let sites = small_sites();
    let mut lm = LockManager::new();
    assert!(matches!(lm.try_write(1, 2, &sites), LockOutcome::Granted(_)));
    assert_eq!(lm.try_read(2, 2, &sites), LockOutcome::Wait);
    assert_eq!(lm.try_write(3, 2, &sites), LockOutcome::Wait);
    // T1 reading its own write is fine.
    assert!(matches!(lm.try_read(1, 2, &sites), LockOutcome::Granted(_)));
}

#[test]
fn read_then_upgrade_to_write_when_sole_reader() {
    let sites = small_sites();
    let mut lm = LockManager::new();
    assert!(matches!(lm.try_read(1, 2, &sites), LockOutcome::Granted(_)));
    assert!(matches!(lm.try_write(1, 2, &sites), LockOutcome::Granted(_)));
}

#[test]
fn upgrade_blocked_by_other_reader() {
    let sites = small_sites();
    let mut lm = LockManager::new();
    assert!(matches!(lm.try_read(1, 2, &sites), LockOutcome::Granted(_)));
    assert!(matches!(lm.try_read(2, 2, &sites), LockOutcome::Granted(_)));
    assert_eq!(lm.try_write(1, 2, &sites), LockOutcome::Wait);
}

#[test]
fn fifo_fairness_grants_readers_in_arrival_order_after_writer_releases() {
    let sites = small_sites();
    let mut lm = LockManager::new();
    assert!(matches!(lm.try_write(1, 2, &sites), LockOutcome::Granted(_)));
    assert_eq!(lm.try_read(2, 2, &sites), LockOutcome::Wait);
    assert_eq!(lm.try_read(3, 2, &sites), LockOutcome::Wait);

    lm.release_all(1);

    // Retry in arrival order: T2 first, then T3.
    assert!(matches!(lm.try_read(2, 2, &sites), LockOutcome::Granted(_)));
    assert!(matches!(lm.try_read(3, 2, &sites), LockOutcome::Granted(_)));
}

#[test]
fn later_reader_must_wait_behind_earlier_writer_even_without_conflict() {
    // T1 holds read, T2 wants write (waits), T3 then wants read: even though
    // T3's read doesn't conflict with T1's read, FIFO fairness still makes
    // it wait behind T2.
    let sites = small_sites();
    let mut lm = LockManager::new();
    assert!(matches!(lm.try_read(1, 2, &sites), LockOutcome::Granted(_)));
    assert_eq!(lm.try_write(2, 2, &sites), LockOutcome::Wait);
    assert_eq!(lm.try_read(3, 2, &sites), LockOutcome::Wait);
}

#[test]
fn abort_no_site_for_single_copy_variable_whose_host_is_down() {
    let mut sites = small_sites();
    // x1 is odd -> single host, which is site 1 + (1 mod 2) = 2.
    sites.fail(2).unwrap();
    let mut lm = LockManager::new();
    assert_eq!(lm.try_read(1, 1, &sites), LockOutcome::AbortNoSite);
}

#[test]
fn wait_for_replicated_variable_when_all_copies_down() {
    let mut sites = small_sites();
    sites.fail(1).unwrap();
    sites.fail(2).unwrap();
    let mut lm = LockManager::new();
    assert_eq!(lm.try_read(1, 2, &sites), LockOutcome::Wait);
}

#[test]
fn deadlock_cycle_picks_youngest_as_victim() {
    let sites = small_sites();
    let mut lm = LockManager::new();
    // T1 reads x2, T2 reads x4; T1 wants x4 (blocked by T2), T2 wants x2
    // (blocked by T1) -> cycle T1 <-> T2.
    assert!(matches!(lm.try_read(1, 2, &sites), LockOutcome::Granted(_)));
    assert!(matches!(lm.try_read(2, 4, &sites), LockOutcome::Granted(_)));
    assert_eq!(lm.try_write(1, 4, &sites), LockOutcome::Wait);
    assert_eq!(lm.try_write(2, 2, &sites), LockOutcome::Wait);

    let victim = lm.detect_deadlock(&ts_map(&[(1, 10), (2, 20)]));
    assert_eq!(victim, Some(2));
}

#[test]
fn no_deadlock_when_graph_is_acyclic() {
    let sites = small_sites();
    let mut lm = LockManager::new();
    assert!(matches!(lm.try_write(1, 2, &sites), LockOutcome::Granted(_)));
    assert_eq!(lm.try_read(2, 2, &sites), LockOutcome::Wait);
    assert_eq!(lm.detect_deadlock(&ts_map(&[(1, 1), (2, 2)])), None);
}

#[test]
fn release_all_clears_locks_and_graph_edges() {
    let sites = small_sites();
    let mut lm = LockManager::new();
    assert!(matches!(lm.try_write(1, 2, &sites), LockOutcome::Granted(_)));
    assert_eq!(lm.try_read(2, 2, &sites), LockOutcome::Wait);
    assert!(!lm.waits_for_graph().is_empty());

    lm.release_all(1);
    assert!(lm.waits_for_graph().get(&2).map_or(true, |e| e.is_empty()));

    lm.release_all(2);
    assert!(matches!(lm.try_write(3, 2, &sites), LockOutcome::Granted(_)));
}
