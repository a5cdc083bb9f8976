//! S5: a read-only transaction observes the snapshot as of its own
//! `start_ts`, unaffected by writes that commit afterward (spec.md §8).

use repcrec::{parse_line, Engine, EngineConfig, MemorySink};

fn run(lines: &[&str]) -> Vec<String> {
    let mut engine = Engine::new(EngineConfig::default(), MemorySink::new());
    for line in lines {
        if let Some(instr) = parse_line(line).unwrap() {
            engine.submit(instr).unwrap();
        }
    }
    engine.finish();
    engine.into_sink().lines().to_vec()
}

#[test]
fn read_only_transaction_sees_pre_write_snapshot() {
    let lines = run(&[
        "beginRO(T1)",
        "begin(T2)",
        "W(T2, x4, 444)",
        "end(T2)",
        "R(T1, x4)",
    ]);
    assert!(lines.contains(&"T2 commits".to_string()));
    assert!(lines.contains(&"x4: 40".to_string()));
    assert!(!lines.contains(&"x4: 444".to_string()));
}

#[test]
fn read_only_transaction_never_blocks_on_locks_held_by_writers() {
    let lines = run(&[
        "begin(T1)",
        "W(T1, x2, 9999)",
        "beginRO(T2)",
        "R(T2, x2)",
    ]);
    // T1 has not committed, so the RO transaction's snapshot at its own
    // start_ts still reflects the initial value, read without waiting for
    // T1's uncommitted write.
    assert!(lines.contains(&"x2: 20".to_string()));
}
