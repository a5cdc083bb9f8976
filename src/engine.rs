//! The `Engine` facade (spec.md §5): wires `SiteManager` and
//! `TransactionManager` together behind one entry point a driver submits
//! instructions to.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::instruction::Instruction;
use crate::output::OutputSink;
use crate::site_manager::SiteManager;
use crate::transaction_manager::TransactionManager;
use crate::variable::Timestamp;

/// Runs the engine against one output sink, advancing its own logical clock
/// one tick per submitted instruction.
pub struct Engine<O: OutputSink> {
    sites: SiteManager,
    transactions: TransactionManager,
    sink: O,
    curr_ts: Timestamp,
}

impl<O: OutputSink> Engine<O> {
    pub fn new(config: EngineConfig, sink: O) -> Self {
        Self {
            sites: SiteManager::new(config),
            transactions: TransactionManager::new(config),
            sink,
            curr_ts: 0,
        }
    }

    /// Submit one instruction. Its timestamp is the engine's own tick
    /// counter, not anything the driver supplies.
    pub fn submit(&mut self, instruction: Instruction) -> Result<()> {
        self.curr_ts += 1;
        self.transactions
            .admit(self.curr_ts, instruction, &mut self.sites, &mut self.sink)
    }

    /// Drain every parked instruction as far as it will go, then emit one
    /// final `dump()` — the driver-facing equivalent of
    /// `original_source/main.cpp`'s trailing synthetic dump after the input
    /// stream is exhausted.
    pub fn finish(&mut self) {
        self.transactions.settle(&mut self.sites, &mut self.sink);
        let _ = self.submit(Instruction::Dump);
    }

    pub fn sink(&self) -> &O {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut O {
        &mut self.sink
    }

    pub fn into_sink(self) -> O {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::parse_line;
    use crate::output::MemorySink;

    fn run(config: EngineConfig, lines: &[&str]) -> Vec<String> {
        let mut engine = Engine::new(config, MemorySink::new());
        for line in lines {
            if let Some(instr) = parse_line(line).unwrap() {
                engine.submit(instr).unwrap();
            }
        }
        engine.finish();
        engine.into_sink().lines().to_vec()
    }

    #[test]
    fn end_to_end_commit_and_read() {
        let config = EngineConfig {
            site_count: 2,
            var_count: 2,
            initial_value_scale: 10,
        };
        let lines = run(
            config,
            &[
                "begin(T1)",
                "W(T1, x2, 55)",
                "end(T1)",
                "begin(T2)",
                "R(T2, x2)",
                "end(T2)",
            ],
        );
        assert!(lines.contains(&"T1 commits".to_string()));
        assert!(lines.contains(&"x2: 55".to_string()));
        assert!(lines.contains(&"T2 commits".to_string()));
    }

    #[test]
    fn finish_emits_a_trailing_dump() {
        let config = EngineConfig {
            site_count: 1,
            var_count: 1,
            initial_value_scale: 10,
        };
        let lines = run(config, &[]);
        assert_eq!(lines, vec!["site 1 - x1: 10".to_string()]);
    }
}
