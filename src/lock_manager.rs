//! LockManager (spec.md §4.4): per-variable lock table, FIFO wait queues,
//! the waits-for graph, and cycle-based deadlock detection.
//!
//! Locks are logical and per-variable (not per-site-copy): "multiple readers
//! XOR a single writer" is tracked once per variable, across whichever
//! sites currently host it. `original_source/src/lock_manager.h` fixes the
//! same shape: `lock_table_: tran_id -> set<var_id>` is the reverse index
//! kept here as `tran_locks`, and the three-state DFS coloring
//! (`NOT_VISIT`/`ON_PATH`/`VISITED`) is reproduced as `Color` below.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::site::SiteId;
use crate::site_manager::SiteManager;
use crate::transaction::TranId;
use crate::variable::{Timestamp, VarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WaitEntry {
    tran: TranId,
    mode: LockMode,
}

#[derive(Debug, Default)]
struct LockRecord {
    readers: HashSet<TranId>,
    writer: Option<TranId>,
    queue: VecDeque<WaitEntry>,
}

/// What the caller should do after requesting a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// Lock acquired; these are the sites currently eligible to serve the
    /// request (readable copies for a read, available hosts for a write).
    Granted(HashSet<SiteId>),
    /// Blocked — either on another transaction's lock, or (no edges added)
    /// on every copy of a replicated variable being unavailable right now.
    Wait,
    /// The variable has exactly one host and it is down; there is no other
    /// copy to ever serve this request.
    AbortNoSite,
}

#[derive(Default)]
pub struct LockManager {
    table: HashMap<VarId, LockRecord>,
    tran_locks: HashMap<TranId, HashSet<VarId>>,
    waits_for: HashMap<TranId, HashSet<TranId>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_read(&mut self, tran: TranId, var: VarId, sites: &SiteManager) -> LockOutcome {
        let readable: HashSet<SiteId> = sites.readable_sites(var).into_iter().collect();
        if readable.is_empty() {
            return if sites.config().is_replicated(var) {
                LockOutcome::Wait
            } else {
                LockOutcome::AbortNoSite
            };
        }
        self.request(tran, var, LockMode::Read, readable)
    }

    pub fn try_write(&mut self, tran: TranId, var: VarId, sites: &SiteManager) -> LockOutcome {
        let available: HashSet<SiteId> = sites.available_hosting_sites(var).into_iter().collect();
        if available.is_empty() {
            return if sites.config().is_replicated(var) {
                LockOutcome::Wait
            } else {
                LockOutcome::AbortNoSite
            };
        }
        self.request(tran, var, LockMode::Write, available)
    }

    fn request(
        &mut self,
        tran: TranId,
        var: VarId,
        mode: LockMode,
        site_set: HashSet<SiteId>,
    ) -> LockOutcome {
        let rec = self.table.entry(var).or_default();
        let already_waiting = rec.queue.iter().any(|e| e.tran == tran);

        let conflict_free = match mode {
            LockMode::Read => rec.writer.map_or(true, |w| w == tran),
            LockMode::Write => {
                rec.writer == Some(tran)
                    || (rec.writer.is_none()
                        && (rec.readers.is_empty()
                            || (rec.readers.len() == 1 && rec.readers.contains(&tran))))
            }
        };

        // A transaction that already holds a compatible lock (e.g. reading
        // back its own write) isn't "jumping the queue" by being served
        // again — FIFO fairness only needs to hold off fresh requestors.
        let already_holds = match mode {
            LockMode::Read => rec.readers.contains(&tran) || rec.writer == Some(tran),
            LockMode::Write => rec.writer == Some(tran),
        };
        let fifo_ok = already_holds || rec.queue.front().map_or(true, |e| e.tran == tran);

        if conflict_free && fifo_ok {
            if already_waiting {
                rec.queue.pop_front();
                self.waits_for.remove(&tran);
            }
            let rec = self.table.get_mut(&var).expect("just inserted");
            match mode {
                LockMode::Read => {
                    rec.readers.insert(tran);
                }
                LockMode::Write => {
                    rec.readers.remove(&tran);
                    rec.writer = Some(tran);
                }
            }
            self.tran_locks.entry(tran).or_default().insert(var);
            return LockOutcome::Granted(site_set);
        }

        if !already_waiting {
            let holders: Vec<TranId> = rec
                .readers
                .iter()
                .copied()
                .chain(rec.writer)
                .filter(|&h| h != tran)
                .collect();
            rec.queue.push_back(WaitEntry { tran, mode });
            let edges = self.waits_for.entry(tran).or_default();
            for holder in holders {
                edges.insert(holder);
            }
        }
        LockOutcome::Wait
    }

    /// Remove `tran` from every lock record and from the waits-for graph
    /// (both directions). Does not itself grant waiters — the transaction
    /// manager's redrain loop re-issues `try_read`/`try_write` for each
    /// parked instruction, which re-validates lock *and* site conditions in
    /// one place instead of duplicating site-availability checks here.
    pub fn release_all(&mut self, tran: TranId) {
        if let Some(vars) = self.tran_locks.remove(&tran) {
            for var in vars {
                if let Some(rec) = self.table.get_mut(&var) {
                    rec.readers.remove(&tran);
                    if rec.writer == Some(tran) {
                        rec.writer = None;
                    }
                }
            }
        }
        for rec in self.table.values_mut() {
            rec.queue.retain(|e| e.tran != tran);
        }
        self.waits_for.remove(&tran);
        for edges in self.waits_for.values_mut() {
            edges.remove(&tran);
        }
    }

    /// Depth-first cycle search over the waits-for graph using three-state
    /// coloring. Returns the transaction with the largest `start_ts` among
    /// the first cycle found (the youngest — spec.md §4.4).
    pub fn detect_deadlock(&self, start_ts: &HashMap<TranId, Timestamp>) -> Option<TranId> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            Unvisited,
            OnStack,
            Done,
        }

        fn dfs(
            node: TranId,
            graph: &HashMap<TranId, HashSet<TranId>>,
            color: &mut HashMap<TranId, Color>,
            stack: &mut Vec<TranId>,
        ) -> Option<Vec<TranId>> {
            color.insert(node, Color::OnStack);
            stack.push(node);
            if let Some(neighbors) = graph.get(&node) {
                let mut sorted: Vec<TranId> = neighbors.iter().copied().collect();
                sorted.sort_unstable();
                for next in sorted {
                    match color.get(&next).copied().unwrap_or(Color::Unvisited) {
                        Color::Unvisited => {
                            if let Some(cycle) = dfs(next, graph, color, stack) {
                                return Some(cycle);
                            }
                        }
                        Color::OnStack => {
                            let pos = stack.iter().position(|&x| x == next).expect("on stack");
                            return Some(stack[pos..].to_vec());
                        }
                        Color::Done => {}
                    }
                }
            }
            stack.pop();
            color.insert(node, Color::Done);
            None
        }

        let mut color: HashMap<TranId, Color> = HashMap::new();
        let mut starts: Vec<TranId> = self.waits_for.keys().copied().collect();
        starts.sort_unstable();
        for start in starts {
            if color.get(&start).copied().unwrap_or(Color::Unvisited) != Color::Unvisited {
                continue;
            }
            let mut stack = Vec::new();
            if let Some(cycle) = dfs(start, &self.waits_for, &mut color, &mut stack) {
                return cycle
                    .into_iter()
                    .max_by_key(|t| (start_ts.get(t).copied().unwrap_or(0), *t));
            }
        }
        None
    }

    #[cfg(test)]
    pub(crate) fn waits_for_graph(&self) -> &HashMap<TranId, HashSet<TranId>> {
        &self.waits_for
    }
}

#[cfg(test)]
#[path = "lock_manager_tests.rs"]
mod tests;
