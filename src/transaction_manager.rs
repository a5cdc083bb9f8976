//! TransactionManager (spec.md §4.6): transaction lifecycle, the commit
//! protocol, and the single wait-queue mechanism that parks a read or write
//! against lock contention, site unavailability, or (for read-only
//! transactions) the absence of an eligible snapshot source alike.
//!
//! Mirrors the shape of `original_source/main.cpp`'s driver loop: resolve
//! any deadlock, execute the instruction at hand, then retry whatever is
//! parked until nothing more can move.

use std::collections::{HashMap, VecDeque};

use log::{debug, info};

use crate::config::EngineConfig;
use crate::error::{RepCrecError, Result};
use crate::instruction::Instruction;
use crate::lock_manager::{LockManager, LockOutcome};
use crate::output::OutputSink;
use crate::site::SiteId;
use crate::site_manager::SiteManager;
use crate::transaction::{TranId, Transaction, TransactionState};
use crate::variable::{Timestamp, VarId};

pub struct TransactionManager {
    config: EngineConfig,
    transactions: HashMap<TranId, Transaction>,
    lock_manager: LockManager,
    /// Per-variable FIFO of instructions parked on that variable: a read or
    /// write blocked by the lock manager, or a read-only read with no
    /// eligible snapshot source yet.
    wait_queues: HashMap<VarId, VecDeque<(TranId, Instruction)>>,
}

impl TransactionManager {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            transactions: HashMap::new(),
            lock_manager: LockManager::new(),
            wait_queues: HashMap::new(),
        }
    }

    pub fn has_pending_work(&self) -> bool {
        self.transactions.values().any(|t| t.is_active()) || self.wait_queues.values().any(|q| !q.is_empty())
    }

    /// Admit one instruction: resolve any deadlock first, dispatch the
    /// instruction, then re-drain every wait queue to a fixpoint.
    pub fn admit(
        &mut self,
        ts: Timestamp,
        instruction: Instruction,
        sites: &mut SiteManager,
        out: &mut impl OutputSink,
    ) -> Result<()> {
        self.resolve_deadlocks(out);
        self.dispatch(ts, instruction, sites, out)?;
        self.redrain_to_fixpoint(sites, out);
        Ok(())
    }

    /// Drain the wait queues with no new instruction to admit; used by
    /// `Engine::finish` once the input stream is exhausted.
    pub fn settle(&mut self, sites: &mut SiteManager, out: &mut impl OutputSink) {
        self.redrain_to_fixpoint(sites, out);
    }

    fn dispatch(
        &mut self,
        ts: Timestamp,
        instruction: Instruction,
        sites: &mut SiteManager,
        out: &mut impl OutputSink,
    ) -> Result<()> {
        match instruction {
            Instruction::Begin(tid) => {
                if self.transactions.get(&tid).map_or(false, |t| t.is_active()) {
                    return Err(RepCrecError::Transaction(format!("T{} already active", tid)));
                }
                self.transactions.insert(tid, Transaction::new_rw(tid, ts));
                info!("T{} begins (RW) at ts {}", tid, ts);
            }
            Instruction::BeginRO(tid) => {
                if self.transactions.get(&tid).map_or(false, |t| t.is_active()) {
                    return Err(RepCrecError::Transaction(format!("T{} already active", tid)));
                }
                let epochs = self.epoch_snapshot(sites);
                self.transactions.insert(tid, Transaction::new_ro(tid, ts, epochs));
                info!("T{} begins (RO) at ts {}", tid, ts);
            }
            Instruction::Read(tid, vid) => {
                self.check_var_id(vid)?;
                if !self.attempt_read(tid, vid, sites, out)? {
                    self.wait_queues
                        .entry(vid)
                        .or_default()
                        .push_back((tid, Instruction::Read(tid, vid)));
                }
            }
            Instruction::Write(tid, vid, value) => {
                self.check_var_id(vid)?;
                if !self.attempt_write(tid, vid, value, sites)? {
                    self.wait_queues
                        .entry(vid)
                        .or_default()
                        .push_back((tid, Instruction::Write(tid, vid, value)));
                }
            }
            Instruction::End(tid) => self.handle_end(tid, ts, sites, out)?,
            Instruction::Fail(site_id) => sites.fail(site_id)?,
            Instruction::Recover(site_id) => sites.recover(site_id)?,
            Instruction::Dump => sites.dump(out),
        }
        Ok(())
    }

    fn check_var_id(&self, vid: VarId) -> Result<()> {
        if vid == 0 || vid > self.config.var_count {
            return Err(RepCrecError::UnknownVariable(vid));
        }
        Ok(())
    }

    fn epoch_snapshot(&self, sites: &SiteManager) -> HashMap<SiteId, u64> {
        (1..=self.config.site_count)
            .filter_map(|sid| sites.fail_epoch(sid).ok().map(|e| (sid, e)))
            .collect()
    }

    /// Attempt a read. `Ok(true)` means the instruction is resolved (value
    /// emitted, or the transaction aborted); `Ok(false)` means it should be
    /// parked.
    fn attempt_read(
        &mut self,
        tid: TranId,
        vid: VarId,
        sites: &SiteManager,
        out: &mut impl OutputSink,
    ) -> Result<bool> {
        let txn = self
            .transactions
            .get(&tid)
            .ok_or(RepCrecError::UnknownTransaction(tid))?;
        if !txn.is_active() {
            return Ok(true);
        }
        if txn.is_read_only() {
            return Ok(self.attempt_ro_read(tid, vid, sites, out));
        }

        match self.lock_manager.try_read(tid, vid, sites) {
            LockOutcome::Granted(site_set) => {
                let site_id = *site_set.iter().min().expect("granted set is non-empty");
                let value = sites
                    .site(site_id)?
                    .variable(vid)
                    .map(|v| v.current_value)
                    .ok_or_else(|| RepCrecError::Internal(format!("site {} missing x{}", site_id, vid)))?;
                let epoch = sites.fail_epoch(site_id)?;
                let txn = self.transactions.get_mut(&tid).expect("checked above");
                txn.record_site_access(site_id, epoch);
                debug!("T{} reads x{} = {} from site {}", tid, vid, value, site_id);
                out.emit_line(format!("x{}: {}", vid, value));
                Ok(true)
            }
            LockOutcome::Wait => Ok(false),
            LockOutcome::AbortNoSite => {
                self.abort(tid);
                out.emit_line(format!("T{} aborts", tid));
                Ok(true)
            }
        }
    }

    /// Read-only snapshot read. Never blocks the lock manager: it either
    /// resolves immediately or is left parked for a later retry.
    fn attempt_ro_read(&mut self, tid: TranId, vid: VarId, sites: &SiteManager, out: &mut impl OutputSink) -> bool {
        let txn = self.transactions.get(&tid).expect("checked by caller");
        if let Some(&value) = txn.snapshot.get(&vid) {
            out.emit_line(format!("x{}: {}", vid, value));
            return true;
        }

        let start_ts = txn.start_ts;
        let source = sites.hosting_sites(vid).into_iter().find(|&sid| {
            let site = match sites.site(sid) {
                Ok(s) => s,
                Err(_) => return false,
            };
            let epoch_at_start = txn.site_epochs_at_start.get(&sid).copied();
            site.available && epoch_at_start == Some(site.fail_epoch) && !site.is_tainted(vid)
        });

        match source {
            Some(sid) => {
                let value = sites
                    .site(sid)
                    .expect("found above")
                    .variable(vid)
                    .expect("site hosts var")
                    .value_at_or_before(start_ts);
                let txn = self.transactions.get_mut(&tid).expect("checked by caller");
                txn.snapshot.insert(vid, value);
                debug!("T{} (RO) snapshot-reads x{} = {} from site {}", tid, vid, value, sid);
                out.emit_line(format!("x{}: {}", vid, value));
                true
            }
            None => false,
        }
    }

    /// Attempt a write. Same `Ok(bool)` convention as `attempt_read`.
    fn attempt_write(&mut self, tid: TranId, vid: VarId, value: i64, sites: &SiteManager) -> Result<bool> {
        let txn = self
            .transactions
            .get(&tid)
            .ok_or(RepCrecError::UnknownTransaction(tid))?;
        if !txn.is_active() {
            return Ok(true);
        }
        if txn.is_read_only() {
            return Err(RepCrecError::Transaction(format!(
                "T{} is read-only and cannot write",
                tid
            )));
        }

        match self.lock_manager.try_write(tid, vid, sites) {
            LockOutcome::Granted(site_set) => {
                let epochs: Vec<(SiteId, u64)> = site_set
                    .iter()
                    .filter_map(|&sid| sites.fail_epoch(sid).ok().map(|e| (sid, e)))
                    .collect();
                let txn = self.transactions.get_mut(&tid).expect("checked above");
                txn.write_buffer.insert(vid, value);
                for (sid, epoch) in epochs {
                    txn.record_site_access(sid, epoch);
                }
                debug!("T{} buffers write x{} = {}", tid, vid, value);
                Ok(true)
            }
            LockOutcome::Wait => Ok(false),
            LockOutcome::AbortNoSite => {
                self.abort(tid);
                Ok(true)
            }
        }
    }

    fn handle_end(
        &mut self,
        tid: TranId,
        ts: Timestamp,
        sites: &mut SiteManager,
        out: &mut impl OutputSink,
    ) -> Result<()> {
        let txn = self
            .transactions
            .get(&tid)
            .ok_or(RepCrecError::UnknownTransaction(tid))?;

        if !txn.is_active() {
            // Already resolved earlier (e.g. a deadlock victim) — the abort
            // was already logged at that point, nothing further to emit.
            return Ok(());
        }

        if txn.is_read_only() {
            self.transactions.get_mut(&tid).unwrap().state = TransactionState::Committed;
            self.lock_manager.release_all(tid);
            out.emit_line(format!("T{} commits", tid));
            return Ok(());
        }

        // I6: abort if any touched site has failed since the access.
        let stale = txn
            .sites_touched
            .iter()
            .any(|&(sid, epoch_then)| sites.fail_epoch(sid).unwrap_or(epoch_then) > epoch_then);

        if stale {
            self.abort(tid);
            out.emit_line(format!("T{} aborts", tid));
            return Ok(());
        }

        let writes: Vec<(VarId, i64)> = txn.write_buffer.iter().map(|(&k, &v)| (k, v)).collect();
        for (vid, value) in writes {
            let targets = sites.available_hosting_sites(vid);
            sites.write_all(vid, ts, value, &targets);
        }
        self.transactions.get_mut(&tid).unwrap().state = TransactionState::Committed;
        self.lock_manager.release_all(tid);
        info!("T{} commits", tid);
        out.emit_line(format!("T{} commits", tid));
        Ok(())
    }

    fn abort(&mut self, tid: TranId) {
        if let Some(txn) = self.transactions.get_mut(&tid) {
            txn.write_buffer.clear();
            txn.state = TransactionState::Aborted;
        }
        self.lock_manager.release_all(tid);
        for queue in self.wait_queues.values_mut() {
            queue.retain(|(t, _)| *t != tid);
        }
    }

    fn resolve_deadlocks(&mut self, out: &mut impl OutputSink) {
        loop {
            let start_ts: HashMap<TranId, Timestamp> = self
                .transactions
                .iter()
                .filter(|(_, t)| t.is_active())
                .map(|(&id, t)| (id, t.start_ts))
                .collect();
            match self.lock_manager.detect_deadlock(&start_ts) {
                Some(victim) => {
                    info!("deadlock detected: T{} aborts (youngest in cycle)", victim);
                    self.abort(victim);
                    out.emit_line(format!("T{} aborts", victim));
                }
                None => break,
            }
        }
    }

    /// Re-try every parked queue head until a full pass makes no progress.
    fn redrain_to_fixpoint(&mut self, sites: &mut SiteManager, out: &mut impl OutputSink) {
        loop {
            self.resolve_deadlocks(out);
            if !self.redrain_once(sites, out) {
                break;
            }
        }
    }

    fn redrain_once(&mut self, sites: &mut SiteManager, out: &mut impl OutputSink) -> bool {
        let mut changed = false;
        let vars: Vec<VarId> = self.wait_queues.keys().copied().collect();
        for vid in vars {
            loop {
                let head = match self.wait_queues.get(&vid).and_then(|q| q.front()) {
                    Some((tid, instr)) => Some((*tid, instr.clone())),
                    None => None,
                };
                let (tid, instr) = match head {
                    Some(h) => h,
                    None => break,
                };

                let still_active = self.transactions.get(&tid).map_or(false, |t| t.is_active());
                if !still_active {
                    self.wait_queues.get_mut(&vid).unwrap().pop_front();
                    changed = true;
                    continue;
                }

                let resolved = match instr {
                    Instruction::Read(t, v) => self.attempt_read(t, v, sites, out).unwrap_or(true),
                    Instruction::Write(t, v, val) => self.attempt_write(t, v, val, sites).unwrap_or(true),
                    _ => true,
                };

                if resolved {
                    self.wait_queues.get_mut(&vid).unwrap().pop_front();
                    changed = true;
                } else {
                    break;
                }
            }
        }
        changed
    }

    #[cfg(test)]
    pub(crate) fn transaction_state(&self, tid: TranId) -> Option<TransactionState> {
        self.transactions.get(&tid).map(|t| t.state)
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self, vid: VarId) -> usize {
        self.wait_queues.get(&vid).map_or(0, |q| q.len())
    }
}

#[cfg(test)]
#[path = "transaction_manager_tests.rs"]
mod tests;
