//! Transaction record (spec.md §4.5).

use std::collections::HashMap;

use crate::site::SiteId;
use crate::variable::{Timestamp, VarId};

pub type TranId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Aborted,
    Committed,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TranId,
    pub start_ts: Timestamp,
    pub kind: TransactionKind,
    pub state: TransactionState,
    /// RW only: buffered writes, applied atomically at commit (I2).
    pub write_buffer: HashMap<VarId, i64>,
    /// Sites this transaction has read from or locked, tagged with the
    /// site's `fail_epoch` at the moment of access (I6).
    pub sites_touched: Vec<(SiteId, u64)>,
    /// RO only: values captured at `start_ts`, populated lazily on first
    /// touch of each variable.
    pub snapshot: HashMap<VarId, i64>,
    /// RO only: each site's `fail_epoch` at `start_ts`, used to recognize a
    /// site that has "not failed since start_ts" when picking a snapshot
    /// source (spec.md §4.5).
    pub site_epochs_at_start: HashMap<SiteId, u64>,
}

impl Transaction {
    pub fn new_rw(id: TranId, start_ts: Timestamp) -> Self {
        Self {
            id,
            start_ts,
            kind: TransactionKind::ReadWrite,
            state: TransactionState::Active,
            write_buffer: HashMap::new(),
            sites_touched: Vec::new(),
            snapshot: HashMap::new(),
            site_epochs_at_start: HashMap::new(),
        }
    }

    pub fn new_ro(id: TranId, start_ts: Timestamp, site_epochs_at_start: HashMap<SiteId, u64>) -> Self {
        Self {
            id,
            start_ts,
            kind: TransactionKind::ReadOnly,
            state: TransactionState::Active,
            write_buffer: HashMap::new(),
            sites_touched: Vec::new(),
            snapshot: HashMap::new(),
            site_epochs_at_start,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    pub fn is_read_only(&self) -> bool {
        self.kind == TransactionKind::ReadOnly
    }

    /// Record an access to `site_id` at its current `fail_epoch`, unless
    /// already recorded (I6 only cares about the epoch at first access).
    pub fn record_site_access(&mut self, site_id: SiteId, fail_epoch: u64) {
        if !self
            .sites_touched
            .iter()
            .any(|(id, _)| *id == site_id)
        {
            self.sites_touched.push((site_id, fail_epoch));
        }
    }
}
