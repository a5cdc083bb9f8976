//! Site model (spec.md §4.2).

use std::collections::{HashMap, HashSet};

use crate::variable::{VarId, Variable};

pub type SiteId = u32;

/// One of the `SITE_COUNT` storage nodes.
///
/// Owns the subset of variables the placement invariant assigns to it, and
/// carries the availability/taint state spec.md §3 describes.
#[derive(Debug)]
pub struct Site {
    pub id: SiteId,
    pub available: bool,
    /// Strictly increases on every `fail` (I3).
    pub fail_epoch: u64,
    variables: HashMap<VarId, Variable>,
    /// Replicated variables on this site that have not been rewritten since
    /// its most recent recovery (I4).
    tainted: HashSet<VarId>,
}

impl Site {
    pub fn new(id: SiteId) -> Self {
        Self {
            id,
            available: true,
            fail_epoch: 0,
            variables: HashMap::new(),
            tainted: HashSet::new(),
        }
    }

    /// Called once at engine construction to assign a variable to this site.
    pub fn host(&mut self, variable: Variable) {
        self.variables.insert(variable.id, variable);
    }

    pub fn holds(&self, var_id: VarId) -> bool {
        self.variables.contains_key(&var_id)
    }

    pub fn variable(&self, var_id: VarId) -> Option<&Variable> {
        self.variables.get(&var_id)
    }

    /// Mark this site down. Every replicated variable it holds becomes
    /// tainted; values themselves are untouched.
    pub fn fail(&mut self) {
        self.available = false;
        self.fail_epoch += 1;
        let replicated_ids: Vec<VarId> = self
            .variables
            .values()
            .filter(|v| v.is_replicated)
            .map(|v| v.id)
            .collect();
        self.tainted.extend(replicated_ids);
    }

    /// Bring this site back up. Taint is preserved (I4): replicated
    /// variables stay unreadable until a later write rewrites them here.
    pub fn recover(&mut self) {
        self.available = true;
    }

    /// Apply a commit locally: append history, clear taint for this variable.
    ///
    /// Per the open question in spec.md §9, this only clears taint on the
    /// site the write actually lands on — sibling replicas that did not
    /// receive this write keep their taint.
    pub fn write_commit(&mut self, var_id: VarId, ts: u64, value: i64) {
        if let Some(var) = self.variables.get_mut(&var_id) {
            var.apply_commit(ts, value);
        }
        self.tainted.remove(&var_id);
    }

    /// The current value, iff the site is available and the variable is not
    /// tainted here.
    pub fn read_current(&self, var_id: VarId) -> Option<i64> {
        if !self.available {
            return None;
        }
        if self.tainted.contains(&var_id) {
            return None;
        }
        self.variables.get(&var_id).map(|v| v.current_value)
    }

    pub fn is_tainted(&self, var_id: VarId) -> bool {
        self.tainted.contains(&var_id)
    }

    /// `"site k - x1: v1 x2: v2 ..."`, ascending variable id, space
    /// separated, no trailing space (original_source/src/site.cc).
    pub fn dump(&self) -> String {
        let mut ids: Vec<&VarId> = self.variables.keys().collect();
        ids.sort();
        let body = ids
            .iter()
            .map(|id| format!("x{}: {}", id, self.variables[id].current_value))
            .collect::<Vec<_>>()
            .join(" ");
        format!("site {} - {}", self.id, body)
    }
}
