//! Variable model (spec.md §4.1).

pub type VarId = u32;
pub type Timestamp = u64;

/// A replicated data item `x_i`.
///
/// Holds the current value plus a committed-history log used to serve
/// read-only transaction snapshots (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: VarId,
    pub current_value: i64,
    /// Ascending by `commit_ts`. The first entry is always `(0, initial_value)`.
    commit_history: Vec<(Timestamp, i64)>,
    pub is_replicated: bool,
}

impl Variable {
    pub fn new(id: VarId, initial_value: i64, is_replicated: bool) -> Self {
        Self {
            id,
            current_value: initial_value,
            commit_history: vec![(0, initial_value)],
            is_replicated,
        }
    }

    /// The committed value as of the greatest `commit_ts <= ts`.
    ///
    /// `commit_history` is append-only and ascending by timestamp, so a
    /// reverse scan for the first entry at or before `ts` is sufficient.
    pub fn value_at_or_before(&self, ts: Timestamp) -> i64 {
        self.commit_history
            .iter()
            .rev()
            .find(|(commit_ts, _)| *commit_ts <= ts)
            .map(|(_, value)| *value)
            .unwrap_or(self.commit_history[0].1)
    }

    /// Append a committed write and update the current value.
    pub fn apply_commit(&mut self, ts: Timestamp, value: i64) {
        self.commit_history.push((ts, value));
        self.current_value = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_at_or_before_returns_initial_before_any_commit() {
        let v = Variable::new(2, 20, true);
        assert_eq!(v.value_at_or_before(0), 20);
        assert_eq!(v.value_at_or_before(100), 20);
    }

    #[test]
    fn value_at_or_before_scans_history() {
        let mut v = Variable::new(2, 20, true);
        v.apply_commit(5, 55);
        v.apply_commit(10, 1010);
        assert_eq!(v.value_at_or_before(0), 20);
        assert_eq!(v.value_at_or_before(4), 20);
        assert_eq!(v.value_at_or_before(5), 55);
        assert_eq!(v.value_at_or_before(9), 55);
        assert_eq!(v.value_at_or_before(10), 1010);
        assert_eq!(v.value_at_or_before(999), 1010);
        assert_eq!(v.current_value, 1010);
    }
}
