//! Bounded per-scope event windows.
//!
//! Each detector owns one or more `ScopeWindow`s: an explicit keyed store
//! of append-only sequences, pruned in place after every mutation. Two
//! invariants hold at all times: entries are ascending by timestamp
//! (append-only), and no sequence exceeds the configured cap or retains
//! entries older than `now - window_ms` after a prune.

use std::collections::HashMap;

use sensei_core::ScopeKey;

/// A value paired with its ingestion timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped<T> {
    pub at_ms: u64,
    pub value: T,
}

#[derive(Debug, Clone)]
pub struct ScopeWindow<T> {
    scopes: HashMap<ScopeKey, Vec<Stamped<T>>>,
    window_ms: u64,
    max_events: usize,
}

impl<T> ScopeWindow<T> {
    pub fn new(window_ms: u64, max_events: usize) -> Self {
        Self {
            scopes: HashMap::new(),
            window_ms,
            max_events,
        }
    }

    /// Adjust bounds at runtime; takes effect on the next prune.
    pub fn set_bounds(&mut self, window_ms: u64, max_events: usize) {
        self.window_ms = window_ms;
        self.max_events = max_events;
    }

    /// Append a value to the scope's sequence, then prune it.
    pub fn record(&mut self, scope: &str, value: T, now_ms: u64) {
        let entries = self.scopes.entry(scope.to_owned()).or_default();
        entries.push(Stamped { at_ms: now_ms, value });
        Self::prune_entries(entries, self.window_ms, self.max_events, now_ms);
    }

    /// Drop entries older than the window, then drop oldest beyond the cap.
    pub fn prune(&mut self, scope: &str, now_ms: u64) {
        if let Some(entries) = self.scopes.get_mut(scope) {
            Self::prune_entries(entries, self.window_ms, self.max_events, now_ms);
        }
    }

    pub fn prune_all(&mut self, now_ms: u64) {
        for entries in self.scopes.values_mut() {
            Self::prune_entries(entries, self.window_ms, self.max_events, now_ms);
        }
        self.scopes.retain(|_, entries| !entries.is_empty());
    }

    fn prune_entries(entries: &mut Vec<Stamped<T>>, window_ms: u64, max_events: usize, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(window_ms);
        entries.retain(|e| e.at_ms >= cutoff);
        if entries.len() > max_events {
            let excess = entries.len() - max_events;
            entries.drain(..excess);
        }
    }

    pub fn get(&self, scope: &str) -> &[Stamped<T>] {
        self.scopes.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn scope_keys(&self) -> Vec<ScopeKey> {
        self.scopes.keys().cloned().collect()
    }

    pub fn len(&self, scope: &str) -> usize {
        self.scopes.get(scope).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.values().all(Vec::is_empty)
    }

    /// Clear one scope, or everything when `scope` is `None`.
    pub fn clear(&mut self, scope: Option<&str>) {
        match scope {
            Some(s) => {
                self.scopes.remove(s);
            }
            None => self.scopes.clear(),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> ScopeWindow<u32> {
        ScopeWindow::new(1_000, 5)
    }

    // ── 1. record and prune by time ─────────────────────────────────

    #[test]
    fn old_entries_pruned_on_record() {
        let mut w = window();
        w.record("a", 1, 100);
        w.record("a", 2, 1_500);
        // Entry at t=100 is outside [500, 1500].
        assert_eq!(w.len("a"), 1);
        assert_eq!(w.get("a")[0].value, 2);
    }

    #[test]
    fn prune_is_explicit_too() {
        let mut w = window();
        w.record("a", 1, 100);
        assert_eq!(w.len("a"), 1);
        w.prune("a", 2_000);
        assert_eq!(w.len("a"), 0);
    }

    // ── 2. hard cap ─────────────────────────────────────────────────

    #[test]
    fn cap_drops_oldest() {
        let mut w = window();
        for i in 0..8u32 {
            w.record("a", i, 500 + u64::from(i));
        }
        assert_eq!(w.len("a"), 5);
        assert_eq!(w.get("a")[0].value, 3);
        assert_eq!(w.get("a")[4].value, 7);
    }

    // ── 3. scope isolation ──────────────────────────────────────────

    #[test]
    fn scopes_are_independent() {
        let mut w = window();
        w.record("a", 1, 100);
        w.record("b", 2, 100);
        w.clear(Some("a"));
        assert_eq!(w.len("a"), 0);
        assert_eq!(w.len("b"), 1);
        w.clear(None);
        assert!(w.is_empty());
    }

    #[test]
    fn prune_all_drops_emptied_scopes() {
        let mut w = window();
        w.record("a", 1, 100);
        w.record("b", 2, 5_000);
        w.prune_all(6_000);
        assert_eq!(w.scope_keys(), vec!["b".to_owned()]);
    }

    // ── 4. ordering invariant ───────────────────────────────────────

    #[test]
    fn entries_stay_ascending() {
        let mut w = ScopeWindow::new(10_000, 100);
        for t in [10u64, 20, 30, 40] {
            w.record("a", 0u32, t);
        }
        let stamps: Vec<u64> = w.get("a").iter().map(|e| e.at_ms).collect();
        assert_eq!(stamps, vec![10, 20, 30, 40]);
    }

    #[test]
    fn missing_scope_reads_empty() {
        let w = window();
        assert!(w.get("nope").is_empty());
        assert_eq!(w.len("nope"), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// After any record sequence the cap is never exceeded and no
        /// entry is older than the window relative to the last timestamp.
        #[test]
        fn bounds_hold(times in proptest::collection::vec(0u64..100_000, 1..200)) {
            let mut sorted = times.clone();
            sorted.sort_unstable();
            let mut w = ScopeWindow::new(5_000, 16);
            let mut last = 0;
            for t in sorted {
                w.record("s", (), t);
                last = t;
            }
            prop_assert!(w.len("s") <= 16);
            let cutoff = last.saturating_sub(5_000);
            prop_assert!(w.get("s").iter().all(|e| e.at_ms >= cutoff));
        }
    }
}
