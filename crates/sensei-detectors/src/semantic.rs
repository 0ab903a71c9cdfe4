//! Structural churn detection over debounced document-symbol snapshots.
//!
//! Opt-in (higher overhead). Edits schedule a debounced symbol-listing
//! request per file; only the newest pending request per scope survives
//! the debounce window. The orchestration layer drains due requests,
//! invokes the external provider, and feeds the resulting snapshot back
//! as a `RawEvent::SymbolSnapshot`. A provider failure simply means no
//! snapshot this cycle; nothing else is affected.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use sensei_core::{EngineConfig, ScopeKey, SignalEvent, SignalType};

use crate::detector::{RawEvent, SignalDetector};
use crate::window::ScopeWindow;

// ─── Symbols ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SymbolKind {
    Module,
    Namespace,
    Class,
    Interface,
    Enum,
    Struct,
    Function,
    Method,
    Constructor,
    Field,
    Property,
    Variable,
    Constant,
    Other,
}

impl SymbolKind {
    /// Kinds whose appearance or disappearance counts as a structural
    /// change (not fields or simple statements).
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Self::Module
                | Self::Namespace
                | Self::Class
                | Self::Interface
                | Self::Enum
                | Self::Struct
                | Self::Function
                | Self::Method
                | Self::Constructor
        )
    }
}

/// Nested symbol as supplied by the host's document-symbol provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub range_start: u32,
    pub range_end: u32,
    #[serde(default)]
    pub children: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FlatSymbol {
    name: String,
    kind: SymbolKind,
    range_start: u32,
    range_end: u32,
}

fn flatten(symbols: &[SymbolInfo], out: &mut Vec<FlatSymbol>) {
    for s in symbols {
        out.push(FlatSymbol {
            name: s.name.clone(),
            kind: s.kind,
            range_start: s.range_start,
            range_end: s.range_end,
        });
        flatten(&s.children, out);
    }
}

// ─── Detector ─────────────────────────────────────────────────────

pub struct SemanticDetector {
    /// Timestamped flat snapshots per scope.
    snapshots: ScopeWindow<Vec<FlatSymbol>>,
    /// Scope → debounce deadline. A new request replaces the prior one.
    pending: HashMap<ScopeKey, u64>,
    enabled: bool,
    debounce_ms: u64,
    churn_threshold: usize,
}

impl SemanticDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            snapshots: ScopeWindow::new(config.semantic_window_ms, config.max_events_per_scope),
            pending: HashMap::new(),
            enabled: config.semantic_enabled,
            debounce_ms: config.semantic_debounce_ms,
            churn_threshold: config.structural_churn_threshold,
        }
    }

    fn evaluate_scope(&self, scope: &str, now_ms: u64) -> Option<SignalEvent> {
        let snapshots = self.snapshots.get(scope);
        if snapshots.len() < 2 {
            return None;
        }

        let mut churn = 0usize;
        let mut cosmetic = 0usize;
        for pair in snapshots.windows(2) {
            let (c, m) = diff_snapshots(&pair[0].value, &pair[1].value);
            churn += c;
            cosmetic += m;
        }

        if churn < self.churn_threshold {
            return None;
        }
        let score = (churn as f64 / (self.churn_threshold as f64 * 2.0)).min(1.0);
        Some(
            SignalEvent::new(SignalType::Semantic, score, now_ms, Some(scope.to_owned()))
                .with_metadata(json!({
                    "pattern": "structural_churn",
                    "structural_changes": churn,
                    "cosmetic_changes": cosmetic,
                    "snapshots": snapshots.len(),
                })),
        )
    }
}

/// Diff two flat snapshots by `(kind, name)` identity. Returns
/// `(structural_changes, cosmetic_changes)`: added/removed symbols of
/// structural kinds count as structural; range-only changes to surviving
/// symbols count as cosmetic "modified".
fn diff_snapshots(prev: &[FlatSymbol], curr: &[FlatSymbol]) -> (usize, usize) {
    type Key<'a> = (SymbolKind, &'a str);

    fn index<'a>(symbols: &'a [FlatSymbol]) -> HashMap<Key<'a>, (usize, (u32, u32))> {
        let mut map: HashMap<Key<'a>, (usize, (u32, u32))> = HashMap::new();
        for s in symbols {
            let entry = map
                .entry((s.kind, s.name.as_str()))
                .or_insert((0, (s.range_start, s.range_end)));
            entry.0 += 1;
        }
        map
    }

    let before = index(prev);
    let after = index(curr);

    let mut structural = 0usize;
    let mut cosmetic = 0usize;

    for (key, (count, range)) in &before {
        match after.get(key) {
            None => {
                if key.0.is_structural() {
                    structural += count;
                }
            }
            Some((after_count, after_range)) => {
                if key.0.is_structural() && after_count != count {
                    structural += count.abs_diff(*after_count);
                }
                if range != after_range {
                    cosmetic += 1;
                }
            }
        }
    }
    for (key, (count, _)) in &after {
        if !before.contains_key(key) && key.0.is_structural() {
            structural += count;
        }
    }

    (structural, cosmetic)
}

impl SignalDetector for SemanticDetector {
    fn signal(&self) -> SignalType {
        SignalType::Semantic
    }

    fn observe(&mut self, event: &RawEvent, now_ms: u64) {
        if !self.enabled {
            return;
        }
        match event {
            RawEvent::Edit { scope, .. } => {
                if scope.is_empty() {
                    return;
                }
                // Replaces (cancels) any pending request for this scope.
                self.pending
                    .insert(scope.clone(), now_ms + self.debounce_ms);
            }
            RawEvent::SymbolSnapshot { scope, symbols } => {
                if scope.is_empty() {
                    return;
                }
                let mut flat = Vec::new();
                flatten(symbols, &mut flat);
                self.snapshots.record(scope, flat, now_ms);
            }
            _ => {}
        }
    }

    fn evaluate(&mut self, scope: Option<&str>, now_ms: u64) -> Vec<SignalEvent> {
        if !self.enabled {
            return Vec::new();
        }
        match scope {
            Some(s) => {
                self.snapshots.prune(s, now_ms);
                self.evaluate_scope(s, now_ms).into_iter().collect()
            }
            None => {
                self.snapshots.prune_all(now_ms);
                self.snapshots
                    .scope_keys()
                    .iter()
                    .filter_map(|s| self.evaluate_scope(s, now_ms))
                    .collect()
            }
        }
    }

    fn reset(&mut self, scope: Option<&str>) {
        self.snapshots.clear(scope);
        match scope {
            Some(s) => {
                self.pending.remove(s);
            }
            None => self.pending.clear(),
        }
    }

    fn dispose(&mut self) {
        self.snapshots.clear(None);
        self.pending.clear();
    }

    fn configure(&mut self, config: &EngineConfig) {
        self.snapshots
            .set_bounds(config.semantic_window_ms, config.max_events_per_scope);
        self.enabled = config.semantic_enabled;
        self.debounce_ms = config.semantic_debounce_ms;
        self.churn_threshold = config.structural_churn_threshold;
        if !self.enabled {
            self.pending.clear();
        }
    }

    fn due_symbol_requests(&mut self, now_ms: u64) -> Vec<ScopeKey> {
        if !self.enabled {
            return Vec::new();
        }
        let due: Vec<ScopeKey> = self
            .pending
            .iter()
            .filter(|&(_, &deadline)| deadline <= now_ms)
            .map(|(scope, _)| scope.clone())
            .collect();
        for scope in &due {
            self.pending.remove(scope);
        }
        due
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "file:///model.rs";

    fn enabled_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.semantic_enabled = true;
        config
    }

    fn sym(name: &str, kind: SymbolKind, start: u32, end: u32) -> SymbolInfo {
        SymbolInfo {
            name: name.into(),
            kind,
            range_start: start,
            range_end: end,
            children: Vec::new(),
        }
    }

    fn snapshot(d: &mut SemanticDetector, symbols: Vec<SymbolInfo>, now: u64) {
        d.observe(
            &RawEvent::SymbolSnapshot {
                scope: SCOPE.into(),
                symbols,
            },
            now,
        );
    }

    // ── 1. debounce ─────────────────────────────────────────────────

    #[test]
    fn edit_schedules_one_request_per_scope() {
        let mut d = SemanticDetector::new(&enabled_config());
        let edit = RawEvent::Edit {
            scope: SCOPE.into(),
            snippet: "fn".into(),
            line: 1,
        };
        d.observe(&edit, 1_000);
        d.observe(&edit, 1_500); // replaces, deadline moves to 2_500
        assert!(d.due_symbol_requests(2_000).is_empty());
        assert_eq!(d.due_symbol_requests(2_500), vec![SCOPE.to_owned()]);
        // Drained; nothing due afterwards.
        assert!(d.due_symbol_requests(3_000).is_empty());
    }

    #[test]
    fn disabled_detector_is_inert() {
        let mut d = SemanticDetector::new(&EngineConfig::default());
        d.observe(
            &RawEvent::Edit {
                scope: SCOPE.into(),
                snippet: "fn".into(),
                line: 1,
            },
            1_000,
        );
        assert!(d.due_symbol_requests(10_000).is_empty());
        assert!(d.evaluate(None, 10_000).is_empty());
    }

    // ── 2. diffing ──────────────────────────────────────────────────

    #[test]
    fn added_and_removed_functions_count_as_churn() {
        let mut d = SemanticDetector::new(&enabled_config());
        snapshot(
            &mut d,
            vec![
                sym("parse", SymbolKind::Function, 0, 10),
                sym("render", SymbolKind::Function, 11, 20),
            ],
            1_000,
        );
        // parse removed, validate + format added → 3 structural changes.
        snapshot(
            &mut d,
            vec![
                sym("render", SymbolKind::Function, 11, 20),
                sym("validate", SymbolKind::Function, 21, 30),
                sym("format", SymbolKind::Function, 31, 40),
            ],
            3_000,
        );
        snapshot(
            &mut d,
            vec![
                sym("render", SymbolKind::Function, 11, 20),
                sym("check", SymbolKind::Function, 21, 30),
            ],
            5_000,
        );
        // Second diff: validate + format removed, check added → 3 more.
        let signals = d.evaluate(Some(SCOPE), 6_000);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].metadata["structural_changes"], 6);
        // churn 6 against threshold 4 → min(1, 6/8) = 0.75.
        assert!((signals[0].score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn range_only_changes_are_cosmetic() {
        let mut d = SemanticDetector::new(&enabled_config());
        snapshot(&mut d, vec![sym("parse", SymbolKind::Function, 0, 10)], 1_000);
        snapshot(&mut d, vec![sym("parse", SymbolKind::Function, 0, 14)], 3_000);
        // Modified only: no structural churn, below threshold.
        assert!(d.evaluate(Some(SCOPE), 4_000).is_empty());
    }

    #[test]
    fn field_churn_is_not_structural() {
        let mut d = SemanticDetector::new(&enabled_config());
        snapshot(
            &mut d,
            vec![
                sym("a", SymbolKind::Field, 0, 1),
                sym("b", SymbolKind::Field, 2, 3),
            ],
            1_000,
        );
        snapshot(
            &mut d,
            vec![
                sym("c", SymbolKind::Field, 0, 1),
                sym("d", SymbolKind::Field, 2, 3),
            ],
            3_000,
        );
        assert!(d.evaluate(Some(SCOPE), 4_000).is_empty());
    }

    #[test]
    fn nested_symbols_are_flattened() {
        let mut d = SemanticDetector::new(&enabled_config());
        let class_with_methods = |methods: &[&str]| {
            vec![SymbolInfo {
                name: "Widget".into(),
                kind: SymbolKind::Class,
                range_start: 0,
                range_end: 100,
                children: methods
                    .iter()
                    .map(|m| sym(m, SymbolKind::Method, 1, 2))
                    .collect(),
            }]
        };
        snapshot(&mut d, class_with_methods(&["draw", "resize"]), 1_000);
        snapshot(&mut d, class_with_methods(&["paint", "scale"]), 3_000);
        // draw+resize removed, paint+scale added → 4 structural changes.
        let signals = d.evaluate(Some(SCOPE), 4_000);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].metadata["structural_changes"], 4);
    }

    // ── 3. lifecycle ────────────────────────────────────────────────

    #[test]
    fn reset_clears_pending_and_snapshots() {
        let mut d = SemanticDetector::new(&enabled_config());
        d.observe(
            &RawEvent::Edit {
                scope: SCOPE.into(),
                snippet: "x".into(),
                line: 1,
            },
            1_000,
        );
        snapshot(&mut d, vec![sym("f", SymbolKind::Function, 0, 1)], 1_500);
        d.reset(Some(SCOPE));
        assert!(d.due_symbol_requests(10_000).is_empty());
        assert!(d.evaluate(Some(SCOPE), 10_000).is_empty());
    }
}
