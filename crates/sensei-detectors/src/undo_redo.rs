//! Undo/redo volume and cycling detection.

use serde_json::json;
use tracing::trace;

use sensei_core::{EngineConfig, SignalEvent, SignalType};

use crate::detector::{RawEvent, SignalDetector, UndoKind};
use crate::window::ScopeWindow;

pub struct UndoRedoDetector {
    ticks: ScopeWindow<UndoKind>,
    min_undo_count: usize,
    min_undo_cycles: usize,
}

impl UndoRedoDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            ticks: ScopeWindow::new(config.undo_window_ms, config.max_events_per_scope),
            min_undo_count: config.min_undo_count,
            min_undo_cycles: config.min_undo_cycles,
        }
    }

    fn evaluate_scope(&self, scope: &str, now_ms: u64) -> Option<SignalEvent> {
        let kinds: Vec<UndoKind> = self.ticks.get(scope).iter().map(|e| e.value).collect();
        let count = kinds.len();
        let cycles = detect_cycles(&kinds);

        let volume_score = if count >= self.min_undo_count {
            sub_score(count, self.min_undo_count)
        } else {
            0.0
        };
        // Alternating undo/redo triads are the stronger "cycling" signal.
        let cycle_score = if cycles >= self.min_undo_cycles {
            sub_score(cycles, self.min_undo_cycles)
        } else {
            0.0
        };

        let score = volume_score.max(cycle_score);
        if score <= 0.0 {
            return None;
        }
        let pattern = if cycle_score >= volume_score {
            "cycling"
        } else {
            "volume"
        };
        Some(
            SignalEvent::new(SignalType::UndoRedo, score, now_ms, Some(scope.to_owned()))
                .with_metadata(json!({
                    "pattern": pattern,
                    "tick_count": count,
                    "cycles": cycles,
                })),
        )
    }
}

fn sub_score(count: usize, threshold: usize) -> f64 {
    (count as f64 / (threshold as f64 * 2.0)).min(1.0)
}

/// Count alternating triads (`undo,redo,undo` or `redo,undo,redo`) with
/// index skip-ahead so overlapping triads are not double counted: after a
/// match the next triad may start at the matched triad's last element.
pub fn detect_cycles(kinds: &[UndoKind]) -> usize {
    let mut cycles = 0;
    let mut i = 0;
    while i + 3 <= kinds.len() {
        if kinds[i] != kinds[i + 1] && kinds[i] == kinds[i + 2] {
            cycles += 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    cycles
}

impl SignalDetector for UndoRedoDetector {
    fn signal(&self) -> SignalType {
        SignalType::UndoRedo
    }

    fn observe(&mut self, event: &RawEvent, now_ms: u64) {
        if let RawEvent::UndoRedo { scope, kind } = event {
            if scope.is_empty() {
                trace!("undo/redo tick without a scope dropped");
                return;
            }
            self.ticks.record(scope, *kind, now_ms);
        }
    }

    fn evaluate(&mut self, scope: Option<&str>, now_ms: u64) -> Vec<SignalEvent> {
        match scope {
            Some(s) => {
                self.ticks.prune(s, now_ms);
                self.evaluate_scope(s, now_ms).into_iter().collect()
            }
            None => {
                self.ticks.prune_all(now_ms);
                self.ticks
                    .scope_keys()
                    .iter()
                    .filter_map(|s| self.evaluate_scope(s, now_ms))
                    .collect()
            }
        }
    }

    fn reset(&mut self, scope: Option<&str>) {
        self.ticks.clear(scope);
    }

    fn dispose(&mut self) {
        self.ticks.clear(None);
    }

    fn configure(&mut self, config: &EngineConfig) {
        self.ticks
            .set_bounds(config.undo_window_ms, config.max_events_per_scope);
        self.min_undo_count = config.min_undo_count;
        self.min_undo_cycles = config.min_undo_cycles;
    }
}

// ─── Tests ────────────────────────────────────────────────────────
