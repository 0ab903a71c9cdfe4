//! Build/test failure detection over task completions and terminal output.
//!
//! Globally scoped: one window across all files, signals carry no scope.

use serde_json::json;

use sensei_core::{EngineConfig, SignalEvent, SignalType};

use crate::detector::{RawEvent, SignalDetector};
use crate::patterns::{FailureMatch, match_failure};
use crate::window::ScopeWindow;

/// Key under which globally-scoped windows store their single sequence.
const GLOBAL: &str = "<global>";

/// Terminal-error sub-score saturates at 3 matched events.
const ERROR_SATURATION: f64 = 3.0;

pub struct TerminalDetector {
    /// Failed task names (non-zero exit).
    failed_tasks: ScopeWindow<String>,
    /// Pattern hits with bounded context excerpts.
    errors: ScopeWindow<FailureMatch>,
    failed_task_threshold: usize,
    context_max_chars: usize,
}

impl TerminalDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            failed_tasks: ScopeWindow::new(config.terminal_window_ms, config.max_events_per_scope),
            errors: ScopeWindow::new(config.terminal_window_ms, config.max_events_per_scope),
            failed_task_threshold: config.failed_task_threshold,
            context_max_chars: config.terminal_context_max_chars,
        }
    }

    fn evaluate_global(&self, now_ms: u64) -> Option<SignalEvent> {
        let failed = self.failed_tasks.len(GLOBAL);
        let errors = self.errors.get(GLOBAL);

        let failed_score = if failed >= self.failed_task_threshold {
            (failed as f64 / (self.failed_task_threshold as f64 * 2.0)).min(1.0)
        } else {
            0.0
        };
        let error_score = if errors.is_empty() {
            0.0
        } else {
            (errors.len() as f64 / ERROR_SATURATION).min(1.0)
        };

        let score = failed_score.max(error_score);
        if score <= 0.0 {
            return None;
        }

        let last = errors.last().map(|e| &e.value);
        Some(
            SignalEvent::new(SignalType::Terminal, score, now_ms, None).with_metadata(json!({
                "pattern": if failed_score >= error_score { "failed_tasks" } else { "terminal_errors" },
                "failed_task_count": failed,
                "error_event_count": errors.len(),
                "last_family": last.map(|m| m.family),
                "context": last.map(|m| m.context.clone()),
            })),
        )
    }
}

impl SignalDetector for TerminalDetector {
    fn signal(&self) -> SignalType {
        SignalType::Terminal
    }

    fn observe(&mut self, event: &RawEvent, now_ms: u64) {
        match event {
            RawEvent::TaskEnd { name, exit_code } => {
                if *exit_code != 0 {
                    self.failed_tasks.record(GLOBAL, name.clone(), now_ms);
                }
            }
            RawEvent::TerminalOutput { text } => {
                if text.is_empty() {
                    return;
                }
                if let Some(hit) = match_failure(text, self.context_max_chars) {
                    self.errors.record(GLOBAL, hit, now_ms);
                }
            }
            _ => {}
        }
    }

    fn evaluate(&mut self, _scope: Option<&str>, now_ms: u64) -> Vec<SignalEvent> {
        self.failed_tasks.prune(GLOBAL, now_ms);
        self.errors.prune(GLOBAL, now_ms);
        self.evaluate_global(now_ms).into_iter().collect()
    }

    fn reset(&mut self, scope: Option<&str>) {
        // Global detector: any reset clears the single global window.
        if scope.is_none() || scope == Some(GLOBAL) {
            self.failed_tasks.clear(None);
            self.errors.clear(None);
        }
    }

    fn dispose(&mut self) {
        self.failed_tasks.clear(None);
        self.errors.clear(None);
    }

    fn configure(&mut self, config: &EngineConfig) {
        self.failed_tasks
            .set_bounds(config.terminal_window_ms, config.max_events_per_scope);
        self.errors
            .set_bounds(config.terminal_window_ms, config.max_events_per_scope);
        self.failed_task_threshold = config.failed_task_threshold;
        self.context_max_chars = config.terminal_context_max_chars;
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> TerminalDetector {
        TerminalDetector::new(&EngineConfig::default())
    }

    fn task(d: &mut TerminalDetector, exit: i32, now: u64) {
        d.observe(
            &RawEvent::TaskEnd {
                name: "cargo test".into(),
                exit_code: exit,
            },
            now,
        );
    }

    // ── 1. failed tasks ─────────────────────────────────────────────

    #[test]
    fn single_failure_below_threshold_is_silent() {
        let mut d = detector();
        task(&mut d, 1, 1_000);
        assert!(d.evaluate(None, 2_000).is_empty());
    }

    #[test]
    fn repeated_failures_flag() {
        let mut d = detector();
        task(&mut d, 1, 1_000);
        task(&mut d, 101, 5_000);
        let signals = d.evaluate(None, 6_000);
        assert_eq!(signals.len(), 1);
        assert!(signals[0].scope.is_none(), "terminal reasons globally");
        // 2 failures against threshold 2 → 2/4 = 0.5.
        assert!((signals[0].score - 0.5).abs() < 1e-9);
        assert_eq!(signals[0].metadata["pattern"], "failed_tasks");
    }

    #[test]
    fn successful_tasks_ignored() {
        let mut d = detector();
        task(&mut d, 0, 1_000);
        task(&mut d, 0, 2_000);
        assert!(d.evaluate(None, 3_000).is_empty());
    }

    // ── 2. terminal output ──────────────────────────────────────────

    #[test]
    fn matched_output_scores_by_event_count() {
        let mut d = detector();
        d.observe(
            &RawEvent::TerminalOutput {
                text: "thread 'main' panicked at src/lib.rs:9:1".into(),
            },
            1_000,
        );
        let signals = d.evaluate(None, 2_000);
        assert_eq!(signals.len(), 1);
        // 1 error event / 3 saturation.
        assert!((signals[0].score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(signals[0].metadata["pattern"], "terminal_errors");
        assert_eq!(signals[0].metadata["last_family"], "rust_panic");
        assert!(
            signals[0].metadata["context"]
                .as_str()
                .expect("context string")
                .contains("panicked")
        );
    }

    #[test]
    fn unmatched_output_ignored() {
        let mut d = detector();
        d.observe(
            &RawEvent::TerminalOutput {
                text: "Compiling sensei v0.1.0\nFinished in 2.1s".into(),
            },
            1_000,
        );
        assert!(d.evaluate(None, 2_000).is_empty());
    }

    #[test]
    fn error_score_saturates_at_three() {
        let mut d = detector();
        for i in 0..5u64 {
            d.observe(
                &RawEvent::TerminalOutput {
                    text: "FAIL src/a.test.ts".into(),
                },
                1_000 + i,
            );
        }
        let signals = d.evaluate(None, 2_000);
        assert_eq!(signals[0].score, 1.0);
    }

    // ── 3. window and lifecycle ─────────────────────────────────────

    #[test]
    fn failures_expire_with_the_window() {
        let mut d = detector();
        task(&mut d, 1, 1_000);
        task(&mut d, 1, 2_000);
        // Default terminal window is 3 minutes.
        assert!(d.evaluate(None, 400_000).is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut d = detector();
        task(&mut d, 1, 1_000);
        task(&mut d, 1, 2_000);
        d.reset(None);
        assert!(d.evaluate(None, 3_000).is_empty());
    }
}
