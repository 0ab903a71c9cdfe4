//! Repeated-attempt detection over a scope's edit and error logs.
//!
//! The legacy-compatible, lower-weight detector: retry attempts found via
//! the normalized edit-distance metric, plus outstanding-error count and
//! raw edit frequency. The strongest of the three sub-scores is reported,
//! tagged with the pattern that produced it.

use std::collections::HashMap;

use serde_json::json;

use sensei_core::similarity::{normalize_snippet, normalized_distance};
use sensei_core::{EngineConfig, ScopeKey, SignalEvent, SignalType};

use crate::detector::{RawEvent, SignalDetector};
use crate::window::ScopeWindow;

#[derive(Debug, Clone, PartialEq, Eq)]
struct EditRecord {
    snippet: String,
    line: u32,
}

pub struct EditPatternDetector {
    edits: ScopeWindow<EditRecord>,
    /// Current error set per scope, replaced wholesale on each
    /// diagnostics change.
    errors: HashMap<ScopeKey, Vec<String>>,
    window_ms: u64,
    similarity_threshold: f64,
    retry_attempt_threshold: usize,
    retry_compare_depth: usize,
    retry_line_tolerance: u32,
    error_count_threshold: usize,
    edit_frequency_threshold: f64,
    max_snippet_len: usize,
    max_tracked_errors: usize,
}

impl EditPatternDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            edits: ScopeWindow::new(config.edit_window_ms, config.max_events_per_scope),
            errors: HashMap::new(),
            window_ms: config.edit_window_ms,
            similarity_threshold: config.similarity_threshold,
            retry_attempt_threshold: config.retry_attempt_threshold,
            retry_compare_depth: config.retry_compare_depth,
            retry_line_tolerance: config.retry_line_tolerance,
            error_count_threshold: config.error_count_threshold,
            edit_frequency_threshold: config.edit_frequency_threshold,
            max_snippet_len: config.max_snippet_len,
            max_tracked_errors: config.max_tracked_errors,
        }
    }

    /// Count how many recent edits look like retries of the same attempt.
    ///
    /// Walks prior edits newest-first within the line tolerance. The
    /// comparison reference follows the matched prior, so gradually
    /// drifting rewrites of the same line chain into one attempt run.
    fn retry_attempts(&self, edits: &[EditRecord]) -> usize {
        let Some(latest) = edits.last() else { return 0 };
        let mut attempts = 1;
        let mut reference = latest.snippet.as_str();
        let mut compared = 0;
        for prior in edits.iter().rev().skip(1) {
            if compared >= self.retry_compare_depth {
                break;
            }
            if prior.line.abs_diff(latest.line) > self.retry_line_tolerance {
                continue;
            }
            compared += 1;
            if normalized_distance(reference, &prior.snippet) <= self.similarity_threshold {
                attempts += 1;
                reference = prior.snippet.as_str();
            }
        }
        attempts
    }

    fn evaluate_scope(&self, scope: &str, now_ms: u64) -> Option<SignalEvent> {
        let records: Vec<EditRecord> = self
            .edits
            .get(scope)
            .iter()
            .map(|e| e.value.clone())
            .collect();
        let error_count = self.errors.get(scope).map_or(0, Vec::len);

        let attempts = if records.len() >= 2 {
            self.retry_attempts(&records)
        } else {
            0
        };
        let retry_score = if attempts >= self.retry_attempt_threshold {
            (attempts as f64 / (self.retry_attempt_threshold as f64 * 2.0)).min(1.0)
        } else {
            0.0
        };

        let error_score = if error_count >= self.error_count_threshold {
            (error_count as f64 / (self.error_count_threshold as f64 * 2.0)).min(1.0)
        } else {
            0.0
        };

        let per_minute = records.len() as f64 / (self.window_ms as f64 / 60_000.0);
        let frequency_score = if per_minute >= self.edit_frequency_threshold {
            (per_minute / (self.edit_frequency_threshold * 2.0)).min(1.0)
        } else {
            0.0
        };

        // Highest wins; ties resolve by the declared order.
        let candidates = [
            ("retries", retry_score),
            ("errors", error_score),
            ("frequency", frequency_score),
        ];
        let (pattern, score) = candidates
            .into_iter()
            .fold(("", 0.0f64), |best, c| if c.1 > best.1 { c } else { best });
        if score <= 0.0 {
            return None;
        }

        Some(
            SignalEvent::new(SignalType::EditPattern, score, now_ms, Some(scope.to_owned()))
                .with_metadata(json!({
                    "pattern": pattern,
                    "retry_attempts": attempts,
                    "error_count": error_count,
                    "edits_per_minute": per_minute,
                })),
        )
    }
}

impl SignalDetector for EditPatternDetector {
    fn signal(&self) -> SignalType {
        SignalType::EditPattern
    }

    fn observe(&mut self, event: &RawEvent, now_ms: u64) {
        match event {
            RawEvent::Edit {
                scope,
                snippet,
                line,
            } => {
                if scope.is_empty() {
                    return;
                }
                let record = EditRecord {
                    snippet: normalize_snippet(snippet, self.max_snippet_len),
                    line: *line,
                };
                self.edits.record(scope, record, now_ms);
            }
            RawEvent::Diagnostics { scope, errors } => {
                if scope.is_empty() {
                    return;
                }
                // Replace the full current error set: dedup, trim, cap.
                let mut seen: Vec<String> = Vec::new();
                for err in errors {
                    let trimmed = err.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if seen.iter().any(|s| s == trimmed) {
                        continue;
                    }
                    seen.push(trimmed.to_owned());
                    if seen.len() >= self.max_tracked_errors {
                        break;
                    }
                }
                if seen.is_empty() {
                    self.errors.remove(scope);
                } else {
                    self.errors.insert(scope.clone(), seen);
                }
            }
            _ => {}
        }
    }

    fn evaluate(&mut self, scope: Option<&str>, now_ms: u64) -> Vec<SignalEvent> {
        match scope {
            Some(s) => {
                self.edits.prune(s, now_ms);
                self.evaluate_scope(s, now_ms).into_iter().collect()
            }
            None => {
                self.edits.prune_all(now_ms);
                let mut scopes = self.edits.scope_keys();
                for scope in self.errors.keys() {
                    if !scopes.contains(scope) {
                        scopes.push(scope.clone());
                    }
                }
                scopes
                    .iter()
                    .filter_map(|s| self.evaluate_scope(s, now_ms))
                    .collect()
            }
        }
    }

    fn reset(&mut self, scope: Option<&str>) {
        self.edits.clear(scope);
        match scope {
            Some(s) => {
                self.errors.remove(s);
            }
            None => self.errors.clear(),
        }
    }

    fn dispose(&mut self) {
        self.edits.clear(None);
        self.errors.clear();
    }

    fn configure(&mut self, config: &EngineConfig) {
        self.edits
            .set_bounds(config.edit_window_ms, config.max_events_per_scope);
        self.window_ms = config.edit_window_ms;
        self.similarity_threshold = config.similarity_threshold;
        self.retry_attempt_threshold = config.retry_attempt_threshold;
        self.retry_compare_depth = config.retry_compare_depth;
        self.retry_line_tolerance = config.retry_line_tolerance;
        self.error_count_threshold = config.error_count_threshold;
        self.edit_frequency_threshold = config.edit_frequency_threshold;
        self.max_snippet_len = config.max_snippet_len;
        self.max_tracked_errors = config.max_tracked_errors;
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "file:///app.ts";

    fn detector() -> EditPatternDetector {
        EditPatternDetector::new(&EngineConfig::default())
    }

    fn edit(d: &mut EditPatternDetector, snippet: &str, line: u32, now: u64) {
        d.observe(
            &RawEvent::Edit {
                scope: SCOPE.into(),
                snippet: snippet.into(),
                line,
            },
            now,
        );
    }

    fn diagnostics(d: &mut EditPatternDetector, errors: &[&str], now: u64) {
        d.observe(
            &RawEvent::Diagnostics {
                scope: SCOPE.into(),
                errors: errors.iter().map(|s| (*s).to_owned()).collect(),
            },
            now,
        );
    }

    // ── 1. retries ──────────────────────────────────────────────────

    #[test]
    fn three_similar_edits_on_one_line_flag_retries() {
        let mut d = detector();
        edit(&mut d, "let total = items.lenght;", 10, 0);
        edit(&mut d, "let total = items.length;", 10, 60_000);
        edit(&mut d, "let total = items.length ;", 10, 120_000);
        let signals = d.evaluate(Some(SCOPE), 120_000);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].metadata["pattern"], "retries");
        assert!(signals[0].score >= 0.5);
    }

    #[test]
    fn dissimilar_edits_do_not_chain() {
        let mut d = detector();
        edit(&mut d, "import { render } from 'react';", 1, 0);
        edit(&mut d, "const x = compute(a, b);", 1, 1_000);
        edit(&mut d, "return <div>{x}</div>;", 1, 2_000);
        assert!(d.evaluate(Some(SCOPE), 3_000).is_empty());
    }

    #[test]
    fn distant_lines_do_not_count_as_retries() {
        let mut d = detector();
        edit(&mut d, "foo = 1", 10, 0);
        edit(&mut d, "foo = 1;", 80, 1_000);
        edit(&mut d, "foo = 1 ;", 10, 2_000);
        // The middle edit is on a distant line, so the chain cannot
        // bridge the drift between the first and last snippets.
        assert!(d.evaluate(Some(SCOPE), 3_000).is_empty());
    }

    #[test]
    fn drifting_rewrites_chain_through_the_reference() {
        let mut d = detector();
        // First and third differ by more than the threshold, but each
        // consecutive pair is within it.
        edit(&mut d, "foo = 1", 10, 0);
        edit(&mut d, "foo = 1;", 10, 1_000);
        edit(&mut d, "foo = 1 ;", 10, 2_000);
        let signals = d.evaluate(Some(SCOPE), 2_000);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].metadata["retry_attempts"], 3);
        assert!((signals[0].score - 0.5).abs() < 1e-9);
    }

    // ── 2. errors ───────────────────────────────────────────────────

    #[test]
    fn error_set_is_replaced_not_appended() {
        let mut d = detector();
        diagnostics(&mut d, &["E0308", "E0502", "E0499"], 1_000);
        diagnostics(&mut d, &["E0308"], 2_000);
        // One outstanding error is below the threshold of 3.
        assert!(d.evaluate(Some(SCOPE), 3_000).is_empty());
    }

    #[test]
    fn outstanding_errors_flag() {
        let mut d = detector();
        diagnostics(&mut d, &["E0308", "E0502", "E0499", "E0599"], 1_000);
        let signals = d.evaluate(Some(SCOPE), 2_000);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].metadata["pattern"], "errors");
        // 4 errors against threshold 3 → 4/6.
        assert!((signals[0].score - 4.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn errors_are_deduped_and_trimmed() {
        let mut d = detector();
        diagnostics(&mut d, &["  E0308 ", "E0308", "", "   "], 1_000);
        assert!(d.evaluate(Some(SCOPE), 2_000).is_empty());
        assert_eq!(d.errors.get(SCOPE).map(Vec::len), Some(1));
    }

    #[test]
    fn clearing_diagnostics_clears_the_log() {
        let mut d = detector();
        diagnostics(&mut d, &["E0308", "E0502", "E0499"], 1_000);
        diagnostics(&mut d, &[], 2_000);
        assert!(d.evaluate(Some(SCOPE), 3_000).is_empty());
        assert!(d.errors.is_empty());
    }

    // ── 3. frequency ────────────────────────────────────────────────

    #[test]
    fn rapid_unrelated_edits_flag_frequency() {
        let mut config = EngineConfig::default();
        config.edit_window_ms = 60_000;
        config.edit_frequency_threshold = 10.0;
        config.max_events_per_scope = 100;
        let mut d = EditPatternDetector::new(&config);
        // 12 distinct edits inside one minute → 12 edits/min.
        for i in 0..12u32 {
            edit(&mut d, &format!("unrelated line number {i}"), i * 7, u64::from(i) * 4_000);
        }
        let signals = d.evaluate(Some(SCOPE), 46_000);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].metadata["pattern"], "frequency");
        // 12/min against threshold 10 → 12/20 = 0.6.
        assert!((signals[0].score - 0.6).abs() < 1e-9);
    }

    // ── 4. lifecycle ────────────────────────────────────────────────

    #[test]
    fn evaluate_is_idempotent() {
        let mut d = detector();
        edit(&mut d, "foo = 1", 10, 0);
        edit(&mut d, "foo = 1;", 10, 1_000);
        edit(&mut d, "foo = 1 ;", 10, 2_000);
        let a = d.evaluate(Some(SCOPE), 3_000);
        let b = d.evaluate(Some(SCOPE), 3_000);
        assert_eq!(a, b);
    }

    #[test]
    fn old_edits_fall_out_of_the_window() {
        let mut d = detector();
        edit(&mut d, "foo = 1", 10, 0);
        edit(&mut d, "foo = 1;", 10, 1_000);
        edit(&mut d, "foo = 1 ;", 10, 2_000);
        // Default edit window is 5 minutes.
        assert!(d.evaluate(Some(SCOPE), 600_000).is_empty());
    }

    #[test]
    fn reset_clears_edits_and_errors() {
        let mut d = detector();
        edit(&mut d, "foo = 1", 10, 0);
        diagnostics(&mut d, &["E0308", "E0502", "E0499"], 500);
        d.reset(Some(SCOPE));
        assert!(d.evaluate(Some(SCOPE), 1_000).is_empty());
    }
}
