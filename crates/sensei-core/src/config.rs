//! Flat configuration surface for detectors and the aggregator.
//!
//! Construction applies defaults; runtime updates shallow-merge a partial
//! patch into the existing configuration (weights merged key-by-key).
//! No validation: updates are accepted as given, the caller is responsible.

use serde::{Deserialize, Serialize};

use crate::types::SignalType;

// ─── Weights ──────────────────────────────────────────────────────

/// Per-signal-type weight map. Defaults sum to 1.0 across six types.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub undo_redo: f64,
    pub time_pattern: f64,
    pub terminal: f64,
    pub debug: f64,
    pub semantic: f64,
    pub edit_pattern: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            undo_redo: 0.15,
            time_pattern: 0.20,
            terminal: 0.20,
            debug: 0.15,
            semantic: 0.20,
            edit_pattern: 0.10,
        }
    }
}

impl SignalWeights {
    pub fn get(&self, signal: SignalType) -> f64 {
        match signal {
            SignalType::UndoRedo => self.undo_redo,
            SignalType::TimePattern => self.time_pattern,
            SignalType::Terminal => self.terminal,
            SignalType::Debug => self.debug,
            SignalType::Semantic => self.semantic,
            SignalType::EditPattern => self.edit_pattern,
        }
    }

    pub fn set(&mut self, signal: SignalType, weight: f64) {
        match signal {
            SignalType::UndoRedo => self.undo_redo = weight,
            SignalType::TimePattern => self.time_pattern = weight,
            SignalType::Terminal => self.terminal = weight,
            SignalType::Debug => self.debug = weight,
            SignalType::Semantic => self.semantic = weight,
            SignalType::EditPattern => self.edit_pattern = weight,
        }
    }

    /// Merge the given partial weights key-by-key.
    pub fn apply(&mut self, patch: &WeightsPatch) {
        for signal in SignalType::ALL {
            if let Some(w) = patch.get(signal) {
                self.set(signal, w);
            }
        }
    }
}

/// Partial weight override; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightsPatch {
    pub undo_redo: Option<f64>,
    pub time_pattern: Option<f64>,
    pub terminal: Option<f64>,
    pub debug: Option<f64>,
    pub semantic: Option<f64>,
    pub edit_pattern: Option<f64>,
}

impl WeightsPatch {
    pub fn get(&self, signal: SignalType) -> Option<f64> {
        match signal {
            SignalType::UndoRedo => self.undo_redo,
            SignalType::TimePattern => self.time_pattern,
            SignalType::Terminal => self.terminal,
            SignalType::Debug => self.debug,
            SignalType::Semantic => self.semantic,
            SignalType::EditPattern => self.edit_pattern,
        }
    }
}

// ─── Engine Config ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // Aggregator
    /// Combined score at or above which a decision triggers.
    pub trigger_threshold: f64,
    /// Suppression period after a trigger (per scope and global).
    pub cooldown_ms: u64,
    pub weights: SignalWeights,
    /// Hard cap on any detector's per-scope window length.
    pub max_events_per_scope: usize,

    // Undo/redo detector
    pub undo_window_ms: u64,
    pub min_undo_count: usize,
    pub min_undo_cycles: usize,

    // Time-pattern detector
    pub time_window_ms: u64,
    /// Inter-edit gap at or above which a pause counts as hesitation.
    pub hesitation_ms: u64,
    /// Activity must resume within this much of the pause's end.
    pub hesitation_grace_ms: u64,
    /// Max spacing between edits that still counts as one burst/cluster.
    pub burst_gap_ms: u64,
    pub burst_min_edits: usize,
    pub start_stop_min_cycles: usize,

    // Terminal detector
    pub terminal_window_ms: u64,
    pub failed_task_threshold: usize,
    /// Context extracted around a terminal pattern match, in characters.
    pub terminal_context_max_chars: usize,

    // Debug detector
    pub debug_window_ms: u64,
    pub breakpoint_churn_threshold: usize,
    pub short_session_ms: u64,
    pub short_session_count: usize,

    // Semantic detector
    pub semantic_enabled: bool,
    pub semantic_window_ms: u64,
    pub semantic_debounce_ms: u64,
    pub structural_churn_threshold: usize,

    // Edit-pattern detector
    pub edit_window_ms: u64,
    /// Normalized distance at or below which two snippets are one attempt.
    /// Lower is stricter.
    pub similarity_threshold: f64,
    pub retry_attempt_threshold: usize,
    /// How many prior edits the latest edit is compared against.
    pub retry_compare_depth: usize,
    /// Line distance within which edits are considered the same attempt site.
    pub retry_line_tolerance: u32,
    pub error_count_threshold: usize,
    /// Edits per minute at or above which frequency is reportable.
    pub edit_frequency_threshold: f64,
    pub max_snippet_len: usize,
    pub max_tracked_errors: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: 0.5,
            cooldown_ms: 120_000,
            weights: SignalWeights::default(),
            max_events_per_scope: 100,

            undo_window_ms: 60_000,
            min_undo_count: 6,
            min_undo_cycles: 2,

            time_window_ms: 300_000,
            hesitation_ms: 15_000,
            hesitation_grace_ms: 30_000,
            burst_gap_ms: 2_000,
            burst_min_edits: 4,
            start_stop_min_cycles: 2,

            terminal_window_ms: 180_000,
            failed_task_threshold: 2,
            terminal_context_max_chars: 500,

            debug_window_ms: 300_000,
            breakpoint_churn_threshold: 6,
            short_session_ms: 20_000,
            short_session_count: 3,

            semantic_enabled: false,
            semantic_window_ms: 600_000,
            semantic_debounce_ms: 1_000,
            structural_churn_threshold: 4,

            edit_window_ms: 300_000,
            similarity_threshold: 0.2,
            retry_attempt_threshold: 3,
            retry_compare_depth: 10,
            retry_line_tolerance: 2,
            error_count_threshold: 3,
            edit_frequency_threshold: 10.0,
            max_snippet_len: 200,
            max_tracked_errors: 20,
        }
    }
}

impl EngineConfig {
    /// Defaults with a partial override applied on top.
    pub fn with_patch(patch: &ConfigPatch) -> Self {
        let mut config = Self::default();
        config.apply(patch);
        config
    }

    /// Shallow-merge the patch into this configuration.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = patch.$field {
                    self.$field = v;
                })*
            };
        }
        merge!(
            trigger_threshold,
            cooldown_ms,
            max_events_per_scope,
            undo_window_ms,
            min_undo_count,
            min_undo_cycles,
            time_window_ms,
            hesitation_ms,
            hesitation_grace_ms,
            burst_gap_ms,
            burst_min_edits,
            start_stop_min_cycles,
            terminal_window_ms,
            failed_task_threshold,
            terminal_context_max_chars,
            debug_window_ms,
            breakpoint_churn_threshold,
            short_session_ms,
            short_session_count,
            semantic_enabled,
            semantic_window_ms,
            semantic_debounce_ms,
            structural_churn_threshold,
            edit_window_ms,
            similarity_threshold,
            retry_attempt_threshold,
            retry_compare_depth,
            retry_line_tolerance,
            error_count_threshold,
            edit_frequency_threshold,
            max_snippet_len,
            max_tracked_errors,
        );
        if let Some(weights) = &patch.weights {
            self.weights.apply(weights);
        }
    }
}

/// Partial configuration override; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub trigger_threshold: Option<f64>,
    pub cooldown_ms: Option<u64>,
    pub weights: Option<WeightsPatch>,
    pub max_events_per_scope: Option<usize>,

    pub undo_window_ms: Option<u64>,
    pub min_undo_count: Option<usize>,
    pub min_undo_cycles: Option<usize>,

    pub time_window_ms: Option<u64>,
    pub hesitation_ms: Option<u64>,
    pub hesitation_grace_ms: Option<u64>,
    pub burst_gap_ms: Option<u64>,
    pub burst_min_edits: Option<usize>,
    pub start_stop_min_cycles: Option<usize>,

    pub terminal_window_ms: Option<u64>,
    pub failed_task_threshold: Option<usize>,
    pub terminal_context_max_chars: Option<usize>,

    pub debug_window_ms: Option<u64>,
    pub breakpoint_churn_threshold: Option<usize>,
    pub short_session_ms: Option<u64>,
    pub short_session_count: Option<usize>,

    pub semantic_enabled: Option<bool>,
    pub semantic_window_ms: Option<u64>,
    pub semantic_debounce_ms: Option<u64>,
    pub structural_churn_threshold: Option<usize>,

    pub edit_window_ms: Option<u64>,
    pub similarity_threshold: Option<f64>,
    pub retry_attempt_threshold: Option<usize>,
    pub retry_compare_depth: Option<usize>,
    pub retry_line_tolerance: Option<u32>,
    pub error_count_threshold: Option<usize>,
    pub edit_frequency_threshold: Option<f64>,
    pub max_snippet_len: Option<usize>,
    pub max_tracked_errors: Option<usize>,
}

// ─── Tests ────────────────────────────────────────────────────────
