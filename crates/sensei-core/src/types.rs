use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SenseiError;

/// Identity a detector's state is partitioned by (typically a file URI).
/// `None` scope means global/cross-file.
pub type ScopeKey = String;

// ─── Signal Type ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SignalType {
    UndoRedo,
    TimePattern,
    Terminal,
    Debug,
    Semantic,
    EditPattern,
}

impl SignalType {
    pub const ALL: [Self; 6] = [
        Self::UndoRedo,
        Self::TimePattern,
        Self::Terminal,
        Self::Debug,
        Self::Semantic,
        Self::EditPattern,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UndoRedo => "undo_redo",
            Self::TimePattern => "time_pattern",
            Self::Terminal => "terminal",
            Self::Debug => "debug",
            Self::Semantic => "semantic",
            Self::EditPattern => "edit_pattern",
        }
    }

    /// Whether this signal type reasons globally rather than per file.
    pub fn is_global(self) -> bool {
        matches!(self, Self::Terminal | Self::Debug)
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = SenseiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undo_redo" => Ok(Self::UndoRedo),
            "time_pattern" => Ok(Self::TimePattern),
            "terminal" => Ok(Self::Terminal),
            "debug" => Ok(Self::Debug),
            "semantic" => Ok(Self::Semantic),
            "edit_pattern" => Ok(Self::EditPattern),
            _ => Err(SenseiError::UnknownSignalType(s.to_owned())),
        }
    }
}

// ─── Signal Event ─────────────────────────────────────────────────

/// A single scored observation produced by one detector for one evaluation.
///
/// Immutable once produced; consumed exactly once by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub signal: SignalType,
    /// Strength of the observation, clamped to [0, 1].
    pub score: f64,
    pub timestamp_ms: u64,
    /// `None` for globally-scoped detectors (terminal, debug).
    pub scope: Option<ScopeKey>,
    /// Free-form detector payload (pattern name, counts, context excerpt).
    pub metadata: serde_json::Value,
}

impl SignalEvent {
    pub fn new(signal: SignalType, score: f64, timestamp_ms: u64, scope: Option<ScopeKey>) -> Self {
        Self {
            signal,
            score: score.clamp(0.0, 1.0),
            timestamp_ms,
            scope,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// ─── Aggregated Decision ──────────────────────────────────────────

/// Output of one aggregator evaluation. Produced fresh on every call,
/// never mutated after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StruggleDecision {
    pub should_trigger: bool,
    /// Weighted combination of contributing signals, clamped to [0, 1].
    pub combined_score: f64,
    /// The signal type with the highest weighted contribution.
    pub primary_signal: Option<SignalType>,
    pub contributing: Vec<SignalEvent>,
    pub timestamp_ms: u64,
    pub scope: Option<ScopeKey>,
}

impl StruggleDecision {
    /// Non-triggering decision with no contributors (cooldown or no data).
    pub fn quiet(timestamp_ms: u64, scope: Option<ScopeKey>) -> Self {
        Self {
            should_trigger: false,
            combined_score: 0.0,
            primary_signal: None,
            contributing: Vec::new(),
            timestamp_ms,
            scope,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_type_serde_roundtrip() {
        for s in SignalType::ALL {
            let json = serde_json::to_string(&s).expect("serialize");
            let back: SignalType = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(s, back);
        }
    }

    #[test]
    fn signal_type_display_and_parse() {
        for s in SignalType::ALL {
            let parsed = s.to_string().parse::<SignalType>().expect("parse");
            assert_eq!(s, parsed);
        }
    }

    #[test]
    fn unknown_signal_type_rejected() {
        assert!("keyboard".parse::<SignalType>().is_err());
    }

    #[test]
    fn global_signal_types() {
        assert!(SignalType::Terminal.is_global());
        assert!(SignalType::Debug.is_global());
        assert!(!SignalType::EditPattern.is_global());
    }

    #[test]
    fn signal_event_score_is_clamped() {
        let ev = SignalEvent::new(SignalType::Terminal, 1.7, 1000, None);
        assert_eq!(ev.score, 1.0);
        let ev = SignalEvent::new(SignalType::Terminal, -0.3, 1000, None);
        assert_eq!(ev.score, 0.0);
    }

    #[test]
    fn quiet_decision_shape() {
        let d = StruggleDecision::quiet(42, Some("file:///a.rs".into()));
        assert!(!d.should_trigger);
        assert_eq!(d.combined_score, 0.0);
        assert!(d.primary_signal.is_none());
        assert!(d.contributing.is_empty());
        assert_eq!(d.timestamp_ms, 42);
    }
}
