//! The shared detector contract and the closed raw-event set.

use serde::{Deserialize, Serialize};

use sensei_core::{EngineConfig, ScopeKey, SignalEvent, SignalType};

use crate::semantic::SymbolInfo;

// ─── Raw Events ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoKind {
    Undo,
    Redo,
}

/// Raw editing events fanned out to every registered detector.
/// Each detector picks the variants it understands and ignores the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    Edit {
        scope: ScopeKey,
        snippet: String,
        line: u32,
    },
    UndoRedo {
        scope: ScopeKey,
        kind: UndoKind,
    },
    /// Full replacement of the scope's current error set.
    Diagnostics {
        scope: ScopeKey,
        errors: Vec<String>,
    },
    TaskEnd {
        name: String,
        exit_code: i32,
    },
    TerminalOutput {
        text: String,
    },
    BreakpointsChanged {
        added: u32,
        removed: u32,
        changed: u32,
    },
    DebugSessionStart {
        session_id: String,
    },
    DebugSessionEnd {
        session_id: String,
    },
    /// Result of an asynchronous document-symbol listing, delivered after
    /// the semantic detector's debounce fired.
    SymbolSnapshot {
        scope: ScopeKey,
        symbols: Vec<SymbolInfo>,
    },
}

// ─── Detector Contract ────────────────────────────────────────────

/// Capability interface shared by all six detector variants. The
/// aggregator depends only on this trait, never on concrete detectors.
pub trait SignalDetector: Send {
    /// The signal-type tag this detector is dispatched by.
    fn signal(&self) -> SignalType;

    /// Ingest a raw event. Appends to the scope's window, then prunes.
    /// Irrelevant or malformed events are silently ignored; ingestion
    /// never fails.
    fn observe(&mut self, event: &RawEvent, now_ms: u64);

    /// Evaluate one scope, or every tracked scope when `scope` is `None`.
    /// May re-prune windows, but is otherwise idempotent for a fixed
    /// clock: calling twice with no new events returns equal results.
    /// Returns an empty vec when no pattern clears its threshold.
    fn evaluate(&mut self, scope: Option<&str>, now_ms: u64) -> Vec<SignalEvent>;

    /// Clear one scope's state, or all state when `scope` is `None`.
    fn reset(&mut self, scope: Option<&str>);

    /// Release pending work and clear all state. Idempotent.
    fn dispose(&mut self);

    /// Adopt updated configuration (windows, caps, thresholds).
    fn configure(&mut self, config: &EngineConfig);

    /// Scopes whose debounced symbol-listing request has come due.
    /// Only the semantic detector overrides this.
    fn due_symbol_requests(&mut self, _now_ms: u64) -> Vec<ScopeKey> {
        Vec::new()
    }
}
