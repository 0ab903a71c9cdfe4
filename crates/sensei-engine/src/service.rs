//! Host orchestration façade.
//!
//! Translates host event shapes into raw detector events, drives the
//! injected clock, pumps debounced symbol scans through the optional
//! provider, and builds the intervention context on trigger. Every entry
//! point degrades to "no signal" rather than surfacing errors to the host.

use std::collections::HashMap;

use tracing::debug;

use sensei_core::{
    Clock, ConfigPatch, EngineConfig, ScopeKey, StruggleDecision, SystemClock, WeightsPatch,
};
use sensei_detectors::{RawEvent, UndoKind};

use crate::aggregator::SignalAggregator;
use crate::events::{
    BreakpointsEvent, ChangeReason, DebugSessionEvent, DiagnosticsEvent, DocumentChangeEvent,
    SymbolProvider, TaskEndEvent, TerminalOutputEvent,
};

/// Context snippet cap, in characters.
const SNIPPET_MAX_CHARS: usize = 500;

/// Lines of surrounding document included on each side of the edit.
const SNIPPET_CONTEXT_LINES: u32 = 2;

/// What the host gets alongside a triggering decision: enough material to
/// phrase an intervention without re-querying the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct StruggleContext {
    /// Document excerpt around the edited line, capped in length.
    pub snippet: String,
    /// Filesystem path when the scope is a `file` URI.
    pub file_path: Option<String>,
    pub language_id: String,
    /// The scope's outstanding error diagnostics.
    pub errors: Vec<String>,
}

/// A triggering decision paired with its intervention context.
#[derive(Debug, Clone, PartialEq)]
pub struct Triggered {
    pub decision: StruggleDecision,
    pub context: StruggleContext,
}

pub struct StruggleService {
    aggregator: SignalAggregator,
    clock: Box<dyn Clock>,
    provider: Option<Box<dyn SymbolProvider>>,
    active_scope: Option<ScopeKey>,
    /// Latest error set per scope, kept for context building.
    diagnostics: HashMap<ScopeKey, Vec<String>>,
}

impl StruggleService {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            aggregator: SignalAggregator::new(config),
            clock,
            provider: None,
            active_scope: None,
            diagnostics: HashMap::new(),
        }
    }

    /// Attach (or replace) the document-symbol provider.
    pub fn set_symbol_provider(&mut self, provider: Box<dyn SymbolProvider>) {
        self.provider = Some(provider);
    }

    pub fn config(&self) -> &EngineConfig {
        self.aggregator.config()
    }

    /// The most recently edited tracked scope.
    pub fn active_scope(&self) -> Option<&str> {
        self.active_scope.as_deref()
    }

    // ─── Host events ──────────────────────────────────────────────

    /// Ingest one document change and evaluate its scope.
    ///
    /// Returns the intervention material when the decision triggers.
    pub fn on_document_change(&mut self, event: &DocumentChangeEvent) -> Option<Triggered> {
        if event.scheme != "file" || event.uri.is_empty() {
            debug!(uri = %event.uri, scheme = %event.scheme, "untracked document change dropped");
            return None;
        }
        let now_ms = self.clock.now_ms();
        let scope = event.uri.clone();
        self.active_scope = Some(scope.clone());

        let raw = match event.reason {
            Some(ChangeReason::Undo) => RawEvent::UndoRedo {
                scope: scope.clone(),
                kind: UndoKind::Undo,
            },
            Some(ChangeReason::Redo) => RawEvent::UndoRedo {
                scope: scope.clone(),
                kind: UndoKind::Redo,
            },
            None => RawEvent::Edit {
                scope: scope.clone(),
                snippet: event.snippet.clone(),
                line: event.line,
            },
        };
        self.aggregator.ingest(&raw, now_ms);
        self.pump_symbol_requests(now_ms);

        let decision = self.aggregator.evaluate(Some(&scope), now_ms);
        if !decision.should_trigger {
            return None;
        }
        let context = self.build_context(event);
        Some(Triggered { decision, context })
    }

    /// Replace the scope's current error set.
    pub fn on_diagnostics_change(&mut self, event: &DiagnosticsEvent) {
        if event.scheme != "file" || event.uri.is_empty() {
            return;
        }
        let now_ms = self.clock.now_ms();
        if event.errors.is_empty() {
            self.diagnostics.remove(&event.uri);
        } else {
            self.diagnostics
                .insert(event.uri.clone(), event.errors.clone());
        }
        self.aggregator.ingest(
            &RawEvent::Diagnostics {
                scope: event.uri.clone(),
                errors: event.errors.clone(),
            },
            now_ms,
        );
    }

    pub fn on_task_end(&mut self, event: &TaskEndEvent) {
        let now_ms = self.clock.now_ms();
        self.aggregator.ingest(
            &RawEvent::TaskEnd {
                name: event.name.clone(),
                exit_code: event.exit_code,
            },
            now_ms,
        );
    }

    pub fn on_terminal_output(&mut self, event: &TerminalOutputEvent) {
        if event.text.is_empty() {
            return;
        }
        let now_ms = self.clock.now_ms();
        self.aggregator.ingest(
            &RawEvent::TerminalOutput {
                text: event.text.clone(),
            },
            now_ms,
        );
    }

    pub fn on_debug_session_start(&mut self, event: &DebugSessionEvent) {
        let now_ms = self.clock.now_ms();
        self.aggregator.ingest(
            &RawEvent::DebugSessionStart {
                session_id: event.session_id.clone(),
            },
            now_ms,
        );
    }

    pub fn on_debug_session_end(&mut self, event: &DebugSessionEvent) {
        let now_ms = self.clock.now_ms();
        self.aggregator.ingest(
            &RawEvent::DebugSessionEnd {
                session_id: event.session_id.clone(),
            },
            now_ms,
        );
    }

    pub fn on_breakpoints_change(&mut self, event: &BreakpointsEvent) {
        let now_ms = self.clock.now_ms();
        self.aggregator.ingest(
            &RawEvent::BreakpointsChanged {
                added: event.added,
                removed: event.removed,
                changed: event.changed,
            },
            now_ms,
        );
    }

    // ─── Manual surface ───────────────────────────────────────────

    /// Evaluate outside the edit path (for example on a host timer).
    pub fn evaluate(&mut self, scope: Option<&str>) -> StruggleDecision {
        let now_ms = self.clock.now_ms();
        self.pump_symbol_requests(now_ms);
        self.aggregator.evaluate(scope, now_ms)
    }

    pub fn update(&mut self, patch: &ConfigPatch) {
        self.aggregator.update(patch);
    }

    pub fn update_weights(&mut self, weights: WeightsPatch) {
        self.update(&ConfigPatch {
            weights: Some(weights),
            ..Default::default()
        });
    }

    pub fn update_threshold(&mut self, trigger_threshold: f64) {
        self.update(&ConfigPatch {
            trigger_threshold: Some(trigger_threshold),
            ..Default::default()
        });
    }

    pub fn reset(&mut self, scope: Option<&str>) {
        self.aggregator.reset(scope);
        match scope {
            Some(s) => {
                self.diagnostics.remove(s);
            }
            None => {
                self.diagnostics.clear();
                self.active_scope = None;
            }
        }
    }

    pub fn dispose(&mut self) {
        self.aggregator.dispose();
        self.diagnostics.clear();
        self.active_scope = None;
    }

    // ─── Internals ────────────────────────────────────────────────

    /// Run every due debounced symbol scan through the provider. A
    /// provider failure skips that scope's cycle at debug log level.
    fn pump_symbol_requests(&mut self, now_ms: u64) {
        let Some(provider) = self.provider.as_mut() else {
            return;
        };
        for scope in self.aggregator.due_symbol_requests(now_ms) {
            match provider.document_symbols(&scope) {
                Ok(symbols) => {
                    self.aggregator
                        .ingest(&RawEvent::SymbolSnapshot { scope, symbols }, now_ms);
                }
                Err(err) => {
                    debug!(scope = %scope, error = %err, "symbol provider unavailable, cycle skipped");
                }
            }
        }
    }

    fn build_context(&self, event: &DocumentChangeEvent) -> StruggleContext {
        let lines: Vec<&str> = event.text.lines().collect();
        let line = event.line as usize;
        let from = (event.line.saturating_sub(SNIPPET_CONTEXT_LINES)) as usize;
        let to = (line + SNIPPET_CONTEXT_LINES as usize + 1).min(lines.len());
        let snippet: String = if from < lines.len() {
            lines[from..to].join("\n").chars().take(SNIPPET_MAX_CHARS).collect()
        } else {
            String::new()
        };

        StruggleContext {
            snippet,
            file_path: event.uri.strip_prefix("file://").map(str::to_owned),
            language_id: event.language_id.clone(),
            errors: self
                .diagnostics
                .get(&event.uri)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn change(uri: &str, scheme: &str, line: u32, text: &str, snippet: &str) -> DocumentChangeEvent {
        DocumentChangeEvent {
            uri: uri.to_owned(),
            scheme: scheme.to_owned(),
            language_id: "rust".to_owned(),
            line,
            text: text.to_owned(),
            snippet: snippet.to_owned(),
            reason: None,
        }
    }

    #[test]
    fn non_file_schemes_are_dropped() {
        let mut svc = StruggleService::new(EngineConfig::default());
        let ev = change("untitled:Untitled-1", "untitled", 0, "x", "x");
        assert!(svc.on_document_change(&ev).is_none());
        assert!(svc.active_scope().is_none());
    }

    #[test]
    fn active_scope_follows_edits() {
        let mut svc = StruggleService::new(EngineConfig::default());
        let ev = change("file:///a.rs", "file", 0, "fn main() {}", "fn");
        svc.on_document_change(&ev);
        assert_eq!(svc.active_scope(), Some("file:///a.rs"));
        svc.reset(None);
        assert!(svc.active_scope().is_none());
    }

    #[test]
    fn context_snippet_is_centered_and_capped() {
        let svc = StruggleService::new(EngineConfig::default());
        let text = "l0\nl1\nl2\nl3\nl4\nl5\nl6";
        let ev = change("file:///a.rs", "file", 3, text, "l3");
        let ctx = svc.build_context(&ev);
        assert_eq!(ctx.snippet, "l1\nl2\nl3\nl4\nl5");
        assert_eq!(ctx.file_path.as_deref(), Some("/a.rs"));
    }

    #[test]
    fn context_at_document_start_clamps_the_range() {
        let svc = StruggleService::new(EngineConfig::default());
        let ev = change("file:///a.rs", "file", 0, "l0\nl1\nl2\nl3", "l0");
        let ctx = svc.build_context(&ev);
        assert_eq!(ctx.snippet, "l0\nl1\nl2");
    }

    #[test]
    fn context_line_past_end_is_empty() {
        let svc = StruggleService::new(EngineConfig::default());
        let ev = change("file:///a.rs", "file", 50, "l0\nl1", "x");
        let ctx = svc.build_context(&ev);
        assert!(ctx.snippet.is_empty());
    }

    #[test]
    fn diagnostics_feed_the_trigger_context() {
        let mut svc = StruggleService::new(EngineConfig::default());
        svc.on_diagnostics_change(&DiagnosticsEvent {
            uri: "file:///a.rs".to_owned(),
            scheme: "file".to_owned(),
            errors: vec!["E0308: mismatched types".to_owned()],
        });
        let ev = change("file:///a.rs", "file", 0, "x", "x");
        let ctx = svc.build_context(&ev);
        assert_eq!(ctx.errors, vec!["E0308: mismatched types".to_owned()]);
    }

    #[test]
    fn cleared_diagnostics_leave_no_context_errors() {
        let mut svc = StruggleService::new(EngineConfig::default());
        svc.on_diagnostics_change(&DiagnosticsEvent {
            uri: "file:///a.rs".to_owned(),
            scheme: "file".to_owned(),
            errors: vec!["E0308".to_owned()],
        });
        svc.on_diagnostics_change(&DiagnosticsEvent {
            uri: "file:///a.rs".to_owned(),
            scheme: "file".to_owned(),
            errors: Vec::new(),
        });
        let ev = change("file:///a.rs", "file", 0, "x", "x");
        assert!(svc.build_context(&ev).errors.is_empty());
    }
}
