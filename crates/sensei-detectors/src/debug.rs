//! Debugger usage patterns: breakpoint thrashing and repeated short
//! sessions. Globally scoped, like the terminal detector.

use std::collections::HashMap;

use serde_json::json;
use tracing::trace;

use sensei_core::{EngineConfig, SignalEvent, SignalType};

use crate::detector::{RawEvent, SignalDetector};
use crate::window::ScopeWindow;

const GLOBAL: &str = "<global>";

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionRecord {
    session_id: String,
    duration_ms: u64,
}

pub struct DebugDetector {
    /// Cumulative breakpoint delta per change notification.
    breakpoint_deltas: ScopeWindow<u32>,
    /// Completed sessions, recorded at session end.
    sessions: ScopeWindow<SessionRecord>,
    /// Session id → start timestamp, for pairing start/end notifications.
    pending_starts: HashMap<String, u64>,
    churn_threshold: usize,
    short_session_ms: u64,
    short_session_count: usize,
}

impl DebugDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            breakpoint_deltas: ScopeWindow::new(
                config.debug_window_ms,
                config.max_events_per_scope,
            ),
            sessions: ScopeWindow::new(config.debug_window_ms, config.max_events_per_scope),
            pending_starts: HashMap::new(),
            churn_threshold: config.breakpoint_churn_threshold,
            short_session_ms: config.short_session_ms,
            short_session_count: config.short_session_count,
        }
    }

    fn evaluate_global(&self, now_ms: u64) -> Option<SignalEvent> {
        let churn: u32 = self
            .breakpoint_deltas
            .get(GLOBAL)
            .iter()
            .map(|e| e.value)
            .sum();
        let thrash_score = if churn as usize >= self.churn_threshold {
            (f64::from(churn) / (self.churn_threshold as f64 * 2.0)).min(1.0)
        } else {
            0.0
        };

        let sessions = self.sessions.get(GLOBAL);
        let short_count = sessions
            .iter()
            .filter(|e| e.value.duration_ms < self.short_session_ms)
            .count();
        let short_score = if short_count >= self.short_session_count {
            (short_count as f64 / (self.short_session_count as f64 * 2.0)).min(1.0)
        } else {
            0.0
        };

        let score = thrash_score.max(short_score);
        if score <= 0.0 {
            return None;
        }

        let last_session_short = sessions
            .last()
            .map(|e| e.value.duration_ms < self.short_session_ms);
        Some(
            SignalEvent::new(SignalType::Debug, score, now_ms, None).with_metadata(json!({
                "pattern": if thrash_score >= short_score { "breakpoint_thrashing" } else { "short_sessions" },
                "breakpoint_churn": churn,
                "short_session_count": short_count,
                "last_session_short": last_session_short,
            })),
        )
    }
}

impl SignalDetector for DebugDetector {
    fn signal(&self) -> SignalType {
        SignalType::Debug
    }

    fn observe(&mut self, event: &RawEvent, now_ms: u64) {
        match event {
            RawEvent::BreakpointsChanged {
                added,
                removed,
                changed,
            } => {
                let delta = added + removed + changed;
                if delta > 0 {
                    self.breakpoint_deltas.record(GLOBAL, delta, now_ms);
                }
            }
            RawEvent::DebugSessionStart { session_id } => {
                if session_id.is_empty() {
                    return;
                }
                self.pending_starts.insert(session_id.clone(), now_ms);
            }
            RawEvent::DebugSessionEnd { session_id } => {
                if let Some(start_ms) = self.pending_starts.remove(session_id) {
                    self.sessions.record(
                        GLOBAL,
                        SessionRecord {
                            session_id: session_id.clone(),
                            duration_ms: now_ms.saturating_sub(start_ms),
                        },
                        now_ms,
                    );
                } else {
                    trace!(session_id = %session_id, "session end without matching start dropped");
                }
            }
            _ => {}
        }
    }

    fn evaluate(&mut self, _scope: Option<&str>, now_ms: u64) -> Vec<SignalEvent> {
        self.breakpoint_deltas.prune(GLOBAL, now_ms);
        self.sessions.prune(GLOBAL, now_ms);
        self.evaluate_global(now_ms).into_iter().collect()
    }

    fn reset(&mut self, scope: Option<&str>) {
        if scope.is_none() || scope == Some(GLOBAL) {
            self.breakpoint_deltas.clear(None);
            self.sessions.clear(None);
            self.pending_starts.clear();
        }
    }

    fn dispose(&mut self) {
        self.breakpoint_deltas.clear(None);
        self.sessions.clear(None);
        self.pending_starts.clear();
    }

    fn configure(&mut self, config: &EngineConfig) {
        self.breakpoint_deltas
            .set_bounds(config.debug_window_ms, config.max_events_per_scope);
        self.sessions
            .set_bounds(config.debug_window_ms, config.max_events_per_scope);
        self.churn_threshold = config.breakpoint_churn_threshold;
        self.short_session_ms = config.short_session_ms;
        self.short_session_count = config.short_session_count;
    }
}

// ─── Tests ────────────────────────────────────────────────────────
