//! Weighted signal combination with cooldown suppression.

use std::collections::HashMap;

use tracing::{debug, trace};

use sensei_core::{ConfigPatch, EngineConfig, ScopeKey, SignalEvent, SignalType, StruggleDecision};
use sensei_detectors::{RawEvent, SignalDetector, default_detectors};

/// Owns the detector set and turns their signal events into decisions.
///
/// Single-threaded by design: every entry point takes `&mut self` and an
/// explicit `now_ms`, so the whole pipeline is deterministic under test.
pub struct SignalAggregator {
    detectors: Vec<Box<dyn SignalDetector>>,
    config: EngineConfig,
    /// Last trigger timestamp per scope. Entries are lazily created on
    /// trigger; staleness is computed at read time, never swept.
    scope_cooldowns: HashMap<ScopeKey, u64>,
    /// Last trigger timestamp across all scopes.
    global_cooldown: Option<u64>,
}

impl SignalAggregator {
    /// Aggregator with the full default detector set for `config`.
    pub fn new(config: EngineConfig) -> Self {
        let detectors = default_detectors(&config);
        Self::with_detectors(config, detectors)
    }

    /// Aggregator over an explicit detector set.
    pub fn with_detectors(config: EngineConfig, detectors: Vec<Box<dyn SignalDetector>>) -> Self {
        Self {
            detectors,
            config,
            scope_cooldowns: HashMap::new(),
            global_cooldown: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fan the raw event out to every registered detector.
    pub fn ingest(&mut self, event: &RawEvent, now_ms: u64) {
        for detector in &mut self.detectors {
            detector.observe(event, now_ms);
        }
    }

    /// Register a detector, replacing (and disposing) any existing
    /// detector of the same signal type.
    pub fn register(&mut self, detector: Box<dyn SignalDetector>) {
        let signal = detector.signal();
        if let Some(existing) = self.detectors.iter_mut().find(|d| d.signal() == signal) {
            existing.dispose();
            *existing = detector;
        } else {
            self.detectors.push(detector);
        }
    }

    /// Remove and dispose the detector for `signal`. Returns whether one
    /// was registered.
    pub fn remove(&mut self, signal: SignalType) -> bool {
        match self.detectors.iter().position(|d| d.signal() == signal) {
            Some(idx) => {
                let mut detector = self.detectors.remove(idx);
                detector.dispose();
                true
            }
            None => false,
        }
    }

    fn in_cooldown(&self, scope: Option<&str>, now_ms: u64) -> bool {
        let active = |stamped: u64| now_ms.saturating_sub(stamped) <= self.config.cooldown_ms;
        if let Some(s) = scope
            && self.scope_cooldowns.get(s).is_some_and(|&t| active(t))
        {
            return true;
        }
        self.global_cooldown.is_some_and(active)
    }

    /// Evaluate all detectors for `scope` and combine their signals.
    ///
    /// During cooldown the detectors are not consulted at all; the
    /// returned decision is quiet. On trigger both the scope and the
    /// global cooldown are stamped to `now_ms`.
    pub fn evaluate(&mut self, scope: Option<&str>, now_ms: u64) -> StruggleDecision {
        if self.in_cooldown(scope, now_ms) {
            trace!(scope, "evaluation suppressed by cooldown");
            return StruggleDecision::quiet(now_ms, scope.map(str::to_owned));
        }

        // Collapse each signal type to its strongest event.
        let mut strongest: HashMap<SignalType, SignalEvent> = HashMap::new();
        for detector in &mut self.detectors {
            for event in detector.evaluate(scope, now_ms) {
                if event.score <= 0.0 {
                    continue;
                }
                match strongest.get(&event.signal) {
                    Some(kept) if kept.score >= event.score => {}
                    _ => {
                        strongest.insert(event.signal, event);
                    }
                }
            }
        }

        // Deterministic ordering for contributors and primary selection.
        let contributing: Vec<SignalEvent> = SignalType::ALL
            .iter()
            .filter_map(|s| strongest.remove(s))
            .collect();

        if contributing.is_empty() {
            return StruggleDecision::quiet(now_ms, scope.map(str::to_owned));
        }

        let weights = &self.config.weights;
        let weight_sum: f64 = contributing.iter().map(|e| weights.get(e.signal)).sum();
        let combined_score = if weight_sum > 0.0 {
            let weighted: f64 = contributing
                .iter()
                .map(|e| e.score * weights.get(e.signal))
                .sum();
            (weighted / weight_sum).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let primary_signal = contributing
            .iter()
            .map(|e| (e.signal, e.score * weights.get(e.signal)))
            .fold(None::<(SignalType, f64)>, |best, c| match best {
                Some(b) if b.1 >= c.1 => Some(b),
                _ => Some(c),
            })
            .map(|(signal, _)| signal);

        let should_trigger = combined_score >= self.config.trigger_threshold;
        if should_trigger {
            if let Some(s) = scope {
                self.scope_cooldowns.insert(s.to_owned(), now_ms);
            }
            self.global_cooldown = Some(now_ms);
            debug!(
                scope,
                combined_score,
                primary = primary_signal.map(SignalType::as_str),
                "struggle decision triggered"
            );
        }

        StruggleDecision {
            should_trigger,
            combined_score,
            primary_signal,
            contributing,
            timestamp_ms: now_ms,
            scope: scope.map(str::to_owned),
        }
    }

    /// Scopes whose debounced symbol-listing request has come due.
    pub fn due_symbol_requests(&mut self, now_ms: u64) -> Vec<ScopeKey> {
        let mut due = Vec::new();
        for detector in &mut self.detectors {
            due.extend(detector.due_symbol_requests(now_ms));
        }
        due
    }

    /// Clear one scope's state (or everything) in detectors and cooldowns.
    pub fn reset(&mut self, scope: Option<&str>) {
        for detector in &mut self.detectors {
            detector.reset(scope);
        }
        match scope {
            Some(s) => {
                self.scope_cooldowns.remove(s);
            }
            None => {
                self.scope_cooldowns.clear();
                self.global_cooldown = None;
            }
        }
    }

    /// Dispose every detector and drop all aggregator state. Idempotent.
    pub fn dispose(&mut self) {
        for detector in &mut self.detectors {
            detector.dispose();
        }
        self.scope_cooldowns.clear();
        self.global_cooldown = None;
    }

    /// Shallow-merge a configuration patch and push the result into every
    /// detector. Accepted as given; no validation.
    pub fn update(&mut self, patch: &ConfigPatch) {
        self.config.apply(patch);
        for detector in &mut self.detectors {
            detector.configure(&self.config);
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
