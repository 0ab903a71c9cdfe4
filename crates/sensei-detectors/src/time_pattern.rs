//! Temporal editing rhythm detection: hesitation, burst-after-pause, and
//! start-stop cycling over a scope's edit timestamps.
//!
//! All three patterns are computed on every evaluation; the highest score
//! is reported. Ties resolve by a pinned stable priority (hesitation,
//! then burst-after-pause, then start-stop), never by iteration order.

use serde_json::json;

use sensei_core::{EngineConfig, SignalEvent, SignalType};

use crate::detector::{RawEvent, SignalDetector};
use crate::window::ScopeWindow;

/// Pause scores saturate at 2 minutes.
const PAUSE_SATURATION_MS: f64 = 120_000.0;

pub struct TimePatternDetector {
    edits: ScopeWindow<()>,
    hesitation_ms: u64,
    hesitation_grace_ms: u64,
    burst_gap_ms: u64,
    burst_min_edits: usize,
    start_stop_min_cycles: usize,
}

struct Candidate {
    pattern: &'static str,
    score: f64,
    detail: serde_json::Value,
}

impl TimePatternDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            edits: ScopeWindow::new(config.time_window_ms, config.max_events_per_scope),
            hesitation_ms: config.hesitation_ms,
            hesitation_grace_ms: config.hesitation_grace_ms,
            burst_gap_ms: config.burst_gap_ms,
            burst_min_edits: config.burst_min_edits,
            start_stop_min_cycles: config.start_stop_min_cycles,
        }
    }

    fn evaluate_scope(&self, scope: &str, now_ms: u64) -> Option<SignalEvent> {
        let times: Vec<u64> = self.edits.get(scope).iter().map(|e| e.at_ms).collect();
        if times.len() < 2 {
            return None;
        }

        let candidates = [
            self.hesitation(&times, now_ms),
            self.burst_after_pause(&times),
            self.start_stop(&times),
        ];

        // Strictly-greater replacement over the declared priority order
        // pins the tie-break.
        let mut best: Option<Candidate> = None;
        for candidate in candidates.into_iter().flatten() {
            let replace = match &best {
                Some(b) => candidate.score > b.score,
                None => candidate.score > 0.0,
            };
            if replace {
                best = Some(candidate);
            }
        }

        best.map(|b| {
            SignalEvent::new(SignalType::TimePattern, b.score, now_ms, Some(scope.to_owned()))
                .with_metadata(json!({
                    "pattern": b.pattern,
                    "detail": b.detail,
                }))
        })
    }

    /// Longest inter-edit gap at or above the hesitation threshold,
    /// counted only when activity resumed within the grace period.
    fn hesitation(&self, times: &[u64], now_ms: u64) -> Option<Candidate> {
        let mut longest: Option<u64> = None;
        for pair in times.windows(2) {
            let gap = pair[1].saturating_sub(pair[0]);
            if gap < self.hesitation_ms {
                continue;
            }
            let resumed_at = pair[1];
            let followed_up = times
                .iter()
                .any(|&t| t > resumed_at && t <= resumed_at + self.hesitation_grace_ms)
                || now_ms.saturating_sub(resumed_at) <= self.hesitation_grace_ms;
            if !followed_up {
                continue;
            }
            longest = Some(longest.map_or(gap, |g| g.max(gap)));
        }
        longest.map(|gap| Candidate {
            pattern: "hesitation",
            score: pause_score(gap),
            detail: json!({ "gap_ms": gap }),
        })
    }

    /// A hesitation-length gap immediately followed by a tight run of
    /// edits. Score averages pause duration and burst size.
    fn burst_after_pause(&self, times: &[u64]) -> Option<Candidate> {
        let mut best: Option<(f64, u64, usize)> = None;
        for i in 0..times.len() - 1 {
            let gap = times[i + 1].saturating_sub(times[i]);
            if gap < self.hesitation_ms {
                continue;
            }
            // Count the run starting at the resumption edit.
            let mut burst_len = 1;
            let mut j = i + 1;
            while j + 1 < times.len() && times[j + 1].saturating_sub(times[j]) <= self.burst_gap_ms {
                burst_len += 1;
                j += 1;
            }
            if burst_len < self.burst_min_edits {
                continue;
            }
            let burst_score =
                (burst_len as f64 / (self.burst_min_edits as f64 * 2.0)).min(1.0);
            let score = (pause_score(gap) + burst_score) / 2.0;
            if best.is_none_or(|(s, _, _)| score > s) {
                best = Some((score, gap, burst_len));
            }
        }
        best.map(|(score, gap, burst_len)| Candidate {
            pattern: "burst_after_pause",
            score,
            detail: json!({ "pause_ms": gap, "burst_edits": burst_len }),
        })
    }

    /// Repeated clusters each followed by a pause of at least half the
    /// hesitation threshold, counted across the whole window.
    fn start_stop(&self, times: &[u64]) -> Option<Candidate> {
        let pause_floor = self.hesitation_ms / 2;
        let mut cycles = 0usize;
        let mut i = 0;
        while i < times.len() {
            // Walk one cluster of tightly spaced edits.
            let mut j = i;
            while j + 1 < times.len() && times[j + 1].saturating_sub(times[j]) <= self.burst_gap_ms {
                j += 1;
            }
            // Cluster ends; a following pause closes the cycle.
            if j + 1 < times.len() && times[j + 1].saturating_sub(times[j]) >= pause_floor {
                cycles += 1;
            }
            i = j + 1;
        }
        if cycles < self.start_stop_min_cycles {
            return None;
        }
        Some(Candidate {
            pattern: "start_stop",
            score: (cycles as f64 / (self.start_stop_min_cycles as f64 * 2.0)).min(1.0),
            detail: json!({ "cycles": cycles }),
        })
    }
}

fn pause_score(gap_ms: u64) -> f64 {
    (gap_ms as f64 / PAUSE_SATURATION_MS).min(1.0)
}

impl SignalDetector for TimePatternDetector {
    fn signal(&self) -> SignalType {
        SignalType::TimePattern
    }

    fn observe(&mut self, event: &RawEvent, now_ms: u64) {
        if let RawEvent::Edit { scope, .. } = event {
            if scope.is_empty() {
                return;
            }
            self.edits.record(scope, (), now_ms);
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
                self.edits
                    .scope_keys()
                    .iter()
                    .filter_map(|s| self.evaluate_scope(s, now_ms))
                    .collect()
            }
        }
    }

    fn reset(&mut self, scope: Option<&str>) {
        self.edits.clear(scope);
    }

    fn dispose(&mut self) {
        self.edits.clear(None);
    }

    fn configure(&mut self, config: &EngineConfig) {
        self.edits
            .set_bounds(config.time_window_ms, config.max_events_per_scope);
        self.hesitation_ms = config.hesitation_ms;
        self.hesitation_grace_ms = config.hesitation_grace_ms;
        self.burst_gap_ms = config.burst_gap_ms;
        self.burst_min_edits = config.burst_min_edits;
        self.start_stop_min_cycles = config.start_stop_min_cycles;
    }
}

// ─── Tests ────────────────────────────────────────────────────────
