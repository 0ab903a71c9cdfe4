//! Shared leaf types for the struggle-detection engine.
//!
//! Pure crate: injectable clock, the normalized edit-distance metric,
//! signal/decision value types, and the flat configuration surface.
//! No async, no I/O: everything here is deterministic given a timestamp.

pub mod clock;
pub mod config;
pub mod error;
pub mod similarity;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigPatch, EngineConfig, SignalWeights, WeightsPatch};
pub use error::SenseiError;
pub use types::{ScopeKey, SignalEvent, SignalType, StruggleDecision};
