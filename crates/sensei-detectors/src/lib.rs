//! The six signal detectors behind one capability interface.
//!
//! Each detector ingests raw editing events, maintains bounded per-scope
//! time windows, and on `evaluate()` produces zero or more scored signal
//! events. Detectors never fail on ingestion: malformed or irrelevant
//! events are silently ignored.

pub mod debug;
pub mod detector;
pub mod edit_pattern;
pub mod patterns;
pub mod semantic;
pub mod terminal;
pub mod time_pattern;
pub mod undo_redo;
pub mod window;

pub use debug::DebugDetector;
pub use detector::{RawEvent, SignalDetector, UndoKind};
pub use edit_pattern::EditPatternDetector;
pub use semantic::{SemanticDetector, SymbolInfo, SymbolKind};
pub use terminal::TerminalDetector;
pub use time_pattern::TimePatternDetector;
pub use undo_redo::UndoRedoDetector;
pub use window::{ScopeWindow, Stamped};

use sensei_core::EngineConfig;

/// Build the full default detector set for the given configuration.
/// The semantic detector is always registered; while disabled it ignores
/// every event, so a later configuration update can enable it in place.
pub fn default_detectors(config: &EngineConfig) -> Vec<Box<dyn SignalDetector>> {
    vec![
        Box::new(UndoRedoDetector::new(config)),
        Box::new(TimePatternDetector::new(config)),
        Box::new(TerminalDetector::new(config)),
        Box::new(DebugDetector::new(config)),
        Box::new(SemanticDetector::new(config)),
        Box::new(EditPatternDetector::new(config)),
    ]
}
