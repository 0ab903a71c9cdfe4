//! Host-facing event shapes and the external symbol provider seam.
//!
//! These mirror what an editor host actually reports. The service
//! translates them into the closed internal `RawEvent` set; anything
//! outside the `file` scheme or with an empty payload is dropped there.

use serde::{Deserialize, Serialize};

use sensei_detectors::SymbolInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    Undo,
    Redo,
}

/// One document content change as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChangeEvent {
    pub uri: String,
    /// URI scheme; only `file` documents are tracked.
    pub scheme: String,
    pub language_id: String,
    /// Zero-based line of the first changed range.
    pub line: u32,
    /// Full document text after the change, for context extraction.
    pub text: String,
    /// The changed text itself.
    pub snippet: String,
    pub reason: Option<ChangeReason>,
}

/// Full replacement of a document's current diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsEvent {
    pub uri: String,
    pub scheme: String,
    /// Error-severity diagnostic messages only.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEndEvent {
    pub name: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugSessionEvent {
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointsEvent {
    pub added: u32,
    pub removed: u32,
    pub changed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalOutputEvent {
    pub text: String,
}

/// External document-symbol source (typically a language server).
///
/// Failures are logged and the scan cycle skipped; the engine never
/// propagates provider errors to the host.
pub trait SymbolProvider: Send {
    fn document_symbols(&mut self, scope: &str) -> anyhow::Result<Vec<SymbolInfo>>;
}
