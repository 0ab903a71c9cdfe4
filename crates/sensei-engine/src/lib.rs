//! Signal aggregation and host orchestration.
//!
//! `SignalAggregator` combines per-detector signal events into a single
//! weighted struggle decision with cooldown suppression. `StruggleService`
//! sits between a host editor and the aggregator: it translates host event
//! shapes into raw detector events, drives the injected clock, pumps
//! debounced symbol requests through the optional provider, and builds the
//! intervention context when a decision triggers.

pub mod aggregator;
pub mod events;
pub mod service;

pub use aggregator::SignalAggregator;
pub use events::{
    BreakpointsEvent, ChangeReason, DebugSessionEvent, DiagnosticsEvent, DocumentChangeEvent,
    SymbolProvider, TaskEndEvent, TerminalOutputEvent,
};
pub use service::{StruggleContext, StruggleService, Triggered};
