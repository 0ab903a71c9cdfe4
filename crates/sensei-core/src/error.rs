use thiserror::Error;

/// Engine error type. Nothing in the hot edit-processing path returns
/// this; detectors degrade to "no signal" instead of propagating. It
/// surfaces only at parsing boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SenseiError {
    #[error("unknown signal type: {0}")]
    UnknownSignalType(String),
}
