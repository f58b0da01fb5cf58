//! Protocol-level error types.

/// A payload that does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed field {field}: {reason}")]
    MalformedField { field: String, reason: String },

    #[error("malformed signal {signal}: {reason}")]
    MalformedSignal { signal: String, reason: String },
}

impl ProtocolError {
    pub(crate) fn field(field: &str, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn signal(signal: &str, reason: impl Into<String>) -> Self {
        Self::MalformedSignal {
            signal: signal.to_string(),
            reason: reason.into(),
        }
    }
}
