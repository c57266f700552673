//! Error types for the exchange runtime.

/// Errors surfaced by session operations.
///
/// [`ExchangeError::QueueExhausted`] and empty receive results are the only
/// conditions an ordinary caller is expected to handle as control flow; the
/// remaining kinds indicate misuse of the API or an environment failure and
/// should propagate to the caller's own error boundary.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The external transport runtime could not be started.
    #[error("transport initialization failed: {reason}")]
    TransportInit {
        /// What the transport reported.
        reason: String,
    },

    /// A transport call returned a nonzero status.
    #[error("transport call `{op}` failed with status {code}")]
    Transport {
        /// Name of the failing operation.
        op: &'static str,
        /// Raw status code returned by the transport.
        code: i32,
    },

    /// Disallowed usage: wildcard source addressing, a duplicate outstanding
    /// interrupt, a blocking wait in simulated mode, a receive on the
    /// reserved bulk-data tag, or invalid configuration.
    #[error("protocol violation: {reason}")]
    Protocol {
        /// What was attempted.
        reason: String,
    },

    /// The asynchronous queue is at capacity and holds nothing recyclable.
    #[error("asynchronous message queue exhausted (capacity {capacity})")]
    QueueExhausted {
        /// Maximum number of concurrently unresolved asynchronous messages.
        capacity: usize,
    },

    /// The byte codec rejected a value or a payload.
    #[error("codec error: {reason}")]
    Codec {
        /// What the codec reported.
        reason: String,
    },
}

impl ExchangeError {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        ExchangeError::Protocol {
            reason: reason.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ExchangeError>;
