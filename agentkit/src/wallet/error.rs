//! Error types for wallet operations.
//!
//! [`WalletError`] covers configuration, signing, RPC and custodial transport,
//! unsupported operations, and terminal operation failures. Every variant
//! carries a human-readable message so that action handlers which format
//! errors into strings still produce something actionable.

use crate::network::NetworkError;

/// Error type for wallet operations.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum WalletError {
    /// Invalid or missing configuration (credentials, network, keys).
    #[error("Config error: {0}")]
    Config(String),

    /// A caller-supplied argument was rejected before any network call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Signing error.
    #[error("Signing error: {0}")]
    Signing(String),

    /// RPC / provider error.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The custodial API answered with a non-success status.
    #[error("Remote error ({status}): {message}")]
    Remote {
        /// HTTP status code returned by the custodian.
        status: u16,
        /// Error message returned by the custodian.
        message: String,
    },

    /// Transaction construction or submission error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The backend cannot perform this operation.
    #[error("{operation} is not supported by {backend}")]
    Unsupported {
        /// Variant name of the wallet provider.
        backend: String,
        /// The rejected operation.
        operation: String,
    },

    /// A submitted operation reached a failed terminal state.
    #[error("Operation {handle} failed with status '{status}'")]
    OperationFailed {
        /// Transaction, user operation, or intent hash.
        handle: String,
        /// Terminal status or revert reason reported by the backend.
        status: String,
    },

    /// Polling gave up before the operation reached a terminal state.
    #[error("Timed out waiting for {handle} after {attempts} attempts")]
    Timeout {
        /// Transaction, user operation, or intent hash.
        handle: String,
        /// Number of polls performed.
        attempts: u32,
    },
}

impl WalletError {
    /// Create a config error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a signing error.
    #[must_use]
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Create a provider error.
    #[must_use]
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a remote custodian error.
    #[must_use]
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Create a transaction error.
    #[must_use]
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Create an unsupported operation error.
    #[must_use]
    pub fn unsupported(backend: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            backend: backend.into(),
            operation: operation.into(),
        }
    }

    /// Create an operation failure error.
    #[must_use]
    pub fn operation_failed(handle: impl Into<String>, status: impl Into<String>) -> Self {
        Self::OperationFailed {
            handle: handle.into(),
            status: status.into(),
        }
    }

    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Timeout { .. })
            || matches!(self, Self::Remote { status, .. } if *status >= 500 || *status == 429)
    }
}

impl From<NetworkError> for WalletError {
    fn from(e: NetworkError) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_message_names_backend_and_operation() {
        let err = WalletError::unsupported("smart_wallet_provider", "sign_message");
        assert_eq!(
            err.to_string(),
            "sign_message is not supported by smart_wallet_provider"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn remote_preserves_status_and_message() {
        let err = WalletError::remote(401, "invalid app secret");
        assert_eq!(err.to_string(), "Remote error (401): invalid app secret");
        assert!(!err.is_transient());
        assert!(WalletError::remote(503, "busy").is_transient());
    }

    #[test]
    fn network_errors_become_config_errors() {
        let err: WalletError = NetworkError::UnknownGenesisHash("abc".into()).into();
        assert!(matches!(err, WalletError::Config(ref m) if m.contains("abc")));
    }
}
