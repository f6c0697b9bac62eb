//! Crate-wide error type.
//!
//! Each layer keeps its own error enum: [`NetworkError`] for resolution,
//! [`WalletError`] for wallet operations, [`ActionError`] for the action
//! registry. [`Error`] wraps them for callers that mix layers.

use crate::action::ActionError;
use crate::network::NetworkError;
use crate::wallet::WalletError;

/// Result type alias for agentkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for agentkit.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Wallet error.
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Network resolution error.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Action registry error.
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether retrying the same call might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Wallet(e) => e.is_transient(),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_layer_errors() {
        let err: Error = NetworkError::UnknownChainId("999".into()).into();
        assert!(err.to_string().contains("999"));
        assert!(!err.is_transient());

        let err: Error = WalletError::Timeout {
            handle: "0x01".into(),
            attempts: 3,
        }
        .into();
        assert!(matches!(err, Error::Wallet(WalletError::Timeout { .. })));
    }
}
