//! Wallet providers: one contract over many signing backends.
//!
//! Every backend implements [`WalletProvider`]. Protocol-family extensions
//! narrow it further: [`EvmWalletProvider`] for EVM chains and
//! [`SvmWalletProvider`] for Solana-style chains. Action providers are written
//! against the narrowest extension they need, so the same action works with
//! every backend of that family.
//!
//! # Architecture
//!
//! ```text
//! WalletProvider (address, network, name, balance, native_transfer)
//!   ├─ EvmWalletProvider
//!   │    ├─ LocalEvmWalletProvider      local key, JSON-RPC
//!   │    ├─ SmartWalletProvider         user operations via a bundler
//!   │    ├─ DelegatedEvmWalletProvider  custodial remote signing
//!   │    └─ IntentWalletProvider        intents, wraps another EvmWalletProvider
//!   └─ SvmWalletProvider
//!        ├─ SolanaKeypairWalletProvider local keypair, JSON-RPC
//!        └─ DelegatedSvmWalletProvider  custodial remote signing
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use agentkit::wallet::{LocalEvmWalletConfig, LocalEvmWalletProvider, WalletProvider};
//!
//! # async fn example() -> agentkit::Result<()> {
//! let wallet = LocalEvmWalletProvider::configure_with_wallet(LocalEvmWalletConfig {
//!     network_id: Some("base-sepolia".into()),
//!     ..Default::default()
//! })
//! .await?;
//!
//! println!("{} on {}", wallet.address(), wallet.network());
//! let tx = wallet.native_transfer("0x5154eae861cac3aa757d6016babaf972341354cf", "0.001").await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use alloy::primitives::U256;
use async_trait::async_trait;

use crate::network::Network;

mod amount;
mod error;
pub mod evm;
mod poll;
pub mod svm;

pub use amount::{EVM_DECIMALS, SVM_DECIMALS, parse_amount, parse_lamports};
pub use error::WalletError;
pub use evm::{
    DelegatedEvmWalletConfig, DelegatedEvmWalletProvider, EvmWalletProvider, EvmWalletProviderExt,
    IntentWalletConfig, IntentWalletProvider, LocalEvmWalletConfig, LocalEvmWalletProvider,
    SmartWalletConfig, SmartWalletProvider,
};
pub use poll::{Poll, PollPolicy, poll_until};
pub use svm::{
    DelegatedSvmWalletConfig, DelegatedSvmWalletProvider, SolanaKeypairWalletConfig,
    SolanaKeypairWalletProvider, SvmWalletProvider,
};

/// The capability set every signing backend provides.
///
/// `address`, `network`, and `name` are fixed at construction and never
/// change for the lifetime of the instance.
#[async_trait]
pub trait WalletProvider: Send + Sync + fmt::Debug {
    /// The bound address.
    ///
    /// For account-abstraction variants this is the smart account address,
    /// not the address of the key that authorizes it.
    fn address(&self) -> &str;

    /// The bound network.
    fn network(&self) -> &Network;

    /// Stable variant identifier, for diagnostics only.
    fn name(&self) -> &str;

    /// Native-asset balance in the smallest unit (wei, lamports).
    ///
    /// # Errors
    ///
    /// Returns an error describing the RPC failure.
    async fn balance(&self) -> Result<U256, WalletError>;

    /// Transfer `amount` whole units (e.g. `"1.5"` ETH) of the native asset.
    ///
    /// Returns a handle (transaction hash or signature) for the submitted
    /// transfer. Malformed destinations and amounts are rejected before any
    /// network call.
    ///
    /// # Errors
    ///
    /// Returns an error if validation, signing, submission, or confirmation
    /// fails.
    async fn native_transfer(&self, to: &str, amount: &str) -> Result<String, WalletError>;
}

/// Status reported by a bundler or intent service for a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Accepted, not yet included.
    Pending,
    /// Included in a bundle that has not landed yet.
    Bundled,
    /// Landed on chain.
    Complete {
        /// Hash of the transaction that carried the operation.
        transaction_hash: String,
    },
    /// Landed or was dropped in a failed state.
    Failed {
        /// Status or revert reason reported by the backend.
        reason: String,
    },
}

impl OperationStatus {
    /// Whether no further transitions can happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Failed { .. })
    }
}

/// Lifecycle of a transaction or user operation.
///
/// `Built → Signed → Submitted → {Pending, Complete, Failed}`, with `Bundled`
/// between `Submitted` and a terminal state for account-abstraction backends.
/// Only used for logging; handles are plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Parameters assembled.
    Built,
    /// Signature attached.
    Signed,
    /// Handed to a node, bundler, or custodian.
    Submitted,
    /// Included in a bundle.
    Bundled,
    /// Awaiting inclusion.
    Pending,
    /// Included successfully.
    Complete,
    /// Included with failure, or rejected.
    Failed,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Built => "built",
            Self::Signed => "signed",
            Self::Submitted => "submitted",
            Self::Bundled => "bundled",
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Bundled.is_terminal());
        assert!(
            OperationStatus::Complete {
                transaction_hash: "0x1".into()
            }
            .is_terminal()
        );
        assert!(
            OperationStatus::Failed {
                reason: "reverted".into()
            }
            .is_terminal()
        );
    }

    #[test]
    fn transaction_state_display() {
        assert_eq!(TransactionState::Bundled.to_string(), "bundled");
    }
}
