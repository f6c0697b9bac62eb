//! ECDSA validator module of a modular smart account.
//!
//! The account accepts a signature over a hash only when it was made over
//! the replay-safe wrapper `Kernel(bytes32 hash)` in the account's own
//! EIP-712 domain, so a signature for one account or chain cannot be
//! replayed against another. The inner signer produces that signature with
//! its ordinary typed-data signing.

use std::fmt;
use std::sync::Arc;

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::Eip712Domain;

use super::EvmWalletProvider;
use crate::wallet::WalletError;

/// EIP-712 domain name of the account.
pub const KERNEL_NAME: &str = "Kernel";

/// EIP-712 domain version of the account.
pub const KERNEL_VERSION: &str = "0.3.1";

/// Validator selector prefix for the account's root validator.
const ROOT_VALIDATOR_PREFIX: &str = "00";

alloy::sol! {
    /// Replay-safe wrapper signed in place of a raw hash.
    #[derive(serde::Serialize)]
    struct Kernel {
        bytes32 hash;
    }
}

/// Authorizes hashes for a smart account through an inner EVM signer.
#[derive(Clone)]
pub struct EcdsaValidator {
    signer: Arc<dyn EvmWalletProvider>,
    account: Address,
    chain_id: u64,
}

impl fmt::Debug for EcdsaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaValidator")
            .field("signer", &self.signer.address())
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl EcdsaValidator {
    /// Validator for `account` on `chain_id`, signing with `signer`.
    #[must_use]
    pub fn new(signer: Arc<dyn EvmWalletProvider>, account: Address, chain_id: u64) -> Self {
        Self {
            signer,
            account,
            chain_id,
        }
    }

    /// The inner signer.
    #[must_use]
    pub fn signer(&self) -> &Arc<dyn EvmWalletProvider> {
        &self.signer
    }

    /// The account's EIP-712 domain.
    #[must_use]
    pub fn domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(KERNEL_NAME.into()),
            Some(KERNEL_VERSION.into()),
            Some(U256::from(self.chain_id)),
            Some(self.account),
            None,
        )
    }

    /// The typed data the inner signer signs to authorize `hash`.
    #[must_use]
    pub fn replay_safe_typed_data(&self, hash: B256) -> TypedData {
        TypedData::from_struct(&Kernel { hash }, Some(self.domain()))
    }

    /// Sign `hash` and prefix the result with the root validator selector.
    ///
    /// # Errors
    ///
    /// Returns whatever the inner signer's typed-data signing returns.
    pub async fn sign_hash(&self, hash: B256) -> Result<String, WalletError> {
        let typed = self.replay_safe_typed_data(hash);
        let signature = self.signer.sign_typed_data(&typed).await?;
        Ok(format!(
            "0x{ROOT_VALIDATOR_PREFIX}{}",
            signature.trim_start_matches("0x")
        ))
    }
}
