//! EVM wallet providers.
//!
//! [`EvmWalletProvider`] extends [`WalletProvider`] with message, typed-data,
//! and transaction signing, transaction submission, receipt waiting, and
//! read-only contract calls. Four backends implement it:
//!
//! | Variant | Signing | Submission | Completion |
//! |---|---|---|---|
//! | [`LocalEvmWalletProvider`] | local key | `eth_sendRawTransaction` | receipt polling |
//! | [`SmartWalletProvider`] | owner key over user operation hash | bundler | bundler receipt |
//! | [`DelegatedEvmWalletProvider`] | custodial API | custodial API | receipt polling |
//! | [`IntentWalletProvider`] | inner provider via validator | intent service | intent execution receipt |

use std::future::Future;

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, B256, Bytes};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use super::{WalletError, WalletProvider};
use crate::config::{self, EnvSource};
use crate::network::{EvmNetwork, resolve_evm};

mod bundler;
mod delegated;
mod intent;
mod local;
mod rpc;
mod smart;
mod validator;

pub use bundler::{
    COINBASE_SMART_WALLET_FACTORY, Call, ENTRY_POINT_V06, Erc4337BundlerClient,
    PreparedUserOperation, SmartAccountClient, UserOperation,
};
pub use delegated::{DelegatedEvmWalletConfig, DelegatedEvmWalletProvider};
pub use intent::{
    HttpIntentClient, IntentClient, IntentExecutionReceipt, IntentWalletConfig,
    IntentWalletProvider, PreparedIntent,
};
pub use local::{LocalEvmWalletConfig, LocalEvmWalletProvider};
pub use rpc::EvmRpc;
pub use smart::{SmartWalletConfig, SmartWalletProvider};
pub use validator::EcdsaValidator;

/// Capability set of EVM signing backends.
///
/// Backends that cannot perform an operation return
/// [`WalletError::Unsupported`] for that call only.
#[async_trait]
pub trait EvmWalletProvider: WalletProvider {
    /// Typed form of [`address`](WalletProvider::address).
    fn evm_address(&self) -> Address;

    /// The resolved network table entry.
    fn evm_network(&self) -> EvmNetwork;

    /// Sign `message` with EIP-191 `personal_sign`, returning `0x`-hex.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails or is unsupported.
    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError>;

    /// Sign EIP-712 typed data, returning `0x`-hex.
    ///
    /// # Errors
    ///
    /// Returns an error if the typed data cannot be hashed, or signing fails
    /// or is unsupported.
    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, WalletError>;

    /// Fill and sign a transaction, returning its EIP-2718 encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if filling or signing fails or is unsupported.
    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Bytes, WalletError>;

    /// Submit a transaction and return its hash.
    ///
    /// The hash can be passed to
    /// [`wait_for_transaction_receipt`](Self::wait_for_transaction_receipt)
    /// on the same provider.
    ///
    /// # Errors
    ///
    /// Returns an error if submission fails, or for account-abstraction
    /// backends, if the operation ends in a failed state.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError>;

    /// Poll until the transaction is mined.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Timeout`] if it is not mined within the
    /// provider's poll policy, or a provider error.
    async fn wait_for_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<TransactionReceipt, WalletError>;

    /// Execute a read-only `eth_call`. Never used for state changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the call reverts or the RPC fails.
    async fn read_contract(&self, to: Address, calldata: Bytes) -> Result<Bytes, WalletError>;
}

/// Typed helpers on top of [`EvmWalletProvider`].
pub trait EvmWalletProviderExt: EvmWalletProvider {
    /// ABI-encode `call`, execute it read-only against `to`, and decode the
    /// return value.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the return data does not decode.
    fn read_contract_call<C>(
        &self,
        to: Address,
        call: &C,
    ) -> impl Future<Output = Result<C::Return, WalletError>> + Send
    where
        C: SolCall + Sync,
        C::Return: Send,
    {
        let calldata = Bytes::from(call.abi_encode());
        async move {
            let output = self.read_contract(to, calldata).await?;
            C::abi_decode_returns(&output).map_err(|e| {
                WalletError::provider(format!("{} return decode failed: {e}", C::SIGNATURE))
            })
        }
    }

    /// Submit `tx` and wait for its receipt, failing if it reverted.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::OperationFailed`] for a reverted transaction, or
    /// any submission/polling error.
    fn send_and_confirm(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<TransactionReceipt, WalletError>> + Send {
        async move {
            let hash = self.send_transaction(tx).await?;
            let receipt = self.wait_for_transaction_receipt(hash).await?;
            if receipt.status() {
                Ok(receipt)
            } else {
                Err(WalletError::operation_failed(format!("{hash:#x}"), "reverted"))
            }
        }
    }
}

impl<T: EvmWalletProvider + ?Sized> EvmWalletProviderExt for T {}

/// Parse a `0x`-prefixed, 40-hex-digit address.
///
/// # Errors
///
/// Returns [`WalletError::InvalidArgument`] for anything else.
pub fn parse_evm_address(value: &str) -> Result<Address, WalletError> {
    let valid = value.len() == 42
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(WalletError::invalid_argument(format!(
            "invalid EVM address '{value}': expected 0x followed by 40 hex characters"
        )));
    }
    value
        .parse()
        .map_err(|e| WalletError::invalid_argument(format!("invalid EVM address '{value}': {e}")))
}

/// Resolve the EVM network for a provider config.
///
/// Explicit values win over `NETWORK_ID`/`CHAIN_ID`; with neither present the
/// network defaults to `base-sepolia`.
pub(crate) fn resolve_network(
    env: &EnvSource,
    network_id: Option<&str>,
    chain_id: Option<&str>,
) -> Result<EvmNetwork, WalletError> {
    let network_id = env.resolve(network_id, config::NETWORK_ID_ENV);
    let chain_id = env.resolve(chain_id, config::CHAIN_ID_ENV);
    if network_id.is_none() && chain_id.is_none() {
        return Ok(EvmNetwork::BaseSepolia);
    }
    Ok(resolve_evm(network_id.as_deref(), chain_id.as_deref())?)
}

/// Format a signature as a `0x`-prefixed hex string.
pub(crate) fn format_signature(bytes: &[u8]) -> String {
    format!("0x{}", alloy::primitives::hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_addresses() {
        let addr = parse_evm_address("0x5154eae861cac3aa757d6016babaf972341354cf").unwrap();
        assert_eq!(
            addr.to_checksum(None).to_lowercase(),
            "0x5154eae861cac3aa757d6016babaf972341354cf"
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "0xRecipient",
            "5154eae861cac3aa757d6016babaf972341354cf",
            "0x5154eae861cac3aa757d6016babaf972341354c",
            "0x5154eae861cac3aa757d6016babaf972341354cfzz",
        ] {
            assert!(
                matches!(parse_evm_address(bad), Err(WalletError::InvalidArgument(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn network_defaults_and_env_fallback() {
        let empty = EnvSource::from_pairs::<&str, &str>([]);
        assert_eq!(
            resolve_network(&empty, None, None).unwrap(),
            EvmNetwork::BaseSepolia
        );

        let env = EnvSource::from_pairs([(config::CHAIN_ID_ENV, "8453")]);
        assert_eq!(
            resolve_network(&env, None, None).unwrap(),
            EvmNetwork::BaseMainnet
        );
        assert!(matches!(
            resolve_network(&env, Some("ethereum-mainnet"), None),
            Err(WalletError::Config(_))
        ));
    }

    #[test]
    fn signature_hex() {
        assert_eq!(format_signature(&[0xab, 0x01]), "0xab01");
    }
}
