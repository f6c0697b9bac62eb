//! Local private-key EVM wallet.

use std::fmt;

use alloy::dyn_abi::TypedData;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{
    EvmRpc, EvmWalletProvider, EvmWalletProviderExt, format_signature, parse_evm_address,
    resolve_network,
};
use crate::config::{self, EnvSource};
use crate::network::{EvmNetwork, Network};
use crate::wallet::{
    EVM_DECIMALS, PollPolicy, TransactionState, WalletError, WalletProvider, parse_amount,
};

const NAME: &str = "local_evm_wallet_provider";

/// Configuration for [`LocalEvmWalletProvider`].
///
/// Every field is optional. A missing key is generated, a missing network
/// defaults to `base-sepolia`, a missing RPC URL to the network's public one.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalEvmWalletConfig {
    /// Hex private key, with or without `0x`. Falls back to `PRIVATE_KEY`.
    pub private_key: Option<String>,
    /// Network id. Falls back to `NETWORK_ID`.
    pub network_id: Option<String>,
    /// Chain id. Falls back to `CHAIN_ID`.
    pub chain_id: Option<String>,
    /// JSON-RPC URL. Falls back to `RPC_URL`.
    pub rpc_url: Option<String>,
    /// Receipt polling bound.
    #[serde(skip)]
    pub poll: Option<PollPolicy>,
}

impl fmt::Debug for LocalEvmWalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEvmWalletConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("network_id", &self.network_id)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("poll", &self.poll)
            .finish()
    }
}

/// An EVM wallet holding its private key in process.
pub struct LocalEvmWalletProvider {
    signer: PrivateKeySigner,
    wallet: EthereumWallet,
    rpc: EvmRpc,
    address: String,
    network: Network,
}

impl fmt::Debug for LocalEvmWalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEvmWalletProvider")
            .field("address", &self.address)
            .field("network", &self.network)
            .field("rpc", &self.rpc)
            .finish_non_exhaustive()
    }
}

impl LocalEvmWalletProvider {
    /// Configure from `config`, falling back to the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] for an invalid key, an unknown or
    /// contradictory network, or a malformed RPC URL.
    pub async fn configure_with_wallet(config: LocalEvmWalletConfig) -> Result<Self, WalletError> {
        Self::configure_with_env(config, &EnvSource::process()).await
    }

    /// Configure from `config`, falling back to `env`.
    ///
    /// # Errors
    ///
    /// See [`configure_with_wallet`](Self::configure_with_wallet).
    pub async fn configure_with_env(
        config: LocalEvmWalletConfig,
        env: &EnvSource,
    ) -> Result<Self, WalletError> {
        let network = resolve_network(
            env,
            config.network_id.as_deref(),
            config.chain_id.as_deref(),
        )?;
        let signer = match env.resolve(config.private_key.as_deref(), config::PRIVATE_KEY_ENV) {
            Some(key) => parse_private_key(&key)?,
            None => {
                warn!(network = %network, "no private key configured, generated a new one");
                PrivateKeySigner::random()
            }
        };
        let rpc_url = env.resolve(config.rpc_url.as_deref(), config::RPC_URL_ENV);
        let rpc = EvmRpc::connect(network, rpc_url.as_deref())?
            .with_poll_policy(config.poll.unwrap_or_default());
        Ok(Self::new(signer, rpc))
    }

    /// Build from an existing signer and RPC connection.
    #[must_use]
    pub fn new(signer: PrivateKeySigner, rpc: EvmRpc) -> Self {
        let signer = signer.with_chain_id(Some(rpc.network().chain_id()));
        let address = signer.address().to_checksum(None);
        let network = rpc.network().to_network();
        info!(address = %address, network = %network, "local EVM wallet configured");
        Self {
            wallet: EthereumWallet::from(signer.clone()),
            signer,
            rpc,
            address,
            network,
        }
    }

    /// The underlying signer.
    #[must_use]
    pub const fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// The chain RPC connection.
    #[must_use]
    pub const fn rpc(&self) -> &EvmRpc {
        &self.rpc
    }
}

fn parse_private_key(key: &str) -> Result<PrivateKeySigner, WalletError> {
    let key = key.trim();
    key.strip_prefix("0x")
        .unwrap_or(key)
        .parse()
        .map_err(|e| WalletError::config(format!("invalid private key: {e}")))
}

#[async_trait]
impl WalletProvider for LocalEvmWalletProvider {
    fn address(&self) -> &str {
        &self.address
    }

    fn network(&self) -> &Network {
        &self.network
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn balance(&self) -> Result<U256, WalletError> {
        self.rpc.balance(self.signer.address()).await
    }

    async fn native_transfer(&self, to: &str, amount: &str) -> Result<String, WalletError> {
        let to = parse_evm_address(to)?;
        let value = parse_amount(amount, EVM_DECIMALS)?;
        let tx = TransactionRequest::default().with_to(to).with_value(value);
        let receipt = self.send_and_confirm(tx).await?;
        Ok(format!("{:#x}", receipt.transaction_hash))
    }
}

#[async_trait]
impl EvmWalletProvider for LocalEvmWalletProvider {
    fn evm_address(&self) -> Address {
        self.signer.address()
    }

    fn evm_network(&self) -> EvmNetwork {
        self.rpc.network()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        let sig = self
            .signer
            .sign_message(message)
            .await
            .map_err(|e| WalletError::signing(format!("sign_message failed: {e}")))?;
        Ok(format_signature(&sig.as_bytes()))
    }

    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, WalletError> {
        let hash = typed_data
            .eip712_signing_hash()
            .map_err(|e| WalletError::signing(format!("invalid typed data: {e}")))?;
        let sig = self
            .signer
            .sign_hash(&hash)
            .await
            .map_err(|e| WalletError::signing(format!("sign_typed_data failed: {e}")))?;
        Ok(format_signature(&sig.as_bytes()))
    }

    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Bytes, WalletError> {
        let tx = self.rpc.fill(self.signer.address(), tx).await?;
        let envelope = tx
            .build(&self.wallet)
            .await
            .map_err(|e| WalletError::signing(format!("sign_transaction failed: {e}")))?;
        debug!(hash = %envelope.tx_hash(), state = %TransactionState::Signed, "transaction signed");
        Ok(envelope.encoded_2718().into())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError> {
        let raw = self.sign_transaction(tx).await?;
        let hash = self.rpc.send_raw(&raw).await?;
        debug!(hash = %hash, state = %TransactionState::Submitted, "transaction submitted");
        Ok(hash)
    }

    async fn wait_for_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<TransactionReceipt, WalletError> {
        self.rpc.wait_for_receipt(hash).await
    }

    async fn read_contract(&self, to: Address, calldata: Bytes) -> Result<Bytes, WalletError> {
        self.rpc.call(to, calldata).await
    }
}
