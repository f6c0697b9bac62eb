//! Account-abstraction wallet that submits intents to an intent service.
//!
//! An intent is a batch of calls. The service prepares it for the smart
//! account and returns the hash to authorize; the [`EcdsaValidator`] has the
//! inner signer authorize it; the service executes it and later reports an
//! execution receipt carrying the on-chain transaction hash.

use std::fmt;
use std::sync::Arc;

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, B256, Bytes, U256, eip191_hash_message};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{Call, EcdsaValidator, EvmRpc, EvmWalletProvider, parse_evm_address};
use crate::config::{self, EnvSource};
use crate::jsonrpc::JsonRpcClient;
use crate::network::{EvmNetwork, Network};
use crate::wallet::{
    EVM_DECIMALS, OperationStatus, Poll, PollPolicy, TransactionState, WalletError,
    WalletProvider, parse_amount, poll_until,
};

const NAME: &str = "intent_wallet_provider";

/// An intent prepared by the service, awaiting authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedIntent {
    /// Hash the account must authorize.
    pub hash: B256,
    /// Service-specific intent body, returned unchanged on submission.
    pub intent: Value,
}

/// Execution state of a submitted intent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentExecutionReceipt {
    /// `pending`, `executing`, `success`, or `failed`.
    pub status: String,
    /// Transaction that executed the intent, once known.
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    /// Failure detail reported by the service.
    #[serde(default)]
    pub reason: Option<String>,
}

impl IntentExecutionReceipt {
    /// Map the service's status onto the shared status model.
    #[must_use]
    pub fn operation_status(&self) -> OperationStatus {
        match (self.status.as_str(), self.transaction_hash) {
            ("success" | "complete" | "completed", Some(hash)) => OperationStatus::Complete {
                transaction_hash: format!("{hash:#x}"),
            },
            ("success" | "complete" | "completed", None) => OperationStatus::Failed {
                reason: format!("intent reported {} without a transaction hash", self.status),
            },
            ("failed" | "reverted" | "error", _) => OperationStatus::Failed {
                reason: self.reason.clone().unwrap_or_else(|| self.status.clone()),
            },
            ("executing" | "bundled", _) => OperationStatus::Bundled,
            _ => OperationStatus::Pending,
        }
    }
}

/// Backend of [`IntentWalletProvider`].
#[async_trait]
pub trait IntentClient: Send + Sync + fmt::Debug {
    /// Smart account address controlled by `owner` on `chain_id`.
    async fn account_address(&self, owner: Address, chain_id: u64) -> Result<Address, WalletError>;

    /// Prepare `calls` for execution from `account`.
    async fn prepare_intent(
        &self,
        account: Address,
        chain_id: u64,
        calls: &[Call],
    ) -> Result<PreparedIntent, WalletError>;

    /// Submit an authorized intent. Returns the intent hash.
    async fn send_intent(
        &self,
        prepared: PreparedIntent,
        signature: String,
    ) -> Result<B256, WalletError>;

    /// Execution receipt, or `None` while the service has none.
    async fn execution_receipt(
        &self,
        intent_hash: B256,
    ) -> Result<Option<IntentExecutionReceipt>, WalletError>;
}

/// [`IntentClient`] over the service's JSON-RPC interface.
#[derive(Debug)]
pub struct HttpIntentClient {
    rpc: JsonRpcClient,
}

impl HttpIntentClient {
    /// Bind to the service at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if `url` does not parse.
    pub fn new(url: &str) -> Result<Self, WalletError> {
        Ok(Self {
            rpc: JsonRpcClient::new(url)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendIntentResult {
    intent_hash: B256,
}

#[async_trait]
impl IntentClient for HttpIntentClient {
    async fn account_address(&self, owner: Address, chain_id: u64) -> Result<Address, WalletError> {
        self.rpc
            .request(
                "ui_getAccountAddress",
                [json!({ "owner": owner, "chainId": chain_id })],
            )
            .await
    }

    async fn prepare_intent(
        &self,
        account: Address,
        chain_id: u64,
        calls: &[Call],
    ) -> Result<PreparedIntent, WalletError> {
        let calls: Vec<Value> = calls
            .iter()
            .map(|c| json!({ "to": c.to, "value": c.value, "data": c.data }))
            .collect();
        self.rpc
            .request(
                "ui_prepareIntent",
                [json!({ "account": account, "chainId": chain_id, "calls": calls })],
            )
            .await
    }

    async fn send_intent(
        &self,
        prepared: PreparedIntent,
        signature: String,
    ) -> Result<B256, WalletError> {
        let result: SendIntentResult = self
            .rpc
            .request(
                "ui_sendIntent",
                [json!({ "intent": prepared.intent, "hash": prepared.hash, "signature": signature })],
            )
            .await?;
        Ok(result.intent_hash)
    }

    async fn execution_receipt(
        &self,
        intent_hash: B256,
    ) -> Result<Option<IntentExecutionReceipt>, WalletError> {
        self.rpc
            .request("ui_getExecutionReceipt", [intent_hash])
            .await
    }
}

/// Configuration for [`IntentWalletProvider`].
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntentWalletConfig {
    /// Inner signer that authorizes intents. Mandatory.
    #[serde(skip)]
    pub signer: Option<Arc<dyn EvmWalletProvider>>,
    /// Falls back to `INTENT_SERVICE_URL`. Mandatory.
    pub intent_service_url: Option<String>,
    /// Chain RPC for balances, reads, and receipts. Falls back to `RPC_URL`.
    pub rpc_url: Option<String>,
    /// Bound for execution receipt polling.
    #[serde(skip)]
    pub poll: Option<PollPolicy>,
}

impl fmt::Debug for IntentWalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentWalletConfig")
            .field("signer", &self.signer.as_ref().map(|s| s.address().to_owned()))
            .field("intent_service_url", &self.intent_service_url)
            .field("rpc_url", &self.rpc_url)
            .field("poll", &self.poll)
            .finish()
    }
}

/// A smart account wallet whose transactions are executed as intents.
///
/// Shares the inner signer's network. The address is the smart account's.
#[derive(Debug)]
pub struct IntentWalletProvider {
    validator: EcdsaValidator,
    client: Arc<dyn IntentClient>,
    rpc: EvmRpc,
    evm_address: Address,
    address: String,
    network: Network,
}

impl IntentWalletProvider {
    /// Configure from `config`, falling back to the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] when the signer or service URL is
    /// missing, and a provider error if the account lookup fails.
    pub async fn configure_with_wallet(config: IntentWalletConfig) -> Result<Self, WalletError> {
        Self::configure_with_env(config, &EnvSource::process()).await
    }

    /// Configure from `config`, falling back to `env`.
    ///
    /// # Errors
    ///
    /// See [`configure_with_wallet`](Self::configure_with_wallet).
    pub async fn configure_with_env(
        config: IntentWalletConfig,
        env: &EnvSource,
    ) -> Result<Self, WalletError> {
        let signer = config
            .signer
            .ok_or_else(|| WalletError::config("intent wallet requires an inner signer"))?;
        let url = env.require(
            config.intent_service_url.as_deref(),
            config::INTENT_SERVICE_URL_ENV,
        )?;
        let rpc_url = env.resolve(config.rpc_url.as_deref(), config::RPC_URL_ENV);
        let rpc = EvmRpc::connect(signer.evm_network(), rpc_url.as_deref())?
            .with_poll_policy(config.poll.unwrap_or_default());
        Self::new(signer, Arc::new(HttpIntentClient::new(&url)?), rpc).await
    }

    /// Build from an inner signer, an intent client, and a chain connection.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if `rpc` serves a different network
    /// than `signer`, or the client's error if the account lookup fails.
    pub async fn new(
        signer: Arc<dyn EvmWalletProvider>,
        client: Arc<dyn IntentClient>,
        rpc: EvmRpc,
    ) -> Result<Self, WalletError> {
        let network = signer.evm_network();
        if rpc.network() != network {
            return Err(WalletError::config(format!(
                "inner signer is on {network} but the RPC serves {}",
                rpc.network()
            )));
        }
        let account = client
            .account_address(signer.evm_address(), network.chain_id())
            .await?;
        let provider = Self {
            validator: EcdsaValidator::new(signer, account, network.chain_id()),
            client,
            rpc,
            evm_address: account,
            address: account.to_checksum(None),
            network: network.to_network(),
        };
        info!(
            address = %provider.address,
            signer = %provider.validator.signer().address(),
            network = %provider.network,
            "intent wallet configured"
        );
        Ok(provider)
    }

    /// The validator authorizing this account's intents.
    #[must_use]
    pub const fn validator(&self) -> &EcdsaValidator {
        &self.validator
    }

    /// Execute `calls` as one intent and wait for its execution receipt.
    ///
    /// Returns the hash of the executing transaction.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::OperationFailed`] naming the intent and the
    /// service's status on failure, or [`WalletError::Timeout`].
    pub async fn send_calls(&self, calls: &[Call]) -> Result<B256, WalletError> {
        if calls.is_empty() {
            return Err(WalletError::invalid_argument("intent needs at least one call"));
        }
        let chain_id = self.rpc.network().chain_id();
        let prepared = self
            .client
            .prepare_intent(self.evm_address, chain_id, calls)
            .await?;
        debug!(hash = %prepared.hash, state = %TransactionState::Built, "intent prepared");
        let signature = self.validator.sign_hash(prepared.hash).await?;
        let intent_hash = self.client.send_intent(prepared, signature).await?;
        let handle = format!("{intent_hash:#x}");
        info!(intent = %handle, state = %TransactionState::Submitted, "intent submitted");

        let client = &self.client;
        let status = poll_until(&handle, self.rpc.poll_policy(), move || async move {
            let status = client
                .execution_receipt(intent_hash)
                .await?
                .map_or(OperationStatus::Pending, |r| r.operation_status());
            Ok(if status.is_terminal() {
                Poll::Ready(status)
            } else {
                Poll::Pending
            })
        })
        .await?;

        match status {
            OperationStatus::Complete { transaction_hash } => {
                info!(intent = %handle, tx = %transaction_hash, "intent executed");
                transaction_hash.parse().map_err(|e| {
                    WalletError::provider(format!("invalid transaction hash '{transaction_hash}': {e}"))
                })
            }
            OperationStatus::Failed { reason } => {
                warn!(intent = %handle, reason = %reason, "intent failed");
                Err(WalletError::operation_failed(handle, reason))
            }
            other => Err(WalletError::provider(format!(
                "intent {handle} ended in non-terminal status {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl WalletProvider for IntentWalletProvider {
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
        self.rpc.balance(self.evm_address).await
    }

    async fn native_transfer(&self, to: &str, amount: &str) -> Result<String, WalletError> {
        let to = parse_evm_address(to)?;
        let value = parse_amount(amount, EVM_DECIMALS)?;
        let hash = self
            .send_calls(&[Call {
                to,
                value,
                data: Bytes::new(),
            }])
            .await?;
        Ok(format!("{hash:#x}"))
    }
}

#[async_trait]
impl EvmWalletProvider for IntentWalletProvider {
    fn evm_address(&self) -> Address {
        self.evm_address
    }

    fn evm_network(&self) -> EvmNetwork {
        self.rpc.network()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        self.validator.sign_hash(eip191_hash_message(message)).await
    }

    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, WalletError> {
        let hash = typed_data
            .eip712_signing_hash()
            .map_err(|e| WalletError::signing(format!("invalid typed data: {e}")))?;
        self.validator.sign_hash(hash).await
    }

    async fn sign_transaction(&self, _tx: TransactionRequest) -> Result<Bytes, WalletError> {
        Err(WalletError::unsupported(NAME, "sign_transaction"))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError> {
        let to = tx
            .to
            .as_ref()
            .and_then(|kind| kind.to().copied())
            .ok_or_else(|| WalletError::invalid_argument("intents cannot deploy contracts"))?;
        self.send_calls(&[Call {
            to,
            value: tx.value.unwrap_or_default(),
            data: tx.input.input().cloned().unwrap_or_default(),
        }])
        .await
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
