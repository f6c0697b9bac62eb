//! Smart contract account wallet driven through user operations.

use std::fmt;
use std::sync::Arc;

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    Call, Erc4337BundlerClient, EvmRpc, EvmWalletProvider, SmartAccountClient, parse_evm_address,
    resolve_network,
};
use crate::config::{self, EnvSource};
use crate::network::{EvmNetwork, Network};
use crate::wallet::{
    EVM_DECIMALS, OperationStatus, Poll, PollPolicy, TransactionState, WalletError,
    WalletProvider, parse_amount, poll_until,
};

const NAME: &str = "smart_wallet_provider";

/// Configuration for [`SmartWalletProvider`].
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmartWalletConfig {
    /// Owner key. Falls back to `PRIVATE_KEY`, then to a generated key.
    pub private_key: Option<String>,
    /// Falls back to `NETWORK_ID`.
    pub network_id: Option<String>,
    /// Falls back to `CHAIN_ID`.
    pub chain_id: Option<String>,
    /// Falls back to `RPC_URL`.
    pub rpc_url: Option<String>,
    /// Mandatory. Falls back to `BUNDLER_URL`.
    pub bundler_url: Option<String>,
    /// Bound for receipt and user operation polling.
    #[serde(skip)]
    pub poll: Option<PollPolicy>,
}

impl fmt::Debug for SmartWalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartWalletConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("network_id", &self.network_id)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("bundler_url", &self.bundler_url)
            .field("poll", &self.poll)
            .finish()
    }
}

/// A smart contract account controlled by a local owner key.
///
/// The address is the smart account's, not the owner's. Every transaction
/// becomes a user operation; raw signing is not available.
pub struct SmartWalletProvider {
    owner: PrivateKeySigner,
    client: Arc<dyn SmartAccountClient>,
    rpc: EvmRpc,
    evm_address: Address,
    address: String,
    network: Network,
}

impl fmt::Debug for SmartWalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartWalletProvider")
            .field("address", &self.address)
            .field("owner", &self.owner.address())
            .field("network", &self.network)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl SmartWalletProvider {
    /// Configure from `config`, falling back to the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] for a missing bundler URL, invalid key,
    /// or unknown network, and a provider error if the account address lookup
    /// fails.
    pub async fn configure_with_wallet(config: SmartWalletConfig) -> Result<Self, WalletError> {
        Self::configure_with_env(config, &EnvSource::process()).await
    }

    /// Configure from `config`, falling back to `env`.
    ///
    /// # Errors
    ///
    /// See [`configure_with_wallet`](Self::configure_with_wallet).
    pub async fn configure_with_env(
        config: SmartWalletConfig,
        env: &EnvSource,
    ) -> Result<Self, WalletError> {
        let network = resolve_network(
            env,
            config.network_id.as_deref(),
            config.chain_id.as_deref(),
        )?;
        let bundler_url = env.require(config.bundler_url.as_deref(), config::BUNDLER_URL_ENV)?;
        let owner = match env.resolve(config.private_key.as_deref(), config::PRIVATE_KEY_ENV) {
            Some(key) => {
                let key = key.trim();
                key.strip_prefix("0x")
                    .unwrap_or(key)
                    .parse::<PrivateKeySigner>()
                    .map_err(|e| WalletError::config(format!("invalid owner key: {e}")))?
            }
            None => {
                warn!(network = %network, "no owner key configured, generated a new one");
                PrivateKeySigner::random()
            }
        };
        let rpc_url = env.resolve(config.rpc_url.as_deref(), config::RPC_URL_ENV);
        let rpc = EvmRpc::connect(network, rpc_url.as_deref())?
            .with_poll_policy(config.poll.unwrap_or_default());
        let client = Erc4337BundlerClient::connect(rpc.clone(), &bundler_url, owner.address()).await?;
        Ok(Self::new(owner, Arc::new(client), rpc))
    }

    /// Build from an owner key, an account client, and a chain connection.
    #[must_use]
    pub fn new(owner: PrivateKeySigner, client: Arc<dyn SmartAccountClient>, rpc: EvmRpc) -> Self {
        let evm_address = client.account_address();
        let address = evm_address.to_checksum(None);
        let network = rpc.network().to_network();
        info!(
            address = %address,
            owner = %owner.address(),
            network = %network,
            "smart wallet configured"
        );
        Self {
            owner,
            client,
            rpc,
            evm_address,
            address,
            network,
        }
    }

    /// Address of the owner key that authorizes the account.
    #[must_use]
    pub fn owner_address(&self) -> Address {
        self.owner.address()
    }

    /// Execute `calls` in one user operation and wait until it lands.
    ///
    /// Returns the hash of the transaction that carried the operation.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::OperationFailed`] naming the user operation and
    /// the bundler's status when the operation fails, or
    /// [`WalletError::Timeout`] when it does not land in time.
    pub async fn send_calls(&self, calls: &[Call]) -> Result<B256, WalletError> {
        let prepared = self.client.prepare_user_operation(calls).await?;
        let signature = self
            .owner
            .sign_hash(&prepared.hash)
            .await
            .map_err(|e| WalletError::signing(format!("user operation signing failed: {e}")))?;
        let op_hash = self
            .client
            .send_user_operation(prepared, Bytes::from(signature.as_bytes().to_vec()))
            .await?;
        let handle = format!("{op_hash:#x}");
        info!(user_op = %handle, state = %TransactionState::Submitted, "user operation submitted");

        let client = &self.client;
        let status = poll_until(&handle, self.rpc.poll_policy(), move || async move {
            let status = client.user_operation_status(op_hash).await?;
            Ok(if status.is_terminal() {
                Poll::Ready(status)
            } else {
                Poll::Pending
            })
        })
        .await?;

        match status {
            OperationStatus::Complete { transaction_hash } => {
                info!(user_op = %handle, tx = %transaction_hash, state = %TransactionState::Complete, "user operation landed");
                transaction_hash.parse().map_err(|e| {
                    WalletError::provider(format!(
                        "bundler returned invalid transaction hash '{transaction_hash}': {e}"
                    ))
                })
            }
            OperationStatus::Failed { reason } => {
                warn!(user_op = %handle, reason = %reason, state = %TransactionState::Failed, "user operation failed");
                Err(WalletError::operation_failed(handle, reason))
            }
            other => Err(WalletError::provider(format!(
                "user operation {handle} ended in non-terminal status {other:?}"
            ))),
        }
    }

    fn unsupported(&self, operation: &str) -> WalletError {
        WalletError::unsupported(self.name(), operation)
    }
}

#[async_trait]
impl WalletProvider for SmartWalletProvider {
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
impl EvmWalletProvider for SmartWalletProvider {
    fn evm_address(&self) -> Address {
        self.evm_address
    }

    fn evm_network(&self) -> EvmNetwork {
        self.rpc.network()
    }

    async fn sign_message(&self, _message: &[u8]) -> Result<String, WalletError> {
        Err(self.unsupported("sign_message"))
    }

    async fn sign_typed_data(&self, _typed_data: &TypedData) -> Result<String, WalletError> {
        Err(self.unsupported("sign_typed_data"))
    }

    async fn sign_transaction(&self, _tx: TransactionRequest) -> Result<Bytes, WalletError> {
        Err(self.unsupported("sign_transaction"))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError> {
        let to = tx
            .to
            .as_ref()
            .and_then(|kind| kind.to().copied())
            .ok_or_else(|| {
                WalletError::invalid_argument("smart accounts cannot deploy contracts directly")
            })?;
        let call = Call {
            to,
            value: tx.value.unwrap_or_default(),
            data: tx.input.input().cloned().unwrap_or_default(),
        };
        self.send_calls(&[call]).await
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

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use alloy::network::TransactionBuilder;

    use super::*;
    use crate::wallet::evm::{ENTRY_POINT_V06, PreparedUserOperation, UserOperation};

    #[derive(Debug)]
    struct FakeAccount {
        statuses: Mutex<Vec<OperationStatus>>,
        submitted: Mutex<Vec<Bytes>>,
    }

    impl FakeAccount {
        fn new(mut statuses: Vec<OperationStatus>) -> Self {
            statuses.reverse();
            Self {
                statuses: Mutex::new(statuses),
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SmartAccountClient for FakeAccount {
        fn account_address(&self) -> Address {
            Address::repeat_byte(0xaa)
        }

        async fn prepare_user_operation(
            &self,
            calls: &[Call],
        ) -> Result<PreparedUserOperation, WalletError> {
            let op = UserOperation {
                sender: self.account_address(),
                nonce: U256::ZERO,
                init_code: Bytes::new(),
                call_data: calls[0].data.clone(),
                call_gas_limit: U256::ZERO,
                verification_gas_limit: U256::ZERO,
                pre_verification_gas: U256::ZERO,
                max_fee_per_gas: U256::ZERO,
                max_priority_fee_per_gas: U256::ZERO,
                paymaster_and_data: Bytes::new(),
                signature: Bytes::new(),
            };
            Ok(PreparedUserOperation {
                hash: op.hash(ENTRY_POINT_V06, 84532),
                user_operation: op,
            })
        }

        async fn send_user_operation(
            &self,
            _prepared: PreparedUserOperation,
            owner_signature: Bytes,
        ) -> Result<B256, WalletError> {
            self.submitted.lock().unwrap().push(owner_signature);
            Ok(B256::repeat_byte(0x01))
        }

        async fn user_operation_status(&self, _hash: B256) -> Result<OperationStatus, WalletError> {
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(OperationStatus::Pending))
        }
    }

    fn provider(fake: Arc<FakeAccount>) -> SmartWalletProvider {
        let rpc = EvmRpc::connect(EvmNetwork::BaseSepolia, Some("http://127.0.0.1:1"))
            .unwrap()
            .with_poll_policy(PollPolicy::new(Duration::from_millis(1), 5));
        SmartWalletProvider::new(PrivateKeySigner::random(), fake, rpc)
    }

    fn transfer() -> TransactionRequest {
        TransactionRequest::default()
            .with_to(Address::repeat_byte(0x42))
            .with_value(U256::from(1000))
    }

    #[tokio::test]
    async fn address_is_the_account_not_the_owner() {
        let wallet = provider(Arc::new(FakeAccount::new(vec![])));
        assert_eq!(wallet.evm_address(), Address::repeat_byte(0xaa));
        assert_ne!(wallet.evm_address(), wallet.owner_address());
    }

    #[tokio::test]
    async fn resolves_to_bundled_transaction_hash() {
        let tx_hash = B256::repeat_byte(0x77);
        let fake = Arc::new(FakeAccount::new(vec![
            OperationStatus::Pending,
            OperationStatus::Bundled,
            OperationStatus::Complete {
                transaction_hash: format!("{tx_hash:#x}"),
            },
        ]));
        let wallet = provider(Arc::clone(&fake));
        assert_eq!(wallet.send_transaction(transfer()).await.unwrap(), tx_hash);
        assert_eq!(fake.submitted.lock().unwrap()[0].len(), 65);
    }

    #[tokio::test]
    async fn failed_status_rejects_with_status() {
        let fake = Arc::new(FakeAccount::new(vec![OperationStatus::Failed {
            reason: "AA21 didn't pay prefund".into(),
        }]));
        let wallet = provider(fake);
        let err = wallet.send_transaction(transfer()).await.unwrap_err();
        assert!(matches!(err, WalletError::OperationFailed { .. }));
        assert!(err.to_string().contains("AA21 didn't pay prefund"), "{err}");
    }

    #[tokio::test]
    async fn raw_signing_is_unsupported() {
        let wallet = provider(Arc::new(FakeAccount::new(vec![])));
        let err = wallet.sign_message(b"hi").await.unwrap_err();
        assert!(matches!(err, WalletError::Unsupported { .. }));
        assert!(err.to_string().contains(NAME));
        assert!(matches!(
            wallet.sign_transaction(transfer()).await,
            Err(WalletError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn times_out_when_never_terminal() {
        let wallet = provider(Arc::new(FakeAccount::new(vec![])));
        let err = wallet.send_transaction(transfer()).await.unwrap_err();
        assert!(matches!(err, WalletError::Timeout { attempts: 5, .. }));
    }
}
