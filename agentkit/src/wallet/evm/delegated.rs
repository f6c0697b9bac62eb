//! EVM wallet whose key is held by a custodian.

use std::fmt;

use alloy::dyn_abi::TypedData;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::{EvmRpc, EvmWalletProvider, EvmWalletProviderExt, parse_evm_address, resolve_network};
use crate::config::{self, EnvSource};
use crate::custodial::{ChainType, CustodialClient, CustodialWalletExport};
use crate::network::{EvmNetwork, Network};
use crate::wallet::{
    EVM_DECIMALS, PollPolicy, TransactionState, WalletError, WalletProvider, parse_amount,
};

const NAME: &str = "delegated_evm_wallet_provider";

/// Configuration for [`DelegatedEvmWalletProvider`].
///
/// App credentials are mandatory. Without a wallet id a new custodial
/// wallet is created.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelegatedEvmWalletConfig {
    /// Falls back to `PRIVY_APP_ID`.
    pub app_id: Option<String>,
    /// Falls back to `PRIVY_APP_SECRET`.
    pub app_secret: Option<String>,
    /// Falls back to `PRIVY_WALLET_ID`.
    pub wallet_id: Option<String>,
    /// Falls back to `PRIVY_WALLET_AUTHORIZATION_PRIVATE_KEY`.
    pub authorization_private_key: Option<String>,
    /// Falls back to `NETWORK_ID`.
    pub network_id: Option<String>,
    /// Falls back to `CHAIN_ID`.
    pub chain_id: Option<String>,
    /// Chain RPC used for balances and receipts. Falls back to `RPC_URL`.
    pub rpc_url: Option<String>,
    /// Custodial API base URL. Falls back to `PRIVY_API_URL`.
    pub api_url: Option<String>,
    /// Receipt polling bound.
    #[serde(skip)]
    pub poll: Option<PollPolicy>,
}

impl fmt::Debug for DelegatedEvmWalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedEvmWalletConfig")
            .field("app_id", &self.app_id)
            .field("wallet_id", &self.wallet_id)
            .field("network_id", &self.network_id)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// An EVM wallet that signs and sends through the custodial API.
#[derive(Debug)]
pub struct DelegatedEvmWalletProvider {
    client: CustodialClient,
    rpc: EvmRpc,
    wallet_id: String,
    evm_address: Address,
    address: String,
    network: Network,
}

impl DelegatedEvmWalletProvider {
    /// Configure from `config`, falling back to the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] for missing credentials or an unknown
    /// network, and [`WalletError::Remote`] if the custodian rejects the
    /// wallet lookup.
    pub async fn configure_with_wallet(
        config: DelegatedEvmWalletConfig,
    ) -> Result<Self, WalletError> {
        Self::configure_with_env(config, &EnvSource::process()).await
    }

    /// Configure from `config`, falling back to `env`.
    ///
    /// # Errors
    ///
    /// See [`configure_with_wallet`](Self::configure_with_wallet).
    pub async fn configure_with_env(
        config: DelegatedEvmWalletConfig,
        env: &EnvSource,
    ) -> Result<Self, WalletError> {
        let network = resolve_network(
            env,
            config.network_id.as_deref(),
            config.chain_id.as_deref(),
        )?;

        let mut builder = CustodialClient::builder();
        if let Some(v) = config.app_id {
            builder = builder.app_id(v);
        }
        if let Some(v) = config.app_secret {
            builder = builder.app_secret(v);
        }
        if let Some(v) = config.authorization_private_key {
            builder = builder.authorization_key(v);
        }
        if let Some(v) = config.api_url {
            builder = builder.base_url(v);
        }
        let client = builder.with_env(env).build()?;

        let rpc_url = env.resolve(config.rpc_url.as_deref(), config::RPC_URL_ENV);
        let rpc = EvmRpc::connect(network, rpc_url.as_deref())?
            .with_poll_policy(config.poll.unwrap_or_default());

        let wallet = match env.resolve(config.wallet_id.as_deref(), config::PRIVY_WALLET_ID_ENV) {
            Some(id) => client.get_wallet(&id).await?,
            None => {
                let wallet = client.create_wallet(ChainType::Ethereum).await?;
                info!(wallet_id = %wallet.id, "created custodial EVM wallet");
                wallet
            }
        };
        if wallet.chain_type != ChainType::Ethereum {
            return Err(WalletError::config(format!(
                "custodial wallet {} is not an EVM wallet",
                wallet.id
            )));
        }
        let evm_address = parse_evm_address(&wallet.address)
            .map_err(|e| WalletError::provider(format!("custodian returned {e}")))?;

        let provider = Self {
            client,
            rpc,
            wallet_id: wallet.id,
            evm_address,
            address: evm_address.to_checksum(None),
            network: network.to_network(),
        };
        info!(
            address = %provider.address,
            network = %provider.network,
            wallet_id = %provider.wallet_id,
            "delegated EVM wallet configured"
        );
        Ok(provider)
    }

    /// Custodian wallet id.
    #[must_use]
    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    /// Everything needed to rebuild this provider later.
    #[must_use]
    pub fn export(&self) -> CustodialWalletExport {
        let network = self.rpc.network();
        CustodialWalletExport {
            wallet_id: self.wallet_id.clone(),
            authorization_private_key: self
                .client
                .authorization_key()
                .map(|k| k.encoded().to_owned()),
            network_id: network.network_id().to_owned(),
            chain_id: Some(network.chain_id().to_string()),
        }
    }

    async fn call(&self, body: &Value) -> Result<Value, WalletError> {
        self.client.rpc(&self.wallet_id, body).await
    }

    async fn call_for(&self, body: &Value, field: &str) -> Result<String, WalletError> {
        let data = self.call(body).await?;
        data.get(field)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                WalletError::provider(format!("custodian reply is missing '{field}': {data}"))
            })
    }

    fn caip2(&self) -> String {
        format!("eip155:{}", self.rpc.network().chain_id())
    }
}

/// The custodian's JSON shape of a transaction. Quantities are hex strings.
fn custodial_transaction(tx: &TransactionRequest, chain_id: u64) -> Value {
    let mut out = Map::new();
    if let Some(to) = tx.to.as_ref().and_then(|kind| kind.to().copied()) {
        out.insert("to".into(), json!(format!("{to:#x}")));
    }
    out.insert(
        "value".into(),
        json!(format!("{:#x}", tx.value.unwrap_or(U256::ZERO))),
    );
    if let Some(input) = tx.input.input().filter(|data| !data.is_empty()) {
        out.insert(
            "data".into(),
            json!(alloy::primitives::hex::encode_prefixed(input)),
        );
    }
    if let Some(gas) = tx.gas {
        out.insert("gas_limit".into(), json!(format!("{gas:#x}")));
    }
    if let Some(nonce) = tx.nonce {
        out.insert("nonce".into(), json!(nonce));
    }
    if let Some(fee) = tx.max_fee_per_gas {
        out.insert("max_fee_per_gas".into(), json!(format!("{fee:#x}")));
    }
    if let Some(fee) = tx.max_priority_fee_per_gas {
        out.insert("max_priority_fee_per_gas".into(), json!(format!("{fee:#x}")));
    }
    out.insert("chain_id".into(), json!(tx.chain_id.unwrap_or(chain_id)));
    Value::Object(out)
}

/// Typed data in the custodian's shape: `primaryType` becomes `primary_type`.
fn custodial_typed_data(typed_data: &TypedData) -> Result<Value, WalletError> {
    let mut value = serde_json::to_value(typed_data)
        .map_err(|e| WalletError::signing(format!("typed data does not serialize: {e}")))?;
    if let Some((obj, primary)) = value
        .as_object_mut()
        .and_then(|obj| obj.remove("primaryType").map(|primary| (obj, primary)))
    {
        obj.insert("primary_type".into(), primary);
    }
    Ok(value)
}

fn parse_hash(value: &str) -> Result<B256, WalletError> {
    value
        .parse()
        .map_err(|e| WalletError::provider(format!("custodian returned invalid hash '{value}': {e}")))
}

#[async_trait]
impl WalletProvider for DelegatedEvmWalletProvider {
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
        let tx = TransactionRequest::default().with_to(to).with_value(value);
        let receipt = self.send_and_confirm(tx).await?;
        Ok(format!("{:#x}", receipt.transaction_hash))
    }
}

#[async_trait]
impl EvmWalletProvider for DelegatedEvmWalletProvider {
    fn evm_address(&self) -> Address {
        self.evm_address
    }

    fn evm_network(&self) -> EvmNetwork {
        self.rpc.network()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        let body = json!({
            "method": "personal_sign",
            "params": {
                "message": alloy::primitives::hex::encode_prefixed(message),
                "encoding": "hex",
            },
        });
        self.call_for(&body, "signature").await
    }

    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, WalletError> {
        let body = json!({
            "method": "eth_signTypedData_v4",
            "params": { "typed_data": custodial_typed_data(typed_data)? },
        });
        self.call_for(&body, "signature").await
    }

    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Bytes, WalletError> {
        let chain_id = self.rpc.network().chain_id();
        let body = json!({
            "method": "eth_signTransaction",
            "params": { "transaction": custodial_transaction(&tx, chain_id) },
        });
        let signed = self.call_for(&body, "signed_transaction").await?;
        signed.parse().map_err(|e| {
            WalletError::provider(format!("custodian returned invalid transaction bytes: {e}"))
        })
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError> {
        let chain_id = self.rpc.network().chain_id();
        let body = json!({
            "method": "eth_sendTransaction",
            "caip2": self.caip2(),
            "chain_type": "ethereum",
            "params": { "transaction": custodial_transaction(&tx, chain_id) },
        });
        let hash = parse_hash(&self.call_for(&body, "hash").await?)?;
        debug!(hash = %hash, state = %TransactionState::Submitted, "custodial transaction submitted");
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

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    #[test]
    fn transaction_quantities_are_hex_strings() {
        let tx = TransactionRequest::default()
            .with_to(address!("5154eae861cac3aa757d6016babaf972341354cf"))
            .with_value(U256::from(1000));
        let value = custodial_transaction(&tx, 84532);
        assert_eq!(value["value"], "0x3e8");
        assert_eq!(value["to"], "0x5154eae861cac3aa757d6016babaf972341354cf");
        assert_eq!(value["chain_id"], 84532);
        assert!(value.get("data").is_none());
    }

    #[test]
    fn typed_data_uses_snake_case_primary_type() {
        let typed: TypedData = serde_json::from_value(json!({
            "types": {
                "EIP712Domain": [{"name": "name", "type": "string"}],
                "Mail": [{"name": "contents", "type": "string"}]
            },
            "primaryType": "Mail",
            "domain": {"name": "Ether Mail"},
            "message": {"contents": "hello"}
        }))
        .unwrap();
        let value = custodial_typed_data(&typed).unwrap();
        assert_eq!(value["primary_type"], "Mail");
        assert!(value.get("primaryType").is_none());
        assert_eq!(value["message"]["contents"], "hello");
    }

    #[test]
    fn invalid_hash_is_provider_error() {
        assert!(matches!(parse_hash("0x12"), Err(WalletError::Provider(_))));
    }
}
