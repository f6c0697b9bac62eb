//! Solana wallet whose key is held by a custodian.
//!
//! Signing is remote. Sending is either through the node after a remote
//! signature, or coupled with signing in one custodial call; submitting a
//! transaction that was signed elsewhere is not offered.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{
    Pubkey, RpcConnection, Signature, SvmConnection, SvmWalletProvider, Transaction,
    identify_cluster, parse_pubkey, rpc_url, transfer_transaction,
};
use crate::config::{self, EnvSource};
use crate::custodial::{ChainType, CustodialClient, CustodialWalletExport};
use crate::network::{Network, SvmNetwork};
use crate::wallet::{PollPolicy, TransactionState, WalletError, WalletProvider, parse_lamports};

const NAME: &str = "delegated_svm_wallet_provider";

/// Configuration for [`DelegatedSvmWalletProvider`].
///
/// App credentials are mandatory. Without a wallet id a new custodial
/// wallet is created.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelegatedSvmWalletConfig {
    /// Falls back to `PRIVY_APP_ID`.
    pub app_id: Option<String>,
    /// Falls back to `PRIVY_APP_SECRET`.
    pub app_secret: Option<String>,
    /// Falls back to `PRIVY_WALLET_ID`.
    pub wallet_id: Option<String>,
    /// Falls back to `PRIVY_WALLET_AUTHORIZATION_PRIVATE_KEY`.
    pub authorization_private_key: Option<String>,
    /// Expected network id. Falls back to `NETWORK_ID`.
    pub network_id: Option<String>,
    /// Node URL. Falls back to `SOLANA_RPC_URL`.
    pub rpc_url: Option<String>,
    /// Custodial API base URL. Falls back to `PRIVY_API_URL`.
    pub api_url: Option<String>,
    /// Signature status polling bound.
    #[serde(skip)]
    pub poll: Option<PollPolicy>,
}

impl fmt::Debug for DelegatedSvmWalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedSvmWalletConfig")
            .field("app_id", &self.app_id)
            .field("wallet_id", &self.wallet_id)
            .field("network_id", &self.network_id)
            .field("rpc_url", &self.rpc_url)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// A Solana wallet that signs through the custodial API.
#[derive(Debug)]
pub struct DelegatedSvmWalletProvider {
    client: CustodialClient,
    connection: Arc<dyn SvmConnection>,
    wallet_id: String,
    public_key: Pubkey,
    svm_network: SvmNetwork,
    poll: PollPolicy,
    address: String,
    network: Network,
}

impl DelegatedSvmWalletProvider {
    /// Configure from `config`, falling back to the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] for missing credentials or an
    /// unrecognized cluster, and [`WalletError::Remote`] if the custodian
    /// rejects the wallet lookup.
    pub async fn configure_with_wallet(
        config: DelegatedSvmWalletConfig,
    ) -> Result<Self, WalletError> {
        Self::configure_with_env(config, &EnvSource::process()).await
    }

    /// Configure from `config`, falling back to `env`.
    ///
    /// # Errors
    ///
    /// See [`configure_with_wallet`](Self::configure_with_wallet).
    pub async fn configure_with_env(
        config: DelegatedSvmWalletConfig,
        env: &EnvSource,
    ) -> Result<Self, WalletError> {
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

        let network_id = env.resolve(config.network_id.as_deref(), config::NETWORK_ID_ENV);
        let url = rpc_url(
            env.resolve(config.rpc_url.as_deref(), config::SOLANA_RPC_URL_ENV),
            network_id.as_deref(),
        )?;
        let connection: Arc<dyn SvmConnection> = Arc::new(RpcConnection::new(&url)?);
        let wallet_id = env.resolve(config.wallet_id.as_deref(), config::PRIVY_WALLET_ID_ENV);

        Ok(
            Self::connect(client, wallet_id.as_deref(), connection, network_id.as_deref())
                .await?
                .with_poll_policy(config.poll.unwrap_or_default()),
        )
    }

    /// Bind a custodial wallet to a node connection.
    ///
    /// Creates a wallet when `wallet_id` is `None`. When `network_id` is
    /// given the node must be on that network.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if the wallet is not a Solana wallet
    /// or the cluster is not recognized.
    pub async fn connect(
        client: CustodialClient,
        wallet_id: Option<&str>,
        connection: Arc<dyn SvmConnection>,
        network_id: Option<&str>,
    ) -> Result<Self, WalletError> {
        let svm_network = identify_cluster(connection.as_ref(), network_id).await?;
        let wallet = match wallet_id {
            Some(id) => client.get_wallet(id).await?,
            None => {
                let wallet = client.create_wallet(ChainType::Solana).await?;
                info!(wallet_id = %wallet.id, "created custodial Solana wallet");
                wallet
            }
        };
        if wallet.chain_type != ChainType::Solana {
            return Err(WalletError::config(format!(
                "custodial wallet {} is not a Solana wallet",
                wallet.id
            )));
        }
        let public_key = parse_pubkey(&wallet.address)
            .map_err(|e| WalletError::provider(format!("custodian returned {e}")))?;

        let provider = Self {
            client,
            connection,
            wallet_id: wallet.id,
            public_key,
            svm_network,
            poll: PollPolicy::default(),
            address: public_key.to_string(),
            network: svm_network.to_network(),
        };
        info!(
            address = %provider.address,
            network = %provider.network,
            wallet_id = %provider.wallet_id,
            "delegated Solana wallet configured"
        );
        Ok(provider)
    }

    /// Override the signature polling bound.
    #[must_use]
    pub const fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Custodian wallet id.
    #[must_use]
    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    /// Everything needed to rebuild this provider later.
    #[must_use]
    pub fn export(&self) -> CustodialWalletExport {
        CustodialWalletExport {
            wallet_id: self.wallet_id.clone(),
            authorization_private_key: self
                .client
                .authorization_key()
                .map(|k| k.encoded().to_owned()),
            network_id: self.svm_network.network_id().to_owned(),
            chain_id: None,
        }
    }

    async fn call_for(&self, body: &Value, field: &str) -> Result<String, WalletError> {
        let data = self.client.rpc(&self.wallet_id, body).await?;
        data.get(field)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                WalletError::provider(format!("custodian reply is missing '{field}': {data}"))
            })
    }
}

#[async_trait]
impl WalletProvider for DelegatedSvmWalletProvider {
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
        Ok(U256::from(self.connection.balance(&self.public_key).await?))
    }

    async fn native_transfer(&self, to: &str, amount: &str) -> Result<String, WalletError> {
        let to = parse_pubkey(to)?;
        let lamports = parse_lamports(amount)?;
        let tx = transfer_transaction(self.connection.as_ref(), &self.public_key, &to, lamports)
            .await?;
        let signature = self.sign_and_send_transaction(tx).await?;
        self.wait_for_signature_result(&signature).await?;
        info!(signature = %signature, to = %to, lamports, "native transfer confirmed");
        Ok(signature.to_string())
    }
}

#[async_trait]
impl SvmWalletProvider for DelegatedSvmWalletProvider {
    fn connection(&self) -> &Arc<dyn SvmConnection> {
        &self.connection
    }

    fn public_key(&self) -> Pubkey {
        self.public_key
    }

    fn svm_network(&self) -> SvmNetwork {
        self.svm_network
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        let body = json!({
            "method": "signTransaction",
            "params": { "transaction": tx.to_base64(), "encoding": "base64" },
        });
        let signed = Transaction::from_base64(&self.call_for(&body, "signed_transaction").await?)
            .map_err(|e| WalletError::provider(format!("custodian returned {e}")))?;
        if signed.message != tx.message {
            return Err(WalletError::provider(
                "custodian returned a different transaction than it was asked to sign",
            ));
        }
        debug!(address = %self.address, state = %TransactionState::Signed, "transaction signed remotely");
        Ok(signed)
    }

    async fn send_transaction(&self, _tx: &Transaction) -> Result<Signature, WalletError> {
        Err(WalletError::unsupported(NAME, "send_transaction"))
    }

    async fn sign_and_send_transaction(&self, tx: Transaction) -> Result<Signature, WalletError> {
        let caip2 = self
            .network
            .caip2()
            .ok_or_else(|| WalletError::config("network has no CAIP-2 identifier"))?;
        let body = json!({
            "method": "signAndSendTransaction",
            "caip2": caip2,
            "params": { "transaction": tx.to_base64(), "encoding": "base64" },
        });
        let hash = self.call_for(&body, "hash").await?;
        let signature: Signature = hash
            .parse()
            .map_err(|e| WalletError::provider(format!("custodian returned {e}")))?;
        debug!(signature = %signature, state = %TransactionState::Submitted, "custodial transaction submitted");
        Ok(signature)
    }
}
