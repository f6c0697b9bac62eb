//! Local ed25519 keypair wallet.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{
    Pubkey, RpcConnection, Signature, SvmConnection, SvmWalletProvider, Transaction,
    identify_cluster, parse_pubkey, rpc_url, transfer_transaction,
};
use crate::config::{self, EnvSource};
use crate::network::{Network, SvmNetwork};
use crate::wallet::{PollPolicy, TransactionState, WalletError, WalletProvider, parse_lamports};

const NAME: &str = "solana_keypair_wallet_provider";

/// Configuration for [`SolanaKeypairWalletProvider`].
///
/// A missing key is generated. The cluster is read from the node; a
/// configured network id only picks the default endpoint and is checked
/// against the node.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolanaKeypairWalletConfig {
    /// Base58 64-byte keypair or 32-byte seed, or a JSON byte array.
    /// Falls back to `SOLANA_PRIVATE_KEY`.
    pub private_key: Option<String>,
    /// Expected network id. Falls back to `NETWORK_ID`.
    pub network_id: Option<String>,
    /// Node URL. Falls back to `SOLANA_RPC_URL`.
    pub rpc_url: Option<String>,
    /// Signature status polling bound.
    #[serde(skip)]
    pub poll: Option<PollPolicy>,
}

impl fmt::Debug for SolanaKeypairWalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaKeypairWalletConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("network_id", &self.network_id)
            .field("rpc_url", &self.rpc_url)
            .field("poll", &self.poll)
            .finish()
    }
}

/// Decode a keypair from base58 or a JSON byte array.
///
/// 64 bytes are `secret || public` and the halves must agree; 32 bytes are
/// the secret seed alone.
fn parse_keypair(raw: &str) -> Result<SigningKey, WalletError> {
    let raw = raw.trim();
    let bytes = if raw.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(raw)
            .map_err(|e| WalletError::config(format!("invalid keypair byte array: {e}")))?
    } else {
        bs58::decode(raw)
            .into_vec()
            .map_err(|e| WalletError::config(format!("invalid base58 keypair: {e}")))?
    };
    match bytes.len() {
        64 => {
            let mut array = [0u8; 64];
            array.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&array)
                .map_err(|e| WalletError::config(format!("inconsistent keypair: {e}")))
        }
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        n => Err(WalletError::config(format!(
            "keypair must be 32 or 64 bytes, got {n}"
        ))),
    }
}

/// A Solana wallet holding its keypair in process.
pub struct SolanaKeypairWalletProvider {
    key: SigningKey,
    public_key: Pubkey,
    connection: Arc<dyn SvmConnection>,
    svm_network: SvmNetwork,
    poll: PollPolicy,
    address: String,
    network: Network,
}

impl fmt::Debug for SolanaKeypairWalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaKeypairWalletProvider")
            .field("address", &self.address)
            .field("network", &self.network)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl SolanaKeypairWalletProvider {
    /// Configure from `config`, falling back to the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] for a malformed key, an unknown
    /// genesis hash, or a node on a different network than configured.
    pub async fn configure_with_wallet(
        config: SolanaKeypairWalletConfig,
    ) -> Result<Self, WalletError> {
        Self::configure_with_env(config, &EnvSource::process()).await
    }

    /// Configure from `config`, falling back to `env`.
    ///
    /// # Errors
    ///
    /// See [`configure_with_wallet`](Self::configure_with_wallet).
    pub async fn configure_with_env(
        config: SolanaKeypairWalletConfig,
        env: &EnvSource,
    ) -> Result<Self, WalletError> {
        let key = match env.resolve(
            config.private_key.as_deref(),
            config::SOLANA_PRIVATE_KEY_ENV,
        ) {
            Some(raw) => parse_keypair(&raw)?,
            None => {
                warn!("no Solana private key configured, generating a new keypair");
                SigningKey::generate(&mut rand::rngs::OsRng)
            }
        };
        let network_id = env.resolve(config.network_id.as_deref(), config::NETWORK_ID_ENV);
        let url = rpc_url(
            env.resolve(config.rpc_url.as_deref(), config::SOLANA_RPC_URL_ENV),
            network_id.as_deref(),
        )?;
        let connection: Arc<dyn SvmConnection> = Arc::new(RpcConnection::new(&url)?);
        let svm_network = identify_cluster(connection.as_ref(), network_id.as_deref()).await?;
        Ok(Self::new(key, connection, svm_network).with_poll_policy(config.poll.unwrap_or_default()))
    }

    /// Bind `key` to a connection, identifying the cluster from the node.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if the node's genesis hash is unknown.
    pub async fn connect(
        key: SigningKey,
        connection: Arc<dyn SvmConnection>,
    ) -> Result<Self, WalletError> {
        let svm_network = identify_cluster(connection.as_ref(), None).await?;
        Ok(Self::new(key, connection, svm_network))
    }

    fn new(key: SigningKey, connection: Arc<dyn SvmConnection>, svm_network: SvmNetwork) -> Self {
        let public_key = Pubkey::new(key.verifying_key().to_bytes());
        let provider = Self {
            key,
            public_key,
            connection,
            svm_network,
            poll: PollPolicy::default(),
            address: public_key.to_string(),
            network: svm_network.to_network(),
        };
        info!(
            address = %provider.address,
            network = %provider.network,
            "Solana keypair wallet configured"
        );
        provider
    }

    /// Override the signature polling bound.
    #[must_use]
    pub const fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

#[async_trait]
impl WalletProvider for SolanaKeypairWalletProvider {
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
impl SvmWalletProvider for SolanaKeypairWalletProvider {
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

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        tx.sign(&self.key)?;
        debug!(address = %self.address, state = %TransactionState::Signed, "transaction signed");
        Ok(tx)
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, WalletError> {
        if !tx.is_fully_signed() {
            return Err(WalletError::transaction("transaction is missing signatures"));
        }
        let signature = self.connection.send_transaction(tx).await?;
        debug!(signature = %signature, state = %TransactionState::Submitted, "transaction submitted");
        Ok(signature)
    }

    async fn sign_and_send_transaction(&self, tx: Transaction) -> Result<Signature, WalletError> {
        let tx = self.sign_transaction(tx).await?;
        self.send_transaction(&tx).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::wallet::svm::testing::FakeConnection;
    use crate::wallet::svm::{SignatureStatus, SYSTEM_PROGRAM_ID};

    const SEED: [u8; 32] = [11; 32];

    async fn wallet(conn: Arc<FakeConnection>) -> SolanaKeypairWalletProvider {
        SolanaKeypairWalletProvider::connect(SigningKey::from_bytes(&SEED), conn)
            .await
            .unwrap()
            .with_poll_policy(PollPolicy::new(Duration::from_millis(1), 5))
    }

    #[test]
    fn parses_base58_keypair_seed_and_byte_array() {
        let key = SigningKey::from_bytes(&SEED);
        let expected = key.verifying_key();

        let full = bs58::encode(key.to_keypair_bytes()).into_string();
        assert_eq!(parse_keypair(&full).unwrap().verifying_key(), expected);

        let seed = bs58::encode(SEED).into_string();
        assert_eq!(parse_keypair(&seed).unwrap().verifying_key(), expected);

        let array = serde_json::to_string(&key.to_keypair_bytes().to_vec()).unwrap();
        assert_eq!(parse_keypair(&array).unwrap().verifying_key(), expected);
    }

    #[test]
    fn rejects_mismatched_halves() {
        let mut bytes = SigningKey::from_bytes(&SEED).to_keypair_bytes();
        bytes[63] ^= 1;
        let raw = bs58::encode(bytes).into_string();
        assert!(matches!(parse_keypair(&raw), Err(WalletError::Config(_))));
    }

    #[tokio::test]
    async fn network_comes_from_the_node() {
        let wallet = wallet(Arc::new(FakeConnection::on(SvmNetwork::Devnet))).await;
        assert_eq!(wallet.network().network_id(), Some("solana-devnet"));
        assert_eq!(wallet.name(), NAME);
        assert_eq!(wallet.address(), wallet.public_key().to_string());
    }

    #[tokio::test]
    async fn transfer_signs_sends_and_confirms() {
        let conn = Arc::new(FakeConnection::on(SvmNetwork::Devnet));
        let wallet = wallet(Arc::clone(&conn)).await;
        let to = Pubkey::new([5; 32]);

        let signature = wallet.native_transfer(&to.to_string(), "0.5").await.unwrap();

        let sent = conn.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let tx = &sent[0];
        assert_eq!(tx.signatures[0].to_string(), signature);
        assert_eq!(
            tx.message.account_keys,
            vec![wallet.public_key(), to, SYSTEM_PROGRAM_ID]
        );
        assert_eq!(&tx.message.instructions[0].data[4..], &500_000_000u64.to_le_bytes());
    }

    #[tokio::test]
    async fn invalid_destination_never_reaches_the_node() {
        let conn = Arc::new(FakeConnection::on(SvmNetwork::Devnet));
        let wallet = wallet(Arc::clone(&conn)).await;
        let err = wallet
            .native_transfer("0x5154eae861cac3aa757d6016babaf972341354cf", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidArgument(_)));
        assert!(conn.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_execution_is_an_operation_failure() {
        let conn = Arc::new(FakeConnection::on(SvmNetwork::Devnet));
        *conn.statuses.lock().unwrap() = vec![
            None,
            Some(SignatureStatus {
                slot: 9,
                confirmations: Some(1),
                err: Some(json!({ "InstructionError": [0, { "Custom": 1 }] })),
                confirmation_status: Some("confirmed".into()),
            }),
        ];
        let wallet = wallet(Arc::clone(&conn)).await;
        let err = wallet
            .native_transfer(&Pubkey::new([5; 32]).to_string(), "1")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::OperationFailed { .. }));
        assert!(err.to_string().contains("InstructionError"), "{err}");
    }

    #[tokio::test]
    async fn unsigned_transactions_are_not_submitted() {
        let conn = Arc::new(FakeConnection::on(SvmNetwork::Devnet));
        let wallet = wallet(Arc::clone(&conn)).await;
        let tx = transfer_transaction(conn.as_ref(), &wallet.public_key(), &Pubkey::new([5; 32]), 1)
            .await
            .unwrap();
        assert!(wallet.send_transaction(&tx).await.is_err());
    }
}
