//! Solana-style wallet providers.
//!
//! Transactions are built and encoded locally ([`Transaction`], [`Message`],
//! [`system_transfer`]); the node is reached through an [`SvmConnection`].
//! The cluster is always identified from the genesis hash the node reports,
//! never assumed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::network::{SvmNetwork, resolve_svm, resolve_svm_from_genesis};
use crate::wallet::{Poll, PollPolicy, WalletError, WalletProvider, poll_until};

mod connection;
mod delegated;
mod keypair;
mod transaction;
mod types;

pub use connection::{DEFAULT_COMMITMENT, RpcConnection, SignatureStatus, SvmConnection};
pub use delegated::{DelegatedSvmWalletConfig, DelegatedSvmWalletProvider};
pub use keypair::{SolanaKeypairWalletConfig, SolanaKeypairWalletProvider};
pub use transaction::{
    AccountMeta, CompiledInstruction, Instruction, Message, MessageHeader, SYSTEM_PROGRAM_ID,
    Transaction, decode_short_vec, encode_short_vec, system_transfer,
};
pub use types::{Hash, Pubkey, Signature, parse_pubkey};

/// Wallet operations specific to Solana-style chains.
#[async_trait]
pub trait SvmWalletProvider: WalletProvider {
    /// The node connection.
    fn connection(&self) -> &Arc<dyn SvmConnection>;

    /// The bound public key.
    fn public_key(&self) -> Pubkey;

    /// The bound cluster.
    fn svm_network(&self) -> SvmNetwork;

    /// Bound for signature status polling.
    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::default()
    }

    /// Add this wallet's signature to `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Signing`] if this wallet is not a signer of
    /// `tx`, or the custodian's error for delegated wallets.
    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError>;

    /// Submit an already signed transaction.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Transaction`] if the node rejects it, or
    /// [`WalletError::Unsupported`] where signing and sending are coupled.
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, WalletError>;

    /// Sign `tx` and submit it.
    ///
    /// # Errors
    ///
    /// Returns the signing or submission error.
    async fn sign_and_send_transaction(&self, tx: Transaction) -> Result<Signature, WalletError>;

    /// Current status of `signature`, or `None` if the node has not seen it.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC call fails.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, WalletError> {
        self.connection().signature_status(signature).await
    }

    /// Poll until `signature` is confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::OperationFailed`] if the transaction executed
    /// with an error, or [`WalletError::Timeout`].
    async fn wait_for_signature_result(
        &self,
        signature: &Signature,
    ) -> Result<SignatureStatus, WalletError> {
        let handle = signature.to_string();
        let status = poll_until(&handle, self.poll_policy(), || async move {
            Ok(match self.signature_status(signature).await? {
                Some(status) if status.err.is_some() || status.is_confirmed() => {
                    Poll::Ready(status)
                }
                _ => Poll::Pending,
            })
        })
        .await?;
        match &status.err {
            None => Ok(status),
            Some(err) => {
                warn!(signature = %handle, error = %err, "transaction failed");
                Err(WalletError::operation_failed(handle, err.to_string()))
            }
        }
    }
}

/// Build an unsigned native transfer from `from`, against a fresh blockhash.
pub(crate) async fn transfer_transaction(
    connection: &dyn SvmConnection,
    from: &Pubkey,
    to: &Pubkey,
    lamports: u64,
) -> Result<Transaction, WalletError> {
    let blockhash = connection.latest_blockhash().await?;
    let message = Message::new(&[system_transfer(from, to, lamports)], from, blockhash)?;
    Ok(Transaction::new_unsigned(message))
}

/// Identify the cluster behind `connection`.
///
/// When `expected` names a network id, the node must agree with it.
pub(crate) async fn identify_cluster(
    connection: &dyn SvmConnection,
    expected: Option<&str>,
) -> Result<SvmNetwork, WalletError> {
    let expected = expected.map(resolve_svm).transpose()?;
    let genesis = connection.genesis_hash().await?;
    let network = resolve_svm_from_genesis(&genesis)?;
    if let Some(expected) = expected
        && expected != network
    {
        return Err(WalletError::config(format!(
            "configured for {expected} but the node is {network} (genesis {genesis})"
        )));
    }
    info!(network = %network, genesis = %genesis, "identified cluster");
    Ok(network)
}

/// RPC endpoint: the configured URL, then the named network's default, then
/// devnet.
pub(crate) fn rpc_url(
    explicit: Option<String>,
    network_id: Option<&str>,
) -> Result<String, WalletError> {
    if let Some(url) = explicit {
        return Ok(url);
    }
    let network = network_id
        .map(resolve_svm)
        .transpose()?
        .unwrap_or(SvmNetwork::Devnet);
    Ok(network.default_rpc_url().to_owned())
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process [`SvmConnection`] for unit tests.

    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct FakeConnection {
        pub genesis: String,
        pub balance: u64,
        pub sent: Mutex<Vec<Transaction>>,
        pub statuses: Mutex<Vec<Option<SignatureStatus>>>,
    }

    impl FakeConnection {
        pub(crate) fn on(network: SvmNetwork) -> Self {
            Self {
                genesis: network.genesis_hash().to_owned(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl SvmConnection for FakeConnection {
        async fn genesis_hash(&self) -> Result<String, WalletError> {
            Ok(self.genesis.clone())
        }

        async fn balance(&self, _pubkey: &Pubkey) -> Result<u64, WalletError> {
            Ok(self.balance)
        }

        async fn latest_blockhash(&self) -> Result<Hash, WalletError> {
            Ok(Hash::new([7; 32]))
        }

        async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, WalletError> {
            let signature = tx
                .signature()
                .copied()
                .ok_or_else(|| WalletError::transaction("unsigned transaction"))?;
            self.sent.lock().unwrap().push(tx.clone());
            Ok(signature)
        }

        async fn signature_status(
            &self,
            _signature: &Signature,
        ) -> Result<Option<SignatureStatus>, WalletError> {
            let mut statuses = self.statuses.lock().unwrap();
            Ok(if statuses.is_empty() {
                Some(SignatureStatus {
                    slot: 1,
                    confirmations: None,
                    err: None,
                    confirmation_status: Some("finalized".into()),
                })
            } else {
                statuses.remove(0)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeConnection;
    use super::*;

    #[tokio::test]
    async fn identifies_devnet_from_genesis() {
        let conn = FakeConnection::on(SvmNetwork::Devnet);
        let network = identify_cluster(&conn, None).await.unwrap();
        assert_eq!(network.network_id(), "solana-devnet");
    }

    #[tokio::test]
    async fn unknown_genesis_is_fatal() {
        let conn = FakeConnection {
            genesis: "4sGjMW1sUnHzSxGspuhpqLDx6wiyjNtZAMdL4VZHirAn".into(),
            ..FakeConnection::default()
        };
        let err = identify_cluster(&conn, None).await.unwrap_err();
        assert!(matches!(err, WalletError::Config(_)));
        assert!(err.to_string().contains("4sGjMW1s"), "{err}");
    }

    #[tokio::test]
    async fn configured_network_must_match_node() {
        let conn = FakeConnection::on(SvmNetwork::Mainnet);
        let err = identify_cluster(&conn, Some("solana-devnet"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("solana-mainnet"), "{err}");
    }

    #[test]
    fn rpc_url_precedence() {
        assert_eq!(
            rpc_url(Some("http://localhost:8899".into()), Some("solana-mainnet")).unwrap(),
            "http://localhost:8899"
        );
        assert_eq!(
            rpc_url(None, Some("solana-mainnet")).unwrap(),
            SvmNetwork::Mainnet.default_rpc_url()
        );
        assert_eq!(rpc_url(None, None).unwrap(), SvmNetwork::Devnet.default_rpc_url());
        assert!(rpc_url(None, Some("solana-moon")).is_err());
    }
}
