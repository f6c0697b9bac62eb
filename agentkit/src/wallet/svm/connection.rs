//! Connection to a Solana-style node.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::transaction::Transaction;
use super::types::{Hash, Pubkey, Signature};
use crate::jsonrpc::JsonRpcClient;
use crate::wallet::WalletError;

/// Commitment used for reads and preflight.
pub const DEFAULT_COMMITMENT: &str = "confirmed";

/// Status of a submitted transaction as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    /// Slot the transaction was processed in.
    pub slot: u64,
    /// Confirmations, `None` once rooted.
    #[serde(default)]
    pub confirmations: Option<u64>,
    /// Execution error, if the transaction failed.
    #[serde(default)]
    pub err: Option<Value>,
    /// `processed`, `confirmed`, or `finalized`.
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

impl SignatureStatus {
    /// Whether the transaction reached at least `confirmed`.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed" | "finalized")
        ) || (self.confirmation_status.is_none() && self.confirmations.is_none())
    }

    /// Whether the transaction executed without error.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.err.is_none()
    }
}

/// Node operations the SVM wallet providers depend on.
#[async_trait]
pub trait SvmConnection: Send + Sync + fmt::Debug {
    /// Base58 genesis hash of the cluster.
    async fn genesis_hash(&self) -> Result<String, WalletError>;

    /// Balance of `pubkey` in lamports.
    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, WalletError>;

    /// Blockhash to build a new transaction against.
    async fn latest_blockhash(&self) -> Result<Hash, WalletError>;

    /// Submit a fully signed transaction.
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, WalletError>;

    /// Status of `signature`, or `None` if the node has not seen it.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, WalletError>;
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: Hash,
}

/// [`SvmConnection`] over the node's JSON-RPC API.
#[derive(Debug)]
pub struct RpcConnection {
    rpc: JsonRpcClient,
}

impl RpcConnection {
    /// Connect to the node at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if `url` does not parse.
    pub fn new(url: &str) -> Result<Self, WalletError> {
        Ok(Self {
            rpc: JsonRpcClient::new(url)?,
        })
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        self.rpc.url().as_str()
    }
}

#[async_trait]
impl SvmConnection for RpcConnection {
    async fn genesis_hash(&self) -> Result<String, WalletError> {
        self.rpc.request("getGenesisHash", Vec::<Value>::new()).await
    }

    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, WalletError> {
        let result: WithContext<u64> = self
            .rpc
            .request(
                "getBalance",
                json!([pubkey, { "commitment": DEFAULT_COMMITMENT }]),
            )
            .await?;
        Ok(result.value)
    }

    async fn latest_blockhash(&self) -> Result<Hash, WalletError> {
        let result: WithContext<LatestBlockhash> = self
            .rpc
            .request(
                "getLatestBlockhash",
                json!([{ "commitment": DEFAULT_COMMITMENT }]),
            )
            .await?;
        Ok(result.value.blockhash)
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, WalletError> {
        let signature: Signature = self
            .rpc
            .request(
                "sendTransaction",
                json!([
                    tx.to_base64(),
                    { "encoding": "base64", "preflightCommitment": DEFAULT_COMMITMENT }
                ]),
            )
            .await
            .map_err(|e| WalletError::transaction(e.to_string()))?;
        debug!(signature = %signature, "transaction sent");
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, WalletError> {
        let result: WithContext<Vec<Option<SignatureStatus>>> = self
            .rpc
            .request(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;
        Ok(result.value.into_iter().next().flatten())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn node(rpc_method: &str, result: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": result
            })))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn reads_balance_from_context_wrapper() {
        let server = node("getBalance", json!({ "context": { "slot": 1 }, "value": 42 })).await;
        let conn = RpcConnection::new(&server.uri()).unwrap();
        assert_eq!(conn.balance(&Pubkey::default()).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn reads_latest_blockhash() {
        let server = node(
            "getLatestBlockhash",
            json!({
                "context": { "slot": 1 },
                "value": {
                    "blockhash": "EtWTRABZaYq6iMfeYKouRu166VU2xqa1wcaWoxPkrZBG",
                    "lastValidBlockHeight": 100
                }
            }),
        )
        .await;
        let conn = RpcConnection::new(&server.uri()).unwrap();
        assert_eq!(
            conn.latest_blockhash().await.unwrap().to_string(),
            "EtWTRABZaYq6iMfeYKouRu166VU2xqa1wcaWoxPkrZBG"
        );
    }

    #[tokio::test]
    async fn unknown_signature_has_no_status() {
        let server = node(
            "getSignatureStatuses",
            json!({ "context": { "slot": 1 }, "value": [null] }),
        )
        .await;
        let conn = RpcConnection::new(&server.uri()).unwrap();
        assert!(
            conn.signature_status(&Signature::default())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn confirmation_levels() {
        let status = |level: Option<&str>, confirmations: Option<u64>| SignatureStatus {
            slot: 1,
            confirmations,
            err: None,
            confirmation_status: level.map(str::to_owned),
        };
        assert!(!status(Some("processed"), Some(0)).is_confirmed());
        assert!(status(Some("confirmed"), Some(1)).is_confirmed());
        assert!(status(Some("finalized"), None).is_confirmed());
        assert!(status(None, None).is_confirmed());
        assert!(!status(None, Some(3)).is_confirmed());
    }
}
