//! Delegated EVM wallet against mocked custodial and chain endpoints.

mod common;

use agentkit::config::EnvSource;
use agentkit::wallet::{
    DelegatedEvmWalletConfig, DelegatedEvmWalletProvider, WalletError, WalletProvider,
};
use common::{RECIPIENT, RpcResponder, TX_HASH, fast_poll, receipt_json};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WALLET_ID: &str = "wallet-1";
const WALLET_ADDRESS: &str = "0x00000000000000000000000000000000000000aa";

async fn custodian() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/wallets/{WALLET_ID}")))
        .and(header_exists("authorization"))
        .and(header("privy-app-id", "app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": WALLET_ID,
            "address": WALLET_ADDRESS,
            "chain_type": "ethereum",
        })))
        .mount(&server)
        .await;
    server
}

fn config(custodian: &MockServer, chain: &MockServer) -> DelegatedEvmWalletConfig {
    DelegatedEvmWalletConfig {
        app_id: Some("app".into()),
        app_secret: Some("secret".into()),
        wallet_id: Some(WALLET_ID.into()),
        network_id: Some("base-sepolia".into()),
        rpc_url: Some(chain.uri()),
        api_url: Some(custodian.uri()),
        poll: Some(fast_poll()),
        ..Default::default()
    }
}

fn empty_env() -> EnvSource {
    EnvSource::from_pairs::<&str, &str>([])
}

#[tokio::test]
async fn native_transfer_sends_once_then_waits_for_receipt() {
    let custodian = custodian().await;
    let chain = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/wallets/{WALLET_ID}/rpc")))
        .and(body_partial_json(json!({
            "method": "eth_sendTransaction",
            "caip2": "eip155:84532",
            "params": { "transaction": { "to": RECIPIENT, "value": "0x3e8" } },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "hash": TX_HASH },
        })))
        .expect(1)
        .mount(&custodian)
        .await;
    Mock::given(method("POST"))
        .respond_with(
            RpcResponder::new().on("eth_getTransactionReceipt", receipt_json(TX_HASH, true)),
        )
        .mount(&chain)
        .await;

    let wallet =
        DelegatedEvmWalletProvider::configure_with_env(config(&custodian, &chain), &empty_env())
            .await
            .unwrap();
    let hash = wallet
        .native_transfer(RECIPIENT, "0.000000000000001")
        .await
        .unwrap();
    assert_eq!(hash, TX_HASH);

    let receipt_calls = chain
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| {
            r.body_json::<serde_json::Value>()
                .is_ok_and(|b| b["method"] == "eth_getTransactionReceipt")
        })
        .count();
    assert!(receipt_calls >= 1);
}

#[tokio::test]
async fn invalid_destination_never_reaches_custodian() {
    let custodian = custodian().await;
    let chain = MockServer::start().await;

    let wallet =
        DelegatedEvmWalletProvider::configure_with_env(config(&custodian, &chain), &empty_env())
            .await
            .unwrap();
    let err = wallet.native_transfer("0xRecipient", "1000").await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidArgument(_)), "{err:?}");

    let requests = custodian.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
    assert!(chain.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn export_rebuilds_an_equivalent_provider() {
    let custodian = custodian().await;
    let chain = MockServer::start().await;

    let first =
        DelegatedEvmWalletProvider::configure_with_env(config(&custodian, &chain), &empty_env())
            .await
            .unwrap();
    let export = first.export();
    assert_eq!(export.wallet_id, WALLET_ID);
    assert_eq!(export.network_id, "base-sepolia");
    assert_eq!(export.chain_id.as_deref(), Some("84532"));

    let persisted = serde_json::to_string(&export).unwrap();
    let export: agentkit::custodial::CustodialWalletExport =
        serde_json::from_str(&persisted).unwrap();

    let rebuilt = DelegatedEvmWalletProvider::configure_with_env(
        DelegatedEvmWalletConfig {
            app_id: Some("app".into()),
            app_secret: Some("secret".into()),
            wallet_id: Some(export.wallet_id),
            authorization_private_key: export.authorization_private_key,
            network_id: Some(export.network_id),
            chain_id: export.chain_id,
            rpc_url: Some(chain.uri()),
            api_url: Some(custodian.uri()),
            poll: None,
        },
        &empty_env(),
    )
    .await
    .unwrap();
    assert_eq!(rebuilt.address(), first.address());
    assert_eq!(rebuilt.network(), first.network());
}

#[tokio::test]
async fn missing_credentials_are_fatal() {
    let chain = MockServer::start().await;
    let err = DelegatedEvmWalletProvider::configure_with_env(
        DelegatedEvmWalletConfig {
            rpc_url: Some(chain.uri()),
            ..Default::default()
        },
        &empty_env(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, WalletError::Config(_)), "{err:?}");
}
