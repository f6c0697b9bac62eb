//! Lists the actions available to a local EVM wallet and checks its balance.
//!
//! ```bash
//! export PRIVATE_KEY=0x...
//! export NETWORK_ID=base-sepolia
//! cargo run --example wallet_actions
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::sync::Arc;

use agentkit::prelude::*;
use serde_json::json;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let wallet =
        LocalEvmWalletProvider::configure_with_wallet(LocalEvmWalletConfig::default()).await?;
    println!("Wallet {} on {}", wallet.address(), wallet.network());

    let kit = AgentKit::builder(Arc::new(wallet))
        .provider(WalletActionProvider::new())
        .provider(Erc20ActionProvider::new())
        .provider(WethActionProvider::new())
        .build();

    println!("Tools:\n{}", serde_json::to_string_pretty(&kit.definitions())?);

    match kit.invoke("wallet_get_wallet_details", json!({})).await {
        Ok(outcome) => println!("{outcome}"),
        Err(e) => eprintln!("Error: {e}"),
    }

    Ok(())
}
