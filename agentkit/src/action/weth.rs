//! Wrapping ETH into WETH on Base.

use std::sync::Arc;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, address};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use schemars::JsonSchema;
use serde::Deserialize;

use super::wallet::is_decimal;
use super::{Action, ActionInput, ActionOutcome, ActionProvider};
use crate::network::{EvmNetwork, Network};
use crate::wallet::{
    EVM_DECIMALS, EvmWalletProvider, EvmWalletProviderExt, WalletError, parse_amount,
};

/// Canonical WETH predeploy on Base mainnet and Base Sepolia.
pub const WETH_ADDRESS: Address = address!("0x4200000000000000000000000000000000000006");

alloy::sol! {
    interface IWETH {
        function deposit() external payable;
    }
}

/// Input of `wrap_eth`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WrapEthInput {
    /// Amount of ETH to wrap, in whole ETH, e.g. `"0.1"`.
    pub amount_to_wrap: String,
}

impl ActionInput for WrapEthInput {
    fn validate(&self) -> Result<(), String> {
        if !is_decimal(&self.amount_to_wrap) {
            return Err(format!(
                "amount '{}' is not a positive decimal number",
                self.amount_to_wrap
            ));
        }
        Ok(())
    }
}

async fn wrap<W>(wallet: &W, amount: &str) -> Result<String, WalletError>
where
    W: EvmWalletProvider + ?Sized,
{
    let value = parse_amount(amount, EVM_DECIMALS)?;
    let tx = TransactionRequest::default()
        .with_to(WETH_ADDRESS)
        .with_value(value)
        .with_input(IWETH::depositCall {}.abi_encode());
    let receipt = wallet.send_and_confirm(tx).await?;
    Ok(format!("{:#x}", receipt.transaction_hash))
}

/// Wraps ETH into WETH.
#[derive(Debug, Clone, Copy, Default)]
pub struct WethActionProvider;

impl WethActionProvider {
    /// Create the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<W: EvmWalletProvider + ?Sized + 'static> ActionProvider<W> for WethActionProvider {
    fn name(&self) -> &str {
        "weth"
    }

    fn actions(&self) -> Vec<Action<W>> {
        vec![Action::new(
            "wrap_eth",
            "Wrap ETH into WETH. The amount is in whole ETH.",
            |wallet: Arc<W>, input: WrapEthInput| async move {
                match wrap(wallet.as_ref(), &input.amount_to_wrap).await {
                    Ok(hash) => ActionOutcome::success(format!(
                        "Wrapped {} ETH into WETH.\nTransaction hash: {hash}",
                        input.amount_to_wrap
                    )),
                    Err(e) => ActionOutcome::failure(format!("Failed to wrap ETH: {e}")),
                }
            },
        )]
    }

    fn supports_network(&self, network: &Network) -> bool {
        matches!(
            network.evm(),
            Some(EvmNetwork::BaseMainnet | EvmNetwork::BaseSepolia)
        )
    }
}
