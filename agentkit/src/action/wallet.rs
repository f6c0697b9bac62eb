//! Wallet actions available on every network.

use std::sync::Arc;

use alloy::primitives::U256;
use alloy::primitives::utils::format_units;
use schemars::JsonSchema;
use serde::Deserialize;

use super::{Action, ActionInput, ActionOutcome, ActionProvider};
use crate::network::{Network, ProtocolFamily};
use crate::wallet::{EVM_DECIMALS, SVM_DECIMALS, WalletProvider};

/// Input of actions that take no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoInput {}

impl ActionInput for NoInput {}

/// Input of `native_transfer`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NativeTransferInput {
    /// Destination address.
    pub to: String,
    /// Amount in whole units of the native asset, e.g. `"0.01"`.
    pub amount: String,
}

impl ActionInput for NativeTransferInput {
    fn validate(&self) -> Result<(), String> {
        if self.to.trim().is_empty() {
            return Err("destination address is empty".into());
        }
        is_decimal(&self.amount)
            .then_some(())
            .ok_or_else(|| format!("amount '{}' is not a positive decimal number", self.amount))
    }
}

/// Plain decimal number, digits with at most one point.
pub(crate) fn is_decimal(value: &str) -> bool {
    let value = value.trim();
    let mut parts = value.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let frac = parts.next().unwrap_or_default();
    !(whole.is_empty() && frac.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && frac.chars().all(|c| c.is_ascii_digit())
}

/// Decimals of the native asset on `network`.
fn native_decimals(network: &Network) -> u8 {
    match network.protocol_family {
        ProtocolFamily::Svm => SVM_DECIMALS,
        _ => EVM_DECIMALS,
    }
}

fn format_native(network: &Network, value: U256) -> String {
    format_units(value, native_decimals(network)).unwrap_or_else(|_| value.to_string())
}

/// Details, balance, and native transfers for any wallet.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletActionProvider;

impl WalletActionProvider {
    /// Create the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<W: WalletProvider + ?Sized + 'static> ActionProvider<W> for WalletActionProvider {
    fn name(&self) -> &str {
        "wallet"
    }

    fn actions(&self) -> Vec<Action<W>> {
        vec![
            Action::new(
                "get_wallet_details",
                "Get the wallet's provider, address, network, and native balance",
                |wallet: Arc<W>, _input: NoInput| async move {
                    let network = wallet.network();
                    let balance = match wallet.balance().await {
                        Ok(balance) => format_native(network, balance),
                        Err(e) => {
                            return ActionOutcome::failure(format!(
                                "Failed to get wallet details: {e}"
                            ));
                        }
                    };
                    ActionOutcome::success(format!(
                        "Wallet Details:\n\
                         - Provider: {}\n\
                         - Address: {}\n\
                         - Network:\n  \
                           * Protocol Family: {}\n  \
                           * Network ID: {}\n  \
                           * Chain ID: {}\n\
                         - Native Balance: {balance}",
                        wallet.name(),
                        wallet.address(),
                        network.protocol_family,
                        network.network_id().unwrap_or("N/A"),
                        network.chain_id().unwrap_or("N/A"),
                    ))
                },
            ),
            Action::new(
                "get_balance",
                "Get the native asset balance of the wallet",
                |wallet: Arc<W>, _input: NoInput| async move {
                    match wallet.balance().await {
                        Ok(balance) => ActionOutcome::success(format!(
                            "Native balance at address {}: {}",
                            wallet.address(),
                            format_native(wallet.network(), balance)
                        )),
                        Err(e) => ActionOutcome::failure(format!("Failed to get balance: {e}")),
                    }
                },
            ),
            Action::new(
                "native_transfer",
                "Transfer the native asset (ETH, SOL) from the wallet to a destination address. \
                 The amount is in whole units, e.g. 0.01 for 0.01 ETH.",
                |wallet: Arc<W>, input: NativeTransferInput| async move {
                    match wallet.native_transfer(&input.to, &input.amount).await {
                        Ok(handle) => ActionOutcome::success(format!(
                            "Transferred {} to {}\nTransaction hash: {handle}",
                            input.amount, input.to
                        )),
                        Err(e) => {
                            ActionOutcome::failure(format!("Failed to transfer native asset: {e}"))
                        }
                    }
                },
            ),
        ]
    }

    fn supports_network(&self, _network: &Network) -> bool {
        true
    }
}
