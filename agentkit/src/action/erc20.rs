//! ERC-20 token actions.

use std::sync::Arc;

use alloy::network::TransactionBuilder;
use alloy::primitives::Address;
use alloy::primitives::utils::format_units;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use schemars::JsonSchema;
use serde::Deserialize;

use super::wallet::is_decimal;
use super::{Action, ActionInput, ActionOutcome, ActionProvider};
use crate::network::Network;
use crate::wallet::evm::parse_evm_address;
use crate::wallet::{EvmWalletProvider, EvmWalletProviderExt, WalletError, parse_amount};

alloy::sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Input of the ERC-20 `get_balance` action.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Erc20BalanceInput {
    /// Address of the token contract.
    pub contract_address: String,
}

impl ActionInput for Erc20BalanceInput {
    fn validate(&self) -> Result<(), String> {
        parse_evm_address(&self.contract_address)
            .map(drop)
            .map_err(|e| e.to_string())
    }
}

/// Input of the ERC-20 `transfer` action.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Erc20TransferInput {
    /// Address of the token contract.
    pub contract_address: String,
    /// Recipient address.
    pub destination: String,
    /// Amount in whole tokens, e.g. `"10.5"`. Scaled by the token's decimals.
    pub amount: String,
}

impl ActionInput for Erc20TransferInput {
    fn validate(&self) -> Result<(), String> {
        parse_evm_address(&self.contract_address).map_err(|e| e.to_string())?;
        parse_evm_address(&self.destination).map_err(|e| e.to_string())?;
        if !is_decimal(&self.amount) {
            return Err(format!(
                "amount '{}' is not a positive decimal number",
                self.amount
            ));
        }
        Ok(())
    }
}

async fn token_balance<W>(wallet: &W, token: Address) -> Result<String, WalletError>
where
    W: EvmWalletProvider + ?Sized,
{
    let balance = wallet
        .read_contract_call(token, &IERC20::balanceOfCall { owner: wallet.evm_address() })
        .await?;
    let decimals = wallet.read_contract_call(token, &IERC20::decimalsCall {}).await?;
    format_units(balance, decimals)
        .map_err(|e| WalletError::provider(format!("cannot format token balance: {e}")))
}

async fn token_transfer<W>(wallet: &W, input: &Erc20TransferInput) -> Result<String, WalletError>
where
    W: EvmWalletProvider + ?Sized,
{
    let token = parse_evm_address(&input.contract_address)?;
    let to = parse_evm_address(&input.destination)?;
    let decimals = wallet.read_contract_call(token, &IERC20::decimalsCall {}).await?;
    let amount = parse_amount(&input.amount, decimals)?;

    let calldata = IERC20::transferCall { to, amount }.abi_encode();
    let tx = TransactionRequest::default()
        .with_to(token)
        .with_input(calldata);
    let receipt = wallet.send_and_confirm(tx).await?;
    Ok(format!("{:#x}", receipt.transaction_hash))
}

/// Balance and transfer for ERC-20 tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct Erc20ActionProvider;

impl Erc20ActionProvider {
    /// Create the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<W: EvmWalletProvider + ?Sized + 'static> ActionProvider<W> for Erc20ActionProvider {
    fn name(&self) -> &str {
        "erc20"
    }

    fn actions(&self) -> Vec<Action<W>> {
        vec![
            Action::new(
                "get_balance",
                "Get the wallet's balance of an ERC-20 token, in whole tokens",
                |wallet: Arc<W>, input: Erc20BalanceInput| async move {
                    let Ok(token) = parse_evm_address(&input.contract_address) else {
                        return ActionOutcome::failure("invalid contract address");
                    };
                    match token_balance(wallet.as_ref(), token).await {
                        Ok(balance) => ActionOutcome::success(format!(
                            "Balance of {} is {balance}",
                            input.contract_address
                        )),
                        Err(e) => ActionOutcome::failure(format!("Failed to get balance: {e}")),
                    }
                },
            ),
            Action::new(
                "transfer",
                "Transfer an amount of an ERC-20 token from the wallet to a destination. \
                 The amount is in whole tokens and is scaled by the token's decimals.",
                |wallet: Arc<W>, input: Erc20TransferInput| async move {
                    match token_transfer(wallet.as_ref(), &input).await {
                        Ok(hash) => ActionOutcome::success(format!(
                            "Transferred {} of {} to {}\nTransaction hash for the transfer: {hash}",
                            input.amount, input.contract_address, input.destination
                        )),
                        Err(e) => ActionOutcome::failure(format!("Failed to transfer: {e}")),
                    }
                },
            ),
        ]
    }

    fn supports_network(&self, network: &Network) -> bool {
        network.evm().is_some()
    }
}
