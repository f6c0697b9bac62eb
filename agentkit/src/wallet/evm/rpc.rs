//! JSON-RPC access shared by the EVM backends.

use std::fmt;

use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolCall;
use url::Url;

use crate::network::EvmNetwork;
use crate::wallet::{Poll, PollPolicy, WalletError, poll_until};

/// A type-erased alloy provider bound to one chain.
///
/// Transactions are filled explicitly (nonce, fees, gas limit) rather than
/// through provider fillers so that signing and submission stay separate
/// steps.
#[derive(Clone)]
pub struct EvmRpc {
    provider: DynProvider<Ethereum>,
    url: Url,
    network: EvmNetwork,
    poll: PollPolicy,
}

impl fmt::Debug for EvmRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmRpc")
            .field("url", &self.url.as_str())
            .field("network", &self.network)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl EvmRpc {
    /// Connect to `rpc_url`, or to the network's default endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if the URL does not parse.
    pub fn connect(network: EvmNetwork, rpc_url: Option<&str>) -> Result<Self, WalletError> {
        let raw = rpc_url.unwrap_or_else(|| network.default_rpc_url());
        let url = Url::parse(raw)
            .map_err(|e| WalletError::config(format!("invalid RPC URL '{raw}': {e}")))?;
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_http(url.clone())
            .erased();
        Ok(Self {
            provider,
            url,
            network,
            poll: PollPolicy::default(),
        })
    }

    /// Override the receipt polling bound.
    #[must_use]
    pub const fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// The underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &DynProvider<Ethereum> {
        &self.provider
    }

    /// The network this endpoint serves.
    #[must_use]
    pub const fn network(&self) -> EvmNetwork {
        self.network
    }

    /// Receipt polling bound.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Native balance of `address` in wei.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC call fails.
    pub async fn balance(&self, address: Address) -> Result<U256, WalletError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| WalletError::provider(format!("get_balance failed: {e}")))
    }

    /// Pending-inclusive transaction count of `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC call fails.
    pub async fn nonce(&self, address: Address) -> Result<u64, WalletError> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| WalletError::provider(format!("get_transaction_count failed: {e}")))
    }

    /// Bytecode at `address`; empty for accounts without code.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC call fails.
    pub async fn code_at(&self, address: Address) -> Result<Bytes, WalletError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| WalletError::provider(format!("get_code failed: {e}")))
    }

    /// Read-only `eth_call`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call reverts or the RPC fails.
    pub async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, WalletError> {
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata);
        self.provider
            .call(tx)
            .await
            .map_err(|e| WalletError::provider(format!("eth_call failed: {e}")))
    }

    /// Typed read-only call: ABI-encode `call`, execute it, decode the return.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the return data does not decode.
    pub async fn call_sol<C: SolCall>(&self, to: Address, call: &C) -> Result<C::Return, WalletError> {
        let output = self.call(to, call.abi_encode().into()).await?;
        C::abi_decode_returns(&output)
            .map_err(|e| WalletError::provider(format!("{} return decode failed: {e}", C::SIGNATURE)))
    }

    /// EIP-1559 `(max_fee_per_gas, max_priority_fee_per_gas)` in wei.
    ///
    /// # Errors
    ///
    /// Returns an error if either RPC call fails.
    pub async fn fees(&self) -> Result<(u128, u128), WalletError> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| WalletError::provider(format!("get_gas_price failed: {e}")))?;
        let priority = self
            .provider
            .get_max_priority_fee_per_gas()
            .await
            .map_err(|e| WalletError::provider(format!("get_max_priority_fee_per_gas failed: {e}")))?;
        // Headroom for two base-fee increases.
        Ok((gas_price.saturating_mul(2).saturating_add(priority), priority))
    }

    /// Fill the missing `from`, chain id, nonce, EIP-1559 fees, and gas limit.
    ///
    /// Fields already set on `tx` are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the lookups fails.
    pub async fn fill(
        &self,
        from: Address,
        mut tx: TransactionRequest,
    ) -> Result<TransactionRequest, WalletError> {
        tx.set_from(from);
        if tx.chain_id.is_none() {
            tx.set_chain_id(self.network.chain_id());
        }
        if tx.nonce.is_none() {
            tx.set_nonce(self.nonce(from).await?);
        }
        if tx.gas_price.is_none() && tx.max_fee_per_gas.is_none() {
            let (max_fee, priority) = self.fees().await?;
            tx.set_max_fee_per_gas(max_fee);
            tx.set_max_priority_fee_per_gas(priority);
        }
        if tx.gas.is_none() {
            let gas = self
                .provider
                .estimate_gas(tx.clone())
                .await
                .map_err(|e| WalletError::transaction(format!("estimate_gas failed: {e}")))?;
            tx.set_gas_limit(gas);
        }
        Ok(tx)
    }

    /// Submit an EIP-2718 encoded signed transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the node rejects the transaction.
    pub async fn send_raw(&self, encoded: &[u8]) -> Result<B256, WalletError> {
        let pending = self
            .provider
            .send_raw_transaction(encoded)
            .await
            .map_err(|e| WalletError::transaction(format!("send_raw_transaction failed: {e}")))?;
        Ok(*pending.tx_hash())
    }

    /// Receipt of `hash`, or `None` while it is not mined.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC call fails.
    pub async fn receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, WalletError> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| WalletError::provider(format!("get_transaction_receipt failed: {e}")))
    }

    /// Poll for the receipt of `hash` within the configured bound.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Timeout`] if the transaction is not mined in time.
    pub async fn wait_for_receipt(&self, hash: B256) -> Result<TransactionReceipt, WalletError> {
        let handle = format!("{hash:#x}");
        poll_until(&handle, self.poll, || async move {
            Ok(match self.receipt(hash).await? {
                Some(receipt) => Poll::Ready(receipt),
                None => Poll::Pending,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_endpoint() {
        let rpc = EvmRpc::connect(EvmNetwork::BaseSepolia, None).unwrap();
        assert_eq!(
            rpc.url.as_str().trim_end_matches('/'),
            EvmNetwork::BaseSepolia.default_rpc_url().trim_end_matches('/')
        );
        assert_eq!(rpc.poll_policy(), PollPolicy::default());
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let err = EvmRpc::connect(EvmNetwork::BaseMainnet, Some("::nope")).unwrap_err();
        assert!(matches!(err, WalletError::Config(_)));
    }
}
