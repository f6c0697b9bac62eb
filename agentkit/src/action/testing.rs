//! In-memory wallets for action tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use serde_json::json;

use crate::network::{EvmNetwork, Network, ProtocolFamily};
use crate::wallet::evm::parse_evm_address;
use crate::wallet::svm::parse_pubkey;
use crate::wallet::{EvmWalletProvider, WalletError, WalletProvider};

pub(crate) const FAKE_ADDRESS: &str = "0x00000000000000000000000000000000000000aa";

/// A wallet of any family with a fixed balance of 1.5e18 smallest units.
#[derive(Debug)]
pub(crate) struct FakeWallet {
    network: Network,
    transfers: Mutex<Vec<(String, String)>>,
}

impl FakeWallet {
    pub(crate) fn new(network: Network) -> Self {
        Self {
            network,
            transfers: Mutex::default(),
        }
    }

    pub(crate) fn transfers(&self) -> Vec<(String, String)> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    fn address(&self) -> &str {
        FAKE_ADDRESS
    }

    fn network(&self) -> &Network {
        &self.network
    }

    fn name(&self) -> &str {
        "fake_wallet_provider"
    }

    async fn balance(&self) -> Result<U256, WalletError> {
        Ok(U256::from(1_500_000_000_000_000_000_u128))
    }

    async fn native_transfer(&self, to: &str, amount: &str) -> Result<String, WalletError> {
        if self.network.protocol_family == ProtocolFamily::Svm {
            parse_pubkey(to)?;
        } else {
            parse_evm_address(to)?;
        }
        self.transfers
            .lock()
            .unwrap()
            .push((to.to_owned(), amount.to_owned()));
        Ok(format!("{:#x}", B256::repeat_byte(0x11)))
    }
}

/// An EVM wallet that answers reads from a queue and records submissions.
#[derive(Debug)]
pub(crate) struct FakeEvmWallet {
    network: EvmNetwork,
    descriptor: Network,
    address: String,
    reads: Mutex<VecDeque<Bytes>>,
    sent: Mutex<Vec<TransactionRequest>>,
    reverts: bool,
}

impl FakeEvmWallet {
    pub(crate) fn new(network: EvmNetwork) -> Self {
        Self {
            network,
            descriptor: network.to_network(),
            address: FAKE_ADDRESS.to_owned(),
            reads: Mutex::default(),
            sent: Mutex::default(),
            reverts: false,
        }
    }

    pub(crate) fn reverting(mut self) -> Self {
        self.reverts = true;
        self
    }

    /// Queue the return data of the next `eth_call`.
    pub(crate) fn push_read(&self, data: impl Into<Bytes>) {
        self.reads.lock().unwrap().push_back(data.into());
    }

    pub(crate) fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }
}

/// A mined receipt for `hash`.
pub(crate) fn receipt(hash: B256, success: bool) -> TransactionReceipt {
    let status = if success { "0x1" } else { "0x0" };
    serde_json::from_value(json!({
        "type": "0x2",
        "status": status,
        "cumulativeGasUsed": "0x5208",
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": B256::repeat_byte(0x22),
        "blockNumber": "0x1",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x1",
        "from": FAKE_ADDRESS,
        "to": Address::ZERO,
        "contractAddress": null,
    }))
    .unwrap()
}

#[async_trait]
impl WalletProvider for FakeEvmWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn network(&self) -> &Network {
        &self.descriptor
    }

    fn name(&self) -> &str {
        "fake_evm_wallet_provider"
    }

    async fn balance(&self) -> Result<U256, WalletError> {
        Ok(U256::from(10_u64.pow(18)))
    }

    async fn native_transfer(&self, to: &str, _amount: &str) -> Result<String, WalletError> {
        parse_evm_address(to)?;
        Err(WalletError::unsupported("fake_evm_wallet_provider", "native_transfer"))
    }
}

#[async_trait]
impl EvmWalletProvider for FakeEvmWallet {
    fn evm_address(&self) -> Address {
        FAKE_ADDRESS.parse().unwrap()
    }

    fn evm_network(&self) -> EvmNetwork {
        self.network
    }

    async fn sign_message(&self, _message: &[u8]) -> Result<String, WalletError> {
        Err(WalletError::unsupported("fake_evm_wallet_provider", "sign_message"))
    }

    async fn sign_typed_data(&self, _typed_data: &TypedData) -> Result<String, WalletError> {
        Err(WalletError::unsupported("fake_evm_wallet_provider", "sign_typed_data"))
    }

    async fn sign_transaction(&self, _tx: TransactionRequest) -> Result<Bytes, WalletError> {
        Err(WalletError::unsupported("fake_evm_wallet_provider", "sign_transaction"))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(tx);
        Ok(B256::left_padding_from(&[u8::try_from(sent.len()).unwrap()]))
    }

    async fn wait_for_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<TransactionReceipt, WalletError> {
        Ok(receipt(hash, !self.reverts))
    }

    async fn read_contract(&self, _to: Address, _calldata: Bytes) -> Result<Bytes, WalletError> {
        self.reads
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| WalletError::provider("execution reverted"))
    }
}
