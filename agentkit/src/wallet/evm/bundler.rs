//! ERC-4337 (EntryPoint v0.6) bundler client for Coinbase Smart Wallet
//! style accounts.
//!
//! The account is counterfactual: its address comes from the factory's
//! `getAddress(owners, nonce)`, and the first user operation carries
//! `initCode` to deploy it. Owner signatures are wrapped in the account's
//! `SignatureWrapper { ownerIndex, signatureData }`.

use std::fmt;

use alloy::primitives::{Address, B256, Bytes, U256, address, hex, keccak256};
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EvmRpc;
use crate::jsonrpc::JsonRpcClient;
use crate::wallet::{OperationStatus, WalletError};

/// EntryPoint v0.6.
pub const ENTRY_POINT_V06: Address = address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// Coinbase Smart Wallet factory.
pub const COINBASE_SMART_WALLET_FACTORY: Address =
    address!("0BA5ED0c6AA8c49038F819E587E2633c4A9F428a");

/// Placeholder owner signature used while estimating gas.
const DUMMY_SIGNATURE: [u8; 65] = hex!(
    "fffffffffffffffffffffffffffffff000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c"
);

mod abi {
    alloy::sol! {
        function getAddress(bytes[] owners, uint256 nonce) external view returns (address);
        function createAccount(bytes[] owners, uint256 nonce) external payable returns (address account);
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);

        struct SmartWalletCall {
            address target;
            uint256 value;
            bytes data;
        }
        function execute(address target, uint256 value, bytes data) external payable;
        function executeBatch(SmartWalletCall[] calls) external payable;

        struct SignatureWrapper {
            uint256 ownerIndex;
            bytes signatureData;
        }
    }
}

/// One call executed by the smart account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Target contract or recipient.
    pub to: Address,
    /// Wei attached to the call.
    pub value: U256,
    /// Calldata.
    pub data: Bytes,
}

/// An EntryPoint v0.6 user operation, in bundler wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// Smart account address.
    pub sender: Address,
    /// EntryPoint nonce of the account.
    pub nonce: U256,
    /// Factory address and deployment calldata, empty once deployed.
    pub init_code: Bytes,
    /// `execute`/`executeBatch` calldata.
    pub call_data: Bytes,
    /// Gas for the execution phase.
    pub call_gas_limit: U256,
    /// Gas for validation and deployment.
    pub verification_gas_limit: U256,
    /// Bundler overhead.
    pub pre_verification_gas: U256,
    /// EIP-1559 fee cap.
    pub max_fee_per_gas: U256,
    /// EIP-1559 tip.
    pub max_priority_fee_per_gas: U256,
    /// Paymaster address and data, empty when self-funded.
    pub paymaster_and_data: Bytes,
    /// Wrapped owner signature.
    pub signature: Bytes,
}

impl UserOperation {
    /// `keccak256(abi.encode(keccak256(pack(op)), entryPoint, chainId))`.
    #[must_use]
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let packed = (
            self.sender,
            self.nonce,
            keccak256(&self.init_code),
            keccak256(&self.call_data),
            self.call_gas_limit,
            self.verification_gas_limit,
            self.pre_verification_gas,
            self.max_fee_per_gas,
            self.max_priority_fee_per_gas,
            keccak256(&self.paymaster_and_data),
        )
            .abi_encode();
        keccak256((keccak256(packed), entry_point, U256::from(chain_id)).abi_encode())
    }
}

/// A user operation ready for the owner's signature over `hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedUserOperation {
    /// The operation, with gas filled and a placeholder signature.
    pub user_operation: UserOperation,
    /// The hash the owner signs.
    pub hash: B256,
}

/// Account-abstraction backend of [`SmartWalletProvider`](super::SmartWalletProvider).
#[async_trait]
pub trait SmartAccountClient: Send + Sync + fmt::Debug {
    /// Counterfactual or deployed smart account address.
    fn account_address(&self) -> Address;

    /// Compose `calls` into a gas-estimated user operation.
    async fn prepare_user_operation(
        &self,
        calls: &[Call],
    ) -> Result<PreparedUserOperation, WalletError>;

    /// Attach the owner's raw 65-byte signature and submit. Returns the user
    /// operation hash.
    async fn send_user_operation(
        &self,
        prepared: PreparedUserOperation,
        owner_signature: Bytes,
    ) -> Result<B256, WalletError>;

    /// Current status of a submitted user operation.
    async fn user_operation_status(&self, hash: B256) -> Result<OperationStatus, WalletError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GasEstimate {
    pre_verification_gas: U256,
    verification_gas_limit: U256,
    call_gas_limit: U256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserOperationReceipt {
    success: bool,
    #[serde(default)]
    reason: Option<String>,
    receipt: InnerReceipt,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InnerReceipt {
    transaction_hash: B256,
}

/// [`SmartAccountClient`] speaking the standard bundler JSON-RPC methods.
#[derive(Debug)]
pub struct Erc4337BundlerClient {
    bundler: JsonRpcClient,
    rpc: EvmRpc,
    owner: Address,
    account: Address,
}

impl Erc4337BundlerClient {
    /// Resolve the account address for `owner` and bind to `bundler_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundler URL is invalid or the factory lookup
    /// fails.
    pub async fn connect(rpc: EvmRpc, bundler_url: &str, owner: Address) -> Result<Self, WalletError> {
        let bundler = JsonRpcClient::new(bundler_url)?;
        let account = rpc
            .call_sol(
                COINBASE_SMART_WALLET_FACTORY,
                &abi::getAddressCall {
                    owners: owners(owner),
                    nonce: U256::ZERO,
                },
            )
            .await?;
        Ok(Self {
            bundler,
            rpc,
            owner,
            account,
        })
    }

    async fn init_code(&self) -> Result<Bytes, WalletError> {
        if !self.rpc.code_at(self.account).await?.is_empty() {
            return Ok(Bytes::new());
        }
        let create = abi::createAccountCall {
            owners: owners(self.owner),
            nonce: U256::ZERO,
        };
        let mut code = COINBASE_SMART_WALLET_FACTORY.to_vec();
        code.extend_from_slice(&create.abi_encode());
        Ok(code.into())
    }
}

fn owners(owner: Address) -> Vec<Bytes> {
    vec![owner.abi_encode().into()]
}

/// `execute` for a single call, `executeBatch` otherwise.
fn encode_calls(calls: &[Call]) -> Result<Bytes, WalletError> {
    match calls {
        [] => Err(WalletError::invalid_argument("user operation needs at least one call")),
        [call] => Ok(abi::executeCall {
            target: call.to,
            value: call.value,
            data: call.data.clone(),
        }
        .abi_encode()
        .into()),
        many => Ok(abi::executeBatchCall {
            calls: many
                .iter()
                .map(|c| abi::SmartWalletCall {
                    target: c.to,
                    value: c.value,
                    data: c.data.clone(),
                })
                .collect(),
        }
        .abi_encode()
        .into()),
    }
}

/// Wrap a 65-byte `r || s || v` signature for the account's validator.
fn wrap_signature(owner_index: u8, signature: &[u8]) -> Bytes {
    abi::SignatureWrapper {
        ownerIndex: U256::from(owner_index),
        signatureData: Bytes::copy_from_slice(signature),
    }
    .abi_encode()
    .into()
}

/// Normalize `v` to 27/28 as the account's `ecrecover` expects.
fn normalize_v(signature: &[u8]) -> Result<Vec<u8>, WalletError> {
    if signature.len() != 65 {
        return Err(WalletError::signing(format!(
            "expected a 65-byte signature, got {} bytes",
            signature.len()
        )));
    }
    let mut out = signature.to_vec();
    if out[64] < 27 {
        out[64] += 27;
    }
    Ok(out)
}

#[async_trait]
impl SmartAccountClient for Erc4337BundlerClient {
    fn account_address(&self) -> Address {
        self.account
    }

    async fn prepare_user_operation(
        &self,
        calls: &[Call],
    ) -> Result<PreparedUserOperation, WalletError> {
        let call_data = encode_calls(calls)?;
        let init_code = self.init_code().await?;
        let nonce = self
            .rpc
            .call_sol(
                ENTRY_POINT_V06,
                &abi::getNonceCall {
                    sender: self.account,
                    key: alloy::primitives::aliases::U192::ZERO,
                },
            )
            .await?;
        let (max_fee, priority) = self.rpc.fees().await?;

        let mut op = UserOperation {
            sender: self.account,
            nonce,
            init_code,
            call_data,
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::from(max_fee),
            max_priority_fee_per_gas: U256::from(priority),
            paymaster_and_data: Bytes::new(),
            signature: wrap_signature(0, &DUMMY_SIGNATURE),
        };

        let estimate: GasEstimate = self
            .bundler
            .request("eth_estimateUserOperationGas", (&op, ENTRY_POINT_V06))
            .await?;
        op.call_gas_limit = estimate.call_gas_limit;
        op.verification_gas_limit = estimate.verification_gas_limit;
        op.pre_verification_gas = estimate.pre_verification_gas;

        let hash = op.hash(ENTRY_POINT_V06, self.rpc.network().chain_id());
        debug!(sender = %self.account, hash = %hash, calls = calls.len(), "user operation prepared");
        Ok(PreparedUserOperation {
            user_operation: op,
            hash,
        })
    }

    async fn send_user_operation(
        &self,
        prepared: PreparedUserOperation,
        owner_signature: Bytes,
    ) -> Result<B256, WalletError> {
        let mut op = prepared.user_operation;
        op.signature = wrap_signature(0, &normalize_v(&owner_signature)?);
        self.bundler
            .request("eth_sendUserOperation", (&op, ENTRY_POINT_V06))
            .await
    }

    async fn user_operation_status(&self, hash: B256) -> Result<OperationStatus, WalletError> {
        let receipt: Option<UserOperationReceipt> = self
            .bundler
            .request("eth_getUserOperationReceipt", [hash])
            .await?;
        if let Some(receipt) = receipt {
            return Ok(if receipt.success {
                OperationStatus::Complete {
                    transaction_hash: format!("{:#x}", receipt.receipt.transaction_hash),
                }
            } else {
                OperationStatus::Failed {
                    reason: receipt.reason.unwrap_or_else(|| "reverted".to_owned()),
                }
            });
        }

        let known: Option<serde_json::Value> = self
            .bundler
            .request("eth_getUserOperationByHash", [hash])
            .await?;
        Ok(if known.is_some() {
            OperationStatus::Bundled
        } else {
            OperationStatus::Pending
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_call_uses_execute() {
        let call = Call {
            to: Address::repeat_byte(0x11),
            value: U256::from(7),
            data: Bytes::new(),
        };
        let encoded = encode_calls(std::slice::from_ref(&call)).unwrap();
        assert_eq!(&encoded[..4], abi::executeCall::SELECTOR.as_slice());

        let batch = encode_calls(&[call.clone(), call]).unwrap();
        assert_eq!(&batch[..4], abi::executeBatchCall::SELECTOR.as_slice());

        assert!(matches!(
            encode_calls(&[]),
            Err(WalletError::InvalidArgument(_))
        ));
    }

    #[test]
    fn wrapped_signature_layout() {
        let mut sig = [0u8; 65];
        sig[64] = 1;
        let normalized = normalize_v(&sig).unwrap();
        assert_eq!(normalized[64], 28);

        let wrapped = wrap_signature(0, &normalized);
        let decoded = <abi::SignatureWrapper as SolValue>::abi_decode(&wrapped).unwrap();
        assert_eq!(decoded.ownerIndex, U256::ZERO);
        assert_eq!(decoded.signatureData.len(), 65);

        assert!(matches!(normalize_v(&[0u8; 64]), Err(WalletError::Signing(_))));
    }

    #[test]
    fn hash_depends_on_chain_and_fields() {
        let op = UserOperation {
            sender: Address::repeat_byte(0x22),
            nonce: U256::ZERO,
            init_code: Bytes::new(),
            call_data: Bytes::from_static(&[1, 2, 3]),
            call_gas_limit: U256::from(100_000),
            verification_gas_limit: U256::from(200_000),
            pre_verification_gas: U256::from(50_000),
            max_fee_per_gas: U256::from(1_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000u64),
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        };
        let base = op.hash(ENTRY_POINT_V06, 84532);
        assert_eq!(base, op.hash(ENTRY_POINT_V06, 84532));
        assert_ne!(base, op.hash(ENTRY_POINT_V06, 8453));

        let mut signed = op.clone();
        signed.signature = Bytes::from_static(&[9; 65]);
        assert_eq!(base, signed.hash(ENTRY_POINT_V06, 84532));

        let mut bumped = op;
        bumped.nonce = U256::from(1);
        assert_ne!(base, bumped.hash(ENTRY_POINT_V06, 84532));
    }

    #[test]
    fn wire_format_is_camel_case() {
        let op = UserOperation {
            sender: Address::ZERO,
            nonce: U256::from(1),
            init_code: Bytes::new(),
            call_data: Bytes::new(),
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        };
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["nonce"], "0x1");
        assert_eq!(value["initCode"], "0x");
        assert!(value.get("paymasterAndData").is_some());
    }
}
