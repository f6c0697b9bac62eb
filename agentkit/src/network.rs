//! Network identity and resolution.
//!
//! A [`Network`] names the chain a wallet provider is bound to. EVM networks
//! are resolved through a static `network_id <-> chain_id` table
//! ([`EvmNetwork`]); Solana-style networks are resolved from the genesis hash
//! reported by a connected node ([`SvmNetwork`]).
//!
//! Resolution never guesses: an unknown id, an unknown genesis hash, or a
//! `network_id`/`chain_id` pair that disagrees is a [`NetworkError`].
//!
//! ```rust
//! use agentkit::network::{resolve_evm, EvmNetwork};
//!
//! let by_name = resolve_evm(Some("base-sepolia"), None).unwrap();
//! let by_id = resolve_evm(None, Some("84532")).unwrap();
//! assert_eq!(by_name, by_id);
//! assert_eq!(EvmNetwork::BaseSepolia.chain_id(), 84_532);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors raised while resolving a [`Network`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum NetworkError {
    /// The network id is not present in the table for its protocol family.
    #[error("unknown network id '{0}'")]
    UnknownNetworkId(String),

    /// The chain id is not present in the EVM table.
    #[error("unknown chain id '{0}'")]
    UnknownChainId(String),

    /// Both ids were given and map to different networks.
    #[error("network id '{network_id}' does not match chain id '{chain_id}'")]
    Mismatch {
        /// The supplied network id.
        network_id: String,
        /// The supplied chain id.
        chain_id: String,
    },

    /// The node reported a genesis hash that matches no known network.
    #[error("unrecognized genesis hash '{0}'")]
    UnknownGenesisHash(String),

    /// Neither a network id nor a chain id was supplied.
    #[error("a network id or chain id is required")]
    Unspecified,
}

/// Category of chains sharing a transaction and addressing model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProtocolFamily {
    /// Ethereum virtual machine chains.
    Evm,
    /// Solana virtual machine chains.
    Svm,
    /// NEAR protocol.
    Near,
    /// Any other family, kept verbatim.
    Other(String),
}

impl ProtocolFamily {
    /// Lowercase identifier (`"evm"`, `"svm"`, ...).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Evm => "evm",
            Self::Svm => "svm",
            Self::Near => "near",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for ProtocolFamily {
    fn from(s: &str) -> Self {
        match s {
            "evm" => Self::Evm,
            "svm" => Self::Svm,
            "near" => Self::Near,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProtocolFamily {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProtocolFamily {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// Identity of a chain/environment within a protocol family.
///
/// Descriptors produced by the resolvers in this module are always complete
/// and consistent. Descriptors built by hand may be partial; consumers such as
/// [`ActionProvider::supports_network`](crate::action::ActionProvider::supports_network)
/// must treat missing fields as "not supported".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    /// Protocol family of the chain.
    pub protocol_family: ProtocolFamily,
    /// Canonical human identifier, e.g. `"base-mainnet"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    /// Family-specific numeric chain identifier, e.g. `"8453"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
}

impl Network {
    /// Build a descriptor from raw parts without validation.
    #[must_use]
    pub fn new(
        protocol_family: ProtocolFamily,
        network_id: Option<String>,
        chain_id: Option<String>,
    ) -> Self {
        Self {
            protocol_family,
            network_id,
            chain_id,
        }
    }

    /// Network id, if present.
    #[must_use]
    pub fn network_id(&self) -> Option<&str> {
        self.network_id.as_deref()
    }

    /// Chain id, if present.
    #[must_use]
    pub fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_deref()
    }

    /// The table entry for this descriptor, if it is a consistent EVM network.
    #[must_use]
    pub fn evm(&self) -> Option<EvmNetwork> {
        if self.protocol_family != ProtocolFamily::Evm {
            return None;
        }
        let by_name = EvmNetwork::from_network_id(self.network_id.as_deref()?)?;
        let chain_id = self.chain_id.as_deref()?.parse::<u64>().ok()?;
        (by_name.chain_id() == chain_id).then_some(by_name)
    }

    /// The table entry for this descriptor, if it is a known SVM network.
    #[must_use]
    pub fn svm(&self) -> Option<SvmNetwork> {
        if self.protocol_family != ProtocolFamily::Svm {
            return None;
        }
        SvmNetwork::from_network_id(self.network_id.as_deref()?)
    }

    /// CAIP-2 chain reference (`eip155:8453`, `solana:<genesis prefix>`).
    #[must_use]
    pub fn caip2(&self) -> Option<String> {
        if let Some(evm) = self.evm() {
            return Some(format!("eip155:{}", evm.chain_id()));
        }
        self.svm()
            .map(|svm| format!("solana:{}", &svm.genesis_hash()[..32]))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.protocol_family,
            self.network_id.as_deref().unwrap_or("unknown")
        )?;
        if let Some(chain_id) = &self.chain_id {
            write!(f, " ({chain_id})")?;
        }
        Ok(())
    }
}

/// Known EVM networks and their chain ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvmNetwork {
    /// Base (chain ID: 8453).
    BaseMainnet,
    /// Base Sepolia (chain ID: 84532).
    BaseSepolia,
    /// Ethereum Mainnet (chain ID: 1).
    EthereumMainnet,
    /// Ethereum Sepolia (chain ID: 11155111).
    EthereumSepolia,
    /// Polygon `PoS` (chain ID: 137).
    PolygonMainnet,
    /// Polygon Mumbai (chain ID: 80001).
    PolygonMumbai,
    /// Arbitrum One (chain ID: 42161).
    ArbitrumMainnet,
    /// Arbitrum Sepolia (chain ID: 421614).
    ArbitrumSepolia,
    /// Optimism (chain ID: 10).
    OptimismMainnet,
    /// Optimism Sepolia (chain ID: 11155420).
    OptimismSepolia,
}

impl EvmNetwork {
    /// Every entry of the table.
    pub const ALL: [Self; 10] = [
        Self::BaseMainnet,
        Self::BaseSepolia,
        Self::EthereumMainnet,
        Self::EthereumSepolia,
        Self::PolygonMainnet,
        Self::PolygonMumbai,
        Self::ArbitrumMainnet,
        Self::ArbitrumSepolia,
        Self::OptimismMainnet,
        Self::OptimismSepolia,
    ];

    /// Numeric chain id.
    #[must_use]
    pub const fn chain_id(self) -> u64 {
        match self {
            Self::BaseMainnet => 8453,
            Self::BaseSepolia => 84_532,
            Self::EthereumMainnet => 1,
            Self::EthereumSepolia => 11_155_111,
            Self::PolygonMainnet => 137,
            Self::PolygonMumbai => 80_001,
            Self::ArbitrumMainnet => 42_161,
            Self::ArbitrumSepolia => 421_614,
            Self::OptimismMainnet => 10,
            Self::OptimismSepolia => 11_155_420,
        }
    }

    /// Canonical network id.
    #[must_use]
    pub const fn network_id(self) -> &'static str {
        match self {
            Self::BaseMainnet => "base-mainnet",
            Self::BaseSepolia => "base-sepolia",
            Self::EthereumMainnet => "ethereum-mainnet",
            Self::EthereumSepolia => "ethereum-sepolia",
            Self::PolygonMainnet => "polygon-mainnet",
            Self::PolygonMumbai => "polygon-mumbai",
            Self::ArbitrumMainnet => "arbitrum-mainnet",
            Self::ArbitrumSepolia => "arbitrum-sepolia",
            Self::OptimismMainnet => "optimism-mainnet",
            Self::OptimismSepolia => "optimism-sepolia",
        }
    }

    /// Public JSON-RPC endpoint used when no RPC URL is configured.
    #[must_use]
    pub const fn default_rpc_url(self) -> &'static str {
        match self {
            Self::BaseMainnet => "https://mainnet.base.org",
            Self::BaseSepolia => "https://sepolia.base.org",
            Self::EthereumMainnet => "https://eth.merkle.io",
            Self::EthereumSepolia => "https://rpc.sepolia.org",
            Self::PolygonMainnet => "https://polygon-rpc.com",
            Self::PolygonMumbai => "https://rpc-mumbai.maticvigil.com",
            Self::ArbitrumMainnet => "https://arb1.arbitrum.io/rpc",
            Self::ArbitrumSepolia => "https://sepolia-rollup.arbitrum.io/rpc",
            Self::OptimismMainnet => "https://mainnet.optimism.io",
            Self::OptimismSepolia => "https://sepolia.optimism.io",
        }
    }

    /// Whether this is a test network.
    #[must_use]
    pub const fn is_testnet(self) -> bool {
        matches!(
            self,
            Self::BaseSepolia
                | Self::EthereumSepolia
                | Self::PolygonMumbai
                | Self::ArbitrumSepolia
                | Self::OptimismSepolia
        )
    }

    /// Look up by canonical network id.
    #[must_use]
    pub fn from_network_id(network_id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|n| n.network_id() == network_id)
    }

    /// Look up by numeric chain id. Unknown ids yield `None`.
    #[must_use]
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.chain_id() == chain_id)
    }

    /// The complete descriptor for this network.
    #[must_use]
    pub fn to_network(self) -> Network {
        Network {
            protocol_family: ProtocolFamily::Evm,
            network_id: Some(self.network_id().to_owned()),
            chain_id: Some(self.chain_id().to_string()),
        }
    }
}

impl fmt::Display for EvmNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.network_id(), self.chain_id())
    }
}

/// Known Solana clusters, identified by genesis hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SvmNetwork {
    /// Mainnet beta.
    Mainnet,
    /// Testnet.
    Testnet,
    /// Devnet.
    Devnet,
}

impl SvmNetwork {
    /// Every entry of the table.
    pub const ALL: [Self; 3] = [Self::Mainnet, Self::Testnet, Self::Devnet];

    /// Base58 genesis hash of the cluster.
    #[must_use]
    pub const fn genesis_hash(self) -> &'static str {
        match self {
            Self::Mainnet => "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdpKuc147dw2N9d",
            Self::Testnet => "4uhcVJyU9pJkvQyS88uRDiswHXSCkY3zQawwpjk2NsNY",
            Self::Devnet => "EtWTRABZaYq6iMfeYKouRu166VU2xqa1wcaWoxPkrZBG",
        }
    }

    /// Canonical network id.
    #[must_use]
    pub const fn network_id(self) -> &'static str {
        match self {
            Self::Mainnet => "solana-mainnet",
            Self::Testnet => "solana-testnet",
            Self::Devnet => "solana-devnet",
        }
    }

    /// Public JSON-RPC endpoint used when no RPC URL is configured.
    #[must_use]
    pub const fn default_rpc_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.mainnet-beta.solana.com",
            Self::Testnet => "https://api.testnet.solana.com",
            Self::Devnet => "https://api.devnet.solana.com",
        }
    }

    /// Look up by canonical network id.
    #[must_use]
    pub fn from_network_id(network_id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|n| n.network_id() == network_id)
    }

    /// Look up by genesis hash. Only exact matches count.
    #[must_use]
    pub fn from_genesis_hash(hash: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.genesis_hash() == hash)
    }

    /// The complete descriptor for this cluster.
    #[must_use]
    pub fn to_network(self) -> Network {
        Network {
            protocol_family: ProtocolFamily::Svm,
            network_id: Some(self.network_id().to_owned()),
            chain_id: None,
        }
    }
}

impl fmt::Display for SvmNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.network_id())
    }
}

/// Resolve an EVM network from a network id, a chain id, or both.
///
/// When both are supplied they must name the same table entry.
///
/// # Errors
///
/// Returns [`NetworkError`] for unknown ids, disagreeing ids, or when neither
/// is supplied.
pub fn resolve_evm(
    network_id: Option<&str>,
    chain_id: Option<&str>,
) -> Result<EvmNetwork, NetworkError> {
    let by_name = network_id
        .map(|id| {
            EvmNetwork::from_network_id(id)
                .ok_or_else(|| NetworkError::UnknownNetworkId(id.to_owned()))
        })
        .transpose()?;

    let by_id = chain_id
        .map(|id| {
            id.trim()
                .parse::<u64>()
                .ok()
                .and_then(EvmNetwork::from_chain_id)
                .ok_or_else(|| NetworkError::UnknownChainId(id.to_owned()))
        })
        .transpose()?;

    match (by_name, by_id) {
        (Some(a), Some(b)) if a == b => Ok(a),
        (Some(_), Some(_)) => Err(NetworkError::Mismatch {
            network_id: network_id.unwrap_or_default().to_owned(),
            chain_id: chain_id.unwrap_or_default().to_owned(),
        }),
        (Some(n), None) | (None, Some(n)) => Ok(n),
        (None, None) => Err(NetworkError::Unspecified),
    }
}

/// Resolve a Solana cluster from its canonical network id.
///
/// # Errors
///
/// Returns [`NetworkError::UnknownNetworkId`] for ids outside the table.
pub fn resolve_svm(network_id: &str) -> Result<SvmNetwork, NetworkError> {
    SvmNetwork::from_network_id(network_id)
        .ok_or_else(|| NetworkError::UnknownNetworkId(network_id.to_owned()))
}

/// Resolve a Solana cluster from the genesis hash reported by a node.
///
/// # Errors
///
/// Returns [`NetworkError::UnknownGenesisHash`] when the hash matches no
/// known cluster.
pub fn resolve_svm_from_genesis(genesis_hash: &str) -> Result<SvmNetwork, NetworkError> {
    SvmNetwork::from_genesis_hash(genesis_hash)
        .ok_or_else(|| NetworkError::UnknownGenesisHash(genesis_hash.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_entry_resolves_identically_by_either_key() {
        for network in EvmNetwork::ALL {
            let chain_id = network.chain_id().to_string();
            let by_name = resolve_evm(Some(network.network_id()), None).unwrap();
            let by_id = resolve_evm(None, Some(&chain_id)).unwrap();
            let by_both = resolve_evm(Some(network.network_id()), Some(&chain_id)).unwrap();
            assert_eq!(by_name, by_id);
            assert_eq!(by_name, by_both);
            assert_eq!(by_name.to_network(), by_id.to_network());
        }
    }

    #[test]
    fn base_sepolia_maps_to_84532() {
        let network = resolve_evm(Some("base-sepolia"), None).unwrap().to_network();
        assert_eq!(network.chain_id(), Some("84532"));
        assert_eq!(network.protocol_family, ProtocolFamily::Evm);
    }

    #[test]
    fn mismatched_ids_fail() {
        let err = resolve_evm(Some("base-mainnet"), Some("84532")).unwrap_err();
        assert!(matches!(err, NetworkError::Mismatch { .. }));
    }

    #[test]
    fn unknown_chain_id_does_not_default() {
        assert_eq!(
            resolve_evm(None, Some("999999")),
            Err(NetworkError::UnknownChainId("999999".into()))
        );
        assert!(resolve_evm(None, Some("not-a-number")).is_err());
        assert_eq!(resolve_evm(None, None), Err(NetworkError::Unspecified));
    }

    #[test]
    fn unknown_network_id_fails() {
        assert_eq!(
            resolve_evm(Some("base-goerli"), None),
            Err(NetworkError::UnknownNetworkId("base-goerli".into()))
        );
    }

    #[test]
    fn genesis_hash_lookup() {
        let devnet = resolve_svm_from_genesis("EtWTRABZaYq6iMfeYKouRu166VU2xqa1wcaWoxPkrZBG").unwrap();
        assert_eq!(devnet.network_id(), "solana-devnet");
        assert!(matches!(
            resolve_svm_from_genesis("11111111111111111111111111111111"),
            Err(NetworkError::UnknownGenesisHash(_))
        ));
    }

    #[test]
    fn caip2_references() {
        assert_eq!(
            EvmNetwork::BaseMainnet.to_network().caip2().as_deref(),
            Some("eip155:8453")
        );
        assert_eq!(
            SvmNetwork::Devnet.to_network().caip2().as_deref(),
            Some("solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1")
        );
        let partial = Network::new(ProtocolFamily::Evm, Some("base-mainnet".into()), None);
        assert_eq!(partial.caip2(), None);
    }

    #[test]
    fn inconsistent_descriptor_is_not_an_evm_network() {
        let network = Network::new(
            ProtocolFamily::Evm,
            Some("base-mainnet".into()),
            Some("1".into()),
        );
        assert_eq!(network.evm(), None);
    }

    #[test]
    fn network_serde_uses_camel_case() {
        let json = serde_json::to_value(EvmNetwork::BaseSepolia.to_network()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "protocolFamily": "evm",
                "networkId": "base-sepolia",
                "chainId": "84532"
            })
        );
        let back: Network = serde_json::from_value(json).unwrap();
        assert_eq!(back, EvmNetwork::BaseSepolia.to_network());
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            EvmNetwork::BaseSepolia.to_network().to_string(),
            "evm:base-sepolia (84532)"
        );
        assert_eq!(SvmNetwork::Mainnet.to_network().to_string(), "svm:solana-mainnet");
    }
}
