//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use agentkit::prelude::*;
//! ```

pub use crate::action::{
    Action, ActionDefinition, ActionError, ActionInput, ActionOutcome, ActionProvider,
    Erc20ActionProvider, WalletActionProvider, WethActionProvider,
};
pub use crate::config::EnvSource;
pub use crate::custodial::{CustodialClient, CustodialWalletExport};
pub use crate::error::{Error, Result};
pub use crate::kit::{AgentKit, AgentKitBuilder};
pub use crate::network::{EvmNetwork, Network, NetworkError, ProtocolFamily, SvmNetwork};
pub use crate::wallet::{
    DelegatedEvmWalletConfig, DelegatedEvmWalletProvider, DelegatedSvmWalletConfig,
    DelegatedSvmWalletProvider, EvmWalletProvider, EvmWalletProviderExt, IntentWalletConfig,
    IntentWalletProvider, LocalEvmWalletConfig, LocalEvmWalletProvider, PollPolicy,
    SmartWalletConfig, SmartWalletProvider, SolanaKeypairWalletConfig,
    SolanaKeypairWalletProvider, SvmWalletProvider, WalletError, WalletProvider,
};
