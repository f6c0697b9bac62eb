//! Configuration resolution shared by every wallet provider.
//!
//! Each optional setting is resolved in order:
//! 1. The explicit value in the provider's config struct
//! 2. An environment variable
//! 3. A generated or default value, where one is safe
//!
//! Anything mandatory that is still missing is a
//! [`WalletError::Config`](crate::wallet::WalletError::Config).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::wallet::WalletError;

/// Environment variable naming the network id (e.g. `base-sepolia`).
pub const NETWORK_ID_ENV: &str = "NETWORK_ID";
/// Environment variable naming the EVM chain id.
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
/// Environment variable with the EVM JSON-RPC URL.
pub const RPC_URL_ENV: &str = "RPC_URL";
/// Environment variable with a hex EVM private key.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";
/// Environment variable with a base58 Solana keypair or secret key.
pub const SOLANA_PRIVATE_KEY_ENV: &str = "SOLANA_PRIVATE_KEY";
/// Environment variable with the Solana JSON-RPC URL.
pub const SOLANA_RPC_URL_ENV: &str = "SOLANA_RPC_URL";
/// Environment variable with the ERC-4337 bundler URL.
pub const BUNDLER_URL_ENV: &str = "BUNDLER_URL";
/// Environment variable with the intent service URL.
pub const INTENT_SERVICE_URL_ENV: &str = "INTENT_SERVICE_URL";
/// Environment variable with the custodial app id.
pub const PRIVY_APP_ID_ENV: &str = "PRIVY_APP_ID";
/// Environment variable with the custodial app secret.
pub const PRIVY_APP_SECRET_ENV: &str = "PRIVY_APP_SECRET";
/// Environment variable with the custodial wallet id.
pub const PRIVY_WALLET_ID_ENV: &str = "PRIVY_WALLET_ID";
/// Environment variable with the custodial authorization private key.
pub const PRIVY_AUTHORIZATION_KEY_ENV: &str = "PRIVY_WALLET_AUTHORIZATION_PRIVATE_KEY";
/// Environment variable overriding the custodial API base URL.
pub const PRIVY_API_URL_ENV: &str = "PRIVY_API_URL";

/// A source of configuration variables.
///
/// [`EnvSource::process`] reads the process environment; [`EnvSource::from_pairs`]
/// is handy in tests and for embedding applications that keep settings
/// elsewhere.
#[derive(Clone, Default)]
pub struct EnvSource {
    vars: Option<Arc<HashMap<String, String>>>,
}

impl EnvSource {
    /// Read from the process environment.
    #[must_use]
    pub fn process() -> Self {
        Self { vars: None }
    }

    /// Read from a fixed set of pairs only.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Some(Arc::new(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            )),
        }
    }

    /// Look up a variable. Empty values count as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match &self.vars {
            Some(vars) => vars.get(key).cloned(),
            None => std::env::var(key).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Explicit value first, then the variable `key`.
    #[must_use]
    pub fn resolve(&self, explicit: Option<&str>, key: &str) -> Option<String> {
        explicit
            .filter(|v| !v.trim().is_empty())
            .map(str::to_owned)
            .or_else(|| self.get(key))
    }

    /// Like [`resolve`](Self::resolve) but fails when nothing is found.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] naming `key` when the value is missing.
    pub fn require(&self, explicit: Option<&str>, key: &str) -> Result<String, WalletError> {
        self.resolve(explicit, key)
            .ok_or_else(|| WalletError::config(format!("{key} is required")))
    }
}

impl fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.vars {
            None => f.write_str("EnvSource::Process"),
            Some(vars) => f
                .debug_struct("EnvSource::Pairs")
                .field("keys", &vars.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}
