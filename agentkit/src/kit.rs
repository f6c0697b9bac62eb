//! The agent-facing facade: one wallet, many action providers.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::action::{Action, ActionDefinition, ActionError, ActionOutcome, ActionProvider};
use crate::wallet::WalletProvider;

type BoxedActionProvider<W> = Box<dyn ActionProvider<W>>;

/// Binds a wallet to an ordered list of action providers.
///
/// Actions are exposed as `{provider}_{action}`, e.g. `wallet_native_transfer`.
/// Providers that do not support the wallet's network are left out of
/// [`actions`](Self::actions) rather than reported as errors.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
///
/// use agentkit::action::{Erc20ActionProvider, WalletActionProvider};
/// use agentkit::wallet::LocalEvmWalletProvider;
/// use agentkit::AgentKit;
///
/// let wallet = Arc::new(LocalEvmWalletProvider::configure_with_wallet(Default::default()).await?);
/// let kit = AgentKit::builder(wallet)
///     .provider(WalletActionProvider)
///     .provider(Erc20ActionProvider)
///     .build();
///
/// let outcome = kit.invoke("wallet_get_balance", serde_json::json!({})).await?;
/// ```
pub struct AgentKit<W: ?Sized> {
    wallet: Arc<W>,
    providers: Vec<BoxedActionProvider<W>>,
}

impl<W: ?Sized + fmt::Debug> fmt::Debug for AgentKit<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentKit")
            .field("wallet", &self.wallet)
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<W: WalletProvider + ?Sized + 'static> AgentKit<W> {
    /// Bind `wallet` to `providers`, keeping their order.
    #[must_use]
    pub fn new(wallet: Arc<W>, providers: Vec<BoxedActionProvider<W>>) -> Self {
        info!(
            wallet = wallet.name(),
            address = wallet.address(),
            network = %wallet.network(),
            providers = providers.len(),
            "agentkit ready"
        );
        Self { wallet, providers }
    }

    /// Start a builder around `wallet`.
    #[must_use]
    pub fn builder(wallet: Arc<W>) -> AgentKitBuilder<W> {
        AgentKitBuilder {
            wallet,
            providers: Vec::new(),
        }
    }

    /// The bound wallet.
    #[must_use]
    pub const fn wallet(&self) -> &Arc<W> {
        &self.wallet
    }

    /// Every provider, supported or not, in registration order.
    #[must_use]
    pub fn providers(&self) -> &[BoxedActionProvider<W>] {
        &self.providers
    }

    fn supported(&self) -> impl Iterator<Item = &BoxedActionProvider<W>> {
        let network = self.wallet.network();
        self.providers
            .iter()
            .filter(move |p| p.supports_network(network))
    }

    /// Actions of the providers that support the wallet's network.
    #[must_use]
    pub fn actions(&self) -> Vec<Action<W>> {
        self.supported()
            .flat_map(|p| {
                p.actions()
                    .into_iter()
                    .map(move |action| action.prefixed(p.name()))
            })
            .collect()
    }

    /// Function-calling definitions of [`actions`](Self::actions).
    #[must_use]
    pub fn definitions(&self) -> Vec<ActionDefinition> {
        self.actions().iter().map(Action::definition).collect()
    }

    /// Validate `args` and run the action called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnknownAction`] if no provider offers `name`,
    /// [`ActionError::Unavailable`] if its provider does not support the
    /// wallet's network, and [`ActionError::Validation`] if `args` are
    /// rejected. Failures inside the action are reported as
    /// [`ActionOutcome::Failure`].
    pub async fn invoke(&self, name: &str, args: Value) -> Result<ActionOutcome, ActionError> {
        let Some(action) = self.actions().into_iter().find(|a| a.name() == name) else {
            return Err(self.missing(name));
        };

        debug!(action = name, "invoking action");
        let outcome = action.invoke(Arc::clone(&self.wallet), args).await?;
        if !outcome.is_success() {
            warn!(action = name, message = outcome.message(), "action failed");
        }
        Ok(outcome)
    }

    fn missing(&self, name: &str) -> ActionError {
        let network = self.wallet.network();
        self.providers
            .iter()
            .filter(|p| !p.supports_network(network))
            .find(|p| {
                p.actions()
                    .iter()
                    .any(|a| name == format!("{}_{}", p.name(), a.name()))
            })
            .map_or_else(
                || ActionError::UnknownAction(name.to_owned()),
                |p| ActionError::Unavailable {
                    provider: p.name().to_owned(),
                    network: network.to_string(),
                },
            )
    }
}

/// Builder for [`AgentKit`].
pub struct AgentKitBuilder<W: ?Sized> {
    wallet: Arc<W>,
    providers: Vec<BoxedActionProvider<W>>,
}

impl<W: ?Sized> fmt::Debug for AgentKitBuilder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentKitBuilder")
            .field("providers", &self.providers.len())
            .finish_non_exhaustive()
    }
}

impl<W: WalletProvider + ?Sized + 'static> AgentKitBuilder<W> {
    /// Append a provider.
    #[must_use]
    pub fn provider(mut self, provider: impl ActionProvider<W> + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Append several boxed providers.
    #[must_use]
    pub fn providers(mut self, providers: impl IntoIterator<Item = BoxedActionProvider<W>>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Build the kit.
    #[must_use]
    pub fn build(self) -> AgentKit<W> {
        AgentKit::new(self.wallet, self.providers)
    }
}
