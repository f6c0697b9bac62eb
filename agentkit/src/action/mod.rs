//! Actions and action providers.
//!
//! An [`Action`] is a named, schema-described operation over a wallet. Its
//! input type implements [`ActionInput`]: arguments are deserialized (with
//! the failing field path tracked) and then checked by
//! [`ActionInput::validate`] before the handler runs. A handler never sees
//! input that failed either step.
//!
//! Handlers report their own failures as [`ActionOutcome::Failure`] so an
//! agent loop can read and react to them; [`ActionError`] is reserved for
//! problems with the call itself (unknown action, bad arguments).
//!
//! An [`ActionProvider`] groups actions for one integration and states which
//! networks it works on. Providers are generic over the wallet capability
//! they need, so the same provider serves every backend of that family.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentkit::action::{Action, ActionInput, ActionOutcome, ActionProvider};
//! use agentkit::network::Network;
//! use agentkit::wallet::WalletProvider;
//!
//! #[derive(serde::Deserialize, schemars::JsonSchema)]
//! struct Echo { text: String }
//!
//! impl ActionInput for Echo {}
//!
//! struct EchoProvider;
//!
//! impl<W: WalletProvider + ?Sized> ActionProvider<W> for EchoProvider {
//!     fn name(&self) -> &str { "echo" }
//!
//!     fn actions(&self) -> Vec<Action<W>> {
//!         vec![Action::new("echo", "Repeat the text", |_wallet, input: Echo| async move {
//!             ActionOutcome::success(input.text)
//!         })]
//!     }
//!
//!     fn supports_network(&self, _network: &Network) -> bool { true }
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::network::Network;

mod definition;
mod erc20;
#[cfg(test)]
pub(crate) mod testing;
mod wallet;
mod weth;

pub use definition::{ActionDefinition, input_schema};
pub use erc20::{Erc20ActionProvider, Erc20BalanceInput, Erc20TransferInput};
pub use wallet::{NativeTransferInput, NoInput, WalletActionProvider};
pub use weth::{WETH_ADDRESS, WethActionProvider, WrapEthInput};

/// Errors raised by the action registry before or around a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ActionError {
    /// No available action has this name.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Arguments failed deserialization or validation.
    #[error("Invalid input for {action} at {path}: {message}")]
    Validation {
        /// Action the arguments were for.
        action: String,
        /// Path of the offending field, `.` for the whole input.
        path: String,
        /// What was wrong.
        message: String,
    },

    /// The provider exists but does not support the bound network.
    #[error("Action provider {provider} does not support {network}")]
    Unavailable {
        /// Provider name.
        provider: String,
        /// The bound network.
        network: String,
    },
}

impl ActionError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(
        action: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            action: action.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Typed input of an action.
pub trait ActionInput: DeserializeOwned + JsonSchema + Send + 'static {
    /// Checks beyond what the type itself enforces.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first problem found.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Result of running a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The action did what it was asked.
    Success(String),
    /// The action failed; the text says why.
    Failure(String),
}

impl ActionOutcome {
    /// A successful outcome.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success(message.into())
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// Whether the action succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The message, either way.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::Failure(m) => m,
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(m) => f.write_str(m),
            Self::Failure(m) => write!(f, "Error: {m}"),
        }
    }
}

type Invoke<W> = dyn Fn(&str, Arc<W>, Value) -> BoxFuture<'static, Result<ActionOutcome, ActionError>>
    + Send
    + Sync;
type Validate = dyn Fn(&str, Value) -> Result<(), ActionError> + Send + Sync;

/// A named, schema-described operation over a wallet `W`.
pub struct Action<W: ?Sized> {
    name: String,
    description: String,
    schema: Value,
    validate: Arc<Validate>,
    invoke: Arc<Invoke<W>>,
}

impl<W: ?Sized> Clone for Action<W> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            schema: self.schema.clone(),
            validate: Arc::clone(&self.validate),
            invoke: Arc::clone(&self.invoke),
        }
    }
}

impl<W: ?Sized> fmt::Debug for Action<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<W: ?Sized + Send + Sync + 'static> Action<W> {
    /// Register `handler` under `name` with input type `I`.
    #[must_use]
    pub fn new<I, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Self
    where
        I: ActionInput,
        F: Fn(Arc<W>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionOutcome> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let validate = |name: &str, args: Value| parse_input::<I>(name, args).map(drop);
        let invoke = move |name: &str, wallet: Arc<W>, args: Value| {
            match parse_input::<I>(name, args) {
                Ok(input) => {
                    let handler = Arc::clone(&handler);
                    async move { Ok::<_, ActionError>(handler(wallet, input).await) }.boxed()
                }
                Err(e) => futures::future::ready(Err(e)).boxed(),
            }
        };

        Self {
            name: name.into(),
            description: description.into(),
            schema: input_schema::<I>(),
            validate: Arc::new(validate),
            invoke: Arc::new(invoke),
        }
    }
}

impl<W: ?Sized> Action<W> {
    /// Action name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description for the model.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// JSON schema of the input.
    #[must_use]
    pub const fn schema(&self) -> &Value {
        &self.schema
    }

    /// The same action registered under `{prefix}_{name}`.
    #[must_use]
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.name = format!("{prefix}_{}", self.name);
        self
    }

    /// Function-calling definition.
    #[must_use]
    pub fn definition(&self) -> ActionDefinition {
        ActionDefinition::new(&self.name, &self.description, self.schema.clone())
    }

    /// Check `args` without running the handler.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Validation`] naming the offending field.
    pub fn validate(&self, args: Value) -> Result<(), ActionError> {
        (self.validate)(&self.name, args)
    }

    /// Validate `args`, then run the handler against `wallet`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Validation`] without running the handler when
    /// `args` are rejected.
    pub async fn invoke(&self, wallet: Arc<W>, args: Value) -> Result<ActionOutcome, ActionError> {
        (self.invoke)(&self.name, wallet, args).await
    }
}

/// Decode and validate `args` for `action`.
///
/// A JSON string is parsed as the argument object, `null` as `{}`.
fn parse_input<I: ActionInput>(action: &str, args: Value) -> Result<I, ActionError> {
    let args = match args {
        Value::String(s) => serde_json::from_str(&s)
            .map_err(|e| ActionError::validation(action, ".", e.to_string()))?,
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    let input: I = serde_path_to_error::deserialize(args)
        .map_err(|e| ActionError::validation(action, e.path().to_string(), e.inner().to_string()))?;
    input
        .validate()
        .map_err(|message| ActionError::validation(action, ".", message))?;
    Ok(input)
}

/// A group of actions for one integration.
pub trait ActionProvider<W: ?Sized>: Send + Sync {
    /// Provider name; prefixes its action names in the registry.
    fn name(&self) -> &str;

    /// The registration table: every action this provider offers.
    fn actions(&self) -> Vec<Action<W>>;

    /// Whether the provider works on `network`.
    ///
    /// Must be pure and must return `false` rather than fail for descriptors
    /// it cannot interpret.
    fn supports_network(&self, network: &Network) -> bool;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Amount {
        amount: String,
    }

    impl ActionInput for Amount {
        fn validate(&self) -> Result<(), String> {
            if self.amount.trim().is_empty() {
                return Err("amount must not be empty".into());
            }
            Ok(())
        }
    }

    fn counting_action(calls: Arc<AtomicUsize>) -> Action<()> {
        Action::new("spend", "Spend an amount", move |_wallet, input: Amount| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                ActionOutcome::success(format!("spent {}", input.amount))
            }
        })
    }

    #[tokio::test]
    async fn runs_handler_on_valid_input() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = counting_action(Arc::clone(&calls));
        let outcome = action
            .invoke(Arc::new(()), json!({ "amount": "1.5" }))
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome::success("spent 1.5"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn accepts_arguments_as_json_string() {
        let action = counting_action(Arc::default());
        let outcome = action
            .invoke(Arc::new(()), Value::String(r#"{"amount":"2"}"#.into()))
            .await
            .unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn schema_failure_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = counting_action(Arc::clone(&calls));

        let err = action
            .invoke(Arc::new(()), json!({ "amount": 5 }))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, ActionError::Validation { action, path, .. } if action == "spend" && path == "amount"),
            "{err:?}"
        );

        let err = action
            .invoke(Arc::new(()), json!({ "amount": "  " }))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation { ref message, .. } if message.contains("empty")));

        assert!(action.validate(json!({})).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn outcome_serializes_tagged() {
        assert_eq!(
            serde_json::to_value(ActionOutcome::failure("boom")).unwrap(),
            json!({ "status": "failure", "message": "boom" })
        );
        assert_eq!(ActionOutcome::failure("boom").to_string(), "Error: boom");
    }

    #[test]
    fn definition_carries_schema() {
        let action = counting_action(Arc::default());
        let def = action.definition();
        assert_eq!(def.name, "spend");
        assert_eq!(def.parameters["properties"]["amount"]["type"], "string");
    }
}
