//! Agentkit - wallets and on-chain actions for AI agents
//!
//! This crate binds one signing backend (a [`wallet::WalletProvider`]) to a
//! set of [`action::ActionProvider`]s and exposes the result to a language
//! model as function-calling definitions through [`AgentKit`].
//!
//! Wallet backends cover EVM chains (local key, ERC-4337 smart account,
//! custodial delegation, intents) and Solana clusters (local keypair,
//! custodial delegation). Networks are resolved against a fixed table and
//! unknown chains are rejected, never defaulted.

pub mod action;
pub mod config;
pub mod custodial;
pub mod error;
pub mod jsonrpc;
mod kit;
pub mod network;
pub mod prelude;
pub mod wallet;

pub use error::{Error, Result};
pub use kit::{AgentKit, AgentKitBuilder};
