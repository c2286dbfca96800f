//! Polls an Outlook mailbox through Microsoft Graph and emits one event per
//! new message, or sends a configured message.
//!
//! The crate is driven by an external scheduler: each `outlook_agent run`
//! is one trigger. State between triggers lives in a [`store::StateStore`],
//! secrets in a [`auth::token_store::CredentialStore`].

pub mod agent;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod health;
pub mod mail;
pub mod store;

pub use agent::{Agent, TriggerReport};
pub use error::{Error, Result};
