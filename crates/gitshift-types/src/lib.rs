//! Common types used throughout `gitshift`.
//!
//! This crate provides the value types exchanged between the provider
//! layer, the interactive selector and the migration engine.

mod repository;
mod secret;
mod transfer;

pub use repository::Repository;
pub use secret::SecretString;
pub use transfer::{TransferResult, TransferStatus, TransferTask};

/// Default branch assumed when a provider does not report one.
pub const DEFAULT_BRANCH: &str = "main";
