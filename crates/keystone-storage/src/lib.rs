//! # keystone-storage
//!
//! Versioned key/value storage abstraction for the Keystone session layer.
//!
//! This crate defines the contract consumed by the session manager: a
//! generic, non-transactional store addressed by `(context, key)` where
//! every record carries its own version (for optimistic concurrency) and
//! an optional expiration (for TTL-based cleanup).
//!
//! Backends are deliberately simple: there are no transactions and no
//! cross-record atomicity. The only coordination primitives offered are
//! per-record compare-and-swap (`update_with_version`,
//! `delete_with_version`) and `delete_context`, which removes every record
//! under a context without atomicity guarantees across records.
//!
//! ## Modules
//!
//! - [`traits`] - The [`StorageService`] trait all backends implement
//! - [`types`] - Record and capability types
//! - [`error`] - Storage error taxonomy

pub mod error;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use traits::StorageService;
pub use types::{StorageCapabilities, StorageRecord};
