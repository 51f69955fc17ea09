//! # keystone-db-memory
//!
//! In-memory [`StorageService`](keystone_storage::StorageService) backend.
//!
//! Suitable for tests and single-process deployments. Records expire
//! lazily: an expired record behaves as absent on every operation and is
//! physically removed either on access or by an explicit
//! [`MemoryStorage::reap_expired`] sweep.

mod storage;

pub use storage::MemoryStorage;
