//! Remote store layer for siasync
//!
//! This crate defines the contract the sync engine needs from a remote
//! object store ([`RemoteStore`]), the validated [`RemotePath`] type used to
//! address objects, an HTTP client for the Sia renter API and an in-memory
//! store.

pub mod api;
pub mod memory;
pub mod path;
pub mod store;

pub use api::{RenterClient, RenterClientBuilder, Result, StoreError};
pub use memory::{MemoryStore, StoreStats};
pub use path::RemotePath;
pub use store::{Redundancy, RemoteObject, RemoteStore, UploadReceipt};
