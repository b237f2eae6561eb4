mod adapter;
mod error;
mod id;
mod kv;

pub use adapter::{AdapterTransaction, Capabilities, Capability, StorageAdapter, UpdateResult};
pub use error::AdapterError;
pub use id::DocumentId;
pub use kv::KvAdapter;

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryAdapter, MemoryTransaction};

#[cfg(feature = "redb")]
mod redb_store;

#[cfg(feature = "redb")]
pub use redb_store::{RedbAdapter, RedbTransaction};
