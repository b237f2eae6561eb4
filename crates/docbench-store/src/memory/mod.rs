mod adapter;
mod transaction;

pub use adapter::MemoryAdapter;
pub use transaction::MemoryTransaction;
