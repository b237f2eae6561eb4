mod adapter;
mod transaction;

pub use adapter::RedbAdapter;
pub use transaction::RedbTransaction;
