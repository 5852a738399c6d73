pub mod candidate_store;
pub mod memory_store;
pub mod pool;

pub use candidate_store::{CandidateStore, PgCandidateStore};
pub use memory_store::MemoryCandidateStore;
#[cfg(test)]
pub use memory_store::FailingWriteStore;
