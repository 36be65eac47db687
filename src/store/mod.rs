//! Remote object store seam.
//!
//! [`RemoteStore`](traits::RemoteStore) is the byte-level interface the
//! orchestrator talks to; [`InMemoryStore`](memory::InMemoryStore) is the
//! reference implementation used throughout the test suite.

pub mod memory;
pub mod traits;

pub use memory::InMemoryStore;
pub use traits::{DirPage, EntryMeta, RemoteStore, StoreError, WriteMode};
