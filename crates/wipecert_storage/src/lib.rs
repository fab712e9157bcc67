//! WIPECERT Storage
//!
//! The local certificate index: a certID-keyed cache of the transaction id,
//! digest and signature of every certificate this service anchored. The
//! ledger stays authoritative; losing the index only loses convenience.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod index;
pub mod locks;
pub mod redb_index;

pub use index::{IndexError, IndexRecord, IndexResult, IndexStore, MemoryIndex};
pub use locks::{KeyGuard, KeyedLocks};
pub use redb_index::RedbIndex;
