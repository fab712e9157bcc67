//! WIPECERT Anchoring
//!
//! Abstraction over the external append-only ledger that holds the
//! authoritative certificate records. The ledger is only ever reached
//! through the three operations of [`AnchorGateway`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bounded;
pub mod gateway;
pub mod http;
pub mod memory;

pub use bounded::BoundedGateway;
pub use gateway::{AnchorError, AnchorGateway, AnchorRecord, AnchorResult, TxId};
pub use http::HttpLedger;
pub use memory::{CallCounts, LedgerFault, MemoryLedger};
