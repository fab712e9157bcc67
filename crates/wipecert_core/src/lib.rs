//! WIPECERT Core Types
//!
//! This crate contains pure types and logic with no I/O: the canonical
//! byte form of a certificate document, the digest that binds a document to
//! its signature, and the identifiers shared by every other crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod digest;
pub mod error;
pub mod id;
pub mod time;

// Re-exports
pub use canonical::{CanonicalForm, CanonicalMode, SEPARATOR, canonicalize};
pub use digest::{Digest, DigestError, signed_blob};
pub use error::{CoreError, CoreResult};
pub use id::{CertId, TxId};
pub use time::Timestamp;
