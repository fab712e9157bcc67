//! Wipe certificate issuance and verification.
//!
//! A certificate document is canonicalized, signed with the service RSA key,
//! and the digest of `canonical || signature` is anchored on the ledger.
//! Verification re-derives that digest from caller-supplied data and asks
//! the ledger directly, so it never depends on the local index.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod certificate;
pub mod certifier;
pub mod config;
pub mod error;
pub mod keys;
pub mod signature;

pub use certificate::{CertificateView, IssueResult, Stats, VerifyResult};
pub use certifier::{CertificationService, SealedDocument, seal};
pub use config::{ConfigError, LedgerBackend, ServiceConfig, WipeConfig};
pub use error::{CertError, CertResult};
pub use keys::{KeyError, KeyPair, load_verifier};
pub use signature::{Signer, Verifier};
