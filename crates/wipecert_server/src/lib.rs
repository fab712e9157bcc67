//! WIPECERT Server
//!
//! HTTP binding of the certification service: issue, verify, fetch, stats,
//! status, and bounded wipe execution.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod handler;
pub mod wipe;

pub use api::{ApiServer, AppState, router};
pub use handler::HandlerError;
pub use wipe::{WipeError, WipeOutcome, WipeRunner};
