//! Example server wiring a [sluice::Sluice] into an HTTP service, a
//! background ticker and OS signal handling.

pub mod api;
pub mod command;
pub mod config;
pub mod signals;
pub mod ticker;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
