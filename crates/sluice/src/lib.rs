//! Provides [Sluice], which tracks in-flight units of work and lets a server
//! drain them before it stops.
//!
//! Units of work register with the [Sluice] (or through a scoped [Handle])
//! while it is open. [Sluice::shutdown] trips the [StopSignal], refuses any
//! further registration and waits for the live units to finish, optionally
//! bounded by a timeout. Stopping is cooperative: units observe the
//! [StopSignal], or [StopSignal::guard] the steps that may be cut short.

#![warn(missing_docs)]
#![deny(clippy::await_holding_lock)]

mod counted;
mod error;
mod guard;
mod handle;
mod layer;
mod signal;
mod sluice;

pub use counted::CountedFut;
pub use error::SluiceError;
pub use guard::{Guarded, Outcome};
pub use handle::Handle;
pub use layer::{SluiceLayer, SluiceService};
pub use signal::{SluiceState, StopSignal, UntilStopped};
pub use sluice::{Sluice, Ticket};
