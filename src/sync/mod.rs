//! Concurrency primitives underpinning the engine.
//!
//! [`FairRwLock`] guards each device's sensor store; [`PhaseBarrier`]
//! synchronizes timepoints across all devices. The remaining pieces are
//! crate-internal plumbing for the dispatcher: in-flight task accounting
//! and the driver-to-dispatcher submission gate.

mod barrier;
mod gate;
mod latch;
mod rwlock;

pub use barrier::PhaseBarrier;
pub use rwlock::{FairReadGuard, FairRwLock, FairWriteGuard};

pub(crate) use gate::SubmissionGate;
pub(crate) use latch::{CompletionGuard, InFlight};
