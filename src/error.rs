//! Error types for the simulation engine.
//!
//! Steady-state operation is error-free by design: a read of an absent
//! location yields `None` and a write to an absent location is a silent
//! no-op. `SimError` covers the remaining class of failures — threads dying
//! outside the shutdown protocol — which must reach the driver because the
//! barrier and drain counts depend on every participant arriving.

use thiserror::Error;

use crate::reading::DeviceId;

/// Fatal conditions surfaced to the simulation driver.
///
/// All variants are programming-invariant violations; there is no retry
/// policy and the simulation cannot continue once one is observed.
#[derive(Debug, Error)]
pub enum SimError {
    /// A pooled worker thread terminated outside the shutdown protocol.
    #[error("device {device}: worker {worker} panicked outside the shutdown protocol")]
    WorkerPanicked {
        /// Device that owned the worker.
        device: DeviceId,
        /// Index of the worker within the device's pool.
        worker: usize,
    },

    /// The dispatcher thread terminated outside the shutdown protocol.
    #[error("device {device}: dispatcher thread panicked")]
    DispatcherPanicked {
        /// Device that owned the dispatcher.
        device: DeviceId,
    },

    /// Task submission found the worker pool's queue disconnected, meaning
    /// every pooled worker had already died.
    #[error("device {device}: task queue disconnected before shutdown")]
    TaskQueueDisconnected {
        /// Device whose pool was lost.
        device: DeviceId,
    },
}

/// Convenience alias used across the crate.
pub type SimResult<T> = Result<T, SimError>;
