//! Observability for the simulation engine.
//!
//! Components publish [`TraceEvent`]s through an injected [`TraceSink`]
//! rather than any process-global state. [`LogSink`] forwards events to the
//! [`log`] facade; [`MemorySink`] buffers them so tests can assert on what
//! the engine actually did.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::reading::{DeviceId, Location};

/// A lifecycle event published by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A script was registered for `location`.
    ScriptAssigned {
        /// Device the script was assigned to.
        device: DeviceId,
        /// Location the script aggregates.
        location: Location,
        /// Timepoint current at assignment.
        timepoint: u64,
    },

    /// The driver closed script submission for the current timepoint.
    SubmissionEnded {
        /// Device whose submission round closed.
        device: DeviceId,
        /// Timepoint the close applies to.
        timepoint: u64,
    },

    /// The supervisor supplied a neighbourhood for the current timepoint.
    NeighbourhoodResolved {
        /// Device that asked for neighbours.
        device: DeviceId,
        /// Number of neighbours supplied.
        neighbours: usize,
        /// Timepoint the neighbourhood applies to.
        timepoint: u64,
    },

    /// A worker finished one script execution.
    TaskExecuted {
        /// Device that ran the script.
        device: DeviceId,
        /// Location the script aggregated.
        location: Location,
        /// Number of readings gathered as script input.
        inputs: usize,
    },

    /// The device passed the cross-device barrier for `timepoint`.
    TimepointCompleted {
        /// Device reporting completion.
        device: DeviceId,
        /// The timepoint that just finished.
        timepoint: u64,
    },

    /// The supervisor returned the end-of-simulation sentinel.
    DeviceStopping {
        /// Device leaving the simulation.
        device: DeviceId,
    },
}

/// Receives engine trace events.
///
/// A sink is injected per device at construction time and shared by the
/// device's dispatcher and workers; implementations must therefore be cheap
/// and callable from any thread.
pub trait TraceSink: Send + Sync {
    /// Publishes one event.
    fn record(&self, event: TraceEvent);
}

/// Forwards events to the [`log`] facade.
///
/// Per-task events go out at trace level, lifecycle events at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&self, event: TraceEvent) {
        match event {
            TraceEvent::ScriptAssigned {
                device,
                location,
                timepoint,
            } => {
                log::debug!("device {device} received script for location {location} on timepoint {timepoint}");
            }
            TraceEvent::SubmissionEnded { device, timepoint } => {
                log::debug!("device {device} closed submission on timepoint {timepoint}");
            }
            TraceEvent::NeighbourhoodResolved {
                device,
                neighbours,
                timepoint,
            } => {
                log::debug!("device {device} resolved {neighbours} neighbours on timepoint {timepoint}");
            }
            TraceEvent::TaskExecuted {
                device,
                location,
                inputs,
            } => {
                log::trace!("device {device} aggregated {inputs} readings for location {location}");
            }
            TraceEvent::TimepointCompleted { device, timepoint } => {
                log::debug!("device {device} completed timepoint {timepoint}");
            }
            TraceEvent::DeviceStopping { device } => {
                log::debug!("device {device} received end of simulation");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&self, _event: TraceEvent) {}
}

/// Buffers events in memory, in arrival order.
///
/// Intended for tests and embedded inspection; the buffer grows without
/// bound, so it is not suitable for long-running simulations.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TraceEvent>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().expect("trace buffer poisoned").clone()
    }
}

impl TraceSink for MemorySink {
    fn record(&self, event: TraceEvent) {
        self.events.lock().expect("trace buffer poisoned").push(event);
    }
}
