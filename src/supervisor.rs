//! Neighbour discovery boundary.
//!
//! Topology is not the engine's business: an external supervisor decides,
//! per timepoint, which devices a given device may exchange data with. The
//! engine only consumes the answer.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::device::DeviceRef;
use crate::reading::DeviceId;

/// External oracle supplying each device's neighbourhood per timepoint.
///
/// A dispatcher calls [`neighbours`](Supervisor::neighbours) exactly once
/// per timepoint, before waiting for script submission. The returned set is
/// valid for that timepoint only and must not contain the asking device
/// itself — the engine always includes the device's own readings
/// separately.
///
/// `None` is the end-of-simulation sentinel for that device. Because every
/// device participates in one shared barrier, the supervisor must return `None`
/// to **all** devices at the same timepoint; ending one device early would
/// strand the rest at the barrier.
pub trait Supervisor: Send + Sync {
    /// The neighbourhood for `device` at its current timepoint, or `None`
    /// once the simulation has ended.
    fn neighbours(&self, device: DeviceId) -> Option<Vec<DeviceRef>>;
}

/// Table-driven supervisor for embedded use and tests.
///
/// Holds a fixed timeline: one map of `device → neighbour ids` per
/// timepoint. Every device gets `None` once the timeline is exhausted, so
/// all devices end together. Devices not named in a round get an empty
/// neighbourhood for it.
pub struct TimelineSupervisor {
    rounds: Vec<HashMap<DeviceId, Vec<DeviceId>>>,
    registry: Mutex<HashMap<DeviceId, DeviceRef>>,
    cursors: Mutex<HashMap<DeviceId, usize>>,
}

impl TimelineSupervisor {
    /// Creates a supervisor for the given timeline.
    #[must_use]
    pub fn new(rounds: Vec<HashMap<DeviceId, Vec<DeviceId>>>) -> Self {
        Self {
            rounds,
            registry: Mutex::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a device handle so it can be handed out as a neighbour.
    ///
    /// Must be called for every device named anywhere in the timeline,
    /// before any device is started.
    pub fn register(&self, handle: DeviceRef) {
        self.registry
            .lock()
            .expect("supervisor registry poisoned")
            .insert(handle.id(), handle);
    }

    /// Number of timepoints in the timeline.
    #[must_use]
    pub fn timepoints(&self) -> usize {
        self.rounds.len()
    }
}

impl Supervisor for TimelineSupervisor {
    /// # Panics
    ///
    /// Panics if the timeline names a device whose handle was never
    /// [`register`](TimelineSupervisor::register)ed — a driver bug that
    /// should fail loudly rather than silently shrink a neighbourhood.
    fn neighbours(&self, device: DeviceId) -> Option<Vec<DeviceRef>> {
        let round = {
            let mut cursors = self.cursors.lock().expect("supervisor cursors poisoned");
            let cursor = cursors.entry(device).or_insert(0);
            let round = *cursor;
            *cursor += 1;
            round
        };

        let ids = self.rounds.get(round)?.get(&device);
        let registry = self.registry.lock().expect("supervisor registry poisoned");
        let neighbourhood = ids
            .map(|ids| {
                ids.iter()
                    .map(|id| {
                        registry
                            .get(id)
                            .unwrap_or_else(|| panic!("device {id} not registered with supervisor"))
                            .clone()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(neighbourhood)
    }
}
