//! The device facade.
//!
//! A [`Device`] composes a sensor store, the per-device script dispatcher,
//! and participation in the process-wide [`PhaseBarrier`]. The driver
//! protocol is:
//!
//! 1. construct every device against the shared barrier (sized to the
//!    device count) and a common supervisor;
//! 2. register each device's [`DeviceRef`] wherever the supervisor needs it;
//! 3. [`start`](Device::start) every device;
//! 4. per timepoint: [`assign_script`](Device::assign_script) zero or more
//!    times, then [`end_submission`](Device::end_submission) — on every
//!    device, every timepoint;
//! 5. once the supervisor has returned the end sentinel to all devices,
//!    [`shutdown`](Device::shutdown) each one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::dispatcher::{PoolConfig, ScriptDispatcher};
use crate::error::SimResult;
use crate::reading::{DeviceId, Location, Value};
use crate::script::Script;
use crate::store::SensorStore;
use crate::supervisor::Supervisor;
use crate::sync::{PhaseBarrier, SubmissionGate};
use crate::trace::{TraceEvent, TraceSink};

/// Construction parameters for a device.
#[derive(Clone)]
pub struct DeviceConfig {
    /// Unique identity for the run.
    pub id: DeviceId,
    /// Initial `(location, value)` readings; the key set is fixed afterwards.
    pub readings: Vec<(Location, Value)>,
    /// Worker pool sizing.
    pub pool: PoolConfig,
}

impl DeviceConfig {
    /// Config with the default pool sizing.
    #[must_use]
    pub fn new(id: DeviceId, readings: Vec<(Location, Value)>) -> Self {
        Self {
            id,
            readings,
            pool: PoolConfig::default(),
        }
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("id", &self.id)
            .field("readings", &self.readings.len())
            .field("pool", &self.pool)
            .finish()
    }
}

/// State shared between a device's facade, its dispatcher, its workers, and
/// every neighbour's workers.
pub(crate) struct DeviceShared {
    id: DeviceId,
    store: SensorStore,
    registrations: Mutex<Vec<(Arc<dyn Script>, Location)>>,
    gate: SubmissionGate,
    timepoint: AtomicU64,
    trace: Arc<dyn TraceSink>,
}

impl DeviceShared {
    pub(crate) fn id(&self) -> DeviceId {
        self.id
    }

    pub(crate) fn store(&self) -> &SensorStore {
        &self.store
    }

    pub(crate) fn gate(&self) -> &SubmissionGate {
        &self.gate
    }

    pub(crate) fn trace(&self, event: TraceEvent) {
        self.trace.record(event);
    }

    pub(crate) fn current_timepoint(&self) -> u64 {
        self.timepoint.load(Ordering::Acquire)
    }

    /// Advances to the next timepoint, returning the one that just finished.
    pub(crate) fn advance_timepoint(&self) -> u64 {
        self.timepoint.fetch_add(1, Ordering::AcqRel)
    }

    /// The registration sequence so far, in registration order.
    pub(crate) fn registrations(&self) -> Vec<(Arc<dyn Script>, Location)> {
        self.registrations
            .lock()
            .expect("registration sequence poisoned")
            .clone()
    }
}

/// Cheap cloneable handle to a device's store and identity.
///
/// This is what a [`Supervisor`] hands out as a neighbourhood entry and what
/// neighbouring devices' workers use to read and write each other's stores.
/// All access is mediated by the target device's own lock.
#[derive(Clone)]
pub struct DeviceRef {
    shared: Arc<DeviceShared>,
}

impl DeviceRef {
    pub(crate) fn new(shared: Arc<DeviceShared>) -> Self {
        Self { shared }
    }

    /// The device's identity.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.shared.id()
    }

    /// Reads `location` from the device's store; `None` if unmeasured.
    #[must_use]
    pub fn get_value(&self, location: Location) -> Option<Value> {
        self.shared.store().get(location)
    }

    /// Writes `location` in the device's store; dropped if unmeasured.
    pub fn set_value(&self, location: Location, value: Value) {
        self.shared.store().set(location, value);
    }

    /// The number of timepoints the device has fully completed.
    #[must_use]
    pub fn current_timepoint(&self) -> u64 {
        self.shared.current_timepoint()
    }

    pub(crate) fn trace(&self, event: TraceEvent) {
        self.shared.trace(event);
    }
}

impl fmt::Debug for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRef").field("id", &self.id()).finish()
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {}", self.id())
    }
}

/// A simulated sensor node.
///
/// Owned exclusively by the driver; neighbours and workers see it only
/// through [`DeviceRef`] handles.
pub struct Device {
    shared: Arc<DeviceShared>,
    supervisor: Arc<dyn Supervisor>,
    barrier: Arc<PhaseBarrier>,
    pool: PoolConfig,
    dispatcher: Option<ScriptDispatcher>,
}

impl Device {
    /// Creates a device. No threads run until [`start`](Device::start).
    #[must_use]
    pub fn new(
        config: DeviceConfig,
        supervisor: Arc<dyn Supervisor>,
        barrier: Arc<PhaseBarrier>,
        trace: Arc<dyn TraceSink>,
    ) -> Self {
        let shared = Arc::new(DeviceShared {
            id: config.id,
            store: SensorStore::new(config.readings),
            registrations: Mutex::new(Vec::new()),
            gate: SubmissionGate::new(),
            timepoint: AtomicU64::new(0),
            trace,
        });
        Self {
            shared,
            supervisor,
            barrier,
            pool: config.pool,
            dispatcher: None,
        }
    }

    /// The device's identity.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.shared.id()
    }

    /// A handle for supervisors and neighbouring devices.
    #[must_use]
    pub fn handle(&self) -> DeviceRef {
        DeviceRef::new(Arc::clone(&self.shared))
    }

    /// Spawns the dispatcher thread and its worker pool.
    ///
    /// Call only after every device exists and its handle is registered
    /// wherever the supervisor needs it — the dispatcher asks for
    /// neighbours immediately. Calling `start` twice is a no-op.
    pub fn start(&mut self) {
        if self.dispatcher.is_some() {
            return;
        }
        self.dispatcher = Some(ScriptDispatcher::spawn(
            Arc::clone(&self.shared),
            Arc::clone(&self.supervisor),
            Arc::clone(&self.barrier),
            self.pool,
        ));
    }

    /// Registers a script to run at `location` from the current timepoint
    /// on. Registrations are permanent: the pair is re-executed every
    /// subsequent timepoint until the simulation ends.
    pub fn assign_script(&self, script: Arc<dyn Script>, location: Location) {
        let timepoint = self.shared.current_timepoint();
        self.shared
            .registrations
            .lock()
            .expect("registration sequence poisoned")
            .push((script, location));
        self.shared.trace(TraceEvent::ScriptAssigned {
            device: self.id(),
            location,
            timepoint,
        });
    }

    /// Signals that script submission for the current timepoint is
    /// complete, releasing the dispatcher into its dispatch phase.
    ///
    /// Must be called once per timepoint on every device, even when no new
    /// scripts were assigned.
    pub fn end_submission(&self) {
        let timepoint = self.shared.current_timepoint();
        self.shared.gate.close_round();
        self.shared.trace(TraceEvent::SubmissionEnded {
            device: self.id(),
            timepoint,
        });
    }

    /// Reads `location` from this device's store; `None` if unmeasured.
    ///
    /// Safe to call from any thread at any time.
    #[must_use]
    pub fn get_value(&self, location: Location) -> Option<Value> {
        self.shared.store().get(location)
    }

    /// Writes `location` in this device's store; dropped if unmeasured.
    pub fn set_value(&self, location: Location, value: Value) {
        self.shared.store().set(location, value);
    }

    /// The number of timepoints this device has fully completed.
    #[must_use]
    pub fn current_timepoint(&self) -> u64 {
        self.shared.current_timepoint()
    }

    /// Joins the dispatcher and every pooled worker.
    ///
    /// Safe to call only after the supervisor has returned the end-of-
    /// simulation sentinel for this device; otherwise the dispatcher is
    /// still looping and this call blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Returns the fatal condition a dispatcher or worker died with, if any.
    pub fn shutdown(mut self) -> SimResult<()> {
        match self.dispatcher.take() {
            Some(mut dispatcher) => dispatcher.join(self.shared.id()),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id())
            .field("started", &self.dispatcher.is_some())
            .finish()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {}", self.id())
    }
}
