//! # sensornet — timepoint-synchronized sensor network simulation
//!
//! Simulates a distributed network of environmental sensor devices that
//! repeatedly exchange and aggregate locally held measurements with a
//! dynamically changing set of neighbours, synchronized into discrete
//! global timepoints.
//!
//! ## Core Concepts
//!
//! - **Device**: a simulated sensor node with a local key-value store
//! - **Script**: an opaque pure aggregation function run over readings
//!   gathered from a device and its neighbours at one location
//! - **Timepoint**: one discrete simulation round; all devices complete it
//!   before any proceeds to the next
//! - **Supervisor**: the external oracle supplying each device's
//!   neighbourhood per timepoint
//!
//! Every device runs one dispatcher thread and a fixed pool of workers;
//! devices interact through direct shared-state access guarded by each
//! target device's own fair readers-writer lock, and all devices
//! rendezvous on a shared [`PhaseBarrier`] between timepoints.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sensornet::{
//!     Device, DeviceConfig, DeviceId, Location, LogSink, PhaseBarrier,
//!     TimelineSupervisor, Value,
//! };
//!
//! let supervisor = Arc::new(TimelineSupervisor::new(rounds));
//! let barrier = PhaseBarrier::shared(device_count);
//! let sink = Arc::new(LogSink);
//!
//! let mut devices: Vec<Device> = configs
//!     .into_iter()
//!     .map(|cfg| Device::new(cfg, supervisor.clone(), barrier.clone(), sink.clone()))
//!     .collect();
//! for device in &devices {
//!     supervisor.register(device.handle());
//! }
//! for device in &mut devices {
//!     device.start();
//! }
//!
//! // Per timepoint: assign scripts, then close submission on every device.
//! devices[0].assign_script(Arc::new(|v: &[Value]| v.iter().sum::<Value>() / v.len() as Value), Location(0));
//! for device in &devices {
//!     device.end_submission();
//! }
//!
//! // After the supervisor ends the run:
//! for device in devices {
//!     device.shutdown()?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod device;
pub mod dispatcher;
pub mod error;
pub mod reading;
pub mod script;
pub mod store;
pub mod supervisor;
pub mod sync;
pub mod trace;

// Re-export primary types at crate root for convenience
pub use device::{Device, DeviceConfig, DeviceRef};
pub use dispatcher::PoolConfig;
pub use error::{SimError, SimResult};
pub use reading::{DeviceId, Location, Value};
pub use script::Script;
pub use store::SensorStore;
pub use supervisor::{Supervisor, TimelineSupervisor};
pub use sync::{FairRwLock, PhaseBarrier};
pub use trace::{LogSink, MemorySink, NullSink, TraceEvent, TraceSink};
