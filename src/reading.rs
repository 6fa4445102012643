//! Measurement and identity types for the sensor network.
//!
//! The simulation traffics in plain numeric readings keyed by [`Location`];
//! devices are identified by small, stable integers assigned by the driver.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A measured sensor value.
///
/// Aggregation scripts consume an ordered sequence of these and produce one.
pub type Value = f64;

/// Unique identity of a device; between 0 and N-1 for a run of N devices.
///
/// Stable for the lifetime of the simulation.
///
/// # Examples
///
/// ```
/// use sensornet::DeviceId;
///
/// let id = DeviceId(3);
/// assert_eq!(id.to_string(), "3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key identifying one measured quantity within a device's sensor store.
///
/// Locations are opaque to the engine: they are only compared, hashed, and
/// handed back to scripts' registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(pub u32);

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
