//! Per-device sensor storage.

use std::collections::HashMap;

use crate::reading::{Location, Value};
use crate::sync::FairRwLock;

/// A device's local measurement store.
///
/// The key set is fixed at construction: no locations are added or removed
/// afterwards. Reads of absent locations yield `None` and writes to absent
/// locations are silent no-ops — both are documented policy, not failures,
/// since neighbours routinely probe locations only they hold.
///
/// The store is shared by the owning device's workers and by every
/// neighbouring device's workers; all access goes through the store's own
/// [`FairRwLock`], and no call path takes more than one store's lock at a
/// time.
pub struct SensorStore {
    readings: FairRwLock<HashMap<Location, Value>>,
}

impl SensorStore {
    /// Creates a store holding the given initial readings.
    pub fn new(initial: impl IntoIterator<Item = (Location, Value)>) -> Self {
        Self {
            readings: FairRwLock::new(initial.into_iter().collect()),
        }
    }

    /// Returns the value held for `location`, or `None` if this device does
    /// not measure it.
    #[must_use]
    pub fn get(&self, location: Location) -> Option<Value> {
        self.readings.read().get(&location).copied()
    }

    /// Overwrites the value held for `location`.
    ///
    /// A write to a location this device does not measure is dropped.
    pub fn set(&self, location: Location, value: Value) {
        if let Some(slot) = self.readings.write().get_mut(&location) {
            *slot = value;
        }
    }

    /// Number of locations this device measures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.read().len()
    }

    /// Whether this device measures no locations at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.read().is_empty()
    }

    /// A point-in-time copy of every reading.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<Location, Value> {
        self.readings.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_writes_round_trip_for_known_locations() {
        let store = SensorStore::new([(Location(0), 10.0), (Location(1), 20.0)]);
        assert_eq!(store.get(Location(0)), Some(10.0));

        store.set(Location(0), 15.5);
        assert_eq!(store.get(Location(0)), Some(15.5));
        assert_eq!(store.get(Location(1)), Some(20.0));
    }

    #[test]
    fn absent_location_reads_yield_none() {
        let store = SensorStore::new([(Location(0), 1.0)]);
        assert_eq!(store.get(Location(9)), None);
    }

    #[test]
    fn absent_location_writes_are_dropped() {
        let store = SensorStore::new([(Location(0), 1.0)]);
        store.set(Location(9), 99.0);

        assert_eq!(store.get(Location(9)), None);
        assert_eq!(store.len(), 1, "key set must stay fixed");
    }

    #[test]
    fn snapshot_is_a_copy() {
        let store = SensorStore::new([(Location(2), 4.0)]);
        let snapshot = store.snapshot();
        store.set(Location(2), 8.0);

        assert_eq!(snapshot[&Location(2)], 4.0);
        assert_eq!(store.get(Location(2)), Some(8.0));
    }
}
