//! Per-device script dispatch.
//!
//! Each device runs one dispatcher thread plus a fixed pool of workers. The
//! dispatcher cycles through the timepoint state machine: ask the
//! supervisor for neighbours, wait for the driver to close submissions,
//! push every registered script into the pool, drain, rendezvous with all
//! other devices on the shared barrier, repeat. A `None` neighbourhood is
//! the cooperative shutdown signal — there is no preemptive interruption
//! anywhere in the engine.
//!
//! The task queue is a bounded crossbeam channel: submission blocks the
//! dispatcher while the pool is saturated, and the blocking `send`/`recv`
//! pair is immune to lost wakeups by construction. Dropping the sender is
//! the per-worker termination token; a worker drains what is queued and
//! exits when the channel disconnects.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::device::{DeviceRef, DeviceShared};
use crate::error::{SimError, SimResult};
use crate::reading::{DeviceId, Location};
use crate::script::Script;
use crate::supervisor::Supervisor;
use crate::sync::{CompletionGuard, InFlight, PhaseBarrier};
use crate::trace::TraceEvent;

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Pooled worker threads per device.
    pub workers: usize,
    /// Maximum queued tasks before submission blocks the dispatcher.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 8,
        }
    }
}

/// One script execution against the current neighbourhood.
struct Task {
    script: Arc<dyn Script>,
    location: Location,
    own: DeviceRef,
    neighbours: Arc<[DeviceRef]>,
}

impl Task {
    /// Gather, aggregate, write back.
    ///
    /// Readings are collected from every neighbour and then from the
    /// device itself, skipping locations nobody measures; the script runs
    /// only if at least one value was gathered, and its result is written
    /// back to every participant. At most one device's lock is held at any
    /// moment, so no lock-ordering cycle can form across devices.
    fn execute(&self) {
        let mut gathered = Vec::with_capacity(self.neighbours.len() + 1);
        for neighbour in self.neighbours.iter() {
            if let Some(value) = neighbour.get_value(self.location) {
                gathered.push(value);
            }
        }
        if let Some(value) = self.own.get_value(self.location) {
            gathered.push(value);
        }
        if gathered.is_empty() {
            return;
        }

        let result = self.script.run(&gathered);

        for neighbour in self.neighbours.iter() {
            neighbour.set_value(self.location, result);
        }
        self.own.set_value(self.location, result);

        self.own.trace(TraceEvent::TaskExecuted {
            device: self.own.id(),
            location: self.location,
            inputs: gathered.len(),
        });
    }
}

struct WorkerPool {
    tx: Sender<Task>,
    in_flight: Arc<InFlight>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn start(device: DeviceId, config: PoolConfig) -> Self {
        let workers = config.workers.max(1);
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Task>(capacity);
        let in_flight = Arc::new(InFlight::new());

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Task> = rx.clone();
            let in_flight = Arc::clone(&in_flight);
            let handle = thread::Builder::new()
                .name(format!("sensornet-device-{device}-worker-{idx}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        let _done = CompletionGuard::new(Arc::clone(&in_flight));
                        task.execute();
                    }
                })
                .expect("failed to spawn sensornet worker");
            handles.push(handle);
        }

        Self {
            tx,
            in_flight,
            workers: handles,
        }
    }

    /// Submits one task, blocking while the queue is full.
    fn submit(&self, device: DeviceId, task: Task) -> SimResult<()> {
        self.in_flight.submit();
        if self.tx.send(task).is_err() {
            // Every worker is gone; the task never entered the queue.
            self.in_flight.complete();
            return Err(SimError::TaskQueueDisconnected { device });
        }
        Ok(())
    }

    /// Blocks until every submitted task has completed.
    fn drain(&self) {
        self.in_flight.wait_idle();
    }

    /// Signals termination to every worker and joins them all.
    fn shutdown(self, device: DeviceId) -> SimResult<()> {
        drop(self.tx);
        let mut result = Ok(());
        for (worker, handle) in self.workers.into_iter().enumerate() {
            if handle.join().is_err() && result.is_ok() {
                result = Err(SimError::WorkerPanicked { device, worker });
            }
        }
        result
    }
}

/// Owns a device's dispatcher thread.
pub(crate) struct ScriptDispatcher {
    join: Option<JoinHandle<SimResult<()>>>,
}

impl ScriptDispatcher {
    pub(crate) fn spawn(
        shared: Arc<DeviceShared>,
        supervisor: Arc<dyn Supervisor>,
        barrier: Arc<PhaseBarrier>,
        config: PoolConfig,
    ) -> Self {
        let name = format!("sensornet-device-{}-dispatcher", shared.id());
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || run_timepoints(&shared, supervisor.as_ref(), &barrier, config))
            .expect("failed to spawn sensornet dispatcher");
        Self { join: Some(join) }
    }

    /// Joins the dispatcher, surfacing whatever it or its workers died with.
    pub(crate) fn join(&mut self, device: DeviceId) -> SimResult<()> {
        match self.join.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SimError::DispatcherPanicked { device })?,
            None => Ok(()),
        }
    }
}

/// The dispatcher thread body: the per-device timepoint state machine.
fn run_timepoints(
    shared: &Arc<DeviceShared>,
    supervisor: &dyn Supervisor,
    barrier: &PhaseBarrier,
    config: PoolConfig,
) -> SimResult<()> {
    let device = shared.id();
    let pool = WorkerPool::start(device, config);
    let own = DeviceRef::new(Arc::clone(shared));
    let mut round: u64 = 0;
    let mut fault = None;

    'timepoints: loop {
        // AWAIT_NEIGHBOURS: `None` ends this device's run.
        let Some(neighbours) = supervisor.neighbours(device) else {
            shared.trace(TraceEvent::DeviceStopping { device });
            break;
        };
        let neighbours: Arc<[DeviceRef]> = neighbours.into();
        shared.trace(TraceEvent::NeighbourhoodResolved {
            device,
            neighbours: neighbours.len(),
            timepoint: shared.current_timepoint(),
        });

        // AWAIT_SUBMISSION: the driver closes each timepoint explicitly.
        round += 1;
        shared.gate().wait_round(round);

        // DISPATCHING: the full registration sequence, in registration
        // order — registrations are permanent and re-run every timepoint.
        for (script, location) in shared.registrations() {
            let task = Task {
                script,
                location,
                own: own.clone(),
                neighbours: Arc::clone(&neighbours),
            };
            if let Err(err) = pool.submit(device, task) {
                fault = Some(err);
                break 'timepoints;
            }
        }

        // DRAINING: no timepoint ends with a task in flight.
        pool.drain();

        // BARRIER: no device starts timepoint T+1 until every device has
        // drained T.
        barrier.wait();
        let finished = shared.advance_timepoint();
        shared.trace(TraceEvent::TimepointCompleted {
            device,
            timepoint: finished,
        });
    }

    // SHUTDOWN: only reached with nothing in flight.
    match pool.shutdown(device) {
        Err(err) => Err(err),
        Ok(()) => fault.map_or(Ok(()), Err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_matches_the_classic_sizing() {
        let config = PoolConfig::default();
        assert_eq!(config.workers, 8);
        assert_eq!(config.queue_capacity, 8);
    }

    #[test]
    fn zero_sized_pools_are_clamped() {
        let pool = WorkerPool::start(
            DeviceId(0),
            PoolConfig {
                workers: 0,
                queue_capacity: 0,
            },
        );
        assert_eq!(pool.workers.len(), 1);
        pool.shutdown(DeviceId(0)).unwrap();
    }
}
