//! A reusable cyclic barrier.
//!
//! `std::sync::Barrier` exists, but the engine needs a handful of extras in
//! one place: construction behind an `Arc` for the cross-device rendezvous,
//! a `parties` accessor for driver assertions, and an explicit
//! generation-counter discipline that is load-bearing for reuse — each
//! waiter remembers the generation it entered with and leaves only once the
//! shared generation has advanced past it, so a wakeup from phase T can
//! never release a phase T+1 arrival.

use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

/// A rendezvous point for a fixed number of threads, reusable across an
/// unbounded number of phases.
#[derive(Debug)]
pub struct PhaseBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cv: Condvar,
}

impl PhaseBarrier {
    /// Creates a barrier for `parties` threads. A party count of zero is
    /// treated as one, so `wait` always has a well-defined release rule.
    #[must_use]
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            state: Mutex::new(BarrierState::default()),
            cv: Condvar::new(),
        }
    }

    /// Creates a shared barrier, the form every device participant holds.
    #[must_use]
    pub fn shared(parties: usize) -> Arc<Self> {
        Arc::new(Self::new(parties))
    }

    /// Number of threads that must arrive to release a phase.
    #[must_use]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Blocks until all parties have arrived for the current phase.
    ///
    /// Returns `true` for exactly one caller per phase (the last arrival),
    /// mirroring `std::sync::Barrier`'s leader convention.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock().expect("barrier state poisoned");
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            // Last arrival: reset for the next phase and release everyone.
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cv.notify_all();
            true
        } else {
            while state.generation == generation {
                state = self.cv.wait(state).expect("barrier state poisoned");
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn releases_exactly_when_all_parties_arrive() {
        const PARTIES: usize = 4;
        let barrier = PhaseBarrier::shared(PARTIES);
        let arrived = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..PARTIES)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let arrived = Arc::clone(&arrived);
                thread::spawn(move || {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    barrier.wait();
                    // Nobody passes the barrier before everyone arrived.
                    assert_eq!(arrived.load(Ordering::SeqCst), PARTIES);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn reusable_across_many_phases_with_one_leader_each() {
        const PARTIES: usize = 3;
        const PHASES: usize = 50;
        let barrier = PhaseBarrier::shared(PARTIES);
        let leaders = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..PARTIES)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let leaders = Arc::clone(&leaders);
                thread::spawn(move || {
                    for _ in 0..PHASES {
                        if barrier.wait() {
                            leaders.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(leaders.load(Ordering::SeqCst), PHASES);
    }

    #[test]
    fn zero_parties_is_clamped_to_one() {
        let barrier = PhaseBarrier::new(0);
        assert_eq!(barrier.parties(), 1);
        assert!(barrier.wait());
        assert!(barrier.wait());
    }
}
