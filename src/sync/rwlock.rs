//! A fair readers-writer lock.
//!
//! `std::sync::RwLock` leaves its admission policy to the platform; the
//! sensor stores need a specific one, because a device's store is hammered
//! concurrently by its own workers and by every neighbour's workers:
//!
//! - an arriving reader waits while a writer is active **or waiting**;
//! - an arriving writer waits while any reader or writer is active;
//! - a releasing writer admits the entire batch of readers that queued
//!   during its episode before any waiting writer;
//! - the last reader out wakes exactly one waiting writer.
//!
//! Under continuous contention a reader therefore waits at most one write
//! episode, and a writer at most one read batch plus one write episode.
//!
//! Reader batches carry a phase number: a reader that queues records the
//! current phase and is admitted only when the phase advances, so a wakeup
//! meant for an earlier batch can never admit a later arrival early.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct AdmissionState {
    active_readers: usize,
    writer_active: bool,
    waiting_readers: usize,
    waiting_writers: usize,
    /// Bumped once per admitted read batch.
    read_phase: u64,
    /// Readers granted admission in the current batch that have not yet
    /// incremented `active_readers`. Writers must not start while this is
    /// non-zero or the granted batch would be stranded behind them.
    admitted: usize,
}

/// A readers-writer lock with batch-fair admission.
///
/// Guards are RAII: dropping a [`FairReadGuard`] or [`FairWriteGuard`]
/// releases the lock, so acquire and release cannot be mispaired. The
/// protected value is touched only while admitted, outside the internal
/// state mutex — a panic inside a critical section unwinds through the
/// guard and releases the lock without poisoning the admission state.
pub struct FairRwLock<T> {
    state: Mutex<AdmissionState>,
    readers: Condvar,
    writers: Condvar,
    value: UnsafeCell<T>,
}

// SAFETY: the admission protocol guarantees `value` is referenced either by
// any number of readers (shared) or by exactly one writer (exclusive),
// never both, so handing references across threads is sound under the
// usual Send/Sync bounds.
unsafe impl<T: Send> Send for FairRwLock<T> {}
unsafe impl<T: Send + Sync> Sync for FairRwLock<T> {}

impl<T> FairRwLock<T> {
    /// Creates a lock owning `value`.
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(AdmissionState::default()),
            readers: Condvar::new(),
            writers: Condvar::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Consumes the lock, returning the protected value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    fn state(&self) -> MutexGuard<'_, AdmissionState> {
        // Only this module's bookkeeping runs under the state mutex, and it
        // cannot panic, so the mutex cannot be poisoned by user code.
        self.state.lock().expect("rwlock admission state poisoned")
    }

    /// Acquires shared access, blocking per the admission policy.
    pub fn read(&self) -> FairReadGuard<'_, T> {
        let mut state = self.state();
        if state.writer_active || state.waiting_writers > 0 {
            state.waiting_readers += 1;
            let phase = state.read_phase;
            while state.read_phase == phase {
                state = self
                    .readers
                    .wait(state)
                    .expect("rwlock admission state poisoned");
            }
            state.admitted -= 1;
        }
        state.active_readers += 1;
        FairReadGuard { lock: self }
    }

    /// Acquires exclusive access, blocking per the admission policy.
    pub fn write(&self) -> FairWriteGuard<'_, T> {
        let mut state = self.state();
        if state.writer_active || state.active_readers > 0 || state.admitted > 0 {
            state.waiting_writers += 1;
            while state.writer_active || state.active_readers > 0 || state.admitted > 0 {
                state = self
                    .writers
                    .wait(state)
                    .expect("rwlock admission state poisoned");
            }
            state.waiting_writers -= 1;
        }
        state.writer_active = true;
        FairWriteGuard { lock: self }
    }

    fn release_read(&self) {
        let mut state = self.state();
        state.active_readers -= 1;
        if state.active_readers == 0 && state.admitted == 0 && state.waiting_writers > 0 {
            self.writers.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = self.state();
        state.writer_active = false;
        if state.waiting_readers > 0 {
            // Hand the lock to the whole waiting read batch before any
            // writer that queued behind it.
            state.read_phase = state.read_phase.wrapping_add(1);
            state.admitted = state.waiting_readers;
            state.waiting_readers = 0;
            self.readers.notify_all();
        } else if state.waiting_writers > 0 {
            self.writers.notify_one();
        }
    }
}

impl<T> fmt::Debug for FairRwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FairRwLock").finish_non_exhaustive()
    }
}

/// Shared access to a [`FairRwLock`]'s value. Released on drop.
pub struct FairReadGuard<'a, T> {
    lock: &'a FairRwLock<T>,
}

impl<T> Deref for FairReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: this guard holds a read admission, so no writer exists.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for FairReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Exclusive access to a [`FairRwLock`]'s value. Released on drop.
pub struct FairWriteGuard<'a, T> {
    lock: &'a FairRwLock<T>,
}

impl<T> Deref for FairWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: this guard holds the write admission, excluding all others.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for FairWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; exclusive admission also grants unique access.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for FairWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn writes_are_never_observed_partially_applied() {
        // The writer keeps two halves of the value in sync; a reader that
        // ever sees them disagree has observed a torn write.
        let lock = Arc::new(FairRwLock::new((0u64, 0u64)));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    let guard = lock.read();
                    assert_eq!(guard.0, guard.1, "torn write observed");
                }
            }));
        }

        for _ in 0..2 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    let mut guard = lock.write();
                    guard.0 += 1;
                    thread::yield_now();
                    guard.1 += 1;
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        let final_value = lock.read();
        assert_eq!(final_value.0, 1000);
        assert_eq!(final_value.1, 1000);
    }

    #[test]
    fn readers_are_admitted_concurrently() {
        // Both threads hold read guards across the same rendezvous; the test
        // can only pass if the two reads overlap.
        let lock = Arc::new(FairRwLock::new(()));
        let rendezvous = Arc::new(Barrier::new(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let lock = Arc::clone(&lock);
            let rendezvous = Arc::clone(&rendezvous);
            handles.push(thread::spawn(move || {
                let _guard = lock.read();
                rendezvous.wait();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn writer_is_not_starved_by_a_reader_stream() {
        let lock = Arc::new(FairRwLock::new(0u64));
        let done = Arc::new(AtomicBool::new(false));

        let mut readers = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let done = Arc::clone(&done);
            readers.push(thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let _guard = lock.read();
                }
            }));
        }

        let writer = {
            let lock = Arc::clone(&lock);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                let mut guard = lock.write();
                *guard = 1;
                done.store(true, Ordering::Release);
            })
        };

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(*lock.read(), 1);
    }

    #[test]
    fn queued_readers_are_admitted_before_a_later_writer() {
        let lock = Arc::new(FairRwLock::new(()));
        let order = Arc::new(Mutex::new(Vec::new()));

        let first_writer = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let _guard = lock.write();
                thread::sleep(Duration::from_millis(100));
            })
        };
        thread::sleep(Duration::from_millis(20));

        // Queue a reader behind the active writer, then a second writer
        // behind the reader.
        let reader = {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                let _guard = lock.read();
                order.lock().unwrap().push("reader");
                thread::sleep(Duration::from_millis(20));
            })
        };
        thread::sleep(Duration::from_millis(20));
        let second_writer = {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                let _guard = lock.write();
                order.lock().unwrap().push("writer");
            })
        };

        first_writer.join().unwrap();
        reader.join().unwrap();
        second_writer.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["reader", "writer"]);
    }

    #[test]
    fn into_inner_returns_the_value() {
        let lock = FairRwLock::new(7);
        assert_eq!(lock.into_inner(), 7);
    }
}
