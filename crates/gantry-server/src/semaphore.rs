//! Blocking counting semaphore.
//!
//! Handler chains run on blocking worker threads, so resource limits inside
//! a handler block the thread rather than await.

use std::fmt;

use parking_lot::{Condvar, Mutex};

/// Counting semaphore with RAII permits.
///
/// ```rust
/// use gantry_server::Semaphore;
///
/// let sem = Semaphore::new(2);
/// let a = sem.acquire();
/// let _b = sem.acquire();
/// assert!(sem.try_acquire().is_none());
///
/// drop(a);
/// assert!(sem.try_acquire().is_some());
/// ```
pub struct Semaphore {
    limit: usize,
    available: Mutex<usize>,
    released: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with `limit` permits.
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            available: Mutex::new(limit),
            released: Condvar::new(),
        }
    }

    /// Blocks until a permit is free and takes it.
    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self.available.lock();
        while *available == 0 {
            self.released.wait(&mut available);
        }
        *available -= 1;
        Permit { sem: self }
    }

    /// Takes a permit if one is free.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut available = self.available.lock();
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(Permit { sem: self })
    }

    /// Returns the number of free permits.
    pub fn available(&self) -> usize {
        *self.available.lock()
    }

    /// Returns the total number of permits.
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn release(&self) {
        *self.available.lock() += 1;
        self.released.notify_one();
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("limit", &self.limit)
            .field("available", &self.available())
            .finish()
    }
}

/// A held permit; released on drop, including during unwinding.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct Permit<'a> {
    sem: &'a Semaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}
