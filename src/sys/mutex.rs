//! Mutual exclusion with the fatal failure policy of the kernel: a lock that cannot be
//! acquired is never retried or ignored, it takes the whole operation down.

use std::sync::{
    Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError,
};

/// System mutex guarding a value. Unlocking happens when the guard is dropped, so no
/// code path can leave it locked.
#[derive(Debug, Default)]
pub struct MutexSys<T: ?Sized> {
    inner: Mutex<T>,
}

impl<T> MutexSys<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        match self.inner.into_inner() {
            Ok(value) => value,
            Err(_) => panic!("MutexSys destroy failed: a holder panicked"),
        }
    }
}

impl<T: ?Sized> MutexSys<T> {
    pub fn lock(&self) -> MutexGuard<'_, T> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("MutexSys lock failed: a holder panicked"),
        }
    }

    /// Returns `None` if another thread holds the lock right now
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(_)) => panic!("MutexSys try_lock failed: a holder panicked"),
        }
    }

    pub fn unlock(guard: MutexGuard<'_, T>) {
        drop(guard);
    }
}

pub fn read_lock<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(_) => panic!("read lock failed: a writer panicked"),
    }
}

pub fn write_lock<T: ?Sized>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(_) => panic!("write lock failed: a writer panicked"),
    }
}
