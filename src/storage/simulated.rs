//! Simulated Store with Fault Injection
//!
//! Wraps another store and injects failures from a seeded RNG, so a given
//! seed always fails the same operations in the same order.

use crate::storage::error::StoreError;
use crate::storage::path::KeyPath;
use crate::storage::store::{KeyIter, PersistentStore, StoreType, ValueIter};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;

/// Configuration for simulated fault injection
#[derive(Debug, Clone)]
pub struct SimulatedStoreConfig {
    /// Probability of open/create failure
    pub open_fail_prob: f64,
    /// Probability of read failure
    pub read_fail_prob: f64,
    /// Probability of write failure
    pub write_fail_prob: f64,
    /// Probability of delete failure
    pub delete_fail_prob: f64,
    /// Probability of an enumeration failing up front
    pub enumerate_fail_prob: f64,
}

impl Default for SimulatedStoreConfig {
    fn default() -> Self {
        SimulatedStoreConfig {
            open_fail_prob: 0.01,
            read_fail_prob: 0.01,
            write_fail_prob: 0.01,
            delete_fail_prob: 0.01,
            enumerate_fail_prob: 0.01,
        }
    }
}

impl SimulatedStoreConfig {
    /// High chaos configuration for stress testing
    pub fn high_chaos() -> Self {
        SimulatedStoreConfig {
            open_fail_prob: 0.05,
            read_fail_prob: 0.05,
            write_fail_prob: 0.2,
            delete_fail_prob: 0.05,
            enumerate_fail_prob: 0.05,
        }
    }

    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedStoreConfig {
            open_fail_prob: 0.0,
            read_fail_prob: 0.0,
            write_fail_prob: 0.0,
            delete_fail_prob: 0.0,
            enumerate_fail_prob: 0.0,
        }
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default)]
pub struct SimulatedStoreStats {
    pub open_attempts: u64,
    pub open_failures: u64,
    pub read_attempts: u64,
    pub read_failures: u64,
    pub write_attempts: u64,
    pub write_failures: u64,
    pub delete_attempts: u64,
    pub delete_failures: u64,
    pub enumerate_attempts: u64,
    pub enumerate_failures: u64,
}

struct SimulatedStoreInner {
    rng: ChaCha8Rng,
    stats: SimulatedStoreStats,
}

#[derive(Clone, Copy)]
enum Op {
    Open,
    Read,
    Write,
    Delete,
    Enumerate,
}

/// Simulated store that wraps another store and injects faults
pub struct SimulatedStore<S: PersistentStore + Clone> {
    inner_store: S,
    config: SimulatedStoreConfig,
    state: Arc<Mutex<SimulatedStoreInner>>,
}

impl<S: PersistentStore + Clone> SimulatedStore<S> {
    pub fn new(inner_store: S, seed: u64, config: SimulatedStoreConfig) -> Self {
        SimulatedStore {
            inner_store,
            config,
            state: Arc::new(Mutex::new(SimulatedStoreInner {
                rng: ChaCha8Rng::seed_from_u64(seed),
                stats: SimulatedStoreStats::default(),
            })),
        }
    }

    /// Get current statistics
    pub fn stats(&self) -> SimulatedStoreStats {
        self.state.lock().stats.clone()
    }

    /// Reset statistics
    pub fn reset_stats(&self) {
        self.state.lock().stats = SimulatedStoreStats::default();
    }

    /// Get the wrapped store
    pub fn inner_store(&self) -> &S {
        &self.inner_store
    }

    /// Record an attempt and decide whether it fails
    fn inject(&self, op: Op) -> Result<(), StoreError> {
        let mut s = self.state.lock();
        let (prob, label) = match op {
            Op::Open => {
                s.stats.open_attempts += 1;
                (self.config.open_fail_prob, "open")
            }
            Op::Read => {
                s.stats.read_attempts += 1;
                (self.config.read_fail_prob, "read")
            }
            Op::Write => {
                s.stats.write_attempts += 1;
                (self.config.write_fail_prob, "write")
            }
            Op::Delete => {
                s.stats.delete_attempts += 1;
                (self.config.delete_fail_prob, "delete")
            }
            Op::Enumerate => {
                s.stats.enumerate_attempts += 1;
                (self.config.enumerate_fail_prob, "enumerate")
            }
        };
        if !s.rng.gen_bool(prob.clamp(0.0, 1.0)) {
            return Ok(());
        }
        match op {
            Op::Open => s.stats.open_failures += 1,
            Op::Read => s.stats.read_failures += 1,
            Op::Write => s.stats.write_failures += 1,
            Op::Delete => s.stats.delete_failures += 1,
            Op::Enumerate => s.stats.enumerate_failures += 1,
        }
        Err(StoreError::Io(IoError::new(
            ErrorKind::Other,
            format!("simulated {} failure", label),
        )))
    }
}

impl<S: PersistentStore + Clone> Clone for SimulatedStore<S> {
    fn clone(&self) -> Self {
        SimulatedStore {
            inner_store: self.inner_store.clone(),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: PersistentStore + Clone> PersistentStore for SimulatedStore<S> {
    type Handle = S::Handle;

    fn open_or_create(&self, path: &KeyPath) -> Result<Self::Handle, StoreError> {
        self.inject(Op::Open)?;
        self.inner_store.open_or_create(path)
    }

    fn open(&self, path: &KeyPath) -> Result<Self::Handle, StoreError> {
        self.inject(Op::Open)?;
        self.inner_store.open(path)
    }

    fn close(&self, handle: Self::Handle) {
        self.inner_store.close(handle)
    }

    fn read_value(
        &self,
        handle: &Self::Handle,
        name: &str,
        buf: &mut [u8],
    ) -> Result<(usize, StoreType), StoreError> {
        self.inject(Op::Read)?;
        self.inner_store.read_value(handle, name, buf)
    }

    fn write_value(
        &self,
        handle: &Self::Handle,
        name: &str,
        data: &[u8],
        store_type: StoreType,
    ) -> Result<(), StoreError> {
        self.inject(Op::Write)?;
        self.inner_store.write_value(handle, name, data, store_type)
    }

    fn delete_value(&self, handle: &Self::Handle, name: &str) -> Result<(), StoreError> {
        self.inject(Op::Delete)?;
        self.inner_store.delete_value(handle, name)
    }

    fn delete_subtree(&self, path: &KeyPath) -> Result<(), StoreError> {
        self.inject(Op::Delete)?;
        self.inner_store.delete_subtree(path)
    }

    fn enumerate_values<'a>(&'a self, handle: &'a Self::Handle) -> Result<ValueIter<'a>, StoreError> {
        self.inject(Op::Enumerate)?;
        self.inner_store.enumerate_values(handle)
    }

    fn enumerate_child_keys<'a>(&'a self, path: &KeyPath) -> Result<KeyIter<'a>, StoreError> {
        self.inject(Op::Enumerate)?;
        self.inner_store.enumerate_child_keys(path)
    }
}
