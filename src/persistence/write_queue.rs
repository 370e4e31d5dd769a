//! Asynchronous Write Queue
//!
//! One dedicated worker thread drains a FIFO channel of pending writes and
//! applies each one through a `WriteSink`. Callers never wait on the write
//! itself; they wait on the flush barrier when they need it.
//!
//! ## Architecture
//!
//! ```text
//! Caller 1 ──┐
//! Caller 2 ──┤──► channel ──► worker ──► sink.apply ──► pending -= 1
//! Caller 3 ──┘
//! ```
//!
//! The pending count is incremented before a write is posted and
//! decremented after it is applied (or immediately if posting fails), so
//! it reads zero only when nothing is in flight.

use crate::options::value::VariantValue;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// A write waiting to be applied. Owned by the queue once posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub name: String,
    pub value: VariantValue,
}

impl PendingWrite {
    pub fn new(name: impl Into<String>, value: VariantValue) -> Self {
        PendingWrite {
            name: name.into(),
            value,
        }
    }
}

/// Destination of queued writes. Failures are the sink's to log.
pub trait WriteSink: Send + Sync + 'static {
    fn apply(&self, write: PendingWrite);
}

/// Worker that owns the receiving end of the channel
struct WriteWorker<W: WriteSink> {
    sink: Arc<W>,
    rx: Receiver<PendingWrite>,
    pending: Arc<AtomicUsize>,
}

impl<W: WriteSink> WriteWorker<W> {
    /// Run until every sender is dropped and the channel is drained
    fn run(self) {
        for write in self.rx.iter() {
            self.sink.apply(write);
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        debug!("Write worker exiting");
    }
}

/// Handle to the write worker
pub struct AsyncWriteQueue {
    tx: Option<Sender<PendingWrite>>,
    pending: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncWriteQueue {
    /// Spawn the worker thread
    pub fn spawn<W: WriteSink>(sink: Arc<W>) -> std::io::Result<Self> {
        let (tx, rx) = channel::unbounded();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = WriteWorker {
            sink,
            rx,
            pending: Arc::clone(&pending),
        };
        let handle = thread::Builder::new()
            .name("regopts-writer".to_string())
            .spawn(move || worker.run())?;

        Ok(AsyncWriteQueue {
            tx: Some(tx),
            pending,
            worker: Some(handle),
        })
    }

    /// Post a write. Never blocks and never reports failure to the caller;
    /// a write posted after shutdown is dropped with a warning.
    pub fn write_async(&self, write: PendingWrite) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        let posted = match &self.tx {
            Some(tx) => tx.send(write).map_err(|e| e.into_inner()),
            None => Err(write),
        };
        if let Err(dropped) = posted {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            warn!(name = %dropped.name, "Write queue closed, dropping write");
        }
    }

    /// Block until every write posted before this call has been applied
    pub fn flush(&self) {
        while self.pending.load(Ordering::Acquire) != 0 {
            thread::yield_now();
        }
    }

    /// Number of writes posted but not yet applied
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.tx.is_some()
    }

    /// Close the channel and join the worker. Writes already posted are
    /// still applied. Idempotent.
    pub fn shutdown(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Write worker panicked");
            }
        }
    }
}

impl Drop for AsyncWriteQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
