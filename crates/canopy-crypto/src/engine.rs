// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::batch::BatchBuffer;
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use std::time::Instant;

/// Why a [`CryptoJob`] wait came back without a verdict.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobWaitError {
    /// The deadline elapsed before the worker fulfilled the job.
    Timeout,
    /// The worker dropped the job without fulfilling it.
    WorkerDropped,
}

/// Handle to one in-flight signature verification. The result arrives at
/// most once; callers that need to read it repeatedly memoize on their side.
#[derive(Debug)]
pub struct CryptoJob {
    receiver: Receiver<bool>,
}

impl CryptoJob {
    /// Blocks until the verdict arrives or `deadline` passes.
    pub fn wait_deadline(&self, deadline: Instant) -> Result<bool, JobWaitError> {
        match self.receiver.recv_deadline(deadline) {
            Ok(passed) => Ok(passed),
            Err(RecvTimeoutError::Timeout) => Err(JobWaitError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(JobWaitError::WorkerDropped),
        }
    }

    /// Non-blocking probe; `None` while the job is still in flight.
    pub fn try_result(&self) -> Option<Result<bool, JobWaitError>> {
        match self.receiver.try_recv() {
            Ok(passed) => Some(Ok(passed)),
            Err(crossbeam_channel::TryRecvError::Empty) => None,
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                Some(Err(JobWaitError::WorkerDropped))
            },
        }
    }
}

/// Capability interface over the asynchronous crypto worker. The workflows
/// never learn whether the implementation is a thread pool, a task runtime,
/// or the synchronous stub used in tests.
pub trait CryptoEngine: Send + Sync {
    /// Submits a whole batch in one call and returns one job handle per
    /// entry, in batch order.
    fn submit_batch(&self, batch: BatchBuffer) -> Vec<CryptoJob>;
}

/// Production engine: a dedicated, named rayon pool. One task per batch;
/// each job's verdict is sent as soon as it is computed so waiters make
/// progress before the whole batch finishes.
pub struct ThreadPoolCryptoEngine {
    pool: rayon::ThreadPool,
}

impl ThreadPoolCryptoEngine {
    pub fn new(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("crypto-verify-{index}"))
            .build()?;
        Ok(Self { pool })
    }
}

impl CryptoEngine for ThreadPoolCryptoEngine {
    fn submit_batch(&self, batch: BatchBuffer) -> Vec<CryptoJob> {
        let (senders, jobs): (Vec<_>, Vec<_>) = (0..batch.len())
            .map(|_| {
                let (sender, receiver) = bounded(1);
                (sender, CryptoJob { receiver })
            })
            .unzip();
        self.pool.spawn(move || {
            for (job, sender) in batch.jobs().iter().zip(senders) {
                let passed = batch.verify_job(job);
                // A send can only fail if the waiter gave up; nothing to do.
                let _ = sender.send(passed);
            }
        });
        jobs
    }
}

/// Verifies synchronously on the submitting thread. Used by tests and by
/// tools that want deterministic single-threaded behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateCryptoEngine;

impl CryptoEngine for ImmediateCryptoEngine {
    fn submit_batch(&self, batch: BatchBuffer) -> Vec<CryptoJob> {
        batch
            .jobs()
            .iter()
            .map(|job| {
                let (sender, receiver) = bounded(1);
                let _ = sender.send(batch.verify_job(job));
                CryptoJob { receiver }
            })
            .collect()
    }
}

/// Never fulfils any job; waits end in [`JobWaitError::WorkerDropped`] (the
/// senders are gone) or [`JobWaitError::Timeout`] depending on construction.
/// Lets tests drive the timeout and failure paths of the waiters.
#[cfg(any(test, feature = "fuzzing"))]
pub struct StalledCryptoEngine {
    hold_senders: bool,
    parked: std::sync::Mutex<Vec<crossbeam_channel::Sender<bool>>>,
}

#[cfg(any(test, feature = "fuzzing"))]
impl StalledCryptoEngine {
    /// Jobs stay pending forever: waiters see `Timeout`.
    pub fn pending() -> Self {
        Self {
            hold_senders: true,
            parked: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Jobs are dropped on the floor: waiters see `WorkerDropped`.
    pub fn dropping() -> Self {
        Self {
            hold_senders: false,
            parked: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(any(test, feature = "fuzzing"))]
impl CryptoEngine for StalledCryptoEngine {
    fn submit_batch(&self, batch: BatchBuffer) -> Vec<CryptoJob> {
        (0..batch.len())
            .map(|_| {
                let (sender, receiver) = bounded(1);
                if self.hold_senders {
                    self.parked.lock().expect("lock poisoned").push(sender);
                }
                CryptoJob { receiver }
            })
            .collect()
    }
}
