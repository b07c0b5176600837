//! Batch orchestration: run every credential through a validator under a
//! concurrency cap, aggregate one outcome per submission, and report each
//! completion as it lands.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, Semaphore};

use crate::cline::Credential;
use crate::handshake::DEFAULT_TIMEOUT_SECS;
use crate::validator::{CredentialValidator, ValidationOutcome, ValidationStatus};

pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum number of servers tested at the same time.
    pub concurrency: usize,
    /// Connect/read/write timeout applied to every socket operation.
    pub io_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            concurrency: DEFAULT_CONCURRENCY,
            io_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Outcome aggregation for one batch, keyed by submission index so duplicate
/// credentials keep their own slot. Written from a single place (the
/// aggregation loop in [`BatchRunner::run`]); completion order never leaks
/// into the mapping.
#[derive(Debug)]
pub struct ValidationBatch {
    completed: usize,
    slots: Vec<Option<ValidationOutcome>>,
}

impl ValidationBatch {
    fn new(total: usize) -> Self {
        ValidationBatch {
            completed: 0,
            slots: (0..total).map(|_| None).collect(),
        }
    }

    fn record(&mut self, index: usize, outcome: ValidationOutcome) -> usize {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.is_none() {
                *slot = Some(outcome);
                self.completed += 1;
            }
        }
        self.completed
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn outcome(&self, index: usize) -> Option<&ValidationOutcome> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    /// Outcomes in submission order.
    pub fn outcomes(&self) -> impl Iterator<Item = &ValidationOutcome> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }
}

/// Fan-out/fan-in driver. Workers are spawned behind owned semaphore
/// permits; each hands its `(index, outcome)` to the runner over an
/// unbounded channel, and the runner is the only writer of the batch, so no
/// lock guards the aggregation.
pub struct BatchRunner {
    config: RunnerConfig,
}

impl BatchRunner {
    pub fn new(config: RunnerConfig) -> Self {
        BatchRunner { config }
    }

    /// Validates every credential and returns the completed batch. The
    /// callback fires exactly once per recorded outcome, with the running
    /// completed/total counters. Failures stay inside their outcome; one
    /// stuck or broken server never stops the rest of the batch.
    pub async fn run<F>(&self, credentials: Vec<Credential>, mut on_progress: F) -> ValidationBatch
    where
        F: FnMut(&ValidationOutcome, usize, usize),
    {
        let total = credentials.len();
        let mut batch = ValidationBatch::new(total);
        if total == 0 {
            return batch;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let io_timeout = self.config.io_timeout;
        let submitted = credentials.clone();

        let dispatcher = tokio::spawn(async move {
            let mut tasks = FuturesUnordered::new();
            for (index, credential) in credentials.into_iter().enumerate() {
                // Receiver gone means the batch future was dropped; stop
                // handing out new work, let in-flight workers finish.
                if tx.is_closed() {
                    break;
                }
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let tx = tx.clone();
                tasks.push(tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = CredentialValidator::new(io_timeout)
                        .validate(credential)
                        .await;
                    let _ = tx.send((index, outcome));
                }));
            }
            drop(tx);
            while let Some(_joined) = tasks.next().await {}
        });

        // Single-writer aggregation: the channel closes once every worker
        // has sent and dropped its sender.
        while let Some((index, outcome)) = rx.recv().await {
            let completed = batch.record(index, outcome);
            if let Some(recorded) = batch.outcome(index) {
                on_progress(recorded, completed, total);
            }
        }
        let _ = dispatcher.await;

        // validate() is total, so a hole here means a worker task died.
        // Fill it so the batch still carries one outcome per submission.
        for (index, credential) in submitted.iter().enumerate() {
            if batch.outcome(index).is_none() {
                let completed = batch.record(
                    index,
                    ValidationOutcome {
                        credential: credential.clone(),
                        status: ValidationStatus::ProtocolError,
                        detail: "validation task crashed".to_string(),
                    },
                );
                if let Some(recorded) = batch.outcome(index) {
                    on_progress(recorded, completed, total);
                }
            }
        }
        batch
    }
}
