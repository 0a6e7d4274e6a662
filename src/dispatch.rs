use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use snafu::Snafu;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::{
    batch::{Batch, BatchAck, BatchOutcome, Keyspace},
    error::{LoaderError, Result},
    loader::LoaderOptions,
    report::CompletionReporter,
};

/// Transport-level outcome of one batch submission attempt.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum SendError {
    /// The service could not be reached or answered that it is unavailable.
    /// Expected to resolve if the attempt is repeated.
    #[snafu(display("service unavailable: {message}"))]
    Unavailable { message: String },
    /// The attempt did not complete within the configured per-attempt bound.
    #[snafu(display("attempt timed out after {timeout:?}"))]
    Timeout { timeout: Duration },
    /// The service received the batch and refused it. Never retried.
    #[snafu(display("batch rejected by service: {message}"))]
    Rejected { message: String },
}

impl SendError {
    /// Whether repeating the attempt can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// The loader's outbound edge: one logical call per batch.
///
/// Implementations submit every operation in the batch to the target
/// keyspace and report success or failure for the batch as a whole. Tests
/// substitute an in-memory service; embedding applications provide the real
/// transport.
#[async_trait]
pub trait BatchSender: Send + Sync + 'static {
    async fn send_batch(&self, keyspace: &Keyspace, batch: &Batch) -> Result<BatchAck, SendError>;
}

/// Bounded exponential delay between retry attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { next: initial, max }
    }

    /// Returns the delay to wait before the next attempt, doubling up to
    /// the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }
}

/// Drives sealed batches to their terminal outcome under the active-task
/// bound.
///
/// One semaphore permit is held per batch from before the first attempt
/// until the outcome is reported, so retries of the same batch never exceed
/// the bound.
#[derive(Clone)]
pub struct Dispatcher {
    sender: Arc<dyn BatchSender>,
    keyspace: Keyspace,
    gate: Arc<Semaphore>,
    retry: bool,
    attempt_timeout: Duration,
    backoff_initial: Duration,
    backoff_max: Duration,
    reporter: CompletionReporter,
}

impl Dispatcher {
    pub fn new(
        sender: Arc<dyn BatchSender>,
        keyspace: Keyspace,
        options: &LoaderOptions,
        reporter: CompletionReporter,
    ) -> Self {
        Self {
            sender,
            keyspace,
            gate: Arc::new(Semaphore::new(options.max_active_tasks)),
            retry: options.retry,
            attempt_timeout: options.attempt_timeout,
            backoff_initial: options.backoff_initial,
            backoff_max: options.backoff_max,
            reporter,
        }
    }

    /// Sends one batch, retrying transient failures per policy, and reports
    /// the terminal outcome exactly once.
    pub async fn dispatch(&self, batch: Batch) -> Result<()> {
        let permit = self
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LoaderError::Internal {
                message: "active task gate closed while dispatching".to_string(),
            })?;

        let ack = self.attempt_until_terminal(&batch).await;
        self.reporter.report(BatchOutcome {
            batch_id: batch.id,
            ack,
        });

        drop(permit);
        Ok(())
    }

    async fn attempt_until_terminal(&self, batch: &Batch) -> Option<BatchAck> {
        let mut backoff = Backoff::new(self.backoff_initial, self.backoff_max);
        let mut attempt = 1u32;

        loop {
            let result = tokio::time::timeout(
                self.attempt_timeout,
                self.sender.send_batch(&self.keyspace, batch),
            )
            .await;

            let error = match result {
                Ok(Ok(ack)) => {
                    debug!(
                        batch_id = batch.id,
                        operations = batch.len(),
                        attempt,
                        "batch loaded"
                    );
                    return Some(ack);
                }
                Ok(Err(error)) => error,
                Err(_) => SendError::Timeout {
                    timeout: self.attempt_timeout,
                },
            };

            if error.is_transient() && self.retry {
                let delay = backoff.next_delay();
                warn!(
                    batch_id = batch.id,
                    attempt,
                    error = %error,
                    delay = ?delay,
                    "batch submission failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            warn!(
                batch_id = batch.id,
                attempt,
                error = %error,
                "batch submission failed permanently"
            );
            return None;
        }
    }
}
