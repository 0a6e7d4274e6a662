use std::{sync::Arc, time::Duration};

use futures_util::{StreamExt, stream::FuturesUnordered};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    batch::{Batch, BatchOutcome, Keyspace, Operation},
    batcher::BatchAccumulator,
    client::LoaderClient,
    dispatch::{BatchSender, Dispatcher},
    error::Result,
    report::{CompletionCallback, CompletionReporter},
};

const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_MAX_ACTIVE_TASKS: usize = 25;
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_millis(100);
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(5);
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Tuning knobs for one loader instance.
#[derive(Clone)]
pub struct LoaderOptions {
    /// Number of operations per sealed batch.
    pub batch_size: usize,
    /// Maximum number of batches awaiting a terminal outcome at once.
    pub max_active_tasks: usize,
    /// Whether transient submission failures are retried until the service
    /// responds. Rejected batches are never retried regardless.
    pub retry: bool,
    /// Per-attempt bound on the service round-trip; an elapsed timeout is
    /// treated as a transient failure.
    pub attempt_timeout: Duration,
    /// First retry delay; doubles per attempt up to `backoff_max`.
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    /// Depth of the submission queue between client handles and the loader.
    pub queue_capacity: usize,
    pub(crate) on_complete: Option<CompletionCallback>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_active_tasks: DEFAULT_MAX_ACTIVE_TASKS,
            retry: false,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            backoff_initial: DEFAULT_BACKOFF_INITIAL,
            backoff_max: DEFAULT_BACKOFF_MAX,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            on_complete: None,
        }
    }
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_active_tasks(mut self, max_active_tasks: usize) -> Self {
        assert!(max_active_tasks > 0, "active task limit must be positive");
        self.max_active_tasks = max_active_tasks;
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        assert!(queue_capacity > 0, "queue capacity must be positive");
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the callback invoked exactly once per batch with its terminal
    /// outcome.
    pub fn with_on_complete(
        mut self,
        callback: impl Fn(BatchOutcome) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }
}

pub(crate) enum Command {
    Add { operation: Operation },
    Flush,
    WaitToFinish { reply: oneshot::Sender<Result<()>> },
}

/// The loader core: accumulates operations into batches and drives their
/// dispatch under the active-task bound.
///
/// Constructed once, then moved into a background task via
/// [`run_background_loader`]; callers interact through [`LoaderClient`]
/// handles obtained from [`Loader::client`].
pub struct Loader {
    tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
    dispatcher: Dispatcher,
    accumulator: BatchAccumulator,
}

pub async fn run_background_loader(loader: Loader, ct: CancellationToken) -> Result<()> {
    loader.run(ct).await
}

impl Loader {
    pub fn new(keyspace: Keyspace, sender: Arc<dyn BatchSender>, options: LoaderOptions) -> Self {
        let (tx, rx) = mpsc::channel(options.queue_capacity);
        let reporter = CompletionReporter::new(options.on_complete.clone());
        let dispatcher = Dispatcher::new(sender, keyspace, &options, reporter);
        let accumulator = BatchAccumulator::new(options.batch_size);

        Self {
            tx,
            rx,
            dispatcher,
            accumulator,
        }
    }

    pub fn client(&self) -> LoaderClient {
        LoaderClient {
            tx: self.tx.clone(),
        }
    }

    async fn run(self, ct: CancellationToken) -> Result<()> {
        let Loader {
            tx,
            mut rx,
            dispatcher,
            mut accumulator,
        } = self;
        // Drop our sender half so the loop observes every client handle
        // going away.
        drop(tx);

        let mut dispatch_tasks = FuturesUnordered::new();
        let mut waiters: Vec<oneshot::Sender<Result<()>>> = Vec::new();
        let mut closed = false;

        loop {
            // A drain completes once no batch is awaiting a terminal outcome.
            if dispatch_tasks.is_empty() && !waiters.is_empty() {
                for waiter in waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
            }

            if closed && dispatch_tasks.is_empty() {
                break;
            }

            tokio::select! {
                _ = ct.cancelled() => {
                    break;
                }
                command = rx.recv(), if waiters.is_empty() && !closed => {
                    match command {
                        None => {
                            // Every client handle is gone: seal what is left,
                            // then finish outstanding work and exit.
                            closed = true;
                            if let Some(batch) = accumulator.flush() {
                                debug!(batch_id = batch.id, operations = batch.len(), "batch sealed");
                                dispatch_tasks.push(dispatch_batch(dispatcher.clone(), batch));
                            }
                        }
                        Some(Command::Add { operation }) => {
                            if let Some(batch) = accumulator.push(operation) {
                                debug!(batch_id = batch.id, operations = batch.len(), "batch sealed");
                                dispatch_tasks.push(dispatch_batch(dispatcher.clone(), batch));
                            }
                        }
                        Some(Command::Flush) => {
                            if let Some(batch) = accumulator.flush() {
                                debug!(batch_id = batch.id, operations = batch.len(), "batch sealed");
                                dispatch_tasks.push(dispatch_batch(dispatcher.clone(), batch));
                            }
                        }
                        Some(Command::WaitToFinish { reply }) => {
                            if let Some(batch) = accumulator.flush() {
                                debug!(batch_id = batch.id, operations = batch.len(), "batch sealed");
                                dispatch_tasks.push(dispatch_batch(dispatcher.clone(), batch));
                            }
                            waiters.push(reply);
                        }
                    }
                }
                completed = dispatch_tasks.next(), if !dispatch_tasks.is_empty() => {
                    match completed {
                        None | Some(Ok(())) => {}
                        Some(Err(error)) => {
                            // Invariant violation inside the dispatch
                            // pipeline: fail pending drains loudly instead
                            // of hanging them.
                            for waiter in waiters.drain(..) {
                                let _ = waiter.send(Err(error.clone()));
                            }
                            return Err(error);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

async fn dispatch_batch(dispatcher: Dispatcher, batch: Batch) -> Result<()> {
    dispatcher.dispatch(batch).await
}
