#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bulkloader::{
    Batch, BatchAck, BatchSender, Keyspace, Loader, LoaderClient, LoaderOptions, Operation,
    SendError, run_background_loader,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// In-memory stand-in for the remote ingestion service.
///
/// Availability and rejection are switchable at runtime; every accepted
/// batch is recorded along with the high-water mark of concurrent sends.
pub struct FakeService {
    available: AtomicBool,
    reject_all: AtomicBool,
    send_delay: Duration,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    accepted: Mutex<Vec<(u64, Vec<String>)>>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Self::with_send_delay(Duration::from_millis(10))
    }

    pub fn with_send_delay(send_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            available: AtomicBool::new(true),
            reject_all: AtomicBool::new(false),
            send_delay,
            attempts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            accepted: Mutex::new(Vec::new()),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_reject_all(&self, reject_all: bool) {
        self.reject_all.store(reject_all, Ordering::SeqCst);
    }

    /// Total send attempts observed, including refused and retried ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn accepted_batch_sizes(&self) -> Vec<usize> {
        self.accepted
            .lock()
            .expect("accepted lock")
            .iter()
            .map(|(_, operations)| operations.len())
            .collect()
    }

    pub fn accepted_batch_ids(&self) -> Vec<u64> {
        self.accepted
            .lock()
            .expect("accepted lock")
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn accepted_operations(&self) -> usize {
        self.accepted_batch_sizes().iter().sum()
    }
}

struct InFlightGuard<'a>(&'a FakeService);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BatchSender for FakeService {
    async fn send_batch(&self, _keyspace: &Keyspace, batch: &Batch) -> Result<BatchAck, SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if !self.available.load(Ordering::SeqCst) {
            return Err(SendError::Unavailable {
                message: "connection refused".to_string(),
            });
        }

        if self.reject_all.load(Ordering::SeqCst) {
            return Err(SendError::Rejected {
                message: "malformed batch".to_string(),
            });
        }

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        let guard = InFlightGuard(self);

        tokio::time::sleep(self.send_delay).await;
        drop(guard);

        self.accepted.lock().expect("accepted lock").push((
            batch.id,
            batch
                .operations
                .iter()
                .map(|operation| operation.as_str().to_string())
                .collect(),
        ));

        Ok(BatchAck {
            operations_loaded: batch.len(),
        })
    }
}

pub fn create_loader(
    service: Arc<FakeService>,
    options: LoaderOptions,
) -> (JoinHandle<()>, LoaderClient, CancellationToken) {
    let loader = Loader::new(Keyspace::new("test_keyspace"), service, options);
    let client = loader.client();
    let ct = CancellationToken::new();
    let task = tokio::spawn({
        let ct = ct.clone();
        async move {
            run_background_loader(loader, ct).await.expect("loader run");
        }
    });

    (task, client, ct)
}

pub fn operation(i: usize) -> Operation {
    Operation::new(format!("insert $x{i} isa name_tag;"))
}
