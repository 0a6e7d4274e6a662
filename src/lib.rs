//! Batching bulk-load client for a remote graph ingestion service.
//!
//! Callers submit write operations one at a time through a [`LoaderClient`];
//! the background [`Loader`] groups them into fixed-size batches and sends
//! each batch to the service through a swappable [`BatchSender`], keeping at
//! most a configured number of batches in flight. Terminal outcomes are
//! delivered exactly once per batch through an optional completion callback.

pub mod batch;
pub mod batcher;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod report;

pub use batch::{Batch, BatchAck, BatchOutcome, Keyspace, Operation};
pub use client::LoaderClient;
pub use dispatch::{Backoff, BatchSender, SendError};
pub use error::{LoaderError, Result};
pub use loader::{Loader, LoaderOptions, run_background_loader};
pub use report::{CompletionCallback, CompletionReporter};
