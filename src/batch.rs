use std::fmt;

/// Name of the keyspace every batch from one loader instance is written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyspace(String);

impl Keyspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One caller-submitted write statement.
///
/// The loader never interprets the content; it is batched and transmitted
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation(String);

impl Operation {
    pub fn new(statement: impl Into<String>) -> Self {
        Self(statement.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered, immutable group of operations sent to the service together.
///
/// `id` is the batch's position in submission order. Batches are sealed by
/// the accumulator and consumed exactly once by the dispatcher.
#[derive(Debug)]
pub struct Batch {
    pub id: u64,
    pub operations: Vec<Operation>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Acknowledgement payload returned by the service for a loaded batch.
#[derive(Debug, Clone)]
pub struct BatchAck {
    pub operations_loaded: usize,
}

/// Terminal outcome of one batch, delivered to the completion callback.
///
/// `ack` is `None` when the batch reached final failure.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch_id: u64,
    pub ack: Option<BatchAck>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.ack.is_some()
    }
}
