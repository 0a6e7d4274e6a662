use crate::batch::{Batch, Operation};

/// Collects submitted operations into sealed batches of at most
/// `batch_size` items.
///
/// The accumulator is owned by the loader run loop, which serializes all
/// access to it; batch ids are assigned sequentially in submission order.
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: usize,
    next_batch_id: u64,
    open: Vec<Operation>,
}

impl BatchAccumulator {
    pub fn new(batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        Self {
            batch_size,
            next_batch_id: 0,
            open: Vec::with_capacity(batch_size),
        }
    }

    /// Appends one operation, returning the sealed batch once it is full.
    pub fn push(&mut self, operation: Operation) -> Option<Batch> {
        self.open.push(operation);

        if self.open.len() >= self.batch_size {
            self.seal()
        } else {
            None
        }
    }

    /// Seals the open batch even if partially filled. Sealing an empty
    /// buffer is a no-op.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.open.is_empty() {
            return None;
        }

        self.seal()
    }

    fn seal(&mut self) -> Option<Batch> {
        let operations =
            std::mem::replace(&mut self.open, Vec::with_capacity(self.batch_size));
        let id = self.next_batch_id;
        self.next_batch_id += 1;

        Some(Batch { id, operations })
    }
}
