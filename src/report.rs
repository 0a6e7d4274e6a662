use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tracing::error;

use crate::batch::BatchOutcome;

/// Caller-supplied consumer of terminal batch outcomes.
///
/// Invoked exactly once per batch, from the loader task. The outcome's `ack`
/// is `None` when the batch reached final failure.
pub type CompletionCallback = Arc<dyn Fn(BatchOutcome) + Send + Sync>;

/// Invokes the completion callback once per batch, isolating the dispatch
/// pipeline from callback panics.
#[derive(Clone, Default)]
pub struct CompletionReporter {
    callback: Option<CompletionCallback>,
}

impl CompletionReporter {
    pub fn new(callback: Option<CompletionCallback>) -> Self {
        Self { callback }
    }

    /// Reports one terminal outcome. A panicking callback is caught and
    /// logged; it never propagates, aborts sibling batches, or blocks drain.
    pub fn report(&self, outcome: BatchOutcome) {
        let Some(callback) = &self.callback else {
            return;
        };

        let batch_id = outcome.batch_id;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(outcome))) {
            error!(batch_id, panic = panic_message(&*panic), "error in callback");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
