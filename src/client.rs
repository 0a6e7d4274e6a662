use tokio::sync::{mpsc, oneshot};

use crate::{
    batch::Operation,
    error::{LoaderError, Result},
    loader::Command,
};

/// Cheaply cloneable handle used to feed operations to a running loader.
///
/// Clones share one loader; any number of concurrent producers may call
/// [`add`](LoaderClient::add). Operations are assigned to batches in the
/// order they arrive on the submission queue, but batches are not guaranteed
/// to complete in that order.
#[derive(Clone)]
pub struct LoaderClient {
    pub(crate) tx: mpsc::Sender<Command>,
}

impl LoaderClient {
    /// Submits one operation. Waits only when the submission queue is full,
    /// never for network I/O.
    pub async fn add(&self, operation: Operation) -> Result<()> {
        self.tx
            .send(Command::Add { operation })
            .await
            .map_err(|_| LoaderError::Stopped)
    }

    /// Seals and dispatches the partially filled open batch, if any.
    pub async fn flush(&self) -> Result<()> {
        self.tx
            .send(Command::Flush)
            .await
            .map_err(|_| LoaderError::Stopped)
    }

    /// Blocks until every batch sealed so far, including ones backing off
    /// before a retry, has reached a terminal outcome and its callback has
    /// been invoked.
    ///
    /// Operations submitted while a drain is pending stay queued and are
    /// honored after it returns; the loader is reusable afterwards. Internal
    /// errors are surfaced here; per-batch failures are reported only
    /// through the completion callback.
    pub async fn wait_to_finish(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();

        self.tx
            .send(Command::WaitToFinish { reply })
            .await
            .map_err(|_| LoaderError::Stopped)?;

        rx.await.map_err(|_| LoaderError::Stopped)?
    }
}
