use snafu::Snafu;

/// Loader lifecycle errors surfaced to callers of the client handle.
///
/// Per-batch failures are never surfaced here; they are observable only
/// through the completion callback.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum LoaderError {
    /// The loader task is no longer running.
    #[snafu(display("loader has stopped"))]
    Stopped,
    /// A programming defect was detected, e.g. permit accounting failure.
    #[snafu(display("internal loader error: {message}"))]
    Internal { message: String },
}

pub type Result<T, E = LoaderError> = std::result::Result<T, E>;
