use groundwatch_core::error::CoreError;

/// Errors returned to callers feeding the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The payload failed validation and was not admitted.
    #[error(transparent)]
    Rejected(#[from] CoreError),

    /// The tracker task is no longer running.
    #[error("Sighting tracker is not running")]
    TrackerStopped,
}
