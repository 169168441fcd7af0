//! Error types for the session layer.

/// Errors returned by [`SessionEndpoint`](crate::SessionEndpoint) and
/// [`HeartbeatService`](crate::HeartbeatService).
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The outbound queue is full. The frame was not queued and will not
    /// be retried.
    #[error("outbound queue full")]
    Backpressure,

    /// The endpoint has shut down and no longer accepts frames.
    #[error("endpoint closed")]
    Closed,

    /// The endpoint could not be built from the given parts.
    #[error("endpoint initialization failed: {0}")]
    Initialization(String),

    /// `run` was called a second time.
    #[error("endpoint is already running")]
    AlreadyRunning,

    /// One of the endpoint's loops panicked.
    #[error("endpoint loop failed: {0}")]
    LoopFailed(String),
}
