use thiserror::Error;

/// Errors surfaced by frame sampling.
///
/// All of these are non-fatal: the UI reports them as a warning and returns
/// to an interactive state. None are retried automatically.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The path does not exist or the decoder cannot open it.
    #[error("cannot open video source: {0}")]
    SourceUnavailable(String),

    /// The video has zero decodable frames.
    #[error("video has no decodable frames")]
    EmptySource,

    /// A seek or read failed mid-stream (e.g. truncated file).
    #[error("decoding failed: {0}")]
    DecodeFailed(String),
}
