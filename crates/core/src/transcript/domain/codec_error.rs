use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid caption timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("invalid segment duration: {0}")]
    InvalidDuration(f64),
    #[error("invalid time scale factor: {0}")]
    InvalidScale(f64),
    #[error("got {segments} caption segments but {durations} durations")]
    LengthMismatch { segments: usize, durations: usize },
    #[error("malformed recognition response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}
