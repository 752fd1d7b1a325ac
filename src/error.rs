//! Cycle-level failures
//!
//! None of these are fatal to the process. A cycle that hits one stops and
//! the next scheduled cycle starts again from the unmoved watermark.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("session credential is missing or invalid")]
    SessionInvalid,

    #[error("feed request failed: {0}")]
    Transport(String),

    #[error("feed response has no result field")]
    MalformedResponse { raw: String },

    #[error("feed response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CollectError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CollectError::Decode(err.to_string())
        } else {
            CollectError::Transport(err.to_string())
        }
    }
}
