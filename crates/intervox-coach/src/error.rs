use thiserror::Error;

/// Failures retrieving a coaching suggestion.
///
/// None of these is surfaced to the interview; the scheduler logs and drops
/// them.
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("suggestion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("suggestion endpoint returned status {0}")]
    Status(u16),

    #[error("invalid suggestion response: {0}")]
    Decode(String),
}
