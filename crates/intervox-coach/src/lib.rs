//! Live coaching for the human interviewer.
//!
//! The [`CoachingScheduler`] watches the accumulating interview transcript,
//! picks out the latest interviewer → candidate exchange with the
//! [`ExchangeDetector`], and asks a [`SuggestionSource`] for a follow-up
//! question once the transcript has been quiet for a moment. Suggestions are
//! kept in a bounded [`SuggestionHistory`].

pub mod client;
pub mod config;
pub mod detector;
pub mod error;
pub mod history;
pub mod scheduler;

pub use client::{HttpSuggestionClient, SuggestionSource};
pub use config::CoachConfig;
pub use detector::ExchangeDetector;
pub use error::CoachError;
pub use history::{SuggestionHistory, DEFAULT_HISTORY_CAPACITY};
pub use scheduler::{CoachingScheduler, TranscriptUpdate};
