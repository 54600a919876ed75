//! The client side of an Intervox interview.
//!
//! An [`InterviewRoom`] ties the human video call, the AI candidate's voice
//! session and the coaching assistant together: video transcription and
//! voice-agent transcripts are merged into one [`TranscriptLog`], a real
//! participant joining the call pre-empts the AI candidate, and every
//! transcript change feeds the coaching scheduler.

pub mod config;
pub mod room;
pub mod transcript;

pub use config::{load_config, ClientConfig, ConfigError, LoggingConfig};
pub use room::{InterviewRoom, VideoEvent};
pub use transcript::TranscriptLog;
