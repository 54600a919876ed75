//! Replays a recorded transcript through the coaching assistant.
//!
//! Usage: `intervox-replay <transcript.txt> [config.toml]`
//!
//! Each line is appended to the running transcript and submitted to the
//! coaching scheduler; whenever a new exchange completes the replay waits for
//! its suggestion. Each line counts as one minute of interview time. The
//! resulting suggestion history is printed as JSON.

use intervox_coach::{CoachingScheduler, ExchangeDetector, HttpSuggestionClient};
use intervox_room::load_config;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Upper bound on waiting for one suggestion before moving on.
const SUGGESTION_WAIT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let transcript_path = args
        .next()
        .ok_or("usage: intervox-replay <transcript.txt> [config.toml]")?;
    let config_path = args
        .next()
        .or_else(|| std::env::var("INTERVOX_CONFIG_PATH").ok())
        .filter(|p| !p.trim().is_empty());

    let config = load_config(config_path.as_deref().or(Some("intervox.toml")))?;

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let contents = tokio::fs::read_to_string(&transcript_path).await?;
    tracing::info!(
        path = %transcript_path,
        suggest_url = %config.coach.suggest_url,
        "replaying transcript"
    );

    let source = Arc::new(HttpSuggestionClient::new(config.coach.suggest_url.clone()));
    let coach = CoachingScheduler::spawn(&config.coach, source);
    let detector =
        ExchangeDetector::new(&config.coach.interviewer_label, &config.coach.candidate_label);
    let mut suggestions = coach.subscribe();

    let mut transcript = String::new();
    let mut last_exchange = None;
    for (minute, line) in contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
    {
        if !transcript.is_empty() {
            transcript.push('\n');
        }
        transcript.push_str(line);

        let exchange = detector.detect(&transcript);
        let completed = exchange.is_some() && exchange != last_exchange;
        coach.submit(
            transcript.clone(),
            Duration::from_secs(60 * minute as u64),
            None,
        );

        if completed {
            last_exchange = exchange;
            match tokio::time::timeout(SUGGESTION_WAIT, suggestions.recv()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "suggestion stream interrupted"),
                Err(_) => tracing::warn!(line = minute + 1, "no suggestion for exchange"),
            }
        }
    }

    coach.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&coach.suggestions())?);
    Ok(())
}
