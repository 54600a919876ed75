//! Finds the most recent interviewer → candidate exchange in a transcript.

use intervox_types::Role;

/// Locates the last complete exchange in a line-oriented transcript.
///
/// Lines are matched by their speaker tag, the text before the first `:`
/// (or the whole line when there is none), which must contain the role label
/// case-insensitively. Scanning backward, the first candidate line ends the
/// exchange and the nearest interviewer line before it starts it.
#[derive(Debug, Clone)]
pub struct ExchangeDetector {
    interviewer: String,
    candidate: String,
}

impl Default for ExchangeDetector {
    fn default() -> Self {
        Self::new(Role::Interviewer.label(), Role::Candidate.label())
    }
}

impl ExchangeDetector {
    pub fn new(interviewer_label: &str, candidate_label: &str) -> Self {
        Self {
            interviewer: interviewer_label.to_lowercase(),
            candidate: candidate_label.to_lowercase(),
        }
    }

    /// Returns the exchange in `transcript`, lines joined by `\n`.
    pub fn detect(&self, transcript: &str) -> Option<String> {
        let lines: Vec<&str> = transcript
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        self.detect_lines(&lines)
    }

    pub fn detect_lines(&self, lines: &[&str]) -> Option<String> {
        if lines.len() < 2 {
            return None;
        }
        let end = lines
            .iter()
            .rposition(|line| tag_matches(line, &self.candidate))?;
        let start = lines[..end]
            .iter()
            .rposition(|line| tag_matches(line, &self.interviewer))?;
        Some(lines[start..=end].join("\n"))
    }
}

fn tag_matches(line: &str, label: &str) -> bool {
    let tag = line.split_once(':').map_or(line, |(tag, _)| tag);
    tag.to_lowercase().contains(label)
}
