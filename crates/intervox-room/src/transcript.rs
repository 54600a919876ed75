use intervox_types::TranscriptEntry;

/// The merged interview transcript.
///
/// Entries from the video call and from the voice agent are appended in the
/// order they arrive; their timestamps are advisory.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry`. Blank utterances are skipped.
    pub fn push(&mut self, entry: TranscriptEntry) -> bool {
        if entry.content.trim().is_empty() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// One `"<Label>: <content>"` line per entry.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(TranscriptEntry::to_line).collect()
    }

    pub fn render(&self) -> String {
        self.lines().join("\n")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intervox_types::Role;

    #[test]
    fn renders_labelled_lines() {
        let mut log = TranscriptLog::new();
        log.push(TranscriptEntry::new(Role::Interviewer, "Why this team?"));
        log.push(TranscriptEntry::new(Role::Candidate, "The problems.\nAnd the people."));
        assert!(!log.push(TranscriptEntry::new(Role::Candidate, "   ")));

        assert_eq!(log.len(), 2);
        assert_eq!(
            log.render(),
            "Interviewer: Why this team?\nCandidate: The problems. And the people."
        );
    }
}
