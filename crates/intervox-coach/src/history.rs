use intervox_types::CoachSuggestion;
use std::collections::VecDeque;

/// Default number of suggestions retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Append-ordered suggestion history bounded by `capacity`.
#[derive(Debug, Clone)]
pub struct SuggestionHistory {
    capacity: usize,
    entries: VecDeque<CoachSuggestion>,
}

impl Default for SuggestionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl SuggestionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends `suggestion`, evicting from the front past capacity.
    pub fn push(&mut self, suggestion: CoachSuggestion) {
        self.entries.push_back(suggestion);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Removes the suggestion at `index`, oldest first.
    pub fn dismiss(&mut self, index: usize) -> Option<CoachSuggestion> {
        self.entries.remove(index)
    }

    pub fn entries(&self) -> Vec<CoachSuggestion> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&CoachSuggestion> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(n: usize) -> CoachSuggestion {
        CoachSuggestion {
            suggested_next_question: format!("Q{n}"),
            reasoning: String::new(),
            answer_quality: Default::default(),
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut history = SuggestionHistory::default();
        for n in 1..=51 {
            history.push(suggestion(n));
        }
        assert_eq!(history.len(), 50);
        let entries = history.entries();
        assert_eq!(entries[0].suggested_next_question, "Q2");
        assert_eq!(
            history.latest().map(|s| s.suggested_next_question.as_str()),
            Some("Q51")
        );
        assert!(entries.iter().all(|s| s.suggested_next_question != "Q1"));
    }

    #[test]
    fn dismiss_by_position() {
        let mut history = SuggestionHistory::new(3);
        history.push(suggestion(1));
        history.push(suggestion(2));
        history.push(suggestion(3));

        let removed = history.dismiss(1).expect("present");
        assert_eq!(removed.suggested_next_question, "Q2");
        assert_eq!(history.len(), 2);
        assert!(history.dismiss(5).is_none());
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let mut history = SuggestionHistory::new(0);
        history.push(suggestion(1));
        history.push(suggestion(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), 1);
    }
}
