//! Reverse Incremental Search
//!
//! Ctrl+R state: a growing query, the index of the current match, and the
//! prompt line `(reverse-i-search)\`query': match`. Repeating Ctrl+R steps
//! to the next-older match; Backspace shortens the query and rescans from
//! the newest entry.

use crate::editor::history::History;

#[derive(Debug, Default)]
pub struct ReverseSearch {
    pub query: String,
    /// Index of the current match in the history, newest-first scan
    pub match_index: Option<usize>,
}

impl ReverseSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matched_text<'a>(&self, history: &'a History) -> Option<&'a str> {
        self.match_index
            .and_then(|i| history.get(i))
            .map(|e| e.text.as_str())
    }

    /// Extend the query with a typed character.
    pub fn extend(&mut self, history: &History, c: char) {
        self.query.push(c);
        // The current match may still satisfy the longer query.
        let start = self.match_index.map(|i| i + 1);
        self.match_index = history.search_substring(&self.query, start);
    }

    /// Step to the next-older match (another Ctrl+R).
    pub fn step_older(&mut self, history: &History) {
        let from = match self.match_index {
            Some(i) => Some(i),
            None => None,
        };
        if let Some(found) = history.search_substring(&self.query, from) {
            self.match_index = Some(found);
        }
    }

    /// Shorten the query (Backspace); rescan from the newest entry.
    pub fn shorten(&mut self, history: &History) {
        self.query.pop();
        self.match_index = if self.query.is_empty() {
            None
        } else {
            history.search_substring(&self.query, None)
        };
    }

    /// The prompt line shown while searching.
    pub fn display(&self, history: &History) -> String {
        format!(
            "(reverse-i-search)`{}': {}",
            self.query,
            self.matched_text(history).unwrap_or("")
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn history_with(entries: &[&str]) -> History {
        let mut history = History::default();
        for e in entries {
            history.push(e);
        }
        history
    }

    #[test]
    fn extend_finds_newest_match() {
        let history = history_with(&["ls -la", "echo hi", "ls /tmp"]);
        let mut search = ReverseSearch::new();
        search.extend(&history, 'l');
        assert_eq!(search.matched_text(&history), Some("ls /tmp"));
        search.extend(&history, 's');
        assert_eq!(search.matched_text(&history), Some("ls /tmp"));
    }

    #[test]
    fn repeat_steps_older() {
        let history = history_with(&["ls -la", "echo hi", "ls /tmp"]);
        let mut search = ReverseSearch::new();
        search.extend(&history, 'l');
        search.step_older(&history);
        assert_eq!(search.matched_text(&history), Some("ls -la"));
        // No older match: stays put.
        search.step_older(&history);
        assert_eq!(search.matched_text(&history), Some("ls -la"));
    }

    #[test]
    fn shorten_rescans_from_newest() {
        let history = history_with(&["ls -la", "lsof"]);
        let mut search = ReverseSearch::new();
        search.extend(&history, 'l');
        search.extend(&history, 's');
        search.extend(&history, 'o');
        assert_eq!(search.matched_text(&history), Some("lsof"));
        search.step_older(&history);
        search.shorten(&history);
        assert_eq!(search.matched_text(&history), Some("lsof"));
        search.shorten(&history);
        search.shorten(&history);
        assert_eq!(search.matched_text(&history), None);
        assert!(search.query.is_empty());
    }

    #[test]
    fn display_format() {
        let history = history_with(&["ls -la"]);
        let mut search = ReverseSearch::new();
        search.extend(&history, 'l');
        assert_eq!(search.display(&history), "(reverse-i-search)`l': ls -la");
    }
}
