//! Autosuggestions
//!
//! After each keystroke the editor asks for the most recent history entry
//! extending the current line; the remainder renders as dim text past the
//! cursor. Advisory only: submission never includes it unless accepted.

use crate::editor::history::History;

/// The text that would complete the current line, if any.
pub fn suggest(history: &History, line: &str) -> Option<String> {
    if line.is_empty() {
        return None;
    }
    let index = history.search_prefix(line, None)?;
    let entry = &history.get(index)?.text;
    if entry.len() > line.len() {
        Some(entry[line.len()..].to_string())
    } else {
        None
    }
}

/// The first word (plus trailing separator run) of a suggestion, for
/// Alt+F partial acceptance.
pub fn first_word(suggestion: &str) -> String {
    let mut out = String::new();
    let mut seen_word = false;
    for c in suggestion.chars() {
        let is_word = c.is_alphanumeric() || c == '_' || c == '-';
        if is_word {
            seen_word = true;
        } else if seen_word {
            break;
        }
        out.push(c);
    }
    out
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
    fn suggests_most_recent_prefix_match() {
        let history = history_with(&["git status", "git push origin", "ls"]);
        assert_eq!(suggest(&history, "git "), Some("push origin".to_string()));
        assert_eq!(suggest(&history, "git s"), Some("tatus".to_string()));
        assert_eq!(suggest(&history, "xyz"), None);
        assert_eq!(suggest(&history, ""), None);
    }

    #[test]
    fn exact_match_suggests_nothing() {
        let history = history_with(&["ls"]);
        assert_eq!(suggest(&history, "ls"), None);
    }

    #[test]
    fn word_granularity() {
        assert_eq!(first_word("push origin"), "push ");
        assert_eq!(first_word(" origin"), " origin");
        assert_eq!(first_word("one"), "one");
    }
}
