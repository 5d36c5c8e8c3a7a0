//! History
//!
//! A bounded in-memory ring mirrored to `$HISTFILE`, appended after every
//! accepted command so concurrent sessions interleave. Entries beginning
//! with a space and consecutive duplicates are not recorded. Search comes
//! in substring, prefix, and fuzzy flavours.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::editor::fuzzy;

pub const DEFAULT_CAPACITY: usize = 50_000;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub text: String,
    pub timestamp: DateTime<Local>,
    pub status: Option<i32>,
}

#[derive(Debug)]
pub struct History {
    entries: Vec<HistoryEntry>,
    capacity: usize,
    file: Option<PathBuf>,
}

impl Default for History {
    fn default() -> Self {
        History {
            entries: Vec::new(),
            capacity: DEFAULT_CAPACITY,
            file: None,
        }
    }
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        History {
            entries: Vec::new(),
            capacity: capacity.max(1),
            file: None,
        }
    }

    /// Attach the history file and load what it already holds.
    pub fn attach_file(&mut self, path: PathBuf) {
        if let Ok(contents) = std::fs::read_to_string(&path) {
            for line in contents.lines() {
                if line.is_empty() {
                    continue;
                }
                self.push_memory(line.to_string());
            }
        }
        self.file = Some(path);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Record a submitted command. Space-prefixed input and a repeat of
    /// the previous entry are skipped; everything else is appended to the
    /// file immediately.
    pub fn push(&mut self, text: &str) {
        if text.trim().is_empty() || text.starts_with(' ') {
            return;
        }
        if self.entries.last().map(|e| e.text.as_str()) == Some(text) {
            return;
        }
        self.push_memory(text.to_string());
        if let Some(path) = &self.file {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(file, "{}", text);
            }
        }
    }

    fn push_memory(&mut self, text: String) {
        if self.entries.last().map(|e| e.text.as_str()) == Some(text.as_str()) {
            return;
        }
        self.entries.push(HistoryEntry {
            text,
            timestamp: Local::now(),
            status: None,
        });
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
    }

    /// Attach the exit status to the most recent entry.
    pub fn record_status(&mut self, status: i32) {
        if let Some(last) = self.entries.last_mut() {
            if last.status.is_none() {
                last.status = Some(status);
            }
        }
    }

    /// Newest index strictly before `before` whose text contains `query`.
    pub fn search_substring(&self, query: &str, before: Option<usize>) -> Option<usize> {
        let end = before.unwrap_or(self.entries.len());
        self.entries[..end]
            .iter()
            .rposition(|e| e.text.contains(query))
    }

    /// Newest index strictly before `before` whose text starts with
    /// `prefix` (anchored up/down navigation).
    pub fn search_prefix(&self, prefix: &str, before: Option<usize>) -> Option<usize> {
        let end = before.unwrap_or(self.entries.len());
        self.entries[..end]
            .iter()
            .rposition(|e| e.text.starts_with(prefix))
    }

    /// Fuzzy matches sorted by descending score.
    pub fn search_fuzzy(&self, query: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let unique: Vec<&str> = self
            .entries
            .iter()
            .rev()
            .map(|e| e.text.as_str())
            .filter(|t| seen.insert(*t))
            .collect();
        fuzzy::rank(query, unique.into_iter())
    }

    // ------------------------------------------------------------------
    // The `history` builtin
    // ------------------------------------------------------------------

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Delete by 1-based list position.
    pub fn delete(&mut self, position: usize) -> bool {
        if position == 0 || position > self.entries.len() {
            return false;
        }
        self.entries.remove(position - 1);
        true
    }

    /// Rewrite the history file from memory (`history -w`).
    pub fn write_file(&self) {
        let Some(path) = &self.file else {
            return;
        };
        if let Ok(mut file) = std::fs::File::create(path) {
            for entry in &self.entries {
                let _ = writeln!(file, "{}", entry.text);
            }
        }
    }

    /// Drop memory and reload from the file (`history -r`).
    pub fn reload_file(&mut self) {
        let Some(path) = self.file.clone() else {
            return;
        };
        self.entries.clear();
        self.attach_file(path);
    }

    /// (position, text) pairs for listing, optionally only the last `n`.
    pub fn numbered(&self, last: Option<usize>) -> Vec<(usize, String)> {
        let start = match last {
            Some(n) => self.entries.len().saturating_sub(n),
            None => 0,
        };
        self.entries[start..]
            .iter()
            .enumerate()
            .map(|(i, e)| (start + i + 1, e.text.clone()))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_skips_duplicates_and_space_prefixed() {
        let mut history = History::default();
        history.push("ls -la");
        history.push("ls -la");
        history.push(" secret");
        history.push("echo hi");
        assert_eq!(history.len(), 2);
        assert_eq!(history.get(0).unwrap().text, "ls -la");
        assert_eq!(history.get(1).unwrap().text, "echo hi");
    }

    #[test]
    fn capacity_is_bounded() {
        let mut history = History::with_capacity(3);
        for i in 0..10 {
            history.push(&format!("cmd {}", i));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.get(0).unwrap().text, "cmd 7");
    }

    #[test]
    fn substring_search_walks_older() {
        let mut history = History::default();
        history.push("ls -la");
        history.push("echo hi");
        history.push("ls /tmp");
        let first = history.search_substring("ls", None).unwrap();
        assert_eq!(history.get(first).unwrap().text, "ls /tmp");
        let older = history.search_substring("ls", Some(first)).unwrap();
        assert_eq!(history.get(older).unwrap().text, "ls -la");
        assert!(history.search_substring("ls", Some(older)).is_none());
    }

    #[test]
    fn prefix_search() {
        let mut history = History::default();
        history.push("git status");
        history.push("grep foo");
        let hit = history.search_prefix("git", None).unwrap();
        assert_eq!(history.get(hit).unwrap().text, "git status");
        assert!(history.search_prefix("xyz", None).is_none());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");

        let mut history = History::default();
        history.attach_file(path.clone());
        history.push("first");
        history.push("second");

        let mut reloaded = History::default();
        reloaded.attach_file(path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(0).unwrap().text, "first");
    }

    #[test]
    fn delete_and_numbered() {
        let mut history = History::default();
        history.push("a");
        history.push("b");
        history.push("c");
        assert!(history.delete(2));
        assert!(!history.delete(9));
        let listed = history.numbered(None);
        assert_eq!(
            listed,
            vec![(1, "a".to_string()), (2, "c".to_string())]
        );
        let tail = history.numbered(Some(1));
        assert_eq!(tail, vec![(2, "c".to_string())]);
    }

    #[test]
    fn fuzzy_search_orders_by_score() {
        let mut history = History::default();
        history.push("cargo build");
        history.push("cat file");
        history.push("cargo test");
        let results = history.search_fuzzy("cargo");
        assert_eq!(results.len(), 2);
        assert!(results[0].starts_with("cargo"));
    }
}
