//! Line Editor
//!
//! Single-threaded raw-mode REPL input. Given a prompt and the shell
//! state, [`LineEditor::read_line`] returns one logical command — possibly
//! spanning several PS2 continuation lines, as decided by the parser's
//! `is_incomplete` — or reports EOF / interrupt. Emacs-style keymap,
//! history navigation and reverse search, inline autosuggestions, and tab
//! completion with a selection menu.

pub mod buffer;
pub mod complete;
pub mod fuzzy;
pub mod history;
pub mod key;
pub mod render;
pub mod search;
pub mod suggest;
pub mod term;

use crate::editor::buffer::LineBuffer;
use crate::editor::complete::{CompletionEngine, CompletionResult};
use crate::editor::key::Key;
use crate::editor::render::Renderer;
use crate::editor::search::ReverseSearch;
use crate::exec::signal;
use crate::state::ShellState;

/// What a read attempt produced.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete logical command
    Line(String),
    /// Ctrl+D on an empty line
    Eof,
    /// Ctrl+C: line abandoned
    Interrupted,
}

#[derive(Debug)]
enum Mode {
    Insert,
    Search(ReverseSearch),
    Menu { result: CompletionResult, selected: usize },
}

/// Up/Down navigation state: where we are and what was typed before.
struct HistoryNav {
    index: usize,
    anchor: String,
    stash: String,
}

pub struct LineEditor {
    completion: CompletionEngine,
    renderer: Renderer,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    pub fn new() -> Self {
        LineEditor {
            completion: CompletionEngine::new(),
            renderer: Renderer::new(),
        }
    }

    /// Read one logical command. The terminal is in raw mode for the
    /// duration; PS2 continuation lines accumulate until the parser is
    /// satisfied.
    pub fn read_line(&mut self, state: &mut ShellState, prompt: &str) -> ReadOutcome {
        let _raw = match term::RawModeGuard::new() {
            Ok(guard) => guard,
            Err(_) => return read_line_dumb(),
        };

        let mut buffer = LineBuffer::new();
        let mut pending = String::new();
        let mut mode = Mode::Insert;
        let mut nav: Option<HistoryNav> = None;
        let mut last_tab = false;
        self.renderer.reset();

        loop {
            if signal::take_sigwinch() {
                let (cols, rows) = term::window_size();
                let _ = state.env.set("COLUMNS", cols.to_string());
                let _ = state.env.set("LINES", rows.to_string());
            }
            let (cols, _) = term::window_size();
            let ps2 = state.env.value("PS2").unwrap_or("> ").to_string();
            let shown_prompt = if pending.is_empty() { prompt } else { &ps2 };

            match &mode {
                Mode::Insert => {
                    let text = buffer.text();
                    let hint = if buffer.cursor() == buffer.len() {
                        suggest::suggest(&state.history, &text)
                    } else {
                        None
                    };
                    self.renderer.draw(
                        shown_prompt,
                        &text,
                        buffer.cursor(),
                        hint.as_deref(),
                        None,
                        cols as usize,
                    );
                }
                Mode::Search(search) => {
                    let line = search.display(&state.history);
                    self.renderer
                        .draw(&line, "", 0, None, None, cols as usize);
                }
                Mode::Menu { result, selected } => {
                    let text = buffer.text();
                    self.renderer.draw(
                        shown_prompt,
                        &text,
                        buffer.cursor(),
                        None,
                        Some((&result.candidates, *selected)),
                        cols as usize,
                    );
                }
            }

            let key = key::read_key();

            match &mut mode {
                Mode::Search(search) => {
                    match key {
                        Key::Char(c) => search.extend(&state.history, c),
                        Key::Ctrl('r') => search.step_older(&state.history),
                        Key::Backspace => search.shorten(&state.history),
                        Key::Enter | Key::Esc => {
                            if let Some(text) = search.matched_text(&state.history) {
                                buffer.set_text(&text.to_string());
                            }
                            mode = Mode::Insert;
                        }
                        Key::Ctrl('g') | Key::Ctrl('c') => {
                            mode = Mode::Insert;
                        }
                        _ => {}
                    }
                    continue;
                }
                Mode::Menu { result, selected } => {
                    let count = result.candidates.len();
                    match key {
                        Key::Tab | Key::Down | Key::Right => {
                            *selected = (*selected + 1) % count.max(1);
                            continue;
                        }
                        Key::ShiftTab | Key::Up | Key::Left => {
                            *selected = (*selected + count.saturating_sub(1)) % count.max(1);
                            continue;
                        }
                        Key::Enter => {
                            let candidate = result.candidates[*selected].clone();
                            let start = result.word_start;
                            accept_candidate(&mut buffer, start, &candidate);
                            mode = Mode::Insert;
                            last_tab = false;
                            continue;
                        }
                        Key::Esc | Key::Ctrl('g') | Key::Ctrl('c') => {
                            mode = Mode::Insert;
                            last_tab = false;
                            continue;
                        }
                        _ => {
                            // Any other key leaves the menu and is handled
                            // as ordinary input below.
                            mode = Mode::Insert;
                            last_tab = false;
                        }
                    }
                }
                Mode::Insert => {}
            }

            match key {
                Key::Char(c) => {
                    buffer.insert(c);
                    nav = None;
                    last_tab = false;
                }
                Key::Enter => {
                    let full = format!("{}{}", pending, buffer.text());
                    if crate::parser::is_incomplete(&full) {
                        pending.push_str(&buffer.text());
                        pending.push('\n');
                        buffer.clear();
                        self.renderer.finish_line();
                        continue;
                    }
                    self.renderer.finish_line();
                    return ReadOutcome::Line(full);
                }
                Key::Ctrl('c') => {
                    buffer.discard_kill_ring();
                    self.renderer.finish_line();
                    return ReadOutcome::Interrupted;
                }
                Key::Ctrl('d') => {
                    if buffer.is_empty() && pending.is_empty() {
                        self.renderer.finish_line();
                        return ReadOutcome::Eof;
                    }
                    buffer.delete_at();
                }
                Key::Backspace | Key::Ctrl('h') => {
                    buffer.delete_left();
                    nav = None;
                    last_tab = false;
                }
                Key::Delete => {
                    buffer.delete_at();
                    last_tab = false;
                }
                Key::Ctrl('a') | Key::Home => buffer.move_home(),
                Key::Ctrl('e') | Key::End => {
                    if !accept_suggestion(state, &mut buffer) {
                        buffer.move_end();
                    }
                }
                Key::Ctrl('b') | Key::Left => buffer.move_left(),
                Key::Ctrl('f') | Key::Right => {
                    if !accept_suggestion(state, &mut buffer) {
                        buffer.move_right();
                    }
                }
                Key::Alt('b') | Key::CtrlLeft => buffer.move_word_left(),
                Key::Alt('f') | Key::CtrlRight => {
                    if !accept_suggestion_word(state, &mut buffer) {
                        buffer.move_word_right();
                    }
                }
                Key::Ctrl('u') => buffer.kill_to_start(),
                Key::Ctrl('k') => buffer.kill_to_end(),
                Key::Ctrl('w') => buffer.kill_word_left(),
                Key::Ctrl('y') => buffer.yank(),
                Key::Up => history_older(state, &mut buffer, &mut nav),
                Key::Down => history_newer(state, &mut buffer, &mut nav),
                Key::Ctrl('r') => {
                    mode = Mode::Search(ReverseSearch::new());
                }
                Key::Tab => {
                    let text = buffer.text();
                    let cursor = buffer.cursor_byte_offset();
                    let result = self.completion.complete(state, &text, cursor);
                    match result.candidates.len() {
                        0 => {}
                        1 => {
                            let candidate = result.candidates[0].clone();
                            accept_candidate(&mut buffer, result.word_start, &candidate);
                            last_tab = false;
                        }
                        _ => {
                            if last_tab {
                                mode = Mode::Menu {
                                    result,
                                    selected: 0,
                                };
                                last_tab = false;
                            } else {
                                let prefix = result.common_prefix();
                                if !prefix.is_empty() {
                                    buffer.replace_range(result.word_start, cursor, &prefix);
                                }
                                last_tab = true;
                            }
                        }
                    }
                }
                Key::Ctrl('l') => self.renderer.clear_screen(),
                Key::Ctrl('z') => {
                    // The interactive shell ignores SIGTSTP for itself;
                    // delivering it here is a no-op by arrangement.
                    let _ = signal::send_signal(state.shell_pid, libc::SIGTSTP);
                }
                _ => {}
            }
        }
    }
}

/// Insert the accepted candidate, appending `/` for directories and a
/// space otherwise.
fn accept_candidate(buffer: &mut LineBuffer, word_start: usize, candidate: &complete::Candidate) {
    let cursor = buffer.cursor_byte_offset();
    let mut text = candidate.text.clone();
    text.push(if candidate.is_dir { '/' } else { ' ' });
    buffer.replace_range(word_start, cursor, &text);
}

/// Right/End/Ctrl+E at end-of-line take the whole suggestion.
fn accept_suggestion(state: &ShellState, buffer: &mut LineBuffer) -> bool {
    if buffer.cursor() != buffer.len() {
        return false;
    }
    match suggest::suggest(&state.history, &buffer.text()) {
        Some(hint) => {
            buffer.insert_str(&hint);
            true
        }
        None => false,
    }
}

/// Alt+F takes one word of the suggestion.
fn accept_suggestion_word(state: &ShellState, buffer: &mut LineBuffer) -> bool {
    if buffer.cursor() != buffer.len() {
        return false;
    }
    match suggest::suggest(&state.history, &buffer.text()) {
        Some(hint) => {
            buffer.insert_str(&suggest::first_word(&hint));
            true
        }
        None => false,
    }
}

fn history_older(state: &ShellState, buffer: &mut LineBuffer, nav: &mut Option<HistoryNav>) {
    let (anchor, stash, before) = match nav.as_ref() {
        Some(n) => (n.anchor.clone(), n.stash.clone(), Some(n.index)),
        None => (buffer.text(), buffer.text(), None),
    };

    let found = if anchor.is_empty() {
        match before {
            None => state.history.len().checked_sub(1),
            Some(i) => i.checked_sub(1),
        }
    } else {
        state.history.search_prefix(&anchor, before)
    };

    if let Some(index) = found {
        let text = state.history.get(index).map(|e| e.text.clone());
        if let Some(text) = text {
            buffer.set_text(&text);
            *nav = Some(HistoryNav {
                index,
                anchor,
                stash,
            });
        }
    }
}

fn history_newer(state: &ShellState, buffer: &mut LineBuffer, nav: &mut Option<HistoryNav>) {
    let Some(current) = nav.take() else {
        return;
    };

    let newer = if current.anchor.is_empty() {
        let next = current.index + 1;
        (next < state.history.len()).then_some(next)
    } else {
        (current.index + 1..state.history.len())
            .find(|&i| {
                state
                    .history
                    .get(i)
                    .map(|e| e.text.starts_with(&current.anchor))
                    .unwrap_or(false)
            })
    };

    match newer {
        Some(index) => {
            if let Some(entry) = state.history.get(index) {
                buffer.set_text(&entry.text.clone());
            }
            *nav = Some(HistoryNav { index, ..current });
        }
        None => {
            // Walked past the newest entry: restore what was typed.
            buffer.set_text(&current.stash);
        }
    }
}

/// Line input without a terminal: plain buffered reads, still honouring
/// logical-line continuation.
fn read_line_dumb() -> ReadOutcome {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let mut full = String::new();
    loop {
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                if full.is_empty() {
                    return ReadOutcome::Eof;
                }
                return ReadOutcome::Line(full);
            }
            Ok(_) => {
                full.push_str(&line);
                if !crate::parser::is_incomplete(&full) {
                    return ReadOutcome::Line(full.trim_end_matches('\n').to_string());
                }
            }
            Err(_) => return ReadOutcome::Eof,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_navigation_with_anchor() {
        let mut state = ShellState::new("den");
        state.history.push("git status");
        state.history.push("ls -la");
        state.history.push("git push");

        let mut buffer = LineBuffer::new();
        buffer.set_text("git");
        let mut nav = None;

        history_older(&state, &mut buffer, &mut nav);
        assert_eq!(buffer.text(), "git push");
        history_older(&state, &mut buffer, &mut nav);
        assert_eq!(buffer.text(), "git status");
        // No older match: unchanged.
        history_older(&state, &mut buffer, &mut nav);
        assert_eq!(buffer.text(), "git status");

        history_newer(&state, &mut buffer, &mut nav);
        assert_eq!(buffer.text(), "git push");
        // Past the newest: the anchor text comes back.
        history_newer(&state, &mut buffer, &mut nav);
        assert_eq!(buffer.text(), "git");
    }

    #[test]
    fn plain_navigation_without_anchor() {
        let mut state = ShellState::new("den");
        state.history.push("first");
        state.history.push("second");

        let mut buffer = LineBuffer::new();
        let mut nav = None;
        history_older(&state, &mut buffer, &mut nav);
        assert_eq!(buffer.text(), "second");
        history_older(&state, &mut buffer, &mut nav);
        assert_eq!(buffer.text(), "first");
        history_newer(&state, &mut buffer, &mut nav);
        assert_eq!(buffer.text(), "second");
        history_newer(&state, &mut buffer, &mut nav);
        assert_eq!(buffer.text(), "");
    }

    #[test]
    fn candidate_acceptance_appends_separator() {
        let mut buffer = LineBuffer::new();
        buffer.set_text("cat fo");
        accept_candidate(
            &mut buffer,
            4,
            &complete::Candidate {
                text: "foobar.txt".into(),
                is_dir: false,
            },
        );
        assert_eq!(buffer.text(), "cat foobar.txt ");

        let mut buffer = LineBuffer::new();
        buffer.set_text("cd sr");
        accept_candidate(
            &mut buffer,
            3,
            &complete::Candidate {
                text: "src".into(),
                is_dir: true,
            },
        );
        assert_eq!(buffer.text(), "cd src/");
    }
}
