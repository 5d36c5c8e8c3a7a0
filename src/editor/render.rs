//! Rendering
//!
//! Repaints the prompt, the buffer, the dim autosuggestion, and the
//! completion menu after every keystroke. Wrapped lines are tracked so the
//! repaint can climb back to the first row before clearing.

use std::io::Write;

use crate::editor::complete::Candidate;

const DIM: &str = "\x1b[2m";
const REVERSE: &str = "\x1b[7m";
const RESET: &str = "\x1b[0m";

/// Printable width, ignoring ANSI escape sequences.
pub fn visible_width(text: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for c in text.chars() {
        if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
            continue;
        }
        if c == '\x1b' {
            in_escape = true;
            continue;
        }
        width += 1;
    }
    width
}

#[derive(Debug, Default)]
pub struct Renderer {
    /// Terminal row the cursor sat on after the last paint, counted from
    /// the paint's first row.
    cursor_row: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget previous paints (after a submit, Ctrl+L, or external output).
    pub fn reset(&mut self) {
        self.cursor_row = 0;
    }

    /// Finish the current line: move past everything painted and emit a
    /// newline.
    pub fn finish_line(&mut self) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(b"\r\n\x1b[J");
        let _ = out.flush();
        self.reset();
    }

    /// Repaint the whole edit line (and menu) and position the cursor.
    pub fn draw(
        &mut self,
        prompt: &str,
        text: &str,
        cursor_chars: usize,
        suggestion: Option<&str>,
        menu: Option<(&[Candidate], usize)>,
        cols: usize,
    ) {
        let cols = cols.max(1);
        let mut frame = String::new();

        // Climb to the first row of the previous paint and wipe it.
        if self.cursor_row > 0 {
            frame.push_str(&format!("\x1b[{}A", self.cursor_row));
        }
        frame.push('\r');
        frame.push_str("\x1b[J");

        frame.push_str(prompt);
        frame.push_str(text);
        if let Some(hint) = suggestion {
            frame.push_str(DIM);
            frame.push_str(hint);
            frame.push_str(RESET);
        }

        let prompt_width = visible_width(prompt);
        let content_width =
            prompt_width + text.chars().count() + suggestion.map_or(0, |s| s.chars().count());
        let end_row = content_width / cols;

        let mut menu_rows = 0;
        if let Some((candidates, selected)) = menu {
            for (i, candidate) in candidates.iter().enumerate() {
                frame.push_str("\r\n");
                menu_rows += 1;
                if i == selected {
                    frame.push_str(REVERSE);
                }
                let marker = if candidate.is_dir { "/" } else { "" };
                frame.push_str(&format!("{}{}", candidate.text, marker));
                if i == selected {
                    frame.push_str(RESET);
                }
            }
        }

        // Park the cursor at its position inside the text.
        let cursor_offset = prompt_width + cursor_chars;
        let cursor_row = cursor_offset / cols;
        let cursor_col = cursor_offset % cols;
        let rows_up = end_row + menu_rows - cursor_row;
        if rows_up > 0 {
            frame.push_str(&format!("\x1b[{}A", rows_up));
        }
        frame.push('\r');
        if cursor_col > 0 {
            frame.push_str(&format!("\x1b[{}C", cursor_col));
        }

        self.cursor_row = cursor_row;

        let mut out = std::io::stdout().lock();
        let _ = out.write_all(frame.as_bytes());
        let _ = out.flush();
    }

    /// Clear the whole screen and repaint from the top (Ctrl+L).
    pub fn clear_screen(&mut self) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(b"\x1b[2J\x1b[H");
        let _ = out.flush();
        self.reset();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_ignores_ansi() {
        assert_eq!(visible_width("plain"), 5);
        assert_eq!(visible_width("\x1b[32mgreen\x1b[0m"), 5);
        assert_eq!(visible_width("\x1b[1;34m~/src\x1b[0m $ "), 8);
    }
}
