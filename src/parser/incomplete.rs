//! Partial-Input Detection
//!
//! The line editor calls [`is_incomplete`] on Enter to decide between
//! submitting the buffer and continuing onto a PS2 line. Input is
//! incomplete when something is structurally unfinished: an open quote or
//! expansion, an unterminated here-document, a reserved-word block without
//! its closer, a trailing `|`/`&&`/`||`, or a backslash-newline request.

use crate::parser::lexer::Lexer;
use crate::parser::{parse, types::MAX_INPUT_SIZE};

/// True when the input needs more lines before it can be executed.
pub fn is_incomplete(input: &str) -> bool {
    if input.trim().is_empty() {
        return false;
    }
    if input.len() > MAX_INPUT_SIZE {
        return false;
    }

    if ends_with_line_continuation(input) {
        return true;
    }

    // Every lexer failure mode is an unterminated construct.
    let lexed = Lexer::new(input).tokenize();
    match lexed {
        Err(_) => return true,
        Ok((_, heredocs)) => {
            if heredocs.iter().any(|h| !h.terminated) {
                return true;
            }
        }
    }

    match parse(input) {
        Ok(_) => false,
        Err(e) => e.unexpected_eof,
    }
}

/// A trailing unescaped backslash asks for another line.
fn ends_with_line_continuation(input: &str) -> bool {
    let trailing = input
        .bytes()
        .rev()
        .take_while(|&b| b == b'\\')
        .count();
    trailing % 2 == 1
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_lines() {
        assert!(!is_incomplete("echo hello"));
        assert!(!is_incomplete("a && b || c"));
        assert!(!is_incomplete("if true; then echo a; fi"));
        assert!(!is_incomplete(""));
        assert!(!is_incomplete("   "));
    }

    #[test]
    fn open_quotes() {
        assert!(is_incomplete("echo 'unclosed"));
        assert!(is_incomplete("echo \"unclosed"));
        assert!(is_incomplete("echo `unclosed"));
    }

    #[test]
    fn open_expansions() {
        assert!(is_incomplete("echo $(date"));
        assert!(is_incomplete("echo ${HOME"));
    }

    #[test]
    fn open_groups() {
        assert!(is_incomplete("( echo a"));
        assert!(is_incomplete("{ echo a;"));
    }

    #[test]
    fn open_reserved_blocks() {
        assert!(is_incomplete("if true; then"));
        assert!(is_incomplete("while true; do"));
        assert!(is_incomplete("for i in 1 2 3; do"));
        assert!(is_incomplete("case $x in"));
    }

    #[test]
    fn trailing_operators() {
        assert!(is_incomplete("echo a |"));
        assert!(is_incomplete("echo a &&"));
        assert!(is_incomplete("echo a ||"));
    }

    #[test]
    fn trailing_backslash() {
        assert!(is_incomplete("echo a \\"));
        // An escaped backslash is complete.
        assert!(!is_incomplete("echo a\\\\"));
    }

    #[test]
    fn unterminated_heredoc() {
        assert!(is_incomplete("cat <<EOF\nbody"));
        assert!(!is_incomplete("cat <<EOF\nbody\nEOF"));
    }

    #[test]
    fn genuine_syntax_errors_are_complete() {
        // Nothing more can fix a leading pipe; submit and report.
        assert!(!is_incomplete("| echo"));
        assert!(!is_incomplete("if; fi"));
    }

    #[test]
    fn multiline_once_closed() {
        assert!(!is_incomplete("if true\nthen\necho a\nfi"));
    }
}
