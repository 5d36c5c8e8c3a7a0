//! Parser Types and Constants
//!
//! Shared types and token-classification helpers used across parser modules.

use std::fmt;

use thiserror::Error;

use crate::parser::lexer::{Token, TokenType};

// Defensive limits against pathological input. The per-chain token cap is
// well above anything a human or generated script produces.
pub const MAX_INPUT_SIZE: usize = 1_048_576; // 1 MiB
pub const MAX_TOKENS: usize = 131_072;
pub const MAX_PARSER_DEPTH: usize = 200;

/// Check if a token type begins a redirection
pub fn is_redirection_token(t: TokenType) -> bool {
    matches!(
        t,
        TokenType::Less
            | TokenType::Great
            | TokenType::DLess
            | TokenType::DGreat
            | TokenType::LessAnd
            | TokenType::GreatAnd
            | TokenType::DLessDash
            | TokenType::Clobber
            | TokenType::TLess
            | TokenType::AndGreat
            | TokenType::AndDGreat
    )
}

/// Check if a token type ends a command (without consuming it)
pub fn is_command_terminator(t: TokenType) -> bool {
    matches!(
        t,
        TokenType::Eof
            | TokenType::Newline
            | TokenType::Semicolon
            | TokenType::Amp
            | TokenType::Pipe
            | TokenType::PipeAmp
            | TokenType::AndAnd
            | TokenType::OrOr
            | TokenType::RParen
            | TokenType::DSemi
            | TokenType::SemiAnd
            | TokenType::SemiSemiAnd
    )
}

/// Reserved words, recognised only at command-word position
pub const RESERVED_WORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "do", "done", "case", "esac", "while", "until", "for",
    "in", "function", "select", "time",
];

pub fn is_reserved_word(s: &str) -> bool {
    RESERVED_WORDS.contains(&s)
}

/// Error raised when the parser rejects input
#[derive(Debug, Clone, Error)]
pub struct ParseException {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    /// The input ended where more was required; drives multi-line
    /// continuation in the line editor.
    pub unexpected_eof: bool,
}

impl fmt::Display for ParseException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "syntax error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl ParseException {
    pub fn new(message: impl Into<String>, line: usize, column: usize, offset: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            offset,
            unexpected_eof: false,
        }
    }

    pub fn at_token(message: impl Into<String>, token: &Token) -> Self {
        Self {
            message: message.into(),
            line: token.line,
            column: token.column,
            offset: token.start,
            unexpected_eof: token.token_type == TokenType::Eof,
        }
    }

    pub fn eof(message: impl Into<String>, token: &Token) -> Self {
        let mut e = Self::at_token(message, token);
        e.unexpected_eof = true;
        e
    }
}
