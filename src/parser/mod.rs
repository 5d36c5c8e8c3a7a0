//! Parser Module
//!
//! Bytes → tokens → AST. The public surface is [`parse`] for whole inputs
//! and [`is_incomplete`] for the line editor's multi-line continuation.

pub mod arith;
pub mod compound;
pub mod incomplete;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod types;
pub mod word;

pub use incomplete::is_incomplete;
pub use parser::Parser;
pub use types::ParseException;

use crate::ast::ScriptNode;
use crate::parser::lexer::{LexError, Lexer};
use crate::parser::types::{MAX_INPUT_SIZE, MAX_TOKENS};

/// Parse a complete input into a script.
pub fn parse(input: &str) -> Result<ScriptNode, ParseException> {
    if input.len() > MAX_INPUT_SIZE {
        return Err(ParseException::new("input too large", 1, 1, 0));
    }

    let (tokens, heredocs) = Lexer::new(input).tokenize().map_err(lex_to_parse)?;
    if tokens.len() > MAX_TOKENS {
        return Err(ParseException::new("too many tokens", 1, 1, 0));
    }

    Parser::new(input, tokens, heredocs).parse_script()
}

/// Unfinished lexical constructs surface as EOF-shaped parse errors so the
/// editor can keep reading.
fn lex_to_parse(e: LexError) -> ParseException {
    let mut err = ParseException::new(e.to_string(), e.line, e.column, 0);
    err.unexpected_eof = true;
    err
}
