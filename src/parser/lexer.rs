//! Lexer
//!
//! The lexer tokenizes input into a stream of tokens the parser consumes.
//! It handles:
//! - Operators and separators (longest match)
//! - Words with quoting rules, keeping quotes in the raw text so the word
//!   parser can attach quote state per part
//! - Embedded expansions (`$(…)`, `${…}`, backticks, `<(…)`) which may
//!   contain spaces and operator characters
//! - Comments and line continuations
//! - Here-document bodies, collected after the newline that ends the
//!   command line they belong to

use std::collections::HashMap;

/// Token types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // End of input
    Eof,

    // Separators
    Newline,
    Semicolon,
    Amp, // &

    // Operators
    Pipe,    // |
    PipeAmp, // |&
    AndAnd,  // &&
    OrOr,    // ||
    Bang,    // !

    // Redirections
    Less,      // <
    Great,     // >
    DLess,     // <<
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    DLessDash, // <<-
    Clobber,   // >|
    TLess,     // <<<
    AndGreat,  // &>
    AndDGreat, // &>>

    // Grouping
    LParen, // (
    RParen, // )
    LBrace, // { as a standalone word
    RBrace, // } as a standalone word

    // Case terminators
    DSemi,       // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&

    // C-style for header: the raw text between (( and ))
    ArithSpan,

    // Words
    Word,
    /// All-digits word directly followed by < or > (fd prefix like 2>)
    Number,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "EOF",
            Self::Newline => "NEWLINE",
            Self::Semicolon => ";",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::PipeAmp => "|&",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Bang => "!",
            Self::Less => "<",
            Self::Great => ">",
            Self::DLess => "<<",
            Self::DGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::DLessDash => "<<-",
            Self::Clobber => ">|",
            Self::TLess => "<<<",
            Self::AndGreat => "&>",
            Self::AndDGreat => "&>>",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::DSemi => ";;",
            Self::SemiAnd => ";&",
            Self::SemiSemiAnd => ";;&",
            Self::ArithSpan => "((…))",
            Self::Word => "WORD",
            Self::Number => "NUMBER",
        }
    }
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Raw text; for words this includes the quoting characters
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    /// Whether any part of a word token was quoted
    pub quoted: bool,
}

impl Token {
    pub fn new(
        token_type: TokenType,
        value: impl Into<String>,
        start: usize,
        end: usize,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            token_type,
            value: value.into(),
            start,
            end,
            line,
            column,
            quoted: false,
        }
    }

    /// An unquoted word with exactly this text (reserved-word checks).
    pub fn is_unquoted_word(&self, text: &str) -> bool {
        self.token_type == TokenType::Word && !self.quoted && self.value == text
    }
}

/// What the lexer could not finish, used for multi-line continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnterminatedSingleQuote,
    UnterminatedDoubleQuote,
    UnterminatedBacktick,
    UnterminatedExpansion,
    UnterminatedArith,
    UnterminatedHeredoc,
}

/// Error raised when the lexer encounters invalid or unfinished input
#[derive(Debug, Clone)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self.kind {
            LexErrorKind::UnterminatedSingleQuote => "unterminated single quote",
            LexErrorKind::UnterminatedDoubleQuote => "unterminated double quote",
            LexErrorKind::UnterminatedBacktick => "unterminated backquote",
            LexErrorKind::UnterminatedExpansion => "unterminated expansion",
            LexErrorKind::UnterminatedArith => "unterminated arithmetic expression",
            LexErrorKind::UnterminatedHeredoc => "here-document delimited by end-of-file",
        };
        write!(f, "line {}: {}", self.line, message)
    }
}

impl std::error::Error for LexError {}

/// A collected here-document body, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct HereDocBody {
    pub delimiter: String,
    pub body: String,
    pub strip_tabs: bool,
    pub quoted: bool,
    /// False when the input ended before the delimiter line was seen.
    pub terminated: bool,
}

#[derive(Debug, Clone)]
struct PendingHeredoc {
    delimiter: String,
    strip_tabs: bool,
    quoted: bool,
}

lazy_static::lazy_static! {
    /// Single-character operators
    static ref SINGLE_CHAR_OPS: HashMap<char, TokenType> = {
        let mut m = HashMap::new();
        m.insert('|', TokenType::Pipe);
        m.insert('&', TokenType::Amp);
        m.insert(';', TokenType::Semicolon);
        m.insert('(', TokenType::LParen);
        m.insert(')', TokenType::RParen);
        m.insert('<', TokenType::Less);
        m.insert('>', TokenType::Great);
        m
    };
}

/// Three-character operators
const THREE_CHAR_OPS: &[(&str, TokenType)] = &[
    (";;&", TokenType::SemiSemiAnd),
    ("<<<", TokenType::TLess),
    ("<<-", TokenType::DLessDash),
    ("&>>", TokenType::AndDGreat),
];

/// Two-character operators
const TWO_CHAR_OPS: &[(&str, TokenType)] = &[
    ("&&", TokenType::AndAnd),
    ("||", TokenType::OrOr),
    (";;", TokenType::DSemi),
    (";&", TokenType::SemiAnd),
    ("|&", TokenType::PipeAmp),
    ("<<", TokenType::DLess),
    (">>", TokenType::DGreat),
    ("<&", TokenType::LessAnd),
    (">&", TokenType::GreatAnd),
    (">|", TokenType::Clobber),
    ("&>", TokenType::AndGreat),
];

/// Check if a character ends a word token
fn is_word_boundary(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

/// Lexer over a complete logical input
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    pending_heredocs: Vec<PendingHeredoc>,
    heredoc_bodies: Vec<HereDocBody>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            pending_heredocs: Vec::new(),
            heredoc_bodies: Vec::new(),
        }
    }

    /// Tokenize the entire input, returning the tokens and here-doc bodies.
    pub fn tokenize(mut self) -> Result<(Vec<Token>, Vec<HereDocBody>), LexError> {
        let len = self.input.len();

        while self.pos < len {
            self.skip_blank_and_comment();
            if self.pos >= len {
                break;
            }

            if let Some(token) = self.next_token()? {
                let was_newline = token.token_type == TokenType::Newline;
                self.tokens.push(token);
                if was_newline && !self.pending_heredocs.is_empty() {
                    self.read_heredoc_bodies()?;
                }
            }
        }

        if !self.pending_heredocs.is_empty() {
            // Input ended before the terminating line; treat the rest as body.
            self.read_heredoc_bodies()?;
        }

        self.tokens.push(Token::new(
            TokenType::Eof,
            "",
            self.pos,
            self.pos,
            self.line,
            self.column,
        ));

        Ok((self.tokens, self.heredoc_bodies))
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current();
        if let Some(ch) = c {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek(i) == Some(c))
    }

    /// Skip spaces, tabs, comments, and backslash-newline continuations.
    fn skip_blank_and_comment(&mut self) {
        loop {
            match self.current() {
                Some(' ') | Some('\t') => {
                    self.advance();
                }
                Some('\\') if self.peek(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                Some('#') => {
                    // Comments run to end of line; the newline itself is a token.
                    while let Some(c) = self.current() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        let start = self.pos;
        let line = self.line;
        let column = self.column;
        let c = match self.current() {
            Some(c) => c,
            None => return Ok(None),
        };

        if c == '\n' {
            self.advance();
            return Ok(Some(Token::new(
                TokenType::Newline,
                "\n",
                start,
                self.pos,
                line,
                column,
            )));
        }

        // C-style for header: `((` right after a `for` word
        if self.starts_with("((") && self.after_for_keyword() {
            return self.read_arith_span().map(Some);
        }

        // Process substitution begins a word even though < and > are
        // operator characters.
        if (c == '<' || c == '>') && self.peek(1) == Some('(') {
            return self.read_word().map(Some);
        }

        for (text, token_type) in THREE_CHAR_OPS {
            if self.starts_with(text) {
                self.advance();
                self.advance();
                self.advance();
                let token = Token::new(*token_type, *text, start, self.pos, line, column);
                if *token_type == TokenType::DLessDash {
                    self.tokens.push(token);
                    self.register_heredoc(true)?;
                    return Ok(None);
                }
                return Ok(Some(token));
            }
        }

        for (text, token_type) in TWO_CHAR_OPS {
            if self.starts_with(text) {
                self.advance();
                self.advance();
                let token = Token::new(*token_type, *text, start, self.pos, line, column);
                if *token_type == TokenType::DLess {
                    self.tokens.push(token);
                    self.register_heredoc(false)?;
                    return Ok(None);
                }
                return Ok(Some(token));
            }
        }

        if let Some(token_type) = SINGLE_CHAR_OPS.get(&c).copied() {
            self.advance();
            return Ok(Some(Token::new(
                token_type,
                c.to_string(),
                start,
                self.pos,
                line,
                column,
            )));
        }

        self.read_word().map(Some)
    }

    /// True when the most recent token is an unquoted `for` word.
    fn after_for_keyword(&self) -> bool {
        self.tokens
            .last()
            .map(|t| t.is_unquoted_word("for"))
            .unwrap_or(false)
    }

    /// Consume `((…))`, yielding the inner text as a single token.
    fn read_arith_span(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let line = self.line;
        let column = self.column;
        self.advance(); // (
        self.advance(); // (

        let mut depth = 2usize;
        let mut value = String::new();
        while let Some(c) = self.current() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(Token::new(
                            TokenType::ArithSpan,
                            value,
                            start,
                            self.pos,
                            line,
                            column,
                        ));
                    }
                    if depth == 1 && self.peek(1) == Some(')') {
                        self.advance();
                        self.advance();
                        return Ok(Token::new(
                            TokenType::ArithSpan,
                            value,
                            start,
                            self.pos,
                            line,
                            column,
                        ));
                    }
                }
                _ => {}
            }
            value.push(c);
            self.advance();
        }

        Err(LexError {
            kind: LexErrorKind::UnterminatedArith,
            line,
            column,
        })
    }

    /// After `<<` / `<<-`: read the delimiter word, emit it as a Word token,
    /// and queue the body for collection after the next newline.
    fn register_heredoc(&mut self, strip_tabs: bool) -> Result<(), LexError> {
        while matches!(self.current(), Some(' ') | Some('\t')) {
            self.advance();
        }

        let start = self.pos;
        let line = self.line;
        let column = self.column;
        let mut delimiter = String::new();
        let mut quoted = false;

        while let Some(c) = self.current() {
            match c {
                '\'' | '"' => {
                    quoted = true;
                    let quote = c;
                    self.advance();
                    loop {
                        match self.current() {
                            Some(ch) if ch == quote => {
                                self.advance();
                                break;
                            }
                            Some(ch) => {
                                delimiter.push(ch);
                                self.advance();
                            }
                            None => {
                                return Err(LexError {
                                    kind: if quote == '\'' {
                                        LexErrorKind::UnterminatedSingleQuote
                                    } else {
                                        LexErrorKind::UnterminatedDoubleQuote
                                    },
                                    line,
                                    column,
                                })
                            }
                        }
                    }
                }
                '\\' => {
                    quoted = true;
                    self.advance();
                    if let Some(ch) = self.advance() {
                        delimiter.push(ch);
                    }
                }
                c if is_word_boundary(c) => break,
                c => {
                    delimiter.push(c);
                    self.advance();
                }
            }
        }

        let mut token = Token::new(TokenType::Word, delimiter.clone(), start, self.pos, line, column);
        token.quoted = quoted;
        self.tokens.push(token);

        self.pending_heredocs.push(PendingHeredoc {
            delimiter,
            strip_tabs,
            quoted,
        });
        Ok(())
    }

    /// Collect bodies for all pending here-docs, in order.
    fn read_heredoc_bodies(&mut self) -> Result<(), LexError> {
        let pending = std::mem::take(&mut self.pending_heredocs);
        for heredoc in pending {
            let mut body = String::new();
            let mut terminated = false;
            loop {
                if self.pos >= self.input.len() {
                    // Unterminated: accept the collected text, like most
                    // interactive shells do at EOF.
                    break;
                }
                let mut line_text = String::new();
                while let Some(c) = self.current() {
                    self.advance();
                    if c == '\n' {
                        break;
                    }
                    line_text.push(c);
                }
                let check = if heredoc.strip_tabs {
                    line_text.trim_start_matches('\t')
                } else {
                    line_text.as_str()
                };
                if check == heredoc.delimiter {
                    terminated = true;
                    break;
                }
                if heredoc.strip_tabs {
                    body.push_str(line_text.trim_start_matches('\t'));
                } else {
                    body.push_str(&line_text);
                }
                body.push('\n');
            }
            self.heredoc_bodies.push(HereDocBody {
                delimiter: heredoc.delimiter,
                body,
                strip_tabs: heredoc.strip_tabs,
                quoted: heredoc.quoted,
                terminated,
            });
        }
        Ok(())
    }

    /// Read a word token, keeping quote characters and embedded expansions
    /// in the raw text.
    fn read_word(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let line = self.line;
        let column = self.column;
        let mut value = String::new();
        let mut quoted = false;

        while let Some(c) = self.current() {
            match c {
                '\'' => {
                    quoted = true;
                    value.push(c);
                    self.advance();
                    loop {
                        match self.current() {
                            Some('\'') => {
                                value.push('\'');
                                self.advance();
                                break;
                            }
                            Some(ch) => {
                                value.push(ch);
                                self.advance();
                            }
                            None => {
                                return Err(LexError {
                                    kind: LexErrorKind::UnterminatedSingleQuote,
                                    line,
                                    column,
                                })
                            }
                        }
                    }
                }
                '"' => {
                    quoted = true;
                    self.read_double_quoted(&mut value, line, column)?;
                }
                '`' => {
                    self.read_backticks(&mut value, line, column)?;
                }
                '\\' => {
                    if self.peek(1) == Some('\n') {
                        self.advance();
                        self.advance();
                        continue;
                    }
                    quoted = true;
                    value.push('\\');
                    self.advance();
                    if let Some(ch) = self.advance() {
                        value.push(ch);
                    }
                }
                '$' => match self.peek(1) {
                    Some('(') => self.read_balanced(&mut value, line, column)?,
                    Some('{') => self.read_balanced(&mut value, line, column)?,
                    _ => {
                        value.push('$');
                        self.advance();
                    }
                },
                '<' | '>' if value.is_empty() && self.peek(1) == Some('(') => {
                    value.push(c);
                    self.advance();
                    self.read_paren_group(&mut value, line, column)?;
                }
                c if is_word_boundary(c) => break,
                c => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        // Distinguish a bare fd prefix (2>, 12<) from a plain word.
        let token_type = if !quoted
            && !value.is_empty()
            && value.chars().all(|c| c.is_ascii_digit())
            && matches!(self.current(), Some('<') | Some('>'))
        {
            TokenType::Number
        } else if !quoted && value == "{" {
            TokenType::LBrace
        } else if !quoted && value == "}" {
            TokenType::RBrace
        } else if !quoted && value == "!" {
            TokenType::Bang
        } else {
            TokenType::Word
        };

        let mut token = Token::new(token_type, value, start, self.pos, line, column);
        token.quoted = quoted;
        Ok(token)
    }

    /// Consume a double-quoted run including both quotes, honouring escapes
    /// and embedded `$(…)` / `${…}` / backticks.
    fn read_double_quoted(
        &mut self,
        value: &mut String,
        line: usize,
        column: usize,
    ) -> Result<(), LexError> {
        value.push('"');
        self.advance();
        loop {
            match self.current() {
                Some('"') => {
                    value.push('"');
                    self.advance();
                    return Ok(());
                }
                Some('\\') => {
                    value.push('\\');
                    self.advance();
                    if let Some(ch) = self.advance() {
                        value.push(ch);
                    }
                }
                Some('$') if matches!(self.peek(1), Some('(') | Some('{')) => {
                    self.read_balanced(value, line, column)?;
                }
                Some('`') => {
                    self.read_backticks(value, line, column)?;
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedDoubleQuote,
                        line,
                        column,
                    })
                }
            }
        }
    }

    /// Consume `` ` … ` `` including the backquotes.
    fn read_backticks(
        &mut self,
        value: &mut String,
        line: usize,
        column: usize,
    ) -> Result<(), LexError> {
        value.push('`');
        self.advance();
        loop {
            match self.current() {
                Some('`') => {
                    value.push('`');
                    self.advance();
                    return Ok(());
                }
                Some('\\') => {
                    value.push('\\');
                    self.advance();
                    if let Some(ch) = self.advance() {
                        value.push(ch);
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedBacktick,
                        line,
                        column,
                    })
                }
            }
        }
    }

    /// Consume `$(…)` or `${…}` including the delimiters, respecting quotes
    /// and nesting.
    fn read_balanced(
        &mut self,
        value: &mut String,
        line: usize,
        column: usize,
    ) -> Result<(), LexError> {
        value.push('$');
        self.advance();
        let open = self.current().unwrap_or('(');
        let close = if open == '(' { ')' } else { '}' };
        value.push(open);
        self.advance();

        let mut depth = 1usize;
        loop {
            match self.current() {
                Some('\'') => {
                    value.push('\'');
                    self.advance();
                    loop {
                        match self.current() {
                            Some('\'') => {
                                value.push('\'');
                                self.advance();
                                break;
                            }
                            Some(ch) => {
                                value.push(ch);
                                self.advance();
                            }
                            None => {
                                return Err(LexError {
                                    kind: LexErrorKind::UnterminatedSingleQuote,
                                    line,
                                    column,
                                })
                            }
                        }
                    }
                }
                Some('"') => self.read_double_quoted(value, line, column)?,
                Some('`') => self.read_backticks(value, line, column)?,
                Some('\\') => {
                    value.push('\\');
                    self.advance();
                    if let Some(ch) = self.advance() {
                        value.push(ch);
                    }
                }
                Some(ch) if ch == open => {
                    depth += 1;
                    value.push(ch);
                    self.advance();
                }
                Some(ch) if ch == close => {
                    depth -= 1;
                    value.push(ch);
                    self.advance();
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedExpansion,
                        line,
                        column,
                    })
                }
            }
        }
    }

    /// Consume `(…)` for process substitution, after the `<`/`>` prefix.
    fn read_paren_group(
        &mut self,
        value: &mut String,
        line: usize,
        column: usize,
    ) -> Result<(), LexError> {
        value.push('(');
        self.advance();
        let mut depth = 1usize;
        loop {
            match self.current() {
                Some('\'') => {
                    value.push('\'');
                    self.advance();
                    loop {
                        match self.current() {
                            Some('\'') => {
                                value.push('\'');
                                self.advance();
                                break;
                            }
                            Some(ch) => {
                                value.push(ch);
                                self.advance();
                            }
                            None => {
                                return Err(LexError {
                                    kind: LexErrorKind::UnterminatedSingleQuote,
                                    line,
                                    column,
                                })
                            }
                        }
                    }
                }
                Some('"') => self.read_double_quoted(value, line, column)?,
                Some('(') => {
                    depth += 1;
                    value.push('(');
                    self.advance();
                }
                Some(')') => {
                    depth -= 1;
                    value.push(')');
                    self.advance();
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedExpansion,
                        line,
                        column,
                    })
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap().0
    }

    fn types(input: &str) -> Vec<TokenType> {
        lex(input).iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn simple_words() {
        let tokens = lex("echo hello world");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].value, "echo");
        assert_eq!(tokens[1].value, "hello");
        assert_eq!(tokens[2].value, "world");
        assert_eq!(tokens[3].token_type, TokenType::Eof);
    }

    #[test]
    fn operators_longest_match() {
        assert_eq!(
            types("a && b || c ; d & e"),
            vec![
                TokenType::Word,
                TokenType::AndAnd,
                TokenType::Word,
                TokenType::OrOr,
                TokenType::Word,
                TokenType::Semicolon,
                TokenType::Word,
                TokenType::Amp,
                TokenType::Word,
                TokenType::Eof,
            ]
        );
        assert_eq!(
            types("x >> f 2>&1 &>> g"),
            vec![
                TokenType::Word,
                TokenType::DGreat,
                TokenType::Word,
                TokenType::Number,
                TokenType::GreatAnd,
                TokenType::Word,
                TokenType::AndDGreat,
                TokenType::Word,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn case_terminators() {
        assert_eq!(
            types(";; ;& ;;&"),
            vec![
                TokenType::DSemi,
                TokenType::SemiAnd,
                TokenType::SemiSemiAnd,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn quoted_word_keeps_raw_text() {
        let tokens = lex("echo 'a b' \"c d\"");
        assert_eq!(tokens[1].value, "'a b'");
        assert!(tokens[1].quoted);
        assert_eq!(tokens[2].value, "\"c d\"");
    }

    #[test]
    fn operator_chars_quoted_are_words() {
        let tokens = lex("echo 'a|b'");
        assert_eq!(tokens[1].value, "'a|b'");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn command_substitution_spans_spaces() {
        let tokens = lex("echo $(ls -la | wc -l)");
        assert_eq!(tokens[1].value, "$(ls -la | wc -l)");
    }

    #[test]
    fn nested_command_substitution() {
        let tokens = lex("echo $(echo $(echo x))");
        assert_eq!(tokens[1].value, "$(echo $(echo x))");
    }

    #[test]
    fn comment_consumes_to_eol() {
        assert_eq!(
            types("echo hi # trailing comment\nnext"),
            vec![
                TokenType::Word,
                TokenType::Word,
                TokenType::Newline,
                TokenType::Word,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn line_continuation_joins_words() {
        let tokens = lex("echo ab\\\ncd");
        assert_eq!(tokens[1].value, "abcd");
    }

    #[test]
    fn heredoc_body_collected() {
        let (tokens, bodies) = Lexer::new("cat <<EOF\nline one\nline two\nEOF\n")
            .tokenize()
            .unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].body, "line one\nline two\n");
        assert!(!bodies[0].quoted);
        // cat, <<, EOF, newline, eof
        assert_eq!(tokens[1].token_type, TokenType::DLess);
        assert_eq!(tokens[2].value, "EOF");
    }

    #[test]
    fn heredoc_quoted_delimiter() {
        let (_, bodies) = Lexer::new("cat <<'EOF'\n$HOME\nEOF\n").tokenize().unwrap();
        assert!(bodies[0].quoted);
        assert_eq!(bodies[0].body, "$HOME\n");
    }

    #[test]
    fn heredoc_dash_strips_tabs() {
        let (_, bodies) = Lexer::new("cat <<-EOF\n\tindented\n\tEOF\n")
            .tokenize()
            .unwrap();
        assert_eq!(bodies[0].body, "indented\n");
    }

    #[test]
    fn process_substitution_is_a_word() {
        let tokens = lex("diff <(sort a) <(sort b)");
        assert_eq!(tokens[1].value, "<(sort a)");
        assert_eq!(tokens[2].value, "<(sort b)");
    }

    #[test]
    fn arith_span_after_for() {
        let tokens = lex("for ((i=0; i<3; i++))");
        assert_eq!(tokens[1].token_type, TokenType::ArithSpan);
        assert_eq!(tokens[1].value, "i=0; i<3; i++");
    }

    #[test]
    fn bang_and_braces() {
        assert_eq!(
            types("! { x; }"),
            vec![
                TokenType::Bang,
                TokenType::LBrace,
                TokenType::Word,
                TokenType::Semicolon,
                TokenType::RBrace,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_quote_errors() {
        let err = Lexer::new("echo 'oops").tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedSingleQuote);
    }

    #[test]
    fn brace_expansion_stays_in_word() {
        let tokens = lex("echo {a,b}.txt");
        assert_eq!(tokens[1].value, "{a,b}.txt");
    }
}
