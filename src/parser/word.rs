//! Word Parser
//!
//! Splits the raw text of a word token into [`WordPart`]s. Quote state is
//! encoded in the part structure: single-quoted runs become opaque literals,
//! double-quoted runs keep their inner expansions but are marked as never
//! splitting, and everything else stays open to the full expansion pipeline.

use crate::ast::*;
use crate::parser::arith;
use crate::parser::types::ParseException;

/// Parse the raw text of a word token into a word node.
pub fn parse_word(text: &str, line: usize, column: usize) -> Result<WordNode, ParseException> {
    let chars: Vec<char> = text.chars().collect();
    let mut p = WordParser {
        chars,
        pos: 0,
        line,
        column,
    };
    let parts = p.parse_parts(true)?;
    Ok(WordNode { parts })
}

/// Parse a here-document body. A quoted delimiter makes the body fully
/// literal; otherwise `$`, backticks and backslash escapes stay active while
/// quote characters are plain text.
pub fn parse_heredoc_body(
    body: &str,
    quoted: bool,
    line: usize,
) -> Result<WordNode, ParseException> {
    if quoted {
        return Ok(WordNode {
            parts: vec![WordPart::SingleQuoted(body.to_string())],
        });
    }
    let chars: Vec<char> = body.chars().collect();
    let mut p = WordParser {
        chars,
        pos: 0,
        line,
        column: 1,
    };
    let parts = p.parse_dquote_like(None)?;
    Ok(WordNode {
        parts: vec![WordPart::DoubleQuoted(parts)],
    })
}

/// Split `NAME=value` / `NAME+=value` raw text, if it is a valid assignment.
pub fn split_assignment(text: &str) -> Option<(&str, bool, &str)> {
    let eq = find_unquoted_eq(text)?;
    let (lhs, rhs) = text.split_at(eq);
    let (name, append) = match lhs.strip_suffix('+') {
        Some(name) => (name, true),
        None => (lhs, false),
    };
    if is_valid_name(name) {
        Some((name, append, &rhs[1..]))
    } else {
        None
    }
}

/// Check if a string is a valid variable name
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Find the first `=` outside quotes; assignments are detected before any
/// expansion, so quote characters are still present in the raw text.
fn find_unquoted_eq(s: &str) -> Option<usize> {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '=' if !in_single && !in_double => return Some(i),
            _ => {}
        }
    }
    None
}

struct WordParser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl WordParser {
    fn error(&self, message: impl Into<String>) -> ParseException {
        ParseException::new(message, self.line, self.column + self.pos, self.pos)
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn rest_starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek(i) == Some(c))
    }

    /// Parse parts until the end of the input.
    fn parse_parts(&mut self, at_word_start: bool) -> Result<Vec<WordPart>, ParseException> {
        let mut parts = Vec::new();
        let mut literal = String::new();

        macro_rules! flush {
            () => {
                if !literal.is_empty() {
                    parts.push(WordPart::Literal(std::mem::take(&mut literal)));
                }
            };
        }

        // Tilde is only recognised at the very start of the word.
        if at_word_start && self.current() == Some('~') {
            if let Some(part) = self.try_parse_tilde() {
                parts.push(part);
            }
        }

        while let Some(c) = self.current() {
            match c {
                '\'' => {
                    flush!();
                    self.pos += 1;
                    let mut value = String::new();
                    loop {
                        match self.current() {
                            Some('\'') => {
                                self.pos += 1;
                                break;
                            }
                            Some(ch) => {
                                value.push(ch);
                                self.pos += 1;
                            }
                            None => return Err(self.error("unterminated single quote")),
                        }
                    }
                    parts.push(WordPart::SingleQuoted(value));
                }
                '"' => {
                    flush!();
                    self.pos += 1;
                    let inner = self.parse_dquote_like(Some('"'))?;
                    parts.push(WordPart::DoubleQuoted(inner));
                }
                '\\' => {
                    flush!();
                    self.pos += 1;
                    match self.current() {
                        Some(ch) => {
                            parts.push(WordPart::Escaped(ch.to_string()));
                            self.pos += 1;
                        }
                        None => literal.push('\\'),
                    }
                }
                '`' => {
                    flush!();
                    parts.push(self.parse_backticks()?);
                }
                '$' => {
                    flush!();
                    parts.push(self.parse_dollar()?);
                }
                '<' | '>' if self.pos == 0 && self.peek(1) == Some('(') => {
                    flush!();
                    parts.push(self.parse_process_subst()?);
                }
                '{' => {
                    flush!();
                    match self.try_parse_brace()? {
                        Some(part) => parts.push(part),
                        None => {
                            literal.push('{');
                            self.pos += 1;
                        }
                    }
                }
                ch => {
                    literal.push(ch);
                    self.pos += 1;
                }
            }
        }

        if !literal.is_empty() {
            parts.push(WordPart::Literal(literal));
        }
        Ok(parts)
    }

    /// Parse a double-quoted body (or a here-doc body when `close` is None):
    /// `$`, backticks and a restricted set of backslash escapes are active.
    fn parse_dquote_like(
        &mut self,
        close: Option<char>,
    ) -> Result<Vec<WordPart>, ParseException> {
        let mut parts = Vec::new();
        let mut literal = String::new();

        macro_rules! flush {
            () => {
                if !literal.is_empty() {
                    parts.push(WordPart::Literal(std::mem::take(&mut literal)));
                }
            };
        }

        loop {
            match self.current() {
                Some(c) if Some(c) == close => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    // Backslash is special only before $ ` " \ and newline.
                    match self.peek(1) {
                        Some(next @ ('$' | '`' | '"' | '\\')) => {
                            flush!();
                            parts.push(WordPart::Escaped(next.to_string()));
                            self.pos += 2;
                        }
                        Some('\n') => {
                            self.pos += 2;
                        }
                        _ => {
                            literal.push('\\');
                            self.pos += 1;
                        }
                    }
                }
                Some('$') => {
                    flush!();
                    parts.push(self.parse_dollar()?);
                }
                Some('`') => {
                    flush!();
                    parts.push(self.parse_backticks()?);
                }
                Some(ch) => {
                    literal.push(ch);
                    self.pos += 1;
                }
                None => {
                    if close.is_some() {
                        return Err(self.error("unterminated double quote"));
                    }
                    break;
                }
            }
        }

        if !literal.is_empty() {
            parts.push(WordPart::Literal(literal));
        }
        Ok(parts)
    }

    /// Leading tilde: `~`, `~user`, `~+`, `~-`, `~name`.
    fn try_parse_tilde(&mut self) -> Option<WordPart> {
        debug_assert_eq!(self.current(), Some('~'));
        let mut end = self.pos + 1;
        let mut name = String::new();

        match self.chars.get(end) {
            Some('+') | Some('-') => {
                name.push(self.chars[end]);
                end += 1;
            }
            _ => {
                while let Some(&c) = self.chars.get(end) {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                        name.push(c);
                        end += 1;
                    } else {
                        break;
                    }
                }
            }
        }

        // A tilde prefix ends the word or is followed by a slash.
        match self.chars.get(end) {
            None | Some('/') => {
                self.pos = end;
                Some(WordPart::Tilde(if name.is_empty() {
                    None
                } else {
                    Some(name)
                }))
            }
            _ => None,
        }
    }

    /// `$…`: parameter, `${…}`, `$(…)`, `$((…))`.
    fn parse_dollar(&mut self) -> Result<WordPart, ParseException> {
        debug_assert_eq!(self.current(), Some('$'));

        if self.rest_starts_with("$((") {
            if let Some(part) = self.try_parse_arith()? {
                return Ok(part);
            }
        }
        if self.rest_starts_with("$(") {
            return self.parse_command_subst();
        }
        if self.rest_starts_with("${") {
            return self.parse_braced_parameter();
        }

        self.pos += 1;
        match self.current() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(ch) = self.current() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        name.push(ch);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Ok(WordPart::Parameter(ParameterPart { name, op: None }))
            }
            Some(c) if c.is_ascii_digit() => {
                self.pos += 1;
                Ok(WordPart::Parameter(ParameterPart {
                    name: c.to_string(),
                    op: None,
                }))
            }
            Some(c @ ('?' | '$' | '!' | '#' | '@' | '*' | '-' | '_')) => {
                self.pos += 1;
                Ok(WordPart::Parameter(ParameterPart {
                    name: c.to_string(),
                    op: None,
                }))
            }
            // A bare dollar is literal.
            _ => Ok(WordPart::Literal("$".to_string())),
        }
    }

    /// `$((expr))` — returns None when the parens close singly, which means
    /// the text is a command substitution of a subshell.
    fn try_parse_arith(&mut self) -> Result<Option<WordPart>, ParseException> {
        let start = self.pos;
        self.pos += 3; // $((
        let mut depth = 2usize;
        let mut inner = String::new();

        while let Some(c) = self.current() {
            match c {
                '(' => depth += 1,
                ')' => {
                    if depth == 2 && self.peek(1) == Some(')') {
                        self.pos += 2;
                        let expr = arith::parse(&inner).map_err(|e| self.error(e.to_string()))?;
                        return Ok(Some(WordPart::Arithmetic(expr)));
                    }
                    depth -= 1;
                    if depth == 0 {
                        // `$( (…) )` shape: not arithmetic.
                        self.pos = start;
                        return Ok(None);
                    }
                }
                _ => {}
            }
            inner.push(c);
            self.pos += 1;
        }

        Err(self.error("unterminated arithmetic expansion"))
    }

    /// `$(cmd)` — the body is parsed as a full script.
    fn parse_command_subst(&mut self) -> Result<WordPart, ParseException> {
        self.pos += 2; // $(
        let inner = self.consume_balanced('(', ')', 1)?;
        let body = crate::parser::parse(&inner)?;
        Ok(WordPart::CommandSubst(CommandSubstPart {
            body,
            backtick: false,
        }))
    }

    /// `` `cmd` `` — `\$`, `` \` `` and `\\` are unescaped before parsing.
    fn parse_backticks(&mut self) -> Result<WordPart, ParseException> {
        debug_assert_eq!(self.current(), Some('`'));
        self.pos += 1;
        let mut inner = String::new();
        loop {
            match self.current() {
                Some('`') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') if matches!(self.peek(1), Some('$') | Some('`') | Some('\\')) => {
                    inner.push(self.peek(1).unwrap());
                    self.pos += 2;
                }
                Some(ch) => {
                    inner.push(ch);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated backquote")),
            }
        }
        let body = crate::parser::parse(&inner)?;
        Ok(WordPart::CommandSubst(CommandSubstPart {
            body,
            backtick: true,
        }))
    }

    /// `<(cmd)` / `>(cmd)`
    fn parse_process_subst(&mut self) -> Result<WordPart, ParseException> {
        let direction = if self.current() == Some('<') {
            ProcessDirection::Input
        } else {
            ProcessDirection::Output
        };
        self.pos += 2; // <( or >(
        let inner = self.consume_balanced('(', ')', 1)?;
        let body = crate::parser::parse(&inner)?;
        Ok(WordPart::ProcessSubst(ProcessSubstPart { body, direction }))
    }

    /// Consume up to the close matching `depth` opens, returning the inner
    /// text. Quotes inside are respected.
    fn consume_balanced(
        &mut self,
        open: char,
        close: char,
        mut depth: usize,
    ) -> Result<String, ParseException> {
        let mut inner = String::new();
        let mut in_single = false;
        let mut in_double = false;
        while let Some(c) = self.current() {
            match c {
                '\\' if !in_single => {
                    inner.push(c);
                    self.pos += 1;
                    if let Some(next) = self.current() {
                        inner.push(next);
                        self.pos += 1;
                    }
                    continue;
                }
                '\'' if !in_double => in_single = !in_single,
                '"' if !in_single => in_double = !in_double,
                c if c == open && !in_single && !in_double => depth += 1,
                c if c == close && !in_single && !in_double => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(inner);
                    }
                }
                _ => {}
            }
            inner.push(c);
            self.pos += 1;
        }
        Err(self.error("unterminated expansion"))
    }

    /// `${NAME}` and its operator forms.
    fn parse_braced_parameter(&mut self) -> Result<WordPart, ParseException> {
        self.pos += 2; // ${
        let inner = self.consume_balanced('{', '}', 1)?;
        let part = parse_parameter_body(&inner, self.line, self.column)?;
        Ok(WordPart::Parameter(part))
    }

    /// `{…}` brace expansion; returns None when the braces are literal.
    fn try_parse_brace(&mut self) -> Result<Option<WordPart>, ParseException> {
        let Some(end) = self.find_brace_close() else {
            return Ok(None);
        };
        let inner: String = self.chars[self.pos + 1..end].iter().collect();

        if let Some(range) = parse_brace_range(&inner) {
            self.pos = end + 1;
            return Ok(Some(WordPart::Brace(BracePart::Range(range))));
        }

        let Some(items) = split_brace_list(&inner) else {
            return Ok(None);
        };
        let mut words = Vec::new();
        for item in items {
            words.push(parse_word(&item, self.line, self.column)?);
        }
        self.pos = end + 1;
        Ok(Some(WordPart::Brace(BracePart::List(words))))
    }

    /// Index of the `}` matching the `{` at the current position.
    fn find_brace_close(&self) -> Option<usize> {
        let mut depth = 0usize;
        let mut in_single = false;
        let mut in_double = false;
        let mut i = self.pos;
        while i < self.chars.len() {
            let c = self.chars[i];
            match c {
                '\\' if !in_single => {
                    i += 2;
                    continue;
                }
                '\'' if !in_double => in_single = !in_single,
                '"' if !in_single => in_double = !in_double,
                '{' if !in_single && !in_double => depth += 1,
                '}' if !in_single && !in_double => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        None
    }
}

/// Split a brace body on top-level commas; None when there is no comma
/// (a lone `{word}` is literal text, not an expansion).
fn split_brace_list(inner: &str) -> Option<Vec<String>> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_single = false;
    let mut in_double = false;
    let mut found_comma = false;
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if !in_single => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '{' if !in_single && !in_double => depth += 1,
            '}' if !in_single && !in_double => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !in_single && !in_double => {
                found_comma = true;
                items.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    items.push(current);

    if found_comma {
        Some(items)
    } else {
        None
    }
}

/// `n..m[..step]` and `a..z` sequence ranges.
fn parse_brace_range(inner: &str) -> Option<BraceRange> {
    let pieces: Vec<&str> = inner.split("..").collect();
    if pieces.len() != 2 && pieces.len() != 3 {
        return None;
    }
    let step = if pieces.len() == 3 {
        Some(pieces[2].parse::<i64>().ok()?)
    } else {
        None
    };

    let parse_num = |s: &str| -> Option<i64> { s.parse::<i64>().ok() };

    if let (Some(a), Some(b)) = (parse_num(pieces[0]), parse_num(pieces[1])) {
        let has_pad = |s: &str| {
            let t = s.strip_prefix('-').unwrap_or(s);
            t.len() > 1 && t.starts_with('0')
        };
        let pad_width = if has_pad(pieces[0]) || has_pad(pieces[1]) {
            Some(pieces[0].len().max(pieces[1].len()))
        } else {
            None
        };
        return Some(BraceRange {
            start: BraceEndpoint::Number(a),
            end: BraceEndpoint::Number(b),
            step,
            pad_width,
        });
    }

    let single_alpha = |s: &str| -> Option<char> {
        let mut it = s.chars();
        match (it.next(), it.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
            _ => None,
        }
    };
    if let (Some(a), Some(b)) = (single_alpha(pieces[0]), single_alpha(pieces[1])) {
        return Some(BraceRange {
            start: BraceEndpoint::Char(a),
            end: BraceEndpoint::Char(b),
            step,
            pad_width: None,
        });
    }

    None
}

/// Parse the inside of `${…}`.
fn parse_parameter_body(
    inner: &str,
    line: usize,
    column: usize,
) -> Result<ParameterPart, ParseException> {
    let bad = |msg: &str| ParseException::new(format!("{}: {}", msg, inner), line, column, 0);

    if inner.is_empty() {
        return Err(bad("bad substitution"));
    }

    // ${#NAME} — but ${#} is the positional count and ${#-…} etc. are
    // operators on ${#}.
    if let Some(rest) = inner.strip_prefix('#') {
        if !rest.is_empty() && param_name_len(rest) == rest.len() {
            return Ok(ParameterPart {
                name: rest.to_string(),
                op: Some(ParameterOp::Length),
            });
        }
    }

    let name_len = param_name_len(inner);
    if name_len == 0 {
        return Err(bad("bad substitution"));
    }
    let name = inner[..name_len].to_string();
    let rest = &inner[name_len..];
    if rest.is_empty() {
        return Ok(ParameterPart { name, op: None });
    }

    let parse_inner_word = |text: &str| -> Result<WordNode, ParseException> {
        parse_word(text, line, column)
    };

    // Switch-style operators, with and without the colon.
    let (check_empty, op_rest) = match rest.strip_prefix(':') {
        Some(r) if r.starts_with(['-', '=', '?', '+']) => (true, r),
        _ => (false, rest),
    };
    if check_empty || op_rest.starts_with(['-', '=', '?', '+']) {
        let kind = op_rest.chars().next().unwrap();
        let word_text = &op_rest[1..];
        let op = match kind {
            '-' => ParameterOp::DefaultValue {
                word: parse_inner_word(word_text)?,
                check_empty,
            },
            '=' => ParameterOp::AssignDefault {
                word: parse_inner_word(word_text)?,
                check_empty,
            },
            '?' => ParameterOp::ErrorIfUnset {
                word: if word_text.is_empty() {
                    None
                } else {
                    Some(parse_inner_word(word_text)?)
                },
                check_empty,
            },
            '+' => ParameterOp::UseAlternative {
                word: parse_inner_word(word_text)?,
                check_empty,
            },
            _ => unreachable!(),
        };
        return Ok(ParameterPart { name, op: Some(op) });
    }

    // ${NAME:offset[:length]} — substring when the text after the colon is
    // not a switch operator.
    if let Some(r) = rest.strip_prefix(':') {
        let (offset_text, length_text) = match split_top_level_colon(r) {
            Some((a, b)) => (a, Some(b)),
            None => (r.to_string(), None),
        };
        let offset = arith::parse(&offset_text).map_err(|e| bad(&e.to_string()))?;
        let length = match length_text {
            Some(t) => Some(arith::parse(&t).map_err(|e| bad(&e.to_string()))?),
            None => None,
        };
        return Ok(ParameterPart {
            name,
            op: Some(ParameterOp::Substring { offset, length }),
        });
    }

    // Trims: # ## % %%
    for (mark, side, longest) in [
        ("##", TrimSide::Prefix, true),
        ("#", TrimSide::Prefix, false),
        ("%%", TrimSide::Suffix, true),
        ("%", TrimSide::Suffix, false),
    ] {
        if let Some(pat) = rest.strip_prefix(mark) {
            return Ok(ParameterPart {
                name,
                op: Some(ParameterOp::Trim {
                    pattern: parse_inner_word(pat)?,
                    side,
                    longest,
                }),
            });
        }
    }

    // Replacement: /pat/rep and //pat/rep
    if let Some(r) = rest.strip_prefix('/') {
        let (all, r) = match r.strip_prefix('/') {
            Some(r2) => (true, r2),
            None => (false, r),
        };
        let (pattern_text, replacement_text) = match split_unescaped_slash(r) {
            Some((p, rep)) => (p, Some(rep)),
            None => (r.to_string(), None),
        };
        let replacement = match replacement_text {
            Some(t) => Some(parse_inner_word(&t)?),
            None => None,
        };
        return Ok(ParameterPart {
            name,
            op: Some(ParameterOp::Replace {
                pattern: parse_inner_word(&pattern_text)?,
                replacement,
                all,
            }),
        });
    }

    Err(bad("bad substitution"))
}

/// Length of the leading parameter name: identifier, digit run, or one
/// special character.
fn param_name_len(s: &str) -> usize {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => s
            .char_indices()
            .find(|(_, c)| !c.is_ascii_alphanumeric() && *c != '_')
            .map(|(i, _)| i)
            .unwrap_or(s.len()),
        Some(c) if c.is_ascii_digit() => s
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(s.len()),
        Some('?' | '$' | '!' | '#' | '@' | '*' | '-' | '_') => 1,
        _ => 0,
    }
}

/// Split `offset:length` on the first colon outside parens.
fn split_top_level_colon(s: &str) -> Option<(String, String)> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                return Some((s[..i].to_string(), s[i + 1..].to_string()));
            }
            _ => {}
        }
    }
    None
}

/// Split `pat/rep` on the first unescaped slash.
fn split_unescaped_slash(s: &str) -> Option<(String, String)> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '/' => return Some((s[..i].to_string(), s[i + 1..].to_string())),
            _ => {}
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
