//! Expansion Engine
//!
//! Takes parsed words through the POSIX expansion order: brace, tilde,
//! parameter, arithmetic, command and process substitution, word
//! splitting, pathname expansion, quote removal. Fields are assembled from
//! quote-tracked segments so quoted text never splits or globs, and
//! `"$@"` keeps one field per positional parameter all the way through.

pub mod arith;
pub mod brace;
pub mod cache;
pub mod glob;
pub mod parameter;
pub mod pattern;
pub mod tilde;

use thiserror::Error;

use crate::ast::{ArithExpr, WordNode, WordPart};
use crate::expand::parameter::ParamValue;
use crate::state::ShellState;

#[derive(Debug, Clone, Error)]
pub enum ExpandError {
    #[error("{0}: unbound variable")]
    UnsetVariable(String),
    #[error("{name}: {message}")]
    ParameterNull { name: String, message: String },
    #[error("{0}: readonly variable")]
    Readonly(String),
    #[error(transparent)]
    Arith(#[from] arith::ArithError),
    #[error("command substitution: {0}")]
    Subshell(String),
    #[error("process substitution: {0}")]
    ProcessSubst(String),
}

/// One expanded piece of a word, before field splitting.
#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Text { text: String, quoted: bool },
    /// Hard field boundary produced by `$@`.
    Break,
}

/// A field being assembled: the literal text plus a pattern form in which
/// quoted characters are backslash-escaped.
#[derive(Debug, Clone, Default)]
struct FieldBuf {
    text: String,
    pat: String,
    /// Quoted content makes a field real even when empty ("" survives).
    has_quoted: bool,
}

impl FieldBuf {
    fn push(&mut self, text: &str, quoted: bool) {
        self.text.push_str(text);
        if quoted {
            for c in text.chars() {
                if matches!(c, '*' | '?' | '[' | ']' | '(' | ')' | '|' | '~' | '\\') {
                    self.pat.push('\\');
                }
                self.pat.push(c);
            }
            self.has_quoted = true;
        } else {
            self.pat.push_str(text);
        }
    }

    fn is_live(&self) -> bool {
        self.has_quoted || !self.text.is_empty()
    }
}

/// Full expansion of a word list into command fields.
pub fn expand_words(
    state: &mut ShellState,
    words: &[WordNode],
) -> Result<Vec<String>, ExpandError> {
    let mut fields = Vec::new();
    for word in words {
        for braced in brace::expand(word) {
            let mut pieces = Vec::new();
            expand_parts(state, &braced.parts, false, &mut pieces)?;
            for field in split_fields(state, pieces) {
                finish_field(state, field, &mut fields);
            }
        }
    }
    Ok(fields)
}

/// Expansion producing exactly one string: no brace multiplication, no
/// splitting, no pathname expansion. Used for assignment values,
/// redirection targets, and here-doc bodies.
pub fn expand_word_single(
    state: &mut ShellState,
    word: &WordNode,
) -> Result<String, ExpandError> {
    let mut pieces = Vec::new();
    expand_parts(state, &word.parts, false, &mut pieces)?;
    let mut out = String::new();
    let mut first = true;
    for piece in pieces {
        match piece {
            Piece::Text { text, .. } => out.push_str(&text),
            Piece::Break => {
                if !first {
                    out.push(' ');
                }
            }
        }
        first = false;
    }
    Ok(out)
}

/// Expansion producing a glob pattern: quoted characters are escaped so
/// they match literally. Used for case patterns and `${var#pat}` forms.
pub fn expand_word_to_pattern(
    state: &mut ShellState,
    word: &WordNode,
) -> Result<String, ExpandError> {
    let mut pieces = Vec::new();
    expand_parts(state, &word.parts, false, &mut pieces)?;
    let mut buf = FieldBuf::default();
    for piece in pieces {
        match piece {
            Piece::Text { text, quoted } => buf.push(&text, quoted),
            Piece::Break => buf.push(" ", false),
        }
    }
    Ok(buf.pat)
}

// ----------------------------------------------------------------------
// Parts → pieces
// ----------------------------------------------------------------------

fn expand_parts(
    state: &mut ShellState,
    parts: &[WordPart],
    in_quotes: bool,
    pieces: &mut Vec<Piece>,
) -> Result<(), ExpandError> {
    for part in parts {
        match part {
            WordPart::Literal(text) => pieces.push(Piece::Text {
                text: text.clone(),
                quoted: in_quotes,
            }),
            WordPart::SingleQuoted(text) => pieces.push(Piece::Text {
                text: text.clone(),
                quoted: true,
            }),
            WordPart::Escaped(text) => pieces.push(Piece::Text {
                text: text.clone(),
                quoted: true,
            }),
            WordPart::DoubleQuoted(inner) => {
                // An empty "" still creates a field.
                if inner.is_empty() {
                    pieces.push(Piece::Text {
                        text: String::new(),
                        quoted: true,
                    });
                } else {
                    expand_parts(state, inner, true, pieces)?;
                }
            }
            WordPart::Tilde(name) => {
                let text = match tilde::expand(state, name.as_deref()) {
                    Some(path) => path,
                    None => match name {
                        Some(n) => format!("~{}", n),
                        None => "~".to_string(),
                    },
                };
                pieces.push(Piece::Text { text, quoted: true });
            }
            WordPart::Parameter(p) => match parameter::expand(state, p)? {
                ParamValue::Single(text) => pieces.push(Piece::Text {
                    text,
                    quoted: in_quotes,
                }),
                ParamValue::Fields(fields) => {
                    push_positional_fields(state, p.name == "*", fields, in_quotes, pieces);
                }
            },
            WordPart::Arithmetic(expr) => {
                let value = eval_arith_cached(state, expr)?;
                pieces.push(Piece::Text {
                    text: value.to_string(),
                    quoted: in_quotes,
                });
            }
            WordPart::CommandSubst(subst) => {
                let output = crate::exec::subshell::command_substitution(state, &subst.body)
                    .map_err(|e| ExpandError::Subshell(e.to_string()))?;
                pieces.push(Piece::Text {
                    text: output,
                    quoted: in_quotes,
                });
            }
            WordPart::ProcessSubst(subst) => {
                let path = crate::exec::subshell::process_substitution(state, subst)
                    .map_err(|e| ExpandError::ProcessSubst(e.to_string()))?;
                pieces.push(Piece::Text {
                    text: path,
                    quoted: true,
                });
            }
            WordPart::Brace(_) => {
                // Reached only through the no-split paths; braces are
                // literal there.
                pieces.push(Piece::Text {
                    text: part.to_string(),
                    quoted: in_quotes,
                });
            }
        }
    }
    Ok(())
}

/// `$@`/`$*` field emission: quoted `$*` joins on the first IFS character,
/// everything else becomes separate fields.
fn push_positional_fields(
    state: &ShellState,
    star: bool,
    fields: Vec<String>,
    in_quotes: bool,
    pieces: &mut Vec<Piece>,
) {
    if in_quotes && star {
        let sep = state.ifs().chars().next().map(String::from).unwrap_or_default();
        pieces.push(Piece::Text {
            text: fields.join(&sep),
            quoted: true,
        });
        return;
    }
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            pieces.push(Piece::Break);
        }
        pieces.push(Piece::Text {
            text: field,
            quoted: in_quotes,
        });
    }
}

/// Pure arithmetic goes through the LRU cache; anything with side effects
/// evaluates directly.
fn eval_arith_cached(state: &mut ShellState, expr: &ArithExpr) -> Result<i64, ExpandError> {
    if !arith_is_pure(expr) {
        return Ok(arith::eval(state, expr)?);
    }
    let mut names = Vec::new();
    arith_free_vars(expr, &mut names);
    names.sort();
    names.dedup();
    let snapshot: String = names
        .iter()
        .map(|n| format!("{}={};", n, state.env.value(n).unwrap_or("")))
        .collect();
    let key = (expr.to_string(), snapshot);
    if let Some(v) = state.caches.arith.get(&key) {
        return Ok(v);
    }
    let v = arith::eval(state, expr)?;
    state.caches.arith.put(key, v);
    Ok(v)
}

fn arith_is_pure(expr: &ArithExpr) -> bool {
    match expr {
        ArithExpr::Number(_) => true,
        // Dynamic variables change between reads.
        ArithExpr::Variable(name) => !matches!(name.as_str(), "RANDOM" | "SECONDS" | "LINENO"),
        ArithExpr::Unary { op, operand, .. } => {
            !matches!(
                op,
                crate::ast::ArithUnaryOp::Inc | crate::ast::ArithUnaryOp::Dec
            ) && arith_is_pure(operand)
        }
        ArithExpr::Binary { left, right, .. } => arith_is_pure(left) && arith_is_pure(right),
        ArithExpr::Ternary {
            condition,
            consequent,
            alternate,
        } => arith_is_pure(condition) && arith_is_pure(consequent) && arith_is_pure(alternate),
        ArithExpr::Assignment { .. } => false,
        ArithExpr::Group(inner) => arith_is_pure(inner),
    }
}

fn arith_free_vars(expr: &ArithExpr, out: &mut Vec<String>) {
    match expr {
        ArithExpr::Number(_) => {}
        ArithExpr::Variable(name) => out.push(name.clone()),
        ArithExpr::Unary { operand, .. } => arith_free_vars(operand, out),
        ArithExpr::Binary { left, right, .. } => {
            arith_free_vars(left, out);
            arith_free_vars(right, out);
        }
        ArithExpr::Ternary {
            condition,
            consequent,
            alternate,
        } => {
            arith_free_vars(condition, out);
            arith_free_vars(consequent, out);
            arith_free_vars(alternate, out);
        }
        ArithExpr::Assignment { value, .. } => arith_free_vars(value, out),
        ArithExpr::Group(inner) => arith_free_vars(inner, out),
    }
}

// ----------------------------------------------------------------------
// Field splitting & pathname expansion
// ----------------------------------------------------------------------

fn split_fields(state: &ShellState, pieces: Vec<Piece>) -> Vec<FieldBuf> {
    let ifs = state.ifs();
    let mut fields = Vec::new();
    let mut current = FieldBuf::default();

    for piece in pieces {
        match piece {
            Piece::Break => {
                // $@ boundaries always delimit, even between empty fields.
                fields.push(std::mem::take(&mut current));
            }
            Piece::Text { text, quoted } => {
                if quoted || ifs.is_empty() {
                    current.push(&text, quoted);
                    continue;
                }
                let mut chunk = String::new();
                for c in text.chars() {
                    if ifs.contains(c) {
                        current.push(&chunk, false);
                        chunk.clear();
                        if current.is_live() {
                            fields.push(std::mem::take(&mut current));
                        } else if !c.is_whitespace() {
                            // Non-whitespace separators delimit empty
                            // fields; whitespace runs collapse.
                            fields.push(std::mem::take(&mut current));
                        } else {
                            current = FieldBuf::default();
                        }
                    } else {
                        chunk.push(c);
                    }
                }
                current.push(&chunk, false);
            }
        }
    }

    if current.is_live() {
        fields.push(current);
    }
    fields
}

/// Apply pathname expansion and quote removal to one finished field.
fn finish_field(state: &mut ShellState, field: FieldBuf, out: &mut Vec<String>) {
    if state.options.noglob || !pattern::has_glob_chars(&field.pat) {
        out.push(field.text);
        return;
    }

    let cwd = state.cwd();
    let key = (cwd.clone(), field.pat.clone());
    if let Some(cached) = state.caches.glob.get(&key) {
        out.extend(cached);
        return;
    }

    match glob::expand(&cwd, &field.pat) {
        Some(matches) => {
            state.caches.glob.put(key, matches.clone());
            out.extend(matches);
        }
        // Keep the literal text when nothing matches.
        None => out.push(field.text),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::word::parse_word;

    fn fields(state: &mut ShellState, text: &str) -> Vec<String> {
        let word = parse_word(text, 1, 1).unwrap();
        expand_words(state, &[word]).unwrap()
    }

    fn fresh() -> ShellState {
        let mut state = ShellState::new("den");
        state.options.noglob = true;
        state
    }

    #[test]
    fn unquoted_expansion_splits() {
        let mut state = fresh();
        state.assign("A", "one two three").unwrap();
        assert_eq!(fields(&mut state, "$A"), vec!["one", "two", "three"]);
    }

    #[test]
    fn quoted_expansion_does_not_split() {
        let mut state = fresh();
        state.assign("A", "one two").unwrap();
        assert_eq!(fields(&mut state, "\"$A\""), vec!["one two"]);
    }

    #[test]
    fn empty_unquoted_vanishes_quoted_survives() {
        let mut state = fresh();
        state.assign("E", "").unwrap();
        assert!(fields(&mut state, "$E").is_empty());
        assert_eq!(fields(&mut state, "\"$E\""), vec![""]);
        assert_eq!(fields(&mut state, "\"\""), vec![""]);
    }

    #[test]
    fn quoted_at_keeps_field_identity() {
        let mut state = fresh();
        state.positional = vec!["a b".into(), "c".into()];
        assert_eq!(fields(&mut state, "\"$@\""), vec!["a b", "c"]);
    }

    #[test]
    fn quoted_star_joins() {
        let mut state = fresh();
        state.positional = vec!["a".into(), "b".into()];
        assert_eq!(fields(&mut state, "\"$*\""), vec!["a b"]);
    }

    #[test]
    fn unquoted_at_splits_each_field() {
        let mut state = fresh();
        state.positional = vec!["a b".into(), "c".into()];
        assert_eq!(fields(&mut state, "$@"), vec!["a", "b", "c"]);
    }

    #[test]
    fn custom_ifs() {
        let mut state = fresh();
        state.assign("IFS", ":").unwrap();
        state.assign("P", "/bin:/usr/bin::/sbin").unwrap();
        assert_eq!(
            fields(&mut state, "$P"),
            vec!["/bin", "/usr/bin", "", "/sbin"]
        );
    }

    #[test]
    fn single_quotes_suppress_everything() {
        let mut state = fresh();
        state.assign("X", "value").unwrap();
        assert_eq!(fields(&mut state, "'$X'"), vec!["$X"]);
    }

    #[test]
    fn arithmetic_in_word() {
        let mut state = fresh();
        assert_eq!(fields(&mut state, "n$((2+3))"), vec!["n5"]);
    }

    #[test]
    fn tilde_expands_unquoted_only() {
        let mut state = fresh();
        state.env.set("HOME", "/home/me").unwrap();
        assert_eq!(fields(&mut state, "~"), vec!["/home/me"]);
        assert_eq!(fields(&mut state, "~/src"), vec!["/home/me/src"]);
        assert_eq!(fields(&mut state, "\"~\""), vec!["~"]);
    }

    #[test]
    fn brace_then_parameter() {
        let mut state = fresh();
        state.assign("X", "v").unwrap();
        assert_eq!(fields(&mut state, "{$X,y}"), vec!["v", "y"]);
    }

    #[test]
    fn single_word_expansion_joins() {
        let mut state = fresh();
        state.positional = vec!["a".into(), "b".into()];
        let word = parse_word("$@", 1, 1).unwrap();
        assert_eq!(expand_word_single(&mut state, &word).unwrap(), "a b");
    }

    #[test]
    fn pattern_expansion_escapes_quoted() {
        let mut state = fresh();
        state.assign("P", "*").unwrap();
        let word = parse_word("\"$P\"x*", 1, 1).unwrap();
        assert_eq!(expand_word_to_pattern(&mut state, &word).unwrap(), "\\*x*");
    }

    #[test]
    fn arith_cache_hits_for_pure_expressions() {
        let mut state = fresh();
        state.assign("n", "4").unwrap();
        assert_eq!(fields(&mut state, "$((n*2))"), vec!["8"]);
        assert_eq!(state.caches.arith.len(), 1);
        assert_eq!(fields(&mut state, "$((n*2))"), vec!["8"]);
        assert_eq!(state.caches.arith.len(), 1);
        // A new value invalidates the caches entirely.
        state.assign("n", "5").unwrap();
        assert_eq!(fields(&mut state, "$((n*2))"), vec!["10"]);
    }
}
