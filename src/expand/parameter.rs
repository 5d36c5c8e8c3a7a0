//! Parameter Expansion
//!
//! `$NAME`, `${NAME}` and the braced operator forms: defaults, assignment,
//! error-if-unset, alternatives, length, substring, pattern trims and
//! replacement. `$@`/`$*` expand to explicit field lists so the
//! one-field-per-positional rule survives word splitting.

use crate::ast::{ParameterOp, ParameterPart, TrimSide};
use crate::expand::{arith, pattern, ExpandError};
use crate::state::ShellState;

/// The result of a parameter expansion: one string, or one field per
/// positional parameter for `$@` / `$*`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Single(String),
    Fields(Vec<String>),
}

impl ParamValue {
    pub fn joined(&self, sep: &str) -> String {
        match self {
            ParamValue::Single(s) => s.clone(),
            ParamValue::Fields(fields) => fields.join(sep),
        }
    }
}

/// Expand a parameter part.
pub fn expand(state: &mut ShellState, part: &ParameterPart) -> Result<ParamValue, ExpandError> {
    let name = part.name.as_str();

    if name == "@" || name == "*" {
        return expand_positional_list(state, part);
    }

    let value = lookup(state, name);

    let Some(op) = &part.op else {
        return match value {
            Some(v) => Ok(ParamValue::Single(v)),
            None => {
                if state.options.nounset {
                    Err(ExpandError::UnsetVariable(name.to_string()))
                } else {
                    Ok(ParamValue::Single(String::new()))
                }
            }
        };
    };

    match op {
        ParameterOp::DefaultValue { word, check_empty } => {
            if is_missing(&value, *check_empty) {
                Ok(ParamValue::Single(super::expand_word_single(state, word)?))
            } else {
                Ok(ParamValue::Single(value.unwrap_or_default()))
            }
        }
        ParameterOp::AssignDefault { word, check_empty } => {
            if is_missing(&value, *check_empty) {
                let default = super::expand_word_single(state, word)?;
                state
                    .assign(name, &default)
                    .map_err(|e| ExpandError::Readonly(e.name))?;
                Ok(ParamValue::Single(default))
            } else {
                Ok(ParamValue::Single(value.unwrap_or_default()))
            }
        }
        ParameterOp::ErrorIfUnset { word, check_empty } => {
            if is_missing(&value, *check_empty) {
                let message = match word {
                    Some(w) => super::expand_word_single(state, w)?,
                    None => "parameter null or not set".to_string(),
                };
                Err(ExpandError::ParameterNull {
                    name: name.to_string(),
                    message,
                })
            } else {
                Ok(ParamValue::Single(value.unwrap_or_default()))
            }
        }
        ParameterOp::UseAlternative { word, check_empty } => {
            if is_missing(&value, *check_empty) {
                Ok(ParamValue::Single(String::new()))
            } else {
                Ok(ParamValue::Single(super::expand_word_single(state, word)?))
            }
        }
        ParameterOp::Length => {
            nounset_guard(state, name, &value)?;
            let n = value.unwrap_or_default().chars().count();
            Ok(ParamValue::Single(n.to_string()))
        }
        ParameterOp::Substring { offset, length } => {
            nounset_guard(state, name, &value)?;
            let text = value.unwrap_or_default();
            Ok(ParamValue::Single(substring(state, &text, offset, length)?))
        }
        ParameterOp::Trim {
            pattern: pat_word,
            side,
            longest,
        } => {
            nounset_guard(state, name, &value)?;
            let text = value.unwrap_or_default();
            let pat = super::expand_word_to_pattern(state, pat_word)?;
            Ok(ParamValue::Single(trim(&text, &pat, *side, *longest)))
        }
        ParameterOp::Replace {
            pattern: pat_word,
            replacement,
            all,
        } => {
            nounset_guard(state, name, &value)?;
            let text = value.unwrap_or_default();
            let pat = super::expand_word_to_pattern(state, pat_word)?;
            let rep = match replacement {
                Some(w) => super::expand_word_single(state, w)?,
                None => String::new(),
            };
            Ok(ParamValue::Single(replace(&text, &pat, &rep, *all)))
        }
    }
}

/// `$@` / `$*`, with the list-slicing and per-element operator behaviour.
fn expand_positional_list(
    state: &mut ShellState,
    part: &ParameterPart,
) -> Result<ParamValue, ExpandError> {
    let fields: Vec<String> = state.positional.clone();

    let Some(op) = &part.op else {
        return Ok(ParamValue::Fields(fields));
    };

    match op {
        ParameterOp::Length => Ok(ParamValue::Single(fields.len().to_string())),
        ParameterOp::Substring { offset, length } => {
            // Slicing the list: index 0 is $0.
            let mut all = vec![state.arg0.clone()];
            all.extend(fields);
            let start = arith::eval(state, offset)?;
            let start = if start < 0 {
                (all.len() as i64 + start).max(0) as usize
            } else {
                (start as usize).min(all.len())
            };
            let end = match length {
                Some(l) => {
                    let n = arith::eval(state, l)?.max(0) as usize;
                    (start + n).min(all.len())
                }
                None => all.len(),
            };
            Ok(ParamValue::Fields(all[start..end].to_vec()))
        }
        ParameterOp::Trim {
            pattern: pat_word,
            side,
            longest,
        } => {
            let pat = super::expand_word_to_pattern(state, pat_word)?;
            Ok(ParamValue::Fields(
                fields
                    .iter()
                    .map(|f| trim(f, &pat, *side, *longest))
                    .collect(),
            ))
        }
        ParameterOp::Replace {
            pattern: pat_word,
            replacement,
            all,
        } => {
            let pat = super::expand_word_to_pattern(state, pat_word)?;
            let rep = match replacement {
                Some(w) => super::expand_word_single(state, w)?,
                None => String::new(),
            };
            Ok(ParamValue::Fields(
                fields.iter().map(|f| replace(f, &pat, &rep, *all)).collect(),
            ))
        }
        ParameterOp::DefaultValue { word, check_empty } => {
            if fields.is_empty() || (*check_empty && fields.iter().all(|f| f.is_empty())) {
                Ok(ParamValue::Single(super::expand_word_single(state, word)?))
            } else {
                Ok(ParamValue::Fields(fields))
            }
        }
        ParameterOp::UseAlternative { word, check_empty } => {
            if fields.is_empty() || (*check_empty && fields.iter().all(|f| f.is_empty())) {
                Ok(ParamValue::Single(String::new()))
            } else {
                Ok(ParamValue::Single(super::expand_word_single(state, word)?))
            }
        }
        _ => Ok(ParamValue::Fields(fields)),
    }
}

/// Resolve a plain parameter name to its value.
fn lookup(state: &mut ShellState, name: &str) -> Option<String> {
    if name.chars().all(|c| c.is_ascii_digit()) && name.len() <= 9 {
        let index: usize = name.parse().ok()?;
        return state.positional_get(index).map(|s| s.to_string());
    }
    if let Some(v) = state.special_value(name) {
        return Some(v);
    }
    if let Some(v) = state.dynamic_value(name) {
        return Some(v);
    }
    state.env.value(name).map(|s| s.to_string())
}

fn is_missing(value: &Option<String>, check_empty: bool) -> bool {
    match value {
        None => true,
        Some(v) => check_empty && v.is_empty(),
    }
}

fn nounset_guard(
    state: &ShellState,
    name: &str,
    value: &Option<String>,
) -> Result<(), ExpandError> {
    if value.is_none() && state.options.nounset {
        Err(ExpandError::UnsetVariable(name.to_string()))
    } else {
        Ok(())
    }
}

fn substring(
    state: &mut ShellState,
    text: &str,
    offset: &crate::ast::ArithExpr,
    length: &Option<crate::ast::ArithExpr>,
) -> Result<String, ExpandError> {
    let chars: Vec<char> = text.chars().collect();
    let offset = arith::eval(state, offset)?;
    let start = if offset < 0 {
        (chars.len() as i64 + offset).max(0) as usize
    } else {
        (offset as usize).min(chars.len())
    };
    let end = match length {
        Some(l) => {
            let n = arith::eval(state, l)?;
            if n < 0 {
                // Negative length counts back from the end.
                ((chars.len() as i64 + n).max(start as i64)) as usize
            } else {
                (start + n as usize).min(chars.len())
            }
        }
        None => chars.len(),
    };
    Ok(chars[start..end.max(start)].iter().collect())
}

fn trim(text: &str, pat: &str, side: TrimSide, longest: bool) -> String {
    match side {
        TrimSide::Prefix => match pattern::match_prefix_len(pat, text, longest) {
            Some(n) => text[n..].to_string(),
            None => text.to_string(),
        },
        TrimSide::Suffix => match pattern::match_suffix_start(pat, text, longest) {
            Some(n) => text[..n].to_string(),
            None => text.to_string(),
        },
    }
}

fn replace(text: &str, pat: &str, rep: &str, all: bool) -> String {
    let mut out = String::new();
    let mut pos = 0;
    loop {
        match pattern::find_match(pat, text, pos) {
            Some((start, end)) => {
                out.push_str(&text[pos..start]);
                out.push_str(rep);
                // An empty match still has to make progress.
                if end == start {
                    match text[start..].chars().next() {
                        Some(c) => {
                            out.push(c);
                            pos = start + c.len_utf8();
                        }
                        None => break,
                    }
                } else {
                    pos = end;
                }
                if !all {
                    out.push_str(&text[pos..]);
                    return out;
                }
            }
            None => {
                out.push_str(&text[pos..]);
                return out;
            }
        }
        if pos >= text.len() && all {
            return out;
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(vars: &[(&str, &str)]) -> ShellState {
        let mut state = ShellState::new("den");
        for (k, v) in vars {
            state.assign(k, v).unwrap();
        }
        state
    }

    fn expand_text(state: &mut ShellState, text: &str) -> Result<ParamValue, ExpandError> {
        let word = crate::parser::word::parse_word(text, 1, 1).unwrap();
        match &word.parts[0] {
            crate::ast::WordPart::Parameter(p) => expand(state, p),
            other => panic!("not a parameter: {:?}", other),
        }
    }

    #[test]
    fn plain_lookup() {
        let mut state = state_with(&[("X", "hello")]);
        assert_eq!(
            expand_text(&mut state, "$X").unwrap(),
            ParamValue::Single("hello".into())
        );
        assert_eq!(
            expand_text(&mut state, "$UNSET_THING").unwrap(),
            ParamValue::Single("".into())
        );
    }

    #[test]
    fn nounset_errors_on_unset() {
        let mut state = state_with(&[]);
        state.options.nounset = true;
        assert!(matches!(
            expand_text(&mut state, "$NOPE"),
            Err(ExpandError::UnsetVariable(_))
        ));
        // Defaults still apply.
        assert_eq!(
            expand_text(&mut state, "${NOPE:-ok}").unwrap(),
            ParamValue::Single("ok".into())
        );
    }

    #[test]
    fn default_and_assign() {
        let mut state = state_with(&[("EMPTY", "")]);
        assert_eq!(
            expand_text(&mut state, "${EMPTY:-fallback}").unwrap(),
            ParamValue::Single("fallback".into())
        );
        assert_eq!(
            expand_text(&mut state, "${EMPTY-fallback}").unwrap(),
            ParamValue::Single("".into())
        );
        assert_eq!(
            expand_text(&mut state, "${NEWVAR:=assigned}").unwrap(),
            ParamValue::Single("assigned".into())
        );
        assert_eq!(state.env.value("NEWVAR"), Some("assigned"));
    }

    #[test]
    fn error_if_unset() {
        let mut state = state_with(&[]);
        match expand_text(&mut state, "${GONE:?not configured}") {
            Err(ExpandError::ParameterNull { name, message }) => {
                assert_eq!(name, "GONE");
                assert_eq!(message, "not configured");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn alternative() {
        let mut state = state_with(&[("SET", "x")]);
        assert_eq!(
            expand_text(&mut state, "${SET:+alt}").unwrap(),
            ParamValue::Single("alt".into())
        );
        assert_eq!(
            expand_text(&mut state, "${MISSING:+alt}").unwrap(),
            ParamValue::Single("".into())
        );
    }

    #[test]
    fn length() {
        let mut state = state_with(&[("X", "héllo")]);
        assert_eq!(
            expand_text(&mut state, "${#X}").unwrap(),
            ParamValue::Single("5".into())
        );
    }

    #[test]
    fn substring_ops() {
        let mut state = state_with(&[("X", "abcdef")]);
        assert_eq!(
            expand_text(&mut state, "${X:2}").unwrap(),
            ParamValue::Single("cdef".into())
        );
        assert_eq!(
            expand_text(&mut state, "${X:1:3}").unwrap(),
            ParamValue::Single("bcd".into())
        );
        assert_eq!(
            expand_text(&mut state, "${X:0-2}").unwrap(),
            ParamValue::Single("ef".into())
        );
        assert_eq!(
            expand_text(&mut state, "${X:9}").unwrap(),
            ParamValue::Single("".into())
        );
    }

    #[test]
    fn trims() {
        let mut state = state_with(&[("P", "a/b/c.txt")]);
        assert_eq!(
            expand_text(&mut state, "${P#*/}").unwrap(),
            ParamValue::Single("b/c.txt".into())
        );
        assert_eq!(
            expand_text(&mut state, "${P##*/}").unwrap(),
            ParamValue::Single("c.txt".into())
        );
        assert_eq!(
            expand_text(&mut state, "${P%.txt}").unwrap(),
            ParamValue::Single("a/b/c".into())
        );
        assert_eq!(
            expand_text(&mut state, "${P%%/*}").unwrap(),
            ParamValue::Single("a".into())
        );
    }

    #[test]
    fn replaces() {
        let mut state = state_with(&[("X", "one two two")]);
        assert_eq!(
            expand_text(&mut state, "${X/two/2}").unwrap(),
            ParamValue::Single("one 2 two".into())
        );
        assert_eq!(
            expand_text(&mut state, "${X//two/2}").unwrap(),
            ParamValue::Single("one 2 2".into())
        );
        assert_eq!(
            expand_text(&mut state, "${X/nothing/y}").unwrap(),
            ParamValue::Single("one two two".into())
        );
    }

    #[test]
    fn positional_fields() {
        let mut state = state_with(&[]);
        state.positional = vec!["a".into(), "b c".into(), "d".into()];
        assert_eq!(
            expand_text(&mut state, "$@").unwrap(),
            ParamValue::Fields(vec!["a".into(), "b c".into(), "d".into()])
        );
        assert_eq!(
            expand_text(&mut state, "${#@}").unwrap(),
            ParamValue::Single("3".into())
        );
    }

    #[test]
    fn positional_slice() {
        let mut state = state_with(&[]);
        state.positional = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(
            expand_text(&mut state, "${@:2}").unwrap(),
            ParamValue::Fields(vec!["b".into(), "c".into()])
        );
        assert_eq!(
            expand_text(&mut state, "${@:1:2}").unwrap(),
            ParamValue::Fields(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            expand_text(&mut state, "${@:0:1}").unwrap(),
            ParamValue::Fields(vec!["den".into()])
        );
    }

    #[test]
    fn positional_lookup_by_number() {
        let mut state = state_with(&[]);
        state.positional = vec!["first".into()];
        assert_eq!(
            expand_text(&mut state, "$1").unwrap(),
            ParamValue::Single("first".into())
        );
        assert_eq!(
            expand_text(&mut state, "$2").unwrap(),
            ParamValue::Single("".into())
        );
        assert_eq!(
            expand_text(&mut state, "$0").unwrap(),
            ParamValue::Single("den".into())
        );
    }
}
