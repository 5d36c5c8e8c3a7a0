//! Brace Expansion
//!
//! `{a,b,c}` lists, `{n..m[..step]}` numeric sequences (with zero-padding
//! preserved), `{a..z}` character sequences, nesting, and cartesian
//! products when a word carries several brace parts. Runs before every
//! other expansion and only on unquoted parts, which the parser already
//! guarantees by construction.

use crate::ast::{BraceEndpoint, BracePart, BraceRange, WordNode, WordPart};

/// Expand one word into the list of words it generates.
pub fn expand(word: &WordNode) -> Vec<WordNode> {
    expand_parts(&word.parts)
        .into_iter()
        .map(|parts| WordNode { parts })
        .collect()
}

fn expand_parts(parts: &[WordPart]) -> Vec<Vec<WordPart>> {
    let Some((index, brace)) = parts.iter().enumerate().find_map(|(i, p)| match p {
        WordPart::Brace(b) => Some((i, b)),
        _ => None,
    }) else {
        return vec![parts.to_vec()];
    };

    let prefix = &parts[..index];
    let alternatives = alternatives_for(brace);
    let tails = expand_parts(&parts[index + 1..]);

    let mut results = Vec::new();
    for alt in &alternatives {
        // The alternative may itself contain brace parts ({a,b{c,d}}).
        for alt_expansion in expand_parts(alt) {
            for tail in &tails {
                let mut combined = prefix.to_vec();
                combined.extend(alt_expansion.clone());
                combined.extend(tail.clone());
                results.push(combined);
            }
        }
    }
    results
}

fn alternatives_for(brace: &BracePart) -> Vec<Vec<WordPart>> {
    match brace {
        BracePart::List(items) => items.iter().map(|w| w.parts.clone()).collect(),
        BracePart::Range(range) => range_items(range)
            .into_iter()
            .map(|text| vec![WordPart::Literal(text)])
            .collect(),
    }
}

fn range_items(range: &BraceRange) -> Vec<String> {
    match (range.start, range.end) {
        (BraceEndpoint::Number(a), BraceEndpoint::Number(b)) => {
            let step = normalize_step(range.step, a <= b);
            let mut out = Vec::new();
            let mut v = a;
            loop {
                out.push(match range.pad_width {
                    Some(width) => format!("{:0width$}", v, width = width),
                    None => v.to_string(),
                });
                let next = v.saturating_add(step);
                if (step > 0 && next > b) || (step < 0 && next < b) || step == 0 {
                    break;
                }
                v = next;
            }
            out
        }
        (BraceEndpoint::Char(a), BraceEndpoint::Char(b)) => {
            let step = normalize_step(range.step, a <= b).unsigned_abs() as u32;
            let (a, b) = (a as u32, b as u32);
            let mut out = Vec::new();
            let mut v = a;
            loop {
                if let Some(c) = char::from_u32(v) {
                    out.push(c.to_string());
                }
                let done = if a <= b {
                    v + step > b
                } else {
                    v < b + step
                };
                if done || step == 0 {
                    break;
                }
                if a <= b {
                    v += step;
                } else {
                    v -= step;
                }
            }
            out
        }
        // Mixed endpoints never parse, but stay safe.
        _ => Vec::new(),
    }
}

fn normalize_step(step: Option<i64>, ascending: bool) -> i64 {
    let magnitude = step.unwrap_or(1).abs().max(1);
    if ascending {
        magnitude
    } else {
        -magnitude
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::word::parse_word;

    fn expand_text(text: &str) -> Vec<String> {
        let word = parse_word(text, 1, 1).unwrap();
        expand(&word).iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn simple_list() {
        assert_eq!(expand_text("{a,b,c}"), vec!["a", "b", "c"]);
    }

    #[test]
    fn prefix_and_suffix() {
        assert_eq!(
            expand_text("x{a,b}.txt"),
            vec!["xa.txt", "xb.txt"]
        );
    }

    #[test]
    fn numeric_range() {
        assert_eq!(expand_text("{1..4}"), vec!["1", "2", "3", "4"]);
        assert_eq!(expand_text("{4..1}"), vec!["4", "3", "2", "1"]);
    }

    #[test]
    fn padded_range_keeps_width() {
        assert_eq!(expand_text("{01..03}"), vec!["01", "02", "03"]);
        assert_eq!(expand_text("{08..10}"), vec!["08", "09", "10"]);
    }

    #[test]
    fn stepped_range() {
        assert_eq!(expand_text("{1..10..3}"), vec!["1", "4", "7", "10"]);
        assert_eq!(expand_text("{10..1..3}"), vec!["10", "7", "4", "1"]);
    }

    #[test]
    fn char_range() {
        assert_eq!(expand_text("{a..c}"), vec!["a", "b", "c"]);
        assert_eq!(expand_text("{c..a}"), vec!["c", "b", "a"]);
    }

    #[test]
    fn cartesian_product() {
        assert_eq!(
            expand_text("{1..3}{x,y}"),
            vec!["1x", "1y", "2x", "2y", "3x", "3y"]
        );
    }

    #[test]
    fn nested_braces() {
        assert_eq!(expand_text("{a,b{c,d}}"), vec!["a", "bc", "bd"]);
    }

    #[test]
    fn no_brace_passthrough() {
        assert_eq!(expand_text("plain"), vec!["plain"]);
    }

    #[test]
    fn empty_alternative() {
        assert_eq!(expand_text("a{,b}"), vec!["a", "ab"]);
    }
}
