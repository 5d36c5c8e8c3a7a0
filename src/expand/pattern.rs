//! Glob Pattern Matching
//!
//! The matcher behind case patterns, `${var#pat}`-style trims, and
//! pathname expansion. Supported syntax: `*`, `?`, `[set]` / `[!set]` with
//! ranges and POSIX classes, `**` (crosses `/` in pathname mode),
//! alternation `(a|b)`, and exclusion `pat~exclude`. Trailing type
//! qualifiers for pathname expansion — `(/)`, `(*)`, `(@)`, `(.)` — are
//! recognised by [`split_qualifier`] and applied by the glob walker, not
//! here.

/// File-type qualifier on a pathname pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeQualifier {
    /// `(/)` directories only
    Directory,
    /// `(*)` executable regular files only
    Executable,
    /// `(@)` symlinks only
    Symlink,
    /// `(.)` regular files only
    Regular,
}

/// Strip a trailing `(/) (*) (@) (.)` qualifier from a pattern.
pub fn split_qualifier(pattern: &str) -> (&str, Option<TypeQualifier>) {
    for (suffix, qualifier) in [
        ("(/)", TypeQualifier::Directory),
        ("(*)", TypeQualifier::Executable),
        ("(@)", TypeQualifier::Symlink),
        ("(.)", TypeQualifier::Regular),
    ] {
        if let Some(rest) = pattern.strip_suffix(suffix) {
            // `(a|b)` endings are alternation, not a qualifier; a qualifier
            // needs something before it.
            if !rest.is_empty() {
                return (rest, Some(qualifier));
            }
        }
    }
    (pattern, None)
}

/// Does the text contain unescaped glob syntax?
pub fn has_glob_chars(pattern: &str) -> bool {
    let mut escaped = false;
    for c in pattern.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '*' | '?' | '[' | '(' | '~' => return true,
            _ => {}
        }
    }
    false
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Literal(char),
    AnyChar,
    Star,
    /// `**` — also matches `/` in pathname mode
    GlobStar,
    Class { negated: bool, items: Vec<ClassItem> },
    Alt(Vec<Vec<Tok>>),
}

#[derive(Debug, Clone, PartialEq)]
enum ClassItem {
    Char(char),
    Range(char, char),
    Named(String),
}

/// A compiled pattern: the positive part plus optional exclusions.
#[derive(Debug, Clone)]
pub struct Pattern {
    positive: Vec<Tok>,
    excludes: Vec<Vec<Tok>>,
    path_mode: bool,
}

impl Pattern {
    /// Compile for plain string matching (`case`, trims, replaces).
    pub fn new(pattern: &str) -> Self {
        Self::compile(pattern, false)
    }

    /// Compile for pathname matching: `**` crosses separators.
    pub fn new_path(pattern: &str) -> Self {
        Self::compile(pattern, true)
    }

    fn compile(pattern: &str, path_mode: bool) -> Self {
        let mut branches = split_top_level_tilde(pattern);
        let positive = parse_tokens(&branches.remove(0));
        let excludes = branches.iter().map(|p| parse_tokens(p)).collect();
        Pattern {
            positive,
            excludes,
            path_mode,
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        if !match_tokens(&self.positive, &chars, 0, 0, self.path_mode) {
            return false;
        }
        !self
            .excludes
            .iter()
            .any(|ex| match_tokens(ex, &chars, 0, 0, self.path_mode))
    }
}

/// Convenience wrapper for one-shot matching.
pub fn matches(pattern: &str, text: &str) -> bool {
    Pattern::new(pattern).matches(text)
}

/// Length of the shortest/longest prefix of `text` matching `pattern`,
/// for `${var#pat}` / `${var##pat}`.
pub fn match_prefix_len(pattern: &str, text: &str, longest: bool) -> Option<usize> {
    let p = Pattern::new(pattern);
    let chars: Vec<char> = text.chars().collect();
    let byte_index = |n: usize| chars[..n].iter().map(|c| c.len_utf8()).sum::<usize>();
    let range: Vec<usize> = if longest {
        (0..=chars.len()).rev().collect()
    } else {
        (0..=chars.len()).collect()
    };
    for n in range {
        let prefix: String = chars[..n].iter().collect();
        if p.matches(&prefix) {
            return Some(byte_index(n));
        }
    }
    None
}

/// Byte offset where the shortest/longest matching suffix begins, for
/// `${var%pat}` / `${var%%pat}`.
pub fn match_suffix_start(pattern: &str, text: &str, longest: bool) -> Option<usize> {
    let p = Pattern::new(pattern);
    let chars: Vec<char> = text.chars().collect();
    let byte_index = |n: usize| chars[..n].iter().map(|c| c.len_utf8()).sum::<usize>();
    let range: Vec<usize> = if longest {
        (0..=chars.len()).collect()
    } else {
        (0..=chars.len()).rev().collect()
    };
    for start in range {
        let suffix: String = chars[start..].iter().collect();
        if p.matches(&suffix) {
            return Some(byte_index(start));
        }
    }
    None
}

/// Leftmost-longest match inside `text`, as a byte range, for
/// `${var/pat/rep}`.
pub fn find_match(pattern: &str, text: &str, from: usize) -> Option<(usize, usize)> {
    let p = Pattern::new(pattern);
    let chars: Vec<char> = text.chars().collect();
    let byte_index = |n: usize| chars[..n].iter().map(|c| c.len_utf8()).sum::<usize>();
    let from_chars = text[..from].chars().count();

    for start in from_chars..=chars.len() {
        let mut best: Option<usize> = None;
        for end in start..=chars.len() {
            let slice: String = chars[start..end].iter().collect();
            if p.matches(&slice) {
                best = Some(end);
            }
        }
        if let Some(end) = best {
            return Some((byte_index(start), byte_index(end)));
        }
    }
    None
}

/// Split `pat~ex1~ex2` on top-level tildes.
fn split_top_level_tilde(pattern: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut depth = 0usize;
    let mut in_class = false;
    let mut escaped = false;
    for c in pattern.chars() {
        if escaped {
            parts.last_mut().unwrap().push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                parts.last_mut().unwrap().push(c);
                escaped = true;
                continue;
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => depth = depth.saturating_sub(1),
            '~' if depth == 0 && !in_class => {
                parts.push(String::new());
                continue;
            }
            _ => {}
        }
        parts.last_mut().unwrap().push(c);
    }
    parts
}

fn parse_tokens(pattern: &str) -> Vec<Tok> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                tokens.push(Tok::Literal(chars[i + 1]));
                i += 2;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Tok::GlobStar);
                    i += 2;
                    // Collapse runs of stars.
                    while chars.get(i) == Some(&'*') {
                        i += 1;
                    }
                } else {
                    tokens.push(Tok::Star);
                    i += 1;
                }
            }
            '?' => {
                tokens.push(Tok::AnyChar);
                i += 1;
            }
            '[' => match parse_class(&chars, i) {
                Some((tok, next)) => {
                    tokens.push(tok);
                    i = next;
                }
                None => {
                    tokens.push(Tok::Literal('['));
                    i += 1;
                }
            },
            '(' => match find_group_close(&chars, i) {
                Some(close) => {
                    let inner: String = chars[i + 1..close].iter().collect();
                    let branches = split_top_level_pipe(&inner)
                        .into_iter()
                        .map(|b| parse_tokens(&b))
                        .collect();
                    tokens.push(Tok::Alt(branches));
                    i = close + 1;
                }
                None => {
                    tokens.push(Tok::Literal('('));
                    i += 1;
                }
            },
            c => {
                tokens.push(Tok::Literal(c));
                i += 1;
            }
        }
    }
    tokens
}

fn find_group_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
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

fn split_top_level_pipe(inner: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut depth = 0usize;
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            parts.last_mut().unwrap().push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                parts.last_mut().unwrap().push(c);
                escaped = true;
                continue;
            }
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                parts.push(String::new());
                continue;
            }
            _ => {}
        }
        parts.last_mut().unwrap().push(c);
    }
    parts
}

fn parse_class(chars: &[char], open: usize) -> Option<(Tok, usize)> {
    let mut i = open + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut items = Vec::new();
    let mut first = true;
    loop {
        let c = *chars.get(i)?;
        if c == ']' && !first {
            return Some((Tok::Class { negated, items }, i + 1));
        }
        first = false;

        // POSIX class: [:alpha:]
        if c == '[' && chars.get(i + 1) == Some(&':') {
            let mut j = i + 2;
            let mut name = String::new();
            while let Some(&ch) = chars.get(j) {
                if ch == ':' {
                    break;
                }
                name.push(ch);
                j += 1;
            }
            if chars.get(j) == Some(&':') && chars.get(j + 1) == Some(&']') {
                items.push(ClassItem::Named(name));
                i = j + 2;
                continue;
            }
        }

        if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).map_or(false, |&c| c != ']') {
            items.push(ClassItem::Range(c, chars[i + 2]));
            i += 3;
        } else {
            items.push(ClassItem::Char(c));
            i += 1;
        }
    }
}

fn class_matches(negated: bool, items: &[ClassItem], c: char) -> bool {
    let hit = items.iter().any(|item| match item {
        ClassItem::Char(x) => *x == c,
        ClassItem::Range(a, b) => (*a..=*b).contains(&c),
        ClassItem::Named(name) => match name.as_str() {
            "alpha" => c.is_alphabetic(),
            "digit" => c.is_ascii_digit(),
            "alnum" => c.is_alphanumeric(),
            "upper" => c.is_uppercase(),
            "lower" => c.is_lowercase(),
            "space" => c.is_whitespace(),
            "punct" => c.is_ascii_punctuation(),
            "xdigit" => c.is_ascii_hexdigit(),
            "blank" => c == ' ' || c == '\t',
            _ => false,
        },
    });
    hit != negated
}

fn match_tokens(tokens: &[Tok], text: &[char], ti: usize, pi: usize, path_mode: bool) -> bool {
    if pi == tokens.len() {
        return ti == text.len();
    }

    match &tokens[pi] {
        Tok::Literal(c) => {
            text.get(ti) == Some(c) && match_tokens(tokens, text, ti + 1, pi + 1, path_mode)
        }
        Tok::AnyChar => match text.get(ti) {
            Some(&c) => {
                (!path_mode || c != '/') && match_tokens(tokens, text, ti + 1, pi + 1, path_mode)
            }
            None => false,
        },
        Tok::Class { negated, items } => match text.get(ti) {
            Some(&c) => {
                (!path_mode || c != '/')
                    && class_matches(*negated, items, c)
                    && match_tokens(tokens, text, ti + 1, pi + 1, path_mode)
            }
            None => false,
        },
        Tok::Star => {
            for end in ti..=text.len() {
                if path_mode && text[ti..end].contains(&'/') {
                    break;
                }
                if match_tokens(tokens, text, end, pi + 1, path_mode) {
                    return true;
                }
            }
            false
        }
        Tok::GlobStar => {
            for end in ti..=text.len() {
                if match_tokens(tokens, text, end, pi + 1, path_mode) {
                    return true;
                }
            }
            false
        }
        Tok::Alt(branches) => {
            // Try every split point for the branch, then the rest.
            for end in ti..=text.len() {
                let slice = &text[ti..end];
                for branch in branches {
                    if match_tokens(branch, slice, 0, 0, path_mode)
                        && match_tokens(tokens, text, end, pi + 1, path_mode)
                    {
                        return true;
                    }
                }
            }
            false
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
    fn literal_and_wildcards() {
        assert!(matches("abc", "abc"));
        assert!(!matches("abc", "abd"));
        assert!(matches("a*c", "abbbc"));
        assert!(matches("a*c", "ac"));
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "ac"));
        assert!(matches("*", ""));
    }

    #[test]
    fn classes() {
        assert!(matches("[abc]x", "bx"));
        assert!(!matches("[abc]x", "dx"));
        assert!(matches("[a-z]*", "hello"));
        assert!(matches("[!a-z]x", "1x"));
        assert!(!matches("[!a-z]x", "bx"));
        assert!(matches("[[:digit:]][[:digit:]]", "42"));
        assert!(!matches("[[:digit:]]", "x"));
    }

    #[test]
    fn star_does_not_cross_slash_in_path_mode() {
        assert!(Pattern::new_path("*.txt").matches("a.txt"));
        assert!(!Pattern::new_path("*.txt").matches("dir/a.txt"));
        assert!(Pattern::new_path("**/a.txt").matches("x/y/a.txt"));
        assert!(Pattern::new_path("**a.txt").matches("a.txt"));
        // Non-path matching treats ** like *.
        assert!(matches("**.txt", "anything.txt"));
    }

    #[test]
    fn alternation() {
        assert!(matches("(foo|bar).rs", "foo.rs"));
        assert!(matches("(foo|bar).rs", "bar.rs"));
        assert!(!matches("(foo|bar).rs", "baz.rs"));
        assert!(matches("x(a|b)*", "xbzz"));
    }

    #[test]
    fn exclusion() {
        assert!(matches("*.rs~main.rs", "lib.rs"));
        assert!(!matches("*.rs~main.rs", "main.rs"));
        assert!(matches("*~*.o~*.a", "prog.c"));
        assert!(!matches("*~*.o~*.a", "prog.o"));
    }

    #[test]
    fn escaped_chars_are_literal() {
        assert!(matches("a\\*b", "a*b"));
        assert!(!matches("a\\*b", "axb"));
        assert!(!has_glob_chars("a\\*b"));
        assert!(has_glob_chars("a*b"));
    }

    #[test]
    fn qualifier_split() {
        assert_eq!(
            split_qualifier("src/*(/)"),
            ("src/*", Some(TypeQualifier::Directory))
        );
        assert_eq!(
            split_qualifier("bin/*(*)"),
            ("bin/*", Some(TypeQualifier::Executable))
        );
        assert_eq!(split_qualifier("plain*"), ("plain*", None));
        // A bare alternation is not a qualifier.
        assert_eq!(split_qualifier("(.)"), ("(.)", None));
    }

    #[test]
    fn prefix_trim_lengths() {
        // ${x#*/} vs ${x##*/} on "a/b/c"
        assert_eq!(match_prefix_len("*/", "a/b/c", false), Some(2));
        assert_eq!(match_prefix_len("*/", "a/b/c", true), Some(4));
        assert_eq!(match_prefix_len("z*", "a/b/c", false), None);
    }

    #[test]
    fn suffix_trim_starts() {
        // ${x%.txt} on "file.txt"
        assert_eq!(match_suffix_start(".txt", "file.txt", false), Some(4));
        // ${x%%.*} vs ${x%.*} on "a.b.c"
        assert_eq!(match_suffix_start(".*", "a.b.c", false), Some(3));
        assert_eq!(match_suffix_start(".*", "a.b.c", true), Some(1));
    }

    #[test]
    fn find_leftmost_longest() {
        assert_eq!(find_match("b*d", "abcdbd", 0), Some((1, 6)));
        assert_eq!(find_match("x", "abc", 0), None);
        assert_eq!(find_match("c", "abcabc", 3), Some((5, 6)));
    }

    #[test]
    fn empty_pattern_matches_empty() {
        assert!(matches("", ""));
        assert!(!matches("", "x"));
    }
}
