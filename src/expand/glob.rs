//! Pathname Expansion
//!
//! Walks the real filesystem, matching one pattern component per directory
//! level. `**` descends across levels, trailing type qualifiers filter the
//! final matches, hidden entries stay hidden unless the component asks for
//! them, and results come back sorted. No match returns `None` so the
//! caller can keep the literal pattern.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::expand::pattern::{self, Pattern, TypeQualifier};

/// Expand a glob pattern relative to `cwd`. Returns the sorted matches, or
/// `None` when nothing matched.
pub fn expand(cwd: &str, pattern_text: &str) -> Option<Vec<String>> {
    let (pat, qualifier) = pattern::split_qualifier(pattern_text);

    let (pat, require_dir) = match pat.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => (stripped, true),
        _ => (pat, false),
    };

    let absolute = pat.starts_with('/');
    let root: PathBuf = if absolute {
        PathBuf::from("/")
    } else {
        PathBuf::from(cwd)
    };

    let components: Vec<&str> = pat.split('/').filter(|c| !c.is_empty()).collect();
    if components.is_empty() {
        return None;
    }

    // Candidate paths relative to the root, built level by level.
    let mut candidates: Vec<String> = vec![String::new()];
    for (index, component) in components.iter().enumerate() {
        let last = index == components.len() - 1;
        let mut next = Vec::new();

        for candidate in &candidates {
            if *component == "**" {
                expand_globstar(&root, candidate, &mut next);
                continue;
            }

            if !pattern::has_glob_chars(component) {
                // Literal component: it just has to exist.
                let joined = join(candidate, component);
                let full = root.join(&joined);
                if !last && full.is_dir() || last && path_exists(&full) {
                    next.push(joined);
                }
                continue;
            }

            let matcher = Pattern::new(component);
            let show_hidden = component.starts_with('.');
            let dir = root.join(candidate);
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') && !show_hidden {
                    continue;
                }
                if !matcher.matches(&name) {
                    continue;
                }
                let joined = join(candidate, &name);
                if !last && !root.join(&joined).is_dir() {
                    continue;
                }
                next.push(joined);
            }
        }

        // `**` may produce the same directory through different depths.
        next.sort();
        next.dedup();
        candidates = next;
        if candidates.is_empty() {
            return None;
        }
    }

    let mut results: Vec<String> = candidates
        .into_iter()
        .filter(|rel| {
            let full = root.join(rel);
            if require_dir && !full.is_dir() {
                return false;
            }
            match qualifier {
                None => true,
                Some(TypeQualifier::Directory) => full.is_dir(),
                Some(TypeQualifier::Regular) => full.is_file(),
                Some(TypeQualifier::Symlink) => full
                    .symlink_metadata()
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false),
                Some(TypeQualifier::Executable) => {
                    full.is_file()
                        && full
                            .metadata()
                            .map(|m| m.permissions().mode() & 0o111 != 0)
                            .unwrap_or(false)
                }
            }
        })
        .map(|rel| {
            let mut s = if absolute { format!("/{}", rel) } else { rel };
            if require_dir {
                s.push('/');
            }
            s
        })
        .collect();

    results.sort();
    if results.is_empty() {
        None
    } else {
        Some(results)
    }
}

/// All directories at or below `base` (relative to root), hidden ones
/// excluded, for a `**` component.
fn expand_globstar(root: &Path, base: &str, out: &mut Vec<String>) {
    out.push(base.to_string());
    let dir = root.join(base);
    let Ok(entries) = fs::read_dir(&dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let joined = join(base, &name);
        if root.join(&joined).is_dir() {
            expand_globstar(root, &joined, out);
        }
    }
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

/// `exists()` that does not follow broken symlinks into oblivion.
fn path_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        File::create(base.join("alpha.txt")).unwrap();
        File::create(base.join("beta.txt")).unwrap();
        File::create(base.join("gamma.rs")).unwrap();
        File::create(base.join(".hidden.txt")).unwrap();
        fs::create_dir(base.join("sub")).unwrap();
        File::create(base.join("sub").join("inner.txt")).unwrap();
        fs::create_dir(base.join("sub").join("deep")).unwrap();
        File::create(base.join("sub").join("deep").join("leaf.txt")).unwrap();
        dir
    }

    fn cwd(dir: &tempfile::TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    #[test]
    fn star_matches_sorted() {
        let dir = setup();
        let matches = expand(&cwd(&dir), "*.txt").unwrap();
        assert_eq!(matches, vec!["alpha.txt", "beta.txt"]);
    }

    #[test]
    fn hidden_files_need_dot_pattern() {
        let dir = setup();
        assert!(!expand(&cwd(&dir), "*.txt")
            .unwrap()
            .contains(&".hidden.txt".to_string()));
        let matches = expand(&cwd(&dir), ".*.txt").unwrap();
        assert_eq!(matches, vec![".hidden.txt"]);
    }

    #[test]
    fn no_match_returns_none() {
        let dir = setup();
        assert_eq!(expand(&cwd(&dir), "*.zip"), None);
    }

    #[test]
    fn literal_directory_component() {
        let dir = setup();
        let matches = expand(&cwd(&dir), "sub/*.txt").unwrap();
        assert_eq!(matches, vec!["sub/inner.txt"]);
    }

    #[test]
    fn globstar_descends() {
        let dir = setup();
        let matches = expand(&cwd(&dir), "**/*.txt").unwrap();
        assert_eq!(
            matches,
            vec!["alpha.txt", "beta.txt", "sub/deep/leaf.txt", "sub/inner.txt"]
        );
    }

    #[test]
    fn directory_qualifier() {
        let dir = setup();
        let matches = expand(&cwd(&dir), "*(/)").unwrap();
        assert_eq!(matches, vec!["sub"]);
    }

    #[test]
    fn regular_file_qualifier() {
        let dir = setup();
        let matches = expand(&cwd(&dir), "*(.)").unwrap();
        assert_eq!(matches, vec!["alpha.txt", "beta.txt", "gamma.rs"]);
    }

    #[test]
    fn trailing_slash_requires_directory() {
        let dir = setup();
        let matches = expand(&cwd(&dir), "s*/").unwrap();
        assert_eq!(matches, vec!["sub/"]);
    }

    #[test]
    fn exclusion_pattern() {
        let dir = setup();
        let matches = expand(&cwd(&dir), "*.txt~beta*").unwrap();
        assert_eq!(matches, vec!["alpha.txt"]);
    }

    #[test]
    fn question_mark() {
        let dir = setup();
        let matches = expand(&cwd(&dir), "?lpha.txt").unwrap();
        assert_eq!(matches, vec!["alpha.txt"]);
    }
}
