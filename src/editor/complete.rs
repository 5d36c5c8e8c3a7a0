//! Completion Engine
//!
//! Tab completion with context detection: command names at command
//! position, variables after `$`, named directories and users after `~`,
//! registered word lists, subcommands for well-known tools, option flags
//! after `-`, and paths everywhere else. Candidates are ranked by fuzzy
//! score with lexicographic tie-breaks; expensive scans (PATH) sit behind
//! a TTL cache. Mid-word path abbreviations (`/u/l/b`) expand when each
//! segment is unambiguous.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::editor::fuzzy;
use crate::state::ShellState;

/// One completion candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub is_dir: bool,
}

/// The outcome of a completion request.
#[derive(Debug, Default)]
pub struct CompletionResult {
    pub candidates: Vec<Candidate>,
    /// Byte offset in the line where the word being completed starts
    pub word_start: usize,
}

impl CompletionResult {
    /// Longest common prefix across candidate texts.
    pub fn common_prefix(&self) -> String {
        let mut iter = self.candidates.iter();
        let Some(first) = iter.next() else {
            return String::new();
        };
        let mut prefix = first.text.clone();
        for candidate in iter {
            let common: usize = prefix
                .chars()
                .zip(candidate.text.chars())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a.len_utf8())
                .sum();
            prefix.truncate(common);
            if prefix.is_empty() {
                break;
            }
        }
        prefix
    }
}

lazy_static::lazy_static! {
    /// Subcommand lists for tools everyone completes against.
    static ref SUBCOMMANDS: HashMap<&'static str, &'static [&'static str]> = {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("git", &["add", "bisect", "branch", "checkout", "cherry-pick", "clone", "commit", "diff", "fetch", "grep", "init", "log", "merge", "pull", "push", "rebase", "reset", "restore", "revert", "show", "stash", "status", "switch", "tag"]);
        m.insert("npm", &["install", "uninstall", "run", "test", "publish", "init", "update", "audit", "ci", "exec"]);
        m.insert("docker", &["build", "compose", "exec", "images", "logs", "ps", "pull", "push", "run", "start", "stop", "volume", "network"]);
        m.insert("kubectl", &["apply", "delete", "describe", "exec", "get", "logs", "port-forward", "rollout", "scale"]);
        m.insert("cargo", &["add", "bench", "build", "check", "clean", "clippy", "doc", "fmt", "install", "new", "run", "test", "update"]);
        m
    };

    /// Common option flags per command, offered after a `-`.
    static ref OPTIONS: HashMap<&'static str, &'static [&'static str]> = {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("ls", &["-l", "-a", "-h", "-t", "-r", "-R", "--color"]);
        m.insert("grep", &["-i", "-v", "-r", "-n", "-l", "-c", "-E", "-F", "--include"]);
        m.insert("rm", &["-r", "-f", "-i", "-v"]);
        m.insert("cp", &["-r", "-v", "-p", "-n"]);
        m.insert("git", &["--version", "--help", "--no-pager", "-C"]);
        m
    };
}

/// Characters that end the word under completion.
fn is_word_break(c: char) -> bool {
    matches!(c, ' ' | '\t' | '|' | '&' | ';' | '<' | '>' | '(')
}

pub struct CompletionEngine {
    path_commands: Option<(Instant, Vec<String>)>,
    ttl: Duration,
}

impl Default for CompletionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionEngine {
    pub fn new() -> Self {
        CompletionEngine {
            path_commands: None,
            ttl: Duration::from_secs(3600),
        }
    }

    /// Complete the word ending at `cursor` (a byte offset).
    pub fn complete(
        &mut self,
        state: &mut ShellState,
        line: &str,
        cursor: usize,
    ) -> CompletionResult {
        let before = &line[..cursor.min(line.len())];
        let word_start = before
            .char_indices()
            .rev()
            .find(|(_, c)| is_word_break(*c))
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let partial = &before[word_start..];

        // $NAME → variable names
        if let Some(var_partial) = partial.strip_prefix('$') {
            let names: Vec<String> = state
                .env
                .visible()
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            let ranked = fuzzy::rank(var_partial, names.iter().map(|n| n.as_str()));
            return CompletionResult {
                candidates: ranked
                    .into_iter()
                    .map(|name| Candidate {
                        text: format!("${}", name),
                        is_dir: false,
                    })
                    .collect(),
                word_start,
            };
        }

        // ~name → named directories (and whatever passwd-style names the
        // config registered).
        if let Some(tilde_partial) = partial.strip_prefix('~') {
            if !tilde_partial.contains('/') {
                let names: Vec<String> = state.named_dirs.keys().cloned().collect();
                let ranked = fuzzy::rank(tilde_partial, names.iter().map(|n| n.as_str()));
                if !ranked.is_empty() {
                    return CompletionResult {
                        candidates: ranked
                            .into_iter()
                            .map(|name| Candidate {
                                text: format!("~{}", name),
                                is_dir: true,
                            })
                            .collect(),
                        word_start,
                    };
                }
            }
        }

        let (command, is_command_position, arg_index) = command_context(before, word_start);

        if is_command_position {
            return CompletionResult {
                candidates: self.command_candidates(state, partial),
                word_start,
            };
        }

        if let Some(cmd) = &command {
            // Word lists registered with `complete -W`.
            if let Some(words) = state.completions.get(cmd) {
                let ranked = fuzzy::rank(partial, words.iter().map(|w| w.as_str()));
                if !ranked.is_empty() {
                    return CompletionResult {
                        candidates: ranked
                            .into_iter()
                            .map(|text| Candidate {
                                text,
                                is_dir: false,
                            })
                            .collect(),
                        word_start,
                    };
                }
            }

            // Known subcommand in the first argument slot.
            if arg_index == 1 && !partial.starts_with('-') {
                if let Some(subs) = SUBCOMMANDS.get(cmd.as_str()) {
                    let ranked = fuzzy::rank(partial, subs.iter().copied());
                    if !ranked.is_empty() {
                        return CompletionResult {
                            candidates: ranked
                                .into_iter()
                                .map(|text| Candidate {
                                    text,
                                    is_dir: false,
                                })
                                .collect(),
                            word_start,
                        };
                    }
                }
            }

            // Option flags.
            if partial.starts_with('-') {
                let flags = OPTIONS.get(cmd.as_str()).copied().unwrap_or(&[]);
                let ranked = fuzzy::rank(partial, flags.iter().copied());
                return CompletionResult {
                    candidates: ranked
                        .into_iter()
                        .map(|text| Candidate {
                            text,
                            is_dir: false,
                        })
                        .collect(),
                    word_start,
                };
            }
        }

        CompletionResult {
            candidates: path_candidates(state, partial),
            word_start,
        }
    }

    fn command_candidates(&mut self, state: &mut ShellState, partial: &str) -> Vec<Candidate> {
        let mut names: Vec<String> = crate::builtins::names()
            .into_iter()
            .map(String::from)
            .collect();
        names.extend(state.aliases.keys().cloned());
        names.extend(state.functions.keys().cloned());
        names.extend(self.path_command_names(state).iter().cloned());
        names.sort();
        names.dedup();

        fuzzy::rank(partial, names.iter().map(|n| n.as_str()))
            .into_iter()
            .map(|text| Candidate {
                text,
                is_dir: false,
            })
            .collect()
    }

    /// Executables on PATH, rescanned only after the TTL expires.
    fn path_command_names(&mut self, state: &ShellState) -> &Vec<String> {
        let stale = match &self.path_commands {
            Some((when, _)) => when.elapsed() > self.ttl,
            None => true,
        };
        if stale {
            let mut names = Vec::new();
            if let Some(path_var) = state.env.value("PATH") {
                for dir in path_var.split(':') {
                    let Ok(entries) = std::fs::read_dir(dir) else {
                        continue;
                    };
                    for entry in entries.flatten() {
                        if crate::exec::resolve::is_executable(&entry.path()) {
                            names.push(entry.file_name().to_string_lossy().into_owned());
                        }
                    }
                }
            }
            names.sort();
            names.dedup();
            self.path_commands = Some((Instant::now(), names));
        }
        &self.path_commands.as_ref().unwrap().1
    }
}

/// Identify the command of the current segment and whether the word under
/// the cursor is at command position. Returns (command, command_position,
/// index of the current word within the segment).
fn command_context(before: &str, word_start: usize) -> (Option<String>, bool, usize) {
    // The current segment starts after the last command separator.
    let segment_start = before[..word_start]
        .rfind(['|', ';', '&', '('])
        .map(|i| i + 1)
        .unwrap_or(0);
    let segment = &before[segment_start..word_start];
    let words: Vec<&str> = segment.split_whitespace().collect();

    // Skip leading assignments and the `!` negation.
    let mut index = 0;
    while index < words.len() {
        let w = words[index];
        if w == "!" || (w.contains('=') && !w.starts_with('=')) {
            index += 1;
        } else {
            break;
        }
    }

    match words.get(index) {
        None => (None, true, 0),
        Some(cmd) => {
            let arg_index = words.len() - index;
            (Some(cmd.to_string()), false, arg_index)
        }
    }
}

/// Path completion with hidden-file rules, tilde expansion, and
/// single-character segment abbreviation.
fn path_candidates(state: &mut ShellState, partial: &str) -> Vec<Candidate> {
    let (dir_text, base) = match partial.rfind('/') {
        Some(i) => (&partial[..i + 1], &partial[i + 1..]),
        None => ("", partial),
    };

    // Resolve the directory part: tilde first, then abbreviations.
    let expanded_dir = expand_dir(state, dir_text);
    let list_dir = if expanded_dir.is_empty() {
        state.cwd()
    } else if expanded_dir.starts_with('/') {
        expanded_dir.clone()
    } else {
        format!("{}/{}", state.cwd(), expanded_dir)
    };

    let show_hidden = base.starts_with('.');
    let mut names: Vec<(String, bool)> = Vec::new();
    if let Ok(entries) = std::fs::read_dir(&list_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && !show_hidden {
                continue;
            }
            let is_dir = entry.path().is_dir();
            names.push((name, is_dir));
        }
    }

    let ranked = fuzzy::rank(base, names.iter().map(|(n, _)| n.as_str()));
    ranked
        .into_iter()
        .map(|name| {
            let is_dir = names
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, d)| *d)
                .unwrap_or(false);
            Candidate {
                text: format!("{}{}", expanded_dir, name),
                is_dir,
            }
        })
        .collect()
}

/// Expand `~`-prefixes and unambiguous short segments: `/u/l/b` becomes
/// `/usr/local/bin` when each step has exactly one match.
fn expand_dir(state: &mut ShellState, dir_text: &str) -> String {
    if dir_text.is_empty() {
        return String::new();
    }

    let mut text = dir_text.to_string();
    if text.starts_with('~') {
        let rest = text[1..].to_string();
        let (name, tail) = match rest.find('/') {
            Some(i) => (rest[..i].to_string(), rest[i..].to_string()),
            None => (rest, String::new()),
        };
        if let Some(home) = crate::expand::tilde::expand(
            state,
            if name.is_empty() { None } else { Some(&name) },
        ) {
            text = format!("{}{}", home, tail);
        }
    }

    let absolute = text.starts_with('/');
    let segments: Vec<&str> = text.split('/').filter(|s| !s.is_empty()).collect();
    let mut resolved = if absolute {
        String::from("/")
    } else {
        String::new()
    };

    for segment in segments {
        let parent = if resolved.is_empty() {
            state.cwd()
        } else if resolved.starts_with('/') {
            resolved.clone()
        } else {
            format!("{}/{}", state.cwd(), resolved)
        };

        let direct = format!("{}/{}", parent.trim_end_matches('/'), segment);
        let chosen = if std::path::Path::new(&direct).exists() {
            segment.to_string()
        } else {
            match unique_prefix_match(&parent, segment) {
                Some(name) => name,
                None => segment.to_string(),
            }
        };

        if !resolved.is_empty() && !resolved.ends_with('/') {
            resolved.push('/');
        }
        resolved.push_str(&chosen);
    }

    resolved.push('/');
    resolved
}

/// The unique directory entry starting with `prefix`, if exactly one.
fn unique_prefix_match(parent: &str, prefix: &str) -> Option<String> {
    let entries = std::fs::read_dir(parent).ok()?;
    let mut matched = None;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) && entry.path().is_dir() {
            if matched.is_some() {
                return None;
            }
            matched = Some(name);
        }
    }
    matched
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn state_in(dir: &tempfile::TempDir) -> ShellState {
        let mut state = ShellState::new("den");
        state
            .env
            .set("PWD", dir.path().to_string_lossy().into_owned())
            .unwrap();
        state
    }

    #[test]
    fn command_position_detection() {
        assert!(command_context("ca", 0).1);
        assert!(!command_context("cat fo", 4).1);
        // After a pipe the command position resets.
        assert!(command_context("cat x | gr", 8).1);
        // Assignment prefixes don't count as the command.
        assert!(command_context("FOO=1 ca", 6).1);
    }

    #[test]
    fn file_completion_common_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("foo.txt"), "").unwrap();
        std::fs::write(dir.path().join("foobar.txt"), "").unwrap();
        let mut state = state_in(&dir);
        let mut engine = CompletionEngine::new();

        let result = engine.complete(&mut state, "cat fo", 6);
        assert_eq!(result.word_start, 4);
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.common_prefix(), "foo");
    }

    #[test]
    fn directories_flagged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        std::fs::write(dir.path().join("subfile"), "").unwrap();
        let mut state = state_in(&dir);
        let mut engine = CompletionEngine::new();

        let result = engine.complete(&mut state, "ls su", 5);
        let dirs: Vec<bool> = result.candidates.iter().map(|c| c.is_dir).collect();
        assert!(dirs.contains(&true));
        assert!(dirs.contains(&false));
    }

    #[test]
    fn hidden_files_require_dot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".secret"), "").unwrap();
        std::fs::write(dir.path().join("shown"), "").unwrap();
        let mut state = state_in(&dir);
        let mut engine = CompletionEngine::new();

        let result = engine.complete(&mut state, "cat s", 5);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].text, "shown");

        let result = engine.complete(&mut state, "cat .s", 6);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].text, ".secret");
    }

    #[test]
    fn variable_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        state.assign("MYVAR", "1").unwrap();
        state.assign("MYOTHER", "2").unwrap();
        let mut engine = CompletionEngine::new();

        let result = engine.complete(&mut state, "echo $MY", 8);
        let texts: Vec<&str> = result.candidates.iter().map(|c| c.text.as_str()).collect();
        assert!(texts.contains(&"$MYVAR"));
        assert!(texts.contains(&"$MYOTHER"));
    }

    #[test]
    fn subcommand_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let mut engine = CompletionEngine::new();

        let result = engine.complete(&mut state, "git ch", 6);
        let texts: Vec<&str> = result.candidates.iter().map(|c| c.text.as_str()).collect();
        assert!(texts.contains(&"checkout"));
        assert!(texts.contains(&"cherry-pick"));
    }

    #[test]
    fn wordlist_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        state
            .completions
            .insert("svc".into(), vec!["start".into(), "stop".into()]);
        let mut engine = CompletionEngine::new();

        let result = engine.complete(&mut state, "svc st", 6);
        assert_eq!(result.candidates.len(), 2);
    }

    #[test]
    fn option_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let mut engine = CompletionEngine::new();

        let result = engine.complete(&mut state, "ls -", 4);
        assert!(!result.candidates.is_empty());
        assert!(result.candidates.iter().all(|c| c.text.starts_with('-')));
    }

    #[test]
    fn path_abbreviation_expansion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("usr/local/bin")).unwrap();
        std::fs::write(dir.path().join("usr/local/bin/tool"), "").unwrap();
        let mut state = state_in(&dir);
        let mut engine = CompletionEngine::new();

        let result = engine.complete(&mut state, "ls u/l/b/to", 11);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].text, "usr/local/bin/tool");
    }

    #[test]
    fn named_dir_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        state.named_dirs.insert("proj".into(), "/srv/proj".into());
        let mut engine = CompletionEngine::new();

        let result = engine.complete(&mut state, "cd ~p", 5);
        assert_eq!(result.candidates[0].text, "~proj");
    }
}
