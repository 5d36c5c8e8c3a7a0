//! Command Resolution
//!
//! The lookup order for the first word of a simple command: a word
//! containing `/` names a file directly; then shell functions, builtins,
//! and finally a PATH scan with per-entry executability tests. PATH hits
//! are remembered in the hash table until `hash -r`, a PATH assignment, or
//! a directory change invalidates them.

use std::path::Path;
use std::rc::Rc;

use crate::ast::FunctionDefNode;
use crate::state::ShellState;

/// What a command name resolved to.
pub enum Resolved {
    Function(Rc<FunctionDefNode>),
    Builtin(&'static str),
    External(String),
    NotFound,
}

/// Describe a name for `type`/`which`.
pub fn classify(state: &mut ShellState, name: &str) -> Resolved {
    if name.contains('/') {
        return Resolved::External(name.to_string());
    }
    if let Some(func) = state.functions.get(name) {
        return Resolved::Function(Rc::clone(func));
    }
    if let Some(builtin_name) = crate::builtins::lookup_name(name) {
        return Resolved::Builtin(builtin_name);
    }
    match find_external(state, name) {
        Some(path) => Resolved::External(path),
        None => Resolved::NotFound,
    }
}

/// Locate an external command, consulting and feeding the hash table.
pub fn find_external(state: &mut ShellState, name: &str) -> Option<String> {
    if name.contains('/') {
        return Some(name.to_string());
    }

    if let Some(path) = state.command_hash.get(name) {
        // A stale entry (deleted or replaced binary) falls through to a
        // fresh scan.
        if is_executable(Path::new(path)) {
            return Some(path.clone());
        }
        state.command_hash.remove(name);
    }

    let path_var = state.env.value("PATH").unwrap_or("").to_string();
    for dir in path_var.split(':') {
        let dir = if dir.is_empty() { "." } else { dir };
        let candidate = format!("{}/{}", dir, name);
        if is_executable(Path::new(&candidate)) {
            state
                .command_hash
                .insert(name.to_string(), candidate.clone());
            return Some(candidate);
        }
    }
    None
}

/// A regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
        && nix::unistd::access(path, nix::unistd::AccessFlags::X_OK).is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn state_with_path(dir: &tempfile::TempDir) -> ShellState {
        let mut state = ShellState::new("den");
        state
            .env
            .set("PATH", dir.path().to_string_lossy().into_owned())
            .unwrap();
        state
    }

    fn make_executable(dir: &tempfile::TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn finds_executable_on_path() {
        let dir = tempfile::tempdir().unwrap();
        let expected = make_executable(&dir, "mytool");
        let mut state = state_with_path(&dir);
        assert_eq!(find_external(&mut state, "mytool"), Some(expected.clone()));
        // Second lookup is served from the hash.
        assert_eq!(state.command_hash.get("mytool"), Some(&expected));
    }

    #[test]
    fn skips_non_executable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), "x").unwrap();
        let mut state = state_with_path(&dir);
        assert_eq!(find_external(&mut state, "data.txt"), None);
    }

    #[test]
    fn stale_hash_entries_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_executable(&dir, "gone");
        let mut state = state_with_path(&dir);
        state.command_hash.insert("gone".into(), path.clone());
        std::fs::remove_file(&path).unwrap();
        assert_eq!(find_external(&mut state, "gone"), None);
        assert!(!state.command_hash.contains_key("gone"));
    }

    #[test]
    fn slash_names_bypass_path() {
        let mut state = ShellState::new("den");
        assert_eq!(
            find_external(&mut state, "./local/tool"),
            Some("./local/tool".into())
        );
    }
}
