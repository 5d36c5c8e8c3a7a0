//! Tilde Expansion
//!
//! `~` → `$HOME`, `~+` → `$PWD`, `~-` → `$OLDPWD`, `~name` → a named
//! directory when one is registered, else the user's passwd home
//! directory. An unresolvable prefix stays literal.

use nix::unistd::User;

use crate::state::ShellState;

/// Resolve a tilde prefix. Returns None when the prefix cannot be
/// resolved, in which case the caller keeps the literal text.
pub fn expand(state: &mut ShellState, name: Option<&str>) -> Option<String> {
    match name {
        None => Some(state.home()),
        Some("+") => Some(state.cwd()),
        Some("-") => state.env.value("OLDPWD").map(|s| s.to_string()),
        Some(user) => {
            if let Some(dir) = state.named_dirs.get(user) {
                return Some(dir.clone());
            }
            if let Some(home) = state.caches.user_home.get(&user.to_string()) {
                return Some(home);
            }
            let home = passwd_home(user)?;
            state
                .caches
                .user_home
                .put(user.to_string(), home.clone());
            Some(home)
        }
    }
}

fn passwd_home(user: &str) -> Option<String> {
    let entry = User::from_name(user).ok().flatten()?;
    Some(entry.dir.to_string_lossy().into_owned())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_tilde_is_home() {
        let mut state = ShellState::new("den");
        state.env.set("HOME", "/home/tester").unwrap();
        assert_eq!(expand(&mut state, None), Some("/home/tester".into()));
    }

    #[test]
    fn plus_and_minus() {
        let mut state = ShellState::new("den");
        state.env.set("PWD", "/work").unwrap();
        state.env.set("OLDPWD", "/prev").unwrap();
        assert_eq!(expand(&mut state, Some("+")), Some("/work".into()));
        assert_eq!(expand(&mut state, Some("-")), Some("/prev".into()));
    }

    #[test]
    fn named_directory_wins() {
        let mut state = ShellState::new("den");
        state.named_dirs.insert("proj".into(), "/srv/proj".into());
        assert_eq!(expand(&mut state, Some("proj")), Some("/srv/proj".into()));
    }

    #[test]
    fn unknown_name_is_none() {
        let mut state = ShellState::new("den");
        assert_eq!(expand(&mut state, Some("no-such-user-xyz")), None);
    }
}
