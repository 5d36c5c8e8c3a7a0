//! Shell Options
//!
//! The `set` option flags. Each option has a short flag (where POSIX
//! defines one) and a `-o` long name.

/// Shell options (set -e, etc.)
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// set -e: exit when a command fails outside a tested context
    pub errexit: bool,
    /// set -E: the ERR trap is inherited by functions and substitutions
    pub errtrace: bool,
    /// set -x: print each expanded command prefixed with PS4
    pub xtrace: bool,
    /// set -u: expanding an unset variable is an error
    pub nounset: bool,
    /// set -o pipefail: a pipeline fails if any stage fails
    pub pipefail: bool,
    /// set -n: parse commands but do not execute them
    pub noexec: bool,
    /// set -v: echo input lines to stderr as they are read
    pub verbose: bool,
    /// set -C: `>` refuses to overwrite existing regular files
    pub noclobber: bool,
    /// set -f: disable pathname expansion
    pub noglob: bool,
    /// set -m: job control (on by default when interactive)
    pub monitor: bool,
}

/// (short flag, -o name, accessor) table for `set` and `$-`.
const OPTION_TABLE: &[(Option<char>, &str)] = &[
    (Some('e'), "errexit"),
    (Some('E'), "errtrace"),
    (Some('x'), "xtrace"),
    (Some('u'), "nounset"),
    (None, "pipefail"),
    (Some('n'), "noexec"),
    (Some('v'), "verbose"),
    (Some('C'), "noclobber"),
    (Some('f'), "noglob"),
    (Some('m'), "monitor"),
];

impl ShellOptions {
    pub fn get(&self, name: &str) -> Option<bool> {
        match name {
            "errexit" => Some(self.errexit),
            "errtrace" => Some(self.errtrace),
            "xtrace" => Some(self.xtrace),
            "nounset" => Some(self.nounset),
            "pipefail" => Some(self.pipefail),
            "noexec" => Some(self.noexec),
            "verbose" => Some(self.verbose),
            "noclobber" => Some(self.noclobber),
            "noglob" => Some(self.noglob),
            "monitor" => Some(self.monitor),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: bool) -> bool {
        match name {
            "errexit" => self.errexit = value,
            "errtrace" => self.errtrace = value,
            "xtrace" => self.xtrace = value,
            "nounset" => self.nounset = value,
            "pipefail" => self.pipefail = value,
            "noexec" => self.noexec = value,
            "verbose" => self.verbose = value,
            "noclobber" => self.noclobber = value,
            "noglob" => self.noglob = value,
            "monitor" => self.monitor = value,
            _ => return false,
        }
        true
    }

    /// Apply a short flag like `-e` / `+x`. Returns false for unknown flags.
    pub fn set_short(&mut self, flag: char, value: bool) -> bool {
        match OPTION_TABLE.iter().find(|(short, _)| *short == Some(flag)) {
            Some((_, name)) => self.set(name, value),
            None => false,
        }
    }

    /// The value of `$-`: one letter per enabled short-flag option.
    pub fn flag_string(&self, interactive: bool) -> String {
        let mut s = String::new();
        for (short, name) in OPTION_TABLE {
            if let Some(c) = short {
                if self.get(name) == Some(true) {
                    s.push(*c);
                }
            }
        }
        if interactive {
            s.push('i');
        }
        s
    }

    /// `set -o` listing: (name, enabled) pairs in table order.
    pub fn listing(&self) -> Vec<(&'static str, bool)> {
        OPTION_TABLE
            .iter()
            .map(|(_, name)| (*name, self.get(name).unwrap_or(false)))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_by_name() {
        let mut opts = ShellOptions::default();
        assert!(opts.set("pipefail", true));
        assert_eq!(opts.get("pipefail"), Some(true));
        assert!(!opts.set("bogus", true));
        assert_eq!(opts.get("bogus"), None);
    }

    #[test]
    fn short_flags() {
        let mut opts = ShellOptions::default();
        assert!(opts.set_short('e', true));
        assert!(opts.errexit);
        assert!(opts.set_short('e', false));
        assert!(!opts.errexit);
        assert!(!opts.set_short('z', true));
    }

    #[test]
    fn flag_string_reflects_options() {
        let mut opts = ShellOptions::default();
        opts.errexit = true;
        opts.xtrace = true;
        let s = opts.flag_string(true);
        assert!(s.contains('e'));
        assert!(s.contains('x'));
        assert!(s.contains('i'));
        assert!(!s.contains('u'));
    }
}
