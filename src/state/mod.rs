//! Shell State
//!
//! The single process-wide [`ShellState`] value owned by the REPL: the
//! environment, aliases, functions, positional parameters, directory
//! stack, options, status slots, traps, the job table, and history.
//! Subshells are real forks, so the child inherits the state wholesale and
//! mutations die with it.

pub mod options;
pub mod vars;

pub use options::ShellOptions;
pub use vars::{Environment, ReadonlyError, Variable};

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ast::FunctionDefNode;
use crate::editor::history::History;
use crate::exec::job::JobTable;
use crate::expand::cache::ExpansionCaches;

/// Condition a trap handler is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapCondition {
    Signal(i32),
    Exit,
    Err,
    Debug,
    Return,
}

/// The whole mutable shell state.
pub struct ShellState {
    pub env: Environment,
    pub aliases: HashMap<String, String>,
    pub functions: HashMap<String, Rc<FunctionDefNode>>,

    /// `$0`
    pub arg0: String,
    /// `$1`… with 1-based addressing over contiguous storage
    pub positional: Vec<String>,

    pub options: ShellOptions,
    pub last_status: i32,
    pub last_bg_pid: Option<i32>,
    /// `$_`: last argument of the previous command
    pub last_arg: String,

    pub dir_stack: Vec<String>,
    pub named_dirs: HashMap<String, String>,
    /// Word lists registered by the `complete` builtin, keyed by command
    pub completions: HashMap<String, Vec<String>>,
    /// `getopts` cursor: (parameter index, character offset)
    pub getopts_state: (usize, usize),
    pub traps: HashMap<TrapCondition, String>,
    pub jobs: JobTable,
    pub history: History,
    pub caches: ExpansionCaches,

    /// Hashed PATH lookups (`hash`); cleared by `hash -r` and PATH writes
    pub command_hash: HashMap<String, String>,

    pub interactive: bool,
    pub shell_pid: i32,
    /// Line currently executing, for $LINENO
    pub current_line: usize,
    /// Loop nesting, so `break`/`continue` outside a loop can be rejected
    pub loop_depth: usize,
    /// Function call nesting, so `return` outside a function is an error
    pub function_depth: usize,
    /// Depth of forked subshells below the main shell
    pub subshell_depth: usize,
    /// Pipeline stage children replace themselves instead of spawning
    pub exec_directly: bool,
    /// A trap handler is running; suppresses DEBUG re-entry
    pub running_trap: bool,
    /// Open process-substitution fds with their writer/reader pids, closed
    /// and reaped once the consuming command has finished
    pub pending_proc_subs: Vec<(std::os::fd::OwnedFd, i32)>,

    started: Instant,
    seconds_base: i64,
    rng: StdRng,
}

impl ShellState {
    pub fn new(arg0: impl Into<String>) -> Self {
        let pid = std::process::id() as i32;
        ShellState {
            env: Environment::from_process_env(),
            aliases: HashMap::new(),
            functions: HashMap::new(),
            arg0: arg0.into(),
            positional: Vec::new(),
            options: ShellOptions::default(),
            last_status: 0,
            last_bg_pid: None,
            last_arg: String::new(),
            dir_stack: Vec::new(),
            named_dirs: HashMap::new(),
            completions: HashMap::new(),
            getopts_state: (1, 0),
            traps: HashMap::new(),
            jobs: JobTable::new(),
            history: History::default(),
            caches: ExpansionCaches::default(),
            command_hash: HashMap::new(),
            interactive: false,
            shell_pid: pid,
            current_line: 0,
            loop_depth: 0,
            function_depth: 0,
            subshell_depth: 0,
            exec_directly: false,
            running_trap: false,
            pending_proc_subs: Vec::new(),
            started: Instant::now(),
            seconds_base: 0,
            rng: StdRng::seed_from_u64(pid as u64 ^ 0x5eed),
        }
    }

    /// Current working directory: `$PWD`, falling back to the OS.
    pub fn cwd(&self) -> String {
        match self.env.value("PWD") {
            Some(pwd) if !pwd.is_empty() => pwd.to_string(),
            _ => std::env::current_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "/".to_string()),
        }
    }

    pub fn home(&self) -> String {
        self.env.value("HOME").unwrap_or("/").to_string()
    }

    pub fn ifs(&self) -> String {
        self.env.value("IFS").unwrap_or(" \t\n").to_string()
    }

    /// Clamp and record `$?`.
    pub fn set_status(&mut self, status: i32) {
        self.last_status = status.rem_euclid(256);
    }

    /// Positional parameter by 1-based index.
    pub fn positional_get(&self, index: usize) -> Option<&str> {
        if index == 0 {
            Some(&self.arg0)
        } else {
            self.positional.get(index - 1).map(|s| s.as_str())
        }
    }

    /// Assignment entry point used by the executor and expansion: routes
    /// through the environment, reseeds the dynamic variables, and drops
    /// caches that may now be stale.
    pub fn assign(&mut self, name: &str, value: &str) -> Result<(), ReadonlyError> {
        match name {
            "RANDOM" => {
                let seed = value.parse::<u64>().unwrap_or(0);
                self.rng = StdRng::seed_from_u64(seed);
            }
            "SECONDS" => {
                self.seconds_base = value.parse::<i64>().unwrap_or(0);
                self.started = Instant::now();
            }
            "PATH" => {
                self.command_hash.clear();
            }
            _ => {}
        }
        self.env.set(name, value)?;
        self.caches.invalidate();
        Ok(())
    }

    pub fn append_assign(&mut self, name: &str, suffix: &str) -> Result<(), ReadonlyError> {
        if name == "PATH" {
            self.command_hash.clear();
        }
        self.env.append(name, suffix)?;
        self.caches.invalidate();
        Ok(())
    }

    /// Values computed at lookup time rather than stored.
    pub fn dynamic_value(&mut self, name: &str) -> Option<String> {
        match name {
            "RANDOM" => Some(self.rng.gen_range(0..32768).to_string()),
            "SECONDS" => {
                let elapsed = self.started.elapsed().as_secs() as i64;
                Some((self.seconds_base + elapsed).to_string())
            }
            "LINENO" => Some(self.current_line.to_string()),
            _ => None,
        }
    }

    /// Special parameter values (`$?`, `$$`, `$!`, `$#`, `$-`, `$_`).
    pub fn special_value(&self, name: &str) -> Option<String> {
        match name {
            "?" => Some(self.last_status.to_string()),
            "$" => Some(self.shell_pid.to_string()),
            "!" => self.last_bg_pid.map(|pid| pid.to_string()),
            "#" => Some(self.positional.len().to_string()),
            "-" => Some(self.options.flag_string(self.interactive)),
            "_" => Some(self.last_arg.clone()),
            "0" => Some(self.arg0.clone()),
            _ => None,
        }
    }

    pub fn trap_command(&self, condition: TrapCondition) -> Option<&str> {
        self.traps.get(&condition).map(|s| s.as_str())
    }

    /// Subshell entry: traps reset to default except ignored ones (and the
    /// ERR trap under errtrace); the job table belongs to the parent.
    pub fn enter_subshell(&mut self) {
        self.subshell_depth += 1;
        self.exec_directly = false;
        let errtrace = self.options.errtrace;
        self.traps
            .retain(|cond, cmd| cmd.is_empty() || (errtrace && *cond == TrapCondition::Err));
        self.jobs = JobTable::new();
        self.interactive = false;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_clamped_to_byte() {
        let mut state = ShellState::new("den");
        state.set_status(300);
        assert_eq!(state.last_status, 44);
        state.set_status(-1);
        assert_eq!(state.last_status, 255);
        state.set_status(7);
        assert_eq!(state.last_status, 7);
    }

    #[test]
    fn positional_zero_is_shell_name() {
        let mut state = ShellState::new("den");
        state.positional = vec!["a".into(), "b".into()];
        assert_eq!(state.positional_get(0), Some("den"));
        assert_eq!(state.positional_get(1), Some("a"));
        assert_eq!(state.positional_get(3), None);
    }

    #[test]
    fn random_is_seedable() {
        let mut state = ShellState::new("den");
        state.assign("RANDOM", "42").unwrap();
        let a = state.dynamic_value("RANDOM").unwrap();
        state.assign("RANDOM", "42").unwrap();
        let b = state.dynamic_value("RANDOM").unwrap();
        assert_eq!(a, b);
        let n: i64 = a.parse().unwrap();
        assert!((0..32768).contains(&n));
    }

    #[test]
    fn seconds_rebases_on_assignment() {
        let mut state = ShellState::new("den");
        state.assign("SECONDS", "100").unwrap();
        let v: i64 = state.dynamic_value("SECONDS").unwrap().parse().unwrap();
        assert!(v >= 100);
    }

    #[test]
    fn special_values() {
        let mut state = ShellState::new("den");
        state.set_status(3);
        assert_eq!(state.special_value("?"), Some("3".into()));
        assert_eq!(state.special_value("#"), Some("0".into()));
        assert!(state.special_value("!").is_none());
        state.last_bg_pid = Some(1234);
        assert_eq!(state.special_value("!"), Some("1234".into()));
    }

    #[test]
    fn subshell_resets_nonignored_traps() {
        let mut state = ShellState::new("den");
        state
            .traps
            .insert(TrapCondition::Signal(15), "echo bye".into());
        state.traps.insert(TrapCondition::Signal(2), String::new());
        state.enter_subshell();
        assert!(state.trap_command(TrapCondition::Signal(15)).is_none());
        assert_eq!(state.trap_command(TrapCondition::Signal(2)), Some(""));
    }
}
