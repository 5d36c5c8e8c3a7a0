//! Shell
//!
//! Ties the pieces together: the REPL loop (reap jobs → print
//! notifications → run pending traps → render prompt → read → parse →
//! execute → record history), plus the non-interactive entry points for
//! `-c`, script files, and piped stdin.

use std::path::PathBuf;

use crate::config::{Config, DefaultPrompt, PromptContext, PromptRenderer};
use crate::editor::{term, LineEditor, ReadOutcome};
use crate::error::ShellError;
use crate::exec::{self, signal, Interrupt};
use crate::state::{ShellState, TrapCondition};

pub struct Shell {
    pub state: ShellState,
    editor: LineEditor,
    prompt: Box<dyn PromptRenderer>,
    config: Config,
}

impl Shell {
    pub fn new(arg0: &str, config: Config) -> Shell {
        let mut state = ShellState::new(arg0);

        // Baseline environment every session can rely on.
        if !state.env.is_set("IFS") {
            let _ = state.env.set("IFS", " \t\n");
        }
        if !state.env.is_set("PS2") {
            let _ = state.env.set("PS2", "> ");
        }
        if !state.env.is_set("PS4") {
            let _ = state.env.set("PS4", "+ ");
        }
        if !state.env.is_set("PWD") {
            if let Ok(dir) = std::env::current_dir() {
                let _ = state.env.set("PWD", dir.to_string_lossy().into_owned());
            }
        }
        let shlvl = state
            .env
            .value("SHLVL")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
            + 1;
        let _ = state.env.set("SHLVL", shlvl.to_string());
        state.env.export("SHLVL");

        state.named_dirs = config.named_dirs.clone();
        state.aliases = config.aliases.clone();
        state.caches = crate::expand::cache::ExpansionCaches::new(config.cache_capacity);

        let histsize = state
            .env
            .value("HISTSIZE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.histsize);
        state.history = crate::editor::history::History::with_capacity(histsize);

        Shell {
            state,
            editor: LineEditor::new(),
            prompt: Box::new(DefaultPrompt),
            config,
        }
    }

    /// Swap in an external prompt renderer.
    pub fn set_prompt(&mut self, prompt: Box<dyn PromptRenderer>) {
        self.prompt = prompt;
    }

    fn history_path(&self) -> PathBuf {
        if let Some(path) = &self.config.histfile {
            return path.clone();
        }
        match self.state.env.value("HISTFILE") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(self.state.home()).join(".den_history"),
        }
    }

    // ------------------------------------------------------------------
    // Interactive mode
    // ------------------------------------------------------------------

    pub fn run_interactive(&mut self) -> i32 {
        self.state.interactive = true;
        self.state.options.monitor = true;
        signal::install_interactive();
        signal::arm_trap(libc::SIGTERM);
        signal::arm_trap(libc::SIGHUP);

        let path = self.history_path();
        self.state.history.attach_file(path);

        let (cols, rows) = term::window_size();
        let _ = self.state.env.set("COLUMNS", cols.to_string());
        let _ = self.state.env.set("LINES", rows.to_string());

        loop {
            let _ = signal::take_sigchld();
            self.state.jobs.poll_children();
            for job in self.state.jobs.take_notifications() {
                eprintln!("[{}]  {}    {}", job.id, job.state.describe(), job.command);
            }

            if let Some(status) = self.dispatch_pending_signals() {
                return self.shutdown(status);
            }

            let prompt = self.render_prompt();
            match self.editor.read_line(&mut self.state, &prompt) {
                ReadOutcome::Line(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.state.history.push(&line);
                    if let Some(status) = self.execute_source(&line) {
                        return self.shutdown(status);
                    }
                    let status = self.state.last_status;
                    self.state.history.record_status(status);
                }
                ReadOutcome::Interrupted => {
                    // $? is left alone; just a fresh prompt.
                    continue;
                }
                ReadOutcome::Eof => {
                    println!("exit");
                    return self.shutdown(self.state.last_status);
                }
            }
        }
    }

    fn render_prompt(&mut self) -> String {
        if let Some(ps1) = self.state.env.value("PS1") {
            if !ps1.is_empty() {
                return ps1.to_string();
            }
        }
        let cwd = self.state.cwd();
        let home = self.state.home();
        let (columns, _) = term::window_size();
        self.prompt.render(&PromptContext {
            cwd: &cwd,
            home: &home,
            last_status: self.state.last_status,
            columns,
        })
    }

    /// Route pending signals: user traps run as shell code, an untrapped
    /// SIGTERM/SIGHUP ends the session cleanly.
    fn dispatch_pending_signals(&mut self) -> Option<i32> {
        exec::run_pending_signal_traps(&mut self.state)
    }

    /// Exit path: EXIT trap, SIGHUP to surviving jobs, history flush.
    fn shutdown(&mut self, status: i32) -> i32 {
        exec::run_trap_condition(&mut self.state, TrapCondition::Exit);

        if self.state.interactive {
            for pgid in self.state.jobs.hup_targets() {
                let _ = signal::send_signal(-pgid, libc::SIGHUP);
            }
        }
        self.state.history.write_file();
        status
    }

    // ------------------------------------------------------------------
    // Non-interactive modes
    // ------------------------------------------------------------------

    /// `den -c "cmdline"`.
    pub fn run_command(&mut self, cmdline: &str) -> i32 {
        signal::install_noninteractive();
        match self.execute_source(cmdline) {
            Some(status) => self.shutdown(status),
            None => self.shutdown(self.state.last_status),
        }
    }

    /// `den script.sh args…`.
    pub fn run_script(&mut self, path: &str, args: &[String]) -> i32 {
        signal::install_noninteractive();
        self.state.arg0 = path.to_string();
        self.state.positional = args.to_vec();

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                ShellError::Internal(format!("{}: {}", path, e)).report();
                return 127;
            }
        };
        match self.execute_source(&contents) {
            Some(status) => self.shutdown(status),
            None => self.shutdown(self.state.last_status),
        }
    }

    /// Commands piped on stdin, no terminal.
    pub fn run_stdin(&mut self) -> i32 {
        use std::io::Read;

        signal::install_noninteractive();
        let mut source = String::new();
        if std::io::stdin().read_to_string(&mut source).is_err() {
            return 1;
        }
        match self.execute_source(&source) {
            Some(status) => self.shutdown(status),
            None => self.shutdown(self.state.last_status),
        }
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Parse and run one input. Returns Some(status) when the shell must
    /// exit (the `exit` builtin, errexit, or a fatal script error).
    pub fn execute_source(&mut self, source: &str) -> Option<i32> {
        if self.state.options.verbose {
            eprintln!("{}", source);
        }

        let script = match crate::parser::parse(source) {
            Ok(script) => script,
            Err(e) => {
                ShellError::Syntax(e).report();
                self.state.set_status(2);
                return None;
            }
        };

        match exec::execute_script(&mut self.state, &script) {
            Ok(status) => {
                self.state.set_status(status);
                None
            }
            Err(Interrupt::Exit(status)) => {
                self.state.set_status(status);
                Some(self.state.last_status)
            }
            Err(Interrupt::Return(status)) => {
                self.state.set_status(status);
                None
            }
            Err(Interrupt::Break(_)) | Err(Interrupt::Continue(_)) => {
                // Stray loop control at top level is ignored.
                None
            }
            Err(Interrupt::Error(e)) => {
                e.report();
                self.state.set_status(e.status());
                if self.state.interactive {
                    None
                } else {
                    Some(self.state.last_status)
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        let mut shell = Shell::new("den", Config::default());
        // Tests never touch the real filesystem via globbing.
        shell.state.options.noglob = true;
        shell
    }

    #[test]
    fn simple_status_flow() {
        let mut shell = shell();
        assert!(shell.execute_source("true").is_none());
        assert_eq!(shell.state.last_status, 0);
        shell.execute_source("false");
        assert_eq!(shell.state.last_status, 1);
    }

    #[test]
    fn syntax_error_sets_status_2() {
        let mut shell = shell();
        shell.execute_source("if then");
        assert_eq!(shell.state.last_status, 2);
    }

    #[test]
    fn and_or_chain() {
        let mut shell = shell();
        shell.execute_source("false && X=no || X=yes");
        assert_eq!(shell.state.env.value("X"), Some("yes"));
        assert_eq!(shell.state.last_status, 0);
    }

    #[test]
    fn for_loop_accumulates() {
        let mut shell = shell();
        shell.execute_source("x=1; for i in 1 2 3; do x=$((x*i)); done");
        assert_eq!(shell.state.env.value("x"), Some("6"));
    }

    #[test]
    fn c_style_for() {
        let mut shell = shell();
        shell.execute_source("s=0; for ((i=1; i<=4; i++)); do s=$((s+i)); done");
        assert_eq!(shell.state.env.value("s"), Some("10"));
    }

    #[test]
    fn while_with_break_and_continue() {
        let mut shell = shell();
        shell.execute_source(
            "n=0; acc=; while true; do n=$((n+1)); if test $n -eq 2; then continue; fi; \
             if test $n -gt 4; then break; fi; acc=$acc$n; done",
        );
        assert_eq!(shell.state.env.value("acc"), Some("134"));
    }

    #[test]
    fn case_dispatch() {
        let mut shell = shell();
        shell.execute_source("x=hello; case $x in h*) y=match ;; *) y=other ;; esac");
        assert_eq!(shell.state.env.value("y"), Some("match"));
        shell.execute_source("x=zzz; case $x in h*) y=match ;; *) y=other ;; esac");
        assert_eq!(shell.state.env.value("y"), Some("other"));
    }

    #[test]
    fn case_fallthrough() {
        let mut shell = shell();
        shell.execute_source("acc=; case a in a) acc=${acc}1 ;& b) acc=${acc}2 ;; c) acc=${acc}3 ;; esac");
        assert_eq!(shell.state.env.value("acc"), Some("12"));
    }

    #[test]
    fn functions_and_return() {
        let mut shell = shell();
        shell.execute_source("f() { return 7; }; f");
        assert_eq!(shell.state.last_status, 7);
    }

    #[test]
    fn function_locals_pop() {
        let mut shell = shell();
        shell.execute_source("x=outer; f() { local x=inner; y=$x; }; f");
        assert_eq!(shell.state.env.value("x"), Some("outer"));
        assert_eq!(shell.state.env.value("y"), Some("inner"));
    }

    #[test]
    fn function_positional_params() {
        let mut shell = shell();
        shell.execute_source("f() { first=$1; count=$#; }; f a b c");
        assert_eq!(shell.state.env.value("first"), Some("a"));
        assert_eq!(shell.state.env.value("count"), Some("3"));
    }

    #[test]
    fn exit_interrupt_propagates() {
        let mut shell = shell();
        let status = shell.execute_source("exit 42");
        assert_eq!(status, Some(42));
    }

    #[test]
    fn errexit_stops_script() {
        let mut shell = shell();
        shell.execute_source("set -e");
        let status = shell.execute_source("false; X=reached");
        assert_eq!(status, Some(1));
        assert_eq!(shell.state.env.value("X"), None);
    }

    #[test]
    fn errexit_spares_tested_commands() {
        let mut shell = shell();
        shell.execute_source("set -e");
        assert!(shell.execute_source("if false; then :; fi; X=ok").is_none());
        assert_eq!(shell.state.env.value("X"), Some("ok"));
        assert!(shell.execute_source("false || true; Y=ok").is_none());
        assert_eq!(shell.state.env.value("Y"), Some("ok"));
        assert!(shell.execute_source("! false; Z=ok").is_none());
        assert_eq!(shell.state.env.value("Z"), Some("ok"));
    }

    #[test]
    fn readonly_assignment_fails_but_chain_continues() {
        let mut shell = shell();
        shell.execute_source("readonly R=1");
        shell.execute_source("R=2");
        assert_eq!(shell.state.last_status, 1);
        assert_eq!(shell.state.env.value("R"), Some("1"));
        shell.execute_source("true");
        assert_eq!(shell.state.last_status, 0);
    }

    #[test]
    fn alias_expansion_applies() {
        let mut shell = shell();
        shell.execute_source("alias setx='X='");
        // The alias rewrites the command word; assignment applies.
        shell.execute_source("alias greet='Y=hello'");
        shell.execute_source("greet");
        assert_eq!(shell.state.env.value("Y"), Some("hello"));
    }

    #[test]
    fn ifs_splitting_test_case() {
        let mut shell = shell();
        shell.execute_source("a='one two three'; n=0; for w in $a; do n=$((n+1)); done");
        assert_eq!(shell.state.env.value("n"), Some("3"));
    }

    #[test]
    fn nounset_flag() {
        let mut shell = shell();
        shell.state.interactive = true;
        shell.execute_source("set -u");
        shell.execute_source("echo $UNDEFINED_VARIABLE_XYZ");
        assert_eq!(shell.state.last_status, 1);
    }

    #[test]
    fn noexec_parses_only() {
        let mut shell = shell();
        shell.execute_source("set -n");
        shell.execute_source("X=never");
        assert_eq!(shell.state.env.value("X"), None);
    }

    #[test]
    fn eval_builtin_runs_in_shell() {
        let mut shell = shell();
        shell.execute_source("eval 'X=fromeval'");
        assert_eq!(shell.state.env.value("X"), Some("fromeval"));
    }

    #[test]
    fn shlvl_incremented() {
        let shell = Shell::new("den", Config::default());
        let shlvl: i64 = shell.state.env.value("SHLVL").unwrap().parse().unwrap();
        assert!(shlvl >= 1);
    }

    #[test]
    fn shift_and_positionals() {
        let mut shell = shell();
        shell.state.positional = vec!["a".into(), "b".into(), "c".into()];
        shell.execute_source("shift; first=$1");
        assert_eq!(shell.state.env.value("first"), Some("b"));
    }

    #[test]
    fn brace_expansion_end_to_end() {
        let mut shell = shell();
        shell.execute_source("set -- {01..03}; n=$#; first=$1; last=$3");
        assert_eq!(shell.state.env.value("n"), Some("3"));
        assert_eq!(shell.state.env.value("first"), Some("01"));
        assert_eq!(shell.state.env.value("last"), Some("03"));
    }

    #[test]
    fn command_substitution_captures_and_strips() {
        let mut shell = shell();
        shell.execute_source("a=$(printf X)");
        assert_eq!(shell.state.env.value("a"), Some("X"));
        // Trailing newlines are stripped.
        shell.execute_source("b=$(echo hi)");
        assert_eq!(shell.state.env.value("b"), Some("hi"));
    }

    #[test]
    fn pipeline_through_external_filter() {
        let mut shell = shell();
        if crate::exec::resolve::find_external(&mut shell.state, "tr").is_none() {
            return;
        }
        shell.execute_source("x=$(echo hello | tr a-z A-Z)");
        assert_eq!(shell.state.env.value("x"), Some("HELLO"));
        assert_eq!(shell.state.last_status, 0);
    }

    #[test]
    fn pipefail_reports_rightmost_failure() {
        let mut shell = shell();
        shell.execute_source("set -o pipefail");
        shell.execute_source("false | true");
        assert_eq!(shell.state.last_status, 1);
        shell.execute_source("set +o pipefail");
        shell.execute_source("false | true");
        assert_eq!(shell.state.last_status, 0);
    }

    #[test]
    fn background_job_and_wait() {
        let mut shell = shell();
        shell.execute_source("sleep 0.05 &");
        assert!(shell.state.last_bg_pid.is_some());
        shell.execute_source("wait $!");
        assert_eq!(shell.state.last_status, 0);
        shell.execute_source("Y=done");
        assert_eq!(shell.state.env.value("Y"), Some("done"));
    }

    #[test]
    fn subshell_isolates_state() {
        let mut shell = shell();
        shell.execute_source("X=outer; (X=inner; true); Z=$X");
        assert_eq!(shell.state.env.value("Z"), Some("outer"));
    }

    #[test]
    fn trap_registration_via_builtin() {
        let mut shell = shell();
        shell.execute_source("trap 'X=trapped' EXIT");
        assert!(shell
            .state
            .trap_command(TrapCondition::Exit)
            .is_some());
    }
}
