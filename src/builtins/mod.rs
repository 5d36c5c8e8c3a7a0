//! Builtin Dispatch
//!
//! The builtin table maps names to handler functions plus the usage lines
//! `help` prints. The table is pluggable: embedders can register extra
//! builtins at startup and they dispatch exactly like the core set.

pub mod alias;
pub mod environment;
pub mod io;
pub mod jobs;
pub mod meta;
pub mod misc;
pub mod navigation;
pub mod status;
pub mod test;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::exec::Exec;
use crate::state::ShellState;

pub type BuiltinFn = fn(&mut ShellState, &[String]) -> Exec;

/// One registered builtin.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
    pub usage: &'static str,
    pub summary: &'static str,
}

/// The core builtin set.
const CORE: &[Builtin] = &[
    Builtin { name: "cd", func: navigation::cd, usage: "cd [-|dir]", summary: "change the working directory" },
    Builtin { name: "pwd", func: navigation::pwd, usage: "pwd [-P]", summary: "print the working directory" },
    Builtin { name: "pushd", func: navigation::pushd, usage: "pushd [dir]", summary: "push a directory onto the stack" },
    Builtin { name: "popd", func: navigation::popd, usage: "popd", summary: "pop the directory stack" },
    Builtin { name: "dirs", func: navigation::dirs, usage: "dirs [-c]", summary: "show the directory stack" },
    Builtin { name: "exit", func: status::exit, usage: "exit [n]", summary: "exit the shell" },
    Builtin { name: "return", func: status::r#return, usage: "return [n]", summary: "return from a function or sourced file" },
    Builtin { name: "break", func: status::r#break, usage: "break [n]", summary: "exit the enclosing loop" },
    Builtin { name: "continue", func: status::r#continue, usage: "continue [n]", summary: "start the next loop iteration" },
    Builtin { name: "true", func: status::r#true, usage: "true", summary: "succeed" },
    Builtin { name: ":", func: status::colon, usage: ":", summary: "expand arguments and succeed" },
    Builtin { name: "false", func: status::r#false, usage: "false", summary: "fail" },
    Builtin { name: "echo", func: io::echo, usage: "echo [-neE] [arg ...]", summary: "write arguments to standard output" },
    Builtin { name: "printf", func: io::printf, usage: "printf format [arg ...]", summary: "formatted output" },
    Builtin { name: "read", func: io::read, usage: "read [-r] [-p prompt] [name ...]", summary: "read a line into variables" },
    Builtin { name: "env", func: environment::env, usage: "env [NAME=value ...] [command ...]", summary: "print or modify the environment" },
    Builtin { name: "export", func: environment::export, usage: "export [-n] [name[=value] ...]", summary: "mark variables for export" },
    Builtin { name: "set", func: environment::set, usage: "set [-eEuxnvCfm] [-o option] [--] [arg ...]", summary: "set options and positional parameters" },
    Builtin { name: "unset", func: environment::unset, usage: "unset [-vf] name ...", summary: "remove variables or functions" },
    Builtin { name: "declare", func: environment::declare, usage: "declare [-xrp] [name[=value] ...]", summary: "declare variables with attributes" },
    Builtin { name: "readonly", func: environment::readonly, usage: "readonly [-p] [name[=value] ...]", summary: "mark variables readonly" },
    Builtin { name: "local", func: environment::local, usage: "local name[=value] ...", summary: "declare function-local variables" },
    Builtin { name: "shift", func: environment::shift, usage: "shift [n]", summary: "shift positional parameters" },
    Builtin { name: "getopts", func: environment::getopts, usage: "getopts optstring name [arg ...]", summary: "parse option arguments" },
    Builtin { name: "alias", func: alias::alias, usage: "alias [name[=value] ...]", summary: "define or display aliases" },
    Builtin { name: "unalias", func: alias::unalias, usage: "unalias [-a] name ...", summary: "remove aliases" },
    Builtin { name: "type", func: meta::r#type, usage: "type name ...", summary: "describe how a name would be interpreted" },
    Builtin { name: "which", func: meta::which, usage: "which name ...", summary: "locate a command on PATH" },
    Builtin { name: "hash", func: meta::hash, usage: "hash [-r] [name ...]", summary: "remember or forget command locations" },
    Builtin { name: "help", func: meta::help, usage: "help [builtin]", summary: "list builtins" },
    Builtin { name: "command", func: meta::command, usage: "command [-v] name [arg ...]", summary: "run a command bypassing functions" },
    Builtin { name: "builtin", func: meta::builtin, usage: "builtin name [arg ...]", summary: "run a builtin directly" },
    Builtin { name: "eval", func: meta::eval, usage: "eval [arg ...]", summary: "evaluate arguments as shell input" },
    Builtin { name: "exec", func: meta::exec, usage: "exec [command [arg ...]]", summary: "replace the shell or make redirections permanent" },
    Builtin { name: "source", func: meta::source, usage: "source file [args ...]", summary: "read and execute a file in the current shell" },
    Builtin { name: ".", func: meta::source, usage: ". file [args ...]", summary: "read and execute a file in the current shell" },
    Builtin { name: "test", func: test::test, usage: "test [expr]", summary: "evaluate a conditional expression" },
    Builtin { name: "[", func: test::bracket, usage: "[ [expr] ]", summary: "evaluate a conditional expression" },
    Builtin { name: "jobs", func: jobs::jobs, usage: "jobs [-lp]", summary: "list jobs" },
    Builtin { name: "fg", func: jobs::fg, usage: "fg [%id]", summary: "bring a job to the foreground" },
    Builtin { name: "bg", func: jobs::bg, usage: "bg [%id]", summary: "resume a job in the background" },
    Builtin { name: "kill", func: jobs::kill, usage: "kill [-s sig|-sig] pid|%id ...", summary: "send a signal" },
    Builtin { name: "wait", func: jobs::wait, usage: "wait [%id|pid ...]", summary: "wait for jobs to finish" },
    Builtin { name: "disown", func: jobs::disown, usage: "disown [-h] [-ar] [%id ...]", summary: "forget jobs" },
    Builtin { name: "trap", func: misc::trap, usage: "trap [action] [condition ...]", summary: "set signal handlers" },
    Builtin { name: "umask", func: misc::umask, usage: "umask [mode]", summary: "set the file creation mask" },
    Builtin { name: "basename", func: misc::basename, usage: "basename path [suffix]", summary: "strip directory from a path" },
    Builtin { name: "dirname", func: misc::dirname, usage: "dirname path", summary: "strip the last path component" },
    Builtin { name: "realpath", func: misc::realpath, usage: "realpath path ...", summary: "resolve to an absolute path" },
    Builtin { name: "sleep", func: misc::sleep, usage: "sleep seconds", summary: "pause for a duration" },
    Builtin { name: "time", func: misc::time, usage: "time [command]", summary: "report process times" },
    Builtin { name: "times", func: misc::times, usage: "times", summary: "report accumulated CPU times" },
    Builtin { name: "timeout", func: misc::timeout, usage: "timeout [-s sig] [-k dur] dur command [arg ...]", summary: "run a command with a deadline" },
    Builtin { name: "history", func: misc::history, usage: "history [-c] [-d n] [-w] [-r] [n]", summary: "show or edit the history list" },
    Builtin { name: "complete", func: misc::complete, usage: "complete [-W wordlist] name ...", summary: "register completion words" },
];

lazy_static::lazy_static! {
    static ref REGISTRY: Mutex<HashMap<&'static str, Builtin>> = {
        let mut m = HashMap::new();
        for b in CORE {
            m.insert(b.name, *b);
        }
        Mutex::new(m)
    };
}

/// Register (or override) a builtin; the extension point for embedders.
pub fn register(builtin: Builtin) {
    REGISTRY.lock().unwrap().insert(builtin.name, builtin);
}

pub fn lookup(name: &str) -> Option<BuiltinFn> {
    REGISTRY.lock().unwrap().get(name).map(|b| b.func)
}

pub fn lookup_name(name: &str) -> Option<&'static str> {
    REGISTRY.lock().unwrap().get(name).map(|b| b.name)
}

pub fn get(name: &str) -> Option<Builtin> {
    REGISTRY.lock().unwrap().get(name).copied()
}

/// All builtin names, sorted (completion and `help`).
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.lock().unwrap().keys().copied().collect();
    names.sort();
    names
}

/// All entries, sorted by name (`help` listing).
pub fn all() -> Vec<Builtin> {
    let mut all: Vec<Builtin> = REGISTRY.lock().unwrap().values().copied().collect();
    all.sort_by_key(|b| b.name);
    all
}

// ============================================================================
// Tests
// ============================================================================
