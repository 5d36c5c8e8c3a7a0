//! Command Introspection & Dispatch Builtins
//!
//! type, which, hash, help, command, builtin, eval, exec, source.

use std::io::Write;

use crate::exec::control_flow::{Exec, Interrupt};
use crate::exec::{pipeline, resolve};
use crate::parser::types::is_reserved_word;
use crate::state::ShellState;

fn fail(message: impl std::fmt::Display) -> Exec {
    eprintln!("den: {}", message);
    Ok(1)
}

pub fn r#type(state: &mut ShellState, args: &[String]) -> Exec {
    let mut status = 0;
    for name in args {
        if state.aliases.contains_key(name) {
            println!("{} is aliased to `{}'", name, state.aliases[name]);
        } else if is_reserved_word(name) {
            println!("{} is a shell keyword", name);
        } else if state.functions.contains_key(name) {
            println!("{} is a function", name);
        } else if crate::builtins::lookup(name).is_some() {
            println!("{} is a shell builtin", name);
        } else if let Some(path) = resolve::find_external(state, name) {
            println!("{} is {}", name, path);
        } else {
            eprintln!("den: type: {}: not found", name);
            status = 1;
        }
    }
    Ok(status)
}

pub fn which(state: &mut ShellState, args: &[String]) -> Exec {
    let mut status = 0;
    for name in args {
        match resolve::find_external(state, name) {
            Some(path) => println!("{}", path),
            None => status = 1,
        }
    }
    Ok(status)
}

pub fn hash(state: &mut ShellState, args: &[String]) -> Exec {
    if args.first().map(|s| s.as_str()) == Some("-r") {
        state.command_hash.clear();
        return Ok(0);
    }

    if args.is_empty() {
        if state.command_hash.is_empty() {
            println!("hash: hash table empty");
            return Ok(0);
        }
        let mut entries: Vec<(&String, &String)> = state.command_hash.iter().collect();
        entries.sort();
        for (name, path) in entries {
            println!("{}\t{}", name, path);
        }
        return Ok(0);
    }

    let mut status = 0;
    for name in args {
        if resolve::find_external(state, name).is_none() {
            eprintln!("den: hash: {}: not found", name);
            status = 1;
        }
    }
    Ok(status)
}

pub fn help(_state: &mut ShellState, args: &[String]) -> Exec {
    match args.first() {
        Some(name) => match crate::builtins::get(name) {
            Some(builtin) => {
                println!("{}: {}", builtin.name, builtin.usage);
                println!("    {}", builtin.summary);
                Ok(0)
            }
            None => fail(format!("help: no help topics match `{}'", name)),
        },
        None => {
            println!("den, an interactive POSIX-style shell");
            println!("These shell commands are defined internally:");
            for builtin in crate::builtins::all() {
                println!("  {:<28}{}", builtin.usage, builtin.summary);
            }
            Ok(0)
        }
    }
}

pub fn command(state: &mut ShellState, args: &[String]) -> Exec {
    let mut iter = args.iter();
    let mut describe = false;
    let name = loop {
        match iter.next() {
            Some(a) if a == "-v" || a == "-V" => describe = true,
            Some(a) if a == "--" => continue,
            Some(a) => break a.clone(),
            None => return Ok(0),
        }
    };

    if describe {
        if crate::builtins::lookup(&name).is_some() {
            println!("{}", name);
            return Ok(0);
        }
        return match resolve::find_external(state, &name) {
            Some(path) => {
                println!("{}", path);
                Ok(0)
            }
            None => Ok(1),
        };
    }

    // Skip functions; builtins and PATH commands only.
    let rest: Vec<String> = iter.cloned().collect();
    if let Some(builtin) = crate::builtins::lookup(&name) {
        return builtin(state, &rest);
    }
    let mut argv = vec![name];
    argv.extend(rest);
    pipeline::run_external(
        state,
        &argv,
        &[],
        crate::exec::redirect::PreparedRedirs::default(),
    )
}

pub fn builtin(state: &mut ShellState, args: &[String]) -> Exec {
    let Some(name) = args.first() else {
        return Ok(0);
    };
    match crate::builtins::lookup(name) {
        Some(func) => func(state, &args[1..]),
        None => fail(format!("builtin: {}: not a shell builtin", name)),
    }
}

pub fn eval(state: &mut ShellState, args: &[String]) -> Exec {
    let text = args.join(" ");
    if text.trim().is_empty() {
        return Ok(0);
    }
    // The evaluated text may hold several commands.
    state.exec_directly = false;
    match crate::parser::parse(&text) {
        Ok(script) => crate::exec::execute_script(state, &script),
        Err(e) => {
            eprintln!("den: eval: {}", e);
            Ok(2)
        }
    }
}

/// `exec` with arguments replaces the shell process. With none, its
/// redirections have already been made permanent by the dispatcher.
pub fn exec(state: &mut ShellState, args: &[String]) -> Exec {
    if args.is_empty() {
        return Ok(0);
    }

    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    let name = &args[0];
    let Some(path) = resolve::find_external(state, name) else {
        let message = format!("exec: {}: not found", name);
        if state.interactive {
            return fail(message);
        }
        eprintln!("den: {}", message);
        return Err(Interrupt::Exit(127));
    };

    use std::ffi::CString;
    let c_path = CString::new(path.as_str()).unwrap_or_default();
    let c_args: Vec<CString> = args
        .iter()
        .map(|a| CString::new(a.as_str()).unwrap_or_default())
        .collect();
    for (key, value) in state.env.exported_pairs() {
        std::env::set_var(key, value);
    }
    let err = nix::unistd::execvp(&c_path, &c_args).unwrap_err();

    let message = format!("exec: {}: {}", name, err);
    if state.interactive {
        fail(message)
    } else {
        eprintln!("den: {}", message);
        Err(Interrupt::Exit(126))
    }
}

/// `source file args…`: run a file's contents in the current shell, with
/// the positional parameters temporarily replaced when args are given.
pub fn source(state: &mut ShellState, args: &[String]) -> Exec {
    let Some(path) = args.first() else {
        return fail("source: filename argument required");
    };

    let resolved = if path.contains('/') {
        path.clone()
    } else {
        // Sourcing searches PATH first, then the current directory.
        resolve::find_external(state, path).unwrap_or_else(|| path.clone())
    };

    let contents = match std::fs::read_to_string(&resolved) {
        Ok(contents) => contents,
        Err(e) => return fail(format!("source: {}: {}", path, e)),
    };

    let script = match crate::parser::parse(&contents) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("den: source: {}", e);
            return Ok(2);
        }
    };

    let saved_positional = if args.len() > 1 {
        Some(std::mem::replace(&mut state.positional, args[1..].to_vec()))
    } else {
        None
    };
    state.exec_directly = false;
    state.function_depth += 1;

    let result = crate::exec::execute_script(state, &script);

    state.function_depth -= 1;
    if let Some(saved) = saved_positional {
        state.positional = saved;
    }
    crate::exec::run_trap_condition(state, crate::state::TrapCondition::Return);

    match result {
        Err(Interrupt::Return(status)) => Ok(status),
        other => other,
    }
}
