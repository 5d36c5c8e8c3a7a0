//! Directory Builtins
//!
//! cd, pwd, and the pushd/popd/dirs stack. `PWD` always holds the
//! canonical path of the working directory after a successful move, with
//! `OLDPWD` trailing one step behind.

use std::path::{Path, PathBuf};

use crate::exec::Exec;
use crate::state::ShellState;

fn fail(message: impl std::fmt::Display) -> Exec {
    eprintln!("den: {}", message);
    Ok(1)
}

/// Change directory, canonicalizing PWD and dropping stale caches.
pub(crate) fn change_directory(state: &mut ShellState, target: &str) -> Result<String, String> {
    let path = if target.starts_with('/') {
        PathBuf::from(target)
    } else {
        Path::new(&state.cwd()).join(target)
    };

    let canonical = std::fs::canonicalize(&path)
        .map_err(|e| format!("cd: {}: {}", target, e))?;
    std::env::set_current_dir(&canonical)
        .map_err(|e| format!("cd: {}: {}", target, e))?;

    let new_pwd = canonical.to_string_lossy().into_owned();
    let old_pwd = state.cwd();
    let _ = state.env.set("OLDPWD", old_pwd);
    let _ = state.env.set("PWD", new_pwd.clone());
    state.env.export("PWD");
    state.env.export("OLDPWD");

    // Relative PATH hits and glob results are tied to the old directory.
    state.command_hash.retain(|_, path| path.starts_with('/'));
    state.caches.invalidate();
    Ok(new_pwd)
}

pub fn cd(state: &mut ShellState, args: &[String]) -> Exec {
    let target = match args.first().map(|s| s.as_str()) {
        None => state.home(),
        Some("-") => {
            let old = state.env.value("OLDPWD").unwrap_or_default().to_string();
            if old.is_empty() {
                return fail("cd: OLDPWD not set");
            }
            match change_directory(state, &old) {
                Ok(new_pwd) => {
                    println!("{}", new_pwd);
                    return Ok(0);
                }
                Err(e) => return fail(e),
            }
        }
        Some(dir) => dir.to_string(),
    };

    match change_directory(state, &target) {
        Ok(_) => Ok(0),
        Err(e) => fail(e),
    }
}

pub fn pwd(state: &mut ShellState, args: &[String]) -> Exec {
    if args.first().map(|s| s.as_str()) == Some("-P") {
        match std::env::current_dir() {
            Ok(dir) => println!("{}", dir.display()),
            Err(e) => return fail(format!("pwd: {}", e)),
        }
    } else {
        println!("{}", state.cwd());
    }
    Ok(0)
}

pub fn pushd(state: &mut ShellState, args: &[String]) -> Exec {
    match args.first() {
        Some(dir) => {
            let here = state.cwd();
            match change_directory(state, dir) {
                Ok(_) => {
                    state.dir_stack.push(here);
                    print_stack(state);
                    Ok(0)
                }
                Err(e) => fail(e),
            }
        }
        None => {
            // Swap the top of the stack with the current directory.
            let Some(top) = state.dir_stack.pop() else {
                return fail("pushd: no other directory");
            };
            let here = state.cwd();
            match change_directory(state, &top) {
                Ok(_) => {
                    state.dir_stack.push(here);
                    print_stack(state);
                    Ok(0)
                }
                Err(e) => {
                    state.dir_stack.push(top);
                    fail(e)
                }
            }
        }
    }
}

pub fn popd(state: &mut ShellState, _args: &[String]) -> Exec {
    let Some(top) = state.dir_stack.pop() else {
        return fail("popd: directory stack empty");
    };
    match change_directory(state, &top) {
        Ok(_) => {
            print_stack(state);
            Ok(0)
        }
        Err(e) => fail(e),
    }
}

pub fn dirs(state: &mut ShellState, args: &[String]) -> Exec {
    if args.first().map(|s| s.as_str()) == Some("-c") {
        state.dir_stack.clear();
        return Ok(0);
    }
    print_stack(state);
    Ok(0)
}

fn print_stack(state: &ShellState) {
    let mut entries = vec![state.cwd()];
    entries.extend(state.dir_stack.iter().rev().cloned());
    let home = state.home();
    let shortened: Vec<String> = entries
        .iter()
        .map(|d| match d.strip_prefix(&home) {
            Some(rest) if !home.is_empty() => format!("~{}", rest),
            _ => d.clone(),
        })
        .collect();
    println!("{}", shortened.join(" "));
}
