//! Variable & Option Builtins
//!
//! export, env, set, unset, declare, readonly, local, shift, getopts.

use crate::exec::Exec;
use crate::parser::word::is_valid_name;
use crate::state::ShellState;

fn fail(message: impl std::fmt::Display) -> Exec {
    eprintln!("den: {}", message);
    Ok(1)
}

/// Split `NAME=value` arguments used by export/declare/readonly.
fn split_spec(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (arg, None),
    }
}

pub fn export(state: &mut ShellState, args: &[String]) -> Exec {
    if args.is_empty() || args[0] == "-p" {
        for (name, var) in state.env.visible() {
            if var.exported {
                println!("declare -x {}=\"{}\"", name, var.value.replace('"', "\\\""));
            }
        }
        return Ok(0);
    }

    let mut unexport = false;
    let mut status = 0;
    for arg in args {
        if arg == "-n" {
            unexport = true;
            continue;
        }
        let (name, value) = split_spec(arg);
        if !is_valid_name(name) {
            eprintln!("den: export: {}: not a valid identifier", name);
            status = 1;
            continue;
        }
        if let Some(value) = value {
            if let Err(e) = state.assign(name, value) {
                eprintln!("den: export: {}: readonly variable", e.name);
                status = 1;
                continue;
            }
        }
        if unexport {
            state.env.unexport(name);
        } else {
            state.env.export(name);
        }
    }
    Ok(status)
}

pub fn env(state: &mut ShellState, args: &[String]) -> Exec {
    // Leading NAME=value pairs, then an optional command to run.
    let mut extra = Vec::new();
    let mut index = 0;
    while let Some(arg) = args.get(index) {
        match arg.split_once('=') {
            Some((name, value)) if is_valid_name(name) => {
                extra.push((name.to_string(), value.to_string()));
                index += 1;
            }
            _ => break,
        }
    }

    if index >= args.len() {
        for (name, value) in state.env.exported_pairs() {
            println!("{}={}", name, value);
        }
        for (name, value) in &extra {
            println!("{}={}", name, value);
        }
        return Ok(0);
    }

    let argv: Vec<String> = args[index..].to_vec();
    let prepared = crate::exec::redirect::PreparedRedirs::default();
    crate::exec::pipeline::run_external(state, &argv, &extra, prepared)
}

pub fn set(state: &mut ShellState, args: &[String]) -> Exec {
    if args.is_empty() {
        for (name, var) in state.env.visible() {
            println!("{}={}", name, var.value);
        }
        return Ok(0);
    }

    let mut index = 0;
    while index < args.len() {
        let arg = args[index].as_str();
        match arg {
            "--" => {
                state.positional = args[index + 1..].to_vec();
                return Ok(0);
            }
            "-o" | "+o" => {
                let enable = arg.starts_with('-');
                match args.get(index + 1) {
                    Some(name) => {
                        if !state.options.set(name, enable) {
                            return fail(format!("set: {}: invalid option name", name));
                        }
                        index += 2;
                    }
                    None => {
                        for (name, on) in state.options.listing() {
                            if enable {
                                println!("{:<12}{}", name, if on { "on" } else { "off" });
                            } else {
                                println!("set {}o {}", if on { "-" } else { "+" }, name);
                            }
                        }
                        index += 1;
                    }
                }
            }
            _ if (arg.starts_with('-') || arg.starts_with('+')) && arg.len() > 1 => {
                let enable = arg.starts_with('-');
                for flag in arg[1..].chars() {
                    if !state.options.set_short(flag, enable) {
                        return fail(format!("set: -{}: invalid option", flag));
                    }
                }
                index += 1;
            }
            _ => {
                state.positional = args[index..].to_vec();
                return Ok(0);
            }
        }
    }
    Ok(0)
}

pub fn unset(state: &mut ShellState, args: &[String]) -> Exec {
    let mut functions_only = false;
    let mut vars_only = false;
    let mut status = 0;

    for arg in args {
        match arg.as_str() {
            "-f" => functions_only = true,
            "-v" => vars_only = true,
            name => {
                if functions_only {
                    state.functions.remove(name);
                    continue;
                }
                if !vars_only && !state.env.is_set(name) && state.functions.remove(name).is_some()
                {
                    continue;
                }
                if let Err(e) = state.env.unset(name) {
                    eprintln!("den: unset: {}: readonly variable", e.name);
                    status = 1;
                }
                state.caches.invalidate();
            }
        }
    }
    Ok(status)
}

pub fn declare(state: &mut ShellState, args: &[String]) -> Exec {
    let mut export_attr = false;
    let mut readonly_attr = false;
    let mut print = false;
    let mut names = Vec::new();

    for arg in args {
        match arg.as_str() {
            "-x" => export_attr = true,
            "-r" => readonly_attr = true,
            "-p" => print = true,
            _ => names.push(arg),
        }
    }

    if names.is_empty() || print {
        for (name, var) in state.env.visible() {
            let mut attrs = String::new();
            if var.exported {
                attrs.push('x');
            }
            if var.readonly {
                attrs.push('r');
            }
            if attrs.is_empty() {
                attrs.push('-');
            }
            println!("declare -{} {}=\"{}\"", attrs, name, var.value);
        }
        return Ok(0);
    }

    let mut status = 0;
    for spec in names {
        let (name, value) = split_spec(spec);
        if !is_valid_name(name) {
            eprintln!("den: declare: {}: not a valid identifier", name);
            status = 1;
            continue;
        }
        if let Some(value) = value {
            if let Err(e) = state.assign(name, value) {
                eprintln!("den: declare: {}: readonly variable", e.name);
                status = 1;
                continue;
            }
        } else if !state.env.is_set(name) {
            let _ = state.assign(name, "");
        }
        if export_attr {
            state.env.export(name);
        }
        if readonly_attr {
            state.env.mark_readonly(name);
        }
    }
    Ok(status)
}

pub fn readonly(state: &mut ShellState, args: &[String]) -> Exec {
    if args.is_empty() || args[0] == "-p" {
        for (name, var) in state.env.visible() {
            if var.readonly {
                println!("readonly {}=\"{}\"", name, var.value);
            }
        }
        return Ok(0);
    }

    let mut status = 0;
    for spec in args {
        let (name, value) = split_spec(spec);
        if !is_valid_name(name) {
            eprintln!("den: readonly: {}: not a valid identifier", name);
            status = 1;
            continue;
        }
        if let Some(value) = value {
            if let Err(e) = state.assign(name, value) {
                eprintln!("den: readonly: {}: readonly variable", e.name);
                status = 1;
                continue;
            }
        }
        state.env.mark_readonly(name);
    }
    Ok(status)
}

pub fn local(state: &mut ShellState, args: &[String]) -> Exec {
    if state.function_depth == 0 {
        return fail("local: can only be used in a function");
    }
    let mut status = 0;
    for spec in args {
        let (name, value) = split_spec(spec);
        if !is_valid_name(name) {
            eprintln!("den: local: {}: not a valid identifier", name);
            status = 1;
            continue;
        }
        if let Err(e) = state.env.set_local(name, value.unwrap_or("")) {
            eprintln!("den: local: {}: readonly variable", e.name);
            status = 1;
        }
    }
    state.caches.invalidate();
    Ok(status)
}

pub fn shift(state: &mut ShellState, args: &[String]) -> Exec {
    let n = match args.first() {
        None => 1,
        Some(text) => match text.parse::<usize>() {
            Ok(n) => n,
            Err(_) => return fail(format!("shift: {}: numeric argument required", text)),
        },
    };
    if n > state.positional.len() {
        return Ok(1);
    }
    state.positional.drain(..n);
    Ok(0)
}

pub fn getopts(state: &mut ShellState, args: &[String]) -> Exec {
    let (Some(optstring), Some(varname)) = (args.first(), args.get(1)) else {
        return fail("getopts: usage: getopts optstring name [arg ...]");
    };
    let silent = optstring.starts_with(':');
    let optstring = optstring.trim_start_matches(':');
    let params: Vec<String> = if args.len() > 2 {
        args[2..].to_vec()
    } else {
        state.positional.clone()
    };

    // OPTIND is user-visible; an external reset rewinds the cursor.
    let optind: usize = state
        .env
        .value("OPTIND")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    if optind != state.getopts_state.0 {
        state.getopts_state = (optind, 0);
    }
    let (mut index, mut offset) = state.getopts_state;

    let finish = |state: &mut ShellState, index: usize, offset: usize| {
        state.getopts_state = (index, offset);
        let _ = state.assign("OPTIND", &index.to_string());
    };

    loop {
        let Some(param) = params.get(index.saturating_sub(1)) else {
            finish(state, index, 0);
            let _ = state.assign(varname, "?");
            return Ok(1);
        };
        if offset == 0 {
            if param == "--" {
                finish(state, index + 1, 0);
                let _ = state.assign(varname, "?");
                return Ok(1);
            }
            if !param.starts_with('-') || param.len() < 2 {
                finish(state, index, 0);
                let _ = state.assign(varname, "?");
                return Ok(1);
            }
            offset = 1;
        }

        let Some(opt) = param.chars().nth(offset) else {
            index += 1;
            offset = 0;
            continue;
        };

        let next_offset = if offset + 1 < param.chars().count() {
            offset + 1
        } else {
            0
        };
        let next_index = if next_offset == 0 { index + 1 } else { index };

        let spec_pos = optstring.find(opt);
        match spec_pos {
            None => {
                finish(state, next_index, next_offset);
                let _ = state.assign(varname, "?");
                if silent {
                    let _ = state.assign("OPTARG", &opt.to_string());
                } else {
                    eprintln!("den: getopts: illegal option -- {}", opt);
                    let _ = state.env.unset("OPTARG");
                }
                return Ok(0);
            }
            Some(pos) => {
                let takes_arg = optstring.chars().nth(pos + 1) == Some(':');
                if takes_arg {
                    let arg = if next_offset != 0 {
                        // Rest of this parameter is the argument.
                        let rest: String = param.chars().skip(next_offset).collect();
                        finish(state, index + 1, 0);
                        Some(rest)
                    } else {
                        let value = params.get(next_index.saturating_sub(1)).cloned();
                        finish(state, next_index + 1, 0);
                        value
                    };
                    match arg {
                        Some(value) => {
                            let _ = state.assign("OPTARG", &value);
                            let _ = state.assign(varname, &opt.to_string());
                        }
                        None => {
                            if silent {
                                let _ = state.assign(varname, ":");
                                let _ = state.assign("OPTARG", &opt.to_string());
                            } else {
                                eprintln!(
                                    "den: getopts: option requires an argument -- {}",
                                    opt
                                );
                                let _ = state.assign(varname, "?");
                            }
                        }
                    }
                } else {
                    finish(state, next_index, next_offset);
                    let _ = state.assign(varname, &opt.to_string());
                    let _ = state.env.unset("OPTARG");
                }
                return Ok(0);
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

    fn fresh() -> ShellState {
        ShellState::new("den")
    }

    #[test]
    fn shift_moves_positionals() {
        let mut state = fresh();
        state.positional = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(shift(&mut state, &[]).unwrap(), 0);
        assert_eq!(state.positional, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(shift(&mut state, &["5".into()]).unwrap(), 1);
        assert_eq!(state.positional.len(), 2);
    }

    #[test]
    fn set_flags_and_options() {
        let mut state = fresh();
        set(&mut state, &["-e".into(), "-u".into()]).unwrap();
        assert!(state.options.errexit);
        assert!(state.options.nounset);
        set(&mut state, &["+e".into()]).unwrap();
        assert!(!state.options.errexit);
        set(&mut state, &["-o".into(), "pipefail".into()]).unwrap();
        assert!(state.options.pipefail);
    }

    #[test]
    fn set_positional_params() {
        let mut state = fresh();
        set(&mut state, &["--".into(), "x".into(), "y".into()]).unwrap();
        assert_eq!(state.positional, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn export_and_unset() {
        let mut state = fresh();
        export(&mut state, &["FOO=bar".into()]).unwrap();
        assert!(state.env.get("FOO").unwrap().exported);
        unset(&mut state, &["FOO".into()]).unwrap();
        assert!(!state.env.is_set("FOO"));
    }

    #[test]
    fn readonly_violations_reported() {
        let mut state = fresh();
        readonly(&mut state, &["R=1".into()]).unwrap();
        let status = unset(&mut state, &["R".into()]).unwrap();
        assert_eq!(status, 1);
        assert_eq!(state.env.value("R"), Some("1"));
    }

    #[test]
    fn getopts_walks_options() {
        let mut state = fresh();
        let args = |s: &str| -> Vec<String> {
            let mut v = vec!["ab:".to_string(), "opt".to_string()];
            v.extend(s.split_whitespace().map(String::from));
            v
        };

        // -a -b value stop
        let argv = args("-a -b value rest");
        assert_eq!(getopts(&mut state, &argv).unwrap(), 0);
        assert_eq!(state.env.value("opt"), Some("a"));
        assert_eq!(getopts(&mut state, &argv).unwrap(), 0);
        assert_eq!(state.env.value("opt"), Some("b"));
        assert_eq!(state.env.value("OPTARG"), Some("value"));
        assert_eq!(getopts(&mut state, &argv).unwrap(), 1);
        assert_eq!(state.env.value("OPTIND"), Some("4"));
    }

    #[test]
    fn getopts_clustered_options() {
        let mut state = fresh();
        let argv: Vec<String> = vec!["xy".into(), "opt".into(), "-xy".into()];
        assert_eq!(getopts(&mut state, &argv).unwrap(), 0);
        assert_eq!(state.env.value("opt"), Some("x"));
        assert_eq!(getopts(&mut state, &argv).unwrap(), 0);
        assert_eq!(state.env.value("opt"), Some("y"));
        assert_eq!(getopts(&mut state, &argv).unwrap(), 1);
    }
}
