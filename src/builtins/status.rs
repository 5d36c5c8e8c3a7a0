//! Status & Control-Flow Builtins
//!
//! exit, return, break, continue, true, false. The control-flow ones
//! raise [`Interrupt`]s that the matching construct consumes.

use crate::exec::{Exec, Interrupt};
use crate::state::ShellState;

fn parse_count(args: &[String], what: &str) -> Result<u32, String> {
    match args.first() {
        None => Ok(1),
        Some(text) => text
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| format!("{}: {}: numeric argument required", what, text)),
    }
}

pub fn exit(state: &mut ShellState, args: &[String]) -> Exec {
    let status = match args.first() {
        None => state.last_status,
        Some(text) => match text.parse::<i32>() {
            Ok(n) => n.rem_euclid(256),
            Err(_) => {
                eprintln!("den: exit: {}: numeric argument required", text);
                2
            }
        },
    };
    Err(Interrupt::Exit(status))
}

pub fn r#return(state: &mut ShellState, args: &[String]) -> Exec {
    if state.function_depth == 0 {
        eprintln!("den: return: can only `return' from a function or sourced script");
        return Ok(1);
    }
    let status = match args.first() {
        None => state.last_status,
        Some(text) => text.parse::<i32>().unwrap_or(2).rem_euclid(256),
    };
    Err(Interrupt::Return(status))
}

pub fn r#break(state: &mut ShellState, args: &[String]) -> Exec {
    if state.loop_depth == 0 {
        eprintln!("den: break: only meaningful in a loop");
        return Ok(0);
    }
    match parse_count(args, "break") {
        Ok(n) => Err(Interrupt::Break(n.min(state.loop_depth as u32))),
        Err(e) => {
            eprintln!("den: {}", e);
            Ok(1)
        }
    }
}

pub fn r#continue(state: &mut ShellState, args: &[String]) -> Exec {
    if state.loop_depth == 0 {
        eprintln!("den: continue: only meaningful in a loop");
        return Ok(0);
    }
    match parse_count(args, "continue") {
        Ok(n) => Err(Interrupt::Continue(n.min(state.loop_depth as u32))),
        Err(e) => {
            eprintln!("den: {}", e);
            Ok(1)
        }
    }
}

pub fn r#true(_state: &mut ShellState, _args: &[String]) -> Exec {
    Ok(0)
}

/// `:` — expand arguments, do nothing, succeed.
pub fn colon(_state: &mut ShellState, _args: &[String]) -> Exec {
    Ok(0)
}

pub fn r#false(_state: &mut ShellState, _args: &[String]) -> Exec {
    Ok(1)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_uses_last_status_by_default() {
        let mut state = ShellState::new("den");
        state.set_status(7);
        match exit(&mut state, &[]) {
            Err(Interrupt::Exit(7)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        match exit(&mut state, &["300".into()]) {
            Err(Interrupt::Exit(44)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let mut state = ShellState::new("den");
        assert!(matches!(r#return(&mut state, &[]), Ok(1)));
        state.function_depth = 1;
        state.set_status(5);
        assert!(matches!(r#return(&mut state, &[]), Err(Interrupt::Return(5))));
    }

    #[test]
    fn break_clamps_to_loop_depth() {
        let mut state = ShellState::new("den");
        state.loop_depth = 2;
        assert!(matches!(
            r#break(&mut state, &["5".into()]),
            Err(Interrupt::Break(2))
        ));
        state.loop_depth = 0;
        assert!(matches!(r#break(&mut state, &[]), Ok(0)));
    }
}
