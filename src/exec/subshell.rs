//! Subshells
//!
//! Real forks for `( … )` groups, background chains, command substitution
//! capture, and process substitution. The child inherits the whole shell
//! state by copy, resets non-ignored traps, and exits with its body's
//! status; nothing it mutates reaches the parent.

use std::io::Read;
use std::os::fd::AsRawFd;

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, setpgid, ForkResult, Pid};

use crate::ast::{ProcessDirection, ProcessSubstPart, ScriptNode, StatementNode};
use crate::error::ShellError;
use crate::exec::control_flow::{Exec, Interrupt};
use crate::exec::pipeline::child_signal_defaults;
use crate::state::ShellState;

fn fork_failed(e: nix::errno::Errno) -> ShellError {
    ShellError::Internal(format!("cannot fork: {}", e))
}

/// Run statements in a forked child and exit with their status.
fn child_run(state: &mut ShellState, body: &[StatementNode]) -> ! {
    state.enter_subshell();
    let status = match crate::exec::execute_statements(state, body, false) {
        Ok(status) => status,
        Err(interrupt) => {
            if let Interrupt::Error(e) = &interrupt {
                e.report();
            }
            interrupt.status()
        }
    };
    std::process::exit(status);
}

/// `( … )`: fork, run the body, wait.
pub fn run_subshell(state: &mut ShellState, body: &[StatementNode]) -> Exec {
    match unsafe { fork() }.map_err(|e| Interrupt::Error(fork_failed(e)))? {
        ForkResult::Child => {
            child_signal_defaults();
            child_run(state, body)
        }
        ForkResult::Parent { child } => {
            let status = loop {
                match waitpid(child, None) {
                    Ok(WaitStatus::Exited(_, code)) => break code,
                    Ok(WaitStatus::Signaled(_, sig, _)) => break 128 + sig as i32,
                    Err(nix::errno::Errno::EINTR) => continue,
                    _ => break 1,
                }
            };
            Ok(status)
        }
    }
}

/// Background `&`: the whole chain runs in a forked child tracked as a
/// job; the shell continues immediately with status 0.
pub fn spawn_background(state: &mut ShellState, stmt: &StatementNode) -> Exec {
    let job_control = state.options.monitor && state.interactive && state.subshell_depth == 0;

    match unsafe { fork() }.map_err(|e| Interrupt::Error(fork_failed(e)))? {
        ForkResult::Child => {
            if job_control {
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
                child_signal_defaults();
            } else {
                // Without job control, background children shrug off the
                // keyboard.
                unsafe {
                    libc::signal(libc::SIGINT, libc::SIG_IGN);
                    libc::signal(libc::SIGQUIT, libc::SIG_IGN);
                }
            }
            let mut foreground = stmt.clone();
            foreground.background = false;
            let body = [foreground];
            child_run(state, &body)
        }
        ForkResult::Parent { child } => {
            let pid = child.as_raw();
            if job_control {
                let _ = setpgid(child, child);
            }
            let text = stmt
                .source_text
                .clone()
                .unwrap_or_else(|| stmt.to_string());
            let id = state.jobs.add(pid, vec![pid], text, true);
            state.last_bg_pid = Some(pid);
            if state.interactive {
                eprintln!("[{}] {}", id, pid);
            }
            Ok(0)
        }
    }
}

/// `$(cmd)`: capture the child's stdout, strip trailing newlines, and
/// record its status in `$?`.
pub fn command_substitution(
    state: &mut ShellState,
    script: &ScriptNode,
) -> Result<String, ShellError> {
    let (read_end, write_end) = nix::unistd::pipe()
        .map_err(|e| ShellError::Internal(format!("cannot create pipe: {}", e)))?;

    match unsafe { fork() }.map_err(fork_failed)? {
        ForkResult::Child => {
            drop(read_end);
            unsafe { libc::dup2(write_end.as_raw_fd(), 1) };
            drop(write_end);
            child_signal_defaults();
            child_run(state, &script.statements)
        }
        ForkResult::Parent { child } => {
            drop(write_end);
            let mut output = String::new();
            let mut reader = std::fs::File::from(read_end);
            let _ = reader.read_to_string(&mut output);
            drop(reader);

            let status = loop {
                match waitpid(child, None) {
                    Ok(WaitStatus::Exited(_, code)) => break code,
                    Ok(WaitStatus::Signaled(_, sig, _)) => break 128 + sig as i32,
                    Err(nix::errno::Errno::EINTR) => continue,
                    _ => break 1,
                }
            };
            state.set_status(status);

            while output.ends_with('\n') {
                output.pop();
            }
            Ok(output)
        }
    }
}

/// `<(cmd)` / `>(cmd)`: spawn the body on one end of a pipe and hand back
/// a `/dev/fd/N` path naming the other end. The fd and the child are
/// parked on the state until the consuming command is done.
pub fn process_substitution(
    state: &mut ShellState,
    part: &ProcessSubstPart,
) -> Result<String, ShellError> {
    let (read_end, write_end) = nix::unistd::pipe()
        .map_err(|e| ShellError::Internal(format!("cannot create pipe: {}", e)))?;

    match unsafe { fork() }.map_err(fork_failed)? {
        ForkResult::Child => {
            match part.direction {
                ProcessDirection::Input => {
                    // The command writes; the consumer reads our output.
                    drop(read_end);
                    unsafe { libc::dup2(write_end.as_raw_fd(), 1) };
                    drop(write_end);
                }
                ProcessDirection::Output => {
                    drop(write_end);
                    unsafe { libc::dup2(read_end.as_raw_fd(), 0) };
                    drop(read_end);
                }
            }
            child_signal_defaults();
            child_run(state, &part.body.statements)
        }
        ForkResult::Parent { child } => {
            let keep = match part.direction {
                ProcessDirection::Input => {
                    drop(write_end);
                    read_end
                }
                ProcessDirection::Output => {
                    drop(read_end);
                    write_end
                }
            };
            let path = format!("/dev/fd/{}", keep.as_raw_fd());
            state.pending_proc_subs.push((keep, child.as_raw()));
            Ok(path)
        }
    }
}

/// Close process-substitution fds and reap their children once the
/// consuming command has exited.
pub fn cleanup_process_substitutions(state: &mut ShellState) {
    for (fd, pid) in state.pending_proc_subs.drain(..) {
        drop(fd);
        loop {
            match waitpid(Pid::from_raw(pid), None) {
                Err(nix::errno::Errno::EINTR) => continue,
                _ => break,
            }
        }
    }
}
