//! Pipeline Execution
//!
//! Multi-stage pipelines fork one child per stage with real pipes wired
//! between them; each stage expands and resolves its own command inside
//! the child, so stage-local side effects die with it. Externals exec
//! directly in the stage child. Under job control every pipeline gets its
//! own process group, and foreground pipelines borrow the terminal until
//! they finish or stop.

use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::Command;

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, setpgid, tcsetpgrp, ForkResult, Pid};

use crate::ast::PipelineNode;
use crate::error::ShellError;
use crate::exec::control_flow::{Exec, Interrupt};
use crate::exec::job::JobState;
use crate::exec::redirect::{self, PreparedRedirs};
use crate::exec::resolve;
use crate::state::ShellState;

/// Run one pipeline in the foreground and return its status.
pub fn run_pipeline(state: &mut ShellState, node: &PipelineNode) -> Exec {
    if node.timed {
        return run_timed(state, node);
    }

    let status = if node.commands.len() == 1 {
        crate::exec::execute_command(state, &node.commands[0])?
    } else {
        run_multi(state, node, false)?
    };

    if node.negated {
        Ok(if status == 0 { 1 } else { 0 })
    } else {
        Ok(status)
    }
}

/// `time` prefix: run the pipeline and report wall/user/sys to stderr.
fn run_timed(state: &mut ShellState, node: &PipelineNode) -> Exec {
    use nix::sys::resource::{getrusage, UsageWho};

    let wall_start = std::time::Instant::now();
    let usage_before = getrusage(UsageWho::RUSAGE_CHILDREN).ok();

    let inner = PipelineNode {
        commands: node.commands.clone(),
        negated: node.negated,
        timed: false,
        stderr_pipes: node.stderr_pipes.clone(),
    };
    let result = run_pipeline(state, &inner);

    let wall = wall_start.elapsed();
    let (user, sys) = match (usage_before, getrusage(UsageWho::RUSAGE_CHILDREN).ok()) {
        (Some(before), Some(after)) => (
            time_delta(after.user_time(), before.user_time()),
            time_delta(after.system_time(), before.system_time()),
        ),
        _ => (0.0, 0.0),
    };
    eprintln!(
        "\nreal\t{}m{:.3}s\nuser\t{}m{:.3}s\nsys\t{}m{:.3}s",
        wall.as_secs() / 60,
        wall.as_secs_f64() % 60.0,
        (user as u64) / 60,
        user % 60.0,
        (sys as u64) / 60,
        sys % 60.0,
    );
    result
}

fn time_delta(after: nix::sys::time::TimeVal, before: nix::sys::time::TimeVal) -> f64 {
    let a = after.tv_sec() as f64 + after.tv_usec() as f64 / 1e6;
    let b = before.tv_sec() as f64 + before.tv_usec() as f64 / 1e6;
    (a - b).max(0.0)
}

/// Fork every stage, wire the pipes, wait for the lot.
///
/// Returns the pipeline status; with `background` the job is registered
/// and 0 comes back immediately.
pub fn run_multi(state: &mut ShellState, node: &PipelineNode, background: bool) -> Exec {
    let n = node.commands.len();
    let job_control = state.options.monitor && state.interactive && state.subshell_depth == 0;

    // One pipe per join.
    let mut pipes: Vec<(OwnedFd, OwnedFd)> = Vec::new();
    for _ in 0..n.saturating_sub(1) {
        let pair = nix::unistd::pipe().map_err(|e| {
            Interrupt::Error(ShellError::Internal(format!("cannot create pipe: {}", e)))
        })?;
        pipes.push(pair);
    }

    let mut pids: Vec<i32> = Vec::new();
    let mut pgid: i32 = 0;

    for (i, command) in node.commands.iter().enumerate() {
        let stdin_fd = if i > 0 {
            Some(pipes[i - 1].0.as_raw_fd())
        } else {
            None
        };
        let stdout_fd = if i < n - 1 {
            Some(pipes[i].1.as_raw_fd())
        } else {
            None
        };
        let stderr_too = i < n - 1 && node.stderr_pipes.get(i).copied().unwrap_or(false);

        match unsafe { fork() }.map_err(|e| {
            Interrupt::Error(ShellError::Internal(format!("cannot fork: {}", e)))
        })? {
            ForkResult::Child => {
                child_signal_defaults();
                if job_control {
                    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(pgid));
                }
                if let Some(fd) = stdin_fd {
                    unsafe { libc::dup2(fd, 0) };
                }
                if let Some(fd) = stdout_fd {
                    unsafe { libc::dup2(fd, 1) };
                    if stderr_too {
                        unsafe { libc::dup2(fd, 2) };
                    }
                }
                drop(pipes);

                state.interactive = false;
                state.subshell_depth += 1;
                state.options.monitor = false;
                state.exec_directly = true;
                let status = match crate::exec::execute_command(state, command) {
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
            ForkResult::Parent { child } => {
                let pid = child.as_raw();
                if pgid == 0 {
                    pgid = pid;
                }
                if job_control {
                    let _ = setpgid(child, Pid::from_raw(pgid));
                }
                pids.push(pid);
            }
        }
    }

    // Drop all pipe fds in the parent; children hold their own copies.
    drop(pipes);

    let command_text = node
        .commands
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" | ");

    if background {
        state.jobs.add(pgid, pids.clone(), command_text, true);
        state.last_bg_pid = pids.last().copied();
        return Ok(0);
    }

    if job_control {
        give_terminal_to(pgid);
    }
    let status = wait_for_pids(state, pgid, &pids, &command_text, job_control);
    if job_control {
        reclaim_terminal(state);
    }
    status
}

/// Wait for the pipeline members in order; the pipeline status is the last
/// stage's (or the rightmost failure under pipefail).
fn wait_for_pids(
    state: &mut ShellState,
    pgid: i32,
    pids: &[i32],
    command_text: &str,
    job_control: bool,
) -> Exec {
    let mut statuses: Vec<i32> = vec![0; pids.len()];
    let mut stopped = false;

    for (i, pid) in pids.iter().enumerate() {
        let flags = if job_control {
            Some(WaitPidFlag::WUNTRACED)
        } else {
            None
        };
        loop {
            match waitpid(Pid::from_raw(*pid), flags) {
                Ok(WaitStatus::Exited(_, code)) => {
                    statuses[i] = code;
                    break;
                }
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    statuses[i] = 128 + sig as i32;
                    break;
                }
                Ok(WaitStatus::Stopped(_, _)) => {
                    stopped = true;
                    statuses[i] = 128 + libc::SIGTSTP;
                    break;
                }
                Ok(_) => continue,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(_) => break,
            }
        }
        if stopped {
            break;
        }
    }

    if stopped {
        let id = state
            .jobs
            .add(pgid, pids.to_vec(), command_text.to_string(), false);
        if let Some(job) = state.jobs.get_mut(id) {
            job.state = JobState::Stopped;
            job.notified = false;
        }
        return Ok(128 + libc::SIGTSTP);
    }

    let status = if state.options.pipefail {
        statuses
            .iter()
            .rev()
            .find(|s| **s != 0)
            .copied()
            .unwrap_or(0)
    } else {
        statuses.last().copied().unwrap_or(0)
    };
    Ok(status)
}

/// Run an external command from the shell process.
///
/// With `exec_directly` set (pipeline stage children) the process image is
/// replaced instead of spawning a grandchild.
pub fn run_external(
    state: &mut ShellState,
    argv: &[String],
    extra_env: &[(String, String)],
    prepared: PreparedRedirs,
) -> Exec {
    let Some(path) = resolve::find_external(state, &argv[0]) else {
        let err = ShellError::CommandNotFound(argv[0].clone());
        err.report();
        return Ok(err.status());
    };

    if state.exec_directly {
        exec_image(state, &path, argv, extra_env, prepared);
    }

    let job_control = state.options.monitor && state.interactive && state.subshell_depth == 0;
    let mut command = Command::new(&path);
    command.args(&argv[1..]);
    command.env_clear();
    command.envs(state.env.exported_pairs());
    command.envs(extra_env.iter().cloned());
    if job_control {
        command.process_group(0);
    }

    let (actions, pipes_keepalive) = prepared.into_parts();
    unsafe {
        command.pre_exec(move || {
            child_signal_defaults();
            redirect::apply_raw(&actions)?;
            Ok(())
        });
    }

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            let err = match e.kind() {
                std::io::ErrorKind::NotFound => ShellError::CommandNotFound(argv[0].clone()),
                std::io::ErrorKind::PermissionDenied => ShellError::PermissionDenied(path),
                _ => ShellError::Internal(format!("{}: {}", path, e)),
            };
            err.report();
            return Ok(err.status());
        }
    };
    drop(pipes_keepalive);

    let pid = child.id() as i32;
    let pgid = pid;
    if job_control {
        give_terminal_to(pgid);
    }
    let command_text = argv.join(" ");
    let status = wait_for_pids(state, pgid, &[pid], &command_text, job_control);
    if job_control {
        reclaim_terminal(state);
    }
    status
}

/// Replace the current process with the external command. Only returns on
/// failure, by exiting with 126/127.
fn exec_image(
    state: &mut ShellState,
    path: &str,
    argv: &[String],
    extra_env: &[(String, String)],
    prepared: PreparedRedirs,
) -> ! {
    use std::ffi::CString;

    if redirect::apply_raw(&prepared.actions).is_err() {
        std::process::exit(1);
    }

    for (name, value) in state.env.exported_pairs() {
        std::env::set_var(name, value);
    }
    for (name, value) in extra_env {
        std::env::set_var(name, value);
    }

    let c_path = CString::new(path).unwrap_or_default();
    let c_args: Vec<CString> = argv
        .iter()
        .map(|a| CString::new(a.as_str()).unwrap_or_default())
        .collect();
    let err = nix::unistd::execvp(&c_path, &c_args).unwrap_err();
    let status = match err {
        nix::errno::Errno::ENOENT => {
            ShellError::CommandNotFound(argv[0].clone()).report();
            127
        }
        nix::errno::Errno::EACCES => {
            ShellError::PermissionDenied(path.to_string()).report();
            126
        }
        other => {
            ShellError::Internal(format!("{}: {}", path, other)).report();
            126
        }
    };
    std::process::exit(status);
}

/// Default dispositions for the signals the shell manipulates, restored in
/// children before they run or exec.
pub fn child_signal_defaults() {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        libc::signal(libc::SIGQUIT, libc::SIG_DFL);
        libc::signal(libc::SIGTSTP, libc::SIG_DFL);
        libc::signal(libc::SIGTTIN, libc::SIG_DFL);
        libc::signal(libc::SIGTTOU, libc::SIG_DFL);
        libc::signal(libc::SIGCHLD, libc::SIG_DFL);
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

/// Hand the controlling terminal to a process group.
pub fn give_terminal_to(pgid: i32) {
    let _ = tcsetpgrp(std::io::stdin(), Pid::from_raw(pgid));
}

/// Take the terminal back after a foreground job finished or stopped.
pub fn reclaim_terminal(state: &ShellState) {
    let _ = tcsetpgrp(std::io::stdin(), Pid::from_raw(state.shell_pid));
}

/// Block until a job finishes (the `wait`/`fg` builtins). Stopped jobs
/// stay stopped and report 128+SIGTSTP.
pub fn wait_for_job(state: &mut ShellState, id: usize) -> i32 {
    let pids: Vec<i32> = match state.jobs.get(id) {
        Some(job) => job
            .pids
            .iter()
            .filter(|(_, st)| st.is_none())
            .map(|(p, _)| *p)
            .collect(),
        None => return 127,
    };

    for pid in pids {
        loop {
            match waitpid(Pid::from_raw(pid), Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::StillAlive) => continue,
                Ok(status @ WaitStatus::Stopped(_, _)) => {
                    state.jobs.record_wait(status);
                    return 128 + libc::SIGTSTP;
                }
                Ok(status) => {
                    state.jobs.record_wait(status);
                    break;
                }
                Err(nix::errno::Errno::EINTR) => continue,
                Err(_) => break,
            }
        }
    }

    let status = state.jobs.get(id).map(|j| j.status()).unwrap_or(0);
    status
}
