//! Job-Control Builtins
//!
//! jobs, fg, bg, kill, wait, disown. All of them address jobs with `%`
//! specs resolved by the job table; fg and bg also move terminal
//! ownership and deliver SIGCONT to the job's process group.

use crate::exec::job::JobState;
use crate::exec::{pipeline, signal, Exec};
use crate::state::ShellState;

fn fail(message: impl std::fmt::Display) -> Exec {
    eprintln!("den: {}", message);
    Ok(1)
}

fn resolve_default(state: &ShellState, args: &[String]) -> Option<usize> {
    match args.first() {
        Some(spec) => state.jobs.resolve_spec(spec),
        None => state.jobs.current_id(),
    }
}

pub fn jobs(state: &mut ShellState, args: &[String]) -> Exec {
    state.jobs.poll_children();
    let long = args.iter().any(|a| a == "-l");
    let pids_only = args.iter().any(|a| a == "-p");
    let current = state.jobs.current_id();

    for job in state.jobs.iter() {
        if pids_only {
            println!("{}", job.pgid);
            continue;
        }
        let marker = if Some(job.id) == current { '+' } else { '-' };
        if long {
            println!(
                "[{}]{} {} {}  {}",
                job.id,
                marker,
                job.pgid,
                job.state.describe(),
                job.command
            );
        } else {
            println!("[{}]{} {}  {}", job.id, marker, job.state.describe(), job.command);
        }
    }
    Ok(0)
}

pub fn fg(state: &mut ShellState, args: &[String]) -> Exec {
    let Some(id) = resolve_default(state, args) else {
        return fail("fg: no current job");
    };
    let (pgid, command) = match state.jobs.get(id) {
        Some(job) => (job.pgid, job.command.clone()),
        None => return fail(format!("fg: %{}: no such job", id)),
    };

    println!("{}", command);
    if let Some(job) = state.jobs.get_mut(id) {
        job.state = JobState::Running;
        job.notified = true;
        job.background = false;
    }

    pipeline::give_terminal_to(pgid);
    if let Err(e) = signal::send_signal(-pgid, libc::SIGCONT) {
        pipeline::reclaim_terminal(state);
        return fail(format!("fg: {}", e));
    }
    let status = pipeline::wait_for_job(state, id);
    pipeline::reclaim_terminal(state);
    Ok(status)
}

pub fn bg(state: &mut ShellState, args: &[String]) -> Exec {
    let Some(id) = resolve_default(state, args) else {
        return fail("bg: no current job");
    };
    let (pgid, command) = match state.jobs.get(id) {
        Some(job) => (job.pgid, job.command.clone()),
        None => return fail(format!("bg: %{}: no such job", id)),
    };

    if let Err(e) = signal::send_signal(-pgid, libc::SIGCONT) {
        return fail(format!("bg: {}", e));
    }
    if let Some(job) = state.jobs.get_mut(id) {
        job.state = JobState::Running;
        job.notified = true;
        job.background = true;
    }
    println!("[{}]+ {} &", id, command);
    Ok(0)
}

pub fn kill(state: &mut ShellState, args: &[String]) -> Exec {
    let mut sig = libc::SIGTERM;
    let mut targets = Vec::new();
    let mut iter = args.iter().peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-l" => {
                // Listing mode: the common names in number order.
                println!("HUP INT QUIT ILL TRAP ABRT BUS FPE KILL USR1 SEGV USR2 PIPE ALRM TERM");
                return Ok(0);
            }
            "-s" => match iter.next().and_then(|name| signal::signal_number(name)) {
                Some(n) => sig = n,
                None => return fail("kill: invalid signal specification"),
            },
            a if a.starts_with('-') && a.len() > 1 => {
                match signal::signal_number(&a[1..]) {
                    Some(n) => sig = n,
                    None => return fail(format!("kill: {}: invalid signal specification", a)),
                }
            }
            _ => targets.push(arg.clone()),
        }
    }

    if targets.is_empty() {
        return fail("kill: usage: kill [-s sig|-sig] pid|%id ...");
    }

    let mut status = 0;
    for target in targets {
        if target.starts_with('%') {
            match state.jobs.resolve_spec(&target) {
                Some(id) => {
                    let pgid = state.jobs.get(id).map(|j| j.pgid).unwrap_or(0);
                    if let Err(e) = signal::send_signal(-pgid, sig) {
                        eprintln!("den: {}", e);
                        status = 1;
                    }
                }
                None => {
                    eprintln!("den: kill: {}: no such job", target);
                    status = 1;
                }
            }
        } else {
            match target.parse::<i32>() {
                Ok(pid) => {
                    if let Err(e) = signal::send_signal(pid, sig) {
                        eprintln!("den: {}", e);
                        status = 1;
                    }
                }
                Err(_) => {
                    eprintln!("den: kill: {}: arguments must be pids or job specs", target);
                    status = 1;
                }
            }
        }
    }
    Ok(status)
}

pub fn wait(state: &mut ShellState, args: &[String]) -> Exec {
    if args.is_empty() {
        let ids: Vec<usize> = state.jobs.iter().map(|j| j.id).collect();
        let mut status = 0;
        for id in ids {
            status = pipeline::wait_for_job(state, id);
        }
        // Everything reaped; release finished entries quietly.
        let _ = state.jobs.take_notifications();
        return Ok(status);
    }

    let mut status = 0;
    for target in args {
        if target.starts_with('%') {
            match state.jobs.resolve_spec(target) {
                Some(id) => status = pipeline::wait_for_job(state, id),
                None => {
                    eprintln!("den: wait: {}: no such job", target);
                    status = 127;
                }
            }
        } else {
            match target.parse::<i32>() {
                Ok(pid) => match state.jobs.find_by_pid(pid) {
                    Some(id) => status = pipeline::wait_for_job(state, id),
                    None => {
                        // Not one of ours (already reaped or never a job).
                        status = 127;
                    }
                },
                Err(_) => {
                    eprintln!("den: wait: {}: not a pid or job spec", target);
                    status = 2;
                }
            }
        }
    }
    let _ = state.jobs.take_notifications();
    Ok(status)
}

pub fn disown(state: &mut ShellState, args: &[String]) -> Exec {
    let mut keep_hup = false;
    let mut all = false;
    let mut running_only = false;
    let mut specs = Vec::new();

    for arg in args {
        match arg.as_str() {
            "-h" => keep_hup = true,
            "-a" => all = true,
            "-r" => running_only = true,
            _ => specs.push(arg.clone()),
        }
    }

    let ids: Vec<usize> = if all || (specs.is_empty() && running_only) {
        state
            .jobs
            .iter()
            .filter(|j| !running_only || j.state == JobState::Running)
            .map(|j| j.id)
            .collect()
    } else if specs.is_empty() {
        match state.jobs.current_id() {
            Some(id) => vec![id],
            None => return fail("disown: no current job"),
        }
    } else {
        let mut ids = Vec::new();
        for spec in &specs {
            match state.jobs.resolve_spec(spec) {
                Some(id) => ids.push(id),
                None => return fail(format!("disown: {}: no such job", spec)),
            }
        }
        ids
    };

    for id in ids {
        if keep_hup {
            if let Some(job) = state.jobs.get_mut(id) {
                job.keep_on_hup = true;
            }
        } else {
            state.jobs.remove(id);
        }
    }
    Ok(0)
}
