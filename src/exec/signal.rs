//! Signal Handling
//!
//! Async-signal-safe handlers only set atomic flags; all real work happens
//! in the main loop between keystrokes or commands. The interactive shell
//! ignores the terminal control signals so only foreground children
//! receive them, and SIGCHLD triggers job-table polling before the next
//! prompt.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{kill, killpg, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;

use crate::error::ShellError;

const MAX_SIGNAL: usize = 64;

#[allow(clippy::declare_interior_mutable_const)]
const FLAG_INIT: AtomicBool = AtomicBool::new(false);

static SIGCHLD_FLAG: AtomicBool = AtomicBool::new(false);
static SIGWINCH_FLAG: AtomicBool = AtomicBool::new(false);
static SIGINT_FLAG: AtomicBool = AtomicBool::new(false);
/// Signals with a user trap pending delivery
static PENDING_TRAPS: [AtomicBool; MAX_SIGNAL + 1] = [FLAG_INIT; MAX_SIGNAL + 1];

extern "C" fn handle_sigchld(_sig: libc::c_int) {
    SIGCHLD_FLAG.store(true, Ordering::SeqCst);
}

extern "C" fn handle_sigwinch(_sig: libc::c_int) {
    SIGWINCH_FLAG.store(true, Ordering::SeqCst);
}

extern "C" fn handle_sigint(_sig: libc::c_int) {
    SIGINT_FLAG.store(true, Ordering::SeqCst);
}

extern "C" fn handle_trap(sig: libc::c_int) {
    let index = sig as usize;
    if index <= MAX_SIGNAL {
        PENDING_TRAPS[index].store(true, Ordering::SeqCst);
    }
    if sig == libc::SIGCHLD {
        SIGCHLD_FLAG.store(true, Ordering::SeqCst);
    }
}

pub fn take_sigchld() -> bool {
    SIGCHLD_FLAG.swap(false, Ordering::SeqCst)
}

pub fn take_sigwinch() -> bool {
    SIGWINCH_FLAG.swap(false, Ordering::SeqCst)
}

pub fn take_sigint() -> bool {
    SIGINT_FLAG.swap(false, Ordering::SeqCst)
}

/// Drain the set of trap signals that fired since the last check.
pub fn take_pending_traps() -> Vec<i32> {
    let mut fired = Vec::new();
    for (sig, flag) in PENDING_TRAPS.iter().enumerate() {
        if flag.swap(false, Ordering::SeqCst) {
            fired.push(sig as i32);
        }
    }
    fired
}

fn set_handler(signal: Signal, handler: SigHandler) {
    let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
    // Safety: all handlers only touch atomics.
    unsafe {
        let _ = sigaction(signal, &action);
    }
}

/// Dispositions for an interactive shell: keyboard signals are handled or
/// ignored here so that only the foreground job feels them.
pub fn install_interactive() {
    set_handler(Signal::SIGCHLD, SigHandler::Handler(handle_sigchld));
    set_handler(Signal::SIGWINCH, SigHandler::Handler(handle_sigwinch));
    set_handler(Signal::SIGINT, SigHandler::Handler(handle_sigint));
    set_handler(Signal::SIGQUIT, SigHandler::SigIgn);
    set_handler(Signal::SIGTSTP, SigHandler::SigIgn);
    set_handler(Signal::SIGTTIN, SigHandler::SigIgn);
    set_handler(Signal::SIGTTOU, SigHandler::SigIgn);
}

/// Dispositions for scripts: children are still reaped, everything else
/// stays at the inherited default.
pub fn install_noninteractive() {
    set_handler(Signal::SIGCHLD, SigHandler::Handler(handle_sigchld));
}

/// Route a signal to the pending-trap flags (the `trap` builtin).
pub fn arm_trap(sig: i32) {
    if let Ok(signal) = Signal::try_from(sig) {
        set_handler(signal, SigHandler::Handler(handle_trap));
    }
}

/// Ignore a signal (`trap '' SIG`).
pub fn ignore_signal(sig: i32) {
    if let Ok(signal) = Signal::try_from(sig) {
        set_handler(signal, SigHandler::SigIgn);
    }
}

/// Restore the default disposition (`trap - SIG`), keeping the shell's own
/// interactive arrangements for the keyboard signals.
pub fn reset_trap(sig: i32, interactive: bool) {
    let Ok(signal) = Signal::try_from(sig) else {
        return;
    };
    if interactive {
        match signal {
            Signal::SIGINT => return set_handler(signal, SigHandler::Handler(handle_sigint)),
            Signal::SIGQUIT | Signal::SIGTSTP | Signal::SIGTTIN | Signal::SIGTTOU => {
                return set_handler(signal, SigHandler::SigIgn)
            }
            _ => {}
        }
    }
    if signal == Signal::SIGCHLD {
        return set_handler(signal, SigHandler::Handler(handle_sigchld));
    }
    set_handler(signal, SigHandler::SigDfl);
}

/// Deliver a signal to a process (`pid`) or process group (negative pid).
pub fn send_signal(pid: i32, sig: i32) -> Result<(), ShellError> {
    let signal = Signal::try_from(sig)
        .map_err(|_| ShellError::JobControl(format!("invalid signal {}", sig)))?;
    let result = if pid < 0 {
        killpg(Pid::from_raw(-pid), signal)
    } else {
        kill(Pid::from_raw(pid), signal)
    };
    result.map_err(|e| ShellError::JobControl(format!("kill ({}): {}", pid, e)))
}

/// Signal names for `trap` and `kill`, without the SIG prefix.
const SIGNAL_NAMES: &[(&str, i32)] = &[
    ("HUP", libc::SIGHUP),
    ("INT", libc::SIGINT),
    ("QUIT", libc::SIGQUIT),
    ("ILL", libc::SIGILL),
    ("TRAP", libc::SIGTRAP),
    ("ABRT", libc::SIGABRT),
    ("BUS", libc::SIGBUS),
    ("FPE", libc::SIGFPE),
    ("KILL", libc::SIGKILL),
    ("USR1", libc::SIGUSR1),
    ("SEGV", libc::SIGSEGV),
    ("USR2", libc::SIGUSR2),
    ("PIPE", libc::SIGPIPE),
    ("ALRM", libc::SIGALRM),
    ("TERM", libc::SIGTERM),
    ("CHLD", libc::SIGCHLD),
    ("CONT", libc::SIGCONT),
    ("STOP", libc::SIGSTOP),
    ("TSTP", libc::SIGTSTP),
    ("TTIN", libc::SIGTTIN),
    ("TTOU", libc::SIGTTOU),
    ("URG", libc::SIGURG),
    ("XCPU", libc::SIGXCPU),
    ("XFSZ", libc::SIGXFSZ),
    ("VTALRM", libc::SIGVTALRM),
    ("PROF", libc::SIGPROF),
    ("WINCH", libc::SIGWINCH),
    ("IO", libc::SIGIO),
    ("SYS", libc::SIGSYS),
];

/// Parse `TERM`, `SIGTERM`, or `15`.
pub fn signal_number(name: &str) -> Option<i32> {
    if let Ok(n) = name.parse::<i32>() {
        return (0..=MAX_SIGNAL as i32).contains(&n).then_some(n);
    }
    let upper = name.to_ascii_uppercase();
    let stripped = upper.strip_prefix("SIG").unwrap_or(&upper);
    SIGNAL_NAMES
        .iter()
        .find(|(n, _)| *n == stripped)
        .map(|(_, num)| *num)
}

pub fn signal_name(sig: i32) -> String {
    SIGNAL_NAMES
        .iter()
        .find(|(_, num)| *num == sig)
        .map(|(name, _)| format!("SIG{}", name))
        .unwrap_or_else(|| sig.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_name_parsing() {
        assert_eq!(signal_number("TERM"), Some(libc::SIGTERM));
        assert_eq!(signal_number("SIGTERM"), Some(libc::SIGTERM));
        assert_eq!(signal_number("sigint"), Some(libc::SIGINT));
        assert_eq!(signal_number("9"), Some(9));
        assert_eq!(signal_number("NOPE"), None);
        assert_eq!(signal_number("-3"), None);
    }

    #[test]
    fn signal_name_formatting() {
        assert_eq!(signal_name(libc::SIGKILL), "SIGKILL");
        assert_eq!(signal_name(63), "63");
    }

    #[test]
    fn flags_drain_once() {
        SIGCHLD_FLAG.store(true, Ordering::SeqCst);
        assert!(take_sigchld());
        assert!(!take_sigchld());
    }

    #[test]
    fn pending_traps_drain() {
        PENDING_TRAPS[15].store(true, Ordering::SeqCst);
        let fired = take_pending_traps();
        assert!(fired.contains(&15));
        assert!(take_pending_traps().is_empty());
    }
}
