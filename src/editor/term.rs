//! Terminal Control
//!
//! Raw-mode guard around the editor's read loop, unbuffered byte input
//! (the escape-sequence decoder needs poll to see exactly what the kernel
//! has), and window-size queries.

use std::os::fd::BorrowedFd;

use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::termios::{
    tcgetattr, tcsetattr, InputFlags, LocalFlags, SetArg, SpecialCharacterIndices, Termios,
};

/// Puts stdin into raw mode; restores the previous settings on drop.
pub struct RawModeGuard {
    saved: Termios,
}

impl RawModeGuard {
    pub fn new() -> std::io::Result<RawModeGuard> {
        let stdin = std::io::stdin();
        let saved = tcgetattr(&stdin)?;

        let mut raw = saved.clone();
        raw.local_flags &= !(LocalFlags::ICANON
            | LocalFlags::ECHO
            | LocalFlags::ISIG
            | LocalFlags::IEXTEN);
        raw.input_flags &= !(InputFlags::IXON
            | InputFlags::ICRNL
            | InputFlags::BRKINT
            | InputFlags::INPCK
            | InputFlags::ISTRIP);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        tcsetattr(&stdin, SetArg::TCSADRAIN, &raw)?;

        Ok(RawModeGuard { saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let stdin = std::io::stdin();
        let _ = tcsetattr(&stdin, SetArg::TCSADRAIN, &self.saved);
    }
}

pub fn is_tty() -> bool {
    unsafe { libc::isatty(0) == 1 }
}

/// (columns, rows), defaulting to 80x24 when the query fails.
pub fn window_size() -> (u16, u16) {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let result = unsafe { libc::ioctl(0, libc::TIOCGWINSZ, &mut size) };
    if result == 0 && size.ws_col > 0 {
        (size.ws_col, size.ws_row.max(1))
    } else {
        (80, 24)
    }
}

/// One byte from fd 0, unbuffered. None at end of input.
pub fn read_byte() -> Option<u8> {
    let mut byte = 0u8;
    loop {
        let n = unsafe { libc::read(0, &mut byte as *mut u8 as *mut libc::c_void, 1) };
        match n {
            1 => return Some(byte),
            0 => return None,
            _ => {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return None;
            }
        }
    }
}

/// Is another byte already waiting? Used to tell a bare ESC press from an
/// escape sequence.
pub fn byte_pending(timeout_ms: u8) -> bool {
    let fd = unsafe { BorrowedFd::borrow_raw(0) };
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    matches!(poll(&mut fds, timeout_ms), Ok(n) if n > 0)
}
