//! Redirection
//!
//! Turns redirection nodes into prepared fd actions: file opens (with
//! noclobber enforcement), fd duplication and closing, and pipes filled
//! with here-doc/here-string content. Prepared actions are applied either
//! in the shell itself (builtins, compound commands) behind a restoring
//! guard, or inside a spawned child before exec.

use std::ffi::CString;
use std::io::Write;
use std::os::fd::{AsRawFd, OwnedFd};

use crate::ast::{RedirectionNode, RedirectionOperator, RedirectionTarget};
use crate::error::ShellError;
use crate::expand;
use crate::state::ShellState;

/// One fd manipulation, ready to run with raw syscalls.
#[derive(Debug)]
pub enum Prepared {
    Open { fd: i32, path: CString, oflag: i32 },
    Dup { fd: i32, target: i32 },
    Close { fd: i32 },
    PipeRead { fd: i32, read_end: i32 },
}

/// Prepared actions plus the pipe fds that must survive until applied.
#[derive(Debug, Default)]
pub struct PreparedRedirs {
    pub actions: Vec<Prepared>,
    pipes: Vec<OwnedFd>,
}

impl PreparedRedirs {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Split into actions and the pipe fds that must outlive the spawn.
    pub fn into_parts(self) -> (Vec<Prepared>, Vec<OwnedFd>) {
        (self.actions, self.pipes)
    }
}

fn redir_error(target: impl Into<String>, reason: impl ToString) -> ShellError {
    ShellError::Redirection {
        target: target.into(),
        reason: reason.to_string(),
    }
}

/// Expand targets and build the action list, in source order.
pub fn prepare(
    state: &mut ShellState,
    redirs: &[RedirectionNode],
) -> Result<PreparedRedirs, ShellError> {
    let mut prepared = PreparedRedirs::default();

    for redir in redirs {
        let fd = redir.fd.unwrap_or_else(|| redir.operator.default_fd());

        match &redir.target {
            RedirectionTarget::HereDoc(heredoc) => {
                let body = expand::expand_word_single(state, &heredoc.content)
                    .map_err(ShellError::from)?;
                let read_end = heredoc_pipe(body.as_bytes())
                    .map_err(|e| redir_error(&heredoc.delimiter, e))?;
                prepared.actions.push(Prepared::PipeRead {
                    fd,
                    read_end: read_end.as_raw_fd(),
                });
                prepared.pipes.push(read_end);
            }
            RedirectionTarget::Word(word) => {
                let target =
                    expand::expand_word_single(state, word).map_err(ShellError::from)?;
                prepare_word_target(state, &mut prepared, redir.operator, fd, &target)?;
            }
        }
    }

    Ok(prepared)
}

fn prepare_word_target(
    state: &ShellState,
    prepared: &mut PreparedRedirs,
    operator: RedirectionOperator,
    fd: i32,
    target: &str,
) -> Result<(), ShellError> {
    let path_cstring = |path: &str| -> Result<CString, ShellError> {
        CString::new(path.as_bytes()).map_err(|_| redir_error(path, "invalid file name"))
    };
    let resolve = |path: &str| -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", state.cwd(), path)
        }
    };

    match operator {
        RedirectionOperator::Less => {
            prepared.actions.push(Prepared::Open {
                fd,
                path: path_cstring(&resolve(target))?,
                oflag: libc::O_RDONLY,
            });
        }
        RedirectionOperator::Great | RedirectionOperator::Clobber => {
            let path = resolve(target);
            if operator == RedirectionOperator::Great && state.options.noclobber {
                if let Ok(meta) = std::fs::metadata(&path) {
                    if meta.is_file() {
                        return Err(redir_error(target, "cannot overwrite existing file"));
                    }
                }
            }
            prepared.actions.push(Prepared::Open {
                fd,
                path: path_cstring(&path)?,
                oflag: libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            });
        }
        RedirectionOperator::DGreat => {
            prepared.actions.push(Prepared::Open {
                fd,
                path: path_cstring(&resolve(target))?,
                oflag: libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
            });
        }
        RedirectionOperator::AndGreat | RedirectionOperator::AndDGreat => {
            let append = operator == RedirectionOperator::AndDGreat;
            let oflag = libc::O_WRONLY
                | libc::O_CREAT
                | if append { libc::O_APPEND } else { libc::O_TRUNC };
            prepared.actions.push(Prepared::Open {
                fd: 1,
                path: path_cstring(&resolve(target))?,
                oflag,
            });
            prepared.actions.push(Prepared::Dup { fd: 2, target: 1 });
        }
        RedirectionOperator::GreatAnd | RedirectionOperator::LessAnd => {
            if target == "-" {
                prepared.actions.push(Prepared::Close { fd });
            } else if target.chars().all(|c| c.is_ascii_digit()) {
                let source: i32 = target
                    .parse()
                    .map_err(|_| redir_error(target, "bad file descriptor"))?;
                prepared.actions.push(Prepared::Dup { fd, target: source });
            } else if operator == RedirectionOperator::GreatAnd {
                // `>&file` without an fd is the portable `&>file`.
                prepared.actions.push(Prepared::Open {
                    fd: 1,
                    path: path_cstring(&resolve(target))?,
                    oflag: libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
                });
                prepared.actions.push(Prepared::Dup { fd: 2, target: 1 });
            } else {
                return Err(redir_error(target, "ambiguous redirect"));
            }
        }
        RedirectionOperator::TLess => {
            let mut body = target.to_string();
            body.push('\n');
            let read_end =
                heredoc_pipe(body.as_bytes()).map_err(|e| redir_error(target, e))?;
            prepared.actions.push(Prepared::PipeRead {
                fd,
                read_end: read_end.as_raw_fd(),
            });
            prepared.pipes.push(read_end);
        }
        RedirectionOperator::DLess | RedirectionOperator::DLessDash => {
            // Here-doc targets arrive as RedirectionTarget::HereDoc.
            return Err(redir_error(target, "here-document has no body"));
        }
    }
    Ok(())
}

/// A pipe whose read end delivers `body`. Small bodies are written
/// directly; larger ones get a writer child so the shell cannot deadlock
/// against a full pipe buffer.
fn heredoc_pipe(body: &[u8]) -> std::io::Result<OwnedFd> {
    let (read_end, write_end) = nix::unistd::pipe()?;

    if body.len() <= 60 * 1024 {
        let mut file = std::fs::File::from(write_end);
        file.write_all(body)?;
        return Ok(read_end);
    }

    // Safety: the child only writes and exits.
    match unsafe { nix::unistd::fork() }? {
        nix::unistd::ForkResult::Child => {
            drop(read_end);
            let mut file = std::fs::File::from(write_end);
            let _ = file.write_all(body);
            drop(file);
            std::process::exit(0);
        }
        nix::unistd::ForkResult::Parent { .. } => {
            drop(write_end);
            Ok(read_end)
        }
    }
}

/// Run the prepared actions with raw syscalls. Used in the shell process
/// (behind [`RedirGuard`]) and inside pre-exec child hooks, so it must not
/// touch anything beyond open/dup2/close.
pub fn apply_raw(actions: &[Prepared]) -> std::io::Result<()> {
    for action in actions {
        match action {
            Prepared::Open { fd, path, oflag } => {
                let opened = unsafe { libc::open(path.as_ptr(), *oflag, 0o666 as libc::c_uint) };
                if opened < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                if opened != *fd {
                    if unsafe { libc::dup2(opened, *fd) } < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    unsafe { libc::close(opened) };
                }
            }
            Prepared::Dup { fd, target } => {
                if unsafe { libc::dup2(*target, *fd) } < 0 {
                    return Err(std::io::Error::last_os_error());
                }
            }
            Prepared::Close { fd } => {
                unsafe { libc::close(*fd) };
            }
            Prepared::PipeRead { fd, read_end } => {
                if read_end != fd {
                    if unsafe { libc::dup2(*read_end, *fd) } < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
            }
        }
    }
    Ok(())
}

/// Saved fds for restoring the shell's own table after a builtin ran with
/// redirections.
pub struct RedirGuard {
    saved: Vec<(i32, Option<i32>)>,
}

impl RedirGuard {
    /// Apply redirections in the current process, remembering the previous
    /// state of every touched fd.
    pub fn apply(prepared: PreparedRedirs) -> Result<RedirGuard, ShellError> {
        let mut touched: Vec<i32> = prepared
            .actions
            .iter()
            .map(|a| match a {
                Prepared::Open { fd, .. }
                | Prepared::Dup { fd, .. }
                | Prepared::Close { fd }
                | Prepared::PipeRead { fd, .. } => *fd,
            })
            .collect();
        touched.sort();
        touched.dedup();

        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();

        let mut saved = Vec::new();
        for fd in touched {
            let copy = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 10) };
            saved.push((fd, (copy >= 0).then_some(copy)));
        }

        if let Err(e) = apply_raw(&prepared.actions) {
            let guard = RedirGuard { saved };
            drop(guard);
            return Err(ShellError::Redirection {
                target: "redirection".to_string(),
                reason: e.to_string(),
            });
        }
        // Pipe read ends have been dup2'd where needed; drop the originals.
        drop(prepared);

        Ok(RedirGuard { saved })
    }

    /// Keep the redirections in place (the `exec` builtin).
    pub fn persist(mut self) {
        for (_, saved) in self.saved.drain(..) {
            if let Some(copy) = saved {
                unsafe { libc::close(copy) };
            }
        }
    }
}

impl Drop for RedirGuard {
    fn drop(&mut self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        for (fd, saved) in self.saved.drain(..).rev() {
            match saved {
                Some(copy) => unsafe {
                    libc::dup2(copy, fd);
                    libc::close(copy);
                },
                None => unsafe {
                    libc::close(fd);
                },
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
    use crate::ast::{CommandNode, RedirectionNode};
    use crate::parser::parse;
    use std::io::Read;
    use std::os::fd::FromRawFd;

    fn redirs_of(input: &str) -> Vec<RedirectionNode> {
        let script = parse(input).unwrap();
        match &script.statements[0].pipelines[0].commands[0] {
            CommandNode::Simple(c) => c.redirections.clone(),
            other => panic!("unexpected: {:?}", other),
        }
    }

    fn state_in(dir: &tempfile::TempDir) -> ShellState {
        let mut state = ShellState::new("den");
        state
            .env
            .set("PWD", dir.path().to_string_lossy().into_owned())
            .unwrap();
        state
    }

    #[test]
    fn prepare_output_redirection() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let prepared = prepare(&mut state, &redirs_of("cmd > out.txt")).unwrap();
        assert_eq!(prepared.actions.len(), 1);
        match &prepared.actions[0] {
            Prepared::Open { fd, oflag, .. } => {
                assert_eq!(*fd, 1);
                assert_ne!(oflag & libc::O_TRUNC, 0);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn noclobber_blocks_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("exists.txt"), "x").unwrap();
        let mut state = state_in(&dir);
        state.options.noclobber = true;
        assert!(prepare(&mut state, &redirs_of("cmd > exists.txt")).is_err());
        // >| overrides noclobber, and new files are fine.
        assert!(prepare(&mut state, &redirs_of("cmd >| exists.txt")).is_ok());
        assert!(prepare(&mut state, &redirs_of("cmd > fresh.txt")).is_ok());
    }

    #[test]
    fn fd_duplication_forms() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let prepared = prepare(&mut state, &redirs_of("cmd 2>&1")).unwrap();
        match &prepared.actions[0] {
            Prepared::Dup { fd, target } => {
                assert_eq!(*fd, 2);
                assert_eq!(*target, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
        let prepared = prepare(&mut state, &redirs_of("cmd 3>&-")).unwrap();
        assert!(matches!(prepared.actions[0], Prepared::Close { fd: 3 }));
    }

    #[test]
    fn ampersand_great_covers_both_fds() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let prepared = prepare(&mut state, &redirs_of("cmd &> all.log")).unwrap();
        assert_eq!(prepared.actions.len(), 2);
        assert!(matches!(prepared.actions[1], Prepared::Dup { fd: 2, target: 1 }));
    }

    #[test]
    fn herestring_pipe_delivers_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        let prepared = prepare(&mut state, &redirs_of("cat <<< hello")).unwrap();
        let read_fd = match &prepared.actions[0] {
            Prepared::PipeRead { fd, read_end } => {
                assert_eq!(*fd, 0);
                *read_end
            }
            other => panic!("unexpected: {:?}", other),
        };
        let mut content = String::new();
        let mut file =
            std::fs::File::from(unsafe { std::os::fd::OwnedFd::from_raw_fd(read_fd) });
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello\n");
        std::mem::forget(file); // fd ownership belongs to `prepared`
    }

    #[test]
    fn heredoc_body_expands_variables() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(&dir);
        state.assign("NAME", "world").unwrap();
        let prepared = prepare(&mut state, &redirs_of("cat <<EOF\nhi $NAME\nEOF\n")).unwrap();
        let read_fd = match &prepared.actions[0] {
            Prepared::PipeRead { read_end, .. } => *read_end,
            other => panic!("unexpected: {:?}", other),
        };
        let mut content = String::new();
        let mut file =
            std::fs::File::from(unsafe { std::os::fd::OwnedFd::from_raw_fd(read_fd) });
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hi world\n");
        std::mem::forget(file);
    }
}
