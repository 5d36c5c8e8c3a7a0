//! Job Table
//!
//! Tracks pipelines the shell has launched: their process group, member
//! pids, state, and command text. Ids are allocated lowest-free and reused
//! once a job is done and its state change has been shown to the user.
//! State updates come from `waitpid(WNOHANG)` polling driven by the
//! SIGCHLD flag before each prompt, and from the foreground waiter.

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done(i32),
    /// Killed by a signal; status is 128+sig
    Terminated(i32),
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Done(_) | JobState::Terminated(_))
    }

    pub fn status(self) -> i32 {
        match self {
            JobState::Running | JobState::Stopped => 0,
            JobState::Done(status) => status,
            JobState::Terminated(sig) => 128 + sig,
        }
    }

    pub fn describe(self) -> String {
        match self {
            JobState::Running => "Running".to_string(),
            JobState::Stopped => "Stopped".to_string(),
            JobState::Done(0) => "Done".to_string(),
            JobState::Done(status) => format!("Exit {}", status),
            JobState::Terminated(sig) => format!("Terminated ({})", sig),
        }
    }
}

/// One tracked pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub pgid: i32,
    /// Member pids with their individual exit statuses once reaped
    pub pids: Vec<(i32, Option<i32>)>,
    pub state: JobState,
    pub command: String,
    pub background: bool,
    /// The latest state change has been printed
    pub notified: bool,
    /// `disown -h`: skip this job when delivering SIGHUP at exit
    pub keep_on_hup: bool,
}

impl Job {
    /// Exit status of the job: the last member's status.
    pub fn status(&self) -> i32 {
        match self.state {
            JobState::Done(_) | JobState::Terminated(_) => self.state.status(),
            _ => self
                .pids
                .last()
                .and_then(|(_, st)| *st)
                .unwrap_or(0),
        }
    }
}

/// Sparse id → job mapping with lowest-free allocation.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: BTreeMap<usize, Job>,
    /// `%+`: most recently stopped or backgrounded job
    current: Option<usize>,
    /// `%-`: the one before that
    previous: Option<usize>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pgid: i32, pids: Vec<i32>, command: String, background: bool) -> usize {
        let id = (1..).find(|id| !self.jobs.contains_key(id)).unwrap();
        let job = Job {
            id,
            pgid,
            pids: pids.into_iter().map(|p| (p, None)).collect(),
            state: JobState::Running,
            command,
            background,
            notified: false,
            keep_on_hup: false,
        };
        self.jobs.insert(id, job);
        if background {
            self.previous = self.current;
            self.current = Some(id);
        }
        id
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    pub fn remove(&mut self, id: usize) -> Option<Job> {
        if self.current == Some(id) {
            self.current = self.previous.take();
        }
        if self.previous == Some(id) {
            self.previous = None;
        }
        self.jobs.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn current_id(&self) -> Option<usize> {
        self.current
    }

    /// Resolve a `%` job spec: `%n`, `%%`/`%+`, `%-`, `%prefix`.
    pub fn resolve_spec(&self, spec: &str) -> Option<usize> {
        let body = spec.strip_prefix('%')?;
        match body {
            "" | "%" | "+" => self.current,
            "-" => self.previous.or(self.current),
            _ => {
                if let Ok(n) = body.parse::<usize>() {
                    return self.jobs.contains_key(&n).then_some(n);
                }
                self.jobs
                    .values()
                    .find(|j| j.command.starts_with(body))
                    .map(|j| j.id)
            }
        }
    }

    /// Find the job owning a pid.
    pub fn find_by_pid(&self, pid: i32) -> Option<usize> {
        self.jobs
            .values()
            .find(|j| j.pids.iter().any(|(p, _)| *p == pid))
            .map(|j| j.id)
    }

    /// Record a wait status for one pid, updating the owning job's state.
    pub fn record_wait(&mut self, status: WaitStatus) {
        enum PidUpdate {
            Exited(i32),
            Signaled(i32),
            Stopped,
            Continued,
        }

        let (pid, update): (i32, PidUpdate) = match status {
            WaitStatus::Exited(pid, code) => (pid.as_raw(), PidUpdate::Exited(code)),
            WaitStatus::Signaled(pid, signal, _) => {
                (pid.as_raw(), PidUpdate::Signaled(signal as i32))
            }
            WaitStatus::Stopped(pid, _) => (pid.as_raw(), PidUpdate::Stopped),
            WaitStatus::Continued(pid) => (pid.as_raw(), PidUpdate::Continued),
            _ => return,
        };

        let Some(id) = self.find_by_pid(pid) else {
            return;
        };
        let job = self.jobs.get_mut(&id).unwrap();

        match update {
            PidUpdate::Exited(code) => {
                if let Some(slot) = job.pids.iter_mut().find(|(p, _)| *p == pid) {
                    slot.1 = Some(code);
                }
                if job.pids.iter().all(|(_, st)| st.is_some()) {
                    job.state = JobState::Done(job.status());
                    job.notified = false;
                }
            }
            PidUpdate::Signaled(sig) => {
                if let Some(slot) = job.pids.iter_mut().find(|(p, _)| *p == pid) {
                    slot.1 = Some(128 + sig);
                }
                if job.pids.iter().all(|(_, st)| st.is_some()) {
                    job.state = JobState::Terminated(sig);
                    job.notified = false;
                }
            }
            PidUpdate::Stopped => {
                job.state = JobState::Stopped;
                job.notified = false;
                self.previous = self.current;
                self.current = Some(id);
            }
            PidUpdate::Continued => {
                job.state = JobState::Running;
                job.notified = false;
            }
        }
    }

    /// Reap any children that changed state, without blocking.
    pub fn poll_children(&mut self) {
        loop {
            match waitpid(
                Pid::from_raw(-1),
                Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED),
            ) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(status) => self.record_wait(status),
                Err(_) => break,
            }
        }
    }

    /// Jobs whose latest state change has not been announced. Marks them
    /// notified and releases ids of finished ones.
    pub fn take_notifications(&mut self) -> Vec<Job> {
        let pending: Vec<usize> = self
            .jobs
            .values()
            .filter(|j| !j.notified && (j.state.is_finished() || j.state == JobState::Stopped))
            .map(|j| j.id)
            .collect();

        let mut out = Vec::new();
        for id in pending {
            let finished = {
                let job = self.jobs.get_mut(&id).unwrap();
                job.notified = true;
                job.state.is_finished()
            };
            let snapshot = if finished {
                self.remove(id).unwrap()
            } else {
                self.jobs.get(&id).unwrap().clone()
            };
            out.push(snapshot);
        }
        out
    }

    /// Pids of all jobs still attached to the table (for SIGHUP at exit).
    pub fn hup_targets(&self) -> Vec<i32> {
        self.jobs
            .values()
            .filter(|j| !j.keep_on_hup && !j.state.is_finished())
            .map(|j| j.pgid)
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn add_job(table: &mut JobTable, pids: &[i32], cmd: &str) -> usize {
        table.add(pids[0], pids.to_vec(), cmd.to_string(), true)
    }

    #[test]
    fn ids_allocate_lowest_free() {
        let mut table = JobTable::new();
        let a = add_job(&mut table, &[100], "sleep 1");
        let b = add_job(&mut table, &[200], "sleep 2");
        assert_eq!((a, b), (1, 2));
        table.remove(1);
        let c = add_job(&mut table, &[300], "sleep 3");
        assert_eq!(c, 1);
    }

    #[test]
    fn job_spec_resolution() {
        let mut table = JobTable::new();
        let a = add_job(&mut table, &[100], "sleep 1");
        let b = add_job(&mut table, &[200], "vim notes.txt");
        assert_eq!(table.resolve_spec("%1"), Some(a));
        assert_eq!(table.resolve_spec("%+"), Some(b));
        assert_eq!(table.resolve_spec("%-"), Some(a));
        assert_eq!(table.resolve_spec("%vim"), Some(b));
        assert_eq!(table.resolve_spec("%9"), None);
        assert_eq!(table.resolve_spec("nope"), None);
    }

    #[test]
    fn exit_recorded_when_all_pids_done() {
        let mut table = JobTable::new();
        add_job(&mut table, &[10, 11], "a | b");
        table.record_wait(WaitStatus::Exited(Pid::from_raw(10), 0));
        assert_eq!(table.get(1).unwrap().state, JobState::Running);
        table.record_wait(WaitStatus::Exited(Pid::from_raw(11), 3));
        assert_eq!(table.get(1).unwrap().state, JobState::Done(3));
    }

    #[test]
    fn notifications_release_finished_ids() {
        let mut table = JobTable::new();
        add_job(&mut table, &[10], "true");
        table.record_wait(WaitStatus::Exited(Pid::from_raw(10), 0));
        let notes = table.take_notifications();
        assert_eq!(notes.len(), 1);
        assert!(table.is_empty());
        // Nothing new to report afterwards.
        assert!(table.take_notifications().is_empty());
    }

    #[test]
    fn stopped_job_becomes_current() {
        let mut table = JobTable::new();
        add_job(&mut table, &[10], "one");
        add_job(&mut table, &[20], "two");
        assert_eq!(table.current_id(), Some(2));
        table.record_wait(WaitStatus::Stopped(
            Pid::from_raw(10),
            nix::sys::signal::Signal::SIGTSTP,
        ));
        assert_eq!(table.current_id(), Some(1));
        let notes = table.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].state, JobState::Stopped);
        // Stopped jobs stay in the table.
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn job_status_is_last_member() {
        let mut table = JobTable::new();
        add_job(&mut table, &[10, 11], "false | true");
        table.record_wait(WaitStatus::Exited(Pid::from_raw(10), 1));
        table.record_wait(WaitStatus::Exited(Pid::from_raw(11), 0));
        assert_eq!(table.get(1).unwrap().status(), 0);
    }
}
