use std::fmt;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Done(i32),
}

#[derive(Debug, Clone)]
struct Process {
    pid: Pid,
    status: Option<i32>,
}

/// A pipeline launched with `&` whose processes have not all been reaped yet.
#[derive(Debug, Clone)]
pub struct BackgroundJob {
    pub pgid: Pid,
    pub index: usize,
    pub command: String,
    pub status: JobStatus,
    pub is_current: bool,
    pub is_previous: bool,
    processes: Vec<Process>,
    // status of the last stage when it never became a process (built-in, failed spawn)
    tail_status: Option<i32>,
}

impl BackgroundJob {
    fn new(pgid: Pid, pids: &[Pid], tail_status: Option<i32>, index: usize, command: String) -> Self {
        Self {
            pgid,
            index,
            command,
            status: JobStatus::Running,
            is_current: false,
            is_previous: false,
            processes: pids
                .iter()
                .map(|&pid| Process { pid, status: None })
                .collect(),
            tail_status,
        }
    }

    /// Polls every unreaped process once. Returns true when all have terminated.
    fn poll(&mut self) -> bool {
        for process in self.processes.iter_mut().filter(|p| p.status.is_none()) {
            match waitpidx(process.pid, false) {
                Ok(Some(status)) => {
                    debug!("reaped background process {} with status {}", process.pid, status);
                    process.status = Some(status);
                }
                Ok(None) => {}
                Err(Errno::ECHILD) => {
                    warn!("background process {} already reaped", process.pid);
                    process.status = Some(0);
                }
                Err(e) => warn!("waitpid {} failed: {}", process.pid, e),
            }
        }

        let finished = self.processes.iter().all(|p| p.status.is_some());
        if finished {
            let last = self.processes.last().and_then(|p| p.status);
            self.status = JobStatus::Done(self.tail_status.or(last).unwrap_or(0));
        }
        finished
    }
}

impl fmt::Display for BackgroundJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            JobStatus::Running => "running".to_string(),
            JobStatus::Done(0) => "done".to_string(),
            JobStatus::Done(code) => format!("exit {}", code),
        };
        let mark = if self.is_current {
            "+"
        } else if self.is_previous {
            "-"
        } else {
            " "
        };
        write!(
            f,
            "[{}] {} {} {} {}",
            self.index, mark, self.pgid, status, self.command
        )
    }
}

#[derive(Debug, Default)]
pub struct JobManager {
    jobs: Vec<BackgroundJob>,
}

impl JobManager {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn get_jobs(&self) -> &[BackgroundJob] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn find_available_index(&self) -> usize {
        let mut index = 1;
        while self.jobs.iter().any(|job| job.index == index) {
            index += 1;
        }
        index
    }

    /// Registers a launched pipeline and returns its job number.
    pub fn add_job(
        &mut self,
        pgid: Pid,
        pids: &[Pid],
        tail_status: Option<i32>,
        command: String,
    ) -> usize {
        let index = self.find_available_index();
        // the current job becomes the previous one
        for job in self.jobs.iter_mut() {
            if job.is_current {
                job.is_current = false;
                job.is_previous = true;
            } else {
                job.is_previous = false;
            }
        }

        let mut job = BackgroundJob::new(pgid, pids, tail_status, index, command);
        job.is_current = true;
        self.jobs.push(job);
        index
    }

    fn remove_job(&mut self, pos: usize) -> BackgroundJob {
        let job = self.jobs.remove(pos);

        if job.is_current && !self.jobs.is_empty() {
            if let Some(prev_job) = self.jobs.iter_mut().find(|job| job.is_previous) {
                prev_job.is_current = true;
                prev_job.is_previous = false;
            } else if let Some(last) = self.jobs.last_mut() {
                last.is_current = true;
            }
        }
        if job.is_current || job.is_previous {
            self.mark_previous();
        }
        job
    }

    // the most recent job that is not current takes the `-` mark
    fn mark_previous(&mut self) {
        if self.jobs.iter().any(|job| job.is_previous) {
            return;
        }
        if let Some(job) = self.jobs.iter_mut().rev().find(|job| !job.is_current) {
            job.is_previous = true;
        }
    }

    /// Non-blocking sweep over all background jobs; finished ones are removed
    /// and returned.
    pub fn reap(&mut self) -> Vec<BackgroundJob> {
        let mut finished = Vec::new();
        let mut pos = 0;
        while pos < self.jobs.len() {
            if self.jobs[pos].poll() {
                finished.push(self.remove_job(pos));
            } else {
                pos += 1;
            }
        }
        finished
    }

    /// Final sweep before the interpreter goes away. Jobs still running are
    /// left alone and forgotten.
    pub fn shutdown(&mut self) {
        for job in self.reap() {
            debug!("background job finished at shutdown: {}", job);
        }
        for job in self.jobs.drain(..) {
            warn!("leaving background job running: {}", job);
        }
    }
}

/// Waits for one process. Returns its shell status (exit code, or 128 + signal)
/// once it has terminated, or `None` if `block` is false and it is still alive.
pub fn waitpidx(pid: Pid, block: bool) -> nix::Result<Option<i32>> {
    let options = if block {
        None
    } else {
        Some(WaitPidFlag::WNOHANG)
    };
    loop {
        match waitpid(pid, options) {
            Ok(WaitStatus::Exited(_, status)) => return Ok(Some(status)),
            Ok(WaitStatus::Signaled(_, signal, _core_dumped)) => {
                return Ok(Some(128 + signal as i32))
            }
            Ok(WaitStatus::StillAlive) => return Ok(None),
            Ok(other) => {
                debug!("ignoring wait status {:?}", other);
                if !block {
                    return Ok(None);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}
