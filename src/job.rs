//! Bookkeeping for detached pipelines.
//!
//! This is not job control: jobs are only numbered and reaped, never
//! stopped, resumed or moved to the foreground.

use log::trace;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

#[derive(Debug)]
pub struct Job {
	/// Processes not reaped yet.
	pub pids: Vec<Pid>,
}

impl Job {
	/// Reaps whatever has finished without blocking. Returns true once
	/// every process of the job is gone.
	fn poll(&mut self) -> bool {
		self.pids.retain(|&pid| match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
			Ok(WaitStatus::StillAlive) => true,
			Ok(status @ WaitStatus::Exited(..)) | Ok(status @ WaitStatus::Signaled(..)) => {
				trace!("detached process reaped: {:?}", status);
				false
			},
			Ok(_) | Err(Errno::EINTR) => true,
			// already reaped by someone else
			Err(_) => false,
		});
		self.pids.is_empty()
	}
}

#[derive(Debug, Default)]
pub struct JobSet {
	jobs: Vec<Option<Job>>,
}

impl JobSet {
	pub fn new() -> JobSet {
		JobSet::default()
	}

	/// Registers a started pipeline and returns its job number (from 1).
	/// Numbers of finished jobs are reused, lowest first.
	pub fn push(&mut self, pids: Vec<Pid>) -> usize {
		let job = Job { pids };
		let jobs = &mut self.jobs;
		let idx = if let Some((i, space)) = jobs.iter_mut().enumerate().find(|(_, o)| o.is_none()) {
			*space = Some(job);
			i
		} else {
			jobs.push(Some(job));
			jobs.len() - 1
		};
		idx + 1
	}

	pub fn get(&self, number: usize) -> Option<&Job> {
		number.checked_sub(1).and_then(|i| self.jobs.get(i)).and_then(Option::as_ref)
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.iter().all(Option::is_none)
	}

	/// Polls every job; returns the numbers of the ones that finished.
	pub fn reap(&mut self) -> Vec<usize> {
		let mut done = vec![];
		for (i, slot) in self.jobs.iter_mut().enumerate() {
			if slot.as_mut().map_or(false, Job::poll) {
				*slot = None;
				done.push(i + 1);
			}
		}
		let len = self.jobs.iter().rposition(Option::is_some).map_or(0, |i| i + 1);
		self.jobs.truncate(len);
		done
	}
}
