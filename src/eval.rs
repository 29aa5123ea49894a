//! Pipeline execution: one forked process per stage, chained by pipes.
//!
//! Every pipe is created with `O_CLOEXEC` before the first fork, so each
//! child sees all of them but keeps only what it `dup2`s onto its standard
//! streams; the rest vanish at `exec`. The parent drops a stage's ends as
//! soon as that stage has been forked, so once the last stage is running
//! the shell holds no pipe descriptor at all.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use log::{debug, trace, warn};
use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag, OFlag};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::error::ExecError;
use crate::types::*;

/// Status of a stage that could not be created or executed.
pub const SPAWN_FAILURE: i32 = 126;
/// Status of a stage whose program was not found.
pub const NOT_FOUND: i32 = 127;

const OUTPUT_MODE: u32 = 0o644;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	/// The last stage exited with this code.
	Exited(i32),
	/// The last stage was killed by a signal.
	Signaled(Signal),
	/// A detached pipeline was started; nobody waits for these.
	Started(Vec<Pid>),
	/// At least one stage could not be created.
	Failed,
}

impl Outcome {
	pub fn code(&self) -> i32 {
		match *self {
			Outcome::Exited(code) => code,
			Outcome::Signaled(sig) => 128 + sig as i32,
			Outcome::Started(_) => 0,
			Outcome::Failed => SPAWN_FAILURE,
		}
	}

	pub fn success(&self) -> bool {
		self.code() == 0
	}
}

/// Descriptors a stage gets instead of the shell's own streams.
#[derive(Debug, Default)]
struct Streams {
	stdin: Option<OwnedFd>,
	stdout: Option<OwnedFd>,
	stderr: Option<OwnedFd>,
}

impl Streams {
	fn slot(&mut self, kind: RedirectKind) -> &mut Option<OwnedFd> {
		match kind {
			RedirectKind::Input => &mut self.stdin,
			RedirectKind::Output => &mut self.stdout,
			RedirectKind::Error => &mut self.stderr,
		}
	}

	fn raw(&self) -> [(Option<RawFd>, RawFd); 3] {
		[
			(self.stdin.as_ref().map(|f| f.as_raw_fd()), libc::STDIN_FILENO),
			(self.stdout.as_ref().map(|f| f.as_raw_fd()), libc::STDOUT_FILENO),
			(self.stderr.as_ref().map(|f| f.as_raw_fd()), libc::STDERR_FILENO),
		]
	}
}

#[derive(Debug)]
enum StageState {
	/// Not forked yet; owns the stage's descriptors.
	Created(Streams),
	Running(Pid),
	Terminated(WaitStatus),
	/// Never started, or lost track of.
	Failed,
}

#[derive(Debug)]
struct Process<'a> {
	index: usize,
	stage: &'a Stage,
	state: StageState,
}

fn open_target(kind: RedirectKind, path: &Path) -> io::Result<File> {
	let mut opts = OpenOptions::new();
	match kind {
		RedirectKind::Input => opts.read(true),
		RedirectKind::Output | RedirectKind::Error =>
			opts.write(true).create(true).truncate(true).mode(OUTPUT_MODE),
	};
	opts.open(path)
}

fn write_raw(buf: &[u8]) {
	unsafe {
		libc::write(libc::STDERR_FILENO, buf.as_ptr() as *const libc::c_void, buf.len());
	}
}

fn child_fail(diag: &[u8], errno: Errno, status: i32) -> ! {
	write_raw(diag);
	write_raw(errno.desc().as_bytes());
	write_raw(b"\n");
	unsafe { libc::_exit(status) }
}

/// Runs in the forked child. Only async-signal-safe calls from here on.
fn exec_child(argv: &[CString], streams: &Streams, diag: &[u8]) -> ! {
	// the Rust runtime ignores SIGPIPE and exec would pass that on
	unsafe {
		let _ = signal::signal(Signal::SIGPIPE, SigHandler::SigDfl);
	}
	for &(from, to) in &streams.raw() {
		let r = match from {
			None => continue,
			// dup2 onto itself would keep O_CLOEXEC
			Some(fd) if fd == to => fcntl::fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty())).map(drop),
			Some(fd) => unistd::dup2(fd, to).map(drop),
		};
		if let Err(e) = r {
			child_fail(diag, e, SPAWN_FAILURE);
		}
	}
	let e = match unistd::execvp(&argv[0], argv) {
		Err(e) => e,
		Ok(never) => match never {},
	};
	let status = if e == Errno::ENOENT { NOT_FOUND } else { SPAWN_FAILURE };
	child_fail(diag, e, status)
}

impl<'a> Process<'a> {
	fn holds_fds(&self) -> bool {
		matches!(self.state, StageState::Created(_))
	}

	fn pid(&self) -> Option<Pid> {
		match self.state {
			StageState::Running(pid) => Some(pid),
			_ => None,
		}
	}

	/// `Created -> Running`, or `Created -> Failed` with the reason.
	/// Either way the parent's copies of the stage's descriptors are closed.
	fn start(&mut self) -> Result<(), ExecError> {
		let mut streams = match mem::replace(&mut self.state, StageState::Failed) {
			StageState::Created(streams) => streams,
			state => {
				self.state = state;
				return Ok(());
			},
		};
		let program = self.stage.program();

		for &kind in &[RedirectKind::Input, RedirectKind::Output, RedirectKind::Error] {
			if let Some(path) = self.stage.target(kind) {
				let file = open_target(kind, path).map_err(|source| {
					ExecError::Redirection { path: path.clone(), source }
				})?;
				*streams.slot(kind) = Some(file.into());
			}
		}

		let argv = self.stage.argv.iter()
			.map(|a| CString::new(a.as_bytes()))
			.collect::<Result<Vec<CString>, _>>()
			.map_err(|_| ExecError::Spawn {
				program: program.to_owned(),
				reason: "argument contains a NUL byte".to_owned(),
			})?;
		let diag = format!("pish: {}: ", program).into_bytes();

		match unsafe { unistd::fork() }? {
			ForkResult::Parent { child } => {
				trace!("stage {} ({}) running as {}", self.index, program, child);
				drop(streams);
				self.state = StageState::Running(child);
				Ok(())
			},
			ForkResult::Child => exec_child(&argv, &streams, &diag),
		}
	}

	/// `Running -> Terminated`. Blocks until the process exits.
	fn wait(&mut self) {
		let pid = match self.state {
			StageState::Running(pid) => pid,
			_ => return,
		};
		loop {
			match waitpid(pid, None) {
				Ok(status @ WaitStatus::Exited(..)) | Ok(status @ WaitStatus::Signaled(..)) => {
					trace!("stage {} terminated: {:?}", self.index, status);
					self.state = StageState::Terminated(status);
					return;
				},
				Ok(_) | Err(Errno::EINTR) => continue,
				Err(e) => {
					warn!("waiting for stage {} ({}) failed: {}", self.index, pid, e);
					self.state = StageState::Failed;
					return;
				},
			}
		}
	}

	fn outcome(&self) -> Outcome {
		match self.state {
			StageState::Terminated(WaitStatus::Exited(_, code)) => Outcome::Exited(code),
			StageState::Terminated(WaitStatus::Signaled(_, sig, _)) => Outcome::Signaled(sig),
			_ => Outcome::Failed,
		}
	}
}

/// One `Streams` per stage with the pipes between neighbours filled in.
fn connect(count: usize) -> nix::Result<Vec<Streams>> {
	let mut streams: Vec<Streams> = (0 .. count).map(|_| Streams::default()).collect();
	for i in 1 .. count {
		let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
		streams[i - 1].stdout = Some(write);
		streams[i].stdin = Some(read);
	}
	Ok(streams)
}

/// Runs a pipeline. Stage-local failures are reported on standard error
/// and reflected in the outcome; only a failure to allocate the pipes
/// (nothing started) is returned as an error.
pub fn run(pipeline: &Pipeline) -> Result<Outcome, ExecError> {
	debug!("running {} stage(s), detached: {}", pipeline.stages.len(), pipeline.detached);
	let streams = connect(pipeline.stages.len())?;

	let mut procs: Vec<Process> = pipeline.stages.iter()
		.zip(streams)
		.enumerate()
		.map(|(index, (stage, streams))| Process { index, stage, state: StageState::Created(streams) })
		.collect();

	let mut failed = false;
	for p in procs.iter_mut() {
		if let Err(e) = p.start() {
			warn!("stage {} not started: {}", p.index, e);
			eprintln!("pish: {}", e);
			failed = true;
		}
	}
	debug_assert!(procs.iter().all(|p| !p.holds_fds()));

	if pipeline.detached {
		let pids: Vec<Pid> = procs.iter().filter_map(Process::pid).collect();
		return Ok(if pids.is_empty() { Outcome::Failed } else { Outcome::Started(pids) });
	}

	for p in procs.iter_mut() {
		p.wait();
	}
	match procs.last() {
		Some(last) if !failed => Ok(last.outcome()),
		_ => Ok(Outcome::Failed),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use std::path::PathBuf;

	fn stage(argv: &[&str]) -> Stage {
		Stage {
			argv: argv.iter().map(|s| s.to_string()).collect(),
			input: None,
			output: None,
			error: None,
		}
	}

	fn foreground(stages: Vec<Stage>) -> Pipeline {
		Pipeline { stages, detached: false }
	}

	#[test]
	fn outcome_codes() {
		assert_eq!(Outcome::Exited(3).code(), 3);
		assert_eq!(Outcome::Signaled(Signal::SIGKILL).code(), 137);
		assert_eq!(Outcome::Started(vec![]).code(), 0);
		assert_eq!(Outcome::Failed.code(), SPAWN_FAILURE);
		assert!(Outcome::Exited(0).success());
		assert!(!Outcome::Failed.success());
	}

	#[test]
	fn connect_links_neighbours() {
		let streams = connect(3).unwrap();
		assert!(streams[0].stdin.is_none() && streams[0].stdout.is_some());
		assert!(streams[1].stdin.is_some() && streams[1].stdout.is_some());
		assert!(streams[2].stdin.is_some() && streams[2].stdout.is_none());
		assert!(streams.iter().all(|s| s.stderr.is_none()));
		assert!(connect(1).unwrap()[0].stdin.is_none());
	}

	#[test]
	fn two_stage_pipe() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out");
		let mut tr = stage(&["tr", "a-z", "A-Z"]);
		tr.output = Some(out.clone());
		let outcome = run(&foreground(vec![stage(&["printf", "abc"]), tr])).unwrap();
		assert_eq!(outcome, Outcome::Exited(0));
		assert_eq!(fs::read_to_string(&out).unwrap(), "ABC");
	}

	#[test]
	fn three_stage_pipe_sees_eof() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out");
		let mut wc = stage(&["wc", "-l"]);
		wc.output = Some(out.clone());
		let stages = vec![stage(&["printf", "a\\nb\\nc\\n"]), stage(&["cat"]), wc];
		assert!(run(&foreground(stages)).unwrap().success());
		assert_eq!(fs::read_to_string(&out).unwrap().trim(), "3");
	}

	#[test]
	fn last_stage_decides_status() {
		let p = foreground(vec![stage(&["false"]), stage(&["true"])]);
		assert_eq!(run(&p).unwrap(), Outcome::Exited(0));
		let p = foreground(vec![stage(&["true"]), stage(&["false"])]);
		assert_eq!(run(&p).unwrap(), Outcome::Exited(1));
	}

	#[test]
	fn input_redirect_overrides_pipe() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("in");
		let out = dir.path().join("out");
		fs::write(&input, "from file\n").unwrap();
		let mut cat = stage(&["cat"]);
		cat.input = Some(input);
		cat.output = Some(out.clone());
		let p = foreground(vec![stage(&["echo", "from pipe"]), cat]);
		assert!(run(&p).unwrap().success());
		assert_eq!(fs::read_to_string(&out).unwrap(), "from file\n");
	}

	#[test]
	fn output_redirect_overrides_pipe() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a");
		let b = dir.path().join("b");
		let mut echo = stage(&["echo", "one"]);
		echo.output = Some(a.clone());
		let mut cat = stage(&["cat"]);
		cat.output = Some(b.clone());
		let p = foreground(vec![echo, cat]);
		assert_eq!(run(&p).unwrap(), Outcome::Exited(0));
		assert_eq!(fs::read_to_string(&a).unwrap(), "one\n");
		// cat still sees end of input on the unused pipe
		assert_eq!(fs::read_to_string(&b).unwrap(), "");
	}

	#[test]
	fn output_redirect_truncates() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out");
		fs::write(&out, "something much longer than the new content\n").unwrap();
		let mut echo = stage(&["echo", "short"]);
		echo.output = Some(out.clone());
		assert!(run(&foreground(vec![echo])).unwrap().success());
		assert_eq!(fs::read_to_string(&out).unwrap(), "short\n");
	}

	#[test]
	fn output_redirect_mode() {
		use std::os::unix::fs::PermissionsExt;
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out");
		let mut echo = stage(&["true"]);
		echo.output = Some(out.clone());
		run(&foreground(vec![echo])).unwrap();
		let mode = fs::metadata(&out).unwrap().permissions().mode() & 0o777;
		// the process umask may only clear bits
		assert_eq!(mode & !0o644, 0);
	}

	#[test]
	fn error_redirect() {
		let dir = tempfile::tempdir().unwrap();
		let err = dir.path().join("err");
		let mut sh = stage(&["sh", "-c", "echo oops >&2"]);
		sh.error = Some(err.clone());
		assert!(run(&foreground(vec![sh])).unwrap().success());
		assert_eq!(fs::read_to_string(&err).unwrap(), "oops\n");
	}

	#[test]
	fn missing_input_fails_only_that_stage() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out");
		let mut cat = stage(&["cat"]);
		cat.input = Some(dir.path().join("does-not-exist"));
		let mut echo = stage(&["echo", "still ran"]);
		echo.output = Some(out.clone());
		let p = foreground(vec![cat, echo]);
		assert_eq!(run(&p).unwrap(), Outcome::Failed);
		assert_eq!(fs::read_to_string(&out).unwrap(), "still ran\n");
	}

	#[test]
	fn unknown_program_exits_127() {
		let dir = tempfile::tempdir().unwrap();
		let err = dir.path().join("err");
		let mut bogus = stage(&["nonexistent_program_xyz"]);
		bogus.error = Some(err.clone());
		assert_eq!(run(&foreground(vec![bogus])).unwrap(), Outcome::Exited(NOT_FOUND));
		let msg = fs::read_to_string(&err).unwrap();
		assert!(msg.starts_with("pish: nonexistent_program_xyz: "), "{}", msg);
	}

	#[test]
	fn nul_in_argument_is_a_spawn_error() {
		let p = foreground(vec![stage(&["echo", "a\0b"])]);
		assert_eq!(run(&p).unwrap(), Outcome::Failed);
	}

	#[test]
	fn signaled_last_stage() {
		let p = foreground(vec![stage(&["sh", "-c", "kill -TERM $$"])]);
		assert_eq!(run(&p).unwrap(), Outcome::Signaled(Signal::SIGTERM));
	}

	#[test]
	fn detached_returns_pids() {
		let dir = tempfile::tempdir().unwrap();
		let out: PathBuf = dir.path().join("out");
		let mut echo = stage(&["echo", "bg"]);
		echo.output = Some(out.clone());
		let p = Pipeline { stages: vec![stage(&["true"]), echo], detached: true };
		let pids = match run(&p).unwrap() {
			Outcome::Started(pids) => pids,
			other => panic!("unexpected outcome {:?}", other),
		};
		assert_eq!(pids.len(), 2);
		for pid in pids {
			assert!(matches!(waitpid(pid, None).unwrap(), WaitStatus::Exited(_, 0)));
		}
		assert_eq!(fs::read_to_string(&out).unwrap(), "bg\n");
	}
}
