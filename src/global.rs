//! Per-session state of the interactive shell and line dispatch.

use std::io::{self, Write};

use log::debug;

use crate::builtin;
use crate::env::ProcessEnv;
use crate::eval::{self, Outcome};
use crate::expand;
use crate::job::JobSet;
use crate::parser::Parser;

/// Status reported for a line that failed to parse.
pub const PARSE_FAILURE: i32 = 2;

pub struct State {
	pub job_set: JobSet,
	pub last_status: i32,
	/// Set by `exit`; the session should end with this code.
	pub exit: Option<i32>,
	pub expand_limit: usize,
}

impl Default for State {
	fn default() -> State {
		State::new()
	}
}

impl State {
	pub fn new() -> State {
		State {
			job_set: JobSet::new(),
			last_status: 0,
			exit: None,
			expand_limit: expand::DEFAULT_LIMIT,
		}
	}

	/// Runs one line: a builtin if the line is a lone command naming one,
	/// the pipeline executor otherwise. Returns the new last status.
	pub fn eval(&mut self, line: &str) -> i32 {
		let parsed = Parser::new(&ProcessEnv).with_limit(self.expand_limit).line(line);
		let pipeline = match parsed {
			Ok(Some(p)) => p,
			Ok(None) => return self.last_status,
			Err(e) => {
				eprintln!("pish: {}", e);
				self.last_status = PARSE_FAILURE;
				return self.last_status;
			},
		};

		let first = &pipeline.stages[0];
		if pipeline.stages.len() == 1 && !pipeline.detached && !first.has_redirects() {
			if let Some(func) = builtin::match_builtin(first.program()) {
				debug!("builtin {}", first.program());
				self.last_status = func(self, &first.argv[1..]) as i32;
				return self.last_status;
			}
		}

		self.last_status = match eval::run(&pipeline) {
			Ok(Outcome::Started(pids)) => {
				let pid_list: Vec<String> = pids.iter().map(|p| p.to_string()).collect();
				let n = self.job_set.push(pids);
				println!("[{}] {}", n, pid_list.join(" "));
				0
			},
			Ok(outcome) => outcome.code(),
			Err(e) => {
				eprintln!("pish: {}", e);
				eval::SPAWN_FAILURE
			},
		};
		self.last_status
	}

	/// Reports detached jobs that have finished since the last call.
	pub fn report_done(&mut self) {
		let done = self.job_set.reap();
		if done.is_empty() { return; }
		let stdout = io::stdout();
		let mut out = stdout.lock();
		for n in done {
			let _ = writeln!(out, "[{}] Done", n);
		}
		let _ = out.flush();
	}
}
