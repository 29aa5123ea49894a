//! pish: turns one line of input into a pipeline of processes.
//!
//! `parser` splits the line into stages and parses each one (redirections,
//! `$NAME` expansion, argument words), `eval` forks and wires the
//! processes. `global`, `builtin` and `job` make up the interactive shell
//! around that core.

pub mod builtin;
pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod expand;
pub mod global;
pub mod job;
pub mod parser;
pub mod text;
pub mod types;


pub use crate::env::{Env, ProcessEnv};
pub use crate::error::{ExecError, ParseError};
pub use crate::eval::Outcome;
pub use crate::parser::Parser;
pub use crate::types::{Pipeline, RedirectKind, Stage};

/// Parses and runs one line. `Ok(None)` for a blank line.
pub fn run_line<E: Env + ?Sized>(parser: &Parser<E>, line: &str) -> Result<Option<Outcome>, ExecError> {
	match parser.line(line)? {
		Some(pipeline) => eval::run(&pipeline).map(Some),
		None => Ok(None),
	}
}
