use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::RedirectKind;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
	#[error("empty command")]
	EmptyCommand,
	#[error("missing target after '{0}'")]
	MissingTarget(RedirectKind),
}

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("{0}")]
	Parse(#[from] ParseError),
	#[error("{}: {source}", .path.display())]
	Redirection { path: PathBuf, source: io::Error },
	#[error("{program}: {reason}")]
	Spawn { program: String, reason: String },
	#[error("cannot start pipeline: {0}")]
	Resource(#[from] nix::Error),
}
