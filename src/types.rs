use std::fmt;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectKind { Input, Output, Error }

impl fmt::Display for RedirectKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match *self {
			RedirectKind::Input => "<",
			RedirectKind::Output => ">",
			RedirectKind::Error => "2>",
		})
	}
}

/// One parsed pipeline stage. `argv` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
	pub argv: Vec<String>,
	pub input: Option<PathBuf>,
	pub output: Option<PathBuf>,
	pub error: Option<PathBuf>,
}

impl Stage {
	pub fn program(&self) -> &str {
		&self.argv[0]
	}

	pub fn target(&self, kind: RedirectKind) -> Option<&PathBuf> {
		match kind {
			RedirectKind::Input => self.input.as_ref(),
			RedirectKind::Output => self.output.as_ref(),
			RedirectKind::Error => self.error.as_ref(),
		}
	}

	pub fn has_redirects(&self) -> bool {
		self.input.is_some() || self.output.is_some() || self.error.is_some()
	}
}

/// Stages in order; always at least one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	pub detached: bool,
}
