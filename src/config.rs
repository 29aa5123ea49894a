//! Command-line options.

use clap::Parser;

use crate::expand;

pub const DEFAULT_PROMPT: &str = "MonShell% ";

#[derive(Debug, Clone, Parser)]
#[command(name = "pish", version, about = "A small pipeline shell")]
pub struct Config {
	/// Run LINE and exit with its status
	#[arg(short = 'c', long = "command", value_name = "LINE")]
	pub command: Option<String>,

	/// Prompt printed before each line
	#[arg(long, env = "PISH_PROMPT", default_value = DEFAULT_PROMPT)]
	pub prompt: String,

	/// Upper bound, in bytes, on the result of `$NAME` expansion
	#[arg(long = "expand-limit", value_name = "BYTES", default_value_t = expand::DEFAULT_LIMIT)]
	pub expand_limit: usize,

	/// No prompt, no farewell; for scripts fed on standard input
	#[arg(short, long)]
	pub quiet: bool,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			command: None,
			prompt: DEFAULT_PROMPT.to_owned(),
			expand_limit: expand::DEFAULT_LIMIT,
			quiet: false,
		}
	}
}
