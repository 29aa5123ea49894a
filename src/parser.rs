//! Line splitting and stage parsing.
//!
//! A line is split on `|` into stage texts (after a trailing `&` marks it
//! detached). Each stage text is scanned once, left to right, for the
//! redirection markers `<`, `>` and `2>`. There is no quoting: any of
//! those characters inside an argument is taken as a marker. Each marker
//! owns the text up to the next marker (or the end) as its target; the
//! text before the first marker is the command.

use std::path::PathBuf;

use crate::env::Env;
use crate::error::ParseError;
use crate::expand;
use crate::text;
use crate::types::*;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
struct Marker {
	kind: RedirectKind,
	start: usize,
	end: usize,
}

struct Scanner<'a> {
	text: &'a [u8],
	i: usize,
}

impl<'a> Scanner<'a> {
	fn new(text: &'a str) -> Scanner<'a> {
		Scanner { text: text.as_bytes(), i: 0 }
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.text.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_plain(c: u8) -> bool {
		!matches!(c, b'<' | b'>' | b'2')
	}
}

impl<'a> Iterator for Scanner<'a> {
	type Item = Marker;

	fn next(&mut self) -> Option<Marker> {
		loop {
			self.proceed_while(Scanner::is_plain);
			let start = self.i;
			let (kind, len) = match self.text.get(start) {
				None => return None,
				Some(&b'<') => (RedirectKind::Input, 1),
				Some(&b'>') => (RedirectKind::Output, 1),
				Some(_) if self.text.get(start + 1) == Some(&b'>') => (RedirectKind::Error, 2),
				// a '2' that does not start "2>"
				Some(_) => {
					self.i += 1;
					continue;
				},
			};
			self.i += len;
			return Some(Marker { kind, start, end: self.i });
		}
	}
}

/// Result of splitting a line on `|`, before any stage is parsed.
#[derive(Debug, PartialEq, Eq)]
pub struct Split<'a> {
	pub detached: bool,
	pub stages: Vec<&'a str>,
}

/// Splits a line into stage texts. Returns `None` for a blank line.
pub fn split(line: &str) -> Option<Split<'_>> {
	let mut line = text::normalize(line);
	if line.is_empty() {
		return None;
	}
	let mut detached = false;
	if let Some(rest) = line.strip_suffix('&') {
		detached = true;
		line = text::normalize(rest);
	}
	let stages = line.split('|').map(text::normalize).collect();
	Some(Split { detached, stages })
}

/// Parses stage texts and lines against a variable environment.
pub struct Parser<'e, E: Env + ?Sized> {
	env: &'e E,
	limit: usize,
}

impl<'e, E: Env + ?Sized> Parser<'e, E> {
	pub fn new(env: &'e E) -> Parser<'e, E> {
		Parser { env, limit: expand::DEFAULT_LIMIT }
	}

	/// Sets the output cap used for every `$NAME` expansion.
	pub fn with_limit(mut self, limit: usize) -> Parser<'e, E> {
		self.limit = limit;
		self
	}

	fn expand(&self, s: &str) -> String {
		expand::expand_bounded(s, self.env, self.limit)
	}

	pub fn stage(&self, stage_text: &str) -> ParseResult<Stage> {
		let markers: Vec<Marker> = Scanner::new(stage_text).collect();
		let command_end = markers.first().map_or(stage_text.len(), |m| m.start);

		let mut stage = Stage { argv: vec![], input: None, output: None, error: None };
		for (k, marker) in markers.iter().enumerate() {
			let clause_end = markers.get(k + 1).map_or(stage_text.len(), |m| m.start);
			let target = self.expand(text::normalize(&stage_text[marker.end .. clause_end]));
			if target.is_empty() {
				return Err(ParseError::MissingTarget(marker.kind));
			}
			// a later marker of the same kind wins
			let slot = match marker.kind {
				RedirectKind::Input => &mut stage.input,
				RedirectKind::Output => &mut stage.output,
				RedirectKind::Error => &mut stage.error,
			};
			*slot = Some(PathBuf::from(target));
		}

		stage.argv = text::tokenize(&self.expand(&stage_text[.. command_end]));
		if stage.argv.is_empty() {
			return Err(ParseError::EmptyCommand);
		}
		Ok(stage)
	}

	/// Builds a whole pipeline. `Ok(None)` means the line was blank.
	pub fn line(&self, line: &str) -> ParseResult<Option<Pipeline>> {
		let split = match split(line) {
			Some(s) => s,
			None => return Ok(None),
		};
		let stages = split.stages.iter()
			.map(|s| self.stage(s))
			.collect::<ParseResult<Vec<Stage>>>()?;
		Ok(Some(Pipeline { stages, detached: split.detached }))
	}
}

pub fn parse_stage<E: Env + ?Sized>(stage_text: &str, env: &E) -> ParseResult<Stage> {
	Parser::new(env).stage(stage_text)
}

pub fn parse<E: Env + ?Sized>(line: &str, env: &E) -> ParseResult<Option<Pipeline>> {
	Parser::new(env).line(line)
}
