//! `$NAME` substitution.
//!
//! A `$` followed by a character other than space or tab starts a
//! reference; the name runs until the next space, tab or `$`. Unbound
//! names expand to nothing, and so does the empty name of a `$` that sits
//! directly before another `$`. A `$` at the end or before a blank is
//! literal. Substituted values are copied as-is and never
//! rescanned. Output is capped at a fixed number of bytes: once the cap is
//! hit, whatever has been written so far is the result.

use crate::env::Env;
use crate::text;

/// Default output cap, the size of the original line buffer.
pub const DEFAULT_LIMIT: usize = 1024;

fn ends_name(c: char) -> bool {
	text::is_blank(c) || c == '$'
}

struct Output {
	buf: String,
	limit: usize,
	full: bool,
}

impl Output {
	fn push(&mut self, c: char) {
		if self.full {
			return;
		}
		if self.buf.len() + c.len_utf8() > self.limit {
			self.full = true;
		} else {
			self.buf.push(c);
		}
	}

	fn push_str(&mut self, s: &str) {
		for c in s.chars() {
			self.push(c);
			if self.full { break; }
		}
	}
}

pub fn expand<E: Env + ?Sized>(s: &str, env: &E) -> String {
	expand_bounded(s, env, DEFAULT_LIMIT)
}

pub fn expand_bounded<E: Env + ?Sized>(s: &str, env: &E, limit: usize) -> String {
	let mut out = Output { buf: String::with_capacity(s.len().min(limit)), limit, full: false };
	let mut rest = s;
	while let Some(c) = rest.chars().next() {
		if out.full { break; }
		rest = &rest[c.len_utf8()..];
		if c != '$' {
			out.push(c);
			continue;
		}
		let end = rest.find(ends_name).unwrap_or(rest.len());
		if end == 0 {
			if !rest.starts_with('$') {
				out.push('$');
			}
			continue;
		}
		let (name, tail) = rest.split_at(end);
		if let Some(value) = env.lookup(name) {
			out.push_str(&value);
		}
		rest = tail;
	}
	out.buf
}
