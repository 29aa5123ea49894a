//! Whitespace handling shared by the builder and the stage parser.
//!
//! Only space and tab count as blanks here. Other whitespace classes
//! (newline, form feed, unicode spaces) are ordinary characters.

pub fn is_blank(c: char) -> bool {
	c == ' ' || c == '\t'
}

/// Strips leading and trailing spaces and tabs.
pub fn normalize(s: &str) -> &str {
	s.trim_matches(is_blank)
}

/// Splits on runs of blanks, dropping empty pieces.
pub fn tokenize(s: &str) -> Vec<String> {
	s.split(is_blank)
		.filter(|w| !w.is_empty())
		.map(str::to_owned)
		.collect()
}
