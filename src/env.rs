//! Read-only variable lookup used by `$NAME` expansion.

use std::collections::{BTreeMap, HashMap};
use std::env;

pub trait Env {
	fn lookup(&self, name: &str) -> Option<String>;
}

/// The environment of the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
	fn lookup(&self, name: &str) -> Option<String> {
		if name.is_empty() || name.contains('=') || name.contains('\0') {
			return None;
		}
		env::var_os(name).map(|v| v.to_string_lossy().into_owned())
	}
}

impl Env for HashMap<String, String> {
	fn lookup(&self, name: &str) -> Option<String> {
		self.get(name).cloned()
	}
}

impl Env for BTreeMap<String, String> {
	fn lookup(&self, name: &str) -> Option<String> {
		self.get(name).cloned()
	}
}

impl<'a, E: Env + ?Sized> Env for &'a E {
	fn lookup(&self, name: &str) -> Option<String> {
		(**self).lookup(name)
	}
}
