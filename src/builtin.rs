//! Commands the shell runs itself because they change its own state.

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::global::State;

pub type Builtin = fn(&mut State, &[String]) -> u8;

fn fail(name: &str, reason: &str) -> u8 {
	eprintln!("pish: {}: {}", name, reason);
	1
}

fn valid_name(name: &str) -> bool {
	!name.is_empty() && !name.contains('=') && !name.contains('\0')
}

pub fn builtin_cd(_: &mut State, args: &[String]) -> u8 {
	let dir = match args.first() {
		Some(d) => PathBuf::from(d),
		None => match env::var_os("HOME") {
			Some(home) => PathBuf::from(home),
			None => return fail("cd", "HOME not set"),
		},
	};
	if let Err(e) = env::set_current_dir(&dir) {
		return fail("cd", &format!("{}: {}", dir.display(), e));
	}
	if let Ok(cwd) = env::current_dir() {
		env::set_var("PWD", cwd);
	}
	0
}

fn set(name: &str, value: &str, builtin: &str) -> u8 {
	if !valid_name(name) || value.contains('\0') {
		return fail(builtin, &format!("invalid variable: {}", name));
	}
	env::set_var(name, value);
	0
}

/// `setenv NAME [VALUE]`
pub fn builtin_setenv(_: &mut State, args: &[String]) -> u8 {
	match args {
		[name] => set(name, "", "setenv"),
		[name, value] => set(name, value, "setenv"),
		_ => fail("setenv", "usage: setenv NAME [VALUE]"),
	}
}

/// `export NAME=VALUE...`
pub fn builtin_export(_: &mut State, args: &[String]) -> u8 {
	if args.is_empty() {
		return fail("export", "usage: export NAME=VALUE...");
	}
	let mut status = 0;
	for arg in args {
		let (name, value) = arg.split_once('=').unwrap_or((arg.as_str(), ""));
		status |= set(name, value, "export");
	}
	status
}

/// `unsetenv NAME...`, also `unset`
pub fn builtin_unsetenv(_: &mut State, args: &[String]) -> u8 {
	let mut status = 0;
	for name in args {
		if valid_name(name) {
			env::remove_var(name);
		} else {
			status = fail("unset", &format!("invalid variable: {}", name));
		}
	}
	status
}

/// `env`, also `printenv`. Lists the environment sorted by name.
pub fn builtin_env(_: &mut State, _: &[String]) -> u8 {
	let mut vars: Vec<_> = env::vars_os().collect();
	vars.sort();
	let stdout = io::stdout();
	let mut out = stdout.lock();
	for (k, v) in vars {
		let r = writeln!(out, "{}={}", k.to_string_lossy(), v.to_string_lossy());
		if r.is_err() { return 1; }
	}
	let _ = out.flush();
	0
}

/// `exit [CODE]`; without a code the last status is used.
pub fn builtin_exit(state: &mut State, args: &[String]) -> u8 {
	let code = match args.first() {
		None => state.last_status,
		Some(a) => match a.parse::<i32>() {
			Ok(n) => n & 0xff,
			Err(_) => {
				fail("exit", &format!("numeric argument required: {}", a));
				2
			},
		},
	};
	state.exit = Some(code);
	code as u8
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => Some(builtin_cd),
		"setenv" => Some(builtin_setenv),
		"export" => Some(builtin_export),
		"unsetenv" | "unset" => Some(builtin_unsetenv),
		"env" | "printenv" => Some(builtin_env),
		"exit" => Some(builtin_exit),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(a: &[&str]) -> Vec<String> {
		a.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn lookup() {
		assert!(match_builtin("cd").is_some());
		assert!(match_builtin("unset").is_some());
		assert!(match_builtin("ls").is_none());
	}

	#[test]
	fn setenv_and_unsetenv() {
		let mut state = State::new();
		assert_eq!(builtin_setenv(&mut state, &args(&["PISH_BUILTIN_A", "1"])), 0);
		assert_eq!(env::var("PISH_BUILTIN_A").unwrap(), "1");
		assert_eq!(builtin_unsetenv(&mut state, &args(&["PISH_BUILTIN_A"])), 0);
		assert!(env::var_os("PISH_BUILTIN_A").is_none());
		assert_eq!(builtin_setenv(&mut state, &args(&[])), 1);
		assert_eq!(builtin_setenv(&mut state, &args(&["A=B", "x"])), 1);
	}

	#[test]
	fn export_splits_on_equals() {
		let mut state = State::new();
		assert_eq!(builtin_export(&mut state, &args(&["PISH_BUILTIN_B=x=y", "PISH_BUILTIN_C"])), 0);
		assert_eq!(env::var("PISH_BUILTIN_B").unwrap(), "x=y");
		assert_eq!(env::var("PISH_BUILTIN_C").unwrap(), "");
	}

	#[test]
	fn exit_records_code() {
		let mut state = State::new();
		state.last_status = 4;
		assert_eq!(builtin_exit(&mut state, &args(&[])), 4);
		assert_eq!(state.exit, Some(4));
		assert_eq!(builtin_exit(&mut state, &args(&["257"])), 1);
		assert_eq!(state.exit, Some(1));
		assert_eq!(builtin_exit(&mut state, &args(&["nope"])), 2);
	}
}
