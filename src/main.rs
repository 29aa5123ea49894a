use std::io::{self, BufRead, Write};
use std::process;

use clap::Parser;
use log::debug;

use pish::config::Config;
use pish::global::State;

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().filter_or("PISH_LOG", "warn")).init();
	let config = Config::parse();
	debug!("{:?}", config);

	let mut state = State::new();
	state.expand_limit = config.expand_limit;

	if let Some(line) = config.command.as_deref() {
		let status = state.eval(line);
		process::exit(state.exit.unwrap_or(status));
	}

	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	let mut line: Vec<u8> = vec![];
	loop {
		state.report_done();
		if !config.quiet {
			let _ = stdout.write_all(config.prompt.as_bytes());
			let _ = stdout.flush();
		}
		line.clear();
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => {
				if !config.quiet {
					println!("\nGoodbye!");
				}
				break;
			},
			Ok(_) => {},
			Err(e) => {
				eprintln!("pish: cannot read input: {}", e);
				break;
			},
		}
		// undecodable bytes become U+FFFD rather than ending the session
		let text = String::from_utf8_lossy(&line);
		state.eval(text.trim_end_matches(&['\n', '\r'][..]));
		if let Some(code) = state.exit {
			process::exit(code);
		}
	}
	process::exit(state.last_status);
}
