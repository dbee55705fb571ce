//! Interactive launcher
//!
//! Reads line-oriented commands from stdin and opens the named files with
//! the operating system's default handler. A companion to the dev server;
//! shares no runtime state with it.
//!
//! Commands:
//! - `exit` - quit
//! - any line containing `.html` - open that file
//! - `run <name>` - open `<name>`

use std::io::{self, BufRead, Write};
use std::process::Command;

#[cfg(target_os = "windows")]
fn opener(path: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", "", path]);
    command
}

#[cfg(target_os = "macos")]
fn opener(path: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(path);
    command
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn opener(path: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(path);
    command
}

fn open_with_default(path: &str) {
    if let Err(err) = opener(path).status() {
        eprintln!("failed to open {}: {}", path, err);
    }
}

fn main() {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("Insert HTML files to run > ");
        let _ = stdout.flush();

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = input.trim_end_matches(&['\r', '\n'][..]);

        if input == "exit" {
            break;
        }
        if input.contains(".html") {
            open_with_default(input);
            continue;
        }
        if let Some(name) = input.strip_prefix("run ") {
            open_with_default(name);
            continue;
        }
        println!("Unknown command: {}", input);
    }
}
