//! Hidden password prompting via `termios`, for the REPL binary only.

use std::io::{self, BufRead, Write};
use std::mem::MaybeUninit;

use libc::{termios, ECHO, ECHOE, ICANON, STDIN_FILENO, TCSANOW, VMIN};

/// Shows `prompt`, reads one line of input, and returns it. When `hidden` is
/// set, local echo is disabled for the duration of the read (for passwords).
pub fn prompt(prompt: &str, hidden: bool) -> io::Result<String> {
    let saved = unsafe {
        let mut t: termios = MaybeUninit::zeroed().assume_init();
        libc::tcgetattr(STDIN_FILENO, &mut t);
        t
    };
    if hidden {
        let mut t = saved;
        t.c_lflag &= !(ICANON | ECHO | ECHOE);
        t.c_cc[VMIN] = 1;
        unsafe {
            libc::tcsetattr(STDIN_FILENO, TCSANOW, &t);
        }
    }

    print!("{prompt}");
    io::stdout().flush()?;
    let line = io::stdin().lock().lines().next().transpose()?.unwrap_or_default();

    if hidden {
        println!();
        unsafe {
            libc::tcsetattr(STDIN_FILENO, TCSANOW, &saved);
        }
    }
    Ok(line)
}
