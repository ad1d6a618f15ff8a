//! Interactive line prompting, shared by the shell's command loop.

use libc::ECHO;
use libc::ECHOE;
use libc::ICANON;
use libc::STDIN_FILENO;
use libc::TCSANOW;
use libc::VMIN;
use libc::tcgetattr;
use libc::tcsetattr;
use libc::termios;
use std::io::BufRead;
use std::io::Write;
use std::mem::MaybeUninit;
use std::{fmt, io};

/// Shows a prompt and returns the next line of input, or `None` at EOF.
///
/// Arguments:
/// - `prompt` is the prompt's text.
/// - `hidden` tells whether the input should be hidden (unused by this
///   shell, but kept for parity with the rest of this crate's line-reading
///   helpers).
pub fn prompt<P: fmt::Display>(prompt: P, hidden: bool) -> Option<String> {
    let saved_termios = unsafe {
        let mut t: termios = MaybeUninit::zeroed().assume_init();
        tcgetattr(STDIN_FILENO, &mut t);
        t
    };
    if hidden {
        let mut termios = saved_termios;
        termios.c_lflag &= !(ICANON | ECHO | ECHOE);
        termios.c_cc[VMIN] = 1;
        unsafe {
            tcsetattr(STDIN_FILENO, TCSANOW, &termios);
        }
    }
    print!("{prompt}");
    let _ = io::stdout().flush();
    let input = io::stdin().lock().lines().next()?.unwrap_or_default();
    if hidden {
        println!();
        unsafe {
            tcsetattr(STDIN_FILENO, TCSANOW, &saved_termios);
        }
    }
    Some(input)
}
