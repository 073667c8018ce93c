//! Interactive front-end (spec §6 `parse_interactive`/
//! `parse_interactive_no_banner`). Reads one line at a time from stdin and
//! feeds each to [`Interpreter::parse`] in turn — the REPL's "one
//! statement on each line" simplification noted in DESIGN.md. A parse or
//! runtime error is printed and the loop continues, per spec §7: errors
//! leave the interpreter state consistent for further entries.

use std::io::{self, BufRead, Write};

use crate::error::{InterpError, InterpResult};
use crate::interpreter::Interpreter;

const BANNER: &str = "picoc interactive mode. Ctrl-D to exit.";

pub fn run(interp: &mut Interpreter, banner: bool) -> InterpResult<()> {
    if banner {
        println!("{BANNER}");
    }
    let stdin = io::stdin();
    let mut line_no: u32 = 0;
    loop {
        print!("picoc> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        let bytes = stdin.lock().read_line(&mut line).unwrap_or(0);
        if bytes == 0 {
            println!();
            return Ok(());
        }
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match interp.parse(format!("<stdin:{line_no}>"), &line, false) {
            Ok(()) => {}
            Err(InterpError::Exit(code)) => return Err(InterpError::Exit(code)),
            Err(e) => eprintln!("{e}"),
        }
    }
}
