//! # picoc
//!
//! The reference front-end for the `picoc` library: parses a C source file
//! (whole-buffer, streaming, or interactive) and calls `main` (spec §6
//! "CLI surface of the reference front-end").

use std::error::Error;
use std::fs;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::error;
use picoc::error::InterpError;
use picoc::{Config, Interpreter};

/// CLI configuration for the picoc front-end.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Source file to run. Omit when `--interactive` is given.
    #[arg(index = 1)]
    pub file: Option<std::path::PathBuf>,

    /// Arguments forwarded to the interpreted program's `main`.
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,

    /// Parse in line-by-line / streaming mode instead of buffering the
    /// whole file up front.
    #[arg(short = 's', long)]
    pub stream: bool,

    /// Start an interactive read-eval-print loop instead of running a file.
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Specify the log level of the interpreter.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    pub verbosity: LogLevel,

    /// Dump the lexed token stream as JSON to stderr before running.
    #[arg(long)]
    pub dump_tokens: bool,
}

/// Log level for the interpreter's own tracing, not the interpreted
/// program's output.
#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogLevel {
    #[default]
    #[value(alias("0"))]
    Error,
    #[value(alias("1"))]
    Warn,
    #[value(alias("2"))]
    Info,
    #[value(alias("3"))]
    Debug,
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

fn run(cli: &Cli) -> Result<i32, Box<dyn Error>> {
    let mut interp = Interpreter::new("<picoc>", Config::default());
    interp.include_all_system_headers();

    if cli.interactive {
        interp.parse_interactive()?;
        return Ok(0);
    }

    let Some(path) = &cli.file else {
        return Err("a source file is required unless --interactive is given".into());
    };
    let file_name = path.to_string_lossy().into_owned();
    let debug = matches!(cli.verbosity, LogLevel::Debug | LogLevel::Trace);

    if cli.stream {
        let mut lines = std::io::BufRead::lines(std::io::BufReader::new(fs::File::open(path)?));
        interp.parse_line_by_line(file_name, move || lines.next().and_then(Result::ok), debug)?;
    } else {
        let source = fs::read_to_string(path)?;
        interp.parse(file_name, &source, debug)?;
    }

    if cli.dump_tokens {
        eprintln!("{}", interp.dump_tokens_json());
    }

    Ok(interp.call_main(&cli.args)?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    simple_logger::init_with_level((&cli.verbosity).into()).unwrap();

    match run(&cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            if let Some(InterpError::Exit(code)) = e.downcast_ref::<InterpError>() {
                return ExitCode::from(*code as u8);
            }
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
