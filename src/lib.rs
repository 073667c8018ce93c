//! `picoc`: an embeddable interpreter for a substantial subset of C.
//!
//! The pipeline threads source text through the string table, lexer, type
//! system, value arena, and statement driver described in each module's
//! own docs; [`interpreter::Interpreter`] is the only surface a host needs
//! to touch (spec §6).

pub mod engine;
pub mod error;
pub mod host;
pub mod interpreter;
pub mod lexer;
pub mod repl;
pub mod scope;
pub mod stdlib_demo;
pub mod string_table;
pub mod token;
pub mod types;
pub mod value;

pub use error::{InterpError, InterpResult, ParseError, RuntimeError};
pub use interpreter::{Config, Interpreter};
