//! The embedding API (spec §6): the only surface a host program touches.
//! `Interpreter` wraps an [`Engine`] and turns its token-cursor primitives
//! into the handful of calls spec §6 lists — `new_interpreter`, `parse`,
//! `parse_interactive[_no_banner]`, `parse_line_by_line`, `call_main`,
//! `register_include`, `register_platform_var`. There is no `destroy`:
//! `Interpreter` is plain Rust data, dropped like anything else.

use std::rc::Rc;

use log::debug;
use serde::Serialize;

use crate::engine::Engine;
use crate::error::InterpResult;
use crate::host::{HeaderStub, NativeFn};
use crate::lexer::{FnLineReader, Lexer};
use crate::token::TokenKind;
use crate::types::TypeId;

/// One entry of a `--dump-tokens` rendering: identifiers and string
/// literals are resolved back to their text since the raw `Sym` is only
/// meaningful with the string table in hand (spec §6 `debug?`).
#[derive(Serialize)]
pub struct TokenDump {
    pub line: u32,
    pub col: u32,
    pub kind: String,
}

/// Sizing knobs for a fresh interpreter (spec §6 `new_interpreter(stack_size_bytes)`).
///
/// `stack_size_bytes` is a soft hint here rather than a hard cap: the value
/// arena ([`crate::value::ValueArena`]) grows a `Vec` on demand the way a
/// host with real memory pressure would pre-size it, but nothing currently
/// refuses an allocation once this budget is exceeded. `pointer_width`
/// feeds the type table's `sizeof(void*)` (spec §4.2).
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub stack_size_bytes: usize,
    pub pointer_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_size_bytes: 64 * 1024,
            pointer_width: std::mem::size_of::<usize>(),
        }
    }
}

/// Wraps an [`Engine`] behind the embedding API. A host builds one,
/// registers whatever headers and platform variables it needs, feeds it
/// source via `parse`/`parse_interactive`/`parse_line_by_line`, then calls
/// `call_main`.
pub struct Interpreter {
    engine: Engine,
    config: Config,
}

impl Interpreter {
    pub fn new(file: impl Into<String>, config: Config) -> Self {
        Self {
            engine: Engine::new(file, config.pointer_width),
            config,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Registers every demonstration header the crate ships (spec §6
    /// "deliberately out of scope": the standard-library shims are a host
    /// concern; this is the reference host's choice to pull all of them in
    /// at once, the way picoc's `PlatformLibraryInit` does).
    pub fn include_all_system_headers(&mut self) {
        crate::stdlib_demo::register_stdlib_demo(&mut self.engine.host);
    }

    /// Lexes `source` in whole-buffer mode and runs it immediately,
    /// statement by statement, against the live global scope (spec §6
    /// `parse`; spec §2 "A program is executed as it is parsed"). `debug`
    /// toggles the crate's own tracing, mirroring picoc's `DebugMode`.
    pub fn parse(&mut self, file: impl Into<String>, source: &str, debug: bool) -> InterpResult<()> {
        let file = file.into();
        self.engine.file = file.clone();
        let lexer = Lexer::new(file, source, &mut self.engine.strings);
        let tokens = lexer.lex_all()?;
        self.engine.append_tokens(tokens);
        if debug {
            debug!("parsed {} token(s)", self.engine.tokens.len());
        }
        self.engine.run_program()?;
        Ok(())
    }

    /// Lexes source pulled one line at a time from `reader` rather than a
    /// single in-memory buffer, then runs it the same way `parse` does
    /// (spec §6 `parse_line_by_line`; used by `picoc -s` for sources too
    /// large, or too live, to buffer whole). `reader` is polled for the
    /// next line whenever the lexer's internal buffer runs dry; `None`
    /// signals EOF. The token stream itself is still built up front: the
    /// goto/loop/macro machinery throughout the engine seeks by token
    /// index, so true statement-at-a-time interleaving would require
    /// re-deriving those indices mid-stream. What streaming buys here is
    /// the same one picoc's own line reader buys — the *source* text is
    /// never held in full, only the token stream it compiles down to.
    pub fn parse_line_by_line(
        &mut self,
        file: impl Into<String>,
        reader: impl FnMut() -> Option<String> + 'static,
        debug: bool,
    ) -> InterpResult<()> {
        let file = file.into();
        self.engine.file = file.clone();
        let mut reader = reader;
        let boxed = Box::new(FnLineReader(&mut reader));
        let mut lexer = Lexer::with_reader(file, &mut self.engine.strings, boxed);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
            lexer.discard_consumed();
        }
        drop(lexer);
        if debug {
            debug!("streamed {} token(s)", tokens.len());
        }
        self.engine.append_tokens(tokens);
        self.engine.run_program()?;
        Ok(())
    }

    /// Runs an interactive read-eval loop against stdin with a startup
    /// banner (spec §6 `parse_interactive`).
    pub fn parse_interactive(&mut self) -> InterpResult<()> {
        crate::repl::run(self, true)
    }

    /// Same as `parse_interactive` but suppresses the banner, for hosts
    /// embedding the REPL in their own front-end (spec §6
    /// `parse_interactive_no_banner`).
    pub fn parse_interactive_no_banner(&mut self) -> InterpResult<()> {
        crate::repl::run(self, false)
    }

    /// Looks up `main` and calls it with `args`, returning its exit status
    /// (spec §6 `call_main(Interpreter, argc, argv) -> int`).
    pub fn call_main(&mut self, args: &[String]) -> InterpResult<i32> {
        Ok(self.engine.call_main(args)?)
    }

    /// Registers a header: a setup callback (run once, before `source` is
    /// parsed, so it can bind whatever native functions the snippet's
    /// declarations reference), a native function table, and an optional
    /// C source snippet providing macros or wrapper declarations (spec §6
    /// `register_include`).
    pub fn register_include(
        &mut self,
        name: impl Into<String>,
        setup: Rc<dyn Fn(&mut Engine)>,
        functions: Vec<(String, NativeFn)>,
        source: impl Into<String>,
    ) {
        self.engine.host.register_header(
            name,
            HeaderStub {
                setup,
                functions,
                source: source.into(),
            },
        );
    }

    /// Exposes a host variable to interpreted code under `name` at global
    /// scope (spec §6 `register_platform_var`). The spec's `scope-or-null`
    /// and `address` parameters are picoc's raw-pointer binding; this
    /// crate instead allocates the storage inside the interpreter's own
    /// value arena and returns its address, since interpreted code always
    /// reads/writes through `ValueArena` rather than a host pointer — a
    /// resolved Open Question recorded in DESIGN.md.
    pub fn register_platform_var(&mut self, name: &str, ty: TypeId, writable: bool) -> crate::value::Addr {
        let sym = self.engine.strings.intern(name);
        let data = crate::value::default_data(&self.engine.types, ty);
        let addr = self.engine.arena.alloc(data);
        self.engine.scopes.declare_global(sym, addr, ty);
        self.engine.host.register_platform_var(sym, ty, writable);
        addr
    }

    /// Renders the current token buffer as pretty-printed JSON (CLI
    /// `--dump-tokens`, spec §6 `debug?`).
    pub fn dump_tokens_json(&self) -> String {
        let dump: Vec<TokenDump> = self
            .engine
            .tokens
            .iter()
            .map(|t| TokenDump {
                line: t.line,
                col: t.col,
                kind: self.describe_kind(&t.kind),
            })
            .collect();
        serde_json::to_string_pretty(&dump).unwrap_or_default()
    }

    fn describe_kind(&self, kind: &TokenKind) -> String {
        match kind {
            TokenKind::Ident(sym) => format!("Ident({})", self.engine.strings.resolve(*sym)),
            TokenKind::Str(sym) => format!("Str({:?})", self.engine.strings.resolve(*sym)),
            other => format!("{other:?}"),
        }
    }
}
