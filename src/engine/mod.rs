//! Engine: threads the Lexer, Type System, Value Arena & Scopes, Host
//! Bridge, Expression Evaluator (`eval.rs`), Statement Driver (`stmt.rs`)
//! and declaration parsing (`decl.rs`) through one shared cursor, mirroring
//! how real picoc threads a single `ParseState` through `Expression.c` and
//! `parse.c`.

mod decl;
mod eval;
mod stmt;

use std::collections::HashMap;

use log::trace;

use crate::error::{ParseResult, RuntimeError, RuntimeResult, SourcePos};
use crate::host::HostBridge;
use crate::scope::Scopes;
use crate::string_table::{StringTable, Sym};
use crate::token::{Token, TokenKind};
use crate::types::{TypeId, TypeTable};
use crate::value::{Data, Value, ValueArena};

/// The execution-mode state machine (spec §4.6). A single variable
/// multiplexes scanning and execution; transitions happen only at
/// statement boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Run,
    Skip,
    Return,
    Break,
    Continue,
    Goto(Sym),
    CaseSearch(i64),
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub ret: TypeId,
    pub params: Vec<(Sym, TypeId)>,
    pub variadic: bool,
    /// Token index range `[start, end)` of the function body. `None` means
    /// this is a prototype with no definition yet (SPEC_FULL §B.1).
    pub body: Option<(usize, usize)>,
    pub is_native: bool,
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub params: Vec<Sym>,
    pub body: (usize, usize),
}

pub struct LoopCtx {
    pub cond_pos: usize,
    pub incr_pos: usize,
    pub body_pos: usize,
    pub after_pos: usize,
}

pub struct SwitchCtx {
    pub scrutinee: i64,
    pub matched: bool,
}

pub struct Engine {
    pub strings: StringTable,
    pub types: TypeTable,
    pub arena: ValueArena,
    /// Storage for `static` locals: never truncated by a call frame pop
    /// (spec §4.5: "allocated in a separate global area and survive scope
    /// exit").
    pub statics: ValueArena,
    pub scopes: Scopes,
    pub host: HostBridge,
    pub tokens: Vec<Token>,
    pub pos: usize,
    pub mode: Mode,
    pub functions: HashMap<Sym, FunctionDef>,
    pub macros: HashMap<Sym, MacroDef>,
    pub typedefs: HashMap<Sym, TypeId>,
    pub file: String,
    pub loop_stack: Vec<LoopCtx>,
    pub switch_stack: Vec<SwitchCtx>,
    pub current_function: Option<Sym>,
    pub labels: HashMap<Sym, usize>,
    /// Token range `[start, end)` of each function body currently being
    /// executed, innermost last. Consulted by `goto` to bound its search
    /// to the current function (SPEC_FULL §B.5).
    pub fn_ranges: Vec<(usize, usize)>,
}

impl Engine {
    pub fn new(file: impl Into<String>, pointer_width: usize) -> Self {
        Self {
            strings: StringTable::new(),
            types: TypeTable::new(pointer_width),
            arena: ValueArena::new(),
            statics: ValueArena::new(),
            scopes: Scopes::new(),
            host: HostBridge::new(),
            tokens: Vec::new(),
            pos: 0,
            mode: Mode::Run,
            functions: HashMap::new(),
            macros: HashMap::new(),
            typedefs: HashMap::new(),
            file: file.into(),
            loop_stack: Vec::new(),
            switch_stack: Vec::new(),
            current_function: None,
            labels: HashMap::new(),
            fn_ranges: Vec::new(),
        }
    }

    pub fn append_tokens(&mut self, mut tokens: Vec<Token>) {
        self.tokens.append(&mut tokens);
    }

    /// Drops every token before the cursor. Called between top-level
    /// statements in line-by-line mode so a long REPL session doesn't
    /// retain its whole history (mirrors `Lexer::discard_consumed`).
    pub fn discard_consumed_tokens(&mut self) {
        if self.pos > 0 {
            self.tokens.drain(0..self.pos);
            self.pos = 0;
            self.labels.retain(|_, p| *p >= self.pos);
        }
    }

    pub fn in_run_mode(&self) -> bool {
        self.mode == Mode::Run
    }

    pub fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    pub fn peek_pos(&self) -> (u32, u32) {
        self.tokens
            .get(self.pos)
            .map(|t| (t.line, t.col))
            .unwrap_or((0, 0))
    }

    pub fn source_pos(&self) -> SourcePos {
        let (line, col) = self.peek_pos();
        SourcePos::new(self.file.clone(), line, col)
    }

    pub fn bump(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    pub fn snapshot(&self) -> usize {
        self.pos
    }

    pub fn restore(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn rt_err(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::new(self.source_pos(), message)
    }

    pub fn ps_err(&self, message: impl Into<String>) -> crate::error::ParseError {
        crate::error::ParseError::new(self.source_pos(), message)
    }

    /// Runs the statement driver from the current cursor until end of
    /// input, at global scope (spec §2, §4.4).
    pub fn run_program(&mut self) -> ParseResult<()> {
        while !matches!(self.peek(), TokenKind::Eof) {
            self.parse_top_level_statement()?;
        }
        Ok(())
    }

    /// Looks up `main`, runs it with `argc`/`argv`, and returns its exit
    /// status (spec §6 `call_main`).
    pub fn call_main(&mut self, args: &[String]) -> RuntimeResult<i32> {
        let main_sym = self.strings.intern("main");
        let Some(def) = self.functions.get(&main_sym).cloned() else {
            return Err(self.rt_err("undefined reference to 'main'"));
        };
        trace!("calling main with {} argument(s)", args.len());
        let argv: Vec<Value> = args
            .iter()
            .map(|s| Value::rvalue(self.types.pointer_to(self.types.char_), Data::Str(self.strings.intern(s))))
            .collect();
        let call_args = if def.params.len() >= 2 {
            let char_ptr = self.types.pointer_to(self.types.char_);
            vec![
                Value::rvalue(self.types.int, Data::Int(args.len() as i64)),
                Value::rvalue(self.types.pointer_to(char_ptr), Data::Bytes(vec![])),
            ]
        } else {
            argv
        };
        let result = self.call_function(main_sym, &def, &call_args)?;
        Ok(result.data.as_int().unwrap_or(0) as i32)
    }

    pub fn call_function(&mut self, name: Sym, def: &FunctionDef, args: &[Value]) -> RuntimeResult<Value> {
        if def.is_native {
            let native = self
                .host
                .native(name)
                .cloned()
                .ok_or_else(|| self.rt_err("native function has no registered thunk"))?;
            return (native.thunk)(self, args);
        }
        let (body_start, body_end) = def
            .body
            .ok_or_else(|| self.rt_err(format!("call to undefined function '{}'", self.strings.resolve(name))))?;

        let saved_pos = self.pos;
        let saved_mode = std::mem::replace(&mut self.mode, Mode::Run);
        let saved_fn = self.current_function.replace(name);

        self.arena.push_frame();
        self.scopes.push_frame();
        for (&(pname, pty), arg) in def.params.iter().zip(args.iter()) {
            let data = coerce_for_store(&self.types, pty, arg);
            let addr = self.arena.alloc(data);
            self.scopes.declare_local(pname, addr, pty);
        }

        self.pos = body_start;
        self.fn_ranges.push((body_start, body_end));
        let block_result = self.exec_block_raw(body_end);
        self.fn_ranges.pop();

        let ret_val = match &self.mode {
            Mode::Return => self.scopes.current_frame().return_slot.map(|addr| {
                let ty = self.scopes.current_frame().return_ty.unwrap_or(def.ret);
                Value::rvalue(ty, self.arena.read(addr, &self.types, ty))
            }),
            _ => None,
        };

        self.scopes.pop_frame();
        self.arena.pop_frame();
        self.pos = saved_pos;
        self.mode = saved_mode;
        self.current_function = saved_fn;

        block_result?;
        Ok(ret_val.unwrap_or_else(|| Value::rvalue(def.ret, Data::Int(0))))
    }
}

/// Converts `value` to the representation stored for a binding of type
/// `target`, applying the usual arithmetic conversions on assignment.
pub fn coerce_for_store(types: &TypeTable, target: TypeId, value: &Value) -> Data {
    if types.is_integer(target) {
        let v = match &value.data {
            Data::Int(i) => *i,
            Data::Float(f) => *f as i64,
            Data::Ptr(Some(a)) => ((a.slot as i64) << 32) | a.offset as i64,
            Data::Ptr(None) => 0,
            _ => 0,
        };
        Data::Int(v)
    } else if matches!(
        types.kind(types.resolve(target)),
        crate::types::TypeKind::Float | crate::types::TypeKind::Double
    ) {
        let v = match &value.data {
            Data::Float(f) => *f,
            Data::Int(i) => *i as f64,
            _ => 0.0,
        };
        Data::Float(v)
    } else {
        value.data.clone()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new("<memory>", 8)
    }
}
