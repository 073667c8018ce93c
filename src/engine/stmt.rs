//! Statement Driver (spec §4.4, §4.6). Recursive-descent over statements
//! and block structure; realizes `break`/`continue`/`return`/`goto`/`case`
//! through the `Mode` state machine rather than host-level unwinding.

use crate::error::{ParseResult, RuntimeResult};
use crate::string_table::Sym;
use crate::token::{Keyword, Punct, TokenKind};
use crate::value::Data;

use super::{Engine, LoopCtx, Mode, SwitchCtx};

impl Engine {
    /// Finds the token index of the `}` matching a `{` that the caller has
    /// already consumed (cursor sits just past it, at depth 1).
    fn find_matching_brace(&self) -> RuntimeResult<usize> {
        let mut depth = 1i32;
        let mut i = self.pos;
        loop {
            match self.tokens.get(i).map(|t| &t.kind) {
                Some(TokenKind::Punct(Punct::LBrace)) => depth += 1,
                Some(TokenKind::Punct(Punct::RBrace)) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                Some(TokenKind::Eof) | None => return Err(self.rt_err("unterminated block: missing '}'")),
                _ => {}
            }
            i += 1;
        }
    }

    pub(super) fn expect_punct(&mut self, p: Punct) -> RuntimeResult<()> {
        if *self.peek() == TokenKind::Punct(p) {
            self.bump();
            Ok(())
        } else {
            Err(self.rt_err(format!("expected {p:?}, found {:?}", self.peek())))
        }
    }

    /// A `{...}` compound statement: its own nested scope, its own arena
    /// mark, `break`/`continue`/`return` jump straight to the closing
    /// brace once detected rather than re-parsing the remainder.
    fn exec_compound(&mut self) -> RuntimeResult<()> {
        self.bump(); // '{'
        let end = self.find_matching_brace()?;
        self.scopes.push_scope();
        let mark = self.arena.mark();

        while self.pos < end {
            match self.mode {
                Mode::Return => break,
                Mode::Break | Mode::Continue | Mode::Goto(_) => {
                    self.pos = end;
                    break;
                }
                _ => self.exec_statement()?,
            }
        }
        if self.pos < end {
            self.pos = end;
        }
        self.scopes.pop_scope();
        self.arena.truncate_to(mark);
        if *self.peek() == TokenKind::Punct(Punct::RBrace) {
            self.bump();
        }
        Ok(())
    }

    /// Runs the top-level sequence of a function body (already stripped of
    /// its enclosing braces by `FunctionDef::body`). The only mode that is
    /// resolved here rather than propagated further is `Goto`: this is as
    /// far out as a `goto` may unwind (SPEC_FULL §B.5: "only searches the
    /// current function").
    pub(super) fn exec_block_raw(&mut self, end: usize) -> RuntimeResult<()> {
        while self.pos < end {
            match &self.mode {
                Mode::Return => break,
                Mode::Break | Mode::Continue => break,
                Mode::Goto(label) => {
                    let label = *label;
                    self.resolve_goto(label, end)?;
                }
                _ => self.exec_statement()?,
            }
        }
        Ok(())
    }

    fn resolve_goto(&mut self, label: Sym, fn_end: usize) -> RuntimeResult<()> {
        let fn_start = self.fn_ranges.last().map(|&(s, _)| s).unwrap_or(0);
        if let Some(target) = self.scan_for_label(self.pos, fn_end, label).or_else(|| self.scan_for_label(fn_start, self.pos, label)) {
            self.pos = target;
            self.mode = Mode::Run;
            Ok(())
        } else {
            Err(self.rt_err(format!("label '{}' not found in current function", self.strings.resolve(label))))
        }
    }

    fn scan_for_label(&self, start: usize, end: usize, label: Sym) -> Option<usize> {
        let mut i = start;
        while i + 1 < end {
            if let (TokenKind::Ident(s), TokenKind::Punct(Punct::Colon)) = (&self.tokens[i].kind, &self.tokens[i + 1].kind) {
                if *s == label {
                    return Some(i + 2);
                }
            }
            i += 1;
        }
        None
    }

    /// Dispatches a single statement at the cursor. This is the recursion
    /// point for block bodies, loop bodies, and `if`/`else` arms.
    pub(super) fn exec_statement(&mut self) -> RuntimeResult<()> {
        match self.peek().clone() {
            TokenKind::Punct(Punct::LBrace) => self.exec_compound(),
            TokenKind::Punct(Punct::Semicolon) => {
                self.bump();
                Ok(())
            }
            TokenKind::Keyword(Keyword::If) => self.exec_if(),
            TokenKind::Keyword(Keyword::While) => self.exec_while(),
            TokenKind::Keyword(Keyword::Do) => self.exec_do_while(),
            TokenKind::Keyword(Keyword::For) => self.exec_for(),
            TokenKind::Keyword(Keyword::Switch) => self.exec_switch(),
            TokenKind::Keyword(Keyword::Case) => self.exec_case(),
            TokenKind::Keyword(Keyword::Default) => self.exec_default(),
            TokenKind::Keyword(Keyword::Break) => {
                self.bump();
                self.expect_punct(Punct::Semicolon)?;
                if self.in_run_mode() {
                    self.mode = Mode::Break;
                }
                Ok(())
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.bump();
                self.expect_punct(Punct::Semicolon)?;
                if self.in_run_mode() {
                    self.mode = Mode::Continue;
                }
                Ok(())
            }
            TokenKind::Keyword(Keyword::Return) => self.exec_return(),
            TokenKind::Keyword(Keyword::Goto) => self.exec_goto(),
            TokenKind::Keyword(Keyword::Typedef) => self.exec_typedef(),
            TokenKind::Keyword(Keyword::Delete) => self.exec_delete(),
            TokenKind::HashDefine => self.exec_define(),
            TokenKind::HashInclude => self.exec_include(),
            TokenKind::Ident(sym) if self.is_label_here(sym) => {
                self.bump(); // ident
                self.bump(); // ':'
                Ok(())
            }
            TokenKind::Punct(Punct::RBrace) => {
                // Defensive: a goto landed between blocks; treat as a no-op
                // boundary rather than failing the whole program.
                self.bump();
                Ok(())
            }
            _ => self.exec_decl_or_expr_statement(),
        }
    }

    fn is_label_here(&self, sym: Sym) -> bool {
        matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Punct(Punct::Colon)))
            && !self.typedefs.contains_key(&sym)
    }

    fn exec_if(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'if'
        self.expect_punct(Punct::LParen)?;
        let cond = self.eval_expr()?;
        self.expect_punct(Punct::RParen)?;
        let taken = !matches!(self.mode, Mode::Skip) && self.rvalue_is_truthy(&cond);

        // SPEC_FULL §B.2: once already skipping, nested bodies stay in
        // Skip regardless of their own condition; only the *transition*
        // into Skip is gated by the condition.
        let already_skipping = matches!(self.mode, Mode::Skip);
        if taken && !already_skipping {
            self.exec_statement()?;
        } else {
            self.run_in_skip(|e| e.exec_statement())?;
        }

        if *self.peek() == TokenKind::Keyword(Keyword::Else) {
            self.bump();
            if !taken && !already_skipping {
                self.exec_statement()?;
            } else {
                self.run_in_skip(|e| e.exec_statement())?;
            }
        }
        Ok(())
    }

    fn run_in_skip(&mut self, f: impl FnOnce(&mut Self) -> RuntimeResult<()>) -> RuntimeResult<()> {
        let saved = std::mem::replace(&mut self.mode, Mode::Skip);
        let result = f(self);
        // A break/continue/return reached while genuinely running must
        // survive a skip performed for an *unrelated* arm; only restore
        // the saved mode if nothing happened while skipping.
        if self.mode == Mode::Skip {
            self.mode = saved;
        }
        result
    }

    fn exec_while(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'while'
        self.expect_punct(Punct::LParen)?;
        let cond_pos = self.pos;
        loop {
            self.pos = cond_pos;
            let cond = self.eval_expr()?;
            self.expect_punct(Punct::RParen)?;
            if !self.rvalue_is_truthy(&cond) {
                self.run_in_skip(|e| e.exec_statement())?;
                break;
            }
            self.exec_statement()?;
            match self.mode {
                Mode::Break => {
                    self.mode = Mode::Run;
                    break;
                }
                Mode::Continue => self.mode = Mode::Run,
                Mode::Return | Mode::Goto(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    fn exec_do_while(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'do'
        let body_pos = self.pos;
        loop {
            self.pos = body_pos;
            self.exec_statement()?;
            match self.mode {
                Mode::Break => {
                    self.mode = Mode::Run;
                    self.skip_to_while_cond()?;
                    break;
                }
                Mode::Continue => self.mode = Mode::Run,
                Mode::Return | Mode::Goto(_) => return Ok(()),
                _ => {}
            }
            self.expect_keyword(Keyword::While)?;
            self.expect_punct(Punct::LParen)?;
            let cond = self.eval_expr()?;
            self.expect_punct(Punct::RParen)?;
            self.expect_punct(Punct::Semicolon)?;
            if !self.rvalue_is_truthy(&cond) {
                break;
            }
        }
        Ok(())
    }

    fn skip_to_while_cond(&mut self) -> RuntimeResult<()> {
        self.expect_keyword(Keyword::While)?;
        self.expect_punct(Punct::LParen)?;
        self.run_in_skip(|e| {
            e.eval_expr()?;
            Ok(())
        })?;
        self.expect_punct(Punct::RParen)?;
        self.expect_punct(Punct::Semicolon)?;
        Ok(())
    }

    fn expect_keyword(&mut self, kw: Keyword) -> RuntimeResult<()> {
        if *self.peek() == TokenKind::Keyword(kw) {
            self.bump();
            Ok(())
        } else {
            Err(self.rt_err(format!("expected keyword {kw:?}")))
        }
    }

    /// `for (init; cond; incr) body`. Exactly four cursor snapshots are
    /// kept, per SPEC_FULL §B.3: pre-conditional, pre-increment,
    /// pre-statement, and after-the-whole-loop; the body and increment are
    /// re-run by rewinding to their snapshots, never by re-parsing from
    /// the top of the `for`.
    fn exec_for(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'for'
        self.expect_punct(Punct::LParen)?;
        self.scopes.push_scope();
        let mark = self.arena.mark();

        if *self.peek() != TokenKind::Punct(Punct::Semicolon) {
            self.exec_decl_or_expr_statement()?;
        } else {
            self.bump();
        }

        let cond_pos = self.pos;
        let mut cond_empty = false;
        self.run_in_skip(|e| {
            if *e.peek() == TokenKind::Punct(Punct::Semicolon) {
                cond_empty = true;
            } else {
                e.eval_expr()?;
            }
            Ok(())
        })?;
        self.expect_punct(Punct::Semicolon)?;

        let incr_pos = self.pos;
        self.run_in_skip(|e| {
            if *e.peek() != TokenKind::Punct(Punct::RParen) {
                e.eval_expr()?;
            }
            Ok(())
        })?;
        self.expect_punct(Punct::RParen)?;

        let body_pos = self.pos;
        self.run_in_skip(|e| e.exec_statement())?;
        let after_pos = self.pos;

        let loop_ctx = LoopCtx {
            cond_pos,
            incr_pos,
            body_pos,
            after_pos,
        };
        self.loop_stack.push(loop_ctx);

        loop {
            self.pos = cond_pos;
            let keep_going = if cond_empty {
                true
            } else {
                let cond = self.eval_expr()?;
                self.rvalue_is_truthy(&cond)
            };
            if !keep_going {
                break;
            }
            self.pos = body_pos;
            self.exec_statement()?;
            match self.mode {
                Mode::Break => {
                    self.mode = Mode::Run;
                    break;
                }
                Mode::Return | Mode::Goto(_) => break,
                Mode::Continue => self.mode = Mode::Run,
                _ => {}
            }
            self.pos = incr_pos;
            if incr_pos != body_pos {
                let _ = self.eval_expr();
            }
        }

        self.loop_stack.pop();
        self.pos = after_pos;
        self.scopes.pop_scope();
        self.arena.truncate_to(mark);
        Ok(())
    }

    /// `switch (expr) { ... }`. Entering sets `Mode::CaseSearch`
    /// (SPEC_FULL §B.4); if nothing ever matches, the body still runs to
    /// completion in `CaseSearch`, i.e. as a no-op scan.
    fn exec_switch(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'switch'
        self.expect_punct(Punct::LParen)?;
        let scrutinee_val = self.eval_expr()?;
        self.expect_punct(Punct::RParen)?;
        let scrutinee = self.rvalue_as_int(&scrutinee_val);

        let was_skipping = matches!(self.mode, Mode::Skip);
        self.switch_stack.push(SwitchCtx {
            scrutinee,
            matched: false,
        });
        let saved_mode = std::mem::replace(&mut self.mode, if was_skipping { Mode::Skip } else { Mode::CaseSearch(scrutinee) });

        let result = self.exec_statement();

        self.switch_stack.pop();
        match self.mode {
            Mode::Break => self.mode = Mode::Run,
            Mode::CaseSearch(_) => self.mode = saved_mode,
            Mode::Return | Mode::Goto(_) => {}
            _ => self.mode = saved_mode,
        }
        result
    }

    fn exec_case(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'case'
        let label = self
            .eval_const_int_expr()
            .map_err(|e| self.rt_err(e.message))?;
        self.expect_punct(Punct::Colon)?;
        if let Mode::CaseSearch(scrutinee) = self.mode {
            if label == scrutinee {
                self.mode = Mode::Run;
            }
        }
        Ok(())
    }

    fn exec_default(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'default'
        self.expect_punct(Punct::Colon)?;
        if matches!(self.mode, Mode::CaseSearch(_)) {
            self.mode = Mode::Run;
        }
        Ok(())
    }

    fn exec_return(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'return'
        let value = if *self.peek() != TokenKind::Punct(Punct::Semicolon) {
            Some(self.eval_expr()?)
        } else {
            None
        };
        self.expect_punct(Punct::Semicolon)?;
        if self.in_run_mode() {
            if let Some(v) = value {
                let ret_ty = self.scopes.current_frame().return_ty.unwrap_or(v.ty);
                let data = super::coerce_for_store(&self.types, ret_ty, &v);
                let addr = self.arena.alloc(data);
                let frame = self.scopes.current_frame();
                frame.return_slot = Some(addr);
                frame.return_ty = Some(ret_ty);
            }
            self.mode = Mode::Return;
        }
        Ok(())
    }

    fn exec_goto(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'goto'
        let label = match self.bump() {
            TokenKind::Ident(s) => s,
            other => return Err(self.rt_err(format!("expected label after 'goto', found {other:?}"))),
        };
        self.expect_punct(Punct::Semicolon)?;
        if self.in_run_mode() {
            self.mode = Mode::Goto(label);
        }
        Ok(())
    }

    /// `delete name` removes exactly one global table entry atomically; a
    /// missing entry is a runtime error and nothing is mutated
    /// (SPEC_FULL §B.7).
    fn exec_delete(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'delete'
        let name = match self.bump() {
            TokenKind::Ident(s) => s,
            other => return Err(self.rt_err(format!("expected identifier after 'delete', found {other:?}"))),
        };
        self.expect_punct(Punct::Semicolon)?;
        if self.in_run_mode() {
            let removed = self.scopes.remove_global(name) | self.functions.remove(&name).is_some() | self.macros.remove(&name).is_some();
            if !removed {
                return Err(self.rt_err(format!("cannot delete undefined name '{}'", self.strings.resolve(name))));
            }
        }
        Ok(())
    }

    fn exec_typedef(&mut self) -> RuntimeResult<()> {
        self.bump(); // 'typedef'
        let Some((base, _)) = self.try_parse_type_specifier().map_err(|e| self.rt_err(e.message))? else {
            return Err(self.rt_err("expected type in typedef"));
        };
        let (name, ty) = self.parse_declarator(base).map_err(|e| self.rt_err(e.message))?;
        self.expect_punct(Punct::Semicolon)?;
        if self.in_run_mode() {
            let aliased = self.types.typedef(name, ty);
            self.typedefs.insert(name, aliased);
        }
        Ok(())
    }

    fn rvalue_as_int(&self, v: &crate::value::Value) -> i64 {
        v.data.as_int().unwrap_or(0)
    }

    /// Handles everything that is neither a control-flow keyword nor a
    /// declaration keyword: declarations by type-specifier lookahead, a
    /// function definition at global scope, or a plain expression
    /// statement.
    fn exec_decl_or_expr_statement(&mut self) -> RuntimeResult<()> {
        let save = self.snapshot();
        match self.try_parse_type_specifier().map_err(|e| self.rt_err(e.message))? {
            Some((base, is_static)) => self.exec_declaration(base, is_static),
            None => {
                self.restore(save);
                let _ = self.eval_expr()?;
                self.expect_punct(Punct::Semicolon)?;
                Ok(())
            }
        }
    }

    /// One base-type declaration, possibly several comma-separated
    /// declarators, each with its own optional initializer (spec §4.4
    /// "Variable definitions").
    fn exec_declaration(&mut self, base: crate::types::TypeId, is_static: bool) -> RuntimeResult<()> {
        if matches!(self.peek(), TokenKind::Punct(Punct::Semicolon)) {
            self.bump();
            return Ok(());
        }
        loop {
            let (name, ty) = self.parse_declarator(base).map_err(|e| self.rt_err(e.message))?;

            if *self.peek() == TokenKind::Punct(Punct::LParen) {
                self.exec_function_definition(name, ty)?;
                return Ok(());
            }

            let at_global = self.scopes.depth() == 1 && self.current_function.is_none();
            let (addr, first_visit) = self.declare_variable(name, ty, is_static, at_global);

            if *self.peek() == TokenKind::Punct(Punct::Assign) {
                self.bump();
                if first_visit || !is_static {
                    self.exec_initializer(addr, ty)?;
                } else {
                    self.run_in_skip(|e| e.exec_initializer(addr, ty))?;
                }
            }

            if *self.peek() == TokenKind::Punct(Punct::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        self.expect_punct(Punct::Semicolon)?;
        Ok(())
    }

    /// `= expr` or `= { expr, expr, ... }`. Array-size elision is resolved
    /// by counting initializer elements; string initializers for `char[]`
    /// copy including the terminator.
    fn exec_initializer(&mut self, addr: crate::value::Addr, ty: crate::types::TypeId) -> RuntimeResult<()> {
        if *self.peek() == TokenKind::Punct(Punct::LBrace) {
            self.bump();
            let elem = self.types.pointee(ty).unwrap_or(ty);
            let elem_size = self.types.sizeof(elem) as u32;
            let mut i = 0u32;
            while *self.peek() != TokenKind::Punct(Punct::RBrace) {
                let eaddr = addr.with_offset(i * elem_size);
                self.exec_initializer(eaddr, elem)?;
                i += 1;
                if *self.peek() == TokenKind::Punct(Punct::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
            self.expect_punct(Punct::RBrace)?;
            return Ok(());
        }

        if let TokenKind::Str(sym) = self.peek().clone() {
            if self.types.pointee(ty).is_some() {
                self.bump();
                let text = self.strings.resolve(sym).to_string();
                let bytes = self.arena.bytes_at_mut(addr);
                let n = bytes.len().min(text.len() + 1);
                for (i, b) in text.as_bytes().iter().take(n.saturating_sub(1)).enumerate() {
                    bytes[i] = *b;
                }
                if n > 0 {
                    bytes[n - 1] = 0;
                }
                return Ok(());
            }
        }

        let value = self.eval_assignment()?;
        let data = super::coerce_for_store(&self.types, ty, &value);
        if !self.skip_guard() {
            self.arena.write(addr, &self.types, ty, data);
        }
        Ok(())
    }

    /// Function definition at global scope. A prototype (no `{`) just
    /// records the signature; a body overrides any earlier prototype;
    /// redefining a function that already has a body is a parse error
    /// (SPEC_FULL §B.1). Nested function definitions are rejected.
    fn exec_function_definition(&mut self, name: Sym, ret: crate::types::TypeId) -> RuntimeResult<()> {
        if self.current_function.is_some() || self.scopes.depth() != 1 {
            return Err(self.rt_err("nested function definitions are not allowed"));
        }
        self.bump(); // '('
        let (params, variadic) = self.parse_param_list().map_err(|e| self.rt_err(e.message))?;

        if *self.peek() == TokenKind::Punct(Punct::Semicolon) {
            self.bump();
            if self.in_run_mode() {
                self.functions.entry(name).or_insert(super::FunctionDef {
                    ret,
                    params,
                    variadic,
                    body: None,
                    is_native: false,
                });
            }
            return Ok(());
        }

        if *self.peek() != TokenKind::Punct(Punct::LBrace) {
            return Err(self.rt_err("expected function body or ';'"));
        }
        if let Some(existing) = self.functions.get(&name) {
            if existing.body.is_some() {
                return Err(self.rt_err(format!("redefinition of function '{}'", self.strings.resolve(name))));
            }
        }

        self.bump(); // '{'
        let body_start = self.pos;
        let end = self.find_matching_brace()?;
        self.pos = end + 1;

        if self.in_run_mode() {
            self.functions.insert(
                name,
                super::FunctionDef {
                    ret,
                    params,
                    variadic,
                    body: Some((body_start, end)),
                    is_native: false,
                },
            );
        }
        Ok(())
    }

    /// `#define NAME body` or `#define NAME(params) body`, consuming
    /// through end-of-line. Object-like macros are modeled as zero-param
    /// function-like macros whose body is an expression (spec §3 "Macro
    /// descriptor").
    fn exec_define(&mut self) -> RuntimeResult<()> {
        self.bump(); // HashDefine
        let name = match self.bump() {
            TokenKind::Ident(s) => s,
            other => return Err(self.rt_err(format!("expected macro name, found {other:?}"))),
        };
        let mut params = Vec::new();
        if *self.peek() == TokenKind::Punct(Punct::LParen) {
            self.bump();
            if *self.peek() != TokenKind::Punct(Punct::RParen) {
                loop {
                    match self.bump() {
                        TokenKind::Ident(p) => params.push(p),
                        other => return Err(self.rt_err(format!("expected macro parameter, found {other:?}"))),
                    }
                    if *self.peek() == TokenKind::Punct(Punct::Comma) {
                        self.bump();
                        continue;
                    }
                    break;
                }
            }
            self.expect_punct(Punct::RParen)?;
        }
        let body_start = self.pos;
        while !matches!(self.peek(), TokenKind::Eol | TokenKind::Eof) {
            self.bump();
        }
        let body_end = self.pos;
        if matches!(self.peek(), TokenKind::Eol) {
            self.bump();
        }
        if self.in_run_mode() {
            self.macros.insert(name, super::MacroDef {
                params,
                body: (body_start, body_end),
            });
        }
        Ok(())
    }

    /// `#include "name.h"`. Guards double inclusion via a sentinel global
    /// (SPEC_FULL §B.6); unknown names fall back to a runtime error since
    /// this crate does not compile in file-reading support for includes.
    fn exec_include(&mut self) -> RuntimeResult<()> {
        self.bump(); // HashInclude
        let name = match self.bump() {
            TokenKind::Str(s) => self.strings.resolve(s).to_string(),
            other => return Err(self.rt_err(format!("expected header name, found {other:?}"))),
        };
        if matches!(self.peek(), TokenKind::Eol) {
            self.bump();
        }
        if !self.in_run_mode() {
            return Ok(());
        }
        if self.host.mark_included(&name) {
            return Ok(());
        }
        let Some(stub) = self.host.header(&name).cloned_parts() else {
            return Err(self.rt_err(format!("unknown header '{name}'")));
        };
        let sentinel = self.strings.intern(&format!("__included_{name}"));
        let addr = self.arena.alloc(Data::Int(1));
        self.scopes.declare_global(sentinel, addr, self.types.void);

        (stub.setup)(self);
        for (_, native) in &stub.functions {
            self.register_native(&native.prototype, native.thunk.clone())?;
        }
        if !stub.source.is_empty() {
            let lexer = crate::lexer::Lexer::new(name.clone(), stub.source.clone(), &mut self.strings);
            let tokens = lexer.lex_all().map_err(|e| self.rt_err(e.message))?;
            let saved_tokens = std::mem::take(&mut self.tokens);
            let saved_pos = self.pos;
            self.tokens = tokens;
            self.pos = 0;
            self.run_program().map_err(|e| self.rt_err(e.message))?;
            self.tokens = saved_tokens;
            self.pos = saved_pos;
        }
        Ok(())
    }

    /// Top-level statement: same dispatch as inside a function, but only
    /// declarations, function definitions, `#define`/`#include`, and
    /// `delete` are meaningful outside a function body.
    pub(super) fn parse_top_level_statement(&mut self) -> ParseResult<()> {
        self.exec_statement().map_err(|e| crate::error::ParseError::new(e.pos, e.message))
    }
}

/// `HeaderStub` holds `Rc`-shared callbacks; this clones the handles
/// (cheap) without requiring `HeaderStub: Clone` as a whole, since its
/// `functions` vec holds `NativeFn`s that are already cheaply cloneable.
trait ClonedHeaderParts {
    fn cloned_parts(&self) -> Option<crate::host::HeaderStub>;
}

impl ClonedHeaderParts for Option<&crate::host::HeaderStub> {
    fn cloned_parts(&self) -> Option<crate::host::HeaderStub> {
        self.map(|stub| crate::host::HeaderStub {
            setup: stub.setup.clone(),
            functions: stub.functions.clone(),
            source: stub.source.clone(),
        })
    }
}
