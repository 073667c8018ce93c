//! Declaration parsing: type specifiers, struct/union/enum bodies, and
//! declarators (spec §4.2 "clockwise-spiral rule", §4.4 "Variable
//! definitions").

use crate::error::ParseResult;
use crate::string_table::Sym;
use crate::token::{Keyword, Punct, TokenKind};
use crate::types::TypeId;
use crate::value::{default_data, Data};

use super::Engine;

/// Storage-class / qualifier keywords accepted but not semantically
/// meaningful beyond parsing (spec §6 "Accepted C surface").
fn is_ignored_qualifier(kw: Keyword) -> bool {
    matches!(
        kw,
        Keyword::Extern | Keyword::Register | Keyword::Auto | Keyword::Const | Keyword::Volatile
    )
}

impl Engine {
    /// Attempts to parse a base type specifier (`int`, `struct Foo`, a
    /// typedef name, ...). Returns `Ok(None)` if the current token cannot
    /// start one, without consuming anything, so callers can fall back to
    /// expression-statement parsing.
    pub(super) fn try_parse_type_specifier(&mut self) -> ParseResult<Option<(TypeId, bool)>> {
        let mut is_static = false;
        loop {
            match self.peek() {
                TokenKind::Keyword(Keyword::Static) => {
                    is_static = true;
                    self.bump();
                }
                TokenKind::Keyword(kw) if is_ignored_qualifier(*kw) => {
                    self.bump();
                }
                _ => break,
            }
        }

        let ty = match self.peek().clone() {
            TokenKind::Keyword(Keyword::Void) => {
                self.bump();
                self.types.void
            }
            TokenKind::Keyword(Keyword::Char) => {
                self.bump();
                self.types.char_
            }
            TokenKind::Keyword(Keyword::Short) => {
                self.bump();
                self.skip_keyword(Keyword::Int);
                self.types.short
            }
            TokenKind::Keyword(Keyword::Int) => {
                self.bump();
                self.types.int
            }
            TokenKind::Keyword(Keyword::Long) => {
                self.bump();
                self.skip_keyword(Keyword::Int);
                self.types.long
            }
            TokenKind::Keyword(Keyword::Signed) => {
                self.bump();
                self.types.int
            }
            TokenKind::Keyword(Keyword::Unsigned) => {
                self.bump();
                match self.peek() {
                    TokenKind::Keyword(Keyword::Char) => {
                        self.bump();
                        self.types.uchar
                    }
                    _ => {
                        self.skip_keyword(Keyword::Int);
                        self.types.int
                    }
                }
            }
            TokenKind::Keyword(Keyword::Float) => {
                self.bump();
                self.types.float
            }
            TokenKind::Keyword(Keyword::Double) => {
                self.bump();
                self.types.double
            }
            TokenKind::Keyword(Keyword::Struct) => self.parse_aggregate(false)?,
            TokenKind::Keyword(Keyword::Union) => self.parse_aggregate(true)?,
            TokenKind::Keyword(Keyword::Enum) => self.parse_enum()?,
            TokenKind::Ident(sym) if self.typedefs.contains_key(&sym) => {
                self.bump();
                self.typedefs[&sym]
            }
            _ => return Ok(None),
        };
        Ok(Some((ty, is_static)))
    }

    fn skip_keyword(&mut self, kw: Keyword) {
        if *self.peek() == TokenKind::Keyword(kw) {
            self.bump();
        }
    }

    fn expect_ident(&mut self) -> ParseResult<Sym> {
        match self.bump() {
            TokenKind::Ident(sym) => Ok(sym),
            other => Err(self.ps_err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn expect_punct_ps(&mut self, p: Punct) -> ParseResult<()> {
        if *self.peek() == TokenKind::Punct(p) {
            self.bump();
            Ok(())
        } else {
            Err(self.ps_err(format!("expected {p:?}")))
        }
    }

    /// `struct`/`union` NAME `{` field-decl* `}` or a bare forward
    /// reference `struct NAME`.
    fn parse_aggregate(&mut self, is_union: bool) -> ParseResult<TypeId> {
        self.bump(); // 'struct' / 'union'
        let name = self.expect_ident()?;
        let scope_id = self.scopes.depth() as u32;

        if *self.peek() != TokenKind::Punct(Punct::LBrace) {
            return Ok(self.types.declare_aggregate(scope_id, name, is_union, &[]));
        }
        self.bump(); // '{'

        let mut fields = Vec::new();
        while *self.peek() != TokenKind::Punct(Punct::RBrace) {
            let Some((base, _)) = self.try_parse_type_specifier()? else {
                return Err(self.ps_err("expected field type in aggregate body"));
            };
            loop {
                let (fname, fty) = self.parse_declarator(base)?;
                fields.push((fname, fty));
                if *self.peek() == TokenKind::Punct(Punct::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
            self.expect_punct_ps(Punct::Semicolon)?;
        }
        self.bump(); // '}'
        Ok(self.types.declare_aggregate(scope_id, name, is_union, &fields))
    }

    /// `enum` NAME `{` ident (`=` const)? (`,` ident (`=` const)?)* `}`.
    /// Enumerators are inserted into the enclosing scope as `int`
    /// constants (spec §4.2 "Enums").
    fn parse_enum(&mut self) -> ParseResult<TypeId> {
        self.bump(); // 'enum'
        let name = self.expect_ident()?;
        let ty = self.types.enum_type(name);

        if *self.peek() != TokenKind::Punct(Punct::LBrace) {
            return Ok(ty);
        }
        self.bump(); // '{'

        let mut next_value: i64 = 0;
        while *self.peek() != TokenKind::Punct(Punct::RBrace) {
            let ename = self.expect_ident()?;
            if *self.peek() == TokenKind::Punct(Punct::Assign) {
                self.bump();
                next_value = self.eval_const_int_expr()?;
            }
            let addr = self.arena.alloc(Data::Int(next_value));
            self.scopes.declare_global(ename, addr, self.types.int);
            next_value += 1;
            if *self.peek() == TokenKind::Punct(Punct::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        self.expect_punct_ps(Punct::RBrace)?;
        Ok(ty)
    }

    /// Parses one declarator given the already-parsed base type, applying
    /// the clockwise-spiral rule: leading `*`s bind to the base, then the
    /// name, then a trailing `[N]` wraps the whole pointer-qualified type
    /// in an array (spec §4.2).
    pub(super) fn parse_declarator(&mut self, base: TypeId) -> ParseResult<(Sym, TypeId)> {
        let mut ty = base;
        while *self.peek() == TokenKind::Punct(Punct::Star) {
            self.bump();
            ty = self.types.pointer_to(ty);
        }
        let name = self.expect_ident()?;

        if *self.peek() == TokenKind::Punct(Punct::LBracket) {
            self.bump();
            let len = if *self.peek() == TokenKind::Punct(Punct::RBracket) {
                None
            } else {
                Some(self.eval_const_int_expr()? as usize)
            };
            self.expect_punct_ps(Punct::RBracket)?;
            ty = self.types.array_of(ty, len);
        }
        Ok((name, ty))
    }

    /// Evaluates a compile-time-constant integer expression (array sizes,
    /// enumerator values, `case` labels).
    pub(super) fn eval_const_int_expr(&mut self) -> ParseResult<i64> {
        let value = self.eval_expr().map_err(|e| self.ps_err(e.message))?;
        value
            .data
            .as_int()
            .ok_or_else(|| self.ps_err("expected a constant integer expression"))
    }

    /// Parses a parenthesized parameter list up to and including the
    /// closing `)`, assuming the opening `(` has already been consumed.
    /// Shared by function definitions and native-prototype registration
    /// (spec §4.7: "the engine parses the prototype to build a function
    /// descriptor").
    pub(super) fn parse_param_list(&mut self) -> ParseResult<(Vec<(Sym, TypeId)>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;
        if *self.peek() != TokenKind::Punct(Punct::RParen) {
            loop {
                if *self.peek() == TokenKind::Punct(Punct::Ellipsis) {
                    self.bump();
                    variadic = true;
                    break;
                }
                if *self.peek() == TokenKind::Keyword(Keyword::Void)
                    && self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::Punct(Punct::RParen))
                {
                    self.bump();
                    break;
                }
                let Some((pbase, _)) = self.try_parse_type_specifier()? else {
                    return Err(self.ps_err("expected parameter type"));
                };
                let (pname, pty) = self.parse_declarator(pbase)?;
                params.push((pname, pty));
                if *self.peek() == TokenKind::Punct(Punct::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect_punct_ps(Punct::RParen)?;
        Ok((params, variadic))
    }

    /// Registers a host native function from a C prototype string, per
    /// spec §4.7: "the engine parses the prototype to build a function
    /// descriptor, then stores the pair keyed by function name". The
    /// prototype is lexed against a temporary swap of the token stream, the
    /// same trick `#include` uses to parse a header snippet mid-statement.
    pub fn register_native(&mut self, prototype: &str, thunk: crate::host::NativeThunk) -> crate::error::RuntimeResult<()> {
        let lexer = crate::lexer::Lexer::new("<native>", prototype, &mut self.strings);
        let tokens = lexer
            .lex_all()
            .map_err(|e| crate::error::RuntimeError::new(e.pos, e.message))?;
        let saved_tokens = std::mem::replace(&mut self.tokens, tokens);
        let saved_pos = std::mem::replace(&mut self.pos, 0);

        let parsed = (|| -> ParseResult<(Sym, TypeId, Vec<(Sym, TypeId)>, bool)> {
            let Some((base, _)) = self.try_parse_type_specifier()? else {
                return Err(self.ps_err("expected return type in native prototype"));
            };
            let mut ret = base;
            while *self.peek() == TokenKind::Punct(Punct::Star) {
                self.bump();
                ret = self.types.pointer_to(ret);
            }
            let name = self.expect_ident()?;
            self.expect_punct(Punct::LParen)?;
            let (params, variadic) = self.parse_param_list()?;
            Ok((name, ret, params, variadic))
        })();

        self.tokens = saved_tokens;
        self.pos = saved_pos;

        let (name, ret, params, variadic) = parsed.map_err(|e| crate::error::RuntimeError::new(e.pos, e.message))?;
        self.functions.insert(
            name,
            super::FunctionDef {
                ret,
                params,
                variadic,
                body: None,
                is_native: true,
            },
        );
        self.host.register_native(
            name,
            crate::host::NativeFn {
                prototype: prototype.to_string(),
                thunk,
            },
        );
        Ok(())
    }

    /// Allocates storage for a freshly declared local/global of type `ty`
    /// and binds `name` to it in the current scope.
    /// Returns `(addr, first_visit)`. For `static` locals, storage comes
    /// from `Engine::statics` (never truncated by a frame pop) and
    /// `first_visit` is true only the very first time this declaration is
    /// reached, so the caller runs the initializer exactly once (spec
    /// §4.5).
    pub(super) fn declare_variable(&mut self, name: Sym, ty: TypeId, is_static: bool, at_global_scope: bool) -> (Addr, bool) {
        if is_static {
            let func = self.current_function.unwrap_or(name);
            if let Some((binding, seen)) = self.scopes.peek_static(func, name) {
                return (binding.addr, !seen);
            }
            let addr = self.statics.alloc(default_data(&self.types, ty));
            let (binding, first) = self.scopes.static_slot(func, name, || crate::scope::Binding {
                addr,
                ty,
                scope_id: 0,
            });
            self.scopes.declare_local(name, binding.addr, ty);
            return (binding.addr, first);
        }
        let data = default_data(&self.types, ty);
        let addr = self.arena.alloc(data);
        if at_global_scope {
            self.scopes.declare_global(name, addr, ty);
        } else {
            self.scopes.declare_local(name, addr, ty);
        }
        (addr, true)
    }
}

use crate::value::Addr;
