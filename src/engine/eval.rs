//! Expression Evaluator (spec §4.3). A precedence-climbing walker over the
//! token stream that performs C's implicit conversions and lvalue/rvalue
//! discipline as it goes; there is no separate AST, so "parsing" and
//! "evaluating" an expression are the same pass.

use crate::error::{RuntimeError, RuntimeResult};
use crate::token::{Punct, TokenKind};
use crate::types::{TypeId, TypeKind};
use crate::value::{default_data, Addr, Data, Value};

use super::{coerce_for_store, Engine, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
}

fn binop_for(p: Punct) -> Option<BinOp> {
    use BinOp::*;
    Some(match p {
        Punct::Plus => Add,
        Punct::Minus => Sub,
        Punct::Star => Mul,
        Punct::Slash => Div,
        Punct::Percent => Rem,
        Punct::Shl => Shl,
        Punct::Shr => Shr,
        Punct::Lt => Lt,
        Punct::Le => Le,
        Punct::Gt => Gt,
        Punct::Ge => Ge,
        Punct::Eq => Eq,
        Punct::Ne => Ne,
        Punct::Amp => BitAnd,
        Punct::Caret => BitXor,
        Punct::Pipe => BitOr,
        _ => return None,
    })
}

fn compound_binop(p: Punct) -> Option<BinOp> {
    use BinOp::*;
    Some(match p {
        Punct::PlusEq => Add,
        Punct::MinusEq => Sub,
        Punct::StarEq => Mul,
        Punct::SlashEq => Div,
        Punct::PercentEq => Rem,
        Punct::AmpEq => BitAnd,
        Punct::PipeEq => BitOr,
        Punct::CaretEq => BitXor,
        Punct::ShlEq => Shl,
        Punct::ShrEq => Shr,
        _ => return None,
    })
}

/// Binding power: higher binds tighter. Mirrors C's precedence table
/// (spec §4.3).
fn precedence(op: BinOp) -> u8 {
    use BinOp::*;
    match op {
        Mul | Div | Rem => 10,
        Add | Sub => 9,
        Shl | Shr => 8,
        Lt | Le | Gt | Ge => 7,
        Eq | Ne => 6,
        BitAnd => 5,
        BitXor => 4,
        BitOr => 3,
    }
}

impl Engine {
    pub(super) fn eval_expr(&mut self) -> RuntimeResult<Value> {
        self.eval_comma()
    }

    fn eval_comma(&mut self) -> RuntimeResult<Value> {
        let mut v = self.eval_assignment()?;
        while *self.peek() == TokenKind::Punct(Punct::Comma) {
            self.bump();
            v = self.eval_assignment()?;
        }
        Ok(v)
    }

    pub(super) fn eval_assignment(&mut self) -> RuntimeResult<Value> {
        let lhs = self.eval_ternary()?;
        match self.peek().clone() {
            TokenKind::Punct(Punct::Assign) => {
                self.bump();
                let rhs = self.eval_assignment()?;
                self.store_assign(&lhs, rhs)
            }
            TokenKind::Punct(p) if compound_binop(p).is_some() => {
                self.bump();
                let op = compound_binop(p).unwrap();
                let rhs = self.eval_assignment()?;
                let combined = self.apply_binop(op, &lhs, &rhs)?;
                self.store_assign(&lhs, combined)
            }
            _ => Ok(lhs),
        }
    }

    fn store_assign(&mut self, lhs: &Value, rhs: Value) -> RuntimeResult<Value> {
        let Some(addr) = lhs.lvalue else {
            return Err(self.rt_err("assignment target is not an lvalue"));
        };
        let data = coerce_for_store(&self.types, lhs.ty, &rhs);
        if !self.skip_guard() {
            self.arena.write(addr, &self.types, lhs.ty, data.clone());
        }
        Ok(Value::lvalue(lhs.ty, data, addr))
    }

    fn eval_ternary(&mut self) -> RuntimeResult<Value> {
        let cond = self.eval_logical_or()?;
        if *self.peek() == TokenKind::Punct(Punct::Question) {
            self.bump();
            let taken = self.rvalue_is_truthy(&cond);
            let then_val = if taken {
                self.eval_expr()?
            } else {
                self.eval_in_skip(|e| e.eval_expr())?
            };
            if *self.peek() != TokenKind::Punct(Punct::Colon) {
                return Err(self.rt_err("expected ':' in conditional expression"));
            }
            self.bump();
            let else_val = if taken {
                self.eval_in_skip(|e| e.eval_assignment())?
            } else {
                self.eval_assignment()?
            };
            return Ok(if taken { then_val } else { else_val });
        }
        Ok(cond)
    }

    fn eval_logical_or(&mut self) -> RuntimeResult<Value> {
        let mut lhs = self.eval_logical_and()?;
        while *self.peek() == TokenKind::Punct(Punct::OrOr) {
            self.bump();
            let short_circuit = self.rvalue_is_truthy(&lhs);
            let rhs = if short_circuit {
                self.eval_in_skip(|e| e.eval_logical_and())?
            } else {
                self.eval_logical_and()?
            };
            let result = short_circuit || self.rvalue_is_truthy(&rhs);
            lhs = Value::rvalue(self.types.int, Data::Int(result as i64));
        }
        Ok(lhs)
    }

    fn eval_logical_and(&mut self) -> RuntimeResult<Value> {
        let mut lhs = self.eval_bitwise()?;
        while *self.peek() == TokenKind::Punct(Punct::AndAnd) {
            self.bump();
            let lhs_false = !self.rvalue_is_truthy(&lhs);
            let rhs = if lhs_false {
                self.eval_in_skip(|e| e.eval_bitwise())?
            } else {
                self.eval_bitwise()?
            };
            let result = !lhs_false && self.rvalue_is_truthy(&rhs);
            lhs = Value::rvalue(self.types.int, Data::Int(result as i64));
        }
        Ok(lhs)
    }

    fn eval_bitwise(&mut self) -> RuntimeResult<Value> {
        self.eval_binop_level(3)
    }

    /// One climbing step over binary operators at or above `min_prec`.
    fn eval_binop_level(&mut self, min_prec: u8) -> RuntimeResult<Value> {
        let mut lhs = self.eval_unary()?;
        loop {
            let op = match self.peek().clone() {
                TokenKind::Punct(p) => match binop_for(p) {
                    Some(op) if precedence(op) >= min_prec => op,
                    _ => break,
                },
                _ => break,
            };
            self.bump();
            let rhs = self.eval_binop_level(precedence(op) + 1)?;
            lhs = self.apply_binop(op, &lhs, &rhs)?;
        }
        Ok(lhs)
    }

    fn apply_binop(&mut self, op: BinOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
        if self.types.is_pointer(lhs.ty) && self.types.is_integer(rhs.ty) && matches!(op, BinOp::Add | BinOp::Sub) {
            return self.pointer_arith(lhs, rhs, op);
        }
        let use_float = matches!(self.types.kind(self.types.resolve(lhs.ty)), TypeKind::Float | TypeKind::Double)
            || matches!(self.types.kind(self.types.resolve(rhs.ty)), TypeKind::Float | TypeKind::Double);

        if use_float {
            let a = self.rvalue_float(lhs);
            let b = self.rvalue_float(rhs);
            let result_ty = self.types.double;
            return Ok(match op {
                BinOp::Add => Value::rvalue(result_ty, Data::Float(a + b)),
                BinOp::Sub => Value::rvalue(result_ty, Data::Float(a - b)),
                BinOp::Mul => Value::rvalue(result_ty, Data::Float(a * b)),
                BinOp::Div => Value::rvalue(result_ty, Data::Float(a / b)),
                BinOp::Lt => bool_val(self, a < b),
                BinOp::Le => bool_val(self, a <= b),
                BinOp::Gt => bool_val(self, a > b),
                BinOp::Ge => bool_val(self, a >= b),
                BinOp::Eq => bool_val(self, a == b),
                BinOp::Ne => bool_val(self, a != b),
                _ => return Err(self.rt_err("operator not defined on floating operands")),
            });
        }

        let a = self.rvalue_int(lhs);
        let b = self.rvalue_int(rhs);
        let int_ty = self.types.int;
        Ok(match op {
            BinOp::Add => Value::rvalue(int_ty, Data::Int(a.wrapping_add(b))),
            BinOp::Sub => Value::rvalue(int_ty, Data::Int(a.wrapping_sub(b))),
            BinOp::Mul => Value::rvalue(int_ty, Data::Int(a.wrapping_mul(b))),
            BinOp::Div => {
                if b == 0 {
                    return Err(self.rt_err("division by zero"));
                }
                Value::rvalue(int_ty, Data::Int(a / b))
            }
            BinOp::Rem => {
                if b == 0 {
                    return Err(self.rt_err("division by zero"));
                }
                Value::rvalue(int_ty, Data::Int(a % b))
            }
            BinOp::Shl => Value::rvalue(int_ty, Data::Int(a << (b & 63))),
            BinOp::Shr => Value::rvalue(int_ty, Data::Int(a >> (b & 63))),
            BinOp::BitAnd => Value::rvalue(int_ty, Data::Int(a & b)),
            BinOp::BitXor => Value::rvalue(int_ty, Data::Int(a ^ b)),
            BinOp::BitOr => Value::rvalue(int_ty, Data::Int(a | b)),
            BinOp::Lt => bool_val(self, a < b),
            BinOp::Le => bool_val(self, a <= b),
            BinOp::Gt => bool_val(self, a > b),
            BinOp::Ge => bool_val(self, a >= b),
            BinOp::Eq => bool_val(self, a == b),
            BinOp::Ne => bool_val(self, a != b),
        })
    }

    fn pointer_arith(&mut self, ptr: &Value, idx: &Value, op: BinOp) -> RuntimeResult<Value> {
        let elem = self
            .types
            .pointee(ptr.ty)
            .ok_or_else(|| self.rt_err("pointer arithmetic on non-pointer"))?;
        let elem_size = self.types.sizeof(elem) as u32;
        let n = self.rvalue_int(idx) as i64;
        let delta = (n * elem_size as i64) as i32;
        let base = match ptr.data.as_ptr().flatten() {
            Some(a) => a,
            None => return Err(self.rt_err("pointer arithmetic on null pointer")),
        };
        let new_offset = match op {
            BinOp::Add => base.offset as i64 + delta as i64,
            BinOp::Sub => base.offset as i64 - delta as i64,
            _ => unreachable!(),
        };
        let new_addr = Addr {
            slot: base.slot,
            offset: new_offset as u32,
        };
        Ok(Value::rvalue(ptr.ty, Data::Ptr(Some(new_addr))))
    }

    fn eval_unary(&mut self) -> RuntimeResult<Value> {
        match self.peek().clone() {
            TokenKind::Punct(Punct::Plus) => {
                self.bump();
                self.eval_unary()
            }
            TokenKind::Punct(Punct::Minus) => {
                self.bump();
                let v = self.eval_unary()?;
                if matches!(self.types.kind(self.types.resolve(v.ty)), TypeKind::Float | TypeKind::Double) {
                    Ok(Value::rvalue(v.ty, Data::Float(-self.rvalue_float(&v))))
                } else {
                    Ok(Value::rvalue(self.types.int, Data::Int(-self.rvalue_int(&v))))
                }
            }
            TokenKind::Punct(Punct::Not) => {
                self.bump();
                let v = self.eval_unary()?;
                let truthy = self.rvalue_is_truthy(&v);
                Ok(Value::rvalue(self.types.int, Data::Int(!truthy as i64)))
            }
            TokenKind::Punct(Punct::Tilde) => {
                self.bump();
                let v = self.eval_unary()?;
                Ok(Value::rvalue(self.types.int, Data::Int(!self.rvalue_int(&v))))
            }
            TokenKind::Punct(Punct::Star) => {
                self.bump();
                let v = self.eval_unary()?;
                self.deref(&v)
            }
            TokenKind::Punct(Punct::Amp) => {
                self.bump();
                let v = self.eval_unary()?;
                let addr = v
                    .lvalue
                    .ok_or_else(|| self.rt_err("cannot take address of a non-lvalue"))?;
                let ptr_ty = self.types.pointer_to(v.ty);
                Ok(Value::rvalue(ptr_ty, Data::Ptr(Some(addr))))
            }
            TokenKind::Punct(Punct::PlusPlus) | TokenKind::Punct(Punct::MinusMinus) => {
                let inc = *self.peek() == TokenKind::Punct(Punct::PlusPlus);
                self.bump();
                let v = self.eval_unary()?;
                self.step(&v, inc, true)
            }
            TokenKind::Keyword(crate::token::Keyword::Sizeof) => {
                self.bump();
                self.eval_sizeof()
            }
            TokenKind::Punct(Punct::LParen) if self.peek_is_cast() => self.eval_cast(),
            _ => self.eval_postfix(),
        }
    }

    fn peek_is_cast(&mut self) -> bool {
        let save = self.snapshot();
        self.bump(); // '('
        let is_type = self.try_parse_type_specifier_probe();
        self.restore(save);
        is_type
    }

    fn try_parse_type_specifier_probe(&mut self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Keyword(
                crate::token::Keyword::Void
                    | crate::token::Keyword::Char
                    | crate::token::Keyword::Short
                    | crate::token::Keyword::Int
                    | crate::token::Keyword::Long
                    | crate::token::Keyword::Signed
                    | crate::token::Keyword::Unsigned
                    | crate::token::Keyword::Float
                    | crate::token::Keyword::Double
                    | crate::token::Keyword::Struct
                    | crate::token::Keyword::Union
                    | crate::token::Keyword::Enum
            )
        ) || matches!(self.peek(), TokenKind::Ident(sym) if self.typedefs.contains_key(sym))
    }

    fn eval_cast(&mut self) -> RuntimeResult<Value> {
        self.bump(); // '('
        let Some((base, _)) = self
            .try_parse_type_specifier()
            .map_err(|e| self.rt_err(e.message))?
        else {
            return Err(self.rt_err("expected type in cast"));
        };
        let mut ty = base;
        while *self.peek() == TokenKind::Punct(Punct::Star) {
            self.bump();
            ty = self.types.pointer_to(ty);
        }
        if *self.peek() != TokenKind::Punct(Punct::RParen) {
            return Err(self.rt_err("expected ')' after cast type"));
        }
        self.bump();
        let v = self.eval_unary()?;
        let data = coerce_for_store(&self.types, ty, &v);
        Ok(Value::rvalue(ty, data))
    }

    fn eval_sizeof(&mut self) -> RuntimeResult<Value> {
        let size = if *self.peek() == TokenKind::Punct(Punct::LParen) && self.peek_is_cast() {
            self.bump(); // '('
            let Some((base, _)) = self
                .try_parse_type_specifier()
                .map_err(|e| self.rt_err(e.message))?
            else {
                return Err(self.rt_err("expected type in sizeof"));
            };
            let mut ty = base;
            while *self.peek() == TokenKind::Punct(Punct::Star) {
                self.bump();
                ty = self.types.pointer_to(ty);
            }
            if *self.peek() != TokenKind::Punct(Punct::RParen) {
                return Err(self.rt_err("expected ')' after sizeof type"));
            }
            self.bump();
            self.types.sizeof(ty)
        } else {
            let saved_mode = std::mem::replace(&mut self.mode, Mode::Skip);
            let v = self.eval_unary();
            self.mode = saved_mode;
            self.types.sizeof(v?.ty)
        };
        Ok(Value::rvalue(self.types.long, Data::Int(size as i64)))
    }

    fn eval_postfix(&mut self) -> RuntimeResult<Value> {
        let mut v = self.eval_primary()?;
        loop {
            match self.peek().clone() {
                TokenKind::Punct(Punct::LBracket) => {
                    self.bump();
                    let idx = self.eval_expr()?;
                    if *self.peek() != TokenKind::Punct(Punct::RBracket) {
                        return Err(self.rt_err("expected ']'"));
                    }
                    self.bump();
                    v = self.subscript(&v, &idx)?;
                }
                TokenKind::Punct(Punct::Dot) => {
                    self.bump();
                    let field = self.expect_ident_rt()?;
                    v = self.member(&v, field)?;
                }
                TokenKind::Punct(Punct::Arrow) => {
                    self.bump();
                    let field = self.expect_ident_rt()?;
                    let deref = self.deref(&v)?;
                    v = self.member(&deref, field)?;
                }
                TokenKind::Punct(Punct::LParen) => {
                    self.bump();
                    v = self.eval_call(v)?;
                }
                TokenKind::Punct(Punct::PlusPlus) | TokenKind::Punct(Punct::MinusMinus) => {
                    let inc = *self.peek() == TokenKind::Punct(Punct::PlusPlus);
                    self.bump();
                    v = self.step(&v, inc, false)?;
                }
                _ => break,
            }
        }
        Ok(v)
    }

    /// Reads the value stored at `addr` as an object of type `ty`, decaying
    /// an array to a pointer at its own address rather than decoding its
    /// byte block as one (spec §4.2: an array used as a value is "the
    /// address of its first element").
    fn load(&mut self, addr: Addr, ty: TypeId) -> Data {
        if matches!(self.types.kind(self.types.resolve(ty)), TypeKind::Array { .. }) {
            Data::Ptr(Some(addr))
        } else {
            self.arena.read(addr, &self.types, ty)
        }
    }

    fn expect_ident_rt(&mut self) -> RuntimeResult<crate::string_table::Sym> {
        match self.bump() {
            TokenKind::Ident(s) => Ok(s),
            other => Err(self.rt_err(format!("expected field name, found {other:?}"))),
        }
    }

    fn subscript(&mut self, arr: &Value, idx: &Value) -> RuntimeResult<Value> {
        let elem = self
            .types
            .pointee(arr.ty)
            .ok_or_else(|| self.rt_err("subscript of non-array/pointer value"))?;
        let i = self.rvalue_int(idx);
        let elem_size = self.types.sizeof(elem) as u32;
        let addr = match &arr.data {
            Data::Ptr(Some(base)) => base.with_offset((i as i64 * elem_size as i64) as u32),
            Data::Bytes(_) => arr
                .lvalue
                .ok_or_else(|| self.rt_err("array value has no address"))?
                .with_offset((i as i64 * elem_size as i64) as u32),
            _ => return Err(self.rt_err("subscript of non-array/pointer value")),
        };
        let data = self.load(addr, elem);
        Ok(Value::lvalue(elem, data, addr))
    }

    fn member(&mut self, container: &Value, field: crate::string_table::Sym) -> RuntimeResult<Value> {
        let addr = container
            .lvalue
            .ok_or_else(|| self.rt_err("member access requires an lvalue struct"))?;
        let f = self
            .types
            .field(container.ty, field)
            .cloned()
            .ok_or_else(|| self.rt_err("no such field"))?;
        let faddr = addr.with_offset(f.offset as u32);
        let data = self.load(faddr, f.ty);
        Ok(Value::lvalue(f.ty, data, faddr))
    }

    fn deref(&mut self, v: &Value) -> RuntimeResult<Value> {
        let target = self
            .types
            .pointee(v.ty)
            .ok_or_else(|| self.rt_err("dereference requires a pointer type"))?;
        let addr = v
            .data
            .as_ptr()
            .flatten()
            .ok_or_else(|| self.rt_err("null pointer dereference"))?;
        let data = self.load(addr, target);
        Ok(Value::lvalue(target, data, addr))
    }

    fn step(&mut self, v: &Value, inc: bool, pre: bool) -> RuntimeResult<Value> {
        let addr = v
            .lvalue
            .ok_or_else(|| self.rt_err("increment/decrement target is not an lvalue"))?;
        let old = v.data.clone();
        let new = if self.types.is_pointer(v.ty) {
            let elem = self.types.pointee(v.ty).unwrap();
            let size = self.types.sizeof(elem) as i64;
            let base = v.data.as_ptr().flatten();
            let delta = if inc { size } else { -size };
            Data::Ptr(base.map(|a| Addr {
                slot: a.slot,
                offset: (a.offset as i64 + delta) as u32,
            }))
        } else if matches!(self.types.kind(self.types.resolve(v.ty)), TypeKind::Float | TypeKind::Double) {
            let f = self.rvalue_float(v);
            Data::Float(if inc { f + 1.0 } else { f - 1.0 })
        } else {
            let i = self.rvalue_int(v);
            Data::Int(if inc { i + 1 } else { i - 1 })
        };
        if !self.skip_guard() {
            self.arena.write(addr, &self.types, v.ty, new.clone());
        }
        Ok(Value::lvalue(v.ty, if pre { new } else { old }, addr))
    }

    fn eval_primary(&mut self) -> RuntimeResult<Value> {
        match self.bump() {
            TokenKind::Int { value, .. } => Ok(Value::rvalue(self.types.int, Data::Int(value))),
            TokenKind::Float(f) => Ok(Value::rvalue(self.types.double, Data::Float(f))),
            TokenKind::Char(c) => Ok(Value::rvalue(self.types.char_, Data::Int(c))),
            TokenKind::Str(sym) => Ok(Value::rvalue(self.types.pointer_to(self.types.char_), Data::Str(sym))),
            TokenKind::Ident(sym) => self.eval_ident(sym),
            TokenKind::Punct(Punct::LParen) => {
                let v = self.eval_expr()?;
                if *self.peek() != TokenKind::Punct(Punct::RParen) {
                    return Err(self.rt_err("expected ')'"));
                }
                self.bump();
                Ok(v)
            }
            other => Err(self.rt_err(format!("unexpected token {other:?} in expression"))),
        }
    }

    fn eval_ident(&mut self, sym: crate::string_table::Sym) -> RuntimeResult<Value> {
        if let Some(binding) = self.scopes.lookup(sym) {
            let data = self.load(binding.addr, binding.ty);
            return Ok(Value::lvalue(binding.ty, data, binding.addr));
        }
        if self.functions.contains_key(&sym) || self.macros.contains_key(&sym) {
            return Ok(Value::rvalue(self.types.int, Data::Func(sym)));
        }
        Err(self.rt_err(format!("use of undeclared identifier '{}'", self.strings.resolve(sym))))
    }

    fn eval_call(&mut self, callee: Value) -> RuntimeResult<Value> {
        let name = match callee.data {
            Data::Func(sym) => sym,
            _ => return Err(self.rt_err("called object is not a function")),
        };

        if let Some(macro_def) = self.macros.get(&name).cloned() {
            return self.expand_macro_call(&macro_def);
        }

        let mut args = Vec::new();
        if *self.peek() != TokenKind::Punct(Punct::RParen) {
            loop {
                args.push(self.eval_assignment()?);
                if *self.peek() == TokenKind::Punct(Punct::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        if *self.peek() != TokenKind::Punct(Punct::RParen) {
            return Err(self.rt_err("expected ')' after call arguments"));
        }
        self.bump();

        let Some(def) = self.functions.get(&name).cloned() else {
            return Err(self.rt_err(format!("call to undeclared function '{}'", self.strings.resolve(name))));
        };
        if !def.variadic && args.len() != def.params.len() {
            return Err(self.rt_err(format!(
                "wrong number of arguments to '{}': expected {}, got {}",
                self.strings.resolve(name),
                def.params.len(),
                args.len()
            )));
        }
        if self.skip_guard() {
            return Ok(Value::rvalue(def.ret, default_data(&self.types, def.ret)));
        }
        self.call_function(name, &def, &args).map_err(Into::into)
    }

    /// Substitutes a macro's body textually by re-entering the parser with
    /// parameter bindings shadowing the caller's scope (spec §3 "Macro
    /// descriptor", §4.3 "Function call").
    fn expand_macro_call(&mut self, macro_def: &super::MacroDef) -> RuntimeResult<Value> {
        let mut args = Vec::new();
        if *self.peek() != TokenKind::Punct(Punct::RParen) {
            loop {
                args.push(self.eval_assignment()?);
                if *self.peek() == TokenKind::Punct(Punct::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        if *self.peek() != TokenKind::Punct(Punct::RParen) {
            return Err(self.rt_err("expected ')' after macro arguments"));
        }
        self.bump();
        if args.len() != macro_def.params.len() {
            return Err(self.rt_err("macro argument count mismatch"));
        }

        self.scopes.push_scope();
        for (&pname, arg) in macro_def.params.iter().zip(args.iter()) {
            let addr = self.arena.alloc(arg.data.clone());
            self.scopes.declare_local(pname, addr, arg.ty);
        }

        let saved_pos = self.pos;
        self.pos = macro_def.body.0;
        let result = self.eval_expr();
        self.pos = saved_pos;
        self.scopes.pop_scope();
        result
    }

    pub(super) fn skip_guard(&self) -> bool {
        self.mode == Mode::Skip
    }

    fn eval_in_skip<T>(&mut self, f: impl FnOnce(&mut Self) -> RuntimeResult<T>) -> RuntimeResult<T> {
        let saved = std::mem::replace(&mut self.mode, Mode::Skip);
        let result = f(self);
        self.mode = saved;
        result
    }

    pub(super) fn rvalue_is_truthy(&mut self, v: &Value) -> bool {
        !v.data.is_zero()
    }

    fn rvalue_int(&mut self, v: &Value) -> i64 {
        match &v.data {
            Data::Int(i) => *i,
            Data::Float(f) => *f as i64,
            Data::Ptr(Some(a)) => ((a.slot as i64) << 32) | a.offset as i64,
            Data::Ptr(None) => 0,
            _ => 0,
        }
    }

    fn rvalue_float(&mut self, v: &Value) -> f64 {
        match &v.data {
            Data::Float(f) => *f,
            Data::Int(i) => *i as f64,
            _ => 0.0,
        }
    }
}

fn bool_val(engine: &Engine, cond: bool) -> Value {
    Value::rvalue(engine.types.int, Data::Int(cond as i64))
}

/// Thin wrapper so `RuntimeError` can be produced from either a
/// `ParseError` context (casts, sizeof reuse declarator parsing) or a
/// direct runtime failure.
impl From<RuntimeError> for crate::error::ParseError {
    fn from(e: RuntimeError) -> Self {
        crate::error::ParseError::new(e.pos, e.message)
    }
}
