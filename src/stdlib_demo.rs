//! Demonstration headers wired into the Host Bridge (spec §4.7). This is
//! not a libc: just enough of `stdio.h` and `string.h` to drive the
//! fixtures and integration tests, following the same
//! `(setup, function table, source)` shape a real embedding would use for
//! its own headers.

use std::rc::Rc;

use crate::engine::Engine;
use crate::error::RuntimeResult;
use crate::host::{HeaderStub, HostBridge, NativeFn};
use crate::value::{Data, Value};

fn c_string_from(engine: &Engine, v: &Value) -> String {
    match &v.data {
        Data::Str(sym) => engine.strings.resolve(*sym).to_string(),
        Data::Ptr(Some(addr)) => {
            let bytes = engine.arena.bytes_at(*addr);
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
        _ => String::new(),
    }
}

/// A minimal `printf`: `%d`/`%i`, `%s`, `%c`, `%f`, `%%`. Width/precision
/// modifiers are consumed but ignored.
fn printf_thunk(engine: &mut Engine, args: &[Value]) -> RuntimeResult<Value> {
    let Some(fmt_arg) = args.first() else {
        return Ok(Value::rvalue(engine.types.int, Data::Int(0)));
    };
    let fmt = c_string_from(engine, fmt_arg);
    let mut out = String::new();
    let mut arg_i = 1;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut conv = None;
        while let Some(&n) = chars.peek() {
            chars.next();
            if n.is_alphabetic() || n == '%' {
                conv = Some(n);
                break;
            }
        }
        match conv {
            Some('d') | Some('i') => {
                let v = args.get(arg_i).and_then(|v| v.data.as_int()).unwrap_or(0);
                arg_i += 1;
                out.push_str(&v.to_string());
            }
            Some('s') => {
                let s = args.get(arg_i).map(|v| c_string_from(engine, v)).unwrap_or_default();
                arg_i += 1;
                out.push_str(&s);
            }
            Some('c') => {
                let v = args.get(arg_i).and_then(|v| v.data.as_int()).unwrap_or(0);
                arg_i += 1;
                out.push(v as u8 as char);
            }
            Some('f') => {
                let v = args
                    .get(arg_i)
                    .and_then(|v| v.data.as_float().or_else(|| v.data.as_int().map(|i| i as f64)))
                    .unwrap_or(0.0);
                arg_i += 1;
                out.push_str(&format!("{v:.6}"));
            }
            Some('%') => out.push('%'),
            _ => {}
        }
    }
    print!("{out}");
    Ok(Value::rvalue(engine.types.int, Data::Int(out.len() as i64)))
}

fn putchar_thunk(engine: &mut Engine, args: &[Value]) -> RuntimeResult<Value> {
    let c = args.first().and_then(|v| v.data.as_int()).unwrap_or(0);
    print!("{}", c as u8 as char);
    Ok(Value::rvalue(engine.types.int, Data::Int(c)))
}

fn strlen_thunk(engine: &mut Engine, args: &[Value]) -> RuntimeResult<Value> {
    let s = args.first().map(|v| c_string_from(engine, v)).unwrap_or_default();
    Ok(Value::rvalue(engine.types.long, Data::Int(s.len() as i64)))
}

fn strcmp_thunk(engine: &mut Engine, args: &[Value]) -> RuntimeResult<Value> {
    let a = args.first().map(|v| c_string_from(engine, v)).unwrap_or_default();
    let b = args.get(1).map(|v| c_string_from(engine, v)).unwrap_or_default();
    let ord = match a.cmp(&b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    };
    Ok(Value::rvalue(engine.types.int, Data::Int(ord)))
}

fn no_setup() -> Rc<dyn Fn(&mut Engine)> {
    Rc::new(|_: &mut Engine| {})
}

/// Registers the demonstration `stdio.h`/`string.h` headers. Called by
/// `Interpreter::include_all_system_headers` and available directly to
/// hosts that want only a subset (spec §6 `register_include`).
pub fn register_stdlib_demo(host: &mut HostBridge) {
    host.register_header(
        "stdio.h",
        HeaderStub {
            setup: no_setup(),
            functions: vec![
                (
                    "printf".to_string(),
                    NativeFn {
                        prototype: "int printf(const char *fmt, ...)".to_string(),
                        thunk: Rc::new(printf_thunk),
                    },
                ),
                (
                    "putchar".to_string(),
                    NativeFn {
                        prototype: "int putchar(int c)".to_string(),
                        thunk: Rc::new(putchar_thunk),
                    },
                ),
            ],
            source: String::new(),
        },
    );
    host.register_header(
        "string.h",
        HeaderStub {
            setup: no_setup(),
            functions: vec![
                (
                    "strlen".to_string(),
                    NativeFn {
                        prototype: "long strlen(const char *s)".to_string(),
                        thunk: Rc::new(strlen_thunk),
                    },
                ),
                (
                    "strcmp".to_string(),
                    NativeFn {
                        prototype: "int strcmp(const char *a, const char *b)".to_string(),
                        thunk: Rc::new(strcmp_thunk),
                    },
                ),
            ],
            source: String::new(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn printf_percent_d_and_s_interpolate_arguments() {
        let mut engine = Engine::new("<test>", 8);
        let fmt = engine.strings.intern("x=%d y=%s\n");
        let name = engine.strings.intern("world");
        let args = vec![
            Value::rvalue(engine.types.pointer_to(engine.types.char_), Data::Str(fmt)),
            Value::rvalue(engine.types.int, Data::Int(42)),
            Value::rvalue(engine.types.pointer_to(engine.types.char_), Data::Str(name)),
        ];
        let result = printf_thunk(&mut engine, &args).unwrap();
        assert_eq!(result.data.as_int(), Some(13));
    }

    #[test]
    fn strlen_counts_bytes_before_terminator() {
        let mut engine = Engine::new("<test>", 8);
        let s = engine.strings.intern("hello");
        let args = vec![Value::rvalue(engine.types.pointer_to(engine.types.char_), Data::Str(s))];
        let result = strlen_thunk(&mut engine, &args).unwrap();
        assert_eq!(result.data.as_int(), Some(5));
    }
}
