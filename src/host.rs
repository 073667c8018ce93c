//! Host Bridge (spec §4.7). Registers native functions and platform
//! variables into the global scope, and holds the header-stub registry
//! consulted by `#include`.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, trace};

use crate::engine::Engine;
use crate::error::RuntimeResult;
use crate::string_table::Sym;
use crate::types::TypeId;
use crate::value::Value;

/// A native function thunk. Arguments have already been marshaled into
/// interpreter values following C conversion rules; the thunk returns the
/// call's result value (spec §4.7: "arguments are marshaled ... and the
/// native thunk is invoked").
pub type NativeThunk = Rc<dyn Fn(&mut Engine, &[Value]) -> RuntimeResult<Value>>;

#[derive(Clone)]
pub struct NativeFn {
    pub prototype: String,
    pub thunk: NativeThunk,
}

/// `(name, setup callback, function table, C-source snippet)` (spec §4.7
/// "Header stubs"). The setup callback runs before the snippet is parsed,
/// so it can register whatever native functions and platform variables
/// the snippet's declarations will bind to.
pub struct HeaderStub {
    pub setup: Rc<dyn Fn(&mut Engine)>,
    pub functions: Vec<(String, NativeFn)>,
    pub source: String,
}

#[derive(Clone, Copy)]
pub struct PlatformVar {
    pub ty: TypeId,
    pub writable: bool,
}

#[derive(Default)]
pub struct HostBridge {
    natives: HashMap<Sym, NativeFn>,
    platform_vars: HashMap<Sym, PlatformVar>,
    headers: HashMap<String, HeaderStub>,
    /// Names already `#include`d, guarding double inclusion (spec §4.7,
    /// SPEC_FULL §B.6: a sentinel variable per included header).
    included: HashMap<String, bool>,
}

impl HostBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_native(&mut self, name: Sym, native: NativeFn) {
        trace!("registering native function");
        self.natives.insert(name, native);
    }

    pub fn native(&self, name: Sym) -> Option<&NativeFn> {
        self.natives.get(&name)
    }

    pub fn register_platform_var(&mut self, name: Sym, ty: TypeId, writable: bool) {
        self.platform_vars.insert(name, PlatformVar { ty, writable });
    }

    pub fn platform_var(&self, name: Sym) -> Option<PlatformVar> {
        self.platform_vars.get(&name).copied()
    }

    pub fn register_header(&mut self, name: impl Into<String>, stub: HeaderStub) {
        self.headers.insert(name.into(), stub);
    }

    pub fn header(&self, name: &str) -> Option<&HeaderStub> {
        self.headers.get(name)
    }

    /// Marks `name` as included; returns `true` if it was already marked
    /// (so the caller can skip re-running setup, per the double-inclusion
    /// guard in SPEC_FULL §B.6).
    pub fn mark_included(&mut self, name: &str) -> bool {
        let already = self.included.contains_key(name);
        if !already {
            debug!("including header '{name}'");
            self.included.insert(name.to_string(), true);
        }
        already
    }

    pub fn header_names(&self) -> impl Iterator<Item = &String> {
        self.headers.keys()
    }
}
