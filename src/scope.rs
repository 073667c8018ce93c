//! Value Arena & Scopes — symbol-table half (spec §3 "Symbol table",
//! "Stack frame", §4.5). Grounded on the teacher's `typechecker::Scope`
//! (a `Vec<HashMap<name, T>>` with push/pop-scope), generalized from a
//! single global stack of scopes to one stack of scopes *per call frame*
//! plus a process-wide table for statically-qualified locals.

use std::collections::HashMap;

use crate::string_table::Sym;
use crate::types::TypeId;
use crate::value::Addr;

#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub addr: Addr,
    pub ty: TypeId,
    pub scope_id: u32,
}

struct ScopeLevel {
    id: u32,
    table: HashMap<Sym, Binding>,
}

/// One call frame: a stack of nested lexical scopes that all share the
/// frame's allocations (spec §4.5: "each call allocates a frame; each
/// `{...}` block opens a nested scope that shares the frame").
pub struct Frame {
    levels: Vec<ScopeLevel>,
    pub return_slot: Option<Addr>,
    pub return_ty: Option<TypeId>,
}

impl Frame {
    fn new(scope_id: u32) -> Self {
        Self {
            levels: vec![ScopeLevel {
                id: scope_id,
                table: HashMap::new(),
            }],
            return_slot: None,
            return_ty: None,
        }
    }
}

/// Key for a statically-qualified local: the enclosing function and the
/// variable's own name (spec §4.5: "allocated in a separate global area
/// and survive scope exit").
type StaticKey = (Sym, Sym);

pub struct Scopes {
    frames: Vec<Frame>,
    globals: HashMap<Sym, Binding>,
    statics: HashMap<StaticKey, (Binding, bool)>,
    next_scope_id: u32,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(0)],
            globals: HashMap::new(),
            statics: HashMap::new(),
            next_scope_id: 1,
        }
    }

    fn fresh_scope_id(&mut self) -> u32 {
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        id
    }

    pub fn push_frame(&mut self) -> u32 {
        let id = self.fresh_scope_id();
        self.frames.push(Frame::new(id));
        id
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn current_frame(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("at least the global frame")
    }

    /// Opens a nested `{...}` scope in the current frame. Returns the new
    /// scope's monotonic id, used by the type table to key aggregate
    /// declarations and by `pop_scope` to identify what to discard.
    pub fn push_scope(&mut self) -> u32 {
        let id = self.fresh_scope_id();
        self.current_frame().levels.push(ScopeLevel {
            id,
            table: HashMap::new(),
        });
        id
    }

    /// Ends the innermost scope. Per spec §4.5 ("discards any symbols
    /// tagged with IDs >= its ID") this just pops the top level, since
    /// scope ids are assigned in strict push order.
    pub fn pop_scope(&mut self) {
        let frame = self.current_frame();
        if frame.levels.len() > 1 {
            frame.levels.pop();
        }
    }

    pub fn declare_local(&mut self, name: Sym, addr: Addr, ty: TypeId) {
        let frame = self.current_frame();
        let scope_id = frame.levels.last().unwrap().id;
        frame
            .levels
            .last_mut()
            .unwrap()
            .table
            .insert(name, Binding { addr, ty, scope_id });
    }

    pub fn declare_global(&mut self, name: Sym, addr: Addr, ty: TypeId) {
        self.globals.insert(
            name,
            Binding {
                addr,
                ty,
                scope_id: 0,
            },
        );
    }

    /// Looks up a `static` local's storage, keyed by the enclosing
    /// function so that re-entering the function finds the same slot.
    /// Returns `(binding, first_visit)`; `first_visit` is true exactly
    /// once, so the caller runs the initializer only the first time
    /// (spec §4.5: "first-visit is signaled to the initializer").
    /// Non-mutating lookup: returns the existing static binding and
    /// whether it has already been visited, without creating one.
    pub fn peek_static(&self, func: Sym, name: Sym) -> Option<(Binding, bool)> {
        self.statics.get(&(func, name)).map(|(b, seen)| (*b, *seen))
    }

    pub fn static_slot(&mut self, func: Sym, name: Sym, make: impl FnOnce() -> Binding) -> (Binding, bool) {
        if let Some((binding, seen)) = self.statics.get_mut(&(func, name)) {
            let first = !*seen;
            *seen = true;
            return (*binding, first);
        }
        let binding = make();
        self.statics.insert((func, name), (binding, true));
        (binding, true)
    }

    /// Walks inner -> outer within the current frame, then falls back to
    /// globals (spec §3 "Symbol table": "lookup walks inner -> outer").
    pub fn lookup(&self, name: Sym) -> Option<Binding> {
        let frame = self.frames.last().expect("at least the global frame");
        for level in frame.levels.iter().rev() {
            if let Some(b) = level.table.get(&name) {
                return Some(*b);
            }
        }
        self.globals.get(&name).copied()
    }

    pub fn lookup_global(&self, name: Sym) -> Option<Binding> {
        self.globals.get(&name).copied()
    }

    pub fn remove_global(&mut self, name: Sym) -> bool {
        self.globals.remove(&name).is_some()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Addr;

    fn sym(n: u32) -> Sym {
        // Sym has no public constructor outside string_table; tests here
        // only care about distinctness, so intern through a real table.
        let mut table = crate::string_table::StringTable::new();
        table.intern(&format!("s{n}"))
    }

    #[test]
    fn nested_scopes_shadow_and_unwind() {
        let mut scopes = Scopes::new();
        let x = sym(1);
        let ty = TypeId::default_for_test();
        scopes.declare_local(x, Addr::whole(0), ty);
        scopes.push_scope();
        scopes.declare_local(x, Addr::whole(1), ty);
        assert_eq!(scopes.lookup(x).unwrap().addr, Addr::whole(1));
        scopes.pop_scope();
        assert_eq!(scopes.lookup(x).unwrap().addr, Addr::whole(0));
    }

    #[test]
    fn frames_do_not_see_each_others_locals() {
        let mut scopes = Scopes::new();
        let x = sym(2);
        let ty = TypeId::default_for_test();
        scopes.declare_local(x, Addr::whole(0), ty);
        scopes.push_frame();
        assert!(scopes.lookup(x).is_none());
        scopes.pop_frame();
        assert!(scopes.lookup(x).is_some());
    }

    #[test]
    fn static_local_first_visit_fires_once() {
        let mut scopes = Scopes::new();
        let f = sym(3);
        let name = sym(4);
        let ty = TypeId::default_for_test();
        let (_, first1) = scopes.static_slot(f, name, || Binding {
            addr: Addr::whole(0),
            ty,
            scope_id: 0,
        });
        let (_, first2) = scopes.static_slot(f, name, || Binding {
            addr: Addr::whole(0),
            ty,
            scope_id: 0,
        });
        assert!(first1);
        assert!(!first2);
    }
}
