//! String interning table (spec §3 "String Table"). Every identifier and
//! short literal the lexer sees is entered here exactly once, so that name
//! equality throughout the rest of the engine degrades to comparing two
//! `u32`s instead of hashing or comparing byte strings.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// An interned string reference. Two `Sym`s are equal iff the strings they
/// name are equal — this is the "interned-name equality <=> pointer
/// equality" invariant from spec §3.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sym(u32);

#[derive(Default)]
pub struct StringTable {
    strings: Vec<Rc<str>>,
    lookup: HashMap<Rc<str>, Sym>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Sym {
        if let Some(sym) = self.lookup.get(s) {
            return *sym;
        }
        let rc: Rc<str> = Rc::from(s);
        let sym = Sym(self.strings.len() as u32);
        self.strings.push(rc.clone());
        self.lookup.insert(rc, sym);
        sym
    }

    pub fn resolve(&self, sym: Sym) -> &str {
        &self.strings[sym.0 as usize]
    }
}

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sym({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut table = StringTable::new();
        let a = table.intern("foo");
        let b = table.intern("foo");
        let c = table.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn resolve_round_trips() {
        let mut table = StringTable::new();
        let sym = table.intern("hello");
        assert_eq!(table.resolve(sym), "hello");
    }
}
