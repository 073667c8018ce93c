//! Type System (spec §4.2). Interns primitive types once at startup,
//! builds compound types (pointer/array/struct/union/enum/function/typedef)
//! on demand, and computes `sizeof`/alignment for every type it hands out.

use std::collections::HashMap;

use crate::string_table::Sym;

/// Handle into a [`TypeTable`]. Two non-aggregate types that are
/// structurally equal always resolve to the same `TypeId` (spec §3 "Type":
/// "interned ... compare equal by identity").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

#[cfg(test)]
impl TypeId {
    /// Placeholder id for tests that only care about distinctness of
    /// bindings, not actual type layout.
    pub fn default_for_test() -> Self {
        TypeId(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    Char,
    Short,
    Int,
    Long,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: Sym,
    pub ty: TypeId,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    Int {
        width: IntWidth,
        unsigned: bool,
    },
    Float,
    Double,
    Pointer(TypeId),
    /// `len == None` means "size determined by initializer" (spec §3
    /// "Type": "N may be zero meaning size determined by initializer").
    Array {
        elem: TypeId,
        len: Option<usize>,
    },
    Struct {
        name: Sym,
        fields: Vec<StructField>,
        size: usize,
        align: usize,
    },
    Union {
        name: Sym,
        fields: Vec<StructField>,
        size: usize,
        align: usize,
    },
    /// A host-registered struct whose fields are inaccessible to
    /// interpreted code; only its name and size are known (spec §4.2
    /// "Opaque struct").
    Opaque {
        name: Sym,
        size: usize,
        align: usize,
    },
    Enum {
        name: Sym,
    },
    Function {
        ret: TypeId,
        params: Vec<TypeId>,
        variadic: bool,
    },
    Typedef {
        name: Sym,
        target: TypeId,
    },
}

pub struct TypeTable {
    kinds: Vec<TypeKind>,
    /// Interning map for non-aggregate types, keyed by a structural
    /// fingerprint so two identical `int*` requests share one `TypeId`.
    interned: HashMap<TypeKind, TypeId>,
    /// Aggregate (struct/union) interning is by name within the scope that
    /// declared them (spec §3 "Type": "interned by name within their
    /// declaring scope"). `scope_id` is supplied by the caller (the Value
    /// Arena & Scopes component owns scope identity).
    aggregates: HashMap<(u32, Sym), TypeId>,
    pointer_width: usize,
    pub void: TypeId,
    pub int: TypeId,
    pub char_: TypeId,
    pub uchar: TypeId,
    pub short: TypeId,
    pub long: TypeId,
    pub float: TypeId,
    pub double: TypeId,
}

impl std::hash::Hash for TypeKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Only non-aggregate kinds are hashed for interning; aggregates go
        // through `aggregates` instead, so a coarse discriminant hash plus
        // the few scalar fields that distinguish interned kinds suffices.
        std::mem::discriminant(self).hash(state);
        match self {
            TypeKind::Int { width, unsigned } => {
                width.hash(state);
                unsigned.hash(state);
            }
            TypeKind::Pointer(inner) => inner.hash(state),
            TypeKind::Array { elem, len } => {
                elem.hash(state);
                len.hash(state);
            }
            TypeKind::Function {
                ret,
                params,
                variadic,
            } => {
                ret.hash(state);
                params.hash(state);
                variadic.hash(state);
            }
            _ => {}
        }
    }
}

impl TypeTable {
    /// `pointer_width` is `sizeof(void*)` on the embedding host (spec §4.2
    /// "Pointer types share storage width ... of the host").
    pub fn new(pointer_width: usize) -> Self {
        let mut table = Self {
            kinds: Vec::new(),
            interned: HashMap::new(),
            aggregates: HashMap::new(),
            pointer_width,
            void: TypeId(0),
            int: TypeId(0),
            char_: TypeId(0),
            uchar: TypeId(0),
            short: TypeId(0),
            long: TypeId(0),
            float: TypeId(0),
            double: TypeId(0),
        };
        table.void = table.intern_scalar(TypeKind::Void);
        table.int = table.intern_scalar(TypeKind::Int {
            width: IntWidth::Int,
            unsigned: false,
        });
        table.char_ = table.intern_scalar(TypeKind::Int {
            width: IntWidth::Char,
            unsigned: false,
        });
        table.uchar = table.intern_scalar(TypeKind::Int {
            width: IntWidth::Char,
            unsigned: true,
        });
        table.short = table.intern_scalar(TypeKind::Int {
            width: IntWidth::Short,
            unsigned: false,
        });
        table.long = table.intern_scalar(TypeKind::Int {
            width: IntWidth::Long,
            unsigned: false,
        });
        table.float = table.intern_scalar(TypeKind::Float);
        table.double = table.intern_scalar(TypeKind::Double);
        table
    }

    fn push(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        id
    }

    fn intern_scalar(&mut self, kind: TypeKind) -> TypeId {
        if let Some(id) = self.interned.get(&kind) {
            return *id;
        }
        let id = self.push(kind.clone());
        self.interned.insert(kind, id);
        id
    }

    pub fn pointer_to(&mut self, target: TypeId) -> TypeId {
        self.intern_scalar(TypeKind::Pointer(target))
    }

    pub fn array_of(&mut self, elem: TypeId, len: Option<usize>) -> TypeId {
        self.intern_scalar(TypeKind::Array { elem, len })
    }

    pub fn function_of(&mut self, ret: TypeId, params: Vec<TypeId>, variadic: bool) -> TypeId {
        self.intern_scalar(TypeKind::Function {
            ret,
            params,
            variadic,
        })
    }

    pub fn typedef(&mut self, name: Sym, target: TypeId) -> TypeId {
        self.push(TypeKind::Typedef { name, target })
    }

    pub fn enum_type(&mut self, name: Sym) -> TypeId {
        self.push(TypeKind::Enum { name })
    }

    /// Declares a struct or union type in `scope_id`. Fields are laid out
    /// in declaration order; each field sits at its own alignment; the
    /// aggregate's own alignment is the max of its fields' and its size is
    /// padded up to a multiple of that alignment (spec §4.2). Unions
    /// overlap every field at offset 0, sized to `max(sizeof)` padded to
    /// `max(alignof)`.
    pub fn declare_aggregate(
        &mut self,
        scope_id: u32,
        name: Sym,
        is_union: bool,
        field_types: &[(Sym, TypeId)],
    ) -> TypeId {
        if let Some(id) = self.aggregates.get(&(scope_id, name)) {
            return *id;
        }
        let mut fields = Vec::with_capacity(field_types.len());
        let mut offset = 0usize;
        let mut max_align = 1usize;
        for &(fname, fty) in field_types {
            let falign = self.alignof(fty);
            max_align = max_align.max(falign);
            if is_union {
                fields.push(StructField {
                    name: fname,
                    ty: fty,
                    offset: 0,
                });
            } else {
                offset = align_up(offset, falign);
                fields.push(StructField {
                    name: fname,
                    ty: fty,
                    offset,
                });
                offset += self.sizeof(fty);
            }
        }
        let size = if is_union {
            field_types
                .iter()
                .map(|&(_, t)| self.sizeof(t))
                .max()
                .unwrap_or(0)
        } else {
            offset
        };
        let size = align_up(size.max(1), max_align);
        let kind = if is_union {
            TypeKind::Union {
                name,
                fields,
                size,
                align: max_align,
            }
        } else {
            TypeKind::Struct {
                name,
                fields,
                size,
                align: max_align,
            }
        };
        let id = self.push(kind);
        self.aggregates.insert((scope_id, name), id);
        id
    }

    /// Registers a host type whose layout is known but whose fields are
    /// not interpretable (spec §4.2 "Opaque struct").
    pub fn declare_opaque(&mut self, scope_id: u32, name: Sym, size: usize, align: usize) -> TypeId {
        if let Some(id) = self.aggregates.get(&(scope_id, name)) {
            return *id;
        }
        let id = self.push(TypeKind::Opaque { name, size, align });
        self.aggregates.insert((scope_id, name), id);
        id
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0 as usize]
    }

    /// Follows `Typedef` indirections down to the underlying type.
    pub fn resolve(&self, id: TypeId) -> TypeId {
        match self.kind(id) {
            TypeKind::Typedef { target, .. } => self.resolve(*target),
            _ => id,
        }
    }

    pub fn sizeof(&self, id: TypeId) -> usize {
        match self.kind(self.resolve(id)) {
            TypeKind::Void => 1,
            TypeKind::Int { width, .. } => match width {
                IntWidth::Char => 1,
                IntWidth::Short => 2,
                IntWidth::Int => 4,
                IntWidth::Long => 8,
            },
            TypeKind::Float => 4,
            TypeKind::Double => 8,
            TypeKind::Pointer(_) => self.pointer_width,
            TypeKind::Array { elem, len } => self.sizeof(*elem) * len.unwrap_or(0),
            TypeKind::Struct { size, .. } | TypeKind::Union { size, .. } | TypeKind::Opaque { size, .. } => *size,
            TypeKind::Enum { .. } => 4,
            TypeKind::Function { .. } => self.pointer_width,
            TypeKind::Typedef { .. } => unreachable!("resolve() strips typedefs"),
        }
    }

    pub fn alignof(&self, id: TypeId) -> usize {
        match self.kind(self.resolve(id)) {
            TypeKind::Struct { align, .. } | TypeKind::Union { align, .. } | TypeKind::Opaque { align, .. } => *align,
            TypeKind::Array { elem, .. } => self.alignof(*elem),
            _ => self.sizeof(id).min(8).max(1),
        }
    }

    pub fn field(&self, id: TypeId, name: Sym) -> Option<&StructField> {
        match self.kind(self.resolve(id)) {
            TypeKind::Struct { fields, .. } | TypeKind::Union { fields, .. } => {
                fields.iter().find(|f| f.name == name)
            }
            _ => None,
        }
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(
            self.kind(self.resolve(id)),
            TypeKind::Int { .. } | TypeKind::Enum { .. }
        )
    }

    pub fn is_arithmetic(&self, id: TypeId) -> bool {
        self.is_integer(id) || matches!(self.kind(self.resolve(id)), TypeKind::Float | TypeKind::Double)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(self.resolve(id)), TypeKind::Pointer(_))
    }

    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(self.resolve(id)) {
            TypeKind::Pointer(t) => Some(*t),
            TypeKind::Array { elem, .. } => Some(*elem),
            _ => None,
        }
    }

    /// Integer promotion: any type narrower than `int` promotes to `int`
    /// (spec §4.3).
    pub fn promote(&self, id: TypeId) -> TypeId {
        match self.kind(self.resolve(id)) {
            TypeKind::Int { width, .. } if *width != IntWidth::Int && *width != IntWidth::Long => self.int,
            _ => id,
        }
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_sizes_match_declared_widths() {
        let t = TypeTable::new(8);
        assert_eq!(t.sizeof(t.char_), 1);
        assert_eq!(t.sizeof(t.short), 2);
        assert_eq!(t.sizeof(t.int), 4);
        assert_eq!(t.sizeof(t.long), 8);
        assert_eq!(t.sizeof(t.double), 8);
    }

    #[test]
    fn pointer_types_are_interned_by_identity() {
        let mut t = TypeTable::new(8);
        let p1 = t.pointer_to(t.int);
        let p2 = t.pointer_to(t.int);
        assert_eq!(p1, p2);
    }

    #[test]
    fn array_sizeof_is_elem_times_len() {
        let mut t = TypeTable::new(8);
        let arr = t.array_of(t.int, Some(5));
        assert_eq!(t.sizeof(arr), 5 * t.sizeof(t.int));
    }

    #[test]
    fn struct_fields_are_aligned_and_padded() {
        let mut t = TypeTable::new(8);
        let mut strings = crate::string_table::StringTable::new();
        let a = strings.intern("a");
        let b = strings.intern("b");
        let scope = 0;
        let name = strings.intern("S");
        // struct S { char a; long b; } -> a at 0, padding, b at 8, size 16
        let sid = t.declare_aggregate(scope, name, false, &[(a, t.char_), (b, t.long)]);
        let fa = t.field(sid, a).unwrap();
        let fb = t.field(sid, b).unwrap();
        assert_eq!(fa.offset, 0);
        assert_eq!(fb.offset, 8);
        assert_eq!(t.sizeof(sid), 16);
        assert_eq!(t.alignof(sid), 8);
    }

    #[test]
    fn union_fields_all_start_at_zero() {
        let mut t = TypeTable::new(8);
        let mut strings = crate::string_table::StringTable::new();
        let a = strings.intern("a");
        let b = strings.intern("b");
        let name = strings.intern("U");
        let uid = t.declare_aggregate(0, name, true, &[(a, t.char_), (b, t.long)]);
        assert_eq!(t.field(uid, a).unwrap().offset, 0);
        assert_eq!(t.field(uid, b).unwrap().offset, 0);
        assert_eq!(t.sizeof(uid), 8);
    }

    #[test]
    fn integer_promotion_widens_sub_int_types() {
        let t = TypeTable::new(8);
        assert_eq!(t.promote(t.char_), t.int);
        assert_eq!(t.promote(t.long), t.long);
    }
}
