//! Value Arena & Scopes — value half (spec §3 "Value", §4.5). Values live
//! on a strictly LIFO stack of slots; popping a frame discards every slot
//! allocated within it in one truncation. Struct fields and array elements
//! are *sub-object* lvalues: they never own storage, they address into
//! their parent slot's byte block (spec §3: "the latter never owns the
//! storage").

use crate::string_table::Sym;
use crate::types::{IntWidth, TypeId, TypeKind, TypeTable};

/// Address of a value-stack slot, optionally offset into that slot's byte
/// block for a sub-object lvalue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr {
    pub slot: u32,
    pub offset: u32,
}

impl Addr {
    pub fn whole(slot: u32) -> Self {
        Self { slot, offset: 0 }
    }

    pub fn with_offset(self, delta: u32) -> Self {
        Self {
            slot: self.slot,
            offset: self.offset + delta,
        }
    }
}

/// The materialized content of a value (spec §3 "Value": "a small inline
/// cell holding one of ...").
#[derive(Debug, Clone)]
pub enum Data {
    Int(i64),
    Float(f64),
    Ptr(Option<Addr>),
    Str(Sym),
    /// Raw little-endian bytes backing a struct/union/array object.
    Bytes(Vec<u8>),
    Func(Sym),
    Macro(Sym),
    TypeVal(TypeId),
}

impl Data {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Data::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Data::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_ptr(&self) -> Option<Option<Addr>> {
        match self {
            Data::Ptr(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Data::Int(i) => *i == 0,
            Data::Float(f) => *f == 0.0,
            Data::Ptr(p) => p.is_none(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Value {
    pub ty: TypeId,
    pub data: Data,
    /// `Some` iff this value is an lvalue (spec §3: "knows whether it is
    /// an lvalue ... or an rvalue").
    pub lvalue: Option<Addr>,
}

impl Value {
    pub fn rvalue(ty: TypeId, data: Data) -> Self {
        Self {
            ty,
            data,
            lvalue: None,
        }
    }

    pub fn lvalue(ty: TypeId, data: Data, addr: Addr) -> Self {
        Self {
            ty,
            data,
            lvalue: Some(addr),
        }
    }

    pub fn is_lvalue(&self) -> bool {
        self.lvalue.is_some()
    }
}

/// Encodes a scalar `Data` into its raw little-endian byte representation
/// for `ty`, for writing into an aggregate's byte block.
pub fn encode_scalar(data: &Data, types: &TypeTable, ty: TypeId) -> Vec<u8> {
    match types.kind(types.resolve(ty)) {
        TypeKind::Int { .. } | TypeKind::Enum { .. } if matches!(data, Data::Int(_)) => {
            let v = data.as_int().unwrap_or(0);
            match width_of(types, ty) {
                IntWidth::Char => vec![v as u8],
                IntWidth::Short => (v as i16).to_le_bytes().to_vec(),
                IntWidth::Int => (v as i32).to_le_bytes().to_vec(),
                IntWidth::Long => v.to_le_bytes().to_vec(),
            }
        }
        TypeKind::Float => (data.as_float().unwrap_or(0.0) as f32).to_le_bytes().to_vec(),
        TypeKind::Double => data.as_float().unwrap_or(0.0).to_le_bytes().to_vec(),
        TypeKind::Pointer(_) | TypeKind::Function { .. } => {
            let addr = data.as_ptr().flatten();
            let packed: u64 = match addr {
                Some(a) => ((a.slot as u64) << 32) | a.offset as u64,
                None => u64::MAX,
            };
            packed.to_le_bytes().to_vec()
        }
        _ => vec![0u8; types.sizeof(ty)],
    }
}

fn width_of(types: &TypeTable, ty: TypeId) -> IntWidth {
    match types.kind(types.resolve(ty)) {
        TypeKind::Int { width, .. } => *width,
        _ => IntWidth::Int,
    }
}

/// Decodes raw bytes at the start of `bytes` into a `Data` for `ty`.
pub fn decode_scalar(bytes: &[u8], types: &TypeTable, ty: TypeId) -> Data {
    match types.kind(types.resolve(ty)) {
        TypeKind::Int { width, unsigned } => {
            let v = match width {
                IntWidth::Char => {
                    if *unsigned {
                        bytes[0] as i64
                    } else {
                        bytes[0] as i8 as i64
                    }
                }
                IntWidth::Short => {
                    let raw = i16::from_le_bytes([bytes[0], bytes[1]]);
                    if *unsigned {
                        raw as u16 as i64
                    } else {
                        raw as i64
                    }
                }
                IntWidth::Int => {
                    let raw = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
                    if *unsigned {
                        raw as u32 as i64
                    } else {
                        raw as i64
                    }
                }
                IntWidth::Long => i64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            };
            Data::Int(v)
        }
        TypeKind::Enum { .. } => Data::Int(i32::from_le_bytes(bytes[0..4].try_into().unwrap()) as i64),
        TypeKind::Float => Data::Float(f32::from_le_bytes(bytes[0..4].try_into().unwrap()) as f64),
        TypeKind::Double => Data::Float(f64::from_le_bytes(bytes[0..8].try_into().unwrap())),
        TypeKind::Pointer(_) | TypeKind::Function { .. } => {
            let packed = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
            if packed == u64::MAX {
                Data::Ptr(None)
            } else {
                Data::Ptr(Some(Addr {
                    slot: (packed >> 32) as u32,
                    offset: packed as u32,
                }))
            }
        }
        // An array's bytes are its storage, not a pointer encoding; reading
        // one as a value is always a decay, handled by callers that know
        // the lvalue address (see `Engine::load` in engine/eval.rs).
        _ => Data::Bytes(bytes.to_vec()),
    }
}

/// Zero-initialized `Data` for a freshly allocated object of type `ty`.
pub fn default_data(types: &TypeTable, ty: TypeId) -> Data {
    match types.kind(types.resolve(ty)) {
        TypeKind::Void => Data::Int(0),
        TypeKind::Int { .. } | TypeKind::Enum { .. } => Data::Int(0),
        TypeKind::Float | TypeKind::Double => Data::Float(0.0),
        TypeKind::Pointer(_) | TypeKind::Function { .. } => Data::Ptr(None),
        TypeKind::Array { .. } | TypeKind::Struct { .. } | TypeKind::Union { .. } | TypeKind::Opaque { .. } => {
            Data::Bytes(vec![0u8; types.sizeof(ty)])
        }
        TypeKind::Typedef { .. } => unreachable!("resolve() strips typedefs"),
    }
}

pub struct ValueArena {
    slots: Vec<Data>,
    frame_marks: Vec<usize>,
}

impl Default for ValueArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueArena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            frame_marks: Vec::new(),
        }
    }

    pub fn alloc(&mut self, data: Data) -> Addr {
        let slot = self.slots.len() as u32;
        self.slots.push(data);
        Addr::whole(slot)
    }

    /// Marks the current top of stack as a frame boundary (spec §4.5:
    /// "each call allocates a frame"). `pop_frame` truncates back to this
    /// mark, discarding every value allocated since — the LIFO invariant
    /// from spec §3.
    pub fn push_frame(&mut self) {
        self.frame_marks.push(self.slots.len());
    }

    pub fn pop_frame(&mut self) {
        if let Some(mark) = self.frame_marks.pop() {
            self.slots.truncate(mark);
        }
    }

    /// Marks a nested-scope boundary within the current frame; `pop_scope`
    /// discards everything allocated since, same mechanism as a frame but
    /// without popping a `frame_marks` entry.
    pub fn mark(&self) -> usize {
        self.slots.len()
    }

    pub fn truncate_to(&mut self, mark: usize) {
        self.slots.truncate(mark);
    }

    pub fn read(&self, addr: Addr, types: &TypeTable, ty: TypeId) -> Data {
        match &self.slots[addr.slot as usize] {
            Data::Bytes(buf) => decode_scalar(&buf[addr.offset as usize..], types, ty),
            other if addr.offset == 0 => other.clone(),
            other => decode_scalar_from_whole(other, addr.offset, types, ty),
        }
    }

    pub fn write(&mut self, addr: Addr, types: &TypeTable, ty: TypeId, data: Data) {
        match &mut self.slots[addr.slot as usize] {
            Data::Bytes(buf) => {
                let bytes = encode_scalar(&data, types, ty);
                let start = addr.offset as usize;
                buf[start..start + bytes.len()].copy_from_slice(&bytes);
            }
            slot => *slot = data,
        }
    }

    /// Raw byte view of an aggregate slot, for `memcpy`-style bulk copies
    /// (string initializers, struct assignment).
    pub fn bytes_at(&self, addr: Addr) -> &[u8] {
        match &self.slots[addr.slot as usize] {
            Data::Bytes(buf) => &buf[addr.offset as usize..],
            _ => &[],
        }
    }

    pub fn bytes_at_mut(&mut self, addr: Addr) -> &mut [u8] {
        match &mut self.slots[addr.slot as usize] {
            Data::Bytes(buf) => &mut buf[addr.offset as usize..],
            _ => &mut [],
        }
    }
}

fn decode_scalar_from_whole(data: &Data, _offset: u32, _types: &TypeTable, _ty: TypeId) -> Data {
    data.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    #[test]
    fn frame_pop_discards_allocations() {
        let mut arena = ValueArena::new();
        arena.push_frame();
        arena.alloc(Data::Int(1));
        arena.alloc(Data::Int(2));
        assert_eq!(arena.slots.len(), 2);
        arena.pop_frame();
        assert_eq!(arena.slots.len(), 0);
    }

    #[test]
    fn struct_field_write_through_round_trips() {
        let mut types = TypeTable::new(8);
        let mut strings = crate::string_table::StringTable::new();
        let a = strings.intern("a");
        let b = strings.intern("b");
        let name = strings.intern("Pair");
        let sid = types.declare_aggregate(0, name, false, &[(a, types.int), (b, types.int)]);

        let mut arena = ValueArena::new();
        let addr = arena.alloc(default_data(&types, sid));
        let fb = types.field(sid, b).unwrap();
        let field_addr = addr.with_offset(fb.offset as u32);

        arena.write(field_addr, &types, types.int, Data::Int(42));
        let got = arena.read(field_addr, &types, types.int);
        assert_eq!(got.as_int(), Some(42));

        // field a must be untouched
        let fa = types.field(sid, a).unwrap();
        let a_addr = addr.with_offset(fa.offset as u32);
        assert_eq!(arena.read(a_addr, &types, types.int).as_int(), Some(0));
    }

    #[test]
    fn array_element_addressing_is_scaled_by_elem_size() {
        let mut types = TypeTable::new(8);
        let arr = types.array_of(types.int, Some(4));
        let mut arena = ValueArena::new();
        let addr = arena.alloc(default_data(&types, arr));
        let elem_size = types.sizeof(types.int) as u32;
        for i in 0..4 {
            let eaddr = addr.with_offset(i * elem_size);
            arena.write(eaddr, &types, types.int, Data::Int(i as i64 * 10));
        }
        for i in 0..4 {
            let eaddr = addr.with_offset(i * elem_size);
            assert_eq!(arena.read(eaddr, &types, types.int).as_int(), Some(i as i64 * 10));
        }
    }
}
