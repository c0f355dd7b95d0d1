//! Canonical type representation.
//!
//! Types live in an arena and are referred to by `TypeId`; named types point
//! at their underlying type by id, which keeps the type graph free of owning
//! cycles. Sizes and struct field offsets are computed lazily and cached.

use crate::ir::FuncId;

pub const INT_SIZE: i64 = 8;
pub const PTR_SIZE: i64 = 8;
/// slice/interface/map all occupy three 8-byte words (ptr, len|id|len,
/// cap|dtype|cap).
pub const HEADER_WIDTH: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub gtype: TypeId,
    pub offset: Option<i64>,
    /// bytes of padding emitted before this field in `.data` layouts
    pub padding: i64,
}

#[derive(Debug, Clone)]
pub struct IMethod {
    pub name: String,
    pub params: Vec<TypeId>,
    pub rets: Vec<TypeId>,
}

#[derive(Debug, Clone)]
pub enum GtypeKind {
    Int,
    Byte,
    Bool,
    String,
    Nil,
    Ptr { to: TypeId },
    Array { elem: TypeId, len: i64 },
    Slice { elem: TypeId },
    Map { key: TypeId, value: TypeId },
    Struct { fields: Vec<StructField> },
    Interface { imethods: Vec<IMethod> },
    Named { pkg: String, name: String, underlying: TypeId },
    Func { params: Vec<TypeId>, rets: Vec<TypeId> },
}

#[derive(Debug, Clone)]
pub struct Gtype {
    pub kind: GtypeKind,
    /// cached byte size; for structs only valid once offsets are computed
    pub size: Option<i64>,
    /// positive iff this named type's methods are ever dispatched
    pub receiver_type_id: u32,
    /// ordered method set of a named type (source order)
    pub methods: Vec<(String, FuncId)>,
}

impl Gtype {
    fn new(kind: GtypeKind) -> Gtype {
        Gtype {
            kind,
            size: None,
            receiver_type_id: 0,
            methods: Vec::new(),
        }
    }
}

pub fn align(n: i64, m: i64) -> i64 {
    let rem = n % m;
    if rem == 0 { n } else { n - rem + m }
}

#[derive(Debug)]
pub struct Types {
    list: Vec<Gtype>,
    pub t_int: TypeId,
    pub t_byte: TypeId,
    pub t_bool: TypeId,
    pub t_string: TypeId,
    pub t_nil: TypeId,
}

impl Default for Types {
    fn default() -> Self {
        Self::new()
    }
}

impl Types {
    pub fn new() -> Types {
        let mut t = Types {
            list: Vec::new(),
            t_int: TypeId(0),
            t_byte: TypeId(0),
            t_bool: TypeId(0),
            t_string: TypeId(0),
            t_nil: TypeId(0),
        };
        t.t_int = t.alloc(GtypeKind::Int);
        t.t_byte = t.alloc(GtypeKind::Byte);
        t.t_bool = t.alloc(GtypeKind::Bool);
        t.t_string = t.alloc(GtypeKind::String);
        t.t_nil = t.alloc(GtypeKind::Nil);
        t
    }

    pub fn alloc(&mut self, kind: GtypeKind) -> TypeId {
        self.list.push(Gtype::new(kind));
        TypeId((self.list.len() - 1) as u32)
    }

    /// All ids, in allocation order (declaration order across packages).
    pub fn ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.list.len() as u32).map(TypeId)
    }

    pub fn get(&self, id: TypeId) -> &Gtype {
        &self.list[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut Gtype {
        &mut self.list[id.0 as usize]
    }

    pub fn kind(&self, id: TypeId) -> &GtypeKind {
        &self.get(id).kind
    }

    /// Unwraps named types down to their underlying type.
    pub fn underlying(&self, id: TypeId) -> TypeId {
        let mut cur = id;
        while let GtypeKind::Named { underlying, .. } = self.kind(cur) {
            cur = *underlying;
        }
        cur
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        matches!(self.kind(self.underlying(id)), GtypeKind::String)
    }

    pub fn is_24width(&self, id: TypeId) -> bool {
        matches!(
            self.kind(self.underlying(id)),
            GtypeKind::Slice { .. } | GtypeKind::Map { .. } | GtypeKind::Interface { .. }
        )
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        matches!(self.kind(self.underlying(id)), GtypeKind::Interface { .. })
    }

    /// Element type of an array or slice; byte for strings.
    pub fn elem_of(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(self.underlying(id)) {
            GtypeKind::Array { elem, .. } | GtypeKind::Slice { elem } => Some(*elem),
            GtypeKind::String => Some(self.t_byte),
            _ => None,
        }
    }

    pub fn byte_size(&mut self, id: TypeId) -> i64 {
        if let Some(s) = self.get(id).size {
            return s;
        }
        let size = match self.kind(id).clone() {
            GtypeKind::Byte | GtypeKind::Bool => 1,
            GtypeKind::Int | GtypeKind::String | GtypeKind::Nil => INT_SIZE,
            GtypeKind::Ptr { .. } | GtypeKind::Func { .. } => PTR_SIZE,
            GtypeKind::Slice { .. } | GtypeKind::Map { .. } | GtypeKind::Interface { .. } => {
                HEADER_WIDTH
            }
            GtypeKind::Array { elem, len } => self.byte_size(elem) * len,
            GtypeKind::Struct { .. } => {
                self.calc_struct_offset(id);
                return self.get(id).size.unwrap_or(0);
            }
            GtypeKind::Named { underlying, .. } => self.byte_size(underlying),
        };
        self.get_mut(id).size = Some(size);
        size
    }

    /// Natural alignment: 1 for byte/bool, 8 for everything word-shaped,
    /// the max field alignment for structs.
    pub fn alignment(&mut self, id: TypeId) -> i64 {
        match self.kind(id).clone() {
            GtypeKind::Byte | GtypeKind::Bool => 1,
            GtypeKind::Array { elem, .. } => self.alignment(elem),
            GtypeKind::Struct { fields } => {
                let mut a = 1;
                for f in &fields {
                    a = a.max(self.alignment(f.gtype));
                }
                a
            }
            GtypeKind::Named { underlying, .. } => self.alignment(underlying),
            _ => 8,
        }
    }

    /// Computes per-field offsets (with natural alignment padding) and the
    /// total struct size. Accepts named structs and pointers to them.
    /// Idempotent.
    pub fn calc_struct_offset(&mut self, id: TypeId) {
        let mut target = self.underlying(id);
        if let GtypeKind::Ptr { to } = self.kind(target) {
            target = self.underlying(*to);
        }
        let target = target;
        let field_types: Vec<TypeId> = match self.kind(target) {
            GtypeKind::Struct { fields } => {
                if self.get(target).size.is_some() {
                    return;
                }
                fields.iter().map(|f| f.gtype).collect()
            }
            _ => return,
        };

        let mut max_align = 1i64;
        let mut offset = 0i64;
        let mut layout: Vec<(i64, i64)> = Vec::new(); // (offset, padding)
        for ft in &field_types {
            let a = self.alignment(*ft);
            max_align = max_align.max(a);
            let aligned = align(offset, a);
            layout.push((aligned, aligned - offset));
            offset = aligned + self.byte_size(*ft);
        }
        let total = align(offset, max_align);

        if let GtypeKind::Struct { fields } = &mut self.get_mut(target).kind {
            for (f, (off, pad)) in fields.iter_mut().zip(layout) {
                f.offset = Some(off);
                f.padding = pad;
            }
        }
        self.get_mut(target).size = Some(total);
    }

    /// Looks a field up in a struct (or named struct, or pointer to one).
    pub fn get_field(&self, id: TypeId, name: &str) -> Option<StructField> {
        let mut target = self.underlying(id);
        if let GtypeKind::Ptr { to } = self.kind(target) {
            target = self.underlying(*to);
        }
        match self.kind(target) {
            GtypeKind::Struct { fields } => fields.iter().find(|f| f.name == name).cloned(),
            _ => None,
        }
    }

    /// Named type (or pointer to one) that owns a method set.
    pub fn method_owner(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            GtypeKind::Named { .. } => Some(id),
            GtypeKind::Ptr { to } => match self.kind(*to) {
                GtypeKind::Named { .. } => Some(*to),
                _ => None,
            },
            _ => None,
        }
    }

    /// Canonical printable form. Injective over distinct types; this string
    /// is the dynamic-type descriptor key compared at interface-dispatch
    /// time, so stability matters.
    pub fn string(&self, id: TypeId) -> String {
        match self.kind(id) {
            GtypeKind::Int => "int".to_string(),
            GtypeKind::Byte => "byte".to_string(),
            GtypeKind::Bool => "bool".to_string(),
            GtypeKind::String => "string".to_string(),
            GtypeKind::Nil => "nil".to_string(),
            GtypeKind::Ptr { to } => format!("*{}", self.string(*to)),
            GtypeKind::Array { elem, len } => format!("[{}]{}", len, self.string(*elem)),
            GtypeKind::Slice { elem } => format!("[]{}", self.string(*elem)),
            GtypeKind::Map { key, value } => {
                format!("map[{}]{}", self.string(*key), self.string(*value))
            }
            GtypeKind::Struct { fields } => {
                let fs: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{} {}", f.name, self.string(f.gtype)))
                    .collect();
                format!("struct{{{}}}", fs.join("; "))
            }
            GtypeKind::Interface { imethods } => {
                let ms: Vec<String> = imethods
                    .iter()
                    .map(|m| {
                        let ps: Vec<String> =
                            m.params.iter().map(|p| self.string(*p)).collect();
                        let rs: Vec<String> = m.rets.iter().map(|r| self.string(*r)).collect();
                        format!("{}({})({})", m.name, ps.join(","), rs.join(","))
                    })
                    .collect();
                format!("interface{{{}}}", ms.join("; "))
            }
            GtypeKind::Named { pkg, name, .. } => {
                if pkg.is_empty() {
                    name.clone()
                } else {
                    format!("{pkg}.{name}")
                }
            }
            GtypeKind::Func { params, rets } => {
                let ps: Vec<String> = params.iter().map(|p| self.string(*p)).collect();
                let rs: Vec<String> = rets.iter().map(|r| self.string(*r)).collect();
                format!("func({})({})", ps.join(","), rs.join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_sizes() {
        let mut t = Types::new();
        let (i, b, s) = (t.t_int, t.t_byte, t.t_string);
        assert_eq!(t.byte_size(i), 8);
        assert_eq!(t.byte_size(b), 1);
        assert_eq!(t.byte_size(s), 8);
    }

    #[test]
    fn slice_and_map_are_24_wide() {
        let mut t = Types::new();
        let (ti, ts) = (t.t_int, t.t_string);
        let sl = t.alloc(GtypeKind::Slice { elem: ti });
        let m = t.alloc(GtypeKind::Map { key: ts, value: ti });
        assert_eq!(t.byte_size(sl), 24);
        assert_eq!(t.byte_size(m), 24);
        assert!(t.is_24width(sl) && t.is_24width(m));
    }

    #[test]
    fn struct_offsets_align_naturally() {
        let mut t = Types::new();
        let (ti, tb) = (t.t_int, t.t_byte);
        let st = t.alloc(GtypeKind::Struct {
            fields: vec![
                StructField {
                    name: "a".into(),
                    gtype: tb,
                    offset: None,
                    padding: 0,
                },
                StructField {
                    name: "b".into(),
                    gtype: ti,
                    offset: None,
                    padding: 0,
                },
                StructField {
                    name: "c".into(),
                    gtype: tb,
                    offset: None,
                    padding: 0,
                },
            ],
        });
        t.calc_struct_offset(st);
        let a = t.get_field(st, "a").unwrap();
        let b = t.get_field(st, "b").unwrap();
        let c = t.get_field(st, "c").unwrap();
        assert_eq!(a.offset, Some(0));
        assert_eq!(b.offset, Some(8));
        assert_eq!(b.padding, 7);
        assert_eq!(c.offset, Some(16));
        // highest offset+size rounded up to the largest field alignment
        assert_eq!(t.byte_size(st), 24);
    }

    #[test]
    fn array_size_is_elem_times_len() {
        let mut t = Types::new();
        let ti = t.t_int;
        let arr = t.alloc(GtypeKind::Array { elem: ti, len: 5 });
        assert_eq!(t.byte_size(arr), 40);
    }

    #[test]
    fn string_form_is_injective_for_distinct_types() {
        let mut t = Types::new();
        let (ti, ts) = (t.t_int, t.t_string);
        let sl_i = t.alloc(GtypeKind::Slice { elem: ti });
        let sl_s = t.alloc(GtypeKind::Slice { elem: ts });
        let arr = t.alloc(GtypeKind::Array { elem: ti, len: 3 });
        let m = t.alloc(GtypeKind::Map { key: ts, value: ti });
        let p = t.alloc(GtypeKind::Ptr { to: ti });
        let mut all = vec![
            t.string(ti),
            t.string(ts),
            t.string(sl_i),
            t.string(sl_s),
            t.string(arr),
            t.string(m),
            t.string(p),
        ];
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 7);
    }

    #[test]
    fn named_type_unwraps_to_underlying() {
        let mut t = Types::new();
        let ti = t.t_int;
        let named = t.alloc(GtypeKind::Named {
            pkg: "main".into(),
            name: "MyInt".into(),
            underlying: ti,
        });
        assert_eq!(t.underlying(named), ti);
        assert_eq!(t.byte_size(named), 8);
        assert_eq!(t.string(named), "main.MyInt");
    }
}
