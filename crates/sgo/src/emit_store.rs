//! L-value stores and the assignment dispatch.
//!
//! Single-word saves expect the value in %rax. 24-wide saves expect the
//! three words pushed (ptr first), and write them in reverse so the ptr
//! word lands last, which keeps self-referential right-hand sides sound.

use crate::ast::{Expr, LitElem, Resolved, UnOp};
use crate::diag::Result;
use crate::emit::{Codegen, RET_REGI};
use crate::ir::VarId;
use crate::types::GtypeKind;

impl<'a> Codegen<'a> {
    pub fn map_ok_register(&self, is_24: bool) -> &'static str {
        if is_24 { "rdx" } else { "rbx" }
    }

    // ── single-word saves (value in %rax) ───────────────────────

    pub fn emit_save(&mut self, left: &Expr) -> Result<()> {
        match left {
            Expr::Ident {
                rel: Some(Resolved::Var(vid)),
                span,
                ..
            } => {
                let gtype = self.prog.var(*vid).gtype.ok_or_else(|| {
                    self.internal(*span, "assignment target has no inferred type")
                })?;
                let size = self.prog.types.byte_size(gtype).min(8);
                self.emit_variable_offset_save(*vid, size, 0, false)
            }
            Expr::Index {
                collection, index, ..
            } => {
                let ct = self.expr_type_req(collection)?;
                let under = self.prog.types.underlying(ct);
                match self.prog.types.kind(under).clone() {
                    GtypeKind::Map { .. } => {
                        self.emit("PUSH_8 # rhs");
                        self.emit_map_set(collection, index, false)
                    }
                    _ => self.emit_collect_index_save(collection, index, 0),
                }
            }
            Expr::Field { .. } => self.emit_field_save(left),
            Expr::Unop {
                op: UnOp::Deref,
                operand,
                ..
            } => {
                self.emit("# store through pointer");
                self.emit("PUSH_8");
                self.emit_expr(operand)?;
                self.emit("PUSH_8");
                self.emit("STORE_8_INDIRECT_FROM_STACK");
                Ok(())
            }
            other => Err(self.internal(other.span(), "not an assignable location")),
        }
    }

    pub fn emit_variable_offset_save(
        &mut self,
        vid: VarId,
        size: i64,
        offset: i64,
        force_indirection: bool,
    ) -> Result<()> {
        let v = self.prog.var(vid);
        let (is_global, name, voff, gtype, span) =
            (v.is_global, v.name.clone(), v.offset, v.gtype, v.span);
        let is_ptr = gtype
            .map(|t| matches!(self.prog.types.kind(t), GtypeKind::Ptr { .. }))
            .unwrap_or(false);
        if is_ptr && (offset > 0 || force_indirection) {
            self.emit("PUSH_8");
            self.emit_variable(vid)?;
            self.emit(format!("ADD_NUMBER {offset}"));
            self.emit("PUSH_8");
            self.emit("STORE_8_INDIRECT_FROM_STACK");
            return Ok(());
        }
        if !(0 < size && size <= 8) {
            return Err(self.internal(span, format!("invalid store size {size}")));
        }
        if is_global {
            self.emit(format!("STORE_{size}_TO_GLOBAL {name}, {offset}"));
        } else {
            self.emit(format!("STORE_{size}_TO_LOCAL {voff}+{offset}"));
        }
        Ok(())
    }

    fn emit_field_save(&mut self, left: &Expr) -> Result<()> {
        let Expr::Field {
            strct, name, span, ..
        } = left
        else {
            unreachable!()
        };
        let st = self.expr_type_req(strct)?;
        self.prog.types.calc_struct_offset(st);
        let field = self
            .prog
            .types
            .get_field(st, name)
            .ok_or_else(|| self.internal(*span, format!("unknown field {name}")))?;
        let offset = field
            .offset
            .ok_or_else(|| self.internal(*span, "field offset must not be undefined"))?;
        let under = self.prog.types.underlying(st);
        if matches!(self.prog.types.kind(under), GtypeKind::Ptr { .. }) {
            self.emit("PUSH_8 # rhs");
            self.emit_expr(strct)?;
            self.emit(format!("ADD_NUMBER {offset}"));
            self.emit("PUSH_8");
            self.emit("STORE_8_INDIRECT_FROM_STACK");
            return Ok(());
        }
        let size = self.prog.types.byte_size(field.gtype).min(8);
        self.emit_offset_save(strct, size, offset)
    }

    /// Stores `size` bytes of %rax at `offset` inside the location `lhs`.
    pub fn emit_offset_save(&mut self, lhs: &Expr, size: i64, offset: i64) -> Result<()> {
        match lhs {
            Expr::Ident {
                rel: Some(Resolved::Var(vid)),
                ..
            } => self.emit_variable_offset_save(*vid, size, offset, false),
            Expr::Field {
                strct, name, span, ..
            } => {
                let st = self.expr_type_req(strct)?;
                self.prog.types.calc_struct_offset(st);
                let field = self
                    .prog
                    .types
                    .get_field(st, name)
                    .ok_or_else(|| self.internal(*span, format!("unknown field {name}")))?;
                let foffset = field
                    .offset
                    .ok_or_else(|| self.internal(*span, "field offset must not be undefined"))?;
                self.emit_offset_save(strct, size, foffset + offset)
            }
            Expr::Index {
                collection, index, ..
            } => self.emit_collect_index_save(collection, index, offset),
            other => Err(self.internal(other.span(), "not an assignable location")),
        }
    }

    /// Stores %rax into `collection[index]` (arrays, slices, strings).
    fn emit_collect_index_save(
        &mut self,
        collection: &Expr,
        index: &Expr,
        offset: i64,
    ) -> Result<()> {
        let ct = self.expr_type_req(collection)?;
        let elem = self
            .prog
            .types
            .elem_of(ct)
            .ok_or_else(|| self.internal(collection.span(), "indexed store on a non-collection"))?;
        let elm_size = self.prog.types.byte_size(elem);

        self.emit("PUSH_8 # rhs");
        self.emit_expr(collection)?;
        self.emit("PUSH_8 # addr");
        self.emit_expr(index)?;
        self.emit(format!("IMUL_NUMBER {elm_size} # index * elmSize"));
        self.emit("PUSH_8");
        self.emit("SUM_FROM_STACK");
        self.emit(format!("ADD_NUMBER {offset} # offset"));
        self.emit("PUSH_8");
        if elm_size == 1 {
            self.emit("STORE_1_INDIRECT_FROM_STACK");
        } else {
            self.emit("STORE_8_INDIRECT_FROM_STACK");
        }
        self.emit_newline();
        Ok(())
    }

    // ── 24-wide saves (three words on the stack) ────────────────

    pub fn emit_save24(&mut self, lhs: &Expr, offset: i64) -> Result<()> {
        self.emit(format!("# save 24-wide value at offset {offset}"));
        match lhs {
            Expr::Ident {
                rel: Some(Resolved::Var(vid)),
                ..
            } => {
                let vid = *vid;
                self.emit("pop %rax # 3rd");
                self.emit_variable_offset_save(vid, 8, offset + 16, false)?;
                self.emit("pop %rax # 2nd");
                self.emit_variable_offset_save(vid, 8, offset + 8, false)?;
                self.emit("pop %rax # 1st");
                self.emit_variable_offset_save(vid, 8, offset, true)
            }
            Expr::Field {
                strct, name, span, ..
            } => {
                let st = self.expr_type_req(strct)?;
                self.prog.types.calc_struct_offset(st);
                let field = self
                    .prog
                    .types
                    .get_field(st, name)
                    .ok_or_else(|| self.internal(*span, format!("unknown field {name}")))?;
                let foffset = field
                    .offset
                    .ok_or_else(|| self.internal(*span, "field offset must not be undefined"))?;
                self.emit_save24(strct, foffset + offset)
            }
            Expr::Index {
                collection, index, ..
            } => {
                let ct = self.expr_type_req(collection)?;
                let under = self.prog.types.underlying(ct);
                if matches!(self.prog.types.kind(under), GtypeKind::Map { .. }) {
                    return self.emit_map_set(collection, index, true);
                }
                let elem = self.prog.types.elem_of(ct).ok_or_else(|| {
                    self.internal(collection.span(), "indexed store on a non-collection")
                })?;
                let elm_size = self.prog.types.byte_size(elem);
                self.emit_expr(collection)?;
                self.emit("PUSH_8 # head");
                self.emit_expr(index)?;
                self.emit("PUSH_8");
                self.emit(format!("LOAD_NUMBER {elm_size} # element size"));
                self.emit("PUSH_8");
                self.emit("IMUL_FROM_STACK");
                self.emit("PUSH_8");
                self.emit("SUM_FROM_STACK");
                self.emit(format!("ADD_NUMBER {offset}"));
                self.emit("PUSH_8");
                self.emit("STORE_24_INDIRECT_FROM_STACK");
                Ok(())
            }
            other => Err(self.internal(other.span(), "not an assignable location")),
        }
    }

    // ── assignment dispatch ─────────────────────────────────────

    pub fn emit_assign(&mut self, lefts: &[Expr], rights: &[Expr]) -> Result<()> {
        self.emit("# assignment");
        if rights.len() > 1 {
            // a, b, c = x, y, z
            for (left, right) in lefts.iter().zip(rights.iter()) {
                self.emit_assign_one(left, right)?;
            }
            return Ok(());
        }

        let right = &rights[0];

        // a, b = f() with a multi-value callee
        let rets = self.call_rettypes_of(right);
        if rets.len() > 1 {
            self.emit("# multi-value call assignment");
            self.emit_expr(right)?;
            let mut words = 0usize;
            for t in &rets {
                let mut size = self.prog.types.byte_size(*t);
                if size < 8 {
                    size = 8;
                }
                words += (size / 8) as usize;
            }
            for i in (0..words).rev() {
                self.emit(format!("push %{} # return word {i}", RET_REGI[i]));
            }
            for (left, t) in lefts.iter().zip(rets.iter()) {
                let is24 = self.prog.types.is_24width(*t);
                if left.is_blank() {
                    let n = if is24 { 3 } else { 1 };
                    for _ in 0..n {
                        self.emit("pop %rax # discard into _");
                    }
                    continue;
                }
                if is24 {
                    self.emit_save24(left, 0)?;
                } else {
                    self.emit("pop %rax");
                    self.emit_save(left)?;
                }
            }
            return Ok(());
        }

        // v, ok := m[k]  /  v, ok := x.(T)
        let two_valued = match right {
            Expr::TypeAssert { .. } => true,
            Expr::Index { collection, .. } => {
                let ct = self.expr_type_req(collection)?;
                matches!(
                    self.prog.types.kind(self.prog.types.underlying(ct)),
                    GtypeKind::Map { .. }
                )
            }
            _ => false,
        };

        self.emit_assign_one(&lefts[0], right)?;

        if two_valued && lefts.len() == 2 {
            let is24 = self
                .expr_type(right)
                .map(|t| self.prog.types.is_24width(t))
                .unwrap_or(false);
            let ok_reg = self.map_ok_register(is24);
            self.emit(format!("mov %{ok_reg}, %rax # ok value"));
            if !lefts[1].is_blank() {
                self.emit_save(&lefts[1])?;
            }
        }
        Ok(())
    }

    fn call_rettypes_of(&self, e: &Expr) -> Vec<crate::types::TypeId> {
        match e {
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Ident {
                    rel: Some(Resolved::Func(fid)),
                    ..
                } => {
                    let f = self.prog.func(*fid);
                    if f.builtin.is_some() {
                        Vec::new()
                    } else {
                        f.rettypes.clone()
                    }
                }
                _ => Vec::new(),
            },
            Expr::MethodCall { receiver, name, .. } => {
                let Some(rt) = self.expr_type(receiver) else {
                    return Vec::new();
                };
                let under = self.prog.types.underlying(rt);
                if let GtypeKind::Interface { imethods } = self.prog.types.kind(under) {
                    return imethods
                        .iter()
                        .find(|m| m.name == *name)
                        .map(|m| m.rets.clone())
                        .unwrap_or_default();
                }
                self.prog
                    .types
                    .method_owner(rt)
                    .and_then(|o| {
                        self.prog
                            .types
                            .get(o)
                            .methods
                            .iter()
                            .find(|(n, _)| n == name)
                            .map(|(_, f)| self.prog.func(*f).rettypes.clone())
                    })
                    .unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    /// One left, one right; dispatches on the target's type kind.
    pub fn emit_assign_one(&mut self, left: &Expr, right: &Expr) -> Result<()> {
        if left.is_blank() {
            self.emit("# assignment into _");
            return self.emit_expr(right);
        }
        let Some(gtype) = self.expr_type(left) else {
            self.emit("# untyped assignment target");
            return self.emit_expr(right);
        };
        let under = self.prog.types.underlying(gtype);
        match self.prog.types.kind(under).clone() {
            GtypeKind::Array { .. } => self.assign_to_array(left, Some(right)),
            GtypeKind::Slice { .. } => self.assign_to_slice(left, Some(right)),
            GtypeKind::Struct { .. } => self.assign_to_struct(left, Some(right)),
            GtypeKind::Interface { .. } => self.assign_to_interface(left, Some(right)),
            GtypeKind::Map { .. } => self.assign_to_map(left, Some(right)),
            _ => {
                self.emit_expr(right)?;
                self.emit_save(left)
            }
        }
    }

    // ── composite assignment helpers ────────────────────────────

    pub fn assign_to_map(&mut self, lhs: &Expr, rhs: Option<&Expr>) -> Result<()> {
        self.emit("# assign to map");
        let Some(rhs) = rhs else {
            self.emit("LOAD_EMPTY_MAP");
            self.emit("PUSH_MAP");
            return self.emit_save24(lhs, 0);
        };
        if rhs.is_nil() {
            self.emit("LOAD_EMPTY_MAP");
            self.emit("PUSH_MAP");
            return self.emit_save24(lhs, 0);
        }
        self.emit_expr(rhs)?;
        self.emit("PUSH_MAP");
        self.emit_save24(lhs, 0)
    }

    pub fn assign_to_interface(&mut self, lhs: &Expr, rhs: Option<&Expr>) -> Result<()> {
        self.emit("# assign to interface");
        let nil_rhs = rhs.map(|r| r.is_nil()).unwrap_or(true);
        if nil_rhs {
            self.emit("LOAD_EMPTY_INTERFACE");
            self.emit("PUSH_INTERFACE");
            return self.emit_save24(lhs, 0);
        }
        let rhs = rhs.unwrap();
        let rt = self.expr_type(rhs);
        if rt.map(|t| self.prog.types.is_interface(t)).unwrap_or(false) {
            self.emit_expr(rhs)?;
            self.emit("PUSH_INTERFACE");
            return self.emit_save24(lhs, 0);
        }
        self.emit_conversion_to_interface(rhs)?;
        self.emit("PUSH_INTERFACE");
        self.emit_save24(lhs, 0)
    }

    pub fn assign_to_slice(&mut self, lhs: &Expr, rhs: Option<&Expr>) -> Result<()> {
        self.emit("# assign to slice");
        let nil_rhs = rhs.map(|r| r.is_nil()).unwrap_or(true);
        if nil_rhs {
            self.emit("LOAD_EMPTY_SLICE");
            self.emit("PUSH_SLICE");
            return self.emit_save24(lhs, 0);
        }
        let rhs = rhs.unwrap();

        // string -> []byte shares the bytes with the string
        if let Expr::Call { callee, args, .. } = rhs {
            if let Expr::Ident {
                rel: Some(Resolved::Type(target)),
                ..
            } = callee.as_ref()
            {
                let under = self.prog.types.underlying(*target);
                if matches!(self.prog.types.kind(under), GtypeKind::Slice { .. }) {
                    let operand = &args[0];
                    let ot = self.expr_type_req(operand)?;
                    if !self.prog.types.is_string(ot) {
                        return Err(self.tbi(rhs.span(), "conversion to a slice"));
                    }
                    self.emit("# string to byte slice");
                    self.emit_expr(operand)?;
                    self.emit("PUSH_8 # ptr");
                    self.emit_len(operand)?;
                    self.emit("PUSH_8 # len");
                    self.emit("PUSH_8 # cap");
                    return self.emit_save24(lhs, 0);
                }
            }
        }

        self.emit_expr(rhs)?; // leaves (ptr, len, cap)
        self.emit("PUSH_SLICE");
        self.emit_save24(lhs, 0)
    }

    /// Zero-initialises the target struct, then assigns field by field.
    pub fn assign_to_struct(&mut self, lhs: &Expr, rhs: Option<&Expr>) -> Result<()> {
        self.emit("# assign to struct");
        let gtype = self.expr_type_req(lhs)?;
        self.prog.types.calc_struct_offset(gtype);
        let under = self.prog.types.underlying(gtype);
        let fields = match self.prog.types.kind(under).clone() {
            GtypeKind::Struct { fields } => fields,
            _ => return Err(self.internal(lhs.span(), "struct assignment to non-struct")),
        };

        self.emit("# zero-initialize the struct");
        for f in &fields {
            let foffset = f
                .offset
                .ok_or_else(|| self.internal(lhs.span(), "field offset must not be undefined"))?;
            let funder = self.prog.types.underlying(f.gtype);
            match self.prog.types.kind(funder).clone() {
                GtypeKind::Array { elem, len } => {
                    let elm_size = self.prog.types.byte_size(elem);
                    for i in 0..len {
                        self.emit("mov $0, %rax");
                        self.emit_offset_save(lhs, elm_size.min(8), foffset + i * elm_size)?;
                    }
                }
                GtypeKind::Slice { .. } => {
                    self.emit("LOAD_EMPTY_SLICE");
                    self.emit("PUSH_SLICE");
                    self.emit_save24(lhs, foffset)?;
                }
                GtypeKind::Map { .. } => {
                    self.emit("LOAD_EMPTY_MAP");
                    self.emit("PUSH_MAP");
                    self.emit_save24(lhs, foffset)?;
                }
                GtypeKind::Interface { .. } => {
                    self.emit("LOAD_EMPTY_INTERFACE");
                    self.emit("PUSH_INTERFACE");
                    self.emit_save24(lhs, foffset)?;
                }
                GtypeKind::Struct { .. } => {
                    let field_expr = Expr::Field {
                        strct: Box::new(lhs.clone()),
                        name: f.name.clone(),
                        gtype: Some(f.gtype),
                        span: lhs.span(),
                    };
                    self.assign_to_struct(&field_expr, None)?;
                }
                _ => {
                    self.emit("mov $0, %rax");
                    let size = self.prog.types.byte_size(f.gtype).min(8);
                    self.emit_offset_save(lhs, size, foffset)?;
                }
            }
        }

        let Some(rhs) = rhs else {
            return Ok(());
        };

        match rhs {
            Expr::Ident { .. } | Expr::Field { .. } | Expr::Unop { op: UnOp::Deref, .. } => {
                // whole-struct copy; a struct r-value is its address, a
                // pointer r-value is the address directly
                let size = self.prog.types.byte_size(gtype);
                self.emit_addr_of(lhs)?;
                self.emit("PUSH_8");
                match rhs {
                    Expr::Unop { operand, .. } => self.emit_expr(operand)?,
                    _ => self.emit_expr(rhs)?,
                }
                self.emit("PUSH_8");
                self.emit_copy_struct_from_stack(size);
                Ok(())
            }
            Expr::CompositeLit { elems, span, .. } => {
                for el in elems {
                    let LitElem::Keyed { key, value } = el else {
                        return Err(self.internal(*span, "unkeyed element in struct literal"));
                    };
                    self.emit(format!("# .{key}"));
                    let field = self
                        .prog
                        .types
                        .get_field(under, key)
                        .ok_or_else(|| self.internal(*span, format!("unknown field {key}")))?;
                    let field_expr = Expr::Field {
                        strct: Box::new(lhs.clone()),
                        name: key.clone(),
                        gtype: Some(field.gtype),
                        span: *span,
                    };
                    self.emit_assign_one(&field_expr, value)?;
                }
                Ok(())
            }
            other => Err(self.tbi(other.span(), "assigning this expression to a struct")),
        }
    }

    /// Element-by-element array assignment (copy semantics).
    pub fn assign_to_array(&mut self, lhs: &Expr, rhs: Option<&Expr>) -> Result<()> {
        self.emit("# assign to array");
        let gtype = self.expr_type_req(lhs)?;
        let under = self.prog.types.underlying(gtype);
        let (elem, len) = match self.prog.types.kind(under).clone() {
            GtypeKind::Array { elem, len } => (elem, len),
            _ => return Err(self.internal(lhs.span(), "array assignment to non-array")),
        };
        let elm_size = self.prog.types.byte_size(elem);
        let elem_under = self.prog.types.underlying(elem);
        let elem_is_struct =
            matches!(self.prog.types.kind(elem_under), GtypeKind::Struct { .. });
        let elem_is_iface = self.prog.types.is_interface(elem);

        if elem_is_struct {
            for i in 0..len {
                let left = Expr::Index {
                    collection: Box::new(lhs.clone()),
                    index: Box::new(Expr::Num {
                        val: i,
                        span: lhs.span(),
                    }),
                    gtype: Some(elem),
                    span: lhs.span(),
                };
                match rhs {
                    None => self.assign_to_struct(&left, None)?,
                    Some(Expr::CompositeLit { elems, .. }) => {
                        let value = elems.get(i as usize).and_then(|el| match el {
                            LitElem::Plain(v) => Some(v),
                            _ => None,
                        });
                        self.assign_to_struct(&left, value)?;
                    }
                    Some(other) => {
                        return Err(self.tbi(other.span(), "assigning this to a struct array"))
                    }
                }
            }
            return Ok(());
        }

        for i in 0..len {
            let offset = i * elm_size;
            match rhs {
                None => {
                    if elem_is_iface {
                        self.emit("LOAD_EMPTY_INTERFACE");
                        self.emit("PUSH_INTERFACE");
                        self.emit_save24(lhs, offset)?;
                        continue;
                    }
                    self.emit("mov $0, %rax");
                }
                Some(Expr::CompositeLit { elems, .. }) => {
                    let value = elems.get(i as usize).and_then(|el| match el {
                        LitElem::Plain(v) => Some(v),
                        _ => None,
                    });
                    if elem_is_iface {
                        match value {
                            None => {
                                self.emit("LOAD_EMPTY_INTERFACE");
                                self.emit("PUSH_INTERFACE");
                                self.emit_save24(lhs, offset)?;
                            }
                            Some(v) => {
                                let vt = self.expr_type(v);
                                let v_is_iface = vt
                                    .map(|t| self.prog.types.is_interface(t))
                                    .unwrap_or(false);
                                if v_is_iface {
                                    self.emit_expr(v)?;
                                    self.emit("PUSH_INTERFACE");
                                } else {
                                    self.emit_conversion_to_interface(v)?;
                                    self.emit("PUSH_INTERFACE");
                                }
                                self.emit_save24(lhs, offset)?;
                            }
                        }
                        continue;
                    }
                    match value {
                        None => self.emit("mov $0, %rax"),
                        Some(v) => self.emit_expr(v)?,
                    }
                }
                Some(Expr::Ident { .. }) | Some(Expr::Field { .. }) => {
                    self.emit_offset_load(rhs.unwrap(), elm_size.min(8), offset)?;
                }
                Some(other) => {
                    return Err(self.tbi(other.span(), "assigning this to an array"));
                }
            }
            self.emit_offset_save(lhs, elm_size.min(8), offset)?;
        }
        Ok(())
    }
}
