//! R-value lowering.
//!
//! Every expression leaves its value in the result registers: one word in
//! %rax, 24-wide values in (%rax, %rbx, %rcx).

use crate::ast::{BinOp, Expr, LitElem, Resolved, UnOp};
use crate::diag::Result;
use crate::emit::Codegen;
use crate::ir::{Builtin, ConstId, VarId};
use crate::types::{GtypeKind, TypeId};

impl<'a> Codegen<'a> {
    pub fn emit_expr(&mut self, e: &Expr) -> Result<()> {
        match e {
            Expr::Num { val, .. } => {
                self.emit(format!("LOAD_NUMBER {val}"));
            }
            Expr::Str { slabel, .. } => {
                self.emit(format!("LOAD_STRING_LITERAL {slabel}"));
            }
            Expr::Nil { .. } => {
                self.emit("LOAD_NUMBER 0 # nil literal");
            }
            Expr::Ident { rel, name, span, .. } => match rel {
                Some(Resolved::Var(vid)) => self.emit_variable(*vid)?,
                Some(Resolved::Const(cid)) => self.emit_const(*cid)?,
                Some(Resolved::Func(_)) => {
                    self.emit("LOAD_NUMBER 1 # funcref");
                }
                Some(Resolved::Type(_)) => {
                    return Err(self.internal(*span, format!("type {name} used as value")));
                }
                None => {
                    return Err(self.internal(*span, format!("unresolved identifier {name}")));
                }
            },
            Expr::Binop { .. } => self.emit_binop(e)?,
            Expr::Unop { .. } => self.emit_uop(e)?,
            Expr::Index {
                collection, index, ..
            } => {
                self.emit("# load indexed value");
                self.load_collect_index(collection, index, 0)?;
            }
            Expr::SliceExpr { .. } => self.emit_slice_expr(e)?,
            Expr::Field { .. } => self.emit_struct_field(e)?,
            Expr::Call {
                callee, args, span, ..
            } => self.emit_call(callee, args, *span)?,
            Expr::MethodCall { .. } => self.emit_method_call(e)?,
            Expr::TypeAssert { .. } => self.emit_type_assert(e)?,
            Expr::CompositeLit {
                gtype,
                hidden_var,
                span,
                ..
            } => {
                let t = gtype.ok_or_else(|| self.internal(*span, "untyped composite literal"))?;
                let under = self.prog.types.underlying(t);
                match self.prog.types.kind(under).clone() {
                    GtypeKind::Slice { .. } => self.emit_slice_literal(e)?,
                    GtypeKind::Map { .. } => self.emit_map_literal(e)?,
                    GtypeKind::Struct { .. } | GtypeKind::Array { .. } => {
                        // materialise in the hidden local; the value is its
                        // address
                        let vid = hidden_var.ok_or_else(|| {
                            self.internal(*span, "literal has no hidden local")
                        })?;
                        let hidden = self.var_expr(vid, t);
                        if matches!(self.prog.types.kind(under), GtypeKind::Struct { .. }) {
                            self.assign_to_struct(&hidden, Some(e))?;
                        } else {
                            self.assign_to_array(&hidden, Some(e))?;
                        }
                        self.emit_variable_addr(vid, 0)?;
                    }
                    _ => {
                        return Err(self.internal(
                            *span,
                            "this composite literal cannot be emitted alone",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    // ── variables and constants ─────────────────────────────────

    pub fn emit_variable(&mut self, vid: VarId) -> Result<()> {
        let v = self.prog.var(vid);
        let (name, is_global, offset, gtype) =
            (v.name.clone(), v.is_global, v.offset, v.gtype);
        let span = v.span;
        let gtype = gtype.ok_or_else(|| {
            self.internal(span, format!("variable {name} has no inferred type"))
        })?;
        let tstr = self.prog.types.string(gtype);
        self.emit(format!("# load variable \"{name}\" {tstr}"));
        let under = self.prog.types.underlying(gtype);
        let kind = self.prog.types.kind(under).clone();
        if is_global {
            match kind {
                GtypeKind::Interface { .. } => {
                    self.emit(format!("LOAD_INTERFACE_FROM_GLOBAL {name}"))
                }
                GtypeKind::Slice { .. } => self.emit(format!("LOAD_SLICE_FROM_GLOBAL {name}")),
                GtypeKind::Map { .. } => self.emit(format!("LOAD_MAP_FROM_GLOBAL {name}")),
                // arrays and structs load as their address
                GtypeKind::Array { .. } | GtypeKind::Struct { .. } => {
                    self.emit_variable_addr(vid, 0)?
                }
                _ => {
                    if self.prog.types.byte_size(gtype) == 1 {
                        self.emit(format!("LOAD_1_FROM_GLOBAL_CAST {name}"));
                    } else {
                        self.emit(format!("LOAD_8_FROM_GLOBAL {name}"));
                    }
                }
            }
        } else {
            if offset == 0 {
                return Err(self.internal(
                    span,
                    format!("offset should not be zero for local {name}"),
                ));
            }
            match kind {
                GtypeKind::Interface { .. } => {
                    self.emit(format!("LOAD_INTERFACE_FROM_LOCAL {offset}"))
                }
                GtypeKind::Slice { .. } => {
                    self.emit(format!("LOAD_SLICE_FROM_LOCAL {offset}"))
                }
                GtypeKind::Map { .. } => self.emit(format!("LOAD_MAP_FROM_LOCAL {offset}")),
                GtypeKind::Array { .. } | GtypeKind::Struct { .. } => {
                    self.emit_variable_addr(vid, 0)?
                }
                _ => {
                    if self.prog.types.byte_size(gtype) == 1 {
                        self.emit(format!("LOAD_1_FROM_LOCAL_CAST {offset}"));
                    } else {
                        self.emit(format!("LOAD_8_FROM_LOCAL {offset}"));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn emit_variable_addr(&mut self, vid: VarId, offset: i64) -> Result<()> {
        let v = self.prog.var(vid);
        if v.is_global {
            let name = v.name.clone();
            self.emit(format!("LOAD_GLOBAL_ADDR {name}, {offset}"));
        } else {
            if v.offset == 0 {
                let name = v.name.clone();
                let span = v.span;
                return Err(self.internal(
                    span,
                    format!("offset should not be zero for local {name}"),
                ));
            }
            let off = v.offset;
            self.emit(format!("LOAD_LOCAL_ADDR {off}+{offset}"));
        }
        Ok(())
    }

    pub fn emit_variable_offset_load(
        &mut self,
        vid: VarId,
        size: i64,
        offset: i64,
    ) -> Result<()> {
        let v = self.prog.var(vid);
        let (name, is_global, voff) = (v.name.clone(), v.is_global, v.offset);
        if is_global {
            self.emit(format!("LOAD_{size}_FROM_GLOBAL {name}, {offset}"));
        } else {
            self.emit(format!("LOAD_{size}_FROM_LOCAL {voff}+{offset}"));
        }
        Ok(())
    }

    fn emit_const(&mut self, cid: ConstId) -> Result<()> {
        let c = self.prog.konst(cid);
        let (val, iota_index, name) = (c.val.clone(), c.iota_index, c.name.clone());
        self.emit(format!("# constant {name}"));
        if let Expr::Ident { name, .. } = &val {
            if name == "iota" {
                self.emit(format!("LOAD_NUMBER {iota_index} # iota"));
                return Ok(());
            }
        }
        self.emit_expr(&val)
    }

    // ── operators ───────────────────────────────────────────────

    fn is_byte(&self, t: Option<TypeId>) -> bool {
        t.map(|t| matches!(self.prog.types.kind(self.prog.types.underlying(t)), GtypeKind::Byte))
            .unwrap_or(false)
    }

    fn emit_binop(&mut self, e: &Expr) -> Result<()> {
        let Expr::Binop {
            op,
            left,
            right,
            span,
            ..
        } = e
        else {
            unreachable!()
        };
        let lt = self.expr_type(left);
        let left_is_string = lt.map(|t| self.prog.types.is_string(t)).unwrap_or(false);

        if *op == BinOp::Add && left_is_string {
            return self.emit_string_concat(left, right);
        }
        if op.is_comparison() {
            if left_is_string {
                return self.emit_compare_strings(*op, left, right, *span);
            }
            let inst = match op {
                BinOp::Lt => "setl",
                BinOp::Gt => "setg",
                BinOp::Le => "setle",
                BinOp::Ge => "setge",
                BinOp::Ne => "setne",
                BinOp::Eq => "sete",
                _ => unreachable!(),
            };
            return self.emit_comp_primitive(inst, left, right);
        }
        match op {
            BinOp::AndAnd => {
                let label_end = self.make_label();
                self.emit_expr(left)?;
                self.emit("TEST_IT");
                self.emit("LOAD_NUMBER 0");
                self.emit(format!("je {label_end}"));
                self.emit_expr(right)?;
                self.emit("TEST_IT");
                self.emit("LOAD_NUMBER 0");
                self.emit(format!("je {label_end}"));
                self.emit("LOAD_NUMBER 1");
                self.emit(format!("{label_end}:"));
            }
            BinOp::OrOr => {
                let label_end = self.make_label();
                self.emit_expr(left)?;
                self.emit("TEST_IT");
                self.emit("LOAD_NUMBER 1");
                self.emit(format!("jne {label_end}"));
                self.emit_expr(right)?;
                self.emit("TEST_IT");
                self.emit("LOAD_NUMBER 1");
                self.emit(format!("jne {label_end}"));
                self.emit("LOAD_NUMBER 0");
                self.emit(format!("{label_end}:"));
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                self.emit_expr(left)?;
                self.emit("PUSH_8");
                self.emit_expr(right)?;
                self.emit("PUSH_8");
                match op {
                    BinOp::Add => self.emit("SUM_FROM_STACK"),
                    BinOp::Sub => self.emit("SUB_FROM_STACK"),
                    BinOp::Mul => self.emit("IMUL_FROM_STACK"),
                    BinOp::Mod => {
                        self.emit("pop %rcx");
                        self.emit("pop %rax");
                        self.emit("mov $0, %rdx");
                        self.emit("div %rcx");
                        self.emit("mov %rdx, %rax");
                    }
                    BinOp::Div => {
                        self.emit("pop %rcx");
                        self.emit("pop %rax");
                        self.emit("mov $0, %rdx");
                        self.emit("div %rcx");
                    }
                    _ => unreachable!(),
                }
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    fn emit_comp_primitive(&mut self, inst: &str, left: &Expr, right: &Expr) -> Result<()> {
        self.emit("# integer comparison");
        self.emit_expr(left)?;
        if self.is_byte(self.expr_type(left)) {
            self.emit("CAST_BYTE_TO_INT");
        }
        self.emit("PUSH_8 # left");
        self.emit_expr(right)?;
        if self.is_byte(self.expr_type(right)) {
            self.emit("CAST_BYTE_TO_INT");
        }
        self.emit("PUSH_8 # right");
        self.emit(format!("CMP_FROM_STACK {inst}"));
        Ok(())
    }

    pub fn emit_empty_string(&mut self) {
        let label = self.intern_string("");
        self.emit(format!("LOAD_STRING_LITERAL {label}"));
    }

    fn emit_convert_nil_to_empty_string(&mut self) {
        self.emit("# convert nil to an empty string");
        self.emit("PUSH_8");
        self.emit("TEST_IT");
        self.emit("pop %rax");
        let label_end = self.make_label();
        self.emit(format!("jne {label_end} # jump if not nil"));
        self.emit_empty_string();
        self.emit(format!("{label_end}:"));
    }

    /// strcmp, with a nil guard substituting the empty string.
    pub fn emit_strings_equal_from_stack(&mut self, equal: bool) {
        self.emit("pop %rax # left string");
        self.emit_convert_nil_to_empty_string();
        self.emit("mov %rax, %rcx");
        self.emit("pop %rax # right string");
        self.emit("push %rcx");
        self.emit_convert_nil_to_empty_string();
        self.emit("PUSH_8");
        self.emit("POP_TO_ARG_0");
        self.emit("POP_TO_ARG_1");
        self.emit("FUNCALL strcmp");
        if equal {
            self.emit("CMP_EQ_ZERO");
        } else {
            self.emit("CMP_NE_ZERO");
        }
    }

    fn emit_compare_strings(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        span: crate::diag::Span,
    ) -> Result<()> {
        self.emit("# compare strings");
        let equal = match op {
            BinOp::Eq => true,
            BinOp::Ne => false,
            _ => return Err(self.tbi(span, "ordered comparison of strings")),
        };

        let label_else = self.make_label();
        let label_end = self.make_label();
        self.emit_expr(left)?;
        self.emit("CMP_EQ_ZERO");
        self.emit("TEST_IT");
        self.emit("LOAD_NUMBER 0");
        self.emit(format!("je {label_else}"));
        self.emit_empty_string();
        self.emit(format!("jmp {label_end}"));
        self.emit(format!("{label_else}:"));
        self.emit_expr(left)?;
        self.emit(format!("{label_end}:"));
        self.emit("PUSH_8");
        self.emit_expr(right)?;
        self.emit("PUSH_8");
        self.emit_strings_equal_from_stack(equal);
        Ok(())
    }

    /// `l + r` on strings: strlen(l) + strlen(r) + 1 bytes, two strcats.
    fn emit_string_concat(&mut self, left: &Expr, right: &Expr) -> Result<()> {
        self.emit("# string concatenation");
        self.emit_expr(left)?;
        self.emit("PUSH_8 # left string");
        self.emit("PUSH_8");
        self.emit("POP_TO_ARG_0");
        self.emit("FUNCALL strlen # left len");
        self.emit("PUSH_8 # left len");
        self.emit_expr(right)?;
        self.emit("PUSH_8 # right string");
        self.emit("PUSH_8");
        self.emit("POP_TO_ARG_0");
        self.emit("FUNCALL strlen # right len");
        self.emit("PUSH_8 # right len");

        self.emit("pop %rax # right len");
        self.emit("pop %rcx # right string");
        self.emit("pop %rbx # left len");
        self.emit("pop %rdx # left string");
        self.emit("push %rcx # right string");
        self.emit("push %rdx # left string");

        self.emit("add %rax, %rbx # len + len");
        self.emit("add $1, %rbx # null byte");
        self.emit("mov %rbx, %rax");
        self.emit("PUSH_8");
        self.emit("POP_TO_ARG_0");
        self.emit("FUNCALL iruntime.malloc");

        self.emit("PUSH_8");
        self.emit("POP_TO_ARG_0");
        self.emit("POP_TO_ARG_1");
        self.emit("FUNCALL strcat");

        self.emit("PUSH_8");
        self.emit("POP_TO_ARG_0");
        self.emit("POP_TO_ARG_1");
        self.emit("FUNCALL strcat");
        Ok(())
    }

    fn emit_uop(&mut self, e: &Expr) -> Result<()> {
        let Expr::Unop {
            op, operand, span, ..
        } = e
        else {
            unreachable!()
        };
        match op {
            UnOp::Addr => match operand.as_ref() {
                Expr::Ident {
                    rel: Some(Resolved::Var(vid)),
                    ..
                } => {
                    self.emit_variable_addr(*vid, 0)?;
                }
                Expr::CompositeLit {
                    gtype, hidden_var, ..
                } => {
                    // materialise the literal in its hidden local, then copy
                    // it to the heap so the address survives the frame
                    let vid = hidden_var
                        .ok_or_else(|| self.internal(*span, "literal has no hidden local"))?;
                    let t = gtype
                        .ok_or_else(|| self.internal(*span, "untyped composite literal"))?;
                    let hidden = self.var_expr(vid, t);
                    let under = self.prog.types.underlying(t);
                    match self.prog.types.kind(under).clone() {
                        GtypeKind::Struct { .. } => {
                            self.assign_to_struct(&hidden, Some(operand))?
                        }
                        GtypeKind::Array { .. } => {
                            self.assign_to_array(&hidden, Some(operand))?
                        }
                        _ => {
                            return Err(
                                self.tbi(*span, "address of a slice or map literal")
                            );
                        }
                    }
                    let size = self.prog.types.byte_size(t);
                    self.emit_call_malloc(size);
                    self.emit("PUSH_8 # heap copy");
                    self.emit_variable_addr(vid, 0)?;
                    self.emit("PUSH_8 # hidden local");
                    self.emit_copy_struct_from_stack(size);
                }
                Expr::Field { .. } => {
                    self.emit_field_addr(operand)?;
                }
                other => {
                    return Err(self.tbi(other.span(), "address of this expression"));
                }
            },
            UnOp::Deref => {
                self.emit_expr(operand)?;
                self.emit("LOAD_8_BY_DEREF");
            }
            UnOp::Not => {
                self.emit_expr(operand)?;
                self.emit("CMP_EQ_ZERO");
            }
            UnOp::Neg => {
                // -(x) is (-1) * x
                self.emit("LOAD_NUMBER -1");
                self.emit("PUSH_8");
                self.emit_expr(operand)?;
                self.emit("PUSH_8");
                self.emit("IMUL_FROM_STACK");
            }
        }
        Ok(())
    }

    /// Synthetic variable reference, used when assignment helpers need an
    /// l-value expression for a compiler-created local.
    pub fn var_expr(&self, vid: VarId, gtype: TypeId) -> Expr {
        let v = self.prog.var(vid);
        Expr::Ident {
            pkg: None,
            name: v.name.clone(),
            rel: Some(Resolved::Var(vid)),
            gtype: Some(gtype),
            span: v.span,
        }
    }

    /// Expects (dst, src) pushed with src on top.
    pub fn emit_copy_struct_from_stack(&mut self, size: i64) {
        self.emit("pop %rbx # copy source");
        self.emit("pop %rax # copy destination");
        let mut i = 0;
        while i + 8 <= size {
            self.emit(format!("movq {i}(%rbx), %rcx"));
            self.emit(format!("movq %rcx, {i}(%rax)"));
            i += 8;
        }
        while i < size {
            self.emit(format!("movb {i}(%rbx), %cl"));
            self.emit(format!("movb %cl, {i}(%rax)"));
            i += 1;
        }
    }

    pub fn emit_addr_of(&mut self, e: &Expr) -> Result<()> {
        match e {
            Expr::Ident {
                rel: Some(Resolved::Var(vid)),
                ..
            } => self.emit_variable_addr(*vid, 0),
            Expr::Field { .. } => self.emit_field_addr(e),
            Expr::Unop {
                op: UnOp::Deref,
                operand,
                ..
            } => self.emit_expr(operand),
            other => Err(self.tbi(other.span(), "address of this expression")),
        }
    }

    fn emit_field_addr(&mut self, e: &Expr) -> Result<()> {
        let Expr::Field {
            strct, name, span, ..
        } = e
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
            self.emit_expr(strct)?;
        } else {
            self.emit_addr_of(strct)?;
        }
        self.emit(format!("ADD_NUMBER {offset}"));
        Ok(())
    }

    // ── struct field loads ──────────────────────────────────────

    pub fn emit_struct_field(&mut self, e: &Expr) -> Result<()> {
        let Expr::Field {
            strct, name, span, ..
        } = e
        else {
            unreachable!()
        };
        self.emit("# load struct field");
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
        let fsize = self.prog.types.byte_size(field.gtype);
        let under = self.prog.types.underlying(st);

        if matches!(self.prog.types.kind(under), GtypeKind::Ptr { .. }) {
            self.emit_expr(strct)?;
            self.emit(format!("ADD_NUMBER {offset}"));
            if self.prog.types.is_24width(field.gtype) {
                self.emit("LOAD_24_BY_DEREF");
            } else if fsize == 1 {
                self.emit("LOAD_1_BY_DEREF");
            } else {
                self.emit("LOAD_8_BY_DEREF");
            }
            return Ok(());
        }

        let fkind = self.prog.types.kind(self.prog.types.underlying(field.gtype)).clone();
        match fkind {
            GtypeKind::Array { .. } | GtypeKind::Struct { .. } => {
                // arrays and nested structs load as their address
                self.emit_addr_of(strct)?;
                self.emit(format!("ADD_NUMBER {offset}"));
            }
            _ if self.prog.types.is_24width(field.gtype) => {
                self.emit_addr_of(strct)?;
                self.emit(format!("ADD_NUMBER {offset}"));
                self.emit("LOAD_24_BY_DEREF");
            }
            _ => {
                self.emit_offset_load(strct, fsize.min(8), offset)?;
            }
        }
        Ok(())
    }

    /// Loads `size` bytes found at `offset` inside the location `lhs`.
    pub fn emit_offset_load(&mut self, lhs: &Expr, size: i64, offset: i64) -> Result<()> {
        match lhs {
            Expr::Ident {
                rel: Some(Resolved::Var(vid)),
                ..
            } => self.emit_variable_offset_load(*vid, size, offset),
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
                let under = self.prog.types.underlying(st);
                if matches!(self.prog.types.kind(under), GtypeKind::Ptr { .. }) {
                    self.emit_expr(strct)?;
                    self.emit(format!("ADD_NUMBER {}", foffset + offset));
                    self.emit("LOAD_8_BY_DEREF");
                    Ok(())
                } else {
                    self.emit_offset_load(strct, size, foffset + offset)
                }
            }
            Expr::Index {
                collection, index, ..
            } => self.load_collect_index(collection, index, offset),
            Expr::MethodCall { span, .. } => {
                self.emit_method_call(lhs)?;
                self.emit(format!("ADD_NUMBER {offset}"));
                self.emit("LOAD_8_BY_DEREF");
                let _ = span;
                Ok(())
            }
            other => Err(self.internal(other.span(), "not an addressable location")),
        }
    }

    // ── indexing and slicing ────────────────────────────────────

    pub fn load_collect_index(
        &mut self,
        collection: &Expr,
        index: &Expr,
        offset: i64,
    ) -> Result<()> {
        let ct = self.expr_type_req(collection)?;
        let under = self.prog.types.underlying(ct);
        match self.prog.types.kind(under).clone() {
            GtypeKind::Array { elem, .. } | GtypeKind::Slice { elem } => {
                let elm_size = self.prog.types.byte_size(elem);
                self.emit_expr(collection)?;
                self.emit("PUSH_8 # head");
                self.emit_expr(index)?;
                self.emit(format!("IMUL_NUMBER {elm_size}"));
                self.emit("PUSH_8 # index * elmSize");
                self.emit("SUM_FROM_STACK");
                self.emit(format!("ADD_NUMBER {offset}"));
                if self.prog.types.is_24width(elem) {
                    self.emit("LOAD_24_BY_DEREF");
                } else if elm_size == 1 {
                    self.emit("LOAD_1_BY_DEREF");
                } else {
                    self.emit("LOAD_8_BY_DEREF");
                }
                Ok(())
            }
            GtypeKind::Map { .. } => self.load_map_index(collection, index),
            GtypeKind::String => {
                self.emit("# load byte from string");
                self.emit_expr(collection)?;
                self.emit("PUSH_8");
                self.emit_expr(index)?;
                self.emit("PUSH_8");
                self.emit("SUM_FROM_STACK");
                self.emit(format!("ADD_NUMBER {offset}"));
                self.emit("LOAD_1_BY_DEREF");
                Ok(())
            }
            _ => Err(self.tbi(collection.span(), "indexing this type")),
        }
    }

    fn emit_slice_expr(&mut self, e: &Expr) -> Result<()> {
        let Expr::SliceExpr { collection, .. } = e else {
            unreachable!()
        };
        let ct = self.expr_type_req(collection)?;
        if self.prog.types.is_string(ct) {
            self.emit_substring(e)
        } else {
            self.emit_slice_of_collection(e)
        }
    }

    /// `s[low:high]` on a string: allocate `high-low+1` bytes and copy.
    fn emit_substring(&mut self, e: &Expr) -> Result<()> {
        let Expr::SliceExpr {
            collection,
            low,
            high,
            ..
        } = e
        else {
            unreachable!()
        };
        self.emit("# substring");
        // source address + low
        self.emit_expr(collection)?;
        self.emit("PUSH_8");
        self.emit_expr(low)?;
        self.emit("PUSH_8");
        self.emit("SUM_FROM_STACK");
        self.emit("PUSH_8 # src");

        // allocate high - low + 1
        self.emit_high_bound(high.as_deref(), collection)?;
        self.emit("PUSH_8");
        self.emit_expr(low)?;
        self.emit("PUSH_8");
        self.emit("SUB_FROM_STACK");
        self.emit("ADD_NUMBER 1");
        self.emit("PUSH_8");
        self.emit("POP_TO_ARG_0");
        self.emit("FUNCALL iruntime.malloc");
        self.emit("PUSH_8 # dst");

        // new strlen
        self.emit_high_bound(high.as_deref(), collection)?;
        self.emit("PUSH_8");
        self.emit_expr(low)?;
        self.emit("PUSH_8");
        self.emit("SUB_FROM_STACK");
        self.emit("PUSH_8 # len");

        self.emit("POP_TO_ARG_2");
        self.emit("POP_TO_ARG_1");
        self.emit("POP_TO_ARG_0");
        self.emit("FUNCALL iruntime.strcopy");
        Ok(())
    }

    /// Upper bound of a slice expression: the written high index, or the
    /// collection's length.
    fn emit_high_bound(&mut self, high: Option<&Expr>, collection: &Expr) -> Result<()> {
        match high {
            Some(h) => self.emit_expr(h),
            None => self.emit_len(collection),
        }
    }

    fn emit_slice_of_collection(&mut self, e: &Expr) -> Result<()> {
        let Expr::SliceExpr {
            collection,
            low,
            high,
            max,
            ..
        } = e
        else {
            unreachable!()
        };
        let ct = self.expr_type_req(collection)?;
        let elem = self
            .prog
            .types
            .elem_of(ct)
            .ok_or_else(|| self.tbi(collection.span(), "slicing this type"))?;
        let size = self.prog.types.byte_size(elem);

        self.emit("# build slice header");
        self.emit_expr(collection)?;
        self.emit("PUSH_8 # head");
        self.emit_expr(low)?;
        self.emit("PUSH_8 # low");
        self.emit(format!("LOAD_NUMBER {size}"));
        self.emit("PUSH_8");
        self.emit("IMUL_FROM_STACK");
        self.emit("PUSH_8");
        self.emit("SUM_FROM_STACK");
        self.emit("PUSH_8 # ptr");

        self.emit("# len = high - low");
        self.emit_high_bound(high.as_deref(), collection)?;
        self.emit("PUSH_8");
        self.emit_expr(low)?;
        self.emit("PUSH_8");
        self.emit("SUB_FROM_STACK");
        self.emit("PUSH_8 # len");

        self.emit("# cap = (max or cap) - low");
        match max {
            Some(m) => self.emit_expr(m)?,
            None => self.emit_cap(collection)?,
        }
        self.emit("PUSH_8");
        self.emit_expr(low)?;
        self.emit("PUSH_8");
        self.emit("SUB_FROM_STACK");
        self.emit("PUSH_8 # cap");
        self.emit("POP_SLICE");
        Ok(())
    }

    // ── len / cap ───────────────────────────────────────────────

    pub fn emit_len(&mut self, arg: &Expr) -> Result<()> {
        self.emit("# len()");
        let t = self.expr_type_req(arg)?;
        let under = self.prog.types.underlying(t);
        match self.prog.types.kind(under).clone() {
            GtypeKind::Array { len, .. } => {
                self.emit(format!("LOAD_NUMBER {len}"));
            }
            GtypeKind::Slice { .. } => match arg {
                Expr::CompositeLit { elems, .. } => {
                    self.emit(format!("LOAD_NUMBER {}", elems.len()));
                }
                Expr::Ident { .. } | Expr::Field { .. } | Expr::Index { .. } => {
                    self.emit_offset_load(arg, 8, 8)?;
                }
                _ => {
                    self.emit_expr(arg)?;
                    self.emit("mov %rbx, %rax # len word");
                }
            },
            GtypeKind::Map { .. } => match arg {
                Expr::CompositeLit { .. } => {
                    return Err(self.tbi(arg.span(), "len of a map literal"));
                }
                Expr::Ident { .. } | Expr::Field { .. } | Expr::Index { .. } => {
                    self.emit_offset_load(arg, 8, 8)?;
                }
                _ => {
                    self.emit_expr(arg)?;
                    self.emit("mov %rbx, %rax # len word");
                }
            },
            GtypeKind::String => {
                self.emit_expr(arg)?;
                self.emit("PUSH_8");
                self.emit("POP_TO_ARG_0");
                self.emit("FUNCALL strlen");
            }
            _ => return Err(self.tbi(arg.span(), "len of this type")),
        }
        Ok(())
    }

    pub fn emit_cap(&mut self, arg: &Expr) -> Result<()> {
        self.emit("# cap()");
        let t = self.expr_type_req(arg)?;
        let under = self.prog.types.underlying(t);
        match self.prog.types.kind(under).clone() {
            GtypeKind::Array { len, .. } => {
                self.emit(format!("LOAD_NUMBER {len}"));
            }
            GtypeKind::Slice { .. } => match arg {
                Expr::CompositeLit { elems, .. } => {
                    self.emit(format!("LOAD_NUMBER {}", elems.len()));
                }
                Expr::Ident { .. } | Expr::Field { .. } | Expr::Index { .. } => {
                    self.emit_offset_load(arg, 8, 16)?;
                }
                _ => {
                    self.emit_expr(arg)?;
                    self.emit("mov %rcx, %rax # cap word");
                }
            },
            _ => return Err(self.tbi(arg.span(), "cap of this type")),
        }
        Ok(())
    }

    // ── slice literals ──────────────────────────────────────────

    /// Leaves (ptr, len, cap) in the result registers.
    pub fn emit_slice_literal(&mut self, e: &Expr) -> Result<()> {
        let Expr::CompositeLit {
            elems, gtype, span, ..
        } = e
        else {
            unreachable!()
        };
        self.emit("# slice literal");
        let t = gtype.ok_or_else(|| self.internal(*span, "untyped slice literal"))?;
        let elem = self
            .prog
            .types
            .elem_of(t)
            .ok_or_else(|| self.internal(*span, "slice literal without element type"))?;
        let elm_size = self.prog.types.byte_size(elem);
        let elem_is_iface = self.prog.types.is_interface(elem);
        let length = elems.len() as i64;

        self.emit_call_malloc(elm_size * length.max(1));
        self.emit("PUSH_8 # ptr");
        for (i, el) in elems.iter().enumerate() {
            let LitElem::Plain(value) = el else {
                return Err(self.internal(*span, "keyed element in slice literal"));
            };
            let vt = self.expr_type(value);
            let v_is_iface = vt.map(|t| self.prog.types.is_interface(t)).unwrap_or(false);
            if elem_is_iface && !v_is_iface {
                self.emit_conversion_to_interface(value)?;
            } else {
                self.emit_expr(value)?;
            }
            self.emit("pop %r10 # ptr");
            let base = elm_size * i as i64;
            if elm_size == 24 {
                self.emit(format!("mov %rax, {base}(%r10)"));
                self.emit(format!("mov %rbx, {}(%r10)", base + 8));
                self.emit(format!("mov %rcx, {}(%r10)", base + 16));
            } else if elm_size == 1 {
                self.emit(format!("movb %al, {base}(%r10)"));
            } else {
                self.emit(format!("mov %rax, {base}(%r10)"));
            }
            self.emit("push %r10 # ptr");
        }
        self.emit("pop %rax # ptr");
        self.emit(format!("mov ${length}, %rbx # len"));
        self.emit(format!("mov ${length}, %rcx # cap"));
        Ok(())
    }

    // ── type assertion ──────────────────────────────────────────

    /// `e.(T)`: compare the dynamic-type descriptor against T's descriptor
    /// by string equality; on success dereference the boxed value, on
    /// failure leave zero. ok lands in %rbx (8-wide T) or %rdx (24-wide T).
    pub fn emit_type_assert(&mut self, e: &Expr) -> Result<()> {
        let Expr::TypeAssert {
            expr,
            target_ty,
            span,
            ..
        } = e
        else {
            unreachable!()
        };
        let target = target_ty.ok_or_else(|| self.internal(*span, "unresolved assert target"))?;
        let et = self.expr_type_req(expr)?;
        if !self.prog.types.is_interface(et) {
            return Err(crate::diag::CompileError::new(
                &self.prog.smap,
                *span,
                crate::diag::DiagKind::Type,
                "type assertion on a non-interface value",
            ));
        }
        if self.prog.types.is_interface(target) {
            return Err(self.tbi(*span, "asserting to an interface type"));
        }
        let is24 = self.prog.types.is_24width(target);
        let ok_reg = if is24 { "rdx" } else { "rbx" };

        self.emit("# type assertion");
        self.emit_expr(expr)?; // rax=ptr rbx=receiverTypeId rcx=descriptor
        self.emit("PUSH_8 # boxed value ptr");
        let label = self.dtype_label(target);
        let tstr = self.prog.types.string(target);
        self.emit(format!("lea {label}(%rip), %rax # type: {tstr}"));
        self.emit("push %rcx # dynamic descriptor");
        self.emit("PUSH_8");
        self.emit_strings_equal_from_stack(true);
        self.emit(format!("mov %rax, %{ok_reg} # ok"));
        self.emit("pop %rax # boxed value ptr");

        let label_fail = self.make_label();
        let label_end = self.make_label();
        self.emit("TEST_IT");
        self.emit(format!("je {label_fail} # nil interface"));
        self.emit(format!("push %rax; mov %{ok_reg}, %rax"));
        self.emit("TEST_IT");
        self.emit("pop %rax");
        self.emit(format!("je {label_fail} # descriptor mismatch"));
        if is24 {
            self.emit("LOAD_24_BY_DEREF");
        } else {
            self.emit("LOAD_8_BY_DEREF");
        }
        self.emit(format!("jmp {label_end}"));
        self.emit(format!("{label_fail}:"));
        if is24 {
            self.emit("mov $0, %rax");
            self.emit("mov $0, %rbx");
            self.emit("mov $0, %rcx");
        } else {
            self.emit("mov $0, %rax");
        }
        self.emit(format!("{label_end}:"));
        Ok(())
    }

    // ── calls ───────────────────────────────────────────────────

    fn emit_call(&mut self, callee: &Expr, args: &[Expr], span: crate::diag::Span) -> Result<()> {
        let rel = match callee {
            Expr::Ident { rel, .. } => *rel,
            _ => None,
        };
        match rel {
            Some(Resolved::Type(target)) => self.emit_conversion(target, args, span),
            Some(Resolved::Func(fid)) => {
                let f = self.prog.func(fid);
                match f.builtin {
                    Some(b) => self.emit_builtin_call(b, args, span),
                    None => {
                        let symbol = f.symbol.clone();
                        let refs: Vec<&Expr> = args.iter().collect();
                        self.emit_static_call(&symbol, Some(fid), &refs, false)
                    }
                }
            }
            _ => Err(self.tbi(span, "calling a function value")),
        }
    }

    fn emit_conversion(
        &mut self,
        target: TypeId,
        args: &[Expr],
        span: crate::diag::Span,
    ) -> Result<()> {
        let arg = args
            .first()
            .ok_or_else(|| self.internal(span, "conversion without operand"))?;
        self.emit("# conversion");
        if self.prog.types.is_string(target) {
            // string(bs): nil becomes the empty string
            let label_end = self.make_label();
            self.emit_expr(arg)?;
            self.emit("TEST_IT");
            self.emit(format!("jne {label_end}"));
            self.emit_empty_string();
            self.emit(format!("{label_end}:"));
            return Ok(());
        }
        let under = self.prog.types.underlying(target);
        if matches!(self.prog.types.kind(under), GtypeKind::Slice { .. }) {
            return Err(self.tbi(span, "conversion to a slice outside assignment"));
        }
        self.emit_expr(arg)
    }

    fn emit_builtin_call(
        &mut self,
        b: Builtin,
        args: &[Expr],
        span: crate::diag::Span,
    ) -> Result<()> {
        match b {
            Builtin::Len => self.emit_len(&args[0]),
            Builtin::Cap => self.emit_cap(&args[0]),
            Builtin::Append => self.emit_append(args, span),
            Builtin::Make => self.emit_make(args, span),
            Builtin::Println => self.emit_print_builtin(args, true),
            Builtin::Print => self.emit_print_builtin(args, false),
            Builtin::DumpSlice => {
                let arg = args
                    .first()
                    .ok_or_else(|| self.internal(span, "dumpSlice without an argument"))?;
                let fmt = self.intern_string("ptr=%p len=%d cap=%d\n");
                self.emit(format!("lea {fmt}(%rip), %rax"));
                self.emit("PUSH_8");
                self.emit_expr(arg)?;
                self.emit("PUSH_SLICE");
                for i in (0..4).rev() {
                    self.emit(format!("POP_TO_ARG_{i}"));
                }
                self.emit("FUNCALL printf");
                self.emit_newline();
                Ok(())
            }
            Builtin::DumpInterface => {
                let arg = args
                    .first()
                    .ok_or_else(|| self.internal(span, "dumpInterface without an argument"))?;
                let fmt = self.intern_string("ptr=%p receiverTypeId=%d dtype=%s\n");
                self.emit(format!("lea {fmt}(%rip), %rax"));
                self.emit("PUSH_8");
                self.emit_expr(arg)?;
                self.emit("PUSH_INTERFACE");
                for i in (0..4).rev() {
                    self.emit(format!("POP_TO_ARG_{i}"));
                }
                self.emit("FUNCALL printf");
                self.emit_newline();
                Ok(())
            }
            Builtin::AssertInterface => {
                let arg = args
                    .first()
                    .ok_or_else(|| self.internal(span, "assertInterface without an argument"))?;
                self.emit("# assertInterface");
                let label_end = self.make_label();
                self.emit_expr(arg)?; // rax=ptr rbx=id rcx=descriptor
                // (ptr != nil && descriptor == nil) is a broken interface
                self.emit("CMP_NE_ZERO");
                self.emit("TEST_IT");
                self.emit(format!("je {label_end}"));
                self.emit("mov %rcx, %rax");
                self.emit("CMP_EQ_ZERO");
                self.emit("TEST_IT");
                self.emit(format!("je {label_end}"));
                let slabel = self.make_label();
                self.emit(".data 0");
                self.emit_noindent(format!("{slabel}:"));
                self.emit(".string \"assertInterface failed\"");
                self.emit(".text");
                self.emit(format!("lea {slabel}(%rip), %rax"));
                self.emit("PUSH_8");
                self.emit("POP_TO_ARG_0");
                self.emit("FUNCALL .panic");
                self.emit_noindent(format!("{label_end}:"));
                self.emit_newline();
                Ok(())
            }
            Builtin::AsComment => {
                if let Some(Expr::Str { val, .. }) = args.first() {
                    let val = val.clone();
                    self.emit_noindent(format!("# {val}"));
                }
                Ok(())
            }
        }
    }

    /// append(s, x) dispatches on the element width to the runtime helpers.
    fn emit_append(&mut self, args: &[Expr], span: crate::diag::Span) -> Result<()> {
        if args.len() != 2 {
            return Err(self.internal(span, "append() should take 2 arguments"));
        }
        let (slice, value) = (&args[0], &args[1]);
        let st = self.expr_type_req(slice)?;
        let elem = self
            .prog
            .types
            .elem_of(st)
            .ok_or_else(|| self.internal(span, "append on a non-slice"))?;
        let elm_size = self.prog.types.byte_size(elem);
        let sstr = self.prog.types.string(st);
        self.emit(format!("# append({sstr}, ...)"));

        let symbol = match elm_size {
            1 => "iruntime.append1",
            8 => "iruntime.append8",
            24 => "iruntime.append24",
            _ => return Err(self.tbi(span, "append with this element size")),
        };

        self.emit_expr(slice)?;
        self.emit("PUSH_SLICE");
        let mut num_regs = 3;
        if elm_size == 24 {
            let vt = self.expr_type(value);
            let v_is_iface = vt.map(|t| self.prog.types.is_interface(t)).unwrap_or(false);
            if self.prog.types.is_interface(elem) && !v_is_iface {
                self.emit_conversion_to_interface(value)?;
            } else {
                self.emit_expr(value)?;
            }
            self.emit("PUSH_INTERFACE");
            num_regs += 3;
        } else {
            self.emit_expr(value)?;
            self.emit("PUSH_8");
            num_regs += 1;
        }
        for i in (0..num_regs).rev() {
            self.emit(format!("POP_TO_ARG_{i}"));
        }
        self.emit(format!("FUNCALL {symbol}"));
        self.emit_newline();
        Ok(())
    }

    /// make([]T, len[, cap]) lowers to iruntime.makeSlice(len, cap, elmSize).
    fn emit_make(&mut self, args: &[Expr], span: crate::diag::Span) -> Result<()> {
        let t = self
            .expr_type(args.first().ok_or_else(|| self.internal(span, "make without type"))?)
            .ok_or_else(|| self.internal(span, "make with unresolved type"))?;
        let elem = self
            .prog
            .types
            .elem_of(t)
            .ok_or_else(|| self.internal(span, "make on a non-slice"))?;
        let elm_size = self.prog.types.byte_size(elem);

        self.emit("# make slice");
        match args.get(1) {
            Some(l) => self.emit_expr(l)?,
            None => self.emit("LOAD_NUMBER 0"),
        }
        self.emit("PUSH_8 # len");
        match args.get(2).or(args.get(1)) {
            Some(c) => self.emit_expr(c)?,
            None => self.emit("LOAD_NUMBER 0"),
        }
        self.emit("PUSH_8 # cap");
        self.emit(format!("LOAD_NUMBER {elm_size}"));
        self.emit("PUSH_8 # elmSize");
        self.emit("POP_TO_ARG_2");
        self.emit("POP_TO_ARG_1");
        self.emit("POP_TO_ARG_0");
        self.emit("FUNCALL iruntime.makeSlice");
        self.emit_newline();
        Ok(())
    }

    /// println/print dispatch at compile time on the argument type.
    fn emit_print_builtin(&mut self, args: &[Expr], newline: bool) -> Result<()> {
        let base = if newline { ".println" } else { ".print" };
        match args.first() {
            None => {
                self.emit_empty_string();
                self.emit("PUSH_8");
                self.emit("POP_TO_ARG_0");
                self.emit(format!("FUNCALL {base}_cstr"));
            }
            Some(arg) => {
                let t = self.expr_type_req(arg)?;
                if self.prog.types.is_24width(t) {
                    return Err(self.tbi(arg.span(), "printing a 24-wide value"));
                }
                let suffix = if self.prog.types.is_string(t) {
                    "_cstr"
                } else {
                    "_int"
                };
                self.emit_expr(arg)?;
                self.emit("PUSH_8");
                self.emit("POP_TO_ARG_0");
                self.emit(format!("FUNCALL {base}{suffix}"));
            }
        }
        self.emit_newline();
        Ok(())
    }

    pub fn emit_method_call(&mut self, e: &Expr) -> Result<()> {
        let Expr::MethodCall {
            receiver,
            name,
            args,
            span,
            ..
        } = e
        else {
            unreachable!()
        };
        let rt = self.expr_type_req(receiver)?;
        if self.prog.types.is_interface(rt) {
            return self.emit_interface_method_call(receiver, name, args);
        }
        let owner = self
            .prog
            .types
            .method_owner(rt)
            .ok_or_else(|| self.internal(*span, "method call on a type without methods"))?;
        let fid = self
            .prog
            .types
            .get(owner)
            .methods
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| *f)
            .ok_or_else(|| {
                self.internal(
                    *span,
                    format!(
                        "method {} is not found in type {}",
                        name,
                        self.prog.types.string(rt)
                    ),
                )
            })?;
        let symbol = self.prog.func(fid).symbol.clone();
        let mut refs: Vec<&Expr> = vec![receiver];
        refs.extend(args.iter());
        self.emit_static_call(&symbol, Some(fid), &refs, true)
    }
}
