//! Type inference.
//!
//! Runs after resolution and drains the uninferred declarations: globals
//! first, then every function body in declaration order. A node's type
//! derives from its children; literals inherit the expected type of the
//! context where one exists, composite literals carry their declared type,
//! binary operators take the left operand's type, calls take the callee's
//! first return.

use crate::ast::*;
use crate::diag::{CompileError, DiagKind, Result, Span};
use crate::ir::Program;
use crate::types::{GtypeKind, TypeId};

struct Inferencer<'a> {
    prog: &'a mut Program,
    rettypes: Vec<TypeId>,
}

pub fn infer(prog: &mut Program) -> Result<()> {
    let mut inf = Inferencer {
        prog,
        rettypes: Vec::new(),
    };

    // constants
    for i in 0..inf.prog.consts.len() {
        if inf.prog.consts[i].gtype.is_none() {
            let mut val = inf.prog.consts[i].val.clone();
            let t = inf.infer_expr(&mut val, None)?;
            inf.prog.consts[i].val = val;
            inf.prog.consts[i].gtype = t.or(Some(inf.prog.types.t_int));
        }
    }

    // uninferred globals
    for i in 0..inf.prog.globals.len() {
        let var = inf.prog.globals[i].var;
        let expected = inf.prog.var(var).gtype;
        let mut init = inf.prog.globals[i].init.take();
        if let Some(e) = &mut init {
            let t = inf.infer_expr(e, expected)?;
            if inf.prog.var(var).gtype.is_none() {
                let t = t.ok_or_else(|| {
                    inf.err(e.span(), "cannot infer type of global initialiser")
                })?;
                inf.prog.var_mut(var).gtype = Some(t);
            }
        }
        inf.prog.globals[i].init = init;
    }

    // uninferred locals, one function at a time
    for i in 0..inf.prog.funcs.len() {
        let mut body = std::mem::take(&mut inf.prog.funcs[i].body);
        inf.rettypes = inf.prog.funcs[i].rettypes.clone();
        for st in body.iter_mut() {
            inf.infer_stmt(st)?;
        }
        inf.prog.funcs[i].body = body;
    }
    Ok(())
}

impl<'a> Inferencer<'a> {
    fn err(&self, span: Span, msg: impl Into<String>) -> CompileError {
        CompileError::new(&self.prog.smap, span, DiagKind::Type, msg)
    }

    /// Type of an already-inferred expression; literals have intrinsic types.
    fn typed(&self, e: &Expr) -> Option<TypeId> {
        match e {
            Expr::Num { .. } => Some(self.prog.types.t_int),
            Expr::Str { .. } => Some(self.prog.types.t_string),
            Expr::Nil { .. } => Some(self.prog.types.t_nil),
            other => other.gtype(),
        }
    }

    fn set_var_type(&mut self, left: &mut Expr, t: Option<TypeId>) {
        if let Expr::Ident {
            rel: Some(Resolved::Var(vid)),
            gtype,
            ..
        } = left
        {
            if self.prog.var(*vid).gtype.is_none() {
                self.prog.var_mut(*vid).gtype = t;
            }
            *gtype = self.prog.var(*vid).gtype;
        }
    }

    fn infer_stmt(&mut self, s: &mut Stmt) -> Result<()> {
        match s {
            Stmt::VarDecl {
                var, init, span, ..
            } => {
                let vid = var.expect("declared by resolution");
                let expected = self.prog.var(vid).gtype;
                if let Some(e) = init {
                    let t = self.infer_expr(e, expected)?;
                    if expected.is_none() {
                        let t = t.ok_or_else(|| {
                            self.err(*span, "cannot infer variable type from initialiser")
                        })?;
                        self.prog.var_mut(vid).gtype = Some(t);
                    }
                }
            }
            Stmt::Assign {
                lefts,
                rights,
                span,
                ..
            } => {
                self.infer_assign(lefts, rights, *span)?;
            }
            Stmt::Expr { expr, .. } => {
                self.infer_expr(expr, None)?;
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                if let Some(st) = init {
                    self.infer_stmt(st)?;
                }
                self.infer_expr(cond, Some(self.prog.types.t_bool))?;
                for st in then.iter_mut() {
                    self.infer_stmt(st)?;
                }
                if let Some(e) = els {
                    self.infer_stmt(e)?;
                }
            }
            Stmt::Block { stmts, .. } => {
                for st in stmts.iter_mut() {
                    self.infer_stmt(st)?;
                }
            }
            Stmt::For { kind, body, .. } => {
                match kind {
                    ForKind::Clause { init, cond, post } => {
                        if let Some(st) = init {
                            self.infer_stmt(st)?;
                        }
                        if let Some(c) = cond {
                            self.infer_expr(c, Some(self.prog.types.t_bool))?;
                        }
                        if let Some(st) = post {
                            self.infer_stmt(st)?;
                        }
                    }
                    ForKind::Range {
                        index,
                        value,
                        expr,
                        ..
                    } => {
                        let span = expr.span();
                        let ct = self
                            .infer_expr(expr, None)?
                            .ok_or_else(|| self.err(span, "cannot range over untyped value"))?;
                        let under = self.prog.types.underlying(ct);
                        let (index_t, value_t) = match self.prog.types.kind(under).clone() {
                            GtypeKind::Map { key, value } => (key, value),
                            GtypeKind::Array { elem, .. } | GtypeKind::Slice { elem } => {
                                (self.prog.types.t_int, elem)
                            }
                            _ => {
                                return Err(self.err(
                                    span,
                                    "range requires an array, slice, or map",
                                ));
                            }
                        };
                        if let Some(iv) = index {
                            self.set_var_type(iv, Some(index_t));
                        }
                        if let Some(vv) = value {
                            self.set_var_type(vv, Some(value_t));
                        }
                    }
                }
                for st in body.iter_mut() {
                    self.infer_stmt(st)?;
                }
            }
            Stmt::Switch {
                subject,
                type_subject,
                bind,
                cases,
                default,
                ..
            } => {
                let subject_t = match subject {
                    Some(e) => self.infer_expr(e, None)?,
                    None => None,
                };
                if let Some(e) = type_subject {
                    let t = self.infer_expr(e, None)?;
                    if let Some((_, Some(vid))) = bind {
                        if self.prog.var(*vid).gtype.is_none() {
                            self.prog.var_mut(*vid).gtype = t;
                        }
                    }
                }
                for case in cases.iter_mut() {
                    for e in case.exprs.iter_mut() {
                        self.infer_expr(e, subject_t)?;
                    }
                    for st in case.body.iter_mut() {
                        self.infer_stmt(st)?;
                    }
                }
                if let Some(stmts) = default {
                    for st in stmts.iter_mut() {
                        self.infer_stmt(st)?;
                    }
                }
            }
            Stmt::Return { exprs, span } => {
                let rettypes = self.rettypes.clone();
                if exprs.len() > 1 && exprs.len() != rettypes.len() {
                    return Err(self.err(
                        *span,
                        format!(
                            "wrong number of return values: {} instead of {}",
                            exprs.len(),
                            rettypes.len()
                        ),
                    ));
                }
                for (i, e) in exprs.iter_mut().enumerate() {
                    self.infer_expr(e, rettypes.get(i).copied())?;
                }
            }
            Stmt::Defer { expr, .. } => {
                self.infer_expr(expr, None)?;
            }
            Stmt::Inc { operand, .. } | Stmt::Dec { operand, .. } => {
                self.infer_expr(operand, Some(self.prog.types.t_int))?;
            }
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
        }
        Ok(())
    }

    fn infer_assign(
        &mut self,
        lefts: &mut [Expr],
        rights: &mut [Expr],
        span: Span,
    ) -> Result<()> {
        // v, ok := m[k]  /  v, ok := x.(T)  /  a, b := f()
        if rights.len() == 1 && lefts.len() > 1 {
            let right = &mut rights[0];
            match right {
                Expr::Index { .. } | Expr::TypeAssert { .. } => {
                    if lefts.len() > 2 {
                        return Err(self.err(span, "expected at most two values on the left"));
                    }
                    let t = self.infer_expr(right, None)?;
                    self.set_var_type(&mut lefts[0], t);
                    if !lefts[0].is_blank() {
                        self.infer_lvalue(&mut lefts[0])?;
                    }
                    let tbool = self.prog.types.t_bool;
                    self.set_var_type(&mut lefts[1], Some(tbool));
                }
                Expr::Call { .. } | Expr::MethodCall { .. } => {
                    self.infer_expr(right, None)?;
                    let rets = self.call_rettypes(right);
                    if rets.len() != lefts.len() {
                        return Err(self.err(
                            span,
                            format!(
                                "assignment mismatch: {} variables but {} values",
                                lefts.len(),
                                rets.len()
                            ),
                        ));
                    }
                    for (l, t) in lefts.iter_mut().zip(rets) {
                        self.set_var_type(l, Some(t));
                        if !l.is_blank() {
                            self.infer_lvalue(l)?;
                        }
                    }
                }
                _ => {
                    return Err(self.err(span, "assignment mismatch"));
                }
            }
            return Ok(());
        }

        if lefts.len() != rights.len() {
            return Err(self.err(
                span,
                format!(
                    "assignment mismatch: {} variables but {} values",
                    lefts.len(),
                    rights.len()
                ),
            ));
        }
        for (l, r) in lefts.iter_mut().zip(rights.iter_mut()) {
            let expected = if l.is_blank() {
                None
            } else {
                self.infer_lvalue(l)?
            };
            let t = self.infer_expr(r, expected)?;
            if expected.is_none() {
                self.set_var_type(l, t);
            }
        }
        Ok(())
    }

    /// Infers an assignment target. Fresh `:=` variables have no type yet,
    /// which is reported as `None` rather than an error.
    fn infer_lvalue(&mut self, l: &mut Expr) -> Result<Option<TypeId>> {
        if let Expr::Ident {
            rel: Some(Resolved::Var(vid)),
            gtype,
            ..
        } = l
        {
            let t = self.prog.var(*vid).gtype;
            *gtype = t;
            return Ok(t);
        }
        self.infer_expr(l, None)
    }

    fn call_rettypes(&self, call: &Expr) -> Vec<TypeId> {
        match call {
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Ident {
                    rel: Some(Resolved::Func(fid)),
                    ..
                } => self.prog.func(*fid).rettypes.clone(),
                _ => Vec::new(),
            },
            Expr::MethodCall { receiver, name, .. } => {
                let Some(rt) = self.typed(receiver) else {
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
                if let Some(owner) = self.prog.types.method_owner(rt) {
                    if let Some((_, fid)) = self
                        .prog
                        .types
                        .get(owner)
                        .methods
                        .iter()
                        .find(|(n, _)| n == name)
                    {
                        return self.prog.func(*fid).rettypes.clone();
                    }
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn infer_expr(&mut self, e: &mut Expr, expected: Option<TypeId>) -> Result<Option<TypeId>> {
        let t = match e {
            Expr::Num { .. } => expected.or(Some(self.prog.types.t_int)),
            Expr::Str { .. } => Some(self.prog.types.t_string),
            Expr::Nil { .. } => expected,
            Expr::Ident { rel, gtype, .. } => {
                let t = match rel {
                    Some(Resolved::Var(vid)) => self.prog.var(*vid).gtype,
                    Some(Resolved::Const(cid)) => self.prog.konst(*cid).gtype,
                    Some(Resolved::Func(_)) | Some(Resolved::Type(_)) => None,
                    None => None, // blank
                };
                *gtype = t;
                t
            }
            Expr::Binop {
                op,
                left,
                right,
                gtype,
                ..
            } => {
                let lt = self.infer_expr(left, None)?;
                self.infer_expr(right, lt)?;
                let t = if op.is_comparison() || matches!(op, BinOp::AndAnd | BinOp::OrOr) {
                    Some(self.prog.types.t_bool)
                } else {
                    lt.or(Some(self.prog.types.t_int))
                };
                *gtype = t;
                t
            }
            Expr::Unop {
                op,
                operand,
                gtype,
                span,
                ..
            } => {
                let ot = self.infer_expr(operand, None)?;
                let t = match op {
                    UnOp::Addr => {
                        let to = ot
                            .ok_or_else(|| self.err(*span, "cannot take address of untyped value"))?;
                        Some(self.prog.types.alloc(GtypeKind::Ptr { to }))
                    }
                    UnOp::Deref => match ot.map(|t| self.prog.types.underlying(t)) {
                        Some(u) => match self.prog.types.kind(u) {
                            GtypeKind::Ptr { to } => Some(*to),
                            _ => {
                                return Err(
                                    self.err(*span, "cannot dereference a non-pointer value")
                                );
                            }
                        },
                        None => None,
                    },
                    UnOp::Not => Some(self.prog.types.t_bool),
                    UnOp::Neg => Some(self.prog.types.t_int),
                };
                *gtype = t;
                t
            }
            Expr::Index {
                collection,
                index,
                gtype,
                span,
            } => {
                let ct = self.infer_expr(collection, None)?;
                let ti = self.prog.types.t_int;
                let under = ct.map(|t| self.prog.types.underlying(t));
                let (key_expected, t) = match under.map(|u| self.prog.types.kind(u).clone()) {
                    Some(GtypeKind::Array { elem, .. }) | Some(GtypeKind::Slice { elem }) => {
                        (Some(ti), Some(elem))
                    }
                    Some(GtypeKind::Map { key, value }) => (Some(key), Some(value)),
                    Some(GtypeKind::String) => (Some(ti), Some(self.prog.types.t_byte)),
                    _ => {
                        return Err(self.err(*span, "cannot index this type"));
                    }
                };
                self.infer_expr(index, key_expected)?;
                *gtype = t;
                t
            }
            Expr::SliceExpr {
                collection,
                low,
                high,
                max,
                gtype,
                span,
            } => {
                let ct = self.infer_expr(collection, None)?;
                let ti = self.prog.types.t_int;
                self.infer_expr(low, Some(ti))?;
                if let Some(h) = high {
                    self.infer_expr(h, Some(ti))?;
                }
                if let Some(m) = max {
                    self.infer_expr(m, Some(ti))?;
                }
                let under = ct.map(|t| self.prog.types.underlying(t));
                let t = match under.map(|u| self.prog.types.kind(u).clone()) {
                    Some(GtypeKind::Array { elem, .. }) | Some(GtypeKind::Slice { elem }) => {
                        Some(self.prog.types.alloc(GtypeKind::Slice { elem }))
                    }
                    Some(GtypeKind::String) => Some(self.prog.types.t_string),
                    _ => return Err(self.err(*span, "cannot slice this type")),
                };
                *gtype = t;
                t
            }
            Expr::Field {
                strct,
                name,
                gtype,
                span,
            } => {
                let st = self.infer_expr(strct, None)?;
                let st =
                    st.ok_or_else(|| self.err(*span, "field access on untyped value"))?;
                let field = self
                    .prog
                    .types
                    .get_field(st, name)
                    .ok_or_else(|| self.err(*span, format!("unknown field: {name}")))?;
                *gtype = Some(field.gtype);
                Some(field.gtype)
            }
            Expr::Call {
                callee,
                args,
                gtype,
                span,
            } => {
                let t = self.infer_call(callee, args, *span)?;
                *gtype = t;
                t
            }
            Expr::MethodCall {
                receiver,
                name,
                args,
                gtype,
                span,
            } => {
                self.infer_expr(receiver, None)?;
                let rt = self
                    .typed(receiver)
                    .ok_or_else(|| self.err(*span, "method call on untyped value"))?;
                let under = self.prog.types.underlying(rt);
                let (param_types, ret) = if let GtypeKind::Interface { imethods } =
                    self.prog.types.kind(under)
                {
                    let m = imethods.iter().find(|m| m.name == *name).ok_or_else(|| {
                        self.err(*span, format!("interface has no method {name}"))
                    })?;
                    (m.params.clone(), m.rets.first().copied())
                } else {
                    let owner = self.prog.types.method_owner(rt).ok_or_else(|| {
                        self.err(*span, "method call on a type without methods")
                    })?;
                    let fid = self
                        .prog
                        .types
                        .get(owner)
                        .methods
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, f)| *f)
                        .ok_or_else(|| {
                            self.err(
                                *span,
                                format!(
                                    "method {} is not found in type {}",
                                    name,
                                    self.prog.types.string(rt)
                                ),
                            )
                        })?;
                    let f = self.prog.func(fid);
                    let ps: Vec<TypeId> =
                        f.params.iter().filter_map(|p| self.prog.var(*p).gtype).collect();
                    (ps, f.rettypes.first().copied())
                };
                for (i, a) in args.iter_mut().enumerate() {
                    let expected = param_types.get(i).copied();
                    self.infer_expr(a, expected)?;
                }
                *gtype = ret;
                ret
            }
            Expr::TypeAssert {
                expr,
                target_ty,
                gtype,
                span,
                ..
            } => {
                let et = self.infer_expr(expr, None)?;
                if let Some(et) = et {
                    if !self.prog.types.is_interface(et) {
                        return Err(self.err(
                            *span,
                            "invalid type assertion: operand is not an interface",
                        ));
                    }
                }
                *gtype = *target_ty;
                *target_ty
            }
            Expr::CompositeLit { gtype, elems, .. } => {
                let t = *gtype;
                if let Some(t) = t {
                    self.infer_composite_elems(t, elems)?;
                }
                t
            }
        };
        Ok(t)
    }

    fn infer_composite_elems(&mut self, t: TypeId, elems: &mut [LitElem]) -> Result<()> {
        let under = self.prog.types.underlying(t);
        let kind = self.prog.types.kind(under).clone();
        match kind {
            GtypeKind::Struct { .. } => {
                for el in elems.iter_mut() {
                    if let LitElem::Keyed { key, value } = el {
                        let expected = self
                            .prog
                            .types
                            .get_field(under, key)
                            .map(|f| f.gtype);
                        self.infer_expr(value, expected)?;
                    }
                }
            }
            GtypeKind::Array { elem, .. } | GtypeKind::Slice { elem } => {
                for el in elems.iter_mut() {
                    if let LitElem::Plain(v) = el {
                        self.infer_expr(v, Some(elem))?;
                    }
                }
            }
            GtypeKind::Map { key, value } => {
                for el in elems.iter_mut() {
                    if let LitElem::MapPair { key: k, value: v } = el {
                        self.infer_expr(k, Some(key))?;
                        self.infer_expr(v, Some(value))?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn infer_call(
        &mut self,
        callee: &mut Expr,
        args: &mut [Expr],
        span: Span,
    ) -> Result<Option<TypeId>> {
        self.infer_expr(callee, None)?;
        let rel = match callee {
            Expr::Ident { rel, .. } => *rel,
            _ => None,
        };
        match rel {
            Some(Resolved::Type(t)) => {
                // conversion
                if let Some(a) = args.first_mut() {
                    self.infer_expr(a, None)?;
                }
                Ok(Some(t))
            }
            Some(Resolved::Func(fid)) => {
                let f = self.prog.func(fid);
                if let Some(b) = f.builtin {
                    return self.infer_builtin(b, args, span);
                }
                let param_types: Vec<Option<TypeId>> =
                    f.params.iter().map(|p| self.prog.var(*p).gtype).collect();
                let ret = f.rettypes.first().copied();
                for (i, a) in args.iter_mut().enumerate() {
                    let expected = param_types.get(i).copied().flatten();
                    self.infer_expr(a, expected)?;
                }
                Ok(ret)
            }
            _ => Err(self.err(span, "called object is not a function")),
        }
    }

    fn infer_builtin(
        &mut self,
        b: crate::ir::Builtin,
        args: &mut [Expr],
        span: Span,
    ) -> Result<Option<TypeId>> {
        use crate::ir::Builtin;
        match b {
            Builtin::Len | Builtin::Cap => {
                if args.len() != 1 {
                    return Err(self.err(span, "len()/cap() take exactly one argument"));
                }
                for a in args.iter_mut() {
                    self.infer_expr(a, None)?;
                }
                Ok(Some(self.prog.types.t_int))
            }
            Builtin::Append => {
                if args.len() != 2 {
                    return Err(self.err(span, "append() takes exactly two arguments"));
                }
                let st = self.infer_expr(&mut args[0], None)?;
                let elem = st.and_then(|t| self.prog.types.elem_of(t));
                self.infer_expr(&mut args[1], elem)?;
                Ok(st)
            }
            Builtin::Make => {
                if args.is_empty() {
                    return Err(self.err(span, "make() needs a type argument"));
                }
                let t = self.infer_expr(&mut args[0], None)?;
                match t.map(|t| self.prog.types.underlying(t)) {
                    Some(u) if matches!(self.prog.types.kind(u), GtypeKind::Slice { .. }) => {}
                    _ => {
                        return Err(self.err(span, "make() supports slices only"));
                    }
                }
                let ti = self.prog.types.t_int;
                for a in args.iter_mut().skip(1) {
                    self.infer_expr(a, Some(ti))?;
                }
                Ok(t)
            }
            _ => {
                for a in args.iter_mut() {
                    self.infer_expr(a, None)?;
                }
                Ok(None)
            }
        }
    }
}
