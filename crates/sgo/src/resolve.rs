//! Name resolution.
//!
//! Two passes per package: declare-all (types first, then constants, global
//! variables and function signatures), then resolve-bodies. Identifier uses
//! get their `Relation` slot pointed at a declaration id; type expressions
//! become `TypeId`s. The universe scope is pre-populated with the builtin
//! types, `nil`/`true`/`false`/`iota`, and the builtin functions.

use std::collections::HashMap;

use crate::ast::*;
use crate::diag::{CompileError, DiagKind, Result, Span};
use crate::ir::{Builtin, ConstDef, DeclFunc, FuncId, GlobalDecl, Program, VarId, Variable};
use crate::types::{GtypeKind, IMethod, StructField, TypeId};

pub struct Resolver<'a> {
    prog: &'a mut Program,
    scopes: Vec<HashMap<String, Resolved>>,
    pkg_scopes: HashMap<String, HashMap<String, Resolved>>,
    imports: Vec<String>,
    pkg: String,
    locals: Vec<VarId>,
    hidden_seq: usize,
    in_function: bool,
}

/// Resolves the given files (already grouped by package, compile order) into
/// the program. `iruntime` sources come first, the main package last.
pub fn resolve(prog: &mut Program, files: Vec<AstFile>) -> Result<()> {
    let mut r = Resolver {
        prog,
        scopes: Vec::new(),
        pkg_scopes: HashMap::new(),
        imports: Vec::new(),
        pkg: String::new(),
        locals: Vec::new(),
        hidden_seq: 0,
        in_function: false,
    };
    r.setup_universe();
    r.register_fmt_package();

    // group files by package, preserving order of first appearance
    let mut groups: Vec<(String, Vec<AstFile>)> = Vec::new();
    for f in files {
        match groups.iter_mut().find(|(p, _)| *p == f.pkg) {
            Some((_, v)) => v.push(f),
            None => groups.push((f.pkg.clone(), vec![f])),
        }
    }
    for (pkg, group) in groups {
        r.resolve_package(&pkg, group)?;
    }
    Ok(())
}

impl<'a> Resolver<'a> {
    fn err(&self, span: Span, msg: impl Into<String>) -> CompileError {
        CompileError::new(&self.prog.smap, span, DiagKind::Resolution, msg)
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) -> HashMap<String, Resolved> {
        self.scopes.pop().unwrap_or_default()
    }

    fn define(&mut self, name: &str, r: Resolved) {
        if name.is_empty() || name == "_" {
            return;
        }
        if let Some(top) = self.scopes.last_mut() {
            top.insert(name.to_string(), r);
        }
    }

    fn lookup(&self, name: &str) -> Option<Resolved> {
        for scope in self.scopes.iter().rev() {
            if let Some(r) = scope.get(name) {
                return Some(*r);
            }
        }
        None
    }

    fn setup_universe(&mut self) {
        self.push_scope();
        let (ti, tb, tbool, ts) = (
            self.prog.types.t_int,
            self.prog.types.t_byte,
            self.prog.types.t_bool,
            self.prog.types.t_string,
        );
        self.define("int", Resolved::Type(ti));
        self.define("byte", Resolved::Type(tb));
        self.define("bool", Resolved::Type(tbool));
        self.define("string", Resolved::Type(ts));

        for (name, val) in [("true", 1i64), ("false", 0i64), ("iota", 0i64)] {
            let cid = self.prog.add_const(ConstDef {
                name: name.to_string(),
                gtype: Some(if name == "iota" { ti } else { tbool }),
                val: Expr::Num {
                    val,
                    span: Span::zero(),
                },
                iota_index: 0,
                span: Span::zero(),
            });
            self.define(name, Resolved::Const(cid));
        }

        for (name, b) in [
            ("len", Builtin::Len),
            ("cap", Builtin::Cap),
            ("append", Builtin::Append),
            ("make", Builtin::Make),
            ("println", Builtin::Println),
            ("print", Builtin::Print),
            ("dumpSlice", Builtin::DumpSlice),
            ("dumpInterface", Builtin::DumpInterface),
            ("assertInterface", Builtin::AssertInterface),
            ("asComment", Builtin::AsComment),
        ] {
            let fid = self.prog.add_func(DeclFunc {
                pkg: String::new(),
                name: name.to_string(),
                symbol: String::new(),
                receiver: None,
                params: Vec::new(),
                variadic: false,
                rettypes: Vec::new(),
                localvars: Vec::new(),
                body: Vec::new(),
                builtin: Some(b),
                is_extern: false,
                span: Span::zero(),
            });
            self.define(name, Resolved::Func(fid));
        }
    }

    /// The importable `fmt` package: `Printf` lowers to libc `printf`.
    fn register_fmt_package(&mut self) {
        let ts = self.prog.types.t_string;
        let format_param = self.prog.add_var(Variable {
            name: "format".to_string(),
            gtype: Some(ts),
            offset: 0,
            is_global: false,
            span: Span::zero(),
        });
        let fid = self.prog.add_func(DeclFunc {
            pkg: "fmt".to_string(),
            name: "Printf".to_string(),
            symbol: "printf".to_string(),
            receiver: None,
            params: vec![format_param],
            variadic: false,
            rettypes: Vec::new(),
            localvars: Vec::new(),
            body: Vec::new(),
            builtin: None,
            is_extern: true,
            span: Span::zero(),
        });
        let mut scope = HashMap::new();
        scope.insert("Printf".to_string(), Resolved::Func(fid));
        self.pkg_scopes.insert("fmt".to_string(), scope);
    }

    fn resolve_package(&mut self, pkg: &str, mut files: Vec<AstFile>) -> Result<()> {
        self.pkg = pkg.to_string();
        self.push_scope();

        self.imports.clear();
        for f in &files {
            for imp in &f.imports {
                if !self.pkg_scopes.contains_key(imp.as_str()) {
                    return Err(CompileError::new(
                        &self.prog.smap,
                        Span {
                            file_id: f.file_id,
                            line: 1,
                            col: 1,
                        },
                        DiagKind::Resolution,
                        format!("import not found: \"{imp}\""),
                    ));
                }
                if !self.imports.contains(imp) {
                    self.imports.push(imp.clone());
                }
            }
        }

        // declare-all: type names first so they can refer to each other
        let mut typedefs: Vec<(TypeId, TypeExpr)> = Vec::new();
        for f in &mut files {
            for decl in &mut f.decls {
                if let Decl::TypeDef { name, texpr, .. } = decl {
                    let tid = self.prog.types.alloc(GtypeKind::Named {
                        pkg: self.pkg.clone(),
                        name: name.clone(),
                        underlying: self.prog.types.t_nil, // patched below
                    });
                    self.define(name, Resolved::Type(tid));
                    typedefs.push((tid, texpr.clone()));
                }
            }
        }
        for (tid, texpr) in typedefs {
            let underlying = self.resolve_type(&texpr)?;
            if let GtypeKind::Named {
                underlying: slot, ..
            } = &mut self.prog.types.get_mut(tid).kind
            {
                *slot = underlying;
            }
        }

        // constants, globals, function signatures
        let const_start = self.prog.consts.len();
        let mut funcs: Vec<(FuncId, Vec<Stmt>)> = Vec::new();
        let mut global_inits: Vec<(usize, Option<Expr>)> = Vec::new();
        for f in &mut files {
            for decl in &mut f.decls {
                match decl {
                    Decl::TypeDef { .. } => {}
                    Decl::Const(specs) => {
                        for spec in specs.iter() {
                            let gtype = match &spec.texpr {
                                Some(te) => Some(self.resolve_type(te)?),
                                None => None,
                            };
                            let val = spec.val.clone().ok_or_else(|| {
                                self.err(spec.span, format!("const {} has no value", spec.name))
                            })?;
                            let cid = self.prog.add_const(ConstDef {
                                name: spec.name.clone(),
                                gtype,
                                val,
                                iota_index: spec.iota_index,
                                span: spec.span,
                            });
                            self.define(&spec.name.clone(), Resolved::Const(cid));
                        }
                    }
                    Decl::Var {
                        name,
                        texpr,
                        init,
                        span,
                    } => {
                        let gtype = match texpr {
                            Some(te) => Some(self.resolve_type(te)?),
                            None => None,
                        };
                        let vid = self.prog.add_var(Variable {
                            name: name.clone(),
                            gtype,
                            offset: 0,
                            is_global: true,
                            span: *span,
                        });
                        self.define(&name.clone(), Resolved::Var(vid));
                        let idx = self.prog.globals.len();
                        self.prog.globals.push(GlobalDecl {
                            var: vid,
                            init: None,
                            span: *span,
                        });
                        global_inits.push((idx, init.take()));
                    }
                    Decl::Func(fd) => {
                        let fid = self.declare_func(fd)?;
                        funcs.push((fid, std::mem::take(&mut fd.body)));
                    }
                }
            }
        }

        // resolve constant values and global initialisers
        let const_count = self.prog.consts.len();
        for i in const_start..const_count {
            let mut val = self.prog.consts[i].val.clone();
            self.resolve_expr(&mut val)?;
            self.prog.consts[i].val = val;
        }
        for (idx, mut init) in global_inits {
            if let Some(e) = &mut init {
                self.resolve_expr(e)?;
            }
            self.prog.globals[idx].init = init;
        }

        // resolve bodies
        for (fid, mut body) in funcs {
            self.resolve_func_body(fid, &mut body)?;
            self.prog.funcs[fid.0 as usize].body = body;
        }

        let scope = self.pop_scope();
        self.pkg_scopes.insert(self.pkg.clone(), scope);
        Ok(())
    }

    /// A struct value travels as its address; parameters and receivers of
    /// struct type become pointers under the hood.
    fn param_type(&mut self, ty: TypeId) -> TypeId {
        let under = self.prog.types.underlying(ty);
        if matches!(self.prog.types.kind(under), GtypeKind::Struct { .. }) {
            self.prog.types.alloc(GtypeKind::Ptr { to: ty })
        } else {
            ty
        }
    }

    /// Signature resolution; attaches methods to their named receiver type.
    fn declare_func(&mut self, fd: &FuncDecl) -> Result<FuncId> {
        let receiver = match &fd.receiver {
            Some(p) => {
                let rty = self.resolve_type(&p.texpr)?;
                let slot_ty = self.param_type(rty);
                let vid = self.prog.add_var(Variable {
                    name: p.name.clone(),
                    gtype: Some(slot_ty),
                    offset: 0,
                    is_global: false,
                    span: p.span,
                });
                Some((vid, rty))
            }
            None => None,
        };

        let mut params = Vec::new();
        for (i, p) in fd.params.iter().enumerate() {
            let pty = self.resolve_type(&p.texpr)?;
            // a trailing `...T` arrives as a slice of T
            let slot_ty = if fd.variadic && i == fd.params.len() - 1 {
                self.prog.types.alloc(GtypeKind::Slice { elem: pty })
            } else {
                self.param_type(pty)
            };
            params.push(self.prog.add_var(Variable {
                name: p.name.clone(),
                gtype: Some(slot_ty),
                offset: 0,
                is_global: false,
                span: p.span,
            }));
        }

        let mut rettypes = Vec::new();
        for rt in &fd.rets {
            rettypes.push(self.resolve_type(rt)?);
        }

        let symbol = match &receiver {
            Some((_, rty)) => {
                let owner = self.prog.types.method_owner(*rty).ok_or_else(|| {
                    self.err(fd.span, "method receiver must be a named type or pointer to one")
                })?;
                let tname = match self.prog.types.kind(owner) {
                    GtypeKind::Named { name, .. } => name.clone(),
                    _ => {
                        return Err(self.err(fd.span, "method receiver must be a named type"));
                    }
                };
                format!("{}.{}${}", self.pkg, tname, fd.name)
            }
            None => format!("{}.{}", self.pkg, fd.name),
        };

        let fid = self.prog.add_func(DeclFunc {
            pkg: self.pkg.clone(),
            name: fd.name.clone(),
            symbol,
            receiver: receiver.map(|(v, _)| v),
            params,
            variadic: fd.variadic,
            rettypes,
            localvars: Vec::new(),
            body: Vec::new(),
            builtin: None,
            is_extern: false,
            span: fd.span,
        });

        match self.prog.func(fid).receiver {
            Some(rv) => {
                // attach the method, source order within the package
                let rty = self.prog.var(rv).gtype.unwrap();
                let owner = self.prog.types.method_owner(rty).unwrap();
                self.prog
                    .types
                    .get_mut(owner)
                    .methods
                    .push((fd.name.clone(), fid));
            }
            None => self.define(&fd.name, Resolved::Func(fid)),
        }
        Ok(fid)
    }

    fn resolve_func_body(&mut self, fid: FuncId, body: &mut [Stmt]) -> Result<()> {
        self.push_scope();
        self.locals.clear();
        self.in_function = true;

        let f = &self.prog.funcs[fid.0 as usize];
        let mut bindings: Vec<(String, VarId)> = Vec::new();
        if let Some(rv) = f.receiver {
            bindings.push((self.prog.var(rv).name.clone(), rv));
        }
        for p in &f.params {
            bindings.push((self.prog.var(*p).name.clone(), *p));
        }
        for (name, vid) in bindings {
            self.define(&name, Resolved::Var(vid));
        }

        for st in body.iter_mut() {
            self.resolve_stmt(st)?;
        }

        self.pop_scope();
        self.in_function = false;
        let locals = std::mem::take(&mut self.locals);
        self.prog.funcs[fid.0 as usize].localvars = locals;
        Ok(())
    }

    fn new_local(&mut self, name: &str, gtype: Option<TypeId>, span: Span) -> VarId {
        let vid = self.prog.add_var(Variable {
            name: name.to_string(),
            gtype,
            offset: 0,
            is_global: false,
            span,
        });
        self.locals.push(vid);
        self.define(name, Resolved::Var(vid));
        vid
    }

    fn new_hidden_local(&mut self, gtype: Option<TypeId>, span: Span) -> VarId {
        self.hidden_seq += 1;
        let name = format!(".hidden{}", self.hidden_seq);
        let vid = self.prog.add_var(Variable {
            name,
            gtype,
            offset: 0,
            is_global: false,
            span,
        });
        self.locals.push(vid);
        vid
    }

    fn resolve_stmt(&mut self, s: &mut Stmt) -> Result<()> {
        match s {
            Stmt::VarDecl {
                var,
                name,
                texpr,
                init,
                span,
            } => {
                let gtype = match texpr {
                    Some(te) => Some(self.resolve_type(te)?),
                    None => None,
                };
                if let Some(e) = init {
                    self.resolve_expr(e)?;
                }
                let name = name.clone();
                *var = Some(self.new_local(&name, gtype, *span));
            }
            Stmt::Assign {
                lefts,
                rights,
                declares,
                ..
            } => {
                for r in rights.iter_mut() {
                    self.resolve_expr(r)?;
                }
                if *declares {
                    for l in lefts.iter_mut() {
                        match l {
                            Expr::Ident {
                                name, rel, span, ..
                            } if name != "_" => {
                                let name = name.clone();
                                let span = *span;
                                let vid = self.new_local(&name, None, span);
                                *rel = Some(Resolved::Var(vid));
                            }
                            Expr::Ident { .. } => {} // blank
                            other => {
                                return Err(self.err(
                                    other.span(),
                                    "non-name on left side of :=",
                                ));
                            }
                        }
                    }
                } else {
                    for l in lefts.iter_mut() {
                        if !l.is_blank() {
                            self.resolve_expr(l)?;
                        }
                    }
                }
            }
            Stmt::Expr { expr, .. } => self.resolve_expr(expr)?,
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                self.push_scope();
                if let Some(st) = init {
                    self.resolve_stmt(st)?;
                }
                self.resolve_expr(cond)?;
                self.push_scope();
                for st in then.iter_mut() {
                    self.resolve_stmt(st)?;
                }
                self.pop_scope();
                if let Some(e) = els {
                    self.resolve_stmt(e)?;
                }
                self.pop_scope();
            }
            Stmt::Block { stmts, .. } => {
                self.push_scope();
                for st in stmts.iter_mut() {
                    self.resolve_stmt(st)?;
                }
                self.pop_scope();
            }
            Stmt::For { kind, body, span } => {
                self.push_scope();
                match kind {
                    ForKind::Clause { init, cond, post } => {
                        if let Some(st) = init {
                            self.resolve_stmt(st)?;
                        }
                        if let Some(c) = cond {
                            self.resolve_expr(c)?;
                        }
                        if let Some(st) = post {
                            self.resolve_stmt(st)?;
                        }
                    }
                    ForKind::Range {
                        index,
                        value,
                        expr,
                        hidden,
                    } => {
                        self.resolve_expr(expr)?;
                        let span = *span;
                        for slot in [index, value] {
                            if let Some(Expr::Ident {
                                name, rel, span, ..
                            }) = slot.as_mut()
                            {
                                let name = name.clone();
                                let span = *span;
                                let vid = self.new_local(&name, None, span);
                                *rel = Some(Resolved::Var(vid));
                            }
                        }
                        let ti = self.prog.types.t_int;
                        *hidden = Some(self.new_hidden_local(Some(ti), span));
                    }
                }
                self.push_scope();
                for st in body.iter_mut() {
                    self.resolve_stmt(st)?;
                }
                self.pop_scope();
                self.pop_scope();
            }
            Stmt::Switch {
                subject,
                type_subject,
                bind,
                cases,
                default,
                span,
            } => {
                self.push_scope();
                if let Some(e) = subject {
                    self.resolve_expr(e)?;
                }
                if let Some(e) = type_subject {
                    self.resolve_expr(e)?;
                }
                if let Some((name, slot)) = bind {
                    let name = name.clone();
                    let span = *span;
                    *slot = Some(self.new_local(&name, None, span));
                }
                for case in cases.iter_mut() {
                    for e in case.exprs.iter_mut() {
                        self.resolve_expr(e)?;
                    }
                    case.resolved_types.clear();
                    for t in &case.types {
                        match t {
                            Some(te) => {
                                case.resolved_types.push(Some(self.resolve_type(te)?))
                            }
                            None => case.resolved_types.push(None),
                        }
                    }
                    self.push_scope();
                    for st in case.body.iter_mut() {
                        self.resolve_stmt(st)?;
                    }
                    self.pop_scope();
                }
                if let Some(stmts) = default {
                    self.push_scope();
                    for st in stmts.iter_mut() {
                        self.resolve_stmt(st)?;
                    }
                    self.pop_scope();
                }
                self.pop_scope();
            }
            Stmt::Return { exprs, .. } => {
                for e in exprs.iter_mut() {
                    self.resolve_expr(e)?;
                }
            }
            Stmt::Defer { expr, .. } => self.resolve_expr(expr)?,
            Stmt::Inc { operand, .. } | Stmt::Dec { operand, .. } => {
                self.resolve_expr(operand)?
            }
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
        }
        Ok(())
    }

    fn resolve_expr(&mut self, e: &mut Expr) -> Result<()> {
        match e {
            Expr::Num { .. } | Expr::Str { .. } | Expr::Nil { .. } => {}
            Expr::Ident {
                pkg,
                name,
                rel,
                span,
                ..
            } => {
                if name == "_" {
                    return Ok(());
                }
                let found = match pkg {
                    Some(p) => self
                        .pkg_scopes
                        .get(p.as_str())
                        .and_then(|s| s.get(name.as_str()))
                        .copied(),
                    None => self.lookup(name),
                };
                match found {
                    Some(r) => *rel = Some(r),
                    None => {
                        let full = match pkg {
                            Some(p) => format!("{p}.{name}"),
                            None => name.clone(),
                        };
                        return Err(self.err(*span, format!("undefined: {full}")));
                    }
                }
            }
            Expr::Binop { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }
            Expr::Unop { operand, .. } => {
                self.resolve_expr(operand)?;
            }
            Expr::Index {
                collection, index, ..
            } => {
                self.resolve_expr(collection)?;
                self.resolve_expr(index)?;
            }
            Expr::SliceExpr {
                collection,
                low,
                high,
                max,
                ..
            } => {
                self.resolve_expr(collection)?;
                self.resolve_expr(low)?;
                if let Some(h) = high {
                    self.resolve_expr(h)?;
                }
                if let Some(m) = max {
                    self.resolve_expr(m)?;
                }
            }
            Expr::Field { strct, name, span, .. } => {
                // a qualified reference `pkg.Name` looks like a field access
                if let Expr::Ident {
                    pkg: None,
                    name: base,
                    rel: None,
                    ..
                } = strct.as_ref()
                {
                    if self.imports.iter().any(|i| i == base) {
                        let mut qualified = Expr::Ident {
                            pkg: Some(base.clone()),
                            name: name.clone(),
                            rel: None,
                            gtype: None,
                            span: *span,
                        };
                        self.resolve_expr(&mut qualified)?;
                        *e = qualified;
                        return Ok(());
                    }
                }
                self.resolve_expr(strct)?;
            }
            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee)?;
                for a in args.iter_mut() {
                    self.resolve_expr(a)?;
                }
            }
            Expr::MethodCall {
                receiver,
                name,
                args,
                span,
                ..
            } => {
                // `fmt.Printf(...)` parses as a method call on the package name
                let span = *span;
                if let Expr::Ident {
                    pkg: None,
                    name: base,
                    rel: None,
                    ..
                } = receiver.as_ref()
                {
                    if self.imports.iter().any(|i| i == base) {
                        let mut callee = Expr::Ident {
                            pkg: Some(base.clone()),
                            name: name.clone(),
                            rel: None,
                            gtype: None,
                            span,
                        };
                        self.resolve_expr(&mut callee)?;
                        let mut new_args = std::mem::take(args);
                        for a in new_args.iter_mut() {
                            self.resolve_expr(a)?;
                        }
                        *e = Expr::Call {
                            callee: Box::new(callee),
                            args: new_args,
                            gtype: None,
                            span,
                        };
                        return Ok(());
                    }
                }
                self.resolve_expr(receiver)?;
                for a in args.iter_mut() {
                    self.resolve_expr(a)?;
                }
            }
            Expr::TypeAssert {
                expr,
                target,
                target_ty,
                ..
            } => {
                self.resolve_expr(expr)?;
                *target_ty = Some(self.resolve_type(&target.clone())?);
            }
            Expr::CompositeLit {
                texpr,
                elems,
                gtype,
                hidden_var,
                span,
            } => {
                let tid = self.resolve_type(&texpr.clone())?;
                *gtype = Some(tid);
                // struct and array literals materialise in a hidden
                // per-function local when used as values
                let under = self.prog.types.underlying(tid);
                if self.in_function
                    && matches!(
                        self.prog.types.kind(under),
                        GtypeKind::Struct { .. } | GtypeKind::Array { .. }
                    )
                {
                    let sp = *span;
                    *hidden_var = Some(self.new_hidden_local(Some(tid), sp));
                }
                // positional struct literals become keyed, declaration order
                let target = self.prog.types.underlying(tid);
                if let GtypeKind::Struct { fields } = self.prog.types.kind(target) {
                    let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
                    let mut next = 0usize;
                    for el in elems.iter_mut() {
                        if let LitElem::Plain(v) = el {
                            let key = names.get(next).cloned().ok_or_else(|| {
                                self.err(*span, "too many values in struct literal")
                            })?;
                            next += 1;
                            *el = LitElem::Keyed {
                                key,
                                value: v.clone(),
                            };
                        }
                    }
                }
                for el in elems.iter_mut() {
                    match el {
                        LitElem::Keyed { value, .. } => self.resolve_expr(value)?,
                        LitElem::MapPair { key, value } => {
                            self.resolve_expr(key)?;
                            self.resolve_expr(value)?;
                        }
                        LitElem::Plain(v) => self.resolve_expr(v)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_type(&mut self, te: &TypeExpr) -> Result<TypeId> {
        match te {
            TypeExpr::Name { pkg, name, span } => {
                let found = match pkg {
                    Some(p) => self
                        .pkg_scopes
                        .get(p.as_str())
                        .and_then(|s| s.get(name.as_str()))
                        .copied(),
                    None => self.lookup(name),
                };
                match found {
                    Some(Resolved::Type(t)) => Ok(t),
                    Some(_) => Err(self.err(*span, format!("{name} is not a type"))),
                    None => Err(self.err(*span, format!("unknown type: {name}"))),
                }
            }
            TypeExpr::Ptr(inner) => {
                let to = self.resolve_type(inner)?;
                Ok(self.prog.types.alloc(GtypeKind::Ptr { to }))
            }
            TypeExpr::Array { len, elem } => {
                let elem = self.resolve_type(elem)?;
                Ok(self.prog.types.alloc(GtypeKind::Array { elem, len: *len }))
            }
            TypeExpr::Slice(inner) => {
                let elem = self.resolve_type(inner)?;
                Ok(self.prog.types.alloc(GtypeKind::Slice { elem }))
            }
            TypeExpr::Map { key, value } => {
                let key = self.resolve_type(key)?;
                let value = self.resolve_type(value)?;
                Ok(self.prog.types.alloc(GtypeKind::Map { key, value }))
            }
            TypeExpr::Struct { fields, .. } => {
                let mut out = Vec::new();
                for (name, fte) in fields {
                    let ft = self.resolve_type(fte)?;
                    out.push(StructField {
                        name: name.clone(),
                        gtype: ft,
                        offset: None,
                        padding: 0,
                    });
                }
                Ok(self.prog.types.alloc(GtypeKind::Struct { fields: out }))
            }
            TypeExpr::Interface { methods, .. } => {
                let mut ims = Vec::new();
                for (name, params, rets) in methods {
                    let mut ps = Vec::new();
                    for p in params {
                        ps.push(self.resolve_type(p)?);
                    }
                    let mut rs = Vec::new();
                    for r in rets {
                        rs.push(self.resolve_type(r)?);
                    }
                    ims.push(IMethod {
                        name: name.clone(),
                        params: ps,
                        rets: rs,
                    });
                }
                Ok(self.prog.types.alloc(GtypeKind::Interface { imethods: ims }))
            }
        }
    }
}
