//! `.data` layout for initialised globals, `.lcomm` for zero-valued ones.
//!
//! The emitter recurses with a depth counter; out-of-line payloads (the
//! backing array of a slice literal, the target of `&Struct{...}`) are
//! written into the next data subsection and referenced by label, the 8cc
//! technique.

use crate::ast::{Expr, LitElem, Resolved, UnOp};
use crate::diag::Result;
use crate::emit::Codegen;
use crate::types::{GtypeKind, TypeId};

impl<'a> Codegen<'a> {
    pub fn emit_globals(&mut self) -> Result<()> {
        for i in 0..self.prog.globals.len() {
            let var = self.prog.globals[i].var;
            let init = self.prog.globals[i].init.take();
            let span = self.prog.globals[i].span;
            let name = self.prog.var(var).name.clone();
            let gtype = self
                .prog
                .var(var)
                .gtype
                .ok_or_else(|| self.internal(span, "global with no inferred type"))?;

            match &init {
                None => {
                    let size = self.prog.types.byte_size(gtype);
                    self.emit(".data");
                    self.emit(format!(".lcomm {name}, {size}"));
                }
                Some(e) => {
                    let tstr = self.prog.types.string(gtype);
                    self.emit(".data 0");
                    self.emit_noindent(format!("{name}: # {tstr}"));
                    self.do_emit_data(gtype, Some(e), "", 0)?;
                }
            }
            self.emit_newline();
            self.prog.globals[i].init = init;
        }
        Ok(())
    }

    pub fn do_emit_data(
        &mut self,
        gtype: TypeId,
        value: Option<&Expr>,
        container: &str,
        depth: usize,
    ) -> Result<()> {
        let under = self.prog.types.underlying(gtype);
        match self.prog.types.kind(under).clone() {
            GtypeKind::Array { elem, len } => {
                let values: Vec<&Expr> = match value {
                    Some(Expr::CompositeLit { elems, .. }) => elems
                        .iter()
                        .filter_map(|el| match el {
                            LitElem::Plain(v) => Some(v),
                            _ => None,
                        })
                        .collect(),
                    None => Vec::new(),
                    Some(other) => {
                        return Err(self.tbi(other.span(), "this array initialiser"));
                    }
                };
                let elm_size = self.prog.types.byte_size(elem);
                for i in 0..len {
                    let selector = format!("{container}[{i}]");
                    match values.get(i as usize).copied() {
                        None => self.do_emit_data(elem, None, &selector, depth)?,
                        Some(v) => {
                            if elm_size == 8 {
                                self.emit_word(elem, v, &selector, depth)?;
                            } else if elm_size == 1 {
                                let n = self.eval_int_expr(v)?;
                                self.emit(format!(".byte {n}"));
                            } else {
                                self.do_emit_data(elem, Some(v), &selector, depth)?;
                            }
                        }
                    }
                }
            }
            GtypeKind::Slice { elem } => match value {
                None => {
                    self.emit(".quad 0");
                    self.emit(".quad 0");
                    self.emit(".quad 0");
                }
                Some(Expr::CompositeLit { elems, .. }) => {
                    let len = elems.len() as i64;
                    let arr = self.prog.types.alloc(GtypeKind::Array { elem, len });
                    let lit = value.unwrap().clone();
                    self.emit_data_addr(arr, Some(&lit), depth)?;
                    self.emit(format!(".quad {len} # len"));
                    self.emit(format!(".quad {len} # cap"));
                }
                Some(other) => {
                    return Err(self.tbi(other.span(), "this slice initialiser"));
                }
            },
            GtypeKind::Map { .. } | GtypeKind::Interface { .. } => {
                self.emit(".quad 0");
                self.emit(".quad 0");
                self.emit(".quad 0");
            }
            GtypeKind::Struct { fields } => {
                self.prog.types.calc_struct_offset(under);
                let fields = match self.prog.types.kind(under).clone() {
                    GtypeKind::Struct { fields } => fields,
                    _ => fields,
                };
                for f in &fields {
                    if f.padding > 0 {
                        self.emit(format!(".zero {} # padding", f.padding));
                    }
                    let selector = format!("{container}.{}", f.name);
                    let field_value = match value {
                        None => None,
                        Some(Expr::CompositeLit { elems, .. }) => {
                            elems.iter().find_map(|el| match el {
                                LitElem::Keyed { key, value } if *key == f.name => Some(value),
                                _ => None,
                            })
                        }
                        Some(other) => {
                            return Err(self.tbi(other.span(), "this struct initialiser"));
                        }
                    };
                    self.do_emit_data(f.gtype, field_value, &selector, depth)?;
                }
            }
            _ => {
                let size = self.prog.types.byte_size(gtype);
                match value {
                    None => {
                        let tstr = self.prog.types.string(gtype);
                        if size == 1 {
                            self.emit(format!(".byte 0 # {tstr} {container} zero value"));
                        } else {
                            self.emit(format!(".quad 0 # {tstr} {container} zero value"));
                        }
                    }
                    Some(v) => {
                        if size == 1 {
                            let n = self.eval_int_expr(v)?;
                            self.emit(format!(".byte {n} # {container}"));
                        } else {
                            self.emit_word(gtype, v, container, depth)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// One 8-byte datum: a number, a string-literal label, an address.
    fn emit_word(
        &mut self,
        gtype: TypeId,
        value: &Expr,
        container: &str,
        depth: usize,
    ) -> Result<()> {
        let tstr = self.prog.types.string(gtype);
        match value {
            Expr::Str { slabel, .. } => {
                self.emit(format!(".quad {slabel} # {container}"));
            }
            Expr::Nil { .. } => {
                self.emit(format!(".quad 0 # nil {container}"));
            }
            Expr::Unop {
                op: UnOp::Addr,
                operand,
                ..
            } => match operand.as_ref() {
                Expr::Ident {
                    rel: Some(Resolved::Var(vid)),
                    span,
                    ..
                } => {
                    let v = self.prog.var(*vid);
                    if !v.is_global {
                        return Err(self.internal(
                            *span,
                            "global initialiser takes the address of a local",
                        ));
                    }
                    let name = v.name.clone();
                    self.emit(format!(".quad {name} # {tstr} {container}"));
                }
                Expr::CompositeLit { gtype: lt, .. } => {
                    let lt = lt
                        .ok_or_else(|| self.internal(value.span(), "untyped literal"))?;
                    self.emit_data_addr(lt, Some(operand), depth)?;
                }
                other => {
                    return Err(self.tbi(other.span(), "this address in static data"));
                }
            },
            Expr::Ident {
                rel: Some(Resolved::Const(_)),
                ..
            }
            | Expr::Num { .. }
            | Expr::Binop { .. } => {
                let n = self.eval_int_expr(value)?;
                self.emit(format!(".quad {n} # {tstr} {container}"));
            }
            other => {
                return Err(self.tbi(other.span(), "this expression in static data"));
            }
        }
        Ok(())
    }

    /// Writes the pointed-to payload one subsection deeper and a `.quad`
    /// referencing it here.
    fn emit_data_addr(
        &mut self,
        gtype: TypeId,
        value: Option<&Expr>,
        depth: usize,
    ) -> Result<()> {
        self.emit(format!(".data {}", depth + 1));
        let label = self.make_label();
        self.emit_noindent(format!("{label}:"));
        self.do_emit_data(gtype, value, "", depth + 1)?;
        self.emit(format!(".data {depth}"));
        self.emit(format!(".quad {label}"));
        Ok(())
    }

    /// Compile-time integer evaluation for static initialisers.
    pub fn eval_int_expr(&self, e: &Expr) -> Result<i64> {
        match e {
            Expr::Num { val, .. } => Ok(*val),
            Expr::Nil { .. } => Ok(0),
            Expr::Ident {
                rel: Some(Resolved::Const(cid)),
                ..
            } => {
                let c = self.prog.konst(*cid);
                if let Expr::Ident { name, .. } = &c.val {
                    if name == "iota" {
                        return Ok(c.iota_index);
                    }
                }
                let val = c.val.clone();
                self.eval_int_expr(&val)
            }
            Expr::Ident {
                rel: Some(Resolved::Var(_)),
                span,
                ..
            } => Err(self.internal(
                *span,
                "variable cannot be interpreted at compile time",
            )),
            Expr::Binop {
                op, left, right, span, ..
            } => {
                let l = self.eval_int_expr(left)?;
                let r = self.eval_int_expr(right)?;
                match op {
                    crate::ast::BinOp::Add => Ok(l + r),
                    crate::ast::BinOp::Sub => Ok(l - r),
                    crate::ast::BinOp::Mul => Ok(l * r),
                    _ => Err(self.tbi(*span, "this operator in a constant expression")),
                }
            }
            other => Err(self.internal(
                other.span(),
                "expression is not constant",
            )),
        }
    }
}
