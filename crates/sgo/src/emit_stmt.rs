//! Statement lowering.

use crate::ast::{Expr, ForKind, Stmt, SwitchCase};
use crate::diag::Result;
use crate::emit::{Codegen, RET_REGI};
use crate::types::GtypeKind;

impl<'a> Codegen<'a> {
    pub fn emit_stmt(&mut self, s: &Stmt) -> Result<()> {
        self.emit("# statement");
        self.indent += 1;
        let r = self.emit_stmt_inner(s);
        self.indent -= 1;
        r
    }

    fn emit_stmt_inner(&mut self, s: &Stmt) -> Result<()> {
        match s {
            Stmt::VarDecl { var, init, span, .. } => {
                let vid = var.ok_or_else(|| self.internal(*span, "undeclared variable"))?;
                let name = self.prog.var(vid).name.clone();
                self.emit(format!("# var {name}"));
                let gtype = self
                    .prog
                    .var(vid)
                    .gtype
                    .ok_or_else(|| self.internal(*span, "variable with no inferred type"))?;
                let target = self.var_expr(vid, gtype);
                let under = self.prog.types.underlying(gtype);
                match self.prog.types.kind(under).clone() {
                    GtypeKind::Array { .. } => self.assign_to_array(&target, init.as_ref())?,
                    GtypeKind::Slice { .. } => self.assign_to_slice(&target, init.as_ref())?,
                    GtypeKind::Struct { .. } => self.assign_to_struct(&target, init.as_ref())?,
                    GtypeKind::Map { .. } => self.assign_to_map(&target, init.as_ref())?,
                    GtypeKind::Interface { .. } => {
                        self.assign_to_interface(&target, init.as_ref())?
                    }
                    _ => {
                        match init {
                            Some(e) => self.emit_expr(e)?,
                            None => {
                                if self.prog.types.is_string(gtype) {
                                    self.emit_empty_string();
                                } else {
                                    self.emit("LOAD_NUMBER 0 # zero value");
                                }
                            }
                        }
                        self.emit_save(&target)?;
                    }
                }
            }
            Stmt::Assign { lefts, rights, .. } => self.emit_assign(lefts, rights)?,
            Stmt::Expr { expr, .. } => self.emit_expr(expr)?,
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                self.emit("# if");
                if let Some(st) = init {
                    self.emit_stmt(st)?;
                }
                self.emit_expr(cond)?;
                self.emit("TEST_IT");
                if let Some(els) = els {
                    let label_else = self.make_label();
                    let label_endif = self.make_label();
                    self.emit(format!("je {label_else} # jump if false"));
                    for st in then {
                        self.emit_stmt(st)?;
                    }
                    self.emit(format!("jmp {label_endif}"));
                    self.emit(format!("{label_else}:"));
                    self.emit_stmt(els)?;
                    self.emit(format!("{label_endif}: # endif"));
                } else {
                    let label_endif = self.make_label();
                    self.emit(format!("je {label_endif} # jump if false"));
                    for st in then {
                        self.emit_stmt(st)?;
                    }
                    self.emit(format!("{label_endif}: # endif"));
                }
            }
            Stmt::Block { stmts, .. } => {
                for st in stmts {
                    self.emit_stmt(st)?;
                }
            }
            Stmt::For { kind, body, .. } => self.emit_for(kind, body)?,
            Stmt::Switch {
                subject,
                type_subject,
                bind,
                cases,
                default,
                ..
            } => self.emit_switch(
                subject.as_ref(),
                type_subject.as_ref(),
                bind,
                cases,
                default.as_deref(),
            )?,
            Stmt::Return { exprs, .. } => self.emit_return(exprs)?,
            Stmt::Defer { expr, .. } => self.emit_defer(expr)?,
            Stmt::Break { span } => {
                let (end_loop, _) = self
                    .fctx
                    .loop_stack
                    .last()
                    .cloned()
                    .ok_or_else(|| self.internal(*span, "break outside a loop"))?;
                self.emit(format!("jmp {end_loop} # break"));
            }
            Stmt::Continue { span } => {
                let (_, end_block) = self
                    .fctx
                    .loop_stack
                    .last()
                    .cloned()
                    .ok_or_else(|| self.internal(*span, "continue outside a loop"))?;
                self.emit(format!("jmp {end_block} # continue"));
            }
            Stmt::Inc { operand, .. } => {
                self.emit_expr(operand)?;
                self.emit("ADD_NUMBER 1");
                self.emit_save(operand)?;
            }
            Stmt::Dec { operand, .. } => {
                self.emit_expr(operand)?;
                self.emit("SUB_NUMBER 1");
                self.emit_save(operand)?;
            }
        }
        Ok(())
    }

    // ── loops ───────────────────────────────────────────────────

    fn emit_for(&mut self, kind: &ForKind, body: &[Stmt]) -> Result<()> {
        match kind {
            ForKind::Clause { init, cond, post } => {
                let label_begin = self.make_label();
                let label_end_block = self.make_label();
                let label_end_loop = self.make_label();
                self.fctx
                    .loop_stack
                    .push((label_end_loop.clone(), label_end_block.clone()));

                if let Some(st) = init {
                    self.emit_stmt(st)?;
                }
                self.emit(format!("{label_begin}: # loop begin"));
                if let Some(c) = cond {
                    self.emit_expr(c)?;
                    self.emit("TEST_IT");
                    self.emit(format!("je {label_end_loop} # jump if false"));
                }
                for st in body {
                    self.emit_stmt(st)?;
                }
                self.emit(format!("{label_end_block}: # block end"));
                if let Some(st) = post {
                    self.emit_stmt(st)?;
                }
                self.emit(format!("jmp {label_begin}"));
                self.emit(format!("{label_end_loop}: # loop end"));
                self.fctx.loop_stack.pop();
                Ok(())
            }
            ForKind::Range {
                index,
                value,
                expr,
                hidden,
            } => {
                let ct = self.expr_type_req(expr)?;
                let under = self.prog.types.underlying(ct);
                let hidden = hidden
                    .ok_or_else(|| self.internal(expr.span(), "range without a counter local"))?;
                if matches!(self.prog.types.kind(under), GtypeKind::Map { .. }) {
                    self.emit_range_for_map(index.as_ref(), value.as_ref(), expr, hidden, body)
                } else {
                    self.emit_range_for_list(index.as_ref(), value.as_ref(), expr, hidden, body)
                }
            }
        }
    }

    fn emit_range_for_list(
        &mut self,
        index: Option<&Expr>,
        value: Option<&Expr>,
        range_expr: &Expr,
        hidden: crate::ir::VarId,
        body: &[Stmt],
    ) -> Result<()> {
        let tstr = {
            let t = self.expr_type_req(range_expr)?;
            self.prog.types.string(t)
        };
        self.emit(format!("# for range {tstr}"));

        let index_expr = match index {
            Some(e) => e.clone(),
            None => {
                let ti = self.prog.types.t_int;
                self.var_expr(hidden, ti)
            }
        };

        let label_begin = self.make_label();
        let label_end_block = self.make_label();
        let label_end_loop = self.make_label();
        self.fctx
            .loop_stack
            .push((label_end_loop.clone(), label_end_block.clone()));

        self.emit("# index = 0");
        self.emit("LOAD_NUMBER 0");
        self.emit_save(&index_expr)?;

        self.emit(format!("{label_begin}: # loop begin"));

        self.emit("# index < len");
        self.emit_expr(&index_expr)?;
        self.emit("PUSH_8");
        self.emit_len(range_expr)?;
        self.emit("PUSH_8");
        self.emit("CMP_FROM_STACK setl");
        self.emit("TEST_IT");
        self.emit(format!("je {label_end_loop} # exhausted"));

        if let Some(vv) = value {
            self.emit("# value = collection[index]");
            let value_index = Expr::Index {
                collection: Box::new(range_expr.clone()),
                index: Box::new(index_expr.clone()),
                gtype: vv.gtype(),
                span: vv.span(),
            };
            self.emit_assign_one(vv, &value_index)?;
        }

        for st in body {
            self.emit_stmt(st)?;
        }
        self.emit(format!("{label_end_block}: # block end"));

        // stop after the final element
        self.emit_expr(&index_expr)?;
        self.emit("PUSH_8");
        self.emit_len(range_expr)?;
        self.emit("PUSH_8");
        self.emit("LOAD_NUMBER 1");
        self.emit("PUSH_8");
        self.emit("SUB_FROM_STACK");
        self.emit("PUSH_8");
        self.emit("CMP_FROM_STACK sete");
        self.emit("TEST_IT");
        self.emit(format!("jne {label_end_loop} # final iteration"));

        self.emit("# index++");
        self.emit_expr(&index_expr)?;
        self.emit("ADD_NUMBER 1");
        self.emit_save(&index_expr)?;
        self.emit(format!("jmp {label_begin}"));
        self.emit(format!("{label_end_loop}: # loop end"));
        self.fctx.loop_stack.pop();
        Ok(())
    }

    // ── switch ──────────────────────────────────────────────────

    fn emit_switch(
        &mut self,
        subject: Option<&Expr>,
        type_subject: Option<&Expr>,
        bind: &Option<(String, Option<crate::ir::VarId>)>,
        cases: &[SwitchCase],
        default: Option<&[Stmt]>,
    ) -> Result<()> {
        self.emit("# switch");
        let label_end = self.make_label();
        let is_type_switch = type_subject.is_some();

        if let Some(e) = type_subject {
            // the guard binding keeps the whole interface value
            if let Some((_, Some(vid))) = bind {
                self.emit("# bind the switch value");
                self.emit_expr(e)?;
                self.emit("PUSH_INTERFACE");
                let t = self.expr_type_req(e)?;
                let bind_expr = self.var_expr(*vid, t);
                self.emit_save24(&bind_expr, 0)?;
            }
            self.emit("# subject: dynamic type descriptor");
            self.emit_expr(e)?;
            self.emit("mov %rcx, %rax # descriptor word");
            self.emit("PUSH_8 # subject");
        } else if let Some(e) = subject {
            self.emit("# subject");
            self.emit_expr(e)?;
            self.emit("PUSH_8 # subject");
        }

        let subject_is_string = subject
            .and_then(|e| self.expr_type(e))
            .map(|t| self.prog.types.is_string(t))
            .unwrap_or(false);

        let mut case_labels = Vec::new();
        for (ci, case) in cases.iter().enumerate() {
            self.emit(format!("# case {ci}"));
            let my_label = self.make_label();
            case_labels.push(my_label.clone());

            if subject.is_none() && !is_type_switch {
                // switch { case cond: ... }
                for e in &case.exprs {
                    self.emit_expr(e)?;
                    self.emit("TEST_IT");
                    self.emit(format!("jne {my_label} # matches"));
                }
            } else if is_type_switch {
                for t in &case.resolved_types {
                    self.emit("# duplicate the subject");
                    self.emit("POP_8");
                    self.emit("PUSH_8");
                    self.emit("PUSH_8");
                    match t {
                        None => self.emit("mov $0, %rax # nil case"),
                        Some(t) => {
                            let label = self.dtype_label(*t);
                            let tstr = self.prog.types.string(*t);
                            self.emit(format!(
                                "LOAD_STRING_LITERAL {label} # type: {tstr}"
                            ));
                        }
                    }
                    self.emit("PUSH_8");
                    self.emit_strings_equal_from_stack(true);
                    self.emit("TEST_IT");
                    self.emit(format!("jne {my_label} # matches"));
                }
            } else {
                for e in &case.exprs {
                    self.emit("# duplicate the subject");
                    self.emit("POP_8");
                    self.emit("PUSH_8");
                    self.emit("PUSH_8");
                    self.emit_expr(e)?;
                    self.emit("PUSH_8");
                    if subject_is_string {
                        self.emit_strings_equal_from_stack(true);
                    } else {
                        self.emit("CMP_FROM_STACK sete");
                    }
                    self.emit("TEST_IT");
                    self.emit(format!("jne {my_label} # matches"));
                }
            }
        }

        let default_label = if default.is_some() {
            let l = self.make_label();
            self.emit(format!("jmp {l} # default"));
            Some(l)
        } else {
            self.emit(format!("jmp {label_end}"));
            None
        };

        for (case, label) in cases.iter().zip(case_labels) {
            self.emit(format!("{label}: # case body"));
            for st in &case.body {
                self.emit_stmt(st)?;
            }
            self.emit(format!("jmp {label_end}"));
        }
        if let (Some(stmts), Some(label)) = (default, default_label) {
            self.emit(format!("{label}: # default body"));
            for st in stmts {
                self.emit_stmt(st)?;
            }
        }
        self.emit(format!("{label_end}: # switch end"));
        if subject.is_some() || is_type_switch {
            self.emit("POP_8 # drop the subject");
        }
        Ok(())
    }

    // ── defer ───────────────────────────────────────────────────

    /// The body is emitted inline behind a skip jump. Return sequences enter
    /// the chain at the last defer; each body falls back to the previous
    /// one, the first leaves the frame.
    fn emit_defer(&mut self, expr: &Expr) -> Result<()> {
        self.emit("# defer");
        let label_start = format!("{}_defer", self.make_label());
        let label_end = format!("{}_defer", self.make_label());
        let previous = self.fctx.defer_labels.last().cloned();

        self.emit(format!("jmp {label_end}"));
        self.emit(format!("{label_start}: # defer start"));
        for reg in RET_REGI.iter() {
            self.emit(format!("push %{reg}"));
        }
        self.emit_expr(expr)?;
        for reg in RET_REGI.iter().rev() {
            self.emit(format!("pop %{reg}"));
        }
        match previous {
            Some(prev) => self.emit(format!("jmp {prev} # earlier defer")),
            None => {
                self.emit("leave");
                self.emit("ret");
            }
        }
        self.emit(format!("{label_end}: # defer end"));

        self.fctx.defer_labels.push(label_start);
        Ok(())
    }
}
