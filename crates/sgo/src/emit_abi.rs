//! Calling convention: frame prologue, argument packing, interface boxing
//! of call-site arguments, variadic collection, and returns.
//!
//! Arguments occupy register slots in source order: one slot for a word, three
//! consecutive slots for a 24-wide value. The emitter pushes every argument's
//! words, then pops into the slot registers in reverse.

use crate::ast::Expr;
use crate::diag::Result;
use crate::emit::{Codegen, REGS_FOR_ARGUMENTS, RET_REGI, align8};
use crate::ir::FuncId;
use crate::types::GtypeKind;

impl<'a> Codegen<'a> {
    pub fn emit_prologue(&mut self, fid: FuncId) -> Result<()> {
        let f = &self.prog.funcs[fid.0 as usize];
        let symbol = f.symbol.clone();
        let mut params: Vec<crate::ir::VarId> = Vec::new();
        if let Some(rv) = f.receiver {
            params.push(rv);
        }
        params.extend(f.params.iter().copied());
        let localvars = f.localvars.clone();
        let span = f.span;

        self.emit_noindent(format!(".global {symbol}"));
        self.emit_noindent(format!("{symbol}:"));
        self.emit("FUNC_PROLOGUE");

        let mut offset = 0i64;
        let mut reg_index = 0usize;
        if !params.is_empty() {
            self.emit("# set params");
        }
        for p in params {
            let gtype = self
                .prog
                .var(p)
                .gtype
                .ok_or_else(|| self.internal(span, "parameter with no type"))?;
            let name = self.prog.var(p).name.clone();
            let tstr = self.prog.types.string(gtype);
            if self.prog.types.is_24width(gtype) {
                offset -= 24;
                self.prog.var_mut(p).offset = offset;
                self.emit(format!("PUSH_ARG_{} # third", reg_index + 2));
                self.emit(format!("PUSH_ARG_{} # second", reg_index + 1));
                self.emit(format!("PUSH_ARG_{reg_index} # first \"{name}\" {tstr}"));
                reg_index += 3;
            } else {
                offset -= 8;
                self.prog.var_mut(p).offset = offset;
                self.emit(format!("PUSH_ARG_{reg_index} # param \"{name}\" {tstr}"));
                reg_index += 1;
            }
        }

        if !localvars.is_empty() {
            self.emit(format!(
                "# Allocating stack for localvars len={}",
                localvars.len()
            ));
        }
        let mut localarea = 0i64;
        for lv in &localvars {
            let gtype = self
                .prog
                .var(*lv)
                .gtype
                .ok_or_else(|| self.internal(span, "local variable with no type"))?;
            let size = self.prog.types.byte_size(gtype).max(1);
            let loff = align8(size);
            localarea -= loff;
            offset -= loff;
            self.prog.var_mut(*lv).offset = offset;
        }
        for lv in localvars.iter().rev() {
            let v = self.prog.var(*lv);
            let (off, name, g) = (v.offset, v.name.clone(), v.gtype.unwrap());
            let tstr = self.prog.types.string(g);
            self.emit(format!("# offset {off} variable \"{name}\" {tstr}"));
        }
        if localarea != 0 {
            self.emit(format!("sub ${}, %rsp # total stack size", -localarea));
        }
        self.emit_newline();
        Ok(())
    }

    pub fn emit_call_malloc(&mut self, size: i64) {
        self.emit(format!("LOAD_NUMBER {size}"));
        self.emit("PUSH_8");
        self.emit("POP_TO_ARG_0");
        self.emit("FUNCALL iruntime.malloc");
    }

    /// Builds the 24-wide (ptr, receiverTypeId, descriptor) triple from a
    /// concrete value: the value is boxed into 8 freshly allocated bytes.
    pub fn emit_conversion_to_interface(&mut self, dynamic_value: &Expr) -> Result<()> {
        let Some(gtype) = self.expr_type(dynamic_value) else {
            self.emit("# no concrete type, emit nil interface");
            self.emit("LOAD_EMPTY_INTERFACE");
            return Ok(());
        };
        if dynamic_value.is_nil() {
            self.emit("LOAD_EMPTY_INTERFACE");
            return Ok(());
        }

        let tstr = self.prog.types.string(gtype);
        self.emit(format!("# conversion to interface from {tstr}"));
        self.emit_expr(dynamic_value)?;
        self.emit("PUSH_8");
        self.emit_call_malloc(8);
        self.emit("PUSH_8");
        self.emit("STORE_8_INDIRECT_FROM_STACK");
        self.emit("PUSH_8 # addr of the boxed value");

        // pointer receivers dispatch through the pointed-to named type
        let mut receiver_type = gtype;
        if let GtypeKind::Ptr { to } = self.prog.types.kind(gtype) {
            receiver_type = *to;
        }
        let rid = self.prog.types.get(receiver_type).receiver_type_id;
        self.emit(format!("LOAD_NUMBER {rid} # receiverTypeId"));
        self.emit("PUSH_8");

        let label = self.dtype_label(gtype);
        self.emit(format!("lea {label}(%rip), %rax # dynamic type {tstr}"));
        self.emit("PUSH_8");
        self.emit("POP_INTERFACE");
        self.emit_newline();
        Ok(())
    }

    /// Static call: pack arguments into slot registers, boxing concrete
    /// arguments bound to interface parameters and collecting trailing
    /// variadic arguments into a fresh slice.
    pub fn emit_static_call(
        &mut self,
        symbol: &str,
        callee: Option<FuncId>,
        args: &[&Expr],
        is_method_call: bool,
    ) -> Result<()> {
        self.emit(format!("# call {symbol}"));

        let (param_types, variadic, param_len) = match callee {
            Some(fid) => {
                let f = self.prog.func(fid);
                let mut ps = Vec::new();
                if is_method_call {
                    if let Some(rv) = f.receiver {
                        ps.push(self.prog.var(rv).gtype);
                    }
                }
                for p in &f.params {
                    ps.push(self.prog.var(*p).gtype);
                }
                (ps.clone(), f.variadic, ps.len())
            }
            None => (Vec::new(), false, 0),
        };

        let mut num_regs = 0usize;
        let mut collect_variadic = false;
        let mut variadic_args: Vec<&Expr> = Vec::new();

        for (i, arg) in args.iter().enumerate() {
            if variadic && param_len > 0 && i >= param_len - 1 {
                collect_variadic = true;
            }
            if collect_variadic {
                variadic_args.push(arg);
                continue;
            }

            let from = self.expr_type(*arg);
            let mut convert = false;
            // the receiver is never boxed; printf keeps C varargs
            if (!is_method_call || i != 0) && symbol != "printf" {
                if let (Some(Some(to)), Some(from)) = (param_types.get(i), from) {
                    if self.prog.types.is_interface(*to) && !self.prog.types.is_interface(from)
                    {
                        convert = true;
                    }
                }
            }

            if convert {
                self.emit_conversion_to_interface(arg)?;
            } else {
                self.emit_expr(arg)?;
            }

            let is_iface = convert
                || from.map(|t| self.prog.types.is_interface(t)).unwrap_or(false);
            let width = if is_iface {
                self.emit("PUSH_INTERFACE");
                3
            } else {
                match from.map(|t| self.prog.types.kind(self.prog.types.underlying(t)).clone())
                {
                    Some(GtypeKind::Slice { .. }) => {
                        self.emit("PUSH_SLICE");
                        3
                    }
                    Some(GtypeKind::Map { .. }) => {
                        self.emit("PUSH_MAP");
                        3
                    }
                    _ => {
                        self.emit("PUSH_8");
                        1
                    }
                }
            };
            num_regs += width;
        }

        // a variadic parameter with no actual arguments receives nil
        if !collect_variadic && variadic && param_len > 0 && args.len() < param_len {
            collect_variadic = true;
        }

        if collect_variadic {
            self.emit("# collect variadic args into a slice");
            if variadic_args.is_empty() {
                self.emit("LOAD_EMPTY_SLICE");
                self.emit("PUSH_SLICE");
            } else {
                for (i, varg) in variadic_args.iter().enumerate() {
                    if i == 0 {
                        self.emit("LOAD_EMPTY_SLICE");
                        self.emit("PUSH_SLICE");
                    }
                    let vt = self.expr_type(varg);
                    if vt.map(|t| self.prog.types.is_interface(t)).unwrap_or(false) {
                        self.emit_expr(varg)?;
                    } else {
                        self.emit_conversion_to_interface(varg)?;
                    }
                    self.emit("PUSH_INTERFACE");
                    self.emit("POP_TO_ARG_5 # ifc_c");
                    self.emit("POP_TO_ARG_4 # ifc_b");
                    self.emit("POP_TO_ARG_3 # ifc_a");
                    self.emit("POP_TO_ARG_2 # cap");
                    self.emit("POP_TO_ARG_1 # len");
                    self.emit("POP_TO_ARG_0 # ptr");
                    self.emit("FUNCALL iruntime.append24");
                    self.emit("PUSH_SLICE");
                }
            }
            num_regs += 3;
        }

        for i in (0..num_regs).rev() {
            if i >= REGS_FOR_ARGUMENTS.len() {
                return Err(self.internal(
                    args.first().map(|a| a.span()).unwrap_or(crate::diag::Span::zero()),
                    "too many arguments",
                ));
            }
            self.emit(format!("POP_TO_ARG_{i}"));
        }

        self.emit(format!("FUNCALL {symbol}"));
        self.emit_newline();
        Ok(())
    }

    /// `return`: leave a single value in the result registers; push-then-pop
    /// multiple values into the return registers in reverse; converge on the
    /// defer handler.
    pub fn emit_return(&mut self, exprs: &[Expr]) -> Result<()> {
        let rettypes = self.fctx.rettypes.clone();
        let handler = self.fctx.label_defer_handler.clone();

        if exprs.is_empty() {
            self.emit("mov $0, %rax");
            self.emit(format!("jmp {handler} # defer and return"));
            return Ok(());
        }

        if exprs.len() == 1 {
            let expr = &exprs[0];
            let rettype = rettypes.first().copied();
            let et = self.expr_type(expr);
            let ret_is_iface = rettype
                .map(|t| self.prog.types.is_interface(t))
                .unwrap_or(false);
            let expr_is_iface = et.map(|t| self.prog.types.is_interface(t)).unwrap_or(false);
            if ret_is_iface && !expr_is_iface {
                if expr.is_nil() {
                    self.emit("LOAD_EMPTY_INTERFACE");
                } else {
                    self.emit_conversion_to_interface(expr)?;
                }
            } else {
                self.emit_expr(expr)?;
                if et.is_none()
                    && rettype
                        .map(|t| {
                            matches!(
                                self.prog.types.kind(self.prog.types.underlying(t)),
                                GtypeKind::Slice { .. }
                            )
                        })
                        .unwrap_or(false)
                {
                    self.emit("LOAD_EMPTY_SLICE");
                }
            }
            self.emit(format!("jmp {handler} # defer and return"));
            return Ok(());
        }

        let mut ret_regi_index = 0usize;
        for (i, expr) in exprs.iter().enumerate() {
            self.emit_expr(expr)?;
            let rettype = rettypes.get(i).copied();
            let mut size = rettype
                .map(|t| self.prog.types.byte_size(t))
                .unwrap_or(8);
            if size < 8 {
                size = 8;
            }
            let num_words = (size / 8) as usize;
            for j in 0..num_words {
                self.emit(format!("push %{}", RET_REGI[num_words - 1 - j]));
                ret_regi_index += 1;
            }
        }
        for i in 0..ret_regi_index {
            self.emit(format!("pop %{}", RET_REGI[ret_regi_index - 1 - i]));
        }
        self.emit(format!("jmp {handler} # defer and return"));
        Ok(())
    }
}
