//! Map operations and interface-method dispatch.
//!
//! A map is a 24-wide header (data ptr, len, cap) over a flat array of
//! 16-byte entries: a key address followed by a value address. Lookup is a
//! linear scan. String keys store the string pointer directly and compare
//! with strcmp; other keys are boxed into 8 allocated bytes and compare as
//! words. The per-type method tables used for interface dispatch have the
//! same entry shape, keyed by interned method-name label addresses.

use crate::ast::{Expr, LitElem};
use crate::diag::Result;
use crate::emit::Codegen;
use crate::types::GtypeKind;

impl<'a> Codegen<'a> {
    /// m[k] as an r-value: value in %rax (or the three result registers),
    /// found flag in %rbx / %rdx (see map_ok_register).
    pub fn load_map_index(&mut self, map: &Expr, index: &Expr) -> Result<()> {
        self.emit("# map index");
        self.emit_expr(map)?;
        self.emit("PUSH_8 # map head");
        self.emit_offset_load(map, 8, 8)?;
        self.emit("PUSH_8 # len");
        self.emit_expr(index)?;
        self.emit("PUSH_8 # key");
        self.emit_map_get(map, true)
    }

    /// In: stack holds (head, len, key). Out: value (deref'd when asked),
    /// ok register set, %r12 = matching entry's key address.
    fn emit_map_get(&mut self, map: &Expr, deref: bool) -> Result<()> {
        let mt = self.expr_type_req(map)?;
        let under = self.prog.types.underlying(mt);
        let (key_t, value_t) = match self.prog.types.kind(under).clone() {
            GtypeKind::Map { key, value } => (key, value),
            _ => return Err(self.internal(map.span(), "map get on a non-map")),
        };
        let key_is_string = self.prog.types.is_string(key_t);
        let value_is_24 = self.prog.types.is_24width(value_t);
        let value_is_string = self.prog.types.is_string(value_t);
        let ok_reg = self.map_ok_register(value_is_24);

        self.emit("pop %r12 # key");
        self.emit("pop %r11 # len");
        self.emit("pop %r10 # head");
        self.emit("# scan the 16-byte entries");
        self.emit("mov $0, %r13 # loop counter");

        let label_begin = self.make_label();
        let label_incr = self.make_label();
        let label_end = self.make_label();

        self.emit(format!("{label_begin}: # scan loop"));
        self.emit("push %r13");
        self.emit("push %r11");
        self.emit("CMP_FROM_STACK setl");
        self.emit("TEST_IT");
        if value_is_24 {
            self.emit("LOAD_EMPTY_SLICE # not found");
        } else if value_is_string {
            self.emit_empty_string();
        } else {
            self.emit("mov $0, %rax # not found");
        }
        self.emit(format!("mov $0, %{ok_reg} # ok = false"));
        self.emit(format!("je {label_end} # exhausted all keys"));

        self.emit("# compare the key");
        self.emit("mov %r13, %rax");
        self.emit("IMUL_NUMBER 16");
        self.emit("PUSH_8");
        self.emit("mov %r10, %rax");
        self.emit("PUSH_8");
        self.emit("SUM_FROM_STACK # head + i*16");
        self.emit("PUSH_8 # entry address");
        self.emit("LOAD_8_BY_DEREF # key address");
        if !key_is_string {
            self.emit("LOAD_8_BY_DEREF # unbox the key");
        }
        if key_is_string {
            self.emit("push %r13");
            self.emit("push %r11");
            self.emit("push %r10");
            self.emit("PUSH_8");
            self.emit("push %r12");
            self.emit_strings_equal_from_stack(true);
            self.emit("pop %r10");
            self.emit("pop %r11");
            self.emit("pop %r13");
        } else {
            self.emit("cmp %r12, %rax");
            self.emit("sete %al");
            self.emit("movzb %al, %eax");
        }
        self.emit("TEST_IT");
        self.emit("pop %rax # entry address");
        self.emit(format!("je {label_incr} # no match, next entry"));

        self.emit("# found");
        self.emit("push %rax # stash key address");
        self.emit("ADD_NUMBER 8 # value slot");
        self.emit("mov (%rax), %rax # value address");
        if deref {
            if value_is_24 {
                self.emit("LOAD_24_BY_DEREF");
            } else {
                self.emit("LOAD_8_BY_DEREF");
            }
        }
        self.emit(format!("mov $1, %{ok_reg} # ok = true"));
        self.emit("pop %r12 # key address, used by map set");
        self.emit(format!("jmp {label_end}"));

        self.emit(format!("{label_incr}:"));
        self.emit("add $1, %r13");
        self.emit(format!("jmp {label_begin}"));
        self.emit(format!("{label_end}: # scan done"));
        Ok(())
    }

    /// `m[k] = v`. Expects the value pushed (one word, or three when
    /// `is_24`). Overwrites in place when the key exists, otherwise appends
    /// a fresh entry at the tail and bumps the header length.
    pub fn emit_map_set(&mut self, map: &Expr, index: &Expr, is_24: bool) -> Result<()> {
        self.emit("# map set");
        let label_append = self.make_label();
        let label_save = self.make_label();

        self.load_map_index(map, index)?;
        let ok_reg = self.map_ok_register(is_24);
        self.emit(format!("cmp $1, %{ok_reg} # found?"));
        self.emit("sete %al");
        self.emit("movzb %al, %eax");
        self.emit("TEST_IT");
        self.emit(format!("je {label_append} # append when missing"));

        self.emit("# overwrite in place");
        self.emit("push %r12 # key address");
        self.emit(format!("jmp {label_save}"));

        self.emit(format!("{label_append}: # append entry"));
        self.emit_expr(map)?;
        self.emit("PUSH_8 # head");
        self.emit_offset_load(map, 8, 8)?;
        self.emit("IMUL_NUMBER 16 # head-to-tail distance");
        self.emit("PUSH_8");
        self.emit("SUM_FROM_STACK");
        self.emit("PUSH_8 # tail address");

        self.emit("# len++");
        self.emit_offset_load(map, 8, 8)?;
        self.emit("ADD_NUMBER 1");
        self.emit_offset_save(map, 8, 8)?;

        self.emit(format!("{label_save}: # store key and value"));
        self.emit_expr(index)?;
        self.emit("PUSH_8 # key value");

        let mt = self.expr_type_req(map)?;
        let under = self.prog.types.underlying(mt);
        let key_t = match self.prog.types.kind(under).clone() {
            GtypeKind::Map { key, .. } => key,
            _ => return Err(self.internal(map.span(), "map set on a non-map")),
        };
        if self.prog.types.is_string(key_t) {
            self.emit("pop %rcx # key value");
            self.emit("pop %rax # tail address");
            self.emit("mov %rcx, (%rax) # string key stored directly");
            self.emit("PUSH_8");
        } else {
            self.emit_call_malloc(8);
            self.emit("pop %rcx # key value");
            self.emit("mov %rcx, (%rax) # box the key");
            self.emit("pop %rcx # tail address");
            self.emit("mov %rax, (%rcx)");
            self.emit("push %rcx");
        }

        let value_size = if is_24 { 24 } else { 8 };
        self.emit_call_malloc(value_size);
        self.emit("pop %rcx # tail address");
        self.emit("mov %rax, 8(%rcx) # value address");
        self.emit("PUSH_8");
        if is_24 {
            self.emit("STORE_24_INDIRECT_FROM_STACK");
        } else {
            self.emit("STORE_8_INDIRECT_FROM_STACK");
        }
        self.emit_newline();
        Ok(())
    }

    /// Map literal: allocate the entry array, store each pair, leave
    /// (head, len, cap) in the result registers.
    pub fn emit_map_literal(&mut self, e: &Expr) -> Result<()> {
        let Expr::CompositeLit {
            elems, gtype, span, ..
        } = e
        else {
            unreachable!()
        };
        self.emit("# map literal");
        let t = gtype.ok_or_else(|| self.internal(*span, "untyped map literal"))?;
        let under = self.prog.types.underlying(t);
        let (key_t, value_t) = match self.prog.types.kind(under).clone() {
            GtypeKind::Map { key, value } => (key, value),
            _ => return Err(self.internal(*span, "map literal of a non-map type")),
        };
        let key_is_string = self.prog.types.is_string(key_t);
        let length = elems.len() as i64;

        // oversized entry array; later stores land past the literal ones
        let size = if length == 0 { 8 * 1024 } else { length * 8 * 1024 };
        self.emit_call_malloc(size);
        self.emit("PUSH_8 # head");

        for (i, el) in elems.iter().enumerate() {
            let LitElem::MapPair { key, value } = el else {
                return Err(self.internal(*span, "non-pair element in map literal"));
            };
            if key_is_string {
                self.emit_expr(key)?;
            } else {
                self.emit_expr(key)?;
                self.emit("PUSH_8 # key value");
                self.emit_call_malloc(8);
                self.emit("PUSH_8");
                self.emit("STORE_8_INDIRECT_FROM_STACK # box the key");
            }
            self.emit("pop %rbx # head");
            self.emit(format!("mov %rax, {}(%rbx) # key address", i * 16));
            self.emit("push %rbx");

            if self.prog.types.is_24width(value_t) {
                self.emit_expr(value)?;
                self.emit("PUSH_24");
                self.emit_call_malloc(24);
                self.emit("PUSH_8");
                self.emit("STORE_24_INDIRECT_FROM_STACK");
            } else {
                self.emit_expr(value)?;
                self.emit("PUSH_8 # value");
                self.emit_call_malloc(8);
                self.emit("PUSH_8");
                self.emit("STORE_8_INDIRECT_FROM_STACK");
            }
            self.emit("pop %rbx # head");
            self.emit(format!("mov %rax, {}(%rbx) # value address", i * 16 + 8));
            self.emit("push %rbx");
        }

        self.emit("pop %rax # head");
        self.emit(format!("mov ${length}, %rbx # len"));
        self.emit(format!("mov ${length}, %rcx # cap"));
        Ok(())
    }

    /// `for k, v := range m`: an invisible counter walks the 16-byte
    /// entries.
    pub fn emit_range_for_map(
        &mut self,
        index: Option<&Expr>,
        value: Option<&Expr>,
        range_expr: &Expr,
        counter: crate::ir::VarId,
        body: &[crate::ast::Stmt],
    ) -> Result<()> {
        let mt = self.expr_type_req(range_expr)?;
        let under = self.prog.types.underlying(mt);
        let key_t = match self.prog.types.kind(under).clone() {
            GtypeKind::Map { key, .. } => key,
            _ => return Err(self.internal(range_expr.span(), "range over a non-map")),
        };
        let key_is_string = self.prog.types.is_string(key_t);
        let tstr = self.prog.types.string(mt);
        self.emit(format!("# for range {tstr}"));

        let label_begin = self.make_label();
        let label_end_block = self.make_label();
        let label_end_loop = self.make_label();
        self.fctx
            .loop_stack
            .push((label_end_loop.clone(), label_end_block.clone()));

        self.emit("# counter = 0");
        self.emit("LOAD_NUMBER 0");
        self.emit_variable_offset_save(counter, 8, 0, false)?;

        self.emit(format!("{label_begin}: # loop begin"));
        self.emit_variable(counter)?;
        self.emit("PUSH_8");
        self.emit_len(range_expr)?;
        self.emit("PUSH_8");
        self.emit("CMP_FROM_STACK setl");
        self.emit("TEST_IT");
        self.emit(format!("je {label_end_loop} # exhausted"));

        self.emit("# key = entries[counter]");
        self.emit_variable(counter)?;
        self.emit("IMUL_NUMBER 16");
        self.emit("PUSH_8");
        self.emit_expr(range_expr)?;
        self.emit("PUSH_8");
        self.emit("SUM_FROM_STACK");
        self.emit("LOAD_8_BY_DEREF");
        if !key_is_string {
            self.emit("LOAD_8_BY_DEREF # unbox the key");
        }
        if let Some(iv) = index {
            self.emit_save(iv)?;
        }

        if let Some(vv) = value {
            self.emit("# value = entries[counter].value");
            self.emit_expr(range_expr)?;
            self.emit("PUSH_8");
            self.emit_variable(counter)?;
            self.emit("IMUL_NUMBER 16");
            self.emit("ADD_NUMBER 8");
            self.emit("PUSH_8");
            self.emit("SUM_FROM_STACK");
            self.emit("LOAD_8_BY_DEREF # value address");
            let vt = self.expr_type_req(vv)?;
            if self.prog.types.is_24width(vt) {
                self.emit("LOAD_24_BY_DEREF");
                self.emit("PUSH_24");
                self.emit_save24(vv, 0)?;
            } else {
                self.emit("LOAD_8_BY_DEREF");
                self.emit_save(vv)?;
            }
        }

        for st in body {
            self.emit_stmt(st)?;
        }
        self.emit(format!("{label_end_block}: # block end"));

        self.emit_variable(counter)?;
        self.emit("ADD_NUMBER 1");
        self.emit_variable_offset_save(counter, 8, 0, false)?;
        self.emit(format!("jmp {label_begin}"));
        self.emit(format!("{label_end_loop}: # loop end"));
        self.fctx.loop_stack.pop();
        Ok(())
    }

    /// Interface dispatch: index the receiverTypes table by the value's
    /// receiverTypeId, then scan the per-type table comparing interned
    /// method-name label addresses.
    pub fn emit_interface_method_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
    ) -> Result<()> {
        self.emit(format!("# interface method call \"{method}\""));
        self.emit("# load receiverTypeId");
        self.emit_offset_load(receiver, 8, 8)?;
        self.emit("IMUL_NUMBER 8");
        self.emit("PUSH_8");
        self.emit("lea receiverTypes(%rip), %rax");
        self.emit("PUSH_8");
        self.emit("SUM_FROM_STACK");
        self.emit("mov (%rax), %rax # per-type method table");

        self.emit(format!("# find {method} by label address"));
        self.emit("mov %rax, %r10 # table cursor");
        self.emit(format!("lea .M{method}(%rip), %r11 # wanted name"));
        let label_scan = self.make_label();
        let label_found = self.make_label();
        self.emit(format!("{label_scan}:"));
        self.emit("mov (%r10), %rax");
        self.emit("cmp %r11, %rax");
        self.emit(format!("je {label_found}"));
        self.emit("add $16, %r10");
        self.emit(format!("jmp {label_scan}"));
        self.emit(format!("{label_found}:"));
        self.emit("mov 8(%r10), %rax # function pointer");
        self.emit("PUSH_8 # stash function pointer");

        self.emit("# receiver: unbox the concrete value");
        self.emit_expr(receiver)?;
        self.emit("LOAD_8_BY_DEREF");
        self.emit("PUSH_8 # receiver");
        for (i, arg) in args.iter().enumerate() {
            self.emit_expr(arg)?;
            self.emit(format!("PUSH_8 # argument {}", i + 2));
        }
        let total = args.len() + 1;
        for i in (0..total).rev() {
            self.emit(format!("POP_TO_ARG_{i}"));
        }
        self.emit("pop %rax # function pointer");
        self.emit("call *%rax");
        self.emit_newline();
        Ok(())
    }
}
