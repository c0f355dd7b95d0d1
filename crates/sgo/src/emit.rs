//! Code generator: lowers the fully-typed tree to GAS x86-64 text.
//!
//! "emit" here always means "append assembly text to the output"; values are
//! loaded into registers by the expression emitters. A single-word result
//! lives in %rax; 24-wide values (slice/interface/map) live in
//! (%rax, %rbx, %rcx).
//!
//! Output order: the read-only `.data` descriptors (string literals,
//! dynamic-type descriptors, the receiverTypes table), then global
//! variables, then `.text`. Function text is produced first so the
//! descriptor set discovered at use sites is complete before the data
//! segment is rendered.

use std::collections::HashMap;

use crate::ast::Expr;
use crate::diag::{CompileError, DiagKind, Result, Span};
use crate::ir::{FuncId, Program};
use crate::types::{TypeId, align};

/// Multi-word return registers, first value word first.
pub const RET_REGI: [&str; 14] = [
    "rax", "rbx", "rcx", "rdx", "rdi", "rsi", "r8", "r9", "r10", "r11", "r12", "r13", "r14",
    "r15",
];

/// Argument registers in slot order.
pub const REGS_FOR_ARGUMENTS: [&str; 12] = [
    "rdi", "rsi", "rdx", "rcx", "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
];

#[derive(Default)]
pub struct FuncCtx {
    pub label_defer_handler: String,
    /// start labels of the defers seen so far, in source order
    pub defer_labels: Vec<String>,
    /// (label_end_loop, label_end_block) per enclosing loop
    pub loop_stack: Vec<(String, String)>,
    pub rettypes: Vec<TypeId>,
}

pub struct Codegen<'a> {
    pub prog: &'a mut Program,
    pub out: String,
    pub label_seq: usize,
    pub indent: usize,
    /// dynamic-type descriptors discovered during emission:
    /// (label, canonical type string), dedup keyed by the string
    dtypes: Vec<(String, String)>,
    dtype_index: HashMap<String, usize>,
    pub fctx: FuncCtx,
}

pub fn generate(prog: &mut Program) -> Result<String> {
    let main_exists = prog
        .funcs
        .iter()
        .any(|f| f.pkg == "main" && f.name == "main" && f.builtin.is_none());
    if !main_exists {
        return Err(CompileError::new(
            &prog.smap,
            Span::zero(),
            DiagKind::Resolution,
            "function main is undeclared in the main package",
        ));
    }

    let mut cg = Codegen {
        prog,
        out: String::new(),
        label_seq: 0,
        indent: 1,
        dtypes: Vec::new(),
        dtype_index: HashMap::new(),
        fctx: FuncCtx::default(),
    };

    cg.emit_runtime_helpers();
    let mut order: Vec<FuncId> = Vec::new();
    let mut main_fid = None;
    for i in 0..cg.prog.funcs.len() {
        let f = &cg.prog.funcs[i];
        if f.builtin.is_some() || f.is_extern {
            continue;
        }
        if f.pkg == "main" && f.name == "main" {
            main_fid = Some(FuncId(i as u32));
        } else {
            order.push(FuncId(i as u32));
        }
    }
    order.extend(main_fid);
    for fid in order {
        cg.emit_func(fid)?;
    }
    let text = std::mem::take(&mut cg.out);

    cg.emit_globals()?;
    let globals = std::mem::take(&mut cg.out);

    cg.emit_rodata();
    let data = std::mem::take(&mut cg.out);

    Ok(format!("{data}{globals}.text\n{text}"))
}

impl<'a> Codegen<'a> {
    // ── output helpers ──────────────────────────────────────────

    pub fn emit(&mut self, line: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    pub fn emit_noindent(&mut self, line: impl AsRef<str>) {
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    pub fn emit_newline(&mut self) {
        self.out.push('\n');
    }

    pub fn make_label(&mut self) -> String {
        let l = format!(".L{}", self.label_seq);
        self.label_seq += 1;
        l
    }

    pub fn internal(&self, span: Span, msg: impl Into<String>) -> CompileError {
        CompileError::internal(&self.prog.smap, span, msg)
    }

    pub fn tbi(&self, span: Span, what: impl Into<String>) -> CompileError {
        CompileError::tbi(&self.prog.smap, span, what)
    }

    /// Type of an expression after inference; literals are intrinsically
    /// typed.
    pub fn expr_type(&self, e: &Expr) -> Option<TypeId> {
        match e {
            Expr::Num { .. } => Some(self.prog.types.t_int),
            Expr::Str { .. } => Some(self.prog.types.t_string),
            Expr::Nil { .. } => Some(self.prog.types.t_nil),
            other => other.gtype(),
        }
    }

    pub fn expr_type_req(&self, e: &Expr) -> Result<TypeId> {
        self.expr_type(e)
            .ok_or_else(|| self.internal(e.span(), "expression has no inferred type"))
    }

    /// `.DT<n>` label of a type's dynamic-type descriptor; the canonical
    /// string is the identity, so structurally equal types share a label.
    pub fn dtype_label(&mut self, t: TypeId) -> String {
        let key = self.prog.types.string(t);
        if let Some(i) = self.dtype_index.get(&key) {
            return self.dtypes[*i].0.clone();
        }
        let label = format!(".DT{}", self.dtypes.len());
        self.dtype_index.insert(key.clone(), self.dtypes.len());
        self.dtypes.push((label.clone(), key));
        label
    }

    pub fn intern_string(&mut self, val: &str) -> String {
        if let Some(lit) = self.prog.strings.literals.iter().find(|l| l.val == val) {
            return lit.label.clone();
        }
        self.prog.strings.intern(val)
    }

    // ── functions ───────────────────────────────────────────────

    fn emit_func(&mut self, fid: FuncId) -> Result<()> {
        self.fctx = FuncCtx {
            label_defer_handler: self.make_label(),
            defer_labels: Vec::new(),
            loop_stack: Vec::new(),
            rettypes: self.prog.funcs[fid.0 as usize].rettypes.clone(),
        };

        self.emit_prologue(fid)?;

        let mut body = std::mem::take(&mut self.prog.funcs[fid.0 as usize].body);
        for st in &body {
            self.emit_stmt(st)?;
        }
        self.prog.funcs[fid.0 as usize].body = std::mem::take(&mut body);

        self.emit("mov $0, %rax");
        self.emit_func_epilogue();
        Ok(())
    }

    /// Every function converges on the defer-handler label; when a defer was
    /// seen, the handler enters the defer chain instead of leaving directly.
    fn emit_func_epilogue(&mut self) {
        self.emit_newline();
        self.emit("# func epilogue");
        let handler = self.fctx.label_defer_handler.clone();
        self.emit(format!("{handler}: # defer handler"));
        if let Some(last) = self.fctx.defer_labels.last().cloned() {
            self.emit(format!("jmp {last}"));
        }
        self.emit("LEAVE_AND_RET");
        self.emit_newline();
    }

    // ── hand-written runtime functions ──────────────────────────
    //
    // makeSlice and strcopy return values in multiple registers, which a
    // C-ABI helper cannot, so the generator emits them itself. malloc is a
    // trampoline to the allocator symbol the support library exports.

    fn emit_runtime_helpers(&mut self) {
        self.emit_noindent(".global iruntime.makeSlice");
        self.emit_noindent("iruntime.makeSlice:");
        self.emit("FUNC_PROLOGUE");
        self.emit_newline();
        self.emit("PUSH_ARG_2"); // -8  : elmSize
        self.emit("PUSH_ARG_1"); // -16 : newcap
        self.emit("PUSH_ARG_0"); // -24 : newlen
        self.emit_newline();
        self.emit("mov -16(%rbp), %rax # newcap");
        self.emit("mov -8(%rbp), %rcx # unit");
        self.emit("imul %rcx, %rax");
        self.emit("ADD_NUMBER 16 # pure buffer");
        self.emit_newline();
        self.emit("PUSH_8");
        self.emit("POP_TO_ARG_0");
        self.emit("FUNCALL iruntime.malloc");
        self.emit_newline();
        self.emit("mov -24(%rbp), %rbx # newlen");
        self.emit("mov -16(%rbp), %rcx # newcap");
        self.emit_newline();
        self.emit("LEAVE_AND_RET");
        self.emit_newline();

        // strcopy(src, dst, len) -> dst: bounded byte copy, NUL terminated
        let loop_l = self.make_label();
        let done_l = self.make_label();
        self.emit_noindent(".global iruntime.strcopy");
        self.emit_noindent("iruntime.strcopy:");
        self.emit("FUNC_PROLOGUE");
        self.emit("mov $0, %rcx");
        self.emit(format!("{loop_l}: # copy loop"));
        self.emit("cmp %rdx, %rcx");
        self.emit(format!("je {done_l}"));
        self.emit("movb (%rdi,%rcx,1), %r8b");
        self.emit("movb %r8b, (%rsi,%rcx,1)");
        self.emit("add $1, %rcx");
        self.emit(format!("jmp {loop_l}"));
        self.emit(format!("{done_l}:"));
        self.emit("movb $0, (%rsi,%rcx,1)");
        self.emit("mov %rsi, %rax");
        self.emit("LEAVE_AND_RET");
        self.emit_newline();

        self.emit_noindent(".global iruntime.malloc");
        self.emit_noindent("iruntime.malloc:");
        self.emit("FUNC_PROLOGUE");
        self.emit("FUNCALL .malloc");
        self.emit("LEAVE_AND_RET");
        self.emit_newline();
    }

    // ── read-only data segment ──────────────────────────────────

    fn emit_rodata(&mut self) {
        self.emit_noindent(".data");
        self.emit_newline();
        self.emit("# string literals");
        let lits = self.prog.strings.literals.clone();
        for lit in lits {
            self.emit_noindent(format!("{}:", lit.label));
            self.emit(format!(".string \"{}\"", escape_asm(&lit.val)));
        }
        self.emit_newline();

        self.emit("# dynamic type descriptors");
        let dtypes = self.dtypes.clone();
        for (label, canon) in dtypes {
            self.emit_noindent(format!("{label}:"));
            self.emit(format!(".string \"{}\"", escape_asm(&canon)));
        }
        self.emit_newline();

        let table = self.prog.method_table.clone();
        let max_id = table.iter().map(|(id, _)| *id).max().unwrap_or(0);
        self.emit("# receiver type table for interface dispatch");
        self.emit_noindent("receiverTypes:");
        self.emit(".quad 0");
        for id in 1..=max_id {
            self.emit(format!(".quad namedType{id}"));
        }
        self.emit_newline();

        // each short method name is emitted exactly once; the dispatch
        // search compares the label addresses
        let mut emitted: Vec<String> = Vec::new();
        for (_, entries) in &table {
            for e in entries {
                if !emitted.contains(&e.mname) {
                    emitted.push(e.mname.clone());
                }
            }
        }
        for name in emitted {
            self.emit_noindent(format!(".M{name}:"));
            self.emit(format!(".string \"{name}\""));
        }
        self.emit_newline();

        for (id, entries) in &table {
            self.emit_noindent(format!("namedType{id}:"));
            for e in entries {
                self.emit(format!(".quad .M{}", e.mname));
                self.emit(format!(".quad {}", e.symbol));
            }
        }
        self.emit_newline();
    }
}

pub fn escape_asm(s: &str) -> String {
    let mut out = String::new();
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out
}

pub fn align8(n: i64) -> i64 {
    align(n, 8)
}
