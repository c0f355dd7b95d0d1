//! Program root: the container code generation walks once.
//!
//! Owns the arenas (types, variables, constants, functions), the ordered
//! global declarations, the string-literal pool and the method table. The
//! dynamic-type descriptor set is collected during emission, since interface
//! conversions are decided at use sites.

use std::path::PathBuf;

use crate::ast::{Expr, Stmt};
use crate::diag::{SourceMap, Span};
use crate::types::{TypeId, Types};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstId(pub u32);

#[derive(Debug)]
pub struct Variable {
    pub name: String,
    pub gtype: Option<TypeId>,
    /// frame offset for locals (negative, set during prologue emission)
    pub offset: i64,
    pub is_global: bool,
    pub span: Span,
}

#[derive(Debug)]
pub struct ConstDef {
    pub name: String,
    pub gtype: Option<TypeId>,
    pub val: Expr,
    pub iota_index: i64,
    pub span: Span,
}

/// Builtins special-cased by the emitter instead of being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Cap,
    Append,
    Make,
    Println,
    Print,
    DumpSlice,
    DumpInterface,
    AssertInterface,
    AsComment,
}

#[derive(Debug)]
pub struct DeclFunc {
    pub pkg: String,
    pub name: String,
    /// linker symbol: `pkg.name`, `pkg.Type$method`, or an extern override
    pub symbol: String,
    pub receiver: Option<VarId>,
    pub params: Vec<VarId>,
    pub variadic: bool,
    pub rettypes: Vec<TypeId>,
    /// every stack variable of the body, hidden locals included
    pub localvars: Vec<VarId>,
    pub body: Vec<Stmt>,
    pub builtin: Option<Builtin>,
    /// declared-only functions resolved to a C symbol (e.g. fmt.Printf)
    pub is_extern: bool,
    pub span: Span,
}

#[derive(Debug)]
pub struct GlobalDecl {
    pub var: VarId,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StringLit {
    pub label: String,
    pub val: String,
}

/// Assigns `.S<n>` labels while the front end runs.
#[derive(Debug, Default)]
pub struct StringPool {
    pub literals: Vec<StringLit>,
}

impl StringPool {
    pub fn intern(&mut self, val: &str) -> String {
        let label = format!(".S{}", self.literals.len());
        self.literals.push(StringLit {
            label: label.clone(),
            val: val.to_string(),
        });
        label
    }
}

#[derive(Debug, Clone)]
pub struct MethodTableEntry {
    /// short method name, emitted once at `.M<name>`
    pub mname: String,
    /// full function symbol, e.g. `main.P$sum`
    pub symbol: String,
}

#[derive(Debug, Default)]
pub struct Program {
    pub smap: SourceMap,
    pub types: Types,
    pub vars: Vec<Variable>,
    pub consts: Vec<ConstDef>,
    pub funcs: Vec<DeclFunc>,
    pub globals: Vec<GlobalDecl>,
    pub strings: StringPool,
    /// `receiverTypeId` -> ordered method symbols, ids ascending from 1
    pub method_table: Vec<(u32, Vec<MethodTableEntry>)>,
}

impl Program {
    pub fn add_var(&mut self, v: Variable) -> VarId {
        self.vars.push(v);
        VarId((self.vars.len() - 1) as u32)
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0 as usize]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.0 as usize]
    }

    pub fn add_func(&mut self, f: DeclFunc) -> FuncId {
        self.funcs.push(f);
        FuncId((self.funcs.len() - 1) as u32)
    }

    pub fn func(&self, id: FuncId) -> &DeclFunc {
        &self.funcs[id.0 as usize]
    }

    pub fn add_const(&mut self, c: ConstDef) -> ConstId {
        self.consts.push(c);
        ConstId((self.consts.len() - 1) as u32)
    }

    pub fn konst(&self, id: ConstId) -> &ConstDef {
        &self.consts[id.0 as usize]
    }

    pub fn add_source(&mut self, path: PathBuf) -> usize {
        self.smap.add(path)
    }
}
