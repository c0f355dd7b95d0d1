//! The typed tree.
//!
//! Identifier uses carry a `Relation` slot (`rel`) that resolution points at
//! a declaration id; expressions carry a `gtype` slot that inference fills.
//! Cross references are arena ids, never owning pointers, so the tree stays
//! acyclic even though methods, named types and bodies refer to each other.

use crate::diag::Span;
use crate::ir::{ConstId, FuncId, VarId};
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Addr,
    Deref,
    Not,
    Neg,
}

/// What a resolved identifier points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Var(VarId),
    Const(ConstId),
    Func(FuncId),
    /// type names used in conversions
    Type(TypeId),
}

/// Syntactic type expression, resolved to a `TypeId` by name resolution.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Name {
        pkg: Option<String>,
        name: String,
        span: Span,
    },
    Ptr(Box<TypeExpr>),
    Array {
        len: i64,
        elem: Box<TypeExpr>,
    },
    Slice(Box<TypeExpr>),
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Struct {
        fields: Vec<(String, TypeExpr)>,
        span: Span,
    },
    Interface {
        methods: Vec<(String, Vec<TypeExpr>, Vec<TypeExpr>)>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Name { span, .. }
            | TypeExpr::Struct { span, .. }
            | TypeExpr::Interface { span, .. } => *span,
            TypeExpr::Ptr(inner) | TypeExpr::Slice(inner) => inner.span(),
            TypeExpr::Array { elem, .. } => elem.span(),
            TypeExpr::Map { key, .. } => key.span(),
        }
    }
}

/// One element of a composite literal.
#[derive(Debug, Clone)]
pub enum LitElem {
    /// `Field: value` inside a struct literal
    Keyed { key: String, value: Expr },
    /// `keyExpr: value` inside a map literal
    MapPair { key: Expr, value: Expr },
    /// positional value (array/slice literals, positional struct literals)
    Plain(Expr),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Num {
        val: i64,
        span: Span,
    },
    Str {
        val: String,
        slabel: String,
        span: Span,
    },
    Nil {
        span: Span,
    },
    Ident {
        pkg: Option<String>,
        name: String,
        rel: Option<Resolved>,
        gtype: Option<TypeId>,
        span: Span,
    },
    Binop {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        gtype: Option<TypeId>,
        span: Span,
    },
    Unop {
        op: UnOp,
        operand: Box<Expr>,
        gtype: Option<TypeId>,
        span: Span,
    },
    Index {
        collection: Box<Expr>,
        index: Box<Expr>,
        gtype: Option<TypeId>,
        span: Span,
    },
    SliceExpr {
        collection: Box<Expr>,
        low: Box<Expr>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
        gtype: Option<TypeId>,
        span: Span,
    },
    /// `base.field` where base is not a package name
    Field {
        strct: Box<Expr>,
        name: String,
        gtype: Option<TypeId>,
        span: Span,
    },
    /// Function call, builtin call, or conversion (callee resolves to a type)
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        gtype: Option<TypeId>,
        span: Span,
    },
    MethodCall {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        gtype: Option<TypeId>,
        span: Span,
    },
    TypeAssert {
        expr: Box<Expr>,
        target: TypeExpr,
        target_ty: Option<TypeId>,
        gtype: Option<TypeId>,
        span: Span,
    },
    CompositeLit {
        texpr: TypeExpr,
        elems: Vec<LitElem>,
        gtype: Option<TypeId>,
        /// materialisation site for struct and array literals used as
        /// r-values (a struct value is represented by its address)
        hidden_var: Option<VarId>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Num { span, .. }
            | Expr::Str { span, .. }
            | Expr::Nil { span }
            | Expr::Ident { span, .. }
            | Expr::Binop { span, .. }
            | Expr::Unop { span, .. }
            | Expr::Index { span, .. }
            | Expr::SliceExpr { span, .. }
            | Expr::Field { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::TypeAssert { span, .. }
            | Expr::CompositeLit { span, .. } => *span,
        }
    }

    pub fn gtype(&self) -> Option<TypeId> {
        match self {
            Expr::Num { .. } | Expr::Str { .. } | Expr::Nil { .. } => None, // see typed()
            Expr::Ident { gtype, .. }
            | Expr::Binop { gtype, .. }
            | Expr::Unop { gtype, .. }
            | Expr::Index { gtype, .. }
            | Expr::SliceExpr { gtype, .. }
            | Expr::Field { gtype, .. }
            | Expr::Call { gtype, .. }
            | Expr::MethodCall { gtype, .. }
            | Expr::TypeAssert { gtype, .. }
            | Expr::CompositeLit { gtype, .. } => *gtype,
        }
    }

    pub fn set_gtype(&mut self, ty: TypeId) {
        match self {
            Expr::Num { .. } | Expr::Str { .. } | Expr::Nil { .. } => {}
            Expr::Ident { gtype, .. }
            | Expr::Binop { gtype, .. }
            | Expr::Unop { gtype, .. }
            | Expr::Index { gtype, .. }
            | Expr::SliceExpr { gtype, .. }
            | Expr::Field { gtype, .. }
            | Expr::Call { gtype, .. }
            | Expr::MethodCall { gtype, .. }
            | Expr::TypeAssert { gtype, .. }
            | Expr::CompositeLit { gtype, .. } => *gtype = Some(ty),
        }
    }

    /// True for `_`.
    pub fn is_blank(&self) -> bool {
        matches!(self, Expr::Ident { name, .. } if name == "_")
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Expr::Nil { .. })
    }
}

#[derive(Debug, Clone)]
pub enum ForKind {
    Clause {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
    },
    /// `for i, v := range e`. Whether this walks a list or a map is decided
    /// from the range expression's type at emission time. `hidden` is the
    /// invisible loop counter: the index for lists when no index variable is
    /// named, the 16-byte-stride counter for maps always.
    Range {
        index: Option<Expr>,
        value: Option<Expr>,
        expr: Expr,
        hidden: Option<VarId>,
    },
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// value exprs for plain switches
    pub exprs: Vec<Expr>,
    /// case types for type switches (`None` entry encodes `case nil`)
    pub types: Vec<Option<TypeExpr>>,
    pub resolved_types: Vec<Option<TypeId>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `var x T = e` (locals; globals are hoisted into the program root)
    VarDecl {
        var: Option<VarId>,
        name: String,
        texpr: Option<TypeExpr>,
        init: Option<Expr>,
        span: Span,
    },
    /// `=` and (after resolution declares the variables) `:=`
    Assign {
        lefts: Vec<Expr>,
        rights: Vec<Expr>,
        declares: bool,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Vec<Stmt>,
        els: Option<Box<Stmt>>,
        span: Span,
    },
    Block {
        stmts: Vec<Stmt>,
        span: Span,
    },
    For {
        kind: ForKind,
        body: Vec<Stmt>,
        span: Span,
    },
    Switch {
        subject: Option<Expr>,
        /// subject of a type switch: the interface expr of `x.(type)`
        type_subject: Option<Expr>,
        /// `v := x.(type)` binding, declared per switch as interface-typed
        bind: Option<(String, Option<VarId>)>,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Stmt>>,
        span: Span,
    },
    Return {
        exprs: Vec<Expr>,
        span: Span,
    },
    Defer {
        expr: Expr,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Inc {
        operand: Expr,
        span: Span,
    },
    Dec {
        operand: Expr,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Defer { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Inc { span, .. }
            | Stmt::Dec { span, .. } => *span,
        }
    }
}

/// Function parameter as parsed.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub texpr: TypeExpr,
    pub span: Span,
}

/// A function or method declaration as parsed.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Param>,
    pub params: Vec<Param>,
    pub variadic: bool,
    pub rets: Vec<TypeExpr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ConstSpec {
    pub name: String,
    pub texpr: Option<TypeExpr>,
    pub val: Option<Expr>,
    pub iota_index: i64,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Var {
        name: String,
        texpr: Option<TypeExpr>,
        init: Option<Expr>,
        span: Span,
    },
    Const(Vec<ConstSpec>),
    TypeDef {
        name: String,
        texpr: TypeExpr,
        span: Span,
    },
}

/// One parsed source file.
#[derive(Debug)]
pub struct AstFile {
    pub file_id: usize,
    pub pkg: String,
    pub imports: Vec<String>,
    pub decls: Vec<Decl>,
}
