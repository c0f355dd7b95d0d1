//! Recursive-descent parser producing the typed tree.
//!
//! Composite literals are only recognised where the Go grammar allows them:
//! the `composite_ok` flag is cleared while the header expression of an
//! `if`/`for`/`switch` is being parsed and restored inside parentheses.

use crate::ast::*;
use crate::diag::{CompileError, DiagKind, Result, SourceMap, Span};
use crate::ir::StringPool;
use crate::lex::{Kw, TokKind, Token};

pub struct Parser<'a> {
    smap: &'a SourceMap,
    toks: &'a [Token],
    pos: usize,
    file_id: usize,
    pool: &'a mut StringPool,
    composite_ok: bool,
    in_switch_header: bool,
    type_guard_hit: bool,
}

pub fn parse_file(
    smap: &SourceMap,
    toks: &[Token],
    file_id: usize,
    pool: &mut StringPool,
) -> Result<AstFile> {
    let mut p = Parser {
        smap,
        toks,
        pos: 0,
        file_id,
        pool,
        composite_ok: true,
        in_switch_header: false,
        type_guard_hit: false,
    };
    p.parse_source_file()
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &TokKind {
        &self.toks[self.pos].kind
    }

    fn peek_at(&self, n: usize) -> &TokKind {
        let i = (self.pos + n).min(self.toks.len() - 1);
        &self.toks[i].kind
    }

    fn span(&self) -> Span {
        self.toks[self.pos].span
    }

    fn advance(&mut self) -> &TokKind {
        let i = self.pos;
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        &self.toks[i].kind
    }

    fn err(&self, msg: impl Into<String>) -> CompileError {
        CompileError::new(self.smap, self.span(), DiagKind::Parse, msg)
    }

    fn accept(&mut self, kind: &TokKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokKind, what: &str) -> Result<()> {
        if self.accept(kind) {
            Ok(())
        } else {
            Err(self.err(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span)> {
        let span = self.span();
        match self.peek().clone() {
            TokKind::Ident(name) => {
                self.advance();
                Ok((name, span))
            }
            other => Err(self.err(format!("expected {what}, found {other:?}"))),
        }
    }

    fn skip_semis(&mut self) {
        while self.accept(&TokKind::Semi) {}
    }

    fn expect_semi(&mut self) -> Result<()> {
        if self.accept(&TokKind::Semi) {
            self.skip_semis();
            return Ok(());
        }
        // a closing brace also terminates a statement
        if matches!(self.peek(), TokKind::RBrace | TokKind::Eof) {
            return Ok(());
        }
        Err(self.err(format!("expected newline or ';', found {:?}", self.peek())))
    }

    // ── source file ─────────────────────────────────────────────

    fn parse_source_file(&mut self) -> Result<AstFile> {
        self.skip_semis();
        self.expect(&TokKind::Kw(Kw::Package), "'package'")?;
        let (pkg, _) = self.expect_ident("package name")?;
        self.expect_semi()?;

        let mut imports = Vec::new();
        while matches!(self.peek(), TokKind::Kw(Kw::Import)) {
            self.advance();
            if self.accept(&TokKind::LParen) {
                self.skip_semis();
                while !self.accept(&TokKind::RParen) {
                    imports.push(self.parse_import_path()?);
                    self.skip_semis();
                }
            } else {
                imports.push(self.parse_import_path()?);
            }
            self.expect_semi()?;
        }

        let mut decls = Vec::new();
        loop {
            self.skip_semis();
            match self.peek() {
                TokKind::Eof => break,
                TokKind::Kw(Kw::Func) => decls.push(Decl::Func(self.parse_func_decl()?)),
                TokKind::Kw(Kw::Var) => decls.push(self.parse_var_decl()?),
                TokKind::Kw(Kw::Const) => decls.push(self.parse_const_decl()?),
                TokKind::Kw(Kw::Type) => decls.push(self.parse_type_decl()?),
                other => {
                    return Err(self.err(format!("unexpected token at top level: {other:?}")))
                }
            }
        }

        Ok(AstFile {
            file_id: self.file_id,
            pkg,
            imports,
            decls,
        })
    }

    fn parse_import_path(&mut self) -> Result<String> {
        match self.peek().clone() {
            TokKind::Str(path) => {
                self.advance();
                Ok(path)
            }
            other => Err(self.err(format!("expected import path string, found {other:?}"))),
        }
    }

    // ── declarations ────────────────────────────────────────────

    fn parse_type_decl(&mut self) -> Result<Decl> {
        let span = self.span();
        self.expect(&TokKind::Kw(Kw::Type), "'type'")?;
        let (name, _) = self.expect_ident("type name")?;
        let texpr = self.parse_type()?;
        self.expect_semi()?;
        Ok(Decl::TypeDef { name, texpr, span })
    }

    fn parse_var_decl(&mut self) -> Result<Decl> {
        let span = self.span();
        self.expect(&TokKind::Kw(Kw::Var), "'var'")?;
        let (name, _) = self.expect_ident("variable name")?;
        let texpr = if matches!(self.peek(), TokKind::Assign) {
            None
        } else {
            Some(self.parse_type()?)
        };
        let init = if self.accept(&TokKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_semi()?;
        Ok(Decl::Var {
            name,
            texpr,
            init,
            span,
        })
    }

    fn parse_const_decl(&mut self) -> Result<Decl> {
        self.expect(&TokKind::Kw(Kw::Const), "'const'")?;
        let mut specs = Vec::new();
        if self.accept(&TokKind::LParen) {
            self.skip_semis();
            let mut iota = 0i64;
            let mut last_val: Option<Expr> = None;
            while !self.accept(&TokKind::RParen) {
                let (name, span) = self.expect_ident("constant name")?;
                let texpr = if matches!(self.peek(), TokKind::Assign | TokKind::Semi) {
                    None
                } else {
                    Some(self.parse_type()?)
                };
                let val = if self.accept(&TokKind::Assign) {
                    let e = self.parse_expr()?;
                    last_val = Some(e.clone());
                    Some(e)
                } else {
                    // repeat the previous expression, per the Go const rule
                    last_val.clone()
                };
                specs.push(ConstSpec {
                    name,
                    texpr,
                    val,
                    iota_index: iota,
                    span,
                });
                iota += 1;
                self.skip_semis();
            }
            self.expect_semi()?;
        } else {
            let (name, span) = self.expect_ident("constant name")?;
            let texpr = if matches!(self.peek(), TokKind::Assign) {
                None
            } else {
                Some(self.parse_type()?)
            };
            self.expect(&TokKind::Assign, "'='")?;
            let val = Some(self.parse_expr()?);
            self.expect_semi()?;
            specs.push(ConstSpec {
                name,
                texpr,
                val,
                iota_index: 0,
                span,
            });
        }
        Ok(Decl::Const(specs))
    }

    fn parse_func_decl(&mut self) -> Result<FuncDecl> {
        let span = self.span();
        self.expect(&TokKind::Kw(Kw::Func), "'func'")?;

        let receiver = if matches!(self.peek(), TokKind::LParen) {
            Some(self.parse_receiver()?)
        } else {
            None
        };

        let (name, _) = self.expect_ident("function name")?;
        let (params, variadic) = self.parse_params()?;
        let rets = self.parse_results()?;
        self.expect(&TokKind::LBrace, "'{'")?;
        let body = self.parse_stmt_list()?;
        self.expect(&TokKind::RBrace, "'}'")?;
        self.expect_semi()?;

        Ok(FuncDecl {
            name,
            receiver,
            params,
            variadic,
            rets,
            body,
            span,
        })
    }

    fn parse_receiver(&mut self) -> Result<Param> {
        let span = self.span();
        self.expect(&TokKind::LParen, "'('")?;
        // (name Type) | (Type) | (name *Type) | (*Type)
        let param = match self.peek().clone() {
            TokKind::Ident(first) => {
                if matches!(self.peek_at(1), TokKind::RParen) {
                    self.advance();
                    Param {
                        name: String::new(),
                        texpr: TypeExpr::Name {
                            pkg: None,
                            name: first,
                            span,
                        },
                        span,
                    }
                } else {
                    self.advance();
                    let texpr = self.parse_type()?;
                    Param {
                        name: first,
                        texpr,
                        span,
                    }
                }
            }
            TokKind::Star => {
                let texpr = self.parse_type()?;
                Param {
                    name: String::new(),
                    texpr,
                    span,
                }
            }
            other => return Err(self.err(format!("invalid receiver: {other:?}"))),
        };
        self.expect(&TokKind::RParen, "')'")?;
        Ok(param)
    }

    /// Parameter list with grouped names (`a, b int`) and a trailing
    /// variadic `...T`.
    fn parse_params(&mut self) -> Result<(Vec<Param>, bool)> {
        self.expect(&TokKind::LParen, "'('")?;
        let mut params = Vec::new();
        let mut variadic = false;
        if self.accept(&TokKind::RParen) {
            return Ok((params, variadic));
        }
        loop {
            let mut names = Vec::new();
            loop {
                let (name, span) = self.expect_ident("parameter name")?;
                names.push((name, span));
                if !self.accept(&TokKind::Comma) {
                    break;
                }
            }
            if self.accept(&TokKind::Ellipsis) {
                variadic = true;
            }
            let texpr = self.parse_type()?;
            for (name, span) in names {
                params.push(Param {
                    name,
                    texpr: texpr.clone(),
                    span,
                });
            }
            if variadic {
                self.expect(&TokKind::RParen, "')' after variadic parameter")?;
                break;
            }
            if self.accept(&TokKind::RParen) {
                break;
            }
            self.expect(&TokKind::Comma, "','")?;
        }
        Ok((params, variadic))
    }

    fn parse_results(&mut self) -> Result<Vec<TypeExpr>> {
        match self.peek() {
            TokKind::LBrace | TokKind::Semi => Ok(Vec::new()),
            TokKind::LParen => {
                self.advance();
                let mut rets = Vec::new();
                loop {
                    rets.push(self.parse_type()?);
                    if !self.accept(&TokKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokKind::RParen, "')'")?;
                Ok(rets)
            }
            _ => Ok(vec![self.parse_type()?]),
        }
    }

    // ── types ───────────────────────────────────────────────────

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let span = self.span();
        match self.peek().clone() {
            TokKind::Star => {
                self.advance();
                Ok(TypeExpr::Ptr(Box::new(self.parse_type()?)))
            }
            TokKind::LBrack => {
                self.advance();
                if self.accept(&TokKind::RBrack) {
                    return Ok(TypeExpr::Slice(Box::new(self.parse_type()?)));
                }
                let len = match self.peek().clone() {
                    TokKind::Int(n) => {
                        self.advance();
                        n
                    }
                    other => {
                        return Err(self.err(format!("expected array length, found {other:?}")))
                    }
                };
                self.expect(&TokKind::RBrack, "']'")?;
                Ok(TypeExpr::Array {
                    len,
                    elem: Box::new(self.parse_type()?),
                })
            }
            TokKind::Kw(Kw::Map) => {
                self.advance();
                self.expect(&TokKind::LBrack, "'['")?;
                let key = self.parse_type()?;
                self.expect(&TokKind::RBrack, "']'")?;
                let value = self.parse_type()?;
                Ok(TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            TokKind::Kw(Kw::Struct) => {
                self.advance();
                self.expect(&TokKind::LBrace, "'{'")?;
                self.skip_semis();
                let mut fields = Vec::new();
                while !self.accept(&TokKind::RBrace) {
                    let mut names = Vec::new();
                    loop {
                        let (name, _) = self.expect_ident("field name")?;
                        names.push(name);
                        if !self.accept(&TokKind::Comma) {
                            break;
                        }
                    }
                    let texpr = self.parse_type()?;
                    for name in names {
                        fields.push((name, texpr.clone()));
                    }
                    self.skip_semis();
                }
                Ok(TypeExpr::Struct { fields, span })
            }
            TokKind::Kw(Kw::Interface) => {
                self.advance();
                self.expect(&TokKind::LBrace, "'{'")?;
                self.skip_semis();
                let mut methods = Vec::new();
                while !self.accept(&TokKind::RBrace) {
                    let (name, _) = self.expect_ident("method name")?;
                    self.expect(&TokKind::LParen, "'('")?;
                    let mut params = Vec::new();
                    if !self.accept(&TokKind::RParen) {
                        loop {
                            params.push(self.parse_type()?);
                            if !self.accept(&TokKind::Comma) {
                                break;
                            }
                        }
                        self.expect(&TokKind::RParen, "')'")?;
                    }
                    let rets = self.parse_results_for_interface()?;
                    methods.push((name, params, rets));
                    self.skip_semis();
                }
                Ok(TypeExpr::Interface { methods, span })
            }
            TokKind::Ident(name) => {
                self.advance();
                if self.accept(&TokKind::Dot) {
                    let (inner, _) = self.expect_ident("qualified type name")?;
                    Ok(TypeExpr::Name {
                        pkg: Some(name),
                        name: inner,
                        span,
                    })
                } else {
                    Ok(TypeExpr::Name {
                        pkg: None,
                        name,
                        span,
                    })
                }
            }
            other => Err(self.err(format!("expected type, found {other:?}"))),
        }
    }

    fn parse_results_for_interface(&mut self) -> Result<Vec<TypeExpr>> {
        match self.peek() {
            TokKind::Semi | TokKind::RBrace => Ok(Vec::new()),
            TokKind::LParen => {
                self.advance();
                let mut rets = Vec::new();
                loop {
                    rets.push(self.parse_type()?);
                    if !self.accept(&TokKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokKind::RParen, "')'")?;
                Ok(rets)
            }
            _ => Ok(vec![self.parse_type()?]),
        }
    }

    // ── statements ──────────────────────────────────────────────

    fn parse_stmt_list(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if matches!(self.peek(), TokKind::RBrace | TokKind::Eof) {
                break;
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&TokKind::LBrace, "'{'")?;
        let stmts = self.parse_stmt_list()?;
        self.expect(&TokKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let span = self.span();
        match self.peek() {
            TokKind::Kw(Kw::Var) => {
                let decl = self.parse_var_decl()?;
                match decl {
                    Decl::Var {
                        name,
                        texpr,
                        init,
                        span,
                    } => Ok(Stmt::VarDecl {
                        var: None,
                        name,
                        texpr,
                        init,
                        span,
                    }),
                    _ => unreachable!(),
                }
            }
            TokKind::Kw(Kw::If) => self.parse_if(),
            TokKind::Kw(Kw::For) => self.parse_for(),
            TokKind::Kw(Kw::Switch) => self.parse_switch(),
            TokKind::Kw(Kw::Return) => {
                self.advance();
                let mut exprs = Vec::new();
                if !matches!(self.peek(), TokKind::Semi | TokKind::RBrace) {
                    loop {
                        exprs.push(self.parse_expr()?);
                        if !self.accept(&TokKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect_semi()?;
                Ok(Stmt::Return { exprs, span })
            }
            TokKind::Kw(Kw::Defer) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_semi()?;
                Ok(Stmt::Defer { expr, span })
            }
            TokKind::Kw(Kw::Break) => {
                self.advance();
                self.expect_semi()?;
                Ok(Stmt::Break { span })
            }
            TokKind::Kw(Kw::Continue) => {
                self.advance();
                self.expect_semi()?;
                Ok(Stmt::Continue { span })
            }
            TokKind::LBrace => {
                let stmts = self.parse_block()?;
                self.expect_semi()?;
                Ok(Stmt::Block { stmts, span })
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                self.expect_semi()?;
                Ok(stmt)
            }
        }
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        let span = self.span();
        let mut lefts = vec![self.parse_expr()?];
        while self.accept(&TokKind::Comma) {
            lefts.push(self.parse_expr()?);
        }

        match self.peek() {
            TokKind::Assign | TokKind::ColonAssign => {
                let declares = matches!(self.peek(), TokKind::ColonAssign);
                self.advance();
                let mut rights = vec![self.parse_expr()?];
                while self.accept(&TokKind::Comma) {
                    rights.push(self.parse_expr()?);
                }
                Ok(Stmt::Assign {
                    lefts,
                    rights,
                    declares,
                    span,
                })
            }
            TokKind::Inc => {
                self.advance();
                Ok(Stmt::Inc {
                    operand: lefts.remove(0),
                    span,
                })
            }
            TokKind::Dec => {
                self.advance();
                Ok(Stmt::Dec {
                    operand: lefts.remove(0),
                    span,
                })
            }
            _ => {
                if lefts.len() != 1 {
                    return Err(self.err("expected assignment"));
                }
                Ok(Stmt::Expr {
                    expr: lefts.remove(0),
                    span,
                })
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let span = self.span();
        self.expect(&TokKind::Kw(Kw::If), "'if'")?;

        let saved = self.composite_ok;
        self.composite_ok = false;
        let mut init = None;
        let mut cond_stmt = self.parse_simple_stmt()?;
        if self.accept(&TokKind::Semi) {
            init = Some(Box::new(cond_stmt));
            cond_stmt = self.parse_simple_stmt()?;
        }
        self.composite_ok = saved;

        let cond = match cond_stmt {
            Stmt::Expr { expr, .. } => expr,
            _ => return Err(self.err("if condition must be an expression")),
        };

        let then = self.parse_block()?;
        let els = if self.accept(&TokKind::Kw(Kw::Else)) {
            if matches!(self.peek(), TokKind::Kw(Kw::If)) {
                Some(Box::new(self.parse_if()?))
            } else {
                let espan = self.span();
                let stmts = self.parse_block()?;
                self.expect_semi()?;
                Some(Box::new(Stmt::Block { stmts, span: espan }))
            }
        } else {
            self.expect_semi()?;
            None
        };

        Ok(Stmt::If {
            init,
            cond,
            then,
            els,
            span,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let span = self.span();
        self.expect(&TokKind::Kw(Kw::For), "'for'")?;

        // infinite loop
        if matches!(self.peek(), TokKind::LBrace) {
            let body = self.parse_block()?;
            self.expect_semi()?;
            return Ok(Stmt::For {
                kind: ForKind::Clause {
                    init: None,
                    cond: None,
                    post: None,
                },
                body,
                span,
            });
        }

        let saved = self.composite_ok;
        self.composite_ok = false;

        // range without loop vars: `for range xs` is not in the dialect,
        // so a leading `range` is an error caught by the expression parser.
        let first = self.parse_simple_stmt_or_range()?;
        let stmt = match first {
            HeaderStmt::Range {
                index,
                value,
                expr,
            } => {
                self.composite_ok = saved;
                let body = self.parse_block()?;
                self.expect_semi()?;
                Stmt::For {
                    kind: ForKind::Range {
                        index,
                        value,
                        expr,
                        hidden: None,
                    },
                    body,
                    span,
                }
            }
            HeaderStmt::Simple(st) => {
                if self.accept(&TokKind::Semi) {
                    // classic three-clause form
                    let cond = if matches!(self.peek(), TokKind::Semi) {
                        None
                    } else {
                        match self.parse_simple_stmt()? {
                            Stmt::Expr { expr, .. } => Some(expr),
                            _ => return Err(self.err("for condition must be an expression")),
                        }
                    };
                    self.expect(&TokKind::Semi, "';'")?;
                    let post = if matches!(self.peek(), TokKind::LBrace) {
                        None
                    } else {
                        Some(Box::new(self.parse_simple_stmt()?))
                    };
                    self.composite_ok = saved;
                    let body = self.parse_block()?;
                    self.expect_semi()?;
                    Stmt::For {
                        kind: ForKind::Clause {
                            init: Some(Box::new(st)),
                            cond,
                            post,
                        },
                        body,
                        span,
                    }
                } else {
                    // while form: `for cond { ... }`
                    let cond = match st {
                        Stmt::Expr { expr, .. } => expr,
                        _ => return Err(self.err("for condition must be an expression")),
                    };
                    self.composite_ok = saved;
                    let body = self.parse_block()?;
                    self.expect_semi()?;
                    Stmt::For {
                        kind: ForKind::Clause {
                            init: None,
                            cond: Some(cond),
                            post: None,
                        },
                        body,
                        span,
                    }
                }
            }
        };
        Ok(stmt)
    }

    fn parse_simple_stmt_or_range(&mut self) -> Result<HeaderStmt> {
        let span = self.span();
        let mut lefts = vec![self.parse_expr()?];
        while self.accept(&TokKind::Comma) {
            lefts.push(self.parse_expr()?);
        }

        match self.peek() {
            TokKind::Assign | TokKind::ColonAssign => {
                let declares = matches!(self.peek(), TokKind::ColonAssign);
                self.advance();
                if self.accept(&TokKind::Kw(Kw::Range)) {
                    let expr = self.parse_expr()?;
                    let mut it = lefts.into_iter();
                    let index = it.next().filter(|e| !e.is_blank());
                    let value = it.next().filter(|e| !e.is_blank());
                    return Ok(HeaderStmt::Range { index, value, expr });
                }
                let mut rights = vec![self.parse_expr()?];
                while self.accept(&TokKind::Comma) {
                    rights.push(self.parse_expr()?);
                }
                Ok(HeaderStmt::Simple(Stmt::Assign {
                    lefts,
                    rights,
                    declares,
                    span,
                }))
            }
            TokKind::Inc => {
                self.advance();
                Ok(HeaderStmt::Simple(Stmt::Inc {
                    operand: lefts.remove(0),
                    span,
                }))
            }
            TokKind::Dec => {
                self.advance();
                Ok(HeaderStmt::Simple(Stmt::Dec {
                    operand: lefts.remove(0),
                    span,
                }))
            }
            _ => {
                if lefts.len() != 1 {
                    return Err(self.err("expected assignment in for header"));
                }
                Ok(HeaderStmt::Simple(Stmt::Expr {
                    expr: lefts.remove(0),
                    span,
                }))
            }
        }
    }

    fn parse_switch(&mut self) -> Result<Stmt> {
        let span = self.span();
        self.expect(&TokKind::Kw(Kw::Switch), "'switch'")?;

        let mut bind: Option<(String, Option<crate::ir::VarId>)> = None;
        let mut subject = None;
        let mut type_subject = None;

        if !matches!(self.peek(), TokKind::LBrace) {
            // optional `v :=` binding ahead of a type-switch guard
            if let (TokKind::Ident(name), TokKind::ColonAssign) =
                (self.peek().clone(), self.peek_at(1).clone())
            {
                bind = Some((name, None));
                self.advance();
                self.advance();
            }

            let saved = self.composite_ok;
            self.composite_ok = false;
            self.in_switch_header = true;
            self.type_guard_hit = false;
            let expr = self.parse_expr()?;
            self.in_switch_header = false;
            self.composite_ok = saved;

            if self.type_guard_hit {
                type_subject = Some(expr);
            } else {
                if bind.is_some() {
                    return Err(self.err("switch binding requires a type switch guard"));
                }
                subject = Some(expr);
            }
        }

        self.expect(&TokKind::LBrace, "'{'")?;
        self.skip_semis();

        let is_type_switch = type_subject.is_some();
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            match self.peek() {
                TokKind::RBrace => {
                    self.advance();
                    break;
                }
                TokKind::Kw(Kw::Case) => {
                    let cspan = self.span();
                    self.advance();
                    let mut exprs = Vec::new();
                    let mut ctypes = Vec::new();
                    loop {
                        if is_type_switch {
                            if let TokKind::Ident(n) = self.peek() {
                                if n == "nil" && !matches!(self.peek_at(1), TokKind::Dot) {
                                    self.advance();
                                    ctypes.push(None);
                                    if !self.accept(&TokKind::Comma) {
                                        break;
                                    }
                                    continue;
                                }
                            }
                            ctypes.push(Some(self.parse_type()?));
                        } else {
                            exprs.push(self.parse_expr()?);
                        }
                        if !self.accept(&TokKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokKind::Colon, "':'")?;
                    let body = self.parse_case_body()?;
                    cases.push(SwitchCase {
                        exprs,
                        types: ctypes,
                        resolved_types: Vec::new(),
                        body,
                        span: cspan,
                    });
                }
                TokKind::Kw(Kw::Default) => {
                    self.advance();
                    self.expect(&TokKind::Colon, "':'")?;
                    default = Some(self.parse_case_body()?);
                }
                other => return Err(self.err(format!("expected case or default, found {other:?}"))),
            }
        }
        self.expect_semi()?;

        Ok(Stmt::Switch {
            subject,
            type_subject,
            bind,
            cases,
            default,
            span,
        })
    }

    fn parse_case_body(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if matches!(
                self.peek(),
                TokKind::Kw(Kw::Case) | TokKind::Kw(Kw::Default) | TokKind::RBrace | TokKind::Eof
            ) {
                break;
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    // ── expressions ─────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), TokKind::OrOr) {
            let span = self.span();
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binop {
                op: BinOp::OrOr,
                left: Box::new(left),
                right: Box::new(right),
                gtype: None,
                span,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek(), TokKind::AndAnd) {
            let span = self.span();
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binop {
                op: BinOp::AndAnd,
                left: Box::new(left),
                right: Box::new(right),
                gtype: None,
                span,
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokKind::EqEq => BinOp::Eq,
                TokKind::Ne => BinOp::Ne,
                TokKind::Lt => BinOp::Lt,
                TokKind::Le => BinOp::Le,
                TokKind::Gt => BinOp::Gt,
                TokKind::Ge => BinOp::Ge,
                _ => break,
            };
            let span = self.span();
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binop {
                op,
                left: Box::new(left),
                right: Box::new(right),
                gtype: None,
                span,
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokKind::Plus => BinOp::Add,
                TokKind::Minus => BinOp::Sub,
                _ => break,
            };
            let span = self.span();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binop {
                op,
                left: Box::new(left),
                right: Box::new(right),
                gtype: None,
                span,
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokKind::Star => BinOp::Mul,
                TokKind::Slash => BinOp::Div,
                TokKind::Percent => BinOp::Mod,
                _ => break,
            };
            let span = self.span();
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binop {
                op,
                left: Box::new(left),
                right: Box::new(right),
                gtype: None,
                span,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let span = self.span();
        let op = match self.peek() {
            TokKind::Amp => Some(UnOp::Addr),
            TokKind::Star => Some(UnOp::Deref),
            TokKind::Not => Some(UnOp::Not),
            TokKind::Minus => Some(UnOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unop {
                op,
                operand: Box::new(operand),
                gtype: None,
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let span = self.span();
            match self.peek() {
                TokKind::Dot => {
                    match self.peek_at(1) {
                        TokKind::LParen => {
                            self.advance(); // .
                            self.advance(); // (
                            if self.in_switch_header
                                && matches!(self.peek(), TokKind::Kw(Kw::Type))
                            {
                                self.advance();
                                self.expect(&TokKind::RParen, "')'")?;
                                self.type_guard_hit = true;
                                return Ok(expr);
                            }
                            let target = self.parse_type()?;
                            self.expect(&TokKind::RParen, "')'")?;
                            expr = Expr::TypeAssert {
                                expr: Box::new(expr),
                                target,
                                target_ty: None,
                                gtype: None,
                                span,
                            };
                        }
                        _ => {
                            self.advance();
                            let (name, _) = self.expect_ident("field or method name")?;
                            if matches!(self.peek(), TokKind::LParen) {
                                let args = self.parse_call_args()?;
                                // package calls are disentangled from method
                                // calls during resolution
                                expr = Expr::MethodCall {
                                    receiver: Box::new(expr),
                                    name,
                                    args,
                                    gtype: None,
                                    span,
                                };
                            } else {
                                expr = Expr::Field {
                                    strct: Box::new(expr),
                                    name,
                                    gtype: None,
                                    span,
                                };
                            }
                        }
                    }
                }
                TokKind::LParen => {
                    // make's first argument is a type, not an expression
                    let args = if matches!(&expr, Expr::Ident { name, .. } if name == "make") {
                        self.parse_make_args()?
                    } else {
                        self.parse_call_args()?
                    };
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        gtype: None,
                        span,
                    };
                }
                TokKind::LBrack => {
                    self.advance();
                    let saved = self.composite_ok;
                    self.composite_ok = true;
                    let low = self.parse_expr()?;
                    if self.accept(&TokKind::Colon) {
                        let high = if matches!(self.peek(), TokKind::RBrack | TokKind::Colon) {
                            None
                        } else {
                            Some(Box::new(self.parse_expr()?))
                        };
                        let max = if self.accept(&TokKind::Colon) {
                            Some(Box::new(self.parse_expr()?))
                        } else {
                            None
                        };
                        self.expect(&TokKind::RBrack, "']'")?;
                        self.composite_ok = saved;
                        expr = Expr::SliceExpr {
                            collection: Box::new(expr),
                            low: Box::new(low),
                            high,
                            max,
                            gtype: None,
                            span,
                        };
                    } else {
                        self.expect(&TokKind::RBrack, "']'")?;
                        self.composite_ok = saved;
                        expr = Expr::Index {
                            collection: Box::new(expr),
                            index: Box::new(low),
                            gtype: None,
                            span,
                        };
                    }
                }
                TokKind::LBrace if self.composite_ok => {
                    // Ident{...} struct literal
                    if let Expr::Ident {
                        pkg, name, span, ..
                    } = &expr
                    {
                        let texpr = TypeExpr::Name {
                            pkg: pkg.clone(),
                            name: name.clone(),
                            span: *span,
                        };
                        let lspan = *span;
                        let elems = self.parse_lit_elems(false)?;
                        expr = Expr::CompositeLit {
                            texpr,
                            elems,
                            gtype: None,
                            hidden_var: None,
                            span: lspan,
                        };
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// `make(T, len[, cap])`: the type argument rides along as an empty
    /// composite literal so the rest of the pipeline sees plain expressions.
    fn parse_make_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(&TokKind::LParen, "'('")?;
        let saved = self.composite_ok;
        self.composite_ok = true;
        let tspan = self.span();
        let texpr = self.parse_type()?;
        let mut args = vec![Expr::CompositeLit {
            texpr,
            elems: Vec::new(),
            gtype: None,
            hidden_var: None,
            span: tspan,
        }];
        while self.accept(&TokKind::Comma) {
            args.push(self.parse_expr()?);
        }
        self.expect(&TokKind::RParen, "')'")?;
        self.composite_ok = saved;
        Ok(args)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(&TokKind::LParen, "'('")?;
        let saved = self.composite_ok;
        self.composite_ok = true;
        let mut args = Vec::new();
        if !self.accept(&TokKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.accept(&TokKind::Comma) {
                    break;
                }
            }
            self.expect(&TokKind::RParen, "')'")?;
        }
        self.composite_ok = saved;
        Ok(args)
    }

    /// `{ elem, elem, ... }` with optional `key:` prefixes.
    fn parse_lit_elems(&mut self, map_keys: bool) -> Result<Vec<LitElem>> {
        self.expect(&TokKind::LBrace, "'{'")?;
        let saved = self.composite_ok;
        self.composite_ok = true;
        let mut elems = Vec::new();
        self.skip_semis();
        while !self.accept(&TokKind::RBrace) {
            if map_keys {
                let key = self.parse_expr()?;
                self.expect(&TokKind::Colon, "':'")?;
                let value = self.parse_expr()?;
                elems.push(LitElem::MapPair { key, value });
            } else if let (TokKind::Ident(key), TokKind::Colon) =
                (self.peek().clone(), self.peek_at(1).clone())
            {
                self.advance();
                self.advance();
                let value = self.parse_expr()?;
                elems.push(LitElem::Keyed { key, value });
            } else {
                elems.push(LitElem::Plain(self.parse_expr()?));
            }
            if !self.accept(&TokKind::Comma) {
                self.skip_semis();
                self.expect(&TokKind::RBrace, "'}' after composite literal")?;
                break;
            }
            self.skip_semis();
        }
        self.composite_ok = saved;
        Ok(elems)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let span = self.span();
        match self.peek().clone() {
            TokKind::Int(val) => {
                self.advance();
                Ok(Expr::Num { val, span })
            }
            TokKind::Str(val) => {
                self.advance();
                let slabel = self.pool.intern(&val);
                Ok(Expr::Str { val, slabel, span })
            }
            TokKind::Ident(name) => {
                self.advance();
                if name == "nil" {
                    return Ok(Expr::Nil { span });
                }
                Ok(Expr::Ident {
                    pkg: None,
                    name,
                    rel: None,
                    gtype: None,
                    span,
                })
            }
            TokKind::LParen => {
                self.advance();
                let saved = self.composite_ok;
                self.composite_ok = true;
                let expr = self.parse_expr()?;
                self.composite_ok = saved;
                self.expect(&TokKind::RParen, "')'")?;
                Ok(expr)
            }
            TokKind::LBrack => {
                // []T{...} or [N]T{...}
                let texpr = self.parse_type()?;
                let map_keys = false;
                let elems = self.parse_lit_elems(map_keys)?;
                Ok(Expr::CompositeLit {
                    texpr,
                    elems,
                    gtype: None,
                    hidden_var: None,
                    span,
                })
            }
            TokKind::Kw(Kw::Map) => {
                let texpr = self.parse_type()?;
                let elems = self.parse_lit_elems(true)?;
                Ok(Expr::CompositeLit {
                    texpr,
                    elems,
                    gtype: None,
                    hidden_var: None,
                    span,
                })
            }
            other => Err(self.err(format!("unexpected token in expression: {other:?}"))),
        }
    }
}

enum HeaderStmt {
    Simple(Stmt),
    Range {
        index: Option<Expr>,
        value: Option<Expr>,
        expr: Expr,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::lex_str;
    use std::path::PathBuf;

    fn parse(src: &str) -> AstFile {
        let mut smap = SourceMap::default();
        smap.add(PathBuf::from("t.go"));
        let toks = lex_str(&smap, src, 0).unwrap();
        let mut pool = StringPool::default();
        parse_file(&smap, &toks, 0, &mut pool).unwrap()
    }

    #[test]
    fn parses_package_and_func() {
        let f = parse("package main\n\nfunc main() {\n}\n");
        assert_eq!(f.pkg, "main");
        assert_eq!(f.decls.len(), 1);
    }

    #[test]
    fn parses_method_with_receiver() {
        let f = parse(
            "package main\ntype P struct{ x, y int }\nfunc (p P) sum() int { return p.x + p.y }\n",
        );
        match &f.decls[1] {
            Decl::Func(fd) => {
                assert_eq!(fd.name, "sum");
                assert!(fd.receiver.is_some());
            }
            _ => panic!("expected func decl"),
        }
    }

    #[test]
    fn parses_slice_literal_and_range() {
        let f = parse(
            "package main\nfunc main() { s := []int{1, 2, 3}\nfor _, v := range s { print(v) } }\n",
        );
        match &f.decls[0] {
            Decl::Func(fd) => assert_eq!(fd.body.len(), 2),
            _ => panic!(),
        }
    }

    #[test]
    fn parses_type_switch() {
        let f = parse(
            "package main\nfunc f(x interface{ M() int }) {\nswitch x.(type) {\ncase nil:\n\tprint(0)\n}\n}\n",
        );
        match &f.decls[0] {
            Decl::Func(fd) => match &fd.body[0] {
                Stmt::Switch { type_subject, .. } => assert!(type_subject.is_some()),
                _ => panic!("expected switch"),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn composite_literal_not_taken_in_if_header() {
        let f = parse("package main\nfunc main() { if x == y { print(1) } }\n");
        match &f.decls[0] {
            Decl::Func(fd) => assert!(matches!(fd.body[0], Stmt::If { .. })),
            _ => panic!(),
        }
    }

    #[test]
    fn parses_defer_and_multireturn() {
        let f = parse(
            "package main\nfunc two() (int, string) { return 1, \"a\" }\nfunc main() { defer print(1) }\n",
        );
        assert_eq!(f.decls.len(), 2);
    }
}
