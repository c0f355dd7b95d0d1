//! Pipeline orchestration: lex -> parse -> resolve -> methods -> infer ->
//! generate. The internal runtime package is compiled ahead of the user's
//! sources in every run.

use std::path::PathBuf;

use crate::diag::{CompileError, DiagKind, Result};
use crate::ir::Program;
use crate::lex::{dump_tokens, lex_str};
use crate::parse::parse_file;
use crate::{emit, infer, methods, resolve, runtime};

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub parse_only: bool,
    pub resolve_only: bool,
    pub debug_ast: bool,
    pub debug_token: bool,
}

pub fn compile_files(paths: &[PathBuf], opts: &Options) -> Result<String> {
    let mut sources = Vec::new();
    for p in paths {
        let src = std::fs::read_to_string(p).map_err(|e| CompileError {
            path: p.display().to_string(),
            line: 1,
            col: 1,
            kind: DiagKind::Io,
            message: format!("cannot read source file: {e}"),
        })?;
        sources.push((p.clone(), src));
    }
    compile(sources, opts)
}

/// Compiles one in-memory source file, the integration-test entry point.
pub fn compile_source(src: &str) -> Result<String> {
    compile(
        vec![(PathBuf::from("<input>"), src.to_string())],
        &Options::default(),
    )
}

pub fn compile(sources: Vec<(PathBuf, String)>, opts: &Options) -> Result<String> {
    if sources.is_empty() {
        return Err(CompileError {
            path: "<none>".to_string(),
            line: 1,
            col: 1,
            kind: DiagKind::Io,
            message: "no input files".to_string(),
        });
    }

    let mut prog = Program::default();
    let mut files = Vec::new();

    let rt_id = prog.add_source(PathBuf::from("internal_runtime.go"));
    let toks = lex_str(&prog.smap, runtime::INTERNAL_RUNTIME_CODE, rt_id)?;
    files.push(parse_file(&prog.smap, &toks, rt_id, &mut prog.strings)?);

    for (path, src) in sources {
        let id = prog.add_source(path);
        let toks = lex_str(&prog.smap, &src, id)?;
        if opts.debug_token {
            eprint!("{}", dump_tokens(&toks));
        }
        let f = parse_file(&prog.smap, &toks, id, &mut prog.strings)?;
        if opts.debug_ast {
            eprintln!("{f:#?}");
        }
        files.push(f);
    }
    if opts.parse_only {
        return Ok(String::new());
    }

    resolve::resolve(&mut prog, files)?;
    methods::assign_receiver_ids(&mut prog);
    infer::infer(&mut prog)?;
    if opts.resolve_only {
        return Ok(String::new());
    }

    emit::generate(&mut prog)
}
