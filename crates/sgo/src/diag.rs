use std::path::PathBuf;

use thiserror::Error;

/// Source position. `file_id` indexes the compilation's source map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub file_id: usize,
    pub line: usize, // 1-based
    pub col: usize,  // 1-based
}

impl Span {
    pub fn zero() -> Span {
        Span {
            file_id: 0,
            line: 1,
            col: 1,
        }
    }
}

/// Maps `file_id`s to the paths given on the command line.
#[derive(Debug, Default)]
pub struct SourceMap {
    pub files: Vec<PathBuf>,
}

impl SourceMap {
    pub fn add(&mut self, path: PathBuf) -> usize {
        self.files.push(path);
        self.files.len() - 1
    }

    pub fn path(&self, file_id: usize) -> String {
        match self.files.get(file_id) {
            Some(p) => p.display().to_string(),
            None => "<unknown>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DiagKind {
    #[error("io")]
    Io,
    #[error("lex")]
    Lex,
    #[error("parse")]
    Parse,
    #[error("resolution")]
    Resolution,
    #[error("type")]
    Type,
    #[error("unsupported")]
    Unsupported,
    /// Generator-level invariant breaks. These are compiler bugs, not user
    /// errors, and must be distinguishable from user diagnostics.
    #[error("internal")]
    Internal,
}

/// A fatal diagnostic. The first one aborts the compilation.
#[derive(Debug, Clone, Error)]
#[error("{path}:{line}:{col}: {kind}: {message}")]
pub struct CompileError {
    pub path: String,
    pub line: usize,
    pub col: usize,
    pub kind: DiagKind,
    pub message: String,
}

impl CompileError {
    pub fn new(smap: &SourceMap, span: Span, kind: DiagKind, message: impl Into<String>) -> Self {
        CompileError {
            path: smap.path(span.file_id),
            line: span.line,
            col: span.col,
            kind,
            message: message.into(),
        }
    }

    /// "to be implemented" diagnostics for corners the language leaves out.
    pub fn tbi(smap: &SourceMap, span: Span, what: impl Into<String>) -> Self {
        Self::new(
            smap,
            span,
            DiagKind::Unsupported,
            format!("to be implemented: {}", what.into()),
        )
    }

    pub fn internal(smap: &SourceMap, span: Span, message: impl Into<String>) -> Self {
        Self::new(
            smap,
            span,
            DiagKind::Internal,
            format!("internal compiler error: {}", message.into()),
        )
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_line_format() {
        let mut smap = SourceMap::default();
        smap.add(PathBuf::from("x.go"));
        let e = CompileError::new(
            &smap,
            Span {
                file_id: 0,
                line: 3,
                col: 7,
            },
            DiagKind::Resolution,
            "undefined: foo",
        );
        assert_eq!(e.to_string(), "x.go:3:7: resolution: undefined: foo");
    }
}
