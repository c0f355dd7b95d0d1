use crate::diag::{CompileError, DiagKind, Result, SourceMap, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
    Package,
    Import,
    Type,
    Struct,
    Interface,
    Map,
    Func,
    Var,
    Const,
    If,
    Else,
    For,
    Range,
    Switch,
    Case,
    Default,
    Return,
    Defer,
    Break,
    Continue,
}

fn keyword_of(s: &str) -> Option<Kw> {
    Some(match s {
        "package" => Kw::Package,
        "import" => Kw::Import,
        "type" => Kw::Type,
        "struct" => Kw::Struct,
        "interface" => Kw::Interface,
        "map" => Kw::Map,
        "func" => Kw::Func,
        "var" => Kw::Var,
        "const" => Kw::Const,
        "if" => Kw::If,
        "else" => Kw::Else,
        "for" => Kw::For,
        "range" => Kw::Range,
        "switch" => Kw::Switch,
        "case" => Kw::Case,
        "default" => Kw::Default,
        "return" => Kw::Return,
        "defer" => Kw::Defer,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    Ident(String),
    Int(i64),
    Str(String),
    Kw(Kw),

    // punctuation
    Semi,
    Colon,
    Comma,
    Dot,
    Ellipsis, // ...
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBrack,
    RBrack,

    // operators
    Assign,      // =
    ColonAssign, // :=
    EqEq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    AndAnd,
    OrOr,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Inc, // ++
    Dec, // --

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokKind,
    pub span: Span,
}

/// True when a semicolon should be inserted after this token at a line end,
/// per the Go rule.
fn ends_statement(kind: &TokKind) -> bool {
    matches!(
        kind,
        TokKind::Ident(_)
            | TokKind::Int(_)
            | TokKind::Str(_)
            | TokKind::RParen
            | TokKind::RBrack
            | TokKind::RBrace
            | TokKind::Inc
            | TokKind::Dec
            | TokKind::Kw(Kw::Return)
            | TokKind::Kw(Kw::Break)
            | TokKind::Kw(Kw::Continue)
    )
}

pub fn lex_str(smap: &SourceMap, src: &str, file_id: usize) -> Result<Vec<Token>> {
    let bytes = src.as_bytes();
    let mut out: Vec<Token> = Vec::new();
    let mut i = 0usize;
    let mut line = 1usize;
    let mut col = 1usize;

    let err = |line: usize, col: usize, msg: String| {
        CompileError::new(smap, Span { file_id, line, col }, DiagKind::Lex, msg)
    };

    macro_rules! push {
        ($kind:expr, $l:expr, $c:expr) => {
            out.push(Token {
                kind: $kind,
                span: Span {
                    file_id,
                    line: $l,
                    col: $c,
                },
            })
        };
    }

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\n' => {
                if out.last().map(|t| ends_statement(&t.kind)).unwrap_or(false) {
                    push!(TokKind::Semi, line, col);
                }
                i += 1;
                line += 1;
                col = 1;
            }
            b' ' | b'\t' | b'\r' => {
                i += 1;
                col += 1;
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                let (sl, sc) = (line, col);
                i += 2;
                col += 2;
                loop {
                    if i + 1 >= bytes.len() {
                        return Err(err(sl, sc, "unterminated block comment".into()));
                    }
                    if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        i += 2;
                        col += 2;
                        break;
                    }
                    if bytes[i] == b'\n' {
                        line += 1;
                        col = 1;
                    } else {
                        col += 1;
                    }
                    i += 1;
                }
            }
            b'"' => {
                let (sl, sc) = (line, col);
                i += 1;
                col += 1;
                let mut val = String::new();
                loop {
                    if i >= bytes.len() || bytes[i] == b'\n' {
                        return Err(err(sl, sc, "unterminated string literal".into()));
                    }
                    match bytes[i] {
                        b'"' => {
                            i += 1;
                            col += 1;
                            break;
                        }
                        b'\\' => {
                            if i + 1 >= bytes.len() {
                                return Err(err(sl, sc, "unterminated string literal".into()));
                            }
                            let esc = bytes[i + 1];
                            val.push(unescape(esc).ok_or_else(|| {
                                err(line, col, format!("invalid escape: \\{}", esc as char))
                            })?);
                            i += 2;
                            col += 2;
                        }
                        c => {
                            val.push(c as char);
                            i += 1;
                            col += 1;
                        }
                    }
                }
                push!(TokKind::Str(val), sl, sc);
            }
            b'\'' => {
                let (sl, sc) = (line, col);
                i += 1;
                col += 1;
                if i >= bytes.len() {
                    return Err(err(sl, sc, "unterminated char literal".into()));
                }
                let v = if bytes[i] == b'\\' {
                    if i + 1 >= bytes.len() {
                        return Err(err(sl, sc, "unterminated char literal".into()));
                    }
                    let c = unescape(bytes[i + 1])
                        .ok_or_else(|| err(line, col, "invalid escape in char literal".into()))?;
                    i += 2;
                    col += 2;
                    c as i64
                } else {
                    let c = bytes[i] as i64;
                    i += 1;
                    col += 1;
                    c
                };
                if i >= bytes.len() || bytes[i] != b'\'' {
                    return Err(err(sl, sc, "unterminated char literal".into()));
                }
                i += 1;
                col += 1;
                push!(TokKind::Int(v), sl, sc);
            }
            b'0'..=b'9' => {
                let (sl, sc) = (line, col);
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                    col += 1;
                }
                let text = &src[start..i];
                let v: i64 = text
                    .parse()
                    .map_err(|_| err(sl, sc, format!("invalid numeric literal: {text}")))?;
                push!(TokKind::Int(v), sl, sc);
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let (sl, sc) = (line, col);
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                    col += 1;
                }
                let word = &src[start..i];
                match keyword_of(word) {
                    Some(kw) => push!(TokKind::Kw(kw), sl, sc),
                    None => push!(TokKind::Ident(word.to_string()), sl, sc),
                }
            }
            _ => {
                let (sl, sc) = (line, col);
                let two: &[u8] = if i + 1 < bytes.len() {
                    &bytes[i..i + 2]
                } else {
                    b""
                };
                let three: &[u8] = if i + 2 < bytes.len() {
                    &bytes[i..i + 3]
                } else {
                    b""
                };
                let (kind, n) = if three == b"..." {
                    (TokKind::Ellipsis, 3)
                } else {
                    match two {
                        b":=" => (TokKind::ColonAssign, 2),
                        b"==" => (TokKind::EqEq, 2),
                        b"!=" => (TokKind::Ne, 2),
                        b"<=" => (TokKind::Le, 2),
                        b">=" => (TokKind::Ge, 2),
                        b"&&" => (TokKind::AndAnd, 2),
                        b"||" => (TokKind::OrOr, 2),
                        b"++" => (TokKind::Inc, 2),
                        b"--" => (TokKind::Dec, 2),
                        _ => match b {
                            b';' => (TokKind::Semi, 1),
                            b':' => (TokKind::Colon, 1),
                            b',' => (TokKind::Comma, 1),
                            b'.' => (TokKind::Dot, 1),
                            b'{' => (TokKind::LBrace, 1),
                            b'}' => (TokKind::RBrace, 1),
                            b'(' => (TokKind::LParen, 1),
                            b')' => (TokKind::RParen, 1),
                            b'[' => (TokKind::LBrack, 1),
                            b']' => (TokKind::RBrack, 1),
                            b'=' => (TokKind::Assign, 1),
                            b'<' => (TokKind::Lt, 1),
                            b'>' => (TokKind::Gt, 1),
                            b'!' => (TokKind::Not, 1),
                            b'+' => (TokKind::Plus, 1),
                            b'-' => (TokKind::Minus, 1),
                            b'*' => (TokKind::Star, 1),
                            b'/' => (TokKind::Slash, 1),
                            b'%' => (TokKind::Percent, 1),
                            b'&' => (TokKind::Amp, 1),
                            c => {
                                return Err(err(sl, sc, format!("invalid token: {:?}", c as char)))
                            }
                        },
                    }
                };
                push!(kind, sl, sc);
                i += n;
                col += n;
            }
        }
    }

    if out.last().map(|t| ends_statement(&t.kind)).unwrap_or(false) {
        push!(TokKind::Semi, line, col);
    }
    push!(TokKind::Eof, line, col);
    Ok(out)
}

fn unescape(b: u8) -> Option<char> {
    Some(match b {
        b'n' => '\n',
        b't' => '\t',
        b'r' => '\r',
        b'\\' => '\\',
        b'"' => '"',
        b'\'' => '\'',
        b'0' => '\0',
        _ => return None,
    })
}

/// Render the token stream for `--debugToken`.
pub fn dump_tokens(tokens: &[Token]) -> String {
    let mut s = String::new();
    for t in tokens {
        s.push_str(&format!(
            "{:>4}:{:<4} {:?}\n",
            t.span.line, t.span.col, t.kind
        ));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lex(src: &str) -> Vec<TokKind> {
        let mut smap = SourceMap::default();
        smap.add(PathBuf::from("t.go"));
        lex_str(&smap, src, 0)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn semicolon_insertion() {
        let kinds = lex("x := 1\ny := 2\n");
        assert!(kinds.contains(&TokKind::Semi));
        // one semi per line plus EOF
        assert_eq!(
            kinds.iter().filter(|k| **k == TokKind::Semi).count(),
            2
        );
    }

    #[test]
    fn no_semicolon_after_operator() {
        let kinds = lex("x := 1 +\n2\n");
        let semis = kinds.iter().filter(|k| **k == TokKind::Semi).count();
        assert_eq!(semis, 1);
    }

    #[test]
    fn string_escapes() {
        let kinds = lex("\"a\\nb\"");
        assert_eq!(kinds[0], TokKind::Str("a\nb".to_string()));
    }

    #[test]
    fn char_literal_is_int() {
        let kinds = lex("'A'");
        assert_eq!(kinds[0], TokKind::Int(65));
    }

    #[test]
    fn keywords_and_idents() {
        let kinds = lex("func main");
        assert_eq!(kinds[0], TokKind::Kw(Kw::Func));
        assert_eq!(kinds[1], TokKind::Ident("main".to_string()));
    }
}
