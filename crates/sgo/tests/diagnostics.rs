//! Diagnostic format and fatal-first behavior: one positioned line,
//! `path:line:col: kind: message`.

use sgo::compile_source;

fn compile_err(src: &str) -> String {
    compile_source(src)
        .expect_err("compilation should fail")
        .to_string()
}

#[test]
fn unresolved_identifier_is_positioned() {
    let err = compile_err(
        r#"package main

func main() {
	println(missing)
}
"#,
    );
    assert!(
        err.contains(": resolution: undefined: missing"),
        "unexpected: {err}"
    );
    assert!(err.starts_with("<input>:4:"), "unexpected position: {err}");
}

#[test]
fn unknown_import_is_rejected() {
    let err = compile_err(
        r#"package main

import "os"

func main() {
}
"#,
    );
    assert!(err.contains("resolution: import not found: \"os\""));
}

#[test]
fn lex_error_reports_invalid_token() {
    let err = compile_err("package main\n\nfunc main() { ~ }\n");
    assert!(err.contains(": lex: invalid token"), "unexpected: {err}");
}

#[test]
fn parse_error_names_the_unexpected_token() {
    let err = compile_err("package main\n\nfunc main() { if }\n");
    assert!(err.contains(": parse:"), "unexpected: {err}");
}

#[test]
fn assignment_arity_mismatch_is_a_type_error() {
    let err = compile_err(
        r#"package main

func main() {
	a, b := 1, 2, 3
	println(a + b)
}
"#,
    );
    assert!(err.contains(": type: assignment mismatch"), "unexpected: {err}");
}

#[test]
fn type_assertion_requires_an_interface() {
    let err = compile_err(
        r#"package main

func main() {
	x := 1
	v, ok := x.(int)
	if ok {
		println(v)
	}
}
"#,
    );
    assert!(
        err.contains(": type: invalid type assertion"),
        "unexpected: {err}"
    );
}

#[test]
fn string_ordering_is_unsupported() {
    let err = compile_err(
        r#"package main

func main() {
	if "a" < "b" {
		println(1)
	}
}
"#,
    );
    assert!(
        err.contains(": unsupported: to be implemented"),
        "unexpected: {err}"
    );
}

#[test]
fn missing_main_is_fatal() {
    let err = compile_err(
        r#"package main

func helper() int {
	return 1
}
"#,
    );
    assert!(
        err.contains("function main is undeclared in the main package"),
        "unexpected: {err}"
    );
}

#[test]
fn make_supports_slices_only() {
    let err = compile_err(
        r#"package main

func main() {
	m := make(map[string]int, 4)
	println(len(m))
}
"#,
    );
    assert!(err.contains("make() supports slices only"), "unexpected: {err}");
}

#[test]
fn unknown_field_is_reported() {
    let err = compile_err(
        r#"package main

type P struct {
	x int
}

func main() {
	p := P{x: 1}
	println(p.z)
}
"#,
    );
    assert!(err.contains("unknown field: z"), "unexpected: {err}");
}
