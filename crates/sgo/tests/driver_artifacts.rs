//! Driver-level checks: compiling from files on disk and writing the
//! assembly artifact out, the way the CLI does with `-o`.

use std::fs;

use sgo::driver::{Options, compile_files};

#[test]
fn compiles_a_source_file_and_writes_the_artifact() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let src_path = dir.path().join("main.go");
    fs::write(
        &src_path,
        "package main\n\nfunc main() {\n\tprintln(42)\n}\n",
    )
    .expect("failed to write source file");

    let asm = compile_files(&[src_path], &Options::default())
        .expect("compilation should succeed");

    let out_path = dir.path().join("out.s");
    fs::write(&out_path, &asm).expect("failed to write assembly artifact");
    let written = fs::read_to_string(&out_path).expect("failed to read artifact back");
    assert!(written.contains(".text"));
    assert!(written.contains("main.main:"));
    assert!(written.contains("FUNCALL .println_int"));
}

#[test]
fn multiple_files_share_one_package() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let helper_path = dir.path().join("helper.go");
    let main_path = dir.path().join("main.go");
    fs::write(
        &helper_path,
        "package main\n\nfunc seven() int {\n\treturn 7\n}\n",
    )
    .expect("failed to write helper file");
    fs::write(
        &main_path,
        "package main\n\nfunc main() {\n\tprintln(seven())\n}\n",
    )
    .expect("failed to write main file");

    let asm = compile_files(&[helper_path, main_path], &Options::default())
        .expect("cross-file resolution should succeed");
    assert!(asm.contains("main.seven:"));
    assert!(asm.contains("FUNCALL main.seven"));
}

#[test]
fn unreadable_source_is_an_io_error() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let missing = dir.path().join("missing.go");
    let err = compile_files(&[missing.clone()], &Options::default())
        .expect_err("a missing input must fail")
        .to_string();
    assert!(err.contains(": io: cannot read source file"), "unexpected: {err}");
    assert!(
        err.starts_with(&missing.display().to_string()),
        "diagnostic must lead with the path: {err}"
    );
}

#[test]
fn parse_only_stops_before_emission() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let src_path = dir.path().join("main.go");
    fs::write(&src_path, "package main\n\nfunc main() {\n}\n")
        .expect("failed to write source file");

    let opts = Options {
        parse_only: true,
        ..Options::default()
    };
    let asm = compile_files(&[src_path], &opts).expect("parse should succeed");
    assert!(asm.is_empty(), "parseOnly must not produce assembly");
}
