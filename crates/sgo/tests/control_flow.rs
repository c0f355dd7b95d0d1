//! Statements: branches, loops, switches, defer. Includes the label
//! well-formedness check: every jump target referenced in the text segment
//! must be defined.

use sgo::compile_source;

fn compile(src: &str) -> String {
    compile_source(src).expect("compilation should succeed")
}

/// Every `.L*` label referenced by a jump is defined somewhere.
fn assert_jump_targets_defined(asm: &str) {
    for line in asm.lines() {
        let t = line.trim();
        let target = ["jmp ", "je ", "jne "]
            .iter()
            .find_map(|p| t.strip_prefix(p))
            .map(|rest| rest.split_whitespace().next().unwrap_or(""));
        if let Some(label) = target {
            if label.starts_with(".L") {
                assert!(
                    asm.contains(&format!("{label}:")),
                    "undefined jump target {label}"
                );
            }
        }
    }
}

#[test]
fn if_else_branches() {
    let asm = compile(
        r#"package main

func main() {
	x := 3
	if x < 5 {
		println(1)
	} else {
		println(2)
	}
}
"#,
    );
    assert!(asm.contains("TEST_IT"));
    assert!(asm.contains("# endif"));
    assert_jump_targets_defined(&asm);
}

#[test]
fn for_clause_with_break_and_continue() {
    let asm = compile(
        r#"package main

func main() {
	i := 0
	for i = 0; i < 10; i++ {
		if i == 3 {
			continue
		}
		if i == 7 {
			break
		}
		println(i)
	}
}
"#,
    );
    assert!(asm.contains("# break"));
    assert!(asm.contains("# continue"));
    assert!(asm.contains("# loop begin"));
    assert!(asm.contains("# block end"));
    assert_jump_targets_defined(&asm);
}

#[test]
fn range_over_slice_uses_index_compare() {
    let asm = compile(
        r#"package main

func main() {
	s := []int{1, 2, 3}
	for _, v := range s {
		print(v)
	}
}
"#,
    );
    assert!(asm.contains("# for range []int"));
    assert!(asm.contains("# index < len"));
    assert!(asm.contains("# final iteration") || asm.contains("jne"));
    assert!(asm.contains("FUNCALL .print_int"));
    assert_jump_targets_defined(&asm);
}

#[test]
fn value_switch_duplicates_the_subject() {
    let asm = compile(
        r#"package main

func main() {
	x := 2
	switch x {
	case 1:
		println(10)
	case 2, 3:
		println(20)
	default:
		println(30)
	}
}
"#,
    );
    assert!(asm.contains("# duplicate the subject"));
    assert!(asm.contains("# default body"));
    assert!(asm.contains("# switch end"));
    assert_jump_targets_defined(&asm);
}

#[test]
fn string_switch_compares_with_strcmp() {
    let asm = compile(
        r#"package main

func main() {
	s := "b"
	switch s {
	case "a":
		println(1)
	case "b":
		println(2)
	}
}
"#,
    );
    assert!(asm.contains("FUNCALL strcmp"));
    assert_jump_targets_defined(&asm);
}

#[test]
fn condition_switch_without_subject() {
    let asm = compile(
        r#"package main

func main() {
	x := 5
	switch {
	case x < 3:
		println(1)
	case x < 10:
		println(2)
	}
}
"#,
    );
    assert!(asm.contains("# switch"));
    assert_jump_targets_defined(&asm);
}

#[test]
fn defer_runs_via_the_epilogue_handler() {
    let asm = compile(
        r#"package main

func main() {
	defer println("b")
	println("a")
}
"#,
    );
    assert!(asm.contains("# defer start"));
    assert!(asm.contains("# defer end"));
    assert!(asm.contains("# defer handler"));
    // main's handler enters the defer chain instead of leaving directly
    // (main is emitted last, so take the final handler)
    let handler_pos = asm.rfind("# defer handler").unwrap();
    let after = &asm[handler_pos..];
    let jmp_line = after.lines().nth(1).unwrap_or("");
    assert!(
        jmp_line.trim().starts_with("jmp "),
        "epilogue must jump into the defer chain: {jmp_line}"
    );
    assert_jump_targets_defined(&asm);
}

#[test]
fn stacked_defers_chain_in_reverse() {
    let asm = compile(
        r#"package main

func main() {
	defer println(1)
	defer println(2)
	println(0)
}
"#,
    );
    // the first-declared defer ends the chain by leaving the frame
    assert!(asm.contains("# earlier defer"));
    assert_eq!(asm.matches("# defer start").count(), 2);
    assert_jump_targets_defined(&asm);
}

#[test]
fn short_circuit_logic_uses_labels() {
    let asm = compile(
        r#"package main

func main() {
	a := 1
	b := 0
	if a == 1 && b == 0 {
		println(1)
	}
	if a == 2 || b == 0 {
		println(2)
	}
}
"#,
    );
    assert_jump_targets_defined(&asm);
}
