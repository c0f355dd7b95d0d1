//! Function-level emission: frame protocol, calling convention, ordering.

use sgo::compile_source;

fn compile(src: &str) -> String {
    compile_source(src).expect("compilation should succeed")
}

#[test]
fn printf_program_emits_libc_call() {
    let asm = compile(
        r#"package main

import "fmt"

func main() {
	fmt.Printf("%d\n", 1+2*3)
}
"#,
    );
    assert!(asm.contains("FUNCALL printf"), "missing printf call:\n{asm}");
    assert!(
        asm.contains(".string \"%d\\n\""),
        "format string literal not in data segment"
    );
    // 1 + 2*3 with correct precedence: the multiplication feeds the sum
    assert!(asm.contains("IMUL_FROM_STACK"));
    assert!(asm.contains("SUM_FROM_STACK"));
}

#[test]
fn every_function_has_one_prologue_and_a_ret() {
    let asm = compile(
        r#"package main

func add(a int, b int) int {
	return a + b
}

func main() {
	println(add(1, 2))
}
"#,
    );
    let globals = asm.matches(".global ").count();
    let prologues = asm.matches("FUNC_PROLOGUE").count();
    let rets = asm.matches("LEAVE_AND_RET").count();
    assert_eq!(
        prologues, globals,
        "each emitted function carries exactly one FUNC_PROLOGUE"
    );
    assert!(rets >= prologues, "every function must be able to return");
}

#[test]
fn main_function_is_emitted_last() {
    let asm = compile(
        r#"package main

func helper() int {
	return 1
}

func main() {
	println(helper())
}
"#,
    );
    let main_pos = asm.find("main.main:").expect("main.main must be emitted");
    let helper_pos = asm.find("main.helper:").expect("helper must be emitted");
    let append_pos = asm
        .find("iruntime.append8:")
        .expect("runtime append must be emitted");
    assert!(helper_pos < main_pos);
    assert!(append_pos < main_pos);
}

#[test]
fn arguments_pack_in_source_order() {
    let asm = compile(
        r#"package main

func f(a int, b int, c int) int {
	return a + b + c
}

func main() {
	println(f(1, 2, 3))
}
"#,
    );
    // three pushes, then reverse pops into arg registers 2,1,0
    let pos2 = asm.find("POP_TO_ARG_2").unwrap();
    let pos1 = asm.find("POP_TO_ARG_1").unwrap();
    let pos0 = asm.rfind("POP_TO_ARG_0").unwrap();
    assert!(pos2 < pos1 && pos1 < pos0);
}

#[test]
fn slice_parameter_takes_three_register_slots() {
    let asm = compile(
        r#"package main

func f(s []int, x int) int {
	return x
}

func main() {
	s := []int{1}
	println(f(s, 7))
}
"#,
    );
    // the slice occupies slots 0..2, so x lands in slot 3
    assert!(
        asm.contains("PUSH_ARG_3 # param \"x\""),
        "second parameter should follow the 24-wide slice:\n{asm}"
    );
    assert!(asm.contains("PUSH_ARG_2 # third"));
}

#[test]
fn multi_value_return_uses_reverse_pops() {
    let asm = compile(
        r#"package main

func two() (int, string) {
	return 7, "x"
}

func main() {
	a, b := two()
	println(a)
	println(b)
}
"#,
    );
    assert!(asm.contains("# multi-value call assignment"));
    // two single-word values: %rbx pushed, then both popped through %rax
    assert!(asm.contains("push %rbx"));
}

#[test]
fn variadic_call_collects_into_a_slice() {
    let asm = compile(
        r#"package main

func f(prefix int, rest ...interface{}) int {
	return prefix + len(rest)
}

func main() {
	println(f(1, 2, 3))
	println(f(1))
}
"#,
    );
    assert!(asm.contains("FUNCALL iruntime.append24"));
    assert!(asm.contains("# collect variadic args into a slice"));
    // the zero-argument case passes an empty slice
    assert!(asm.contains("LOAD_EMPTY_SLICE"));
}

#[test]
fn interface_parameter_boxes_concrete_argument() {
    let asm = compile(
        r#"package main

func f(x interface{}) int {
	return 0
}

func main() {
	println(f(42))
}
"#,
    );
    assert!(asm.contains("# conversion to interface from int"));
    assert!(asm.contains("POP_INTERFACE"));
}
