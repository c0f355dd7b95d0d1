//! Method sets, receiver-type ids, and interface dispatch tables.

use sgo::compile_source;

fn compile(src: &str) -> String {
    compile_source(src).expect("compilation should succeed")
}

#[test]
fn value_receiver_method_compiles_to_qualified_symbol() {
    let asm = compile(
        r#"package main

type P struct {
	x, y int
}

func (p P) sum() int {
	return p.x + p.y
}

func main() {
	p := P{3, 4}
	println(p.sum())
}
"#,
    );
    assert!(asm.contains("main.P$sum:"), "method symbol missing:\n{asm}");
    assert!(asm.contains("FUNCALL main.P$sum"));
    // the struct is zero-initialised before the literal fields land
    assert!(asm.contains("# zero-initialize the struct"));
}

#[test]
fn receiver_type_table_lists_methods_in_source_order() {
    let asm = compile(
        r#"package main

type A struct {
	n int
}

func (a A) First() int {
	return 1
}

func (a A) Second() int {
	return 2
}

func main() {
	a := A{0}
	println(a.First() + a.Second())
}
"#,
    );
    assert!(asm.contains("receiverTypes:"));
    assert!(asm.contains(".quad namedType1"));
    let table_pos = asm.find("namedType1:").expect("per-type table");
    let first_pos = asm[table_pos..].find(".quad .MFirst").expect("First entry");
    let second_pos = asm[table_pos..].find(".quad .MSecond").expect("Second entry");
    assert!(first_pos < second_pos, "methods must keep source order");
    assert!(asm.contains(".quad main.A$First"));
    assert!(asm.contains(".quad main.A$Second"));
}

#[test]
fn shared_method_names_emit_one_label() {
    let asm = compile(
        r#"package main

type A struct {
	n int
}

type B struct {
	n int
}

func (a A) Name() int {
	return 1
}

func (b B) Name() int {
	return 2
}

func main() {
	a := A{0}
	b := B{0}
	println(a.Name() + b.Name())
}
"#,
    );
    // the short name label is emitted exactly once and shared by both tables
    assert_eq!(asm.matches(".MName:").count(), 1);
    assert!(asm.contains("namedType1:"));
    assert!(asm.contains("namedType2:"));
    assert_eq!(asm.matches(".quad .MName").count(), 2);
}

#[test]
fn interface_call_dispatches_through_the_table() {
    let asm = compile(
        r#"package main

type I interface {
	Name() string
}

type A struct {
}

func (a A) Name() string {
	return "A"
}

func f(i I) string {
	return i.Name()
}

func main() {
	println(f(A{}))
}
"#,
    );
    assert!(asm.contains("# interface method call \"Name\""));
    assert!(asm.contains("lea receiverTypes(%rip), %rax"));
    assert!(asm.contains("lea .MName(%rip), %r11"));
    assert!(asm.contains("call *%rax"));
    // the concrete type's descriptor is in the data segment
    assert!(asm.contains(".string \"main.A\""));
}

#[test]
fn type_assertion_compares_descriptors() {
    let asm = compile(
        r#"package main

func f(x interface{}) int {
	v, ok := x.(int)
	if ok {
		return v
	}
	return -1
}

func main() {
	println(f(42))
}
"#,
    );
    assert!(asm.contains("# type assertion"));
    assert!(asm.contains("FUNCALL strcmp"));
    assert!(asm.contains("mov %rax, %rbx # ok"));
    assert!(asm.contains(".string \"int\""));
}

#[test]
fn type_switch_matches_on_descriptor_strings() {
    let asm = compile(
        r#"package main

func describe(x interface{}) int {
	switch x.(type) {
	case int:
		return 1
	case string:
		return 2
	case nil:
		return 3
	}
	return 0
}

func main() {
	println(describe(1))
}
"#,
    );
    assert!(asm.contains("# subject: dynamic type descriptor"));
    assert!(asm.contains("mov %rcx, %rax # descriptor word"));
    assert!(asm.contains("mov $0, %rax # nil case"));
    // both case types appear as descriptors
    assert!(asm.contains(".string \"int\""));
    assert!(asm.contains(".string \"string\""));
}
