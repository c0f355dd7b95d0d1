//! Global variable emission: BSS, initialised data, nested layouts.

use sgo::compile_source;

fn compile(src: &str) -> String {
    compile_source(src).expect("compilation should succeed")
}

#[test]
fn zero_valued_global_goes_to_bss() {
    let asm = compile(
        r#"package main

var counter int

func main() {
	counter = 1
	println(counter)
}
"#,
    );
    assert!(asm.contains(".lcomm counter, 8"));
}

#[test]
fn initialised_int_global_is_a_quad() {
    let asm = compile(
        r#"package main

var answer int = 42

func main() {
	println(answer)
}
"#,
    );
    assert!(asm.contains("answer: # int"));
    assert!(asm.contains(".quad 42"));
}

#[test]
fn string_global_references_the_literal_label() {
    let asm = compile(
        r#"package main

var greeting string = "hi"

func main() {
	println(greeting)
}
"#,
    );
    assert!(asm.contains("greeting: # string"));
    assert!(asm.contains(".quad .S"), "string global must point at .S label");
    assert!(asm.contains(".string \"hi\""));
}

#[test]
fn struct_global_gets_alignment_padding() {
    let asm = compile(
        r#"package main

type Rec struct {
	tag byte
	val int
}

var r Rec

func main() {
	println(r.val)
}
"#,
    );
    // size 16: tag at 0, 7 bytes of padding, val at 8
    assert!(asm.contains(".lcomm r, 16"));
}

#[test]
fn initialised_struct_global_emits_field_padding() {
    let asm = compile(
        r#"package main

type Rec struct {
	tag byte
	val int
}

var r = Rec{tag: 1, val: 9}

func main() {
	println(r.val)
}
"#,
    );
    assert!(asm.contains(".zero 7 # padding"));
    assert!(asm.contains(".quad 9"));
}

#[test]
fn global_slice_literal_materialises_hidden_array() {
    let asm = compile(
        r#"package main

var primes = []int{2, 3, 5}

func main() {
	println(primes[2])
}
"#,
    );
    // the backing array is written one subsection deeper
    assert!(asm.contains(".data 1"));
    assert!(asm.contains(".quad 3 # len"));
    assert!(asm.contains(".quad 3 # cap"));
}

#[test]
fn global_array_sizes_scale_with_length() {
    let asm = compile(
        r#"package main

var table [5]int

func main() {
	table[0] = 1
	println(table[0])
}
"#,
    );
    assert!(asm.contains(".lcomm table, 40"));
}

#[test]
fn const_values_fold_into_data() {
    let asm = compile(
        r#"package main

const width = 3

var area int = width * width

func main() {
	println(area)
}
"#,
    );
    assert!(asm.contains(".quad 9"));
}

#[test]
fn iota_enumerates_constants() {
    let asm = compile(
        r#"package main

const (
	first = iota
	second
	third
)

var x int = third

func main() {
	println(x)
}
"#,
    );
    assert!(asm.contains(".quad 2"));
}

#[test]
fn address_of_global_is_a_label_reference() {
    let asm = compile(
        r#"package main

var target int = 5

var p *int = &target

func main() {
	println(*p)
}
"#,
    );
    assert!(asm.contains(".quad target"));
}
