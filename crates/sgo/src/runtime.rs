//! The internal runtime package.
//!
//! `append1`/`append8`/`append24` are written in the dialect itself and
//! compiled into every output, so the emitted code and the runtime agree on
//! slice layout by construction. `makeSlice`, `strcopy` and the `malloc`
//! trampoline return values in multiple registers and are emitted directly
//! as assembly by the generator; the allocator and the I/O helpers behind
//! the dot-prefixed symbols live in the sgrt support library.

pub const INTERNAL_RUNTIME_CODE: &str = r#"package iruntime

func append1(a []byte, x byte) []byte {
	var b []byte
	if len(a) < cap(a) {
		b = a[0 : len(a)+1]
	} else {
		var newcap int
		if cap(a) == 0 {
			newcap = 16
		} else {
			newcap = cap(a) * 2
		}
		b = make([]byte, len(a)+1, newcap)
		var i int
		for i = 0; i < len(a); i++ {
			b[i] = a[i]
		}
	}
	b[len(a)] = x
	return b
}

func append8(a []int, x int) []int {
	var b []int
	if len(a) < cap(a) {
		b = a[0 : len(a)+1]
	} else {
		var newcap int
		if cap(a) == 0 {
			newcap = 16
		} else {
			newcap = cap(a) * 2
		}
		b = make([]int, len(a)+1, newcap)
		var i int
		for i = 0; i < len(a); i++ {
			b[i] = a[i]
		}
	}
	b[len(a)] = x
	return b
}

func append24(a []interface{}, x interface{}) []interface{} {
	var b []interface{}
	if len(a) < cap(a) {
		b = a[0 : len(a)+1]
	} else {
		var newcap int
		if cap(a) == 0 {
			newcap = 16
		} else {
			newcap = cap(a) * 2
		}
		b = make([]interface{}, len(a)+1, newcap)
		var i int
		for i = 0; i < len(a); i++ {
			b[i] = a[i]
		}
	}
	b[len(a)] = x
	return b
}
"#;
