//! Runtime support for binaries produced by the sgo compiler.
//!
//! The generated assembly calls libc (`strlen`, `strcat`, `strcmp`,
//! `printf`) and the dot-prefixed helpers exported here. Allocation is
//! deliberately leaky: compiled programs are short-lived and nothing is
//! ever freed. Strings are NUL-terminated byte sequences, immutable once
//! allocated.
//!
//! The append/makeSlice family is not here: those return slice headers in
//! three registers, which a C-ABI function cannot, so the compiler emits
//! them into every output itself.

use std::ffi::CStr;
use std::io::Write;
use std::os::raw::c_char;
use std::ptr::null_mut;

/// The allocator behind `iruntime.malloc`. Never frees.
#[unsafe(export_name = ".malloc")]
pub unsafe extern "C" fn rt_malloc(size: i64) -> *mut u8 {
    if size <= 0 {
        return null_mut();
    }
    let Ok(layout) = std::alloc::Layout::from_size_align(size as usize, 16) else {
        std::process::abort();
    };
    unsafe {
        let p = std::alloc::alloc_zeroed(layout);
        if p.is_null() {
            std::process::abort();
        }
        p
    }
}

#[unsafe(export_name = ".panic")]
pub unsafe extern "C" fn rt_panic(msg: *const c_char) -> ! {
    if msg.is_null() {
        eprintln!("panic");
        std::process::exit(1);
    }
    unsafe {
        match CStr::from_ptr(msg).to_str() {
            Ok(s) => eprintln!("panic: {s}"),
            Err(_) => eprintln!("panic: <invalid utf8>"),
        }
    }
    std::process::exit(1)
}

#[unsafe(export_name = ".println_int")]
pub extern "C" fn rt_println_int(x: i64) {
    println!("{x}");
}

#[unsafe(export_name = ".print_int")]
pub extern "C" fn rt_print_int(x: i64) {
    print!("{x}");
    let _ = std::io::stdout().flush();
}

#[unsafe(export_name = ".println_cstr")]
pub unsafe extern "C" fn rt_println_cstr(p: *const c_char) {
    if p.is_null() {
        println!();
        return;
    }
    unsafe {
        match CStr::from_ptr(p).to_str() {
            Ok(s) => println!("{s}"),
            Err(_) => println!("<invalid utf8>"),
        }
    }
}

#[unsafe(export_name = ".print_cstr")]
pub unsafe extern "C" fn rt_print_cstr(p: *const c_char) {
    if p.is_null() {
        return;
    }
    unsafe {
        match CStr::from_ptr(p).to_str() {
            Ok(s) => {
                print!("{s}");
                let _ = std::io::stdout().flush();
            }
            Err(_) => {
                print!("<invalid utf8>");
                let _ = std::io::stdout().flush();
            }
        }
    }
}
