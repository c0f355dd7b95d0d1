use std::io::Write;
use std::path::PathBuf;

use sgo::driver::{Options, compile_files};

fn print_usage() {
    eprintln!("usage:");
    eprintln!("  sgo [options] <file.go>...");
    eprintln!();
    eprintln!("options:");
    eprintln!("  --parseOnly    stop after parsing");
    eprintln!("  --resolveOnly  stop after resolution and inference");
    eprintln!("  --debugAst     dump the tree to stderr");
    eprintln!("  --debugToken   dump the token stream to stderr");
    eprintln!("  -o <file>      write assembly to <file> instead of stdout");
}

fn die(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        std::process::exit(2);
    }

    let mut opts = Options::default();
    let mut out_path: Option<PathBuf> = None;
    let mut inputs: Vec<PathBuf> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--parseOnly" => opts.parse_only = true,
            "--resolveOnly" => opts.resolve_only = true,
            "--debugAst" => opts.debug_ast = true,
            "--debugToken" => opts.debug_token = true,
            "-o" => {
                i += 1;
                if i >= args.len() {
                    die("-o needs a value");
                }
                out_path = Some(PathBuf::from(&args[i]));
            }
            x if x.starts_with('-') => {
                print_usage();
                die(&format!("unknown option: {x}"));
            }
            x => inputs.push(PathBuf::from(x)),
        }
        i += 1;
    }

    if inputs.is_empty() {
        print_usage();
        die("missing input files");
    }

    let asm = compile_files(&inputs, &opts).unwrap_or_else(|e| die(&e.to_string()));

    match out_path {
        None => {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(asm.as_bytes())
                .unwrap_or_else(|e| die(&format!("cannot write output: {e}")));
        }
        Some(p) => {
            std::fs::write(&p, asm)
                .unwrap_or_else(|e| die(&format!("cannot write {}: {e}", p.display())));
        }
    }
}
