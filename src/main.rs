use std::io::{self, BufWriter};
use std::{env, fs, path::Path, process};

use simian::bytecode::compile::Compiler;
use simian::bytecode::disasm::{print_bc, print_bc_stats};
use simian::frontend::lexer::Lexer;
use simian::frontend::parser::parse;
use simian::frontend::token_dumper::TokenDumper;
use simian::repl;
use simian::runtime::vm_bc::Vm;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let help = args.contains(&"--help".to_string()) || args.contains(&"-h".to_string());
    let interactive = args.contains(&"--repl".to_string()) || args.contains(&"-i".to_string());
    let tokens_only = args.contains(&"--tokens".to_string());
    let no_color = args.contains(&"--no-color".to_string());
    let ast = args.contains(&"--ast".to_string());
    let bytecode = args.contains(&"--bc".to_string()) || args.contains(&"--bytecode".to_string());

    if help {
        print_usage();
        return;
    }

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    match filename {
        Some(filename) if !interactive => {
            ensure_extension(filename);
            match fs::read_to_string(filename) {
                Ok(source) => {
                    if tokens_only {
                        dump_tokens(&source, no_color);
                    } else {
                        run_program(&source, ast, bytecode);
                    }
                }
                Err(e) => {
                    eprintln!("Failed to read '{}': {}", filename, e);
                    process::exit(1);
                }
            }
        }
        _ => {
            if args.len() == 1 || interactive {
                start_repl();
            } else {
                print_usage();
            }
        }
    }
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("mk") {
        eprintln!("Error: expected a .mk file, got {}", filename);
        process::exit(1);
    }
}

fn start_repl() {
    println!("simian - type expressions, Ctrl-D to quit");
    let stdin = io::stdin();
    if let Err(e) = repl::start(stdin.lock(), io::stdout()) {
        eprintln!("REPL I/O error: {}", e);
        process::exit(1);
    }
}

fn dump_tokens(source: &str, no_color: bool) {
    let tokens = Lexer::new(source).tokenize();

    let mut dumper = TokenDumper::new();
    if no_color {
        dumper = dumper.no_color();
    }

    let mut out = BufWriter::new(io::stdout().lock());
    if let Err(e) = dumper.dump(&mut out, &tokens) {
        eprintln!("Failed to write tokens: {}", e);
        process::exit(1);
    }
}

fn print_usage() {
    println!("SIMIAN - bytecode compiler and VM for a small expression language");
    println!();
    println!("Usage:");
    println!("  simian                     Start interactive REPL");
    println!("  simian <file.mk>           Run a program and print its last value");
    println!("  simian --repl, -i          Start interactive REPL");
    println!("  simian --tokens <file.mk>  Show tokens only (--no-color for plain output)");
    println!("  simian --ast <file.mk>     Print the parsed program");
    println!("  simian --bc <file.mk>      Disassemble, then run");
    println!("  simian --help, -h          Show this help");
    println!();
    println!("Set RUST_LOG=debug (or trace) for compiler and VM logging.");
}

fn run_program(source: &str, ast: bool, bytecode: bool) {
    let (program, errors) = parse(Lexer::new(source));
    if !errors.is_empty() {
        eprintln!("Parse errors:");
        for e in &errors {
            eprintln!("  {}", e);
        }
        process::exit(1);
    }

    if ast {
        println!("{}", program);
        return;
    }

    let mut compiler = Compiler::new();
    if let Err(e) = compiler.compile(&program) {
        eprintln!("Compile error: {}", e);
        process::exit(1);
    }
    let program_bytecode = compiler.bytecode();

    if bytecode {
        println!("=== BYTECODE PROGRAM ===");
        print_bc(&program_bytecode);
        println!();
        print_bc_stats(&program_bytecode);
        match program_bytecode.to_bytes() {
            Ok(encoded) => println!("encoded size: {} bytes", encoded.len()),
            Err(e) => eprintln!("Failed to encode bytecode: {}", e),
        }
        println!();
    }

    let mut vm = Vm::new(program_bytecode);
    if let Err(e) = vm.run() {
        eprintln!("Runtime error: {}", e);
        process::exit(1);
    }

    println!("{}", vm.last_popped_stack_elem());
}
