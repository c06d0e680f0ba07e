//! Command-line entry point: argument parsing, file loading, the
//! REPL loop, exit codes, and SIGINT teardown.
//!
//! Deliberately thin — every bit of actual language behavior lives in
//! `lox-runtime`; this crate only wires stdin/stdout/argv to it and maps
//! `VmError` onto the four documented exit codes.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser as ClapParser;
use lox_runtime::{Vm, VmError};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

#[derive(ClapParser)]
#[command(name = "lox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A small dynamically-typed, class-based scripting language", long_about = None)]
struct Args {
    /// Script to run. Omit to start an interactive REPL.
    path: Option<PathBuf>,

    /// Disassemble the compiled script to stdout instead of running it.
    #[arg(long)]
    dump: bool,

    /// Anything past the script path is a usage error (exit 64).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    extra: Vec<String>,
}

const EXIT_COMPILE_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;
const EXIT_USAGE_ERROR: u8 = 64;
const EXIT_IO_ERROR: u8 = 74;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if !args.extra.is_empty() {
        eprintln!("Usage: lox [script]");
        return ExitCode::from(EXIT_USAGE_ERROR);
    }

    if args.dump {
        return match &args.path {
            Some(path) => dump_file(path),
            None => {
                eprintln!("--dump requires a script path");
                ExitCode::from(EXIT_USAGE_ERROR)
            }
        };
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    if let Err(err) = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupt)) {
        tracing::debug!(%err, "failed to install SIGINT handler; Ctrl-C will use the default action");
    }

    let mut vm = Vm::new();
    vm.set_interrupt_flag(Arc::clone(&interrupt));

    match args.path {
        Some(path) => run_file(vm, &path),
        None => run_repl(vm, &interrupt),
    }
}

/// Compile `path` and print a disassembly of every function it defines
/// (the script itself plus every nested `fun`/method, reached by walking
/// each chunk's constant pool for nested `ObjFunction` constants) instead
/// of running it. Diagnostics-only — never on the interpretation path.
fn dump_file(path: &std::path::Path) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file '{}': {err}", path.display());
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };
    let mut heap = lox_core::Heap::new();
    match lox_compiler::compile(&source, &mut heap) {
        Ok(function) => {
            dump_function(function);
            ExitCode::SUCCESS
        }
        Err(errors) => {
            for error in &errors {
                eprintln!("{error}");
            }
            ExitCode::from(EXIT_COMPILE_ERROR)
        }
    }
}

fn dump_function(function_obj: lox_core::ObjRef) {
    let function = function_obj.as_function();
    let name = match function.name {
        Some(name) => name.as_string().as_str_lossy().into_owned(),
        None => "<script>".to_string(),
    };
    println!("{}", lox_compiler::disassemble_chunk(&function.chunk, &name));
    for constant in function.chunk.constants() {
        if let Some(nested) = constant.as_obj() {
            if nested.kind() == lox_core::ObjKind::Function {
                dump_function(nested);
            }
        }
    }
}

fn run_file(mut vm: Vm, path: &std::path::Path) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file '{}': {err}", path.display());
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };
    match vm.interpret(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(VmError::Compile(errors)) => {
            for error in &errors {
                eprintln!("{error}");
            }
            ExitCode::from(EXIT_COMPILE_ERROR)
        }
        Err(err @ VmError::Runtime { .. }) => {
            eprintln!("{err}");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

/// `prog` with no arguments: read one line at a time until EOF, interpreting
/// each independently. The same `Vm` persists across lines so globals and
/// classes survive, but each line gets its own compile pass; an error on one
/// line is reported and the session continues.
fn run_repl(mut vm: Vm, interrupt: &Arc<AtomicBool>) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Could not start line editor: {err}");
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                match vm.interpret(&line) {
                    Ok(()) => {}
                    Err(VmError::Compile(errors)) => {
                        for error in &errors {
                            eprintln!("{error}");
                        }
                    }
                    Err(err @ VmError::Runtime { .. }) => eprintln!("{err}"),
                }
                if interrupt.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }

    let _ = std::io::stdout().flush();
    drop(vm);
    ExitCode::SUCCESS
}
