//! `ash`: thin external shell around the VM.
//!
//! Zero args starts a REPL over a persistent `Vm`; one arg runs a file;
//! anything else is a usage error. This binary owns nothing about the
//! language itself -- it only wires argv/stdin to `Vm::interpret` and maps
//! the tri-state result to a process exit code.

use std::fs;
use std::process::ExitCode;

use ash_vm::{InterpretResult, Vm};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const EXIT_OK: u8 = 0;
const EXIT_COMPILE_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;
const EXIT_USAGE_ERROR: u8 = 64;
const EXIT_IO_ERROR: u8 = 74;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ash=warn".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for(result: InterpretResult) -> u8 {
    match result {
        InterpretResult::Ok => EXIT_OK,
        InterpretResult::CompileError => EXIT_COMPILE_ERROR,
        InterpretResult::RuntimeError => EXIT_RUNTIME_ERROR,
    }
}

fn run_repl() -> ExitCode {
    let mut vm = Vm::new();
    let mut editor = DefaultEditor::new().expect("failed to initialize line editor");

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                vm.interpret(&line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                tracing::error!(target: "ash_cli", %err, "line editor error");
                break;
            }
        }
    }
    ExitCode::from(EXIT_OK)
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file \"{path}\": {err}");
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };

    let mut vm = Vm::new();
    let result = vm.interpret(&source);
    ExitCode::from(exit_code_for(result))
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => run_repl(),
        [path] => run_file(path),
        _ => {
            eprintln!("Usage: ash [script]");
            ExitCode::from(EXIT_USAGE_ERROR)
        }
    }
}
