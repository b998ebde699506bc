//! End-to-end checks driven through the actual `ash` binary, the same way
//! the compiler crate's own tests shell out to a built artifact and
//! inspect its stdout/stderr/exit code.

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

fn run_script(source: &str) -> (String, String, i32) {
    let mut file = NamedTempFile::new().expect("failed to create temp script");
    file.write_all(source.as_bytes()).expect("failed to write temp script");

    let output = Command::new(env!("CARGO_BIN_EXE_ash"))
        .arg(file.path())
        .output()
        .expect("failed to run ash binary");

    (
        String::from_utf8(output.stdout).expect("stdout was not utf8"),
        String::from_utf8(output.stderr).expect("stderr was not utf8"),
        output.status.code().expect("process exited without a code"),
    )
}

#[test]
fn arithmetic_precedence() {
    let (stdout, _stderr, code) = run_script("print 1 + 2 * 3;");
    assert_eq!(stdout, "7\n");
    assert_eq!(code, 0);
}

#[test]
fn grouping_overrides_precedence() {
    let (stdout, _stderr, code) = run_script("print (1 + 2) * 3;");
    assert_eq!(stdout, "9\n");
    assert_eq!(code, 0);
}

#[test]
fn string_concatenation() {
    let (stdout, _stderr, code) = run_script("print \"ab\" + \"cd\";");
    assert_eq!(stdout, "abcd\n");
    assert_eq!(code, 0);
}

#[test]
fn global_assignment_round_trip() {
    let (stdout, _stderr, code) = run_script("var x = 10; x = x + 5; print x;");
    assert_eq!(stdout, "15\n");
    assert_eq!(code, 0);
}

#[test]
fn negating_a_bool_is_a_runtime_error() {
    let (stdout, stderr, code) = run_script("print -true;");
    assert_eq!(stdout, "");
    assert!(stderr.contains("Operand must be a number"), "stderr was: {stderr}");
    assert!(stderr.contains("[Line 1] in script"), "stderr was: {stderr}");
    assert_eq!(code, 70);
}

#[test]
fn undefined_global_read_is_a_runtime_error() {
    let (stdout, stderr, code) = run_script("print y;");
    assert_eq!(stdout, "");
    assert!(stderr.contains("Undefined variable 'y'"), "stderr was: {stderr}");
    assert_eq!(code, 70);
}

#[test]
fn missing_semicolon_is_a_compile_error() {
    let (stdout, stderr, code) = run_script("print 1");
    assert_eq!(stdout, "");
    assert!(!stderr.is_empty());
    assert_eq!(code, 65);
}

#[test]
fn unreadable_path_is_an_io_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_ash"))
        .arg("/nonexistent/path/does-not-exist.ash")
        .output()
        .expect("failed to run ash binary");
    assert_eq!(output.status.code(), Some(74));
}

#[test]
fn too_many_arguments_is_a_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_ash"))
        .arg("one")
        .arg("two")
        .output()
        .expect("failed to run ash binary");
    assert_eq!(output.status.code(), Some(64));
}
