//! Drives the built `lox` binary end to end against real files, checking
//! the documented exit codes: 0 success, 65 compile error, 70 runtime
//! error, 64 usage error, 74 file-I/O failure.

use std::io::Write;
use std::process::Command;

fn lox_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lox"))
}

fn script_file(source: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp script file");
    file.write_all(source.as_bytes()).expect("write script source");
    file
}

#[test]
fn successful_script_exits_zero() {
    let file = script_file("print 1 + 1;");
    let output = lox_bin().arg(file.path()).output().expect("run lox binary");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2\n");
}

#[test]
fn compile_error_exits_65() {
    let file = script_file("var x = ;");
    let output = lox_bin().arg(file.path()).output().expect("run lox binary");
    assert_eq!(output.status.code(), Some(65));
}

#[test]
fn runtime_error_exits_70() {
    let file = script_file("nil();");
    let output = lox_bin().arg(file.path()).output().expect("run lox binary");
    assert_eq!(output.status.code(), Some(70));
}

#[test]
fn too_many_arguments_exits_64() {
    let file = script_file("print 1;");
    let output = lox_bin()
        .arg(file.path())
        .arg("extra-argument")
        .output()
        .expect("run lox binary");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn missing_file_exits_74() {
    let output = lox_bin()
        .arg("/nonexistent/path/does-not-exist.lox")
        .output()
        .expect("run lox binary");
    assert_eq!(output.status.code(), Some(74));
}

#[test]
fn dump_prints_a_disassembly_instead_of_running_the_script() {
    let file = script_file("fun add(a, b) { return a + b; } print add(1, 2);");
    let output = lox_bin()
        .arg("--dump")
        .arg(file.path())
        .output()
        .expect("run lox binary");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("== <script> =="));
    assert!(stdout.contains("== add =="));
    assert!(stdout.contains("OP_RETURN"));
}

#[test]
fn dump_without_a_path_is_a_usage_error() {
    let output = lox_bin().arg("--dump").output().expect("run lox binary");
    assert_eq!(output.status.code(), Some(64));
}
