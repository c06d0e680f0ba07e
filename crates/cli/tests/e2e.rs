//! End-to-end scenarios and failure scenarios, driving `Vm::interpret`
//! directly against an in-memory output buffer rather than shelling out to
//! the built binary — faster, and it exercises the same code path the
//! binary does (`lox_runtime::Vm`).

use std::sync::{Arc, Mutex};

use lox_runtime::{Vm, VmError};

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

fn run(source: &str) -> (Result<(), VmError>, String) {
    let buffer = SharedBuffer::default();
    let mut vm = Vm::with_writer(buffer.clone());
    let result = vm.interpret(source);
    let output = String::from_utf8(buffer.0.lock().unwrap().clone()).expect("print output is valid UTF-8");
    (result, output)
}

fn assert_prints(source: &str, expected: &str) {
    let (result, output) = run(source);
    result.unwrap_or_else(|err| panic!("expected success, got: {err}"));
    assert_eq!(output, expected);
}

#[test]
fn arithmetic_precedence() {
    assert_prints("print 1 + 2 * 3;", "7\n");
}

#[test]
fn interned_strings_compare_equal_by_identity() {
    assert_prints(r#"var a = "hi"; var b = "hi"; print a == b;"#, "true\n");
}

#[test]
fn closures_capture_their_enclosing_parameter() {
    assert_prints(
        "fun make(x){ fun inner(){ return x; } return inner; } var f = make(42); print f();",
        "42\n",
    );
}

#[test]
fn for_loop_accumulates() {
    assert_prints(
        "var i = 0; for (var j = 0; j < 3; j = j + 1) i = i + j; print i;",
        "3\n",
    );
}

#[test]
fn method_call_reads_an_instance_field() {
    assert_prints(
        r#"class A { greet(){ print "hi " + this.name; } } var a = A(); a.name = "lo"; a.greet();"#,
        "hi lo\n",
    );
}

#[test]
fn inherited_init_chains_via_super() {
    assert_prints(
        "class B { init(x){ this.x = x; } } class C < B { init(x){ super.init(x); this.y = x + 1; } } \
         var c = C(10); print c.x; print c.y;",
        "10\n11\n",
    );
}

#[test]
fn self_initializing_local_is_a_compile_error() {
    let (result, _) = run("{ var x = x; }");
    match result.unwrap_err() {
        VmError::Compile(errors) => {
            assert!(
                errors.iter().any(|e| e.message.to_lowercase().contains("own initializer")
                    || e.message.to_lowercase().contains("itself")),
                "expected a self-initialization diagnostic, got: {errors:?}"
            );
        }
        VmError::Runtime { .. } => panic!("expected a compile error"),
    }
}

#[test]
fn adding_a_string_and_a_number_is_a_runtime_error() {
    let (result, _) = run(r#""a" + 1;"#);
    match result.unwrap_err() {
        VmError::Runtime { message, .. } => {
            assert_eq!(message, "Operands must be two numbers or two strings.");
        }
        VmError::Compile(errors) => panic!("expected a runtime error, got compile errors: {errors:?}"),
    }
}

#[test]
fn calling_nil_is_a_runtime_error() {
    let (result, _) = run("nil();");
    match result.unwrap_err() {
        VmError::Runtime { message, .. } => {
            assert_eq!(message, "Can only call functions and classes.");
        }
        VmError::Compile(errors) => panic!("expected a runtime error, got compile errors: {errors:?}"),
    }
}

#[test]
fn deep_recursion_overflows_the_stack() {
    let (result, _) = run("fun rec(n) { return rec(n + 1); } rec(0);");
    match result.unwrap_err() {
        VmError::Runtime { message, .. } => assert_eq!(message, "Stack overflow."),
        VmError::Compile(errors) => panic!("expected a runtime error, got compile errors: {errors:?}"),
    }
}
