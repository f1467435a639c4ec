mod common;

use common::{compile_ok, err_contains};
use jembed::{Config, DiagnosticKind, Error};

#[test]
fn undefined_variable() {
    err_contains("class A { int f() { return y; } }", "cannot find symbol: variable y");
}

#[test]
fn unknown_class_becomes_a_semantic_error() {
    let err = err_contains("class A { Missing m; }", "cannot find symbol: class Missing");
    assert_eq!(err.kind(), DiagnosticKind::Semantic);
}

#[test]
fn incompatible_assignment() {
    err_contains("class A { void f() { int x = \"s\"; } }", "incompatible types");
    err_contains("class A { void f() { byte b = 300; } }", "incompatible types");
    compile_ok("class A { void f() { byte b = 100; char c = 65; short s = 'a'; } }");
}

#[test]
fn compound_assignment_narrows_implicitly() {
    compile_ok("class A { void f() { byte b = 1; b += 1000; char c = 'a'; c *= 2; } }");
}

#[test]
fn checked_exceptions_must_be_handled() {
    let source = "class A { void f() { throw new java.io.IOException(); } }";
    err_contains(source, "unreported exception java.io.IOException");
    compile_ok("class A { void f() throws java.io.IOException { throw new java.io.IOException(); } }");
    compile_ok("class A { void f() { try { throw new java.io.IOException(); } catch (Exception e) { } } }");
    compile_ok("class A { void f() { throw new IllegalStateException(); } }");
}

#[test]
fn checked_exception_from_call() {
    err_contains(
        "class A { void g() throws Exception { } void f() { g(); } }",
        "unreported exception java.lang.Exception",
    );
}

#[test]
fn definite_assignment() {
    err_contains(
        "class A { int f(boolean b) { int x; if (b) x = 1; return x; } }",
        "variable x might not have been initialized",
    );
    compile_ok("class A { int f(boolean b) { int x; if (b) x = 1; else x = 2; return x; } }");
    compile_ok("class A { int f(boolean b) { int x; if (b && (x = 1) > 0) return x; return 0; } }");
}

#[test]
fn final_locals_are_assigned_once() {
    err_contains(
        "class A { void f() { final int x = 1; x = 2; } }",
        "cannot assign a value to final variable x",
    );
    err_contains(
        "class A { void f(boolean b) { final int x; if (b) x = 1; x = 2; } }",
        "variable x might already have been assigned",
    );
}

#[test]
fn captured_locals_must_be_final() {
    err_contains(
        "class A { Runnable f() { int n = 1; return new Runnable() { public void run() { System.out.println(n); } }; } }",
        "needs to be declared final",
    );
    compile_ok(
        "class A { Runnable f() { final int n = 1; return new Runnable() { public void run() { System.out.println(n); } }; } }",
    );
}

#[test]
fn static_context_checks() {
    err_contains("class A { int x; static int f() { return x; } }", "cannot be referenced from a static context");
    err_contains("class A { static Object f() { return this; } }", "cannot be referenced from a static context");
}

#[test]
fn break_outside_loop_and_unknown_label() {
    err_contains("class A { void f() { break; } }", "break outside switch or loop");
    err_contains("class A { void f() { while (true) { continue nowhere; } } }", "undefined label: nowhere");
}

#[test]
fn switch_case_checks() {
    err_contains(
        "class A { void f(int x) { switch (x) { case 1: break; case 1: break; } } }",
        "duplicate case label",
    );
    err_contains(
        "class A { void f(int x) { switch (x) { default: break; default: break; } } }",
        "duplicate default label",
    );
    err_contains(
        "class A { void f(int x, int y) { switch (x) { case y: break; } } }",
        "constant expression required",
    );
}

#[test]
fn abstract_instantiation_and_unimplemented_methods() {
    err_contains(
        "abstract class B { } class A { Object f() { return new B(); } }",
        "is abstract; cannot be instantiated",
    );
    err_contains(
        "class A implements Runnable { }",
        "does not override abstract method run()",
    );
}

#[test]
fn cyclic_inheritance() {
    err_contains("class A extends B { } class B extends A { }", "cyclic inheritance");
}

#[test]
fn duplicate_declarations() {
    err_contains("class A { void f() { } void f() { } }", "is already defined");
    err_contains("class A { void f() { int a = 1; int a = 2; } }", "variable a is already defined");
}

#[test]
fn bad_operands() {
    err_contains("class A { boolean f() { return 1 && true; } }", "bad operand types for binary operator '&&'");
    err_contains("class A { int f() { return -true; } }", "bad operand type boolean for unary operator '-'");
}

#[test]
fn batch_mode_reports_every_member() {
    let source = "class A {
        int f() { return y; }
        int g() { return z; }
        void h() { }
    }";
    let config = Config::default().with_batch_mode(10);
    let err = jembed::compile(source, &config).unwrap_err();
    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics.len(), 2, "{:?}", diagnostics);
    assert!(diagnostics[0].message.contains("variable y"));
    assert!(diagnostics[1].message.contains("variable z"));
    assert_eq!((diagnostics[0].line, diagnostics[1].line), (2, 3));
    assert!(matches!(err, Error::Diagnostics(_)));
}

#[test]
fn default_mode_stops_at_the_first_error() {
    let err = common::compile_err("class A { int f() { return y; } int g() { return z; } }");
    assert_eq!(err.diagnostics().len(), 1);
}

#[test]
fn unsupported_constructs_are_syntax_errors() {
    for source in [
        "enum E { A }",
        "class A { Runnable r = () -> { }; }",
        "@interface Marker { }",
        "class A { void f() { try (Object o = null) { } } }",
    ] {
        let err = common::compile_err(source);
        assert_eq!(err.kind(), DiagnosticKind::Syntax, "{}: {}", source, err);
    }
}
