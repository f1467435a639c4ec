mod common;

use common::{compile_with, err_contains, method_code, opcodes, parse};
use jembed::{Config, Error, UnreachablePolicy};

fn unreachable_at(source: &str, marker: &str) {
    let err = err_contains(source, "unreachable statement");
    let offset = source.find(marker).unwrap();
    match err {
        Error::Semantic { location, .. } => assert_eq!(location.offset, offset, "{}", source),
        other => panic!("expected a semantic error, got {:?}", other),
    }
}

#[test]
fn statement_after_return_is_rejected_at_its_position() {
    unreachable_at("class A { int f() { return 1; int dead = 2; } }", "int dead");
}

#[test]
fn statement_after_throw_is_rejected() {
    unreachable_at(
        "class A { void f() { throw new RuntimeException(); System.gc(); } }",
        "System.gc",
    );
}

#[test]
fn statement_after_break_and_continue_is_rejected() {
    unreachable_at("class A { void f() { while (true) { break; x(); } } void x() { } }", "x();");
    unreachable_at(
        "class A { void f(int n) { for (;;) { if (n > 0) continue; else continue; n++; } } }",
        "n++",
    );
}

#[test]
fn code_after_infinite_loop_is_rejected() {
    unreachable_at("class A { void f() { while (true) { } int k = 0; } }", "int k");
    unreachable_at("class A { void f() { for (;;) ; return; } }", "return;");
}

#[test]
fn constant_false_loop_body_is_rejected() {
    unreachable_at("class A { void f() { while (false) { f(); } } }", "{ f(); }");
}

#[test]
fn if_false_is_allowed() {
    common::compile_ok("class A { static final boolean DEBUG = false; void f() { if (DEBUG) { f(); } } }");
}

#[test]
fn loop_with_break_completes_normally() {
    common::compile_ok("class A { int f() { while (true) { if (f() > 0) break; } return 1; } }");
}

#[test]
fn catch_and_finally_reachability() {
    common::compile_ok(
        "class A { int f() { try { return 1; } finally { System.gc(); } } }",
    );
    unreachable_at(
        "class A { int f() { try { return 1; } finally { return 2; } return 3; } }",
        "return 3",
    );
}

#[test]
fn elide_policy_drops_dead_code() {
    let config = Config::default().with_unreachable(UnreachablePolicy::Elide);
    let classes = compile_with("class A { int f() { return 1; System.gc(); } }", &config);
    let class = parse(&classes, "A");
    let code = method_code(&class, "f");
    assert_eq!(opcodes(&code), vec![0x04, 0xac]);
    assert!(!common::has_ref(&class, "java/lang/System.gc:()V"));
}

#[test]
fn missing_return_is_reported() {
    err_contains("class A { int f(boolean b) { if (b) return 1; } }", "missing return statement");
}
