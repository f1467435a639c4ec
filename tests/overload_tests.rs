mod common;

use common::{compile_ok, err_contains, has_ref, parse};
use jembed::Error;

/// Compile `methods` plus a caller `t()` running `call`, and return the
/// descriptors of the methods of `A` named `m` that `t` invokes
fn chosen(methods: &str, call: &str) -> Vec<String> {
    let source = format!("class A {{ {} static void t() {{ {}; }} }}", methods, call);
    let classes = compile_ok(&source);
    let class = parse(&classes, "A");
    common::member_refs(&class)
        .into_iter()
        .filter_map(|r| r.strip_prefix("A.m:").map(str::to_string))
        .collect()
}

#[test]
fn most_specific_reference_overload_wins_in_any_order() {
    let string = "static void m(String s) { }";
    let object = "static void m(Object o) { }";
    for methods in [format!("{} {}", string, object), format!("{} {}", object, string)] {
        assert_eq!(chosen(&methods, "m(\"x\")"), vec!["(Ljava/lang/String;)V"]);
        assert_eq!(chosen(&methods, "m(new Object())"), vec!["(Ljava/lang/Object;)V"]);
    }
}

#[test]
fn most_specific_primitive_overload_wins_in_any_order() {
    let orders = [
        "static void m(long x) { } static void m(int x) { } static void m(double x) { }",
        "static void m(double x) { } static void m(int x) { } static void m(long x) { }",
        "static void m(int x) { } static void m(double x) { } static void m(long x) { }",
    ];
    for methods in orders {
        assert_eq!(chosen(methods, "m(1)"), vec!["(I)V"]);
        assert_eq!(chosen(methods, "m(1L)"), vec!["(J)V"]);
        assert_eq!(chosen(methods, "m(1f)"), vec!["(D)V"]);
        assert_eq!(chosen(methods, "m('c')"), vec!["(I)V"]);
    }
}

#[test]
fn widening_beats_boxing() {
    let methods = "static void m(Integer x) { } static void m(long x) { }";
    assert_eq!(chosen(methods, "m(1)"), vec!["(J)V"]);
    let methods = "static void m(long x) { } static void m(Integer x) { }";
    assert_eq!(chosen(methods, "m(1)"), vec!["(J)V"]);
}

#[test]
fn boxing_beats_varargs() {
    let methods = "static void m(int... xs) { } static void m(Object o) { }";
    assert_eq!(chosen(methods, "m(1)"), vec!["(Ljava/lang/Object;)V"]);
    assert_eq!(chosen(methods, "m()"), vec!["([I)V"]);
    assert_eq!(chosen(methods, "m(1, 2)"), vec!["([I)V"]);
}

#[test]
fn subclass_parameter_is_more_specific() {
    let source = "class A {
        static class B { }
        static class C extends B { }
        static void m(B b) { }
        static void m(C c) { }
        static void t() { m(new C()); m(new B()); }
    }";
    let classes = compile_ok(source);
    let class = parse(&classes, "A");
    assert!(has_ref(&class, "A.m:(LA$C;)V"));
    assert!(has_ref(&class, "A.m:(LA$B;)V"));
}

#[test]
fn crossed_parameters_are_ambiguous() {
    let source = "class A {
        static void m(int a, long b) { }
        static void m(long a, int b) { }
        static void t() { m(1, 2); }
    }";
    let err = err_contains(source, "reference to m is ambiguous");
    match err {
        Error::Semantic { candidates, .. } => assert_eq!(candidates.len(), 2),
        other => panic!("expected a semantic error, got {:?}", other),
    }
}

#[test]
fn boxed_crossed_parameters_are_ambiguous() {
    err_contains(
        "class A { static void m(Integer a, Object b) { } static void m(Object a, Integer b) { } static void t() { m(1, 1); } }",
        "is ambiguous",
    );
}

#[test]
fn no_applicable_method() {
    err_contains(
        "class A { static void m(String s) { } static void t() { m(1); } }",
        "cannot be applied to given types",
    );
}

#[test]
fn inherited_and_declared_overloads_combine() {
    let source = "class A {
        static class P { void m(Object o) { } }
        static class Q extends P { void m(String s) { } }
        static void t(Q q) { q.m(\"s\"); q.m(1); }
    }";
    let classes = compile_ok(source);
    let class = parse(&classes, "A");
    assert!(has_ref(&class, "A$Q.m:(Ljava/lang/String;)V"));
    assert!(has_ref(&class, "A$Q.m:(Ljava/lang/Object;)V"));
}
