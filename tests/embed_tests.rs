mod common;

use common::{has_ref, method_code, opcodes, parse};
use jembed::common::{DirectoryClassPath, TypeCache};
use jembed::{ClassBodyCompiler, Compiler, Config, ExpressionCompiler, ScriptCompiler, SimpleCompiler};

fn compiler() -> Compiler {
    Compiler::new(Config::default())
}

#[test]
fn expression_with_parameters_and_return_type() {
    let classes = ExpressionCompiler::new(compiler())
        .class_name("calc.Expr")
        .method_name("apply")
        .return_type("long")
        .parameter("int", "a")
        .parameter("long", "b")
        .compile("a * b + 1")
        .unwrap();
    let class = parse(&classes, "calc.Expr");
    let apply = class.method("apply").unwrap();
    assert_eq!(apply.descriptor, "(IJ)J");
    let code = method_code(&class, "apply");
    // iload_0 i2l lload_1 lmul lconst_1 ladd lreturn
    assert_eq!(opcodes(&code), vec![0x1a, 0x85, 0x1f, 0x69, 0x0a, 0x61, 0xad]);
}

#[test]
fn expression_can_use_imports() {
    let classes = ExpressionCompiler::new(compiler())
        .import("java.util.*")
        .return_type("int")
        .parameter("List", "items")
        .compile("items.size()")
        .unwrap();
    let class = parse(&classes, "SC");
    assert!(has_ref(&class, "java/util/List.size:()I"));
}

#[test]
fn script_defaults_to_void_method() {
    let classes = ScriptCompiler::new(compiler())
        .compile("int x = 1;\nfor (int i = 0; i < 3; i++) { x *= 2; }\nSystem.out.println(x);")
        .unwrap();
    let class = parse(&classes, "SC");
    assert_eq!(class.method("eval").unwrap().descriptor, "()V");
    assert!(has_ref(&class, "java/io/PrintStream.println:(I)V"));
}

#[test]
fn script_with_return_value() {
    let classes = ScriptCompiler::new(compiler())
        .return_type("String")
        .parameter("String[]", "args")
        .compile("if (args.length == 0) return \"none\"; return args[0];")
        .unwrap();
    let class = parse(&classes, "SC");
    assert_eq!(class.method("eval").unwrap().descriptor, "([Ljava/lang/String;)Ljava/lang/String;");
}

#[test]
fn script_missing_return_is_rejected() {
    let err = ScriptCompiler::new(compiler()).return_type("int").compile("int x = 1;").unwrap_err();
    assert!(err.to_string().contains("missing return statement"), "{}", err);
}

#[test]
fn class_body_with_supertypes() {
    let classes = ClassBodyCompiler::new(compiler())
        .class_name("pkg.Task")
        .implements("Runnable")
        .compile("private int runs;\npublic void run() { runs++; }\npublic int runs() { return runs; }")
        .unwrap();
    let class = parse(&classes, "pkg.Task");
    assert_eq!(class.interfaces, vec!["java/lang/Runnable".to_string()]);
    assert!(class.method("<init>").is_some());
    assert!(class.method("run").is_some());
}

#[test]
fn class_body_constructor_uses_the_wrapper_name() {
    let classes = ClassBodyCompiler::new(compiler())
        .class_name("Counter")
        .compile("int start; Counter(int start) { this.start = start; }")
        .unwrap();
    let class = parse(&classes, "Counter");
    assert_eq!(class.method("<init>").unwrap().descriptor, "(I)V");
}

#[test]
fn simple_compiler_batches_mutually_referencing_units() {
    let compiler = SimpleCompiler::new(compiler());
    let classes = compiler
        .compile_all(&[
            (Some("A.java"), "package p; public class A { B b; int f() { return b.g(); } }"),
            (Some("B.java"), "package p; public class B { A a; int g() { return 1; } }"),
        ])
        .unwrap();
    assert_eq!(classes.keys().collect::<Vec<_>>(), vec!["p.A", "p.B"]);
}

#[test]
fn later_batches_see_earlier_output() {
    let mut compiler = SimpleCompiler::new(compiler());
    let first = compiler.compile("package lib; public class Util { public static int twice(int x) { return x * 2; } }").unwrap();
    compiler.compiler_mut().add_classes(&first);
    let second = ExpressionCompiler::new(compiler.compiler().clone())
        .return_type("int")
        .compile("lib.Util.twice(21)")
        .unwrap();
    let class = parse(&second, "SC");
    assert!(has_ref(&class, "lib/Util.twice:(I)I"));
}

#[test]
fn directory_class_path_supplies_external_types() {
    let dir = tempfile::tempdir().unwrap();
    let lib = jembed::compile("package ext; public class Point { public int x; public Point(int x) { this.x = x; } }", &Config::default()).unwrap();
    jembed::write_classes(&lib, dir.path()).unwrap();

    let chain = jembed::common::ClassPathChain::new()
        .with(jembed::common::BootstrapClassPath)
        .with(DirectoryClassPath::new(dir.path()));
    let compiler = Compiler::with_class_path(Config::default(), TypeCache::new(), chain);
    let classes = ExpressionCompiler::new(compiler)
        .return_type("int")
        .compile("new ext.Point(3).x")
        .unwrap();
    let class = parse(&classes, "SC");
    assert!(has_ref(&class, "ext/Point.<init>:(I)V"));
    assert!(has_ref(&class, "ext/Point.x:I"));
}

#[test]
fn unknown_external_type_is_a_semantic_error() {
    let err = ExpressionCompiler::new(compiler()).compile("new no.such.Type()").unwrap_err();
    assert_eq!(err.kind(), jembed::DiagnosticKind::Semantic);
}
