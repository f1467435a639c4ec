mod common;

use common::{compile_ok, has_ref, method_code, opcodes, parse};

const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;
const GOTO_W: u8 = 0xc8;
const MONITORENTER: u8 = 0xc2;
const MONITOREXIT: u8 = 0xc3;

#[test]
fn dense_switch_uses_tableswitch() {
    let classes = compile_ok(
        "class A { int f(int x) { switch (x) { case 1: return 10; case 2: return 20; case 3: return 30; case 4: return 40; default: return 0; } } }",
    );
    let class = parse(&classes, "A");
    let ops = opcodes(&method_code(&class, "f"));
    assert!(ops.contains(&TABLESWITCH));
    assert!(!ops.contains(&LOOKUPSWITCH));
}

#[test]
fn sparse_switch_uses_lookupswitch() {
    let classes = compile_ok(
        "class A { int f(int x) { switch (x) { case 1: return 1; case 1000: return 2; case 1000000: return 3; } return 0; } }",
    );
    let class = parse(&classes, "A");
    let ops = opcodes(&method_code(&class, "f"));
    assert!(ops.contains(&LOOKUPSWITCH));
    assert!(!ops.contains(&TABLESWITCH));
}

#[test]
fn string_switch_dispatches_on_hash_code() {
    let classes = compile_ok(
        "class A { int f(String s) { switch (s) { case \"Aa\": return 1; case \"BB\": return 2; case \"c\": return 3; default: return 0; } } }",
    );
    let class = parse(&classes, "A");
    assert!(has_ref(&class, "java/lang/String.hashCode:()I"));
    assert!(has_ref(&class, "java/lang/String.equals:(Ljava/lang/Object;)Z"));
}

#[test]
fn boxed_switch_selector_is_unboxed() {
    let classes = compile_ok("class A { int f(Integer x) { switch (x) { case 1: return 1; default: return 0; } } }");
    let class = parse(&classes, "A");
    assert!(has_ref(&class, "java/lang/Integer.intValue:()I"));
}

#[test]
fn finally_runs_on_every_exit() {
    let classes = compile_ok(
        "class A { int n; int f(int x) { try { if (x > 0) return 1; n = 2; } catch (RuntimeException e) { n = 3; } finally { n++; } return 0; } }",
    );
    let class = parse(&classes, "A");
    let code = method_code(&class, "f");
    // catch clause plus catch-all handlers for the body and the catch clause
    assert!(code.exception_table.len() >= 3, "{:?}", code.exception_table);
    let any = code.exception_table.iter().filter(|e| e.catch_type == 0).count();
    assert!(any >= 2);
    // the finalizer is inlined on the return path, the normal path, after
    // the catch clause and in the catch-all handler
    let putfields = opcodes(&code).iter().filter(|&&op| op == 0xb5).count();
    assert_eq!(putfields, 2 + 4);
}

#[test]
fn synchronized_releases_the_monitor_on_every_exit() {
    let classes = compile_ok("class A { int n; void f(Object lock) { synchronized (lock) { n++; } } }");
    let class = parse(&classes, "A");
    let code = method_code(&class, "f");
    let ops = opcodes(&code);
    assert_eq!(ops.iter().filter(|&&op| op == MONITORENTER).count(), 1);
    assert_eq!(ops.iter().filter(|&&op| op == MONITOREXIT).count(), 2);
    assert!(code.exception_table.iter().any(|e| e.catch_type == 0));
}

#[test]
fn long_jumps_are_widened() {
    let mut body = String::new();
    for i in 0..4000 {
        body.push_str(&format!("n += {};\n", i % 7));
    }
    let source = format!("class A {{ int n; void f(boolean b) {{ if (b) {{\n{}}} }} }}", body);
    let classes = compile_ok(&source);
    let class = parse(&classes, "A");
    let code = method_code(&class, "f");
    assert!(code.code.len() > 32767);
    assert!(opcodes(&code).contains(&GOTO_W));
}

#[test]
fn inner_class_keeps_its_outer_instance() {
    let classes = compile_ok(
        "class Outer { private int secret = 7; class Inner { int peek() { return secret; } } Inner make() { return new Inner(); } }",
    );
    assert_eq!(classes.keys().collect::<Vec<_>>(), vec!["Outer", "Outer$Inner"]);
    let inner = parse(&classes, "Outer$Inner");
    assert!(inner.field("this$0").is_some());
    assert_eq!(inner.method("<init>").unwrap().descriptor, "(LOuter;)V");

    // private field read through a synthetic accessor
    let outer = parse(&classes, "Outer");
    let accessor = outer
        .methods
        .iter()
        .find(|m| m.name.starts_with("access$"))
        .expect("no accessor generated");
    assert_eq!(accessor.descriptor, "(LOuter;)I");
    assert_ne!(accessor.access & 0x1000, 0, "accessor must be synthetic");
    assert!(has_ref(&inner, &format!("Outer.{}:(LOuter;)I", accessor.name)));

    for class in [&outer, &inner] {
        assert!(class.attribute("InnerClasses").is_some());
    }
}

#[test]
fn anonymous_class_captures_final_locals() {
    let classes = compile_ok(
        "class A { Runnable f(final String msg) { return new Runnable() { public void run() { System.out.println(msg); } }; } }",
    );
    assert!(classes.contains_key("A$1"));
    let anon = parse(&classes, "A$1");
    assert!(anon.field("val$msg").is_some());
    assert!(anon.field("this$0").is_some());
    assert_eq!(anon.method("<init>").unwrap().descriptor, "(LA;Ljava/lang/String;)V");
    assert_eq!(anon.interfaces, vec!["java/lang/Runnable".to_string()]);
}

#[test]
fn local_class_names_are_numbered() {
    let classes = compile_ok(
        "class A { void f() { class Helper { } new Helper(); } void g() { class Helper { } new Helper(); } }",
    );
    assert!(classes.contains_key("A$1Helper"));
    assert!(classes.contains_key("A$2Helper"));
}

#[test]
fn static_initializer_and_constant_fields() {
    let classes = compile_ok(
        "class A { static final int K = 3; static final int[] TABLE = { K, K * 2 }; static int count; static { count = TABLE.length; } }",
    );
    let class = parse(&classes, "A");
    assert!(class.method("<clinit>").is_some());
    let code = method_code(&class, "<clinit>");
    // K is inlined, never read from the field
    assert!(!has_ref(&class, "A.K:I"));
    assert!(opcodes(&code).contains(&0xbc), "newarray");
}

#[test]
fn instance_initializers_run_in_super_calling_constructors() {
    let classes = compile_ok(
        "class A { int x = 5; A() { this(1); } A(int y) { x += y; } }",
    );
    let class = parse(&classes, "A");
    let ctors: Vec<_> = class.methods.iter().filter(|m| m.name == "<init>").collect();
    assert_eq!(ctors.len(), 2);
    let delegating = ctors.iter().find(|m| m.descriptor == "()V").unwrap();
    let primary = ctors.iter().find(|m| m.descriptor == "(I)V").unwrap();
    let count_bipush = |m: &jembed::common::classfile_reader::RawMember| {
        let code = class.code(m).unwrap().unwrap();
        opcodes(&code).iter().filter(|&&op| op == 0x08).count()
    };
    // `iconst_5` only appears where the field initializer is copied
    assert_eq!(count_bipush(primary), 1);
    assert_eq!(count_bipush(delegating), 0);
}

#[test]
fn string_concatenation_uses_string_builder() {
    let classes = compile_ok("class A { String f(int n, Object o) { return \"n=\" + n + o; } }");
    let class = parse(&classes, "A");
    assert!(has_ref(&class, "java/lang/StringBuilder.<init>:()V"));
    assert!(has_ref(&class, "java/lang/StringBuilder.append:(Ljava/lang/String;)Ljava/lang/StringBuilder;"));
    assert!(has_ref(&class, "java/lang/StringBuilder.append:(I)Ljava/lang/StringBuilder;"));
    assert!(has_ref(&class, "java/lang/StringBuilder.append:(Ljava/lang/Object;)Ljava/lang/StringBuilder;"));
    assert!(has_ref(&class, "java/lang/StringBuilder.toString:()Ljava/lang/String;"));
}

#[test]
fn increments_use_iinc_on_int_locals() {
    let classes = compile_ok("class A { int f() { int i = 0; i++; i += 5; i -= 3; return i; } }");
    let class = parse(&classes, "A");
    let ops = opcodes(&method_code(&class, "f"));
    assert_eq!(ops.iter().filter(|&&op| op == 0x84).count(), 3);
}

#[test]
fn foreach_over_iterable_uses_iterator() {
    let classes = compile_ok(
        "import java.util.List; class A { int f(List items) { int n = 0; for (Object o : items) { n++; } return n; } }",
    );
    let class = parse(&classes, "A");
    assert!(has_ref(&class, "java/lang/Iterable.iterator:()Ljava/util/Iterator;"));
    assert!(has_ref(&class, "java/util/Iterator.hasNext:()Z"));
    assert!(has_ref(&class, "java/util/Iterator.next:()Ljava/lang/Object;"));
}
