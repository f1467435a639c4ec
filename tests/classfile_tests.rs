mod common;

use common::{compile_ok, compile_with, method_code, opcodes, parse};
use jembed::common::classfile_reader::PoolEntry;
use jembed::{Compiler, Config, ExpressionCompiler};

const SOURCE: &str = r#"
package demo;

import java.util.List;

public class Shapes implements Comparable {
    public static final int SIDES = 4;
    public static final String NAME = "shapes";
    private double width;
    protected long[] history = new long[3];
    static List cache;

    public Shapes(double width) {
        this.width = width;
    }

    public double area() {
        return width * width;
    }

    public int compareTo(Object other) {
        Shapes that = (Shapes) other;
        return Double.compare(width, that.width);
    }

    static int sum(int... values) {
        int total = 0;
        for (int v : values) {
            total += v;
        }
        return total;
    }
}
"#;

#[test]
fn output_starts_with_magic_and_version() {
    let classes = compile_ok(SOURCE);
    let bytes = &classes["demo.Shapes"];
    assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    let minor = u16::from_be_bytes([bytes[4], bytes[5]]);
    let major = u16::from_be_bytes([bytes[6], bytes[7]]);
    assert_eq!((minor, major), (0, 52));
}

#[test]
fn reparsed_class_has_the_declared_shape() {
    let classes = compile_ok(SOURCE);
    let class = parse(&classes, "demo.Shapes");
    assert_eq!(class.this_class, "demo/Shapes");
    assert_eq!(class.super_class.as_deref(), Some("java/lang/Object"));
    assert_eq!(class.interfaces, vec!["java/lang/Comparable".to_string()]);

    let fields: Vec<(&str, &str)> = class.fields.iter().map(|f| (f.name.as_str(), f.descriptor.as_str())).collect();
    assert_eq!(
        fields,
        vec![
            ("SIDES", "I"),
            ("NAME", "Ljava/lang/String;"),
            ("width", "D"),
            ("history", "[J"),
            ("cache", "Ljava/util/List;"),
        ]
    );

    let methods: Vec<(&str, &str)> = class.methods.iter().map(|m| (m.name.as_str(), m.descriptor.as_str())).collect();
    assert_eq!(
        methods,
        vec![
            ("<init>", "(D)V"),
            ("area", "()D"),
            ("compareTo", "(Ljava/lang/Object;)I"),
            ("sum", "([I)I"),
        ]
    );
    let sum = class.method("sum").unwrap();
    assert_ne!(sum.access & 0x0080, 0, "varargs flag");
    assert_ne!(sum.access & 0x0008, 0, "static flag");
}

#[test]
fn constant_fields_carry_constant_value() {
    let classes = compile_ok(SOURCE);
    let binary = jembed::common::classfile_reader::read_binary_class(&classes["demo.Shapes"]).unwrap();
    let sides = binary.fields.iter().find(|f| f.name == "SIDES").unwrap();
    assert_eq!(sides.constant, Some(jembed::common::ConstValue::Int(4)));
    let name = binary.fields.iter().find(|f| f.name == "NAME").unwrap();
    assert_eq!(name.constant, Some(jembed::common::ConstValue::String("shapes".into())));
    let width = binary.fields.iter().find(|f| f.name == "width").unwrap();
    assert_eq!(width.constant, None);
}

#[test]
fn constant_pool_has_no_duplicates() {
    let classes = compile_ok(SOURCE);
    let class = parse(&classes, "demo.Shapes");
    let mut seen = std::collections::HashSet::new();
    for entry in &class.constant_pool {
        if let PoolEntry::Utf8(text) = entry {
            assert!(seen.insert(text.clone()), "duplicate constant {}", text);
        }
    }
}

#[test]
fn expression_seven_is_one_small_class() {
    for config in [Config::default(), Config::default().with_no_debug()] {
        let classes = ExpressionCompiler::new(Compiler::new(config)).compile("7").unwrap();
        assert_eq!(classes.len(), 1);
        let bytes = &classes["SC"];
        assert!(bytes.len() > 200 && bytes.len() < 300, "{} bytes", bytes.len());
        let class = parse(&classes, "SC");
        let eval = class.method("eval").unwrap();
        assert_eq!(eval.descriptor, "()Ljava/lang/Object;");
        assert_eq!(eval.access, 0x0001 | 0x0008);
    }
}

#[test]
fn branches_get_stack_maps() {
    let classes = compile_ok("class A { static int abs(int x) { return x < 0 ? -x : x; } }");
    let class = parse(&classes, "A");
    let code = method_code(&class, "abs");
    assert!(code.attribute("StackMapTable").is_some());
    assert_eq!(opcodes(&code), vec![0x1a, 0x9c, 0x1a, 0x74, 0xa7, 0x1a, 0xac]);
}

#[test]
fn old_targets_have_no_stack_maps() {
    let config = Config::default().with_target_version(49);
    let classes = compile_with("class A { static int abs(int x) { return x < 0 ? -x : x; } }", &config);
    let class = parse(&classes, "A");
    assert_eq!(class.major_version, 49);
    assert!(method_code(&class, "abs").attribute("StackMapTable").is_none());
}

#[test]
fn debug_attributes_follow_config() {
    let source = "class A { int f(int a) { int b = a + 1;\n return b; } }";
    let plain = parse(&compile_with(source, &Config::default().with_no_debug()), "A");
    let code = method_code(&plain, "f");
    assert!(code.attribute("LineNumberTable").is_none());
    assert!(code.attribute("LocalVariableTable").is_none());
    assert!(plain.attribute("SourceFile").is_none());

    let full = parse(&compile_with(source, &Config::default().with_full_debug()), "A");
    let code = method_code(&full, "f");
    assert!(code.attribute("LineNumberTable").is_some());
    assert!(code.attribute("LocalVariableTable").is_some());
}

#[test]
fn source_file_is_recorded_for_named_units() {
    let compiler = jembed::SimpleCompiler::new(Compiler::new(Config::default()));
    let classes = compiler.compile_all(&[(Some("src/p/A.java"), "package p; class A { }")]).unwrap();
    let class = parse(&classes, "p.A");
    let raw = class.attribute("SourceFile").unwrap();
    let index = u16::from_be_bytes([raw.data[0], raw.data[1]]);
    assert_eq!(class.utf8(index).unwrap(), "A.java");
}
