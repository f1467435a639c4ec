mod common;

use common::{expression, first_constant, method_code, parse};
use jembed::common::ConstValue;

/// Compile `literal` as the body of `static <ty> eval()` and return the
/// constant it loads
fn returned(literal: &str, ty: &str) -> ConstValue {
    let classes = expression(literal, ty);
    let class = parse(&classes, "SC");
    let code = method_code(&class, "eval");
    first_constant(&class, &code)
}

#[test]
fn int_literals_in_every_radix() {
    let cases = [
        ("0", 0),
        ("7", 7),
        ("-1", -1),
        ("127", 127),
        ("-129", -129),
        ("32767", 32767),
        ("100000", 100000),
        ("0x7fffffff", i32::MAX),
        ("0xFFFFFFFF", -1),
        ("017", 15),
        ("0b1010", 10),
        ("1_000_000", 1_000_000),
        ("-2147483648", i32::MIN),
    ];
    for (literal, expected) in cases {
        assert_eq!(returned(literal, "int"), ConstValue::Int(expected), "{}", literal);
    }
}

#[test]
fn long_literals() {
    assert_eq!(returned("0L", "long"), ConstValue::Long(0));
    assert_eq!(returned("1L", "long"), ConstValue::Long(1));
    assert_eq!(returned("123456789012L", "long"), ConstValue::Long(123_456_789_012));
    assert_eq!(returned("-9223372036854775808L", "long"), ConstValue::Long(i64::MIN));
    assert_eq!(returned("0x7fffffffffffffffL", "long"), ConstValue::Long(i64::MAX));
}

#[test]
fn floating_literals() {
    assert_eq!(returned("1.5f", "float"), ConstValue::Float(1.5));
    assert_eq!(returned("2f", "float"), ConstValue::Float(2.0));
    assert_eq!(returned("0.1", "double"), ConstValue::Double(0.1));
    assert_eq!(returned("1e10", "double"), ConstValue::Double(1e10));
    assert_eq!(returned(".5", "double"), ConstValue::Double(0.5));
    assert_eq!(returned("0x1.8p1", "double"), ConstValue::Double(3.0));
    assert_eq!(returned("3.25d", "double"), ConstValue::Double(3.25));
}

#[test]
fn char_and_boolean_literals_load_as_ints() {
    assert_eq!(returned("'a'", "char").as_int(), Some(97));
    assert_eq!(returned("'\\n'", "char").as_int(), Some(10));
    assert_eq!(returned("'\\u0041'", "char").as_int(), Some(65));
    assert_eq!(returned("'\\377'", "char").as_int(), Some(255));
    assert_eq!(returned("true", "boolean").as_int(), Some(1));
    assert_eq!(returned("false", "boolean").as_int(), Some(0));
}

#[test]
fn string_literals_with_escapes() {
    assert_eq!(returned("\"hello\"", "String"), ConstValue::String("hello".into()));
    assert_eq!(returned("\"a\\tb\\n\"", "String"), ConstValue::String("a\tb\n".into()));
    assert_eq!(returned("\"\\\"q\\\"\"", "String"), ConstValue::String("\"q\"".into()));
    assert_eq!(returned("\"\\u00e9t\\u00e9\"", "String"), ConstValue::String("été".into()));
}

#[test]
fn constant_expressions_are_folded() {
    assert_eq!(returned("1 + 2 * 3", "int"), ConstValue::Int(7));
    assert_eq!(returned("Integer.MAX_VALUE + 1", "int"), ConstValue::Int(i32::MIN));
    assert_eq!(returned("\"a\" + 1 + 'b'", "String"), ConstValue::String("a1b".into()));
    assert_eq!(returned("(byte) 300", "int"), ConstValue::Int(44));
    assert_eq!(returned("1 << 33", "int"), ConstValue::Int(2));
    assert_eq!(returned("7 / 2 + 7 % -3", "int"), ConstValue::Int(4));
}

#[test]
fn boxed_result_calls_value_of() {
    let classes = expression("7", "Object");
    let class = parse(&classes, "SC");
    assert!(common::has_ref(&class, "java/lang/Integer.valueOf:(I)Ljava/lang/Integer;"));
    assert_eq!(first_constant(&class, &method_code(&class, "eval")), ConstValue::Int(7));
}
