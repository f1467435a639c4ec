// Shared helpers for the integration tests
#![allow(dead_code)]

use jembed::common::classfile_reader::{CodeAttribute, ParsedClass, PoolEntry};
use jembed::common::ConstValue;
use jembed::{ClassMap, Compiler, Config, Error, ExpressionCompiler};

/// Compile one unit with default options, panicking with the error
pub fn compile_ok(source: &str) -> ClassMap {
    compile_with(source, &Config::default())
}

pub fn compile_with(source: &str, config: &Config) -> ClassMap {
    match jembed::compile(source, config) {
        Ok(classes) => classes,
        Err(e) => panic!("compilation failed: {}\n--- source ---\n{}", e, source),
    }
}

pub fn compile_err(source: &str) -> Error {
    match jembed::compile(source, &Config::default()) {
        Ok(classes) => panic!("expected an error, got classes {:?}", classes.keys().collect::<Vec<_>>()),
        Err(e) => e,
    }
}

/// Compile expecting an error whose message contains `needle`
pub fn err_contains(source: &str, needle: &str) -> Error {
    let err = compile_err(source);
    assert!(
        err.to_string().contains(needle),
        "error `{}` does not mention `{}`",
        err,
        needle
    );
    err
}

/// Compile an expression into `static <ret> eval()` of class `SC`
pub fn expression(expr: &str, return_type: &str) -> ClassMap {
    ExpressionCompiler::new(Compiler::new(Config::default()))
        .return_type(return_type)
        .compile(expr)
        .unwrap_or_else(|e| panic!("`{}` failed: {}", expr, e))
}

pub fn parse(classes: &ClassMap, name: &str) -> ParsedClass {
    let bytes = classes
        .get(name)
        .unwrap_or_else(|| panic!("no class {} in {:?}", name, classes.keys().collect::<Vec<_>>()));
    ParsedClass::parse(bytes).expect("generated class does not parse")
}

pub fn method_code(class: &ParsedClass, method: &str) -> CodeAttribute {
    let raw = class.method(method).unwrap_or_else(|| panic!("no method {}", method));
    class.code(raw).expect("bad Code attribute").expect("method has no code")
}

/// Length of the instruction at `pc`
fn instruction_length(code: &[u8], pc: usize) -> usize {
    let int_at = |at: usize| i32::from_be_bytes([code[at], code[at + 1], code[at + 2], code[at + 3]]);
    match code[pc] {
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 2,
        0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xa8 | 0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1 | 0xc6 | 0xc7 => 3,
        0xc5 => 4,
        0xb9 | 0xba | 0xc8 | 0xc9 => 5,
        0xc4 => {
            if code[pc + 1] == 0x84 {
                6
            } else {
                4
            }
        }
        0xaa => {
            let base = (pc + 4) & !3;
            let low = int_at(base + 4);
            let high = int_at(base + 8);
            base + 12 + 4 * (high - low + 1) as usize - pc
        }
        0xab => {
            let base = (pc + 4) & !3;
            let pairs = int_at(base + 4);
            base + 8 + 8 * pairs as usize - pc
        }
        _ => 1,
    }
}

/// Opcodes of a method body in order, operands skipped
pub fn opcodes(code: &CodeAttribute) -> Vec<u8> {
    let bytes = &code.code;
    let mut ops = Vec::new();
    let mut pc = 0;
    while pc < bytes.len() {
        ops.push(bytes[pc]);
        pc += instruction_length(bytes, pc);
    }
    ops
}

/// Every method and field reference in the pool as `owner.name:descriptor`
pub fn member_refs(class: &ParsedClass) -> Vec<String> {
    let mut refs = Vec::new();
    for entry in &class.constant_pool {
        if let PoolEntry::Fieldref(owner, nat) | PoolEntry::Methodref(owner, nat) | PoolEntry::InterfaceMethodref(owner, nat) =
            entry
        {
            if let Some(PoolEntry::NameAndType(name, descriptor)) = class.entry(*nat) {
                refs.push(format!(
                    "{}.{}:{}",
                    class.class_name(*owner).unwrap(),
                    class.utf8(*name).unwrap(),
                    class.utf8(*descriptor).unwrap()
                ));
            }
        }
    }
    refs
}

pub fn has_ref(class: &ParsedClass, member: &str) -> bool {
    member_refs(class).iter().any(|r| r == member)
}

/// The constant loaded by the first instruction of `code`
pub fn first_constant(class: &ParsedClass, code: &CodeAttribute) -> ConstValue {
    let c = &code.code;
    match c[0] {
        0x01 => panic!("aconst_null pushes no constant"),
        op @ 0x02..=0x08 => ConstValue::Int(op as i32 - 3),
        op @ 0x09..=0x0a => ConstValue::Long(op as i64 - 0x09),
        op @ 0x0b..=0x0d => ConstValue::Float((op - 0x0b) as f32),
        op @ 0x0e..=0x0f => ConstValue::Double((op - 0x0e) as f64),
        0x10 => ConstValue::Int(c[1] as i8 as i32),
        0x11 => ConstValue::Int(i16::from_be_bytes([c[1], c[2]]) as i32),
        0x12 => class.constant_value(c[1] as u16).unwrap(),
        0x13 | 0x14 => class.constant_value(u16::from_be_bytes([c[1], c[2]])).unwrap(),
        op => panic!("instruction 0x{:02x} does not push a constant", op),
    }
}
