//! Member-level data of the type model.
//!
//! [`BinaryClass`] is the arena-independent form of an external class as
//! read from a class file or the bootstrap table; it is what the shared
//! [`TypeCache`](crate::common::cache::TypeCache) stores. [`ClassData`] is
//! the per-batch form with every type interned as a [`TypeId`], produced
//! either from a `BinaryClass` or from a source declaration.

use std::fmt;
use std::sync::Arc;

use crate::codegen::defs::access_flags::*;
use crate::common::types::{PrimitiveType, TypeId};

/// A compile-time constant value
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Boolean(bool),
    Char(u16),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl ConstValue {
    /// Primitive type of the value, `None` for strings
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        Some(match self {
            ConstValue::Boolean(_) => PrimitiveType::Boolean,
            ConstValue::Char(_) => PrimitiveType::Char,
            ConstValue::Byte(_) => PrimitiveType::Byte,
            ConstValue::Short(_) => PrimitiveType::Short,
            ConstValue::Int(_) => PrimitiveType::Int,
            ConstValue::Long(_) => PrimitiveType::Long,
            ConstValue::Float(_) => PrimitiveType::Float,
            ConstValue::Double(_) => PrimitiveType::Double,
            ConstValue::String(_) => return None,
        })
    }

    /// Value of an int-like constant (boolean counts as 0/1)
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            ConstValue::Boolean(b) => Some(b as i32),
            ConstValue::Char(c) => Some(c as i32),
            ConstValue::Byte(b) => Some(b as i32),
            ConstValue::Short(s) => Some(s as i32),
            ConstValue::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match *self {
            ConstValue::Long(l) => Some(l),
            ConstValue::Float(_) | ConstValue::Double(_) | ConstValue::String(_) => None,
            ref other => other.as_int().map(i64::from),
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self {
            ConstValue::Double(d) => Some(d),
            ConstValue::Float(f) => Some(f as f64),
            ConstValue::Long(l) => Some(l as f64),
            ConstValue::String(_) | ConstValue::Boolean(_) => None,
            ref other => other.as_int().map(f64::from),
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match *self {
            ConstValue::Float(f) => Some(f),
            ConstValue::Double(d) => Some(d as f32),
            ConstValue::Long(l) => Some(l as f32),
            ConstValue::String(_) | ConstValue::Boolean(_) => None,
            ref other => other.as_int().map(|i| i as f32),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ConstValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Primitive conversion (widening or narrowing) of a numeric constant.
    /// Float-to-integer conversion saturates and maps NaN to zero.
    pub fn convert_to(&self, target: PrimitiveType) -> Option<ConstValue> {
        if let ConstValue::Boolean(b) = self {
            return (target == PrimitiveType::Boolean).then_some(ConstValue::Boolean(*b));
        }
        if target == PrimitiveType::Boolean || matches!(self, ConstValue::String(_)) {
            return None;
        }
        let value = match self {
            ConstValue::Float(_) | ConstValue::Double(_) => {
                let d = self.as_double()?;
                match target {
                    PrimitiveType::Float => ConstValue::Float(self.as_float()?),
                    PrimitiveType::Double => ConstValue::Double(d),
                    PrimitiveType::Long => ConstValue::Long(d as i64),
                    // d2i first, then narrow like i2b / i2c / i2s
                    _ => return ConstValue::Int(d as i32).convert_to(target),
                }
            }
            _ => {
                let l = self.as_long()?;
                match target {
                    PrimitiveType::Byte => ConstValue::Byte(l as i8),
                    PrimitiveType::Short => ConstValue::Short(l as i16),
                    PrimitiveType::Char => ConstValue::Char(l as u16),
                    PrimitiveType::Int => ConstValue::Int(l as i32),
                    PrimitiveType::Long => ConstValue::Long(l),
                    PrimitiveType::Float => ConstValue::Float(l as f32),
                    PrimitiveType::Double => ConstValue::Double(l as f64),
                    PrimitiveType::Boolean | PrimitiveType::Void => return None,
                }
            }
        };
        Some(value)
    }

    /// The text `String.valueOf` would produce for this constant.
    pub fn to_java_string(&self) -> String {
        match self {
            ConstValue::Boolean(b) => b.to_string(),
            ConstValue::Char(c) => String::from_utf16_lossy(&[*c]),
            ConstValue::Byte(v) => v.to_string(),
            ConstValue::Short(v) => v.to_string(),
            ConstValue::Int(v) => v.to_string(),
            ConstValue::Long(v) => v.to_string(),
            ConstValue::Float(v) => java_float_text(*v as f64, format!("{}", v), format!("{:e}", v)),
            ConstValue::Double(v) => java_float_text(*v, format!("{}", v), format!("{:e}", v)),
            ConstValue::String(s) => s.clone(),
        }
    }
}

/// Java's `Double.toString` layout: plain between 1e-3 and 1e7, otherwise
/// computerized scientific notation, always with a fractional digit.
fn java_float_text(value: f64, plain: String, scientific: String) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = value.abs();
    if value == 0.0 || (1e-3..1e7).contains(&magnitude) {
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
        if mantissa.contains('.') {
            format!("{}E{}", mantissa, exponent)
        } else {
            format!("{}.0E{}", mantissa, exponent)
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::String(s) => write!(f, "{:?}", s),
            other => f.write_str(&other.to_java_string()),
        }
    }
}

/// Field of an external class
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryField {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub constant: Option<ConstValue>,
}

/// Method or constructor of an external class
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMethod {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    /// Internal names from the `Exceptions` attribute
    pub exceptions: Vec<String>,
}

/// One row of an `InnerClasses` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner: String,
    pub outer: Option<String>,
    pub simple_name: Option<String>,
    pub access: u16,
}

/// An external class in arena-independent form
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryClass {
    /// Internal name, e.g. `java/util/Map$Entry`
    pub name: String,
    pub access: u16,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<BinaryField>,
    pub methods: Vec<BinaryMethod>,
    pub inner_classes: Vec<InnerClassEntry>,
}

impl BinaryClass {
    pub fn is_interface(&self) -> bool {
        self.access & ACC_INTERFACE != 0
    }

    /// The row describing this class itself, if it is a nested class
    pub fn own_inner_entry(&self) -> Option<&InnerClassEntry> {
        self.inner_classes.iter().find(|e| e.inner == self.name)
    }

    /// Member classes declared directly in this class: (simple name, internal name)
    pub fn member_classes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner_classes.iter().filter_map(move |e| match (&e.outer, &e.simple_name) {
            (Some(outer), Some(simple)) if *outer == self.name => Some((simple.as_str(), e.inner.as_str())),
            _ => None,
        })
    }
}

/// Where a class in the arena came from
#[derive(Debug, Clone)]
pub enum ClassOrigin {
    /// Declared in the batch being compiled
    Source,
    Binary(Arc<BinaryClass>),
}

#[derive(Debug, Clone)]
pub struct FieldData {
    pub name: String,
    pub owner: TypeId,
    pub ty: TypeId,
    pub access: u16,
    pub constant: Option<ConstValue>,
}

impl FieldData {
    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }

    pub fn is_final(&self) -> bool {
        self.access & ACC_FINAL != 0
    }

    pub fn is_private(&self) -> bool {
        self.access & ACC_PRIVATE != 0
    }
}

#[derive(Debug, Clone)]
pub struct MethodData {
    pub name: String,
    pub owner: TypeId,
    /// Declared parameters; synthetic outer-instance parameters of inner
    /// class constructors are not included
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    pub throws: Vec<TypeId>,
    pub access: u16,
}

impl MethodData {
    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & ACC_ABSTRACT != 0
    }

    pub fn is_varargs(&self) -> bool {
        self.access & ACC_VARARGS != 0
    }

    pub fn is_private(&self) -> bool {
        self.access & ACC_PRIVATE != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.name == crate::codegen::defs::CONSTRUCTOR_METHOD_NAME
    }
}

/// Everything the resolver needs to know about one class or interface
#[derive(Debug, Clone)]
pub struct ClassData {
    /// Internal name
    pub name: String,
    pub access: u16,
    pub super_class: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub fields: Vec<FieldData>,
    pub methods: Vec<MethodData>,
    /// Member classes by simple name
    pub member_types: Vec<(String, TypeId)>,
    /// Lexically enclosing class, for nested classes
    pub outer: Option<TypeId>,
    /// Instances carry a reference to an enclosing instance of this class
    pub outer_instance: Option<TypeId>,
    pub origin: ClassOrigin,
}

impl ClassData {
    pub fn is_interface(&self) -> bool {
        self.access & ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & ACC_ABSTRACT != 0
    }

    pub fn is_final(&self) -> bool {
        self.access & ACC_FINAL != 0
    }

    pub fn is_source(&self) -> bool {
        matches!(self.origin, ClassOrigin::Source)
    }

    /// Package part of the internal name, `""` for the unnamed package
    pub fn package(&self) -> &str {
        package_of(&self.name)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodData> {
        self.methods.iter().filter(|m| m.is_constructor())
    }
}

/// Package of an internal class name
pub fn package_of(internal: &str) -> &str {
    internal.rfind('/').map(|i| &internal[..i]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_constant_conversion_wraps() {
        assert_eq!(ConstValue::Int(300).convert_to(PrimitiveType::Byte), Some(ConstValue::Byte(44)));
        assert_eq!(ConstValue::Int(-1).convert_to(PrimitiveType::Char), Some(ConstValue::Char(0xffff)));
        assert_eq!(ConstValue::Double(f64::NAN).convert_to(PrimitiveType::Int), Some(ConstValue::Int(0)));
        assert_eq!(ConstValue::Double(1e20).convert_to(PrimitiveType::Long), Some(ConstValue::Long(i64::MAX)));
        assert_eq!(ConstValue::Boolean(true).convert_to(PrimitiveType::Int), None);
    }

    #[test]
    fn java_string_forms_of_floating_values() {
        assert_eq!(ConstValue::Double(1.0).to_java_string(), "1.0");
        assert_eq!(ConstValue::Double(1.5).to_java_string(), "1.5");
        assert_eq!(ConstValue::Double(1e10).to_java_string(), "1.0E10");
        assert_eq!(ConstValue::Double(1.25e-5).to_java_string(), "1.25E-5");
        assert_eq!(ConstValue::Float(0.1).to_java_string(), "0.1");
        assert_eq!(ConstValue::Char(b'x' as u16).to_java_string(), "x");
    }

    #[test]
    fn member_classes_come_from_inner_class_rows() {
        let class = BinaryClass {
            name: "java/util/Map".into(),
            access: ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
            super_name: Some("java/lang/Object".into()),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            inner_classes: vec![InnerClassEntry {
                inner: "java/util/Map$Entry".into(),
                outer: Some("java/util/Map".into()),
                simple_name: Some("Entry".into()),
                access: ACC_PUBLIC | ACC_STATIC | ACC_INTERFACE | ACC_ABSTRACT,
            }],
        };
        let members: Vec<_> = class.member_classes().collect();
        assert_eq!(members, vec![("Entry", "java/util/Map$Entry")]);
        assert!(class.own_inner_entry().is_none());
    }
}
