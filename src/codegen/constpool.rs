//! Constant pool with deduplication.
//!
//! Code generation refers to constants symbolically; indices are handed out
//! here, at emission, one per distinct constant.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// A constant pool entry. Floating values are keyed by their bit patterns
/// so that `-0.0` and NaN payloads survive deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

pub mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
}

impl Constant {
    /// Long and double entries occupy two pool slots
    pub fn slots(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// A member reference before it is interned: owner, name and descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    pub(crate) constants: Vec<Constant>,
    index: HashMap<Constant, u16>,
    next: u16,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
            index: HashMap::new(),
            next: 1,
        }
    }

    /// Value written as `constant_pool_count`
    pub fn count(&self) -> u16 {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    fn add(&mut self, constant: Constant) -> Result<u16> {
        if let Some(&index) = self.index.get(&constant) {
            return Ok(index);
        }
        let index = self.next;
        let next = u32::from(index) + u32::from(constant.slots());
        if next > u32::from(u16::MAX) {
            return Err(Error::internal("constant pool overflow"));
        }
        self.next = next as u16;
        self.index.insert(constant.clone(), index);
        self.constants.push(constant);
        Ok(index)
    }

    pub fn utf8(&mut self, value: &str) -> Result<u16> {
        if super::writer::modified_utf8_len(value) > usize::from(u16::MAX) {
            return Err(Error::internal("string constant too long"));
        }
        self.add(Constant::Utf8(value.to_string()))
    }

    pub fn class(&mut self, internal_name: &str) -> Result<u16> {
        let name = self.utf8(internal_name)?;
        self.add(Constant::Class(name))
    }

    pub fn string(&mut self, value: &str) -> Result<u16> {
        let utf8 = self.utf8(value)?;
        self.add(Constant::String(utf8))
    }

    pub fn integer(&mut self, value: i32) -> Result<u16> {
        self.add(Constant::Integer(value))
    }

    pub fn float(&mut self, value: f32) -> Result<u16> {
        self.add(Constant::Float(value.to_bits()))
    }

    pub fn long(&mut self, value: i64) -> Result<u16> {
        self.add(Constant::Long(value))
    }

    pub fn double(&mut self, value: f64) -> Result<u16> {
        self.add(Constant::Double(value.to_bits()))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.add(Constant::NameAndType(name, descriptor))
    }

    pub fn field_ref(&mut self, member: &MemberRef) -> Result<u16> {
        let class = self.class(&member.owner)?;
        let nat = self.name_and_type(&member.name, &member.descriptor)?;
        self.add(Constant::FieldRef(class, nat))
    }

    pub fn method_ref(&mut self, member: &MemberRef) -> Result<u16> {
        let class = self.class(&member.owner)?;
        let nat = self.name_and_type(&member.name, &member.descriptor)?;
        self.add(Constant::MethodRef(class, nat))
    }

    pub fn interface_method_ref(&mut self, member: &MemberRef) -> Result<u16> {
        let class = self.class(&member.owner)?;
        let nat = self.name_and_type(&member.name, &member.descriptor)?;
        self.add(Constant::InterfaceMethodRef(class, nat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_constants_share_an_index() {
        let mut pool = ConstantPool::new();
        let a = pool.string("hello").unwrap();
        let b = pool.string("hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.utf8("hello").unwrap(), 1);
        assert_eq!(a, 2);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.long(1).unwrap(), 1);
        assert_eq!(pool.integer(1).unwrap(), 3);
        assert_eq!(pool.double(2.0).unwrap(), 4);
        assert_eq!(pool.count(), 6);
    }

    #[test]
    fn member_refs_reuse_their_parts() {
        let mut pool = ConstantPool::new();
        let m = MemberRef::new("java/lang/Object", "<init>", "()V");
        let first = pool.method_ref(&m).unwrap();
        let class = pool.class("java/lang/Object").unwrap();
        assert_eq!(pool.method_ref(&m).unwrap(), first);
        assert!(class < first);
    }

    #[test]
    fn float_keys_distinguish_signed_zero() {
        let mut pool = ConstantPool::new();
        let pos = pool.float(0.0).unwrap();
        let neg = pool.float(-0.0).unwrap();
        assert_ne!(pos, neg);
    }
}
