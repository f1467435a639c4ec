//! Core classfile structures: ClassFile, FieldInfo, MethodInfo

use super::attribute::Attribute;
use super::constpool::ConstantPool;
use super::defs::{JAVA_1_8, MAGIC};

#[derive(Debug)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            minor_version: 0,
            major_version: JAVA_1_8,
            constant_pool: ConstantPool::new(),
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

impl Default for ClassFile {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl FieldInfo {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self {
            access_flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl MethodInfo {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self {
            access_flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        }
    }
}
