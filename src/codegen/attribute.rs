//! Attributes and exception table structures for Java class files

use super::constpool::ConstantPool;
use super::defs::attribute_names;
use crate::error::Result;

/// An attribute as written: name index plus opaque payload
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl Attribute {
    pub fn new(name_index: u16, info: Vec<u8>) -> Self {
        Self { name_index, info }
    }

    pub fn named(pool: &mut ConstantPool, name: &str, info: Vec<u8>) -> Result<Self> {
        Ok(Self::new(pool.utf8(name)?, info))
    }

    /// Bytes including the six-byte header
    pub fn len(&self) -> usize {
        6 + self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// 0 catches everything
    pub catch_type: u16,
}

impl ExceptionTableEntry {
    pub fn new(start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: u16) -> Self {
        Self {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        }
    }

    fn write(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.start_pc.to_be_bytes());
        bytes.extend_from_slice(&self.end_pc.to_be_bytes());
        bytes.extend_from_slice(&self.handler_pc.to_be_bytes());
        bytes.extend_from_slice(&self.catch_type.to_be_bytes());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

/// One row of `InnerClasses`; zero indices mean "none"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClassRow {
    pub inner_class: u16,
    pub outer_class: u16,
    pub inner_name: u16,
    pub access_flags: u16,
}

pub fn code(
    pool: &mut ConstantPool,
    max_stack: u16,
    max_locals: u16,
    bytecode: &[u8],
    exception_table: &[ExceptionTableEntry],
    attributes: &[Attribute],
) -> Result<Attribute> {
    let mut info = Vec::with_capacity(12 + bytecode.len() + 8 * exception_table.len());
    info.extend_from_slice(&max_stack.to_be_bytes());
    info.extend_from_slice(&max_locals.to_be_bytes());
    info.extend_from_slice(&(bytecode.len() as u32).to_be_bytes());
    info.extend_from_slice(bytecode);
    info.extend_from_slice(&(exception_table.len() as u16).to_be_bytes());
    for entry in exception_table {
        entry.write(&mut info);
    }
    info.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for attribute in attributes {
        info.extend_from_slice(&attribute.name_index.to_be_bytes());
        info.extend_from_slice(&(attribute.info.len() as u32).to_be_bytes());
        info.extend_from_slice(&attribute.info);
    }
    Attribute::named(pool, attribute_names::CODE, info)
}

pub fn line_number_table(pool: &mut ConstantPool, lines: &[(u16, u16)]) -> Result<Attribute> {
    let mut info = Vec::with_capacity(2 + 4 * lines.len());
    info.extend_from_slice(&(lines.len() as u16).to_be_bytes());
    for (start_pc, line) in lines {
        info.extend_from_slice(&start_pc.to_be_bytes());
        info.extend_from_slice(&line.to_be_bytes());
    }
    Attribute::named(pool, attribute_names::LINE_NUMBER_TABLE, info)
}

pub fn local_variable_table(pool: &mut ConstantPool, entries: &[LocalVariableEntry]) -> Result<Attribute> {
    let mut info = Vec::with_capacity(2 + 10 * entries.len());
    info.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for e in entries {
        info.extend_from_slice(&e.start_pc.to_be_bytes());
        info.extend_from_slice(&e.length.to_be_bytes());
        info.extend_from_slice(&e.name_index.to_be_bytes());
        info.extend_from_slice(&e.descriptor_index.to_be_bytes());
        info.extend_from_slice(&e.index.to_be_bytes());
    }
    Attribute::named(pool, attribute_names::LOCAL_VARIABLE_TABLE, info)
}

/// `number_of_entries` followed by already encoded frames
pub fn stack_map_table(pool: &mut ConstantPool, frame_count: u16, frames: Vec<u8>) -> Result<Attribute> {
    let mut info = Vec::with_capacity(2 + frames.len());
    info.extend_from_slice(&frame_count.to_be_bytes());
    info.extend_from_slice(&frames);
    Attribute::named(pool, attribute_names::STACK_MAP_TABLE, info)
}

pub fn constant_value(pool: &mut ConstantPool, value_index: u16) -> Result<Attribute> {
    Attribute::named(pool, attribute_names::CONSTANT_VALUE, value_index.to_be_bytes().to_vec())
}

pub fn exceptions(pool: &mut ConstantPool, classes: &[String]) -> Result<Attribute> {
    let mut info = Vec::with_capacity(2 + 2 * classes.len());
    info.extend_from_slice(&(classes.len() as u16).to_be_bytes());
    for class in classes {
        let index = pool.class(class)?;
        info.extend_from_slice(&index.to_be_bytes());
    }
    Attribute::named(pool, attribute_names::EXCEPTIONS, info)
}

pub fn source_file(pool: &mut ConstantPool, file_name: &str) -> Result<Attribute> {
    let index = pool.utf8(file_name)?;
    Attribute::named(pool, attribute_names::SOURCE_FILE, index.to_be_bytes().to_vec())
}

pub fn inner_classes(pool: &mut ConstantPool, rows: &[InnerClassRow]) -> Result<Attribute> {
    let mut info = Vec::with_capacity(2 + 8 * rows.len());
    info.extend_from_slice(&(rows.len() as u16).to_be_bytes());
    for row in rows {
        info.extend_from_slice(&row.inner_class.to_be_bytes());
        info.extend_from_slice(&row.outer_class.to_be_bytes());
        info.extend_from_slice(&row.inner_name.to_be_bytes());
        info.extend_from_slice(&row.access_flags.to_be_bytes());
    }
    Attribute::named(pool, attribute_names::INNER_CLASSES, info)
}

pub fn synthetic(pool: &mut ConstantPool) -> Result<Attribute> {
    Attribute::named(pool, attribute_names::SYNTHETIC, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_attribute_layout() {
        let mut pool = ConstantPool::new();
        let attr = code(&mut pool, 1, 0, &[0x04, 0xac], &[], &[]).unwrap();
        // max_stack, max_locals, code_length, code, exception and attribute counts
        assert_eq!(attr.info, vec![0, 1, 0, 0, 0, 0, 0, 2, 0x04, 0xac, 0, 0, 0, 0]);
        assert_eq!(attr.len(), 20);
    }

    #[test]
    fn exception_entries_are_eight_bytes() {
        let mut pool = ConstantPool::new();
        let entry = ExceptionTableEntry::new(0, 4, 7, 0);
        let attr = code(&mut pool, 1, 1, &[0; 8], &[entry], &[]).unwrap();
        assert_eq!(attr.info.len(), 12 + 8 + 8);
    }

    #[test]
    fn exceptions_attribute_interns_classes() {
        let mut pool = ConstantPool::new();
        let attr = exceptions(&mut pool, &["java/io/IOException".to_string()]).unwrap();
        let class_index = pool.class("java/io/IOException").unwrap();
        assert_eq!(attr.info, [&[0u8, 1][..], &class_index.to_be_bytes()[..]].concat());
    }
}
