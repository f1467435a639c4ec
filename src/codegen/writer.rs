//! Trait-based serialization for classfile structures

use std::io::Write;

use super::attribute::Attribute;
use super::class::{ClassFile, FieldInfo, MethodInfo};
use super::constpool::{constant_tags::*, Constant, ConstantPool};

/// An object which can be written into a classfile.
pub trait ClassfileWritable {
    /// Writes the bytes of this object into the given buffer.
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()>;

    /// Writes the bytes of this object into a newly created buffer.
    fn to_classfile_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to_classfile(&mut buffer);
        buffer
    }
}

fn write_u16<W: Write>(buffer: &mut W, value: u16) -> std::io::Result<()> {
    buffer.write_all(&value.to_be_bytes())
}

fn write_list<W: Write, T: ClassfileWritable>(buffer: &mut W, items: &[T]) -> std::io::Result<()> {
    write_u16(buffer, items.len() as u16)?;
    for item in items {
        item.write_to_classfile(buffer)?;
    }
    Ok(())
}

impl ClassfileWritable for ClassFile {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.magic.to_be_bytes())?;
        write_u16(buffer, self.minor_version)?;
        write_u16(buffer, self.major_version)?;
        self.constant_pool.write_to_classfile(buffer)?;
        write_u16(buffer, self.access_flags)?;
        write_u16(buffer, self.this_class)?;
        write_u16(buffer, self.super_class)?;
        write_u16(buffer, self.interfaces.len() as u16)?;
        for interface in &self.interfaces {
            write_u16(buffer, *interface)?;
        }
        write_list(buffer, &self.fields)?;
        write_list(buffer, &self.methods)?;
        write_list(buffer, &self.attributes)
    }
}

impl ClassfileWritable for ConstantPool {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        write_u16(buffer, self.count())?;
        for constant in &self.constants {
            constant.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}

impl ClassfileWritable for Constant {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(value) => {
                let bytes = encode_modified_utf8(value);
                buffer.write_all(&[CONSTANT_UTF8])?;
                write_u16(buffer, bytes.len() as u16)?;
                buffer.write_all(&bytes)?;
            }
            Constant::Integer(value) => {
                buffer.write_all(&[CONSTANT_INTEGER])?;
                buffer.write_all(&value.to_be_bytes())?;
            }
            Constant::Float(bits) => {
                buffer.write_all(&[CONSTANT_FLOAT])?;
                buffer.write_all(&bits.to_be_bytes())?;
            }
            Constant::Long(value) => {
                buffer.write_all(&[CONSTANT_LONG])?;
                buffer.write_all(&value.to_be_bytes())?;
            }
            Constant::Double(bits) => {
                buffer.write_all(&[CONSTANT_DOUBLE])?;
                buffer.write_all(&bits.to_be_bytes())?;
            }
            Constant::Class(name_index) => {
                buffer.write_all(&[CONSTANT_CLASS])?;
                write_u16(buffer, *name_index)?;
            }
            Constant::String(string_index) => {
                buffer.write_all(&[CONSTANT_STRING])?;
                write_u16(buffer, *string_index)?;
            }
            Constant::FieldRef(class_index, nat_index) => {
                buffer.write_all(&[CONSTANT_FIELDREF])?;
                write_u16(buffer, *class_index)?;
                write_u16(buffer, *nat_index)?;
            }
            Constant::MethodRef(class_index, nat_index) => {
                buffer.write_all(&[CONSTANT_METHODREF])?;
                write_u16(buffer, *class_index)?;
                write_u16(buffer, *nat_index)?;
            }
            Constant::InterfaceMethodRef(class_index, nat_index) => {
                buffer.write_all(&[CONSTANT_INTERFACEMETHODREF])?;
                write_u16(buffer, *class_index)?;
                write_u16(buffer, *nat_index)?;
            }
            Constant::NameAndType(name_index, descriptor_index) => {
                buffer.write_all(&[CONSTANT_NAMEANDTYPE])?;
                write_u16(buffer, *name_index)?;
                write_u16(buffer, *descriptor_index)?;
            }
        }
        Ok(())
    }
}

impl ClassfileWritable for FieldInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        write_u16(buffer, self.access_flags)?;
        write_u16(buffer, self.name_index)?;
        write_u16(buffer, self.descriptor_index)?;
        write_list(buffer, &self.attributes)
    }
}

impl ClassfileWritable for MethodInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        write_u16(buffer, self.access_flags)?;
        write_u16(buffer, self.name_index)?;
        write_u16(buffer, self.descriptor_index)?;
        write_list(buffer, &self.attributes)
    }
}

impl ClassfileWritable for Attribute {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        write_u16(buffer, self.name_index)?;
        buffer.write_all(&(self.info.len() as u32).to_be_bytes())?;
        buffer.write_all(&self.info)
    }
}

/// Encode in the JVM's modified UTF-8: NUL as two bytes and supplementary
/// characters as surrogate pairs of three bytes each.
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007f => bytes.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                bytes.push(0xc0 | (unit >> 6) as u8);
                bytes.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                bytes.push(0xe0 | (unit >> 12) as u8);
                bytes.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                bytes.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    bytes
}

pub fn modified_utf8_len(value: &str) -> usize {
    value
        .encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007f => 1,
            0x0000 | 0x0080..=0x07ff => 2,
            _ => 3,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::classfile_reader::decode_modified_utf8;

    #[test]
    fn modified_utf8_round_trips() {
        for text in ["plain", "nul\0byte", "caf\u{e9}", "\u{1F600} smile"] {
            let bytes = encode_modified_utf8(text);
            assert_eq!(bytes.len(), modified_utf8_len(text));
            assert_eq!(decode_modified_utf8(&bytes).unwrap(), text);
        }
        assert_eq!(encode_modified_utf8("\0"), vec![0xc0, 0x80]);
    }

    #[test]
    fn empty_class_file_layout() {
        let mut class = ClassFile::new();
        class.this_class = class.constant_pool.class("A").unwrap();
        class.super_class = class.constant_pool.class("java/lang/Object").unwrap();
        let bytes = class.to_classfile_bytes();
        assert_eq!(&bytes[0..4], &[0xca, 0xfe, 0xba, 0xbe]);
        assert_eq!(&bytes[6..8], &52u16.to_be_bytes());
        // header, pool (count + 4 entries), flags, classes, four empty tables
        let pool_len = 2 + (3 + 1) + 3 + (3 + 16) + 3;
        assert_eq!(bytes.len(), 8 + pool_len + 6 + 2 + 2 + 2 + 2);
    }
}
