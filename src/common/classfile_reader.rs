//! Class file reader.
//!
//! Parses the container format into a [`ParsedClass`] that keeps the raw
//! constant pool and attribute bytes, and converts it into the
//! [`BinaryClass`] form the type model consumes.

use crate::codegen::defs::{attribute_names, MAGIC};
use crate::common::model::{BinaryClass, BinaryField, BinaryMethod, ConstValue, InnerClassEntry};
use crate::error::{Error, Result};

/// Constant pool entry; `Unusable` fills the slot after a long or double
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
    InterfaceMethodref(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub data: Vec<u8>,
}

/// Field or method as stored in the file
#[derive(Debug, Clone, PartialEq)]
pub struct RawMember {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<RawAttribute>,
}

impl RawMember {
    pub fn attribute(&self, name: &str) -> Option<&RawAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

/// Decoded `Code` attribute
#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<RawAttribute>,
}

impl CodeAttribute {
    pub fn attribute(&self, name: &str) -> Option<&RawAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedClass {
    pub minor_version: u16,
    pub major_version: u16,
    /// Index 0 is unused, as in the file
    pub constant_pool: Vec<PoolEntry>,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<RawMember>,
    pub methods: Vec<RawMember>,
    pub attributes: Vec<RawAttribute>,
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(Error::class_format(format!("truncated class file at offset {}", self.pos))),
        }
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(((self.u32()? as u64) << 32) | self.u32()? as u64)
    }

    fn at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

/// Decode the class file flavour of UTF-8 (`\0` as two bytes, surrogates
/// encoded separately).
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let bad = || Error::class_format("malformed modified UTF-8");
    while i < bytes.len() {
        let b = bytes[i] as u16;
        if b & 0x80 == 0 {
            units.push(b);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1).ok_or_else(bad)? as u16;
            units.push(((b & 0x1F) << 6) | (b2 & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1).ok_or_else(bad)? as u16;
            let b3 = *bytes.get(i + 2).ok_or_else(bad)? as u16;
            units.push(((b & 0x0F) << 12) | ((b2 & 0x3F) << 6) | (b3 & 0x3F));
            i += 3;
        } else {
            return Err(bad());
        }
    }
    Ok(String::from_utf16_lossy(&units))
}

fn read_attributes(reader: &mut ByteReader<'_>, pool: &[PoolEntry]) -> Result<Vec<RawAttribute>> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = utf8_at(pool, reader.u16()?)?.to_string();
        let len = reader.u32()? as usize;
        let data = reader.take(len)?.to_vec();
        attributes.push(RawAttribute { name, data });
    }
    Ok(attributes)
}

fn utf8_at(pool: &[PoolEntry], index: u16) -> Result<&str> {
    match pool.get(index as usize) {
        Some(PoolEntry::Utf8(s)) => Ok(s),
        _ => Err(Error::class_format(format!("constant #{} is not Utf8", index))),
    }
}

fn class_at(pool: &[PoolEntry], index: u16) -> Result<&str> {
    match pool.get(index as usize) {
        Some(PoolEntry::Class(name)) => utf8_at(pool, *name),
        _ => Err(Error::class_format(format!("constant #{} is not a Class", index))),
    }
}

fn read_members(reader: &mut ByteReader<'_>, pool: &[PoolEntry]) -> Result<Vec<RawMember>> {
    let count = reader.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access = reader.u16()?;
        let name = utf8_at(pool, reader.u16()?)?.to_string();
        let descriptor = utf8_at(pool, reader.u16()?)?.to_string();
        let attributes = read_attributes(reader, pool)?;
        members.push(RawMember {
            access,
            name,
            descriptor,
            attributes,
        });
    }
    Ok(members)
}

impl ParsedClass {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(Error::class_format(format!("bad magic 0x{:08X}", magic)));
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;

        let pool_count = reader.u16()? as usize;
        let mut pool = Vec::with_capacity(pool_count);
        pool.push(PoolEntry::Unusable);
        while pool.len() < pool_count {
            let tag = reader.u8()?;
            let entry = match tag {
                1 => {
                    let len = reader.u16()? as usize;
                    PoolEntry::Utf8(decode_modified_utf8(reader.take(len)?)?)
                }
                3 => PoolEntry::Integer(reader.u32()? as i32),
                4 => PoolEntry::Float(f32::from_bits(reader.u32()?)),
                5 => PoolEntry::Long(reader.u64()? as i64),
                6 => PoolEntry::Double(f64::from_bits(reader.u64()?)),
                7 => PoolEntry::Class(reader.u16()?),
                8 => PoolEntry::String(reader.u16()?),
                9 => PoolEntry::Fieldref(reader.u16()?, reader.u16()?),
                10 => PoolEntry::Methodref(reader.u16()?, reader.u16()?),
                11 => PoolEntry::InterfaceMethodref(reader.u16()?, reader.u16()?),
                12 => PoolEntry::NameAndType(reader.u16()?, reader.u16()?),
                15 => PoolEntry::MethodHandle(reader.u8()?, reader.u16()?),
                16 => PoolEntry::MethodType(reader.u16()?),
                17 => PoolEntry::Dynamic(reader.u16()?, reader.u16()?),
                18 => PoolEntry::InvokeDynamic(reader.u16()?, reader.u16()?),
                19 => PoolEntry::Module(reader.u16()?),
                20 => PoolEntry::Package(reader.u16()?),
                other => return Err(Error::class_format(format!("unknown constant tag {}", other))),
            };
            let wide = matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_));
            pool.push(entry);
            if wide {
                pool.push(PoolEntry::Unusable);
            }
        }
        if pool.len() != pool_count {
            return Err(Error::class_format("long or double constant overruns the pool"));
        }

        let access_flags = reader.u16()?;
        let this_class = class_at(&pool, reader.u16()?)?.to_string();
        let super_index = reader.u16()?;
        let super_class = if super_index == 0 {
            None
        } else {
            Some(class_at(&pool, super_index)?.to_string())
        };
        let interface_count = reader.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(class_at(&pool, reader.u16()?)?.to_string());
        }
        let fields = read_members(&mut reader, &pool)?;
        let methods = read_members(&mut reader, &pool)?;
        let attributes = read_attributes(&mut reader, &pool)?;
        if !reader.at_end() {
            return Err(Error::class_format("trailing bytes after class attributes"));
        }

        Ok(Self {
            minor_version,
            major_version,
            constant_pool: pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        utf8_at(&self.constant_pool, index)
    }

    pub fn class_name(&self, index: u16) -> Result<&str> {
        class_at(&self.constant_pool, index)
    }

    pub fn entry(&self, index: u16) -> Option<&PoolEntry> {
        self.constant_pool.get(index as usize)
    }

    pub fn field(&self, name: &str) -> Option<&RawMember> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&RawMember> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&RawAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Decode the `Code` attribute of a method, if it has one
    pub fn code(&self, method: &RawMember) -> Result<Option<CodeAttribute>> {
        let Some(raw) = method.attribute(attribute_names::CODE) else {
            return Ok(None);
        };
        let mut reader = ByteReader::new(&raw.data);
        let max_stack = reader.u16()?;
        let max_locals = reader.u16()?;
        let code_len = reader.u32()? as usize;
        let code = reader.take(code_len)?.to_vec();
        let handler_count = reader.u16()?;
        let mut exception_table = Vec::with_capacity(handler_count as usize);
        for _ in 0..handler_count {
            exception_table.push(ExceptionTableEntry {
                start_pc: reader.u16()?,
                end_pc: reader.u16()?,
                handler_pc: reader.u16()?,
                catch_type: reader.u16()?,
            });
        }
        let attributes = read_attributes(&mut reader, &self.constant_pool)?;
        Ok(Some(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        }))
    }

    /// Value behind a loadable constant (`ldc` operand or `ConstantValue`)
    pub fn constant_value(&self, index: u16) -> Result<ConstValue> {
        match self.entry(index) {
            Some(PoolEntry::Integer(v)) => Ok(ConstValue::Int(*v)),
            Some(PoolEntry::Long(v)) => Ok(ConstValue::Long(*v)),
            Some(PoolEntry::Float(v)) => Ok(ConstValue::Float(*v)),
            Some(PoolEntry::Double(v)) => Ok(ConstValue::Double(*v)),
            Some(PoolEntry::String(s)) => Ok(ConstValue::String(self.utf8(*s)?.to_string())),
            _ => Err(Error::class_format(format!("constant #{} is not a loadable value", index))),
        }
    }

    fn inner_classes(&self) -> Result<Vec<InnerClassEntry>> {
        let Some(raw) = self.attribute(attribute_names::INNER_CLASSES) else {
            return Ok(Vec::new());
        };
        let mut reader = ByteReader::new(&raw.data);
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let inner = self.class_name(reader.u16()?)?.to_string();
            let outer_index = reader.u16()?;
            let name_index = reader.u16()?;
            let access = reader.u16()?;
            entries.push(InnerClassEntry {
                inner,
                outer: if outer_index == 0 {
                    None
                } else {
                    Some(self.class_name(outer_index)?.to_string())
                },
                simple_name: if name_index == 0 {
                    None
                } else {
                    Some(self.utf8(name_index)?.to_string())
                },
                access,
            });
        }
        Ok(entries)
    }

    pub fn to_binary_class(&self) -> Result<BinaryClass> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let constant = match field.attribute(attribute_names::CONSTANT_VALUE) {
                Some(raw) if raw.data.len() == 2 => {
                    Some(self.constant_value(u16::from_be_bytes([raw.data[0], raw.data[1]]))?)
                }
                _ => None,
            };
            fields.push(BinaryField {
                name: field.name.clone(),
                descriptor: field.descriptor.clone(),
                access: field.access,
                constant,
            });
        }

        let mut methods = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            let mut exceptions = Vec::new();
            if let Some(raw) = method.attribute(attribute_names::EXCEPTIONS) {
                let mut reader = ByteReader::new(&raw.data);
                for _ in 0..reader.u16()? {
                    exceptions.push(self.class_name(reader.u16()?)?.to_string());
                }
            }
            methods.push(BinaryMethod {
                name: method.name.clone(),
                descriptor: method.descriptor.clone(),
                access: method.access,
                exceptions,
            });
        }

        Ok(BinaryClass {
            name: self.this_class.clone(),
            access: self.access_flags,
            super_name: self.super_class.clone(),
            interfaces: self.interfaces.clone(),
            fields,
            methods,
            inner_classes: self.inner_classes()?,
        })
    }
}

/// Parse class file bytes straight into the type-model form.
pub fn read_binary_class(bytes: &[u8]) -> Result<BinaryClass> {
    ParsedClass::parse(bytes)?.to_binary_class()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let err = ParsedClass::parse(&[0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 52]).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn rejects_truncated_input() {
        let err = ParsedClass::parse(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn modified_utf8_decodes_nul_and_supplementary() {
        assert_eq!(decode_modified_utf8(&[0x61, 0xC0, 0x80]).unwrap(), "a\0");
        // U+1F600 as a surrogate pair, each encoded in three bytes
        let bytes = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        assert_eq!(decode_modified_utf8(&bytes).unwrap(), "\u{1F600}");
        assert!(decode_modified_utf8(&[0xF0, 0x9F]).is_err());
    }
}
