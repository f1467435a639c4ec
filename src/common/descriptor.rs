//! JVM field and method descriptors

use std::fmt;

use crate::common::types::PrimitiveType;
use crate::error::{Error, Result};

/// A field type as spelled in a descriptor, independent of any arena.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DescType {
    Primitive(PrimitiveType),
    /// Internal name, e.g. `java/lang/String`
    Class(String),
    Array(Box<DescType>),
}

impl DescType {
    pub fn object(internal: impl Into<String>) -> Self {
        DescType::Class(internal.into())
    }

    pub fn array_of(element: DescType) -> Self {
        DescType::Array(Box::new(element))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, DescType::Primitive(PrimitiveType::Void))
    }
}

impl fmt::Display for DescType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescType::Primitive(p) => write!(f, "{}", p.descriptor()),
            DescType::Class(name) => write!(f, "L{};", name),
            DescType::Array(element) => write!(f, "[{}", element),
        }
    }
}

/// Parsed `(params)ret` descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<DescType>,
    pub ret: DescType,
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for p in &self.params {
            write!(f, "{}", p)?;
        }
        write!(f, "){}", self.ret)
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn field_type(&mut self) -> Result<DescType> {
        let c = self
            .peek()
            .ok_or_else(|| Error::class_format(format!("truncated descriptor '{}'", self.text)))?;
        self.pos += 1;
        if let Some(p) = PrimitiveType::from_descriptor(c as char) {
            return Ok(DescType::Primitive(p));
        }
        match c {
            b'L' => {
                let rest = &self.text[self.pos..];
                let end = rest
                    .find(';')
                    .ok_or_else(|| Error::class_format(format!("unterminated class in descriptor '{}'", self.text)))?;
                self.pos += end + 1;
                Ok(DescType::Class(rest[..end].to_string()))
            }
            b'[' => Ok(DescType::Array(Box::new(self.field_type()?))),
            _ => Err(Error::class_format(format!("bad descriptor '{}'", self.text))),
        }
    }
}

pub fn parse_field_descriptor(text: &str) -> Result<DescType> {
    let mut cursor = Cursor { text, pos: 0 };
    let ty = cursor.field_type()?;
    if cursor.pos != text.len() || ty.is_void() {
        return Err(Error::class_format(format!("bad field descriptor '{}'", text)));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(text: &str) -> Result<MethodDescriptor> {
    let mut cursor = Cursor { text, pos: 0 };
    if cursor.peek() != Some(b'(') {
        return Err(Error::class_format(format!("bad method descriptor '{}'", text)));
    }
    cursor.pos += 1;
    let mut params = Vec::new();
    while cursor.peek() != Some(b')') {
        let param = cursor.field_type()?;
        if param.is_void() {
            return Err(Error::class_format(format!("void parameter in '{}'", text)));
        }
        params.push(param);
    }
    cursor.pos += 1;
    let ret = cursor.field_type()?;
    if cursor.pos != text.len() {
        return Err(Error::class_format(format!("trailing characters in '{}'", text)));
    }
    Ok(MethodDescriptor { params, ret })
}

/// Number of argument slots a descriptor's parameters take.
pub fn param_slots(desc: &MethodDescriptor) -> usize {
    desc.params
        .iter()
        .map(|p| match p {
            DescType::Primitive(PrimitiveType::Long) | DescType::Primitive(PrimitiveType::Double) => 2,
            _ => 1,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_descriptor_parses_and_prints() {
        let text = "(I[Ljava/lang/String;J)Ljava/lang/Object;";
        let desc = parse_method_descriptor(text).unwrap();
        assert_eq!(desc.params.len(), 3);
        assert_eq!(desc.to_string(), text);
        assert_eq!(param_slots(&desc), 4);
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        assert!(parse_field_descriptor("V").is_err());
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_method_descriptor("(V)V").is_err());
        assert!(parse_method_descriptor("I").is_err());
    }
}
