//! Class writer: turns generated classes into class file bytes
//!
//! Generated classes keep their constants symbolic. The writer interns
//! them into one constant pool per class, assembles each method body, and
//! serializes the result with [`ClassfileWritable`].

use super::assembler::assemble;
use super::attribute::{self, Attribute, InnerClassRow};
use super::class::{ClassFile, FieldInfo, MethodInfo};
use super::code::Code;
use super::writer::ClassfileWritable;
use crate::common::model::ConstValue;
use crate::config::Config;
use crate::error::Result;

#[derive(Debug)]
pub struct GeneratedField {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    /// Emitted as `ConstantValue`
    pub constant: Option<ConstValue>,
    pub synthetic: bool,
}

#[derive(Debug)]
pub struct GeneratedMethod {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    /// Internal names for the `Exceptions` attribute
    pub exceptions: Vec<String>,
    /// `None` for abstract methods
    pub code: Option<Code>,
    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassInfo {
    pub inner: String,
    pub outer: Option<String>,
    pub simple_name: Option<String>,
    pub access: u16,
}

#[derive(Debug)]
pub struct GeneratedClass {
    /// Internal name
    pub name: String,
    pub access: u16,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<GeneratedField>,
    pub methods: Vec<GeneratedMethod>,
    pub source_file: Option<String>,
    pub inner_classes: Vec<InnerClassInfo>,
}

impl GeneratedClass {
    pub fn new(name: impl Into<String>, access: u16, super_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            access,
            super_name,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
            inner_classes: Vec::new(),
        }
    }

    /// Binary name with dots, as used for the output map
    pub fn binary_name(&self) -> String {
        self.name.replace('/', ".")
    }
}

pub struct ClassWriter<'c> {
    config: &'c Config,
}

impl<'c> ClassWriter<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    pub fn write(&self, class: &GeneratedClass) -> Result<Vec<u8>> {
        let mut file = ClassFile::new();
        file.major_version = self.config.target_version;
        file.access_flags = class.access;
        file.this_class = file.constant_pool.class(&class.name)?;
        file.super_class = match &class.super_name {
            Some(name) => file.constant_pool.class(name)?,
            None => 0,
        };
        for interface in &class.interfaces {
            let index = file.constant_pool.class(interface)?;
            file.interfaces.push(index);
        }

        for field in &class.fields {
            let info = self.write_field(&mut file, field)?;
            file.fields.push(info);
        }
        for method in &class.methods {
            let info = self.write_method(&mut file, method)?;
            file.methods.push(info);
        }

        if self.config.debug_source {
            if let Some(source) = &class.source_file {
                let attr = attribute::source_file(&mut file.constant_pool, source)?;
                file.attributes.push(attr);
            }
        }
        if !class.inner_classes.is_empty() {
            let mut rows = Vec::with_capacity(class.inner_classes.len());
            for inner in &class.inner_classes {
                let pool = &mut file.constant_pool;
                rows.push(InnerClassRow {
                    inner_class: pool.class(&inner.inner)?,
                    outer_class: match &inner.outer {
                        Some(outer) => pool.class(outer)?,
                        None => 0,
                    },
                    inner_name: match &inner.simple_name {
                        Some(simple) => pool.utf8(simple)?,
                        None => 0,
                    },
                    access_flags: inner.access,
                });
            }
            let attr = attribute::inner_classes(&mut file.constant_pool, &rows)?;
            file.attributes.push(attr);
        }

        let bytes = file.to_classfile_bytes();
        log::trace!(
            "wrote {} ({} bytes, {} constants)",
            class.binary_name(),
            bytes.len(),
            file.constant_pool.count() - 1
        );
        Ok(bytes)
    }

    fn write_field(&self, file: &mut ClassFile, field: &GeneratedField) -> Result<FieldInfo> {
        let pool = &mut file.constant_pool;
        let mut info = FieldInfo::new(field.access, pool.utf8(&field.name)?, pool.utf8(&field.descriptor)?);
        if let Some(value) = &field.constant {
            let index = match value {
                ConstValue::Long(v) => pool.long(*v)?,
                ConstValue::Float(v) => pool.float(*v)?,
                ConstValue::Double(v) => pool.double(*v)?,
                ConstValue::String(s) => pool.string(s)?,
                other => pool.integer(other.as_int().unwrap_or(0))?,
            };
            info.attributes.push(attribute::constant_value(pool, index)?);
        }
        if field.synthetic {
            info.attributes.push(attribute::synthetic(pool)?);
        }
        Ok(info)
    }

    fn write_method(&self, file: &mut ClassFile, method: &GeneratedMethod) -> Result<MethodInfo> {
        let pool = &mut file.constant_pool;
        let mut info = MethodInfo::new(method.access, pool.utf8(&method.name)?, pool.utf8(&method.descriptor)?);

        if let Some(code) = &method.code {
            let assembled = assemble(code, pool, self.config.wants_stack_maps())?;
            let mut code_attributes: Vec<Attribute> = Vec::new();
            if self.config.debug_lines && !assembled.lines.is_empty() {
                code_attributes.push(attribute::line_number_table(pool, &assembled.lines)?);
            }
            if self.config.debug_vars && !assembled.local_vars.is_empty() {
                code_attributes.push(attribute::local_variable_table(pool, &assembled.local_vars)?);
            }
            if let Some((count, frames)) = assembled.stack_map {
                code_attributes.push(attribute::stack_map_table(pool, count, frames)?);
            }
            info.attributes.push(attribute::code(
                pool,
                assembled.max_stack,
                assembled.max_locals,
                &assembled.bytecode,
                &assembled.exception_table,
                &code_attributes,
            )?);
        }
        if !method.exceptions.is_empty() {
            info.attributes.push(attribute::exceptions(pool, &method.exceptions)?);
        }
        if method.synthetic {
            info.attributes.push(attribute::synthetic(pool)?);
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::defs::access_flags::*;
    use crate::codegen::frame::VType;
    use crate::common::classfile_reader::ParsedClass;

    fn returning_method(name: &str) -> GeneratedMethod {
        let mut code = Code::new("p/A", true, false, &[]);
        code.push_int(1);
        code.emit_return(Some(&VType::Integer));
        code.finish();
        GeneratedMethod {
            access: ACC_PUBLIC | ACC_STATIC,
            name: name.to_string(),
            descriptor: "()I".to_string(),
            exceptions: vec!["java/io/IOException".to_string()],
            code: Some(code),
            synthetic: false,
        }
    }

    #[test]
    fn written_class_reads_back() {
        let mut class = GeneratedClass::new("p/A", ACC_PUBLIC | ACC_SUPER, Some("java/lang/Object".into()));
        class.interfaces.push("java/lang/Runnable".into());
        class.fields.push(GeneratedField {
            access: ACC_PUBLIC | ACC_STATIC | ACC_FINAL,
            name: "K".into(),
            descriptor: "I".into(),
            constant: Some(ConstValue::Int(42)),
            synthetic: false,
        });
        class.methods.push(returning_method("one"));
        class.source_file = Some("A.java".into());

        let config = Config::default();
        let bytes = ClassWriter::new(&config).write(&class).unwrap();
        let parsed = ParsedClass::parse(&bytes).unwrap();
        let binary = parsed.to_binary_class().unwrap();
        assert_eq!(binary.name, "p/A");
        assert_eq!(binary.super_name.as_deref(), Some("java/lang/Object"));
        assert_eq!(binary.interfaces, vec!["java/lang/Runnable".to_string()]);
        assert_eq!(binary.fields[0].constant, Some(ConstValue::Int(42)));
        assert_eq!(binary.methods[0].exceptions, vec!["java/io/IOException".to_string()]);
        assert!(parsed.attribute("SourceFile").is_some());
    }

    #[test]
    fn inner_class_rows_are_written() {
        let mut class = GeneratedClass::new("p/A$B", ACC_SUPER, Some("java/lang/Object".into()));
        class.inner_classes.push(InnerClassInfo {
            inner: "p/A$B".into(),
            outer: Some("p/A".into()),
            simple_name: Some("B".into()),
            access: ACC_STATIC,
        });
        let config = Config::default();
        let bytes = ClassWriter::new(&config).write(&class).unwrap();
        let binary = ParsedClass::parse(&bytes).unwrap().to_binary_class().unwrap();
        let own = binary.own_inner_entry().unwrap();
        assert_eq!(own.simple_name.as_deref(), Some("B"));
        assert_eq!(own.outer.as_deref(), Some("p/A"));
    }
}
