//! Generic classfile-specific definitions

/// Header of Java class file (magic number)
pub const MAGIC: u32 = 0xCAFEBABE;

/// Name of a constructor
pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";

/// Name of a static initializer
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

/// Class file major versions
pub mod major_versions {
    pub const JAVA_1_1: u16 = 45;
    pub const JAVA_5_0: u16 = 49;
    pub const JAVA_6_0: u16 = 50;
    pub const JAVA_7: u16 = 51;
    pub const JAVA_8: u16 = 52;
}

pub const JAVA_1_8: u16 = major_versions::JAVA_8;

/// First version whose verifier requires `StackMapTable`
pub const STACK_MAP_MIN_VERSION: u16 = major_versions::JAVA_6_0;

/// Access and property flags shared by classes, fields, methods and inner-class entries
pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    /// Methods: synchronized; classes: ACC_SUPER
    pub const ACC_SYNCHRONIZED: u16 = 0x0020;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_VOLATILE: u16 = 0x0040;
    pub const ACC_BRIDGE: u16 = 0x0040;
    pub const ACC_TRANSIENT: u16 = 0x0080;
    pub const ACC_VARARGS: u16 = 0x0080;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_STRICT: u16 = 0x0800;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
    pub const ACC_ANNOTATION: u16 = 0x2000;
    pub const ACC_ENUM: u16 = 0x4000;

    pub const VISIBILITY_MASK: u16 = ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED;
}

/// Attribute names
pub mod attribute_names {
    pub const CODE: &str = "Code";
    pub const CONSTANT_VALUE: &str = "ConstantValue";
    pub const EXCEPTIONS: &str = "Exceptions";
    pub const INNER_CLASSES: &str = "InnerClasses";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
    pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
    pub const SOURCE_FILE: &str = "SourceFile";
    pub const STACK_MAP_TABLE: &str = "StackMapTable";
    pub const SYNTHETIC: &str = "Synthetic";
}
