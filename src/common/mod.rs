//! The symbol and type model shared by the resolver and the code generator.
//!
//! Source classes of a batch and external classes live side by side in a
//! [`TypeArena`]; external classes are loaded on demand through
//! [`ExternalTypes`], which fronts a [`ClassLookup`] provider with the shared
//! [`TypeCache`].

pub mod bootstrap;
pub mod cache;
pub mod classfile_reader;
pub mod classpath;
pub mod descriptor;
pub mod model;
pub mod types;

pub use cache::{ExternalTypes, TypeCache};
pub use classpath::{
    BootstrapClassPath, ClassLookup, ClassPathChain, ClasspathResolver, DirectoryClassPath, MemoryClassPath,
};
pub use descriptor::{DescType, MethodDescriptor};
pub use model::{BinaryClass, ClassData, ConstValue, FieldData, MethodData};
pub use types::{PrimitiveType, TypeArena, TypeId, TypeKind};
