//! Code generation and class-file emission.
//!
//! Each analyzed class is lowered by [`gen::ClassGen`] into a
//! [`GeneratedClass`]: symbolic instructions per method, with labels in
//! place of branch offsets and [`constpool::MemberRef`]s in place of
//! constant-pool indices. [`ClassWriter`] then assembles the code (resolving
//! labels, widening long jumps, computing stack maps) and serializes the
//! class file.

pub mod assembler;
pub mod attribute;
pub mod class;
pub mod class_writer;
pub mod code;
pub mod constpool;
pub mod defs;
pub mod frame;
pub mod gen;
pub mod gen_cond;
pub mod gen_expr;
pub mod opcodes;
pub mod writer;

use std::collections::BTreeMap;

pub use class_writer::{ClassWriter, GeneratedClass, GeneratedField, GeneratedMethod, InnerClassInfo};

use crate::config::Config;
use crate::error::Result;
use crate::wash::Analysis;

/// Class files of a batch keyed by dotted binary name (`a.b.Outer$Inner`)
pub type ClassMap = BTreeMap<String, Vec<u8>>;

/// Generate every class of an analyzed batch.
///
/// Nothing is returned unless all classes were generated.
pub fn generate(analysis: &mut Analysis<'_>, config: &Config) -> Result<ClassMap> {
    let mut output = ClassMap::new();
    let writer = ClassWriter::new(config);
    let units = analysis.units;
    for index in 0..analysis.classes.len() {
        let source_file = if config.debug_source {
            units[analysis.classes.get(index).unit].source_file.as_deref()
        } else {
            None
        };
        let class = gen::ClassGen::new(
            &mut analysis.arena,
            &analysis.tables,
            &analysis.classes,
            config,
            source_file,
            index,
        )
        .generate()?;
        let bytes = writer.write(&class)?;
        log::trace!("emitted {} ({} bytes)", class.binary_name(), bytes.len());
        output.insert(class.binary_name(), bytes);
    }
    log::debug!("generated {} class file(s)", output.len());
    Ok(output)
}
