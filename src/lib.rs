//! jembed: an embeddable compiler from a Java subset to JVM class files
//!
//! ## Architecture
//!
//! - **parser**: scanner and recursive-descent parser producing the AST
//! - **common**: the type model; source classes and external classes
//!   behind one [`TypeArena`](common::TypeArena), with a shared
//!   [`TypeCache`](common::TypeCache) for classes loaded from a classpath
//! - **wash**: semantic analysis (Enter → Attr → Flow), filling side tables
//!   keyed by AST node ids
//! - **codegen**: bytecode generation and class-file emission
//! - **embed**: front-ends for expressions, scripts, class bodies and units
//! - **bin**: command-line interface (similar to javac)
//!
//! ## Compilation flow
//!
//! ```text
//! Source → Parser → AST → Enter → Attr → Flow → Gen → ClassWriter → ClassMap
//! ```
//!
//! A batch either produces every class file or none.

pub mod ast;
pub mod codegen;
pub mod common;
pub mod config;
pub mod embed;
pub mod error;
pub mod parser;
pub mod wash;

pub use codegen::ClassMap;
pub use config::{Config, UnreachablePolicy};
pub use embed::{ClassBodyCompiler, Compiler, ExpressionCompiler, ScriptCompiler, SimpleCompiler};
pub use error::{Diagnostic, DiagnosticKind, Error, Result};

/// Compile one compilation unit against the core JDK signatures
///
/// Returns every class the unit declares, nested and anonymous classes
/// included, keyed by binary name.
pub fn compile(source: &str, config: &Config) -> Result<ClassMap> {
    log::debug!("parsing {} bytes of source", source.len());
    let unit = parser::parse_compilation_unit(source)?;
    Compiler::new(config.clone()).compile_units(std::slice::from_ref(&unit))
}

/// Compile source files into one batch and write the class files under
/// `output_dir`, laid out by package.
pub fn compile_files(compiler: &Compiler, paths: &[std::path::PathBuf], output_dir: &std::path::Path) -> Result<ClassMap> {
    let mut units = Vec::with_capacity(paths.len());
    for path in paths {
        log::debug!("parsing {}", path.display());
        let source = std::fs::read_to_string(path)?;
        let mut unit = parser::parse_compilation_unit(&source)?;
        unit.source_file = path.file_name().map(|name| name.to_string_lossy().into_owned());
        units.push(unit);
    }
    let classes = compiler.compile_units(&units)?;
    write_classes(&classes, output_dir)?;
    Ok(classes)
}

/// Write each class to `<output_dir>/<package path>/<Name>.class`
pub fn write_classes(classes: &ClassMap, output_dir: &std::path::Path) -> Result<()> {
    for (name, bytes) in classes {
        let path = output_dir.join(format!("{}.class", name.replace('.', "/")));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        log::trace!("writing {}", path.display());
        std::fs::write(&path, bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_unit_to_one_class() {
        let classes = compile("package p; public class A { int f() { return 1; } }", &Config::default()).unwrap();
        assert_eq!(classes.keys().collect::<Vec<_>>(), vec!["p.A"]);
        assert_eq!(&classes["p.A"][..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    }

    #[test]
    fn classes_are_written_by_package() {
        let dir = tempfile::tempdir().unwrap();
        let classes = compile("package p.q; class A { class B { } }", &Config::default()).unwrap();
        write_classes(&classes, dir.path()).unwrap();
        assert!(dir.path().join("p/q/A.class").is_file());
        assert!(dir.path().join("p/q/A$B.class").is_file());
    }
}
