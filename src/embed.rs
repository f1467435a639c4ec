//! Front-ends that package the pipeline for the four input shapes.
//!
//! [`ExpressionCompiler`] and [`ScriptCompiler`] wrap a fragment in a
//! method of a generated class, [`ClassBodyCompiler`] wraps member
//! declarations in a class, and [`SimpleCompiler`] takes whole compilation
//! units. The fragment is parsed on its own, so diagnostics point into the
//! text the caller supplied; the wrapper is parsed separately and the two
//! trees are joined before analysis.
//!
//! ```no_run
//! use jembed::embed::{Compiler, ExpressionCompiler};
//! use jembed::Config;
//!
//! let classes = ExpressionCompiler::new(Compiler::new(Config::default()))
//!     .compile("6 * 7")
//!     .unwrap();
//! assert!(classes.contains_key("SC"));
//! ```

use std::sync::Arc;

use crate::ast::{Block, CompilationUnit, ExprStmt, Member, ReturnStmt, Stmt};
use crate::codegen::{self, ClassMap};
use crate::common::{BootstrapClassPath, ClassLookup, ClassPathChain, ExternalTypes, MemoryClassPath, TypeCache};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::parser::{HasSpan, Parser};
use crate::wash;

/// Class generated by the wrapping front-ends unless renamed
pub const DEFAULT_CLASS_NAME: &str = "SC";
pub const DEFAULT_METHOD_NAME: &str = "eval";

/// Options plus the external side of the type model, shared by every
/// compilation run through it
#[derive(Clone)]
pub struct Compiler {
    config: Config,
    cache: TypeCache,
    provider: Arc<dyn ClassLookup>,
}

impl Compiler {
    /// Core JDK signatures only, with a private type cache
    pub fn new(config: Config) -> Self {
        Self::with_class_path(config, TypeCache::new(), BootstrapClassPath)
    }

    /// Resolve external types through `provider`, caching them in `cache`
    /// (which may be shared with other compilers)
    pub fn with_class_path(config: Config, cache: TypeCache, provider: impl ClassLookup + 'static) -> Self {
        Self {
            config,
            cache,
            provider: Arc::new(provider),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    /// Make the classes of an earlier batch visible to later compilations.
    pub fn add_classes(&mut self, classes: &ClassMap) {
        let chain = ClassPathChain::new()
            .with(MemoryClassPath::from_class_map(classes))
            .with(self.provider.clone());
        self.provider = Arc::new(chain);
    }

    fn external(&self) -> ExternalTypes {
        ExternalTypes::new(self.cache.clone(), self.provider.clone())
    }

    /// Analyze and generate a batch of parsed units.
    pub fn compile_units(&self, units: &[CompilationUnit]) -> Result<ClassMap> {
        let mut analysis = wash::analyze(units, self.external(), &self.config)?;
        codegen::generate(&mut analysis, &self.config)
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .field("provider", &self.provider.describe())
            .finish()
    }
}

/// The class a fragment is placed in
#[derive(Debug, Clone)]
struct Wrapper {
    class_name: String,
    imports: Vec<String>,
    extends: Option<String>,
    implements: Vec<String>,
}

impl Default for Wrapper {
    fn default() -> Self {
        Self {
            class_name: DEFAULT_CLASS_NAME.to_string(),
            imports: Vec::new(),
            extends: None,
            implements: Vec::new(),
        }
    }
}

impl Wrapper {
    /// Source up to and including the class body's opening brace
    fn open(&self) -> String {
        let mut text = String::new();
        let simple = match self.class_name.rsplit_once('.') {
            Some((package, simple)) => {
                text.push_str(&format!("package {};\n", package));
                simple
            }
            None => self.class_name.as_str(),
        };
        for import in &self.imports {
            text.push_str(&format!("import {};\n", import));
        }
        text.push_str(&format!("public class {}", simple));
        if let Some(superclass) = &self.extends {
            text.push_str(&format!(" extends {}", superclass));
        }
        if !self.implements.is_empty() {
            text.push_str(&format!(" implements {}", self.implements.join(", ")));
        }
        text.push_str(" {\n");
        text
    }

    /// Parse the wrapper around `members`, numbering its nodes after the
    /// fragment's
    fn parse(&self, members: &str, first_id: u32) -> Result<CompilationUnit> {
        let source = format!("{}{}\n}}\n", self.open(), members);
        log::trace!("wrapper source:\n{}", source);
        Parser::with_first_id(&source, first_id).parse_compilation_unit()
    }
}

/// The method a fragment becomes the body of
#[derive(Debug, Clone)]
struct MethodShape {
    name: String,
    return_type: String,
    is_static: bool,
    /// (type, name)
    params: Vec<(String, String)>,
    thrown: Vec<String>,
}

impl MethodShape {
    fn new(return_type: &str) -> Self {
        Self {
            name: DEFAULT_METHOD_NAME.to_string(),
            return_type: return_type.to_string(),
            is_static: true,
            params: Vec::new(),
            thrown: Vec::new(),
        }
    }

    fn declaration(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|(ty, name)| format!("{} {}", ty, name)).collect();
        let mut text = format!(
            "public {}{} {}({})",
            if self.is_static { "static " } else { "" },
            self.return_type,
            self.name,
            params.join(", ")
        );
        if !self.thrown.is_empty() {
            text.push_str(&format!(" throws {}", self.thrown.join(", ")));
        }
        text.push_str(" { }");
        text
    }

    fn returns_void(&self) -> bool {
        self.return_type.trim() == "void"
    }
}

/// Body of the wrapper's only method
fn method_body(unit: &mut CompilationUnit) -> Result<&mut Block> {
    unit.types
        .first_mut()
        .and_then(|class| {
            class.members.iter_mut().find_map(|member| match member {
                Member::Method(method) => method.body.as_mut(),
                _ => None,
            })
        })
        .ok_or_else(|| Error::internal("wrapper class has no method body"))
}

/// Builder methods shared by the front-ends that wrap a fragment in a class
macro_rules! wrapper_options {
    () => {
        /// Fully qualified name of the generated class
        pub fn class_name(mut self, name: impl Into<String>) -> Self {
            self.wrapper.class_name = name.into();
            self
        }

        /// Add an import: `java.util.*`, `java.util.List` or
        /// `static java.lang.Math.*`
        pub fn import(mut self, import: impl Into<String>) -> Self {
            self.wrapper.imports.push(import.into());
            self
        }

        pub fn compiler(&self) -> &Compiler {
            &self.compiler
        }

        pub fn compiler_mut(&mut self) -> &mut Compiler {
            &mut self.compiler
        }
    };
}

/// Builder methods for the generated method
macro_rules! method_options {
    () => {
        pub fn method_name(mut self, name: impl Into<String>) -> Self {
            self.method.name = name.into();
            self
        }

        pub fn return_type(mut self, ty: impl Into<String>) -> Self {
            self.method.return_type = ty.into();
            self
        }

        pub fn parameter(mut self, ty: impl Into<String>, name: impl Into<String>) -> Self {
            self.method.params.push((ty.into(), name.into()));
            self
        }

        pub fn thrown(mut self, exception: impl Into<String>) -> Self {
            self.method.thrown.push(exception.into());
            self
        }

        pub fn instance_method(mut self) -> Self {
            self.method.is_static = false;
            self
        }
    };
}

/// Compiles one expression into `public static Object eval()` of class `SC`
#[derive(Debug, Clone)]
pub struct ExpressionCompiler {
    compiler: Compiler,
    wrapper: Wrapper,
    method: MethodShape,
}

impl ExpressionCompiler {
    pub fn new(compiler: Compiler) -> Self {
        Self {
            compiler,
            wrapper: Wrapper::default(),
            method: MethodShape::new("Object"),
        }
    }

    wrapper_options!();
    method_options!();

    pub fn compile(&self, expression: &str) -> Result<ClassMap> {
        let mut parser = Parser::new(expression);
        let expr = parser.parse_standalone_expression()?;
        let mut unit = self.wrapper.parse(&self.method.declaration(), parser.next_node_id())?;
        let span = expr.span();
        let stmt = if self.method.returns_void() {
            Stmt::Expr(ExprStmt { expr, span })
        } else {
            Stmt::Return(ReturnStmt { value: Some(expr), span })
        };
        method_body(&mut unit)?.stmts.push(stmt);
        log::debug!("compiling expression into {}", self.wrapper.class_name);
        self.compiler.compile_units(std::slice::from_ref(&unit))
    }
}

/// Compiles a statement sequence into `public static void eval()`
#[derive(Debug, Clone)]
pub struct ScriptCompiler {
    compiler: Compiler,
    wrapper: Wrapper,
    method: MethodShape,
}

impl ScriptCompiler {
    pub fn new(compiler: Compiler) -> Self {
        Self {
            compiler,
            wrapper: Wrapper::default(),
            method: MethodShape::new("void"),
        }
    }

    wrapper_options!();
    method_options!();

    pub fn compile(&self, script: &str) -> Result<ClassMap> {
        let mut parser = Parser::new(script);
        let stmts = parser.parse_block_statements()?;
        let mut unit = self.wrapper.parse(&self.method.declaration(), parser.next_node_id())?;
        method_body(&mut unit)?.stmts = stmts;
        log::debug!("compiling script into {}", self.wrapper.class_name);
        self.compiler.compile_units(std::slice::from_ref(&unit))
    }
}

/// Compiles member declarations into `public class SC`
#[derive(Debug, Clone)]
pub struct ClassBodyCompiler {
    compiler: Compiler,
    wrapper: Wrapper,
}

impl ClassBodyCompiler {
    pub fn new(compiler: Compiler) -> Self {
        Self {
            compiler,
            wrapper: Wrapper::default(),
        }
    }

    wrapper_options!();

    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.wrapper.extends = Some(superclass.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.wrapper.implements.push(interface.into());
        self
    }

    pub fn compile(&self, body: &str) -> Result<ClassMap> {
        let simple = self
            .wrapper
            .class_name
            .rsplit('.')
            .next()
            .unwrap_or(DEFAULT_CLASS_NAME)
            .to_string();
        let mut parser = Parser::new(body);
        let members = parser.parse_class_body_members(&simple)?;
        let mut unit = self.wrapper.parse("", parser.next_node_id())?;
        let class = unit
            .types
            .first_mut()
            .ok_or_else(|| Error::internal("wrapper unit declares no class"))?;
        class.members = members;
        log::debug!("compiling class body into {}", self.wrapper.class_name);
        self.compiler.compile_units(std::slice::from_ref(&unit))
    }
}

/// Compiles complete compilation units
#[derive(Debug, Clone)]
pub struct SimpleCompiler {
    compiler: Compiler,
}

impl SimpleCompiler {
    pub fn new(compiler: Compiler) -> Self {
        Self { compiler }
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut Compiler {
        &mut self.compiler
    }

    pub fn compile(&self, source: &str) -> Result<ClassMap> {
        self.compile_all(&[(None, source)])
    }

    /// One batch of units that may refer to each other. A file name, when
    /// given, is recorded as the unit's `SourceFile`.
    pub fn compile_all(&self, sources: &[(Option<&str>, &str)]) -> Result<ClassMap> {
        let mut units = Vec::with_capacity(sources.len());
        for (file_name, source) in sources {
            let mut unit = Parser::new(source).parse_compilation_unit()?;
            unit.source_file = file_name.map(|name| {
                std::path::Path::new(name)
                    .file_name()
                    .map(|base| base.to_string_lossy().into_owned())
                    .unwrap_or_else(|| name.to_string())
            });
            units.push(unit);
        }
        log::debug!("compiling {} unit(s)", units.len());
        self.compiler.compile_units(&units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_declares_package_and_supertypes() {
        let wrapper = Wrapper {
            class_name: "a.b.Calc".to_string(),
            imports: vec!["java.util.*".to_string()],
            extends: Some("Base".to_string()),
            implements: vec!["Runnable".to_string(), "Cloneable".to_string()],
        };
        let open = wrapper.open();
        assert!(open.starts_with("package a.b;\nimport java.util.*;\n"));
        assert!(open.ends_with("public class Calc extends Base implements Runnable, Cloneable {\n"));
    }

    #[test]
    fn method_declaration_lists_parameters() {
        let mut shape = MethodShape::new("int");
        shape.params.push(("int".to_string(), "a".to_string()));
        shape.params.push(("long".to_string(), "b".to_string()));
        shape.thrown.push("Exception".to_string());
        assert_eq!(
            shape.declaration(),
            "public static int eval(int a, long b) throws Exception { }"
        );
        assert!(!shape.returns_void());
    }

    #[test]
    fn spliced_nodes_get_distinct_ids() {
        let mut parser = Parser::new("a + b");
        let expr = parser.parse_standalone_expression().unwrap();
        let mut unit = Wrapper::default()
            .parse(&MethodShape::new("int").declaration(), parser.next_node_id())
            .unwrap();
        assert!(unit.types[0].id.0 >= parser.next_node_id());
        assert!(expr.id.0 < parser.next_node_id());
        assert!(method_body(&mut unit).unwrap().stmts.is_empty());
    }

    #[test]
    fn expression_errors_point_into_the_fragment() {
        let compiler = ExpressionCompiler::new(Compiler::new(Config::default()));
        let err = compiler.compile("1 + \"abc").unwrap_err();
        match err {
            Error::Lexical { location, .. } => assert_eq!(location.offset, 4),
            other => panic!("expected a lexical error, got {:?}", other),
        }
    }
}
