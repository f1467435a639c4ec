//! Semantic analysis: the phases between parsing and code generation.
//!
//! - Enter: declares every class of the batch, resolves supertypes and
//!   enters fields, methods and constructors into the type arena
//! - Attr: types every expression, resolves names and overloads, folds
//!   constants and records implicit conversions
//! - Flow: reachability, definite assignment and checked exceptions
//!
//! The AST is never mutated. Everything learned about a node lands in the
//! [`Tables`] keyed by its [`NodeId`]; the code generator reads them back.

pub mod attr;
pub mod attr_expr;
pub mod const_fold;
pub mod conversion;
pub mod enter;
pub mod flow;
pub mod lookup;
pub mod overload;
pub mod scope;

use std::collections::{HashMap, HashSet};

use crate::ast::{BinaryOp, CompilationUnit, Expr, HasSpan, Location, NodeId, Span, TypeDecl};
use crate::common::model::{ConstValue, FieldData, MethodData};
use crate::common::types::{PrimitiveType, TypeArena, TypeId};
use crate::common::ExternalTypes;
use crate::config::Config;
use crate::error::{Diagnostic, Error, Result};

pub use conversion::ConvStep;
use scope::Scope;

/// Everything the resolver learned about one expression
#[derive(Debug, Clone)]
pub struct ExprInfo {
    pub ty: TypeId,
    pub constant: Option<ConstValue>,
    /// Applied after the expression is evaluated
    pub conversion: Vec<ConvStep>,
    pub binding: Binding,
}

impl ExprInfo {
    pub fn new(ty: TypeId) -> Self {
        Self {
            ty,
            constant: None,
            conversion: Vec::new(),
            binding: Binding::None,
        }
    }

    pub fn with_binding(ty: TypeId, binding: Binding) -> Self {
        Self {
            binding,
            ..Self::new(ty)
        }
    }

    pub fn constant(ty: TypeId, value: ConstValue) -> Self {
        Self {
            constant: Some(value),
            ..Self::new(ty)
        }
    }

    /// Type after the recorded conversion
    pub fn converted_type(&self, arena: &mut TypeArena) -> TypeId {
        match self.conversion.last() {
            None => self.ty,
            Some(ConvStep::Primitive(_, to)) => TypeId::of(*to),
            Some(ConvStep::Box(p)) => arena.box_type(*p).unwrap_or(TypeId::OBJECT),
            Some(ConvStep::Unbox(p)) => TypeId::of(*p),
            Some(ConvStep::Checkcast(ty)) => *ty,
        }
    }
}

/// A chain of enclosing instances: starting at `this`, read the `this$0`
/// field of each listed class in turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OuterPath(pub Vec<usize>);

impl OuterPath {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How the object a member is selected from is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv {
    Static,
    /// The value of the qualifying expression (or name prefix)
    Expr,
    /// `this` or an enclosing instance
    Implicit(OuterPath),
    Super,
}

/// Synthetic static method giving a nested class access to a private member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorRef {
    pub owner: TypeId,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone)]
pub struct FieldAccess {
    pub field: FieldData,
    /// Class named in the field reference
    pub site: TypeId,
    pub receiver: Recv,
    pub read: Option<AccessorRef>,
    pub write: Option<AccessorRef>,
}

#[derive(Debug, Clone)]
pub enum NameStart {
    Local(NodeId),
    Field(FieldAccess),
}

#[derive(Debug, Clone)]
pub enum NameStep {
    Field(FieldAccess),
    Length,
}

/// A dotted name used as a value: a variable or field, then selections
#[derive(Debug, Clone)]
pub struct NamePath {
    pub start: NameStart,
    pub steps: Vec<NameStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Static,
    Virtual,
    Interface,
    Special,
}

#[derive(Debug, Clone)]
pub struct CallInfo {
    pub method: MethodData,
    /// Class named in the method reference
    pub site: TypeId,
    pub invoke: InvokeKind,
    pub receiver: Recv,
    /// Array type the trailing arguments are packed into
    pub varargs: Option<TypeId>,
    pub accessor: Option<AccessorRef>,
    /// `clone()` on an array
    pub array_clone: bool,
}

/// Enclosing instance passed to a constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OuterArg {
    None,
    /// The explicit qualifier: `outer.new Inner()` or `outer.super()`
    Expr,
    Implicit(OuterPath),
}

#[derive(Debug, Clone)]
pub struct NewInfo {
    pub class: TypeId,
    pub ctor: MethodData,
    pub outer: OuterArg,
    /// Anonymous classes: enclosing instance forwarded to the superclass
    pub super_outer: OuterArg,
    pub varargs: Option<TypeId>,
}

/// An explicit or implicit `this(...)`/`super(...)` call
#[derive(Debug, Clone)]
pub struct CtorCallInfo {
    pub class: TypeId,
    pub ctor: MethodData,
    pub outer: OuterArg,
    pub varargs: Option<TypeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    /// Operands promoted to this type
    Numeric(PrimitiveType),
    Boolean,
    Reference,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignKind {
    Simple,
    Compound {
        op: BinaryOp,
        /// `None` for string concatenation
        op_ty: Option<PrimitiveType>,
        target_ty: TypeId,
    },
}

#[derive(Debug, Clone)]
pub enum Binding {
    None,
    Name(NamePath),
    Field(FieldAccess),
    ArrayLength,
    Type(TypeId),
    Package(String),
    Method(Box<CallInfo>),
    New(Box<NewInfo>),
    /// Promoted operand type
    Unary(PrimitiveType),
    Binary(BinaryKind),
    Assign(AssignKind),
    Increment { target_ty: TypeId, op_ty: PrimitiveType },
    InstanceOf(TypeId),
    ClassLit(TypeId),
    This(OuterPath),
}

#[derive(Debug, Clone)]
pub struct LocalVar {
    pub name: String,
    pub ty: TypeId,
    pub is_final: bool,
    /// Constant variable: `final` with a constant initializer
    pub constant: Option<ConstValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    Int,
    String,
}

#[derive(Debug, Clone)]
pub enum ForEachKind {
    Array { array: TypeId, element: TypeId },
    Iterable,
}

#[derive(Debug, Clone)]
pub struct ForEachInfo {
    pub kind: ForEachKind,
    /// From the element (`Object` for iterables) to the variable type
    pub conversion: Vec<ConvStep>,
}

/// Side tables filled by the resolver
#[derive(Debug, Default)]
pub struct Tables {
    pub exprs: HashMap<NodeId, ExprInfo>,
    /// Locals, parameters, catch and foreach variables
    pub vars: HashMap<NodeId, LocalVar>,
    pub catch_types: HashMap<NodeId, Vec<TypeId>>,
    pub switches: HashMap<NodeId, SwitchKind>,
    pub foreach: HashMap<NodeId, ForEachInfo>,
    pub array_inits: HashMap<NodeId, TypeId>,
    /// Method and constructor declarations; default constructors are
    /// keyed by their class declaration
    pub methods: HashMap<NodeId, MethodData>,
    /// Field declarators
    pub fields: HashMap<NodeId, FieldData>,
    /// Keyed by the explicit call, or by the constructor (class for a
    /// default constructor) when the `super()` call is implicit
    pub ctor_calls: HashMap<NodeId, CtorCallInfo>,
    /// Unreachable statements dropped under the eliding policy
    pub elided: HashSet<(usize, usize)>,
}

impl Tables {
    pub fn expr(&self, id: NodeId) -> Result<&ExprInfo> {
        self.exprs
            .get(&id)
            .ok_or_else(|| Error::internal(format!("expression {:?} was not attributed", id)))
    }

    pub fn var(&self, id: NodeId) -> Result<&LocalVar> {
        self.vars
            .get(&id)
            .ok_or_else(|| Error::internal(format!("variable {:?} was not declared", id)))
    }

    pub fn method(&self, id: NodeId) -> Result<&MethodData> {
        self.methods
            .get(&id)
            .ok_or_else(|| Error::internal(format!("method {:?} was not entered", id)))
    }

    pub fn ctor_call(&self, id: NodeId) -> Result<&CtorCallInfo> {
        self.ctor_calls
            .get(&id)
            .ok_or_else(|| Error::internal(format!("constructor call {:?} was not resolved", id)))
    }

    pub fn is_elided(&self, span: Span) -> bool {
        self.elided.contains(&(span.start.offset, span.end.offset))
    }

    pub fn constant(&self, expr: &Expr) -> Option<&ConstValue> {
        self.exprs.get(&expr.id).and_then(|info| info.constant.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    TopLevel,
    Member,
    Local,
    Anonymous,
}

/// Local variable copied into a local or anonymous class
#[derive(Debug, Clone)]
pub struct Capture {
    pub var: NodeId,
    pub name: String,
    pub ty: TypeId,
}

impl Capture {
    pub fn field_name(&self) -> String {
        format!("val${}", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum AccessorTarget {
    FieldRead(FieldData),
    FieldWrite(FieldData),
    Method(MethodData),
}

#[derive(Debug, Clone)]
pub struct Accessor {
    pub target: AccessorTarget,
    pub name: String,
    pub descriptor: String,
}

/// The synthesized constructor of an anonymous class
#[derive(Debug, Clone)]
pub struct AnonymousInfo {
    pub super_ctor: MethodData,
    /// Type of the enclosing instance forwarded to the superclass
    /// constructor, if it needs one
    pub super_outer: Option<TypeId>,
}

/// One class of the batch, with what code generation needs beyond its
/// `ClassData`
#[derive(Debug)]
pub struct SourceClass<'u> {
    pub ty: TypeId,
    pub decl: &'u TypeDecl,
    pub unit: usize,
    pub outer: Option<usize>,
    pub kind: ClassKind,
    /// Outermost class of the nest
    pub top: usize,
    pub simple_name: String,
    /// Flags written to the class file
    pub access: u16,
    /// Flags written to `InnerClasses` rows
    pub inner_access: u16,
    /// Type of the enclosing instance kept in `this$0`
    pub outer_this: Option<TypeId>,
    pub captures: Vec<Capture>,
    pub anonymous: Option<AnonymousInfo>,
    pub accessors: Vec<Accessor>,
}

impl<'u> SourceClass<'u> {
    pub fn internal_name<'a>(&self, arena: &'a TypeArena) -> &'a str {
        arena.class_name(self.ty).unwrap_or("")
    }

    pub fn capture(&self, var: NodeId) -> Option<&Capture> {
        self.captures.iter().find(|c| c.var == var)
    }
}

/// The classes of a batch in declaration order (nested classes follow
/// their enclosing class; local and anonymous classes are appended as the
/// resolver meets them)
#[derive(Debug, Default)]
pub struct ClassTable<'u> {
    list: Vec<SourceClass<'u>>,
    by_type: HashMap<TypeId, usize>,
    by_decl: HashMap<NodeId, usize>,
}

impl<'u> ClassTable<'u> {
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn push(&mut self, class: SourceClass<'u>) -> usize {
        let index = self.list.len();
        self.by_type.insert(class.ty, index);
        self.by_decl.insert(class.decl.id, index);
        self.list.push(class);
        index
    }

    pub fn get(&self, index: usize) -> &SourceClass<'u> {
        &self.list[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut SourceClass<'u> {
        &mut self.list[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceClass<'u>> {
        self.list.iter()
    }

    pub fn index_of(&self, ty: TypeId) -> Option<usize> {
        self.by_type.get(&ty).copied()
    }

    pub fn index_of_decl(&self, id: NodeId) -> Option<usize> {
        self.by_decl.get(&id).copied()
    }

    pub fn of_type(&self, ty: TypeId) -> Option<&SourceClass<'u>> {
        self.index_of(ty).map(|i| &self.list[i])
    }

    /// Parameter types of a constructor as written in its descriptor:
    /// enclosing instance, forwarded superclass instance, declared
    /// parameters, captured variables
    pub fn ctor_params(&self, arena: &mut TypeArena, class: TypeId, ctor: &MethodData) -> Result<Vec<TypeId>> {
        let mut params = Vec::with_capacity(ctor.params.len() + 1);
        match self.of_type(class) {
            Some(source) => {
                if let Some(outer) = source.outer_this {
                    params.push(outer);
                }
                if let Some(outer) = source.anonymous.as_ref().and_then(|a| a.super_outer) {
                    params.push(outer);
                }
                params.extend(ctor.params.iter().copied());
                params.extend(source.captures.iter().map(|c| c.ty));
            }
            None => {
                if let Some(outer) = arena.class_data(class)?.outer_instance {
                    params.push(outer);
                }
                params.extend(ctor.params.iter().copied());
            }
        }
        Ok(params)
    }

    pub fn ctor_descriptor(&self, arena: &mut TypeArena, class: TypeId, ctor: &MethodData) -> Result<String> {
        let params = self.ctor_params(arena, class, ctor)?;
        Ok(arena.method_descriptor(&params, TypeId::VOID))
    }
}

/// Result of semantic analysis, consumed by code generation
#[derive(Debug)]
pub struct Analysis<'u> {
    pub arena: TypeArena,
    pub tables: Tables,
    pub classes: ClassTable<'u>,
    pub units: &'u [CompilationUnit],
}

/// What kind of body is being attributed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyKind {
    /// Class level: supertypes, signatures
    None,
    Method { ret: TypeId },
    Constructor,
    Initializer,
    FieldInit,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyCtx {
    pub kind: BodyKind,
    pub is_static: bool,
    /// Arguments of an explicit constructor call: `this` is unusable
    pub prologue: bool,
}

impl Default for BodyCtx {
    fn default() -> Self {
        Self {
            kind: BodyKind::None,
            is_static: true,
            prologue: false,
        }
    }
}

/// Resolved imports of one compilation unit
#[derive(Debug, Default)]
pub(crate) struct UnitImports {
    /// Simple name to class
    pub single: Vec<(String, TypeId)>,
    /// Package prefixes (internal form) and classes whose member types are imported
    pub on_demand_packages: Vec<String>,
    pub on_demand_types: Vec<TypeId>,
    /// Static single imports: member name and owning class
    pub static_single: Vec<(String, TypeId)>,
    pub static_on_demand: Vec<TypeId>,
}

/// Field initializer whose constant value is computed on first use
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingConstant<'u> {
    pub class: usize,
    pub declarator: &'u crate::ast::VarDeclarator,
    pub is_static: bool,
}

/// State shared by the enter and attr phases
pub(crate) struct Resolver<'u> {
    pub arena: TypeArena,
    pub tables: Tables,
    pub classes: ClassTable<'u>,
    pub units: &'u [CompilationUnit],
    pub config: Config,
    pub scope: Scope,
    pub body: BodyCtx,
    /// Compilation unit whose imports are in effect
    pub unit: usize,
    pub imports: Vec<UnitImports>,
    pub errors: Vec<Diagnostic>,
    pub pending_constants: HashMap<(TypeId, String), PendingConstant<'u>>,
    pub constants_in_progress: HashSet<NodeId>,
    /// Binary names of the batch, for naming local and anonymous classes
    pub used_names: HashSet<String>,
}

impl<'u> Resolver<'u> {
    pub fn new(units: &'u [CompilationUnit], external: ExternalTypes, config: &Config) -> Self {
        Self {
            arena: TypeArena::new(external),
            tables: Tables::default(),
            classes: ClassTable::default(),
            units,
            config: config.clone(),
            scope: Scope::new(),
            body: BodyCtx::default(),
            unit: 0,
            imports: Vec::new(),
            errors: Vec::new(),
            pending_constants: HashMap::new(),
            constants_in_progress: HashSet::new(),
            used_names: HashSet::new(),
        }
    }

    /// Record an error and go on in batch mode; fail otherwise
    pub fn report(&mut self, error: Error) -> Result<()> {
        if !self.config.batch_mode || error.is_internal() {
            return Err(error);
        }
        log::debug!("recorded: {}", error);
        self.errors.extend(error.diagnostics());
        if self.errors.len() >= self.config.max_errors {
            return Err(Error::Diagnostics(std::mem::take(&mut self.errors)));
        }
        Ok(())
    }

    /// Run a member-level step, keeping the scope balanced when it fails
    pub fn guarded(&mut self, step: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let depth = self.scope.depth();
        let body = self.body;
        let result = step(self);
        self.scope.truncate(depth);
        self.body = body;
        match result {
            Ok(()) => Ok(()),
            Err(error) => self.report(error),
        }
    }

    pub fn finish(self) -> Result<Analysis<'u>> {
        if !self.errors.is_empty() {
            return Err(Error::Diagnostics(self.errors));
        }
        Ok(Analysis {
            arena: self.arena,
            tables: self.tables,
            classes: self.classes,
            units: self.units,
        })
    }

    pub fn current_class(&self) -> Result<usize> {
        self.scope
            .current_class()
            .ok_or_else(|| Error::internal("no enclosing class in scope"))
    }

    pub fn current_type(&self) -> Result<TypeId> {
        Ok(self.classes.get(self.current_class()?).ty)
    }

    /// Are the two classes in the same nest (share an outermost class)?
    pub fn same_nest(&self, a: TypeId, b: TypeId) -> bool {
        match (self.classes.index_of(a), self.classes.index_of(b)) {
            (Some(x), Some(y)) => self.classes.get(x).top == self.classes.get(y).top,
            _ => false,
        }
    }
}

/// Turn a lookup failure into a diagnostic at the referencing node
pub(crate) fn locate(error: Error, location: Location) -> Error {
    match error {
        Error::ClassNotFound { name } => Error::semantic(format!("cannot find symbol: class {}", name), location),
        other => other,
    }
}

pub(crate) fn semantic_at(node: &impl HasSpan, message: impl Into<String>) -> Error {
    Error::semantic(message, node.span().start)
}

/// Resolve, type-check and flow-check a batch of compilation units
pub fn analyze<'u>(units: &'u [CompilationUnit], external: ExternalTypes, config: &Config) -> Result<Analysis<'u>> {
    log::debug!("analyzing {} compilation unit(s)", units.len());
    let mut resolver = Resolver::new(units, external, config);
    resolver.enter_all()?;
    if !resolver.errors.is_empty() {
        return resolver.finish();
    }
    resolver.attribute_all()?;
    let mut analysis = resolver.finish()?;
    flow::check(&mut analysis, config)?;
    log::debug!("analysis done: {} class(es)", analysis.classes.len());
    Ok(analysis)
}
