use std::fmt;

use crate::parser::span::{HasSpan, Span};

/// Identity of an AST node that the resolver annotates.
///
/// Ids are unique within one parse and index the resolver's side tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

// Compilation unit, package and imports
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub package: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    /// File name recorded in the `SourceFile` attribute, if known
    pub source_file: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct PackageDecl {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub name: String,
    pub is_static: bool,
    pub is_wildcard: bool,
    pub span: Span,
}

impl fmt::Display for ImportDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "import ")?;
        if self.is_static {
            write!(f, "static ")?;
        }
        if self.is_wildcard {
            write!(f, "{}.*;", self.name)
        } else {
            write!(f, "{};", self.name)
        }
    }
}

// Modifiers and annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Abstract,
    Static,
    Final,
    Native,
    Synchronized,
    Transient,
    Volatile,
    Strictfp,
    Default,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Private => "private",
            Modifier::Abstract => "abstract",
            Modifier::Static => "static",
            Modifier::Final => "final",
            Modifier::Native => "native",
            Modifier::Synchronized => "synchronized",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Strictfp => "strictfp",
            Modifier::Default => "default",
        };
        f.write_str(text)
    }
}

/// Annotations are kept for diagnostics only; they carry no semantics.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct Modifiers {
    pub list: Vec<Modifier>,
    pub annotations: Vec<Annotation>,
}

impl Modifiers {
    pub fn has(&self, modifier: Modifier) -> bool {
        self.list.contains(&modifier)
    }

    pub fn is_static(&self) -> bool {
        self.has(Modifier::Static)
    }

    pub fn is_final(&self) -> bool {
        self.has(Modifier::Final)
    }

    pub fn is_abstract(&self) -> bool {
        self.has(Modifier::Abstract)
    }

    pub fn is_private(&self) -> bool {
        self.has(Modifier::Private)
    }
}

// Types as written in source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Void => "void",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub enum TypeArg {
    Type(TypeRef),
    /// `?`, `? extends T` (upper) or `? super T`
    Wildcard { bound: Option<Box<TypeRef>>, upper: bool },
}

#[derive(Debug, Clone)]
pub enum TypeRefKind {
    Primitive(PrimitiveKind),
    /// Dotted name; type arguments of any segment are collected but erased
    Named { name: String, args: Vec<TypeArg> },
}

#[derive(Debug, Clone)]
pub struct TypeRef {
    pub kind: TypeRefKind,
    pub dims: usize,
    pub span: Span,
}

impl TypeRef {
    pub fn primitive(kind: PrimitiveKind, span: Span) -> Self {
        Self { kind: TypeRefKind::Primitive(kind), dims: 0, span }
    }

    pub fn named(name: impl Into<String>, span: Span) -> Self {
        Self {
            kind: TypeRefKind::Named { name: name.into(), args: Vec::new() },
            dims: 0,
            span,
        }
    }

    pub fn with_dims(mut self, extra: usize) -> Self {
        self.dims += extra;
        self
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeRefKind::Primitive(PrimitiveKind::Void)) && self.dims == 0
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeRefKind::Primitive(p) => write!(f, "{}", p)?,
            TypeRefKind::Named { name, .. } => write!(f, "{}", name)?,
        }
        for _ in 0..self.dims {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<TypeRef>,
    pub span: Span,
}

// Type declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
}

/// A class or interface; anonymous class bodies use an empty name.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub id: NodeId,
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    pub name: String,
    pub type_params: Vec<TypeParam>,
    /// Superclass for classes, super-interfaces for interfaces
    pub extends: Vec<TypeRef>,
    pub implements: Vec<TypeRef>,
    pub members: Vec<Member>,
    pub span: Span,
}

impl TypeDecl {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    pub fn constructors(&self) -> impl Iterator<Item = &ConstructorDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Constructor(c) => Some(c),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(method) => Some(method),
            _ => None,
        })
    }

    pub fn member_types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Type(t) => Some(t),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Initializer(Initializer),
    Type(TypeDecl),
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub modifiers: Modifiers,
    pub type_ref: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarDeclarator {
    pub id: NodeId,
    pub name: String,
    /// C-style dims after the name: `int a[]`
    pub dims: usize,
    pub init: Option<VarInit>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum VarInit {
    Expr(Expr),
    Array(ArrayInit),
}

impl HasSpan for VarInit {
    fn span(&self) -> Span {
        match self {
            VarInit::Expr(e) => e.span,
            VarInit::Array(a) => a.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArrayInit {
    pub id: NodeId,
    pub elements: Vec<VarInit>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub id: NodeId,
    pub modifiers: Modifiers,
    pub type_ref: TypeRef,
    pub name: String,
    pub varargs: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub id: NodeId,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParam>,
    pub return_type: TypeRef,
    pub name: String,
    pub params: Vec<Param>,
    pub throws: Vec<TypeRef>,
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtorCallKind {
    This,
    Super,
}

/// `this(...)` or `[outer.]super(...)` as the first constructor statement
#[derive(Debug, Clone)]
pub struct CtorCall {
    pub id: NodeId,
    pub kind: CtorCallKind,
    pub qualifier: Option<Box<Expr>>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ConstructorDecl {
    pub id: NodeId,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParam>,
    pub name: String,
    pub params: Vec<Param>,
    pub throws: Vec<TypeRef>,
    pub explicit_call: Option<CtorCall>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Initializer {
    pub id: NodeId,
    pub is_static: bool,
    pub body: Block,
    pub span: Span,
}

// Statements
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Block),
    LocalVar(LocalVarDecl),
    LocalClass(TypeDecl),
    Expr(ExprStmt),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    ForEach(ForEachStmt),
    Switch(SwitchStmt),
    Return(ReturnStmt),
    Break(JumpStmt),
    Continue(JumpStmt),
    Throw(ThrowStmt),
    Try(TryStmt),
    Synchronized(SyncStmt),
    Labeled(LabeledStmt),
    Assert(AssertStmt),
    Empty(Span),
}

impl HasSpan for Stmt {
    fn span(&self) -> Span {
        match self {
            Stmt::Block(s) => s.span,
            Stmt::LocalVar(s) => s.span,
            Stmt::LocalClass(s) => s.span,
            Stmt::Expr(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::DoWhile(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::ForEach(s) => s.span,
            Stmt::Switch(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Break(s) | Stmt::Continue(s) => s.span,
            Stmt::Throw(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::Synchronized(s) => s.span,
            Stmt::Labeled(s) => s.span,
            Stmt::Assert(s) => s.span,
            Stmt::Empty(span) => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalVarDecl {
    pub modifiers: Modifiers,
    pub type_ref: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub cond: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    /// Local declarations or expression statements
    pub init: Vec<Stmt>,
    pub cond: Option<Expr>,
    pub update: Vec<Expr>,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForEachStmt {
    pub id: NodeId,
    pub modifiers: Modifiers,
    pub var_type: TypeRef,
    pub var_id: NodeId,
    pub name: String,
    pub iterable: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum CaseLabel {
    Expr(Expr),
    Default(Span),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub id: NodeId,
    pub selector: Expr,
    pub cases: Vec<SwitchCase>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

/// `break` or `continue`
#[derive(Debug, Clone)]
pub struct JumpStmt {
    pub label: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ThrowStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub id: NodeId,
    pub modifiers: Modifiers,
    /// More than one entry for multi-catch
    pub types: Vec<TypeRef>,
    pub name: String,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub body: Block,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SyncStmt {
    pub lock: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LabeledStmt {
    pub label: String,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AssertStmt {
    pub cond: Expr,
    pub message: Option<Expr>,
    pub span: Span,
}

// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(u16),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn is_increment(&self) -> bool {
        matches!(self, UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

/// Where a method is invoked on
#[derive(Debug, Clone)]
pub enum Receiver {
    /// `m()`: resolved against the enclosing classes
    Implicit,
    Expr(Box<Expr>),
    Super,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

impl HasSpan for Expr {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    /// Simple or qualified name whose meaning (variable, field chain,
    /// type, package) is decided by the resolver
    Name(Vec<String>),
    FieldAccess {
        target: Box<Expr>,
        name: String,
    },
    SuperField {
        name: String,
    },
    MethodCall {
        receiver: Receiver,
        name: String,
        args: Vec<Expr>,
    },
    New {
        outer: Option<Box<Expr>>,
        class_type: TypeRef,
        args: Vec<Expr>,
        body: Option<Box<TypeDecl>>,
    },
    NewArray {
        elem_type: TypeRef,
        dims: Vec<Expr>,
        extra_dims: usize,
        init: Option<ArrayInit>,
    },
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Cast {
        target_type: TypeRef,
        expr: Box<Expr>,
    },
    InstanceOf {
        expr: Box<Expr>,
        target_type: TypeRef,
    },
    This {
        qualifier: Option<String>,
    },
    ClassLit(TypeRef),
    Paren(Box<Expr>),
}

impl Expr {
    /// Strips redundant parentheses.
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    /// Whether the expression may be used as a statement on its own.
    pub fn is_statement_expression(&self) -> bool {
        match &self.kind {
            ExprKind::Assign { .. } | ExprKind::MethodCall { .. } | ExprKind::New { .. } => true,
            ExprKind::Unary { op, .. } => op.is_increment(),
            _ => false,
        }
    }
}

macro_rules! spanned {
    ($($node:ty),* $(,)?) => {
        $(impl HasSpan for $node {
            fn span(&self) -> Span {
                self.span
            }
        })*
    };
}

spanned!(
    ImportDecl,
    TypeRef,
    TypeDecl,
    FieldDecl,
    VarDeclarator,
    ArrayInit,
    Param,
    MethodDecl,
    CtorCall,
    ConstructorDecl,
    Initializer,
    Block,
    LocalVarDecl,
    CatchClause,
);
