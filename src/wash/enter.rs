//! Enter phase: declare classes, resolve imports and supertypes, and enter
//! class members into the type arena.
//!
//! Classes of the batch become visible to each other before any of their
//! members are looked at, so sibling units may refer to each other in any
//! order. Local and anonymous classes go through the same steps when the
//! attribution phase reaches them.

use std::collections::HashSet;

use super::scope::FrameKind;
use super::{locate, semantic_at, BodyCtx, ClassKind, PendingConstant, Resolver, SourceClass, UnitImports};
use crate::ast::{
    Expr, ExprKind, Literal, Member, Modifier, Modifiers, Span, TypeDecl, TypeParam, TypeRef, TypeRefKind, VarInit,
};
use crate::codegen::defs::access_flags::*;
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::common::model::{ClassData, ClassOrigin, ConstValue, FieldData, MethodData};
use crate::common::types::{PrimitiveType, TypeId};
use crate::error::{Error, Result};

/// Class file flags for a set of modifiers
pub(crate) fn modifier_flags(modifiers: &Modifiers) -> u16 {
    modifiers.list.iter().fold(0, |flags, m| {
        flags
            | match m {
                Modifier::Public => ACC_PUBLIC,
                Modifier::Protected => ACC_PROTECTED,
                Modifier::Private => ACC_PRIVATE,
                Modifier::Abstract => ACC_ABSTRACT,
                Modifier::Static => ACC_STATIC,
                Modifier::Final => ACC_FINAL,
                Modifier::Native => ACC_NATIVE,
                Modifier::Synchronized => ACC_SYNCHRONIZED,
                Modifier::Transient => ACC_TRANSIENT,
                Modifier::Volatile => ACC_VOLATILE,
                Modifier::Strictfp => ACC_STRICT,
                Modifier::Default => 0,
            }
    })
}

/// Could this initializer be a constant expression? Only such
/// initializers are evaluated ahead of the rest of the class.
fn may_be_constant(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal(Literal::Null) => false,
        ExprKind::Literal(_) | ExprKind::Name(_) => true,
        ExprKind::FieldAccess { target, .. } => may_be_constant(target),
        ExprKind::Unary { op, operand } => !op.is_increment() && may_be_constant(operand),
        ExprKind::Binary { left, right, .. } => may_be_constant(left) && may_be_constant(right),
        ExprKind::Conditional { cond, then_expr, else_expr } => {
            may_be_constant(cond) && may_be_constant(then_expr) && may_be_constant(else_expr)
        }
        ExprKind::Cast { expr, .. } | ExprKind::Paren(expr) => may_be_constant(expr),
        _ => false,
    }
}

impl<'u> Resolver<'u> {
    /// Declare, then enter, every class of every unit
    pub fn enter_all(&mut self) -> Result<()> {
        let units = self.units;
        for (index, unit) in units.iter().enumerate() {
            let package = unit.package.as_ref().map(|p| p.name.replace('.', "/"));
            for decl in &unit.types {
                let name = match &package {
                    Some(p) => format!("{}/{}", p, decl.name),
                    None => decl.name.clone(),
                };
                self.guarded(|r| r.declare_class(decl, index, None, ClassKind::TopLevel, name).map(|_| ()))?;
            }
        }
        log::debug!("declared {} class(es)", self.classes.len());

        for index in 0..units.len() {
            self.guarded(|r| r.resolve_imports(index))?;
        }
        let count = self.classes.len();
        for index in 0..count {
            self.define_skeleton(index);
        }
        for index in 0..count {
            self.guarded(|r| r.in_class(index, |r| r.enter_supertypes(index)))?;
        }
        for index in 0..count {
            self.guarded(|r| r.check_cycles(index))?;
        }
        for index in 0..count {
            self.guarded(|r| r.in_class(index, |r| r.enter_members(index)))?;
        }
        for index in 0..count {
            self.guarded(|r| r.check_abstract_methods(index))?;
        }
        self.resolve_field_constants()
    }

    /// Declare a class and, recursively, its member classes
    pub(crate) fn declare_class(
        &mut self,
        decl: &'u TypeDecl,
        unit: usize,
        outer: Option<usize>,
        kind: ClassKind,
        internal: String,
    ) -> Result<usize> {
        if !self.used_names.insert(internal.clone()) {
            return Err(semantic_at(decl, format!("duplicate class: {}", internal.replace(['/', '$'], "."))));
        }
        let ty = self.arena.declare_source_class(&internal)?;

        let outer_is_interface = outer.map(|o| self.classes.get(o).decl.is_interface()).unwrap_or(false);
        let mut flags = modifier_flags(&decl.modifiers);
        if decl.is_interface() {
            flags |= ACC_INTERFACE | ACC_ABSTRACT;
            if kind == ClassKind::Member {
                flags |= ACC_STATIC;
            }
        }
        if outer_is_interface {
            flags |= ACC_PUBLIC | ACC_STATIC;
        }
        let access = match kind {
            ClassKind::TopLevel => flags & (ACC_PUBLIC | ACC_FINAL | ACC_ABSTRACT | ACC_INTERFACE),
            _ => {
                let visibility = if flags & (ACC_PUBLIC | ACC_PROTECTED) != 0 { ACC_PUBLIC } else { 0 };
                visibility | (flags & (ACC_FINAL | ACC_ABSTRACT | ACC_INTERFACE))
            }
        };
        let access = if decl.is_interface() { access } else { access | ACC_SUPER };
        let outer_this = match (kind, outer) {
            (ClassKind::Member, Some(o)) if flags & ACC_STATIC == 0 && !decl.is_interface() => Some(self.classes.get(o).ty),
            _ => None,
        };
        let top = outer.map(|o| self.classes.get(o).top).unwrap_or(self.classes.len());

        let index = self.classes.push(SourceClass {
            ty,
            decl,
            unit,
            outer,
            kind,
            top,
            simple_name: decl.name.clone(),
            access,
            inner_access: flags & !(ACC_SYNCHRONIZED | ACC_VOLATILE | ACC_TRANSIENT | ACC_NATIVE),
            outer_this,
            captures: Vec::new(),
            anonymous: None,
            accessors: Vec::new(),
        });
        log::trace!("declared {} ({:?})", internal, kind);

        let mut seen = HashSet::new();
        for member in decl.member_types() {
            if !seen.insert(member.name.as_str()) {
                return Err(semantic_at(member, format!("duplicate class: {}", member.name)));
            }
            let name = format!("{}${}", internal, member.name);
            self.declare_class(member, unit, Some(index), ClassKind::Member, name)?;
        }
        Ok(index)
    }

    /// Make the class visible with its flags and member types; supertypes
    /// and members follow
    pub(crate) fn define_skeleton(&mut self, index: usize) {
        let class = self.classes.get(index);
        let decl = class.decl;
        let member_types = decl
            .member_types()
            .filter_map(|m| {
                let member = self.classes.index_of_decl(m.id)?;
                Some((m.name.clone(), self.classes.get(member).ty))
            })
            .collect();
        let data = ClassData {
            name: self.arena.class_name(class.ty).unwrap_or_default().to_string(),
            access: class.inner_access | (class.access & ACC_SUPER),
            super_class: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            member_types,
            outer: class.outer.map(|o| self.classes.get(o).ty),
            outer_instance: class.outer_this,
            origin: ClassOrigin::Source,
        };
        let ty = class.ty;
        self.arena.define(ty, data);
    }

    /// Replace parts of a class's data
    fn update_class(&mut self, ty: TypeId, change: impl FnOnce(&mut ClassData)) -> Result<()> {
        let mut data = (*self.arena.class_data(ty)?).clone();
        change(&mut data);
        self.arena.define(ty, data);
        Ok(())
    }

    /// Run `f` with the scope of the class body: the live scope when the
    /// class is nested in the class currently in scope, otherwise the
    /// chain of enclosing classes rebuilt from scratch
    pub(crate) fn in_class<T>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let outer = self.classes.get(index).outer;
        let nested_in_scope = outer.is_some() && self.scope.current_class() == outer;
        let saved_unit = self.unit;
        let saved_body = self.body;
        let depth = self.scope.depth();
        let saved_scope = if nested_in_scope {
            None
        } else {
            Some(std::mem::take(&mut self.scope))
        };

        self.unit = self.classes.get(index).unit;
        self.body = BodyCtx::default();
        let result = match self.push_class_chain(index, outer, nested_in_scope) {
            Ok(()) => f(self),
            Err(error) => Err(error),
        };

        match saved_scope {
            Some(scope) => self.scope = scope,
            None => self.scope.truncate(depth),
        }
        self.unit = saved_unit;
        self.body = saved_body;
        result
    }

    fn push_class_chain(&mut self, index: usize, outer: Option<usize>, nested_in_scope: bool) -> Result<()> {
        if !nested_in_scope {
            let mut chain = Vec::new();
            let mut current = outer;
            while let Some(o) = current {
                chain.push(o);
                current = self.classes.get(o).outer;
            }
            for &c in chain.iter().rev() {
                self.push_class_frame(c)?;
            }
        }
        self.push_class_frame(index)
    }

    fn push_class_frame(&mut self, index: usize) -> Result<()> {
        self.scope.push(FrameKind::Class(index));
        let decl = self.classes.get(index).decl;
        self.declare_type_params(&decl.type_params)
    }

    /// Type parameters are erased to their first bound
    pub(crate) fn declare_type_params(&mut self, params: &[TypeParam]) -> Result<()> {
        for param in params {
            self.scope.declare_type(&param.name, TypeId::OBJECT);
        }
        for param in params {
            let erasure = match param.bounds.first() {
                Some(bound) => self.resolve_type_ref(bound)?,
                None => TypeId::OBJECT,
            };
            self.scope.declare_type(&param.name, erasure);
        }
        Ok(())
    }

    fn resolve_imports(&mut self, unit_index: usize) -> Result<()> {
        while self.imports.len() <= unit_index {
            self.imports.push(UnitImports::default());
        }
        self.unit = unit_index;
        let units = self.units;
        let unit = &units[unit_index];
        let mut imports = UnitImports {
            on_demand_packages: vec!["java/lang".to_string()],
            ..UnitImports::default()
        };
        for import in &unit.imports {
            let location = import.span.start;
            if import.is_static {
                if import.is_wildcard {
                    let owner = self.resolve_qualified_type(&import.name, import.span)?;
                    imports.static_on_demand.push(owner);
                } else {
                    let (owner_name, member) = import
                        .name
                        .rsplit_once('.')
                        .ok_or_else(|| Error::semantic("static import needs a class name", location))?;
                    let owner = self.resolve_qualified_type(owner_name, import.span)?;
                    let has_field = self.arena.find_field(owner, member).map_err(|e| locate(e, location))?.is_some();
                    let has_method =
                        !self.arena.find_methods(owner, member).map_err(|e| locate(e, location))?.is_empty();
                    if !has_field && !has_method {
                        return Err(Error::semantic(
                            format!("cannot find symbol: static {} in {}", member, self.arena.display(owner)),
                            location,
                        ));
                    }
                    imports.static_single.push((member.to_string(), owner));
                }
            } else if import.is_wildcard {
                let internal = import.name.replace('.', "/");
                match self.arena.lookup_class(&internal).map_err(|e| locate(e, location))? {
                    Some(class) => imports.on_demand_types.push(class),
                    None => imports.on_demand_packages.push(internal),
                }
            } else {
                let ty = self.resolve_qualified_type(&import.name, import.span)?;
                let simple = import.name.rsplit('.').next().unwrap_or(&import.name).to_string();
                if let Some((_, existing)) = imports.single.iter().find(|(n, _)| *n == simple) {
                    if *existing != ty {
                        return Err(Error::semantic(
                            format!("a type named {} is already imported", simple),
                            location,
                        ));
                    }
                }
                imports.single.push((simple, ty));
            }
        }
        self.imports[unit_index] = imports;
        Ok(())
    }

    /// Resolve a type written in source
    pub(crate) fn resolve_type_ref(&mut self, type_ref: &TypeRef) -> Result<TypeId> {
        let base = match &type_ref.kind {
            TypeRefKind::Primitive(kind) => {
                let p = PrimitiveType::from_kind(*kind);
                if p == PrimitiveType::Void && type_ref.dims > 0 {
                    return Err(Error::semantic("'void' type not allowed here", type_ref.span.start));
                }
                TypeId::of(p)
            }
            TypeRefKind::Named { name, .. } => self.resolve_qualified_type(name, type_ref.span)?,
        };
        Ok(self.arena.array_of_dims(base, type_ref.dims))
    }

    /// Resolve a possibly qualified type name, failing when it is unknown
    pub(crate) fn resolve_qualified_type(&mut self, name: &str, span: Span) -> Result<TypeId> {
        match self.find_qualified_type(name, span)? {
            Some(ty) => Ok(ty),
            None => Err(Error::semantic(format!("cannot find symbol: class {}", name), span.start)),
        }
    }

    pub(crate) fn find_qualified_type(&mut self, name: &str, span: Span) -> Result<Option<TypeId>> {
        let parts: Vec<&str> = name.split('.').collect();
        let location = span.start;
        let mut current = self.find_simple_type(parts[0], span)?;
        let mut consumed = 1;
        if current.is_none() {
            // longest run of package segments followed by a class
            let mut prefix = parts[0].to_string();
            while consumed < parts.len() {
                prefix = format!("{}/{}", prefix, parts[consumed]);
                consumed += 1;
                if let Some(ty) = self.arena.lookup_class(&prefix).map_err(|e| locate(e, location))? {
                    current = Some(ty);
                    break;
                }
            }
        }
        let Some(mut ty) = current else {
            return Ok(None);
        };
        for part in &parts[consumed..] {
            ty = match self.member_type(ty, part, span)? {
                Some(member) => member,
                None => return Ok(None),
            };
        }
        Ok(Some(ty))
    }

    /// Member class of `owner`, inherited ones included
    pub(crate) fn member_type(&mut self, owner: TypeId, simple: &str, span: Span) -> Result<Option<TypeId>> {
        let location = span.start;
        if let Some(ty) = self.arena.find_member_type(owner, simple).map_err(|e| locate(e, location))? {
            return Ok(Some(ty));
        }
        let Some(owner_name) = self.arena.class_name(owner).map(str::to_string) else {
            return Ok(None);
        };
        self.arena
            .lookup_class(&format!("{}${}", owner_name, simple))
            .map_err(|e| locate(e, location))
    }

    /// Simple type name lookup: type variables and local classes, member
    /// classes of enclosing classes, the unit's own types, single-type
    /// imports, the package, then on-demand imports
    pub(crate) fn find_simple_type(&mut self, name: &str, span: Span) -> Result<Option<TypeId>> {
        let location = span.start;
        let frames: Vec<(FrameKind, Option<TypeId>)> =
            self.scope.frames().map(|f| (f.kind, f.local_type(name))).collect();
        for (kind, local) in frames {
            if let Some(ty) = local {
                return Ok(Some(ty));
            }
            if let FrameKind::Class(index) = kind {
                let class_ty = self.classes.get(index).ty;
                if let Some(ty) = self.arena.find_member_type(class_ty, name).map_err(|e| locate(e, location))? {
                    return Ok(Some(ty));
                }
            }
        }

        let unit = &self.units[self.unit];
        let package = unit.package.as_ref().map(|p| p.name.replace('.', "/"));
        let qualify = |simple: &str| match &package {
            Some(p) => format!("{}/{}", p, simple),
            None => simple.to_string(),
        };
        if unit.types.iter().any(|t| t.name == name) {
            return self.arena.lookup_class(&qualify(name)).map_err(|e| locate(e, location));
        }
        if let Some(imports) = self.imports.get(self.unit) {
            if let Some((_, ty)) = imports.single.iter().find(|(n, _)| n == name) {
                return Ok(Some(*ty));
            }
        }
        if let Some(ty) = self.arena.lookup_class(&qualify(name)).map_err(|e| locate(e, location))? {
            return Ok(Some(ty));
        }

        let (packages, types) = match self.imports.get(self.unit) {
            Some(imports) => (imports.on_demand_packages.clone(), imports.on_demand_types.clone()),
            None => (vec!["java/lang".to_string()], Vec::new()),
        };
        let mut found: Vec<TypeId> = Vec::new();
        for package in packages {
            if let Some(ty) = self
                .arena
                .lookup_class(&format!("{}/{}", package, name))
                .map_err(|e| locate(e, location))?
            {
                if !found.contains(&ty) {
                    found.push(ty);
                }
            }
        }
        for owner in types {
            if let Some(ty) = self.member_type(owner, name, span)? {
                if !found.contains(&ty) {
                    found.push(ty);
                }
            }
        }
        match found.len() {
            0 => Ok(None),
            1 => Ok(Some(found[0])),
            _ => {
                let candidates = found.iter().map(|&t| self.arena.display(t)).collect();
                Err(Error::ambiguous(format!("reference to {} is ambiguous", name), location, candidates))
            }
        }
    }

    pub(crate) fn enter_supertypes(&mut self, index: usize) -> Result<()> {
        let class = self.classes.get(index);
        let decl = class.decl;
        let ty = class.ty;
        let mut super_class = None;
        let mut interfaces = Vec::new();

        if decl.is_interface() {
            super_class = Some(TypeId::OBJECT);
            for type_ref in &decl.extends {
                let interface = self.resolve_type_ref(type_ref)?;
                if !self.arena.is_interface(interface).map_err(|e| locate(e, type_ref.span.start))? {
                    return Err(semantic_at(type_ref, "interface expected here"));
                }
                interfaces.push(interface);
            }
        } else {
            if let Some(type_ref) = decl.extends.first() {
                let parent = self.resolve_type_ref(type_ref)?;
                if !self.arena.is_class(parent) {
                    return Err(semantic_at(type_ref, "class expected here"));
                }
                let data = self.arena.class_data(parent).map_err(|e| locate(e, type_ref.span.start))?;
                if data.is_interface() {
                    return Err(semantic_at(type_ref, "no interface expected here"));
                }
                if data.is_final() {
                    return Err(semantic_at(
                        type_ref,
                        format!("cannot inherit from final {}", self.arena.display(parent)),
                    ));
                }
                super_class = Some(parent);
            } else if ty != TypeId::OBJECT {
                super_class = Some(TypeId::OBJECT);
            }
            for type_ref in &decl.implements {
                let interface = self.resolve_type_ref(type_ref)?;
                if !self.arena.is_interface(interface).map_err(|e| locate(e, type_ref.span.start))? {
                    return Err(semantic_at(type_ref, "interface expected here"));
                }
                interfaces.push(interface);
            }
        }
        self.update_class(ty, |data| {
            data.super_class = super_class;
            data.interfaces = interfaces;
        })
    }

    /// Reject a class that is its own supertype; the cycle is cut so later
    /// phases can still walk the hierarchy
    pub(crate) fn check_cycles(&mut self, index: usize) -> Result<()> {
        let start = self.classes.get(index).ty;
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if self.classes.index_of(current).is_none() || !seen.insert(current) {
                continue;
            }
            let data = self.arena.class_data(current)?;
            let supers: Vec<TypeId> = data.super_class.iter().chain(data.interfaces.iter()).copied().collect();
            if supers.contains(&start) {
                let decl = self.classes.get(index).decl;
                self.update_class(start, |data| {
                    data.super_class = Some(TypeId::OBJECT);
                    data.interfaces.clear();
                })?;
                return Err(semantic_at(
                    decl,
                    format!("cyclic inheritance involving {}", self.arena.display(start)),
                ));
            }
            stack.extend(supers);
        }
        Ok(())
    }

    /// Enter fields, methods and constructors
    pub(crate) fn enter_members(&mut self, index: usize) -> Result<()> {
        let class = self.classes.get(index);
        let decl = class.decl;
        let ty = class.ty;
        let is_interface = decl.is_interface();
        let class_abstract = decl.modifiers.is_abstract() || is_interface;
        let mut fields: Vec<FieldData> = Vec::new();
        let mut methods: Vec<MethodData> = Vec::new();

        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    let mut access = modifier_flags(&field.modifiers);
                    if is_interface {
                        access |= ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
                    }
                    let base = self.resolve_type_ref(&field.type_ref)?;
                    for declarator in &field.declarators {
                        if fields.iter().any(|f| f.name == declarator.name) {
                            return Err(semantic_at(
                                declarator,
                                format!(
                                    "variable {} is already defined in class {}",
                                    declarator.name,
                                    self.arena.display(ty)
                                ),
                            ));
                        }
                        let field_ty = self.arena.array_of_dims(base, declarator.dims);
                        let data = FieldData {
                            name: declarator.name.clone(),
                            owner: ty,
                            ty: field_ty,
                            access,
                            constant: None,
                        };
                        let constant_type = self.arena.is_primitive(field_ty) || field_ty == TypeId::STRING;
                        if let Some(VarInit::Expr(init)) = &declarator.init {
                            if access & ACC_FINAL != 0 && constant_type && may_be_constant(init) {
                                self.pending_constants.insert(
                                    (ty, declarator.name.clone()),
                                    PendingConstant {
                                        class: index,
                                        declarator,
                                        is_static: access & ACC_STATIC != 0,
                                    },
                                );
                            }
                        }
                        self.tables.fields.insert(declarator.id, data.clone());
                        fields.push(data);
                    }
                }
                Member::Method(method) => {
                    let depth = self.scope.depth();
                    self.scope.push(FrameKind::Block);
                    let result = (|| {
                        self.declare_type_params(&method.type_params)?;
                        let mut params = Vec::with_capacity(method.params.len());
                        for param in &method.params {
                            params.push(self.resolve_type_ref(&param.type_ref)?);
                        }
                        let ret = self.resolve_type_ref(&method.return_type)?;
                        let throws = self.resolve_throws(&method.throws)?;
                        Ok::<_, Error>((params, ret, throws))
                    })();
                    self.scope.truncate(depth);
                    let (params, ret, throws) = result?;

                    let mut access = modifier_flags(&method.modifiers);
                    if method.params.last().map(|p| p.varargs).unwrap_or(false) {
                        access |= ACC_VARARGS;
                    }
                    if is_interface {
                        if method.body.is_some() {
                            return Err(semantic_at(method, "interface abstract methods cannot have body"));
                        }
                        if access & ACC_STATIC != 0 {
                            return Err(semantic_at(method, "static methods in interfaces are not supported"));
                        }
                        access |= ACC_PUBLIC | ACC_ABSTRACT;
                    } else if access & ACC_ABSTRACT != 0 {
                        if method.body.is_some() {
                            return Err(semantic_at(method, "abstract methods cannot have a body"));
                        }
                        if !class_abstract {
                            return Err(semantic_at(
                                method,
                                format!(
                                    "{} is not abstract and does not override abstract method {} in {}",
                                    self.arena.display(ty),
                                    method.name,
                                    self.arena.display(ty)
                                ),
                            ));
                        }
                    } else if method.body.is_none() && access & ACC_NATIVE == 0 {
                        return Err(semantic_at(method, "missing method body, or declare abstract"));
                    }

                    let data = MethodData {
                        name: method.name.clone(),
                        owner: ty,
                        params,
                        ret,
                        throws,
                        access,
                    };
                    self.check_duplicate_method(&methods, &data, method.span, ty)?;
                    self.tables.methods.insert(method.id, data.clone());
                    methods.push(data);
                }
                Member::Constructor(ctor) => {
                    if is_interface {
                        return Err(semantic_at(ctor, "interfaces cannot have constructors"));
                    }
                    let depth = self.scope.depth();
                    self.scope.push(FrameKind::Block);
                    let result = (|| {
                        self.declare_type_params(&ctor.type_params)?;
                        let mut params = Vec::with_capacity(ctor.params.len());
                        for param in &ctor.params {
                            params.push(self.resolve_type_ref(&param.type_ref)?);
                        }
                        let throws = self.resolve_throws(&ctor.throws)?;
                        Ok::<_, Error>((params, throws))
                    })();
                    self.scope.truncate(depth);
                    let (params, throws) = result?;

                    let mut access = modifier_flags(&ctor.modifiers) & VISIBILITY_MASK;
                    if ctor.params.last().map(|p| p.varargs).unwrap_or(false) {
                        access |= ACC_VARARGS;
                    }
                    let data = MethodData {
                        name: CONSTRUCTOR_METHOD_NAME.to_string(),
                        owner: ty,
                        params,
                        ret: TypeId::VOID,
                        throws,
                        access,
                    };
                    self.check_duplicate_method(&methods, &data, ctor.span, ty)?;
                    self.tables.methods.insert(ctor.id, data.clone());
                    methods.push(data);
                }
                Member::Initializer(_) | Member::Type(_) => {}
            }
        }

        if !is_interface && !methods.iter().any(|m| m.is_constructor()) {
            let class = self.classes.get(index);
            let access = if class.kind == ClassKind::Anonymous {
                0
            } else {
                class.inner_access & VISIBILITY_MASK
            };
            let default = MethodData {
                name: CONSTRUCTOR_METHOD_NAME.to_string(),
                owner: ty,
                params: Vec::new(),
                ret: TypeId::VOID,
                throws: Vec::new(),
                access,
            };
            self.tables.methods.insert(decl.id, default.clone());
            methods.push(default);
        }

        log::trace!(
            "entered {}: {} field(s), {} method(s)",
            self.arena.display(ty),
            fields.len(),
            methods.len()
        );
        self.update_class(ty, |data| {
            data.fields = fields;
            data.methods = methods;
        })
    }

    fn resolve_throws(&mut self, throws: &[TypeRef]) -> Result<Vec<TypeId>> {
        let mut types = Vec::with_capacity(throws.len());
        for type_ref in throws {
            let ty = self.resolve_type_ref(type_ref)?;
            if !self
                .arena
                .is_subtype(ty, TypeId::THROWABLE)
                .map_err(|e| locate(e, type_ref.span.start))?
            {
                return Err(semantic_at(
                    type_ref,
                    format!("incompatible types: {} cannot be converted to java.lang.Throwable", self.arena.display(ty)),
                ));
            }
            types.push(ty);
        }
        Ok(types)
    }

    fn check_duplicate_method(&self, methods: &[MethodData], data: &MethodData, span: Span, owner: TypeId) -> Result<()> {
        if methods.iter().any(|m| m.name == data.name && m.params == data.params) {
            let params: Vec<String> = data.params.iter().map(|&p| self.arena.display(p)).collect();
            let name = if data.is_constructor() {
                self.arena.display(owner).rsplit('.').next().unwrap_or_default().to_string()
            } else {
                data.name.clone()
            };
            return Err(Error::semantic(
                format!(
                    "{} {}({}) is already defined in class {}",
                    if data.is_constructor() { "constructor" } else { "method" },
                    name,
                    params.join(","),
                    self.arena.display(owner)
                ),
                span.start,
            ));
        }
        Ok(())
    }

    /// A concrete class must implement every inherited abstract method
    pub(crate) fn check_abstract_methods(&mut self, index: usize) -> Result<()> {
        let class = self.classes.get(index);
        let decl = class.decl;
        if decl.is_interface() || decl.modifiers.is_abstract() {
            return Ok(());
        }
        let ty = class.ty;
        let missing = self
            .arena
            .unimplemented_abstract_methods(ty)
            .map_err(|e| locate(e, decl.span.start))?;
        if let Some(method) = missing.first() {
            let params: Vec<String> = method.params.iter().map(|&p| self.arena.display(p)).collect();
            let name = if decl.is_anonymous() {
                format!("<anonymous {}>", self.arena.display(ty))
            } else {
                self.arena.display(ty)
            };
            return Err(semantic_at(
                decl,
                format!(
                    "{} is not abstract and does not override abstract method {}({}) in {}",
                    name,
                    method.name,
                    params.join(","),
                    self.arena.display(method.owner)
                ),
            ));
        }
        Ok(())
    }

    /// Evaluate the constant initializers of top-level and member classes
    fn resolve_field_constants(&mut self) -> Result<()> {
        let mut keys: Vec<(TypeId, String, usize)> = self
            .pending_constants
            .iter()
            .map(|((ty, name), pending)| (*ty, name.clone(), pending.declarator.span.start.offset))
            .collect();
        keys.sort_by_key(|(ty, _, offset)| (*ty, *offset));
        for (ty, name, _) in keys {
            self.field_constant(ty, &name)?;
        }
        Ok(())
    }

    /// Constant value of a final field of the batch, evaluating its
    /// initializer on first use. Initializers that fail to resolve are not
    /// constants; their errors surface when the class body is attributed.
    pub(crate) fn field_constant(&mut self, owner: TypeId, name: &str) -> Result<Option<ConstValue>> {
        let key = (owner, name.to_string());
        let Some(pending) = self.pending_constants.get(&key).copied() else {
            return Ok(self.arena.find_field(owner, name)?.and_then(|f| f.constant));
        };
        if !self.constants_in_progress.insert(pending.declarator.id) {
            return Ok(None);
        }
        let field_ty = self
            .tables
            .fields
            .get(&pending.declarator.id)
            .map(|f| f.ty)
            .ok_or_else(|| Error::internal(format!("field {} was not entered", name)))?;

        let evaluate = |r: &mut Self| {
            r.body = BodyCtx {
                kind: super::BodyKind::FieldInit,
                is_static: pending.is_static,
                prologue: false,
            };
            r.scope.push(FrameKind::Method {
                is_static: pending.is_static,
                is_constructor: false,
            });
            match &pending.declarator.init {
                Some(VarInit::Expr(init)) => r.initializer_constant(init, field_ty),
                _ => Ok(None),
            }
        };
        // a local class in scope keeps the enclosing locals visible
        let result = if self.scope.current_class() == Some(pending.class) {
            let depth = self.scope.depth();
            let body = self.body;
            let result = evaluate(self);
            self.scope.truncate(depth);
            self.body = body;
            result
        } else {
            self.in_class(pending.class, evaluate)
        };
        self.constants_in_progress.remove(&pending.declarator.id);
        self.pending_constants.remove(&key);

        let constant = match result {
            Ok(constant) => constant,
            Err(error) if error.is_internal() => return Err(error),
            Err(_) => None,
        };
        if let Some(value) = &constant {
            log::trace!("constant {}.{} = {}", self.arena.display(owner), name, value);
            let value = value.clone();
            let field_name = name.to_string();
            self.update_class(owner, |data| {
                if let Some(field) = data.fields.iter_mut().find(|f| f.name == field_name) {
                    field.constant = Some(value);
                }
            })?;
            if let Some(field) = self.tables.fields.get_mut(&pending.declarator.id) {
                field.constant = constant.clone();
            }
        }
        Ok(constant)
    }

    /// Attribute an initializer and convert its constant value to the
    /// variable's type
    pub(crate) fn initializer_constant(&mut self, init: &'u Expr, ty: TypeId) -> Result<Option<ConstValue>> {
        let info = self.attr_expr(init)?;
        let Some(value) = info.constant else {
            return Ok(None);
        };
        if ty == TypeId::STRING {
            return Ok(match value {
                ConstValue::String(_) => Some(value),
                _ => None,
            });
        }
        let Some(p) = self.arena.primitive(ty) else {
            return Ok(None);
        };
        if super::conversion::convert(&mut self.arena, info.ty, ty, Some(&value), super::conversion::Context::Assignment)?
            .is_none()
        {
            return Ok(None);
        }
        Ok(value.convert_to(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::cache::ExternalTypes;
    use crate::config::Config;
    use crate::parser::parse_compilation_unit;

    fn entered(sources: &[&str]) -> Result<Vec<String>> {
        let units: Vec<_> = sources.iter().map(|s| parse_compilation_unit(s).unwrap()).collect();
        let config = Config::default();
        let mut resolver = Resolver::new(&units, ExternalTypes::bootstrap(), &config);
        resolver.enter_all()?;
        Ok(resolver
            .classes
            .iter()
            .map(|c| resolver.arena.class_name(c.ty).unwrap_or_default().to_string())
            .collect())
    }

    #[test]
    fn nested_classes_get_binary_names() {
        let names = entered(&["package p; class A { class B { interface C {} } static class D {} }"]).unwrap();
        assert_eq!(names, vec!["p/A", "p/A$B", "p/A$B$C", "p/A$D"]);
    }

    #[test]
    fn sibling_units_see_each_other_in_any_order() {
        let names = entered(&["class A extends B {}", "class B { A a; }"]).unwrap();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn cyclic_inheritance_is_rejected() {
        let err = entered(&["class A extends B {} class B extends A {}"]).unwrap_err();
        assert!(err.to_string().contains("cyclic inheritance"), "{}", err);
    }

    #[test]
    fn final_superclass_is_rejected() {
        let err = entered(&["class A extends String {}"]).unwrap_err();
        assert!(err.to_string().contains("cannot inherit from final"), "{}", err);
    }

    #[test]
    fn duplicate_methods_are_rejected() {
        let err = entered(&["class A { void m(int a) {} void m(int b) {} }"]).unwrap_err();
        assert!(err.to_string().contains("already defined"), "{}", err);
    }

    #[test]
    fn unknown_supertype_is_reported_at_the_reference() {
        let err = entered(&["class A extends Missing {}"]).unwrap_err();
        assert!(err.to_string().contains("cannot find symbol: class Missing"), "{}", err);
    }

    #[test]
    fn concrete_class_must_implement_interface_methods() {
        let err = entered(&["class A implements Runnable {}"]).unwrap_err();
        assert!(err.to_string().contains("does not override abstract method run()"), "{}", err);
    }

    #[test]
    fn modifier_flags_cover_visibility() {
        let modifiers = Modifiers {
            list: vec![Modifier::Public, Modifier::Static, Modifier::Final],
            annotations: Vec::new(),
        };
        assert_eq!(modifier_flags(&modifiers), ACC_PUBLIC | ACC_STATIC | ACC_FINAL);
    }
}
