//! Member lookup shared by the attribution of names, field accesses and
//! calls: access control, enclosing instances, captured locals and the
//! synthetic accessors nest members use to reach each other's private
//! members.

use super::scope::FrameKind;
use super::{
    locate, Accessor, AccessorRef, AccessorTarget, Capture, ExprInfo, FieldAccess, NameStart, NamePath, NameStep,
    OuterPath, Recv, Resolver,
};
use crate::ast::{Location, NodeId, Span};
use crate::codegen::defs::access_flags::*;
use crate::common::model::{package_of, FieldData, MethodData};
use crate::common::types::TypeId;
use crate::error::{Error, Result};

/// Which way a variable is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Use {
    Read,
    Write,
    ReadWrite,
}

impl Use {
    fn reads(self) -> bool {
        self != Use::Write
    }

    fn writes(self) -> bool {
        self != Use::Read
    }
}

/// Meaning of a (possibly qualified) name
#[derive(Debug, Clone)]
pub(crate) enum Named {
    Value(ExprInfo),
    Type(TypeId),
    Package(String),
}

impl<'u> Resolver<'u> {
    /// Binary name of the class at `index`
    fn internal_name_of(&self, index: usize) -> String {
        self.classes.get(index).internal_name(&self.arena).to_string()
    }

    /// Can code in the current class use a member of `owner` with these flags?
    pub(crate) fn accessible(&mut self, owner: TypeId, access: u16) -> Result<bool> {
        let current = self.current_type()?;
        if owner == current || access & ACC_PUBLIC != 0 {
            return Ok(true);
        }
        if access & ACC_PRIVATE != 0 {
            return Ok(self.same_nest(owner, current));
        }
        let owner_name = self.arena.class_name(owner).unwrap_or("").to_string();
        let current_name = self.internal_name_of(self.current_class()?);
        if package_of(&owner_name) == package_of(&current_name) {
            return Ok(true);
        }
        if access & ACC_PROTECTED != 0 {
            for index in self.scope.enclosing_classes() {
                let ty = self.classes.get(index).ty;
                if self.arena.is_subclass(ty, owner)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    pub(crate) fn check_member_access(
        &mut self,
        owner: TypeId,
        access: u16,
        what: &str,
        location: Location,
    ) -> Result<()> {
        if self.accessible(owner, access).map_err(|e| locate(e, location))? {
            return Ok(());
        }
        let owner_name = self.arena.display(owner);
        let message = if access & ACC_PRIVATE != 0 {
            format!("{} has private access in {}", what, owner_name)
        } else if access & ACC_PROTECTED != 0 {
            format!("{} has protected access in {}", what, owner_name)
        } else {
            format!("{} is not public in {}; cannot be accessed from outside package", what, owner_name)
        };
        Err(Error::semantic(message, location))
    }

    /// Is `this` unavailable in the code being attributed?
    pub(crate) fn in_static_context(&self) -> bool {
        self.scope.is_static_context()
    }

    /// Path to the innermost enclosing instance (starting with `this`)
    /// whose class is `target` or a subclass of it
    pub(crate) fn enclosing_instance(&mut self, target: TypeId, location: Location) -> Result<OuterPath> {
        let current = self.current_class()?;
        self.instance_path(current, target, self.in_static_context() || self.body.prologue, location)
    }

    /// Walk `this$0` links from the class at `from`. When `skip_self` is
    /// set the walk must leave `from` before matching.
    pub(crate) fn instance_path(
        &mut self,
        from: usize,
        target: TypeId,
        skip_self: bool,
        location: Location,
    ) -> Result<OuterPath> {
        let mut path = Vec::new();
        let mut index = from;
        loop {
            let class = self.classes.get(index);
            let ty = class.ty;
            let outer_this = class.outer_this;
            if !(skip_self && path.is_empty()) && self.arena.is_subclass(ty, target).map_err(|e| locate(e, location))? {
                return Ok(OuterPath(path));
            }
            let Some(outer) = outer_this else {
                let message = if path.is_empty() && skip_self && ty == target {
                    "cannot reference this before supertype constructor has been called".to_string()
                } else {
                    "non-static variable this cannot be referenced from a static context".to_string()
                };
                return Err(Error::semantic(message, location));
            };
            let Some(next) = self.classes.index_of(outer) else {
                return Err(Error::semantic(
                    format!("an enclosing instance that contains {} is required", self.arena.display(target)),
                    location,
                ));
            };
            path.push(index);
            index = next;
        }
    }

    /// Receiver of a member found in the enclosing class `holder`
    fn implicit_receiver(&mut self, holder: usize, is_static: bool, what: &str, location: Location) -> Result<Recv> {
        if is_static {
            return Ok(Recv::Static);
        }
        let current = self.current_class()?;
        let static_here = self.in_static_context();
        if holder == current {
            if static_here {
                return Err(Error::semantic(
                    format!("non-static {} cannot be referenced from a static context", what),
                    location,
                ));
            }
            if self.body.prologue {
                return Err(Error::semantic(
                    format!("cannot reference {} before supertype constructor has been called", what),
                    location,
                ));
            }
            return Ok(Recv::Implicit(OuterPath::default()));
        }
        let mut path = Vec::new();
        let mut index = current;
        while index != holder {
            let outer_this = self.classes.get(index).outer_this;
            let blocked = outer_this.is_none() || (path.is_empty() && static_here);
            let next = outer_this.and_then(|o| self.classes.index_of(o));
            match next {
                Some(next) if !blocked => {
                    path.push(index);
                    index = next;
                }
                _ => {
                    return Err(Error::semantic(
                        format!("non-static {} cannot be referenced from a static context", what),
                        location,
                    ))
                }
            }
        }
        Ok(Recv::Implicit(OuterPath(path)))
    }

    /// Register a synthetic accessor on the owner of a private member,
    /// reusing one made earlier for the same member
    fn accessor(&mut self, target: AccessorTarget) -> Result<AccessorRef> {
        let (owner, key_name, is_write) = match &target {
            AccessorTarget::FieldRead(f) => (f.owner, f.name.clone(), false),
            AccessorTarget::FieldWrite(f) => (f.owner, f.name.clone(), true),
            AccessorTarget::Method(m) => (m.owner, m.name.clone(), false),
        };
        let index = self
            .classes
            .index_of(owner)
            .ok_or_else(|| Error::internal(format!("accessor on {}", self.arena.display(owner))))?;
        let owner_desc = self.arena.descriptor(owner);

        let descriptor = match &target {
            AccessorTarget::FieldRead(f) => {
                let receiver = if f.is_static() { String::new() } else { owner_desc };
                format!("({}){}", receiver, self.arena.descriptor(f.ty))
            }
            AccessorTarget::FieldWrite(f) => {
                let receiver = if f.is_static() { String::new() } else { owner_desc };
                let ty = self.arena.descriptor(f.ty);
                format!("({}{}){}", receiver, ty, ty)
            }
            AccessorTarget::Method(m) => {
                let receiver = if m.is_static() { String::new() } else { owner_desc };
                let params: String = m.params.iter().map(|&p| self.arena.descriptor(p)).collect();
                format!("({}{}){}", receiver, params, self.arena.descriptor(m.ret))
            }
        };

        let class = self.classes.get_mut(index);
        let same_target = |existing: &Accessor| match (&existing.target, &target) {
            (AccessorTarget::FieldRead(a), AccessorTarget::FieldRead(b))
            | (AccessorTarget::FieldWrite(a), AccessorTarget::FieldWrite(b)) => a.name == b.name,
            (AccessorTarget::Method(a), AccessorTarget::Method(b)) => a.name == b.name && a.params == b.params,
            _ => false,
        };
        if let Some(existing) = class.accessors.iter().find(|a| same_target(a)) {
            return Ok(AccessorRef {
                owner,
                name: existing.name.clone(),
                descriptor: existing.descriptor.clone(),
            });
        }
        let member_key = |t: &AccessorTarget| match t {
            AccessorTarget::FieldRead(f) | AccessorTarget::FieldWrite(f) => (f.name.clone(), None),
            AccessorTarget::Method(m) => (m.name.clone(), Some(m.params.clone())),
        };
        let mut members: Vec<(String, Option<Vec<TypeId>>)> = Vec::new();
        for existing in &class.accessors {
            let key = member_key(&existing.target);
            if !members.contains(&key) {
                members.push(key);
            }
        }
        let key = member_key(&target);
        let number = members.iter().position(|k| *k == key).unwrap_or(members.len());
        let name = format!("access${:03}", number * 100 + if is_write { 2 } else { 0 });
        log::trace!("accessor {} for {}", name, key_name);
        class.accessors.push(Accessor {
            target,
            name: name.clone(),
            descriptor: descriptor.clone(),
        });
        Ok(AccessorRef { owner, name, descriptor })
    }

    /// Does a use of this private member from the current class go
    /// through an accessor?
    pub(crate) fn needs_accessor(&self, owner: TypeId, access: u16) -> Result<bool> {
        Ok(access & ACC_PRIVATE != 0 && owner != self.current_type()? && self.classes.index_of(owner).is_some())
    }

    /// Build a field access, checking access and wiring accessors
    pub(crate) fn field_access(
        &mut self,
        field: FieldData,
        site: TypeId,
        receiver: Recv,
        usage: Use,
        location: Location,
    ) -> Result<FieldAccess> {
        self.check_member_access(field.owner, field.access, &field.name, location)?;
        let mut read = None;
        let mut write = None;
        if self.needs_accessor(field.owner, field.access)? {
            if usage.reads() {
                read = Some(self.accessor(AccessorTarget::FieldRead(field.clone()))?);
            }
            if usage.writes() {
                write = Some(self.accessor(AccessorTarget::FieldWrite(field.clone()))?);
            }
        }
        Ok(FieldAccess {
            field,
            site,
            receiver,
            read,
            write,
        })
    }

    pub(crate) fn method_accessor(&mut self, method: &MethodData) -> Result<Option<AccessorRef>> {
        if method.is_constructor() || !self.needs_accessor(method.owner, method.access)? {
            return Ok(None);
        }
        self.accessor(AccessorTarget::Method(method.clone())).map(Some)
    }

    /// Constant value of a field, evaluating a pending initializer
    pub(crate) fn constant_of(&mut self, field: &FieldData) -> Result<Option<crate::common::model::ConstValue>> {
        if !field.is_final() {
            return Ok(None);
        }
        if field.constant.is_some() {
            return Ok(field.constant.clone());
        }
        self.field_constant(field.owner, &field.name)
    }

    /// Record that the local `var` is used from the classes in `crossed`
    pub(crate) fn capture(&mut self, var: NodeId, crossed: &[usize], location: Location) -> Result<()> {
        if crossed.is_empty() {
            return Ok(());
        }
        let local = self.tables.var(var)?.clone();
        if !local.is_final {
            return Err(Error::semantic(
                format!(
                    "local variable {} is accessed from within inner class; needs to be declared final",
                    local.name
                ),
                location,
            ));
        }
        for &index in crossed {
            let class = self.classes.get_mut(index);
            if class.capture(var).is_none() {
                class.captures.push(Capture {
                    var,
                    name: local.name.clone(),
                    ty: local.ty,
                });
            }
        }
        Ok(())
    }

    /// Creating an instance of a local class passes its captured
    /// variables, which must then be reachable here
    pub(crate) fn require_captures(&mut self, class: TypeId, location: Location) -> Result<()> {
        let Some(index) = self.classes.index_of(class) else {
            return Ok(());
        };
        let vars: Vec<NodeId> = self.classes.get(index).captures.iter().map(|c| c.var).collect();
        for var in vars {
            if let Some(crossed) = self.scope.crossings_for(var) {
                self.capture(var, &crossed, location)?;
            }
        }
        Ok(())
    }

    /// Meaning of a simple name in value position, or failing that as a
    /// type or package
    fn resolve_first(&mut self, name: &str, usage: Use, span: Span) -> Result<Named> {
        let location = span.start;
        if let Some((var, crossed)) = self.scope.lookup_var(name) {
            let local = self.tables.var(var)?.clone();
            if let (Some(constant), Use::Read) = (&local.constant, usage) {
                return Ok(Named::Value(ExprInfo {
                    constant: Some(constant.clone()),
                    ..ExprInfo::with_binding(
                        local.ty,
                        super::Binding::Name(NamePath {
                            start: NameStart::Local(var),
                            steps: Vec::new(),
                        }),
                    )
                }));
            }
            self.capture(var, &crossed, location)?;
            return Ok(Named::Value(ExprInfo::with_binding(
                local.ty,
                super::Binding::Name(NamePath {
                    start: NameStart::Local(var),
                    steps: Vec::new(),
                }),
            )));
        }

        // a field of the innermost class declaring or inheriting it
        for holder in self.scope.enclosing_classes() {
            let holder_ty = self.classes.get(holder).ty;
            if let Some(field) = self.arena.find_field(holder_ty, name).map_err(|e| locate(e, location))? {
                let what = format!("variable {}", name);
                let receiver = self.implicit_receiver(holder, field.is_static(), &what, location)?;
                return self.field_value(field, holder_ty, receiver, usage, location);
            }
        }

        if let Some(owner) = self.static_import_field(name, location)? {
            if let Some(field) = self.arena.find_field(owner, name).map_err(|e| locate(e, location))? {
                return self.field_value(field, owner, Recv::Static, usage, location);
            }
        }

        if let Some(ty) = self.find_simple_type(name, span)? {
            return Ok(Named::Type(ty));
        }
        Ok(Named::Package(name.to_string()))
    }

    fn static_import_field(&mut self, name: &str, location: Location) -> Result<Option<TypeId>> {
        let Some(imports) = self.imports.get(self.unit) else {
            return Ok(None);
        };
        let single: Vec<TypeId> = imports.static_single.iter().filter(|(n, _)| n == name).map(|(_, t)| *t).collect();
        let on_demand = imports.static_on_demand.clone();
        for owner in single.into_iter().chain(on_demand) {
            if let Some(field) = self.arena.find_field(owner, name).map_err(|e| locate(e, location))? {
                if field.is_static() {
                    return Ok(Some(owner));
                }
            }
        }
        Ok(None)
    }

    /// Classes whose static methods of this name are imported
    pub(crate) fn static_import_methods(&mut self, name: &str, location: Location) -> Result<Vec<MethodData>> {
        let Some(imports) = self.imports.get(self.unit) else {
            return Ok(Vec::new());
        };
        let single: Vec<TypeId> = imports.static_single.iter().filter(|(n, _)| n == name).map(|(_, t)| *t).collect();
        let on_demand = imports.static_on_demand.clone();
        let mut methods = Vec::new();
        for owner in single.into_iter().chain(on_demand) {
            for method in self.arena.find_methods(owner, name).map_err(|e| locate(e, location))? {
                if method.is_static() && !methods.iter().any(|m: &MethodData| m.params == method.params) {
                    methods.push(method);
                }
            }
        }
        Ok(methods)
    }

    fn field_value(
        &mut self,
        field: FieldData,
        site: TypeId,
        receiver: Recv,
        usage: Use,
        location: Location,
    ) -> Result<Named> {
        let constant = match (&receiver, usage) {
            (Recv::Static | Recv::Implicit(_), Use::Read) => self.constant_of(&field)?,
            _ => None,
        };
        let ty = field.ty;
        let access = self.field_access(field, site, receiver, usage, location)?;
        let mut info = ExprInfo::with_binding(
            ty,
            super::Binding::Name(NamePath {
                start: NameStart::Field(access),
                steps: Vec::new(),
            }),
        );
        info.constant = constant;
        Ok(Named::Value(info))
    }

    /// Resolve a dotted name. Intermediate segments are always read; the
    /// last one is used as `usage` says. Names that are neither values nor
    /// types come back as packages.
    pub(crate) fn resolve_name(&mut self, parts: &[String], usage: Use, span: Span) -> Result<Named> {
        let location = span.start;
        let last = parts.len() - 1;
        let first_use = if last == 0 { usage } else { Use::Read };
        let mut current = self.resolve_first(&parts[0], first_use, span)?;

        for (i, part) in parts.iter().enumerate().skip(1) {
            let part_use = if i == last { usage } else { Use::Read };
            current = match current {
                Named::Package(package) => {
                    let internal = format!("{}/{}", package.replace('.', "/"), part);
                    match self.arena.lookup_class(&internal).map_err(|e| locate(e, location))? {
                        Some(ty) => Named::Type(ty),
                        None => Named::Package(format!("{}.{}", package, part)),
                    }
                }
                Named::Type(ty) => {
                    if let Some(field) = self.arena.find_field(ty, part).map_err(|e| locate(e, location))? {
                        if !field.is_static() {
                            return Err(Error::semantic(
                                format!("non-static variable {} cannot be referenced from a static context", part),
                                location,
                            ));
                        }
                        self.field_value(field, ty, Recv::Static, part_use, location)?
                    } else if let Some(member) = self.member_type(ty, part, span)? {
                        Named::Type(member)
                    } else {
                        return Err(Error::semantic(
                            format!("cannot find symbol: variable {} in {}", part, self.arena.display(ty)),
                            location,
                        ));
                    }
                }
                Named::Value(info) => Named::Value(self.select_field(info, part, part_use, location)?),
            };
        }

        Ok(current)
    }

    /// Select a field (or an array's `length`) from a name path value
    fn select_field(&mut self, info: ExprInfo, name: &str, usage: Use, location: Location) -> Result<ExprInfo> {
        let super::Binding::Name(mut path) = info.binding else {
            return Err(Error::internal("field selection on a non-name value"));
        };
        let ty = info.ty;
        if self.arena.is_array(ty) && name == "length" {
            if usage.writes() {
                return Err(Error::semantic("cannot assign a value to final variable length", location));
            }
            path.steps.push(NameStep::Length);
            return Ok(ExprInfo::with_binding(TypeId::INT, super::Binding::Name(path)));
        }
        let field = self.member_field(ty, name, location)?;
        let field_ty = field.ty;
        let access = self.field_access(field, ty, Recv::Expr, usage, location)?;
        path.steps.push(NameStep::Field(access));
        Ok(ExprInfo::with_binding(field_ty, super::Binding::Name(path)))
    }

    /// A field of a value of type `ty`
    pub(crate) fn member_field(&mut self, ty: TypeId, name: &str, location: Location) -> Result<FieldData> {
        if self.arena.is_primitive(ty) {
            return Err(Error::semantic(
                format!("{} cannot be dereferenced", self.arena.display(ty)),
                location,
            ));
        }
        let lookup_in = if self.arena.is_array(ty) { TypeId::OBJECT } else { ty };
        match self.arena.find_field(lookup_in, name).map_err(|e| locate(e, location))? {
            Some(field) => Ok(field),
            None => Err(Error::semantic(
                format!("cannot find symbol: variable {} in {}", name, self.arena.display(ty)),
                location,
            )),
        }
    }

    /// Enclosing class whose members (own or inherited) include methods
    /// of this name, innermost first
    pub(crate) fn method_holder(&mut self, name: &str, location: Location) -> Result<Option<(usize, Vec<MethodData>)>> {
        for holder in self.scope.enclosing_classes() {
            let ty = self.classes.get(holder).ty;
            let methods = self.arena.find_methods(ty, name).map_err(|e| locate(e, location))?;
            if !methods.is_empty() {
                return Ok(Some((holder, methods)));
            }
        }
        Ok(None)
    }

    pub(crate) fn method_receiver(&mut self, holder: usize, method: &MethodData, location: Location) -> Result<Recv> {
        let what = format!("method {}({})", method.name, self.param_list(&method.params));
        self.implicit_receiver(holder, method.is_static(), &what, location)
    }

    pub(crate) fn param_list(&self, params: &[TypeId]) -> String {
        params.iter().map(|&p| self.arena.display(p)).collect::<Vec<_>>().join(",")
    }

    /// Index of the innermost enclosing class of this type, for `C.this`
    pub(crate) fn enclosing_class_of_type(&self, ty: TypeId) -> Option<usize> {
        self.scope.frames().find_map(|f| match f.kind {
            FrameKind::Class(index) if self.classes.get(index).ty == ty => Some(index),
            _ => None,
        })
    }
}
