//! Attr phase: attribution of class bodies and statements.
//!
//! Member classes are attributed inside the scope of their enclosing
//! class; local and anonymous classes are declared, entered and
//! attributed on the spot, with the enclosing method's locals in scope.

use super::conversion::{cast, convert, Context};
use super::scope::FrameKind;
use super::{
    locate, semantic_at, AnonymousInfo, Binding, BodyCtx, BodyKind, ClassKind, CtorCallInfo, ExprInfo, ForEachInfo,
    ForEachKind, LocalVar, NewInfo, OuterArg, Resolver, SwitchKind,
};
use crate::ast::{
    Block, CaseLabel, ConstructorDecl, CtorCall, CtorCallKind, Expr, FieldDecl, Initializer, Member, MethodDecl,
    NodeId, Param, Span, Stmt, TypeDecl, VarInit,
};
use crate::codegen::defs::access_flags::*;
use crate::common::model::{ConstValue, MethodData};
use crate::common::types::{PrimitiveType, TypeId};
use crate::error::{Error, Result};

impl<'u> Resolver<'u> {
    pub fn attribute_all(&mut self) -> Result<()> {
        let top_level: Vec<usize> = self
            .classes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ClassKind::TopLevel)
            .map(|(i, _)| i)
            .collect();
        for index in top_level {
            self.guarded(|r| r.in_class(index, |r| r.attr_class_body(index)))?;
        }
        log::debug!("attributed {} class(es)", self.classes.len());
        Ok(())
    }

    /// Attribute every member of the class in scope, nested classes included
    pub(crate) fn attr_class_body(&mut self, index: usize) -> Result<()> {
        let decl = self.classes.get(index).decl;
        let inner = self.classes.get(index).kind != ClassKind::TopLevel
            && (self.classes.get(index).outer_this.is_some() || self.classes.get(index).kind != ClassKind::Member);

        for member in &decl.members {
            match member {
                Member::Field(field) => self.guarded(|r| r.attr_field(index, field, inner))?,
                Member::Method(method) => self.guarded(|r| r.attr_method(method, inner))?,
                Member::Constructor(ctor) => self.guarded(|r| r.attr_constructor(index, ctor))?,
                Member::Initializer(init) => self.guarded(|r| r.attr_initializer(init, inner))?,
                Member::Type(member) => self.guarded(|r| {
                    if inner && (member.is_interface() || member.modifiers.is_static()) {
                        return Err(semantic_at(member, "modifier static not allowed here"));
                    }
                    let member_index = r
                        .classes
                        .index_of_decl(member.id)
                        .ok_or_else(|| Error::internal(format!("member class {} was not declared", member.name)))?;
                    r.in_class(member_index, |r| r.attr_class_body(member_index))
                })?,
            }
        }

        let has_ctor = decl.constructors().next().is_some();
        let class = self.classes.get(index);
        if !decl.is_interface() && !has_ctor && class.kind != ClassKind::Anonymous {
            self.guarded(|r| {
                r.scope.push(FrameKind::Method {
                    is_static: false,
                    is_constructor: true,
                });
                r.body = BodyCtx {
                    kind: BodyKind::Constructor,
                    is_static: false,
                    prologue: true,
                };
                r.attr_ctor_call(index, None, decl.id, decl.span)
            })?;
        }
        Ok(())
    }

    fn attr_field(&mut self, index: usize, field: &'u FieldDecl, inner: bool) -> Result<()> {
        let is_interface = self.classes.get(index).decl.is_interface();
        let is_static = field.modifiers.is_static() || is_interface;
        for declarator in &field.declarators {
            let data = self
                .tables
                .fields
                .get(&declarator.id)
                .cloned()
                .ok_or_else(|| Error::internal(format!("field {} was not entered", declarator.name)))?;
            if inner && is_static && !(data.is_final() && self.constant_of(&data)?.is_some()) {
                return Err(semantic_at(
                    declarator,
                    format!("Illegal static declaration in inner class {}", self.arena.display(data.owner)),
                ));
            }
            let Some(init) = &declarator.init else {
                if is_interface {
                    return Err(semantic_at(declarator, "= expected"));
                }
                continue;
            };
            let depth = self.scope.depth();
            self.scope.push(FrameKind::Method {
                is_static,
                is_constructor: false,
            });
            self.body = BodyCtx {
                kind: BodyKind::FieldInit,
                is_static,
                prologue: false,
            };
            let result = self.attr_var_init(init, data.ty);
            self.scope.truncate(depth);
            result?;
        }
        Ok(())
    }

    fn declare_params(&mut self, params: &'u [Param], what: &str) -> Result<()> {
        for param in params {
            let ty = self.resolve_type_ref(&param.type_ref)?;
            self.declare_local(param.id, &param.name, ty, param.modifiers.is_final(), None, param.span, what)?;
        }
        Ok(())
    }

    /// Add a local to the innermost frame and the variable table
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn declare_local(
        &mut self,
        id: NodeId,
        name: &str,
        ty: TypeId,
        is_final: bool,
        constant: Option<ConstValue>,
        span: Span,
        what: &str,
    ) -> Result<()> {
        if !self.scope.declare_var(name, id) {
            return Err(Error::semantic(
                format!("variable {} is already defined in {}", name, what),
                span.start,
            ));
        }
        self.tables.vars.insert(
            id,
            LocalVar {
                name: name.to_string(),
                ty,
                is_final,
                constant,
            },
        );
        Ok(())
    }

    fn attr_method(&mut self, method: &'u MethodDecl, inner: bool) -> Result<()> {
        let data = self.tables.method(method.id)?.clone();
        let is_static = data.is_static();
        if inner && is_static {
            return Err(semantic_at(
                method,
                format!("Illegal static declaration in inner class {}", self.arena.display(data.owner)),
            ));
        }
        self.scope.push(FrameKind::Method {
            is_static,
            is_constructor: false,
        });
        self.declare_type_params(&method.type_params)?;
        self.body = BodyCtx {
            kind: BodyKind::Method { ret: data.ret },
            is_static,
            prologue: false,
        };
        let what = format!("method {}({})", method.name, self.param_list(&data.params));
        self.declare_params(&method.params, &what)?;
        if let Some(body) = &method.body {
            self.attr_block(body)?;
        }
        Ok(())
    }

    fn attr_constructor(&mut self, index: usize, ctor: &'u ConstructorDecl) -> Result<()> {
        let class = self.classes.get(index);
        if ctor.name != class.simple_name {
            return Err(semantic_at(ctor, "invalid method declaration; return type required"));
        }
        let data = self.tables.method(ctor.id)?.clone();
        self.scope.push(FrameKind::Method {
            is_static: false,
            is_constructor: true,
        });
        self.declare_type_params(&ctor.type_params)?;
        let what = format!("constructor {}({})", ctor.name, self.param_list(&data.params));
        self.declare_params(&ctor.params, &what)?;

        self.body = BodyCtx {
            kind: BodyKind::Constructor,
            is_static: false,
            prologue: true,
        };
        match &ctor.explicit_call {
            Some(call) => self.attr_ctor_call(index, Some(call), call.id, call.span)?,
            None => self.attr_ctor_call(index, None, ctor.id, ctor.span)?,
        }
        self.body.prologue = false;
        self.attr_block(&ctor.body)
    }

    /// Resolve `this(...)`/`super(...)`, or the implicit `super()`
    fn attr_ctor_call(&mut self, index: usize, call: Option<&'u CtorCall>, key: NodeId, span: Span) -> Result<()> {
        let location = span.start;
        let class_ty = self.classes.get(index).ty;
        let is_this = matches!(call, Some(c) if c.kind == CtorCallKind::This);
        let target = if is_this {
            class_ty
        } else {
            match self.arena.class_data(class_ty)?.super_class {
                Some(parent) => parent,
                None => return Ok(()),
            }
        };

        let outer = match call.and_then(|c| c.qualifier.as_deref()) {
            Some(qualifier) => {
                if is_this {
                    return Err(semantic_at(qualifier, "illegal qualifier; this is not an inner class"));
                }
                self.attr_operand(qualifier)?;
                match self.required_outer(target)? {
                    Some(outer_ty) => self.coerce(qualifier, outer_ty, Context::Assignment)?,
                    None => {
                        return Err(Error::semantic(
                            format!("illegal qualifier; {} is not an inner class", self.arena.display(target)),
                            location,
                        ))
                    }
                }
                OuterArg::Expr
            }
            None => match self.required_outer(target)? {
                Some(_) if is_this => OuterArg::Implicit(super::OuterPath(vec![index])),
                Some(outer_ty) => OuterArg::Implicit(self.instance_path(index, outer_ty, true, location)?),
                None => OuterArg::None,
            },
        };
        if !is_this {
            self.require_captures(target, location)?;
        }

        let args: &'u [Expr] = call.map(|c| c.args.as_slice()).unwrap_or(&[]);
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.attr_operand(arg)?.ty);
        }
        let ctors = self.arena.constructors(target).map_err(|e| locate(e, location))?;
        let (ctor, varargs) = self.choose(&ctors, &arg_types, "<init>", target, location)?;
        let what = format!(
            "{}({})",
            self.arena.display(target).rsplit('.').next().unwrap_or_default(),
            self.param_list(&ctor.params)
        );
        self.check_member_access(target, ctor.access, &what, location)?;
        let packed = self.apply_args(args, &ctor, varargs)?;
        self.tables.ctor_calls.insert(
            key,
            CtorCallInfo {
                class: target,
                ctor,
                outer,
                varargs: packed,
            },
        );
        Ok(())
    }

    fn attr_initializer(&mut self, init: &'u Initializer, inner: bool) -> Result<()> {
        if inner && init.is_static {
            return Err(semantic_at(init, "Illegal static declaration in inner class"));
        }
        self.scope.push(FrameKind::Method {
            is_static: init.is_static,
            is_constructor: false,
        });
        self.body = BodyCtx {
            kind: BodyKind::Initializer,
            is_static: init.is_static,
            prologue: false,
        };
        self.attr_block(&init.body)
    }

    pub(crate) fn attr_block(&mut self, block: &'u Block) -> Result<()> {
        self.scope.push(FrameKind::Block);
        let result = self.attr_stmts(&block.stmts);
        self.scope.pop();
        result
    }

    fn attr_stmts(&mut self, stmts: &'u [Stmt]) -> Result<()> {
        for stmt in stmts {
            self.attr_stmt(stmt)?;
        }
        Ok(())
    }

    /// Attribute a statement that introduces its own scope
    fn attr_nested(&mut self, stmt: &'u Stmt) -> Result<()> {
        self.scope.push(FrameKind::Block);
        let result = self.attr_stmt(stmt);
        self.scope.pop();
        result
    }

    fn body_description(&self) -> String {
        match self.body.kind {
            BodyKind::Constructor => "constructor".to_string(),
            BodyKind::Method { .. } => "method".to_string(),
            _ => "initializer".to_string(),
        }
    }

    pub(crate) fn attr_stmt(&mut self, stmt: &'u Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(block) => self.attr_block(block),
            Stmt::LocalVar(decl) => {
                let base = self.resolve_type_ref(&decl.type_ref)?;
                if base == TypeId::VOID {
                    return Err(semantic_at(&decl.type_ref, "'void' type not allowed here"));
                }
                let is_final = decl.modifiers.is_final();
                let what = self.body_description();
                for declarator in &decl.declarators {
                    let ty = self.arena.array_of_dims(base, declarator.dims);
                    self.declare_local(declarator.id, &declarator.name, ty, is_final, None, declarator.span, &what)?;
                    if let Some(init) = &declarator.init {
                        let constant = self.attr_var_init(init, ty)?;
                        let constant_type = self.arena.is_primitive(ty) || ty == TypeId::STRING;
                        if is_final && constant_type && matches!(init, VarInit::Expr(_)) {
                            if let Some(var) = self.tables.vars.get_mut(&declarator.id) {
                                var.constant = constant;
                            }
                        }
                    }
                }
                Ok(())
            }
            Stmt::LocalClass(decl) => self.attr_local_class(decl),
            Stmt::Expr(s) => {
                if !s.expr.is_statement_expression() {
                    return Err(semantic_at(&s.expr, "not a statement"));
                }
                self.attr_expr(&s.expr).map(|_| ())
            }
            Stmt::If(s) => {
                self.attr_cond(&s.cond)?;
                self.attr_nested(&s.then_branch)?;
                if let Some(else_branch) = &s.else_branch {
                    self.attr_nested(else_branch)?;
                }
                Ok(())
            }
            Stmt::While(s) => {
                self.attr_cond(&s.cond)?;
                self.attr_nested(&s.body)
            }
            Stmt::DoWhile(s) => {
                self.attr_nested(&s.body)?;
                self.attr_cond(&s.cond).map(|_| ())
            }
            Stmt::For(s) => {
                self.scope.push(FrameKind::Block);
                let result = (|| {
                    self.attr_stmts(&s.init)?;
                    if let Some(cond) = &s.cond {
                        self.attr_cond(cond)?;
                    }
                    for update in &s.update {
                        if !update.is_statement_expression() {
                            return Err(semantic_at(update, "not a statement"));
                        }
                        self.attr_expr(update)?;
                    }
                    self.attr_nested(&s.body)
                })();
                self.scope.pop();
                result
            }
            Stmt::ForEach(s) => {
                self.scope.push(FrameKind::Block);
                let result = self.attr_foreach(s);
                self.scope.pop();
                result
            }
            Stmt::Switch(s) => {
                self.scope.push(FrameKind::Block);
                let result = self.attr_switch(s);
                self.scope.pop();
                result
            }
            Stmt::Return(s) => self.attr_return(s.value.as_ref(), s.span),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) => Ok(()),
            Stmt::Throw(s) => {
                let info = self.attr_operand(&s.expr)?;
                let throwable = info.ty == TypeId::NULL
                    || (self.arena.is_reference(info.ty)
                        && self
                            .arena
                            .is_subtype(info.ty, TypeId::THROWABLE)
                            .map_err(|e| locate(e, s.span.start))?);
                if !throwable {
                    return Err(self.incompatible(info.ty, TypeId::THROWABLE, s.expr.span.start));
                }
                Ok(())
            }
            Stmt::Try(s) => {
                self.attr_block(&s.body)?;
                for clause in &s.catches {
                    self.scope.push(FrameKind::Block);
                    let result = (|| {
                        let mut types = Vec::with_capacity(clause.types.len());
                        for type_ref in &clause.types {
                            let ty = self.resolve_type_ref(type_ref)?;
                            if !self
                                .arena
                                .is_subtype(ty, TypeId::THROWABLE)
                                .map_err(|e| locate(e, type_ref.span.start))?
                            {
                                return Err(self.incompatible(ty, TypeId::THROWABLE, type_ref.span.start));
                            }
                            types.push(ty);
                        }
                        let mut var_ty = types[0];
                        for &ty in &types[1..] {
                            var_ty = self
                                .arena
                                .common_superclass(var_ty, ty)
                                .map_err(|e| locate(e, clause.span.start))?;
                        }
                        let is_final = clause.modifiers.is_final() || types.len() > 1;
                        self.tables.catch_types.insert(clause.id, types);
                        let what = self.body_description();
                        self.declare_local(clause.id, &clause.name, var_ty, is_final, None, clause.span, &what)?;
                        self.attr_block(&clause.body)
                    })();
                    self.scope.pop();
                    result?;
                }
                if let Some(finally) = &s.finally {
                    self.attr_block(finally)?;
                }
                Ok(())
            }
            Stmt::Synchronized(s) => {
                let info = self.attr_operand(&s.lock)?;
                if !self.arena.is_reference(info.ty) || info.ty == TypeId::NULL {
                    return Err(Error::semantic(
                        format!("unexpected type: required reference, found {}", self.arena.display(info.ty)),
                        s.lock.span.start,
                    ));
                }
                self.attr_block(&s.body)
            }
            Stmt::Labeled(s) => self.attr_nested(&s.body),
            Stmt::Assert(s) => {
                self.attr_cond(&s.cond)?;
                if let Some(message) = &s.message {
                    self.attr_operand(message)?;
                }
                Ok(())
            }
        }
    }

    fn attr_return(&mut self, value: Option<&'u Expr>, span: Span) -> Result<()> {
        match (self.body.kind, value) {
            (BodyKind::Method { ret }, Some(value)) => {
                if ret == TypeId::VOID {
                    return Err(semantic_at(value, "incompatible types: unexpected return value"));
                }
                self.attr_operand(value)?;
                self.coerce(value, ret, Context::Assignment)
            }
            (BodyKind::Method { ret }, None) => {
                if ret != TypeId::VOID {
                    return Err(Error::semantic("missing return value", span.start));
                }
                Ok(())
            }
            (BodyKind::Constructor, Some(value)) => {
                Err(semantic_at(value, "incompatible types: unexpected return value"))
            }
            (BodyKind::Constructor, None) => Ok(()),
            _ => Err(Error::semantic("return outside method", span.start)),
        }
    }

    fn attr_foreach(&mut self, s: &'u crate::ast::ForEachStmt) -> Result<()> {
        let iterable = self.attr_operand(&s.iterable)?;
        let var_ty = self.resolve_type_ref(&s.var_type)?;
        let location = s.iterable.span.start;

        let info = if let Some(element) = self.arena.element(iterable.ty) {
            let conversion = convert(&mut self.arena, element, var_ty, None, Context::Assignment)
                .map_err(|e| locate(e, location))?
                .ok_or_else(|| self.incompatible(element, var_ty, s.var_type.span.start))?;
            ForEachInfo {
                kind: ForEachKind::Array {
                    array: iterable.ty,
                    element,
                },
                conversion,
            }
        } else {
            let iterable_ty = self.arena.class_named("java/lang/Iterable");
            let is_iterable = self.arena.is_reference(iterable.ty)
                && iterable.ty != TypeId::NULL
                && self.arena.is_subtype(iterable.ty, iterable_ty).map_err(|e| locate(e, location))?;
            if !is_iterable {
                return Err(Error::semantic(
                    format!(
                        "for-each not applicable to expression type: required array or java.lang.Iterable, found {}",
                        self.arena.display(iterable.ty)
                    ),
                    location,
                ));
            }
            // elements come out of the raw iterator as Object
            let conversion = cast(&mut self.arena, TypeId::OBJECT, var_ty)
                .map_err(|e| locate(e, location))?
                .ok_or_else(|| self.incompatible(TypeId::OBJECT, var_ty, s.var_type.span.start))?;
            ForEachInfo {
                kind: ForEachKind::Iterable,
                conversion,
            }
        };
        self.tables.foreach.insert(s.id, info);

        let what = self.body_description();
        self.declare_local(s.var_id, &s.name, var_ty, s.modifiers.is_final(), None, s.span, &what)?;
        self.attr_nested(&s.body)
    }

    fn attr_switch(&mut self, s: &'u crate::ast::SwitchStmt) -> Result<()> {
        let selector = self.attr_operand(&s.selector)?;
        let location = s.selector.span.start;
        let (kind, label_ty) = if selector.ty == TypeId::STRING {
            (SwitchKind::String, TypeId::STRING)
        } else {
            match self.arena.unboxed_or_primitive(selector.ty) {
                Some(p @ (PrimitiveType::Char | PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Int)) => {
                    if !self.arena.is_primitive(selector.ty) {
                        let steps = super::conversion::promote(&self.arena, selector.ty, p);
                        if let Some(info) = self.tables.exprs.get_mut(&s.selector.id) {
                            info.conversion = steps;
                        }
                    }
                    (SwitchKind::Int, TypeId::of(p))
                }
                _ => {
                    return Err(Error::semantic(
                        format!(
                            "incompatible types: {} cannot be converted to int",
                            self.arena.display(selector.ty)
                        ),
                        location,
                    ))
                }
            }
        };
        self.tables.switches.insert(s.id, kind);

        let mut seen: Vec<ConstValue> = Vec::new();
        let mut has_default = false;
        for case in &s.cases {
            for label in &case.labels {
                match label {
                    CaseLabel::Default(span) => {
                        if has_default {
                            return Err(Error::semantic("duplicate default label", span.start));
                        }
                        has_default = true;
                    }
                    CaseLabel::Expr(expr) => {
                        let info = self.attr_operand(expr)?;
                        let Some(value) = info.constant.clone() else {
                            return Err(semantic_at(
                                expr,
                                if kind == SwitchKind::String {
                                    "constant string expression required"
                                } else {
                                    "constant expression required"
                                },
                            ));
                        };
                        self.coerce(expr, label_ty, Context::Assignment)?;
                        let key = match kind {
                            SwitchKind::String => value,
                            SwitchKind::Int => ConstValue::Int(value.as_int().ok_or_else(|| {
                                Error::semantic("constant expression required", expr.span.start)
                            })?),
                        };
                        if seen.contains(&key) {
                            return Err(semantic_at(expr, "duplicate case label"));
                        }
                        seen.push(key);
                    }
                }
            }
            self.attr_stmts(&case.body)?;
        }
        Ok(())
    }

    /// Smallest free binary name `Outer$<n><name>`
    fn local_class_name(&self, outer: usize, simple: &str) -> String {
        let prefix = self.classes.get(outer).internal_name(&self.arena).to_string();
        (1..)
            .map(|n| format!("{}${}{}", prefix, n, simple))
            .find(|name| !self.used_names.contains(name))
            .unwrap_or_default()
    }

    fn attr_local_class(&mut self, decl: &'u TypeDecl) -> Result<()> {
        if decl.is_interface() {
            return Err(semantic_at(decl, "interface not allowed here"));
        }
        if self.scope.local_type_in_body(&decl.name).is_some() {
            return Err(semantic_at(decl, format!("duplicate class: {}", decl.name)));
        }
        let outer = self.current_class()?;
        let name = self.local_class_name(outer, &decl.name);
        let first = self.classes.len();
        let index = self.declare_class(decl, self.unit, Some(outer), ClassKind::Local, name)?;
        if !self.in_static_context() {
            self.classes.get_mut(index).outer_this = Some(self.classes.get(outer).ty);
        }
        let ty = self.classes.get(index).ty;
        self.scope.declare_type(&decl.name, ty);

        for i in first..self.classes.len() {
            self.define_skeleton(i);
        }
        self.enter_class_tree(index, true)?;
        self.in_class(index, |r| r.attr_class_body(index))
    }

    /// Enter a local or anonymous class and its member classes
    fn enter_class_tree(&mut self, index: usize, supertypes: bool) -> Result<()> {
        self.in_class(index, |r| {
            if supertypes {
                r.enter_supertypes(index)?;
            }
            let members: Vec<usize> = r
                .classes
                .get(index)
                .decl
                .member_types()
                .filter_map(|m| r.classes.index_of_decl(m.id))
                .collect();
            for member in &members {
                r.enter_class_tree(*member, true)?;
            }
            Ok(())
        })?;
        self.check_cycles(index)?;
        self.in_class(index, |r| r.enter_members_tree(index))?;
        self.check_abstract_methods(index)
    }

    fn enter_members_tree(&mut self, index: usize) -> Result<()> {
        self.enter_members(index)?;
        let ty = self.classes.get(index).ty;
        let pending: Vec<String> = self
            .pending_constants
            .iter()
            .filter(|(_, p)| p.class == index)
            .map(|((_, name), _)| name.clone())
            .collect();
        for name in pending {
            self.field_constant(ty, &name)?;
        }
        let members: Vec<usize> = self
            .classes
            .get(index)
            .decl
            .member_types()
            .filter_map(|m| self.classes.index_of_decl(m.id))
            .collect();
        for member in members {
            self.in_class(member, |r| r.enter_members_tree(member))?;
            self.check_abstract_methods(member)?;
        }
        Ok(())
    }

    /// `new C(...) { body }`
    pub(crate) fn attr_anonymous(
        &mut self,
        expr: &Expr,
        base: TypeId,
        outer_arg: OuterArg,
        args: &'u [Expr],
        body: &'u TypeDecl,
    ) -> Result<ExprInfo> {
        let location = expr.span.start;
        let base_data = self.arena.class_data(base).map_err(|e| locate(e, location))?;
        let is_interface = base_data.is_interface();
        if base_data.is_final() {
            return Err(Error::semantic(
                format!("cannot inherit from final {}", self.arena.display(base)),
                location,
            ));
        }

        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.attr_operand(arg)?.ty);
        }
        let (super_class, interfaces, super_ctor, varargs) = if is_interface {
            if !args.is_empty() {
                return Err(Error::semantic("anonymous class implements interface; cannot have arguments", location));
            }
            let ctors = self.arena.constructors(TypeId::OBJECT)?;
            let ctor = ctors
                .into_iter()
                .find(|c| c.params.is_empty())
                .ok_or_else(|| Error::internal("java.lang.Object has no default constructor"))?;
            (TypeId::OBJECT, vec![base], ctor, false)
        } else {
            let ctors = self.arena.constructors(base).map_err(|e| locate(e, location))?;
            let (ctor, varargs) = self.choose(&ctors, &arg_types, "<init>", base, location)?;
            let what = format!(
                "{}({})",
                self.arena.display(base).rsplit('.').next().unwrap_or_default(),
                self.param_list(&ctor.params)
            );
            self.check_member_access(base, ctor.access, &what, location)?;
            (base, Vec::new(), ctor, varargs)
        };

        // enclosing instance of the superclass, if it is an inner class
        let (super_outer, super_outer_ty) = match (outer_arg, self.required_outer(super_class)?) {
            (OuterArg::Expr, Some(ty)) => (OuterArg::Expr, Some(ty)),
            (OuterArg::Expr, None) => {
                return Err(Error::semantic(
                    format!("qualified new of static class {}", self.arena.display(super_class)),
                    location,
                ))
            }
            (_, Some(ty)) => (OuterArg::Implicit(self.enclosing_instance(ty, location)?), Some(ty)),
            (_, None) => (OuterArg::None, None),
        };
        if !is_interface {
            self.require_captures(super_class, location)?;
        }

        let outer = self.current_class()?;
        let name = self.local_class_name(outer, "");
        let first = self.classes.len();
        let index = self.declare_class(body, self.unit, Some(outer), ClassKind::Anonymous, name)?;
        let static_here = self.in_static_context() || self.body.prologue;
        let outer_ty = self.classes.get(outer).ty;
        // locals the superclass constructor needs are passed through this one
        let inherited = self
            .classes
            .of_type(super_class)
            .map(|c| c.captures.clone())
            .unwrap_or_default();
        {
            let class = self.classes.get_mut(index);
            class.captures = inherited;
            if !static_here {
                class.outer_this = Some(outer_ty);
            }
            class.anonymous = Some(AnonymousInfo {
                super_ctor: super_ctor.clone(),
                super_outer: super_outer_ty,
            });
        }
        for i in first..self.classes.len() {
            self.define_skeleton(i);
        }
        let ty = self.classes.get(index).ty;
        let mut data = (*self.arena.class_data(ty)?).clone();
        data.super_class = Some(super_class);
        data.interfaces = interfaces;
        self.arena.define(ty, data);

        if body.constructors().next().is_some() {
            return Err(semantic_at(body, "anonymous classes cannot declare constructors"));
        }
        self.enter_class_tree(index, false)?;

        // the constructor mirrors the chosen superclass constructor
        let ctor = MethodData {
            params: super_ctor.params.clone(),
            throws: super_ctor.throws.clone(),
            access: super_ctor.access & ACC_VARARGS,
            ..self.tables.method(body.id)?.clone()
        };
        self.tables.methods.insert(body.id, ctor.clone());
        let mut data = (*self.arena.class_data(ty)?).clone();
        data.methods.retain(|m| !m.is_constructor());
        data.methods.push(ctor.clone());
        self.arena.define(ty, data);

        self.in_class(index, |r| r.attr_class_body(index))?;

        let packed = self.apply_args(args, &ctor, varargs)?;
        let outer_path = if static_here {
            OuterArg::None
        } else {
            OuterArg::Implicit(super::OuterPath::default())
        };
        Ok(ExprInfo::with_binding(
            ty,
            Binding::New(Box::new(NewInfo {
                class: ty,
                ctor,
                outer: outer_path,
                super_outer,
                varargs: packed,
            })),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::common::cache::ExternalTypes;
    use crate::config::Config;
    use crate::parser::parse_compilation_unit;
    use crate::wash::analyze;

    fn check(source: &str) -> crate::error::Result<()> {
        let unit = parse_compilation_unit(source).unwrap();
        let units = vec![unit];
        analyze(&units, ExternalTypes::bootstrap(), &Config::default()).map(|_| ())
    }

    fn error_of(source: &str) -> String {
        check(source).unwrap_err().to_string()
    }

    #[test]
    fn accepts_a_small_class() {
        check(
            "class A { int f; static int twice(int x) { return x * 2; } int g() { return twice(f) + 1; } }",
        )
        .unwrap();
    }

    #[test]
    fn unknown_variable() {
        assert!(error_of("class A { int f() { return y; } }").contains("cannot find symbol: variable y"));
    }

    #[test]
    fn lossy_assignment() {
        let message = error_of("class A { void f() { long l = 1; int i = l; } }");
        assert!(message.contains("possible lossy conversion from long to int"), "{}", message);
    }

    #[test]
    fn constant_narrowing_is_allowed() {
        check("class A { void f() { byte b = 10; char c = 'a' + 1; final int k = 3; short s = k; } }").unwrap();
    }

    #[test]
    fn instance_member_from_static_context() {
        let message = error_of("class A { int f; static int g() { return f; } }");
        assert!(message.contains("non-static variable f"), "{}", message);
    }

    #[test]
    fn duplicate_case_labels() {
        let message = error_of("class A { void f(int x) { switch (x) { case 1: break; case 1: break; } } }");
        assert!(message.contains("duplicate case label"), "{}", message);
    }

    #[test]
    fn string_switch_and_foreach() {
        check(
            "class A { int f(String s, int[] xs) { int n = 0; for (int x : xs) n += x; \
             switch (s) { case \"a\": return n; default: return 0; } } }",
        )
        .unwrap();
    }

    #[test]
    fn captured_locals_must_be_final() {
        let message = error_of("class A { void f() { int x = 1; Runnable r = new Runnable() { public void run() { int y = x; } }; } }");
        assert!(message.contains("needs to be declared final"), "{}", message);
    }

    #[test]
    fn final_field_assignment_outside_constructor() {
        let message = error_of("class A { final int f; A() { f = 1; } void g() { f = 2; } }");
        assert!(message.contains("cannot assign a value to final variable f"), "{}", message);
    }

    #[test]
    fn ambiguous_call_is_reported() {
        let message = error_of("class A { void m(int a, long b) {} void m(long a, int b) {} void g() { m(1, 2); } }");
        assert!(message.contains("reference to m is ambiguous"), "{}", message);
    }
}
