//! Attribution of expressions: typing, name and overload resolution,
//! implicit conversions and constant folding.

use super::const_fold::{fits_narrowing, fold_binary, fold_concat, fold_string_equality, fold_unary};
use super::conversion::{
    binary_promotion, cast, convert, is_boolean, numeric, promote, reference_castable, unary_promotion, Context,
};
use super::lookup::{Named, Use};
use super::overload::{resolve, Resolution};
use super::{
    locate, semantic_at, AssignKind, BinaryKind, Binding, BodyKind, CallInfo, ExprInfo, FieldAccess, InvokeKind,
    NameStart, NameStep, NewInfo, OuterArg, OuterPath, Recv, Resolver,
};
use crate::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, Literal, Location, Receiver, TypeDecl, TypeRef, UnaryOp,
};
use crate::common::model::{ConstValue, MethodData};
use crate::common::types::{PrimitiveType, TypeId};
use crate::error::{Error, Result};

impl<'u> Resolver<'u> {
    fn record(&mut self, expr: &Expr, info: ExprInfo) -> ExprInfo {
        self.tables.exprs.insert(expr.id, info.clone());
        info
    }

    /// Attribute an expression used as a value
    pub(crate) fn attr_expr(&mut self, expr: &'u Expr) -> Result<ExprInfo> {
        let info = self.attr_value(expr, Use::Read)?;
        Ok(self.record(expr, info))
    }

    /// Attribute an expression whose value must not be `void`
    pub(crate) fn attr_operand(&mut self, expr: &'u Expr) -> Result<ExprInfo> {
        let info = self.attr_expr(expr)?;
        if info.ty == TypeId::VOID {
            return Err(semantic_at(expr, "'void' type not allowed here"));
        }
        Ok(info)
    }

    /// Attribute a condition: `boolean`, or `Boolean` unboxed
    pub(crate) fn attr_cond(&mut self, expr: &'u Expr) -> Result<ExprInfo> {
        let info = self.attr_operand(expr)?;
        if !is_boolean(&self.arena, info.ty) {
            return Err(self.incompatible(info.ty, TypeId::BOOLEAN, expr.span.start));
        }
        if info.ty != TypeId::BOOLEAN {
            self.set_conversion(expr, promote(&self.arena, info.ty, PrimitiveType::Boolean));
        }
        Ok(info)
    }

    fn set_conversion(&mut self, expr: &Expr, steps: Vec<super::ConvStep>) {
        if let Some(info) = self.tables.exprs.get_mut(&expr.id) {
            info.conversion = steps;
        }
    }

    pub(crate) fn incompatible(&self, from: TypeId, to: TypeId, location: Location) -> Error {
        let lossy = matches!(
            (self.arena.primitive(from), self.arena.primitive(to)),
            (Some(f), Some(t)) if f.is_numeric() && t.is_numeric()
        );
        let message = if lossy {
            format!(
                "incompatible types: possible lossy conversion from {} to {}",
                self.arena.display(from),
                self.arena.display(to)
            )
        } else {
            format!(
                "incompatible types: {} cannot be converted to {}",
                self.arena.display(from),
                self.arena.display(to)
            )
        };
        Error::semantic(message, location)
    }

    /// Convert an attributed expression to `target`, recording the steps
    pub(crate) fn coerce(&mut self, expr: &Expr, target: TypeId, context: Context) -> Result<()> {
        let info = self.tables.expr(expr.id)?.clone();
        if info.ty == TypeId::VOID {
            return Err(semantic_at(expr, "'void' type not allowed here"));
        }
        match convert(&mut self.arena, info.ty, target, info.constant.as_ref(), context)
            .map_err(|e| locate(e, expr.span.start))?
        {
            Some(steps) => {
                self.set_conversion(expr, steps);
                Ok(())
            }
            None => Err(self.incompatible(info.ty, target, expr.span.start)),
        }
    }

    fn attr_value(&mut self, expr: &'u Expr, usage: Use) -> Result<ExprInfo> {
        let location = expr.span.start;
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal_info(literal)),
            ExprKind::Name(parts) => match self.resolve_name(parts, usage, expr.span)? {
                Named::Value(info) => Ok(info),
                Named::Type(_) | Named::Package(_) => Err(self.unknown_variable(parts, location)),
            },
            ExprKind::FieldAccess { target, name } => match self.attr_select(target, name, usage, location)? {
                Named::Value(info) => Ok(info),
                Named::Type(_) | Named::Package(_) => Err(Error::semantic(
                    format!("cannot find symbol: variable {}", name),
                    location,
                )),
            },
            ExprKind::SuperField { name } => self.attr_super_field(name, usage, location),
            ExprKind::MethodCall { receiver, name, args } => self.attr_call(expr, receiver, name, args),
            ExprKind::New {
                outer,
                class_type,
                args,
                body,
            } => self.attr_new(expr, outer.as_deref(), class_type, args, body.as_deref()),
            ExprKind::NewArray {
                elem_type,
                dims,
                extra_dims,
                init,
            } => {
                let base = self.resolve_type_ref(elem_type)?;
                if base == TypeId::VOID {
                    return Err(semantic_at(elem_type, "'void' type not allowed here"));
                }
                for dim in dims {
                    self.attr_index(dim)?;
                }
                let ty = self.arena.array_of_dims(base, dims.len() + extra_dims);
                if let Some(init) = init {
                    self.attr_array_init(init, ty)?;
                }
                Ok(ExprInfo::new(ty))
            }
            ExprKind::ArrayAccess { array, index } => {
                let array_info = self.attr_operand(array)?;
                let Some(element) = self.arena.element(array_info.ty) else {
                    return Err(semantic_at(
                        array.as_ref(),
                        format!("array required, but {} found", self.arena.display(array_info.ty)),
                    ));
                };
                self.attr_index(index)?;
                Ok(ExprInfo::new(element))
            }
            ExprKind::Unary { op, operand } => self.attr_unary(expr, *op, operand),
            ExprKind::Binary { op, left, right } => self.attr_binary(*op, left, right, location),
            ExprKind::Assign { op, target, value } => self.attr_assign(*op, target, value, location),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => self.attr_conditional(cond, then_expr, else_expr),
            ExprKind::Cast { target_type, expr: inner } => {
                let target = self.resolve_type_ref(target_type)?;
                let info = self.attr_operand(inner)?;
                let steps = cast(&mut self.arena, info.ty, target)
                    .map_err(|e| locate(e, location))?
                    .ok_or_else(|| self.incompatible(info.ty, target, location))?;
                self.set_conversion(inner, steps);
                let constant = match (&info.constant, self.arena.primitive(target)) {
                    (Some(value), Some(p)) => value.convert_to(p),
                    (Some(value @ ConstValue::String(_)), None) if target == TypeId::STRING => Some(value.clone()),
                    _ => None,
                };
                Ok(ExprInfo {
                    constant,
                    ..ExprInfo::new(target)
                })
            }
            ExprKind::InstanceOf { expr: inner, target_type } => {
                let target = self.resolve_type_ref(target_type)?;
                let info = self.attr_operand(inner)?;
                if self.arena.is_primitive(info.ty) || self.arena.is_primitive(target) {
                    return Err(Error::semantic(
                        format!("unexpected type: required reference, found {}", self.arena.display(info.ty)),
                        location,
                    ));
                }
                if info.ty != TypeId::NULL
                    && !reference_castable(&mut self.arena, info.ty, target).map_err(|e| locate(e, location))?
                {
                    return Err(self.incompatible(info.ty, target, location));
                }
                Ok(ExprInfo::with_binding(TypeId::BOOLEAN, Binding::InstanceOf(target)))
            }
            ExprKind::This { qualifier } => self.attr_this(qualifier.as_deref(), expr.span),
            ExprKind::ClassLit(type_ref) => {
                let ty = self.resolve_type_ref(type_ref)?;
                Ok(ExprInfo::with_binding(TypeId::CLASS, Binding::ClassLit(ty)))
            }
            ExprKind::Paren(inner) => {
                let info = self.attr_value(inner, usage)?;
                let info = self.record(inner, info);
                Ok(ExprInfo {
                    constant: info.constant,
                    ..ExprInfo::new(info.ty)
                })
            }
        }
    }

    fn unknown_variable(&self, parts: &[String], location: Location) -> Error {
        if parts.len() == 1 {
            Error::semantic(format!("cannot find symbol: variable {}", parts[0]), location)
        } else {
            Error::semantic(format!("cannot find symbol: {}", parts.join(".")), location)
        }
    }

    /// An array dimension or index: promoted to `int`
    fn attr_index(&mut self, expr: &'u Expr) -> Result<()> {
        let info = self.attr_operand(expr)?;
        match numeric(&self.arena, info.ty).map(unary_promotion) {
            Some(PrimitiveType::Int) => {
                let steps = promote(&self.arena, info.ty, PrimitiveType::Int);
                self.set_conversion(expr, steps);
                Ok(())
            }
            _ => Err(self.incompatible(info.ty, TypeId::INT, expr.span.start)),
        }
    }

    /// Qualifier of a field access or method call: a value, a type or a
    /// package
    pub(crate) fn attr_qualifier(&mut self, expr: &'u Expr) -> Result<Named> {
        let named = match &expr.kind {
            ExprKind::Name(parts) => self.resolve_name(parts, Use::Read, expr.span)?,
            ExprKind::FieldAccess { target, name } => self.attr_select(target, name, Use::Read, expr.span.start)?,
            _ => Named::Value(self.attr_value(expr, Use::Read)?),
        };
        let info = match &named {
            Named::Value(info) => info.clone(),
            Named::Type(ty) => ExprInfo::with_binding(*ty, Binding::Type(*ty)),
            Named::Package(p) => ExprInfo::with_binding(TypeId::VOID, Binding::Package(p.clone())),
        };
        self.record(expr, info);
        Ok(named)
    }

    /// `target.name`
    fn attr_select(&mut self, target: &'u Expr, name: &str, usage: Use, location: Location) -> Result<Named> {
        match self.attr_qualifier(target)? {
            Named::Package(package) => {
                let internal = format!("{}/{}", package.replace('.', "/"), name);
                match self.arena.lookup_class(&internal).map_err(|e| locate(e, location))? {
                    Some(ty) => Ok(Named::Type(ty)),
                    None => Ok(Named::Package(format!("{}.{}", package, name))),
                }
            }
            Named::Type(ty) => {
                if let Some(field) = self.arena.find_field(ty, name).map_err(|e| locate(e, location))? {
                    if !field.is_static() {
                        return Err(Error::semantic(
                            format!("non-static variable {} cannot be referenced from a static context", name),
                            location,
                        ));
                    }
                    let constant = if usage == Use::Read { self.constant_of(&field)? } else { None };
                    let field_ty = field.ty;
                    let access = self.field_access(field, ty, Recv::Static, usage, location)?;
                    return Ok(Named::Value(ExprInfo {
                        constant,
                        ..ExprInfo::with_binding(field_ty, Binding::Field(access))
                    }));
                }
                match self.member_type(ty, name, crate::ast::Span::new(location, location))? {
                    Some(member) => Ok(Named::Type(member)),
                    None => Err(Error::semantic(
                        format!("cannot find symbol: variable {} in {}", name, self.arena.display(ty)),
                        location,
                    )),
                }
            }
            Named::Value(info) => {
                if info.ty == TypeId::VOID {
                    return Err(Error::semantic("void cannot be dereferenced", location));
                }
                if self.arena.is_array(info.ty) && name == "length" {
                    if usage != Use::Read {
                        return Err(Error::semantic("cannot assign a value to final variable length", location));
                    }
                    return Ok(Named::Value(ExprInfo::with_binding(TypeId::INT, Binding::ArrayLength)));
                }
                let field = self.member_field(info.ty, name, location)?;
                let field_ty = field.ty;
                let access = self.field_access(field, info.ty, Recv::Expr, usage, location)?;
                Ok(Named::Value(ExprInfo::with_binding(field_ty, Binding::Field(access))))
            }
        }
    }

    fn attr_super_field(&mut self, name: &str, usage: Use, location: Location) -> Result<ExprInfo> {
        let (_, parent) = self.super_of_current(location)?;
        let field = self.member_field(parent, name, location)?;
        let receiver = if field.is_static() { Recv::Static } else { Recv::Super };
        let field_ty = field.ty;
        let access = self.field_access(field, parent, receiver, usage, location)?;
        Ok(ExprInfo::with_binding(field_ty, Binding::Field(access)))
    }

    /// Current class and its superclass, for `super.` selections
    fn super_of_current(&mut self, location: Location) -> Result<(TypeId, TypeId)> {
        if self.in_static_context() {
            return Err(Error::semantic(
                "non-static variable super cannot be referenced from a static context",
                location,
            ));
        }
        let current = self.current_type()?;
        let parent = self
            .arena
            .class_data(current)?
            .super_class
            .unwrap_or(TypeId::OBJECT);
        Ok((current, parent))
    }

    fn attr_this(&mut self, qualifier: Option<&str>, span: crate::ast::Span) -> Result<ExprInfo> {
        let location = span.start;
        let current = self.current_class()?;
        let Some(qualifier) = qualifier else {
            if self.in_static_context() {
                return Err(Error::semantic(
                    "non-static variable this cannot be referenced from a static context",
                    location,
                ));
            }
            if self.body.prologue {
                return Err(Error::semantic(
                    "cannot reference this before supertype constructor has been called",
                    location,
                ));
            }
            let ty = self.classes.get(current).ty;
            return Ok(ExprInfo::with_binding(ty, Binding::This(OuterPath::default())));
        };
        let ty = self.resolve_qualified_type(qualifier, span)?;
        let Some(target) = self.enclosing_class_of_type(ty) else {
            return Err(Error::semantic(
                format!("not an enclosing class: {}", self.arena.display(ty)),
                location,
            ));
        };
        if target == current {
            return self.attr_this(None, span);
        }
        let mut path = Vec::new();
        let mut index = current;
        while index != target {
            let outer_this = self.classes.get(index).outer_this;
            let usable = outer_this.is_some() && !(path.is_empty() && self.in_static_context());
            match outer_this.and_then(|o| self.classes.index_of(o)) {
                Some(next) if usable => {
                    path.push(index);
                    index = next;
                }
                _ => {
                    return Err(Error::semantic(
                        "non-static variable this cannot be referenced from a static context",
                        location,
                    ))
                }
            }
        }
        Ok(ExprInfo::with_binding(ty, Binding::This(OuterPath(path))))
    }

    fn attr_unary(&mut self, expr: &Expr, op: UnaryOp, operand: &'u Expr) -> Result<ExprInfo> {
        let location = expr.span.start;
        if op.is_increment() {
            let target = self.attr_target(operand, Use::ReadWrite)?;
            let Some(p) = numeric(&self.arena, target.ty) else {
                return Err(Error::semantic(
                    format!("bad operand type {} for unary operator '{}'", self.arena.display(target.ty), unary_symbol(op)),
                    location,
                ));
            };
            return Ok(ExprInfo::with_binding(
                target.ty,
                Binding::Increment {
                    target_ty: target.ty,
                    op_ty: unary_promotion(p),
                },
            ));
        }

        let info = self.attr_operand(operand)?;
        if op == UnaryOp::Not {
            if !is_boolean(&self.arena, info.ty) {
                return Err(self.bad_unary(op, info.ty, location));
            }
            self.set_conversion(operand, promote(&self.arena, info.ty, PrimitiveType::Boolean));
            let constant = info
                .constant
                .as_ref()
                .and_then(|v| fold_unary(op, v, PrimitiveType::Boolean));
            return Ok(ExprInfo {
                constant,
                ..ExprInfo::with_binding(TypeId::BOOLEAN, Binding::Unary(PrimitiveType::Boolean))
            });
        }

        let p = match numeric(&self.arena, info.ty) {
            Some(p) if op != UnaryOp::BitNot || p.is_integral() => unary_promotion(p),
            _ => return Err(self.bad_unary(op, info.ty, location)),
        };
        self.set_conversion(operand, promote(&self.arena, info.ty, p));
        let constant = info.constant.as_ref().and_then(|v| fold_unary(op, v, p));
        Ok(ExprInfo {
            constant,
            ..ExprInfo::with_binding(TypeId::of(p), Binding::Unary(p))
        })
    }

    fn bad_unary(&self, op: UnaryOp, ty: TypeId, location: Location) -> Error {
        Error::semantic(
            format!("bad operand type {} for unary operator '{}'", self.arena.display(ty), unary_symbol(op)),
            location,
        )
    }

    fn bad_binary(&self, op: BinaryOp, left: TypeId, right: TypeId, location: Location) -> Error {
        Error::semantic(
            format!(
                "bad operand types for binary operator '{}': {} and {}",
                op.symbol(),
                self.arena.display(left),
                self.arena.display(right)
            ),
            location,
        )
    }

    fn attr_binary(&mut self, op: BinaryOp, left: &'u Expr, right: &'u Expr, location: Location) -> Result<ExprInfo> {
        let l = self.attr_operand(left)?;
        let r = self.attr_operand(right)?;
        let (lt, rt) = (l.ty, r.ty);
        let both_constant = l.constant.as_ref().zip(r.constant.as_ref());

        if op == BinaryOp::Add && (lt == TypeId::STRING || rt == TypeId::STRING) {
            let constant = both_constant.map(|(a, b)| fold_concat(a, b));
            return Ok(ExprInfo {
                constant,
                ..ExprInfo::with_binding(TypeId::STRING, Binding::Binary(BinaryKind::Concat))
            });
        }

        match op {
            BinaryOp::And | BinaryOp::Or => {
                if !is_boolean(&self.arena, lt) || !is_boolean(&self.arena, rt) {
                    return Err(self.bad_binary(op, lt, rt, location));
                }
                self.promote_operands(left, right, lt, rt, PrimitiveType::Boolean);
                let constant = both_constant.and_then(|(a, b)| fold_binary(op, a, b, PrimitiveType::Boolean));
                Ok(ExprInfo {
                    constant,
                    ..ExprInfo::with_binding(TypeId::BOOLEAN, Binding::Binary(BinaryKind::Boolean))
                })
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => {
                let (Some(a), Some(b)) = (numeric(&self.arena, lt), numeric(&self.arena, rt)) else {
                    return Err(self.bad_binary(op, lt, rt, location));
                };
                if !a.is_integral() || !b.is_integral() {
                    return Err(self.bad_binary(op, lt, rt, location));
                }
                let p = unary_promotion(a);
                self.set_conversion(left, promote(&self.arena, lt, p));
                self.set_conversion(right, promote(&self.arena, rt, PrimitiveType::Int));
                let constant = both_constant.and_then(|(a, b)| fold_binary(op, a, b, p));
                Ok(ExprInfo {
                    constant,
                    ..ExprInfo::with_binding(TypeId::of(p), Binding::Binary(BinaryKind::Numeric(p)))
                })
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                let (Some(a), Some(b)) = (numeric(&self.arena, lt), numeric(&self.arena, rt)) else {
                    return Err(self.bad_binary(op, lt, rt, location));
                };
                let p = binary_promotion(a, b);
                self.promote_operands(left, right, lt, rt, p);
                let constant = both_constant.and_then(|(a, b)| fold_binary(op, a, b, p));
                Ok(ExprInfo {
                    constant,
                    ..ExprInfo::with_binding(TypeId::of(p), Binding::Binary(BinaryKind::Numeric(p)))
                })
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                let (Some(a), Some(b)) = (numeric(&self.arena, lt), numeric(&self.arena, rt)) else {
                    return Err(self.bad_binary(op, lt, rt, location));
                };
                let p = binary_promotion(a, b);
                self.promote_operands(left, right, lt, rt, p);
                let constant = both_constant.and_then(|(a, b)| fold_binary(op, a, b, p));
                Ok(ExprInfo {
                    constant,
                    ..ExprInfo::with_binding(TypeId::BOOLEAN, Binding::Binary(BinaryKind::Numeric(p)))
                })
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let primitive_side = self.arena.is_primitive(lt) || self.arena.is_primitive(rt);
                if primitive_side {
                    if let (Some(a), Some(b)) = (numeric(&self.arena, lt), numeric(&self.arena, rt)) {
                        let p = binary_promotion(a, b);
                        self.promote_operands(left, right, lt, rt, p);
                        let constant = both_constant.and_then(|(a, b)| fold_binary(op, a, b, p));
                        return Ok(ExprInfo {
                            constant,
                            ..ExprInfo::with_binding(TypeId::BOOLEAN, Binding::Binary(BinaryKind::Numeric(p)))
                        });
                    }
                    if is_boolean(&self.arena, lt) && is_boolean(&self.arena, rt) {
                        self.promote_operands(left, right, lt, rt, PrimitiveType::Boolean);
                        let constant =
                            both_constant.and_then(|(a, b)| fold_binary(op, a, b, PrimitiveType::Boolean));
                        return Ok(ExprInfo {
                            constant,
                            ..ExprInfo::with_binding(TypeId::BOOLEAN, Binding::Binary(BinaryKind::Boolean))
                        });
                    }
                    return Err(self.incomparable(lt, rt, location));
                }
                let comparable = lt == TypeId::NULL
                    || rt == TypeId::NULL
                    || reference_castable(&mut self.arena, lt, rt).map_err(|e| locate(e, location))?;
                if !comparable {
                    return Err(self.incomparable(lt, rt, location));
                }
                let constant = both_constant.and_then(|(a, b)| fold_string_equality(op, a, b));
                Ok(ExprInfo {
                    constant,
                    ..ExprInfo::with_binding(TypeId::BOOLEAN, Binding::Binary(BinaryKind::Reference))
                })
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if is_boolean(&self.arena, lt) && is_boolean(&self.arena, rt) {
                    self.promote_operands(left, right, lt, rt, PrimitiveType::Boolean);
                    let constant = both_constant.and_then(|(a, b)| fold_binary(op, a, b, PrimitiveType::Boolean));
                    return Ok(ExprInfo {
                        constant,
                        ..ExprInfo::with_binding(TypeId::BOOLEAN, Binding::Binary(BinaryKind::Boolean))
                    });
                }
                match (numeric(&self.arena, lt), numeric(&self.arena, rt)) {
                    (Some(a), Some(b)) if a.is_integral() && b.is_integral() => {
                        let p = binary_promotion(a, b);
                        self.promote_operands(left, right, lt, rt, p);
                        let constant = both_constant.and_then(|(a, b)| fold_binary(op, a, b, p));
                        Ok(ExprInfo {
                            constant,
                            ..ExprInfo::with_binding(TypeId::of(p), Binding::Binary(BinaryKind::Numeric(p)))
                        })
                    }
                    _ => Err(self.bad_binary(op, lt, rt, location)),
                }
            }
        }
    }

    fn promote_operands(&mut self, left: &Expr, right: &Expr, lt: TypeId, rt: TypeId, p: PrimitiveType) {
        let left_steps = promote(&self.arena, lt, p);
        let right_steps = promote(&self.arena, rt, p);
        self.set_conversion(left, left_steps);
        self.set_conversion(right, right_steps);
    }

    fn incomparable(&self, lt: TypeId, rt: TypeId, location: Location) -> Error {
        Error::semantic(
            format!(
                "incomparable types: {} and {}",
                self.arena.display(lt),
                self.arena.display(rt)
            ),
            location,
        )
    }

    /// Attribute the left side of an assignment or an increment
    fn attr_target(&mut self, target: &'u Expr, usage: Use) -> Result<ExprInfo> {
        let inner = target.unparen();
        let is_variable = matches!(
            inner.kind,
            ExprKind::Name(_) | ExprKind::FieldAccess { .. } | ExprKind::SuperField { .. } | ExprKind::ArrayAccess { .. }
        );
        if !is_variable {
            return Err(semantic_at(target, "unexpected type: required variable, found value"));
        }
        let mut info = self.attr_value(inner, usage)?;
        // an assigned variable is not a constant here
        info.constant = None;
        let info = self.record(inner, info);
        if !std::ptr::eq(inner, target) {
            self.record(target, ExprInfo::new(info.ty));
        }
        self.check_final_assignment(inner, &info)?;
        Ok(info)
    }

    /// Final fields may only be assigned by simple name (or `this.x`) in
    /// the constructors and initializers of their own class
    fn check_final_assignment(&mut self, target: &Expr, info: &ExprInfo) -> Result<()> {
        let access: Option<&FieldAccess> = match &info.binding {
            Binding::Name(path) => match path.steps.last() {
                Some(NameStep::Field(access)) => Some(access),
                Some(NameStep::Length) => None,
                None => match &path.start {
                    NameStart::Field(access) => Some(access),
                    NameStart::Local(_) => None,
                },
            },
            Binding::Field(access) => Some(access),
            _ => None,
        };
        let Some(access) = access else {
            return Ok(());
        };
        let field = &access.field;
        if !field.is_final() {
            return Ok(());
        }
        let simple = match &target.kind {
            ExprKind::Name(parts) => parts.len() == 1,
            ExprKind::FieldAccess { target, .. } => {
                matches!(target.unparen().kind, ExprKind::This { qualifier: None })
            }
            _ => false,
        };
        let in_init = match self.body.kind {
            BodyKind::Constructor => !field.is_static(),
            BodyKind::Initializer => self.body.is_static == field.is_static(),
            _ => false,
        };
        let owner_here = field.owner == self.current_type()?;
        if simple && in_init && owner_here && field.constant.is_none() {
            return Ok(());
        }
        Err(semantic_at(
            target,
            format!("cannot assign a value to final variable {}", field.name),
        ))
    }

    fn attr_assign(&mut self, op: AssignOp, target: &'u Expr, value: &'u Expr, location: Location) -> Result<ExprInfo> {
        match op {
            AssignOp::Assign => {
                let t = self.attr_target(target, Use::Write)?;
                self.attr_operand(value)?;
                self.coerce(value, t.ty, Context::Assignment)?;
                Ok(ExprInfo::with_binding(t.ty, Binding::Assign(AssignKind::Simple)))
            }
            AssignOp::Compound(bop) => {
                let t = self.attr_target(target, Use::ReadWrite)?;
                let v = self.attr_operand(value)?;
                if bop == BinaryOp::Add && t.ty == TypeId::STRING {
                    return Ok(ExprInfo::with_binding(
                        t.ty,
                        Binding::Assign(AssignKind::Compound {
                            op: bop,
                            op_ty: None,
                            target_ty: t.ty,
                        }),
                    ));
                }
                let op_ty = if matches!(bop, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
                    && is_boolean(&self.arena, t.ty)
                    && is_boolean(&self.arena, v.ty)
                {
                    PrimitiveType::Boolean
                } else {
                    let (Some(a), Some(b)) = (numeric(&self.arena, t.ty), numeric(&self.arena, v.ty)) else {
                        return Err(self.bad_binary(bop, t.ty, v.ty, location));
                    };
                    let integral_only = bop.is_shift() || matches!(bop, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor);
                    if integral_only && (!a.is_integral() || !b.is_integral()) {
                        return Err(self.bad_binary(bop, t.ty, v.ty, location));
                    }
                    if bop.is_shift() {
                        unary_promotion(a)
                    } else {
                        binary_promotion(a, b)
                    }
                };
                let value_ty = if bop.is_shift() { PrimitiveType::Int } else { op_ty };
                let steps = promote(&self.arena, v.ty, value_ty);
                self.set_conversion(value, steps);
                Ok(ExprInfo::with_binding(
                    t.ty,
                    Binding::Assign(AssignKind::Compound {
                        op: bop,
                        op_ty: Some(op_ty),
                        target_ty: t.ty,
                    }),
                ))
            }
        }
    }

    fn attr_conditional(&mut self, cond: &'u Expr, then_expr: &'u Expr, else_expr: &'u Expr) -> Result<ExprInfo> {
        let c = self.attr_cond(cond)?;
        let a = self.attr_operand(then_expr)?;
        let b = self.attr_operand(else_expr)?;
        let location = then_expr.span.start;
        let (at, bt) = (a.ty, b.ty);

        let pick = |c: &ExprInfo| c.constant.as_ref().and_then(|v| v.as_bool());
        let chosen = |ty: TypeId, arena: &crate::common::types::TypeArena| -> Option<ConstValue> {
            let which = pick(&c)?;
            let (x, y) = (a.constant.as_ref()?, b.constant.as_ref()?);
            let value = if which { x } else { y };
            match arena.primitive(ty) {
                Some(p) => value.convert_to(p),
                None if ty == TypeId::STRING => Some(value.clone()),
                None => None,
            }
        };

        if at == bt {
            let constant = chosen(at, &self.arena);
            return Ok(ExprInfo {
                constant,
                ..ExprInfo::new(at)
            });
        }

        if let (Some(p), Some(q)) = (numeric(&self.arena, at), numeric(&self.arena, bt)) {
            use PrimitiveType::*;
            let narrow_fit = |small: PrimitiveType, other: &ExprInfo, other_p: PrimitiveType| {
                other_p == Int && other.constant.as_ref().map(|v| fits_narrowing(v, small)).unwrap_or(false)
            };
            let result = if p == q {
                p
            } else if matches!((p, q), (Byte, Short) | (Short, Byte)) {
                Short
            } else if matches!(p, Byte | Short | Char) && narrow_fit(p, &b, q) {
                p
            } else if matches!(q, Byte | Short | Char) && narrow_fit(q, &a, p) {
                q
            } else {
                binary_promotion(p, q)
            };
            let ty = TypeId::of(result);
            self.set_conversion(then_expr, promote(&self.arena, at, result));
            self.set_conversion(else_expr, promote(&self.arena, bt, result));
            let constant = chosen(ty, &self.arena);
            return Ok(ExprInfo {
                constant,
                ..ExprInfo::new(ty)
            });
        }

        if is_boolean(&self.arena, at) && is_boolean(&self.arena, bt) {
            self.set_conversion(then_expr, promote(&self.arena, at, PrimitiveType::Boolean));
            self.set_conversion(else_expr, promote(&self.arena, bt, PrimitiveType::Boolean));
            let constant = chosen(TypeId::BOOLEAN, &self.arena);
            return Ok(ExprInfo {
                constant,
                ..ExprInfo::new(TypeId::BOOLEAN)
            });
        }

        // reference result: box primitive operands first
        let at = self.boxed_operand(then_expr, at, location)?;
        let bt = self.boxed_operand(else_expr, bt, location)?;
        let ty = if at == TypeId::NULL {
            bt
        } else if bt == TypeId::NULL || self.arena.is_subtype(bt, at).map_err(|e| locate(e, location))? {
            at
        } else if self.arena.is_subtype(at, bt).map_err(|e| locate(e, location))? {
            bt
        } else {
            self.arena.common_superclass(at, bt).map_err(|e| locate(e, location))?
        };
        Ok(ExprInfo::new(ty))
    }

    fn boxed_operand(&mut self, expr: &Expr, ty: TypeId, location: Location) -> Result<TypeId> {
        let Some(p) = self.arena.primitive(ty) else {
            return Ok(ty);
        };
        let boxed = self
            .arena
            .box_type(p)
            .ok_or_else(|| Error::semantic("'void' type not allowed here", location))?;
        self.set_conversion(expr, vec![super::ConvStep::Box(p)]);
        Ok(boxed)
    }

    /// Attribute call arguments, which must all be values
    fn attr_args(&mut self, args: &'u [Expr]) -> Result<Vec<TypeId>> {
        let mut types = Vec::with_capacity(args.len());
        for arg in args {
            types.push(self.attr_operand(arg)?.ty);
        }
        Ok(types)
    }

    /// Convert arguments to the chosen signature; returns the array type
    /// trailing arguments are packed into
    pub(crate) fn apply_args(&mut self, args: &[Expr], method: &MethodData, varargs: bool) -> Result<Option<TypeId>> {
        if !varargs {
            for (arg, &param) in args.iter().zip(&method.params) {
                self.coerce(arg, param, Context::LooseInvocation)?;
            }
            return Ok(None);
        }
        let fixed = method.params.len().saturating_sub(1);
        let array = method.params[fixed];
        let element = self
            .arena
            .element(array)
            .ok_or_else(|| Error::internal("variable arity parameter is not an array"))?;
        for (i, arg) in args.iter().enumerate() {
            let target = if i < fixed { method.params[i] } else { element };
            self.coerce(arg, target, Context::LooseInvocation)?;
        }
        Ok(Some(array))
    }

    /// Pick an overload or explain why none fits
    pub(crate) fn choose(
        &mut self,
        candidates: &[MethodData],
        args: &[TypeId],
        what: &str,
        class: TypeId,
        location: Location,
    ) -> Result<(MethodData, bool)> {
        let resolution = resolve(&mut self.arena, candidates, args).map_err(|e| locate(e, location))?;
        match resolution {
            Resolution::Found { method, varargs } => Ok((method, varargs)),
            Resolution::NotApplicable => {
                let kind = if what == "<init>" { "constructor" } else { "method" };
                let name = if what == "<init>" {
                    self.arena.display(class).rsplit('.').next().unwrap_or_default().to_string()
                } else {
                    what.to_string()
                };
                let message = if candidates.len() == 1 {
                    format!(
                        "{} {} in class {} cannot be applied to given types: required {}, found {}",
                        kind,
                        name,
                        self.arena.display(class),
                        describe_params(&self.param_list(&candidates[0].params)),
                        describe_params(&self.param_list(args)),
                    )
                } else {
                    format!("no suitable {} found for {}({})", kind, name, self.param_list(args))
                };
                Err(Error::semantic(message, location))
            }
            Resolution::Ambiguous(methods) => {
                let candidates = methods
                    .iter()
                    .map(|m| format!("{}({}) in {}", m.name, self.param_list(&m.params), self.arena.display(m.owner)))
                    .collect();
                Err(Error::ambiguous(format!("reference to {} is ambiguous", what), location, candidates))
            }
        }
    }

    fn attr_call(&mut self, expr: &Expr, receiver: &'u Receiver, name: &str, args: &'u [Expr]) -> Result<ExprInfo> {
        let location = expr.span.start;
        let (site, candidates, recv, holder) = match receiver {
            Receiver::Implicit => {
                match self.method_holder(name, location)? {
                    Some((holder, methods)) => (self.classes.get(holder).ty, methods, None, Some(holder)),
                    None => {
                        let imported = self.static_import_methods(name, location)?;
                        if imported.is_empty() {
                            let arg_types = self.attr_args(args)?;
                            return Err(Error::semantic(
                                format!("cannot find symbol: method {}({})", name, self.param_list(&arg_types)),
                                location,
                            ));
                        }
                        let owner = imported[0].owner;
                        (owner, imported, Some(Recv::Static), None)
                    }
                }
            }
            Receiver::Super => {
                let (_, parent) = self.super_of_current(location)?;
                let methods = self.arena.find_methods(parent, name).map_err(|e| locate(e, location))?;
                (parent, methods, Some(Recv::Super), None)
            }
            Receiver::Expr(target) => match self.attr_qualifier(target)? {
                Named::Type(ty) => {
                    let methods = self.arena.find_methods(ty, name).map_err(|e| locate(e, location))?;
                    (ty, methods, Some(Recv::Static), None)
                }
                Named::Package(package) => {
                    return Err(Error::semantic(format!("package {} does not exist", package), location))
                }
                Named::Value(info) => {
                    if self.arena.is_primitive(info.ty) {
                        return Err(Error::semantic(
                            format!("{} cannot be dereferenced", self.arena.display(info.ty)),
                            location,
                        ));
                    }
                    if info.ty == TypeId::NULL {
                        return Err(Error::semantic("<null> cannot be dereferenced", location));
                    }
                    let lookup = if self.arena.is_array(info.ty) { TypeId::OBJECT } else { info.ty };
                    let methods = self.arena.find_methods(lookup, name).map_err(|e| locate(e, location))?;
                    (info.ty, methods, Some(Recv::Expr), None)
                }
            },
        };

        let arg_types = self.attr_args(args)?;
        if candidates.is_empty() {
            return Err(Error::semantic(
                format!(
                    "cannot find symbol: method {}({}) in {}",
                    name,
                    self.param_list(&arg_types),
                    self.arena.display(site)
                ),
                location,
            ));
        }
        let (method, varargs) = self.choose(&candidates, &arg_types, name, site, location)?;
        let what = format!("{}({})", method.name, self.param_list(&method.params));
        self.check_member_access(method.owner, method.access, &what, location)?;

        let receiver = match (recv, holder) {
            (Some(Recv::Static), _) if !method.is_static() => {
                return Err(Error::semantic(
                    format!("non-static method {} cannot be referenced from a static context", what),
                    location,
                ))
            }
            (Some(Recv::Super), _) if method.is_abstract() => {
                return Err(Error::semantic(
                    format!(
                        "abstract method {} in {} cannot be accessed directly",
                        what,
                        self.arena.display(method.owner)
                    ),
                    location,
                ))
            }
            (Some(Recv::Super), _) if method.is_static() => Recv::Static,
            (Some(recv), _) => recv,
            (None, Some(holder)) => self.method_receiver(holder, &method, location)?,
            (None, None) => Recv::Static,
        };

        let array_receiver = self.arena.is_array(site);
        let array_clone = array_receiver && method.name == "clone" && method.params.is_empty();
        let site_is_interface = !array_receiver && self.arena.is_interface(site).map_err(|e| locate(e, location))?;
        let (site, invoke) = if method.is_static() {
            (site, InvokeKind::Static)
        } else if receiver == Recv::Super {
            (site, InvokeKind::Special)
        } else if array_receiver {
            (if array_clone { site } else { TypeId::OBJECT }, InvokeKind::Virtual)
        } else if site_is_interface && method.owner == TypeId::OBJECT {
            (TypeId::OBJECT, InvokeKind::Virtual)
        } else if site_is_interface {
            (site, InvokeKind::Interface)
        } else if method.is_private() && method.owner == site {
            (site, InvokeKind::Special)
        } else {
            (site, InvokeKind::Virtual)
        };
        let accessor = if receiver == Recv::Super { None } else { self.method_accessor(&method)? };
        let packed = self.apply_args(args, &method, varargs)?;
        let ret = if array_clone { site } else { method.ret };

        Ok(ExprInfo::with_binding(
            ret,
            Binding::Method(Box::new(CallInfo {
                method,
                site,
                invoke,
                receiver,
                varargs: packed,
                accessor,
                array_clone,
            })),
        ))
    }

    fn attr_new(
        &mut self,
        expr: &Expr,
        outer: Option<&'u Expr>,
        class_type: &'u TypeRef,
        args: &'u [Expr],
        body: Option<&'u TypeDecl>,
    ) -> Result<ExprInfo> {
        let location = expr.span.start;
        let (class, outer_arg) = match outer {
            Some(outer_expr) => {
                let info = self.attr_operand(outer_expr)?;
                let crate::ast::TypeRefKind::Named { name, .. } = &class_type.kind else {
                    return Err(semantic_at(class_type, "class expected here"));
                };
                let class = self
                    .member_type(info.ty, name, class_type.span)?
                    .ok_or_else(|| {
                        Error::semantic(
                            format!("cannot find symbol: class {} in {}", name, self.arena.display(info.ty)),
                            location,
                        )
                    })?;
                if self.arena.class_data(class)?.outer_instance.is_none() {
                    return Err(Error::semantic(
                        format!("qualified new of static class {}", self.arena.display(class)),
                        location,
                    ));
                }
                (class, OuterArg::Expr)
            }
            None => {
                let class = self.resolve_type_ref(class_type)?;
                if !self.arena.is_class(class) {
                    return Err(semantic_at(class_type, "class expected here"));
                }
                (class, OuterArg::None)
            }
        };

        if let Some(body) = body {
            return self.attr_anonymous(expr, class, outer_arg, args, body);
        }

        let data = self.arena.class_data(class).map_err(|e| locate(e, location))?;
        if data.is_abstract() || data.is_interface() {
            return Err(Error::semantic(
                format!("{} is abstract; cannot be instantiated", self.arena.display(class)),
                location,
            ));
        }
        let outer_arg = match (outer_arg, self.required_outer(class)?) {
            (OuterArg::Expr, _) => OuterArg::Expr,
            (_, Some(outer_ty)) => OuterArg::Implicit(self.enclosing_instance(outer_ty, location)?),
            (_, None) => OuterArg::None,
        };
        self.require_captures(class, location)?;

        let arg_types = self.attr_args(args)?;
        let ctors = self.arena.constructors(class).map_err(|e| locate(e, location))?;
        let (ctor, varargs) = self.choose(&ctors, &arg_types, "<init>", class, location)?;
        let what = format!(
            "{}({})",
            self.arena.display(class).rsplit('.').next().unwrap_or_default(),
            self.param_list(&ctor.params)
        );
        self.check_member_access(class, ctor.access, &what, location)?;
        let packed = self.apply_args(args, &ctor, varargs)?;
        Ok(ExprInfo::with_binding(
            class,
            Binding::New(Box::new(NewInfo {
                class,
                ctor,
                outer: outer_arg,
                super_outer: OuterArg::None,
                varargs: packed,
            })),
        ))
    }

    /// Type of the enclosing instance a class's constructors take
    pub(crate) fn required_outer(&mut self, class: TypeId) -> Result<Option<TypeId>> {
        if let Some(source) = self.classes.of_type(class) {
            return Ok(source.outer_this);
        }
        Ok(self.arena.class_data(class)?.outer_instance)
    }

    /// Attribute an array initializer against its array type
    pub(crate) fn attr_array_init(&mut self, init: &'u crate::ast::ArrayInit, ty: TypeId) -> Result<()> {
        let Some(element) = self.arena.element(ty) else {
            return Err(semantic_at(
                init,
                format!("illegal initializer for {}", self.arena.display(ty)),
            ));
        };
        self.tables.array_inits.insert(init.id, ty);
        for value in &init.elements {
            self.attr_var_init(value, element)?;
        }
        Ok(())
    }

    /// Attribute a variable initializer; returns its constant value
    /// converted to the variable's type
    pub(crate) fn attr_var_init(&mut self, init: &'u crate::ast::VarInit, ty: TypeId) -> Result<Option<ConstValue>> {
        match init {
            crate::ast::VarInit::Expr(expr) => {
                let info = self.attr_operand(expr)?;
                self.coerce(expr, ty, Context::Assignment)?;
                let constant = match (info.constant, self.arena.primitive(ty)) {
                    (Some(value), Some(p)) => value.convert_to(p),
                    (Some(value @ ConstValue::String(_)), None) if ty == TypeId::STRING => Some(value),
                    _ => None,
                };
                Ok(constant)
            }
            crate::ast::VarInit::Array(array) => {
                self.attr_array_init(array, ty)?;
                Ok(None)
            }
        }
    }
}

fn literal_info(literal: &Literal) -> ExprInfo {
    match literal {
        Literal::Int(v) => ExprInfo::constant(TypeId::INT, ConstValue::Int(*v)),
        Literal::Long(v) => ExprInfo::constant(TypeId::LONG, ConstValue::Long(*v)),
        Literal::Float(v) => ExprInfo::constant(TypeId::FLOAT, ConstValue::Float(*v)),
        Literal::Double(v) => ExprInfo::constant(TypeId::DOUBLE, ConstValue::Double(*v)),
        Literal::Char(v) => ExprInfo::constant(TypeId::CHAR, ConstValue::Char(*v)),
        Literal::String(v) => ExprInfo::constant(TypeId::STRING, ConstValue::String(v.clone())),
        Literal::Boolean(v) => ExprInfo::constant(TypeId::BOOLEAN, ConstValue::Boolean(*v)),
        Literal::Null => ExprInfo::new(TypeId::NULL),
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Plus => "+",
        UnaryOp::Minus => "-",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "~",
        UnaryOp::PreInc | UnaryOp::PostInc => "++",
        UnaryOp::PreDec | UnaryOp::PostDec => "--",
    }
}

fn describe_params(list: &str) -> String {
    if list.is_empty() {
        "no arguments".to_string()
    } else {
        list.to_string()
    }
}
