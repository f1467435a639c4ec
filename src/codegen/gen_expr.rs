//! Expression code: values, conversions, assignments and calls.

use super::constpool::MemberRef;
use super::defs::CONSTRUCTOR_METHOD_NAME;
use super::frame::VType;
use super::gen::{MethodGen, OUTER_THIS};
use super::opcodes::*;
use crate::ast::{ArrayInit, BinaryOp, Expr, ExprKind, Literal, NodeId, Receiver, UnaryOp, VarInit};
use crate::common::model::ConstValue;
use crate::common::types::{PrimitiveType, TypeId};
use crate::error::{Error, Result};
use crate::wash::{
    AssignKind, BinaryKind, Binding, CallInfo, ConvStep, FieldAccess, InvokeKind, NameStart, NamePath, NameStep,
    NewInfo, OuterArg, OuterPath, Recv,
};

/// A variable being assigned, with its receiver (if any) already on the
/// stack
#[derive(Debug, Clone)]
enum Lvalue {
    Local(u16, VType),
    Static(FieldAccess),
    /// Receiver object on the stack
    Instance(FieldAccess),
    /// Array and index on the stack
    Array(TypeId),
}

/// Offset of the `long`, `float` and `double` variants of an `int`
/// arithmetic instruction
fn type_offset(p: PrimitiveType) -> u8 {
    match p {
        PrimitiveType::Long => 1,
        PrimitiveType::Float => 2,
        PrimitiveType::Double => 3,
        _ => 0,
    }
}

/// Instruction for a binary operator on operands promoted to `p`
pub(super) fn binary_opcode(op: BinaryOp, p: PrimitiveType) -> Result<u8> {
    let wide = u8::from(p == PrimitiveType::Long);
    Ok(match op {
        BinaryOp::Add => IADD + type_offset(p),
        BinaryOp::Sub => ISUB + type_offset(p),
        BinaryOp::Mul => IMUL + type_offset(p),
        BinaryOp::Div => IDIV + type_offset(p),
        BinaryOp::Rem => IREM + type_offset(p),
        BinaryOp::Shl => ISHL + wide,
        BinaryOp::Shr => ISHR + wide,
        BinaryOp::UShr => IUSHR + wide,
        BinaryOp::BitAnd => IAND + wide,
        BinaryOp::BitOr => IOR + wide,
        BinaryOp::BitXor => IXOR + wide,
        other => return Err(Error::internal(format!("no arithmetic instruction for {}", other.symbol()))),
    })
}

/// Descriptor of the `StringBuilder.append` overload for a value type
fn append_descriptor(p: Option<PrimitiveType>, ty: TypeId) -> &'static str {
    match p {
        Some(PrimitiveType::Boolean) => "(Z)Ljava/lang/StringBuilder;",
        Some(PrimitiveType::Char) => "(C)Ljava/lang/StringBuilder;",
        Some(PrimitiveType::Long) => "(J)Ljava/lang/StringBuilder;",
        Some(PrimitiveType::Float) => "(F)Ljava/lang/StringBuilder;",
        Some(PrimitiveType::Double) => "(D)Ljava/lang/StringBuilder;",
        Some(_) => "(I)Ljava/lang/StringBuilder;",
        None if ty == TypeId::STRING => "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
        None => "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
    }
}

/// Descriptor of the `String.valueOf` overload for a value type
fn value_of_descriptor(p: Option<PrimitiveType>) -> &'static str {
    match p {
        Some(PrimitiveType::Boolean) => "(Z)Ljava/lang/String;",
        Some(PrimitiveType::Char) => "(C)Ljava/lang/String;",
        Some(PrimitiveType::Long) => "(J)Ljava/lang/String;",
        Some(PrimitiveType::Float) => "(F)Ljava/lang/String;",
        Some(PrimitiveType::Double) => "(D)Ljava/lang/String;",
        Some(_) => "(I)Ljava/lang/String;",
        None => "(Ljava/lang/Object;)Ljava/lang/String;",
    }
}

impl<'g, 'u> MethodGen<'g, 'u> {
    /// Push the value of `expr`, converted as the resolver recorded
    pub(super) fn gen_expr(&mut self, expr: &'u Expr) -> Result<()> {
        let tables = self.tables;
        let info = tables.expr(expr.id)?;
        if let Some(value) = &info.constant {
            return self.push_constant(value, &info.conversion);
        }
        self.gen_raw(expr)?;
        self.apply_conversion(&info.conversion)
    }

    /// Evaluate `expr` for its side effects only
    pub(super) fn gen_effect(&mut self, expr: &'u Expr) -> Result<()> {
        let tables = self.tables;
        match (&expr.kind, &tables.expr(expr.id)?.binding) {
            (ExprKind::Assign { target, value, .. }, Binding::Assign(kind)) => self.gen_assign(target, value, *kind, false),
            (ExprKind::Unary { op, operand }, Binding::Increment { target_ty, op_ty }) => {
                self.gen_increment(*op, operand, *target_ty, *op_ty, false)
            }
            _ => {
                let depth = self.code.stack_depth();
                self.gen_expr(expr)?;
                if self.code.stack_depth() > depth {
                    self.code.pop();
                }
                Ok(())
            }
        }
    }

    /// Push a constant, folding leading primitive conversions into it
    fn push_constant(&mut self, value: &ConstValue, steps: &[ConvStep]) -> Result<()> {
        let mut value = value.clone();
        let mut rest = steps;
        while let Some((ConvStep::Primitive(_, to), tail)) = rest.split_first() {
            value = value
                .convert_to(*to)
                .ok_or_else(|| Error::internal("constant conversion failed"))?;
            rest = tail;
        }
        match &value {
            ConstValue::Boolean(b) => self.code.push_int(i32::from(*b)),
            ConstValue::Char(c) => self.code.push_int(i32::from(*c)),
            ConstValue::Byte(v) => self.code.push_int(i32::from(*v)),
            ConstValue::Short(v) => self.code.push_int(i32::from(*v)),
            ConstValue::Int(v) => self.code.push_int(*v),
            ConstValue::Long(v) => self.code.push_long(*v),
            ConstValue::Float(v) => self.code.push_float(*v),
            ConstValue::Double(v) => self.code.push_double(*v),
            ConstValue::String(s) => self.code.push_string(s),
        }
        self.apply_conversion(rest)
    }

    pub(super) fn apply_conversion(&mut self, steps: &[ConvStep]) -> Result<()> {
        for step in steps {
            match step {
                ConvStep::Primitive(from, to) => self.primitive_conversion(*from, *to),
                ConvStep::Box(p) => self.box_value(*p)?,
                ConvStep::Unbox(p) => self.unbox_value(*p)?,
                ConvStep::Checkcast(ty) => {
                    let name = self.arena.class_ref_name(*ty);
                    self.code.checkcast(&name);
                }
            }
        }
        Ok(())
    }

    fn primitive_conversion(&mut self, from: PrimitiveType, to: PrimitiveType) {
        use PrimitiveType::*;
        if from == to {
            return;
        }
        let int_like = |p: PrimitiveType| matches!(p, Boolean | Byte | Short | Char | Int);
        // to the computational type of `to` first
        let widened = match (from, to) {
            (f, Long) if int_like(f) => Some(I2L),
            (f, Float) if int_like(f) => Some(I2F),
            (f, Double) if int_like(f) => Some(I2D),
            (Long, Float) => Some(L2F),
            (Long, Double) => Some(L2D),
            (Float, Long) => Some(F2L),
            (Float, Double) => Some(F2D),
            (Double, Long) => Some(D2L),
            (Double, Float) => Some(D2F),
            (Long, t) if int_like(t) => Some(L2I),
            (Float, t) if int_like(t) => Some(F2I),
            (Double, t) if int_like(t) => Some(D2I),
            _ => None,
        };
        if let Some(op) = widened {
            self.code.emitop(op);
        }
        let from = if int_like(from) { from } else { Int };
        let narrow = match to {
            Byte if from != Byte => Some(I2B),
            Short if !matches!(from, Byte | Short) => Some(I2S),
            Char if from != Char => Some(I2C),
            _ => None,
        };
        if let Some(op) = narrow {
            self.code.emitop(op);
        }
    }

    fn box_value(&mut self, p: PrimitiveType) -> Result<()> {
        let class = p
            .box_class()
            .ok_or_else(|| Error::internal(format!("no wrapper class for {}", p.name())))?;
        let descriptor = format!("({})L{};", p.descriptor(), class);
        self.code
            .invoke(INVOKESTATIC, MemberRef::new(class, "valueOf", descriptor));
        Ok(())
    }

    fn unbox_value(&mut self, p: PrimitiveType) -> Result<()> {
        let class = p
            .box_class()
            .ok_or_else(|| Error::internal(format!("no wrapper class for {}", p.name())))?;
        let name = format!("{}Value", p.name());
        let descriptor = format!("(){}", p.descriptor());
        self.code.invoke(INVOKEVIRTUAL, MemberRef::new(class, name, descriptor));
        Ok(())
    }

    /// From the value of a variable of type `ty` to the primitive `p`
    fn to_operand(&mut self, ty: TypeId, p: PrimitiveType) -> Result<()> {
        let from = match self.arena.primitive(ty) {
            Some(from) => from,
            None => {
                let from = self
                    .arena
                    .unboxed(ty)
                    .ok_or_else(|| Error::internal("operand is neither primitive nor boxed"))?;
                self.unbox_value(from)?;
                from
            }
        };
        self.primitive_conversion(from, p);
        Ok(())
    }

    /// From an operation result of type `p` back to a variable of type `ty`
    fn from_operand(&mut self, p: PrimitiveType, ty: TypeId) -> Result<()> {
        match self.arena.primitive(ty) {
            Some(to) => self.primitive_conversion(p, to),
            None => {
                let to = self
                    .arena
                    .unboxed(ty)
                    .ok_or_else(|| Error::internal("target is neither primitive nor boxed"))?;
                self.primitive_conversion(p, to);
                self.box_value(to)?;
            }
        }
        Ok(())
    }

    /// The value of `expr` before its own conversions
    pub(super) fn gen_raw(&mut self, expr: &'u Expr) -> Result<()> {
        let tables = self.tables;
        let info = tables.expr(expr.id)?;
        match &expr.kind {
            ExprKind::Literal(Literal::Null) => {
                self.code.push_null();
                Ok(())
            }
            ExprKind::Literal(_) => Err(Error::internal("literal without a constant value")),
            ExprKind::Name(_) => match &info.binding {
                Binding::Name(path) => self.gen_name_path(path),
                _ => Err(Error::internal("unresolved name")),
            },
            ExprKind::FieldAccess { target, .. } => match &info.binding {
                Binding::Field(access) => {
                    self.field_receiver(Some(target), access)?;
                    self.read_field(access)
                }
                Binding::ArrayLength => {
                    self.gen_expr(target)?;
                    self.code.emitop(ARRAYLENGTH);
                    Ok(())
                }
                _ => Err(Error::internal("unresolved field access")),
            },
            ExprKind::SuperField { .. } => match &info.binding {
                Binding::Field(access) => {
                    self.field_receiver(None, access)?;
                    self.read_field(access)
                }
                _ => Err(Error::internal("unresolved super field")),
            },
            ExprKind::MethodCall { receiver, args, .. } => match &info.binding {
                Binding::Method(call) => self.gen_call(receiver, args, call),
                _ => Err(Error::internal("unresolved method call")),
            },
            ExprKind::New { outer, args, .. } => match &info.binding {
                Binding::New(new) => self.gen_new(outer.as_deref(), args, new),
                _ => Err(Error::internal("unresolved instance creation")),
            },
            ExprKind::NewArray { dims, init, .. } => {
                if let Some(init) = init {
                    return self.gen_array_init(init, info.ty);
                }
                for dim in dims {
                    self.gen_expr(dim)?;
                }
                if dims.len() == 1 {
                    let element = self
                        .arena
                        .element(info.ty)
                        .ok_or_else(|| Error::internal("array creation of a non-array type"))?;
                    self.new_array(element);
                } else {
                    let descriptor = self.arena.descriptor(info.ty);
                    let dims = u8::try_from(dims.len()).map_err(|_| Error::internal("too many array dimensions"))?;
                    self.code.multi_new_array(&descriptor, dims);
                }
                Ok(())
            }
            ExprKind::ArrayAccess { array, index } => {
                self.gen_expr(array)?;
                self.gen_expr(index)?;
                self.array_load(info.ty);
                Ok(())
            }
            ExprKind::Unary { op, operand } => match &info.binding {
                Binding::Increment { target_ty, op_ty } => self.gen_increment(*op, operand, *target_ty, *op_ty, true),
                Binding::Unary(p) => self.gen_unary(expr, *op, operand, *p),
                _ => Err(Error::internal("unresolved unary operator")),
            },
            ExprKind::Binary { op, left, right } => match &info.binding {
                Binding::Binary(BinaryKind::Concat) => self.gen_concat(expr),
                Binding::Binary(BinaryKind::Numeric(p)) if !op.is_comparison() => {
                    self.gen_expr(left)?;
                    self.gen_expr(right)?;
                    let opcode = binary_opcode(*op, *p)?;
                    self.code.emitop(opcode);
                    Ok(())
                }
                Binding::Binary(BinaryKind::Boolean)
                    if matches!(op, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor) =>
                {
                    self.gen_expr(left)?;
                    self.gen_expr(right)?;
                    let opcode = binary_opcode(*op, PrimitiveType::Int)?;
                    self.code.emitop(opcode);
                    Ok(())
                }
                Binding::Binary(_) => self.materialize(expr),
                _ => Err(Error::internal("unresolved binary operator")),
            },
            ExprKind::Assign { target, value, .. } => match &info.binding {
                Binding::Assign(kind) => self.gen_assign(target, value, *kind, true),
                _ => Err(Error::internal("unresolved assignment")),
            },
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let otherwise = self.code.new_label();
                let end = self.code.new_label();
                self.gen_branch(cond, false, otherwise)?;
                self.gen_expr(then_expr)?;
                self.code.goto(end);
                self.code.place(otherwise);
                self.gen_expr(else_expr)?;
                if self.arena.is_reference(info.ty) {
                    let top = self.vtype(info.ty);
                    self.code.place_with_top(end, top);
                } else {
                    self.code.place(end);
                }
                Ok(())
            }
            ExprKind::Cast { expr: inner, .. } => self.gen_expr(inner),
            ExprKind::InstanceOf { expr: inner, .. } => match &info.binding {
                Binding::InstanceOf(target) => {
                    self.gen_expr(inner)?;
                    let name = self.arena.class_ref_name(*target);
                    self.code.instance_of(&name);
                    Ok(())
                }
                _ => Err(Error::internal("unresolved instanceof")),
            },
            ExprKind::This { .. } => match &info.binding {
                Binding::This(path) => self.load_outer(path),
                _ => Err(Error::internal("unresolved this")),
            },
            ExprKind::ClassLit(_) => match &info.binding {
                Binding::ClassLit(ty) => self.class_literal(*ty),
                _ => Err(Error::internal("unresolved class literal")),
            },
            ExprKind::Paren(inner) => self.gen_expr(inner),
        }
    }

    fn gen_unary(&mut self, expr: &'u Expr, op: UnaryOp, operand: &'u Expr, p: PrimitiveType) -> Result<()> {
        match op {
            UnaryOp::Plus => self.gen_expr(operand),
            UnaryOp::Minus => {
                self.gen_expr(operand)?;
                self.code.emitop(INEG + type_offset(p));
                Ok(())
            }
            UnaryOp::BitNot => {
                self.gen_expr(operand)?;
                if p == PrimitiveType::Long {
                    self.code.push_long(-1);
                    self.code.emitop(IXOR + 1);
                } else {
                    self.code.push_int(-1);
                    self.code.emitop(IXOR);
                }
                Ok(())
            }
            UnaryOp::Not => self.materialize(expr),
            _ => Err(Error::internal("increment attributed as a plain unary operator")),
        }
    }

    /// A boolean condition as the value 1 or 0
    pub(super) fn materialize(&mut self, expr: &'u Expr) -> Result<()> {
        let otherwise = self.code.new_label();
        let end = self.code.new_label();
        self.gen_cond_raw(expr, false, otherwise)?;
        self.code.push_int(1);
        self.code.goto(end);
        self.code.place(otherwise);
        self.code.push_int(0);
        self.code.place(end);
        Ok(())
    }

    fn class_literal(&mut self, ty: TypeId) -> Result<()> {
        match self.arena.primitive(ty) {
            Some(p) => {
                let owner = p.box_class().unwrap_or("java/lang/Void");
                self.code
                    .field(GETSTATIC, MemberRef::new(owner, "TYPE", "Ljava/lang/Class;"));
            }
            None => {
                let name = self.arena.class_ref_name(ty);
                self.code.push_class(&name);
            }
        }
        Ok(())
    }

    // String concatenation

    fn gen_concat(&mut self, expr: &'u Expr) -> Result<()> {
        let mut operands = Vec::new();
        self.concat_operands(expr, &mut operands)?;
        let builder = "java/lang/StringBuilder";
        self.code.new_object(builder);
        self.code.dup();
        self.code
            .invoke(INVOKESPECIAL, MemberRef::new(builder, CONSTRUCTOR_METHOD_NAME, "()V"));
        for operand in operands {
            self.gen_expr(operand)?;
            let ty = self.tables.expr(operand.id)?.converted_type(self.arena);
            let descriptor = append_descriptor(self.arena.primitive(ty), ty);
            self.code.invoke(INVOKEVIRTUAL, MemberRef::new(builder, "append", descriptor));
        }
        self.code
            .invoke(INVOKEVIRTUAL, MemberRef::new(builder, "toString", "()Ljava/lang/String;"));
        Ok(())
    }

    /// Flatten a left-nested chain of non-constant concatenations
    fn concat_operands(&self, expr: &'u Expr, out: &mut Vec<&'u Expr>) -> Result<()> {
        let info = self.tables.expr(expr.id)?;
        match (&expr.kind, &info.binding) {
            (ExprKind::Binary { left, right, .. }, Binding::Binary(BinaryKind::Concat)) if info.constant.is_none() => {
                self.concat_operands(left, out)?;
                out.push(right);
            }
            _ => out.push(expr),
        }
        Ok(())
    }

    // Variables and fields

    fn gen_name_path(&mut self, path: &NamePath) -> Result<()> {
        match &path.start {
            NameStart::Local(var) => self.load_var(*var)?,
            NameStart::Field(access) => {
                match &access.receiver {
                    Recv::Static => {}
                    Recv::Implicit(outer) => {
                        if !access.field.is_static() {
                            self.load_outer(outer)?;
                        }
                    }
                    Recv::Expr | Recv::Super => return Err(Error::internal("name starts with a selected field")),
                }
                self.read_field(access)?;
            }
        }
        for step in &path.steps {
            self.gen_name_step(step)?;
        }
        Ok(())
    }

    fn gen_name_step(&mut self, step: &NameStep) -> Result<()> {
        match step {
            NameStep::Length => self.code.emitop(ARRAYLENGTH),
            NameStep::Field(access) => {
                if access.field.is_static() {
                    self.code.pop();
                }
                self.read_field(access)?;
            }
        }
        Ok(())
    }

    /// Push the object a field is selected from, if it needs one
    fn field_receiver(&mut self, target: Option<&'u Expr>, access: &FieldAccess) -> Result<()> {
        match &access.receiver {
            Recv::Static => {}
            Recv::Super => self.code.load(0, VType::object(self.this_name.clone())),
            Recv::Implicit(path) => {
                if !access.field.is_static() {
                    self.load_outer(path)?;
                }
            }
            Recv::Expr => {
                let target = target.ok_or_else(|| Error::internal("field selection without a target"))?;
                if self.is_type_name(target)? {
                    return Ok(());
                }
                self.gen_expr(target)?;
                if access.field.is_static() {
                    self.code.pop();
                }
            }
        }
        Ok(())
    }

    fn is_type_name(&self, expr: &Expr) -> Result<bool> {
        Ok(matches!(
            self.tables.expr(expr.id)?.binding,
            Binding::Type(_) | Binding::Package(_)
        ))
    }

    fn field_ref(&self, access: &FieldAccess) -> MemberRef {
        let owner = if self.arena.is_array(access.site) {
            access.field.owner
        } else {
            access.site
        };
        self.member_ref(owner, &access.field.name, access.field.ty)
    }

    fn read_field(&mut self, access: &FieldAccess) -> Result<()> {
        match &access.read {
            Some(accessor) => {
                let owner = self.arena.class_ref_name(accessor.owner);
                self.code.invoke(
                    INVOKESTATIC,
                    MemberRef::new(owner, accessor.name.clone(), accessor.descriptor.clone()),
                );
            }
            None => {
                let op = if access.field.is_static() { GETSTATIC } else { GETFIELD };
                let field = self.field_ref(access);
                self.code.field(op, field);
            }
        }
        Ok(())
    }

    fn write_field(&mut self, access: &FieldAccess) -> Result<()> {
        match &access.write {
            Some(accessor) => {
                let owner = self.arena.class_ref_name(accessor.owner);
                self.code.invoke(
                    INVOKESTATIC,
                    MemberRef::new(owner, accessor.name.clone(), accessor.descriptor.clone()),
                );
                self.code.pop();
            }
            None => {
                let op = if access.field.is_static() { PUTSTATIC } else { PUTFIELD };
                let field = self.field_ref(access);
                self.code.field(op, field);
            }
        }
        Ok(())
    }

    /// Push a local variable, reading captured ones from the constructor
    /// parameter or the synthetic field holding them
    pub(super) fn load_var(&mut self, var: NodeId) -> Result<()> {
        if let Some((slot, vt)) = self.locals.get(&var).cloned() {
            self.code.load(slot, vt);
            return Ok(());
        }
        let classes = self.classes;
        let class = classes.get(self.class);
        let capture = class
            .capture(var)
            .ok_or_else(|| Error::internal("local variable is neither in scope nor captured"))?;
        if let Some(&slot) = self.capture_slots.get(&var) {
            let vt = self.vtype(capture.ty);
            self.code.load(slot, vt);
            return Ok(());
        }
        self.code.load(0, VType::object(self.this_name.clone()));
        let field = self.member_ref(class.ty, &capture.field_name(), capture.ty);
        self.code.field(GETFIELD, field);
        Ok(())
    }

    /// Push `this` or the enclosing instance reached by following
    /// `this$0` out of each class on the path
    pub(super) fn load_outer(&mut self, path: &OuterPath) -> Result<()> {
        let classes = self.classes;
        let mut hops = path.0.iter();
        let Some(&first) = hops.next() else {
            self.code.load(0, VType::object(self.this_name.clone()));
            return Ok(());
        };
        let outer_of = |index: usize| {
            let class = classes.get(index);
            class
                .outer_this
                .map(|outer| (class.ty, outer))
                .ok_or_else(|| Error::internal("class has no enclosing instance"))
        };
        let (owner, outer) = outer_of(first)?;
        match self.outer_slot {
            Some(slot) if first == self.class => {
                let vt = self.vtype(outer);
                self.code.load(slot, vt);
            }
            _ => {
                self.code.load(0, VType::object(self.this_name.clone()));
                let field = self.member_ref(owner, OUTER_THIS, outer);
                self.code.field(GETFIELD, field);
            }
        }
        for &index in hops {
            let (owner, outer) = outer_of(index)?;
            let field = self.member_ref(owner, OUTER_THIS, outer);
            self.code.field(GETFIELD, field);
        }
        Ok(())
    }

    /// Evaluate the receiver parts of an assignment target
    fn prepare_lvalue(&mut self, target: &'u Expr) -> Result<Lvalue> {
        let tables = self.tables;
        let inner = target.unparen();
        let info = tables.expr(inner.id)?;
        match (&inner.kind, &info.binding) {
            (ExprKind::ArrayAccess { array, index }, _) => {
                self.gen_expr(array)?;
                self.gen_expr(index)?;
                Ok(Lvalue::Array(info.ty))
            }
            (ExprKind::Name(_), Binding::Name(path)) => {
                let Some((last, init)) = path.steps.split_last() else {
                    return match &path.start {
                        NameStart::Local(var) => {
                            let (slot, vt) = self
                                .locals
                                .get(var)
                                .cloned()
                                .ok_or_else(|| Error::internal("assignment to a variable not in scope"))?;
                            Ok(Lvalue::Local(slot, vt))
                        }
                        NameStart::Field(access) => self.field_lvalue(None, access),
                    };
                };
                let head = NamePath {
                    start: path.start.clone(),
                    steps: init.to_vec(),
                };
                self.gen_name_path(&head)?;
                match last {
                    NameStep::Field(access) if access.field.is_static() => {
                        self.code.pop();
                        Ok(Lvalue::Static(access.clone()))
                    }
                    NameStep::Field(access) => Ok(Lvalue::Instance(access.clone())),
                    NameStep::Length => Err(Error::internal("assignment to array length")),
                }
            }
            (ExprKind::FieldAccess { target, .. }, Binding::Field(access)) => self.field_lvalue(Some(target), access),
            (ExprKind::SuperField { .. }, Binding::Field(access)) => self.field_lvalue(None, access),
            _ => Err(Error::internal("assignment to a value")),
        }
    }

    fn field_lvalue(&mut self, target: Option<&'u Expr>, access: &FieldAccess) -> Result<Lvalue> {
        self.field_receiver(target, access)?;
        Ok(if access.field.is_static() {
            Lvalue::Static(access.clone())
        } else {
            Lvalue::Instance(access.clone())
        })
    }

    /// Copy the receiver parts so the variable can be read then written
    fn dup_receiver(&mut self, lvalue: &Lvalue) {
        match lvalue {
            Lvalue::Local(..) | Lvalue::Static(_) => {}
            Lvalue::Instance(_) => self.code.dup(),
            Lvalue::Array(_) => self.code.dup_pair(),
        }
    }

    /// Copy the value on top below the receiver parts, as the result of
    /// the assignment expression
    fn dup_value(&mut self, lvalue: &Lvalue) {
        match lvalue {
            Lvalue::Local(..) | Lvalue::Static(_) => self.code.dup(),
            Lvalue::Instance(_) => self.code.dup_x(1),
            Lvalue::Array(_) => self.code.dup_x(2),
        }
    }

    fn load_lvalue(&mut self, lvalue: &Lvalue) -> Result<()> {
        match lvalue {
            Lvalue::Local(slot, vt) => self.code.load(*slot, vt.clone()),
            Lvalue::Static(access) | Lvalue::Instance(access) => self.read_field(access)?,
            Lvalue::Array(element) => self.array_load(*element),
        }
        Ok(())
    }

    fn store_lvalue(&mut self, lvalue: &Lvalue) -> Result<()> {
        match lvalue {
            Lvalue::Local(slot, vt) => self.code.store(*slot, vt.clone()),
            Lvalue::Static(access) | Lvalue::Instance(access) => self.write_field(access)?,
            Lvalue::Array(element) => self.array_store(*element),
        }
        Ok(())
    }

    fn gen_assign(&mut self, target: &'u Expr, value: &'u Expr, kind: AssignKind, want: bool) -> Result<()> {
        let lvalue = self.prepare_lvalue(target)?;
        match kind {
            AssignKind::Simple => {
                self.gen_expr(value)?;
            }
            AssignKind::Compound {
                op,
                op_ty: Some(p),
                target_ty,
            } => {
                let delta = if p == PrimitiveType::Int { self.iinc_delta(op, value, target_ty) } else { None };
                if let (Lvalue::Local(slot, _), Some(delta)) = (&lvalue, delta) {
                    self.code.iinc(*slot, delta);
                    if want {
                        self.code.load(*slot, VType::Integer);
                    }
                    return Ok(());
                }
                self.dup_receiver(&lvalue);
                self.load_lvalue(&lvalue)?;
                self.to_operand(target_ty, p)?;
                self.gen_expr(value)?;
                let opcode = binary_opcode(op, p)?;
                self.code.emitop(opcode);
                self.from_operand(p, target_ty)?;
            }
            AssignKind::Compound { op_ty: None, .. } => {
                self.dup_receiver(&lvalue);
                self.load_lvalue(&lvalue)?;
                self.to_string_value(None)?;
                self.gen_expr(value)?;
                let ty = self.tables.expr(value.id)?.converted_type(self.arena);
                let p = self.arena.primitive(ty);
                self.to_string_value(p)?;
                self.code.invoke(
                    INVOKEVIRTUAL,
                    MemberRef::new("java/lang/String", "concat", "(Ljava/lang/String;)Ljava/lang/String;"),
                );
            }
        }
        if want {
            self.dup_value(&lvalue);
        }
        self.store_lvalue(&lvalue)
    }

    fn to_string_value(&mut self, p: Option<PrimitiveType>) -> Result<()> {
        self.code.invoke(
            INVOKESTATIC,
            MemberRef::new("java/lang/String", "valueOf", value_of_descriptor(p)),
        );
        Ok(())
    }

    /// `x += c` on an `int` local becomes `iinc` when `c` fits 16 bits
    fn iinc_delta(&self, op: BinaryOp, value: &Expr, target_ty: TypeId) -> Option<i16> {
        if target_ty != TypeId::INT {
            return None;
        }
        let c = i64::from(self.tables.constant(value).and_then(ConstValue::as_int)?);
        let c = match op {
            BinaryOp::Add => c,
            BinaryOp::Sub => -c,
            _ => return None,
        };
        i16::try_from(c).ok()
    }

    fn gen_increment(
        &mut self,
        op: UnaryOp,
        operand: &'u Expr,
        target_ty: TypeId,
        op_ty: PrimitiveType,
        want: bool,
    ) -> Result<()> {
        let post = matches!(op, UnaryOp::PostInc | UnaryOp::PostDec);
        let increment = matches!(op, UnaryOp::PreInc | UnaryOp::PostInc);
        let lvalue = self.prepare_lvalue(operand)?;
        if let (Lvalue::Local(slot, _), true) = (&lvalue, target_ty == TypeId::INT) {
            let slot = *slot;
            if want && post {
                self.code.load(slot, VType::Integer);
            }
            self.code.iinc(slot, if increment { 1 } else { -1 });
            if want && !post {
                self.code.load(slot, VType::Integer);
            }
            return Ok(());
        }

        self.dup_receiver(&lvalue);
        self.load_lvalue(&lvalue)?;
        if want && post {
            self.dup_value(&lvalue);
        }
        self.to_operand(target_ty, op_ty)?;
        match op_ty {
            PrimitiveType::Long => self.code.push_long(1),
            PrimitiveType::Float => self.code.push_float(1.0),
            PrimitiveType::Double => self.code.push_double(1.0),
            _ => self.code.push_int(1),
        }
        let binary = if increment { BinaryOp::Add } else { BinaryOp::Sub };
        let opcode = binary_opcode(binary, op_ty)?;
        self.code.emitop(opcode);
        self.from_operand(op_ty, target_ty)?;
        if want && !post {
            self.dup_value(&lvalue);
        }
        self.store_lvalue(&lvalue)
    }

    // Arrays

    pub(super) fn array_load(&mut self, element: TypeId) {
        let op = match self.arena.primitive(element) {
            Some(PrimitiveType::Boolean | PrimitiveType::Byte) => BALOAD,
            Some(PrimitiveType::Char) => CALOAD,
            Some(PrimitiveType::Short) => SALOAD,
            Some(PrimitiveType::Long) => LALOAD,
            Some(PrimitiveType::Float) => FALOAD,
            Some(PrimitiveType::Double) => DALOAD,
            Some(_) => IALOAD,
            None => AALOAD,
        };
        self.code.emitop(op);
    }

    fn array_store(&mut self, element: TypeId) {
        let op = match self.arena.primitive(element) {
            Some(PrimitiveType::Boolean | PrimitiveType::Byte) => BASTORE,
            Some(PrimitiveType::Char) => CASTORE,
            Some(PrimitiveType::Short) => SASTORE,
            Some(PrimitiveType::Long) => LASTORE,
            Some(PrimitiveType::Float) => FASTORE,
            Some(PrimitiveType::Double) => DASTORE,
            Some(_) => IASTORE,
            None => AASTORE,
        };
        self.code.emitop(op);
    }

    /// One-dimensional array creation; the length is on the stack
    fn new_array(&mut self, element: TypeId) {
        match self.arena.primitive(element) {
            Some(p) => self.code.new_primitive_array(p),
            None => {
                let name = self.arena.class_ref_name(element);
                self.code.new_reference_array(&name);
            }
        }
    }

    pub(super) fn gen_array_init(&mut self, init: &'u ArrayInit, array: TypeId) -> Result<()> {
        let element = self
            .arena
            .element(array)
            .ok_or_else(|| Error::internal("array initializer for a non-array type"))?;
        let length = i32::try_from(init.elements.len()).map_err(|_| Error::internal("array initializer too long"))?;
        self.code.push_int(length);
        self.new_array(element);
        for (i, value) in init.elements.iter().enumerate() {
            self.code.dup();
            self.code.push_int(i as i32);
            match value {
                VarInit::Expr(expr) => self.gen_expr(expr)?,
                VarInit::Array(nested) => {
                    let ty = self.tables.array_inits.get(&nested.id).copied().unwrap_or(element);
                    self.gen_array_init(nested, ty)?;
                }
            }
            self.array_store(element);
        }
        Ok(())
    }

    // Calls and instance creation

    /// Arguments converted to the parameters, packing trailing ones into
    /// an array for a variable arity call
    pub(super) fn gen_args(&mut self, args: &'u [Expr], params: &[TypeId], varargs: Option<TypeId>) -> Result<()> {
        let Some(array) = varargs else {
            for arg in args {
                self.gen_expr(arg)?;
            }
            return Ok(());
        };
        let fixed = params.len().saturating_sub(1);
        for arg in args.iter().take(fixed) {
            self.gen_expr(arg)?;
        }
        let element = self
            .arena
            .element(array)
            .ok_or_else(|| Error::internal("variable arity parameter is not an array"))?;
        let rest = &args[fixed.min(args.len())..];
        let length = i32::try_from(rest.len()).map_err(|_| Error::internal("too many arguments"))?;
        self.code.push_int(length);
        self.new_array(element);
        for (i, arg) in rest.iter().enumerate() {
            self.code.dup();
            self.code.push_int(i as i32);
            self.gen_expr(arg)?;
            self.array_store(element);
        }
        Ok(())
    }

    fn gen_call(&mut self, receiver: &'u Receiver, args: &'u [Expr], call: &CallInfo) -> Result<()> {
        match (&call.receiver, receiver) {
            (Recv::Static, Receiver::Expr(target)) => {
                if !self.is_type_name(target)? {
                    self.gen_expr(target)?;
                    self.code.pop();
                }
            }
            (Recv::Static, _) => {}
            (Recv::Expr, Receiver::Expr(target)) => {
                self.gen_expr(target)?;
                if call.method.is_static() {
                    self.code.pop();
                }
            }
            (Recv::Expr, _) => return Err(Error::internal("call on a missing receiver")),
            (Recv::Implicit(path), _) => {
                if !call.method.is_static() {
                    self.load_outer(path)?;
                }
            }
            (Recv::Super, _) => self.code.load(0, VType::object(self.this_name.clone())),
        }

        if call.array_clone {
            let array = self.arena.class_ref_name(call.site);
            self.code.invoke(
                INVOKEVIRTUAL,
                MemberRef::new(array.clone(), "clone", "()Ljava/lang/Object;"),
            );
            self.code.checkcast(&array);
            return Ok(());
        }

        self.gen_args(args, &call.method.params, call.varargs)?;
        if let Some(accessor) = &call.accessor {
            let owner = self.arena.class_ref_name(accessor.owner);
            self.code.invoke(
                INVOKESTATIC,
                MemberRef::new(owner, accessor.name.clone(), accessor.descriptor.clone()),
            );
            return Ok(());
        }
        let op = match call.invoke {
            InvokeKind::Static => INVOKESTATIC,
            InvokeKind::Virtual => INVOKEVIRTUAL,
            InvokeKind::Interface => INVOKEINTERFACE,
            InvokeKind::Special => INVOKESPECIAL,
        };
        let owner = self.arena.class_ref_name(call.site);
        let descriptor = self.arena.method_descriptor(&call.method.params, call.method.ret);
        self.code
            .invoke(op, MemberRef::new(owner, call.method.name.clone(), descriptor));
        Ok(())
    }

    /// `dup; getClass(); pop`: the null check javac emits for a
    /// qualifying instance
    pub(super) fn null_check(&mut self) {
        self.code.dup();
        self.code.invoke(
            INVOKEVIRTUAL,
            MemberRef::new("java/lang/Object", "getClass", "()Ljava/lang/Class;"),
        );
        self.code.pop();
    }

    fn outer_arg(&mut self, arg: &OuterArg, qualifier: Option<&'u Expr>) -> Result<()> {
        match arg {
            OuterArg::None => {}
            OuterArg::Expr => {
                let qualifier = qualifier.ok_or_else(|| Error::internal("qualified creation without a qualifier"))?;
                self.gen_expr(qualifier)?;
                self.null_check();
            }
            OuterArg::Implicit(path) => self.load_outer(path)?,
        }
        Ok(())
    }

    fn gen_new(&mut self, qualifier: Option<&'u Expr>, args: &'u [Expr], new: &NewInfo) -> Result<()> {
        let class = self.arena.class_ref_name(new.class);
        self.code.new_object(&class);
        self.code.dup();
        self.outer_arg(&new.outer, qualifier)?;
        self.outer_arg(&new.super_outer, qualifier)?;
        self.gen_args(args, &new.ctor.params, new.varargs)?;
        self.push_captures_of(new.class)?;
        let descriptor = self.classes.ctor_descriptor(self.arena, new.class, &new.ctor)?;
        self.code
            .invoke(INVOKESPECIAL, MemberRef::new(class, CONSTRUCTOR_METHOD_NAME, descriptor));
        Ok(())
    }
}
