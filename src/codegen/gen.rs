//! Bytecode generation for classes and statements, after javac's `Gen`.
//!
//! [`ClassGen`] lays out one class of the batch: fields, methods,
//! constructors with their synthetic parameters, `<clinit>`, private member
//! accessors and `InnerClasses` rows. [`MethodGen`] fills one [`Code`]
//! buffer from an attributed body; expressions live in
//! [`gen_expr`](super::gen_expr) and conditional jumps in
//! [`gen_cond`](super::gen_cond).
//!
//! A jump out of a `try` or `synchronized` block inlines the pending
//! finalizers. Each inlined copy is cut out of the handler ranges of the
//! statements it leaves, so an exception raised by the copy is not caught
//! by the block being left.

use std::collections::HashMap;

use super::class_writer::{GeneratedClass, GeneratedField, GeneratedMethod, InnerClassInfo};
use super::code::{Code, Label};
use super::constpool::MemberRef;
use super::defs::access_flags::*;
use super::defs::{CONSTRUCTOR_METHOD_NAME, STATIC_INITIALIZER_METHOD_NAME};
use super::frame::VType;
use super::opcodes::*;
use crate::ast::{
    Block, CaseLabel, ConstructorDecl, CtorCall, CtorCallKind, ForEachStmt, HasSpan, LocalVarDecl, Member, MethodDecl,
    NodeId, Param, Stmt, SwitchStmt, SyncStmt, TryStmt, VarInit,
};
use crate::common::model::ConstValue;
use crate::common::types::{TypeArena, TypeId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::wash::{
    Accessor, AccessorTarget, AnonymousInfo, ClassKind, ClassTable, CtorCallInfo, ForEachKind, OuterArg, SwitchKind,
    Tables,
};

/// Field holding the enclosing instance of an inner class
pub(crate) const OUTER_THIS: &str = "this$0";

const FIELD_FLAGS: u16 = ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED | ACC_STATIC | ACC_FINAL | ACC_VOLATILE | ACC_TRANSIENT;

/// Generates one class of an analyzed batch
pub struct ClassGen<'g, 'u> {
    arena: &'g mut TypeArena,
    tables: &'g Tables,
    classes: &'g ClassTable<'u>,
    config: &'g Config,
    source_file: Option<&'g str>,
    index: usize,
}

impl<'g, 'u> ClassGen<'g, 'u> {
    pub fn new(
        arena: &'g mut TypeArena,
        tables: &'g Tables,
        classes: &'g ClassTable<'u>,
        config: &'g Config,
        source_file: Option<&'g str>,
        index: usize,
    ) -> Self {
        Self {
            arena,
            tables,
            classes,
            config,
            source_file,
            index,
        }
    }

    pub fn generate(mut self) -> Result<GeneratedClass> {
        let classes = self.classes;
        let class = classes.get(self.index);
        let decl = class.decl;
        let name = class.internal_name(self.arena).to_string();
        let data = self.arena.class_data(class.ty)?;
        let super_name = match data.super_class {
            Some(s) => self.arena.class_ref_name(s),
            None => "java/lang/Object".to_string(),
        };
        log::debug!("generating {}", name);

        let mut out = GeneratedClass::new(name, class.access, Some(super_name));
        out.interfaces = data.interfaces.iter().map(|&i| self.arena.class_ref_name(i)).collect();
        out.source_file = self.source_file.map(str::to_string);
        self.fields(&mut out)?;

        for member in &decl.members {
            match member {
                Member::Method(method) => {
                    let method = self.method(method)?;
                    out.methods.push(method);
                }
                Member::Constructor(ctor) => {
                    let ctor = self.constructor(Some(ctor))?;
                    out.methods.push(ctor);
                }
                _ => {}
            }
        }
        if !decl.is_interface() && decl.constructors().next().is_none() {
            let ctor = self.constructor(None)?;
            out.methods.push(ctor);
        }
        if let Some(clinit) = self.class_initializer()? {
            out.methods.push(clinit);
        }
        for accessor in &class.accessors {
            let method = self.accessor(accessor)?;
            out.methods.push(method);
        }
        out.inner_classes = self.inner_class_rows();
        Ok(out)
    }

    fn method_gen(&mut self, is_static: bool, is_constructor: bool, params: &[TypeId], ret: TypeId) -> MethodGen<'_, 'u> {
        MethodGen::new(
            &mut *self.arena,
            self.tables,
            self.classes,
            self.config,
            self.index,
            is_static,
            is_constructor,
            params,
            ret,
        )
    }

    fn fields(&mut self, out: &mut GeneratedClass) -> Result<()> {
        let (tables, classes) = (self.tables, self.classes);
        let class = classes.get(self.index);
        for member in &class.decl.members {
            let Member::Field(field) = member else {
                continue;
            };
            for declarator in &field.declarators {
                let data = tables
                    .fields
                    .get(&declarator.id)
                    .ok_or_else(|| Error::internal(format!("field {} was not entered", declarator.name)))?;
                let constant = if data.is_static() && data.is_final() {
                    data.constant.clone()
                } else {
                    None
                };
                out.fields.push(GeneratedField {
                    access: data.access & FIELD_FLAGS,
                    name: data.name.clone(),
                    descriptor: self.arena.descriptor(data.ty),
                    constant,
                    synthetic: false,
                });
            }
        }
        if let Some(outer) = class.outer_this {
            out.fields.push(GeneratedField {
                access: ACC_FINAL | ACC_SYNTHETIC,
                name: OUTER_THIS.to_string(),
                descriptor: self.arena.descriptor(outer),
                constant: None,
                synthetic: true,
            });
        }
        for capture in &class.captures {
            out.fields.push(GeneratedField {
                access: ACC_PRIVATE | ACC_FINAL | ACC_SYNTHETIC,
                name: capture.field_name(),
                descriptor: self.arena.descriptor(capture.ty),
                constant: None,
                synthetic: true,
            });
        }
        Ok(())
    }

    fn method(&mut self, method: &'u MethodDecl) -> Result<GeneratedMethod> {
        let data = self.tables.method(method.id)?.clone();
        let descriptor = self.arena.method_descriptor(&data.params, data.ret);
        let exceptions = data.throws.iter().map(|&t| self.arena.class_ref_name(t)).collect();
        let code = match &method.body {
            Some(body) => {
                let mut gen = self.method_gen(data.is_static(), false, &data.params, data.ret);
                let mut slot = if data.is_static() { 0 } else { 1 };
                for (param, &ty) in method.params.iter().zip(&data.params) {
                    slot = gen.declare_param(param, ty, slot);
                }
                gen.gen_block(body)?;
                if gen.code.is_alive() && data.ret == TypeId::VOID {
                    gen.code.emit_return(None);
                }
                Some(gen.finish())
            }
            None => None,
        };
        Ok(GeneratedMethod {
            access: data.access,
            name: data.name.clone(),
            descriptor,
            exceptions,
            code,
            synthetic: false,
        })
    }

    /// A declared constructor, or the default one (anonymous classes
    /// included) when `ctor` is `None`
    fn constructor(&mut self, ctor: Option<&'u ConstructorDecl>) -> Result<GeneratedMethod> {
        let (tables, classes) = (self.tables, self.classes);
        let class = classes.get(self.index);
        let key = ctor.map(|c| c.id).unwrap_or(class.decl.id);
        let data = tables.method(key)?.clone();
        let params = classes.ctor_params(self.arena, class.ty, &data)?;
        let descriptor = self.arena.method_descriptor(&params, TypeId::VOID);
        let exceptions = data.throws.iter().map(|&t| self.arena.class_ref_name(t)).collect();
        let nested = classes.iter().filter(|c| c.top == class.top).count() > 1;
        let access = if nested && data.access & ACC_PRIVATE != 0 {
            data.access & !ACC_PRIVATE
        } else {
            data.access
        };

        let mut gen = self.method_gen(false, true, &params, TypeId::VOID);
        let line = ctor.map(|c| c.span.start.line).unwrap_or(class.decl.span.start.line);
        gen.code.line(line);

        let mut slot = 1u16;
        if class.outer_this.is_some() {
            gen.outer_slot = Some(slot);
            slot += 1;
        }
        let super_outer = class.anonymous.as_ref().and_then(|a| a.super_outer);
        let super_outer_slot = super_outer.map(|ty| {
            let s = slot;
            slot += gen.vtype(ty).size();
            s
        });
        let mut forwarded = Vec::new();
        match ctor {
            Some(c) => {
                for (param, &ty) in c.params.iter().zip(&data.params) {
                    slot = gen.declare_param(param, ty, slot);
                }
            }
            None => {
                for &ty in &data.params {
                    forwarded.push((slot, ty));
                    slot += gen.vtype(ty).size();
                }
            }
        }
        for capture in &class.captures {
            gen.capture_slots.insert(capture.var, slot);
            slot += gen.vtype(capture.ty).size();
        }

        let explicit = ctor.and_then(|c| c.explicit_call.as_ref());
        let delegates = matches!(explicit, Some(call) if call.kind == CtorCallKind::This);
        if !delegates {
            gen.store_synthetic_fields()?;
        }
        match &class.anonymous {
            Some(anonymous) => gen.anonymous_super_call(anonymous, super_outer.zip(super_outer_slot), &forwarded)?,
            None => {
                let call_key = explicit.map(|c| c.id).unwrap_or(key);
                let info = tables.ctor_call(call_key)?;
                gen.ctor_call(info, explicit)?;
            }
        }
        if !delegates {
            gen.instance_initializers()?;
        }
        if let Some(c) = ctor {
            gen.gen_block(&c.body)?;
        }
        if gen.code.is_alive() {
            gen.code.emit_return(None);
        }
        let code = gen.finish();
        Ok(GeneratedMethod {
            access,
            name: CONSTRUCTOR_METHOD_NAME.to_string(),
            descriptor,
            exceptions,
            code: Some(code),
            synthetic: false,
        })
    }

    /// `<clinit>` for static initializers and non-constant static fields
    fn class_initializer(&mut self) -> Result<Option<GeneratedMethod>> {
        let (tables, classes) = (self.tables, self.classes);
        let decl = classes.get(self.index).decl;
        let needed = decl.members.iter().any(|m| match m {
            Member::Initializer(init) => init.is_static,
            Member::Field(field) => field.declarators.iter().any(|d| {
                d.init.is_some()
                    && tables
                        .fields
                        .get(&d.id)
                        .map(|f| f.is_static() && !(f.is_final() && f.constant.is_some()))
                        .unwrap_or(false)
            }),
            _ => false,
        });
        if !needed {
            return Ok(None);
        }

        let mut gen = self.method_gen(true, false, &[], TypeId::VOID);
        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    for declarator in &field.declarators {
                        let Some(init) = &declarator.init else {
                            continue;
                        };
                        let Some(data) = tables.fields.get(&declarator.id) else {
                            continue;
                        };
                        if !data.is_static() || (data.is_final() && data.constant.is_some()) {
                            continue;
                        }
                        gen.code.line(declarator.span.start.line);
                        gen.gen_var_init(init, data.ty)?;
                        let field = gen.member_ref(data.owner, &data.name, data.ty);
                        gen.code.field(PUTSTATIC, field);
                    }
                }
                Member::Initializer(init) if init.is_static => gen.gen_block(&init.body)?,
                _ => {}
            }
        }
        if gen.code.is_alive() {
            gen.code.emit_return(None);
        }
        Ok(Some(GeneratedMethod {
            access: ACC_STATIC,
            name: STATIC_INITIALIZER_METHOD_NAME.to_string(),
            descriptor: "()V".to_string(),
            exceptions: Vec::new(),
            code: Some(gen.finish()),
            synthetic: false,
        }))
    }

    /// Static bridge to a private member for the other classes of the nest
    fn accessor(&mut self, accessor: &Accessor) -> Result<GeneratedMethod> {
        let owner = self.classes.get(self.index).ty;
        let (params, ret, exceptions) = match &accessor.target {
            AccessorTarget::FieldRead(f) => {
                let params = if f.is_static() { vec![] } else { vec![owner] };
                (params, f.ty, Vec::new())
            }
            AccessorTarget::FieldWrite(f) => {
                let params = if f.is_static() { vec![f.ty] } else { vec![owner, f.ty] };
                (params, f.ty, Vec::new())
            }
            AccessorTarget::Method(m) => {
                let mut params = if m.is_static() { vec![] } else { vec![owner] };
                params.extend(m.params.iter().copied());
                let exceptions = m.throws.iter().map(|&t| self.arena.class_ref_name(t)).collect();
                (params, m.ret, exceptions)
            }
        };

        let mut gen = self.method_gen(true, false, &params, ret);
        let mut slot = 0u16;
        for &ty in &params {
            let vt = gen.vtype(ty);
            let size = vt.size();
            gen.code.load(slot, vt);
            slot += size;
        }
        match &accessor.target {
            AccessorTarget::FieldRead(f) => {
                let field = gen.member_ref(owner, &f.name, f.ty);
                gen.code.field(if f.is_static() { GETSTATIC } else { GETFIELD }, field);
            }
            AccessorTarget::FieldWrite(f) => {
                let field = gen.member_ref(owner, &f.name, f.ty);
                if f.is_static() {
                    gen.code.dup();
                    gen.code.field(PUTSTATIC, field);
                } else {
                    gen.code.dup_x(1);
                    gen.code.field(PUTFIELD, field);
                }
            }
            AccessorTarget::Method(m) => {
                let descriptor = gen.arena.method_descriptor(&m.params, m.ret);
                let name = gen.arena.class_ref_name(owner);
                let op = if m.is_static() { INVOKESTATIC } else { INVOKESPECIAL };
                gen.code.invoke(op, MemberRef::new(name, m.name.clone(), descriptor));
            }
        }
        let ret_vt = (ret != TypeId::VOID).then(|| gen.vtype(ret));
        gen.code.emit_return(ret_vt.as_ref());
        Ok(GeneratedMethod {
            access: ACC_STATIC | ACC_SYNTHETIC,
            name: accessor.name.clone(),
            descriptor: accessor.descriptor.clone(),
            exceptions,
            code: Some(gen.finish()),
            synthetic: true,
        })
    }

    /// Rows for the enclosing chain of this class (outermost first) and for
    /// the classes nested directly in it
    fn inner_class_rows(&self) -> Vec<InnerClassInfo> {
        let mut chain = Vec::new();
        let mut current = Some(self.index);
        while let Some(index) = current {
            let class = self.classes.get(index);
            if class.kind != ClassKind::TopLevel {
                chain.push(index);
            }
            current = class.outer;
        }
        chain.reverse();
        let nested = self
            .classes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.outer == Some(self.index))
            .map(|(i, _)| i);
        let mut rows: Vec<InnerClassInfo> = Vec::new();
        for index in chain.into_iter().chain(nested) {
            let row = self.inner_class_row(index);
            if !rows.contains(&row) {
                rows.push(row);
            }
        }
        rows
    }

    fn inner_class_row(&self, index: usize) -> InnerClassInfo {
        let class = self.classes.get(index);
        let outer = match (class.kind, class.outer) {
            (ClassKind::Member, Some(outer)) => Some(self.classes.get(outer).internal_name(self.arena).to_string()),
            _ => None,
        };
        InnerClassInfo {
            inner: class.internal_name(self.arena).to_string(),
            outer,
            simple_name: (class.kind != ClassKind::Anonymous).then(|| class.simple_name.clone()),
            access: class.inner_access,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Loop,
    Switch,
    /// A labeled statement that is not a loop or switch
    Block,
}

#[derive(Debug)]
struct JumpTarget {
    labels: Vec<String>,
    kind: TargetKind,
    exit: Label,
    cont: Option<Label>,
}

/// Code run on every exit from a protected block
#[derive(Debug, Clone, Copy)]
enum Finalizer<'u> {
    None,
    Block(&'u Block),
    /// Release the monitor held in this local
    Monitor(u16),
}

#[derive(Debug)]
enum Exit<'u> {
    Target(JumpTarget),
    Protected {
        finalizer: Finalizer<'u>,
        /// Inlined finalizer copies, excluded from the block's handlers
        gaps: Vec<(Label, Label)>,
    },
}

/// Generates the body of one method into a [`Code`] buffer
pub struct MethodGen<'g, 'u> {
    pub(super) arena: &'g mut TypeArena,
    pub(super) tables: &'g Tables,
    pub(super) classes: &'g ClassTable<'u>,
    pub(super) config: &'g Config,
    /// Index of the class being generated
    pub(super) class: usize,
    pub(super) this_name: String,
    pub(super) code: Code,
    pub(super) locals: HashMap<NodeId, (u16, VType)>,
    /// Constructors: slot of the enclosing instance parameter
    pub(super) outer_slot: Option<u16>,
    /// Constructors: slots of the captured variable parameters
    pub(super) capture_slots: HashMap<NodeId, u16>,
    ret: TypeId,
    scopes: Vec<(u16, usize)>,
    open_vars: Vec<usize>,
    exits: Vec<Exit<'u>>,
    pending_labels: Vec<String>,
}

impl<'g, 'u> MethodGen<'g, 'u> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arena: &'g mut TypeArena,
        tables: &'g Tables,
        classes: &'g ClassTable<'u>,
        config: &'g Config,
        class: usize,
        is_static: bool,
        is_constructor: bool,
        params: &[TypeId],
        ret: TypeId,
    ) -> Self {
        let source = classes.get(class);
        let this_name = source.internal_name(arena).to_string();
        let vtypes: Vec<VType> = params.iter().map(|&p| VType::of(arena, p)).collect();
        let mut code = Code::new(&this_name, is_static, is_constructor, &vtypes);
        let mut open_vars = Vec::new();
        if config.debug_vars && !is_static {
            let descriptor = arena.descriptor(source.ty);
            open_vars.push(code.begin_local_var("this", &descriptor, 0));
        }
        Self {
            arena,
            tables,
            classes,
            config,
            class,
            this_name,
            code,
            locals: HashMap::new(),
            outer_slot: None,
            capture_slots: HashMap::new(),
            ret,
            scopes: Vec::new(),
            open_vars,
            exits: Vec::new(),
            pending_labels: Vec::new(),
        }
    }

    /// Close the buffer: end the remaining variable ranges and check it
    pub fn finish(mut self) -> Code {
        for index in std::mem::take(&mut self.open_vars) {
            self.code.end_local_var(index);
        }
        self.code.finish();
        self.code
    }

    pub(super) fn vtype(&self, ty: TypeId) -> VType {
        VType::of(self.arena, ty)
    }

    pub(super) fn member_ref(&self, owner: TypeId, name: &str, ty: TypeId) -> MemberRef {
        MemberRef::new(self.arena.class_ref_name(owner), name, self.arena.descriptor(ty))
    }

    /// Bind a parameter to its slot; returns the next free slot
    fn declare_param(&mut self, param: &Param, ty: TypeId, slot: u16) -> u16 {
        let vt = self.vtype(ty);
        let size = vt.size();
        self.locals.insert(param.id, (slot, vt));
        if self.config.debug_vars {
            let descriptor = self.arena.descriptor(ty);
            let index = self.code.begin_local_var(&param.name, &descriptor, slot);
            self.open_vars.push(index);
        }
        slot + size
    }

    /// Allocate a slot for a local variable
    fn declare_local(&mut self, id: NodeId, ty: TypeId) -> (u16, VType) {
        let vt = self.vtype(ty);
        let slot = self.code.new_local(&vt);
        self.locals.insert(id, (slot, vt.clone()));
        (slot, vt)
    }

    fn begin_var_range(&mut self, name: &str, ty: TypeId, slot: u16) {
        if self.config.debug_vars {
            let descriptor = self.arena.descriptor(ty);
            let index = self.code.begin_local_var(name, &descriptor, slot);
            self.open_vars.push(index);
        }
    }

    fn enter_scope(&mut self) {
        self.scopes.push((self.code.next_local(), self.open_vars.len()));
    }

    fn exit_scope(&mut self) {
        if let Some((mark, vars)) = self.scopes.pop() {
            for index in self.open_vars.split_off(vars) {
                self.code.end_local_var(index);
            }
            self.code.free_locals(mark);
        }
    }

    // Constructors

    /// Copy the enclosing instance and captured variables into their
    /// fields; runs before the superclass constructor
    fn store_synthetic_fields(&mut self) -> Result<()> {
        let classes = self.classes;
        let class = classes.get(self.class);
        if let (Some(slot), Some(outer)) = (self.outer_slot, class.outer_this) {
            let vt = self.vtype(outer);
            self.code.load(0, VType::object(self.this_name.clone()));
            self.code.load(slot, vt);
            let field = self.member_ref(class.ty, OUTER_THIS, outer);
            self.code.field(PUTFIELD, field);
        }
        for capture in &class.captures {
            let slot = self.capture_slots.get(&capture.var).copied().ok_or_else(|| {
                Error::internal(format!("no constructor parameter for captured {}", capture.name))
            })?;
            let vt = self.vtype(capture.ty);
            self.code.load(0, VType::object(self.this_name.clone()));
            self.code.load(slot, vt);
            let field = self.member_ref(class.ty, &capture.field_name(), capture.ty);
            self.code.field(PUTFIELD, field);
        }
        Ok(())
    }

    /// Explicit or implicit `this(...)`/`super(...)`
    fn ctor_call(&mut self, info: &CtorCallInfo, call: Option<&'u CtorCall>) -> Result<()> {
        self.code.load(0, VType::object(self.this_name.clone()));
        match &info.outer {
            OuterArg::Expr => {
                let qualifier = call
                    .and_then(|c| c.qualifier.as_deref())
                    .ok_or_else(|| Error::internal("qualified superclass constructor call without qualifier"))?;
                self.gen_expr(qualifier)?;
                self.null_check();
            }
            OuterArg::Implicit(path) => self.load_outer(path)?,
            OuterArg::None => {}
        }
        if let Some(call) = call {
            self.gen_args(&call.args, &info.ctor.params, info.varargs)?;
        }
        self.push_captures_of(info.class)?;
        let descriptor = self.classes.ctor_descriptor(self.arena, info.class, &info.ctor)?;
        let owner = self.arena.class_ref_name(info.class);
        self.code
            .invoke(INVOKESPECIAL, MemberRef::new(owner, CONSTRUCTOR_METHOD_NAME, descriptor));
        Ok(())
    }

    /// Anonymous classes forward their arguments, and the enclosing
    /// instance of the superclass if it has one
    fn anonymous_super_call(
        &mut self,
        anonymous: &AnonymousInfo,
        super_outer: Option<(TypeId, u16)>,
        forwarded: &[(u16, TypeId)],
    ) -> Result<()> {
        let class_ty = self.classes.get(self.class).ty;
        let super_ty = self
            .arena
            .class_data(class_ty)?
            .super_class
            .unwrap_or(TypeId::OBJECT);
        self.code.load(0, VType::object(self.this_name.clone()));
        if let Some((ty, slot)) = super_outer {
            let vt = self.vtype(ty);
            self.code.load(slot, vt);
        }
        for &(slot, ty) in forwarded {
            let vt = self.vtype(ty);
            self.code.load(slot, vt);
        }
        self.push_captures_of(super_ty)?;
        let descriptor = self.classes.ctor_descriptor(self.arena, super_ty, &anonymous.super_ctor)?;
        let owner = self.arena.class_ref_name(super_ty);
        self.code
            .invoke(INVOKESPECIAL, MemberRef::new(owner, CONSTRUCTOR_METHOD_NAME, descriptor));
        Ok(())
    }

    /// Captured variables passed to a constructor of `class`
    pub(super) fn push_captures_of(&mut self, class: TypeId) -> Result<()> {
        let classes = self.classes;
        if let Some(target) = classes.of_type(class) {
            for capture in &target.captures {
                self.load_var(capture.var)?;
            }
        }
        Ok(())
    }

    /// Instance field initializers and initializer blocks, in order
    fn instance_initializers(&mut self) -> Result<()> {
        let (tables, classes) = (self.tables, self.classes);
        let decl = classes.get(self.class).decl;
        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    for declarator in &field.declarators {
                        let Some(init) = &declarator.init else {
                            continue;
                        };
                        let Some(data) = tables.fields.get(&declarator.id) else {
                            continue;
                        };
                        if data.is_static() {
                            continue;
                        }
                        self.code.line(declarator.span.start.line);
                        self.code.load(0, VType::object(self.this_name.clone()));
                        self.gen_var_init(init, data.ty)?;
                        let field = self.member_ref(data.owner, &data.name, data.ty);
                        self.code.field(PUTFIELD, field);
                    }
                }
                Member::Initializer(init) if !init.is_static => self.gen_block(&init.body)?,
                _ => {}
            }
        }
        Ok(())
    }

    // Statements

    pub(super) fn gen_block(&mut self, block: &'u Block) -> Result<()> {
        self.enter_scope();
        for stmt in &block.stmts {
            self.gen_stmt(stmt)?;
        }
        self.exit_scope();
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &'u Stmt) -> Result<()> {
        if !self.code.is_alive() || self.tables.is_elided(stmt.span()) {
            // later statements of the block may still name these locals
            if let Stmt::LocalVar(decl) = stmt {
                self.reserve_locals(decl)?;
            }
            self.pending_labels.clear();
            return Ok(());
        }
        let emits_line = match stmt {
            Stmt::Block(_) | Stmt::Empty(_) | Stmt::LocalClass(_) | Stmt::Labeled(_) | Stmt::Assert(_) => false,
            Stmt::LocalVar(decl) => decl.declarators.iter().any(|d| d.init.is_some()),
            _ => true,
        };
        if emits_line {
            self.code.line(stmt.span().start.line);
        }

        match stmt {
            Stmt::Block(block) => self.gen_block(block),
            Stmt::LocalVar(decl) => self.gen_local_var(decl),
            Stmt::LocalClass(_) | Stmt::Assert(_) | Stmt::Empty(_) => Ok(()),
            Stmt::Expr(s) => self.gen_effect(&s.expr),
            Stmt::If(s) => {
                let otherwise = self.code.new_label();
                self.gen_branch(&s.cond, false, otherwise)?;
                self.gen_stmt(&s.then_branch)?;
                match &s.else_branch {
                    Some(else_branch) => {
                        let end = self.code.new_label();
                        self.code.goto(end);
                        self.code.place(otherwise);
                        self.gen_stmt(else_branch)?;
                        self.code.place(end);
                    }
                    None => self.code.place(otherwise),
                }
                Ok(())
            }
            Stmt::While(s) => {
                let labels = std::mem::take(&mut self.pending_labels);
                let head = self.code.new_label();
                let exit = self.code.new_label();
                self.code.place(head);
                self.gen_branch(&s.cond, false, exit)?;
                self.loop_body(&s.body, labels, TargetKind::Loop, exit, Some(head))?;
                self.code.goto(head);
                self.code.place(exit);
                Ok(())
            }
            Stmt::DoWhile(s) => {
                let labels = std::mem::take(&mut self.pending_labels);
                let body = self.code.new_label();
                let cont = self.code.new_label();
                let exit = self.code.new_label();
                self.code.place(body);
                self.loop_body(&s.body, labels, TargetKind::Loop, exit, Some(cont))?;
                self.code.place(cont);
                if self.code.is_alive() {
                    self.code.line(s.cond.span.start.line);
                }
                self.gen_branch(&s.cond, true, body)?;
                self.code.place(exit);
                Ok(())
            }
            Stmt::For(s) => {
                let labels = std::mem::take(&mut self.pending_labels);
                self.enter_scope();
                for init in &s.init {
                    self.gen_stmt(init)?;
                }
                let head = self.code.new_label();
                let cont = self.code.new_label();
                let exit = self.code.new_label();
                self.code.place(head);
                if let Some(cond) = &s.cond {
                    self.gen_branch(cond, false, exit)?;
                }
                self.loop_body(&s.body, labels, TargetKind::Loop, exit, Some(cont))?;
                self.code.place(cont);
                for update in &s.update {
                    self.gen_effect(update)?;
                }
                self.code.goto(head);
                self.code.place(exit);
                self.exit_scope();
                Ok(())
            }
            Stmt::ForEach(s) => self.gen_foreach(s),
            Stmt::Switch(s) => self.gen_switch(s),
            Stmt::Return(s) => self.gen_return(s.value.as_ref()),
            Stmt::Break(s) => self.gen_jump(s.label.as_deref(), false),
            Stmt::Continue(s) => self.gen_jump(s.label.as_deref(), true),
            Stmt::Throw(s) => {
                self.gen_expr(&s.expr)?;
                self.code.emitop(ATHROW);
                Ok(())
            }
            Stmt::Try(s) => self.gen_try(s),
            Stmt::Synchronized(s) => self.gen_synchronized(s),
            Stmt::Labeled(s) => {
                self.pending_labels.push(s.label.clone());
                match s.body.as_ref() {
                    Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) | Stmt::ForEach(_) | Stmt::Switch(_) | Stmt::Labeled(_) => {
                        self.gen_stmt(&s.body)
                    }
                    body => {
                        let labels = std::mem::take(&mut self.pending_labels);
                        let exit = self.code.new_label();
                        self.loop_body(body, labels, TargetKind::Block, exit, None)?;
                        self.code.place(exit);
                        Ok(())
                    }
                }
            }
        }
    }

    fn loop_body(
        &mut self,
        body: &'u Stmt,
        labels: Vec<String>,
        kind: TargetKind,
        exit: Label,
        cont: Option<Label>,
    ) -> Result<()> {
        self.exits.push(Exit::Target(JumpTarget { labels, kind, exit, cont }));
        let result = self.gen_stmt(body);
        self.exits.pop();
        result
    }

    fn reserve_locals(&mut self, decl: &'u LocalVarDecl) -> Result<()> {
        let tables = self.tables;
        for declarator in &decl.declarators {
            if let Some(var) = tables.vars.get(&declarator.id) {
                self.declare_local(declarator.id, var.ty);
            }
        }
        Ok(())
    }

    fn gen_local_var(&mut self, decl: &'u LocalVarDecl) -> Result<()> {
        for declarator in &decl.declarators {
            let ty = self.tables.var(declarator.id)?.ty;
            let (slot, vt) = self.declare_local(declarator.id, ty);
            if let Some(init) = &declarator.init {
                self.gen_var_init(init, ty)?;
                self.code.store(slot, vt);
            }
            self.begin_var_range(&declarator.name, ty, slot);
        }
        Ok(())
    }

    pub(super) fn gen_var_init(&mut self, init: &'u VarInit, ty: TypeId) -> Result<()> {
        match init {
            VarInit::Expr(expr) => self.gen_expr(expr),
            VarInit::Array(array) => {
                let array_ty = self.tables.array_inits.get(&array.id).copied().unwrap_or(ty);
                self.gen_array_init(array, array_ty)
            }
        }
    }

    fn gen_foreach(&mut self, s: &'u ForEachStmt) -> Result<()> {
        let labels = std::mem::take(&mut self.pending_labels);
        let tables = self.tables;
        let info = tables
            .foreach
            .get(&s.id)
            .ok_or_else(|| Error::internal("enhanced for loop was not attributed"))?;
        let var_ty = tables.var(s.var_id)?.ty;
        self.enter_scope();
        let head = self.code.new_label();
        let exit = self.code.new_label();
        match &info.kind {
            ForEachKind::Array { array, element } => {
                let (array, element) = (*array, *element);
                let array_vt = self.vtype(array);
                self.gen_expr(&s.iterable)?;
                let array_slot = self.code.new_local(&array_vt);
                self.code.store(array_slot, array_vt.clone());
                let length = self.code.new_local(&VType::Integer);
                self.code.load(array_slot, array_vt.clone());
                self.code.emitop(ARRAYLENGTH);
                self.code.store(length, VType::Integer);
                let index = self.code.new_local(&VType::Integer);
                self.code.push_int(0);
                self.code.store(index, VType::Integer);

                let cont = self.code.new_label();
                self.code.place(head);
                self.code.load(index, VType::Integer);
                self.code.load(length, VType::Integer);
                self.code.jump(IF_ICMPGE, exit);
                self.code.load(array_slot, array_vt);
                self.code.load(index, VType::Integer);
                self.array_load(element);
                self.apply_conversion(&info.conversion)?;
                let (slot, vt) = self.declare_local(s.var_id, var_ty);
                self.code.store(slot, vt);
                self.begin_var_range(&s.name, var_ty, slot);
                self.loop_body(&s.body, labels, TargetKind::Loop, exit, Some(cont))?;
                self.code.place(cont);
                self.code.iinc(index, 1);
                self.code.goto(head);
            }
            ForEachKind::Iterable => {
                let iterator_vt = VType::object("java/util/Iterator");
                self.gen_expr(&s.iterable)?;
                self.code.invoke(
                    INVOKEINTERFACE,
                    MemberRef::new("java/lang/Iterable", "iterator", "()Ljava/util/Iterator;"),
                );
                let iterator = self.code.new_local(&iterator_vt);
                self.code.store(iterator, iterator_vt.clone());

                self.code.place(head);
                self.code.load(iterator, iterator_vt.clone());
                self.code
                    .invoke(INVOKEINTERFACE, MemberRef::new("java/util/Iterator", "hasNext", "()Z"));
                self.code.jump(IFEQ, exit);
                self.code.load(iterator, iterator_vt);
                self.code.invoke(
                    INVOKEINTERFACE,
                    MemberRef::new("java/util/Iterator", "next", "()Ljava/lang/Object;"),
                );
                self.apply_conversion(&info.conversion)?;
                let (slot, vt) = self.declare_local(s.var_id, var_ty);
                self.code.store(slot, vt);
                self.begin_var_range(&s.name, var_ty, slot);
                self.loop_body(&s.body, labels, TargetKind::Loop, exit, Some(head))?;
                self.code.goto(head);
            }
        }
        self.code.place(exit);
        self.exit_scope();
        Ok(())
    }

    fn gen_switch(&mut self, s: &'u SwitchStmt) -> Result<()> {
        let labels = std::mem::take(&mut self.pending_labels);
        let tables = self.tables;
        let kind = tables.switches.get(&s.id).copied().unwrap_or(SwitchKind::Int);
        self.enter_scope();
        let exit = self.code.new_label();
        let case_labels: Vec<Label> = s.cases.iter().map(|_| self.code.new_label()).collect();
        let mut default = exit;
        let mut entries: Vec<(&ConstValue, Label)> = Vec::new();
        for (case, &label) in s.cases.iter().zip(&case_labels) {
            for case_label in &case.labels {
                match case_label {
                    CaseLabel::Default(_) => default = label,
                    CaseLabel::Expr(expr) => {
                        let value = tables
                            .constant(expr)
                            .ok_or_else(|| Error::internal("case label without a constant value"))?;
                        entries.push((value, label));
                    }
                }
            }
        }

        self.gen_expr(&s.selector)?;
        match kind {
            SwitchKind::Int => {
                let mut keys = Vec::with_capacity(entries.len());
                for (value, label) in entries {
                    let key = value
                        .as_int()
                        .ok_or_else(|| Error::internal("non-integral case label"))?;
                    keys.push((key, label));
                }
                self.int_switch(keys, default);
            }
            SwitchKind::String => {
                let mut keys = Vec::with_capacity(entries.len());
                for (value, label) in entries {
                    let ConstValue::String(text) = value else {
                        return Err(Error::internal("non-string case label in a string switch"));
                    };
                    keys.push((text.as_str(), label));
                }
                self.string_switch(keys, default);
            }
        }

        self.exits.push(Exit::Target(JumpTarget {
            labels,
            kind: TargetKind::Switch,
            exit,
            cont: None,
        }));
        let mut result = Ok(());
        for (case, &label) in s.cases.iter().zip(&case_labels) {
            self.code.place(label);
            for stmt in &case.body {
                result = self.gen_stmt(stmt);
                if result.is_err() {
                    break;
                }
            }
            if result.is_err() {
                break;
            }
        }
        self.exits.pop();
        result?;
        self.code.place(exit);
        self.exit_scope();
        Ok(())
    }

    /// `tableswitch` when it is not much larger than `lookupswitch`,
    /// weighing time three times as much as space
    fn int_switch(&mut self, mut keys: Vec<(i32, Label)>, default: Label) {
        keys.sort_by_key(|&(k, _)| k);
        let (Some(&(lo, _)), Some(&(hi, _))) = (keys.first(), keys.last()) else {
            self.code.lookup_switch(default, keys);
            return;
        };
        let n = keys.len() as i64;
        let table_cost = 4 + (i64::from(hi) - i64::from(lo) + 1) + 3 * 3;
        let lookup_cost = 3 + 2 * n + 3 * n;
        if table_cost <= lookup_cost {
            let by_key: HashMap<i32, Label> = keys.into_iter().collect();
            let targets = (lo..=hi).map(|k| by_key.get(&k).copied().unwrap_or(default)).collect();
            self.code.table_switch(lo, default, targets);
        } else {
            self.code.lookup_switch(default, keys);
        }
    }

    /// Dispatch on `hashCode()`, then confirm with `equals`
    fn string_switch(&mut self, keys: Vec<(&str, Label)>, default: Label) {
        let string_vt = VType::object("java/lang/String");
        let selector = self.code.new_local(&string_vt);
        self.code.store(selector, string_vt.clone());
        self.code.load(selector, string_vt.clone());
        self.code
            .invoke(INVOKEVIRTUAL, MemberRef::new("java/lang/String", "hashCode", "()I"));

        let mut buckets: Vec<(i32, Label, Vec<(&str, Label)>)> = Vec::new();
        for (text, label) in keys {
            let hash = java_string_hash(text);
            match buckets.iter_mut().find(|(h, _, _)| *h == hash) {
                Some((_, _, bucket)) => bucket.push((text, label)),
                None => {
                    let bucket_label = self.code.new_label();
                    buckets.push((hash, bucket_label, vec![(text, label)]));
                }
            }
        }
        buckets.sort_by_key(|(h, _, _)| *h);
        let pairs = buckets.iter().map(|(h, l, _)| (*h, *l)).collect();
        self.code.lookup_switch(default, pairs);
        for (_, bucket_label, bucket) in buckets {
            self.code.place(bucket_label);
            for (text, label) in bucket {
                self.code.load(selector, string_vt.clone());
                self.code.push_string(text);
                self.code.invoke(
                    INVOKEVIRTUAL,
                    MemberRef::new("java/lang/String", "equals", "(Ljava/lang/Object;)Z"),
                );
                self.code.jump(IFNE, label);
            }
            self.code.goto(default);
        }
    }

    fn gen_return(&mut self, value: Option<&'u crate::ast::Expr>) -> Result<()> {
        let Some(value) = value else {
            let opened = self.unwind(0)?;
            self.code.emit_return(None);
            self.close_gaps(opened);
            return Ok(());
        };
        self.gen_expr(value)?;
        let vt = self.vtype(self.ret);
        let finalizers = self
            .exits
            .iter()
            .any(|e| matches!(e, Exit::Protected { finalizer, .. } if !matches!(finalizer, Finalizer::None)));
        if finalizers {
            let temp = self.code.new_local(&vt);
            self.code.store(temp, vt.clone());
            let opened = self.unwind(0)?;
            self.code.load(temp, vt.clone());
            self.code.emit_return(Some(&vt));
            self.close_gaps(opened);
        } else {
            let opened = self.unwind(0)?;
            self.code.emit_return(Some(&vt));
            self.close_gaps(opened);
        }
        Ok(())
    }

    fn gen_jump(&mut self, label: Option<&str>, is_continue: bool) -> Result<()> {
        let found = self.exits.iter().enumerate().rev().find_map(|(i, exit)| match exit {
            Exit::Target(t) => {
                let matches = match label {
                    Some(l) => t.labels.iter().any(|x| x == l),
                    None if is_continue => t.kind == TargetKind::Loop,
                    None => t.kind != TargetKind::Block,
                };
                matches.then(|| (i, if is_continue { t.cont } else { Some(t.exit) }))
            }
            Exit::Protected { .. } => None,
        });
        let Some((index, Some(target))) = found else {
            return Err(Error::internal(format!(
                "no target for {}",
                if is_continue { "continue" } else { "break" }
            )));
        };
        let opened = self.unwind(index + 1)?;
        self.code.goto(target);
        self.close_gaps(opened);
        Ok(())
    }

    /// Inline the finalizers of every protected block above `from`,
    /// innermost first. Returns the gaps opened, to be closed once the
    /// jump itself is emitted.
    fn unwind(&mut self, from: usize) -> Result<Vec<(usize, Label)>> {
        let mut opened = Vec::new();
        for i in (from..self.exits.len()).rev() {
            let Exit::Protected { finalizer, .. } = &self.exits[i] else {
                continue;
            };
            let finalizer = *finalizer;
            let start = self.code.new_label();
            self.code.place(start);
            opened.push((i, start));
            self.gen_finalizer(i, finalizer)?;
        }
        Ok(opened)
    }

    fn close_gaps(&mut self, opened: Vec<(usize, Label)>) {
        for (i, start) in opened {
            let end = self.code.new_label();
            self.code.place(end);
            if let Some(Exit::Protected { gaps, .. }) = self.exits.get_mut(i) {
                gaps.push((start, end));
            }
        }
    }

    /// Finalizer code runs with only the exits outside its own block
    fn gen_finalizer(&mut self, depth: usize, finalizer: Finalizer<'u>) -> Result<()> {
        match finalizer {
            Finalizer::None => Ok(()),
            Finalizer::Block(block) => {
                let inner = self.exits.split_off(depth);
                let result = self.gen_block(block);
                self.exits.extend(inner);
                result
            }
            Finalizer::Monitor(slot) => {
                self.code.load(slot, VType::object("java/lang/Object"));
                self.code.emitop(MONITOREXIT);
                Ok(())
            }
        }
    }

    /// Normal completion of a protected block or one of its handlers
    fn leave_protected(&mut self, depth: usize, exit: Label) -> Result<()> {
        if !self.code.is_alive() {
            return Ok(());
        }
        let finalizer = match &self.exits[depth] {
            Exit::Protected { finalizer, .. } => *finalizer,
            Exit::Target(_) => return Err(Error::internal("exit stack out of order")),
        };
        if matches!(finalizer, Finalizer::None) {
            self.code.goto(exit);
            return Ok(());
        }
        let start = self.code.new_label();
        self.code.place(start);
        self.gen_finalizer(depth, finalizer)?;
        self.code.goto(exit);
        self.close_gaps(vec![(depth, start)]);
        Ok(())
    }

    fn gaps(&self, depth: usize) -> Vec<(Label, Label)> {
        match &self.exits[depth] {
            Exit::Protected { gaps, .. } => gaps.clone(),
            Exit::Target(_) => Vec::new(),
        }
    }

    fn gen_try(&mut self, s: &'u TryStmt) -> Result<()> {
        let finalizer = s.finally.as_ref().map(Finalizer::Block).unwrap_or(Finalizer::None);
        let handler_locals = self.code.locals_snapshot();
        let limit = self.code.next_local();
        let start = self.code.new_label();
        let exit = self.code.new_label();
        self.code.place(start);
        self.exits.push(Exit::Protected {
            finalizer,
            gaps: Vec::new(),
        });
        let depth = self.exits.len() - 1;

        self.gen_block(&s.body)?;
        let body_end = self.code.new_label();
        self.code.place(body_end);
        let body_ranges = ranges(start, body_end, &self.gaps(depth));
        self.leave_protected(depth, exit)?;

        let tables = self.tables;
        for clause in &s.catches {
            let types = tables
                .catch_types
                .get(&clause.id)
                .ok_or_else(|| Error::internal("catch clause was not attributed"))?;
            let var_ty = tables.var(clause.id)?.ty;
            let handler = self.code.new_label();
            for &ty in types {
                let catch_type = self.arena.class_ref_name(ty);
                for &(from, to) in &body_ranges {
                    self.code.add_handler(from, to, handler, Some(catch_type.clone()));
                }
            }
            let exception = self.vtype(var_ty);
            self.code.place_handler(handler, handler_locals.clone(), exception);
            self.code.line(clause.span.start.line);
            self.enter_scope();
            let (slot, vt) = self.declare_local(clause.id, var_ty);
            self.code.store(slot, vt);
            self.begin_var_range(&clause.name, var_ty, slot);
            self.gen_block(&clause.body)?;
            self.exit_scope();
            self.leave_protected(depth, exit)?;
        }

        if let Some(finally) = &s.finally {
            let catches_end = self.code.new_label();
            self.code.place(catches_end);
            let all_ranges = ranges(start, catches_end, &self.gaps(depth));
            self.exits.pop();
            self.catch_all(&all_ranges, handler_locals, |gen| gen.gen_block(finally))?;
        } else {
            self.exits.pop();
        }
        self.code.free_locals(limit);
        self.code.place(exit);
        Ok(())
    }

    /// Handler for any throwable over `ranges`: run `finalize`, rethrow
    fn catch_all(
        &mut self,
        ranges: &[(Label, Label)],
        handler_locals: Vec<VType>,
        finalize: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let throwable = VType::object("java/lang/Throwable");
        let handler = self.code.new_label();
        for &(from, to) in ranges {
            self.code.add_handler(from, to, handler, None);
        }
        self.code.place_handler(handler, handler_locals, throwable.clone());
        let temp = self.code.new_local(&throwable);
        self.code.store(temp, throwable.clone());
        finalize(self)?;
        self.code.load(temp, throwable);
        self.code.emitop(ATHROW);
        Ok(())
    }

    fn gen_synchronized(&mut self, s: &'u SyncStmt) -> Result<()> {
        let limit = self.code.next_local();
        let lock_vt = VType::object("java/lang/Object");
        self.gen_expr(&s.lock)?;
        self.code.dup();
        let lock = self.code.new_local(&lock_vt);
        self.code.store(lock, lock_vt);
        self.code.emitop(MONITORENTER);

        let handler_locals = self.code.locals_snapshot();
        let start = self.code.new_label();
        let exit = self.code.new_label();
        self.code.place(start);
        self.exits.push(Exit::Protected {
            finalizer: Finalizer::Monitor(lock),
            gaps: Vec::new(),
        });
        let depth = self.exits.len() - 1;
        self.gen_block(&s.body)?;
        let body_end = self.code.new_label();
        self.code.place(body_end);
        let body_ranges = ranges(start, body_end, &self.gaps(depth));
        self.leave_protected(depth, exit)?;
        self.exits.pop();
        self.catch_all(&body_ranges, handler_locals, |gen| {
            gen.gen_finalizer(0, Finalizer::Monitor(lock))
        })?;
        self.code.free_locals(limit);
        self.code.place(exit);
        Ok(())
    }
}

/// `[start, end)` minus the gaps, which are ordered and disjoint
fn ranges(start: Label, end: Label, gaps: &[(Label, Label)]) -> Vec<(Label, Label)> {
    let mut out = Vec::with_capacity(gaps.len() + 1);
    let mut from = start;
    for &(gap_start, gap_end) in gaps {
        out.push((from, gap_start));
        from = gap_end;
    }
    out.push((from, end));
    out
}

/// `String.hashCode()` over UTF-16 code units
pub(crate) fn java_string_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_hash_matches_java() {
        assert_eq!(java_string_hash(""), 0);
        assert_eq!(java_string_hash("a"), 97);
        assert_eq!(java_string_hash("hello"), 99162322);
        // "Aa" and "BB" collide in Java
        assert_eq!(java_string_hash("Aa"), java_string_hash("BB"));
    }

    #[test]
    fn ranges_skip_gaps() {
        let labels: Vec<Label> = (0..6).map(Label::from_index).collect();
        let out = ranges(labels[0], labels[5], &[(labels[1], labels[2]), (labels[3], labels[4])]);
        assert_eq!(
            out,
            vec![(labels[0], labels[1]), (labels[2], labels[3]), (labels[4], labels[5])]
        );
        assert_eq!(ranges(labels[0], labels[1], &[]), vec![(labels[0], labels[1])]);
    }
}
