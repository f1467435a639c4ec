//! Flow phase: reachability, definite assignment and checked exceptions.
//!
//! Each body is walked once over the attributed tree with a [`State`]:
//! whether the current point can be reached, the locals definitely
//! assigned there, and the blank `final` locals that may already have been
//! assigned. Local and anonymous class bodies are separate entries of the
//! class table and are checked on their own.

use std::collections::{HashMap, HashSet};

use super::conversion::is_checked_exception;
use super::{Analysis, Binding, ClassKind, ClassTable, NameStart, SourceClass, Tables};
use crate::ast::{
    ArrayInit, AssignOp, BinaryOp, Block, CaseLabel, Expr, ExprKind, HasSpan, Location, Member, NodeId, Receiver, Span,
    Stmt, UnaryOp, VarInit,
};
use crate::common::model::ConstValue;
use crate::common::types::{TypeArena, TypeId};
use crate::config::{Config, UnreachablePolicy};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
struct State {
    alive: bool,
    inits: HashSet<NodeId>,
    /// Blank finals that may have been assigned
    maybe: HashSet<NodeId>,
}

impl State {
    fn live() -> Self {
        Self {
            alive: true,
            ..Self::default()
        }
    }

    fn dead(&self) -> Self {
        Self {
            alive: false,
            ..self.clone()
        }
    }

    fn revived(self) -> Self {
        Self { alive: true, ..self }
    }

    /// Merge of two incoming paths; an unreachable path contributes nothing
    fn join(self, other: State) -> State {
        match (self.alive, other.alive) {
            (true, true) => State {
                alive: true,
                inits: self.inits.intersection(&other.inits).copied().collect(),
                maybe: self.maybe.union(&other.maybe).copied().collect(),
            },
            (false, true) => other,
            _ => self,
        }
    }

    fn join_opt(self, other: Option<State>) -> State {
        match other {
            Some(other) => self.join(other),
            None => self,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Loop,
    Switch,
    Labeled,
}

/// Statement a `break` or `continue` may leave
#[derive(Debug)]
struct Target {
    labels: Vec<String>,
    kind: TargetKind,
    breaks: Option<State>,
    continues: Option<State>,
}

impl Target {
    fn new(labels: Vec<String>, kind: TargetKind) -> Self {
        Self {
            labels,
            kind,
            breaks: None,
            continues: None,
        }
    }
}

struct Flow<'a, 'u> {
    arena: &'a mut TypeArena,
    tables: &'a Tables,
    classes: &'a ClassTable<'u>,
    policy: UnreachablePolicy,
    elided: Vec<(usize, usize)>,

    state: State,
    targets: Vec<Target>,
    /// Exception types caught by each enclosing `try`, innermost last
    handlers: Vec<Vec<TypeId>>,
    /// Blank finals assigned anywhere inside each enclosing `try` block
    try_assigned: Vec<HashSet<NodeId>>,
    /// `throws` clause of the body
    declared: Vec<TypeId>,
    /// Anonymous class initializers may throw anything
    exempt: bool,
    /// Locals declared in this body
    tracked: HashSet<NodeId>,
    /// Blank final locals and the loop depth they were declared at
    blank_finals: HashMap<NodeId, usize>,
    loop_depth: usize,
}

impl<'a, 'u> Flow<'a, 'u> {
    fn begin_body(&mut self, declared: Vec<TypeId>, exempt: bool) {
        self.state = State::live();
        self.targets.clear();
        self.handlers.clear();
        self.try_assigned.clear();
        self.declared = declared;
        self.exempt = exempt;
        self.tracked.clear();
        self.blank_finals.clear();
        self.loop_depth = 0;
    }

    fn member(&mut self, class: &SourceClass<'u>, member: &Member) -> Result<()> {
        let exempt = class.kind == ClassKind::Anonymous;
        match member {
            Member::Field(field) => {
                for declarator in &field.declarators {
                    if let Some(init) = &declarator.init {
                        self.begin_body(Vec::new(), exempt && !field.modifiers.is_static());
                        self.var_init(init)?;
                    }
                }
                Ok(())
            }
            Member::Method(method) => {
                let Some(body) = &method.body else {
                    return Ok(());
                };
                let data = self.tables.method(method.id)?;
                let ret = data.ret;
                self.begin_body(data.throws.clone(), false);
                for param in &method.params {
                    self.declare_assigned(param.id);
                }
                self.stmts(&body.stmts)?;
                if self.state.alive && ret != TypeId::VOID {
                    return Err(Error::semantic("missing return statement", closing_brace(body)));
                }
                Ok(())
            }
            Member::Constructor(ctor) => {
                let data = self.tables.method(ctor.id)?;
                self.begin_body(data.throws.clone(), false);
                for param in &ctor.params {
                    self.declare_assigned(param.id);
                }
                match &ctor.explicit_call {
                    Some(call) => {
                        if let Some(qualifier) = &call.qualifier {
                            self.expr(qualifier)?;
                        }
                        for arg in &call.args {
                            self.expr(arg)?;
                        }
                        self.ctor_call_throws(call.id, call.span.start)?;
                    }
                    None => self.ctor_call_throws(ctor.id, ctor.span.start)?,
                }
                self.stmts(&ctor.body.stmts)
            }
            Member::Initializer(init) => {
                self.begin_body(Vec::new(), exempt && !init.is_static);
                self.stmts(&init.body.stmts)?;
                if !self.state.alive {
                    return Err(Error::semantic(
                        "initializer must be able to complete normally",
                        init.span.start,
                    ));
                }
                Ok(())
            }
            Member::Type(_) => Ok(()),
        }
    }

    /// The implicit `super()` of a default constructor
    fn default_constructor(&mut self, class: &SourceClass<'u>) -> Result<()> {
        let decl = class.decl;
        if decl.is_interface() || class.kind == ClassKind::Anonymous || decl.constructors().next().is_some() {
            return Ok(());
        }
        self.begin_body(Vec::new(), false);
        self.ctor_call_throws(decl.id, decl.span.start)
    }

    fn ctor_call_throws(&mut self, key: NodeId, location: Location) -> Result<()> {
        let Some(call) = self.tables.ctor_calls.get(&key) else {
            return Ok(());
        };
        for ty in call.ctor.throws.clone() {
            self.thrown(ty, location)?;
        }
        Ok(())
    }

    fn declare_assigned(&mut self, id: NodeId) {
        self.tracked.insert(id);
        self.state.inits.insert(id);
    }

    fn unreachable(&mut self, span: Span) -> Result<()> {
        match self.policy {
            UnreachablePolicy::Reject => Err(Error::semantic("unreachable statement", span.start)),
            UnreachablePolicy::Elide => {
                log::warn!(
                    "line {}: unreachable statement removed",
                    span.start.line
                );
                self.elided.push((span.start.offset, span.end.offset));
                Ok(())
            }
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        if !self.state.alive {
            return self.unreachable(stmt.span());
        }
        match stmt {
            Stmt::Block(block) => self.stmts(&block.stmts),
            Stmt::LocalVar(decl) => {
                for declarator in &decl.declarators {
                    self.tracked.insert(declarator.id);
                    match &declarator.init {
                        Some(init) => {
                            self.var_init(init)?;
                            self.state.inits.insert(declarator.id);
                        }
                        None if decl.modifiers.is_final() => {
                            self.blank_finals.insert(declarator.id, self.loop_depth);
                        }
                        None => {}
                    }
                }
                Ok(())
            }
            Stmt::LocalClass(_) | Stmt::Empty(_) => Ok(()),
            Stmt::Expr(s) => self.expr(&s.expr),
            Stmt::If(s) => {
                let (when_true, when_false) = self.cond(&s.cond)?;
                // both branches count as reachable, constant or not
                self.state = when_true.revived();
                self.stmt(&s.then_branch)?;
                let after_then = std::mem::take(&mut self.state);
                self.state = when_false.revived();
                if let Some(else_branch) = &s.else_branch {
                    self.stmt(else_branch)?;
                }
                let after_else = std::mem::take(&mut self.state);
                self.state = after_then.join(after_else);
                Ok(())
            }
            Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) | Stmt::ForEach(_) => self.loop_stmt(stmt, Vec::new()),
            Stmt::Labeled(_) => {
                let mut labels = Vec::new();
                let mut inner = stmt;
                while let Stmt::Labeled(labeled) = inner {
                    if self.targets.iter().any(|t| t.labels.contains(&labeled.label)) || labels.contains(&labeled.label)
                    {
                        return Err(Error::semantic(
                            format!("label {} already in use", labeled.label),
                            labeled.span.start,
                        ));
                    }
                    labels.push(labeled.label.clone());
                    inner = &labeled.body;
                }
                if matches!(inner, Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) | Stmt::ForEach(_)) {
                    return self.loop_stmt(inner, labels);
                }
                self.targets.push(Target::new(labels, TargetKind::Labeled));
                let result = self.stmt(inner);
                let target = self.pop_target();
                result?;
                let after = std::mem::take(&mut self.state);
                self.state = after.join_opt(target.breaks);
                Ok(())
            }
            Stmt::Switch(s) => {
                self.expr(&s.selector)?;
                let start = self.state.clone();
                let has_default = s
                    .cases
                    .iter()
                    .any(|c| c.labels.iter().any(|l| matches!(l, CaseLabel::Default(_))));
                self.targets.push(Target::new(Vec::new(), TargetKind::Switch));
                let result = (|| -> Result<()> {
                    for (i, case) in s.cases.iter().enumerate() {
                        // every case label is an entry point
                        self.state = if i == 0 || !self.state.alive {
                            start.clone()
                        } else {
                            std::mem::take(&mut self.state).join(start.clone())
                        };
                        self.stmts(&case.body)?;
                    }
                    Ok(())
                })();
                let target = self.pop_target();
                result?;
                let mut after = if s.cases.is_empty() {
                    start.clone()
                } else {
                    std::mem::take(&mut self.state)
                };
                if !has_default {
                    after = after.join(start);
                }
                self.state = after.join_opt(target.breaks);
                Ok(())
            }
            Stmt::Return(s) => {
                if let Some(value) = &s.value {
                    self.expr(value)?;
                }
                self.state.alive = false;
                Ok(())
            }
            Stmt::Break(jump) => {
                let index = self.jump_target(jump.label.as_deref(), false, jump.span.start)?;
                let state = self.state.clone();
                let target = &mut self.targets[index];
                target.breaks = Some(match target.breaks.take() {
                    Some(existing) => existing.join(state),
                    None => state,
                });
                self.state.alive = false;
                Ok(())
            }
            Stmt::Continue(jump) => {
                let index = self.jump_target(jump.label.as_deref(), true, jump.span.start)?;
                let state = self.state.clone();
                let target = &mut self.targets[index];
                target.continues = Some(match target.continues.take() {
                    Some(existing) => existing.join(state),
                    None => state,
                });
                self.state.alive = false;
                Ok(())
            }
            Stmt::Throw(s) => {
                self.expr(&s.expr)?;
                let ty = self.tables.expr(s.expr.id)?.ty;
                self.thrown(ty, s.span.start)?;
                self.state.alive = false;
                Ok(())
            }
            Stmt::Try(s) => self.try_stmt(s),
            Stmt::Synchronized(s) => {
                self.expr(&s.lock)?;
                self.stmts(&s.body.stmts)
            }
            Stmt::Assert(s) => {
                // assertions may be disabled: nothing they assign counts
                let before = self.state.clone();
                let (_, when_false) = self.cond(&s.cond)?;
                self.state = when_false.revived();
                if let Some(message) = &s.message {
                    self.expr(message)?;
                }
                self.state = before;
                Ok(())
            }
        }
    }

    fn pop_target(&mut self) -> Target {
        self.targets
            .pop()
            .unwrap_or_else(|| Target::new(Vec::new(), TargetKind::Labeled))
    }

    fn jump_target(&self, label: Option<&str>, is_continue: bool, location: Location) -> Result<usize> {
        match label {
            None => self
                .targets
                .iter()
                .rposition(|t| t.kind == TargetKind::Loop || (!is_continue && t.kind == TargetKind::Switch))
                .ok_or_else(|| {
                    Error::semantic(
                        if is_continue {
                            "continue outside of loop"
                        } else {
                            "break outside switch or loop"
                        },
                        location,
                    )
                }),
            Some(label) => {
                let index = self
                    .targets
                    .iter()
                    .rposition(|t| t.labels.iter().any(|l| l == label))
                    .ok_or_else(|| Error::semantic(format!("undefined label: {}", label), location))?;
                if is_continue && self.targets[index].kind != TargetKind::Loop {
                    return Err(Error::semantic(format!("not a loop label: {}", label), location));
                }
                Ok(index)
            }
        }
    }

    fn loop_stmt(&mut self, stmt: &Stmt, labels: Vec<String>) -> Result<()> {
        match stmt {
            Stmt::While(s) => {
                self.loop_depth += 1;
                self.targets.push(Target::new(labels, TargetKind::Loop));
                let result = (|| -> Result<State> {
                    let (when_true, when_false) = self.cond(&s.cond)?;
                    self.state = when_true;
                    self.stmt(&s.body)?;
                    Ok(when_false)
                })();
                let target = self.pop_target();
                self.loop_depth -= 1;
                self.state = result?.join_opt(target.breaks);
            }
            Stmt::DoWhile(s) => {
                self.loop_depth += 1;
                self.targets.push(Target::new(labels, TargetKind::Loop));
                let result = (|| -> Result<State> {
                    self.stmt(&s.body)?;
                    let continues = self.targets.last_mut().and_then(|t| t.continues.take());
                    self.state = std::mem::take(&mut self.state).join_opt(continues);
                    let (_, when_false) = self.cond(&s.cond)?;
                    Ok(when_false)
                })();
                let target = self.pop_target();
                self.loop_depth -= 1;
                self.state = result?.join_opt(target.breaks);
            }
            Stmt::For(s) => {
                self.stmts(&s.init)?;
                self.loop_depth += 1;
                self.targets.push(Target::new(labels, TargetKind::Loop));
                let result = (|| -> Result<State> {
                    let (when_true, when_false) = match &s.cond {
                        Some(cond) => self.cond(cond)?,
                        None => (self.state.clone(), self.state.dead()),
                    };
                    self.state = when_true;
                    self.stmt(&s.body)?;
                    let continues = self.targets.last_mut().and_then(|t| t.continues.take());
                    self.state = std::mem::take(&mut self.state).join_opt(continues);
                    for update in &s.update {
                        self.expr(update)?;
                    }
                    Ok(when_false)
                })();
                let target = self.pop_target();
                self.loop_depth -= 1;
                self.state = result?.join_opt(target.breaks);
            }
            Stmt::ForEach(s) => {
                self.expr(&s.iterable)?;
                let before = self.state.clone();
                self.loop_depth += 1;
                self.targets.push(Target::new(labels, TargetKind::Loop));
                self.declare_assigned(s.var_id);
                let result = self.stmt(&s.body);
                let target = self.pop_target();
                self.loop_depth -= 1;
                result?;
                self.state = before.join_opt(target.breaks);
            }
            _ => return self.stmt(stmt),
        }
        Ok(())
    }

    fn try_stmt(&mut self, s: &crate::ast::TryStmt) -> Result<()> {
        let start = self.state.clone();
        let caught: Vec<TypeId> = s
            .catches
            .iter()
            .filter_map(|c| self.tables.catch_types.get(&c.id))
            .flatten()
            .copied()
            .collect();
        self.handlers.push(caught);
        self.try_assigned.push(HashSet::new());
        let result = self.stmts(&s.body.stmts);
        self.handlers.pop();
        let mut assigned = self.try_assigned.pop().unwrap_or_default();
        result?;

        let mut after = std::mem::take(&mut self.state);
        for clause in &s.catches {
            let mut entry = start.clone().revived();
            entry.maybe.extend(assigned.iter().copied());
            self.state = entry;
            self.declare_assigned(clause.id);
            self.try_assigned.push(HashSet::new());
            let result = self.stmts(&clause.body.stmts);
            let in_catch = self.try_assigned.pop().unwrap_or_default();
            result?;
            assigned.extend(in_catch);
            after = after.join(std::mem::take(&mut self.state));
        }

        if let Some(finally) = &s.finally {
            let mut entry = start.revived();
            entry.maybe.extend(assigned.iter().copied());
            entry.maybe.extend(after.maybe.iter().copied());
            self.state = entry;
            self.stmts(&finally.stmts)?;
            let end = std::mem::take(&mut self.state);
            if !end.alive {
                after.alive = false;
            }
            after.inits.extend(end.inits);
            after.maybe.extend(end.maybe);
        }
        self.state = after;
        Ok(())
    }

    fn var_init(&mut self, init: &VarInit) -> Result<()> {
        match init {
            VarInit::Expr(expr) => self.expr(expr),
            VarInit::Array(array) => self.array_init(array),
        }
    }

    fn array_init(&mut self, init: &ArrayInit) -> Result<()> {
        for element in &init.elements {
            self.var_init(element)?;
        }
        Ok(())
    }

    fn constant_bool(&self, expr: &Expr) -> Option<bool> {
        match self.tables.constant(expr) {
            Some(ConstValue::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    /// States when a boolean expression is true and when it is false. Only
    /// a constant condition as a whole makes one of them unreachable.
    fn cond(&mut self, expr: &Expr) -> Result<(State, State)> {
        match self.constant_bool(expr) {
            Some(true) => Ok((self.state.clone(), self.state.dead())),
            Some(false) => Ok((self.state.dead(), self.state.clone())),
            None => self.split(expr),
        }
    }

    fn split(&mut self, expr: &Expr) -> Result<(State, State)> {
        match &expr.kind {
            ExprKind::Paren(inner) => self.split(inner),
            ExprKind::Unary { op: UnaryOp::Not, operand } => {
                let (when_true, when_false) = self.split(operand)?;
                Ok((when_false, when_true))
            }
            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let (left_true, left_false) = self.split(left)?;
                self.state = left_true;
                let (right_true, right_false) = self.split(right)?;
                Ok((right_true, left_false.join(right_false)))
            }
            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let (left_true, left_false) = self.split(left)?;
                self.state = left_false;
                let (right_true, right_false) = self.split(right)?;
                Ok((left_true.join(right_true), right_false))
            }
            _ => {
                self.expr(expr)?;
                Ok((self.state.clone(), self.state.clone()))
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<()> {
        let location = expr.span.start;
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::This { .. } | ExprKind::ClassLit(_) | ExprKind::SuperField { .. } => Ok(()),
            ExprKind::Name(_) => self.read_name(expr),
            ExprKind::FieldAccess { target, .. } => self.expr(target),
            ExprKind::MethodCall { receiver, args, .. } => {
                if let Receiver::Expr(target) = receiver {
                    self.expr(target)?;
                }
                for arg in args {
                    self.expr(arg)?;
                }
                let throws = match self.tables.exprs.get(&expr.id).map(|i| &i.binding) {
                    Some(Binding::Method(call)) => call.method.throws.clone(),
                    _ => Vec::new(),
                };
                for ty in throws {
                    self.thrown(ty, location)?;
                }
                Ok(())
            }
            ExprKind::New { outer, args, .. } => {
                if let Some(outer) = outer {
                    self.expr(outer)?;
                }
                for arg in args {
                    self.expr(arg)?;
                }
                let Some(Binding::New(info)) = self.tables.exprs.get(&expr.id).map(|i| &i.binding) else {
                    return Ok(());
                };
                let throws = info.ctor.throws.clone();
                let captured: Vec<NodeId> = self
                    .classes
                    .of_type(info.class)
                    .map(|c| c.captures.iter().map(|capture| capture.var).collect())
                    .unwrap_or_default();
                for var in captured {
                    self.read_var(var, location)?;
                }
                for ty in throws {
                    self.thrown(ty, location)?;
                }
                Ok(())
            }
            ExprKind::NewArray { dims, init, .. } => {
                for dim in dims {
                    self.expr(dim)?;
                }
                match init {
                    Some(init) => self.array_init(init),
                    None => Ok(()),
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                self.expr(array)?;
                self.expr(index)
            }
            ExprKind::Unary { op, operand } if op.is_increment() => {
                self.expr(operand)?;
                self.assign(operand)
            }
            ExprKind::Unary { op: UnaryOp::Not, .. }
            | ExprKind::Binary {
                op: BinaryOp::And | BinaryOp::Or,
                ..
            } => {
                let (when_true, when_false) = self.split(expr)?;
                self.state = when_true.join(when_false);
                Ok(())
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            ExprKind::Assign { op, target, value } => {
                match op {
                    AssignOp::Assign => self.target_prefix(target)?,
                    AssignOp::Compound(_) => self.expr(target)?,
                }
                self.expr(value)?;
                self.assign(target)
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let (when_true, when_false) = self.cond(cond)?;
                self.state = when_true;
                self.expr(then_expr)?;
                let after_then = std::mem::take(&mut self.state);
                self.state = when_false;
                self.expr(else_expr)?;
                let after_else = std::mem::take(&mut self.state);
                self.state = after_then.join(after_else);
                Ok(())
            }
            ExprKind::Cast { expr: inner, .. } | ExprKind::InstanceOf { expr: inner, .. } | ExprKind::Paren(inner) => {
                self.expr(inner)
            }
        }
    }

    /// Local variable a name expression reads or writes, if any
    fn local_of(&self, expr: &Expr) -> Option<(NodeId, bool)> {
        match self.tables.exprs.get(&expr.id).map(|i| &i.binding) {
            Some(Binding::Name(path)) => match path.start {
                NameStart::Local(id) => Some((id, path.steps.is_empty())),
                NameStart::Field(_) => None,
            },
            _ => None,
        }
    }

    fn read_name(&mut self, expr: &Expr) -> Result<()> {
        match self.local_of(expr) {
            Some((id, _)) => self.read_var(id, expr.span.start),
            None => Ok(()),
        }
    }

    fn read_var(&mut self, id: NodeId, location: Location) -> Result<()> {
        if self.state.alive && self.tracked.contains(&id) && !self.state.inits.contains(&id) {
            let name = &self.tables.var(id)?.name;
            return Err(Error::semantic(
                format!("variable {} might not have been initialized", name),
                location,
            ));
        }
        Ok(())
    }

    /// Evaluate the parts of an assignment target that run before the value
    fn target_prefix(&mut self, target: &Expr) -> Result<()> {
        let target = target.unparen();
        match &target.kind {
            ExprKind::Name(_) => match self.local_of(target) {
                Some((id, false)) => self.read_var(id, target.span.start),
                _ => Ok(()),
            },
            ExprKind::FieldAccess { target: inner, .. } => self.expr(inner),
            ExprKind::ArrayAccess { array, index } => {
                self.expr(array)?;
                self.expr(index)
            }
            _ => Ok(()),
        }
    }

    fn assign(&mut self, target: &Expr) -> Result<()> {
        let target = target.unparen();
        let Some((id, true)) = self.local_of(target) else {
            return Ok(());
        };
        let var = self.tables.var(id)?;
        let location = target.span.start;
        if var.is_final {
            let Some(&depth) = self.blank_finals.get(&id) else {
                return Err(Error::semantic(
                    format!("cannot assign a value to final variable {}", var.name),
                    location,
                ));
            };
            if self.loop_depth > depth {
                return Err(Error::semantic(
                    format!("variable {} might be assigned in loop", var.name),
                    location,
                ));
            }
            if self.state.alive && self.state.maybe.contains(&id) {
                return Err(Error::semantic(
                    format!("variable {} might already have been assigned", var.name),
                    location,
                ));
            }
            self.state.maybe.insert(id);
            for assigned in &mut self.try_assigned {
                assigned.insert(id);
            }
        }
        self.state.inits.insert(id);
        Ok(())
    }

    fn thrown(&mut self, ty: TypeId, location: Location) -> Result<()> {
        if !self.arena.is_class(ty) || !is_checked_exception(self.arena, ty)? {
            return Ok(());
        }
        for frame in self.handlers.iter().rev() {
            for &caught in frame {
                if self.arena.is_subtype(ty, caught)? {
                    return Ok(());
                }
            }
        }
        for &declared in &self.declared {
            if self.arena.is_subtype(ty, declared)? {
                return Ok(());
            }
        }
        if self.exempt {
            return Ok(());
        }
        Err(Error::semantic(
            format!(
                "unreported exception {}; must be caught or declared to be thrown",
                self.arena.display(ty)
            ),
            location,
        ))
    }
}

/// Position of a block's closing brace
fn closing_brace(block: &Block) -> Location {
    let end = block.span.end;
    Location::new(end.line, end.column.saturating_sub(1).max(1), end.offset.saturating_sub(1))
}

/// Check every body of the analyzed batch
pub fn check(analysis: &mut Analysis, config: &Config) -> Result<()> {
    let mut errors = Vec::new();
    let elided = {
        let mut flow = Flow {
            arena: &mut analysis.arena,
            tables: &analysis.tables,
            classes: &analysis.classes,
            policy: config.unreachable,
            elided: Vec::new(),
            state: State::live(),
            targets: Vec::new(),
            handlers: Vec::new(),
            try_assigned: Vec::new(),
            declared: Vec::new(),
            exempt: false,
            tracked: HashSet::new(),
            blank_finals: HashMap::new(),
            loop_depth: 0,
        };
        let classes = flow.classes;
        for class in classes.iter() {
            let mut results = Vec::with_capacity(class.decl.members.len() + 1);
            for member in &class.decl.members {
                results.push(flow.member(class, member));
            }
            results.push(flow.default_constructor(class));
            for result in results {
                match result {
                    Ok(()) => {}
                    Err(error) if config.batch_mode && !error.is_internal() => {
                        errors.extend(error.diagnostics());
                        if errors.len() >= config.max_errors {
                            return Err(Error::Diagnostics(errors));
                        }
                    }
                    Err(error) => return Err(error),
                }
            }
        }
        flow.elided
    };
    if !errors.is_empty() {
        return Err(Error::Diagnostics(errors));
    }
    if !elided.is_empty() {
        log::debug!("elided {} unreachable statement(s)", elided.len());
    }
    analysis.tables.elided.extend(elided);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::common::cache::ExternalTypes;
    use crate::config::{Config, UnreachablePolicy};
    use crate::parser::parse_compilation_unit;
    use crate::wash::analyze;

    fn check_with(source: &str, config: &Config) -> crate::error::Result<usize> {
        let units = vec![parse_compilation_unit(source).unwrap()];
        analyze(&units, ExternalTypes::bootstrap(), config).map(|a| a.tables.elided.len())
    }

    fn error_of(source: &str) -> String {
        check_with(source, &Config::default()).unwrap_err().to_string()
    }

    #[test]
    fn code_after_return_is_rejected() {
        let message = error_of("class A { int f() { return 1; int x = 2; } }");
        assert!(message.contains("unreachable statement"), "{}", message);
    }

    #[test]
    fn code_after_return_can_be_elided() {
        let config = Config::default().with_unreachable(UnreachablePolicy::Elide);
        let elided = check_with("class A { int f() { return 1; int x = 2; } }", &config).unwrap();
        assert_eq!(elided, 1);
    }

    #[test]
    fn constant_false_if_is_allowed() {
        check_with("class A { void f() { if (false) { return; } int x = 1; } }", &Config::default()).unwrap();
    }

    #[test]
    fn while_false_body_is_unreachable() {
        let message = error_of("class A { void f() { while (false) { f(); } } }");
        assert!(message.contains("unreachable statement"), "{}", message);
    }

    #[test]
    fn infinite_loop_needs_no_return() {
        check_with("class A { int f() { while (true) { } } }", &Config::default()).unwrap();
        let message = error_of("class A { int f() { while (true) { break; } } }");
        assert!(message.contains("missing return statement"), "{}", message);
    }

    #[test]
    fn uninitialized_local() {
        let message = error_of("class A { int f(boolean b) { int x; if (b) x = 1; return x; } }");
        assert!(message.contains("variable x might not have been initialized"), "{}", message);
        check_with(
            "class A { int f(boolean b) { int x; if (b) x = 1; else x = 2; return x; } }",
            &Config::default(),
        )
        .unwrap();
    }

    #[test]
    fn short_circuit_assignment() {
        check_with(
            "class A { int f(boolean b) { int x; if (b && (x = 3) > 0) return x; return 0; } }",
            &Config::default(),
        )
        .unwrap();
    }

    #[test]
    fn blank_final_assigned_twice() {
        let message = error_of("class A { void f(boolean b) { final int x; if (b) x = 1; x = 2; } }");
        assert!(message.contains("might already have been assigned"), "{}", message);
    }

    #[test]
    fn unreported_checked_exception() {
        let message = error_of("class A { void f() { throw new java.io.IOException(); } }");
        assert!(message.contains("unreported exception java.io.IOException"), "{}", message);
        check_with(
            "class A { void f() throws java.io.IOException { throw new java.io.IOException(); } \
             void g() { try { f(); } catch (java.io.IOException e) { } } }",
            &Config::default(),
        )
        .unwrap();
    }

    #[test]
    fn runtime_exceptions_need_no_handler() {
        check_with("class A { void f() { throw new IllegalStateException(); } }", &Config::default()).unwrap();
    }

    #[test]
    fn jumps_need_targets() {
        let message = error_of("class A { void f() { break; } }");
        assert!(message.contains("break outside switch or loop"), "{}", message);
        let message = error_of("class A { void f() { a: { continue a; } } }");
        assert!(message.contains("not a loop label: a"), "{}", message);
    }

    #[test]
    fn switch_without_default_falls_out() {
        let message = error_of("class A { int f(int k) { switch (k) { case 1: return 1; } } }");
        assert!(message.contains("missing return statement"), "{}", message);
        check_with(
            "class A { int f(int k) { switch (k) { case 1: return 1; default: return 2; } } }",
            &Config::default(),
        )
        .unwrap();
    }
}
