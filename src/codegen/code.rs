//! Symbolic code buffer for one method.
//!
//! The generator appends instructions with symbolic operands (constants,
//! member references, labels) while the buffer simulates the operand stack
//! and local variable types. Simulation gives `max_stack`, catches stack
//! discipline bugs, and records the verifier frame expected at every branch
//! target. Offsets and constant pool indices are only assigned later by the
//! [`assembler`](super::assembler).
//!
//! Emission while the code is dead (after `goto`, `return` or `athrow`, and
//! before the next reachable label) is a no-op.

use super::constpool::MemberRef;
use super::frame::{Frame, VType};
use super::opcodes::{self, *};
use crate::common::descriptor::{parse_field_descriptor, parse_method_descriptor, DescType};
use crate::common::types::PrimitiveType;

/// A position in the instruction stream, bound when placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Label(index as u32)
    }
}

/// Operand of `ldc`, `ldc_w` and `ldc2_w`
#[derive(Debug, Clone, PartialEq)]
pub enum LdcValue {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    /// Class reference name
    Class(String),
}

impl LdcValue {
    pub fn is_wide(&self) -> bool {
        matches!(self, LdcValue::Long(_) | LdcValue::Double(_))
    }
}

#[derive(Debug, Clone)]
pub enum Insn {
    Op(u8),
    /// `bipush`, `newarray`
    Byte(u8, u8),
    /// `sipush`
    Short(u8, i16),
    /// Load or store by base opcode (`iload`..`aload`, `istore`..`astore`)
    Local(u8, u16),
    Iinc(u16, i16),
    Ldc(LdcValue),
    /// `new`, `anewarray`, `checkcast`, `instanceof`
    Type(u8, String),
    Field(u8, MemberRef),
    Invoke(u8, MemberRef),
    MultiANewArray(String, u8),
    Jump {
        op: u8,
        target: Label,
        /// State after a conditional branch falls through
        fallthrough: Option<Box<Frame>>,
    },
    TableSwitch {
        low: i32,
        default: Label,
        targets: Vec<Label>,
    },
    LookupSwitch {
        default: Label,
        pairs: Vec<(i32, Label)>,
    },
    Mark(Label),
    Line(u16),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LabelInfo {
    pub frame: Option<Frame>,
    pub placed: bool,
    /// Reached by a jump, switch or exception
    pub target: bool,
}

#[derive(Debug, Clone)]
pub struct Handler {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    /// `None` catches everything
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocalVarRange {
    pub name: String,
    pub descriptor: String,
    pub slot: u16,
    pub start: Label,
    pub end: Option<Label>,
}

#[derive(Debug)]
pub struct Code {
    pub(crate) insns: Vec<Insn>,
    pub(crate) labels: Vec<LabelInfo>,
    pub(crate) handlers: Vec<Handler>,
    pub(crate) local_vars: Vec<LocalVarRange>,
    pub(crate) initial: Frame,
    pub(crate) error: Option<String>,
    state: Frame,
    stack_slots: u16,
    max_stack: u16,
    max_locals: u16,
    next_local: u16,
    alive: bool,
    this_class: String,
    last_line: Option<u16>,
}

fn desc_vtype(desc: &DescType) -> Option<VType> {
    match desc {
        DescType::Primitive(PrimitiveType::Void) => None,
        DescType::Primitive(p) => Some(VType::of_primitive(*p)),
        DescType::Class(name) => Some(VType::object(name.clone())),
        DescType::Array(_) => Some(VType::object(desc.to_string())),
    }
}

/// Element type loaded by `aaload` from an array of the given type
fn element_of(array: &VType) -> VType {
    match array {
        VType::Object(name) if name.starts_with("[[") => VType::object(&name[1..]),
        VType::Object(name) if name.starts_with("[L") && name.ends_with(';') => {
            VType::object(&name[2..name.len() - 1])
        }
        VType::Null => VType::Null,
        _ => VType::object("java/lang/Object"),
    }
}

/// Array class reference name for elements of the given class reference name
pub fn array_ref_name(element: &str) -> String {
    if element.starts_with('[') {
        format!("[{}", element)
    } else {
        format!("[L{};", element)
    }
}

impl Code {
    /// Entry state: `this` (uninitialized in constructors) then parameters
    pub fn new(this_class: &str, is_static: bool, is_constructor: bool, params: &[VType]) -> Self {
        let mut locals = Vec::new();
        if !is_static {
            locals.push(if is_constructor {
                VType::UninitializedThis
            } else {
                VType::object(this_class)
            });
        }
        for p in params {
            locals.push(p.clone());
            if p.is_wide() {
                locals.push(VType::Top);
            }
        }
        let slots = locals.len() as u16;
        let state = Frame::new(locals, Vec::new());
        Self {
            insns: Vec::new(),
            labels: Vec::new(),
            handlers: Vec::new(),
            local_vars: Vec::new(),
            initial: state.clone(),
            error: None,
            state,
            stack_slots: 0,
            max_stack: 0,
            max_locals: slots,
            next_local: slots,
            alive: true,
            this_class: this_class.to_string(),
            last_line: None,
        }
    }

    pub fn this_class(&self) -> &str {
        &self.this_class
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub fn stack_depth(&self) -> usize {
        self.state.stack.len()
    }

    pub fn stack_top(&self) -> Option<&VType> {
        self.state.stack.last()
    }

    fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("code buffer invariant violated in {}: {}", self.this_class, message);
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    fn emit(&mut self, insn: Insn) {
        if self.alive {
            self.insns.push(insn);
        }
    }

    pub fn push(&mut self, v: VType) {
        if !self.alive {
            return;
        }
        self.stack_slots += v.size();
        self.max_stack = self.max_stack.max(self.stack_slots);
        self.state.stack.push(v);
    }

    fn pop_value(&mut self) -> VType {
        if !self.alive {
            return VType::Top;
        }
        match self.state.stack.pop() {
            Some(v) => {
                self.stack_slots -= v.size();
                v
            }
            None => {
                self.fail("operand stack underflow");
                VType::Top
            }
        }
    }

    fn pop_values(&mut self, count: usize) {
        for _ in 0..count {
            self.pop_value();
        }
    }

    /// Replace the type of the value on top of the stack
    pub fn set_top(&mut self, v: VType) {
        if !self.alive {
            return;
        }
        match self.state.stack.last_mut() {
            Some(top) if top.size() == v.size() => *top = v,
            _ => self.fail("set_top on an empty or differently sized stack"),
        }
    }

    // Labels

    pub fn new_label(&mut self) -> Label {
        self.labels.push(LabelInfo::default());
        Label(self.labels.len() as u32 - 1)
    }

    fn record_jump(&mut self, target: Label) {
        let current = self.state.clone();
        let info = &mut self.labels[target.index()];
        info.target = true;
        if info.placed {
            // backward branch; the frame recorded at placement must accept it
            let height = info.frame.as_ref().map(|f| f.stack.len());
            if height.is_some_and(|h| h != current.stack.len()) {
                self.fail(format!("backward branch with stack height {}", current.stack.len()));
            }
            return;
        }
        info.frame = Some(match info.frame.take() {
            Some(frame) => frame.merge(&current),
            None => current,
        });
    }

    /// Bind `label` to the current position
    pub fn place(&mut self, label: Label) {
        let next_local = self.next_local as usize;
        let incoming = self.labels[label.index()].frame.take();
        let frame = match (incoming, self.alive) {
            (Some(frame), true) => Some(frame.merge(&self.state)),
            (Some(frame), false) => Some(frame),
            (None, true) => Some(self.state.clone()),
            (None, false) => None,
        };
        if let Some(mut frame) = frame {
            frame.truncate_locals(next_local);
            self.stack_slots = frame.stack.iter().map(VType::size).sum();
            self.state = frame.clone();
            self.alive = true;
            self.labels[label.index()].frame = Some(frame);
        }
        self.labels[label.index()].placed = true;
        self.insns.push(Insn::Mark(label));
    }

    /// Bind a join point whose top stack value has a known static type.
    /// Merging two distinct classes yields `java/lang/Object`, which is too
    /// weak for the value produced by a conditional expression.
    pub fn place_with_top(&mut self, label: Label, top: VType) {
        self.place(label);
        if !self.alive {
            return;
        }
        if let Some(frame) = self.labels[label.index()].frame.as_mut() {
            if let Some(last) = frame.stack.last_mut() {
                if last.size() == top.size() {
                    *last = top.clone();
                }
            }
        }
        self.set_top(top);
    }

    /// Bind an exception handler entry: the try's locals plus the exception
    pub fn place_handler(&mut self, label: Label, locals: Vec<VType>, exception: VType) {
        self.alive = false;
        let frame = Frame::new(locals, vec![exception]);
        let info = &mut self.labels[label.index()];
        info.frame = Some(frame);
        info.target = true;
        self.place(label);
    }

    pub fn add_handler(&mut self, start: Label, end: Label, handler: Label, catch_type: Option<String>) {
        self.handlers.push(Handler {
            start,
            end,
            handler,
            catch_type,
        });
    }

    /// Locals currently in scope, as seen by a handler of a try starting here
    pub fn locals_snapshot(&self) -> Vec<VType> {
        let mut locals = self.state.locals.clone();
        locals.truncate(self.next_local as usize);
        locals
    }

    pub fn line(&mut self, line: usize) {
        let line = line.min(u16::MAX as usize) as u16;
        if self.alive && self.last_line != Some(line) {
            self.last_line = Some(line);
            self.insns.push(Insn::Line(line));
        }
    }

    // Locals

    pub fn next_local(&self) -> u16 {
        self.next_local
    }

    pub fn new_local(&mut self, v: &VType) -> u16 {
        let slot = self.next_local;
        self.next_local += v.size();
        self.max_locals = self.max_locals.max(self.next_local);
        slot
    }

    /// Release locals allocated at or above `slot`
    pub fn free_locals(&mut self, slot: u16) {
        self.next_local = slot;
        self.state.truncate_locals(slot as usize);
    }

    pub fn local_type(&self, slot: u16) -> Option<&VType> {
        self.state.locals.get(slot as usize)
    }

    pub fn begin_local_var(&mut self, name: &str, descriptor: &str, slot: u16) -> usize {
        let start = self.new_label();
        self.insns.push(Insn::Mark(start));
        self.labels[start.index()].placed = true;
        self.local_vars.push(LocalVarRange {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            slot,
            start,
            end: None,
        });
        self.local_vars.len() - 1
    }

    pub fn end_local_var(&mut self, index: usize) {
        let end = self.new_label();
        self.insns.push(Insn::Mark(end));
        self.labels[end.index()].placed = true;
        if let Some(range) = self.local_vars.get_mut(index) {
            range.end = Some(end);
        }
    }

    pub fn load(&mut self, slot: u16, v: VType) {
        let op = match v {
            VType::Integer => ILOAD,
            VType::Long => LLOAD,
            VType::Float => FLOAD,
            VType::Double => DLOAD,
            _ => ALOAD,
        };
        let pushed = match self.state.locals.get(slot as usize) {
            Some(current) if *current != VType::Top => current.clone(),
            _ => v,
        };
        self.emit(Insn::Local(op, slot));
        self.push(pushed);
    }

    pub fn store(&mut self, slot: u16, v: VType) {
        let op = match v {
            VType::Integer => ISTORE,
            VType::Long => LSTORE,
            VType::Float => FSTORE,
            VType::Double => DSTORE,
            _ => ASTORE,
        };
        self.emit(Insn::Local(op, slot));
        self.pop_value();
        if !self.alive {
            return;
        }
        let end = slot as usize + v.size() as usize;
        if self.state.locals.len() < end {
            self.state.locals.resize(end, VType::Top);
        }
        if v.is_wide() {
            self.state.locals[end - 1] = VType::Top;
        }
        self.state.locals[slot as usize] = v;
        self.max_locals = self.max_locals.max(end as u16);
    }

    pub fn iinc(&mut self, slot: u16, delta: i16) {
        self.emit(Insn::Iinc(slot, delta));
    }

    // Constants

    pub fn push_int(&mut self, value: i32) {
        match value {
            -1..=5 => self.emit(Insn::Op((ICONST_0 as i32 + value) as u8)),
            -128..=127 => self.emit(Insn::Byte(BIPUSH, value as i8 as u8)),
            -32768..=32767 => self.emit(Insn::Short(SIPUSH, value as i16)),
            _ => self.emit(Insn::Ldc(LdcValue::Int(value))),
        }
        self.push(VType::Integer);
    }

    pub fn push_long(&mut self, value: i64) {
        match value {
            0 | 1 => self.emit(Insn::Op(LCONST_0 + value as u8)),
            _ => self.emit(Insn::Ldc(LdcValue::Long(value))),
        }
        self.push(VType::Long);
    }

    pub fn push_float(&mut self, value: f32) {
        if value.to_bits() == 0.0f32.to_bits() || value == 1.0 || value == 2.0 {
            self.emit(Insn::Op(FCONST_0 + value as u8));
        } else {
            self.emit(Insn::Ldc(LdcValue::Float(value)));
        }
        self.push(VType::Float);
    }

    pub fn push_double(&mut self, value: f64) {
        if value.to_bits() == 0.0f64.to_bits() || value == 1.0 {
            self.emit(Insn::Op(DCONST_0 + value as u8));
        } else {
            self.emit(Insn::Ldc(LdcValue::Double(value)));
        }
        self.push(VType::Double);
    }

    pub fn push_string(&mut self, value: &str) {
        self.emit(Insn::Ldc(LdcValue::String(value.to_string())));
        self.push(VType::object("java/lang/String"));
    }

    pub fn push_null(&mut self) {
        self.emit(Insn::Op(ACONST_NULL));
        self.push(VType::Null);
    }

    pub fn push_class(&mut self, class_ref: &str) {
        self.emit(Insn::Ldc(LdcValue::Class(class_ref.to_string())));
        self.push(VType::object("java/lang/Class"));
    }

    // Operand-free instructions

    /// Emit an instruction without operands, simulating its stack effect
    pub fn emitop(&mut self, op: u8) {
        self.emit(Insn::Op(op));
        if !self.alive {
            return;
        }
        match op {
            NOP => {}
            ACONST_NULL => self.push(VType::Null),
            0x02..=0x08 => self.push(VType::Integer),
            0x09..=0x0a => self.push(VType::Long),
            0x0b..=0x0d => self.push(VType::Float),
            0x0e..=0x0f => self.push(VType::Double),
            IALOAD | BALOAD | CALOAD | SALOAD => {
                self.pop_values(2);
                self.push(VType::Integer);
            }
            LALOAD => {
                self.pop_values(2);
                self.push(VType::Long);
            }
            FALOAD => {
                self.pop_values(2);
                self.push(VType::Float);
            }
            DALOAD => {
                self.pop_values(2);
                self.push(VType::Double);
            }
            AALOAD => {
                self.pop_value();
                let array = self.pop_value();
                self.push(element_of(&array));
            }
            IASTORE..=SASTORE => self.pop_values(3),
            POP => self.pop_values(1),
            POP2 => {
                let top = self.pop_value();
                if !top.is_wide() {
                    self.pop_value();
                }
            }
            // binary arithmetic, shifts and logic keep the left operand's type
            IADD..=0x73 | ISHL..=0x83 => {
                self.pop_value();
                let left = self.pop_value();
                self.push(left);
            }
            INEG..=0x77 => {}
            I2L | F2L | D2L => self.convert(VType::Long),
            I2F | L2F | D2F => self.convert(VType::Float),
            I2D | L2D | F2D => self.convert(VType::Double),
            L2I | F2I | D2I | I2B | I2C | I2S => self.convert(VType::Integer),
            LCMP..=DCMPG => {
                self.pop_values(2);
                self.push(VType::Integer);
            }
            IRETURN..=ARETURN => {
                self.pop_value();
                self.alive = false;
            }
            RETURN => self.alive = false,
            ARRAYLENGTH => {
                self.pop_value();
                self.push(VType::Integer);
            }
            ATHROW => {
                self.pop_value();
                self.alive = false;
            }
            MONITORENTER | MONITOREXIT => self.pop_values(1),
            other => self.fail(format!("emitop used for opcode 0x{:02x}", other)),
        }
    }

    fn convert(&mut self, to: VType) {
        self.pop_value();
        self.push(to);
    }

    /// `xreturn` matching the value type, or `return`
    pub fn emit_return(&mut self, v: Option<&VType>) {
        let op = match v {
            None => RETURN,
            Some(VType::Integer) => IRETURN,
            Some(VType::Long) => LRETURN,
            Some(VType::Float) => FRETURN,
            Some(VType::Double) => DRETURN,
            Some(_) => ARETURN,
        };
        self.emitop(op);
    }

    /// `pop` or `pop2` for the value on top of the stack
    pub fn pop(&mut self) {
        match self.stack_top().map(VType::is_wide) {
            Some(true) => self.emitop(POP2),
            Some(false) => self.emitop(POP),
            None if self.alive => self.fail("pop on an empty stack"),
            None => {}
        }
    }

    /// Duplicate the top value
    pub fn dup(&mut self) {
        self.dup_x(0);
    }

    /// Duplicate the top value and insert the copy below the `under` values
    /// beneath it (`dup`, `dup_x1`, `dup_x2`, `dup2`, `dup2_x1`, `dup2_x2`)
    pub fn dup_x(&mut self, under: usize) {
        if !self.alive {
            return;
        }
        let depth = self.state.stack.len();
        if depth < under + 1 {
            self.fail("dup below the bottom of the stack");
            return;
        }
        let value = self.state.stack[depth - 1].clone();
        let under_slots: u16 = self.state.stack[depth - 1 - under..depth - 1].iter().map(VType::size).sum();
        let op = match (value.size(), under_slots) {
            (1, 0) => DUP,
            (1, 1) => DUP_X1,
            (1, 2) => DUP_X2,
            (2, 0) => DUP2,
            (2, 1) => DUP2_X1,
            (2, 2) => DUP2_X2,
            _ => {
                self.fail("dup across more than two slots");
                return;
            }
        };
        self.emit(Insn::Op(op));
        self.stack_slots += value.size();
        self.max_stack = self.max_stack.max(self.stack_slots);
        self.state.stack.insert(depth - 1 - under, value);
    }

    /// Duplicate the two single-slot values on top of the stack (`dup2`)
    pub fn dup_pair(&mut self) {
        if !self.alive {
            return;
        }
        let depth = self.state.stack.len();
        if depth < 2 || self.state.stack[depth - 1].is_wide() || self.state.stack[depth - 2].is_wide() {
            self.fail("dup_pair needs two single-slot values");
            return;
        }
        self.emit(Insn::Op(DUP2));
        let pair = self.state.stack[depth - 2..].to_vec();
        for v in pair {
            self.push(v);
        }
    }

    pub fn swap(&mut self) {
        if !self.alive {
            return;
        }
        let depth = self.state.stack.len();
        if depth < 2 || self.state.stack[depth - 1].is_wide() || self.state.stack[depth - 2].is_wide() {
            self.fail("swap needs two single-slot values");
            return;
        }
        self.emit(Insn::Op(SWAP));
        self.state.stack.swap(depth - 1, depth - 2);
    }

    // Objects, fields and methods

    pub fn field(&mut self, op: u8, member: MemberRef) {
        let ty = match parse_field_descriptor(&member.descriptor) {
            Ok(desc) => desc_vtype(&desc),
            Err(_) => {
                self.fail(format!("bad field descriptor {}", member.descriptor));
                return;
            }
        };
        self.emit(Insn::Field(op, member));
        match op {
            GETSTATIC => {}
            PUTSTATIC => self.pop_values(1),
            GETFIELD => self.pop_values(1),
            _ => self.pop_values(2),
        }
        if matches!(op, GETSTATIC | GETFIELD) {
            if let Some(ty) = ty {
                self.push(ty);
            }
        }
    }

    pub fn invoke(&mut self, op: u8, member: MemberRef) {
        let desc = match parse_method_descriptor(&member.descriptor) {
            Ok(desc) => desc,
            Err(_) => {
                self.fail(format!("bad method descriptor {}", member.descriptor));
                return;
            }
        };
        let is_init = member.name == "<init>";
        let owner = member.owner.clone();
        self.emit(Insn::Invoke(op, member));
        self.pop_values(desc.params.len());
        if op != INVOKESTATIC {
            let receiver = self.pop_value();
            if is_init && self.alive {
                let initialized = match receiver {
                    VType::UninitializedThis => VType::object(self.this_class.clone()),
                    _ => VType::object(owner),
                };
                self.state.initialize(&receiver, &initialized);
            }
        }
        if let Some(ret) = desc_vtype(&desc.ret) {
            self.push(ret);
        }
    }

    /// `new` of a class; the uninitialized value is identified by a label
    pub fn new_object(&mut self, class: &str) {
        if !self.alive {
            return;
        }
        let label = self.new_label();
        self.labels[label.index()].placed = true;
        self.insns.push(Insn::Mark(label));
        self.emit(Insn::Type(NEW, class.to_string()));
        self.push(VType::Uninitialized(label));
    }

    pub fn new_primitive_array(&mut self, element: PrimitiveType) {
        use opcodes::array_types::*;
        let code = match element {
            PrimitiveType::Boolean => T_BOOLEAN,
            PrimitiveType::Char => T_CHAR,
            PrimitiveType::Float => T_FLOAT,
            PrimitiveType::Double => T_DOUBLE,
            PrimitiveType::Byte => T_BYTE,
            PrimitiveType::Short => T_SHORT,
            PrimitiveType::Int => T_INT,
            PrimitiveType::Long => T_LONG,
            PrimitiveType::Void => {
                self.fail("array of void");
                return;
            }
        };
        self.emit(Insn::Byte(NEWARRAY, code));
        self.pop_value();
        self.push(VType::object(format!("[{}", element.descriptor())));
    }

    /// `anewarray` with the element's class reference name
    pub fn new_reference_array(&mut self, element: &str) {
        self.emit(Insn::Type(ANEWARRAY, element.to_string()));
        self.pop_value();
        self.push(VType::object(array_ref_name(element)));
    }

    pub fn multi_new_array(&mut self, descriptor: &str, dims: u8) {
        self.emit(Insn::MultiANewArray(descriptor.to_string(), dims));
        self.pop_values(dims as usize);
        self.push(VType::object(descriptor));
    }

    pub fn checkcast(&mut self, class_ref: &str) {
        self.emit(Insn::Type(CHECKCAST, class_ref.to_string()));
        self.pop_value();
        self.push(VType::object(class_ref));
    }

    pub fn instance_of(&mut self, class_ref: &str) {
        self.emit(Insn::Type(INSTANCEOF, class_ref.to_string()));
        self.pop_value();
        self.push(VType::Integer);
    }

    // Control flow

    pub fn jump(&mut self, op: u8, target: Label) {
        if !self.alive {
            return;
        }
        self.pop_values(opcodes::branch_operands(op));
        self.record_jump(target);
        let fallthrough = (op != GOTO).then(|| Box::new(self.state.clone()));
        self.emit(Insn::Jump { op, target, fallthrough });
        if op == GOTO {
            self.alive = false;
        }
    }

    pub fn goto(&mut self, target: Label) {
        self.jump(GOTO, target);
    }

    pub fn table_switch(&mut self, low: i32, default: Label, targets: Vec<Label>) {
        if !self.alive {
            return;
        }
        self.pop_value();
        self.record_jump(default);
        for &t in &targets {
            self.record_jump(t);
        }
        self.emit(Insn::TableSwitch { low, default, targets });
        self.alive = false;
    }

    /// Keys must be sorted ascending
    pub fn lookup_switch(&mut self, default: Label, pairs: Vec<(i32, Label)>) {
        if !self.alive {
            return;
        }
        self.pop_value();
        self.record_jump(default);
        for &(_, t) in &pairs {
            self.record_jump(t);
        }
        self.emit(Insn::LookupSwitch { default, pairs });
        self.alive = false;
    }

    /// Check the buffer ends in a consistent state
    pub fn finish(&mut self) {
        if self.alive {
            self.fail("control falls off the end of the method");
        }
        let unplaced = self.labels.iter().any(|l| l.target && !l.placed);
        if unplaced {
            self.fail("jump to a label that was never placed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_simulation_tracks_max_stack() {
        let mut code = Code::new("T", true, false, &[]);
        code.push_long(5);
        code.push_long(7);
        code.emitop(0x61); // ladd
        code.emit_return(Some(&VType::Long));
        code.finish();
        assert_eq!(code.max_stack(), 4);
        assert!(code.error.is_none());
        assert!(!code.is_alive());
    }

    #[test]
    fn underflow_is_recorded() {
        let mut code = Code::new("T", true, false, &[]);
        code.emitop(POP);
        assert!(code.error.is_some());
    }

    #[test]
    fn emission_after_return_is_dropped() {
        let mut code = Code::new("T", true, false, &[]);
        code.emitop(RETURN);
        let before = code.insns.len();
        code.push_int(3);
        code.emitop(POP);
        assert_eq!(code.insns.len(), before);
        assert!(code.error.is_none());
    }

    #[test]
    fn constructor_call_initializes_this() {
        let mut code = Code::new("p/A", false, true, &[]);
        code.load(0, VType::object("p/A"));
        assert_eq!(code.stack_top(), Some(&VType::UninitializedThis));
        code.invoke(INVOKESPECIAL, MemberRef::new("java/lang/Object", "<init>", "()V"));
        assert_eq!(code.local_type(0), Some(&VType::object("p/A")));
    }

    #[test]
    fn new_then_init_yields_object() {
        let mut code = Code::new("T", true, false, &[]);
        code.new_object("java/lang/StringBuilder");
        code.dup();
        code.invoke(INVOKESPECIAL, MemberRef::new("java/lang/StringBuilder", "<init>", "()V"));
        assert_eq!(code.stack_top(), Some(&VType::object("java/lang/StringBuilder")));
        assert_eq!(code.stack_depth(), 1);
    }

    #[test]
    fn labels_merge_incoming_states() {
        let mut code = Code::new("T", true, false, &[VType::Integer]);
        let join = code.new_label();
        let other = code.new_label();
        code.load(0, VType::Integer);
        code.jump(IFEQ, other);
        code.push_string("a");
        code.goto(join);
        code.place(other);
        code.push_null();
        code.place(join);
        assert_eq!(code.stack_top(), Some(&VType::object("java/lang/String")));
        code.pop();
        code.emitop(RETURN);
        code.finish();
        assert!(code.error.is_none());
    }

    #[test]
    fn dup_variants_follow_slot_sizes() {
        let mut code = Code::new("T", true, false, &[]);
        code.push_null();
        code.push_int(1);
        code.push_long(2);
        code.dup_x(2);
        assert_eq!(code.stack_depth(), 4);
        assert!(matches!(code.insns.last(), Some(Insn::Op(DUP2_X2))));
    }

    #[test]
    fn join_label_keeps_static_type() {
        let mut code = Code::new("T", true, false, &[VType::Integer]);
        let join = code.new_label();
        let other = code.new_label();
        code.load(0, VType::Integer);
        code.jump(IFEQ, other);
        code.push_string("a");
        code.goto(join);
        code.place(other);
        code.push_class("T");
        code.place_with_top(join, VType::object("java/io/Serializable"));
        assert_eq!(code.stack_top(), Some(&VType::object("java/io/Serializable")));
        let frame = code.labels[join.index()].frame.as_ref().map(|f| f.stack.clone());
        assert_eq!(frame, Some(vec![VType::object("java/io/Serializable")]));
    }

    #[test]
    fn dup_pair_copies_array_and_index() {
        let mut code = Code::new("T", true, false, &[]);
        code.push_null();
        code.push_int(0);
        code.dup_pair();
        assert_eq!(code.stack_depth(), 4);
        assert_eq!(code.max_stack(), 4);
        assert!(matches!(code.insns.last(), Some(Insn::Op(DUP2))));
    }
}
