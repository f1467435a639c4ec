//! Types of one compilation batch.
//!
//! Every type the resolver touches is interned once in a [`TypeArena`] and
//! referred to by a [`TypeId`] handle, so classes of the batch can refer
//! to each other cyclically without owning each other. Class entries start
//! out empty and are filled either by the declaration phase (source
//! classes) or on first use from the external provider (binary classes).

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::ast::PrimitiveKind;
use crate::codegen::defs::access_flags::*;
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::common::cache::ExternalTypes;
use crate::common::descriptor::{parse_field_descriptor, parse_method_descriptor, DescType};
use crate::common::model::{BinaryClass, ClassData, ClassOrigin, ConstValue, FieldData, MethodData};
use crate::error::{Error, Result};

/// The JVM primitive types plus `void`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 9] = [
        PrimitiveType::Boolean,
        PrimitiveType::Byte,
        PrimitiveType::Char,
        PrimitiveType::Short,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Double,
        PrimitiveType::Void,
    ];

    pub fn descriptor(self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
            PrimitiveType::Void => 'V',
        }
    }

    pub fn from_descriptor(c: char) -> Option<Self> {
        PrimitiveType::ALL.iter().copied().find(|p| p.descriptor() == c)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Void => "void",
        }
    }

    pub fn from_kind(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Boolean => PrimitiveType::Boolean,
            PrimitiveKind::Byte => PrimitiveType::Byte,
            PrimitiveKind::Short => PrimitiveType::Short,
            PrimitiveKind::Char => PrimitiveType::Char,
            PrimitiveKind::Int => PrimitiveType::Int,
            PrimitiveKind::Long => PrimitiveType::Long,
            PrimitiveKind::Float => PrimitiveType::Float,
            PrimitiveKind::Double => PrimitiveType::Double,
            PrimitiveKind::Void => PrimitiveType::Void,
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveType::Boolean | PrimitiveType::Void)
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveType::Byte | PrimitiveType::Char | PrimitiveType::Short | PrimitiveType::Int | PrimitiveType::Long
        )
    }

    /// Represented as an `int` on the operand stack
    pub fn is_int_like(self) -> bool {
        matches!(
            self,
            PrimitiveType::Boolean | PrimitiveType::Byte | PrimitiveType::Char | PrimitiveType::Short | PrimitiveType::Int
        )
    }

    /// Slots taken in locals and on the operand stack
    pub fn slots(self) -> u16 {
        match self {
            PrimitiveType::Long | PrimitiveType::Double => 2,
            PrimitiveType::Void => 0,
            _ => 1,
        }
    }

    /// Widening primitive conversion (JLS 5.1.2), identity excluded
    pub fn widens_to(self, target: PrimitiveType) -> bool {
        use PrimitiveType::*;
        match self {
            Byte => matches!(target, Short | Int | Long | Float | Double),
            Short | Char => matches!(target, Int | Long | Float | Double),
            Int => matches!(target, Long | Float | Double),
            Long => matches!(target, Float | Double),
            Float => target == Double,
            _ => false,
        }
    }

    /// Internal name of the wrapper class
    pub fn box_class(self) -> Option<&'static str> {
        Some(match self {
            PrimitiveType::Boolean => "java/lang/Boolean",
            PrimitiveType::Byte => "java/lang/Byte",
            PrimitiveType::Char => "java/lang/Character",
            PrimitiveType::Short => "java/lang/Short",
            PrimitiveType::Int => "java/lang/Integer",
            PrimitiveType::Long => "java/lang/Long",
            PrimitiveType::Float => "java/lang/Float",
            PrimitiveType::Double => "java/lang/Double",
            PrimitiveType::Void => return None,
        })
    }

    pub fn from_box_class(internal: &str) -> Option<Self> {
        PrimitiveType::ALL
            .iter()
            .copied()
            .find(|p| p.box_class() == Some(internal))
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to a type interned in a [`TypeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub const BOOLEAN: TypeId = TypeId(0);
    pub const BYTE: TypeId = TypeId(1);
    pub const CHAR: TypeId = TypeId(2);
    pub const SHORT: TypeId = TypeId(3);
    pub const INT: TypeId = TypeId(4);
    pub const LONG: TypeId = TypeId(5);
    pub const FLOAT: TypeId = TypeId(6);
    pub const DOUBLE: TypeId = TypeId(7);
    pub const VOID: TypeId = TypeId(8);
    pub const NULL: TypeId = TypeId(9);
    pub const OBJECT: TypeId = TypeId(10);
    pub const STRING: TypeId = TypeId(11);
    pub const CLASS: TypeId = TypeId(12);
    pub const THROWABLE: TypeId = TypeId(13);
    pub const RUNTIME_EXCEPTION: TypeId = TypeId(14);
    pub const ERROR: TypeId = TypeId(15);
    pub const CLONEABLE: TypeId = TypeId(16);
    pub const SERIALIZABLE: TypeId = TypeId(17);

    pub fn of(p: PrimitiveType) -> TypeId {
        TypeId(p as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

const WELL_KNOWN_CLASSES: [&str; 8] = [
    "java/lang/Object",
    "java/lang/String",
    "java/lang/Class",
    "java/lang/Throwable",
    "java/lang/RuntimeException",
    "java/lang/Error",
    "java/lang/Cloneable",
    "java/io/Serializable",
];

#[derive(Debug, Clone)]
enum ClassState {
    /// Not looked at yet; resolved externally on first use
    Unresolved,
    /// Declared in the batch, data not entered yet
    Declared,
    Missing,
    Ready(Arc<ClassData>),
}

#[derive(Debug, Clone)]
enum TypeEntry {
    Primitive(PrimitiveType),
    Null,
    Array(TypeId),
    Class { name: String, state: ClassState },
}

/// Shape of a type, borrowed from the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind<'a> {
    Primitive(PrimitiveType),
    Null,
    Array(TypeId),
    /// Internal name
    Class(&'a str),
}

pub struct TypeArena {
    entries: Vec<TypeEntry>,
    classes: HashMap<String, TypeId>,
    arrays: HashMap<TypeId, TypeId>,
    external: ExternalTypes,
}

impl TypeArena {
    pub fn new(external: ExternalTypes) -> Self {
        let mut arena = Self {
            entries: Vec::new(),
            classes: HashMap::new(),
            arrays: HashMap::new(),
            external,
        };
        for p in PrimitiveType::ALL {
            arena.entries.push(TypeEntry::Primitive(p));
        }
        arena.entries.push(TypeEntry::Null);
        for name in WELL_KNOWN_CLASSES {
            arena.class_named(name);
        }
        arena
    }

    pub fn external(&self) -> &ExternalTypes {
        &self.external
    }

    fn push(&mut self, entry: TypeEntry) -> TypeId {
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(entry);
        id
    }

    pub fn kind(&self, id: TypeId) -> TypeKind<'_> {
        match &self.entries[id.index()] {
            TypeEntry::Primitive(p) => TypeKind::Primitive(*p),
            TypeEntry::Null => TypeKind::Null,
            TypeEntry::Array(element) => TypeKind::Array(*element),
            TypeEntry::Class { name, .. } => TypeKind::Class(name),
        }
    }

    pub fn primitive(&self, id: TypeId) -> Option<PrimitiveType> {
        match self.kind(id) {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_primitive(&self, id: TypeId) -> bool {
        self.primitive(id).is_some()
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        id == TypeId::VOID
    }

    pub fn is_reference(&self, id: TypeId) -> bool {
        !matches!(self.kind(id), TypeKind::Primitive(_))
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Array(_))
    }

    pub fn is_class(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Class(_))
    }

    pub fn element(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn class_name(&self, id: TypeId) -> Option<&str> {
        match self.kind(id) {
            TypeKind::Class(name) => Some(name),
            _ => None,
        }
    }

    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        if let Some(&id) = self.arrays.get(&element) {
            return id;
        }
        let id = self.push(TypeEntry::Array(element));
        self.arrays.insert(element, id);
        id
    }

    pub fn array_of_dims(&mut self, element: TypeId, dims: usize) -> TypeId {
        (0..dims).fold(element, |ty, _| self.array_of(ty))
    }

    /// Intern a class handle by internal name without loading it
    pub fn class_named(&mut self, internal: &str) -> TypeId {
        if let Some(&id) = self.classes.get(internal) {
            return id;
        }
        let id = self.push(TypeEntry::Class {
            name: internal.to_string(),
            state: ClassState::Unresolved,
        });
        self.classes.insert(internal.to_string(), id);
        id
    }

    /// Reserve a class of the batch; its data arrives through [`define`](Self::define)
    pub fn declare_source_class(&mut self, internal: &str) -> Result<TypeId> {
        let id = self.class_named(internal);
        if let TypeEntry::Class { state, .. } = &mut self.entries[id.index()] {
            match state {
                ClassState::Unresolved | ClassState::Missing => *state = ClassState::Declared,
                _ => return Err(Error::internal(format!("class {} declared twice", internal))),
            }
        }
        Ok(id)
    }

    /// Whether a source class has been declared but not yet entered
    pub fn is_pending(&self, id: TypeId) -> bool {
        matches!(&self.entries[id.index()], TypeEntry::Class { state: ClassState::Declared, .. })
    }

    pub fn define(&mut self, id: TypeId, data: ClassData) {
        if let TypeEntry::Class { state, .. } = &mut self.entries[id.index()] {
            *state = ClassState::Ready(Arc::new(data));
        }
    }

    /// Does a class of this name exist, in the batch or externally?
    pub fn lookup_class(&mut self, internal: &str) -> Result<Option<TypeId>> {
        let id = match self.classes.get(internal) {
            Some(&id) => id,
            None => {
                if self.external.load(internal)?.is_none() {
                    return Ok(None);
                }
                self.class_named(internal)
            }
        };
        match &self.entries[id.index()] {
            TypeEntry::Class { state: ClassState::Missing, .. } => Ok(None),
            TypeEntry::Class { state: ClassState::Unresolved, .. } => match self.load(id) {
                Ok(_) => Ok(Some(id)),
                Err(Error::ClassNotFound { .. }) => Ok(None),
                Err(e) => Err(e),
            },
            _ => Ok(Some(id)),
        }
    }

    /// Class data, loading external classes on first use
    pub fn class_data(&mut self, id: TypeId) -> Result<Arc<ClassData>> {
        match &self.entries[id.index()] {
            TypeEntry::Class { state: ClassState::Ready(data), .. } => Ok(Arc::clone(data)),
            TypeEntry::Class { state: ClassState::Missing, name } => {
                Err(Error::class_not_found(name.replace('/', ".")))
            }
            TypeEntry::Class { state: ClassState::Declared, name } => Err(Error::internal(format!(
                "class {} used before its declaration was entered",
                name
            ))),
            TypeEntry::Class { state: ClassState::Unresolved, .. } => self.load(id),
            _ => Err(Error::internal(format!("{} is not a class type", self.display(id)))),
        }
    }

    fn load(&mut self, id: TypeId) -> Result<Arc<ClassData>> {
        let name = match self.class_name(id) {
            Some(name) => name.to_string(),
            None => return Err(Error::internal("load of a non-class type")),
        };
        match self.external.load(&name)? {
            Some(binary) => {
                let data = Arc::new(self.import_binary(id, binary)?);
                if let TypeEntry::Class { state, .. } = &mut self.entries[id.index()] {
                    *state = ClassState::Ready(Arc::clone(&data));
                }
                Ok(data)
            }
            None => {
                if let TypeEntry::Class { state, .. } = &mut self.entries[id.index()] {
                    *state = ClassState::Missing;
                }
                Err(Error::class_not_found(name.replace('/', ".")))
            }
        }
    }

    fn import_binary(&mut self, id: TypeId, binary: Arc<BinaryClass>) -> Result<ClassData> {
        let super_class = binary.super_name.as_deref().map(|n| self.class_named(n));
        let interfaces = binary.interfaces.iter().map(|n| self.class_named(n)).collect();

        let own = binary.own_inner_entry().cloned();
        let outer = own.as_ref().and_then(|e| e.outer.as_deref()).map(|n| self.class_named(n));
        let outer_instance = match &own {
            Some(entry) if entry.access & ACC_STATIC == 0 && !binary.is_interface() => outer,
            _ => None,
        };
        let access = match &own {
            Some(entry) => entry.access | (binary.access & ACC_SUPER),
            None => binary.access,
        };

        let mut fields = Vec::with_capacity(binary.fields.len());
        for field in &binary.fields {
            if field.access & ACC_SYNTHETIC != 0 {
                continue;
            }
            let ty = self.from_desc(&parse_field_descriptor(&field.descriptor)?);
            // ConstantValue stores booleans, chars, bytes and shorts as ints
            let constant = match (&field.constant, self.primitive(ty)) {
                (Some(value), Some(p)) if p.is_int_like() && p != PrimitiveType::Int => match p {
                    PrimitiveType::Boolean => value.as_int().map(|v| ConstValue::Boolean(v != 0)),
                    _ => value.convert_to(p),
                },
                (value, _) => value.clone(),
            };
            fields.push(FieldData {
                name: field.name.clone(),
                owner: id,
                ty,
                access: field.access,
                constant,
            });
        }

        let mut methods = Vec::with_capacity(binary.methods.len());
        for method in &binary.methods {
            if method.access & ACC_SYNTHETIC != 0 || method.name == "<clinit>" {
                continue;
            }
            let desc = parse_method_descriptor(&method.descriptor)?;
            let mut params: Vec<TypeId> = desc.params.iter().map(|p| self.from_desc(p)).collect();
            if method.name == CONSTRUCTOR_METHOD_NAME && outer_instance.is_some() && !params.is_empty() {
                params.remove(0);
            }
            let ret = self.from_desc(&desc.ret);
            let throws = method.exceptions.iter().map(|n| self.class_named(n)).collect();
            methods.push(MethodData {
                name: method.name.clone(),
                owner: id,
                params,
                ret,
                throws,
                access: method.access,
            });
        }

        let member_types = binary
            .member_classes()
            .map(|(simple, inner)| (simple.to_string(), inner.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|(simple, inner)| (simple, self.class_named(&inner)))
            .collect();

        Ok(ClassData {
            name: binary.name.clone(),
            access,
            super_class,
            interfaces,
            fields,
            methods,
            member_types,
            outer,
            outer_instance,
            origin: ClassOrigin::Binary(binary),
        })
    }

    pub fn from_desc(&mut self, desc: &DescType) -> TypeId {
        match desc {
            DescType::Primitive(p) => TypeId::of(*p),
            DescType::Class(name) => self.class_named(name),
            DescType::Array(element) => {
                let element = self.from_desc(element);
                self.array_of(element)
            }
        }
    }

    pub fn descriptor(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Primitive(p) => p.descriptor().to_string(),
            TypeKind::Null => "Ljava/lang/Object;".to_string(),
            TypeKind::Array(element) => format!("[{}", self.descriptor(element)),
            TypeKind::Class(name) => format!("L{};", name),
        }
    }

    pub fn method_descriptor(&self, params: &[TypeId], ret: TypeId) -> String {
        let mut desc = String::from("(");
        for &p in params {
            desc.push_str(&self.descriptor(p));
        }
        desc.push(')');
        desc.push_str(&self.descriptor(ret));
        desc
    }

    /// Name used by `checkcast`, `anewarray` and friends: internal name for
    /// classes, descriptor for arrays
    pub fn class_ref_name(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Class(name) => name.to_string(),
            _ => self.descriptor(id),
        }
    }

    /// Source-level spelling, e.g. `java.lang.String[]`
    pub fn display(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Primitive(p) => p.name().to_string(),
            TypeKind::Null => "null".to_string(),
            TypeKind::Array(element) => format!("{}[]", self.display(element)),
            TypeKind::Class(name) => name.replace(['/', '$'], "."),
        }
    }

    /// Wrapper class of a primitive
    pub fn box_type(&mut self, p: PrimitiveType) -> Option<TypeId> {
        p.box_class().map(|name| self.class_named(name))
    }

    /// Primitive behind a wrapper class
    pub fn unboxed(&self, id: TypeId) -> Option<PrimitiveType> {
        self.class_name(id).and_then(PrimitiveType::from_box_class)
    }

    /// Primitive type after unboxing, if any
    pub fn unboxed_or_primitive(&self, id: TypeId) -> Option<PrimitiveType> {
        self.primitive(id).or_else(|| self.unboxed(id))
    }

    pub fn is_interface(&mut self, id: TypeId) -> Result<bool> {
        if !self.is_class(id) {
            return Ok(false);
        }
        Ok(self.class_data(id)?.is_interface())
    }

    /// Direct supertypes; interfaces without a superinterface report `Object`
    pub fn direct_supertypes(&mut self, id: TypeId) -> Result<Vec<TypeId>> {
        let data = self.class_data(id)?;
        let mut supers = Vec::with_capacity(data.interfaces.len() + 1);
        if let Some(s) = data.super_class {
            supers.push(s);
        } else if data.is_interface() {
            supers.push(TypeId::OBJECT);
        }
        supers.extend(data.interfaces.iter().copied());
        Ok(supers)
    }

    /// Class `sub` is `sup` or inherits from it
    pub fn is_subclass(&mut self, sub: TypeId, sup: TypeId) -> Result<bool> {
        if sub == sup || sup == TypeId::OBJECT {
            return Ok(true);
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([sub]);
        while let Some(current) = queue.pop_front() {
            if current == sup {
                return Ok(true);
            }
            if !seen.insert(current) {
                continue;
            }
            queue.extend(self.direct_supertypes(current)?);
        }
        Ok(false)
    }

    /// Reference subtyping including arrays and the null type
    pub fn is_subtype(&mut self, a: TypeId, b: TypeId) -> Result<bool> {
        if a == b {
            return Ok(true);
        }
        match (self.kind(a), self.kind(b)) {
            (TypeKind::Primitive(_), _) | (_, TypeKind::Primitive(_)) => Ok(false),
            (TypeKind::Null, _) => Ok(true),
            (_, TypeKind::Null) => Ok(false),
            (_, TypeKind::Class(_)) if b == TypeId::OBJECT => Ok(true),
            (TypeKind::Array(ea), TypeKind::Array(eb)) => {
                if self.is_reference(ea) && self.is_reference(eb) {
                    self.is_subtype(ea, eb)
                } else {
                    Ok(false)
                }
            }
            (TypeKind::Array(_), TypeKind::Class(_)) => Ok(b == TypeId::CLONEABLE || b == TypeId::SERIALIZABLE),
            (TypeKind::Class(_), TypeKind::Array(_)) => Ok(false),
            (TypeKind::Class(_), TypeKind::Class(_)) => self.is_subclass(a, b),
        }
    }

    /// Closest common superclass, used for the type of `c ? a : b`
    pub fn common_superclass(&mut self, a: TypeId, b: TypeId) -> Result<TypeId> {
        if self.is_subtype(a, b)? {
            return Ok(b);
        }
        if self.is_subtype(b, a)? {
            return Ok(a);
        }
        if !self.is_class(a) || !self.is_class(b) || self.is_interface(a)? || self.is_interface(b)? {
            return Ok(TypeId::OBJECT);
        }
        let mut current = self.class_data(a)?.super_class;
        while let Some(candidate) = current {
            if self.is_subclass(b, candidate)? {
                return Ok(candidate);
            }
            current = self.class_data(candidate)?.super_class;
        }
        Ok(TypeId::OBJECT)
    }

    /// Supertypes in lookup order: the class, its superclass chain, then
    /// interfaces breadth first
    pub fn supertype_closure(&mut self, id: TypeId) -> Result<Vec<TypeId>> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);
        while let Some(c) = current {
            if !seen.insert(c) {
                return Err(Error::internal(format!("cyclic inheritance at {}", self.display(c))));
            }
            order.push(c);
            current = self.class_data(c)?.super_class;
        }
        let mut index = 0;
        while index < order.len() {
            let interfaces = self.class_data(order[index])?.interfaces.clone();
            for i in interfaces {
                if seen.insert(i) {
                    order.push(i);
                }
            }
            index += 1;
        }
        if self.is_interface(id)? && !seen.contains(&TypeId::OBJECT) {
            order.push(TypeId::OBJECT);
        }
        Ok(order)
    }

    /// Field visible in `class` by simple name: own fields, superinterfaces,
    /// then the superclass
    pub fn find_field(&mut self, class: TypeId, name: &str) -> Result<Option<FieldData>> {
        let mut seen = HashSet::new();
        self.find_field_in(class, name, &mut seen)
    }

    fn find_field_in(&mut self, class: TypeId, name: &str, seen: &mut HashSet<TypeId>) -> Result<Option<FieldData>> {
        if !seen.insert(class) {
            return Ok(None);
        }
        let data = self.class_data(class)?;
        if let Some(field) = data.fields.iter().find(|f| f.name == name) {
            return Ok(Some(field.clone()));
        }
        for &interface in &data.interfaces {
            if let Some(field) = self.find_field_in(interface, name, seen)? {
                return Ok(Some(field));
            }
        }
        match data.super_class {
            Some(super_class) => self.find_field_in(super_class, name, seen),
            None => Ok(None),
        }
    }

    /// Every method called `name` that is a member of `class`; methods
    /// overridden by an earlier (more derived) declaration are dropped
    pub fn find_methods(&mut self, class: TypeId, name: &str) -> Result<Vec<MethodData>> {
        let mut found: Vec<MethodData> = Vec::new();
        for owner in self.supertype_closure(class)? {
            let data = self.class_data(owner)?;
            for method in data.methods.iter().filter(|m| m.name == name) {
                let overridden = found.iter().any(|f| {
                    f.params == method.params && (!f.is_abstract() || method.is_abstract())
                });
                if !overridden {
                    found.push(method.clone());
                }
            }
        }
        Ok(found)
    }

    pub fn constructors(&mut self, class: TypeId) -> Result<Vec<MethodData>> {
        Ok(self.class_data(class)?.constructors().cloned().collect())
    }

    /// Member class by simple name, including inherited member classes
    pub fn find_member_type(&mut self, class: TypeId, simple: &str) -> Result<Option<TypeId>> {
        for owner in self.supertype_closure(class)? {
            if self.is_pending(owner) {
                continue;
            }
            let data = self.class_data(owner)?;
            if let Some((_, id)) = data.member_types.iter().find(|(n, _)| n == simple) {
                return Ok(Some(*id));
            }
        }
        Ok(None)
    }

    /// Abstract methods of `class` and its supertypes with no concrete
    /// implementation reachable from `class`
    pub fn unimplemented_abstract_methods(&mut self, class: TypeId) -> Result<Vec<MethodData>> {
        let closure = self.supertype_closure(class)?;
        let mut concrete: Vec<MethodData> = Vec::new();
        let mut abstract_methods: Vec<MethodData> = Vec::new();
        for owner in closure {
            let data = self.class_data(owner)?;
            for method in data.methods.iter().filter(|m| !m.is_constructor() && !m.is_static()) {
                if method.is_abstract() {
                    abstract_methods.push(method.clone());
                } else {
                    concrete.push(method.clone());
                }
            }
        }
        Ok(abstract_methods
            .into_iter()
            .filter(|a| !concrete.iter().any(|c| c.name == a.name && c.params == a.params))
            .collect())
    }
}

impl fmt::Debug for TypeArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeArena")
            .field("types", &self.entries.len())
            .field("external", &self.external)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> TypeArena {
        TypeArena::new(ExternalTypes::bootstrap())
    }

    #[test]
    fn well_known_ids_are_stable() {
        let mut arena = arena();
        assert_eq!(arena.class_named("java/lang/String"), TypeId::STRING);
        assert_eq!(arena.primitive(TypeId::INT), Some(PrimitiveType::Int));
        assert_eq!(arena.display(TypeId::OBJECT), "java.lang.Object");
    }

    #[test]
    fn arrays_are_interned() {
        let mut arena = arena();
        let a = arena.array_of(TypeId::INT);
        let b = arena.array_of(TypeId::INT);
        assert_eq!(a, b);
        assert_eq!(arena.descriptor(a), "[I");
        let m = arena.array_of_dims(TypeId::STRING, 2);
        assert_eq!(arena.descriptor(m), "[[Ljava/lang/String;");
        assert_eq!(arena.display(m), "java.lang.String[][]");
    }

    #[test]
    fn subtyping_follows_hierarchy_and_arrays() {
        let mut arena = arena();
        let integer = arena.class_named("java/lang/Integer");
        let number = arena.class_named("java/lang/Number");
        let comparable = arena.class_named("java/lang/Comparable");
        assert!(arena.is_subtype(integer, number).unwrap());
        assert!(arena.is_subtype(integer, comparable).unwrap());
        assert!(!arena.is_subtype(number, integer).unwrap());
        let strings = arena.array_of(TypeId::STRING);
        let objects = arena.array_of(TypeId::OBJECT);
        let ints = arena.array_of(TypeId::INT);
        assert!(arena.is_subtype(strings, objects).unwrap());
        assert!(!arena.is_subtype(ints, objects).unwrap());
        assert!(arena.is_subtype(ints, TypeId::CLONEABLE).unwrap());
        assert!(arena.is_subtype(TypeId::NULL, strings).unwrap());
    }

    #[test]
    fn missing_class_is_reported_by_name() {
        let mut arena = arena();
        let id = arena.class_named("com/example/Nope");
        match arena.class_data(id) {
            Err(Error::ClassNotFound { name }) => assert_eq!(name, "com.example.Nope"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        assert!(arena.lookup_class("com/example/Nope").unwrap().is_none());
    }

    #[test]
    fn overridden_methods_are_not_duplicated() {
        let mut arena = arena();
        let methods = arena.find_methods(TypeId::STRING, "toString").unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].owner, TypeId::STRING);
    }

    #[test]
    fn common_superclass_of_siblings() {
        let mut arena = arena();
        let integer = arena.class_named("java/lang/Integer");
        let long = arena.class_named("java/lang/Long");
        let number = arena.class_named("java/lang/Number");
        assert_eq!(arena.common_superclass(integer, long).unwrap(), number);
        assert_eq!(arena.common_superclass(integer, TypeId::STRING).unwrap(), TypeId::OBJECT);
    }
}
