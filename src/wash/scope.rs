//! Lexical scopes used while resolving names.
//!
//! A [`Scope`] is a stack of frames. Class frames mark the boundary of a
//! (possibly local or anonymous) class body; method frames carry the
//! static-ness of the code inside; block frames hold local variables and
//! local classes. Name lookup walks the stack from the innermost frame,
//! letting the resolver consult class members whenever it crosses a class
//! frame.

use crate::ast::NodeId;
use crate::common::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Body of the source class with this index
    Class(usize),
    /// Method, constructor, initializer or field initializer body
    Method { is_static: bool, is_constructor: bool },
    Block,
}

#[derive(Debug, Clone)]
pub struct ScopeFrame {
    pub kind: FrameKind,
    pub vars: Vec<(String, NodeId)>,
    /// Local classes and erased type parameters
    pub types: Vec<(String, TypeId)>,
}

impl ScopeFrame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            vars: Vec::new(),
            types: Vec::new(),
        }
    }

    pub fn var(&self, name: &str) -> Option<NodeId> {
        self.vars.iter().rev().find(|(n, _)| n == name).map(|(_, id)| *id)
    }

    pub fn local_type(&self, name: &str) -> Option<TypeId> {
        self.types.iter().rev().find(|(n, _)| n == name).map(|(_, id)| *id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    frames: Vec<ScopeFrame>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: FrameKind) {
        self.frames.push(ScopeFrame::new(kind));
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop frames down to `depth`, used to unwind after an error
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    /// Frames from the innermost outwards
    pub fn frames(&self) -> impl Iterator<Item = &ScopeFrame> {
        self.frames.iter().rev()
    }

    /// Declare a local variable. Fails (returns `false`) when a variable of
    /// the same name is already visible in the same method body, since
    /// locals may not shadow each other.
    pub fn declare_var(&mut self, name: &str, id: NodeId) -> bool {
        for frame in self.frames.iter().rev() {
            if frame.var(name).is_some() {
                return false;
            }
            if matches!(frame.kind, FrameKind::Class(_)) {
                break;
            }
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.vars.push((name.to_string(), id));
        }
        true
    }

    pub fn declare_type(&mut self, name: &str, ty: TypeId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.types.push((name.to_string(), ty));
        }
    }

    /// A local class of this name already declared in the same body
    pub fn local_type_in_body(&self, name: &str) -> Option<TypeId> {
        for frame in self.frames.iter().rev() {
            if let Some(ty) = frame.local_type(name) {
                return Some(ty);
            }
            if matches!(frame.kind, FrameKind::Class(_)) {
                break;
            }
        }
        None
    }

    /// Index of the innermost class
    pub fn current_class(&self) -> Option<usize> {
        self.frames().find_map(|f| match f.kind {
            FrameKind::Class(index) => Some(index),
            _ => None,
        })
    }

    /// Classes from the innermost outwards
    pub fn enclosing_classes(&self) -> Vec<usize> {
        self.frames()
            .filter_map(|f| match f.kind {
                FrameKind::Class(index) => Some(index),
                _ => None,
            })
            .collect()
    }

    fn innermost_method(&self) -> Option<FrameKind> {
        for frame in self.frames() {
            match frame.kind {
                FrameKind::Method { .. } => return Some(frame.kind),
                FrameKind::Class(_) => return None,
                FrameKind::Block => {}
            }
        }
        None
    }

    /// Code of the innermost class runs without a `this`
    pub fn is_static_context(&self) -> bool {
        matches!(self.innermost_method(), Some(FrameKind::Method { is_static: true, .. }))
    }

    pub fn in_constructor(&self) -> bool {
        matches!(self.innermost_method(), Some(FrameKind::Method { is_constructor: true, .. }))
    }

    /// Find a local variable; also returns the classes whose bodies lie
    /// between the use and the declaration (innermost first). A non-empty
    /// list means the variable is captured.
    pub fn lookup_var(&self, name: &str) -> Option<(NodeId, Vec<usize>)> {
        let mut crossed = Vec::new();
        for frame in self.frames() {
            if let Some(id) = frame.var(name) {
                return Some((id, crossed));
            }
            if let FrameKind::Class(index) = frame.kind {
                crossed.push(index);
            }
        }
        None
    }

    /// Classes crossed between the use site and the declaration of `var`
    pub fn crossings_for(&self, var: NodeId) -> Option<Vec<usize>> {
        let mut crossed = Vec::new();
        for frame in self.frames() {
            if frame.vars.iter().any(|(_, id)| *id == var) {
                return Some(crossed);
            }
            if let FrameKind::Class(index) = frame.kind {
                crossed.push(index);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_may_not_shadow_within_a_method() {
        let mut scope = Scope::new();
        scope.push(FrameKind::Class(0));
        scope.push(FrameKind::Method { is_static: false, is_constructor: false });
        assert!(scope.declare_var("x", NodeId(1)));
        scope.push(FrameKind::Block);
        assert!(!scope.declare_var("x", NodeId(2)));
        assert!(scope.declare_var("y", NodeId(3)));
        scope.pop();
        assert!(scope.declare_var("y", NodeId(4)));
    }

    #[test]
    fn local_class_bodies_start_a_new_namespace() {
        let mut scope = Scope::new();
        scope.push(FrameKind::Class(0));
        scope.push(FrameKind::Method { is_static: true, is_constructor: false });
        scope.declare_var("x", NodeId(1));
        scope.push(FrameKind::Class(1));
        scope.push(FrameKind::Method { is_static: false, is_constructor: false });
        assert!(scope.declare_var("x", NodeId(2)));
        scope.pop();
        let (id, crossed) = scope.lookup_var("x").unwrap();
        assert_eq!(id, NodeId(1));
        assert_eq!(crossed, vec![1]);
        assert_eq!(scope.crossings_for(NodeId(1)), Some(vec![1]));
    }

    #[test]
    fn static_context_follows_the_innermost_method() {
        let mut scope = Scope::new();
        scope.push(FrameKind::Class(0));
        assert!(!scope.is_static_context());
        scope.push(FrameKind::Method { is_static: true, is_constructor: false });
        scope.push(FrameKind::Block);
        assert!(scope.is_static_context());
        scope.push(FrameKind::Class(1));
        assert!(!scope.is_static_context());
        assert_eq!(scope.enclosing_classes(), vec![1, 0]);
    }
}
