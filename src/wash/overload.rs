//! Method and constructor overload resolution (JLS 15.12.2).
//!
//! Applicability is checked in three phases: strict invocation (identity
//! and widening only), loose invocation (boxing and unboxing allowed) and
//! variable arity. The first phase with an applicable candidate decides;
//! within it the most specific candidate wins. Candidates with identical
//! parameter types inherited along different paths are not an ambiguity:
//! a concrete method beats abstract ones, and among abstract methods the
//! first found (most derived) wins.

use crate::common::model::MethodData;
use crate::common::types::{TypeArena, TypeId};
use crate::error::{Error, Result};

use super::conversion::{convert, Context};

#[derive(Debug, Clone)]
pub enum Resolution {
    Found {
        method: MethodData,
        /// Trailing arguments are packed into an array
        varargs: bool,
    },
    NotApplicable,
    Ambiguous(Vec<MethodData>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Strict,
    Loose,
    Varargs,
}

pub fn resolve(arena: &mut TypeArena, candidates: &[MethodData], args: &[TypeId]) -> Result<Resolution> {
    for phase in [Phase::Strict, Phase::Loose, Phase::Varargs] {
        let mut applicable = Vec::new();
        for method in candidates {
            if is_applicable(arena, method, args, phase)? {
                applicable.push(method.clone());
            }
        }
        if applicable.is_empty() {
            continue;
        }
        log::trace!("{} applicable candidate(s) in {:?} phase", applicable.len(), phase);
        return most_specific(arena, applicable, args.len(), phase);
    }
    Ok(Resolution::NotApplicable)
}

fn is_applicable(arena: &mut TypeArena, method: &MethodData, args: &[TypeId], phase: Phase) -> Result<bool> {
    let params = &method.params;
    match phase {
        Phase::Strict | Phase::Loose => {
            if params.len() != args.len() {
                return Ok(false);
            }
            let context = if phase == Phase::Strict {
                Context::StrictInvocation
            } else {
                Context::LooseInvocation
            };
            for (&arg, &param) in args.iter().zip(params) {
                if convert(arena, arg, param, None, context)?.is_none() {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Phase::Varargs => {
            if !method.is_varargs() || params.is_empty() || args.len() + 1 < params.len() {
                return Ok(false);
            }
            let fixed = params.len() - 1;
            let Some(element) = arena.element(params[fixed]) else {
                return Ok(false);
            };
            for (index, &arg) in args.iter().enumerate() {
                let target = if index < fixed { params[index] } else { element };
                if convert(arena, arg, target, None, Context::LooseInvocation)?.is_none() {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

/// `s` is at least as specific as `t` for one parameter position
fn type_more_specific(arena: &mut TypeArena, s: TypeId, t: TypeId) -> Result<bool> {
    if s == t {
        return Ok(true);
    }
    match (arena.primitive(s), arena.primitive(t)) {
        (Some(a), Some(b)) => Ok(a.widens_to(b)),
        (None, None) => arena.is_subtype(s, t),
        _ => Ok(false),
    }
}

/// Parameter types of `method` as seen by `count` arguments; variable
/// arity methods repeat their element type
fn expanded_params(arena: &TypeArena, method: &MethodData, count: usize, phase: Phase) -> Vec<TypeId> {
    if phase != Phase::Varargs {
        return method.params.clone();
    }
    let fixed = method.params.len().saturating_sub(1);
    let element = method
        .params
        .last()
        .and_then(|&last| arena.element(last))
        .unwrap_or(TypeId::OBJECT);
    let mut params: Vec<TypeId> = method.params[..fixed].to_vec();
    while params.len() < count.max(method.params.len()) {
        params.push(element);
    }
    params
}

fn more_specific(arena: &mut TypeArena, m1: &MethodData, m2: &MethodData, count: usize, phase: Phase) -> Result<bool> {
    let p1 = expanded_params(arena, m1, count, phase);
    let p2 = expanded_params(arena, m2, count, phase);
    let len = p1.len().min(p2.len());
    for i in 0..len {
        if !type_more_specific(arena, p1[i], p2[i])? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn most_specific(arena: &mut TypeArena, applicable: Vec<MethodData>, count: usize, phase: Phase) -> Result<Resolution> {
    let varargs = phase == Phase::Varargs;
    if applicable.len() == 1 {
        let method = applicable.into_iter().next().ok_or_else(|| Error::internal("empty candidate list"))?;
        return Ok(Resolution::Found { method, varargs });
    }

    let mut maximal: Vec<MethodData> = Vec::new();
    for (i, m) in applicable.iter().enumerate() {
        let mut dominated = false;
        for (j, other) in applicable.iter().enumerate() {
            if i == j {
                continue;
            }
            let other_wins = more_specific(arena, other, m, count, phase)?;
            let m_wins = more_specific(arena, m, other, count, phase)?;
            if other_wins && !m_wins {
                dominated = true;
                break;
            }
        }
        if !dominated {
            maximal.push(m.clone());
        }
    }

    if maximal.len() == 1 {
        let method = maximal.remove(0);
        return Ok(Resolution::Found { method, varargs });
    }
    let same_signature = maximal.windows(2).all(|w| w[0].params == w[1].params);
    if same_signature && !maximal.is_empty() {
        let index = maximal.iter().position(|m| !m.is_abstract()).unwrap_or(0);
        let method = maximal.swap_remove(index);
        return Ok(Resolution::Found { method, varargs });
    }
    Ok(Resolution::Ambiguous(maximal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::defs::access_flags::*;
    use crate::common::cache::ExternalTypes;

    fn method(name: &str, owner: TypeId, params: Vec<TypeId>, access: u16) -> MethodData {
        MethodData {
            name: name.to_string(),
            owner,
            params,
            ret: TypeId::VOID,
            throws: Vec::new(),
            access,
        }
    }

    fn found(resolution: Resolution) -> MethodData {
        match resolution {
            Resolution::Found { method, .. } => method,
            other => panic!("expected a single candidate, got {:?}", other),
        }
    }

    #[test]
    fn most_specific_wins_in_any_declaration_order() {
        let mut arena = TypeArena::new(ExternalTypes::bootstrap());
        let object = method("f", TypeId::OBJECT, vec![TypeId::OBJECT], ACC_PUBLIC);
        let string = method("f", TypeId::OBJECT, vec![TypeId::STRING], ACC_PUBLIC);
        let forward = found(resolve(&mut arena, &[object.clone(), string.clone()], &[TypeId::STRING]).unwrap());
        let backward = found(resolve(&mut arena, &[string, object], &[TypeId::STRING]).unwrap());
        assert_eq!(forward.params, vec![TypeId::STRING]);
        assert_eq!(backward.params, vec![TypeId::STRING]);
    }

    #[test]
    fn widening_beats_boxing() {
        let mut arena = TypeArena::new(ExternalTypes::bootstrap());
        let integer = arena.class_named("java/lang/Integer");
        let long = method("f", TypeId::OBJECT, vec![TypeId::LONG], ACC_PUBLIC);
        let boxed = method("f", TypeId::OBJECT, vec![integer], ACC_PUBLIC);
        let chosen = found(resolve(&mut arena, &[boxed, long], &[TypeId::INT]).unwrap());
        assert_eq!(chosen.params, vec![TypeId::LONG]);
    }

    #[test]
    fn crossed_primitive_parameters_are_ambiguous() {
        let mut arena = TypeArena::new(ExternalTypes::bootstrap());
        let a = method("f", TypeId::OBJECT, vec![TypeId::INT, TypeId::LONG], ACC_PUBLIC);
        let b = method("f", TypeId::OBJECT, vec![TypeId::LONG, TypeId::INT], ACC_PUBLIC);
        let result = resolve(&mut arena, &[a, b], &[TypeId::INT, TypeId::INT]).unwrap();
        assert!(matches!(result, Resolution::Ambiguous(ref c) if c.len() == 2));
    }

    #[test]
    fn variable_arity_is_the_last_resort() {
        let mut arena = TypeArena::new(ExternalTypes::bootstrap());
        let ints = arena.array_of(TypeId::INT);
        let varargs = method("f", TypeId::OBJECT, vec![ints], ACC_PUBLIC | ACC_VARARGS);
        let result = resolve(&mut arena, &[varargs.clone()], &[TypeId::INT, TypeId::INT]).unwrap();
        assert!(matches!(result, Resolution::Found { varargs: true, .. }));
        let result = resolve(&mut arena, &[varargs.clone()], &[]).unwrap();
        assert!(matches!(result, Resolution::Found { varargs: true, .. }));
        let result = resolve(&mut arena, &[varargs], &[ints]).unwrap();
        assert!(matches!(result, Resolution::Found { varargs: false, .. }));
    }

    #[test]
    fn identical_signatures_prefer_the_concrete_method() {
        let mut arena = TypeArena::new(ExternalTypes::bootstrap());
        let runnable = arena.class_named("java/lang/Runnable");
        let abstract_run = method("run", runnable, vec![], ACC_PUBLIC | ACC_ABSTRACT);
        let concrete_run = method("run", TypeId::OBJECT, vec![], ACC_PUBLIC);
        let chosen = found(resolve(&mut arena, &[abstract_run, concrete_run], &[]).unwrap());
        assert!(!chosen.is_abstract());
    }

    #[test]
    fn no_candidate_matches() {
        let mut arena = TypeArena::new(ExternalTypes::bootstrap());
        let f = method("f", TypeId::OBJECT, vec![TypeId::INT], ACC_PUBLIC);
        let result = resolve(&mut arena, &[f], &[TypeId::STRING]).unwrap();
        assert!(matches!(result, Resolution::NotApplicable));
    }
}
