//! Abstract Syntax Tree for the accepted Java subset
//!
//! Nodes are plain owned trees. Anything the resolver learns about a node
//! is kept in side tables keyed by [`NodeId`], so the tree itself stays
//! immutable after parsing.

mod nodes;

pub use nodes::*;
pub use crate::parser::span::{HasSpan, Location, Span};
