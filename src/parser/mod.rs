//! Front end: lexical analysis and parsing into the AST.
//!
//! Four entry points match the shapes a caller can hand in: a whole
//! compilation unit, the members of a class body, a statement sequence,
//! or a single expression.

pub mod lexer;
pub mod parser;
pub mod span;

pub use lexer::{Lexer, LexicalToken, Token};
pub use parser::Parser;
pub use span::{HasSpan, Location, Span};

use crate::ast::{CompilationUnit, Expr, Member, Stmt};
use crate::error::Result;

/// Parse a compilation unit
pub fn parse_compilation_unit(source: &str) -> Result<CompilationUnit> {
    Parser::new(source).parse_compilation_unit()
}

/// Parse the members of a class body (no surrounding braces)
pub fn parse_class_body(source: &str, class_name: &str) -> Result<Vec<Member>> {
    Parser::new(source).parse_class_body_members(class_name)
}

/// Parse a sequence of block statements
pub fn parse_statements(source: &str) -> Result<Vec<Stmt>> {
    Parser::new(source).parse_block_statements()
}

/// Parse exactly one expression
pub fn parse_expression(source: &str) -> Result<Expr> {
    Parser::new(source).parse_standalone_expression()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_class() {
        let source = r#"
package com.example;

public class HelloWorld {
    public static void main(String[] args) {
        System.out.println("Hello, World!");
    }
}
"#;
        let unit = parse_compilation_unit(source).expect("Failed to parse");
        assert_eq!(unit.types.len(), 1);
        assert_eq!(unit.package.as_ref().map(|p| p.name.as_str()), Some("com.example"));
    }

    #[test]
    fn parse_with_imports() {
        let source = r#"
import java.util.List;
import java.util.*;
import static java.lang.Math.max;

public class TestClass {
    private List<String> items = new ArrayList<>();
}
"#;
        let unit = parse_compilation_unit(source).expect("Failed to parse");
        assert_eq!(unit.imports.len(), 3);
        assert!(unit.imports[1].is_wildcard);
        assert!(unit.imports[2].is_static);
    }

    #[test]
    fn class_body_recognizes_constructor_by_name() {
        let members = parse_class_body("SC(int a) { } void m() { }", "SC").unwrap();
        assert!(matches!(members[0], Member::Constructor(_)));
        assert!(matches!(members[1], Member::Method(_)));
    }

    #[test]
    fn trailing_tokens_after_expression_are_rejected() {
        assert!(parse_expression("1 + 2 3").is_err());
    }
}
