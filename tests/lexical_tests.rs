mod common;

use jembed::parser::{parse_compilation_unit, parse_expression, Lexer, Token};
use jembed::{Compiler, Config, DiagnosticKind, Error, ExpressionCompiler};

fn lexical_offset(err: Error) -> usize {
    match err {
        Error::Lexical { location, .. } => location.offset,
        other => panic!("expected a lexical error, got {:?}", other),
    }
}

#[test]
fn unterminated_string_reports_the_opening_quote() {
    let source = "class A { String s = \"never closed; int x = 1; }";
    let quote = source.find('"').unwrap();
    let err = parse_compilation_unit(source).unwrap_err();
    assert_eq!(err.kind(), DiagnosticKind::Lexical);
    assert_eq!(lexical_offset(err), quote);
}

#[test]
fn unterminated_string_in_expression_front_end() {
    let compiler = ExpressionCompiler::new(Compiler::new(Config::default()));
    let err = compiler.compile("\"abc").unwrap_err();
    assert_eq!(lexical_offset(err), 0);
}

#[test]
fn string_may_not_span_lines() {
    let source = "class A {\n  String s = \"one\ntwo\";\n}";
    let err = parse_compilation_unit(source).unwrap_err();
    assert_eq!(lexical_offset(err), source.find('"').unwrap());
}

#[test]
fn unterminated_comment_reports_its_start() {
    let source = "class A { } /* trailing";
    let err = parse_compilation_unit(source).unwrap_err();
    assert_eq!(lexical_offset(err), source.find("/*").unwrap());
}

#[test]
fn malformed_literals() {
    for bad in ["2147483648", "0x", "09", "1e", "'ab'", "''", "1e999", "\"\\q\""] {
        let err = parse_expression(bad).unwrap_err();
        assert_eq!(err.kind(), DiagnosticKind::Lexical, "{} gave {}", bad, err);
    }
}

#[test]
fn min_int_is_accepted_after_minus() {
    assert!(parse_expression("-2147483648").is_ok());
    assert!(parse_expression("-9223372036854775808L").is_ok());
}

#[test]
fn keywords_and_identifiers() {
    let tokens = Lexer::new("int interface _x $y goto").tokenize().unwrap();
    let kinds: Vec<&Token> = tokens.iter().map(|t| &t.token).collect();
    assert!(matches!(kinds[0], Token::Int));
    assert!(matches!(kinds[1], Token::Interface));
    assert!(matches!(kinds[2], Token::Identifier(_)));
    assert!(matches!(kinds[3], Token::Identifier(_)));
    assert!(matches!(kinds[4], Token::Goto));
}

#[test]
fn positions_track_lines_and_columns() {
    let tokens = Lexer::new("a\n  // note\n  b /* x\n */ c").tokenize().unwrap();
    let positions: Vec<(usize, usize)> = tokens.iter().map(|t| (t.location.line, t.location.column)).collect();
    assert_eq!(positions, vec![(1, 1), (3, 3), (4, 5)]);
}
