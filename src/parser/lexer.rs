//! Scanner: source text to tokens.
//!
//! The token set is derived with `logos`. Literals whose extent cannot be
//! described by a regular expression without losing the error position
//! (strings, chars, numbers, block comments) are scanned by callbacks, so
//! a malformed literal is reported at its first character.

use logos::Logos;

use super::span::Location;
use crate::error::{Error, Result};

/// Why a piece of input could not be turned into a token.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexErrorKind {
    #[default]
    IllegalCharacter,
    UnterminatedString,
    UnterminatedChar,
    UnterminatedComment,
    EmptyCharLiteral,
    IllegalEscape,
    UnpairedSurrogate,
    MalformedNumber(String),
    IntegerTooLarge,
    FloatTooLarge,
    FloatTooSmall,
}

impl LexErrorKind {
    fn message(&self, offending: &str) -> String {
        match self {
            LexErrorKind::IllegalCharacter => format!("illegal character '{}'", offending.escape_debug()),
            LexErrorKind::UnterminatedString => "unterminated string literal".to_string(),
            LexErrorKind::UnterminatedChar => "unterminated character literal".to_string(),
            LexErrorKind::UnterminatedComment => "unterminated comment".to_string(),
            LexErrorKind::EmptyCharLiteral => "empty character literal".to_string(),
            LexErrorKind::IllegalEscape => "illegal escape character".to_string(),
            LexErrorKind::UnpairedSurrogate => "unpaired surrogate in literal".to_string(),
            LexErrorKind::MalformedNumber(text) => format!("malformed number literal '{}'", text),
            LexErrorKind::IntegerTooLarge => "integer number too large".to_string(),
            LexErrorKind::FloatTooLarge => "floating-point number too large".to_string(),
            LexErrorKind::FloatTooSmall => "floating-point number too small".to_string(),
        }
    }
}

/// Decoded numeric literal.
///
/// Decimal integers keep their magnitude, so `2147483648` survives until the
/// parser can check it is the operand of unary minus. Hex, octal and binary
/// literals are already two's-complement reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberLiteral {
    Int(i64),
    Long(i128),
    Float(f32),
    Double(f64),
}

/// Token types of the source language
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(error = LexErrorKind)]
pub enum Token {
    // Trivia, filtered out by the Lexer wrapper
    #[token("\u{feff}")]
    Bom,
    #[regex(r"[ \t\f\r\n]+")]
    Whitespace,
    #[regex(r"//[^\r\n]*")]
    LineComment,
    #[token("/*", block_comment)]
    BlockComment,

    // Keywords
    #[token("abstract")]
    Abstract,
    #[token("assert")]
    Assert,
    #[token("boolean")]
    Boolean,
    #[token("break")]
    Break,
    #[token("byte")]
    Byte,
    #[token("case")]
    Case,
    #[token("catch")]
    Catch,
    #[token("char")]
    Char,
    #[token("class")]
    Class,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("default")]
    Default,
    #[token("do")]
    Do,
    #[token("double")]
    Double,
    #[token("else")]
    Else,
    #[token("enum")]
    Enum,
    #[token("extends")]
    Extends,
    #[token("final")]
    Final,
    #[token("finally")]
    Finally,
    #[token("float")]
    Float,
    #[token("for")]
    For,
    #[token("goto")]
    Goto,
    #[token("if")]
    If,
    #[token("implements")]
    Implements,
    #[token("import")]
    Import,
    #[token("instanceof")]
    InstanceOf,
    #[token("int")]
    Int,
    #[token("interface")]
    Interface,
    #[token("long")]
    Long,
    #[token("native")]
    Native,
    #[token("new")]
    New,
    #[token("package")]
    Package,
    #[token("private")]
    Private,
    #[token("protected")]
    Protected,
    #[token("public")]
    Public,
    #[token("return")]
    Return,
    #[token("short")]
    Short,
    #[token("static")]
    Static,
    #[token("strictfp")]
    Strictfp,
    #[token("super")]
    Super,
    #[token("switch")]
    Switch,
    #[token("synchronized")]
    Synchronized,
    #[token("this")]
    This,
    #[token("throw")]
    Throw,
    #[token("throws")]
    Throws,
    #[token("transient")]
    Transient,
    #[token("try")]
    Try,
    #[token("void")]
    Void,
    #[token("volatile")]
    Volatile,
    #[token("while")]
    While,

    // Literals
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[regex(r"[0-9]", number)]
    #[regex(r"\.[0-9]", number)]
    Number(NumberLiteral),
    #[token("'", char_literal)]
    CharLiteral(u16),
    #[token("\"", string_literal)]
    StringLiteral(String),

    #[regex(r"[a-zA-Z_$\u{80}-\u{fefe}\u{ff00}-\u{10ffff}][a-zA-Z0-9_$\u{80}-\u{fefe}\u{ff00}-\u{10ffff}]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Separators
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("@")]
    At,
    #[token("::")]
    ColonColon,

    // Operators
    #[token("=")]
    Assign,
    #[token(">")]
    Gt,
    #[token("<")]
    Lt,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("->")]
    Arrow,
    #[token("==")]
    Eq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("!=")]
    Ne,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("%")]
    Percent,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token(">>>")]
    UShr,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("&=")]
    AmpAssign,
    #[token("|=")]
    PipeAssign,
    #[token("^=")]
    CaretAssign,
    #[token("%=")]
    PercentAssign,
    #[token("<<=")]
    ShlAssign,
    #[token(">>=")]
    ShrAssign,
    #[token(">>>=")]
    UShrAssign,
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        matches!(self, Token::Bom | Token::Whitespace | Token::LineComment | Token::BlockComment)
    }

    /// Human-readable form used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Number(_) => "number literal".to_string(),
            Token::CharLiteral(_) => "character literal".to_string(),
            Token::StringLiteral(_) => "string literal".to_string(),
            other => format!("'{}'", other.text()),
        }
    }

    /// Canonical source text of fixed tokens.
    pub fn text(&self) -> &'static str {
        match self {
            Token::Bom | Token::Whitespace | Token::LineComment | Token::BlockComment => "",
            Token::Abstract => "abstract",
            Token::Assert => "assert",
            Token::Boolean => "boolean",
            Token::Break => "break",
            Token::Byte => "byte",
            Token::Case => "case",
            Token::Catch => "catch",
            Token::Char => "char",
            Token::Class => "class",
            Token::Const => "const",
            Token::Continue => "continue",
            Token::Default => "default",
            Token::Do => "do",
            Token::Double => "double",
            Token::Else => "else",
            Token::Enum => "enum",
            Token::Extends => "extends",
            Token::Final => "final",
            Token::Finally => "finally",
            Token::Float => "float",
            Token::For => "for",
            Token::Goto => "goto",
            Token::If => "if",
            Token::Implements => "implements",
            Token::Import => "import",
            Token::InstanceOf => "instanceof",
            Token::Int => "int",
            Token::Interface => "interface",
            Token::Long => "long",
            Token::Native => "native",
            Token::New => "new",
            Token::Package => "package",
            Token::Private => "private",
            Token::Protected => "protected",
            Token::Public => "public",
            Token::Return => "return",
            Token::Short => "short",
            Token::Static => "static",
            Token::Strictfp => "strictfp",
            Token::Super => "super",
            Token::Switch => "switch",
            Token::Synchronized => "synchronized",
            Token::This => "this",
            Token::Throw => "throw",
            Token::Throws => "throws",
            Token::Transient => "transient",
            Token::Try => "try",
            Token::Void => "void",
            Token::Volatile => "volatile",
            Token::While => "while",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Number(_) => "<number>",
            Token::CharLiteral(_) => "<char>",
            Token::StringLiteral(_) => "<string>",
            Token::Identifier(_) => "<identifier>",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Semicolon => ";",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Ellipsis => "...",
            Token::At => "@",
            Token::ColonColon => "::",
            Token::Assign => "=",
            Token::Gt => ">",
            Token::Lt => "<",
            Token::Bang => "!",
            Token::Tilde => "~",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Arrow => "->",
            Token::Eq => "==",
            Token::Le => "<=",
            Token::Ge => ">=",
            Token::Ne => "!=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Percent => "%",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::UShr => ">>>",
            Token::PlusAssign => "+=",
            Token::MinusAssign => "-=",
            Token::StarAssign => "*=",
            Token::SlashAssign => "/=",
            Token::AmpAssign => "&=",
            Token::PipeAssign => "|=",
            Token::CaretAssign => "^=",
            Token::PercentAssign => "%=",
            Token::ShlAssign => "<<=",
            Token::ShrAssign => ">>=",
            Token::UShrAssign => ">>>=",
        }
    }
}

fn block_comment(lex: &mut logos::Lexer<Token>) -> std::result::Result<(), LexErrorKind> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            Ok(())
        }
        None => {
            lex.bump(lex.remainder().len());
            Err(LexErrorKind::UnterminatedComment)
        }
    }
}

fn string_literal(lex: &mut logos::Lexer<Token>) -> std::result::Result<String, LexErrorKind> {
    let rest = lex.remainder();
    let mut units: Vec<u16> = Vec::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                lex.bump(i + 1);
                return String::from_utf16(&units).map_err(|_| LexErrorKind::UnpairedSurrogate);
            }
            '\r' | '\n' => break,
            '\\' => match decode_escape(&mut chars) {
                Ok(unit) => units.push(unit),
                Err(kind) => {
                    bump_through(lex, &mut chars, rest.len());
                    return Err(kind);
                }
            },
            _ => {
                let mut buf = [0u16; 2];
                units.extend_from_slice(c.encode_utf16(&mut buf));
            }
        }
    }
    // The error span starts at the opening quote.
    Err(LexErrorKind::UnterminatedString)
}

fn char_literal(lex: &mut logos::Lexer<Token>) -> std::result::Result<u16, LexErrorKind> {
    let rest = lex.remainder();
    let mut chars = rest.char_indices().peekable();
    let value = match chars.next() {
        None | Some((_, '\r')) | Some((_, '\n')) => return Err(LexErrorKind::UnterminatedChar),
        Some((i, '\'')) => {
            lex.bump(i + 1);
            return Err(LexErrorKind::EmptyCharLiteral);
        }
        Some((_, '\\')) => match decode_escape(&mut chars) {
            Ok(unit) => unit,
            Err(kind) => {
                bump_through(lex, &mut chars, rest.len());
                return Err(kind);
            }
        },
        Some((_, c)) => {
            if (c as u32) > 0xFFFF {
                return Err(LexErrorKind::UnterminatedChar);
            }
            c as u16
        }
    };
    match chars.next() {
        Some((i, '\'')) => {
            lex.bump(i + 1);
            Ok(value)
        }
        _ => Err(LexErrorKind::UnterminatedChar),
    }
}

fn bump_through<I: Iterator<Item = (usize, char)>>(
    lex: &mut logos::Lexer<Token>,
    chars: &mut std::iter::Peekable<I>,
    total: usize,
) {
    let consumed = chars.peek().map(|(i, _)| *i).unwrap_or(total);
    lex.bump(consumed);
}

/// Decodes the escape following a backslash into one UTF-16 unit.
fn decode_escape<I: Iterator<Item = (usize, char)>>(
    chars: &mut std::iter::Peekable<I>,
) -> std::result::Result<u16, LexErrorKind> {
    let (_, c) = chars.next().ok_or(LexErrorKind::IllegalEscape)?;
    let unit = match c {
        'b' => 0x08,
        't' => 0x09,
        'n' => 0x0A,
        'f' => 0x0C,
        'r' => 0x0D,
        's' => 0x20,
        '"' => 0x22,
        '\'' => 0x27,
        '\\' => 0x5C,
        'u' => {
            while matches!(chars.peek(), Some((_, 'u'))) {
                chars.next();
            }
            let mut value: u16 = 0;
            for _ in 0..4 {
                let (_, h) = chars.next().ok_or(LexErrorKind::IllegalEscape)?;
                let digit = h.to_digit(16).ok_or(LexErrorKind::IllegalEscape)?;
                value = (value << 4) | digit as u16;
            }
            value
        }
        '0'..='7' => {
            let first = c as u16 - '0' as u16;
            let max_digits = if first <= 3 { 3 } else { 2 };
            let mut value = first;
            for _ in 1..max_digits {
                match chars.peek() {
                    Some((_, d @ '0'..='7')) => {
                        value = value * 8 + (*d as u16 - '0' as u16);
                        chars.next();
                    }
                    _ => break,
                }
            }
            value
        }
        _ => return Err(LexErrorKind::IllegalEscape),
    };
    Ok(unit)
}

fn number(lex: &mut logos::Lexer<Token>) -> std::result::Result<NumberLiteral, LexErrorKind> {
    let start = lex.span().start;
    let text = &lex.source()[start..];
    let len = scan_number(text.as_bytes());
    let already = lex.slice().len();
    if len > already {
        lex.bump(len - already);
    }
    parse_number(&text[..len])
}

/// Length of the longest prefix that looks like a numeric literal,
/// including any trailing identifier characters (reported as malformed).
fn scan_number(b: &[u8]) -> usize {
    let at = |i: usize| b.get(i).copied().unwrap_or(0);
    let mut i = 0;
    let is_hex = at(0) == b'0' && matches!(at(1), b'x' | b'X');
    if is_hex {
        i = 2;
        while at(i).is_ascii_hexdigit() || at(i) == b'_' {
            i += 1;
        }
        if at(i) == b'.' {
            i += 1;
            while at(i).is_ascii_hexdigit() || at(i) == b'_' {
                i += 1;
            }
        }
        if matches!(at(i), b'p' | b'P') {
            i += 1;
            if matches!(at(i), b'+' | b'-') {
                i += 1;
            }
            while at(i).is_ascii_digit() || at(i) == b'_' {
                i += 1;
            }
        }
    } else {
        while at(i).is_ascii_digit() || at(i) == b'_' {
            i += 1;
        }
        if at(i) == b'.' && at(i + 1) != b'.' {
            i += 1;
            while at(i).is_ascii_digit() || at(i) == b'_' {
                i += 1;
            }
        }
        if matches!(at(i), b'e' | b'E') {
            i += 1;
            if matches!(at(i), b'+' | b'-') {
                i += 1;
            }
            while at(i).is_ascii_digit() || at(i) == b'_' {
                i += 1;
            }
        }
    }
    while at(i).is_ascii_alphanumeric() || at(i) == b'_' || at(i) == b'$' {
        i += 1;
    }
    i
}

fn malformed(text: &str) -> LexErrorKind {
    LexErrorKind::MalformedNumber(text.to_string())
}

/// Underscores may only appear between two digits of the literal's radix.
fn check_underscores(digits: &str, radix: u32) -> bool {
    let chars: Vec<char> = digits.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c != '_' {
            continue;
        }
        let before = chars[..i].iter().rev().find(|c| **c != '_');
        let after = chars[i + 1..].iter().find(|c| **c != '_');
        let ok = |c: Option<&char>| c.map(|c| c.is_digit(radix)).unwrap_or(false);
        if !ok(before) || !ok(after) {
            return false;
        }
    }
    true
}

fn parse_number(text: &str) -> std::result::Result<NumberLiteral, LexErrorKind> {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("0x") {
        let body = &text[2..];
        if lower.contains('p') || body.contains('.') {
            return parse_hex_float(text, body);
        }
        return parse_radix_int(text, body, 16);
    }
    if lower.starts_with("0b") {
        return parse_radix_int(text, &text[2..], 2);
    }

    let last = lower.chars().last().unwrap_or('0');
    let is_float = lower.contains('.') || lower.contains('e') || matches!(last, 'f' | 'd');
    if is_float {
        return parse_decimal_float(text);
    }

    let (digits, is_long) = match last {
        'l' => (&text[..text.len() - 1], true),
        _ => (text, false),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '_') || !check_underscores(digits, 10) {
        return Err(malformed(text));
    }
    let clean: String = digits.chars().filter(|c| *c != '_').collect();
    if clean.len() > 1 && clean.starts_with('0') {
        // Octal
        if !clean.chars().all(|c| ('0'..='7').contains(&c)) {
            return Err(malformed(text));
        }
        let value = u64::from_str_radix(&clean, 8).map_err(|_| LexErrorKind::IntegerTooLarge)?;
        return radix_value(value, is_long);
    }
    let value: u128 = clean.parse().map_err(|_| LexErrorKind::IntegerTooLarge)?;
    if is_long {
        if value > 1u128 << 63 {
            return Err(LexErrorKind::IntegerTooLarge);
        }
        Ok(NumberLiteral::Long(value as i128))
    } else {
        if value > 1u128 << 31 {
            return Err(LexErrorKind::IntegerTooLarge);
        }
        Ok(NumberLiteral::Int(value as i64))
    }
}

fn radix_value(value: u64, is_long: bool) -> std::result::Result<NumberLiteral, LexErrorKind> {
    if is_long {
        Ok(NumberLiteral::Long(value as i64 as i128))
    } else if value > u32::MAX as u64 {
        Err(LexErrorKind::IntegerTooLarge)
    } else {
        Ok(NumberLiteral::Int(value as u32 as i32 as i64))
    }
}

fn parse_radix_int(text: &str, body: &str, radix: u32) -> std::result::Result<NumberLiteral, LexErrorKind> {
    let (digits, is_long) = match body.chars().last() {
        Some('l') | Some('L') => (&body[..body.len() - 1], true),
        _ => (body, false),
    };
    if digits.is_empty()
        || !digits.chars().all(|c| c.is_digit(radix) || c == '_')
        || !check_underscores(digits, radix)
    {
        return Err(malformed(text));
    }
    let clean: String = digits.chars().filter(|c| *c != '_').collect();
    let value = u64::from_str_radix(&clean, radix).map_err(|_| LexErrorKind::IntegerTooLarge)?;
    radix_value(value, is_long)
}

fn parse_decimal_float(text: &str) -> std::result::Result<NumberLiteral, LexErrorKind> {
    let (body, is_float) = match text.chars().last() {
        Some('f') | Some('F') => (&text[..text.len() - 1], true),
        Some('d') | Some('D') => (&text[..text.len() - 1], false),
        _ => (text, false),
    };
    let valid_chars = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '_' | '.' | 'e' | 'E' | '+' | '-'));
    if body.is_empty() || !valid_chars {
        return Err(malformed(text));
    }
    for part in body.split(|c| matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
        if !check_underscores(part, 10) {
            return Err(malformed(text));
        }
    }
    let clean: String = body.chars().filter(|c| *c != '_').collect();
    let mantissa = clean.split(|c| c == 'e' || c == 'E').next().unwrap_or("");
    let nonzero = mantissa.chars().any(|c| ('1'..='9').contains(&c));
    if is_float {
        let value: f32 = clean.parse().map_err(|_| malformed(text))?;
        if value.is_infinite() {
            return Err(LexErrorKind::FloatTooLarge);
        }
        if value == 0.0 && nonzero {
            return Err(LexErrorKind::FloatTooSmall);
        }
        Ok(NumberLiteral::Float(value))
    } else {
        let value: f64 = clean.parse().map_err(|_| malformed(text))?;
        if value.is_infinite() {
            return Err(LexErrorKind::FloatTooLarge);
        }
        if value == 0.0 && nonzero {
            return Err(LexErrorKind::FloatTooSmall);
        }
        Ok(NumberLiteral::Double(value))
    }
}

fn parse_hex_float(text: &str, body: &str) -> std::result::Result<NumberLiteral, LexErrorKind> {
    let (body, is_float) = match body.chars().last() {
        Some('f') | Some('F') if body.to_ascii_lowercase().contains('p') => (&body[..body.len() - 1], true),
        Some('d') | Some('D') if body.to_ascii_lowercase().contains('p') => (&body[..body.len() - 1], false),
        _ => (body, false),
    };
    let lower = body.to_ascii_lowercase();
    let (mantissa, exponent) = lower.split_once('p').ok_or_else(|| malformed(text))?;
    let exponent: String = exponent.chars().filter(|c| *c != '_').collect();
    let exponent: i32 = exponent.parse().map_err(|_| malformed(text))?;
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(malformed(text));
    }
    let mut value = 0f64;
    for c in int_part.chars().filter(|c| *c != '_') {
        let digit = c.to_digit(16).ok_or_else(|| malformed(text))?;
        value = value * 16.0 + digit as f64;
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars().filter(|c| *c != '_') {
        let digit = c.to_digit(16).ok_or_else(|| malformed(text))?;
        value += digit as f64 * scale;
        scale /= 16.0;
    }
    let value = value * 2f64.powi(exponent);
    let nonzero = mantissa.chars().any(|c| c.is_ascii_hexdigit() && c != '0');
    if is_float {
        let value = value as f32;
        if value.is_infinite() {
            return Err(LexErrorKind::FloatTooLarge);
        }
        if value == 0.0 && nonzero {
            return Err(LexErrorKind::FloatTooSmall);
        }
        Ok(NumberLiteral::Float(value))
    } else {
        if value.is_infinite() {
            return Err(LexErrorKind::FloatTooLarge);
        }
        if value == 0.0 && nonzero {
            return Err(LexErrorKind::FloatTooSmall);
        }
        Ok(NumberLiteral::Double(value))
    }
}

/// A token together with its text and position
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalToken {
    pub token: Token,
    pub lexeme: String,
    pub location: Location,
    pub end: Location,
}

impl LexicalToken {
    pub fn new(token: Token, lexeme: String, location: Location, end: Location) -> Self {
        Self { token, lexeme, location, end }
    }

    /// Check if this token matches the given token type
    pub fn is(&self, token_type: &Token) -> bool {
        std::mem::discriminant(&self.token) == std::mem::discriminant(token_type)
    }
}

/// Lazy scanner over one source text.
///
/// Line breaks `\n`, `\r\n` and a lone `\r` all count as one line.
pub struct Lexer<'a> {
    lexer: logos::Lexer<'a, Token>,
    source: &'a str,
    current_line: usize,
    current_column: usize,
    current_offset: usize,
    after_cr: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Token::lexer(source),
            source,
            current_line: 1,
            current_column: 1,
            current_offset: 0,
            after_cr: false,
        }
    }

    /// Position of the end of input
    pub fn end_location(&mut self) -> Location {
        self.location_at(self.source.len())
    }

    /// Walks forward from the last tracked offset to `offset`.
    fn location_at(&mut self, offset: usize) -> Location {
        if offset > self.current_offset {
            for ch in self.source[self.current_offset..offset].chars() {
                match ch {
                    '\n' if self.after_cr => {}
                    '\n' | '\r' => {
                        self.current_line += 1;
                        self.current_column = 1;
                    }
                    _ => self.current_column += 1,
                }
                self.after_cr = ch == '\r';
            }
            self.current_offset = offset;
        }
        Location::new(self.current_line, self.current_column, self.current_offset)
    }

    /// Next significant token, `Ok(None)` at end of input
    pub fn next_token(&mut self) -> Result<Option<LexicalToken>> {
        loop {
            let Some(result) = self.lexer.next() else {
                return Ok(None);
            };
            let span = self.lexer.span();
            match result {
                Ok(token) if token.is_trivia() => continue,
                Ok(token) => {
                    let lexeme = self.lexer.slice().to_string();
                    let location = self.location_at(span.start);
                    let end = self.location_at(span.end);
                    return Ok(Some(LexicalToken::new(token, lexeme, location, end)));
                }
                Err(kind) => {
                    let location = self.location_at(span.start);
                    let offending: String = self.source[span.start..].chars().take(1).collect();
                    return Err(Error::lexical(kind.message(&offending), location));
                }
            }
        }
    }

    /// Get all tokens from the source
    pub fn tokenize(mut self) -> Result<Vec<LexicalToken>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .expect("tokenize")
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("public class Test extends Object"),
            vec![
                Token::Public,
                Token::Class,
                Token::Identifier("Test".into()),
                Token::Extends,
                Token::Identifier("Object".into()),
            ]
        );
        assert_eq!(kinds("classy"), vec![Token::Identifier("classy".into())]);
    }

    #[test]
    fn integer_radices() {
        assert_eq!(kinds("0x1F"), vec![Token::Number(NumberLiteral::Int(31))]);
        assert_eq!(kinds("017"), vec![Token::Number(NumberLiteral::Int(15))]);
        assert_eq!(kinds("0b101"), vec![Token::Number(NumberLiteral::Int(5))]);
        assert_eq!(kinds("1_000_000"), vec![Token::Number(NumberLiteral::Int(1_000_000))]);
        assert_eq!(kinds("0xFFFFFFFF"), vec![Token::Number(NumberLiteral::Int(-1))]);
        assert_eq!(kinds("2147483648"), vec![Token::Number(NumberLiteral::Int(2147483648))]);
        assert_eq!(kinds("10L"), vec![Token::Number(NumberLiteral::Long(10))]);
    }

    #[test]
    fn integer_overflow_is_lexical_error() {
        let err = Lexer::new("2147483649").tokenize().unwrap_err();
        assert!(err.to_string().contains("too large"));
        let err = Lexer::new("0x1_0000_0000").tokenize().unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn floating_point_forms() {
        assert_eq!(kinds("1.5"), vec![Token::Number(NumberLiteral::Double(1.5))]);
        assert_eq!(kinds(".25f"), vec![Token::Number(NumberLiteral::Float(0.25))]);
        assert_eq!(kinds("1e3"), vec![Token::Number(NumberLiteral::Double(1000.0))]);
        assert_eq!(kinds("2d"), vec![Token::Number(NumberLiteral::Double(2.0))]);
        assert_eq!(kinds("0x1.8p1"), vec![Token::Number(NumberLiteral::Double(3.0))]);
        assert!(Lexer::new("1e-50f").tokenize().is_err());
        assert!(Lexer::new("1e400").tokenize().is_err());
    }

    #[test]
    fn string_and_char_escapes() {
        assert_eq!(
            kinds(r#""a\tbA\101\"""#),
            vec![Token::StringLiteral("a\tbAA\"".into())]
        );
        assert_eq!(kinds(r"'\n'"), vec![Token::CharLiteral(10)]);
        assert_eq!(kinds(r"'\uuu0041'"), vec![Token::CharLiteral(65)]);
        assert_eq!(kinds(r"'\377'"), vec![Token::CharLiteral(255)]);
    }

    #[test]
    fn unterminated_string_reports_opening_quote() {
        let err = Lexer::new("int x = \"abc").tokenize().unwrap_err();
        match err {
            Error::Lexical { location, .. } => {
                assert_eq!(location.offset, 8);
                assert_eq!(location.column, 9);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unterminated_comment_reports_comment_start() {
        let err = Lexer::new("a /* never closed").tokenize().unwrap_err();
        assert_eq!(err.location().map(|l| l.offset), Some(2));
    }

    #[test]
    fn newlines_are_normalized() {
        let tokens = Lexer::new("a\r\nb\rc\nd").tokenize().unwrap();
        let lines: Vec<usize> = tokens.iter().map(|t| t.location.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // line\n /* block */ b"),
            vec![Token::Identifier("a".into()), Token::Identifier("b".into())]
        );
    }

    #[test]
    fn shift_operators_are_single_tokens() {
        assert_eq!(kinds(">>>="), vec![Token::UShrAssign]);
        assert_eq!(kinds("a>>b"), vec![Token::Identifier("a".into()), Token::Shr, Token::Identifier("b".into())]);
    }
}
