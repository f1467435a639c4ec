//! Recursive-descent parser with precedence climbing for binary operators.
//!
//! Tokens are pulled from the [`Lexer`] on demand into a buffer, so
//! speculative parses (casts, local declarations, generic arguments) can
//! rewind with [`Parser::mark`] / [`Parser::reset`]. A lexical error ends
//! the token stream; it is reported as soon as the parser needs a token at
//! or after the failing position.

use crate::ast::*;
use crate::error::{Error, Result};

use super::lexer::{Lexer, LexicalToken, NumberLiteral, Token};

/// Parser over one source text
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    tokens: Vec<LexicalToken>,
    current: usize,
    exhausted: bool,
    lex_error: Option<(String, Location)>,
    /// Tokens rewritten by `>>` splitting, restored on reset
    splits: Vec<(usize, LexicalToken)>,
    next_id: u32,
    eof: Location,
}

type Mark = (usize, usize);

/// Binding power of binary operators; higher binds tighter
fn binary_precedence(token: &Token) -> Option<(BinaryOp, u8)> {
    let entry = match token {
        Token::OrOr => (BinaryOp::Or, 1),
        Token::AndAnd => (BinaryOp::And, 2),
        Token::Pipe => (BinaryOp::BitOr, 3),
        Token::Caret => (BinaryOp::BitXor, 4),
        Token::Amp => (BinaryOp::BitAnd, 5),
        Token::Eq => (BinaryOp::Eq, 6),
        Token::Ne => (BinaryOp::Ne, 6),
        Token::Lt => (BinaryOp::Lt, 7),
        Token::Gt => (BinaryOp::Gt, 7),
        Token::Le => (BinaryOp::Le, 7),
        Token::Ge => (BinaryOp::Ge, 7),
        Token::Shl => (BinaryOp::Shl, 8),
        Token::Shr => (BinaryOp::Shr, 8),
        Token::UShr => (BinaryOp::UShr, 8),
        Token::Plus => (BinaryOp::Add, 9),
        Token::Minus => (BinaryOp::Sub, 9),
        Token::Star => (BinaryOp::Mul, 10),
        Token::Slash => (BinaryOp::Div, 10),
        Token::Percent => (BinaryOp::Rem, 10),
        _ => return None,
    };
    Some(entry)
}

const INSTANCEOF_PRECEDENCE: u8 = 7;

fn assignment_op(token: &Token) -> Option<AssignOp> {
    let op = match token {
        Token::Assign => AssignOp::Assign,
        Token::PlusAssign => AssignOp::Compound(BinaryOp::Add),
        Token::MinusAssign => AssignOp::Compound(BinaryOp::Sub),
        Token::StarAssign => AssignOp::Compound(BinaryOp::Mul),
        Token::SlashAssign => AssignOp::Compound(BinaryOp::Div),
        Token::PercentAssign => AssignOp::Compound(BinaryOp::Rem),
        Token::AmpAssign => AssignOp::Compound(BinaryOp::BitAnd),
        Token::PipeAssign => AssignOp::Compound(BinaryOp::BitOr),
        Token::CaretAssign => AssignOp::Compound(BinaryOp::BitXor),
        Token::ShlAssign => AssignOp::Compound(BinaryOp::Shl),
        Token::ShrAssign => AssignOp::Compound(BinaryOp::Shr),
        Token::UShrAssign => AssignOp::Compound(BinaryOp::UShr),
        _ => return None,
    };
    Some(op)
}

fn primitive_kind(token: &Token) -> Option<PrimitiveKind> {
    let kind = match token {
        Token::Boolean => PrimitiveKind::Boolean,
        Token::Byte => PrimitiveKind::Byte,
        Token::Short => PrimitiveKind::Short,
        Token::Char => PrimitiveKind::Char,
        Token::Int => PrimitiveKind::Int,
        Token::Long => PrimitiveKind::Long,
        Token::Float => PrimitiveKind::Float,
        Token::Double => PrimitiveKind::Double,
        _ => return None,
    };
    Some(kind)
}

fn modifier_for(token: &Token) -> Option<Modifier> {
    let modifier = match token {
        Token::Public => Modifier::Public,
        Token::Protected => Modifier::Protected,
        Token::Private => Modifier::Private,
        Token::Abstract => Modifier::Abstract,
        Token::Static => Modifier::Static,
        Token::Final => Modifier::Final,
        Token::Native => Modifier::Native,
        Token::Synchronized => Modifier::Synchronized,
        Token::Transient => Modifier::Transient,
        Token::Volatile => Modifier::Volatile,
        Token::Strictfp => Modifier::Strictfp,
        Token::Default => Modifier::Default,
        _ => return None,
    };
    Some(modifier)
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_first_id(source, 0)
    }

    /// Starts node numbering at `first_id`, for callers that splice
    /// several parses into one tree.
    pub fn with_first_id(source: &'a str, first_id: u32) -> Self {
        Self {
            lexer: Lexer::new(source),
            tokens: Vec::new(),
            current: 0,
            exhausted: false,
            lex_error: None,
            splits: Vec::new(),
            next_id: first_id,
            eof: Location::start(),
        }
    }

    /// First id not yet handed out
    pub fn next_node_id(&self) -> u32 {
        self.next_id
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    // ----- token buffer -----

    fn fill(&mut self, index: usize) -> bool {
        while self.tokens.len() <= index && !self.exhausted {
            match self.lexer.next_token() {
                Ok(Some(token)) => self.tokens.push(token),
                Ok(None) => {
                    self.exhausted = true;
                    self.eof = self.lexer.end_location();
                }
                Err(Error::Lexical { message, location }) => {
                    self.exhausted = true;
                    self.eof = location;
                    self.lex_error = Some((message, location));
                }
                Err(other) => {
                    self.exhausted = true;
                    self.lex_error = Some((other.to_string(), self.eof));
                }
            }
        }
        index < self.tokens.len()
    }

    fn peek_at(&mut self, n: usize) -> Option<&Token> {
        let index = self.current + n;
        if self.fill(index) {
            Some(&self.tokens[index].token)
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn check(&mut self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn check_at(&mut self, n: usize, token: &Token) -> bool {
        self.peek_at(n) == Some(token)
    }

    fn check_ident(&mut self) -> bool {
        matches!(self.peek(), Some(Token::Identifier(_)))
    }

    fn is_at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    fn advance(&mut self) {
        if self.fill(self.current) {
            self.current += 1;
        }
    }

    fn previous(&self) -> &LexicalToken {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn location(&mut self) -> Location {
        if self.fill(self.current) {
            self.tokens[self.current].location
        } else {
            self.eof
        }
    }

    fn prev_end(&self) -> Location {
        if self.current == 0 {
            Location::start()
        } else {
            self.tokens[self.current - 1].end
        }
    }

    fn span_from(&self, start: Location) -> Span {
        Span::new(start, self.prev_end())
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, token: &Token, expected: &str) -> Result<()> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_expected(expected))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<String> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            Some(Token::Goto) | Some(Token::Const) => {
                let location = self.location();
                let word = self.tokens[self.current].lexeme.clone();
                Err(Error::syntax(expected, format!("reserved word '{}'", word), location))
            }
            _ => Err(self.error_expected(expected)),
        }
    }

    fn error_expected(&mut self, expected: &str) -> Error {
        if self.fill(self.current) {
            let token = &self.tokens[self.current];
            Error::syntax(expected, token.token.describe(), token.location)
        } else if let Some((message, location)) = &self.lex_error {
            Error::lexical(message.clone(), *location)
        } else {
            Error::syntax(expected, "end of input", self.eof)
        }
    }

    fn unsupported(&mut self, construct: &str) -> Error {
        let location = self.location();
        Error::syntax("a supported construct", format!("{} (not supported)", construct), location)
    }

    fn expect_end(&mut self) -> Result<()> {
        if self.is_at_end() {
            match &self.lex_error {
                Some((message, location)) => Err(Error::lexical(message.clone(), *location)),
                None => Ok(()),
            }
        } else {
            Err(self.error_expected("end of input"))
        }
    }

    fn mark(&self) -> Mark {
        (self.current, self.splits.len())
    }

    fn reset(&mut self, mark: Mark) {
        while self.splits.len() > mark.1 {
            if let Some((index, original)) = self.splits.pop() {
                self.tokens[index] = original;
            }
        }
        self.current = mark.0;
    }

    /// Runs `f`; on failure rewinds and returns `None`.
    fn speculate<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Option<T> {
        let mark = self.mark();
        match f(self) {
            Ok(value) => Some(value),
            Err(_) => {
                self.reset(mark);
                None
            }
        }
    }

    /// Consumes one `>` of a type-argument list, splitting `>>`, `>>>`,
    /// `>=` and friends in place.
    fn consume_closing_angle(&mut self) -> Result<()> {
        let rest = match self.peek() {
            Some(Token::Gt) => {
                self.advance();
                return Ok(());
            }
            Some(Token::Shr) => Token::Gt,
            Some(Token::UShr) => Token::Shr,
            Some(Token::Ge) => Token::Assign,
            Some(Token::ShrAssign) => Token::Ge,
            Some(Token::UShrAssign) => Token::ShrAssign,
            _ => return Err(self.error_expected("'>'")),
        };
        let index = self.current;
        let original = self.tokens[index].clone();
        let mut location = original.location;
        location.column += 1;
        location.offset += 1;
        self.tokens[index] = LexicalToken::new(rest, original.lexeme[1..].to_string(), location, original.end);
        self.splits.push((index, original));
        Ok(())
    }

    // ----- entry points -----

    /// Full compilation unit: package, imports, type declarations
    pub fn parse_compilation_unit(&mut self) -> Result<CompilationUnit> {
        let start = self.location();
        let package = if self.check(&Token::Package) {
            Some(self.parse_package_decl()?)
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.check(&Token::Import) {
            imports.push(self.parse_import_decl()?);
        }

        let mut types = Vec::new();
        while !self.is_at_end() {
            if self.match_token(&Token::Semicolon) {
                continue;
            }
            let modifiers = self.parse_modifiers()?;
            types.push(self.parse_type_decl(modifiers)?);
        }
        self.expect_end()?;

        Ok(CompilationUnit {
            package,
            imports,
            types,
            source_file: None,
            span: self.span_from(start),
        })
    }

    /// Member declarations of a class body without the braces
    pub fn parse_class_body_members(&mut self, class_name: &str) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        while !self.is_at_end() {
            if let Some(member) = self.parse_member(class_name)? {
                members.push(member);
            }
        }
        self.expect_end()?;
        Ok(members)
    }

    /// Statement sequence of a method body without the braces
    pub fn parse_block_statements(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.parse_block_statement()?);
        }
        self.expect_end()?;
        Ok(stmts)
    }

    /// A single expression filling the whole input
    pub fn parse_standalone_expression(&mut self) -> Result<Expr> {
        let expr = self.parse_expression()?;
        self.expect_end()?;
        Ok(expr)
    }

    // ----- declarations -----

    fn parse_qualified_name(&mut self) -> Result<String> {
        let mut name = self.expect_ident("identifier")?;
        while self.check(&Token::Dot) && matches!(self.peek_at(1), Some(Token::Identifier(_))) {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_ident("identifier")?);
        }
        Ok(name)
    }

    fn parse_package_decl(&mut self) -> Result<PackageDecl> {
        let start = self.location();
        self.consume(&Token::Package, "'package'")?;
        let name = self.parse_qualified_name()?;
        self.consume(&Token::Semicolon, "';' after package declaration")?;
        Ok(PackageDecl { name, span: self.span_from(start) })
    }

    fn parse_import_decl(&mut self) -> Result<ImportDecl> {
        let start = self.location();
        self.consume(&Token::Import, "'import'")?;
        let is_static = self.match_token(&Token::Static);
        let name = self.parse_qualified_name()?;
        let is_wildcard = if self.check(&Token::Dot) && self.check_at(1, &Token::Star) {
            self.advance();
            self.advance();
            true
        } else {
            false
        };
        self.consume(&Token::Semicolon, "';' after import")?;
        Ok(ImportDecl {
            name,
            is_static,
            is_wildcard,
            span: self.span_from(start),
        })
    }

    fn parse_annotation(&mut self) -> Result<Annotation> {
        let start = self.location();
        self.consume(&Token::At, "'@'")?;
        let name = self.parse_qualified_name()?;
        if self.check(&Token::LParen) {
            self.skip_balanced(&Token::LParen, &Token::RParen)?;
        }
        Ok(Annotation { name, span: self.span_from(start) })
    }

    /// Skips a bracketed region including nested pairs.
    fn skip_balanced(&mut self, open: &Token, close: &Token) -> Result<()> {
        self.consume(open, &format!("'{}'", open.text()))?;
        let mut depth = 1usize;
        while depth > 0 {
            if self.is_at_end() {
                return Err(self.error_expected(&format!("'{}'", close.text())));
            }
            if self.check(open) {
                depth += 1;
            } else if self.check(close) {
                depth -= 1;
            }
            self.advance();
        }
        Ok(())
    }

    fn parse_modifiers(&mut self) -> Result<Modifiers> {
        let mut modifiers = Modifiers::default();
        loop {
            if self.check(&Token::At) {
                if self.check_at(1, &Token::Interface) {
                    break;
                }
                let annotation = self.parse_annotation()?;
                modifiers.annotations.push(annotation);
                continue;
            }
            let Some(modifier) = self.peek().and_then(modifier_for) else {
                break;
            };
            if modifier == Modifier::Default && self.check_at(1, &Token::Colon) {
                break;
            }
            self.advance();
            modifiers.list.push(modifier);
        }
        Ok(modifiers)
    }

    fn parse_type_decl(&mut self, modifiers: Modifiers) -> Result<TypeDecl> {
        match self.peek() {
            Some(Token::Class) => self.parse_class_decl(modifiers),
            Some(Token::Interface) => self.parse_interface_decl(modifiers),
            Some(Token::Enum) => Err(self.unsupported("enum declaration")),
            Some(Token::At) => Err(self.unsupported("annotation type declaration")),
            _ => Err(self.error_expected("class or interface declaration")),
        }
    }

    fn parse_class_decl(&mut self, modifiers: Modifiers) -> Result<TypeDecl> {
        let start = self.location();
        self.consume(&Token::Class, "'class'")?;
        let name = self.expect_ident("class name")?;
        let type_params = self.parse_type_params_opt()?;
        let mut extends = Vec::new();
        if self.match_token(&Token::Extends) {
            extends.push(self.parse_type()?);
        }
        let mut implements = Vec::new();
        if self.match_token(&Token::Implements) {
            implements = self.parse_type_list()?;
        }
        let id = self.node_id();
        let members = self.parse_class_body(&name)?;
        Ok(TypeDecl {
            id,
            kind: TypeKind::Class,
            modifiers,
            name,
            type_params,
            extends,
            implements,
            members,
            span: self.span_from(start),
        })
    }

    fn parse_interface_decl(&mut self, modifiers: Modifiers) -> Result<TypeDecl> {
        let start = self.location();
        self.consume(&Token::Interface, "'interface'")?;
        let name = self.expect_ident("interface name")?;
        let type_params = self.parse_type_params_opt()?;
        let mut extends = Vec::new();
        if self.match_token(&Token::Extends) {
            extends = self.parse_type_list()?;
        }
        let id = self.node_id();
        let members = self.parse_class_body(&name)?;
        Ok(TypeDecl {
            id,
            kind: TypeKind::Interface,
            modifiers,
            name,
            type_params,
            extends,
            implements: Vec::new(),
            members,
            span: self.span_from(start),
        })
    }

    fn parse_type_list(&mut self) -> Result<Vec<TypeRef>> {
        let mut types = vec![self.parse_type()?];
        while self.match_token(&Token::Comma) {
            types.push(self.parse_type()?);
        }
        Ok(types)
    }

    fn parse_class_body(&mut self, class_name: &str) -> Result<Vec<Member>> {
        self.consume(&Token::LBrace, "'{' to open class body")?;
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.is_at_end() {
                return Err(self.error_expected("'}' to close class body"));
            }
            if let Some(member) = self.parse_member(class_name)? {
                members.push(member);
            }
        }
        self.consume(&Token::RBrace, "'}'")?;
        Ok(members)
    }

    fn parse_member(&mut self, class_name: &str) -> Result<Option<Member>> {
        if self.match_token(&Token::Semicolon) {
            return Ok(None);
        }
        let start = self.location();
        if self.check(&Token::LBrace) {
            let body = self.parse_block()?;
            let id = self.node_id();
            return Ok(Some(Member::Initializer(Initializer {
                id,
                is_static: false,
                body,
                span: self.span_from(start),
            })));
        }
        if self.check(&Token::Static) && self.check_at(1, &Token::LBrace) {
            self.advance();
            let body = self.parse_block()?;
            let id = self.node_id();
            return Ok(Some(Member::Initializer(Initializer {
                id,
                is_static: true,
                body,
                span: self.span_from(start),
            })));
        }

        let modifiers = self.parse_modifiers()?;
        if matches!(self.peek(), Some(Token::Class) | Some(Token::Interface) | Some(Token::Enum) | Some(Token::At)) {
            return Ok(Some(Member::Type(self.parse_type_decl(modifiers)?)));
        }

        let type_params = self.parse_type_params_opt()?;

        let is_ctor = matches!(self.peek(), Some(Token::Identifier(name)) if name == class_name)
            && self.check_at(1, &Token::LParen);
        if is_ctor {
            return self
                .parse_constructor(modifiers, type_params, start)
                .map(|c| Some(Member::Constructor(c)));
        }

        let return_type = if self.check(&Token::Void) {
            let location = self.location();
            self.advance();
            TypeRef::primitive(PrimitiveKind::Void, self.span_from(location))
        } else {
            self.parse_type()?
        };
        let name = self.expect_ident("member name")?;

        if self.check(&Token::LParen) {
            let id = self.node_id();
            let params = self.parse_params()?;
            let mut return_type = return_type;
            while self.check(&Token::LBracket) && self.check_at(1, &Token::RBracket) {
                self.advance();
                self.advance();
                return_type.dims += 1;
            }
            let throws = self.parse_throws_opt()?;
            let body = if self.match_token(&Token::Semicolon) {
                None
            } else {
                Some(self.parse_block()?)
            };
            return Ok(Some(Member::Method(MethodDecl {
                id,
                modifiers,
                type_params,
                return_type,
                name,
                params,
                throws,
                body,
                span: self.span_from(start),
            })));
        }

        if !type_params.is_empty() {
            return Err(self.error_expected("'(' after generic method name"));
        }
        let declarators = self.parse_declarators_after_name(name, start)?;
        self.consume(&Token::Semicolon, "';' after field declaration")?;
        Ok(Some(Member::Field(FieldDecl {
            modifiers,
            type_ref: return_type,
            declarators,
            span: self.span_from(start),
        })))
    }

    fn parse_throws_opt(&mut self) -> Result<Vec<TypeRef>> {
        if self.match_token(&Token::Throws) {
            self.parse_type_list()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_constructor(
        &mut self,
        modifiers: Modifiers,
        type_params: Vec<TypeParam>,
        start: Location,
    ) -> Result<ConstructorDecl> {
        let name = self.expect_ident("constructor name")?;
        let id = self.node_id();
        let params = self.parse_params()?;
        let throws = self.parse_throws_opt()?;

        let body_start = self.location();
        self.consume(&Token::LBrace, "'{' to open constructor body")?;
        let explicit_call = self.parse_explicit_ctor_call_opt()?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.is_at_end() {
                return Err(self.error_expected("'}' to close constructor body"));
            }
            stmts.push(self.parse_block_statement()?);
        }
        self.consume(&Token::RBrace, "'}'")?;
        let body = Block { stmts, span: self.span_from(body_start) };

        Ok(ConstructorDecl {
            id,
            modifiers,
            type_params,
            name,
            params,
            throws,
            explicit_call,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_explicit_ctor_call_opt(&mut self) -> Result<Option<CtorCall>> {
        let start = self.location();
        let (kind, qualifier) = if self.check(&Token::This) && self.check_at(1, &Token::LParen) {
            self.advance();
            (CtorCallKind::This, None)
        } else if self.check(&Token::Super) && self.check_at(1, &Token::LParen) {
            self.advance();
            (CtorCallKind::Super, None)
        } else if self.check_ident() {
            // outer.super(...)
            let qualified = self.speculate(|p| {
                let name_start = p.location();
                let mut parts = vec![p.expect_ident("identifier")?];
                while p.check(&Token::Dot) && matches!(p.peek_at(1), Some(Token::Identifier(_))) {
                    p.advance();
                    parts.push(p.expect_ident("identifier")?);
                }
                let qualifier = p.make(ExprKind::Name(parts), name_start);
                p.consume(&Token::Dot, "'.'")?;
                p.consume(&Token::Super, "'super'")?;
                if !p.check(&Token::LParen) {
                    return Err(p.error_expected("'('"));
                }
                Ok(qualifier)
            });
            match qualified {
                Some(qualifier) => (CtorCallKind::Super, Some(Box::new(qualifier))),
                None => return Ok(None),
            }
        } else {
            return Ok(None);
        };
        let id = self.node_id();
        let args = self.parse_arguments()?;
        self.consume(&Token::Semicolon, "';' after constructor invocation")?;
        Ok(Some(CtorCall {
            id,
            kind,
            qualifier,
            args,
            span: self.span_from(start),
        }))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.consume(&Token::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let start = self.location();
                let modifiers = self.parse_modifiers()?;
                let mut type_ref = self.parse_type()?;
                let varargs = self.match_token(&Token::Ellipsis);
                let name = self.expect_ident("parameter name")?;
                type_ref.dims += self.parse_dims();
                if varargs {
                    type_ref.dims += 1;
                }
                let id = self.node_id();
                params.push(Param {
                    id,
                    modifiers,
                    type_ref,
                    name,
                    varargs,
                    span: self.span_from(start),
                });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "')' after parameters")?;
        Ok(params)
    }

    /// Consumes `[]` pairs and returns how many there were.
    fn parse_dims(&mut self) -> usize {
        let mut dims = 0;
        while self.check(&Token::LBracket) && self.check_at(1, &Token::RBracket) {
            self.advance();
            self.advance();
            dims += 1;
        }
        dims
    }

    fn parse_declarators_after_name(&mut self, first: String, first_start: Location) -> Result<Vec<VarDeclarator>> {
        let mut declarators = vec![self.parse_declarator_rest(first, first_start)?];
        while self.match_token(&Token::Comma) {
            let start = self.location();
            let name = self.expect_ident("variable name")?;
            declarators.push(self.parse_declarator_rest(name, start)?);
        }
        Ok(declarators)
    }

    fn parse_declarator_rest(&mut self, name: String, start: Location) -> Result<VarDeclarator> {
        let dims = self.parse_dims();
        let init = if self.match_token(&Token::Assign) {
            Some(self.parse_var_init()?)
        } else {
            None
        };
        let id = self.node_id();
        Ok(VarDeclarator {
            id,
            name,
            dims,
            init,
            span: self.span_from(start),
        })
    }

    fn parse_var_init(&mut self) -> Result<VarInit> {
        if self.check(&Token::LBrace) {
            Ok(VarInit::Array(self.parse_array_init()?))
        } else {
            Ok(VarInit::Expr(self.parse_expression()?))
        }
    }

    fn parse_array_init(&mut self) -> Result<ArrayInit> {
        let start = self.location();
        self.consume(&Token::LBrace, "'{'")?;
        let mut elements = Vec::new();
        while !self.check(&Token::RBrace) {
            elements.push(self.parse_var_init()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RBrace, "'}' to close array initializer")?;
        let id = self.node_id();
        Ok(ArrayInit {
            id,
            elements,
            span: self.span_from(start),
        })
    }

    // ----- types -----

    fn parse_type_params_opt(&mut self) -> Result<Vec<TypeParam>> {
        let mut params = Vec::new();
        if !self.match_token(&Token::Lt) {
            return Ok(params);
        }
        loop {
            let start = self.location();
            let name = self.expect_ident("type parameter name")?;
            let mut bounds = Vec::new();
            if self.match_token(&Token::Extends) {
                bounds.push(self.parse_type()?);
                while self.match_token(&Token::Amp) {
                    bounds.push(self.parse_type()?);
                }
            }
            params.push(TypeParam { name, bounds, span: self.span_from(start) });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume_closing_angle()?;
        Ok(params)
    }

    /// Primitive or class type with trailing `[]` dims
    pub(crate) fn parse_type(&mut self) -> Result<TypeRef> {
        let start = self.location();
        while self.check(&Token::At) {
            self.parse_annotation()?;
        }
        let kind = if let Some(p) = self.peek().and_then(primitive_kind) {
            self.advance();
            TypeRefKind::Primitive(p)
        } else {
            let mut name = self.expect_ident("type")?;
            let mut args = self.parse_type_args_opt()?;
            while self.check(&Token::Dot) && matches!(self.peek_at(1), Some(Token::Identifier(_))) {
                self.advance();
                name.push('.');
                name.push_str(&self.expect_ident("type name")?);
                let more = self.parse_type_args_opt()?;
                if !more.is_empty() {
                    args = more;
                }
            }
            TypeRefKind::Named { name, args }
        };
        let dims = self.parse_dims();
        Ok(TypeRef {
            kind,
            dims,
            span: self.span_from(start),
        })
    }

    fn parse_type_args_opt(&mut self) -> Result<Vec<TypeArg>> {
        let mut args = Vec::new();
        if !self.match_token(&Token::Lt) {
            return Ok(args);
        }
        // Diamond
        if self.check(&Token::Gt) {
            self.advance();
            return Ok(args);
        }
        loop {
            if self.match_token(&Token::Question) {
                let (bound, upper) = if self.match_token(&Token::Extends) {
                    (Some(Box::new(self.parse_type()?)), true)
                } else if self.match_token(&Token::Super) {
                    (Some(Box::new(self.parse_type()?)), false)
                } else {
                    (None, true)
                };
                args.push(TypeArg::Wildcard { bound, upper });
            } else {
                args.push(TypeArg::Type(self.parse_type()?));
            }
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume_closing_angle()?;
        Ok(args)
    }

    // ----- statements -----

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.location();
        self.consume(&Token::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.is_at_end() {
                return Err(self.error_expected("'}' to close block"));
            }
            stmts.push(self.parse_block_statement()?);
        }
        self.consume(&Token::RBrace, "'}'")?;
        Ok(Block { stmts, span: self.span_from(start) })
    }

    fn parse_block_statement(&mut self) -> Result<Stmt> {
        let start = self.location();
        match self.peek() {
            Some(Token::Class) | Some(Token::Interface) | Some(Token::Abstract) => {
                let modifiers = self.parse_modifiers()?;
                return Ok(Stmt::LocalClass(self.parse_type_decl(modifiers)?));
            }
            Some(Token::Enum) => return Err(self.unsupported("local enum declaration")),
            Some(Token::Final) | Some(Token::At) => {
                let modifiers = self.parse_modifiers()?;
                if matches!(self.peek(), Some(Token::Class) | Some(Token::Interface)) {
                    return Ok(Stmt::LocalClass(self.parse_type_decl(modifiers)?));
                }
                let decl = self.parse_local_var_decl(modifiers, start)?;
                self.consume(&Token::Semicolon, "';' after variable declaration")?;
                return Ok(Stmt::LocalVar(LocalVarDecl { span: self.span_from(start), ..decl }));
            }
            _ => {}
        }
        if self.looks_like_local_var_decl() {
            let decl = self.parse_local_var_decl(Modifiers::default(), start)?;
            self.consume(&Token::Semicolon, "';' after variable declaration")?;
            return Ok(Stmt::LocalVar(LocalVarDecl { span: self.span_from(start), ..decl }));
        }
        self.parse_statement()
    }

    /// `Type Identifier` ahead, decided by a speculative type parse.
    fn looks_like_local_var_decl(&mut self) -> bool {
        if self.peek().and_then(primitive_kind).is_some() {
            return !self.check_at(1, &Token::Dot);
        }
        if !self.check_ident() {
            return false;
        }
        let mark = self.mark();
        let result = self.parse_type().is_ok() && self.check_ident();
        self.reset(mark);
        result
    }

    fn parse_local_var_decl(&mut self, modifiers: Modifiers, start: Location) -> Result<LocalVarDecl> {
        let type_ref = self.parse_type()?;
        let name_start = self.location();
        let name = self.expect_ident("variable name")?;
        let declarators = self.parse_declarators_after_name(name, name_start)?;
        Ok(LocalVarDecl {
            modifiers,
            type_ref,
            declarators,
            span: self.span_from(start),
        })
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        let start = self.location();
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_expected("statement"));
        };
        match token {
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::Empty(self.span_from(start)))
            }
            Token::If => self.parse_if(start),
            Token::While => {
                self.advance();
                let cond = self.parse_paren_expr()?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While(WhileStmt { cond, body, span: self.span_from(start) }))
            }
            Token::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.consume(&Token::While, "'while' after do body")?;
                let cond = self.parse_paren_expr()?;
                self.consume(&Token::Semicolon, "';' after do-while")?;
                Ok(Stmt::DoWhile(DoWhileStmt { body, cond, span: self.span_from(start) }))
            }
            Token::For => self.parse_for(start),
            Token::Switch => self.parse_switch(start),
            Token::Return => {
                self.advance();
                let value = if self.check(&Token::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume(&Token::Semicolon, "';' after return")?;
                Ok(Stmt::Return(ReturnStmt { value, span: self.span_from(start) }))
            }
            Token::Break | Token::Continue => {
                self.advance();
                let label = if self.check_ident() {
                    Some(self.expect_ident("label")?)
                } else {
                    None
                };
                self.consume(&Token::Semicolon, "';'")?;
                let jump = JumpStmt { label, span: self.span_from(start) };
                Ok(if token == Token::Break {
                    Stmt::Break(jump)
                } else {
                    Stmt::Continue(jump)
                })
            }
            Token::Throw => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(&Token::Semicolon, "';' after throw")?;
                Ok(Stmt::Throw(ThrowStmt { expr, span: self.span_from(start) }))
            }
            Token::Try => self.parse_try(start),
            Token::Synchronized => {
                self.advance();
                let lock = self.parse_paren_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::Synchronized(SyncStmt { lock, body, span: self.span_from(start) }))
            }
            Token::Assert => {
                self.advance();
                let cond = self.parse_expression()?;
                let message = if self.match_token(&Token::Colon) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                self.consume(&Token::Semicolon, "';' after assert")?;
                Ok(Stmt::Assert(AssertStmt { cond, message, span: self.span_from(start) }))
            }
            Token::Identifier(label) if self.check_at(1, &Token::Colon) => {
                self.advance();
                self.advance();
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::Labeled(LabeledStmt { label, body, span: self.span_from(start) }))
            }
            Token::Goto | Token::Const => Err(self.error_expected("statement")),
            _ => {
                let expr = self.parse_expression()?;
                if !expr.is_statement_expression() {
                    return Err(Error::syntax("statement", "expression (not a statement)", expr.span.start));
                }
                self.consume(&Token::Semicolon, "';' after expression")?;
                Ok(Stmt::Expr(ExprStmt { expr, span: self.span_from(start) }))
            }
        }
    }

    fn parse_paren_expr(&mut self) -> Result<Expr> {
        self.consume(&Token::LParen, "'('")?;
        let expr = self.parse_expression()?;
        self.consume(&Token::RParen, "')'")?;
        Ok(expr)
    }

    fn parse_if(&mut self, start: Location) -> Result<Stmt> {
        self.consume(&Token::If, "'if'")?;
        let cond = self.parse_paren_expr()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_token(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If(IfStmt {
            cond,
            then_branch,
            else_branch,
            span: self.span_from(start),
        }))
    }

    fn parse_for(&mut self, start: Location) -> Result<Stmt> {
        self.consume(&Token::For, "'for'")?;
        self.consume(&Token::LParen, "'(' after for")?;

        // Enhanced for: [modifiers] Type name :
        let foreach_head = self.speculate(|p| {
            let modifiers = p.parse_modifiers()?;
            let var_type = p.parse_type()?;
            let name = p.expect_ident("variable name")?;
            p.consume(&Token::Colon, "':'")?;
            Ok((modifiers, var_type, name))
        });
        if let Some((modifiers, var_type, name)) = foreach_head {
            let iterable = self.parse_expression()?;
            self.consume(&Token::RParen, "')'")?;
            let body = Box::new(self.parse_statement()?);
            let id = self.node_id();
            let var_id = self.node_id();
            return Ok(Stmt::ForEach(ForEachStmt {
                id,
                modifiers,
                var_type,
                var_id,
                name,
                iterable,
                body,
                span: self.span_from(start),
            }));
        }

        let mut init = Vec::new();
        if !self.check(&Token::Semicolon) {
            let init_start = self.location();
            let has_modifiers = matches!(self.peek(), Some(Token::Final) | Some(Token::At));
            if has_modifiers || self.looks_like_local_var_decl() {
                let modifiers = self.parse_modifiers()?;
                let decl = self.parse_local_var_decl(modifiers, init_start)?;
                init.push(Stmt::LocalVar(decl));
            } else {
                for expr in self.parse_expression_list()? {
                    let span = expr.span;
                    init.push(Stmt::Expr(ExprStmt { expr, span }));
                }
            }
        }
        self.consume(&Token::Semicolon, "';' after for initializer")?;
        let cond = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&Token::Semicolon, "';' after for condition")?;
        let update = if self.check(&Token::RParen) {
            Vec::new()
        } else {
            self.parse_expression_list()?
        };
        self.consume(&Token::RParen, "')' after for update")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For(ForStmt {
            init,
            cond,
            update,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_expression_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.parse_expression()?];
        while self.match_token(&Token::Comma) {
            exprs.push(self.parse_expression()?);
        }
        for expr in &exprs {
            if !expr.is_statement_expression() {
                return Err(Error::syntax("statement expression", "expression (not a statement)", expr.span.start));
            }
        }
        Ok(exprs)
    }

    fn parse_switch(&mut self, start: Location) -> Result<Stmt> {
        self.consume(&Token::Switch, "'switch'")?;
        let selector = self.parse_paren_expr()?;
        self.consume(&Token::LBrace, "'{' after switch selector")?;
        let mut cases = Vec::new();
        while !self.check(&Token::RBrace) {
            let case_start = self.location();
            let mut labels = Vec::new();
            loop {
                if self.match_token(&Token::Case) {
                    let expr = self.parse_expression()?;
                    if self.check(&Token::Arrow) {
                        return Err(self.unsupported("switch rule"));
                    }
                    self.consume(&Token::Colon, "':' after case label")?;
                    labels.push(CaseLabel::Expr(expr));
                } else if self.check(&Token::Default) {
                    let location = self.location();
                    self.advance();
                    self.consume(&Token::Colon, "':' after default")?;
                    labels.push(CaseLabel::Default(self.span_from(location)));
                } else {
                    break;
                }
            }
            if labels.is_empty() {
                return Err(self.error_expected("'case', 'default' or '}'"));
            }
            let mut body = Vec::new();
            while !matches!(self.peek(), Some(Token::Case) | Some(Token::Default) | Some(Token::RBrace)) {
                if self.is_at_end() {
                    return Err(self.error_expected("'}' to close switch"));
                }
                body.push(self.parse_block_statement()?);
            }
            cases.push(SwitchCase {
                labels,
                body,
                span: self.span_from(case_start),
            });
        }
        self.consume(&Token::RBrace, "'}'")?;
        let id = self.node_id();
        Ok(Stmt::Switch(SwitchStmt {
            id,
            selector,
            cases,
            span: self.span_from(start),
        }))
    }

    fn parse_try(&mut self, start: Location) -> Result<Stmt> {
        self.consume(&Token::Try, "'try'")?;
        if self.check(&Token::LParen) {
            return Err(self.unsupported("try-with-resources"));
        }
        let body = self.parse_block()?;
        let mut catches = Vec::new();
        while self.check(&Token::Catch) {
            let catch_start = self.location();
            self.advance();
            self.consume(&Token::LParen, "'(' after catch")?;
            let modifiers = self.parse_modifiers()?;
            let mut types = vec![self.parse_type()?];
            while self.match_token(&Token::Pipe) {
                types.push(self.parse_type()?);
            }
            let name = self.expect_ident("exception parameter name")?;
            self.consume(&Token::RParen, "')'")?;
            let body = self.parse_block()?;
            let id = self.node_id();
            catches.push(CatchClause {
                id,
                modifiers,
                types,
                name,
                body,
                span: self.span_from(catch_start),
            });
        }
        let finally = if self.match_token(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if catches.is_empty() && finally.is_none() {
            return Err(self.error_expected("'catch' or 'finally'"));
        }
        Ok(Stmt::Try(TryStmt {
            body,
            catches,
            finally,
            span: self.span_from(start),
        }))
    }

    // ----- expressions -----

    fn make(&mut self, kind: ExprKind, start: Location) -> Expr {
        let id = self.node_id();
        Expr { id, kind, span: self.span_from(start) }
    }

    pub(crate) fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let start = self.location();
        if self.check_ident() && self.check_at(1, &Token::Arrow) {
            return Err(self.unsupported("lambda expression"));
        }
        let target = self.parse_conditional()?;
        let Some(op) = self.peek().and_then(assignment_op) else {
            return Ok(target);
        };
        self.advance();
        let value = self.parse_assignment()?;
        Ok(self.make(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            start,
        ))
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let start = self.location();
        let cond = self.parse_binary(1)?;
        if !self.match_token(&Token::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expression()?;
        self.consume(&Token::Colon, "':' in conditional expression")?;
        let else_expr = self.parse_conditional()?;
        Ok(self.make(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            start,
        ))
    }

    /// Precedence climbing over the binary operator table.
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr> {
        let start = self.location();
        let mut left = self.parse_unary()?;
        loop {
            if self.check(&Token::InstanceOf) {
                if INSTANCEOF_PRECEDENCE < min_precedence {
                    break;
                }
                self.advance();
                let target_type = self.parse_type()?;
                left = self.make(
                    ExprKind::InstanceOf {
                        expr: Box::new(left),
                        target_type,
                    },
                    start,
                );
                continue;
            }
            let Some((op, precedence)) = self.peek().and_then(binary_precedence) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            left = self.make(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                start,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.location();
        let op = match self.peek() {
            Some(Token::PlusPlus) => UnaryOp::PreInc,
            Some(Token::MinusMinus) => UnaryOp::PreDec,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => {
                if let Some(literal) = self.negated_min_literal() {
                    return Ok(literal);
                }
                UnaryOp::Minus
            }
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Tilde) => UnaryOp::BitNot,
            Some(Token::LParen) => {
                if let Some(cast) = self.try_parse_cast()? {
                    return Ok(cast);
                }
                return self.parse_postfix();
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(self.make(ExprKind::Unary { op, operand: Box::new(operand) }, start))
    }

    /// `-2147483648` and `-9223372036854775808L` only exist as negated literals.
    fn negated_min_literal(&mut self) -> Option<Expr> {
        let start = self.location();
        let literal = match self.peek_at(1) {
            Some(Token::Number(NumberLiteral::Int(v))) if *v == 1i64 << 31 => Literal::Int(i32::MIN),
            Some(Token::Number(NumberLiteral::Long(v))) if *v == 1i128 << 63 => Literal::Long(i64::MIN),
            _ => return None,
        };
        self.advance();
        self.advance();
        Some(self.make(ExprKind::Literal(literal), start))
    }

    fn starts_unary_not_plus_minus(&mut self) -> bool {
        match self.peek() {
            Some(token) => matches!(
                token,
                Token::Identifier(_)
                    | Token::Number(_)
                    | Token::CharLiteral(_)
                    | Token::StringLiteral(_)
                    | Token::True
                    | Token::False
                    | Token::Null
                    | Token::This
                    | Token::Super
                    | Token::New
                    | Token::LParen
                    | Token::Bang
                    | Token::Tilde
                    | Token::Void
            ) || primitive_kind(token).is_some(),
            None => false,
        }
    }

    /// `(Type) operand`, or `None` with the stream rewound.
    fn try_parse_cast(&mut self) -> Result<Option<Expr>> {
        let start = self.location();
        let mark = self.mark();
        self.consume(&Token::LParen, "'('")?;
        let primitive = self.peek().and_then(primitive_kind).is_some();
        if !primitive && !self.check_ident() {
            self.reset(mark);
            return Ok(None);
        }
        let target_type = match self.parse_type() {
            Ok(t) if self.check(&Token::RParen) => t,
            _ => {
                self.reset(mark);
                return Ok(None);
            }
        };
        self.advance();
        if self.check(&Token::Arrow) {
            return Err(self.unsupported("lambda expression"));
        }
        let is_cast = if primitive && target_type.dims == 0 {
            !matches!(self.peek(), None | Some(Token::Dot))
                && (self.starts_unary_not_plus_minus()
                    || matches!(self.peek(), Some(Token::Plus) | Some(Token::Minus) | Some(Token::PlusPlus) | Some(Token::MinusMinus)))
        } else {
            self.starts_unary_not_plus_minus()
        };
        if !is_cast {
            self.reset(mark);
            return Ok(None);
        }
        let operand = self.parse_unary()?;
        Ok(Some(self.make(
            ExprKind::Cast {
                target_type,
                expr: Box::new(operand),
            },
            start,
        )))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        self.consume(&Token::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "')' after arguments")?;
        Ok(args)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let start = self.location();
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    expr = self.parse_selector(expr, start)?;
                }
                Some(Token::LBracket) => {
                    if self.check_at(1, &Token::RBracket) {
                        expr = self.parse_array_class_literal(expr, start)?;
                        continue;
                    }
                    self.advance();
                    let index = self.parse_expression()?;
                    self.consume(&Token::RBracket, "']'")?;
                    expr = self.make(
                        ExprKind::ArrayAccess {
                            array: Box::new(expr),
                            index: Box::new(index),
                        },
                        start,
                    );
                }
                Some(Token::PlusPlus) | Some(Token::MinusMinus) => {
                    let op = if self.check(&Token::PlusPlus) {
                        UnaryOp::PostInc
                    } else {
                        UnaryOp::PostDec
                    };
                    self.advance();
                    expr = self.make(ExprKind::Unary { op, operand: Box::new(expr) }, start);
                }
                Some(Token::ColonColon) => return Err(self.unsupported("method reference")),
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Everything that can follow `expr.`
    fn parse_selector(&mut self, expr: Expr, start: Location) -> Result<Expr> {
        if self.check(&Token::Lt) {
            // Explicit type arguments of a generic method call are erased.
            self.parse_type_args_opt()?;
            let name = self.expect_ident("method name")?;
            let args = self.parse_arguments()?;
            return Ok(self.make(
                ExprKind::MethodCall {
                    receiver: Receiver::Expr(Box::new(expr)),
                    name,
                    args,
                },
                start,
            ));
        }
        match self.peek().cloned() {
            Some(Token::Identifier(name)) => {
                self.advance();
                if self.check(&Token::LParen) {
                    let args = self.parse_arguments()?;
                    return Ok(self.make(
                        ExprKind::MethodCall {
                            receiver: Receiver::Expr(Box::new(expr)),
                            name,
                            args,
                        },
                        start,
                    ));
                }
                match expr.kind {
                    ExprKind::Name(mut parts) => {
                        parts.push(name);
                        Ok(Expr {
                            id: expr.id,
                            kind: ExprKind::Name(parts),
                            span: self.span_from(start),
                        })
                    }
                    kind => {
                        let target = Expr { id: expr.id, kind, span: expr.span };
                        Ok(self.make(ExprKind::FieldAccess { target: Box::new(target), name }, start))
                    }
                }
            }
            Some(Token::New) => self.parse_creator(Some(Box::new(expr)), start),
            Some(Token::This) => {
                self.advance();
                match expr.kind {
                    ExprKind::Name(parts) => Ok(self.make(ExprKind::This { qualifier: Some(parts.join(".")) }, start)),
                    _ => Err(Error::syntax("class name before '.this'", "expression", expr.span.start)),
                }
            }
            Some(Token::Class) => {
                self.advance();
                match expr.kind {
                    ExprKind::Name(parts) => {
                        let type_ref = TypeRef::named(parts.join("."), expr.span);
                        Ok(self.make(ExprKind::ClassLit(type_ref), start))
                    }
                    _ => Err(Error::syntax("type name before '.class'", "expression", expr.span.start)),
                }
            }
            Some(Token::Super) => Err(self.unsupported("qualified super access")),
            _ => Err(self.error_expected("identifier after '.'")),
        }
    }

    /// `Name[]...[].class`
    fn parse_array_class_literal(&mut self, expr: Expr, start: Location) -> Result<Expr> {
        let ExprKind::Name(parts) = expr.kind else {
            return Err(self.error_expected("expression inside '[]'"));
        };
        let dims = self.parse_dims();
        self.consume(&Token::Dot, "'.class' after array type")?;
        self.consume(&Token::Class, "'class'")?;
        let type_ref = TypeRef::named(parts.join("."), expr.span).with_dims(dims);
        Ok(self.make(ExprKind::ClassLit(type_ref), start))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let start = self.location();
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_expected("expression"));
        };
        match token {
            Token::Number(number) => {
                let literal = match number {
                    NumberLiteral::Int(v) if v > i32::MAX as i64 => {
                        return Err(Error::lexical("integer number too large", start));
                    }
                    NumberLiteral::Int(v) => Literal::Int(v as i32),
                    NumberLiteral::Long(v) if v > i64::MAX as i128 => {
                        return Err(Error::lexical("integer number too large", start));
                    }
                    NumberLiteral::Long(v) => Literal::Long(v as i64),
                    NumberLiteral::Float(v) => Literal::Float(v),
                    NumberLiteral::Double(v) => Literal::Double(v),
                };
                self.advance();
                Ok(self.make(ExprKind::Literal(literal), start))
            }
            Token::CharLiteral(c) => {
                self.advance();
                Ok(self.make(ExprKind::Literal(Literal::Char(c)), start))
            }
            Token::StringLiteral(s) => {
                self.advance();
                Ok(self.make(ExprKind::Literal(Literal::String(s)), start))
            }
            Token::True | Token::False => {
                self.advance();
                Ok(self.make(ExprKind::Literal(Literal::Boolean(token == Token::True)), start))
            }
            Token::Null => {
                self.advance();
                Ok(self.make(ExprKind::Literal(Literal::Null), start))
            }
            Token::This => {
                self.advance();
                if self.check(&Token::LParen) {
                    return Err(Error::syntax(
                        "expression",
                        "constructor invocation (must be the first statement of a constructor)",
                        start,
                    ));
                }
                Ok(self.make(ExprKind::This { qualifier: None }, start))
            }
            Token::Super => {
                self.advance();
                if self.check(&Token::LParen) {
                    return Err(Error::syntax(
                        "expression",
                        "constructor invocation (must be the first statement of a constructor)",
                        start,
                    ));
                }
                if self.check(&Token::ColonColon) {
                    return Err(self.unsupported("method reference"));
                }
                self.consume(&Token::Dot, "'.' after super")?;
                if self.check(&Token::Lt) {
                    self.parse_type_args_opt()?;
                }
                let name = self.expect_ident("member name after 'super.'")?;
                if self.check(&Token::LParen) {
                    let args = self.parse_arguments()?;
                    Ok(self.make(
                        ExprKind::MethodCall {
                            receiver: Receiver::Super,
                            name,
                            args,
                        },
                        start,
                    ))
                } else {
                    Ok(self.make(ExprKind::SuperField { name }, start))
                }
            }
            Token::New => self.parse_creator(None, start),
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(&Token::RParen, "')'")?;
                if self.check(&Token::Arrow) {
                    return Err(self.unsupported("lambda expression"));
                }
                Ok(self.make(ExprKind::Paren(Box::new(inner)), start))
            }
            Token::Identifier(name) => {
                self.advance();
                if self.check(&Token::LParen) {
                    let args = self.parse_arguments()?;
                    return Ok(self.make(
                        ExprKind::MethodCall {
                            receiver: Receiver::Implicit,
                            name,
                            args,
                        },
                        start,
                    ));
                }
                Ok(self.make(ExprKind::Name(vec![name]), start))
            }
            Token::Void => {
                self.advance();
                self.consume(&Token::Dot, "'.class' after void")?;
                self.consume(&Token::Class, "'class'")?;
                let type_ref = TypeRef::primitive(PrimitiveKind::Void, self.span_from(start));
                Ok(self.make(ExprKind::ClassLit(type_ref), start))
            }
            ref t if primitive_kind(t).is_some() => {
                let type_ref = self.parse_type()?;
                self.consume(&Token::Dot, "'.class' after primitive type")?;
                self.consume(&Token::Class, "'class'")?;
                Ok(self.make(ExprKind::ClassLit(type_ref), start))
            }
            _ => Err(self.error_expected("expression")),
        }
    }

    /// `new` with optional outer instance, for class instances and arrays
    fn parse_creator(&mut self, outer: Option<Box<Expr>>, start: Location) -> Result<Expr> {
        self.consume(&Token::New, "'new'")?;
        if self.check(&Token::Lt) {
            self.parse_type_args_opt()?;
        }
        let type_start = self.location();
        let base = if let Some(p) = self.peek().and_then(primitive_kind) {
            self.advance();
            TypeRef::primitive(p, self.span_from(type_start))
        } else {
            let mut name = self.expect_ident("type after 'new'")?;
            let mut args = self.parse_type_args_opt()?;
            while self.check(&Token::Dot) && matches!(self.peek_at(1), Some(Token::Identifier(_))) {
                self.advance();
                name.push('.');
                name.push_str(&self.expect_ident("type name")?);
                let more = self.parse_type_args_opt()?;
                if !more.is_empty() {
                    args = more;
                }
            }
            TypeRef {
                kind: TypeRefKind::Named { name, args },
                dims: 0,
                span: self.span_from(type_start),
            }
        };

        if self.check(&Token::LBracket) {
            if outer.is_some() {
                return Err(self.error_expected("'(' after qualified class creation"));
            }
            let mut dims = Vec::new();
            let mut extra_dims = 0;
            while self.check(&Token::LBracket) {
                if self.check_at(1, &Token::RBracket) {
                    self.advance();
                    self.advance();
                    extra_dims += 1;
                } else if extra_dims == 0 {
                    self.advance();
                    dims.push(self.parse_expression()?);
                    self.consume(&Token::RBracket, "']'")?;
                } else {
                    return Err(self.error_expected("'[]'"));
                }
            }
            let init = if dims.is_empty() {
                Some(self.parse_array_init()?)
            } else {
                None
            };
            return Ok(self.make(
                ExprKind::NewArray {
                    elem_type: base,
                    dims,
                    extra_dims,
                    init,
                },
                start,
            ));
        }

        if matches!(base.kind, TypeRefKind::Primitive(_)) {
            return Err(self.error_expected("'[' after primitive type in array creation"));
        }
        let args = self.parse_arguments()?;
        let body = if self.check(&Token::LBrace) {
            let body_start = self.location();
            let id = self.node_id();
            let members = self.parse_class_body("")?;
            Some(Box::new(TypeDecl {
                id,
                kind: TypeKind::Class,
                modifiers: Modifiers::default(),
                name: String::new(),
                type_params: Vec::new(),
                extends: Vec::new(),
                implements: Vec::new(),
                members,
                span: self.span_from(body_start),
            }))
        } else {
            None
        };
        Ok(self.make(
            ExprKind::New {
                outer,
                class_type: base,
                args,
                body,
            },
            start,
        ))
    }
}

/// Parse a full compilation unit
pub fn parse(source: &str) -> Result<CompilationUnit> {
    Parser::new(source).parse_compilation_unit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        Parser::new(source).parse_standalone_expression().expect("parse expression")
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let e = expr("1 + 2 * 3");
        match e.kind {
            ExprKind::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let e = expr("a = b = c");
        match e.kind {
            ExprKind::Assign { value, .. } => assert!(matches!(value.kind, ExprKind::Assign { .. })),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cast_versus_parenthesized_expression() {
        assert!(matches!(expr("(String) x").kind, ExprKind::Cast { .. }));
        assert!(matches!(expr("(int) -x").kind, ExprKind::Cast { .. }));
        assert!(matches!(expr("(a) + b").kind, ExprKind::Binary { .. }));
        assert!(matches!(expr("(a) - 1").kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn generic_close_splits_shift_token() {
        let unit = parse("class A { java.util.List<java.util.List<String>> x; int y = 8 >> 1; }").unwrap();
        assert_eq!(unit.types[0].members.len(), 2);
    }

    #[test]
    fn less_than_is_not_a_generic_in_expressions() {
        let e = expr("a < b");
        assert!(matches!(e.kind, ExprKind::Binary { op: BinaryOp::Lt, .. }));
    }

    #[test]
    fn qualified_names_accumulate() {
        match expr("java.lang.Integer.MAX_VALUE").kind {
            ExprKind::Name(parts) => assert_eq!(parts.len(), 4),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn min_int_literal_needs_minus() {
        assert!(matches!(expr("-2147483648").kind, ExprKind::Literal(Literal::Int(i32::MIN))));
        assert!(Parser::new("2147483648").parse_standalone_expression().is_err());
    }

    #[test]
    fn syntax_error_names_expected_construct() {
        let err = parse("class A { void m() { int x = ; } }").unwrap_err();
        match err {
            Error::Syntax { expected, found, .. } => {
                assert_eq!(expected, "expression");
                assert_eq!(found, "';'");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lambda_is_reported_unsupported() {
        let err = Parser::new("x -> x").parse_standalone_expression().unwrap_err();
        assert!(err.to_string().contains("lambda"));
    }

    #[test]
    fn lexical_error_surfaces_through_parser() {
        let err = Parser::new("\"abc").parse_standalone_expression().unwrap_err();
        assert!(matches!(err, Error::Lexical { location, .. } if location.offset == 0));
    }

    #[test]
    fn local_declaration_versus_expression_statement() {
        let stmts = Parser::new("int[] a = {1, 2}; a[0] = 3; String s; s = \"x\";")
            .parse_block_statements()
            .unwrap();
        assert!(matches!(stmts[0], Stmt::LocalVar(_)));
        assert!(matches!(stmts[1], Stmt::Expr(_)));
        assert!(matches!(stmts[2], Stmt::LocalVar(_)));
        assert!(matches!(stmts[3], Stmt::Expr(_)));
    }

    #[test]
    fn anonymous_class_body_is_a_type_decl() {
        match expr("new Runnable() { public void run() {} }").kind {
            ExprKind::New { body: Some(body), .. } => {
                assert!(body.is_anonymous());
                assert_eq!(body.members.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
