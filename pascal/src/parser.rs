use std::mem;

use crate::ast::{
    ArrayDecl, BinaryOp, Block, Conversion, Declaration, Expr, ExprKind, FunctionDecl, Literal,
    Param, Program, Stmt, Type, UnaryOp, VarDecl,
};
use crate::error::ParseError;
use crate::token::{Token, TokenKind};

const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_RELATIONAL: u8 = 4;
const PREC_ADDITIVE: u8 = 5;
const PREC_MULTIPLICATIVE: u8 = 6;

/// Deepest nesting of statements and subexpressions the parser accepts.
pub const MAX_NESTING_DEPTH: usize = 256;

fn binary_operator(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    let entry = match kind {
        TokenKind::Or => (BinaryOp::Or, PREC_OR),
        TokenKind::And => (BinaryOp::And, PREC_AND),
        TokenKind::Equal => (BinaryOp::Eq, PREC_RELATIONAL),
        TokenKind::NotEqual => (BinaryOp::Ne, PREC_RELATIONAL),
        TokenKind::Less => (BinaryOp::Lt, PREC_RELATIONAL),
        TokenKind::LessEqual => (BinaryOp::Le, PREC_RELATIONAL),
        TokenKind::Greater => (BinaryOp::Gt, PREC_RELATIONAL),
        TokenKind::GreaterEqual => (BinaryOp::Ge, PREC_RELATIONAL),
        TokenKind::Plus => (BinaryOp::Add, PREC_ADDITIVE),
        TokenKind::Minus => (BinaryOp::Sub, PREC_ADDITIVE),
        TokenKind::Multiply => (BinaryOp::Mul, PREC_MULTIPLICATIVE),
        TokenKind::Divide => (BinaryOp::Div, PREC_MULTIPLICATIVE),
        TokenKind::Mod => (BinaryOp::Mod, PREC_MULTIPLICATIVE),
        _ => return None,
    };
    Some(entry)
}

/// A parsed `type_spec`: arrays keep their size expressions until the
/// declaration is built.
enum TypeSpec {
    Scalar(Type),
    Array { element: Type, sizes: Vec<Expr> },
}

impl TypeSpec {
    fn ty(&self) -> Type {
        match self {
            TypeSpec::Scalar(ty) => ty.clone(),
            TypeSpec::Array { element, sizes } => Type::array_of(element.clone(), sizes.len()),
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(token) if token.kind == TokenKind::Eof) {
            let (line, column) = tokens
                .last()
                .map(|token| (token.line, token.column + token.lexeme.chars().count()))
                .unwrap_or((1, 1));
            tokens.push(Token::new(TokenKind::Eof, "", line, column));
        }
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos + 1).map(|token| &token.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: impl Into<String>) -> ParseError {
        let token = self.current();
        ParseError {
            expected: expected.into(),
            found: token.kind.to_string(),
            line: token.line,
            column: token.column,
        }
    }

    fn eat(&mut self, token_type: TokenKind) -> Result<Token, ParseError> {
        if mem::discriminant(&self.current().kind) == mem::discriminant(&token_type) {
            Ok(self.advance())
        } else {
            Err(self.error(token_type.to_string()))
        }
    }

    /// Runs `parse` one nesting level deeper, failing once the input nests
    /// past [`MAX_NESTING_DEPTH`].
    fn nested<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(what));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn identifier(&mut self, what: &str) -> Result<(String, usize, usize), ParseError> {
        if let TokenKind::Id(name) = &self.current().kind {
            let name = name.clone();
            let token = self.advance();
            Ok((name, token.line, token.column))
        } else {
            Err(self.error(what))
        }
    }

    /// `program : PROGRAM ID ';' declarations compound '.'`
    pub fn program(&mut self) -> Result<Program, ParseError> {
        self.eat(TokenKind::Program)?;
        let (name, _, _) = self.identifier("program name")?;
        self.eat(TokenKind::Semi)?;
        let declarations = self.declarations()?;
        let body = self.compound_statement()?;
        self.eat(TokenKind::Dot)?;
        if self.current().kind != TokenKind::Eof {
            return Err(self.error("end of input after '.'"));
        }
        Ok(Program {
            name,
            declarations,
            body,
        })
    }

    fn declarations(&mut self) -> Result<Vec<Declaration>, ParseError> {
        let mut declarations = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::Var => {
                    self.advance();
                    self.var_section(&mut declarations)?;
                }
                TokenKind::Function => {
                    declarations.push(Declaration::Function(self.function_declaration()?));
                }
                _ => break,
            }
        }
        Ok(declarations)
    }

    fn var_section(&mut self, out: &mut Vec<Declaration>) -> Result<(), ParseError> {
        loop {
            out.extend(self.variable_declaration()?);
            self.eat(TokenKind::Semi)?;
            if !matches!(self.current().kind, TokenKind::Id(_)) {
                return Ok(());
            }
        }
    }

    /// `var_decl : ID (',' ID)* ':' type_spec`
    fn variable_declaration(&mut self) -> Result<Vec<Declaration>, ParseError> {
        let mut names = vec![self.identifier("variable name")?];
        while self.current().kind == TokenKind::Comma {
            self.advance();
            names.push(self.identifier("variable name")?);
        }
        self.eat(TokenKind::Colon)?;
        let spec = self.type_spec()?;

        let declarations = names
            .into_iter()
            .map(|(name, line, column)| match &spec {
                TypeSpec::Scalar(ty) => Declaration::Var(VarDecl {
                    name,
                    ty: ty.clone(),
                    line,
                    column,
                }),
                TypeSpec::Array { element, sizes } => Declaration::Array(ArrayDecl {
                    name,
                    element: element.clone(),
                    sizes: sizes.clone(),
                    line,
                    column,
                }),
            })
            .collect();
        Ok(declarations)
    }

    fn scalar_type(&mut self) -> Option<Type> {
        let ty = match self.current().kind {
            TokenKind::IntegerType => Type::Integer,
            TokenKind::FloatType => Type::Float,
            TokenKind::StringType => Type::String,
            TokenKind::BooleanType => Type::Boolean,
            _ => return None,
        };
        self.advance();
        Some(ty)
    }

    fn type_spec(&mut self) -> Result<TypeSpec, ParseError> {
        if let Some(ty) = self.scalar_type() {
            return Ok(TypeSpec::Scalar(ty));
        }
        if self.current().kind != TokenKind::Array {
            return Err(self.error("type (INTEGER, FLOAT, STRING, BOOLEAN or ARRAY)"));
        }
        self.advance();
        self.eat(TokenKind::LBracket)?;
        let mut sizes = vec![self.expression()?];
        while self.current().kind == TokenKind::Comma {
            self.advance();
            sizes.push(self.expression()?);
        }
        self.eat(TokenKind::RBracket)?;
        self.eat(TokenKind::Of)?;

        match self.type_spec()? {
            TypeSpec::Scalar(element) => Ok(TypeSpec::Array { element, sizes }),
            TypeSpec::Array {
                element,
                sizes: inner,
            } => {
                sizes.extend(inner);
                Ok(TypeSpec::Array { element, sizes })
            }
        }
    }

    /// Parameter types carry no sizes: `ARRAY OF ARRAY OF INTEGER`.
    fn param_type(&mut self) -> Result<Type, ParseError> {
        if let Some(ty) = self.scalar_type() {
            return Ok(ty);
        }
        if self.current().kind != TokenKind::Array {
            return Err(self.error("parameter type"));
        }
        self.advance();
        self.eat(TokenKind::Of)?;
        Ok(Type::Array(Box::new(self.param_type()?)))
    }

    fn function_declaration(&mut self) -> Result<FunctionDecl, ParseError> {
        let token = self.eat(TokenKind::Function)?;
        let (name, _, _) = self.identifier("function name")?;

        self.eat(TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.current().kind != TokenKind::RParen {
            loop {
                let mut names = vec![self.identifier("parameter name")?];
                while self.current().kind == TokenKind::Comma {
                    self.advance();
                    names.push(self.identifier("parameter name")?);
                }
                self.eat(TokenKind::Colon)?;
                let ty = self.param_type()?;
                params.extend(names.into_iter().map(|(name, line, column)| Param {
                    name,
                    ty: ty.clone(),
                    line,
                    column,
                }));
                if self.current().kind != TokenKind::Semi {
                    break;
                }
                self.advance();
            }
        }
        self.eat(TokenKind::RParen)?;

        let return_type = if self.current().kind == TokenKind::Colon {
            self.advance();
            Some(self.type_spec()?.ty())
        } else {
            None
        };
        self.eat(TokenKind::Semi)?;

        let mut locals = Vec::new();
        if self.current().kind == TokenKind::Var {
            self.advance();
            self.var_section(&mut locals)?;
        }
        let body = self.compound_statement()?;
        self.eat(TokenKind::Semi)?;

        Ok(FunctionDecl {
            name,
            params,
            return_type,
            locals,
            body,
            line: token.line,
            column: token.column,
        })
    }

    fn compound_statement(&mut self) -> Result<Block, ParseError> {
        self.eat(TokenKind::Begin)?;
        let statements = self.statement_list()?;
        self.eat(TokenKind::End)?;
        Ok(Block { statements })
    }

    fn statement_list(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut results = vec![self.statement()?];

        while self.current().kind == TokenKind::Semi {
            self.eat(TokenKind::Semi)?;
            results.push(self.statement()?);
        }

        Ok(results)
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        self.nested("shallower statement", Self::statement_kind)
    }

    fn statement_kind(&mut self) -> Result<Stmt, ParseError> {
        match &self.current().kind {
            TokenKind::Begin => Ok(Stmt::Block(self.compound_statement()?)),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Write | TokenKind::Writeln => self.write_statement(),
            TokenKind::Read => self.read_statement(),
            TokenKind::Id(_) if self.peek_kind() == Some(&TokenKind::LParen) => {
                Ok(Stmt::Call(self.primary()?))
            }
            TokenKind::Id(_) => self.assignment(),
            _ => Ok(Stmt::NoOp),
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.eat(TokenKind::If)?;
        let condition = self.expression()?;
        self.eat(TokenKind::Then)?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.current().kind == TokenKind::Else {
            self.advance();
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.eat(TokenKind::While)?;
        let condition = self.expression()?;
        self.eat(TokenKind::Do)?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let token = self.eat(TokenKind::Return)?;
        let value = match self.current().kind {
            TokenKind::Semi | TokenKind::End | TokenKind::Else | TokenKind::Eof => None,
            _ => Some(self.expression()?),
        };
        Ok(Stmt::Return {
            value,
            line: token.line,
            column: token.column,
        })
    }

    fn write_statement(&mut self) -> Result<Stmt, ParseError> {
        let newline = self.advance().kind == TokenKind::Writeln;
        let mut args = Vec::new();
        if newline && self.current().kind != TokenKind::LParen {
            return Ok(Stmt::Write { args, newline });
        }
        self.eat(TokenKind::LParen)?;
        if !(newline && self.current().kind == TokenKind::RParen) {
            args.push(self.expression()?);
            while self.current().kind == TokenKind::Comma {
                self.advance();
                args.push(self.expression()?);
            }
        }
        self.eat(TokenKind::RParen)?;
        Ok(Stmt::Write { args, newline })
    }

    fn read_statement(&mut self) -> Result<Stmt, ParseError> {
        self.eat(TokenKind::Read)?;
        self.eat(TokenKind::LParen)?;
        let mut targets = vec![self.variable()?];
        while self.current().kind == TokenKind::Comma {
            self.advance();
            targets.push(self.variable()?);
        }
        self.eat(TokenKind::RParen)?;
        Ok(Stmt::Read { targets })
    }

    fn assignment(&mut self) -> Result<Stmt, ParseError> {
        let target = self.variable()?;
        self.eat(TokenKind::Assign)?;
        let value = self.expression()?;
        Ok(Stmt::Assign { target, value })
    }

    /// `variable : ID ('[' expr (',' expr)* ']')*`
    fn variable(&mut self) -> Result<Expr, ParseError> {
        let (name, line, column) = self.identifier("variable")?;
        let mut indices = Vec::new();
        while self.current().kind == TokenKind::LBracket {
            self.advance();
            indices.push(self.expression()?);
            while self.current().kind == TokenKind::Comma {
                self.advance();
                indices.push(self.expression()?);
            }
            self.eat(TokenKind::RBracket)?;
        }

        let kind = if indices.is_empty() {
            ExprKind::Identifier(name)
        } else {
            ExprKind::Index { name, indices }
        };
        Ok(Expr::new(kind, line, column))
    }

    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        self.expression_at(PREC_OR)
    }

    /// Precedence climbing over binary operators. A leading NOT binds looser
    /// than relational operators when the surrounding level allows it.
    fn expression_at(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        self.nested("shallower expression", |parser| parser.climb(min_prec))
    }

    fn climb(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = if self.current().kind == TokenKind::Not && min_prec <= PREC_NOT {
            let token = self.advance();
            let operand = self.expression_at(PREC_NOT)?;
            Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(operand),
                },
                token.line,
                token.column,
            )
        } else {
            self.unary()?
        };

        while let Some((op, prec)) = binary_operator(&self.current().kind) {
            if prec < min_prec {
                break;
            }
            let token = self.advance();
            let right = self.expression_at(prec + 1)?;
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                token.line,
                token.column,
            );
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current().kind {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.primary(),
        };
        let token = self.advance();
        let operand = self.nested("shallower expression", Self::unary)?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
            token.line,
            token.column,
        ))
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        let literal = |value| Expr::new(ExprKind::Literal(value), token.line, token.column);

        match &token.kind {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(literal(Literal::Integer(*value)))
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(literal(Literal::Float(*value)))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(literal(Literal::Str(value.clone())))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(literal(Literal::Boolean(token.kind == TokenKind::True)))
            }
            TokenKind::LParen => {
                self.advance();
                let node = self.expression()?;
                self.eat(TokenKind::RParen)?;
                Ok(node)
            }
            TokenKind::FloatType if self.peek_kind() == Some(&TokenKind::LParen) => {
                self.conversion(Conversion::Float)
            }
            TokenKind::Id(name) if self.peek_kind() == Some(&TokenKind::LParen) => {
                match Conversion::from_name(name) {
                    Some(conversion) => self.conversion(conversion),
                    None => self.call(),
                }
            }
            TokenKind::Id(_) => self.variable(),
            _ => Err(self.error("expression")),
        }
    }

    fn conversion(&mut self, conversion: Conversion) -> Result<Expr, ParseError> {
        let token = self.advance();
        self.eat(TokenKind::LParen)?;
        let expr = self.expression()?;
        self.eat(TokenKind::RParen)?;
        Ok(Expr::new(
            ExprKind::Convert {
                conversion,
                expr: Box::new(expr),
            },
            token.line,
            token.column,
        ))
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let (name, line, column) = self.identifier("function name")?;
        self.eat(TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.current().kind != TokenKind::RParen {
            args.push(self.expression()?);
            while self.current().kind == TokenKind::Comma {
                self.advance();
                args.push(self.expression()?);
            }
        }
        self.eat(TokenKind::RParen)?;
        Ok(Expr::new(ExprKind::Call { name, args }, line, column))
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).program()
}
