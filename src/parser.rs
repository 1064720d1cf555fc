// ABOUTME: Recursive-descent parser with precedence climbing over the token stream

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::error::ParseError;
use crate::token::{Token, TokenKind};
use log::trace;

const MAX_ARGS: usize = 255;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

type ExprResult = Result<Expr, ParseError>;
type StmtResult = Result<Stmt, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    pub fn parse(mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    // ---- token cursor helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::EndOfFile
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|k| self.check(*k)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(message.to_string(), self.peek().line))
        }
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    // ---- statements ----

    fn statement(&mut self) -> StmtResult {
        trace!("parsing statement starting with {:?}", self.peek().kind);
        match self.peek().kind {
            TokenKind::Print => self.print_statement(),
            TokenKind::Let => self.let_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Function => self.function_declaration(),
            TokenKind::LBrace => {
                self.advance();
                Ok(Stmt::Block(self.block()?))
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => self.prefix_update_statement(),
            TokenKind::Identifier if self.next_is_update_or_compound_assign() => {
                self.postfix_or_compound_statement()
            }
            _ => self.expression_statement(),
        }
    }

    /// One-token-past lookahead: an `Identifier` followed directly by
    /// `++ -- += -= *= /=` dispatches to the update/compound-assign rule
    /// instead of a general expression statement (spec §4.2, §9).
    fn next_is_update_or_compound_assign(&self) -> bool {
        matches!(
            self.peek_at(1).map(|t| t.kind),
            Some(
                TokenKind::PlusPlus
                    | TokenKind::MinusMinus
                    | TokenKind::PlusEqual
                    | TokenKind::MinusEqual
                    | TokenKind::StarEqual
                    | TokenKind::SlashEqual
            )
        )
    }

    fn prefix_update_statement(&mut self) -> StmtResult {
        let op = self.advance().clone();
        let name = self
            .consume(TokenKind::Identifier, "expected identifier after prefix update operator")?
            .clone();
        self.consume(TokenKind::Semicolon, "expected ';' after update statement")?;
        Ok(Stmt::Update {
            name,
            op,
            is_prefix: true,
        })
    }

    fn postfix_or_compound_statement(&mut self) -> StmtResult {
        let name = self.advance().clone();
        let op = self.advance().clone();
        let stmt = match op.kind {
            TokenKind::PlusPlus | TokenKind::MinusMinus => Stmt::Update {
                name,
                op,
                is_prefix: false,
            },
            _ => {
                let value = self.expression()?;
                Stmt::AssignUpdate { name, op, value }
            }
        };
        self.consume(TokenKind::Semicolon, "expected ';' after statement")?;
        Ok(stmt)
    }

    fn print_statement(&mut self) -> StmtResult {
        self.advance();
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "expected ';' after print statement")?;
        Ok(Stmt::Print(expr))
    }

    fn let_statement(&mut self) -> StmtResult {
        self.advance();
        let name = self
            .consume(TokenKind::Identifier, "expected variable name after 'let'")?
            .lexeme
            .clone();
        let initializer = if self.matches(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "expected ';' after variable declaration")?;
        Ok(Stmt::Let { name, initializer })
    }

    fn if_statement(&mut self) -> StmtResult {
        self.advance();
        self.consume(TokenKind::LParen, "expected '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RParen, "expected ')' after if condition")?;
        self.consume(TokenKind::LBrace, "expected '{' to start if branch")?;
        let then_branch = Box::new(Stmt::Block(self.block()?));
        let else_branch = if self.matches(&[TokenKind::Else]) {
            self.consume(TokenKind::LBrace, "expected '{' to start else branch")?;
            Some(Box::new(Stmt::Block(self.block()?)))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> StmtResult {
        self.advance();
        self.consume(TokenKind::LParen, "expected '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RParen, "expected ')' after while condition")?;
        self.consume(TokenKind::LBrace, "expected '{' to start while body")?;
        let body = Box::new(Stmt::Block(self.block()?));
        Ok(Stmt::While { condition, body })
    }

    fn return_statement(&mut self) -> StmtResult {
        let line = self.line();
        self.advance();
        let expr = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "expected ';' after return statement")?;
        Ok(Stmt::Return { expr, line })
    }

    fn function_declaration(&mut self) -> StmtResult {
        self.advance();
        let name = self
            .consume(TokenKind::Identifier, "expected function name")?
            .lexeme
            .clone();
        self.consume(TokenKind::LParen, "expected '(' after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    return Err(ParseError::new(
                        format!("too many parameters (limit is {MAX_ARGS})"),
                        self.line(),
                    ));
                }
                params.push(
                    self.consume(TokenKind::Identifier, "expected parameter name")?
                        .lexeme
                        .clone(),
                );
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected ')' after parameter list")?;
        self.consume(TokenKind::LBrace, "expected '{' to start function body")?;
        let body = self.block()?;
        Ok(Stmt::Function(FunctionDecl { name, params, body }))
    }

    fn expression_statement(&mut self) -> StmtResult {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "expected ';' after expression")?;
        Ok(Stmt::Expression(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.statement()?);
        }
        self.consume(TokenKind::RBrace, "expected '}' to close block")?;
        Ok(stmts)
    }

    // ---- expressions: precedence climbing, level 1 (lowest) to level 10 ----

    fn expression(&mut self) -> ExprResult {
        self.assignment()
    }

    fn assignment(&mut self) -> ExprResult {
        let expr = self.logical_or()?;
        if self.matches(&[TokenKind::Equal]) {
            let equals_line = self.previous().line;
            let value = self.assignment()?;
            if !matches!(expr, Expr::Variable(_)) {
                return Err(ParseError::new(
                    "invalid assignment target".to_string(),
                    equals_line,
                ));
            }
            let op = Token::new(TokenKind::Equal, "=", equals_line);
            return Ok(Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(value),
            });
        }
        Ok(expr)
    }

    fn logical_or(&mut self) -> ExprResult {
        let mut expr = self.logical_and()?;
        while self.matches(&[TokenKind::OrOr]) {
            let op = self.previous().clone();
            let right = self.logical_and()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn logical_and(&mut self) -> ExprResult {
        let mut expr = self.equality()?;
        while self.matches(&[TokenKind::AndAnd]) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ExprResult {
        let mut expr = self.comparison()?;
        while self.matches(&[TokenKind::EqualEqual, TokenKind::BangEqual]) {
            let op = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ExprResult {
        let mut expr = self.term()?;
        while self.matches(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let op = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> ExprResult {
        let mut expr = self.factor()?;
        while self.matches(&[TokenKind::Plus, TokenKind::Minus]) {
            let op = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ExprResult {
        let mut expr = self.unary()?;
        while self.matches(&[TokenKind::Star, TokenKind::Slash, TokenKind::Modulo]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ExprResult {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
            });
        }
        self.call()
    }

    fn call(&mut self) -> ExprResult {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&[TokenKind::LParen]) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&[TokenKind::LeftSquare]) {
                let index = self.expression()?;
                self.consume(TokenKind::RightSquare, "expected ']' after index expression")?;
                expr = Expr::Index {
                    array: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ExprResult {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    return Err(ParseError::new(
                        format!("too many arguments (limit is {MAX_ARGS})"),
                        self.line(),
                    ));
                }
                args.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected ')' after arguments")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
        })
    }

    fn primary(&mut self) -> ExprResult {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let n: f64 = tok.lexeme.parse().map_err(|_| {
                    ParseError::new(format!("invalid number literal '{}'", tok.lexeme), tok.line)
                })?;
                Ok(Expr::Number(n))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::String(tok.lexeme))
            }
            TokenKind::Boolean => {
                self.advance();
                Ok(Expr::Boolean(tok.lexeme == "True"))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Variable(tok.lexeme))
            }
            TokenKind::LeftSquare => {
                self.advance();
                let mut elems = Vec::new();
                if !self.check(TokenKind::RightSquare) {
                    loop {
                        elems.push(self.expression()?);
                        if !self.matches(&[TokenKind::Comma]) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightSquare, "expected ']' after array elements")?;
                Ok(Expr::Array(elems))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.consume(TokenKind::RParen, "expected ')' after expression")?;
                Ok(Expr::Grouping(Box::new(inner)))
            }
            _ => Err(ParseError::new(
                format!("unexpected token '{}'", tok.lexeme),
                tok.line,
            )),
        }
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, ParseError> {
    Parser::new(tokens).parse()
}
