//! Recursive-descent expression parser.

use super::ast::{Ast, BinaryOp, Lit, UnaryOp};
use super::lexer::{Lexer, Token, TokenType};
use super::ExprError;

pub struct Parser {
    lexer: Lexer,
}

impl Parser {
    pub fn new() -> Self {
        Parser { lexer: Lexer::new() }
    }

    /// Parse an expression or `;`-separated statement chain.
    pub fn parse(&self, text: &str) -> Result<Ast, ExprError> {
        let tokens = self.lexer.tokenize(text);
        if let Some(error) = tokens.iter().find(|t| t.is_error()) {
            return Err(ExprError::new(format!(
                "{} in '{}'",
                error.str_value, text
            )));
        }
        let mut state = ParseState {
            tokens,
            index: 0,
            text: text.to_string(),
        };
        if state.at_end() {
            return Ok(Ast::Empty);
        }
        let ast = state.parse_chain()?;
        if !state.at_end() {
            return Err(state.unexpected("end of expression"));
        }
        Ok(ast)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

struct ParseState {
    tokens: Vec<Token>,
    index: usize,
    text: String,
}

impl ParseState {
    fn at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn next(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn unexpected(&self, expected: &str) -> ExprError {
        match self.next() {
            Some(t) => ExprError::new(format!(
                "expected {expected}, found '{}' in '{}'",
                t.str_value, self.text
            )),
            None => ExprError::new(format!(
                "expected {expected}, found end of '{}'",
                self.text
            )),
        }
    }

    fn eat_character(&mut self, c: char) -> bool {
        if self.next().map(|t| t.is_character(c)).unwrap_or(false) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_character(&mut self, c: char) -> Result<(), ExprError> {
        if self.eat_character(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{c}'")))
        }
    }

    fn eat_operator(&mut self, op: &str) -> bool {
        if self.next().map(|t| t.is_operator(op)).unwrap_or(false) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.next().map(|t| t.is_keyword(word)).unwrap_or(false) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_chain(&mut self) -> Result<Ast, ExprError> {
        let mut statements = vec![self.parse_statement()?];
        while self.eat_character(';') {
            if self.at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
        }
        if statements.len() == 1 {
            Ok(statements.pop().expect("one statement"))
        } else {
            Ok(Ast::Chain(statements))
        }
    }

    /// One statement: a conditional expression, possibly promoted to a
    /// write when followed by `=`.
    fn parse_statement(&mut self) -> Result<Ast, ExprError> {
        let target = self.parse_conditional()?;
        if self.eat_operator("=") {
            let value = Box::new(self.parse_statement()?);
            return match target {
                Ast::PropertyRead { receiver, name, safe: false } => Ok(Ast::PropertyWrite {
                    receiver,
                    name,
                    value,
                }),
                Ast::KeyedRead { receiver, key, safe: false } => Ok(Ast::KeyedWrite {
                    receiver,
                    key,
                    value,
                }),
                _ => Err(ExprError::new(format!(
                    "invalid assignment target in '{}'",
                    self.text
                ))),
            };
        }
        Ok(target)
    }

    fn parse_conditional(&mut self) -> Result<Ast, ExprError> {
        let condition = self.parse_nullish()?;
        if self.eat_character('?') {
            let true_expr = Box::new(self.parse_statement()?);
            self.expect_character(':')?;
            let false_expr = Box::new(self.parse_statement()?);
            return Ok(Ast::Conditional {
                condition: Box::new(condition),
                true_expr,
                false_expr,
            });
        }
        Ok(condition)
    }

    fn parse_nullish(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_logical_or()?;
        while self.eat_operator("??") {
            let right = self.parse_logical_or()?;
            left = Ast::Binary {
                op: BinaryOp::Nullish,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_logical_and()?;
        while self.eat_operator("||") {
            let right = self.parse_logical_and()?;
            left = Ast::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_equality()?;
        while self.eat_operator("&&") {
            let right = self.parse_equality()?;
            left = Ast::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = if self.eat_operator("===") {
                BinaryOp::StrictEq
            } else if self.eat_operator("!==") {
                BinaryOp::StrictNe
            } else if self.eat_operator("==") {
                BinaryOp::Eq
            } else if self.eat_operator("!=") {
                BinaryOp::Ne
            } else {
                return Ok(left);
            };
            let right = self.parse_relational()?;
            left = Ast::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_relational(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.eat_operator("<=") {
                BinaryOp::Le
            } else if self.eat_operator(">=") {
                BinaryOp::Ge
            } else if self.eat_operator("<") {
                BinaryOp::Lt
            } else if self.eat_operator(">") {
                BinaryOp::Gt
            } else if self.eat_keyword("in") {
                BinaryOp::In
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = Ast::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_additive(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_operator("+") {
                BinaryOp::Add
            } else if self.eat_operator("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplicative()?;
            left = Ast::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Ast, ExprError> {
        let mut left = self.parse_prefix()?;
        loop {
            let op = if self.eat_operator("*") {
                BinaryOp::Mul
            } else if self.eat_operator("/") {
                BinaryOp::Div
            } else if self.eat_operator("%") {
                BinaryOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.parse_prefix()?;
            left = Ast::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_prefix(&mut self) -> Result<Ast, ExprError> {
        if self.eat_operator("!") {
            return Ok(Ast::PrefixNot(Box::new(self.parse_prefix()?)));
        }
        if self.eat_operator("-") {
            return Ok(Ast::Unary {
                op: UnaryOp::Minus,
                expr: Box::new(self.parse_prefix()?),
            });
        }
        if self.eat_operator("+") {
            return Ok(Ast::Unary {
                op: UnaryOp::Plus,
                expr: Box::new(self.parse_prefix()?),
            });
        }
        if self.eat_keyword("typeof") {
            return Ok(Ast::TypeofExpression(Box::new(self.parse_prefix()?)));
        }
        self.parse_call_chain()
    }

    fn parse_call_chain(&mut self) -> Result<Ast, ExprError> {
        let mut receiver = self.parse_primary()?;
        loop {
            if self.eat_character('.') {
                let name = self.expect_identifier()?;
                receiver = Ast::PropertyRead {
                    receiver: Box::new(receiver),
                    name,
                    safe: false,
                };
            } else if self.eat_operator("?.") {
                if self.eat_character('[') {
                    let key = Box::new(self.parse_statement()?);
                    self.expect_character(']')?;
                    receiver = Ast::KeyedRead {
                        receiver: Box::new(receiver),
                        key,
                        safe: true,
                    };
                } else {
                    let name = self.expect_identifier()?;
                    receiver = Ast::PropertyRead {
                        receiver: Box::new(receiver),
                        name,
                        safe: true,
                    };
                }
            } else if self.eat_character('[') {
                let key = Box::new(self.parse_statement()?);
                self.expect_character(']')?;
                receiver = Ast::KeyedRead {
                    receiver: Box::new(receiver),
                    key,
                    safe: false,
                };
            } else if self.eat_character('(') {
                let mut args = Vec::new();
                if !self.eat_character(')') {
                    loop {
                        args.push(self.parse_statement()?);
                        if self.eat_character(',') {
                            continue;
                        }
                        self.expect_character(')')?;
                        break;
                    }
                }
                receiver = Ast::Call {
                    callee: Box::new(receiver),
                    args,
                };
            } else {
                return Ok(receiver);
            }
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ExprError> {
        match self.next() {
            Some(t) if t.is_identifier() => {
                let name = t.str_value.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn parse_primary(&mut self) -> Result<Ast, ExprError> {
        let token = match self.next() {
            Some(t) => t.clone(),
            None => return Err(self.unexpected("expression")),
        };

        match token.token_type {
            TokenType::Number => {
                self.advance();
                Ok(Ast::Literal(Lit::Number(token.num_value)))
            }
            TokenType::String => {
                self.advance();
                Ok(Ast::Literal(Lit::String(token.str_value)))
            }
            TokenType::Identifier => {
                self.advance();
                Ok(Ast::PropertyRead {
                    receiver: Box::new(Ast::ImplicitReceiver),
                    name: token.str_value,
                    safe: false,
                })
            }
            TokenType::Keyword => {
                self.advance();
                match token.str_value.as_str() {
                    "true" => Ok(Ast::Literal(Lit::Bool(true))),
                    "false" => Ok(Ast::Literal(Lit::Bool(false))),
                    "null" => Ok(Ast::Literal(Lit::Null)),
                    "undefined" => Ok(Ast::Literal(Lit::Undefined)),
                    other => Err(ExprError::new(format!(
                        "unexpected keyword '{other}' in '{}'",
                        self.text
                    ))),
                }
            }
            TokenType::Character if token.is_character('(') => {
                self.advance();
                let inner = self.parse_statement()?;
                self.expect_character(')')?;
                Ok(inner)
            }
            TokenType::Character if token.is_character('[') => {
                self.advance();
                let mut items = Vec::new();
                if !self.eat_character(']') {
                    loop {
                        items.push(self.parse_statement()?);
                        if self.eat_character(',') {
                            continue;
                        }
                        self.expect_character(']')?;
                        break;
                    }
                }
                Ok(Ast::LiteralArray(items))
            }
            TokenType::Character if token.is_character('{') => {
                self.advance();
                let mut entries = Vec::new();
                if !self.eat_character('}') {
                    loop {
                        let key = match self.next() {
                            Some(t) if t.is_identifier() || t.is_string() => {
                                let k = t.str_value.clone();
                                self.advance();
                                k
                            }
                            Some(t) if t.is_number() => {
                                let k = crate::value_ops::format_number(t.num_value);
                                self.advance();
                                k
                            }
                            _ => return Err(self.unexpected("map key")),
                        };
                        self.expect_character(':')?;
                        entries.push((key, self.parse_statement()?));
                        if self.eat_character(',') {
                            continue;
                        }
                        self.expect_character('}')?;
                        break;
                    }
                }
                Ok(Ast::LiteralMap(entries))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}
