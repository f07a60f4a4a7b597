use super::{describe, Parser};
use crate::ast::Expression;
use crate::error::ParseError;
use crate::functions::{FunctionDefinition, FunctionKind, Parameter};
use crate::lexer::Token;
use std::rc::Rc;

impl<'a> Parser<'a> {
    pub(super) fn parse_statement(&mut self) -> Result<Expression, ParseError> {
        if self.is_word("function") {
            return self.parse_function_definition();
        }
        if self.is_word("if") {
            return self.parse_if();
        }
        if self.is_word("return") {
            self.advance();
            let value = self.parse_expression()?;
            return Ok(Expression::Return(Box::new(value)));
        }

        let expr = self.parse_expression()?;
        if self.peek() != &Token::Assign {
            return Ok(expr);
        }
        if !matches!(expr, Expression::Variable(_) | Expression::Index { .. }) {
            return Err(self.err(format!("Cannot assign to {}", expr)));
        }
        self.advance();
        let value = self.parse_expression()?;
        Ok(Expression::Assignment {
            target: Box::new(expr),
            value: Box::new(value),
        })
    }

    /// A `{ }` block, or a single statement.
    fn parse_block(&mut self) -> Result<Vec<Expression>, ParseError> {
        if self.peek() != &Token::LBrace {
            return Ok(vec![self.parse_statement()?]);
        }
        self.advance();
        let mut statements = Vec::new();
        while self.peek() != &Token::RBrace {
            if self.peek() == &Token::Eof {
                return Err(self.err("Expected '}', found end of input"));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance();
        Ok(statements)
    }

    fn parse_if(&mut self) -> Result<Expression, ParseError> {
        self.advance(); // 'if'
        self.expect(Token::LParen, "(")?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen, ")")?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.is_word("else") {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Expression::Conditional {
            condition: Box::new(condition),
            then_branch,
            else_branch,
        })
    }

    fn parse_function_definition(&mut self) -> Result<Expression, ParseError> {
        self.advance(); // 'function'
        let name = self.take_word()?;
        self.expect(Token::LParen, "(")?;

        let mut parameters: Vec<Parameter> = Vec::new();
        while self.peek() != &Token::RParen {
            let param = self.take_word()?;
            if parameters.iter().any(|p| p.name == param) {
                return Err(self.err(format!("Duplicate parameter '{}'", param)));
            }
            let default = if self.peek() == &Token::Assign {
                self.advance();
                Some(self.parse_expression()?)
            } else {
                None
            };
            parameters.push(Parameter {
                name: param,
                default,
            });
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RParen => {}
                other => {
                    return Err(self.err(format!("Expected ',' or ')', found {}", describe(other))))
                }
            }
        }
        self.advance();

        let body = match self.peek() {
            Token::Arrow => {
                self.advance();
                let value = self.parse_expression()?;
                vec![Expression::Return(Box::new(value))]
            }
            Token::LBrace => self.parse_block()?,
            other => {
                return Err(self.err(format!(
                    "Expected '=>' or '{{', found {}",
                    describe(other)
                )))
            }
        };

        Ok(Expression::FunctionDefinition(Rc::new(FunctionDefinition {
            name,
            parameters,
            kind: FunctionKind::UserDefined(body),
        })))
    }
}
