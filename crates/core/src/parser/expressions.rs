use super::{describe, Parser};
use crate::ast::{CompareOp, Dictionary, Expression, LogicalOp, MathOp};
use crate::error::ParseError;
use crate::lexer::Token;

const KEYWORDS: [&str; 4] = ["function", "if", "else", "return"];

impl<'a> Parser<'a> {
    // -- Binary operators, loosest first ------------------------

    pub(super) fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and()?;
        while self.peek() == &Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::logical(left, LogicalOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == &Token::And {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expression::logical(left, LogicalOp::And, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => CompareOp::Equal,
                Token::Neq => CompareOp::NotEqual,
                Token::Lt => CompareOp::LessThan,
                Token::Lte => CompareOp::LessThanOrEqual,
                Token::Gt => CompareOp::GreaterThan,
                Token::Gte => CompareOp::GreaterThanOrEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expression::compare(left, op, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => MathOp::Add,
                Token::Minus => MathOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::math(left, op, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => MathOp::Multiply,
                Token::Slash => MathOp::Divide,
                Token::Percent => MathOp::Modulus,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::math(left, op, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(match self.parse_unary()? {
                    Expression::Integer(n) => Expression::Integer(-n),
                    Expression::Float(f) => Expression::Float(-f),
                    other => Expression::math(Expression::Integer(0), MathOp::Subtract, other),
                })
            }
            Token::Not => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expression::Not(Box::new(operand)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.peek() == &Token::LBracket {
            self.advance();
            let key = self.parse_expression()?;
            self.expect(Token::RBracket, "]")?;
            expr = Expression::Index {
                target: Box::new(expr),
                key: Box::new(key),
            };
        }
        Ok(expr)
    }

    // -- Primaries -------------------------------------------------

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.peek().clone() {
            Token::Int(n) => {
                self.advance();
                Ok(Expression::Integer(n))
            }
            Token::Float(s) => {
                let value: f64 = s
                    .parse()
                    .map_err(|_| self.err(format!("Invalid number '{}'", s)))?;
                self.advance();
                Ok(Expression::Float(value))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expression::String(s))
            }
            Token::Word(w) if w == "true" || w == "false" => {
                self.advance();
                Ok(Expression::Boolean(w == "true"))
            }
            Token::Word(w) if KEYWORDS.contains(&w.as_str()) => {
                Err(self.err(format!("Unexpected '{}'", w)))
            }
            Token::Word(w) => {
                self.advance();
                if self.peek() == &Token::LParen {
                    self.advance();
                    let args = self.parse_call_args()?;
                    Ok(Expression::FunctionCall { name: w, args })
                } else {
                    Ok(Expression::Variable(w))
                }
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Token::RParen, ")")?;
                Ok(inner)
            }
            Token::LBrace => self.parse_dictionary(),
            other => Err(self.err(format!("Unexpected {}", describe(&other)))),
        }
    }

    /// Arguments after the opening paren. `name = value` becomes a named
    /// argument rather than an assignment.
    fn parse_call_args(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut args = Vec::new();
        if self.peek() == &Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            let arg = if matches!(self.peek(), Token::Word(_)) && self.peek_at(1) == &Token::Assign
            {
                let name = self.take_word()?;
                self.advance(); // consume '='
                let value = self.parse_expression()?;
                Expression::Assignment {
                    target: Box::new(Expression::Variable(name)),
                    value: Box::new(value),
                }
            } else {
                self.parse_expression()?
            };
            args.push(arg);
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RParen => {
                    self.advance();
                    return Ok(args);
                }
                other => {
                    return Err(self.err(format!("Expected ',' or ')', found {}", describe(other))))
                }
            }
        }
    }

    fn parse_dictionary(&mut self) -> Result<Expression, ParseError> {
        self.expect(Token::LBrace, "{")?;
        let mut entries = Vec::new();
        while self.peek() != &Token::RBrace {
            let key = self.parse_expression()?;
            self.expect(Token::Colon, ":")?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if self.peek() == &Token::Comma {
                self.advance();
            } else if self.peek() != &Token::RBrace {
                return Err(self.err(format!(
                    "Expected ',' or '}}', found {}",
                    describe(self.peek())
                )));
            }
        }
        self.advance();
        Ok(Expression::Dictionary(Dictionary::new(entries)))
    }
}
