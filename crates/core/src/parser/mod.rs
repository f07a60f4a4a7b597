//! Recursive-descent parser producing [`Expression`] trees.
//!
//! Syntax errors carry the line and column of the offending token. No
//! partial tree is returned on error.

use crate::ast::{Expression, Script, Statement};
use crate::error::{ParseError, Position};
use crate::lexer::{lex, Spanned, Token};

mod expressions;
mod statements;

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[i].token
    }

    fn position(&self) -> Position {
        let s = self.cur();
        Position {
            line: s.line,
            column: s.column,
        }
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: Token, shown: &str) -> Result<(), ParseError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("Expected '{}', found {}", shown, describe(self.peek()))))
        }
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        let s = self.cur();
        ParseError::syntax(s.line, s.column, msg)
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn take_word(&mut self) -> Result<String, ParseError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!(
                "Expected identifier, found {}",
                describe(self.peek())
            )))
        }
    }
}

/// Human-readable token description for error messages.
fn describe(token: &Token) -> String {
    match token {
        Token::Word(w) => format!("'{}'", w),
        Token::Str(s) => format!("\"{}\"", s),
        Token::Int(n) => n.to_string(),
        Token::Float(f) => f.clone(),
        Token::LBrace => "'{'".into(),
        Token::RBrace => "'}'".into(),
        Token::LBracket => "'['".into(),
        Token::RBracket => "']'".into(),
        Token::LParen => "'('".into(),
        Token::RParen => "')'".into(),
        Token::Colon => "':'".into(),
        Token::Comma => "','".into(),
        Token::Eq => "'=='".into(),
        Token::Neq => "'!='".into(),
        Token::Lt => "'<'".into(),
        Token::Lte => "'<='".into(),
        Token::Gt => "'>'".into(),
        Token::Gte => "'>='".into(),
        Token::Plus => "'+'".into(),
        Token::Minus => "'-'".into(),
        Token::Star => "'*'".into(),
        Token::Slash => "'/'".into(),
        Token::Percent => "'%'".into(),
        Token::And => "'&&'".into(),
        Token::Or => "'||'".into(),
        Token::Not => "'!'".into(),
        Token::Assign => "'='".into(),
        Token::Arrow => "'=>'".into(),
        Token::Eof => "end of input".into(),
    }
}

// ──────────────────────────────────────────────
// Entry points
// ──────────────────────────────────────────────

/// Parse a single statement or expression.
pub fn parse(text: &str) -> Result<Expression, ParseError> {
    let tokens = lex(text)?;
    let mut p = Parser::new(&tokens);
    let expr = p.parse_statement()?;
    if p.peek() != &Token::Eof {
        return Err(p.err(format!("Unexpected {}", describe(p.peek()))));
    }
    Ok(expr)
}

/// Parse a whole script into its top-level statements.
pub fn parse_script(text: &str) -> Result<Script, ParseError> {
    let tokens = lex(text)?;
    let mut p = Parser::new(&tokens);
    let mut statements = Vec::new();
    while p.peek() != &Token::Eof {
        let position = p.position();
        let expression = p.parse_statement()?;
        statements.push(Statement {
            expression,
            position,
        });
    }
    Ok(Script { statements })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOp, LogicalOp, MathOp};

    fn show(src: &str) -> String {
        parse(src).unwrap().to_string()
    }

    #[test]
    fn arithmetic_precedence() {
        let e = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            e,
            Expression::math(
                Expression::Integer(1),
                MathOp::Add,
                Expression::math(Expression::Integer(2), MathOp::Multiply, Expression::Integer(3))
            )
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let e = parse("1 - 2 - 3").unwrap();
        assert_eq!(
            e,
            Expression::math(
                Expression::math(Expression::Integer(1), MathOp::Subtract, Expression::Integer(2)),
                MathOp::Subtract,
                Expression::Integer(3)
            )
        );
    }

    #[test]
    fn logical_binds_looser_than_comparison() {
        let e = parse("a == 1 || b < 2 && c").unwrap();
        let Expression::Logical { op, right, .. } = e else {
            panic!("expected logical");
        };
        assert_eq!(op, LogicalOp::Or);
        assert!(matches!(
            *right,
            Expression::Logical {
                op: LogicalOp::And,
                ..
            }
        ));
    }

    #[test]
    fn comparison_operands() {
        let e = parse("byte(0x10) + 1 >= 3").unwrap();
        let Expression::Comparison { left, op, right } = e else {
            panic!("expected comparison");
        };
        assert_eq!(op, CompareOp::GreaterThanOrEqual);
        assert_eq!(left.to_string(), "byte(16) + 1");
        assert_eq!(*right, Expression::Integer(3));
    }

    #[test]
    fn unary_minus_on_literals_and_terms() {
        assert_eq!(parse("-2.0").unwrap(), Expression::Float(-2.0));
        assert_eq!(parse("-3").unwrap(), Expression::Integer(-3));
        assert_eq!(show("-byte(1)"), "0 - byte(1)");
        assert_eq!(show("4 - -3"), "4 - -3");
    }

    #[test]
    fn named_arguments_become_assignments() {
        let e = parse("func(1, j = 2)").unwrap();
        let Expression::FunctionCall { name, args } = e else {
            panic!("expected call");
        };
        assert_eq!(name, "func");
        assert!(matches!(args[1], Expression::Assignment { .. }));
    }

    #[test]
    fn dictionary_literal_and_index() {
        assert_eq!(show("{1: \"a\", 2: \"b\"}"), "{1: \"a\", 2: \"b\"}");
        assert_eq!(show("d[1] = 3"), "d[1] = 3");
        assert_eq!(show("d[1][2]"), "d[1][2]");
    }

    #[test]
    fn function_definitions() {
        assert_eq!(show("function f(a, b = 2) => a + b"), "function f(a, b)");
        let Expression::FunctionDefinition(def) =
            parse("function f(i) { if (i < 3) return 4 else return 8 }").unwrap()
        else {
            panic!("expected function");
        };
        let crate::functions::FunctionKind::UserDefined(body) = &def.kind else {
            panic!("expected user function");
        };
        assert_eq!(body.len(), 1);
        assert!(matches!(body[0], Expression::Conditional { .. }));
    }

    #[test]
    fn script_records_statement_positions() {
        let script = parse_script("a = 1\n\n  b = a + 1\nfunction f() => 3").unwrap();
        let lines: Vec<_> = script
            .statements
            .iter()
            .map(|s| (s.position.line, s.position.column))
            .collect();
        assert_eq!(lines, vec![(1, 1), (3, 3), (4, 1)]);
    }

    #[test]
    fn errors_carry_position() {
        let err = parse("byte(1) +").unwrap_err();
        assert_eq!(err.message, "Unexpected end of input");
        let err = parse("func(1,").unwrap_err();
        assert_eq!(err.position, Some(Position { line: 1, column: 8 }));
        let err = parse_script("a = (1 + 2").unwrap_err();
        assert_eq!(err.message, "Expected ')', found end of input");
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse("1 2").unwrap_err();
        assert_eq!(err.message, "Unexpected 2");
    }
}
