//! Comparisons of a single term against a constant, and the modifiers
//! that can be moved from the term onto the constant.

use super::linear::Number;
use super::{always_true, never_true};
use crate::ast::{CompareOp, Expression, MathOp};
use crate::error::{ParseError, Result};
use crate::requirement::FieldSize;

/// Largest value a term can take, when known.
pub fn term_max(expr: &Expression) -> Option<u64> {
    match expr {
        Expression::Memory(acc) if acc.bcd => acc.size.max_bcd_value(),
        Expression::Memory(acc) => acc.size.max_value(),
        Expression::Mathematic { left, op, right } => {
            let max = term_max(left)?;
            match (op, Number::from_expression(right)) {
                (MathOp::Multiply, Some(Number::Int(k))) if k > 0 => max.checked_mul(k as u64),
                (MathOp::Multiply, Some(Number::Float(k))) if k > 0.0 => {
                    Some((max as f64 * k).floor() as u64)
                }
                (MathOp::Divide, Some(Number::Int(k))) if k > 0 => Some(max / k as u64),
                (MathOp::Divide, Some(Number::Float(k))) if k > 0.0 => {
                    Some((max as f64 / k).floor() as u64)
                }
                (MathOp::Multiply, None) => max.checked_mul(term_max(right)?),
                (MathOp::Divide | MathOp::Modulus, None) => Some(max),
                (MathOp::Modulus, Some(Number::Int(k))) if k > 0 => Some(max.min(k as u64 - 1)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// True when the term can only produce integers.
pub fn is_integer_term(expr: &Expression) -> bool {
    match expr {
        Expression::Integer(_) => true,
        Expression::Memory(acc) => acc.size != FieldSize::Float,
        Expression::Mathematic { left, right, .. } => {
            is_integer_term(left) && is_integer_term(right)
        }
        _ => false,
    }
}

fn involves_float(expr: &Expression) -> bool {
    match expr {
        Expression::Float(_) => true,
        Expression::Memory(acc) => acc.size == FieldSize::Float,
        Expression::Mathematic { left, right, .. } => involves_float(left) || involves_float(right),
        _ => false,
    }
}

/// Resolve an integer term against a possibly fractional threshold.
///
/// A fractional threshold makes `==` impossible and `!=` certain; ordered
/// operators move to the enclosing integer boundary. Thresholds outside
/// `0..=max` decide the comparison outright.
pub fn integerize(op: CompareOp, c: Number, max: Option<u64>) -> Result<(CompareOp, i64)> {
    let (op, c) = match c.integral() {
        Some(n) => (op, n),
        None => {
            let floor = c.as_f64().floor() as i64;
            match op {
                CompareOp::Equal => {
                    return Err(never_true("Result can never be true using integer math"))
                }
                CompareOp::NotEqual => {
                    return Err(always_true("Result is always true using integer math"))
                }
                CompareOp::LessThan | CompareOp::LessThanOrEqual => {
                    (CompareOp::LessThanOrEqual, floor)
                }
                CompareOp::GreaterThan | CompareOp::GreaterThanOrEqual => {
                    (CompareOp::GreaterThan, floor)
                }
            }
        }
    };

    let never = || Err(never_true("Expression can never be true"));
    let always = || Err(always_true("Expression is always true"));

    if c < 0 {
        return match op {
            CompareOp::Equal | CompareOp::LessThan | CompareOp::LessThanOrEqual => never(),
            _ => always(),
        };
    }
    match op {
        CompareOp::LessThan if c == 0 => return never(),
        CompareOp::GreaterThanOrEqual if c == 0 => return always(),
        _ => {}
    }

    if let Some(max) = max {
        let c = c as u64;
        match op {
            CompareOp::Equal if c > max => return never(),
            CompareOp::NotEqual if c > max => return always(),
            CompareOp::GreaterThan if c >= max => return never(),
            CompareOp::GreaterThanOrEqual if c > max => return never(),
            CompareOp::LessThan if c > max => return always(),
            CompareOp::LessThanOrEqual if c >= max => return always(),
            _ => {}
        }
    }
    Ok((op, c))
}

/// Raw value whose BCD decoding is `n`.
fn encode_bcd(mut n: i64) -> i64 {
    let mut raw = 0i64;
    let mut shift = 0;
    while n > 0 {
        raw |= (n % 10) << shift;
        n /= 10;
        shift += 4;
    }
    raw
}

/// Rewrite `term op c` so the term carries as few modifiers as possible.
pub fn single(term: &Expression, op: CompareOp, c: Number) -> Result<Expression> {
    match term {
        Expression::Mathematic {
            left,
            op: MathOp::Multiply,
            right,
        } if left.is_numeric() || right.is_numeric() => {
            let (inner, k) = match Number::from_expression(right) {
                Some(k) => (left, k),
                None => (right, Number::from_expression(left).unwrap_or(Number::Int(1))),
            };
            if k.is_zero() {
                return Ok(Expression::Boolean(op.holds(0.0, c.as_f64())));
            }
            let op = if k.is_negative() { op.reverse() } else { op };
            single(inner, op, c.div(k))
        }

        Expression::Mathematic {
            left,
            op: MathOp::Divide,
            right,
        } if right.is_numeric() => {
            let k = Number::from_expression(right).unwrap_or(Number::Int(1));
            if k.is_zero() {
                return Err(ParseError::runtime("Division by zero"));
            }
            if k.is_negative() {
                let op = op.reverse();
                return single(left, op, c.mul(k));
            }
            match k {
                Number::Int(d) if is_integer_term(left) => {
                    let (op, c) = integerize(op, c, term_max(term))?;
                    let bound = match op {
                        CompareOp::LessThan | CompareOp::GreaterThanOrEqual => c.saturating_mul(d),
                        CompareOp::LessThanOrEqual | CompareOp::GreaterThan => {
                            c.saturating_mul(d).saturating_add(d - 1)
                        }
                        // floor(x / d) == c holds for a range of x
                        CompareOp::Equal | CompareOp::NotEqual
                            if matches!(**left, Expression::Memory(_)) =>
                        {
                            return Ok(Expression::compare(term.clone(), op, Expression::Integer(c)))
                        }
                        CompareOp::Equal | CompareOp::NotEqual => {
                            return single(left, op, Number::Int(c.saturating_mul(d)))
                        }
                    };
                    single(left, op, Number::Int(bound))
                }
                _ => single(left, op, c.mul(k)),
            }
        }

        // x / t < f  ~>  x / f < t, keeping the division in floating point
        Expression::Mathematic {
            left,
            op: MathOp::Divide,
            right,
        } if matches!(**left, Expression::Memory(_))
            && c.is_positive()
            && (c.is_float() || involves_float(term)) =>
        {
            Ok(Expression::compare(
                Expression::math((**left).clone(), MathOp::Divide, c.to_expression()),
                op,
                (**right).clone(),
            ))
        }

        Expression::Memory(acc) if acc.bcd => {
            let (op, c) = integerize(op, c, acc.size.max_bcd_value())?;
            Ok(Expression::compare(
                Expression::Memory(acc.raw()),
                op,
                Expression::Integer(encode_bcd(c)),
            ))
        }

        Expression::Memory(acc) if acc.size == FieldSize::Float => {
            Ok(Expression::compare(term.clone(), op, c.to_expression()))
        }

        _ if is_integer_term(term) => {
            let (op, c) = integerize(op, c, term_max(term))?;
            Ok(Expression::compare(term.clone(), op, Expression::Integer(c)))
        }

        _ => Ok(Expression::compare(term.clone(), op, c.to_expression())),
    }
}

/// When both sides apply the same modifier, return them without it.
pub fn shared_modifier(a: &Expression, b: &Expression) -> Option<(Expression, Expression)> {
    match (a, b) {
        (Expression::Memory(x), Expression::Memory(y)) if x.bcd && y.bcd => {
            Some((Expression::Memory(x.raw()), Expression::Memory(y.raw())))
        }
        (
            Expression::Mathematic {
                left: x,
                op: MathOp::Multiply,
                right: kx,
            },
            Expression::Mathematic {
                left: y,
                op: MathOp::Multiply,
                right: ky,
            },
        ) if kx == ky && Number::from_expression(kx).is_some_and(Number::is_positive) => {
            Some(((**x).clone(), (**y).clone()))
        }
        _ => None,
    }
}
