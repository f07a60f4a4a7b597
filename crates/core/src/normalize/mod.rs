//! Comparison normalization.
//!
//! A comparison produced inside a trigger is rewritten into the shape
//! the requirement builder can emit: constants gathered on one side,
//! modifiers on a lone term folded into the constant, subtraction
//! arranged so the unsigned evaluation agrees with signed math, and
//! comparisons decidable from the value ranges of their terms reported
//! as errors.

mod factor;
mod linear;
mod underflow;

pub use linear::{linearize, rebuild, Addend, LinearSide, Number};

use crate::ast::{CompareOp, Expression};
use crate::error::{ErrorKind, ParseError, Result};

pub(crate) fn never_true(message: &str) -> ParseError {
    ParseError::new(ErrorKind::NeverTrue, message)
}

pub(crate) fn always_true(message: &str) -> ParseError {
    ParseError::new(ErrorKind::AlwaysTrue, message)
}

/// Normalize `left op right`. Operands that are not arithmetic over
/// numbers and memory reads are returned untouched.
pub fn normalize_comparison(
    left: Expression,
    op: CompareOp,
    right: Expression,
) -> Result<Expression> {
    if !is_arithmetic(&left) || !is_arithmetic(&right) {
        return Ok(Expression::compare(left, op, right));
    }

    let result = rewrite(linearize(&left), op, linearize(&right))?;
    let original = Expression::compare(left, op, right);
    if result != original {
        log::debug!("normalized '{}' to '{}'", original, result);
    }
    Ok(result)
}

fn is_arithmetic(expr: &Expression) -> bool {
    match expr {
        Expression::Integer(_) | Expression::Float(_) | Expression::Memory(_) => true,
        Expression::Mathematic { left, right, .. } => is_arithmetic(left) && is_arithmetic(right),
        _ => false,
    }
}

fn rewrite(mut left: LinearSide, op: CompareOp, mut right: LinearSide) -> Result<Expression> {
    cancel(&mut left, &mut right);

    if left.addends.is_empty() && right.addends.is_empty() {
        return Ok(Expression::Boolean(
            op.holds(left.constant.as_f64(), right.constant.as_f64()),
        ));
    }
    if left.addends.is_empty() {
        return rewrite(right, op.reverse(), left);
    }

    if let ([a], [b]) = (left.addends.as_slice(), right.addends.as_slice()) {
        if !a.negative && !b.negative && left.constant.sub(right.constant).is_zero() {
            if let Some((x, y)) = factor::shared_modifier(&a.expr, &b.expr) {
                return rewrite(
                    LinearSide {
                        addends: vec![Addend::new(false, x)],
                        constant: left.constant,
                    },
                    op,
                    LinearSide {
                        addends: vec![Addend::new(false, y)],
                        constant: right.constant,
                    },
                );
            }
        }
    }

    if right.addends.is_empty() && left.addends.len() == 1 {
        let c = right.constant.sub(left.constant);
        let term = &left.addends[0];
        return if term.negative {
            factor::single(&term.expr, op.reverse(), c.neg())
        } else {
            factor::single(&term.expr, op, c)
        };
    }

    if op.is_equality() {
        equality(left, op, right)
    } else {
        underflow::ordered(left, op, right)
    }
}

/// Drop `+t`/`-t` pairs within a side, then terms that appear with the
/// same sign on both sides.
fn cancel(left: &mut LinearSide, right: &mut LinearSide) {
    cancel_opposites(left);
    cancel_opposites(right);

    let mut i = 0;
    while i < left.addends.len() {
        match right.addends.iter().position(|r| *r == left.addends[i]) {
            Some(j) => {
                left.addends.remove(i);
                right.addends.remove(j);
            }
            None => i += 1,
        }
    }
}

fn cancel_opposites(side: &mut LinearSide) {
    let mut i = 0;
    while i < side.addends.len() {
        let a = &side.addends[i];
        let opposite = side.addends[i + 1..]
            .iter()
            .position(|b| b.expr == a.expr && b.negative != a.negative);
        match opposite {
            Some(j) => {
                side.addends.remove(i + 1 + j);
                side.addends.remove(i);
            }
            None => i += 1,
        }
    }
}

/// Only a plain read can stand alone on the right of a requirement.
fn is_read(expr: &Expression) -> bool {
    matches!(expr, Expression::Memory(_))
}

fn equality(left: LinearSide, op: CompareOp, right: LinearSide) -> Result<Expression> {
    let k = left.constant.sub(right.constant);
    let mut moved = left.addends;

    let mut rest = right.addends;
    if let Some(i) = rest.iter().position(|a| !a.negative && is_read(&a.expr)) {
        let anchor = rest.remove(i);
        moved.extend(rest.into_iter().map(Addend::negated));
        return Ok(Expression::compare(rebuild(moved, k), op, anchor.expr));
    }

    // no plain read on the right: gather everything on the left
    moved.extend(rest.into_iter().map(Addend::negated));
    let c = k.neg();
    if moved.len() == 1 {
        let term = moved.remove(0);
        return if term.negative {
            factor::single(&term.expr, op.reverse(), c.neg())
        } else {
            factor::single(&term.expr, op, c)
        };
    }

    let negatives = moved.iter().filter(|a| a.negative).count();
    if negatives == 0 && moved.iter().all(|a| factor::is_integer_term(&a.expr)) {
        let max = moved.iter().try_fold(0u64, |acc, a| {
            factor::term_max(&a.expr).and_then(|m| acc.checked_add(m))
        });
        let (op, c) = factor::integerize(op, c, max)?;
        return Ok(Expression::compare(
            rebuild(moved, Number::ZERO),
            op,
            Expression::Integer(c),
        ));
    }
    let subtracted_read = moved.iter().position(|a| a.negative && is_read(&a.expr));
    if let (1, Some(i), false) = (negatives, subtracted_read, c.is_positive()) {
        let subtracted = moved.remove(i);
        return Ok(Expression::compare(
            rebuild(moved, c.neg()),
            op,
            subtracted.expr,
        ));
    }
    if c.is_negative() {
        return Ok(Expression::compare(
            rebuild(moved, c.neg()),
            op,
            Expression::Integer(0),
        ));
    }
    Ok(Expression::compare(
        rebuild(moved, Number::ZERO),
        op,
        c.to_expression(),
    ))
}
