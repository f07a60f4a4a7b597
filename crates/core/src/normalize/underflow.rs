//! Ordered comparisons between sums of memory reads.
//!
//! Requirements are evaluated with unsigned arithmetic, so a sum that
//! dips below zero wraps around instead of going negative. The rewrites
//! here keep each side of an ordered comparison non-negative: a single
//! subtracted term is moved across the operator, and anything else gets a
//! constant large enough to cover the worst-case subtraction. That
//! constant has to fit in 32 bits alongside the added terms.

use super::factor::{integerize, is_integer_term, single, term_max};
use super::linear::{rebuild, Addend, LinearSide, Number};
use super::{always_true, never_true};
use crate::ast::{CompareOp, Expression};
use crate::error::{ParseError, Result};

pub fn ordered(left: LinearSide, op: CompareOp, right: LinearSide) -> Result<Expression> {
    let k = left.constant.sub(right.constant);

    let mut positive = Vec::new();
    let mut negative = Vec::new();
    for a in &left.addends {
        if a.negative {
            negative.push(a.expr.clone());
        } else {
            positive.push(a.expr.clone());
        }
    }
    for a in &right.addends {
        if a.negative {
            positive.push(a.expr.clone());
        } else {
            negative.push(a.expr.clone());
        }
    }

    if negative.is_empty() {
        return bounded(positive, op, k.neg());
    }
    if positive.is_empty() {
        return bounded(negative, op.reverse(), k);
    }

    let lower = matches!(op, CompareOp::LessThan | CompareOp::LessThanOrEqual);
    if !(lower && left.has_subtraction()) {
        if let Some(moved) = move_across(&positive, op, &negative, k) {
            return Ok(moved);
        }
    }

    compensate(left, op, right, k, &positive, &negative)
}

/// Leave one read alone on the right so neither side subtracts. Only a
/// plain read can be compared there directly.
fn move_across(
    positive: &[Expression],
    op: CompareOp,
    negative: &[Expression],
    k: Number,
) -> Option<Expression> {
    match (positive, negative) {
        (_, [lone @ Expression::Memory(_)]) if !k.is_negative() => Some(Expression::compare(
            rebuild(plus(positive.to_vec()), k),
            op,
            lone.clone(),
        )),
        ([lone @ Expression::Memory(_)], _) if !k.is_positive() => Some(Expression::compare(
            rebuild(plus(negative.to_vec()), k.neg()),
            op.reverse(),
            lone.clone(),
        )),
        _ => None,
    }
}

fn plus(terms: Vec<Expression>) -> Vec<Addend> {
    terms.into_iter().map(|e| Addend::new(false, e)).collect()
}

/// `Σ terms op c` with every term non-negative.
fn bounded(terms: Vec<Expression>, op: CompareOp, c: Number) -> Result<Expression> {
    if terms.len() == 1 {
        return single(&terms[0], op, c);
    }
    if terms.iter().all(is_integer_term) {
        let max = terms
            .iter()
            .try_fold(0u64, |acc, t| term_max(t).and_then(|m| acc.checked_add(m)));
        let (op, c) = integerize(op, c, max)?;
        return Ok(Expression::compare(
            rebuild(plus(terms), Number::ZERO),
            op,
            Expression::Integer(c),
        ));
    }
    Ok(Expression::compare(
        rebuild(plus(terms), Number::ZERO),
        op,
        c.to_expression(),
    ))
}

/// Largest total the subtracted terms can reach, when every one of them
/// is an integer read with a known range.
fn underflow_bound(terms: &[Addend]) -> Option<u64> {
    terms
        .iter()
        .filter(|a| a.negative)
        .try_fold(0u64, |acc, a| {
            if !is_integer_term(&a.expr) {
                return None;
            }
            acc.checked_add(term_max(&a.expr)?)
        })
}

fn compensate(
    left: LinearSide,
    op: CompareOp,
    right: LinearSide,
    k: Number,
    positive: &[Expression],
    negative: &[Expression],
) -> Result<Expression> {
    let mut terms = left.addends;
    terms.extend(right.addends.into_iter().map(Addend::negated));

    let bound = underflow_bound(&terms).filter(|&u| u > 0);
    let Some(u) = bound.and_then(|u| i64::try_from(u).ok()) else {
        return Ok(Expression::compare(
            rebuild(terms, Number::ZERO),
            op,
            k.neg().to_expression(),
        ));
    };

    // the compensated sum must not wrap either
    let total = positive
        .iter()
        .try_fold(u as u64, |acc, t| term_max(t).and_then(|m| acc.checked_add(m)));
    if !total.is_some_and(|t| t <= u64::from(u32::MAX)) {
        return uncompensated(op, k, positive, negative, u as u64);
    }

    let offset = Number::Int(u);
    let threshold = offset.sub(k);
    if threshold.is_negative() || (threshold.is_zero() && op == CompareOp::LessThan) {
        return match op {
            CompareOp::LessThan | CompareOp::LessThanOrEqual => {
                Err(never_true("Expression can never be true"))
            }
            _ => Err(always_true("Expression is always true")),
        };
    }
    Ok(Expression::compare(
        rebuild(terms, offset),
        op,
        threshold.to_expression(),
    ))
}

/// A sum too wide to compensate can still be compared when a single read
/// is added: the subtracted terms move across, where they cannot wrap.
fn uncompensated(
    op: CompareOp,
    k: Number,
    positive: &[Expression],
    negative: &[Expression],
    u: u64,
) -> Result<Expression> {
    if let [lone @ Expression::Memory(_)] = positive {
        let fits = k
            .neg()
            .integral()
            .and_then(|c| u64::try_from(c).ok())
            .and_then(|c| c.checked_add(u))
            .is_some_and(|t| t <= u64::from(u32::MAX));
        if fits {
            return Ok(Expression::compare(
                rebuild(plus(negative.to_vec()), k.neg()),
                op.reverse(),
                lone.clone(),
            ));
        }
    }
    Err(ParseError::semantic(format!(
        "Underflow adjustment of {} cannot be expressed in 32 bits",
        u
    )))
}
