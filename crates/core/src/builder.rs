//! Lowering of trigger expressions to requirement groups.
//!
//! The expression is first resolved in a trigger scope, which normalizes
//! every comparison. The top-level `&&` chain becomes the core group and a
//! single `||` clause becomes the alt groups. Each comparison is emitted as
//! a run of accumulator requirements (AddSource/SubSource, with AddAddress
//! chains for pointer reads) ending in one Standard comparison.

use crate::ast::{CompareOp, Expression, LogicalOp, MathOp, MemoryAccessor};
use crate::error::{ParseError, Result};
use crate::normalize::{linearize, Number};
use crate::requirement::{
    Field, MemoryKind, Requirement, RequirementGroup, RequirementOperator,
    RequirementType, Trigger,
};
use crate::scope::{EvaluationContext, InterpreterScope};

/// Resolve `expr` as a trigger and lower it to requirements.
pub fn build_trigger(expr: &Expression, scope: &mut InterpreterScope) -> Result<Trigger> {
    let normalized = normalize_trigger(expr, scope)?;
    lower_trigger(&normalized)
}

/// Resolve `expr` in a trigger scope without lowering it.
pub fn normalize_trigger(expr: &Expression, scope: &mut InterpreterScope) -> Result<Expression> {
    let mut trigger_scope = scope.with_context(EvaluationContext::Trigger);
    expr.replace_variables(&mut trigger_scope)
}

/// Lower an already-normalized trigger expression.
pub fn lower_trigger(expr: &Expression) -> Result<Trigger> {
    let mut clauses = Vec::new();
    flatten(expr, LogicalOp::And, &mut clauses);

    let mut trigger = Trigger::default();
    let mut seen_alts = false;
    for clause in clauses {
        if let Expression::Logical {
            op: LogicalOp::Or, ..
        } = clause
        {
            if seen_alts {
                return Err(ParseError::semantic(
                    "Only one alt group clause is supported",
                ));
            }
            seen_alts = true;

            let mut branches = Vec::new();
            flatten(clause, LogicalOp::Or, &mut branches);
            for branch in branches {
                let mut parts = Vec::new();
                flatten(branch, LogicalOp::And, &mut parts);
                let mut group = RequirementGroup::default();
                for part in parts {
                    condition(part, &mut group.requirements)?;
                }
                trigger.alts.push(group);
            }
            continue;
        }
        condition(clause, &mut trigger.core.requirements)?;
    }

    log::trace!(
        "lowered trigger to {} core and {} alt group(s)",
        trigger.core.requirements.len(),
        trigger.alts.len()
    );
    Ok(trigger)
}

fn flatten<'a>(expr: &'a Expression, op: LogicalOp, out: &mut Vec<&'a Expression>) {
    match expr {
        Expression::Logical { left, op: o, right } if *o == op => {
            flatten(left, op, out);
            flatten(right, op, out);
        }
        other => out.push(other),
    }
}

fn unrepresentable(expr: &Expression) -> ParseError {
    ParseError::semantic(format!("Cannot represent {} in a trigger", expr))
}

// ──────────────────────────────────────────────
// Conditions
// ──────────────────────────────────────────────

fn condition(expr: &Expression, reqs: &mut Vec<Requirement>) -> Result<()> {
    match expr {
        Expression::Comparison { left, op, right } => comparison(left, *op, right, reqs),
        Expression::Boolean(value) => {
            reqs.push(constant_condition(*value));
            Ok(())
        }
        Expression::Logical {
            left,
            op: LogicalOp::And,
            right,
        } => {
            condition(left, reqs)?;
            if let Some(last) = reqs.last_mut() {
                last.requirement_type = RequirementType::AndNext;
            }
            condition(right, reqs)
        }
        Expression::FunctionCall { name, args } => flag(expr, name, args, reqs),
        other => Err(unrepresentable(other)),
    }
}

fn constant_condition(value: bool) -> Requirement {
    Requirement::compare(
        Field::value(0),
        RequirementOperator::Equal,
        Field::value(if value { 0 } else { 1 }),
    )
}

/// Trigger flag functions: they wrap a condition and adjust the last
/// requirement it produced.
fn flag(
    call: &Expression,
    name: &str,
    args: &[Expression],
    reqs: &mut Vec<Requirement>,
) -> Result<()> {
    match (name, args) {
        ("always_true", []) => reqs.push(constant_condition(true)),
        ("always_false", []) => reqs.push(constant_condition(false)),
        ("once", [inner]) => {
            condition(inner, reqs)?;
            set_last(reqs, |r| r.hit_target = 1);
        }
        ("repeated", [count, inner]) => {
            let hits = match count {
                Expression::Integer(n) if *n > 0 && *n <= u32::MAX as i64 => *n as u32,
                other => {
                    return Err(ParseError::semantic(format!(
                        "repeated count must be a positive integer, got {}",
                        other
                    )))
                }
            };
            condition(inner, reqs)?;
            set_last(reqs, |r| r.hit_target = hits);
        }
        ("never", [inner]) => {
            condition(inner, reqs)?;
            set_last(reqs, |r| r.requirement_type = RequirementType::ResetIf);
        }
        ("unless", [inner]) => {
            condition(inner, reqs)?;
            set_last(reqs, |r| r.requirement_type = RequirementType::PauseIf);
        }
        _ => return Err(unrepresentable(call)),
    }
    Ok(())
}

fn set_last(reqs: &mut [Requirement], apply: impl FnOnce(&mut Requirement)) {
    if let Some(last) = reqs.last_mut() {
        apply(last);
    }
}

// ──────────────────────────────────────────────
// Operands
// ──────────────────────────────────────────────

/// A field plus the AddAddress chain that must precede it.
#[derive(Debug, Clone)]
struct Operand {
    field: Field,
    chain: Vec<Requirement>,
    /// Expression the address is offset from, for pointer reads.
    pointer: Option<Expression>,
}

impl Operand {
    fn plain(field: Field) -> Self {
        Operand {
            field,
            chain: Vec::new(),
            pointer: None,
        }
    }
}

fn memory_operand(acc: &MemoryAccessor) -> Result<Operand> {
    if acc.previous && acc.bcd {
        return Err(ParseError::semantic(format!(
            "Cannot read both the previous and BCD value of {}",
            acc
        )));
    }
    let kind = if acc.previous {
        MemoryKind::Previous
    } else if acc.bcd {
        MemoryKind::Bcd
    } else {
        MemoryKind::Current
    };

    let (pointer, offset) = match acc.address.as_ref() {
        Expression::Integer(n) => (None, *n),
        ptr @ Expression::Memory(_) => (Some(ptr), 0),
        Expression::Mathematic {
            left,
            op: MathOp::Add,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (ptr @ Expression::Memory(_), Expression::Integer(n))
            | (Expression::Integer(n), ptr @ Expression::Memory(_)) => (Some(ptr), *n),
            _ => return Err(bad_address(acc)),
        },
        _ => return Err(bad_address(acc)),
    };
    let address = u32::try_from(offset).map_err(|_| bad_address(acc))?;

    let mut chain = Vec::new();
    if let Some(Expression::Memory(inner)) = pointer {
        let inner = memory_operand(inner)?;
        chain.extend(inner.chain);
        chain.push(Requirement::modifier(
            RequirementType::AddAddress,
            inner.field,
        ));
    }

    Ok(Operand {
        field: Field::memory(kind, acc.size, address),
        chain,
        pointer: pointer.cloned(),
    })
}

fn bad_address(acc: &MemoryAccessor) -> ParseError {
    ParseError::semantic(format!("Cannot represent address of {} in a trigger", acc))
}

/// A constant or memory read that fits in a single field.
fn plain_operand(expr: &Expression) -> Option<Result<Operand>> {
    match expr {
        Expression::Integer(n) => u32::try_from(*n)
            .ok()
            .map(|v| Ok(Operand::plain(Field::value(v)))),
        Expression::Float(f) => Some(Ok(Operand::plain(Field::Float { value: *f }))),
        Expression::Memory(acc) => Some(memory_operand(acc)),
        _ => None,
    }
}

/// One accumulated term of the left side.
struct Term {
    negative: bool,
    operand: Operand,
    modifier: Option<(RequirementOperator, Field)>,
}

fn term(negative: bool, expr: &Expression) -> Result<Term> {
    match expr {
        Expression::Memory(acc) => Ok(Term {
            negative,
            operand: memory_operand(acc)?,
            modifier: None,
        }),
        Expression::Mathematic {
            left,
            op: op @ (MathOp::Multiply | MathOp::Divide),
            right,
        } => {
            let Expression::Memory(acc) = left.as_ref() else {
                return Err(unrepresentable(expr));
            };
            let operand = memory_operand(acc)?;
            let factor = plain_operand(right).ok_or_else(|| unrepresentable(expr))??;
            if factor.field.is_memory() && factor.pointer != operand.pointer {
                return Err(unrepresentable(expr));
            }
            let operator = if *op == MathOp::Multiply {
                RequirementOperator::Multiply
            } else {
                RequirementOperator::Divide
            };
            Ok(Term {
                negative,
                operand,
                modifier: Some((operator, factor.field)),
            })
        }
        other => Err(unrepresentable(other)),
    }
}

fn compare_operator(op: CompareOp) -> RequirementOperator {
    match op {
        CompareOp::Equal => RequirementOperator::Equal,
        CompareOp::NotEqual => RequirementOperator::NotEqual,
        CompareOp::LessThan => RequirementOperator::LessThan,
        CompareOp::LessThanOrEqual => RequirementOperator::LessThanOrEqual,
        CompareOp::GreaterThan => RequirementOperator::GreaterThan,
        CompareOp::GreaterThanOrEqual => RequirementOperator::GreaterThanOrEqual,
    }
}

fn constant_requirement(c: Number) -> Result<Requirement> {
    let (kind, magnitude) = if c.is_negative() {
        (RequirementType::SubSource, c.neg())
    } else {
        (RequirementType::AddSource, c)
    };
    let field = match magnitude {
        Number::Int(n) => Field::value(
            u32::try_from(n)
                .map_err(|_| ParseError::semantic(format!("Constant {} is out of range", c)))?,
        ),
        Number::Float(f) => Field::Float { value: f },
    };
    Ok(Requirement::modifier(kind, field))
}

// ──────────────────────────────────────────────
// Comparisons
// ──────────────────────────────────────────────

fn comparison(
    left: &Expression,
    op: CompareOp,
    right: &Expression,
    reqs: &mut Vec<Requirement>,
) -> Result<()> {
    let (left, op, right) = match plain_operand(right) {
        Some(r) => (left, op, r?),
        None => match plain_operand(left) {
            Some(l) => (right, op.reverse(), l?),
            None => return Err(unrepresentable(&Expression::compare(left.clone(), op, right.clone()))),
        },
    };

    let side = linearize(left);
    let mut terms = side
        .addends
        .iter()
        .map(|a| term(a.negative, &a.expr))
        .collect::<Result<Vec<_>>>()?;

    // The last plain positive read that shares the right side's pointer
    // is compared directly; everything else accumulates into it.
    let compatible = |t: &Term| {
        !t.negative
            && t.modifier.is_none()
            && (!right.field.is_memory() || t.operand.pointer == right.pointer)
    };
    let compared = terms
        .iter()
        .rposition(compatible)
        .map(|i| terms.remove(i).operand);

    let compared = match (compared, side.constant) {
        (Some(operand), c) => {
            if !c.is_zero() {
                reqs.push(constant_requirement(c)?);
            }
            operand
        }
        (None, Number::Int(n)) if terms.is_empty() && n >= 0 => {
            Operand::plain(Field::value(u32::try_from(n).map_err(|_| unrepresentable(left))?))
        }
        (None, c) => {
            if !c.is_zero() {
                reqs.push(constant_requirement(c)?);
            }
            Operand {
                chain: right.chain.clone(),
                ..Operand::plain(Field::value(0))
            }
        }
    };

    for t in terms {
        reqs.extend(t.operand.chain);
        let requirement_type = if t.negative {
            RequirementType::SubSource
        } else {
            RequirementType::AddSource
        };
        let mut req = Requirement::modifier(requirement_type, t.operand.field);
        if let Some((operator, factor)) = t.modifier {
            req.operator = operator;
            req.right = Some(factor);
        }
        reqs.push(req);
    }

    reqs.extend(compared.chain);
    reqs.push(Requirement::compare(
        compared.field,
        compare_operator(op),
        right.field,
    ));
    Ok(())
}
