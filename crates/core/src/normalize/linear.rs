//! Sums of terms: flattening `+`/`-` chains and rebuilding them.

use crate::ast::{Expression, MathOp};
use std::fmt;

/// A folded numeric constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

const INTEGRAL_EPSILON: f64 = 1e-9;

impl Number {
    pub const ZERO: Number = Number::Int(0);

    pub fn from_expression(e: &Expression) -> Option<Number> {
        match e {
            Expression::Integer(n) => Some(Number::Int(*n)),
            Expression::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    pub fn to_expression(self) -> Expression {
        match self {
            Number::Int(n) => Expression::Integer(n),
            Number::Float(f) => Expression::Float(f),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    /// The integer value, when the number is integral. Floats within a
    /// rounding error of an integer count as integral.
    pub fn integral(self) -> Option<i64> {
        match self {
            Number::Int(n) => Some(n),
            Number::Float(f) if (f - f.round()).abs() < INTEGRAL_EPSILON => Some(f.round() as i64),
            Number::Float(_) => None,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    pub fn is_negative(self) -> bool {
        self.as_f64() < 0.0
    }

    pub fn is_positive(self) -> bool {
        self.as_f64() > 0.0
    }

    pub fn is_float(self) -> bool {
        matches!(self, Number::Float(_))
    }

    pub fn neg(self) -> Number {
        match self {
            Number::Int(n) => Number::Int(-n),
            Number::Float(f) => Number::Float(-f),
        }
    }

    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.saturating_add(b)),
            _ => Number::Float(self.as_f64() + other.as_f64()),
        }
    }

    pub fn sub(self, other: Number) -> Number {
        self.add(other.neg())
    }

    pub fn mul(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.saturating_mul(b)),
            _ => Number::Float(self.as_f64() * other.as_f64()),
        }
    }

    /// Exact quotient: stays integral only when the division is exact.
    /// `other` must be non-zero.
    pub fn div(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) if b != 0 && a % b == 0 => Number::Int(a / b),
            _ => Number::Float(self.as_f64() / other.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expression())
    }
}

/// One term of a sum, with its sign.
#[derive(Debug, Clone, PartialEq)]
pub struct Addend {
    pub negative: bool,
    pub expr: Expression,
}

impl Addend {
    pub fn new(negative: bool, expr: Expression) -> Self {
        Addend { negative, expr }
    }

    pub fn negated(self) -> Addend {
        Addend {
            negative: !self.negative,
            expr: self.expr,
        }
    }
}

/// A side of a comparison as `Σ ±term + constant`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSide {
    pub addends: Vec<Addend>,
    pub constant: Number,
}

impl LinearSide {
    pub fn has_subtraction(&self) -> bool {
        self.addends.iter().any(|a| a.negative)
    }
}

/// Flatten `+`/`-` chains into signed addends and one folded constant.
/// Constant factors collect into one coefficient per term, and distribute
/// over parenthesized sums. A constant divisor distributes the same way
/// when the dividend is a sum or a scaled term; a plain read divided by a
/// constant stays whole so it keeps integer division.
pub fn linearize(expr: &Expression) -> LinearSide {
    let mut side = LinearSide {
        addends: Vec::new(),
        constant: Number::ZERO,
    };
    collect(expr, Number::Int(1), &mut side);
    side
}

/// Add `coefficient * expr` to `side`.
fn collect(expr: &Expression, coefficient: Number, side: &mut LinearSide) {
    if let Some(n) = Number::from_expression(expr) {
        side.constant = side.constant.add(coefficient.mul(n));
        return;
    }

    match expr {
        Expression::Mathematic {
            left,
            op: MathOp::Add,
            right,
        } => {
            collect(left, coefficient, side);
            collect(right, coefficient, side);
        }
        Expression::Mathematic {
            left,
            op: MathOp::Subtract,
            right,
        } => {
            collect(left, coefficient, side);
            collect(right, coefficient.neg(), side);
        }
        Expression::Mathematic {
            left,
            op: MathOp::Multiply,
            right,
        } => match (Number::from_expression(left), Number::from_expression(right)) {
            (Some(k), None) => collect(right, coefficient.mul(k), side),
            (None, Some(k)) => collect(left, coefficient.mul(k), side),
            _ => push(expr, coefficient, side),
        },
        Expression::Mathematic {
            left,
            op: MathOp::Divide,
            right,
        } if distributes(left) => match Number::from_expression(right) {
            Some(k) if !k.is_zero() => collect(left, coefficient.div(k), side),
            _ => push(expr, coefficient, side),
        },
        _ => push(expr, coefficient, side),
    }
}

fn push(expr: &Expression, coefficient: Number, side: &mut LinearSide) {
    if coefficient.is_zero() {
        return;
    }
    let negative = coefficient.is_negative();
    let magnitude = if negative { coefficient.neg() } else { coefficient };
    side.addends
        .push(Addend::new(negative, scale(expr.clone(), magnitude)));
}

/// Dividends a constant divisor can be spread across.
fn distributes(e: &Expression) -> bool {
    match e {
        Expression::Mathematic {
            op: MathOp::Add | MathOp::Subtract,
            ..
        } => true,
        Expression::Mathematic {
            left,
            op: MathOp::Multiply,
            right,
        } => left.is_numeric() || right.is_numeric(),
        Expression::Mathematic {
            left,
            op: MathOp::Divide,
            right,
        } => right.is_numeric() && distributes(left),
        _ => false,
    }
}

fn scale(expr: Expression, factor: Number) -> Expression {
    if factor.as_f64() == 1.0 {
        expr
    } else {
        Expression::math(expr, MathOp::Multiply, factor.to_expression())
    }
}

/// Rebuild `Σ ±term + constant`. A leading subtraction is avoided by
/// moving the first positive term to the front; the constant goes last.
pub fn rebuild(mut addends: Vec<Addend>, constant: Number) -> Expression {
    if addends.first().is_some_and(|a| a.negative) {
        if let Some(i) = addends.iter().position(|a| !a.negative) {
            let first = addends.remove(i);
            addends.insert(0, first);
        }
    }

    let mut expr: Option<Expression> = None;
    for a in addends {
        let op = if a.negative {
            MathOp::Subtract
        } else {
            MathOp::Add
        };
        expr = Some(match expr {
            None if !a.negative => a.expr,
            None => Expression::math(Expression::Integer(0), op, a.expr),
            Some(e) => Expression::math(e, op, a.expr),
        });
    }

    match expr {
        None => constant.to_expression(),
        Some(e) if constant.is_zero() => e,
        Some(e) if constant.is_negative() => {
            Expression::math(e, MathOp::Subtract, constant.neg().to_expression())
        }
        Some(e) => Expression::math(e, MathOp::Add, constant.to_expression()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn side(src: &str) -> LinearSide {
        linearize(&parse(src).unwrap())
    }

    #[test]
    fn flattens_and_folds_constants() {
        let s = side("0 + a - 9 + b - 2");
        assert_eq!(s.constant, Number::Int(-11));
        let names: Vec<_> = s
            .addends
            .iter()
            .map(|a| (a.negative, a.expr.to_string()))
            .collect();
        assert_eq!(names, vec![(false, "a".into()), (false, "b".into())]);
    }

    #[test]
    fn subtraction_of_group_flips_signs() {
        let s = side("a - (b - c + 1)");
        let signs: Vec<_> = s.addends.iter().map(|a| a.negative).collect();
        assert_eq!(signs, vec![false, true, false]);
        assert_eq!(s.constant, Number::Int(-1));
    }

    #[test]
    fn constant_multiplier_distributes() {
        let s = side("(a - 1) * 10");
        assert_eq!(s.addends[0].expr.to_string(), "a * 10");
        assert_eq!(s.constant, Number::Int(-10));
        let s = side("3 * a");
        assert_eq!(s.addends[0].expr.to_string(), "a * 3");
    }

    #[test]
    fn nested_factors_collect_into_one_coefficient() {
        let s = side("2 * a * 10");
        assert_eq!(s.addends[0].expr.to_string(), "a * 20");
        let s = side("a * 10 / 2");
        assert_eq!(s.addends[0].expr.to_string(), "a * 5");
        let s = side("4 - a * 2");
        assert!(s.addends[0].negative);
        assert_eq!(s.addends[0].expr.to_string(), "a * 2");
        assert_eq!(s.constant, Number::Int(4));
    }

    #[test]
    fn constant_divisor_distributes_over_sums() {
        let s = side("(a - 1) / 10");
        assert_eq!(s.addends[0].expr.to_string(), "a * 0.1");
        assert_eq!(s.constant, Number::Float(-0.1));
        // a lone read keeps its integer division
        let s = side("a / 10");
        assert_eq!(s.addends[0].expr.to_string(), "a / 10");
    }

    #[test]
    fn rebuild_avoids_leading_subtraction() {
        let s = side("0 - a + b - 5");
        assert_eq!(rebuild(s.addends, s.constant).to_string(), "b - a - 5");
    }

    #[test]
    fn exact_division_stays_integral() {
        assert_eq!(Number::Int(100).div(Number::Int(10)), Number::Int(10));
        assert_eq!(Number::Int(99).div(Number::Int(10)), Number::Float(9.9));
        assert_eq!(Number::Float(6.6).div(Number::Float(2.2)).integral(), Some(3));
    }
}
