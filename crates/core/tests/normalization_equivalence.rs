//! Normalized comparisons must agree with the original comparison.
//!
//! The original is evaluated with signed 64-bit math; the normalized form
//! is evaluated the way requirements are, with wrapping 32-bit unsigned
//! math. Every read takes each value from a sample set bounded by its
//! width, so wide reads are exercised at their maximum too.

use std::collections::BTreeMap;
use trigscript_core::{
    normalize_comparison, parse, CompareOp, Environment, ErrorKind, Expression, MathOp,
};

/// Each distinct read with the largest value it can hold.
fn reads(expr: &Expression, out: &mut Vec<(String, i64)>) {
    match expr {
        Expression::Memory(acc) => {
            let key = acc.to_string();
            if !out.iter().any(|(k, _)| *k == key) {
                let max = acc.size.max_value().unwrap_or(u64::from(u32::MAX));
                out.push((key, max as i64));
            }
        }
        Expression::Mathematic { left, right, .. } | Expression::Comparison { left, right, .. } => {
            reads(left, out);
            reads(right, out);
        }
        _ => {}
    }
}

fn divides(expr: &Expression) -> bool {
    match expr {
        Expression::Mathematic { left, op, right } => {
            *op == MathOp::Divide || divides(left) || divides(right)
        }
        _ => false,
    }
}

/// Zero is left out when a read may end up as a divisor.
fn samples(max: i64, division: bool) -> Vec<i64> {
    let low = if division { 1 } else { 0 };
    let mut out: Vec<i64> = [low, 1, 10, 100, max]
        .into_iter()
        .filter(|&s| s <= max)
        .collect();
    out.dedup();
    out
}

fn signed(expr: &Expression, values: &BTreeMap<String, i64>) -> i64 {
    match expr {
        Expression::Integer(n) => *n,
        Expression::Memory(acc) => values[&acc.to_string()],
        Expression::Mathematic { left, op, right } => {
            let (l, r) = (signed(left, values), signed(right, values));
            match op {
                MathOp::Add => l + r,
                MathOp::Subtract => l - r,
                MathOp::Multiply => l * r,
                MathOp::Divide => l / r,
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {}", other),
    }
}

fn unsigned(expr: &Expression, values: &BTreeMap<String, i64>) -> u32 {
    match expr {
        Expression::Integer(n) => *n as u32,
        Expression::Memory(acc) => values[&acc.to_string()] as u32,
        Expression::Mathematic { left, op, right } => {
            let (l, r) = (unsigned(left, values), unsigned(right, values));
            match op {
                MathOp::Add => l.wrapping_add(r),
                MathOp::Subtract => l.wrapping_sub(r),
                MathOp::Multiply => l.wrapping_mul(r),
                MathOp::Divide => l.checked_div(r).unwrap_or(0),
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {}", other),
    }
}

fn holds_signed(left: &Expression, op: CompareOp, right: &Expression, v: &BTreeMap<String, i64>) -> bool {
    op.holds(signed(left, v), signed(right, v))
}

fn holds_unsigned(expr: &Expression, v: &BTreeMap<String, i64>) -> bool {
    match expr {
        Expression::Boolean(b) => *b,
        Expression::Comparison { left, op, right } => {
            op.holds(unsigned(left, v), unsigned(right, v))
        }
        other => panic!("unexpected normalized form {}", other),
    }
}

fn assignments(names: &[(String, i64)], division: bool) -> Vec<BTreeMap<String, i64>> {
    let mut all = vec![BTreeMap::new()];
    for (name, max) in names {
        let values = samples(*max, division);
        all = all
            .into_iter()
            .flat_map(|base| {
                values.iter().map(move |&s| {
                    let mut next = base.clone();
                    next.insert(name.clone(), s);
                    next
                })
            })
            .collect();
    }
    all
}

fn check(src: &str) {
    let mut env = Environment::new();
    let mut scope = env.root();
    let Expression::Comparison { left, op, right } = parse(src).unwrap() else {
        panic!("not a comparison: {}", src);
    };
    let left = left.replace_variables(&mut scope).unwrap();
    let right = right.replace_variables(&mut scope).unwrap();

    let mut names = Vec::new();
    reads(&left, &mut names);
    reads(&right, &mut names);

    let division = divides(&left) || divides(&right);
    let normalized = normalize_comparison(left.clone(), op, right.clone());
    for values in assignments(&names, division) {
        let expected = holds_signed(&left, op, &right, &values);
        match &normalized {
            Ok(expr) => assert_eq!(
                holds_unsigned(expr, &values),
                expected,
                "{} normalized to {} disagrees at {:?}",
                src,
                expr,
                values
            ),
            Err(e) if e.kind == ErrorKind::NeverTrue => {
                assert!(!expected, "{} reported never true but holds at {:?}", src, values)
            }
            Err(e) if e.kind == ErrorKind::AlwaysTrue => {
                assert!(expected, "{} reported always true but fails at {:?}", src, values)
            }
            Err(e) => panic!("{} failed to normalize: {}", src, e),
        }
    }
}

#[test]
fn single_subtraction() {
    check("byte(1) - byte(2) > 100");
    check("byte(1) - 10 < byte(2)");
    check("byte(1) - byte(2) > -3");
    check("byte(1) - byte(2) >= 0");
    check("5 - byte(1) < 2");
    check("byte(1) - prev(byte(1)) >= 2");
    check("byte(1) + 1 - byte(2) > 3");
}

#[test]
fn compensated_subtraction() {
    check("byte(1) - byte(2) < 100");
    check("byte(1) - byte(2) <= 0");
    check("byte(1) - byte(2) - byte(3) + 700 < 800");
    check("byte(1) - byte(2) < byte(3) + 100");
    check("byte(1) + byte(2) > byte(3) + byte(4)");
    check("prev(byte(1)) - prev(byte(2)) - prev(byte(3)) < 2");
    check("byte(1) + 1 - byte(2) < 2");
}

#[test]
fn sums_and_equality() {
    check("byte(1) + byte(2) > byte(3) - byte(4)");
    check("byte(1) + 3 - byte(2) == 1");
    check("byte(1) == prev(byte(1)) - 3");
    check("byte(1) - byte(2) == 0");
    check("byte(1) + byte(2) < 300");
}

#[test]
fn decided_comparisons() {
    check("byte(1) + byte(2) > 510");
    check("byte(1) < 256");
    check("5 + byte(0x1234) == 2");
    check("byte(1) * 10 == 100");
}

#[test]
fn divided_reads() {
    check("byte(1) / 10 < 9");
    check("byte(1) / 10 == 4");
    check("byte(1) - byte(2) / 2 < 3");
    check("byte(1) / 2 - byte(2) < 3");
    check("byte(1) / byte(1) - (byte(2) / byte(2)) >= 1");
    check("byte(1) * 10 / 2 == 100");
}

#[test]
fn collected_factors() {
    check("2 * byte(1) * 10 == 100");
    check("byte(1) * 10 * 2 == 100");
    check("(byte(1) - 1) * 10 < 99");
    check("byte(1) - byte(2) * 2 < 3");
}

#[test]
fn wide_reads() {
    check("word(1) - word(2) + word(3) < 100");
    check("word(1) - word(2) - byte(3) < 100");
    check("(word(1) - word(2)) > 0");
    check("dword(1) - byte(2) < 100");
    check("byte(1) + byte(2) - byte(1) > 3");
}

#[test]
fn pointer_reads() {
    check("byte(byte(2) + 1) - byte(byte(3) + 2) > 100");
    check("word(54) + 37 >= word(word(43102) + 54)");
}
