//! Expression tree shared by the parser, the interpreter, the comparison
//! normalizer and the trigger builder.
//!
//! Trees are immutable: every rewrite builds new nodes. The one exception
//! is [`Dictionary`], whose entries live behind a shared handle so that a
//! dictionary passed to a function can be mutated by the callee.

use crate::error::Position;
use crate::functions::FunctionDefinition;
use crate::requirement::FieldSize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl MathOp {
    pub fn symbol(self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Subtract => "-",
            MathOp::Multiply => "*",
            MathOp::Divide => "/",
            MathOp::Modulus => "%",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            MathOp::Add | MathOp::Subtract => 4,
            MathOp::Multiply | MathOp::Divide | MathOp::Modulus => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEqual => "<=",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEqual => ">=",
        }
    }

    /// The operator that holds when the operands are swapped.
    pub fn reverse(self) -> CompareOp {
        match self {
            CompareOp::LessThan => CompareOp::GreaterThan,
            CompareOp::LessThanOrEqual => CompareOp::GreaterThanOrEqual,
            CompareOp::GreaterThan => CompareOp::LessThan,
            CompareOp::GreaterThanOrEqual => CompareOp::LessThanOrEqual,
            other => other,
        }
    }

    /// The logical negation of the operator.
    pub fn invert(self) -> CompareOp {
        match self {
            CompareOp::Equal => CompareOp::NotEqual,
            CompareOp::NotEqual => CompareOp::Equal,
            CompareOp::LessThan => CompareOp::GreaterThanOrEqual,
            CompareOp::LessThanOrEqual => CompareOp::GreaterThan,
            CompareOp::GreaterThan => CompareOp::LessThanOrEqual,
            CompareOp::GreaterThanOrEqual => CompareOp::LessThan,
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Equal | CompareOp::NotEqual)
    }

    pub fn holds<T: PartialOrd>(self, left: T, right: T) -> bool {
        match self {
            CompareOp::Equal => left == right,
            CompareOp::NotEqual => left != right,
            CompareOp::LessThan => left < right,
            CompareOp::LessThanOrEqual => left <= right,
            CompareOp::GreaterThan => left > right,
            CompareOp::GreaterThanOrEqual => left >= right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

// ──────────────────────────────────────────────
// Memory accessors
// ──────────────────────────────────────────────

/// A read of `size` at `address`, optionally of the previous frame and/or
/// BCD-decoded. The address is itself an expression so reads can be
/// chained through pointers.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryAccessor {
    pub size: FieldSize,
    pub address: Box<Expression>,
    pub previous: bool,
    pub bcd: bool,
}

impl MemoryAccessor {
    pub fn new(size: FieldSize, address: Expression) -> Self {
        MemoryAccessor {
            size,
            address: Box::new(address),
            previous: false,
            bcd: false,
        }
    }

    /// The same read without any BCD decoding.
    pub fn raw(&self) -> MemoryAccessor {
        MemoryAccessor {
            bcd: false,
            ..self.clone()
        }
    }

    /// True when the address is computed from another memory read.
    pub fn is_indirect(&self) -> bool {
        self.address.contains_memory()
    }
}

// ──────────────────────────────────────────────
// Dictionaries
// ──────────────────────────────────────────────

/// A dictionary value. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct Dictionary(Rc<RefCell<Vec<(Expression, Expression)>>>);

impl Dictionary {
    pub fn new(entries: Vec<(Expression, Expression)>) -> Self {
        Dictionary(Rc::new(RefCell::new(entries)))
    }

    pub fn get(&self, key: &Expression) -> Option<Expression> {
        self.0
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn insert(&self, key: Expression, value: Expression) {
        let mut entries = self.0.borrow_mut();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn entries(&self) -> Vec<(Expression, Expression)> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn shares_storage_with(&self, other: &Dictionary) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.shares_storage_with(other) || *self.0.borrow() == *other.0.borrow()
    }
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Variable(String),
    /// A reference to a function by name, usable as a value.
    FunctionName(String),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    Memory(MemoryAccessor),
    Mathematic {
        left: Box<Expression>,
        op: MathOp,
        right: Box<Expression>,
    },
    Comparison {
        left: Box<Expression>,
        op: CompareOp,
        right: Box<Expression>,
    },
    Logical {
        left: Box<Expression>,
        op: LogicalOp,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    Conditional {
        condition: Box<Expression>,
        then_branch: Vec<Expression>,
        else_branch: Vec<Expression>,
    },
    Assignment {
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Dictionary(Dictionary),
    Index {
        target: Box<Expression>,
        key: Box<Expression>,
    },
    Return(Box<Expression>),
    FunctionDefinition(Rc<FunctionDefinition>),
}

impl Expression {
    pub fn math(left: Expression, op: MathOp, right: Expression) -> Expression {
        Expression::Mathematic {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn compare(left: Expression, op: CompareOp, right: Expression) -> Expression {
        Expression::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn logical(left: Expression, op: LogicalOp, right: Expression) -> Expression {
        Expression::Logical {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn call(name: &str, args: Vec<Expression>) -> Expression {
        Expression::FunctionCall {
            name: name.to_owned(),
            args,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Expression::Integer(_)
                | Expression::Float(_)
                | Expression::String(_)
                | Expression::Boolean(_)
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Expression::Integer(_) | Expression::Float(_))
    }

    /// True when a memory read appears anywhere inside the expression.
    pub fn contains_memory(&self) -> bool {
        match self {
            Expression::Memory(_) => true,
            Expression::Mathematic { left, right, .. }
            | Expression::Comparison { left, right, .. }
            | Expression::Logical { left, right, .. } => {
                left.contains_memory() || right.contains_memory()
            }
            Expression::Not(inner) => inner.contains_memory(),
            Expression::FunctionCall { args, .. } => args.iter().any(Expression::contains_memory),
            _ => false,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Logical {
                op: LogicalOp::Or, ..
            } => 1,
            Expression::Logical {
                op: LogicalOp::And, ..
            } => 2,
            Expression::Comparison { .. } => 3,
            Expression::Mathematic { op, .. } => op.precedence(),
            Expression::Not(_) => 6,
            Expression::Integer(n) if *n < 0 => 6,
            Expression::Float(f) if *f < 0.0 => 6,
            Expression::Assignment { .. } => 0,
            _ => 7,
        }
    }
}

/// Source statement with the position of its first token.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub expression: Expression,
    pub position: Position,
}

/// A parsed script: the top-level statements in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub statements: Vec<Statement>,
}

// ──────────────────────────────────────────────
// Display
// ──────────────────────────────────────────────

/// Six decimal places with trailing zeros removed, always keeping one
/// digit after the point.
pub fn format_float(value: f64) -> String {
    let mut s = format!("{:.6}", value);
    while s.ends_with('0') && !s.ends_with(".0") {
        s.pop();
    }
    if s == "-0.0" {
        s = "0.0".to_owned();
    }
    s
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    operand: &Expression,
    min_precedence: u8,
) -> fmt::Result {
    if operand.precedence() < min_precedence {
        write!(f, "({})", operand)
    } else {
        write!(f, "{}", operand)
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, statements: &[Expression]) -> fmt::Result {
    write!(f, "{{ ")?;
    for (i, s) in statements.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", s)?;
    }
    write!(f, " }}")
}

impl fmt::Display for MemoryAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.previous {
            write!(f, "prev(")?;
        }
        if self.bcd {
            write!(f, "bcd(")?;
        }
        write!(f, "{}({})", self.size.function_name(), self.address)?;
        if self.bcd {
            write!(f, ")")?;
        }
        if self.previous {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Integer(n) => write!(f, "{}", n),
            Expression::Float(v) => write!(f, "{}", format_float(*v)),
            Expression::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Expression::Boolean(b) => write!(f, "{}", b),
            Expression::Variable(name) | Expression::FunctionName(name) => write!(f, "{}", name),
            Expression::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expression::Memory(accessor) => write!(f, "{}", accessor),
            Expression::Mathematic { left, op, right } => {
                let p = op.precedence();
                write_operand(f, left, p)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, p + 1)
            }
            Expression::Comparison { left, op, right } => {
                write_operand(f, left, 4)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, 4)
            }
            Expression::Logical { left, op, right } => {
                let p = self.precedence();
                write_operand(f, left, p)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, p + 1)
            }
            Expression::Not(inner) => {
                write!(f, "!")?;
                write_operand(f, inner, 6)
            }
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(f, "if ({}) ", condition)?;
                write_block(f, then_branch)?;
                if !else_branch.is_empty() {
                    write!(f, " else ")?;
                    write_block(f, else_branch)?;
                }
                Ok(())
            }
            Expression::Assignment { target, value } => write!(f, "{} = {}", target, value),
            Expression::Dictionary(dict) => {
                write!(f, "{{")?;
                for (i, (k, v)) in dict.entries().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Expression::Index { target, key } => {
                write_operand(f, target, 7)?;
                write!(f, "[{}]", key)
            }
            Expression::Return(value) => write!(f, "return {}", value),
            Expression::FunctionDefinition(def) => {
                write!(f, "function {}(", def.name)?;
                for (i, p) in def.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.name)?;
                }
                write!(f, ")")
            }
        }
    }
}
