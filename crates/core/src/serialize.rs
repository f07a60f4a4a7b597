//! Wire format for triggers.
//!
//! Requirements are joined with `_` and groups with `S`; the core group
//! comes first, followed by each alt group. A requirement is an optional
//! `X:` type prefix, a left field, an optional operator and right field,
//! and an optional `@N` hit target.
//!
//! Fields are written as:
//!
//! - decimal digits for an integer value, `f` + number for a float value
//! - `0x` + size code + six or more hex digits for a memory read
//! - `fF` + hex digits for a float read
//!
//! with a `d` prefix on reads of the previous frame and `b` on BCD reads.

use crate::ast::format_float;
use crate::error::{ParseError, Result};
use crate::requirement::{
    Field, FieldSize, MemoryKind, Requirement, RequirementGroup, RequirementOperator,
    RequirementType, Trigger,
};
use std::fmt::Write as _;

pub fn serialize_trigger(trigger: &Trigger) -> String {
    std::iter::once(&trigger.core)
        .chain(trigger.alts.iter())
        .map(serialize_group)
        .collect::<Vec<_>>()
        .join("S")
}

fn serialize_group(group: &RequirementGroup) -> String {
    group
        .requirements
        .iter()
        .map(serialize_requirement)
        .collect::<Vec<_>>()
        .join("_")
}

pub fn serialize_requirement(req: &Requirement) -> String {
    let mut out = String::new();
    if let Some(prefix) = type_prefix(req.requirement_type) {
        out.push(prefix);
        out.push(':');
    }
    write_field(&mut out, &req.left);
    if let (Some(symbol), Some(right)) = (operator_symbol(req.operator), &req.right) {
        out.push_str(symbol);
        write_field(&mut out, right);
    }
    if req.hit_target > 0 {
        let _ = write!(out, "@{}", req.hit_target);
    }
    out
}

fn type_prefix(t: RequirementType) -> Option<char> {
    match t {
        RequirementType::Standard => None,
        RequirementType::AddSource => Some('A'),
        RequirementType::SubSource => Some('B'),
        RequirementType::AddAddress => Some('I'),
        RequirementType::AndNext => Some('N'),
        RequirementType::ResetIf => Some('R'),
        RequirementType::PauseIf => Some('P'),
    }
}

fn type_from_prefix(c: char) -> Option<RequirementType> {
    [
        RequirementType::AddSource,
        RequirementType::SubSource,
        RequirementType::AddAddress,
        RequirementType::AndNext,
        RequirementType::ResetIf,
        RequirementType::PauseIf,
    ]
    .into_iter()
    .find(|t| type_prefix(*t) == Some(c))
}

fn operator_symbol(op: RequirementOperator) -> Option<&'static str> {
    match op {
        RequirementOperator::Equal => Some("="),
        RequirementOperator::NotEqual => Some("!="),
        RequirementOperator::LessThan => Some("<"),
        RequirementOperator::LessThanOrEqual => Some("<="),
        RequirementOperator::GreaterThan => Some(">"),
        RequirementOperator::GreaterThanOrEqual => Some(">="),
        RequirementOperator::Multiply => Some("*"),
        RequirementOperator::Divide => Some("/"),
        RequirementOperator::None => None,
    }
}

fn write_field(out: &mut String, field: &Field) {
    match field {
        Field::Value { value } => {
            let _ = write!(out, "{}", value);
        }
        Field::Float { value } => {
            let _ = write!(out, "f{}", format_float(*value));
        }
        Field::Memory {
            kind,
            size,
            address,
        } => {
            match kind {
                MemoryKind::Current => {}
                MemoryKind::Previous => out.push('d'),
                MemoryKind::Bcd => out.push('b'),
            }
            if *size == FieldSize::Float {
                let _ = write!(out, "fF{:06x}", address);
            } else {
                let _ = write!(out, "0x{}{:06x}", size.code(), address);
            }
        }
    }
}

// ──────────────────────────────────────────────
// Parsing
// ──────────────────────────────────────────────

/// Parse a serialized trigger back into requirement groups.
pub fn parse_trigger(wire: &str) -> Result<Trigger> {
    let mut cursor = Cursor {
        chars: wire.chars().collect(),
        pos: 0,
    };

    let mut groups = vec![RequirementGroup::default()];
    if cursor.at_end() {
        return Ok(Trigger::default());
    }
    loop {
        if !cursor.at_end() && cursor.peek() != Some('S') {
            let req = cursor.requirement()?;
            if let Some(group) = groups.last_mut() {
                group.requirements.push(req);
            }
        }
        match cursor.next() {
            None => break,
            Some('_') => {}
            Some('S') => groups.push(RequirementGroup::default()),
            Some(c) => return Err(cursor.error_before(format!("Unexpected '{}'", c))),
        }
    }

    let mut groups = groups.into_iter();
    let core = groups.next().unwrap_or_default();
    Ok(Trigger {
        core,
        alts: groups.collect(),
    })
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::syntax(1, self.pos as u32 + 1, message)
    }

    fn error_before(&self, message: impl Into<String>) -> ParseError {
        ParseError::syntax(1, self.pos as u32, message)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn requirement(&mut self) -> Result<Requirement> {
        let mut requirement_type = RequirementType::Standard;
        if self.peek_at(1) == Some(':') {
            let c = self.peek().unwrap_or(':');
            requirement_type = type_from_prefix(c)
                .ok_or_else(|| self.error(format!("Unknown requirement type '{}'", c)))?;
            self.pos += 2;
        }

        let left = self.field()?;
        let operator = self.operator();
        let right = match operator {
            RequirementOperator::None => None,
            _ => Some(self.field()?),
        };

        let mut hit_target = 0;
        if self.peek() == Some('@') {
            self.pos += 1;
            let digits = self.take_while(|c| c.is_ascii_digit());
            hit_target = digits
                .parse()
                .map_err(|_| self.error("Expected hit count after '@'"))?;
        }

        Ok(Requirement {
            requirement_type,
            left,
            operator,
            right,
            hit_target,
        })
    }

    fn operator(&mut self) -> RequirementOperator {
        let (op, len) = if self.starts_with("!=") {
            (RequirementOperator::NotEqual, 2)
        } else if self.starts_with("<=") {
            (RequirementOperator::LessThanOrEqual, 2)
        } else if self.starts_with(">=") {
            (RequirementOperator::GreaterThanOrEqual, 2)
        } else {
            match self.peek() {
                Some('=') => (RequirementOperator::Equal, 1),
                Some('<') => (RequirementOperator::LessThan, 1),
                Some('>') => (RequirementOperator::GreaterThan, 1),
                Some('*') => (RequirementOperator::Multiply, 1),
                Some('/') => (RequirementOperator::Divide, 1),
                _ => (RequirementOperator::None, 0),
            }
        };
        self.pos += len;
        op
    }

    fn field(&mut self) -> Result<Field> {
        let kind = match self.peek() {
            Some('d') if self.peek_at(1) == Some('0') || self.peek_at(1) == Some('f') => {
                self.pos += 1;
                MemoryKind::Previous
            }
            Some('b') if self.peek_at(1) == Some('0') || self.peek_at(1) == Some('f') => {
                self.pos += 1;
                MemoryKind::Bcd
            }
            _ => MemoryKind::Current,
        };

        if self.starts_with("0x") {
            self.pos += 2;
            let code = self.next().ok_or_else(|| self.error("Expected size code"))?;
            let size = FieldSize::from_code(code)
                .filter(|s| *s != FieldSize::Float)
                .ok_or_else(|| self.error_before(format!("Unknown size code '{}'", code)))?;
            let address = self.hex()?;
            return Ok(Field::memory(kind, size, address));
        }
        if self.starts_with("fF") {
            self.pos += 2;
            let address = self.hex()?;
            return Ok(Field::memory(kind, FieldSize::Float, address));
        }
        if kind != MemoryKind::Current {
            return Err(self.error("Expected memory read after prefix"));
        }

        if self.peek() == Some('f') {
            self.pos += 1;
            let text = self.take_while(|c| c.is_ascii_digit() || c == '.' || c == '-');
            let value = text
                .parse()
                .map_err(|_| self.error(format!("Invalid float '{}'", text)))?;
            return Ok(Field::Float { value });
        }

        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(self.error("Expected field"));
        }
        let value = digits
            .parse()
            .map_err(|_| self.error(format!("Value {} is out of range", digits)))?;
        Ok(Field::value(value))
    }

    fn hex(&mut self) -> Result<u32> {
        let digits = self.take_while(|c| c.is_ascii_hexdigit());
        u32::from_str_radix(&digits, 16).map_err(|_| self.error("Expected hex address"))
    }
}
