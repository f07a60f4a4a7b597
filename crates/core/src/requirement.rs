//! Requirement records: the compiled form of a trigger.
//!
//! A [`Trigger`] is a core [`RequirementGroup`] plus zero or more alt
//! groups. Each group is an ordered list of [`Requirement`]s in which
//! modifier requirements (AddSource, SubSource, AddAddress, AndNext)
//! combine with the requirement that follows them.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Fields
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSize {
    Bit0,
    Bit1,
    Bit2,
    Bit3,
    Bit4,
    Bit5,
    Bit6,
    Bit7,
    LowNibble,
    HighNibble,
    Byte,
    Word,
    TByte,
    DWord,
    BitCount,
    Float,
}

impl FieldSize {
    pub const ALL: [FieldSize; 16] = [
        FieldSize::Bit0,
        FieldSize::Bit1,
        FieldSize::Bit2,
        FieldSize::Bit3,
        FieldSize::Bit4,
        FieldSize::Bit5,
        FieldSize::Bit6,
        FieldSize::Bit7,
        FieldSize::LowNibble,
        FieldSize::HighNibble,
        FieldSize::Byte,
        FieldSize::Word,
        FieldSize::TByte,
        FieldSize::DWord,
        FieldSize::BitCount,
        FieldSize::Float,
    ];

    /// Name of the script function that reads this size.
    pub fn function_name(self) -> &'static str {
        match self {
            FieldSize::Bit0 => "bit0",
            FieldSize::Bit1 => "bit1",
            FieldSize::Bit2 => "bit2",
            FieldSize::Bit3 => "bit3",
            FieldSize::Bit4 => "bit4",
            FieldSize::Bit5 => "bit5",
            FieldSize::Bit6 => "bit6",
            FieldSize::Bit7 => "bit7",
            FieldSize::LowNibble => "low4",
            FieldSize::HighNibble => "high4",
            FieldSize::Byte => "byte",
            FieldSize::Word => "word",
            FieldSize::TByte => "tbyte",
            FieldSize::DWord => "dword",
            FieldSize::BitCount => "bitcount",
            FieldSize::Float => "float",
        }
    }

    pub fn from_function_name(name: &str) -> Option<FieldSize> {
        FieldSize::ALL
            .into_iter()
            .find(|size| size.function_name() == name)
    }

    /// Largest value a read of this size can produce, or `None` when the
    /// read spans the full register width (or is not an integer).
    pub fn max_value(self) -> Option<u64> {
        match self {
            FieldSize::Bit0
            | FieldSize::Bit1
            | FieldSize::Bit2
            | FieldSize::Bit3
            | FieldSize::Bit4
            | FieldSize::Bit5
            | FieldSize::Bit6
            | FieldSize::Bit7 => Some(1),
            FieldSize::LowNibble | FieldSize::HighNibble => Some(15),
            FieldSize::BitCount => Some(8),
            FieldSize::Byte => Some(0xFF),
            FieldSize::Word => Some(0xFFFF),
            FieldSize::TByte => Some(0xFF_FFFF),
            FieldSize::DWord | FieldSize::Float => None,
        }
    }

    /// Largest value a BCD decode of this size can produce.
    pub fn max_bcd_value(self) -> Option<u64> {
        match self {
            FieldSize::LowNibble | FieldSize::HighNibble => Some(9),
            FieldSize::Byte => Some(99),
            FieldSize::Word => Some(9_999),
            FieldSize::TByte => Some(999_999),
            FieldSize::DWord => Some(99_999_999),
            other => other.max_value(),
        }
    }

    /// Single-character size code used by the wire format.
    pub fn code(self) -> char {
        match self {
            FieldSize::Bit0 => 'M',
            FieldSize::Bit1 => 'N',
            FieldSize::Bit2 => 'O',
            FieldSize::Bit3 => 'P',
            FieldSize::Bit4 => 'Q',
            FieldSize::Bit5 => 'R',
            FieldSize::Bit6 => 'S',
            FieldSize::Bit7 => 'T',
            FieldSize::LowNibble => 'L',
            FieldSize::HighNibble => 'U',
            FieldSize::Byte => 'H',
            FieldSize::Word => ' ',
            FieldSize::TByte => 'W',
            FieldSize::DWord => 'X',
            FieldSize::BitCount => 'K',
            FieldSize::Float => 'F',
        }
    }

    pub fn from_code(code: char) -> Option<FieldSize> {
        FieldSize::ALL.into_iter().find(|size| size.code() == code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Current,
    Previous,
    Bcd,
}

/// One operand of a requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Field {
    Value { value: u32 },
    Float { value: f64 },
    Memory {
        kind: MemoryKind,
        size: FieldSize,
        address: u32,
    },
}

impl Field {
    pub fn value(value: u32) -> Field {
        Field::Value { value }
    }

    pub fn memory(kind: MemoryKind, size: FieldSize, address: u32) -> Field {
        Field::Memory {
            kind,
            size,
            address,
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Field::Memory { .. })
    }
}

// ──────────────────────────────────────────────
// Requirements
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    Standard,
    AddSource,
    SubSource,
    AddAddress,
    AndNext,
    ResetIf,
    PauseIf,
}

impl RequirementType {
    /// Modifiers only contribute to the requirement that follows them.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            RequirementType::AddSource
                | RequirementType::SubSource
                | RequirementType::AddAddress
                | RequirementType::AndNext
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Multiply,
    Divide,
    /// Accumulation only; the requirement has no right field.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub requirement_type: RequirementType,
    pub left: Field,
    pub operator: RequirementOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Field>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub hit_target: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Requirement {
    /// A modifier with no operator, e.g. `A:0xH000001`.
    pub fn modifier(requirement_type: RequirementType, left: Field) -> Self {
        Requirement {
            requirement_type,
            left,
            operator: RequirementOperator::None,
            right: None,
            hit_target: 0,
        }
    }

    pub fn compare(left: Field, operator: RequirementOperator, right: Field) -> Self {
        Requirement {
            requirement_type: RequirementType::Standard,
            left,
            operator,
            right: Some(right),
            hit_target: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequirementGroup {
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trigger {
    pub core: RequirementGroup,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alts: Vec<RequirementGroup>,
}

/// An achievement recorded by a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub title: String,
    pub description: String,
    pub points: i64,
    pub trigger: Trigger,
}
