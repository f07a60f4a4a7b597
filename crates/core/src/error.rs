use serde::Serialize;
use std::fmt;

/// Source location of an error, 1-based.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed token sequence.
    Syntax,
    /// Unknown names and parameter mismatches.
    Binding,
    /// Shapes that cannot be expressed as requirements.
    Semantic,
    /// A function expected to produce a value did not.
    Runtime,
    /// A comparison that is statically false.
    NeverTrue,
    /// A comparison that is statically true.
    AlwaysTrue,
}

/// A compile error. Wrapping errors keep the error they wrap as `inner`,
/// so the innermost cause is always reachable.
#[derive(Debug, Clone, Serialize, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[source]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<ParseError>>,
}

pub type Result<T> = std::result::Result<T, ParseError>;

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            position: None,
            inner: None,
        }
    }

    pub fn syntax(line: u32, column: u32, message: impl Into<String>) -> Self {
        ParseError::new(ErrorKind::Syntax, message).at(Position { line, column })
    }

    pub fn binding(message: impl Into<String>) -> Self {
        ParseError::new(ErrorKind::Binding, message)
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        ParseError::new(ErrorKind::Semantic, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        ParseError::new(ErrorKind::Runtime, message)
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Stamp a position unless one is already recorded.
    pub fn with_position_if_absent(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }

    /// Wrap `inner` under a new message. The kind of the outer error is
    /// inherited from the innermost cause.
    pub fn wrap(message: impl Into<String>, inner: ParseError) -> Self {
        ParseError {
            kind: inner.innermost().kind,
            message: message.into(),
            position: inner.position,
            inner: Some(Box::new(inner)),
        }
    }

    pub fn innermost(&self) -> &ParseError {
        let mut e = self;
        while let Some(inner) = &e.inner {
            e = inner;
        }
        e
    }

    /// Serialize to a JSON object with every field present (null for
    /// missing), including the innermost message.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "kind":      self.kind,
            "message":   self.message,
            "line":      self.position.map(|p| p.line),
            "column":    self.position.map(|p| p.column),
            "innermost": self.innermost().message,
        })
    }
}
