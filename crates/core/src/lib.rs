#![allow(clippy::result_large_err)]
//! trigscript-core: compiler for achievement trigger scripts.
//!
//! A script defines variables, functions and achievements. Each
//! achievement's trigger is an expression over memory reads, which is
//! normalized into a form that evaluates correctly with unsigned
//! arithmetic and then lowered to requirement groups and their compact
//! wire string.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`compile_script()`] -- parse and run a script, collecting achievements
//! - [`compile_trigger()`] -- compile a single trigger expression
//! - [`parse()`] / [`parse_script()`] -- source text to [`Expression`]s
//! - [`build_trigger()`] -- expression to [`Trigger`]
//! - [`serialize_trigger()`] / [`parse_trigger()`] -- the wire format
//! - [`ParseError`] -- every error the compiler reports

pub mod ast;
pub mod builder;
pub mod compile;
pub mod error;
pub mod functions;
pub mod interpreter;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod requirement;
pub mod scope;
pub mod serialize;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{CompareOp, Expression, LogicalOp, MathOp, MemoryAccessor, Script, Statement};
pub use error::{ErrorKind, ParseError, Position};
pub use requirement::{
    Achievement, Field, FieldSize, MemoryKind, Requirement, RequirementGroup,
    RequirementOperator, RequirementType, Trigger,
};
pub use scope::{Environment, EvaluationContext, InterpreterScope};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use builder::build_trigger;
pub use compile::{compile_script, compile_trigger, run_script};
pub use normalize::normalize_comparison;
pub use parser::{parse, parse_script};
pub use serialize::{parse_trigger, serialize_trigger};
