//! Function definitions, parameter binding and the native built-ins.

use crate::ast::{Expression, MathOp, MemoryAccessor};
use crate::builder::build_trigger;
use crate::error::{ParseError, Result};
use crate::requirement::{Achievement, FieldSize};
use crate::scope::InterpreterScope;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Expression>,
}

impl Parameter {
    pub fn required(name: &str) -> Self {
        Parameter {
            name: name.to_owned(),
            default: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Memory(FieldSize),
    Prev,
    Bcd,
    AlwaysTrue,
    AlwaysFalse,
    Once,
    Repeated,
    Never,
    Unless,
    Achievement,
}

impl Builtin {
    /// Built-ins that only mean something as part of a trigger.
    pub fn is_trigger_only(self) -> bool {
        matches!(
            self,
            Builtin::AlwaysTrue
                | Builtin::AlwaysFalse
                | Builtin::Once
                | Builtin::Repeated
                | Builtin::Never
                | Builtin::Unless
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionKind {
    Native(Builtin),
    UserDefined(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub kind: FunctionKind,
}

fn native(name: &str, params: &[&str], builtin: Builtin) -> FunctionDefinition {
    FunctionDefinition {
        name: name.to_owned(),
        parameters: params.iter().map(|p| Parameter::required(p)).collect(),
        kind: FunctionKind::Native(builtin),
    }
}

/// Every native function available in the global scope.
pub fn builtin_functions() -> Vec<FunctionDefinition> {
    let mut defs: Vec<FunctionDefinition> = FieldSize::ALL
        .into_iter()
        .map(|size| native(size.function_name(), &["address"], Builtin::Memory(size)))
        .collect();
    defs.push(native("prev", &["accessor"], Builtin::Prev));
    defs.push(native("bcd", &["accessor"], Builtin::Bcd));
    defs.push(native("always_true", &[], Builtin::AlwaysTrue));
    defs.push(native("always_false", &[], Builtin::AlwaysFalse));
    defs.push(native("once", &["comparison"], Builtin::Once));
    defs.push(native("repeated", &["count", "comparison"], Builtin::Repeated));
    defs.push(native("never", &["comparison"], Builtin::Never));
    defs.push(native("unless", &["comparison"], Builtin::Unless));
    defs.push(native(
        "achievement",
        &["title", "description", "points", "trigger"],
        Builtin::Achievement,
    ));
    defs
}

// ──────────────────────────────────────────────
// Parameter binding
// ──────────────────────────────────────────────

impl FunctionDefinition {
    /// Resolve call arguments against the parameter list. Returns one
    /// `(name, value)` pair per parameter, in declaration order.
    ///
    /// Positional arguments come first; `name = value` arguments bind by
    /// name. Each value is resolved in the caller's scope. Dictionaries
    /// resolve to the caller's shared instance, so callee mutations are
    /// visible to the caller.
    pub fn bind_arguments(
        &self,
        args: &[Expression],
        scope: &mut InterpreterScope,
    ) -> Result<Vec<(String, Expression)>> {
        let mut values: Vec<Option<Expression>> = vec![None; self.parameters.len()];
        let mut named = false;

        for (i, arg) in args.iter().enumerate() {
            if let Expression::Assignment { target, value } = arg {
                if let Expression::Variable(name) = target.as_ref() {
                    named = true;
                    let Some(index) = self.parameters.iter().position(|p| &p.name == name) else {
                        return Err(ParseError::binding(format!(
                            "'{}' does not have a '{}' parameter",
                            self.name, name
                        )));
                    };
                    if values[index].is_some() {
                        return Err(ParseError::binding(format!(
                            "'{}' already has a value",
                            name
                        )));
                    }
                    values[index] = Some(resolve_argument(value, name, scope)?);
                    continue;
                }
            }

            if named {
                return Err(ParseError::binding(
                    "Non-named parameter following named parameter",
                ));
            }
            let Some(param) = self.parameters.get(i) else {
                return Err(ParseError::binding("Too many parameters passed to function"));
            };
            values[i] = Some(resolve_argument(arg, &param.name, scope)?);
        }

        let mut bound = Vec::with_capacity(values.len());
        for (param, value) in self.parameters.iter().zip(values) {
            let value = match (value, &param.default) {
                (Some(v), _) => v,
                (None, Some(default)) => resolve_argument(default, &param.name, scope)?,
                (None, None) => {
                    return Err(ParseError::binding(format!(
                        "Required parameter '{}' not provided",
                        param.name
                    )))
                }
            };
            bound.push((param.name.clone(), value));
        }
        Ok(bound)
    }
}

fn resolve_argument(
    arg: &Expression,
    name: &str,
    scope: &mut InterpreterScope,
) -> Result<Expression> {
    arg.replace_variables(scope)
        .map_err(|e| ParseError::wrap(format!("Invalid value for parameter: {}", name), e))
}

// ──────────────────────────────────────────────
// Native implementations
// ──────────────────────────────────────────────

fn take(bound: &mut Vec<(String, Expression)>, name: &str) -> Result<Expression> {
    let index = bound
        .iter()
        .position(|(n, _)| n == name)
        .ok_or_else(|| ParseError::binding(format!("Required parameter '{}' not provided", name)))?;
    Ok(bound.remove(index).1)
}

fn take_string(bound: &mut Vec<(String, Expression)>, name: &str) -> Result<String> {
    match take(bound, name)? {
        Expression::String(s) => Ok(s),
        other => Err(ParseError::semantic(format!(
            "{} must be a string, got {}",
            name, other
        ))),
    }
}

fn take_integer(bound: &mut Vec<(String, Expression)>, name: &str) -> Result<i64> {
    match take(bound, name)? {
        Expression::Integer(n) => Ok(n),
        other => Err(ParseError::semantic(format!(
            "{} must be an integer, got {}",
            name, other
        ))),
    }
}

/// Build the memory read for `size(address)`.
fn memory_accessor(size: FieldSize, address: Expression) -> Result<Expression> {
    match &address {
        Expression::Integer(n) if (0..=u32::MAX as i64).contains(n) => {}
        a if a.contains_memory() => {}
        other => {
            return Err(ParseError::semantic(format!(
                "Invalid address for {}: {}",
                size.function_name(),
                other
            )))
        }
    }
    Ok(Expression::Memory(MemoryAccessor::new(size, address)))
}

/// Apply `prev`/`bcd` to every memory read in an arithmetic tree.
fn wrap_accessors(
    name: &str,
    expr: Expression,
    apply: &dyn Fn(&mut MemoryAccessor),
) -> Result<Expression> {
    match expr {
        Expression::Memory(mut acc) => {
            apply(&mut acc);
            Ok(Expression::Memory(acc))
        }
        Expression::Mathematic { left, op, right } => {
            let left = wrap_accessors(name, *left, apply)?;
            let right = match op {
                MathOp::Add | MathOp::Subtract => wrap_accessors(name, *right, apply)?,
                _ if right.is_numeric() => *right,
                _ => wrap_accessors(name, *right, apply)?,
            };
            Ok(Expression::math(left, op, right))
        }
        e if e.is_numeric() => Ok(e),
        other => Err(ParseError::semantic(format!(
            "{} can only be applied to memory accessors, got {}",
            name, other
        ))),
    }
}

impl Builtin {
    /// Run the built-in on bound parameters. Trigger flags stay symbolic so
    /// the trigger builder can interpret them.
    pub fn invoke(
        self,
        name: &str,
        mut bound: Vec<(String, Expression)>,
        scope: &mut InterpreterScope,
    ) -> Result<Option<Expression>> {
        match self {
            Builtin::Memory(size) => {
                let address = take(&mut bound, "address")?;
                memory_accessor(size, address).map(Some)
            }
            Builtin::Prev => {
                let accessor = take(&mut bound, "accessor")?;
                wrap_accessors(name, accessor, &|acc| acc.previous = true).map(Some)
            }
            Builtin::Bcd => {
                let accessor = take(&mut bound, "accessor")?;
                wrap_accessors(name, accessor, &|acc| acc.bcd = true).map(Some)
            }
            Builtin::AlwaysTrue
            | Builtin::AlwaysFalse
            | Builtin::Once
            | Builtin::Repeated
            | Builtin::Never
            | Builtin::Unless => {
                let args = bound.into_iter().map(|(_, v)| v).collect();
                Ok(Some(Expression::call(name, args)))
            }
            Builtin::Achievement => {
                let title = take_string(&mut bound, "title")?;
                let description = take_string(&mut bound, "description")?;
                let points = take_integer(&mut bound, "points")?;
                let trigger_expr = take(&mut bound, "trigger")?;
                let trigger = build_trigger(&trigger_expr, scope)
                    .map_err(|e| ParseError::wrap(format!("Invalid trigger for '{}'", title), e))?;
                scope.record_achievement(Achievement {
                    title,
                    description,
                    points,
                    trigger,
                });
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::scope::Environment;

    fn user(src: &str) -> FunctionDefinition {
        match parse(src).unwrap() {
            Expression::FunctionDefinition(def) => (*def).clone(),
            other => panic!("expected function definition, got {:?}", other),
        }
    }

    fn named(name: &str, value: Expression) -> Expression {
        Expression::Assignment {
            target: Box::new(Expression::Variable(name.into())),
            value: Box::new(value),
        }
    }

    fn bind(def: &FunctionDefinition, args: &[Expression]) -> Result<Vec<(String, Expression)>> {
        let mut env = Environment::new();
        let mut scope = env.root();
        def.bind_arguments(args, &mut scope)
    }

    #[test]
    fn binds_positionally() {
        let def = user("function func(i, j) { }");
        let bound = bind(&def, &[Expression::Integer(6), Expression::String("a".into())]).unwrap();
        assert_eq!(
            bound,
            vec![
                ("i".to_string(), Expression::Integer(6)),
                ("j".to_string(), Expression::String("a".into()))
            ]
        );
    }

    #[test]
    fn binds_by_name_in_any_order() {
        let def = user("function func(i, j) { }");
        let bound = bind(
            &def,
            &[
                named("j", Expression::String("a".into())),
                named("i", Expression::Integer(6)),
            ],
        )
        .unwrap();
        assert_eq!(bound[0], ("i".to_string(), Expression::Integer(6)));
        assert_eq!(bound[1], ("j".to_string(), Expression::String("a".into())));
    }

    #[test]
    fn positional_then_named_is_allowed() {
        let def = user("function func(i, j) { }");
        let bound = bind(
            &def,
            &[Expression::Integer(6), named("j", Expression::String("a".into()))],
        )
        .unwrap();
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn missing_required_parameter() {
        let def = user("function func(i, j) { }");
        let err = bind(&def, &[Expression::Integer(6)]).unwrap_err();
        assert_eq!(err.message, "Required parameter 'j' not provided");
        let err = bind(&def, &[named("j", Expression::Integer(6))]).unwrap_err();
        assert_eq!(err.message, "Required parameter 'i' not provided");
    }

    #[test]
    fn default_fills_missing_parameter() {
        let def = user("function func(i, j = 2) { }");
        let bound = bind(&def, &[Expression::Integer(6)]).unwrap();
        assert_eq!(bound[1], ("j".to_string(), Expression::Integer(2)));
    }

    #[test]
    fn too_many_parameters() {
        let def = user("function func(i, j) { }");
        let args = [
            Expression::Integer(1),
            Expression::Integer(2),
            Expression::Integer(3),
        ];
        let err = bind(&def, &args).unwrap_err();
        assert_eq!(err.message, "Too many parameters passed to function");
    }

    #[test]
    fn unknown_named_parameter() {
        let def = user("function func(i, j) { }");
        let err = bind(&def, &[named("k", Expression::Integer(1))]).unwrap_err();
        assert_eq!(err.message, "'func' does not have a 'k' parameter");
    }

    #[test]
    fn named_parameter_given_twice() {
        let def = user("function func(i, j) { }");
        let a = named("i", Expression::String("a".into()));
        let err = bind(&def, &[a.clone(), a]).unwrap_err();
        assert_eq!(err.message, "'i' already has a value");
    }

    #[test]
    fn positional_after_named() {
        let def = user("function func(i, j) { }");
        let err = bind(
            &def,
            &[named("i", Expression::Integer(6)), Expression::String("a".into())],
        )
        .unwrap_err();
        assert_eq!(err.message, "Non-named parameter following named parameter");
    }

    #[test]
    fn argument_errors_are_wrapped() {
        let def = user("function func(i) { }");
        let err = bind(&def, &[Expression::Variable("var".into())]).unwrap_err();
        assert_eq!(err.message, "Invalid value for parameter: i");
        assert_eq!(err.innermost().message, "Unknown variable: var");
    }

    #[test]
    fn prev_distributes_over_arithmetic() {
        let mut env = Environment::new();
        let mut scope = env.root();
        let e = parse("prev(byte(1) + byte(2) * 3)")
            .unwrap()
            .replace_variables(&mut scope)
            .unwrap();
        assert_eq!(e.to_string(), "prev(byte(1)) + prev(byte(2)) * 3");
    }

    #[test]
    fn bcd_rejects_constants() {
        let mut env = Environment::new();
        let mut scope = env.root();
        let err = parse("bcd(\"x\")")
            .unwrap()
            .replace_variables(&mut scope)
            .unwrap_err();
        assert!(err.innermost().message.starts_with("bcd can only be applied"));
    }
}
