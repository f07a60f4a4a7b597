//! Tree-walking evaluation.
//!
//! Three entry points on [`Expression`]:
//!
//! - [`Expression::replace_variables`] substitutes bindings and folds
//!   constants, leaving memory reads symbolic. Inside a trigger context
//!   every comparison it produces is normalized.
//! - [`Expression::evaluate`] runs statements, following control flow.
//! - [`Expression::is_true`] decides a condition when it is constant.

use crate::ast::{CompareOp, Dictionary, Expression, LogicalOp, MathOp};
use crate::error::{ParseError, Result};
use crate::functions::{FunctionDefinition, FunctionKind};
use crate::normalize::normalize_comparison;
use crate::scope::InterpreterScope;
use std::rc::Rc;

/// Outcome of running a statement.
enum Flow {
    Continue,
    Return(Expression),
}

impl Expression {
    pub fn replace_variables(&self, scope: &mut InterpreterScope) -> Result<Expression> {
        match self {
            Expression::Integer(_)
            | Expression::Float(_)
            | Expression::String(_)
            | Expression::Boolean(_)
            | Expression::Memory(_)
            | Expression::FunctionName(_)
            | Expression::FunctionDefinition(_) => Ok(self.clone()),

            Expression::Variable(name) => lookup_variable(name, scope),

            Expression::FunctionCall { name, args } => call_function(name, args, scope)?
                .ok_or_else(|| ParseError::runtime(format!("{} did not return a value", name))),

            Expression::Mathematic { left, op, right } => {
                let left = left.replace_variables(scope)?;
                let right = right.replace_variables(scope)?;
                fold_math(left, *op, right)
            }

            Expression::Comparison { left, op, right } => {
                let left = left.replace_variables(scope)?;
                let right = right.replace_variables(scope)?;
                if left.is_constant() && right.is_constant() {
                    return Ok(match compare_constants(&left, *op, &right) {
                        Some(b) => Expression::Boolean(b),
                        None => Expression::compare(left, *op, right),
                    });
                }
                if scope.is_trigger() {
                    normalize_comparison(left, *op, right)
                } else {
                    Ok(Expression::compare(left, *op, right))
                }
            }

            Expression::Logical { left, op, right } => {
                let left = left.replace_variables(scope)?;
                let right = right.replace_variables(scope)?;
                Ok(fold_logical(left, *op, right))
            }

            Expression::Not(inner) => negate(inner, scope),

            Expression::Dictionary(dict) => {
                let mut entries = Vec::with_capacity(dict.len());
                for (key, value) in dict.entries() {
                    entries.push((key.replace_variables(scope)?, value.replace_variables(scope)?));
                }
                Ok(Expression::Dictionary(Dictionary::new(entries)))
            }

            Expression::Index { target, key } => {
                let target = target.replace_variables(scope)?;
                let key = key.replace_variables(scope)?;
                index(&target, &key)
            }

            Expression::Conditional { .. }
            | Expression::Assignment { .. }
            | Expression::Return(_) => Err(ParseError::semantic(format!(
                "Statement has no value: {}",
                self
            ))),
        }
    }

    /// Execute the expression as a statement. Yields the returned value,
    /// or `None` when nothing was returned.
    pub fn evaluate(&self, scope: &mut InterpreterScope) -> Result<Option<Expression>> {
        match self {
            Expression::Assignment { .. }
            | Expression::Conditional { .. }
            | Expression::Return(_)
            | Expression::FunctionDefinition(_)
            | Expression::FunctionCall { .. } => Ok(match execute(self, scope)? {
                Flow::Return(value) => Some(value),
                Flow::Continue => None,
            }),
            other => other.replace_variables(scope).map(Some),
        }
    }

    /// `Some(b)` when the expression is statically `b`, `None` when it
    /// depends on memory or compares incompatible types.
    pub fn is_true(&self, scope: &mut InterpreterScope) -> Result<Option<bool>> {
        match self {
            Expression::Boolean(b) => Ok(Some(*b)),
            Expression::Comparison { left, op, right } => {
                let left = left.replace_variables(scope)?;
                let right = right.replace_variables(scope)?;
                if left.is_constant() && right.is_constant() {
                    Ok(compare_constants(&left, *op, &right))
                } else {
                    Ok(None)
                }
            }
            Expression::Logical { left, op, right } => {
                let l = left.is_true(scope)?;
                match (op, l) {
                    (LogicalOp::And, Some(false)) => return Ok(Some(false)),
                    (LogicalOp::Or, Some(true)) => return Ok(Some(true)),
                    _ => {}
                }
                let r = right.is_true(scope)?;
                Ok(match (op, l, r) {
                    (LogicalOp::And, _, Some(false)) => Some(false),
                    (LogicalOp::Or, _, Some(true)) => Some(true),
                    (_, Some(_), Some(b)) => Some(b),
                    _ => None,
                })
            }
            Expression::Not(inner) => Ok(inner.is_true(scope)?.map(|b| !b)),
            Expression::Variable(_) | Expression::FunctionCall { .. } | Expression::Index { .. } => {
                let value = self.replace_variables(scope)?;
                match value {
                    Expression::FunctionCall { ref name, .. } if name == "always_true" => Ok(Some(true)),
                    Expression::FunctionCall { ref name, .. } if name == "always_false" => {
                        Ok(Some(false))
                    }
                    Expression::Boolean(_) | Expression::Comparison { .. } | Expression::Logical { .. } => {
                        value.is_true(scope)
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

// ──────────────────────────────────────────────
// Statements
// ──────────────────────────────────────────────

fn execute(statement: &Expression, scope: &mut InterpreterScope) -> Result<Flow> {
    match statement {
        Expression::Assignment { target, value } => {
            let value = value.replace_variables(scope)?;
            assign(target, value, scope)?;
            Ok(Flow::Continue)
        }
        Expression::Return(value) => Ok(Flow::Return(value.replace_variables(scope)?)),
        Expression::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            let truth = condition.is_true(scope)?.ok_or_else(|| {
                ParseError::semantic(format!("Condition is not a constant boolean: {}", condition))
            })?;
            let branch = if truth { then_branch } else { else_branch };
            let mut block = scope.nested();
            execute_block(branch, &mut block)
        }
        Expression::FunctionDefinition(def) => {
            scope.add_function(Rc::clone(def));
            Ok(Flow::Continue)
        }
        Expression::FunctionCall { name, args } => {
            let def = resolve_function(name, scope)?;
            if let FunctionKind::Native(builtin) = def.kind {
                if builtin.is_trigger_only() && !scope.is_trigger() {
                    return Err(ParseError::semantic(format!(
                        "{} has no meaning outside of a trigger clause",
                        name
                    )));
                }
            }
            Ok(match invoke(&def, args, scope)? {
                Some(value) => Flow::Return(value),
                None => Flow::Continue,
            })
        }
        other => {
            other.replace_variables(scope)?;
            Ok(Flow::Continue)
        }
    }
}

fn execute_block(statements: &[Expression], scope: &mut InterpreterScope) -> Result<Flow> {
    for statement in statements {
        if let Flow::Return(value) = statement_flow(statement, scope)? {
            return Ok(Flow::Return(value));
        }
    }
    Ok(Flow::Continue)
}

/// Like [`execute`], but a call used as a statement never returns from
/// the enclosing block.
fn statement_flow(statement: &Expression, scope: &mut InterpreterScope) -> Result<Flow> {
    match (statement, execute(statement, scope)?) {
        (Expression::FunctionCall { .. }, _) => Ok(Flow::Continue),
        (_, flow) => Ok(flow),
    }
}

fn assign(target: &Expression, value: Expression, scope: &mut InterpreterScope) -> Result<()> {
    match target {
        Expression::Variable(name) => {
            scope.assign_variable(name, value);
            Ok(())
        }
        Expression::Index { target, key } => {
            let container = target.replace_variables(scope)?;
            let key = key.replace_variables(scope)?;
            match container {
                Expression::Dictionary(dict) => {
                    dict.insert(key, value);
                    Ok(())
                }
                other => Err(ParseError::semantic(format!("Cannot index {}", other))),
            }
        }
        other => Err(ParseError::semantic(format!("Cannot assign to {}", other))),
    }
}

// ──────────────────────────────────────────────
// Function calls
// ──────────────────────────────────────────────

fn lookup_variable(name: &str, scope: &InterpreterScope) -> Result<Expression> {
    if let Some(value) = scope.get_variable(name) {
        return Ok(value);
    }
    if scope.get_function(name).is_some() {
        return Ok(Expression::FunctionName(name.to_owned()));
    }
    Err(ParseError::binding(format!("Unknown variable: {}", name)))
}

fn resolve_function(name: &str, scope: &InterpreterScope) -> Result<Rc<FunctionDefinition>> {
    if let Some(def) = scope.get_function(name) {
        return Ok(def);
    }
    if let Some(Expression::FunctionName(target)) = scope.get_variable(name) {
        if let Some(def) = scope.get_function(&target) {
            return Ok(def);
        }
    }
    Err(ParseError::binding(format!("Unknown function: {}", name)))
}

fn call_function(
    name: &str,
    args: &[Expression],
    scope: &mut InterpreterScope,
) -> Result<Option<Expression>> {
    let def = resolve_function(name, scope)?;
    invoke(&def, args, scope)
}

fn invoke(
    def: &FunctionDefinition,
    args: &[Expression],
    scope: &mut InterpreterScope,
) -> Result<Option<Expression>> {
    let bound = def.bind_arguments(args, scope)?;
    match &def.kind {
        FunctionKind::Native(builtin) => builtin.invoke(&def.name, bound, scope),
        FunctionKind::UserDefined(body) => {
            let mut call = scope.call_scope();
            for (name, value) in bound {
                call.define_variable(&name, value);
            }
            let flow = execute_block(body, &mut call)
                .map_err(|e| ParseError::wrap(format!("{} call failed", def.name), e))?;
            Ok(match flow {
                Flow::Return(value) => Some(value),
                Flow::Continue => None,
            })
        }
    }
}

// ──────────────────────────────────────────────
// Folding
// ──────────────────────────────────────────────

fn as_text(e: &Expression) -> String {
    match e {
        Expression::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn fold_math(left: Expression, op: MathOp, right: Expression) -> Result<Expression> {
    use Expression::{Float, Integer};

    let overflow = || ParseError::semantic(format!("Integer overflow in {} {} {}", left, op.symbol(), right));
    match (&left, &right) {
        (Integer(a), Integer(b)) => {
            let (a, b) = (*a, *b);
            let value = match op {
                MathOp::Add => a.checked_add(b).ok_or_else(overflow)?,
                MathOp::Subtract => a.checked_sub(b).ok_or_else(overflow)?,
                MathOp::Multiply => a.checked_mul(b).ok_or_else(overflow)?,
                MathOp::Divide | MathOp::Modulus if b == 0 => {
                    return Err(ParseError::semantic("Division by zero"))
                }
                MathOp::Divide => a / b,
                MathOp::Modulus => a % b,
            };
            Ok(Integer(value))
        }
        (Integer(_) | Float(_), Integer(_) | Float(_)) => {
            let a = numeric(&left);
            let b = numeric(&right);
            let value = match op {
                MathOp::Add => a + b,
                MathOp::Subtract => a - b,
                MathOp::Multiply => a * b,
                MathOp::Divide | MathOp::Modulus if b == 0.0 => {
                    return Err(ParseError::semantic("Division by zero"))
                }
                MathOp::Divide => a / b,
                MathOp::Modulus => a % b,
            };
            Ok(Float(value))
        }
        (Expression::String(_), r) | (r, Expression::String(_)) if r.is_constant() => {
            if op == MathOp::Add {
                Ok(Expression::String(format!("{}{}", as_text(&left), as_text(&right))))
            } else {
                Err(ParseError::semantic(format!(
                    "Cannot apply '{}' to strings",
                    op.symbol()
                )))
            }
        }
        (_, Integer(0)) if matches!(op, MathOp::Add | MathOp::Subtract) => Ok(left),
        (Integer(0), _) if op == MathOp::Add => Ok(right),
        (_, Integer(1)) if matches!(op, MathOp::Multiply | MathOp::Divide) => Ok(left),
        _ => Ok(Expression::math(left, op, right)),
    }
}

fn numeric(e: &Expression) -> f64 {
    match e {
        Expression::Integer(n) => *n as f64,
        Expression::Float(f) => *f,
        _ => f64::NAN,
    }
}

/// Typed comparison of two constants. Numbers compare numerically,
/// strings lexically, booleans only for (in)equality. Anything else is
/// undecidable.
pub fn compare_constants(left: &Expression, op: CompareOp, right: &Expression) -> Option<bool> {
    match (left, right) {
        (Expression::Integer(a), Expression::Integer(b)) => Some(op.holds(a, b)),
        (Expression::Integer(_) | Expression::Float(_), Expression::Integer(_) | Expression::Float(_)) => {
            Some(op.holds(numeric(left), numeric(right)))
        }
        (Expression::String(a), Expression::String(b)) => Some(op.holds(a.as_str(), b.as_str())),
        (Expression::Boolean(a), Expression::Boolean(b)) => match op {
            CompareOp::Equal => Some(a == b),
            CompareOp::NotEqual => Some(a != b),
            _ => None,
        },
        _ => None,
    }
}

fn fold_logical(left: Expression, op: LogicalOp, right: Expression) -> Expression {
    match (op, &left, &right) {
        (LogicalOp::And, Expression::Boolean(false), _) | (LogicalOp::And, _, Expression::Boolean(false)) => {
            Expression::Boolean(false)
        }
        (LogicalOp::Or, Expression::Boolean(true), _) | (LogicalOp::Or, _, Expression::Boolean(true)) => {
            Expression::Boolean(true)
        }
        (LogicalOp::And, Expression::Boolean(true), _) | (LogicalOp::Or, Expression::Boolean(false), _) => {
            right
        }
        (LogicalOp::And, _, Expression::Boolean(true)) | (LogicalOp::Or, _, Expression::Boolean(false)) => {
            left
        }
        _ => Expression::logical(left, op, right),
    }
}

fn flip(op: LogicalOp) -> LogicalOp {
    match op {
        LogicalOp::And => LogicalOp::Or,
        LogicalOp::Or => LogicalOp::And,
    }
}

/// `!inner`: comparisons invert their operator, `&&`/`||` follow
/// De Morgan, constants negate.
fn negate(inner: &Expression, scope: &mut InterpreterScope) -> Result<Expression> {
    match inner {
        Expression::Comparison { left, op, right } => {
            Expression::compare((**left).clone(), op.invert(), (**right).clone()).replace_variables(scope)
        }
        Expression::Logical { left, op, right } => Expression::logical(
            Expression::Not(left.clone()),
            flip(*op),
            Expression::Not(right.clone()),
        )
        .replace_variables(scope),
        Expression::Not(x) => x.replace_variables(scope),
        other => invert_value(other.replace_variables(scope)?),
    }
}

fn invert_value(value: Expression) -> Result<Expression> {
    match value {
        Expression::Boolean(b) => Ok(Expression::Boolean(!b)),
        Expression::Comparison { left, op, right } => Ok(Expression::Comparison {
            left,
            op: op.invert(),
            right,
        }),
        Expression::Logical { left, op, right } => Ok(Expression::logical(
            invert_value(*left)?,
            flip(op),
            invert_value(*right)?,
        )),
        Expression::FunctionCall { ref name, .. } if name == "always_true" => {
            Ok(Expression::call("always_false", vec![]))
        }
        Expression::FunctionCall { ref name, .. } if name == "always_false" => {
            Ok(Expression::call("always_true", vec![]))
        }
        other => Err(ParseError::semantic(format!("Cannot apply '!' to {}", other))),
    }
}

fn index(target: &Expression, key: &Expression) -> Result<Expression> {
    match target {
        Expression::Dictionary(dict) => dict
            .get(key)
            .ok_or_else(|| ParseError::semantic(format!("No entry in dictionary for key: {}", key))),
        other => Err(ParseError::semantic(format!("Cannot index {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_script};
    use crate::scope::{Environment, EvaluationContext};

    fn replace(src: &str) -> Result<Expression> {
        let mut env = Environment::new();
        let mut scope = env.root();
        parse(src)?.replace_variables(&mut scope)
    }

    /// Run `script`, then evaluate `expr` in the same global scope.
    fn run(script: &str, expr: &str) -> Result<Option<Expression>> {
        let mut env = Environment::new();
        let mut scope = env.root();
        for statement in parse_script(script)?.statements {
            statement.expression.evaluate(&mut scope)?;
        }
        parse(expr)?.evaluate(&mut scope)
    }

    fn is_true(src: &str) -> Option<bool> {
        let mut env = Environment::new();
        let mut root = env.root();
        let mut scope = root.with_context(EvaluationContext::Trigger);
        parse(src).unwrap().is_true(&mut scope).unwrap()
    }

    #[test]
    fn integer_math_folds() {
        assert_eq!(replace("1 + 2 * 3").unwrap(), Expression::Integer(7));
        assert_eq!(replace("7 / 2").unwrap(), Expression::Integer(3));
        assert_eq!(replace("7 % 4").unwrap(), Expression::Integer(3));
        assert_eq!(replace("7 / 2.0").unwrap(), Expression::Float(3.5));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(replace("1 / 0").unwrap_err().message, "Division by zero");
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            replace("\"a\" + 1 + \"b\"").unwrap(),
            Expression::String("a1b".into())
        );
    }

    #[test]
    fn memory_reads_stay_symbolic() {
        assert_eq!(replace("byte(1) + 2 * 3").unwrap().to_string(), "byte(1) + 6");
        assert_eq!(
            replace("word(byte(2) + 1) == 3").unwrap().to_string(),
            "word(byte(2) + 1) == 3"
        );
    }

    #[test]
    fn comparisons_outside_triggers_are_not_normalized() {
        assert_eq!(
            replace("1 < byte(2)").unwrap().to_string(),
            "1 < byte(2)"
        );
    }

    #[test]
    fn unknown_names() {
        assert_eq!(replace("x + 1").unwrap_err().message, "Unknown variable: x");
        assert_eq!(replace("func(6)").unwrap_err().message, "Unknown function: func");
    }

    #[test]
    fn user_function_results() {
        let script = "function func(i) { return i * 2 }";
        assert_eq!(run(script, "func(6)").unwrap(), Some(Expression::Integer(12)));
        let script = "function func(i) { if (i < 3) return 4 else return 8 }";
        assert_eq!(run(script, "func(6)").unwrap(), Some(Expression::Integer(8)));
        assert_eq!(run(script, "func(2)").unwrap(), Some(Expression::Integer(4)));
    }

    #[test]
    fn unknown_variable_inside_function_keeps_innermost() {
        let err = run("function func(i) { return var == 3 }", "func(6)").unwrap_err();
        assert_eq!(err.message, "func call failed");
        assert_eq!(err.innermost().message, "Unknown variable: var");
        let err = run("function func(i) { return i }", "func(var == 6)").unwrap_err();
        assert_eq!(err.message, "Invalid value for parameter: i");
        assert_eq!(err.innermost().message, "Unknown variable: var");
    }

    #[test]
    fn function_without_return_has_no_value() {
        let script = "function func(i) { j = i }";
        assert_eq!(run(script, "func(6)").unwrap(), None);
        let mut env = Environment::new();
        let mut scope = env.root();
        for s in parse_script(script).unwrap().statements {
            s.expression.evaluate(&mut scope).unwrap();
        }
        let err = parse("func(6) + 1")
            .unwrap()
            .replace_variables(&mut scope)
            .unwrap_err();
        assert_eq!(err.innermost().message, "func did not return a value");
    }

    #[test]
    fn dictionaries_are_shared_with_callees() {
        let script = "
            notes = {}
            function remember(d, k, v) { d[k] = v }
            remember(notes, 1, \"one\")
            remember(notes, 2, \"two\")
        ";
        assert_eq!(
            run(script, "notes[2]").unwrap(),
            Some(Expression::String("two".into()))
        );
        assert_eq!(
            run(script, "notes").unwrap().map(|d| d.to_string()),
            Some("{1: \"one\", 2: \"two\"}".to_string())
        );
    }

    #[test]
    fn dictionary_literals_are_fresh_per_evaluation() {
        let script = "
            function make() { d = {} d[1] = 1 return d }
            a = make()
            a[2] = 2
            b = make()
        ";
        assert_eq!(
            run(script, "b").unwrap().map(|d| d.to_string()),
            Some("{1: 1}".to_string())
        );
    }

    #[test]
    fn missing_dictionary_key() {
        let err = run("d = {1: 2}", "d[3]").unwrap_err();
        assert_eq!(err.message, "No entry in dictionary for key: 3");
    }

    #[test]
    fn globals_are_visible_in_functions() {
        let script = "limit = 5 function over(x) => x > limit";
        assert_eq!(
            run(script, "over(byte(1))").unwrap().map(|e| e.to_string()),
            Some("byte(1) > 5".to_string())
        );
    }

    #[test]
    fn function_references_can_be_called() {
        let script = "function double(x) => x * 2 f = double";
        assert_eq!(run(script, "f(4)").unwrap(), Some(Expression::Integer(8)));
    }

    #[test]
    fn not_inverts_comparisons_and_applies_de_morgan() {
        assert_eq!(
            replace("!(byte(1) == 2)").unwrap().to_string(),
            "byte(1) != 2"
        );
        assert_eq!(
            replace("!(byte(1) < 2 || byte(2) >= 3)").unwrap().to_string(),
            "byte(1) >= 2 && byte(2) < 3"
        );
        assert_eq!(replace("!true").unwrap(), Expression::Boolean(false));
    }

    #[test]
    fn logical_constants_fold() {
        assert_eq!(
            replace("byte(1) == 2 && true").unwrap().to_string(),
            "byte(1) == 2"
        );
        assert_eq!(replace("byte(1) == 2 && false").unwrap(), Expression::Boolean(false));
    }

    #[test]
    fn trigger_only_functions_outside_trigger() {
        let err = run("", "once(byte(1) == 1)").unwrap_err();
        assert_eq!(err.message, "once has no meaning outside of a trigger clause");
    }

    #[test]
    fn typed_truth_of_constants() {
        let cases: &[(&str, Option<bool>)] = &[
            ("0 == 0", Some(true)),
            ("0 == 1", Some(false)),
            ("byte(0) == 0", None),
            ("0 == 0.0", Some(true)),
            ("0.0 == 1", Some(false)),
            ("1 <= 1", Some(true)),
            ("2 > 1", Some(true)),
            ("1.2 < 1.3", Some(true)),
            ("1.3 <= 1.2", Some(false)),
            ("1.2 == 1", Some(false)),
            ("1.2 >= 1", Some(true)),
            ("true == true", Some(true)),
            ("false != true", Some(true)),
            ("true < false", None),
            ("\"bbb\" == \"bbb\"", Some(true)),
            ("\"bbb\" > \"bba\"", Some(true)),
            ("\"bbb\" < \"bbbb\"", Some(true)),
            ("\"bba\" >= \"bbb\"", Some(false)),
            ("\"bbb\" == 0", None),
            ("\"bbb\" == -2.0", None),
            ("1 == \"bbb\"", None),
            ("2.0 == -2.0", Some(false)),
        ];
        for (src, expected) in cases {
            assert_eq!(is_true(src), *expected, "is_true({})", src);
        }
    }

    #[test]
    fn truth_through_user_functions() {
        let mut env = Environment::new();
        let mut scope = env.root();
        for s in parse_script("function t() => always_true() function f() => always_false()")
            .unwrap()
            .statements
        {
            s.expression.evaluate(&mut scope).unwrap();
        }
        assert_eq!(parse("t()").unwrap().is_true(&mut scope).unwrap(), Some(true));
        assert_eq!(parse("f()").unwrap().is_true(&mut scope).unwrap(), Some(false));
        assert_eq!(
            parse("t() && f()").unwrap().is_true(&mut scope).unwrap(),
            Some(false)
        );
    }
}
