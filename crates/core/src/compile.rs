//! Whole-script entry points.

use crate::ast::{Expression, Script};
use crate::builder::{lower_trigger, normalize_trigger};
use crate::error::Result;
use crate::parser::{parse, parse_script};
use crate::requirement::{Achievement, Trigger};
use crate::scope::Environment;

/// Parse and run `source`, returning the achievements it declares in
/// declaration order.
pub fn compile_script(source: &str) -> Result<Vec<Achievement>> {
    let script = parse_script(source)?;
    let mut env = Environment::new();
    run_script(&script, &mut env)?;
    let achievements = env.into_achievements();
    log::info!("compiled {} achievement(s)", achievements.len());
    Ok(achievements)
}

/// Run every top-level statement in the root scope of `env`. Errors are
/// stamped with the position of the failing statement unless they
/// already carry one.
pub fn run_script(script: &Script, env: &mut Environment) -> Result<()> {
    let mut scope = env.root();
    for statement in &script.statements {
        log::trace!("{}: {}", statement.position, statement.expression);
        statement
            .expression
            .evaluate(&mut scope)
            .map_err(|e| e.with_position_if_absent(statement.position))?;
    }
    Ok(())
}

/// Compile a single trigger expression, optionally after running a
/// script that defines the names it uses. Returns the normalized
/// expression alongside the lowered trigger.
pub fn compile_trigger(prelude: Option<&str>, expression: &str) -> Result<(Expression, Trigger)> {
    let mut env = Environment::new();
    if let Some(source) = prelude {
        run_script(&parse_script(source)?, &mut env)?;
    }
    let expr = parse(expression)?;
    let mut scope = env.root();
    let normalized = normalize_trigger(&expr, &mut scope)?;
    let trigger = lower_trigger(&normalized)?;
    Ok((normalized, trigger))
}
