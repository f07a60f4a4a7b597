//! Lexical environments.
//!
//! All frames live in one arena ([`Environment`]); a frame refers to its
//! parent by index. An [`InterpreterScope`] is a handle to one frame that
//! borrows the arena mutably, so nested scopes follow strict stack order
//! and a frame is popped when its handle is dropped.

use crate::ast::Expression;
use crate::functions::{builtin_functions, FunctionDefinition};
use crate::requirement::Achievement;
use std::collections::BTreeMap;
use std::rc::Rc;

pub type ScopeId = usize;

/// What the expressions in a scope are being evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationContext {
    /// Comparisons are normalized for the trigger builder.
    Trigger,
}

#[derive(Debug, Default)]
struct Frame {
    parent: Option<ScopeId>,
    variables: BTreeMap<String, Expression>,
    functions: BTreeMap<String, Rc<FunctionDefinition>>,
    context: Option<EvaluationContext>,
}

/// Frame arena plus the achievements recorded while running a script.
#[derive(Debug)]
pub struct Environment {
    frames: Vec<Frame>,
    achievements: Vec<Achievement>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    /// An environment whose root frame holds the built-in functions.
    pub fn new() -> Self {
        let mut root = Frame::default();
        for def in builtin_functions() {
            root.functions.insert(def.name.clone(), Rc::new(def));
        }
        Environment {
            frames: vec![root],
            achievements: Vec::new(),
        }
    }

    /// An environment with no functions at all.
    pub fn empty() -> Self {
        Environment {
            frames: vec![Frame::default()],
            achievements: Vec::new(),
        }
    }

    pub fn root(&mut self) -> InterpreterScope<'_> {
        self.frames.truncate(1);
        InterpreterScope {
            env: self,
            id: 0,
            owned: false,
        }
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    pub fn into_achievements(self) -> Vec<Achievement> {
        self.achievements
    }
}

pub struct InterpreterScope<'env> {
    env: &'env mut Environment,
    id: ScopeId,
    owned: bool,
}

impl Drop for InterpreterScope<'_> {
    fn drop(&mut self) {
        if self.owned {
            self.env.frames.truncate(self.id);
        }
    }
}

impl<'env> InterpreterScope<'env> {
    fn push(&mut self, parent: ScopeId, context: Option<EvaluationContext>) -> InterpreterScope<'_> {
        let id = self.env.frames.len();
        self.env.frames.push(Frame {
            parent: Some(parent),
            context,
            ..Frame::default()
        });
        InterpreterScope {
            env: &mut *self.env,
            id,
            owned: true,
        }
    }

    fn frame(&self) -> &Frame {
        &self.env.frames[self.id]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        &mut self.env.frames[self.id]
    }

    fn chain(&self) -> impl Iterator<Item = &Frame> {
        let frames = &self.env.frames;
        std::iter::successors(Some(&frames[self.id]), move |f| f.parent.map(|p| &frames[p]))
    }

    /// A block scope: sees this scope's variables and context.
    pub fn nested(&mut self) -> InterpreterScope<'_> {
        let context = self.context();
        self.push(self.id, context)
    }

    /// A function-call scope: parented on the global frame, keeping the
    /// caller's evaluation context.
    pub fn call_scope(&mut self) -> InterpreterScope<'_> {
        let context = self.context();
        self.push(0, context)
    }

    /// A block scope evaluating under `context`.
    pub fn with_context(&mut self, context: EvaluationContext) -> InterpreterScope<'_> {
        self.push(self.id, Some(context))
    }

    pub fn context(&self) -> Option<EvaluationContext> {
        self.frame().context
    }

    pub fn is_trigger(&self) -> bool {
        self.context() == Some(EvaluationContext::Trigger)
    }

    pub fn get_variable(&self, name: &str) -> Option<Expression> {
        self.chain().find_map(|f| f.variables.get(name).cloned())
    }

    /// Bind `name` in this frame, shadowing any outer binding.
    pub fn define_variable(&mut self, name: &str, value: Expression) {
        self.frame_mut().variables.insert(name.to_owned(), value);
    }

    /// Update the nearest existing binding of `name`, or bind it here.
    pub fn assign_variable(&mut self, name: &str, value: Expression) {
        let mut cursor = Some(self.id);
        while let Some(id) = cursor {
            let frame = &mut self.env.frames[id];
            if let Some(slot) = frame.variables.get_mut(name) {
                *slot = value;
                return;
            }
            cursor = frame.parent;
        }
        self.define_variable(name, value);
    }

    pub fn variable_count(&self) -> usize {
        self.frame().variables.len()
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<FunctionDefinition>> {
        self.chain().find_map(|f| f.functions.get(name).cloned())
    }

    pub fn add_function(&mut self, def: Rc<FunctionDefinition>) {
        self.frame_mut().functions.insert(def.name.clone(), def);
    }

    pub fn record_achievement(&mut self, achievement: Achievement) {
        log::debug!("recorded achievement '{}'", achievement.title);
        self.env.achievements.push(achievement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parents() {
        let mut env = Environment::empty();
        let mut root = env.root();
        root.define_variable("a", Expression::Integer(1));
        let mut inner = root.nested();
        inner.define_variable("b", Expression::Integer(2));
        assert_eq!(inner.get_variable("a"), Some(Expression::Integer(1)));
        assert_eq!(inner.get_variable("b"), Some(Expression::Integer(2)));
        drop(inner);
        assert_eq!(root.get_variable("b"), None);
    }

    #[test]
    fn assignment_updates_existing_ancestor_binding() {
        let mut env = Environment::empty();
        let mut root = env.root();
        root.define_variable("a", Expression::Integer(1));
        {
            let mut inner = root.nested();
            inner.assign_variable("a", Expression::Integer(5));
            inner.assign_variable("c", Expression::Integer(7));
            assert_eq!(inner.variable_count(), 1);
        }
        assert_eq!(root.get_variable("a"), Some(Expression::Integer(5)));
        assert_eq!(root.get_variable("c"), None);
    }

    #[test]
    fn call_scope_does_not_see_caller_locals() {
        let mut env = Environment::empty();
        let mut root = env.root();
        root.define_variable("global", Expression::Integer(1));
        let mut caller = root.nested();
        caller.define_variable("local", Expression::Integer(2));
        let mut trigger = caller.with_context(EvaluationContext::Trigger);
        let callee = trigger.call_scope();
        assert_eq!(callee.get_variable("global"), Some(Expression::Integer(1)));
        assert_eq!(callee.get_variable("local"), None);
        assert!(callee.is_trigger());
    }

    #[test]
    fn builtins_live_in_root() {
        let mut env = Environment::new();
        let root = env.root();
        assert!(root.get_function("byte").is_some());
        assert!(root.get_function("prev").is_some());
        assert!(root.get_function("nope").is_none());
    }
}
