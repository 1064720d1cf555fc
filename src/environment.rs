// ABOUTME: Parent-linked lexical scope chain supporting shadowing and closures

use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new global environment with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a new child environment with a parent.
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Defines a binding in THIS scope. Redefining a name already present in
    /// this same scope is an error (spec §4.3/§7); shadowing a binding from
    /// an enclosing scope is not.
    pub fn define(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return Err(RuntimeError::new(RuntimeErrorKind::AlreadyDefined {
                name: name.to_string(),
            }));
        }
        bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Looks up a name in this scope, then parent scopes recursively.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Assigns into the innermost enclosing scope that already defines
    /// `name`, walking the parent chain. Never creates a new binding.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if self.bindings.borrow().contains_key(name) {
            self.bindings.borrow_mut().insert(name.to_string(), value);
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(RuntimeError::new(RuntimeErrorKind::UndefinedVariable(
                name.to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.define("x", Value::Number(42.0)).unwrap();
        assert_eq!(env.get("x"), Some(Value::Number(42.0)));
    }

    #[test]
    fn test_undefined_name_is_none() {
        let env = Environment::new();
        assert!(env.get("undefined").is_none());
    }

    #[test]
    fn test_redefinition_in_same_scope_is_an_error() {
        let env = Environment::new();
        env.define("x", Value::Number(1.0)).unwrap();
        assert!(env.define("x", Value::Number(2.0)).is_err());
    }

    #[test]
    fn test_shadowing_in_child_scope_is_allowed() {
        let parent = Environment::new();
        parent.define("x", Value::Number(1.0)).unwrap();

        let child = Environment::with_parent(parent.clone());
        child.define("x", Value::Number(2.0)).unwrap();

        assert_eq!(child.get("x"), Some(Value::Number(2.0)));
        assert_eq!(parent.get("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_parent_lookup_through_multiple_levels() {
        let grandparent = Environment::new();
        grandparent.define("a", Value::Number(1.0)).unwrap();

        let parent = Environment::with_parent(grandparent);
        parent.define("b", Value::Number(2.0)).unwrap();

        let child = Environment::with_parent(parent);
        child.define("c", Value::Number(3.0)).unwrap();

        assert_eq!(child.get("a"), Some(Value::Number(1.0)));
        assert_eq!(child.get("b"), Some(Value::Number(2.0)));
        assert_eq!(child.get("c"), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_assign_mutates_the_defining_scope_not_the_child() {
        let parent = Environment::new();
        parent.define("x", Value::Number(1.0)).unwrap();

        let child = Environment::with_parent(parent.clone());
        child.assign("x", Value::Number(9.0)).unwrap();

        assert_eq!(parent.get("x"), Some(Value::Number(9.0)));
        assert_eq!(child.get("x"), Some(Value::Number(9.0)));
    }

    #[test]
    fn test_assign_to_undefined_name_is_an_error() {
        let env = Environment::new();
        assert!(env.assign("missing", Value::Null).is_err());
    }
}
