// ABOUTME: Lexically-chained scopes holding const-enforcing variable cells

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::value::Value;

/// A binding slot. `is_const` is enforced only here, at the binding site —
/// constness is never a property of the `Value` itself, so a const string
/// and a mutable string are indistinguishable once read out of a cell.
#[derive(Debug)]
pub struct Cell {
    value: RefCell<Value>,
    pub is_const: bool,
}

impl Cell {
    pub fn new(value: Value, is_const: bool) -> Rc<Self> {
        Rc::new(Cell {
            value: RefCell::new(value),
            is_const,
        })
    }

    pub fn get(&self) -> Value {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: Value) -> Result<()> {
        if self.is_const {
            return Err(Error::name(
                "Cannot be reassigned, as it was declared as constant",
            ));
        }
        *self.value.borrow_mut() = value;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Rc<Cell>>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn contains_anywhere(&self, name: &str) -> bool {
        if self.contains_local(name) {
            return true;
        }
        match &self.parent {
            Some(p) => p.contains_anywhere(name),
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(cell) = self.bindings.borrow().get(name) {
            return Ok(cell.get());
        }
        match &self.parent {
            Some(p) => p.get(name),
            None => Err(Error::name(format!("'{name}' has not been declared"))),
        }
    }

    /// Declares a new binding in this scope. Errors if `name` is already
    /// bound locally — shadowing a parent scope's binding is fine, but
    /// redeclaring in the same scope is not.
    pub fn add_local(&self, name: impl Into<String>, value: Value, is_const: bool) -> Result<()> {
        let name = name.into();
        if self.contains_local(&name) {
            return Err(Error::name(format!("'{name}' is already in scope")));
        }
        self.bindings.borrow_mut().insert(name, Cell::new(value, is_const));
        Ok(())
    }

    /// Walks up the chain to the nearest scope that declares `name` and
    /// replaces its value there, honoring that cell's constness.
    pub fn update(&self, name: &str, value: Value) -> Result<()> {
        if let Some(cell) = self.bindings.borrow().get(name) {
            return cell.set(value);
        }
        match &self.parent {
            Some(p) => p.update(name, value),
            None => Err(Error::name(format!("'{name}' has not been declared"))),
        }
    }

    /// Injects a binding at the root of the chain, used to install builtins
    /// ahead of running any user source.
    pub fn add_global(self: &Rc<Self>, name: impl Into<String>, value: Value, is_const: bool) {
        let mut env: Rc<Environment> = Rc::clone(self);
        while let Some(p) = &env.parent {
            env = Rc::clone(p);
        }
        env.bindings
            .borrow_mut()
            .insert(name.into(), Cell::new(value, is_const));
    }

    pub fn remove(&self, name: &str) {
        self.bindings.borrow_mut().remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclaring_locally_is_an_error() {
        let env = Environment::new();
        env.add_local("x", Value::Int(1), false).unwrap();
        assert!(env.add_local("x", Value::Int(2), false).is_err());
    }

    #[test]
    fn child_scope_can_shadow_parent() {
        let parent = Environment::new();
        parent.add_local("x", Value::Int(1), false).unwrap();
        let child = Environment::with_parent(Rc::clone(&parent));
        child.add_local("x", Value::Int(2), false).unwrap();
        assert!(matches!(child.get("x"), Ok(Value::Int(2))));
        assert!(matches!(parent.get("x"), Ok(Value::Int(1))));
    }

    #[test]
    fn update_walks_up_to_defining_scope() {
        let parent = Environment::new();
        parent.add_local("x", Value::Int(1), false).unwrap();
        let child = Environment::with_parent(Rc::clone(&parent));
        child.update("x", Value::Int(9)).unwrap();
        assert!(matches!(parent.get("x"), Ok(Value::Int(9))));
    }

    #[test]
    fn updating_const_is_an_error() {
        let env = Environment::new();
        env.add_local("x", Value::Int(1), true).unwrap();
        assert!(env.update("x", Value::Int(2)).is_err());
    }

    #[test]
    fn undeclared_lookup_is_a_name_error() {
        let env = Environment::new();
        assert!(env.get("nope").is_err());
    }
}
