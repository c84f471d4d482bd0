// ABOUTME: The runtime value algebra: arithmetic, comparison and coercion rules

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::Node;
use crate::env::{Cell, Environment};
use crate::error::{Error, Result};
use crate::host::Host;

pub type BuiltinFn = Rc<dyn Fn(&Rc<Environment>, &RefCell<dyn Host>, &[Value]) -> Result<Value>>;

#[derive(Clone)]
pub struct FunctionValue {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<[Node]>,
    /// Function's defining scope is irrelevant here: calls build their
    /// environment from the caller's scope, not this one. Present only for
    /// builtins, which have no body to walk.
    pub builtin: Option<BuiltinFn>,
    pub is_const: bool,
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValue")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("builtin", &self.builtin.is_some())
            .finish()
    }
}

/// Doubles as both a structure's template and its instances — instantiation
/// deep-copies this field map into fresh cells rather than allocating a
/// separate instance type.
#[derive(Debug)]
pub struct StructValue {
    pub name: String,
    pub fields: RefCell<IndexMap<String, Rc<Cell>>>,
}

impl StructValue {
    /// Deep-copies the field map into fresh cells, preserving each field's
    /// const flag and current value. Field values are not recursively
    /// cloned beyond that — a `List` field is shared, not duplicated.
    pub fn instantiate(&self) -> Rc<StructValue> {
        let mut fields = IndexMap::new();
        for (name, cell) in self.fields.borrow().iter() {
            fields.insert(name.clone(), Cell::new(cell.get(), cell.is_const));
        }
        Rc::new(StructValue {
            name: self.name.clone(),
            fields: RefCell::new(fields),
        })
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Function(Rc<FunctionValue>),
    Struct(Rc<StructValue>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// `typeof()`: a struct instance reports its own declared name, not a
    /// generic tag.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Function(_) => "Function",
            Value::Struct(s) => &s.name,
        }
    }

    pub fn is_true(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Function(_) | Value::Struct(_) => true,
        }
    }

    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Str(s) => s.to_string(),
            Value::List(l) => {
                let items: Vec<String> = l.borrow().iter().map(Value::display_string).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Function(f) => format!("<function {}>", f.name),
            Value::Struct(s) => format!("<{} instance>", s.name),
        }
    }

    fn as_numeric_pair(&self, other: &Value) -> Option<(f64, f64, bool)> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some((*a as f64, *b as f64, true)),
            (Value::Int(a), Value::Float(b)) => Some((*a as f64, *b, false)),
            (Value::Float(a), Value::Int(b)) => Some((*a, *b as f64, false)),
            (Value::Float(a), Value::Float(b)) => Some((*a, *b, false)),
            _ => None,
        }
    }

    /// A deliberately surprising overload: `+` on a `List` appends the
    /// right operand in place and hands back `Null`, rather than producing
    /// a new list.
    pub fn add(&self, other: &Value) -> Result<Value> {
        if let Value::List(items) = self {
            items.borrow_mut().push(other.clone());
            return Ok(Value::Null);
        }
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Ok(Value::string(format!("{a}{b}")));
        }
        if let Value::Str(a) = self {
            return Ok(Value::string(format!("{a}{}", other.display_string())));
        }
        if let Value::Str(b) = other {
            return Ok(Value::string(format!("{}{b}", self.display_string())));
        }
        match self.as_numeric_pair(other) {
            Some((a, b, true)) => Ok(Value::Int(a as i64 + b as i64)),
            Some((a, b, false)) => Ok(Value::Float(a + b)),
            None => Err(Error::illegal_operation("+", self.type_name())),
        }
    }

    /// `-` on a `List` with an `Int` right-hand side removes the element at
    /// that index in place, rather than subtracting anything.
    pub fn sub(&self, other: &Value) -> Result<Value> {
        if let Value::List(items) = self {
            return match other {
                Value::Int(idx) => {
                    let mut list = items.borrow_mut();
                    let i = usize::try_from(*idx)
                        .ok()
                        .filter(|i| *i < list.len())
                        .ok_or_else(|| Error::bounds(format!("Index {idx} out of bounds")))?;
                    list.remove(i);
                    Ok(Value::Null)
                }
                other => Err(Error::illegal_operation("-", other.type_name())),
            };
        }
        match self.as_numeric_pair(other) {
            Some((a, b, true)) => Ok(Value::Int(a as i64 - b as i64)),
            Some((a, b, false)) => Ok(Value::Float(a - b)),
            None => Err(Error::illegal_operation("-", self.type_name())),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        match self.as_numeric_pair(other) {
            Some((a, b, true)) => Ok(Value::Int(a as i64 * b as i64)),
            Some((a, b, false)) => Ok(Value::Float(a * b)),
            None => Err(Error::illegal_operation("*", self.type_name())),
        }
    }

    pub fn div(&self, other: &Value) -> Result<Value> {
        match self.as_numeric_pair(other) {
            Some((a, b, true)) => {
                if b == 0.0 {
                    return Err(Error::type_error("Division by zero"));
                }
                Ok(Value::Int(a as i64 / b as i64))
            }
            Some((a, b, false)) => {
                if b == 0.0 {
                    return Err(Error::type_error("Division by zero"));
                }
                Ok(Value::Float(a / b))
            }
            None => Err(Error::illegal_operation("/", self.type_name())),
        }
    }

    /// `^` always returns a `Float`, regardless of operand kinds.
    pub fn pow(&self, other: &Value) -> Result<Value> {
        match self.as_numeric_pair(other) {
            Some((a, b, _)) => Ok(Value::Float(a.powf(b))),
            None => Err(Error::illegal_operation("^", self.type_name())),
        }
    }

    /// `%` always returns a `Float`, regardless of operand kinds.
    pub fn modulo(&self, other: &Value) -> Result<Value> {
        match self.as_numeric_pair(other) {
            Some((a, b, _)) => {
                if b == 0.0 {
                    return Err(Error::type_error("Division by zero"));
                }
                Ok(Value::Float(a % b))
            }
            None => Err(Error::illegal_operation("%", self.type_name())),
        }
    }

    pub fn neg(&self) -> Result<Value> {
        match self {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(n) => Ok(Value::Float(-n)),
            _ => Err(Error::illegal_operation("-", self.type_name())),
        }
    }

    pub fn not(&self) -> Value {
        Value::Boolean(!self.is_true())
    }

    /// `&&`/`||` are not short-circuiting: both operands are evaluated by
    /// the caller before this is invoked.
    pub fn and(&self, other: &Value) -> Value {
        Value::Boolean(self.is_true() && other.is_true())
    }

    pub fn or(&self, other: &Value) -> Value {
        Value::Boolean(self.is_true() || other.is_true())
    }

    pub fn lt(&self, other: &Value) -> Result<Value> {
        self.compare(other, "<", |o| o == std::cmp::Ordering::Less)
    }

    pub fn gt(&self, other: &Value) -> Result<Value> {
        self.compare(other, ">", |o| o == std::cmp::Ordering::Greater)
    }

    pub fn lte(&self, other: &Value) -> Result<Value> {
        self.compare(other, "<=", |o| o != std::cmp::Ordering::Greater)
    }

    pub fn gte(&self, other: &Value) -> Result<Value> {
        self.compare(other, ">=", |o| o != std::cmp::Ordering::Less)
    }

    /// Numeric pairs compare by value; a `Str`/`Str` pair compares
    /// lexicographically, matching the original's `String::compare_*`.
    fn compare(&self, other: &Value, op: &str, f: impl Fn(std::cmp::Ordering) -> bool) -> Result<Value> {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Ok(Value::Boolean(f(a.as_ref().cmp(b.as_ref()))));
        }
        match self.as_numeric_pair(other) {
            Some((a, b, _)) => Ok(Value::Boolean(f(a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)))),
            None => Err(Error::illegal_operation(op, self.type_name())),
        }
    }

    /// Equality across matching-kind pairs. `Null == Null` is a documented
    /// design fix over the original (whose `NullType` never actually
    /// reached an equality check). Function and Struct values compare by
    /// identity — two separately-declared functions or two separately
    /// instantiated structures are never equal, even with identical bodies
    /// or fields.
    fn values_equal(&self, other: &Value) -> Result<bool> {
        Ok(match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    true
                } else {
                    let (a, b) = (a.borrow(), b.borrow());
                    if a.len() != b.len() {
                        false
                    } else {
                        let mut all_eq = true;
                        for (x, y) in a.iter().zip(b.iter()) {
                            if !x.values_equal(y)? {
                                all_eq = false;
                                break;
                            }
                        }
                        all_eq
                    }
                }
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Struct(a), Value::Struct(b)) => Rc::ptr_eq(a, b),
            _ => return Err(Error::illegal_operation("==", self.type_name())),
        })
    }

    pub fn eq(&self, other: &Value) -> Result<Value> {
        Ok(Value::Boolean(self.values_equal(other)?))
    }

    pub fn ne(&self, other: &Value) -> Result<Value> {
        Ok(Value::Boolean(!self.values_equal(other)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_plus_appends_and_returns_null() {
        let list = Value::list(vec![Value::Int(1)]);
        let result = list.add(&Value::Int(2)).unwrap();
        assert!(matches!(result, Value::Null));
        if let Value::List(items) = &list {
            assert_eq!(items.borrow().len(), 2);
        } else {
            panic!("not a list");
        }
    }

    #[test]
    fn list_minus_int_removes_by_index() {
        let list = Value::list(vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
        let result = list.sub(&Value::Int(1)).unwrap();
        assert!(matches!(result, Value::Null));
        if let Value::List(items) = &list {
            let items = items.borrow();
            assert_eq!(items.len(), 2);
            assert!(matches!(items[0], Value::Int(10)));
            assert!(matches!(items[1], Value::Int(30)));
        } else {
            panic!("not a list");
        }
    }

    #[test]
    fn list_minus_out_of_range_is_bounds_error() {
        let list = Value::list(vec![Value::Int(1)]);
        assert!(list.sub(&Value::Int(5)).is_err());
    }

    #[test]
    fn null_equals_null() {
        assert!(Value::Null.eq(&Value::Null).unwrap().is_true());
    }

    #[test]
    fn pow_and_modulo_always_yield_float() {
        assert!(matches!(Value::Int(2).pow(&Value::Int(3)).unwrap(), Value::Float(_)));
        assert!(matches!(Value::Int(5).modulo(&Value::Int(2)).unwrap(), Value::Float(_)));
    }

    #[test]
    fn int_plus_string_coerces_to_string() {
        let result = Value::Int(1).add(&Value::string("x")).unwrap();
        assert_eq!(result.display_string(), "1x");
    }

    #[test]
    fn strings_compare_lexicographically() {
        assert!(Value::string("a").lt(&Value::string("b")).unwrap().is_true());
        assert!(!Value::string("b").lt(&Value::string("a")).unwrap().is_true());
        assert!(Value::string("b").gt(&Value::string("a")).unwrap().is_true());
    }

    #[test]
    fn functions_compare_by_identity() {
        let f = Rc::new(FunctionValue {
            name: "f".to_string(),
            params: Vec::new(),
            body: Rc::from(Vec::new().into_boxed_slice()),
            builtin: None,
            is_const: false,
        });
        let a = Value::Function(Rc::clone(&f));
        let b = Value::Function(Rc::clone(&f));
        let c = Value::Function(Rc::new(FunctionValue {
            name: "f".to_string(),
            params: Vec::new(),
            body: Rc::from(Vec::new().into_boxed_slice()),
            builtin: None,
            is_const: false,
        }));
        assert!(a.eq(&b).unwrap().is_true());
        assert!(!a.eq(&c).unwrap().is_true());
    }
}
