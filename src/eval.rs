// ABOUTME: Tree-walking evaluator dispatching on AST node kind

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Node, NodeKind};
use crate::env::{Cell, Environment};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::value::{FunctionValue, StructValue, Value};

/// Replaces the original's mutable `should_return`/`should_break`/
/// `should_continue` flags with an algebraic signal a statement hands back
/// to its caller. `Normal` is the only variant a block keeps executing
/// past; anything else unwinds until something consumes it.
#[derive(Debug)]
enum StepResult {
    Normal(Value),
    Returning(Value),
    Breaking,
    Continuing,
}

pub struct Evaluator {
    host: Rc<RefCell<dyn Host>>,
}

impl Evaluator {
    pub fn new(host: Rc<RefCell<dyn Host>>) -> Self {
        Evaluator { host }
    }

    /// Runs a whole program (or REPL chunk) in the given scope.
    pub fn run(&self, nodes: &[Node], env: &Rc<Environment>) -> Result<Value> {
        match self.exec_body(nodes, env)? {
            StepResult::Normal(v) => Ok(v),
            StepResult::Returning(v) => Ok(v),
            StepResult::Breaking | StepResult::Continuing => Ok(Value::Null),
        }
    }

    /// Executes statements in order, stopping as soon as one produces a
    /// non-`Normal` result and propagating it upward unconsumed — only the
    /// construct that understands it (a loop, a function call) converts it
    /// back into a plain value.
    fn exec_body(&self, nodes: &[Node], env: &Rc<Environment>) -> Result<StepResult> {
        let mut last = StepResult::Normal(Value::Null);
        for node in nodes {
            last = self.eval(node, env)?;
            if !matches!(last, StepResult::Normal(_)) {
                return Ok(last);
            }
        }
        Ok(last)
    }

    /// Evaluates a node expected to be in expression position. Only
    /// well-formed programs reach here with a control-flow node, since the
    /// parser only admits `Return`/`Break`/`Continue` at statement
    /// position.
    fn eval_value(&self, node: &Node, env: &Rc<Environment>) -> Result<Value> {
        match self.eval(node, env)? {
            StepResult::Normal(v) => Ok(v),
            _ => Ok(Value::Null),
        }
    }

    fn eval(&self, node: &Node, env: &Rc<Environment>) -> Result<StepResult> {
        let value = match &node.kind {
            NodeKind::VectorWrapper(nodes) => return self.exec_body(nodes, env),

            NodeKind::Int(n) => Value::Int(*n),
            NodeKind::Float(n) => Value::Float(*n),
            NodeKind::String(s) => Value::string(s.clone()),
            NodeKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_value(item, env)?);
                }
                Value::list(values)
            }

            NodeKind::UnaryOp { op, operand } => {
                let v = self.eval_value(operand, env)?;
                match op.as_str() {
                    "+" => v,
                    "-" => v.neg()?,
                    "!" => v.not(),
                    other => {
                        return Err(Error::type_error(format!("Unknown unary operator '{other}'")))
                    }
                }
            }
            NodeKind::BinOp { left, op, right } => {
                let l = self.eval_value(left, env)?;
                let r = self.eval_value(right, env)?;
                self.apply_binop(&l, op, &r)?
            }

            NodeKind::VarDeclaration {
                name,
                initializer,
                is_const,
            } => {
                let v = self.eval_value(initializer, env)?;
                env.add_local(name.clone(), v.clone(), *is_const)?;
                v
            }
            NodeKind::VarAssign { name, expr } => {
                let v = self.eval_value(expr, env)?;
                env.update(name, v.clone())?;
                v
            }
            NodeKind::VarAccess { name } => env.get(name)?,

            NodeKind::AttributeAccess { target, field } => self.get_attribute(target, field, env)?,
            NodeKind::AttributeAssign { target, value } => {
                self.set_attribute(target, value, env)?
            }
            NodeKind::IndexAccess { target, index } => self.index_access(target, index, env)?,

            NodeKind::If { cases, else_body } => return self.eval_if(cases, else_body, env),
            NodeKind::For {
                init,
                cond,
                update,
                body,
            } => return self.eval_for(init, cond, update, body, env),
            NodeKind::While { cond, body } => return self.eval_while(cond, body, env),

            NodeKind::FunctionDef { name, params, body } => {
                let function = FunctionValue {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::from(body.clone().into_boxed_slice()),
                    builtin: None,
                    is_const: false,
                };
                env.add_local(name.clone(), Value::Function(Rc::new(function)), false)?;
                Value::Null
            }
            NodeKind::FunctionCall { callee, args } => self.call(callee, args, env)?,

            NodeKind::Return(expr) => {
                let v = match expr {
                    Some(e) => self.eval_value(e, env)?,
                    None => Value::Null,
                };
                return Ok(StepResult::Returning(v));
            }
            NodeKind::Break => return Ok(StepResult::Breaking),
            NodeKind::Continue => return Ok(StepResult::Continuing),

            NodeKind::StructureDef { name, members } => self.define_structure(name, members, env)?,
            NodeKind::ConstructorCall(inner) => self.construct(inner, env)?,

            NodeKind::Import { .. } => Value::Null,
        };
        Ok(StepResult::Normal(value))
    }

    fn apply_binop(&self, left: &Value, op: &str, right: &Value) -> Result<Value> {
        match op {
            "+" => left.add(right),
            "-" => left.sub(right),
            "*" => left.mul(right),
            "/" => left.div(right),
            "%" => left.modulo(right),
            "^" => left.pow(right),
            "<" => left.lt(right),
            ">" => left.gt(right),
            "<=" => left.lte(right),
            ">=" => left.gte(right),
            "==" => left.eq(right),
            "!=" => left.ne(right),
            "&&" => Ok(left.and(right)),
            "||" => Ok(left.or(right)),
            other => Err(Error::type_error(format!("Unknown binary operator '{other}'"))),
        }
    }

    fn get_attribute(&self, target: &Node, field: &str, env: &Rc<Environment>) -> Result<Value> {
        let owner = self.eval_value(target, env)?;
        match owner {
            Value::Struct(s) => {
                let fields = s.fields.borrow();
                match fields.get(field) {
                    Some(cell) => Ok(cell.get()),
                    None => Err(Error::name(format!(
                        "'{field}' is not a member of '{}'",
                        s.name
                    ))),
                }
            }
            other => Err(Error::illegal_operation(".", other.type_name())),
        }
    }

    /// `target` here is the `AttributeAccess` node this assignment wraps —
    /// its own target is the expression producing the struct instance.
    fn set_attribute(&self, target: &Node, value: &Node, env: &Rc<Environment>) -> Result<Value> {
        let (owner_node, field) = match &target.kind {
            NodeKind::AttributeAccess { target, field } => (target.as_ref(), field),
            _ => return Err(Error::type_error("Invalid assignment target")),
        };
        let owner = self.eval_value(owner_node, env)?;
        let v = self.eval_value(value, env)?;
        match owner {
            Value::Struct(s) => {
                let fields = s.fields.borrow();
                match fields.get(field) {
                    Some(cell) => {
                        cell.set(v.clone())?;
                        Ok(v)
                    }
                    None => Err(Error::name(format!(
                        "'{field}' is not a member of '{}'",
                        s.name
                    ))),
                }
            }
            other => Err(Error::illegal_operation(".", other.type_name())),
        }
    }

    /// Lists and Strings both accept `Int` indices in `[0, length)`;
    /// indexing a String yields a single-character String.
    fn index_access(&self, target: &Node, index: &Node, env: &Rc<Environment>) -> Result<Value> {
        let t = self.eval_value(target, env)?;
        let idx_value = self.eval_value(index, env)?;
        let idx = match idx_value {
            Value::Int(n) => n,
            other => {
                return Err(Error::bounds(format!(
                    "Index must be an Int, got {}",
                    other.type_name()
                )))
            }
        };
        match t {
            Value::List(items) => {
                let items = items.borrow();
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .ok_or_else(|| Error::bounds(format!("Index {idx} out of bounds")))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| chars.get(i))
                    .map(|c| Value::string(c.to_string()))
                    .ok_or_else(|| Error::bounds(format!("Index {idx} out of bounds")))
            }
            other => Err(Error::illegal_operation("[]", other.type_name())),
        }
    }

    fn eval_if(
        &self,
        cases: &[(Node, Vec<Node>)],
        else_body: &[Node],
        env: &Rc<Environment>,
    ) -> Result<StepResult> {
        for (cond, body) in cases {
            if self.eval_value(cond, env)?.is_true() {
                let scope = Environment::with_parent(Rc::clone(env));
                return self.exec_body(body, &scope);
            }
        }
        let scope = Environment::with_parent(Rc::clone(env));
        self.exec_body(else_body, &scope)
    }

    /// `for` allocates one scope for its init statement (shared by the
    /// condition check and the update expression across iterations) and a
    /// fresh child scope per iteration for the body — so a variable
    /// declared inside the loop body doesn't leak to the next iteration,
    /// but the loop counter does.
    fn eval_for(
        &self,
        init: &Node,
        cond: &Node,
        update: &Node,
        body: &[Node],
        env: &Rc<Environment>,
    ) -> Result<StepResult> {
        let scope = Environment::with_parent(Rc::clone(env));
        self.eval(init, &scope)?;
        loop {
            if !self.eval_value(cond, &scope)?.is_true() {
                break;
            }
            let iteration = Environment::with_parent(Rc::clone(&scope));
            match self.exec_body(body, &iteration)? {
                StepResult::Breaking => break,
                StepResult::Continuing | StepResult::Normal(_) => {}
                returning @ StepResult::Returning(_) => return Ok(returning),
            }
            self.eval(update, &iteration)?;
        }
        Ok(StepResult::Normal(Value::Null))
    }

    fn eval_while(&self, cond: &Node, body: &[Node], env: &Rc<Environment>) -> Result<StepResult> {
        loop {
            if !self.eval_value(cond, env)?.is_true() {
                break;
            }
            let iteration = Environment::with_parent(Rc::clone(env));
            match self.exec_body(body, &iteration)? {
                StepResult::Breaking => break,
                StepResult::Continuing | StepResult::Normal(_) => {}
                returning @ StepResult::Returning(_) => return Ok(returning),
            }
        }
        Ok(StepResult::Normal(Value::Null))
    }

    fn call(&self, callee: &Node, args: &[Node], env: &Rc<Environment>) -> Result<Value> {
        let callee_value = self.eval_value(callee, env)?;
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval_value(arg, env)?);
        }
        match callee_value {
            Value::Function(f) => self.invoke(&f, &arg_values, env),
            other => Err(Error::type_error(format!(
                "'{}' is not callable",
                other.type_name()
            ))),
        }
    }

    /// Allocates a fresh child scope of the *caller's* current scope —
    /// functions close over their call site, not their definition site.
    fn invoke(&self, f: &FunctionValue, args: &[Value], caller_env: &Rc<Environment>) -> Result<Value> {
        if let Some(builtin) = &f.builtin {
            return builtin(caller_env, self.host.as_ref(), args);
        }
        if f.params.len() != args.len() {
            return Err(Error::arity(format!(
                "'{}' expects {} argument(s), got {}",
                f.name,
                f.params.len(),
                args.len()
            )));
        }
        let scope = Environment::with_parent(Rc::clone(caller_env));
        for (param, arg) in f.params.iter().zip(args.iter()) {
            scope.add_local(param.clone(), arg.clone(), false)?;
        }
        match self.exec_body(&f.body, &scope)? {
            StepResult::Returning(v) => Ok(v),
            _ => Ok(Value::Null),
        }
    }

    /// Binds the structure's name as a const in the current scope (the
    /// check spans the whole scope chain, not just this level, unlike an
    /// ordinary `var` declaration), then walks its members: a
    /// `VarDeclaration` becomes a field with its const flag forced to
    /// `false` regardless of how it was written, a `FunctionDef` becomes a
    /// function-valued field, and anything else is rejected outright.
    fn define_structure(&self, name: &str, members: &[Node], env: &Rc<Environment>) -> Result<Value> {
        if env.contains_anywhere(name) {
            return Err(Error::name(format!("'{name}' is already in scope")));
        }
        let mut fields = IndexMap::new();
        for member in members {
            match &member.kind {
                NodeKind::VarDeclaration {
                    name: field_name,
                    initializer,
                    ..
                } => {
                    let v = self.eval_value(initializer, env)?;
                    fields.insert(field_name.clone(), Cell::new(v, false));
                }
                NodeKind::FunctionDef {
                    name: field_name,
                    params,
                    body,
                } => {
                    let function = FunctionValue {
                        name: field_name.clone(),
                        params: params.clone(),
                        body: Rc::from(body.clone().into_boxed_slice()),
                        builtin: None,
                        is_const: false,
                    };
                    fields.insert(field_name.clone(), Cell::new(Value::Function(Rc::new(function)), false));
                }
                _ => {
                    return Err(Error::type_error(
                        "Only variable and function declarations are allowed in a structure definition",
                    ))
                }
            }
        }
        let template = Value::Struct(Rc::new(StructValue {
            name: name.to_string(),
            fields: RefCell::new(fields),
        }));
        env.add_local(name.to_string(), template.clone(), true)?;
        Ok(template)
    }

    /// `new Point()` parses as a `ConstructorCall` wrapping a `FunctionCall`
    /// whose callee names the structure — the call's argument list is
    /// syntactically present but semantically unused, since instantiation
    /// is a field-map copy, not a user-defined constructor invocation.
    fn construct(&self, inner: &Node, env: &Rc<Environment>) -> Result<Value> {
        let target = match &inner.kind {
            NodeKind::FunctionCall { callee, .. } => callee.as_ref(),
            _ => inner,
        };
        match self.eval_value(target, env)? {
            Value::Struct(template) => Ok(Value::Struct(template.instantiate())),
            other => Err(Error::type_error(format!(
                "'{}' is not a structure definition",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StdHost;
    use crate::parser::parse;

    fn eval_source(source: &str) -> Result<Value> {
        let nodes = parse("test", source).expect("parse failed");
        let env = Environment::new();
        crate::builtins::register_builtins(&env);
        let evaluator = Evaluator::new(Rc::new(RefCell::new(StdHost)));
        evaluator.run(&nodes, &env)
    }

    #[test]
    fn arithmetic_promotes_to_float_on_mixed_operands() {
        let result = eval_source("1 + 2.0;").unwrap();
        assert!(matches!(result, Value::Float(f) if f == 3.0));
    }

    #[test]
    fn arithmetic_stays_int_when_both_operands_are_int() {
        let result = eval_source("1 + 2;").unwrap();
        assert!(matches!(result, Value::Int(3)));
    }

    #[test]
    fn pow_always_returns_float() {
        let result = eval_source("2 ^ 3;").unwrap();
        assert!(matches!(result, Value::Float(f) if f == 8.0));
    }

    #[test]
    fn const_reassignment_is_an_error() {
        let result = eval_source("const var x = 1; x = 2;");
        assert!(result.is_err());
    }

    #[test]
    fn for_loop_sums_to_ten() {
        let source = "var total = 0; for (var i = 1; i <= 4; i = i + 1) { total = total + i; } total;";
        let result = eval_source(source).unwrap();
        assert!(matches!(result, Value::Int(10)));
    }

    #[test]
    fn break_stops_a_while_loop() {
        let source = "var i = 0; while (true) { if (i == 3) { break; } i = i + 1; } i;";
        let result = eval_source(source).unwrap();
        assert!(matches!(result, Value::Int(3)));
    }

    #[test]
    fn function_call_is_caller_scoped_not_lexically_scoped() {
        let source = "
            var x = 1;
            fn f() { return x; }
            fn g() { var x = 2; return f(); }
            g();
        ";
        let result = eval_source(source).unwrap();
        assert!(matches!(result, Value::Int(2)));
    }

    #[test]
    fn struct_instances_are_independent_copies() {
        let source = "
            type Point { var x = 0; var y = 0; }
            var a = new Point();
            var b = new Point();
            a.x = 5;
            b.x;
        ";
        let result = eval_source(source).unwrap();
        assert!(matches!(result, Value::Int(0)));
    }

    #[test]
    fn list_plus_mutates_and_returns_null() {
        let source = "var a = [1, 2]; a + 3; a[2];";
        let result = eval_source(source).unwrap();
        assert!(matches!(result, Value::Int(3)));
    }

    #[test]
    fn string_indexing_yields_single_char_string() {
        let result = eval_source("\"hello\"[1];").unwrap();
        assert!(matches!(result, Value::Str(s) if &*s == "e"));
    }

    #[test]
    fn missing_struct_field_is_a_name_error() {
        let source = "type P { var x = 0; } var p = new P(); p.y;";
        assert!(eval_source(source).is_err());
    }

    #[test]
    fn redeclaring_a_structure_anywhere_in_scope_is_an_error() {
        let source = "type P { var x = 0; } type P { var y = 0; }";
        assert!(eval_source(source).is_err());
    }
}
