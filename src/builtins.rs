// ABOUTME: Built-in functions installed into the root environment at startup

use std::cell::RefCell;
use std::rc::Rc;

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::value::{FunctionValue, Value};

fn arity_error(name: &str, expected: usize, got: usize) -> Error {
    Error::arity(format!(
        "'{name}' expects {expected} argument(s), got {got}"
    ))
}

fn define(env: &Rc<Environment>, name: &str, arity_hint: &str, f: impl Fn(&Rc<Environment>, &RefCell<dyn Host>, &[Value]) -> Result<Value> + 'static) {
    let _ = arity_hint;
    let function = FunctionValue {
        name: name.to_string(),
        params: Vec::new(),
        body: Rc::from(Vec::new().into_boxed_slice()),
        builtin: Some(Rc::new(f)),
        is_const: true,
    };
    env.add_global(name, Value::Function(Rc::new(function)), true);
}

/// Installs every built-in into the root environment.
pub fn register_builtins(env: &Rc<Environment>) {
    // The three sentinels are bound as const cells before any user code runs;
    // they are ordinary identifiers, not literal syntax.
    env.add_global("true", Value::Boolean(true), true);
    env.add_global("false", Value::Boolean(false), true);
    env.add_global("null", Value::Null, true);

    define(env, "print", "(print val)", |_env, host, args| {
        if args.len() != 1 {
            return Err(arity_error("print", 1, args.len()));
        }
        host.borrow_mut().write_out(&args[0].display_string());
        Ok(Value::Null)
    });

    define(env, "println", "(println val)", |_env, host, args| {
        if args.len() != 1 {
            return Err(arity_error("println", 1, args.len()));
        }
        host.borrow_mut().write_line(&args[0].display_string());
        Ok(Value::Null)
    });

    define(env, "typeof", "(typeof val)", |_env, _host, args| {
        if args.len() != 1 {
            return Err(arity_error("typeof", 1, args.len()));
        }
        Ok(Value::string(args[0].type_name().to_string()))
    });

    define(env, "stoi", "(stoi str)", |_env, _host, args| {
        if args.len() != 1 {
            return Err(arity_error("stoi", 1, args.len()));
        }
        match &args[0] {
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Error::type_error(format!("Cannot convert '{s}' to Int"))),
            other => Err(Error::illegal_operation("stoi", other.type_name())),
        }
    });

    define(env, "stof", "(stof str)", |_env, _host, args| {
        if args.len() != 1 {
            return Err(arity_error("stof", 1, args.len()));
        }
        match &args[0] {
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| Error::type_error(format!("Cannot convert '{s}' to Float"))),
            other => Err(Error::illegal_operation("stof", other.type_name())),
        }
    });

    define(env, "intToFloat", "(intToFloat n)", |_env, _host, args| {
        if args.len() != 1 {
            return Err(arity_error("intToFloat", 1, args.len()));
        }
        match &args[0] {
            Value::Int(n) => Ok(Value::Float(*n as f64)),
            other => Err(Error::illegal_operation("intToFloat", other.type_name())),
        }
    });

    define(env, "floatToInt", "(floatToInt n)", |_env, _host, args| {
        if args.len() != 1 {
            return Err(arity_error("floatToInt", 1, args.len()));
        }
        match &args[0] {
            Value::Float(n) => Ok(Value::Int(*n as i64)),
            other => Err(Error::illegal_operation("floatToInt", other.type_name())),
        }
    });

    define(env, "isNull", "(isNull val)", |_env, _host, args| {
        if args.len() != 1 {
            return Err(arity_error("isNull", 1, args.len()));
        }
        Ok(Value::Boolean(matches!(args[0], Value::Null)))
    });

    define(env, "len", "(len val)", |_env, _host, args| {
        if args.len() != 1 {
            return Err(arity_error("len", 1, args.len()));
        }
        match &args[0] {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(l) => Ok(Value::Int(l.borrow().len() as i64)),
            other => Err(Error::illegal_operation("len", other.type_name())),
        }
    });

    define(env, "input", "(input)", |_env, host, args| {
        if !args.is_empty() {
            return Err(arity_error("input", 0, args.len()));
        }
        Ok(Value::string(host.borrow_mut().read_line()))
    });

    define(env, "exit", "(exit code)", |_env, host, args| {
        let code = match args.first() {
            None => 0,
            Some(Value::Int(n)) => *n as i32,
            Some(other) => return Err(Error::illegal_operation("exit", other.type_name())),
        };
        host.borrow_mut().terminate(code);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StdHost;

    fn call(env: &Rc<Environment>, name: &str, args: &[Value]) -> Result<Value> {
        let host = RefCell::new(StdHost);
        match env.get(name).unwrap() {
            Value::Function(f) => (f.builtin.as_ref().unwrap())(env, &host, args),
            _ => panic!("not a function"),
        }
    }

    #[test]
    fn typeof_struct_reports_own_name() {
        let env = Environment::new();
        register_builtins(&env);
        let result = call(&env, "typeof", &[Value::Int(5)]).unwrap();
        assert!(matches!(result, Value::Str(s) if &*s == "Int"));
    }

    #[test]
    fn stoi_parses_valid_int() {
        let env = Environment::new();
        register_builtins(&env);
        let result = call(&env, "stoi", &[Value::string("42")]).unwrap();
        assert!(matches!(result, Value::Int(42)));
    }

    #[test]
    fn stoi_rejects_garbage() {
        let env = Environment::new();
        register_builtins(&env);
        assert!(call(&env, "stoi", &[Value::string("nope")]).is_err());
    }

    #[test]
    fn len_of_list_and_string() {
        let env = Environment::new();
        register_builtins(&env);
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(call(&env, "len", &[list]).unwrap(), Value::Int(2)));
        assert!(matches!(
            call(&env, "len", &[Value::string("hey")]).unwrap(),
            Value::Int(3)
        ));
    }

    #[test]
    fn is_null_predicate() {
        let env = Environment::new();
        register_builtins(&env);
        assert!(matches!(
            call(&env, "isNull", &[Value::Null]).unwrap(),
            Value::Boolean(true)
        ));
        assert!(matches!(
            call(&env, "isNull", &[Value::Int(0)]).unwrap(),
            Value::Boolean(false)
        ));
    }
}
