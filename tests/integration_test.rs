// ABOUTME: End-to-end scenarios exercising the lexer, parser and evaluator together

use std::cell::RefCell;
use std::rc::Rc;

use spearmint::builtins::register_builtins;
use spearmint::env::Environment;
use spearmint::eval::Evaluator;
use spearmint::host::Host;
use spearmint::parser::parse;

#[derive(Default)]
struct CapturingHost {
    output: String,
}

impl Host for CapturingHost {
    fn write_out(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn write_line(&mut self, text: &str) {
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn read_line(&mut self) -> String {
        String::new()
    }

    fn terminate(&mut self, code: i32) -> ! {
        panic!("script called exit({code})");
    }
}

fn run(source: &str) -> Result<String, spearmint::error::Error> {
    let host = Rc::new(RefCell::new(CapturingHost::default()));
    let evaluator = Evaluator::new(Rc::clone(&host) as Rc<RefCell<dyn Host>>);
    let env = Environment::new();
    register_builtins(&env);
    let nodes = parse("Console", source)?;
    evaluator.run(&nodes, &env)?;
    let output = host.borrow().output.clone();
    Ok(output)
}

#[test]
fn prints_hello() {
    assert_eq!(run(r#"println("hello");"#).unwrap(), "hello\n");
}

#[test]
fn arithmetic_precedence_in_println() {
    assert_eq!(run("var x = 1+2*3; println(x);").unwrap(), "7\n");
}

#[test]
fn for_loop_builds_a_string() {
    let source = r#"var s = ""; for(var i=0; i<3; i=i+1){ s = s+i; } println(s);"#;
    assert_eq!(run(source).unwrap(), "012\n");
}

#[test]
fn recursive_factorial() {
    let source = "fn fact(n){ if(n<=1){ return 1; } return n*fact(n-1); } println(fact(5));";
    assert_eq!(run(source).unwrap(), "120\n");
}

#[test]
fn struct_field_assignment_and_read() {
    let source = "type P { var x = 0; var y = 0; } var p = new P(); p.x = 3; println(p.x);";
    assert_eq!(run(source).unwrap(), "3\n");
}

#[test]
fn list_indexing() {
    assert_eq!(run("var a = [10,20,30]; println(a[1]);").unwrap(), "20\n");
}

#[test]
fn redeclaring_a_variable_in_the_same_scope_is_a_name_error() {
    let err = run("var x = 1; var x = 2;").unwrap_err();
    assert!(matches!(err, spearmint::error::Error::Name { .. }));
}

#[test]
fn reassigning_a_const_is_a_name_error() {
    let err = run("const var k = 1; k = 2;").unwrap_err();
    assert!(matches!(err, spearmint::error::Error::Name { .. }));
}

#[test]
fn out_of_range_list_index_is_a_bounds_error() {
    let err = run("var a = [1,2]; println(a[5]);").unwrap_err();
    assert!(matches!(err, spearmint::error::Error::Bounds { .. }));
}

#[test]
fn adding_a_string_to_an_int_coerces_to_string() {
    assert_eq!(run(r#"println(1 + "x");"#).unwrap(), "1x\n");
}

#[test]
fn break_inside_if_inside_while_only_stops_the_while() {
    let source = "var i = 0; while (true) { if (i == 3) { break; } i = i + 1; } println(i);";
    assert_eq!(run(source).unwrap(), "3\n");
}

#[test]
fn string_plus_int_coerces_to_string() {
    assert_eq!(run(r#"println("x" + 1);"#).unwrap(), "x1\n");
}

#[test]
fn strings_order_lexicographically() {
    assert_eq!(run(r#"println("a" < "b");"#).unwrap(), "true\n");
}

#[test]
fn scope_isolation_across_if_block() {
    let source = "var x = 1; if (true) { var x = 2; } println(x);";
    assert_eq!(run(source).unwrap(), "1\n");
}
