use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::environment::Scope;
use crate::evaluator::{EvalError, EvalResult, Interpreter};
use crate::source::Span;
use crate::value::Value;

// Checks the number of arguments
macro_rules! check_arity {
    ($args:expr, $expected:expr, $span:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err(EvalError::InvalidArguments(
                format!(
                    "Primitive '{}' expects exactly {} arguments, got {}",
                    $name,
                    $expected,
                    $args.len()
                ),
                $span,
            ));
        }
    };
}

// Moves exactly N arguments out of the argument vector
fn take_args<const N: usize>(
    args: Vec<Value>,
    span: Span,
    name: &'static str,
) -> EvalResult<[Value; N]> {
    let count = args.len();
    <[Value; N]>::try_from(args).map_err(|_| {
        EvalError::InvalidArguments(
            format!(
                "Primitive '{}' expects exactly {} arguments, got {}",
                name, N, count
            ),
            span,
        )
    })
}

fn expect_integer(value: &Value, span: Span, name: &'static str) -> EvalResult<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch {
            name,
            expected: "an integer",
            found: other.type_name(),
            span,
        }),
    }
}

fn expect_list<'a>(value: &'a Value, span: Span, name: &'static str) -> EvalResult<&'a [Value]> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(EvalError::TypeMismatch {
            name,
            expected: "a list",
            found: other.type_name(),
            span,
        }),
    }
}

fn integer_op(
    args: Vec<Value>,
    span: Span,
    name: &'static str,
    op: fn(i64, i64) -> Option<i64>,
) -> EvalResult {
    check_arity!(args, 2, span, name);
    let left = expect_integer(&args[0], span, name)?;
    let right = expect_integer(&args[1], span, name)?;
    op(left, right)
        .map(Value::Integer)
        .ok_or(EvalError::IntegerOverflow(name, span))
}

pub fn prim_add(
    _: &mut Interpreter,
    args: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    integer_op(args, span, "add", i64::checked_add)
}

pub fn prim_sub(
    _: &mut Interpreter,
    args: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    integer_op(args, span, "sub", i64::checked_sub)
}

pub fn prim_mul(
    _: &mut Interpreter,
    args: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    integer_op(args, span, "mul", i64::checked_mul)
}

/// `(def :name value)` binds in the caller's own scope, not a child.
pub fn prim_def(
    _: &mut Interpreter,
    args: Vec<Value>,
    scope: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    let [target, value] = take_args(args, span, "def")?;
    let name = match target {
        Value::Symbol(name) => name,
        other => {
            return Err(EvalError::TypeMismatch {
                name: "def",
                expected: "a symbol",
                found: other.type_name(),
                span,
            });
        }
    };
    debug!(%name, "def");
    scope.borrow_mut().define(name, value.clone(), span)?;
    Ok(value)
}

// Arguments were already evaluated for their side effects.
pub fn prim_do(
    _: &mut Interpreter,
    _: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    _: Span,
) -> EvalResult {
    Ok(Value::nil())
}

pub fn prim_print(
    interpreter: &mut Interpreter,
    args: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    check_arity!(args, 1, span, "print");
    interpreter.write_line(&args[0].to_string())?;
    Ok(Value::nil())
}

pub fn prim_list(
    _: &mut Interpreter,
    args: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    _: Span,
) -> EvalResult {
    Ok(Value::List(args))
}

pub fn prim_car(
    _: &mut Interpreter,
    args: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    check_arity!(args, 1, span, "car");
    match expect_list(&args[0], span, "car")? {
        [first, ..] => Ok(first.clone()),
        [] => Err(EvalError::EmptyList("car", span)),
    }
}

pub fn prim_cdr(
    _: &mut Interpreter,
    args: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    check_arity!(args, 1, span, "cdr");
    match expect_list(&args[0], span, "cdr")? {
        [_, rest @ ..] => Ok(Value::List(rest.to_vec())),
        [] => Err(EvalError::EmptyList("cdr", span)),
    }
}

pub fn prim_eq(
    _: &mut Interpreter,
    args: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    check_arity!(args, 2, span, "eq");
    Ok(Value::boolean(args[0] == args[1]))
}

pub fn prim_id(
    _: &mut Interpreter,
    args: Vec<Value>,
    _: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    let [value] = take_args(args, span, "id")?;
    Ok(value)
}

/// Runs a branch picked by `when`/`if`. A function branch (normally a `#(...)`
/// thunk) is invoked with no arguments in a fresh child of the caller's scope;
/// anything else was already evaluated eagerly and is returned as is.
fn force(
    interpreter: &mut Interpreter,
    branch: Value,
    scope: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    match branch {
        Value::Function(procedure) => {
            trace!(%procedure, "forcing branch");
            let frame = Scope::new_enclosed(scope.clone());
            interpreter.apply(&procedure, Vec::new(), &frame, span)
        }
        other => Ok(other),
    }
}

pub fn prim_when(
    interpreter: &mut Interpreter,
    args: Vec<Value>,
    scope: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    let [condition, branch] = take_args(args, span, "when")?;
    if condition.is_true() {
        force(interpreter, branch, scope, span)
    } else {
        Ok(Value::boolean(false))
    }
}

pub fn prim_if(
    interpreter: &mut Interpreter,
    args: Vec<Value>,
    scope: &Rc<RefCell<Scope>>,
    span: Span,
) -> EvalResult {
    let [condition, then_branch, else_branch] = take_args(args, span, "if")?;
    let selected = if condition.is_true() {
        then_branch
    } else {
        else_branch
    };
    force(interpreter, selected, scope, span)
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::ScopeError;
    use crate::parser::parse_str;
    use std::io::{self, Write};

    /// Cloneable `Write` sink so tests can inspect what `print` wrote.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    fn run(input: &str) -> (EvalResult<Vec<Value>>, String) {
        let buffer = SharedBuffer::default();
        let mut interpreter = Interpreter::new().with_output(buffer.clone());
        let forest = match parse_str(input) {
            Ok(forest) => forest,
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        };
        let result = interpreter.evaluate_root(&forest);
        (result, buffer.contents())
    }

    fn assert_eval(input: &str, expected: Value) {
        match run(input).0 {
            Ok(values) => assert_eq!(values.last(), Some(&expected), "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    fn assert_eval_error(input: &str, expected_error_variant: &EvalError) {
        match run(input).0 {
            Ok(result) => panic!(
                "Expected evaluation to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => assert_eq!(
                std::mem::discriminant(&e),
                std::mem::discriminant(expected_error_variant),
                "Input: '{}', Expected error variant like {:?}, got: {:?}",
                input,
                expected_error_variant,
                e
            ),
        }
    }

    fn type_error() -> EvalError {
        EvalError::TypeMismatch {
            name: "",
            expected: "",
            found: "",
            span: Span::default(),
        }
    }

    fn arity_error() -> EvalError {
        EvalError::InvalidArguments(String::new(), Span::default())
    }

    #[test]
    fn test_arithmetic() {
        assert_eval("(add 2 3)", Value::Integer(5));
        assert_eval("(sub 2 3)", Value::Integer(-1));
        assert_eval("(mul 6 7)", Value::Integer(42));
        assert_eval("(add (sub 10 4) (mul 2 3))", Value::Integer(12));
    }

    #[test]
    fn test_arithmetic_type_errors() {
        assert_eval_error("(add 1 :x)", &type_error());
        assert_eval_error("(sub (list) 1)", &type_error());
        assert_eval_error("(mul 1 #(id 1))", &type_error());
    }

    #[test]
    fn test_arithmetic_arity_and_overflow() {
        assert_eval_error("(add 1)", &arity_error());
        assert_eval_error("(add 1 2 3)", &arity_error());
        assert_eval_error(
            "(mul 9223372036854775807 2)",
            &EvalError::IntegerOverflow("", Span::default()),
        );
    }

    #[test]
    fn test_def_returns_bound_value() {
        assert_eval("(def :x 7)", Value::Integer(7));
        assert_eval("(def :x 7) (add x 1)", Value::Integer(8));
        assert_eval("(def :x 7) (def :x 9) x", Value::Integer(9));
    }

    #[test]
    fn test_def_requires_symbol() {
        assert_eval_error("(def 1 2)", &type_error());
    }

    #[test]
    fn test_def_inside_closure_stays_local() {
        assert_eval_error(
            "(#(def :inner 1)) inner",
            &EvalError::Scope(ScopeError::UnboundName(String::new(), Span::default())),
        );
    }

    #[test]
    fn test_do_returns_nil_after_side_effects() {
        let (result, output) = run("(do (print 1) (print 2))");
        assert_eq!(result, Ok(vec![Value::nil()]));
        assert_eq!(output, "1\n2\n");
    }

    #[test]
    fn test_print_renders() {
        let (result, output) = run("(print 5) (print :sym) (print (list 1 (list 2 3) :a))");
        assert_eq!(result, Ok(vec![Value::nil(), Value::nil(), Value::nil()]));
        assert_eq!(output, "5\nsym\n(1 (2 3) a)\n");
    }

    #[test]
    fn test_list_car_cdr() {
        assert_eval(
            "(list 1 2 3)",
            Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]),
        );
        assert_eval("(list)", Value::List(vec![]));
        assert_eval("(car (list 1 2 3))", Value::Integer(1));
        assert_eval(
            "(cdr (list 1 2 3))",
            Value::List(vec![Value::Integer(2), Value::Integer(3)]),
        );
        assert_eval("(cdr (list 1))", Value::List(vec![]));
    }

    #[test]
    fn test_car_cdr_errors() {
        let empty = EvalError::EmptyList("", Span::default());
        assert_eval_error("(car (list))", &empty);
        assert_eval_error("(cdr (list))", &empty);
        assert_eval_error("(car 1)", &type_error());
        assert_eval_error("(cdr :x)", &type_error());
    }

    #[test]
    fn test_eq() {
        assert_eval("(eq 1 1)", Value::boolean(true));
        assert_eval("(eq 1 2)", Value::boolean(false));
        assert_eval("(eq :a :a)", Value::boolean(true));
        assert_eval("(eq 1 :a)", Value::boolean(false));
        assert_eval("(eq (list 1 :b) (list 1 :b))", Value::boolean(true));
        assert_eval("(eq add add)", Value::boolean(true));
        assert_eval("(eq add sub)", Value::boolean(false));
    }

    #[test]
    fn test_id() {
        assert_eval("(id 5)", Value::Integer(5));
        assert_eval_error("(id)", &arity_error());
    }

    #[test]
    fn test_when() {
        assert_eval("(when (eq 1 1) #(id 10))", Value::Integer(10));
        assert_eval("(when (eq 1 2) #(id 10))", Value::boolean(false));
        assert_eval("(when (eq 1 1) 10)", Value::Integer(10));
        // Only the `true` sentinel counts.
        assert_eval("(when 1 #(id 10))", Value::boolean(false));
    }

    #[test]
    fn test_if_selects_and_forces() {
        assert_eval("(if (eq 1 1) #(id 1) #(id 2))", Value::Integer(1));
        assert_eval("(if (eq 1 2) #(id 1) #(id 2))", Value::Integer(2));
        assert_eval("(if :nil 1 2)", Value::Integer(2));
        assert_eval_error("(if (eq 1 1) 1)", &arity_error());
    }

    #[test]
    fn test_if_only_runs_selected_thunk() {
        let (result, output) = run("(if (eq 1 1) #(print :yes) #(print :no))");
        assert_eq!(result, Ok(vec![Value::nil()]));
        assert_eq!(output, "yes\n");

        let (_, output) = run("(when (eq 1 2) #(print :never))");
        assert_eq!(output, "");
    }

    #[test]
    fn test_unthunked_branches_run_eagerly() {
        // Both bare branches are evaluated before `if` ever sees them.
        let (result, output) = run("(if (eq 1 1) (print :a) (print :b))");
        assert_eq!(result, Ok(vec![Value::nil()]));
        assert_eq!(output, "a\nb\n");
    }

    #[test]
    fn test_forcing_a_primitive_branch() {
        // A bare primitive is a function too, so it gets invoked with no arguments.
        assert_eval("(if (eq 1 1) list 0)", Value::List(vec![]));
        assert_eval_error("(if (eq 1 1) add 0)", &arity_error());
    }
}
