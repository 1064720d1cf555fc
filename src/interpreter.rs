// ABOUTME: Tree-walking evaluator: executes statements, evaluates expressions

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::environment::Environment;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::token::{Token, TokenKind};
use crate::value::{Callable, Value};
use log::{debug, trace};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of executing a statement: either it ran to completion, or a
/// `return` is unwinding toward its enclosing call frame. This is a plain
/// Rust value, not an exception or panic (spec §9's explicit preference for
/// a systems language).
enum Signal {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: Rc<Environment>,
    environment: Rc<Environment>,
    output: Rc<RefCell<dyn Write>>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter").finish_non_exhaustive()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(io::stdout())))
    }

    /// Builds an interpreter that writes `print` output to `output` instead
    /// of standard output. Lets tests capture program output without
    /// spawning a subprocess.
    pub fn with_output(output: Rc<RefCell<dyn Write>>) -> Self {
        let globals = Environment::new();
        register_natives(&globals);
        Interpreter {
            globals: globals.clone(),
            environment: globals,
            output,
        }
    }

    pub fn interpret(&mut self, program: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in program {
            match self.execute(stmt)? {
                Signal::Normal => {}
                Signal::Return(_) => {
                    return Err(RuntimeError::new(RuntimeErrorKind::ReturnOutsideFunction));
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        match stmt {
            Stmt::Let { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                self.environment.define(name, value)?;
                Ok(Signal::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                let _ = writeln!(self.output.borrow_mut(), "{}", value);
                Ok(Signal::Normal)
            }
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Signal::Normal)
            }
            Stmt::Update { name, op, .. } => {
                self.apply_update(name, op)?;
                Ok(Signal::Normal)
            }
            Stmt::AssignUpdate { name, op, value } => {
                self.apply_assign_update(name, op, value)?;
                Ok(Signal::Normal)
            }
            Stmt::Block(stmts) => self.execute_block(stmts, Environment::with_parent(self.environment.clone())),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Signal::Normal => {}
                        signal @ Signal::Return(_) => return Ok(signal),
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::Function(decl) => {
                let callable = Value::Callable(Rc::new(Callable::UserFunction {
                    declaration: Rc::new(decl.clone()),
                    closure: self.environment.clone(),
                }));
                self.environment.define(&decl.name, callable)?;
                Ok(Signal::Normal)
            }
            Stmt::Return { expr, line } => {
                debug!("return encountered at line {line}");
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                Ok(Signal::Return(value))
            }
        }
    }

    /// Runs `stmts` inside `env`, restoring the caller's environment on
    /// every exit path (normal completion, error, or `Return` unwind) as
    /// spec §5 requires.
    fn execute_block(&mut self, stmts: &[Stmt], env: Rc<Environment>) -> Result<Signal, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = (|| {
            for stmt in stmts {
                match self.execute(stmt)? {
                    Signal::Normal => {}
                    signal @ Signal::Return(_) => return Ok(signal),
                }
            }
            Ok(Signal::Normal)
        })();
        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Bool(*b)),
            Expr::Variable(name) => self
                .environment
                .get(name)
                .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::UndefinedVariable(name.clone()))),
            Expr::Array(elems) => {
                let mut values = Vec::with_capacity(elems.len());
                for elem in elems {
                    values.push(self.evaluate(elem)?);
                }
                Ok(Value::new_array(values))
            }
            Expr::Index { array, index } => {
                let array = self.evaluate(array)?;
                let index = self.evaluate(index)?;
                index_array(&array, &index)
            }
            Expr::Binary { left, op, right } => self.evaluate_binary(left, op, right),
            Expr::Unary { op, right } => self.evaluate_unary(op, right),
            Expr::Call { callee, args } => self.evaluate_call(callee, args),
            Expr::Update { name, op, .. } => {
                let line = op.line;
                self.apply_update(&Token::new(TokenKind::Identifier, name.clone(), line), op)
            }
            Expr::Grouping(inner) => self.evaluate(inner),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        op: &Token,
        right: &Expr,
    ) -> Result<Value, RuntimeError> {
        if op.kind == TokenKind::Equal {
            let name = match left {
                Expr::Variable(name) => name,
                _ => {
                    return Err(RuntimeError::at(
                        RuntimeErrorKind::InvalidAssignmentTarget,
                        op.line,
                    ))
                }
            };
            let value = self.evaluate(right)?;
            self.environment.assign(name, value.clone())?;
            return Ok(value);
        }

        if op.kind == TokenKind::AndAnd {
            let left = self.evaluate(left)?;
            if !left.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(self.evaluate(right)?.is_truthy()));
        }
        if op.kind == TokenKind::OrOr {
            let left = self.evaluate(left)?;
            if left.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(self.evaluate(right)?.is_truthy()));
        }

        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        apply_binary_op(&left, op, &right)
    }

    fn evaluate_unary(&mut self, op: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let value = self.evaluate(right)?;
        match op.kind {
            TokenKind::Minus => match value {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::at(
                    RuntimeErrorKind::ExpectedNumber { context: "unary '-'" },
                    op.line,
                )),
            },
            TokenKind::Bang => Ok(Value::Bool(!value.is_truthy())),
            _ => unreachable!("parser only produces '-' and '!' as unary operators"),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee)?;
        let callable = match &callee {
            Value::Callable(c) => c.clone(),
            _ => return Err(RuntimeError::new(RuntimeErrorKind::NotCallable)),
        };

        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.evaluate(arg)?);
        }

        if arg_values.len() != callable.arity() {
            return Err(RuntimeError::new(RuntimeErrorKind::ArityMismatch {
                expected: callable.arity(),
                actual: arg_values.len(),
            }));
        }

        trace!("calling {} with {} argument(s)", callable.name(), arg_values.len());
        match callable.as_ref() {
            Callable::NativeFunction { implementation, .. } => implementation(&arg_values),
            Callable::UserFunction { declaration, closure } => {
                self.call_user_function(declaration, closure, &arg_values)
            }
        }
    }

    fn call_user_function(
        &mut self,
        declaration: &Rc<FunctionDecl>,
        closure: &Rc<Environment>,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let call_env = Environment::with_parent(closure.clone());
        for (param, arg) in declaration.params.iter().zip(args.iter()) {
            call_env.define(param, arg.clone())?;
        }
        match self.execute_block(&declaration.body, call_env)? {
            Signal::Normal => Ok(Value::Null),
            Signal::Return(value) => Ok(value),
        }
    }

    fn apply_update(&mut self, name: &Token, op: &Token) -> Result<Value, RuntimeError> {
        let current = self
            .environment
            .get(&name.lexeme)
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::UndefinedVariable(name.lexeme.clone())))?;
        let n = match current {
            Value::Number(n) => n,
            _ => {
                return Err(RuntimeError::at(
                    RuntimeErrorKind::ExpectedNumber { context: "increment/decrement" },
                    op.line,
                ))
            }
        };
        let delta = if op.kind == TokenKind::PlusPlus { 1.0 } else { -1.0 };
        let updated = Value::Number(n + delta);
        self.environment.assign(&name.lexeme, updated.clone())?;
        Ok(updated)
    }

    fn apply_assign_update(
        &mut self,
        name: &Token,
        op: &Token,
        value_expr: &Expr,
    ) -> Result<(), RuntimeError> {
        let current = self
            .environment
            .get(&name.lexeme)
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::UndefinedVariable(name.lexeme.clone())))?;
        let rhs = self.evaluate(value_expr)?;
        let binary_kind = match op.kind {
            TokenKind::PlusEqual => TokenKind::Plus,
            TokenKind::MinusEqual => TokenKind::Minus,
            TokenKind::StarEqual => TokenKind::Star,
            TokenKind::SlashEqual => TokenKind::Slash,
            _ => unreachable!("parser only produces compound-assignment operators here"),
        };
        let synthetic = Token::new(binary_kind, op.lexeme.clone(), op.line);
        let result = apply_binary_op(&current, &synthetic, &rhs)?;
        self.environment.assign(&name.lexeme, result)?;
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn index_array(array: &Value, index: &Value) -> Result<Value, RuntimeError> {
    let cell = match array {
        Value::Array(cell) => cell,
        _ => {
            return Err(RuntimeError::new(RuntimeErrorKind::ExpectedArray {
                context: "index target",
            }))
        }
    };
    let n = match index {
        Value::Number(n) => *n,
        _ => return Err(RuntimeError::new(RuntimeErrorKind::InvalidIndex)),
    };
    if n.fract() != 0.0 || n < 0.0 {
        return Err(RuntimeError::new(RuntimeErrorKind::InvalidIndex));
    }
    let i = n as i64;
    let elems = cell.borrow();
    if (i as usize) >= elems.len() {
        return Err(RuntimeError::new(RuntimeErrorKind::IndexOutOfBounds {
            index: i,
            len: elems.len(),
        }));
    }
    Ok(elems[i as usize].clone())
}

/// Shared by `Binary` expressions and `AssignmentUpdateStmt` (spec §4.3).
fn apply_binary_op(left: &Value, op: &Token, right: &Value) -> Result<Value, RuntimeError> {
    use TokenKind::*;
    match op.kind {
        Plus => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", left, right)))
            }
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            _ => Err(RuntimeError::at(
                RuntimeErrorKind::ExpectedNumber { context: "'+'" },
                op.line,
            )),
        },
        Minus => numeric_op(left, right, op.line, "'-'", |a, b| Ok(a - b)),
        Star => numeric_op(left, right, op.line, "'*'", |a, b| Ok(a * b)),
        Slash => numeric_op(left, right, op.line, "'/'", |a, b| {
            if b == 0.0 {
                Err(RuntimeError::at(RuntimeErrorKind::DivisionByZero, op.line))
            } else {
                Ok(a / b)
            }
        }),
        Modulo => {
            let (a, b) = (numeric(left, op.line, "'%'")?, numeric(right, op.line, "'%'")?);
            if a.fract() != 0.0 || b.fract() != 0.0 {
                return Err(RuntimeError::at(RuntimeErrorKind::ModuloRequiresIntegers, op.line));
            }
            if b == 0.0 {
                return Err(RuntimeError::at(RuntimeErrorKind::ModuloByZero, op.line));
            }
            Ok(Value::Number((a as i64 % b as i64) as f64))
        }
        Greater => compare(left, right, op.line, |a, b| a > b),
        GreaterEqual => compare(left, right, op.line, |a, b| a >= b),
        Less => compare(left, right, op.line, |a, b| a < b),
        LessEqual => compare(left, right, op.line, |a, b| a <= b),
        EqualEqual => Ok(Value::Bool(left == right)),
        BangEqual => Ok(Value::Bool(left != right)),
        _ => unreachable!("parser only produces these operators as Binary ops"),
    }
}

fn numeric(value: &Value, line: usize, context: &'static str) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(RuntimeError::at(RuntimeErrorKind::ExpectedNumber { context }, line)),
    }
}

fn numeric_op(
    left: &Value,
    right: &Value,
    line: usize,
    context: &'static str,
    f: impl Fn(f64, f64) -> Result<f64, RuntimeError>,
) -> Result<Value, RuntimeError> {
    let a = numeric(left, line, context)?;
    let b = numeric(right, line, context)?;
    f(a, b).map(Value::Number)
}

fn compare(left: &Value, right: &Value, line: usize, f: impl Fn(f64, f64) -> bool) -> Result<Value, RuntimeError> {
    let a = numeric(left, line, "comparison")?;
    let b = numeric(right, line, "comparison")?;
    Ok(Value::Bool(f(a, b)))
}

fn register_natives(globals: &Rc<Environment>) {
    let clock = Value::Callable(Rc::new(Callable::NativeFunction {
        name: "clock",
        arity: 0,
        implementation: Box::new(|_args| {
            let seconds = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64();
            Ok(Value::Number(seconds))
        }),
    }));
    globals
        .define("clock", clock)
        .expect("globals starts empty, 'clock' cannot already be defined");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn run(src: &str) -> Result<Interpreter, RuntimeError> {
        let mut interp = Interpreter::new();
        let program = parse(lex(src).unwrap()).unwrap();
        interp.interpret(&program)?;
        Ok(interp)
    }

    fn eval_value(src: &str) -> Value {
        let mut interp = Interpreter::new();
        let program = parse(lex(src).unwrap()).unwrap();
        match &program[0] {
            Stmt::Expression(expr) => interp.evaluate(expr).unwrap(),
            _ => panic!("expected a single expression statement"),
        }
    }

    fn run_captured(src: &str) -> String {
        let buf: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let mut interp = Interpreter::with_output(buf.clone());
        let program = parse(lex(src).unwrap()).unwrap();
        interp.interpret(&program).unwrap();
        let output = String::from_utf8(buf.borrow().clone()).unwrap();
        output
    }

    #[test]
    fn test_print_writes_rendered_value_and_newline_to_output() {
        assert_eq!(run_captured("print 1 + 2;"), "3.000000\n");
        assert_eq!(run_captured(r#"print "";"#), "\n");
    }

    #[test]
    fn test_non_callable_check_happens_before_argument_evaluation() {
        let err = run("let x = 5; x(1 / 0);").unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::NotCallable);
    }

    #[test]
    fn test_arithmetic_and_print_rendering() {
        let interp = run("let a = 1; let b = 2; let c = a + b;").unwrap();
        assert_eq!(interp.globals.get("c"), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_string_concatenation_with_number() {
        assert_eq!(eval_value("\"hi\" + 3;"), Value::String("hi3.000000".to_string()));
    }

    #[test]
    fn test_division_by_zero_is_a_runtime_error() {
        assert!(run("let x = 1 / 0;").is_err());
    }

    #[test]
    fn test_modulo_requires_integer_operands() {
        assert!(run("let x = 2.5 % 2;").is_err());
        assert_eq!(eval_value("5 % 2;"), Value::Number(1.0));
    }

    #[test]
    fn test_array_indexing_and_bounds() {
        assert_eq!(eval_value("[1, 2, 3][1];"), Value::Number(2.0));
        assert!(run("let x = [][0];").is_err());
    }

    #[test]
    fn test_closure_captures_environment_by_reference() {
        let interp = run(
            "let x = 1; function f() { return x; } x = 2; let result = f();",
        )
        .unwrap();
        assert_eq!(interp.globals.get("result"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_recursive_factorial() {
        let interp = run(
            "function fact(n) { if (n <= 1) { return 1; } return n * fact(n - 1); } let result = fact(5);",
        )
        .unwrap();
        assert_eq!(interp.globals.get("result"), Some(Value::Number(120.0)));
    }

    #[test]
    fn test_while_loop_executes_body_correct_number_of_times() {
        let interp = run("let i = 0; let count = 0; while (i < 3) { count = count + 1; i = i + 1; }").unwrap();
        assert_eq!(interp.globals.get("count"), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_while_with_falsy_condition_never_runs() {
        let interp = run("let ran = 0; while (False) { ran = 1; }").unwrap();
        assert_eq!(interp.globals.get("ran"), Some(Value::Number(0.0)));
    }

    #[test]
    fn test_assignment_to_undefined_name_is_an_error() {
        assert!(run("x = 1;").is_err());
    }

    #[test]
    fn test_redefinition_in_same_scope_is_an_error() {
        assert!(run("let x = 1; let x = 2;").is_err());
    }

    #[test]
    fn test_return_outside_function_is_a_runtime_error() {
        assert!(run("return 1;").is_err());
    }

    #[test]
    fn test_logical_and_or_short_circuit() {
        assert_eq!(eval_value("False && (1 / 0 == 0);"), Value::Bool(false));
        assert_eq!(eval_value("True || (1 / 0 == 0);"), Value::Bool(true));
    }

    #[test]
    fn test_update_statement_mutates_variable() {
        let interp = run("let x = 1; x++; ++x;").unwrap();
        assert_eq!(interp.globals.get("x"), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_compound_assignment_statement() {
        let interp = run("let x = 10; x -= 3;").unwrap();
        assert_eq!(interp.globals.get("x"), Some(Value::Number(7.0)));
    }

    #[test]
    fn test_block_restores_environment_after_error() {
        let mut interp = Interpreter::new();
        let program = parse(lex("let x = 1; { let y = 2; let y = 3; }").unwrap()).unwrap();
        assert!(interp.interpret(&program).is_err());
        assert_eq!(interp.globals.get("y"), None);
    }

    #[test]
    fn test_clock_is_zero_arity_and_numeric() {
        assert!(matches!(eval_value("clock();"), Value::Number(_)));
    }
}
