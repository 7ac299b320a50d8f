use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Write};
use std::{panic, thread};

use crate::ast::{
    BinaryOp, Block, Conversion, Declaration, Expr, ExprKind, FunctionDecl, Literal, Program,
    Stmt, Type, UnaryOp, fold_constant,
};
use crate::environment::{Binding, Environment, Scope};
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::value::{ArrayRef, Value};

/// Deepest call nesting before the interpreter reports a stack overflow.
pub const MAX_CALL_DEPTH: usize = 512;

/// Bound on statements and expressions being evaluated at once, across all
/// active calls. Keeps deep bodies inside deep recursion within the stack.
pub const MAX_EVAL_NESTING: usize = 8192;

/// Stack reserved for the thread that runs a program.
pub const INTERPRETER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Runs `f` on a dedicated thread with [`INTERPRETER_STACK_SIZE`] bytes of
/// stack and waits for its result. Panics in `f` resume on the caller.
pub fn with_interpreter_stack<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("interpreter".to_string())
            .stack_size(INTERPRETER_STACK_SIZE)
            .spawn_scoped(scope, f)?;
        match handle.join() {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    })
}

/// Outcome of executing a statement.
enum Flow {
    Normal,
    Return(Option<Value>),
}

/// Whitespace-delimited tokens pulled lazily from a line-oriented reader.
struct Input<R> {
    reader: R,
    pending: VecDeque<String>,
}

impl<R: BufRead> Input<R> {
    fn new(reader: R) -> Self {
        Input {
            reader,
            pending: VecDeque::new(),
        }
    }

    fn next_token(&mut self) -> io::Result<Option<String>> {
        while self.pending.is_empty() {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
        Ok(self.pending.pop_front())
    }
}

fn error(kind: RuntimeErrorKind, line: usize, column: usize) -> RuntimeError {
    RuntimeError::new(kind, line, column)
}

fn unsupported(operation: impl ToString, value: &Value, expr: &Expr) -> RuntimeError {
    error(
        RuntimeErrorKind::UnsupportedOperation {
            operation: operation.to_string(),
            type_name: value.type_name().to_string(),
        },
        expr.line,
        expr.column,
    )
}

/// Tree-walking evaluator. All mutable execution state (scopes, input,
/// output) lives here rather than in globals, so programs run independently.
pub struct Interpreter<'p, R, W> {
    functions: HashMap<&'p str, &'p FunctionDecl>,
    env: Environment,
    nesting: usize,
    input: Input<R>,
    output: W,
}

impl<'p, R: BufRead, W: Write> Interpreter<'p, R, W> {
    pub fn new(input: R, output: W) -> Self {
        Interpreter {
            functions: HashMap::new(),
            env: Environment::new(),
            nesting: 0,
            input: Input::new(input),
            output,
        }
    }

    /// Runs `program` to completion. Output is flushed on every exit path,
    /// including runtime errors.
    pub fn interpret(&mut self, program: &'p Program) -> Result<(), RuntimeError> {
        let result = self.run(program);
        let flushed = self
            .output
            .flush()
            .map_err(|err| error(RuntimeErrorKind::Io(err.to_string()), 0, 0));
        result.and(flushed)
    }

    fn run(&mut self, program: &'p Program) -> Result<(), RuntimeError> {
        for declaration in &program.declarations {
            match declaration {
                Declaration::Function(function) => {
                    self.functions.insert(function.name.as_str(), function);
                }
                other => self.declare(other)?,
            }
        }
        self.exec_block(&program.body)?;
        Ok(())
    }

    fn declare(&mut self, declaration: &Declaration) -> Result<(), RuntimeError> {
        match declaration {
            Declaration::Var(decl) => {
                self.env
                    .define(decl.name.clone(), decl.ty.clone(), Value::default_for(&decl.ty));
            }
            Declaration::Array(decl) => {
                let mut dims = Vec::with_capacity(decl.sizes.len());
                for size in &decl.sizes {
                    match fold_constant(size) {
                        Some(value) if value > 0 => dims.push(value as usize),
                        _ => {
                            return Err(error(
                                RuntimeErrorKind::UnsupportedOperation {
                                    operation: "array size".to_string(),
                                    type_name: "non-constant expression".to_string(),
                                },
                                size.line,
                                size.column,
                            ));
                        }
                    }
                }
                self.env.define(
                    decl.name.clone(),
                    decl.ty(),
                    Value::new_array(&decl.element, &dims),
                );
            }
            Declaration::Function(_) => {}
        }
        Ok(())
    }

    fn exec_block(&mut self, block: &'p Block) -> Result<Flow, RuntimeError> {
        for statement in &block.statements {
            if let Flow::Return(value) = self.exec_statement(statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_statement(&mut self, statement: &'p Stmt) -> Result<Flow, RuntimeError> {
        self.nesting += 1;
        let flow = self.dispatch(statement);
        self.nesting -= 1;
        flow
    }

    fn dispatch(&mut self, statement: &'p Stmt) -> Result<Flow, RuntimeError> {
        match statement {
            Stmt::Block(block) => return self.exec_block(block),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(condition)? {
                    return self.exec_statement(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.exec_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                while self.eval_bool(condition)? {
                    if let Flow::Return(value) = self.exec_statement(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(value)?;
                self.store(target, value)?;
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => Some(self.eval(expr)?),
                    None => None,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Write { args, newline } => {
                for arg in args {
                    let value = self.eval(arg)?;
                    write!(self.output, "{value}").map_err(|err| io_error(err, arg))?;
                }
                if *newline {
                    writeln!(self.output).map_err(|err| {
                        error(RuntimeErrorKind::Io(err.to_string()), 0, 0)
                    })?;
                }
            }
            Stmt::Read { targets } => {
                for target in targets {
                    self.read_into(target)?;
                }
            }
            Stmt::Call(expr) => match &expr.kind {
                ExprKind::Call { name, args } => {
                    self.call(name, args, expr)?;
                }
                _ => {
                    self.eval(expr)?;
                }
            },
            Stmt::NoOp => {}
        }
        Ok(Flow::Normal)
    }

    fn eval_bool(&mut self, expr: &'p Expr) -> Result<bool, RuntimeError> {
        match self.eval(expr)? {
            Value::Boolean(value) => Ok(value),
            other => Err(unsupported("condition", &other, expr)),
        }
    }

    fn eval_index(&mut self, expr: &'p Expr) -> Result<i64, RuntimeError> {
        match self.eval(expr)? {
            Value::Integer(value) => Ok(value),
            other => Err(unsupported("array index", &other, expr)),
        }
    }

    fn lookup(&self, name: &str, expr: &Expr) -> Result<Value, RuntimeError> {
        self.env
            .get(name)
            .map(|binding| binding.value.clone())
            .ok_or_else(|| {
                error(
                    RuntimeErrorKind::UndefinedVariable {
                        name: name.to_string(),
                    },
                    expr.line,
                    expr.column,
                )
            })
    }

    /// Resolves `name[indices...]` down to the array holding the final
    /// element; returns that array and the final index.
    fn locate(
        &mut self,
        name: &str,
        indices: &'p [Expr],
        expr: &'p Expr,
    ) -> Result<(ArrayRef, i64, &'p Expr), RuntimeError> {
        let mut positions = Vec::with_capacity(indices.len());
        for index in indices {
            positions.push((self.eval_index(index)?, index));
        }

        let mut current = self.lookup(name, expr)?;
        let Some(((last, last_expr), rest)) = positions.split_last() else {
            return Err(unsupported("indexing without an index", &current, expr));
        };
        for &(index, index_expr) in rest {
            current = element(&current, index, index_expr)?;
        }
        match current {
            Value::Array(array) => Ok((array, *last, *last_expr)),
            other => Err(unsupported("indexing", &other, last_expr)),
        }
    }

    fn store(&mut self, target: &'p Expr, value: Value) -> Result<(), RuntimeError> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                let binding = self.env.get_mut(name).ok_or_else(|| {
                    error(
                        RuntimeErrorKind::UndefinedVariable { name: name.clone() },
                        target.line,
                        target.column,
                    )
                })?;
                binding.value = value.coerce_to(&binding.ty);
                Ok(())
            }
            ExprKind::Index { name, indices } => {
                let (array, index, index_expr) = self.locate(name, indices, target)?;
                let mut items = array.borrow_mut();
                let len = items.len();
                let slot = usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| out_of_bounds(index, len, index_expr))?;
                let element_type = match &*slot {
                    Value::Float(_) => Type::Float,
                    _ => Type::Integer,
                };
                *slot = value.coerce_to(&element_type);
                Ok(())
            }
            _ => Err(unsupported("assignment", &value, target)),
        }
    }

    fn target_type(&self, target: &Expr) -> Option<Type> {
        match &target.kind {
            ExprKind::Identifier(name) => self.env.get(name).map(|binding| binding.ty.clone()),
            ExprKind::Index { name, indices } => {
                let mut ty = self.env.get(name)?.ty.clone();
                for _ in indices {
                    ty = match ty {
                        Type::Array(element) => *element,
                        _ => return None,
                    };
                }
                Some(ty)
            }
            _ => None,
        }
    }

    fn read_into(&mut self, target: &'p Expr) -> Result<(), RuntimeError> {
        let ty = self.target_type(target).ok_or_else(|| {
            let name = match &target.kind {
                ExprKind::Identifier(name) | ExprKind::Index { name, .. } => name.clone(),
                _ => String::new(),
            };
            error(
                RuntimeErrorKind::UndefinedVariable { name },
                target.line,
                target.column,
            )
        })?;
        let token = self
            .input
            .next_token()
            .map_err(|err| io_error(err, target))?
            .ok_or_else(|| error(RuntimeErrorKind::InputExhausted, target.line, target.column))?;

        let conversion_error = |target_name: &'static str| {
            error(
                RuntimeErrorKind::Conversion {
                    value: token.clone(),
                    target: target_name,
                },
                target.line,
                target.column,
            )
        };
        let value = match ty {
            Type::Integer => Value::Integer(
                token
                    .parse()
                    .map_err(|_| conversion_error("INTEGER"))?,
            ),
            Type::Float => Value::Float(parse_float(&token).ok_or_else(|| conversion_error("FLOAT"))?),
            Type::String => Value::Str(token.clone()),
            Type::Boolean => match token.to_ascii_uppercase().as_str() {
                "TRUE" => Value::Boolean(true),
                "FALSE" => Value::Boolean(false),
                _ => return Err(conversion_error("BOOLEAN")),
            },
            Type::Array(_) => return Err(conversion_error("ARRAY")),
        };
        self.store(target, value)
    }

    fn eval(&mut self, expr: &'p Expr) -> Result<Value, RuntimeError> {
        self.nesting += 1;
        let value = self.eval_kind(expr);
        self.nesting -= 1;
        value
    }

    fn eval_kind(&mut self, expr: &'p Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Integer(value) => Value::Integer(*value),
                Literal::Float(value) => Value::Float(*value),
                Literal::Str(value) => Value::Str(value.clone()),
                Literal::Boolean(value) => Value::Boolean(*value),
            }),
            ExprKind::Identifier(name) => self.lookup(name, expr),
            ExprKind::Index { name, indices } => {
                let (array, index, index_expr) = self.locate(name, indices, expr)?;
                element(&Value::Array(array), index, index_expr)
            }
            ExprKind::Binary { left, op, right } => match op {
                BinaryOp::And => Ok(Value::Boolean(
                    self.eval_bool(left)? && self.eval_bool(right)?,
                )),
                BinaryOp::Or => Ok(Value::Boolean(
                    self.eval_bool(left)? || self.eval_bool(right)?,
                )),
                _ => {
                    let left = self.eval(left)?;
                    let right = self.eval(right)?;
                    binary(*op, left, right, expr)
                }
            },
            ExprKind::Unary { op, expr: operand } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Plus, value @ (Value::Integer(_) | Value::Float(_))) => Ok(value),
                    (UnaryOp::Minus, Value::Integer(value)) => value
                        .checked_neg()
                        .map(Value::Integer)
                        .ok_or_else(|| error(RuntimeErrorKind::IntegerOverflow, expr.line, expr.column)),
                    (UnaryOp::Minus, Value::Float(value)) => Ok(Value::Float(-value)),
                    (UnaryOp::Not, Value::Boolean(value)) => Ok(Value::Boolean(!value)),
                    (op, value) => Err(unsupported(op, &value, expr)),
                }
            }
            ExprKind::Call { name, args } => self.call(name, args, expr)?.ok_or_else(|| {
                error(
                    RuntimeErrorKind::UnsupportedOperation {
                        operation: format!("use of '{name}' as a value"),
                        type_name: "a function without a return type".to_string(),
                    },
                    expr.line,
                    expr.column,
                )
            }),
            ExprKind::Convert { conversion, expr: operand } => {
                let value = self.eval(operand)?;
                convert(*conversion, value, expr)
            }
        }
    }

    /// Calls `name` with a fresh frame holding the parameters and locals.
    /// Scalars are bound by value; arrays share the caller's storage.
    fn call(
        &mut self,
        name: &str,
        args: &'p [Expr],
        expr: &'p Expr,
    ) -> Result<Option<Value>, RuntimeError> {
        let function = *self.functions.get(name).ok_or_else(|| {
            error(
                RuntimeErrorKind::UndefinedFunction {
                    name: name.to_string(),
                },
                expr.line,
                expr.column,
            )
        })?;
        if self.env.depth() >= MAX_CALL_DEPTH || self.nesting >= MAX_EVAL_NESTING {
            return Err(error(
                RuntimeErrorKind::StackOverflow {
                    depth: self.env.depth(),
                },
                expr.line,
                expr.column,
            ));
        }
        if function.params.len() != args.len() {
            return Err(error(
                RuntimeErrorKind::UnsupportedOperation {
                    operation: format!("call with {} arguments", args.len()),
                    type_name: format!("'{name}' taking {}", function.params.len()),
                },
                expr.line,
                expr.column,
            ));
        }

        let mut frame = Scope::new();
        for (param, arg) in function.params.iter().zip(args) {
            let value = self.eval(arg)?.coerce_to(&param.ty);
            frame.insert(
                param.name.clone(),
                Binding {
                    ty: param.ty.clone(),
                    value,
                },
            );
        }

        self.env.push_frame(frame);
        let result = self.run_body(function);
        self.env.pop_frame();

        match result? {
            Flow::Return(value) => Ok(value.map(|value| match &function.return_type {
                Some(ty) => value.coerce_to(ty),
                None => value,
            })),
            Flow::Normal if function.return_type.is_some() => Err(error(
                RuntimeErrorKind::MissingReturn {
                    function: function.name.clone(),
                },
                expr.line,
                expr.column,
            )),
            Flow::Normal => Ok(None),
        }
    }

    fn run_body(&mut self, function: &'p FunctionDecl) -> Result<Flow, RuntimeError> {
        for local in &function.locals {
            self.declare(local)?;
        }
        self.exec_block(&function.body)
    }
}

fn io_error(err: io::Error, expr: &Expr) -> RuntimeError {
    error(RuntimeErrorKind::Io(err.to_string()), expr.line, expr.column)
}

fn out_of_bounds(index: i64, len: usize, expr: &Expr) -> RuntimeError {
    error(
        RuntimeErrorKind::IndexOutOfBounds { index, len },
        expr.line,
        expr.column,
    )
}

/// Bounds-checked element read; indices run over `[0, len)`.
fn element(array: &Value, index: i64, expr: &Expr) -> Result<Value, RuntimeError> {
    let Value::Array(items) = array else {
        return Err(unsupported("indexing", array, expr));
    };
    let items = items.borrow();
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or_else(|| out_of_bounds(index, items.len(), expr))
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn binary(op: BinaryOp, left: Value, right: Value, expr: &Expr) -> Result<Value, RuntimeError> {
    let at = |kind| error(kind, expr.line, expr.column);
    match (&left, &right) {
        (Value::Integer(a), Value::Integer(b)) => {
            let (a, b) = (*a, *b);
            let checked = |result: Option<i64>| {
                result
                    .map(Value::Integer)
                    .ok_or_else(|| at(RuntimeErrorKind::IntegerOverflow))
            };
            match op {
                BinaryOp::Add => checked(a.checked_add(b)),
                BinaryOp::Sub => checked(a.checked_sub(b)),
                BinaryOp::Mul => checked(a.checked_mul(b)),
                BinaryOp::Div | BinaryOp::Mod if b == 0 => Err(at(RuntimeErrorKind::DivisionByZero)),
                BinaryOp::Div => checked(a.checked_div(b)),
                BinaryOp::Mod => checked(a.checked_rem(b)),
                _ => compare(op, a.cmp(&b), &left, expr),
            }
        }
        (Value::Float(_) | Value::Integer(_), Value::Float(_) | Value::Integer(_)) => {
            let (a, b) = (left.as_f64().unwrap_or_default(), right.as_f64().unwrap_or_default());
            match op {
                BinaryOp::Add => Ok(Value::Float(a + b)),
                BinaryOp::Sub => Ok(Value::Float(a - b)),
                BinaryOp::Mul => Ok(Value::Float(a * b)),
                BinaryOp::Div if b == 0.0 => Err(at(RuntimeErrorKind::DivisionByZero)),
                BinaryOp::Div => Ok(Value::Float(a / b)),
                _ => match a.partial_cmp(&b) {
                    Some(ordering) => compare(op, ordering, &left, expr),
                    None => Ok(Value::Boolean(op == BinaryOp::Ne)),
                },
            }
        }
        (Value::Str(a), Value::Str(b)) if matches!(op, BinaryOp::Eq | BinaryOp::Ne) => {
            Ok(Value::Boolean((a == b) == (op == BinaryOp::Eq)))
        }
        (Value::Boolean(a), Value::Boolean(b)) if matches!(op, BinaryOp::Eq | BinaryOp::Ne) => {
            Ok(Value::Boolean((a == b) == (op == BinaryOp::Eq)))
        }
        _ => Err(unsupported(op, &left, expr)),
    }
}

fn compare(
    op: BinaryOp,
    ordering: std::cmp::Ordering,
    left: &Value,
    expr: &Expr,
) -> Result<Value, RuntimeError> {
    use std::cmp::Ordering::{Equal, Greater, Less};
    let result = match op {
        BinaryOp::Eq => ordering == Equal,
        BinaryOp::Ne => ordering != Equal,
        BinaryOp::Lt => ordering == Less,
        BinaryOp::Le => ordering != Greater,
        BinaryOp::Gt => ordering == Greater,
        BinaryOp::Ge => ordering != Less,
        _ => return Err(unsupported(op, left, expr)),
    };
    Ok(Value::Boolean(result))
}

fn convert(conversion: Conversion, value: Value, expr: &Expr) -> Result<Value, RuntimeError> {
    let failed = |value: &Value, target| {
        error(
            RuntimeErrorKind::Conversion {
                value: value.to_string(),
                target,
            },
            expr.line,
            expr.column,
        )
    };
    match (conversion, &value) {
        (Conversion::Int, Value::Integer(_)) => Ok(value),
        (Conversion::Int, Value::Float(f)) => {
            let truncated = f.trunc();
            if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                Ok(Value::Integer(truncated as i64))
            } else {
                Err(failed(&value, "INTEGER"))
            }
        }
        (Conversion::Int, Value::Str(text)) => text
            .trim()
            .parse()
            .map(Value::Integer)
            .map_err(|_| failed(&value, "INTEGER")),
        (Conversion::Int, Value::Boolean(b)) => Ok(Value::Integer(i64::from(*b))),
        (Conversion::Float, Value::Integer(i)) => Ok(Value::Float(*i as f64)),
        (Conversion::Float, Value::Float(_)) => Ok(value),
        (Conversion::Float, Value::Str(text)) => parse_float(text)
            .map(Value::Float)
            .ok_or_else(|| failed(&value, "FLOAT")),
        (Conversion::Float, Value::Boolean(b)) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        (_, Value::Array(_)) => Err(unsupported("conversion", &value, expr)),
        (Conversion::Str, _) => Ok(Value::Str(value.to_string())),
    }
}
