mod token;
mod lexer;
mod ast;
mod parser;
mod semantic;
mod value;
mod environment;
mod interpreter;
mod error;

pub use token::{Token, TokenKind};
pub use lexer::{Lexer, tokenize};
pub use ast::{Program, Type};
pub use parser::{Parser, parse};
pub use semantic::{SemanticAnalyzer, check};
pub use value::{Value, format_float};
pub use interpreter::{
    INTERPRETER_STACK_SIZE, Interpreter, MAX_CALL_DEPTH, MAX_EVAL_NESTING, with_interpreter_stack,
};
pub use error::{
    Error, LexError, ParseError, RuntimeError, RuntimeErrorKind, SemanticError, SemanticErrorKind,
};

use std::io::{BufRead, Write};

/// Runs every stage over `source`, reading READ input from `input` and
/// writing program output to `output`. Output written before an error is
/// still flushed.
///
/// The stages run on a thread with [`INTERPRETER_STACK_SIZE`] bytes of stack,
/// so recursion up to [`MAX_CALL_DEPTH`] works from any calling thread.
pub fn interpret<R, W>(source: &str, input: R, output: W) -> Result<(), Error>
where
    R: BufRead + Send,
    W: Write + Send,
{
    with_interpreter_stack(|| run_pipeline(source, input, output))
        .map_err(|err| RuntimeError::new(RuntimeErrorKind::Io(err.to_string()), 0, 0))?
}

fn run_pipeline<R: BufRead, W: Write>(source: &str, input: R, output: W) -> Result<(), Error> {
    let tokens = tokenize(source)?;
    let mut program = parse(tokens)?;
    check(&mut program)?;
    Interpreter::new(input, output).interpret(&program)?;
    Ok(())
}

/// Runs `program` with `input` as its READ stream and returns the output.
pub fn execute_with_input(program: &str, input: &str) -> Result<String, Error> {
    let mut output = Vec::new();
    interpret(program, input.as_bytes(), &mut output)?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

pub fn execute(program: &str) -> Result<String, Error> {
    execute_with_input(program, "")
}
