use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}'")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Malformed numeric literal '{literal}'")]
    MalformedNumber {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal")]
    UnterminatedString { line: usize, column: usize },
    #[error("Unterminated comment")]
    UnterminatedComment { line: usize, column: usize },
}

impl LexError {
    pub fn position(&self) -> (usize, usize) {
        match self {
            LexError::UnexpectedCharacter { line, column, .. }
            | LexError::MalformedNumber { line, column, .. }
            | LexError::UnterminatedString { line, column }
            | LexError::UnterminatedComment { line, column } => (*line, *column),
        }
    }
}

/// Grammar violation: what the parser wanted and what it got instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Expected {expected}, found {found}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SemanticErrorKind {
    #[error("Undeclared identifier '{name}'")]
    Undeclared { name: String },
    #[error("Function '{name}' expected {expected} arguments, got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Decl(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub line: usize,
    pub column: usize,
}

impl SemanticError {
    pub fn new(kind: SemanticErrorKind, line: usize, column: usize) -> Self {
        SemanticError { kind, line, column }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SemanticErrorKind::Undeclared { .. } => "UndeclaredError",
            SemanticErrorKind::Arity { .. } => "ArityError",
            SemanticErrorKind::Type(_) => "TypeError",
            SemanticErrorKind::Decl(_) => "DeclError",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Array index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("Cannot convert '{value}' to {target}")]
    Conversion { value: String, target: &'static str },
    #[error("Function '{function}' finished without returning a value")]
    MissingReturn { function: String },
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("Undefined function '{name}'")]
    UndefinedFunction { name: String },
    #[error("Operation '{operation}' is not supported for {type_name}")]
    UnsupportedOperation {
        operation: String,
        type_name: String,
    },
    #[error("Integer overflow")]
    IntegerOverflow,
    #[error("Stack overflow at call depth {depth}")]
    StackOverflow { depth: usize },
    #[error("Input exhausted while reading")]
    InputExhausted,
    #[error("I/O failure: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: usize,
    pub column: usize,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, line: usize, column: usize) -> Self {
        RuntimeError { kind, line, column }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            RuntimeErrorKind::DivisionByZero => "DivisionByZero",
            RuntimeErrorKind::IndexOutOfBounds { .. } => "ArrayIndexOutOfBounds",
            RuntimeErrorKind::Conversion { .. } => "ConversionError",
            RuntimeErrorKind::MissingReturn { .. } => "MissingReturnError",
            RuntimeErrorKind::UndefinedVariable { .. } => "UndefinedVariable",
            RuntimeErrorKind::UndefinedFunction { .. } => "UndefinedFunction",
            RuntimeErrorKind::UnsupportedOperation { .. } => "UnsupportedOperation",
            RuntimeErrorKind::IntegerOverflow => "IntegerOverflow",
            RuntimeErrorKind::StackOverflow { .. } => "StackOverflow",
            RuntimeErrorKind::InputExhausted => "InputExhausted",
            RuntimeErrorKind::Io(_) => "IoError",
        }
    }
}

/// Any failure of the lex → parse → check → run pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Lex(_) => "LexError",
            Error::Parse(_) => "ParseError",
            Error::Semantic(err) => err.kind_name(),
            Error::Runtime(err) => err.kind_name(),
        }
    }

    pub fn line(&self) -> usize {
        self.position().0
    }

    pub fn column(&self) -> usize {
        self.position().1
    }

    fn position(&self) -> (usize, usize) {
        match self {
            Error::Lex(err) => err.position(),
            Error::Parse(err) => (err.line, err.column),
            Error::Semantic(err) => (err.line, err.column),
            Error::Runtime(err) => (err.line, err.column),
        }
    }

    /// One-line diagnostic: kind, position and message.
    pub fn report(&self) -> String {
        format!(
            "{} at line {}, column {}: {}",
            self.kind(),
            self.line(),
            self.column(),
            self
        )
    }
}
