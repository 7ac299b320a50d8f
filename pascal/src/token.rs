use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    Float(f64),
    Str(String),
    Id(String),

    // Keywords
    Program,
    Var,
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Do,
    IntegerType,
    FloatType,
    StringType,
    BooleanType,
    Array,
    Of,
    Function,
    Return,
    Write,
    Writeln,
    Read,
    Mod,
    True,
    False,
    And,
    Or,
    Not,

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Colon,
    Comma,
    Dot,

    Eof,
}

impl TokenKind {
    /// Reserved word lookup, applied after an identifier has been scanned.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word.to_ascii_uppercase().as_str() {
            "PROGRAM" => TokenKind::Program,
            "VAR" => TokenKind::Var,
            "BEGIN" => TokenKind::Begin,
            "END" => TokenKind::End,
            "IF" => TokenKind::If,
            "THEN" => TokenKind::Then,
            "ELSE" => TokenKind::Else,
            "WHILE" => TokenKind::While,
            "DO" => TokenKind::Do,
            "INTEGER" => TokenKind::IntegerType,
            "FLOAT" => TokenKind::FloatType,
            "STRING" => TokenKind::StringType,
            "BOOLEAN" => TokenKind::BooleanType,
            "ARRAY" => TokenKind::Array,
            "OF" => TokenKind::Of,
            "FUNCTION" => TokenKind::Function,
            "RETURN" => TokenKind::Return,
            "WRITE" => TokenKind::Write,
            "WRITELN" => TokenKind::Writeln,
            "READ" => TokenKind::Read,
            "MOD" => TokenKind::Mod,
            "TRUE" => TokenKind::True,
            "FALSE" => TokenKind::False,
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "NOT" => TokenKind::Not,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(value) => write!(f, "integer {value}"),
            TokenKind::Float(value) => write!(f, "float {value}"),
            TokenKind::Str(value) => write!(f, "string '{value}'"),
            TokenKind::Id(name) => write!(f, "identifier '{name}'"),
            TokenKind::Program => f.write_str("PROGRAM"),
            TokenKind::Var => f.write_str("VAR"),
            TokenKind::Begin => f.write_str("BEGIN"),
            TokenKind::End => f.write_str("END"),
            TokenKind::If => f.write_str("IF"),
            TokenKind::Then => f.write_str("THEN"),
            TokenKind::Else => f.write_str("ELSE"),
            TokenKind::While => f.write_str("WHILE"),
            TokenKind::Do => f.write_str("DO"),
            TokenKind::IntegerType => f.write_str("INTEGER"),
            TokenKind::FloatType => f.write_str("FLOAT"),
            TokenKind::StringType => f.write_str("STRING"),
            TokenKind::BooleanType => f.write_str("BOOLEAN"),
            TokenKind::Array => f.write_str("ARRAY"),
            TokenKind::Of => f.write_str("OF"),
            TokenKind::Function => f.write_str("FUNCTION"),
            TokenKind::Return => f.write_str("RETURN"),
            TokenKind::Write => f.write_str("WRITE"),
            TokenKind::Writeln => f.write_str("WRITELN"),
            TokenKind::Read => f.write_str("READ"),
            TokenKind::Mod => f.write_str("MOD"),
            TokenKind::True => f.write_str("TRUE"),
            TokenKind::False => f.write_str("FALSE"),
            TokenKind::And => f.write_str("AND"),
            TokenKind::Or => f.write_str("OR"),
            TokenKind::Not => f.write_str("NOT"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Multiply => f.write_str("'*'"),
            TokenKind::Divide => f.write_str("'/'"),
            TokenKind::Assign => f.write_str("':='"),
            TokenKind::Equal => f.write_str("'='"),
            TokenKind::NotEqual => f.write_str("'<>'"),
            TokenKind::Less => f.write_str("'<'"),
            TokenKind::LessEqual => f.write_str("'<='"),
            TokenKind::Greater => f.write_str("'>'"),
            TokenKind::GreaterEqual => f.write_str("'>='"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Semi => f.write_str("';'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

/// A scanned token together with its raw source text and 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }
}
