use std::fmt;

/// Static type of a declaration or expression. Multi-dimensional arrays nest:
/// `ARRAY[2, 3] OF INTEGER` is `Array(Array(Integer))`.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Integer,
    Float,
    String,
    Boolean,
    Array(Box<Type>),
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Integer | Type::Float)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    /// Builds the nested array type for `dims` dimensions over `element`.
    pub fn array_of(element: Type, dims: usize) -> Type {
        (0..dims).fold(element, |ty, _| Type::Array(Box::new(ty)))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => f.write_str("INTEGER"),
            Type::Float => f.write_str("FLOAT"),
            Type::String => f.write_str("STRING"),
            Type::Boolean => f.write_str("BOOLEAN"),
            Type::Array(element) => write!(f, "ARRAY OF {element}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub declarations: Vec<Declaration>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Var(VarDecl),
    Array(ArrayDecl),
    Function(FunctionDecl),
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub struct ArrayDecl {
    pub name: String,
    pub element: Type,
    /// One constant size expression per dimension, outermost first.
    pub sizes: Vec<Expr>,
    pub line: usize,
    pub column: usize,
}

impl ArrayDecl {
    pub fn ty(&self) -> Type {
        Type::array_of(self.element.clone(), self.sizes.len())
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    /// Local `VAR` section; only `Var` and `Array` declarations appear here.
    pub locals: Vec<Declaration>,
    pub body: Block,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Block),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    Return {
        value: Option<Expr>,
        line: usize,
        column: usize,
    },
    Write {
        args: Vec<Expr>,
        newline: bool,
    },
    Read {
        targets: Vec<Expr>,
    },
    Call(Expr),
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "MOD",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Plus => f.write_str("+"),
            UnaryOp::Minus => f.write_str("-"),
            UnaryOp::Not => f.write_str("NOT"),
        }
    }
}

/// Builtin explicit conversions `INT(e)`, `FLOAT(e)` and `STR(e)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Int,
    Float,
    Str,
}

impl Conversion {
    pub fn from_name(name: &str) -> Option<Conversion> {
        match name.to_ascii_uppercase().as_str() {
            "INT" => Some(Conversion::Int),
            "FLOAT" => Some(Conversion::Float),
            "STR" => Some(Conversion::Str),
            _ => None,
        }
    }

    pub fn result_type(self) -> Type {
        match self {
            Conversion::Int => Type::Integer,
            Conversion::Float => Type::Float,
            Conversion::Str => Type::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    /// Filled in by semantic analysis.
    pub ty: Option<Type>,
    pub line: usize,
    pub column: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize, column: usize) -> Self {
        Expr {
            kind,
            ty: None,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Index {
        name: String,
        indices: Vec<Expr>,
    },
    Convert {
        conversion: Conversion,
        expr: Box<Expr>,
    },
}

/// Evaluates a literal-only integer expression, as allowed for array sizes.
/// Returns `None` for anything that needs a runtime environment or overflows.
pub fn fold_constant(expr: &Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::Literal(Literal::Integer(value)) => Some(*value),
        ExprKind::Unary { op, expr } => {
            let value = fold_constant(expr)?;
            match op {
                UnaryOp::Plus => Some(value),
                UnaryOp::Minus => value.checked_neg(),
                UnaryOp::Not => None,
            }
        }
        ExprKind::Binary { left, op, right } => {
            let (left, right) = (fold_constant(left)?, fold_constant(right)?);
            match op {
                BinaryOp::Add => left.checked_add(right),
                BinaryOp::Sub => left.checked_sub(right),
                BinaryOp::Mul => left.checked_mul(right),
                BinaryOp::Div => left.checked_div(right),
                BinaryOp::Mod => left.checked_rem(right),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> Expr {
        Expr::new(ExprKind::Literal(Literal::Integer(value)), 1, 1)
    }

    fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::new(
            ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            1,
            1,
        )
    }

    #[test]
    fn test_fold_literal_arithmetic() {
        let expr = binary(int(2), BinaryOp::Mul, binary(int(3), BinaryOp::Add, int(4)));
        assert_eq!(fold_constant(&expr), Some(14));
    }

    #[test]
    fn test_fold_rejects_identifiers() {
        let expr = binary(
            int(2),
            BinaryOp::Add,
            Expr::new(ExprKind::Identifier("n".to_string()), 1, 1),
        );
        assert_eq!(fold_constant(&expr), None);
    }

    #[test]
    fn test_fold_rejects_division_by_zero() {
        assert_eq!(fold_constant(&binary(int(1), BinaryOp::Div, int(0))), None);
    }

    #[test]
    fn test_array_type_nesting() {
        let ty = Type::array_of(Type::Float, 2);
        assert_eq!(ty.to_string(), "ARRAY OF ARRAY OF FLOAT");
    }
}
