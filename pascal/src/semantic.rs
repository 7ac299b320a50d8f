use std::collections::HashMap;

use crate::ast::{
    ArrayDecl, BinaryOp, Block, Conversion, Declaration, Expr, ExprKind, FunctionDecl, Literal,
    Program, Stmt, Type, UnaryOp, fold_constant,
};
use crate::error::{SemanticError, SemanticErrorKind};

#[derive(Debug, Clone)]
struct Signature {
    params: Vec<Type>,
    return_type: Option<Type>,
}

#[derive(Debug, Clone)]
enum Symbol {
    Variable(Type),
    Function(Signature),
}

/// Integer widens to Float; every other pairing must match exactly.
fn assignable(target: &Type, value: &Type) -> bool {
    target == value || (*target == Type::Float && *value == Type::Integer)
}

fn type_error(message: String, line: usize, column: usize) -> SemanticError {
    SemanticError::new(SemanticErrorKind::Type(message), line, column)
}

fn decl_error(message: String, line: usize, column: usize) -> SemanticError {
    SemanticError::new(SemanticErrorKind::Decl(message), line, column)
}

/// Validates declarations, name resolution, call arity and types, and records
/// the static type of every value-producing expression in `Expr::ty`.
pub struct SemanticAnalyzer {
    globals: HashMap<String, Symbol>,
    /// Position of each global variable in the declaration list.
    declared_at: HashMap<String, usize>,
    /// Global variables declared at or after this position are out of scope.
    visible_globals: usize,
    locals: Option<HashMap<String, Type>>,
    /// `None` in the main block, `Some(return type)` inside a function body.
    current_return: Option<Option<Type>>,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        SemanticAnalyzer {
            globals: HashMap::new(),
            declared_at: HashMap::new(),
            visible_globals: usize::MAX,
            locals: None,
            current_return: None,
        }
    }

    pub fn analyze(&mut self, program: &mut Program) -> Result<(), SemanticError> {
        for (index, declaration) in program.declarations.iter().enumerate() {
            self.declare_global(index, declaration)?;
        }

        // Function names resolve anywhere; global variables only after
        // their declaration.
        for (index, declaration) in program.declarations.iter_mut().enumerate() {
            if let Declaration::Function(function) = declaration {
                self.visible_globals = index;
                self.check_function(function)?;
            }
        }

        self.visible_globals = usize::MAX;
        self.locals = None;
        self.current_return = None;
        self.check_block(&mut program.body)
    }

    fn declare_global(
        &mut self,
        index: usize,
        declaration: &Declaration,
    ) -> Result<(), SemanticError> {
        let (name, symbol, line, column) = match declaration {
            Declaration::Var(decl) => (
                &decl.name,
                Symbol::Variable(decl.ty.clone()),
                decl.line,
                decl.column,
            ),
            Declaration::Array(decl) => {
                check_array_sizes(decl)?;
                (&decl.name, Symbol::Variable(decl.ty()), decl.line, decl.column)
            }
            Declaration::Function(function) => {
                if Conversion::from_name(&function.name).is_some() {
                    return Err(decl_error(
                        format!("'{}' is a builtin conversion", function.name),
                        function.line,
                        function.column,
                    ));
                }
                if let Some(Type::Array(_)) = function.return_type {
                    return Err(decl_error(
                        format!("Function '{}' cannot return an array", function.name),
                        function.line,
                        function.column,
                    ));
                }
                let signature = Signature {
                    params: function.params.iter().map(|param| param.ty.clone()).collect(),
                    return_type: function.return_type.clone(),
                };
                (
                    &function.name,
                    Symbol::Function(signature),
                    function.line,
                    function.column,
                )
            }
        };

        if self.globals.contains_key(name) {
            return Err(decl_error(
                format!("Duplicate identifier '{name}'"),
                line,
                column,
            ));
        }
        if let Symbol::Variable(_) = symbol {
            self.declared_at.insert(name.clone(), index);
        }
        self.globals.insert(name.clone(), symbol);
        Ok(())
    }

    fn check_function(&mut self, function: &mut FunctionDecl) -> Result<(), SemanticError> {
        let mut locals = HashMap::new();
        let declared = function
            .params
            .iter()
            .map(|param| (&param.name, param.ty.clone(), param.line, param.column));
        let local_vars = function.locals.iter().filter_map(|declaration| match declaration {
            Declaration::Var(decl) => Some(Ok((&decl.name, decl.ty.clone(), decl.line, decl.column))),
            Declaration::Array(decl) => Some(
                check_array_sizes(decl).map(|_| (&decl.name, decl.ty(), decl.line, decl.column)),
            ),
            Declaration::Function(_) => None,
        });

        for entry in declared.map(Ok).chain(local_vars) {
            let (name, ty, line, column) = entry?;
            if locals.insert(name.clone(), ty).is_some() {
                return Err(decl_error(
                    format!("Duplicate identifier '{name}' in function '{}'", function.name),
                    line,
                    column,
                ));
            }
        }

        self.locals = Some(locals);
        self.current_return = Some(function.return_type.clone());
        let result = self.check_block(&mut function.body);
        self.locals = None;
        self.current_return = None;
        result
    }

    fn lookup(&self, name: &str) -> Option<Symbol> {
        if let Some(ty) = self.locals.as_ref().and_then(|locals| locals.get(name)) {
            return Some(Symbol::Variable(ty.clone()));
        }
        match self.globals.get(name) {
            Some(Symbol::Variable(_))
                if self
                    .declared_at
                    .get(name)
                    .is_some_and(|&index| index >= self.visible_globals) =>
            {
                None
            }
            symbol => symbol.cloned(),
        }
    }

    fn variable_type(&self, name: &str, line: usize, column: usize) -> Result<Type, SemanticError> {
        match self.lookup(name) {
            Some(Symbol::Variable(ty)) => Ok(ty),
            Some(Symbol::Function(_)) => Err(type_error(
                format!("'{name}' is a function, not a variable"),
                line,
                column,
            )),
            None => Err(SemanticError::new(
                SemanticErrorKind::Undeclared {
                    name: name.to_string(),
                },
                line,
                column,
            )),
        }
    }

    fn check_block(&mut self, block: &mut Block) -> Result<(), SemanticError> {
        for statement in &mut block.statements {
            self.check_statement(statement)?;
        }
        Ok(())
    }

    fn check_condition(&mut self, condition: &mut Expr, construct: &str) -> Result<(), SemanticError> {
        let ty = self.check_expr(condition)?;
        if ty != Type::Boolean {
            return Err(type_error(
                format!("{construct} condition must be BOOLEAN, got {ty}"),
                condition.line,
                condition.column,
            ));
        }
        Ok(())
    }

    /// Assignment and READ targets must name a scalar location.
    fn check_target(&mut self, target: &mut Expr) -> Result<Type, SemanticError> {
        let ty = self.check_expr(target)?;
        if ty.is_array() {
            return Err(type_error(
                format!("Cannot assign to a whole array of type {ty}"),
                target.line,
                target.column,
            ));
        }
        Ok(ty)
    }

    fn check_statement(&mut self, statement: &mut Stmt) -> Result<(), SemanticError> {
        match statement {
            Stmt::Block(block) => self.check_block(block),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition, "IF")?;
                self.check_statement(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_statement(else_branch)?;
                }
                Ok(())
            }
            Stmt::While { condition, body } => {
                self.check_condition(condition, "WHILE")?;
                self.check_statement(body)
            }
            Stmt::Assign { target, value } => {
                let target_ty = self.check_target(target)?;
                let value_ty = self.check_expr(value)?;
                if !assignable(&target_ty, &value_ty) {
                    return Err(type_error(
                        format!("Cannot assign {value_ty} to a {target_ty} variable"),
                        value.line,
                        value.column,
                    ));
                }
                Ok(())
            }
            Stmt::Return {
                value,
                line,
                column,
            } => self.check_return(value.as_mut(), *line, *column),
            Stmt::Write { args, .. } => {
                for arg in args {
                    let ty = self.check_expr(arg)?;
                    if ty.is_array() {
                        return Err(type_error(
                            format!("Cannot write a value of type {ty}"),
                            arg.line,
                            arg.column,
                        ));
                    }
                }
                Ok(())
            }
            Stmt::Read { targets } => {
                for target in targets {
                    self.check_target(target)?;
                }
                Ok(())
            }
            Stmt::Call(expr) => {
                let (line, column) = (expr.line, expr.column);
                match &mut expr.kind {
                    ExprKind::Call { name, args } => {
                        let return_type = self.check_call(name, args, line, column)?;
                        expr.ty = return_type;
                        Ok(())
                    }
                    _ => Err(type_error(
                        "Only function calls may be used as statements".to_string(),
                        line,
                        column,
                    )),
                }
            }
            Stmt::NoOp => Ok(()),
        }
    }

    fn check_return(
        &mut self,
        value: Option<&mut Expr>,
        line: usize,
        column: usize,
    ) -> Result<(), SemanticError> {
        let expected = match &self.current_return {
            None => {
                return Err(type_error(
                    "RETURN outside of a function".to_string(),
                    line,
                    column,
                ));
            }
            Some(expected) => expected.clone(),
        };

        match (expected, value) {
            (None, None) => Ok(()),
            (None, Some(value)) => Err(type_error(
                "A function without a return type cannot return a value".to_string(),
                value.line,
                value.column,
            )),
            (Some(expected), None) => Err(type_error(
                format!("RETURN must supply a {expected} value"),
                line,
                column,
            )),
            (Some(expected), Some(value)) => {
                let ty = self.check_expr(value)?;
                if assignable(&expected, &ty) {
                    Ok(())
                } else {
                    Err(type_error(
                        format!("Cannot return {ty} from a function returning {expected}"),
                        value.line,
                        value.column,
                    ))
                }
            }
        }
    }

    /// Resolves a call and returns the callee's return type (`None` for
    /// functions declared without one).
    fn check_call(
        &mut self,
        name: &str,
        args: &mut [Expr],
        line: usize,
        column: usize,
    ) -> Result<Option<Type>, SemanticError> {
        let signature = match self.lookup(name) {
            Some(Symbol::Function(signature)) => signature,
            Some(Symbol::Variable(_)) => {
                return Err(type_error(
                    format!("'{name}' is not a function"),
                    line,
                    column,
                ));
            }
            None => {
                return Err(SemanticError::new(
                    SemanticErrorKind::Undeclared {
                        name: name.to_string(),
                    },
                    line,
                    column,
                ));
            }
        };

        if signature.params.len() != args.len() {
            return Err(SemanticError::new(
                SemanticErrorKind::Arity {
                    name: name.to_string(),
                    expected: signature.params.len(),
                    found: args.len(),
                },
                line,
                column,
            ));
        }

        for (position, (param, arg)) in signature.params.iter().zip(args.iter_mut()).enumerate() {
            let ty = self.check_expr(arg)?;
            if !assignable(param, &ty) {
                return Err(type_error(
                    format!(
                        "Argument {} of '{name}' expects {param}, got {ty}",
                        position + 1
                    ),
                    arg.line,
                    arg.column,
                ));
            }
        }

        Ok(signature.return_type)
    }

    fn check_expr(&mut self, expr: &mut Expr) -> Result<Type, SemanticError> {
        let ty = self.infer(expr)?;
        expr.ty = Some(ty.clone());
        Ok(ty)
    }

    fn infer(&mut self, expr: &mut Expr) -> Result<Type, SemanticError> {
        let (line, column) = (expr.line, expr.column);
        match &mut expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Integer(_) => Type::Integer,
                Literal::Float(_) => Type::Float,
                Literal::Str(_) => Type::String,
                Literal::Boolean(_) => Type::Boolean,
            }),
            ExprKind::Identifier(name) => self.variable_type(name, line, column),
            ExprKind::Index { name, indices } => {
                let mut ty = self.variable_type(name, line, column)?;
                for index in indices {
                    let index_ty = self.check_expr(index)?;
                    if index_ty != Type::Integer {
                        return Err(type_error(
                            format!("Array index must be INTEGER, got {index_ty}"),
                            index.line,
                            index.column,
                        ));
                    }
                    ty = match ty {
                        Type::Array(element) => *element,
                        _ => {
                            return Err(type_error(
                                format!("Too many indices for '{name}'"),
                                index.line,
                                index.column,
                            ));
                        }
                    };
                }
                Ok(ty)
            }
            ExprKind::Binary { left, op, right } => {
                let op = *op;
                let left = self.check_expr(left)?;
                let right = self.check_expr(right)?;
                binary_type(op, &left, &right).ok_or_else(|| {
                    type_error(
                        format!("Operator {op} cannot be applied to {left} and {right}"),
                        line,
                        column,
                    )
                })
            }
            ExprKind::Unary { op, expr } => {
                let op = *op;
                let ty = self.check_expr(expr)?;
                let valid = match op {
                    UnaryOp::Plus | UnaryOp::Minus => ty.is_numeric(),
                    UnaryOp::Not => ty == Type::Boolean,
                };
                if valid {
                    Ok(ty)
                } else {
                    Err(type_error(
                        format!("Operator {op} cannot be applied to {ty}"),
                        line,
                        column,
                    ))
                }
            }
            ExprKind::Call { name, args } => {
                let name = name.clone();
                self.check_call(&name, args, line, column)?.ok_or_else(|| {
                    type_error(
                        format!("Function '{name}' does not return a value"),
                        line,
                        column,
                    )
                })
            }
            ExprKind::Convert { conversion, expr } => {
                let conversion = *conversion;
                let ty = self.check_expr(expr)?;
                if ty.is_array() {
                    return Err(type_error(
                        format!("Cannot convert {ty}"),
                        expr.line,
                        expr.column,
                    ));
                }
                Ok(conversion.result_type())
            }
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Result type of a binary operation, widening Integer to Float when mixed.
fn binary_type(op: BinaryOp, left: &Type, right: &Type) -> Option<Type> {
    let numeric = left.is_numeric() && right.is_numeric();
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div if numeric => {
            if *left == Type::Float || *right == Type::Float {
                Some(Type::Float)
            } else {
                Some(Type::Integer)
            }
        }
        BinaryOp::Mod if *left == Type::Integer && *right == Type::Integer => Some(Type::Integer),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge if numeric => Some(Type::Boolean),
        BinaryOp::Eq | BinaryOp::Ne
            if numeric
                || (left == right && matches!(left, Type::String | Type::Boolean)) =>
        {
            Some(Type::Boolean)
        }
        BinaryOp::And | BinaryOp::Or if *left == Type::Boolean && *right == Type::Boolean => {
            Some(Type::Boolean)
        }
        _ => None,
    }
}

/// Array sizes must be positive literal-only integer expressions.
fn check_array_sizes(decl: &ArrayDecl) -> Result<(), SemanticError> {
    for size in &decl.sizes {
        match fold_constant(size) {
            Some(value) if value > 0 => {}
            Some(value) => {
                return Err(decl_error(
                    format!("Array '{}' has non-positive size {value}", decl.name),
                    size.line,
                    size.column,
                ));
            }
            None => {
                return Err(decl_error(
                    format!(
                        "Size of array '{}' must be a constant integer expression",
                        decl.name
                    ),
                    size.line,
                    size.column,
                ));
            }
        }
    }
    Ok(())
}

pub fn check(program: &mut Program) -> Result<(), SemanticError> {
    SemanticAnalyzer::new().analyze(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn analyze(source: &str) -> Result<Program, SemanticError> {
        let mut program = parse(tokenize(source).unwrap()).unwrap();
        check(&mut program)?;
        Ok(program)
    }

    fn kind_of(source: &str) -> &'static str {
        analyze(source).unwrap_err().kind_name()
    }

    #[test]
    fn test_valid_program() {
        let source = "PROGRAM p;
            VAR x: INTEGER; f: FLOAT; names: ARRAY[3] OF STRING;
            FUNCTION half(v: FLOAT): FLOAT; BEGIN RETURN v / 2 END;
            BEGIN
                x := 4;
                f := half(x) + x;
                names[x MOD 3] := STR(f);
                IF NOT (f > 1.5) OR x = 4 THEN WRITE(names[0])
            END.";
        assert!(analyze(source).is_ok());
    }

    #[test]
    fn test_annotates_widened_arithmetic() {
        let program = analyze("PROGRAM p; VAR f: FLOAT; BEGIN f := 1 + 2.5 END.").unwrap();
        match &program.body.statements[0] {
            Stmt::Assign { value, .. } => assert_eq!(value.ty, Some(Type::Float)),
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_undeclared_variable() {
        let err = analyze("PROGRAM p; BEGIN x := 1 END.").unwrap_err();
        assert_eq!(
            err.kind,
            SemanticErrorKind::Undeclared {
                name: "x".to_string()
            }
        );
        assert_eq!((err.line, err.column), (1, 18));
    }

    #[test]
    fn test_undeclared_function() {
        assert_eq!(kind_of("PROGRAM p; BEGIN missing() END."), "UndeclaredError");
    }

    #[test]
    fn test_locals_are_not_visible_in_main() {
        let source = "PROGRAM p;
            FUNCTION f(): INTEGER; VAR t: INTEGER; BEGIN t := 1; RETURN t END;
            BEGIN t := 2 END.";
        assert_eq!(kind_of(source), "UndeclaredError");
    }

    #[test]
    fn test_arity_mismatch() {
        let source = "PROGRAM p; FUNCTION f(a: INTEGER): INTEGER; BEGIN RETURN a END;
            VAR x: INTEGER; BEGIN x := f(1, 2) END.";
        let err = analyze(source).unwrap_err();
        assert_eq!(
            err.kind,
            SemanticErrorKind::Arity {
                name: "f".to_string(),
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_argument_promotion_only_widens() {
        let widen = "PROGRAM p; FUNCTION f(a: FLOAT): FLOAT; BEGIN RETURN a END;
            VAR x: FLOAT; BEGIN x := f(1) END.";
        assert!(analyze(widen).is_ok());

        let narrow = "PROGRAM p; FUNCTION f(a: INTEGER): INTEGER; BEGIN RETURN a END;
            VAR x: INTEGER; BEGIN x := f(1.5) END.";
        assert_eq!(kind_of(narrow), "TypeError");
    }

    #[test]
    fn test_float_to_integer_assignment_rejected() {
        assert_eq!(
            kind_of("PROGRAM p; VAR x: INTEGER; BEGIN x := 1.5 END."),
            "TypeError"
        );
    }

    #[test]
    fn test_string_arithmetic_rejected() {
        assert_eq!(
            kind_of("PROGRAM p; VAR s: STRING; BEGIN s := 'a' + 'b' END."),
            "TypeError"
        );
    }

    #[test]
    fn test_string_equality_allowed() {
        assert!(analyze("PROGRAM p; VAR b: BOOLEAN; BEGIN b := 'a' = 'b' END.").is_ok());
    }

    #[test]
    fn test_condition_must_be_boolean() {
        assert_eq!(
            kind_of("PROGRAM p; VAR x: INTEGER; BEGIN WHILE x DO x := 1 END."),
            "TypeError"
        );
    }

    #[test]
    fn test_index_must_be_integer() {
        assert_eq!(
            kind_of("PROGRAM p; VAR a: ARRAY[3] OF INTEGER; BEGIN a[1.0] := 1 END."),
            "TypeError"
        );
    }

    #[test]
    fn test_too_many_indices() {
        assert_eq!(
            kind_of("PROGRAM p; VAR a: ARRAY[3] OF INTEGER; BEGIN a[1, 2] := 1 END."),
            "TypeError"
        );
    }

    #[test]
    fn test_whole_array_assignment_rejected() {
        let source = "PROGRAM p; VAR a, b: ARRAY[3] OF INTEGER; BEGIN a := b END.";
        assert_eq!(kind_of(source), "TypeError");
    }

    #[test]
    fn test_non_constant_array_size() {
        let source = "PROGRAM p; VAR n: INTEGER; a: ARRAY[n] OF INTEGER; BEGIN END.";
        assert_eq!(kind_of(source), "DeclError");
    }

    #[test]
    fn test_non_positive_array_size() {
        assert_eq!(
            kind_of("PROGRAM p; VAR a: ARRAY[2 - 2] OF INTEGER; BEGIN END."),
            "DeclError"
        );
    }

    #[test]
    fn test_duplicate_declaration() {
        assert_eq!(
            kind_of("PROGRAM p; VAR x: INTEGER; x: FLOAT; BEGIN END."),
            "DeclError"
        );
        assert_eq!(
            kind_of("PROGRAM p; FUNCTION f(a: INTEGER); VAR a: FLOAT; BEGIN END; BEGIN END."),
            "DeclError"
        );
    }

    #[test]
    fn test_function_cannot_shadow_conversion() {
        assert_eq!(
            kind_of("PROGRAM p; FUNCTION int(a: INTEGER): INTEGER; BEGIN RETURN a END; BEGIN END."),
            "DeclError"
        );
    }

    #[test]
    fn test_return_type_checks() {
        let missing_value = "PROGRAM p; FUNCTION f(): INTEGER; BEGIN RETURN END; BEGIN END.";
        assert_eq!(kind_of(missing_value), "TypeError");

        let procedure_value = "PROGRAM p; FUNCTION f(); BEGIN RETURN 1 END; BEGIN END.";
        assert_eq!(kind_of(procedure_value), "TypeError");

        let outside = "PROGRAM p; BEGIN RETURN END.";
        assert_eq!(kind_of(outside), "TypeError");
    }

    #[test]
    fn test_procedure_used_as_value() {
        let source = "PROGRAM p; VAR x: INTEGER; FUNCTION f(); BEGIN END; BEGIN x := f() END.";
        assert_eq!(kind_of(source), "TypeError");
    }

    #[test]
    fn test_array_argument_types_must_match() {
        let ok = "PROGRAM p; VAR a: ARRAY[2, 2] OF INTEGER;
            FUNCTION f(m: ARRAY OF ARRAY OF INTEGER); BEGIN END;
            FUNCTION g(row: ARRAY OF INTEGER); BEGIN END;
            BEGIN f(a); g(a[0]) END.";
        assert!(analyze(ok).is_ok());

        let bad = "PROGRAM p; VAR a: ARRAY[2] OF FLOAT;
            FUNCTION g(row: ARRAY OF INTEGER); BEGIN END;
            BEGIN g(a) END.";
        assert_eq!(kind_of(bad), "TypeError");
    }

    #[test]
    fn test_recursion_and_forward_calls_resolve() {
        let source = "PROGRAM p;
            FUNCTION even(n: INTEGER): BOOLEAN; BEGIN IF n = 0 THEN RETURN TRUE; RETURN odd(n - 1) END;
            FUNCTION odd(n: INTEGER): BOOLEAN; BEGIN IF n = 0 THEN RETURN FALSE; RETURN even(n - 1) END;
            BEGIN WRITE(even(4)) END.";
        assert!(analyze(source).is_ok());
    }

    #[test]
    fn test_conversion_of_array_rejected() {
        let source = "PROGRAM p; VAR a: ARRAY[2] OF INTEGER; BEGIN WRITE(STR(a)) END.";
        assert_eq!(kind_of(source), "TypeError");
    }

    #[test]
    fn test_function_cannot_read_later_global() {
        let source = "PROGRAM p;
            FUNCTION f(): INTEGER; BEGIN RETURN later END;
            VAR later: INTEGER;
            BEGIN later := 7; WRITE(f()) END.";
        let err = analyze(source).unwrap_err();
        assert_eq!(
            err.kind,
            SemanticErrorKind::Undeclared {
                name: "later".to_string()
            }
        );
        assert_eq!((err.line, err.column), (2, 49));
    }

    #[test]
    fn test_function_reads_earlier_global_and_later_function() {
        let source = "PROGRAM p;
            VAR base: INTEGER;
            FUNCTION f(): INTEGER; BEGIN RETURN base + g() END;
            FUNCTION g(): INTEGER; BEGIN RETURN base END;
            VAR unused: INTEGER;
            BEGIN base := 1; unused := f() END.";
        assert!(analyze(source).is_ok());
    }
}
