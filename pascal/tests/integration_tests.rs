use pascal_interpreter::{Error, MAX_CALL_DEPTH, execute, execute_with_input, interpret};

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_hello_world() {
        let program = "PROGRAM Hello; BEGIN WRITE('Hello, World!'); END.";
        assert_eq!(execute(program).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_integer_and_float_division() {
        let program = "PROGRAM Div; BEGIN WRITE(INT(7) / INT(2)); WRITELN; WRITE(FLOAT(7) / FLOAT(2)) END.";
        assert_eq!(execute(program).unwrap(), "3\n3.5");
    }

    #[test]
    fn test_while_loop() {
        let program = "
            PROGRAM Loop;
            VAR i: INTEGER;
            BEGIN
                i := 0;
                WHILE i < 3 DO BEGIN WRITE(i); i := i + 1; END;
            END.";
        assert_eq!(execute(program).unwrap(), "012");
    }

    #[test]
    fn test_recursive_factorial() {
        let program = "
            PROGRAM Fact;
            FUNCTION factorial(n: INTEGER): INTEGER;
            BEGIN
                IF n <= 1 THEN RETURN 1;
                RETURN n * factorial(n - 1)
            END;
            BEGIN
                WRITE(factorial(5))
            END.";
        assert_eq!(execute(program).unwrap(), "120");
    }

    #[test]
    fn test_deterministic_output() {
        let program = "
            PROGRAM Squares;
            VAR i: INTEGER; total: FLOAT;
            BEGIN
                i := 1;
                WHILE i <= 4 DO
                BEGIN
                    total := total + i * i / 3.0;
                    WRITELN(i, ' ', total);
                    i := i + 1
                END
            END.";
        let first = execute(program).unwrap();
        assert_eq!(first, execute(program).unwrap());
        assert_eq!(first, "1 0.333333\n2 1.66667\n3 4.66667\n4 10.0\n");
    }

    #[test]
    fn test_mixed_arithmetic_is_float() {
        let program = "
            PROGRAM Mixed;
            VAR i: INTEGER; f: FLOAT;
            BEGIN
                i := 3; f := 0.5;
                WRITELN(i + f, ' ', FLOAT(i) + f);
                WRITELN(i * f, ' ', f - i);
                WRITE(i / 2.0 = FLOAT(i) / 2.0)
            END.";
        assert_eq!(execute(program).unwrap(), "3.5 3.5\n1.5 -2.5\nTRUE");
    }

    #[test]
    fn test_out_of_bounds_never_clamps() {
        for index in ["-1", "5", "100"] {
            let program = format!(
                "PROGRAM B; VAR a: ARRAY[5] OF INTEGER; BEGIN WRITE(a[{index}]) END."
            );
            let err = execute(&program).unwrap_err();
            assert_eq!(err.kind(), "ArrayIndexOutOfBounds");
        }
        let last = "PROGRAM B; VAR a: ARRAY[5] OF INTEGER; BEGIN a[4] := 9; WRITE(a[4]) END.";
        assert_eq!(execute(last).unwrap(), "9");
    }

    #[test]
    fn test_missing_return_error() {
        let program = "
            PROGRAM M;
            VAR x: INTEGER;
            FUNCTION sign(n: INTEGER): INTEGER;
            BEGIN
                IF n > 0 THEN RETURN 1
            END;
            BEGIN
                WRITE('start');
                x := sign(-4)
            END.";
        let mut output = Vec::new();
        let err = interpret(program, "".as_bytes(), &mut output).unwrap_err();
        assert_eq!(err.kind(), "MissingReturnError");
        assert_eq!(err.line(), 10);
        assert_eq!(output, b"start");
    }

    #[test]
    fn test_procedure_and_array_by_reference() {
        let program = "
            PROGRAM Sort;
            VAR data: ARRAY[5] OF INTEGER; i: INTEGER;
            FUNCTION sort(xs: ARRAY OF INTEGER; n: INTEGER);
            VAR i, j, tmp: INTEGER;
            BEGIN
                i := 0;
                WHILE i < n DO
                BEGIN
                    j := 0;
                    WHILE j < n - 1 - i DO
                    BEGIN
                        IF xs[j] > xs[j + 1] THEN
                        BEGIN
                            tmp := xs[j]; xs[j] := xs[j + 1]; xs[j + 1] := tmp
                        END;
                        j := j + 1
                    END;
                    i := i + 1
                END
            END;
            BEGIN
                data[0] := 4; data[1] := 1; data[2] := 5; data[3] := 2; data[4] := 3;
                i := 99;
                sort(data, 5);
                i := 0;
                WHILE i < 5 DO BEGIN WRITE(data[i]); i := i + 1 END
            END.";
        assert_eq!(execute(program).unwrap(), "12345");
    }

    #[test]
    fn test_two_dimensional_array() {
        let program = "
            PROGRAM Grid;
            VAR m: ARRAY[3, 3] OF INTEGER; i, j: INTEGER;
            BEGIN
                i := 0;
                WHILE i < 3 DO
                BEGIN
                    j := 0;
                    WHILE j < 3 DO BEGIN m[i, j] := i * 3 + j; j := j + 1 END;
                    i := i + 1
                END;
                WRITE(m[2][1], ' ', m[1, 2])
            END.";
        assert_eq!(execute(program).unwrap(), "7 5");
    }

    #[test]
    fn test_strings_booleans_and_comments() {
        let program = "
            PROGRAM Text; { brace comment }
            VAR s: STRING; ok: BOOLEAN;
            BEGIN
                (* star comment *)
                s := 'it''s';
                ok := NOT (s = 'its') AND TRUE;
                WRITELN(s, ' ', ok);
                WRITELN(STR(10 MOD 4) = '2', ' ', 10 % 4)
            END.";
        assert_eq!(execute(program).unwrap(), "it's TRUE\nTRUE 2\n");
    }

    #[test]
    fn test_read_from_input() {
        let program = "
            PROGRAM Sum;
            VAR n, i, x, total: INTEGER;
            BEGIN
                READ(n);
                WHILE i < n DO BEGIN READ(x); total := total + x; i := i + 1 END;
                WRITE(total)
            END.";
        assert_eq!(execute_with_input(program, "3\n10 20\n12\n").unwrap(), "42");

        let err = execute_with_input(program, "3\n1 2").unwrap_err();
        assert_eq!(err.kind(), "InputExhausted");
    }

    #[test]
    fn test_error_kinds_and_positions() {
        let cases: [(&str, &str, usize, usize); 7] = [
            ("PROGRAM p; BEGIN x := 1 END.", "UndeclaredError", 1, 18),
            ("PROGRAM p; VAR s: STRING; BEGIN s := 1 END.", "TypeError", 1, 38),
            ("PROGRAM p; VAR x: INTEGER; VAR x: FLOAT; BEGIN END.", "DeclError", 1, 32),
            ("PROGRAM p; BEGIN WRITE(1 / 0) END.", "DivisionByZero", 1, 26),
            ("PROGRAM p; BEGIN WRITE(1 # 2) END.", "LexError", 1, 26),
            ("PROGRAM p; BEGIN WRITE(1) END", "ParseError", 1, 30),
            ("PROGRAM p;\nBEGIN\n  WRITE(INT('x'))\nEND.", "ConversionError", 3, 9),
        ];
        for (program, kind, line, column) in cases {
            let err = execute(program).unwrap_err();
            assert_eq!(err.kind(), kind, "{program}");
            assert_eq!((err.line(), err.column()), (line, column), "{program}");
        }
    }

    #[test]
    fn test_arity_error() {
        let program = "
            PROGRAM A;
            FUNCTION f(a, b: INTEGER): INTEGER; BEGIN RETURN a + b END;
            BEGIN WRITE(f(1)) END.";
        let err = execute(program).unwrap_err();
        assert!(matches!(err, Error::Semantic(_)));
        assert_eq!(err.kind(), "ArityError");
    }

    #[test]
    fn test_report_format() {
        let err = execute("PROGRAM p; BEGIN WRITE(1 / 0) END.").unwrap_err();
        assert_eq!(
            err.report(),
            "DivisionByZero at line 1, column 26: Division by zero"
        );
    }

    fn count_program(call: &str) -> String {
        format!(
            "
            PROGRAM Deep;
            FUNCTION count(n: INTEGER): INTEGER;
            BEGIN
                IF n = 0 THEN RETURN 0;
                RETURN 1 + count(n - 1)
            END;
            BEGIN WRITE({call}) END."
        )
    }

    #[test]
    fn test_deep_recursion_within_limit() {
        assert_eq!(execute(&count_program("count(100)")).unwrap(), "100");
        let deepest = format!("count({})", MAX_CALL_DEPTH - 1);
        assert_eq!(
            execute(&count_program(&deepest)).unwrap(),
            (MAX_CALL_DEPTH - 1).to_string()
        );
    }

    #[test]
    fn test_recursion_past_limit_is_stack_overflow() {
        let call = format!("count({})", MAX_CALL_DEPTH);
        let err = execute(&count_program(&call)).unwrap_err();
        assert_eq!(err.kind(), "StackOverflow");
        assert_eq!(err.line(), 6);
    }

    #[test]
    fn test_deep_recursion_through_nested_blocks() {
        let program = "
            PROGRAM Nested;
            FUNCTION count(n: INTEGER): INTEGER;
            BEGIN
                BEGIN
                    WHILE TRUE DO
                    BEGIN
                        IF n = 0 THEN RETURN 0;
                        IF TRUE THEN
                        BEGIN
                            RETURN ((((1 + ((count(n - 1)) * 1)))))
                        END
                    END
                END
            END;
            BEGIN WRITE(count(500)) END.";
        assert_eq!(execute(program).unwrap(), "500");
    }
}
