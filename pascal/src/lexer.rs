use crate::error::LexError;
use crate::token::{Token, TokenKind};

pub struct Lexer {
    text: Vec<char>,
    pos: usize,
    current_char: Option<char>,
    line: usize,
    column: usize,
    finished: bool,
}

impl Lexer {
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let current_char = chars.first().copied();
        Lexer {
            text: chars,
            pos: 0,
            current_char,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    fn advance(&mut self) {
        if self.current_char == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else if self.current_char.is_some() {
            self.column += 1;
        }
        self.pos += 1;
        self.current_char = self.text.get(self.pos).copied();
    }

    fn peek(&self) -> Option<char> {
        self.text.get(self.pos + 1).copied()
    }

    fn lexeme_from(&self, start: usize) -> String {
        self.text[start..self.pos].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Skips a `{ ... }` or `(* ... *)` comment; the opener is still current.
    fn skip_comment(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let brace = self.current_char == Some('{');
        self.advance();
        if !brace {
            self.advance();
        }
        loop {
            match self.current_char {
                None => return Err(LexError::UnterminatedComment { line, column }),
                Some('}') if brace => {
                    self.advance();
                    return Ok(());
                }
                Some('*') if !brace && self.peek() == Some(')') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn digits(&mut self) -> usize {
        let mut count = 0;
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                count += 1;
                self.advance();
            } else {
                break;
            }
        }
        count
    }

    fn number(&mut self) -> Result<Token, LexError> {
        let (line, column, start) = (self.line, self.column, self.pos);
        self.digits();

        let mut is_float = false;
        if self.current_char == Some('.') && self.peek() != Some('.') {
            is_float = true;
            self.advance();
            let mut valid = self.digits() > 0;
            if valid && matches!(self.current_char, Some('e' | 'E')) {
                self.advance();
                if matches!(self.current_char, Some('+' | '-')) {
                    self.advance();
                }
                valid = self.digits() > 0;
            }
            if !valid {
                return Err(LexError::MalformedNumber {
                    literal: self.lexeme_from(start),
                    line,
                    column,
                });
            }
        }
        if matches!(self.current_char, Some(ch) if ch.is_alphabetic() || ch == '_') {
            self.advance();
            return Err(LexError::MalformedNumber {
                literal: self.lexeme_from(start),
                line,
                column,
            });
        }

        let lexeme = self.lexeme_from(start);
        let malformed = || LexError::MalformedNumber {
            literal: lexeme.clone(),
            line,
            column,
        };
        let kind = if is_float {
            TokenKind::Float(lexeme.parse().map_err(|_| malformed())?)
        } else {
            TokenKind::Integer(lexeme.parse().map_err(|_| malformed())?)
        };
        Ok(Token::new(kind, lexeme, line, column))
    }

    fn string(&mut self) -> Result<Token, LexError> {
        let (line, column, start) = (self.line, self.column, self.pos);
        self.advance();

        let mut value = String::new();
        loop {
            match self.current_char {
                None | Some('\n') => return Err(LexError::UnterminatedString { line, column }),
                Some('\'') if self.peek() == Some('\'') => {
                    value.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
        Ok(Token::new(
            TokenKind::Str(value),
            self.lexeme_from(start),
            line,
            column,
        ))
    }

    fn id(&mut self) -> Token {
        let (line, column, start) = (self.line, self.column, self.pos);
        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let lexeme = self.lexeme_from(start);
        let kind = TokenKind::keyword(&lexeme).unwrap_or_else(|| TokenKind::Id(lexeme.clone()));
        Token::new(kind, lexeme, line, column)
    }

    pub fn get_next_token(&mut self) -> Result<Token, LexError> {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.skip_whitespace();
                continue;
            }

            if ch == '{' || (ch == '(' && self.peek() == Some('*')) {
                self.skip_comment()?;
                continue;
            }

            if ch.is_ascii_digit() {
                return self.number();
            }

            if ch.is_alphabetic() || ch == '_' {
                return Ok(self.id());
            }

            if ch == '\'' {
                return self.string();
            }

            let (line, column) = (self.line, self.column);
            let two_char = match (ch, self.peek()) {
                (':', Some('=')) => Some(TokenKind::Assign),
                ('<', Some('=')) => Some(TokenKind::LessEqual),
                ('<', Some('>')) => Some(TokenKind::NotEqual),
                ('>', Some('=')) => Some(TokenKind::GreaterEqual),
                _ => None,
            };
            if let Some(kind) = two_char {
                let start = self.pos;
                self.advance();
                self.advance();
                return Ok(Token::new(kind, self.lexeme_from(start), line, column));
            }

            let kind = match ch {
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Multiply,
                '/' => TokenKind::Divide,
                '%' => TokenKind::Mod,
                '=' => TokenKind::Equal,
                '<' => TokenKind::Less,
                '>' => TokenKind::Greater,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                ';' => TokenKind::Semi,
                ':' => TokenKind::Colon,
                ',' => TokenKind::Comma,
                '.' => TokenKind::Dot,
                _ => {
                    return Err(LexError::UnexpectedCharacter {
                        character: ch,
                        line,
                        column,
                    });
                }
            };

            self.advance();
            return Ok(Token::new(kind, ch.to_string(), line, column));
        }

        Ok(Token::new(TokenKind::Eof, "", self.line, self.column))
    }
}

/// Yields tokens up to and including `Eof`, then stops. A lexing error is
/// yielded once and ends the sequence.
impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.get_next_token();
        if !matches!(&result, Ok(token) if token.kind != TokenKind::Eof) {
            self.finished = true;
        }
        Some(result)
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_integer_token() {
        let mut lexer = Lexer::new("123");
        assert_eq!(lexer.get_next_token().unwrap().kind, TokenKind::Integer(123));
    }

    #[test]
    fn test_float_token() {
        assert_eq!(
            kinds("3.25 1.5e2 2.0E-1"),
            vec![
                TokenKind::Float(3.25),
                TokenKind::Float(150.0),
                TokenKind::Float(0.2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("+ - * / := = <> < <= > >= %"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Multiply,
                TokenKind::Divide,
                TokenKind::Assign,
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Mod,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("BEGIN end While mod Function"),
            vec![
                TokenKind::Begin,
                TokenKind::End,
                TokenKind::While,
                TokenKind::Mod,
                TokenKind::Function,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_identifier() {
        assert_eq!(
            kinds("variable_name x123 _tmp"),
            vec![
                TokenKind::Id("variable_name".to_string()),
                TokenKind::Id("x123".to_string()),
                TokenKind::Id("_tmp".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_with_doubled_quote() {
        let tokens = tokenize("'it''s'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str("it's".to_string()));
        assert_eq!(tokens[0].lexeme, "'it''s'");
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("{ one } x (* two\n lines *) y"),
            vec![
                TokenKind::Id("x".to_string()),
                TokenKind::Id("y".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("x :=\n  42").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 3));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
    }

    #[test]
    fn test_end_dot_is_not_a_float() {
        assert_eq!(
            kinds("END."),
            vec![TokenKind::End, TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn test_trailing_dot_is_malformed() {
        let err = tokenize("x := 1.;").unwrap_err();
        assert!(matches!(
            err,
            LexError::MalformedNumber { line: 1, column: 6, .. }
        ));
    }

    #[test]
    fn test_missing_exponent_digits() {
        assert!(matches!(
            tokenize("1.5e").unwrap_err(),
            LexError::MalformedNumber { .. }
        ));
    }

    #[test]
    fn test_integer_too_large() {
        assert!(matches!(
            tokenize("99999999999999999999").unwrap_err(),
            LexError::MalformedNumber { .. }
        ));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokenize("\n  'abc").unwrap_err(),
            LexError::UnterminatedString { line: 2, column: 3 }
        );
    }

    #[test]
    fn test_unterminated_comment() {
        assert!(matches!(
            tokenize("x { never closed").unwrap_err(),
            LexError::UnterminatedComment { line: 1, column: 3 }
        ));
    }

    #[test]
    fn test_invalid_character() {
        assert_eq!(
            tokenize("x @").unwrap_err(),
            LexError::UnexpectedCharacter {
                character: '@',
                line: 1,
                column: 3
            }
        );
    }

    #[test]
    fn test_iterator_stops_after_eof() {
        let mut lexer = Lexer::new("x");
        assert!(lexer.next().is_some());
        assert_eq!(lexer.next().unwrap().unwrap().kind, TokenKind::Eof);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_lexemes_reconstruct_source() {
        let source = "PROGRAM p; VAR s: STRING; BEGIN s := 'a''b'; WRITE(s, 1.5 <> 2) END.";
        let tokens = tokenize(source).unwrap();
        let rebuilt: Vec<&str> = tokens.iter().map(|token| token.lexeme.as_str()).collect();
        let rebuilt = rebuilt.join(" ");
        let again: Vec<TokenKind> = kinds(&rebuilt);
        let original: Vec<TokenKind> = tokens.into_iter().map(|token| token.kind).collect();
        assert_eq!(again, original);
    }
}
