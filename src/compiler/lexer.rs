//! Script tokenizer
//!
//! Tokens are whitespace-separated, with `;`, `{`, `}` and `=` recognized
//! even when glued to their neighbors. `#` starts a line comment. Positions
//! are 1-indexed for diagnostics.

use crate::error::{CompileError, CompileErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier, possibly dotted (`unit.hp`).
    Ident(String),
    /// Signed decimal or hexadecimal integer literal.
    Int(i64),
    /// String literal, quotes stripped.
    Str(String),
    /// Statement terminator `;`.
    Semi,
    /// Block open `{`.
    LBrace,
    /// Block close `}`.
    RBrace,
    /// Initializer `=` in a declaration.
    Assign,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

impl Token {
    /// The token's source text, for diagnostics.
    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Int(value) => value.to_string(),
            TokenKind::Str(text) => format!("\"{text}\""),
            TokenKind::Semi => ";".to_string(),
            TokenKind::LBrace => "{".to_string(),
            TokenKind::RBrace => "}".to_string(),
            TokenKind::Assign => "=".to_string(),
        }
    }

    /// The identifier text, when the token is one.
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

struct Scanner<'s> {
    chars: std::iter::Peekable<std::str::Chars<'s>>,
    line: u32,
    column: u32,
    parent: &'s str,
}

impl<'s> Scanner<'s> {
    fn new(source: &'s str, parent: &'s str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            parent,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;

        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(c)
    }

    fn error(&self, line: u32, column: u32, token: &str, message: &str) -> CompileError {
        CompileError {
            kind: CompileErrorKind::Syntax,
            line,
            column,
            token: token.to_string(),
            message: message.to_string(),
            parent: self.parent.to_string(),
        }
    }
}

/// Tokenize a script source.
pub fn lex(source: &str, parent: &str) -> Result<Vec<Token>, CompileError> {
    let mut scanner = Scanner::new(source, parent);
    let mut tokens = Vec::new();

    while let Some(&c) = scanner.chars.peek() {
        let line = scanner.line;
        let column = scanner.column;

        if c.is_whitespace() {
            scanner.bump();
            continue;
        }

        if c == '#' {
            while let Some(&c) = scanner.chars.peek() {
                if c == '\n' {
                    break;
                }
                scanner.bump();
            }
            continue;
        }

        let kind = match c {
            ';' => {
                scanner.bump();
                TokenKind::Semi
            }
            '{' => {
                scanner.bump();
                TokenKind::LBrace
            }
            '}' => {
                scanner.bump();
                TokenKind::RBrace
            }
            '=' => {
                scanner.bump();
                TokenKind::Assign
            }
            '"' => {
                scanner.bump();
                let mut text = String::new();
                loop {
                    match scanner.bump() {
                        Some('"') => break,
                        Some(c) => text.push(c),
                        None => {
                            return Err(scanner.error(
                                line,
                                column,
                                "\"",
                                "unterminated string literal",
                            ))
                        }
                    }
                }
                TokenKind::Str(text)
            }
            c if c == '-' || c.is_ascii_digit() => {
                let mut text = String::new();
                text.push(c);
                scanner.bump();

                while let Some(&c) = scanner.chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        text.push(c);
                        scanner.bump();
                    } else {
                        break;
                    }
                }

                let value = parse_int(&text)
                    .ok_or_else(|| scanner.error(line, column, &text, "malformed integer"))?;

                TokenKind::Int(value)
            }
            c if is_ident_start(c) => {
                let mut text = String::new();
                text.push(c);
                scanner.bump();

                while let Some(&c) = scanner.chars.peek() {
                    if is_ident_continue(c) {
                        text.push(c);
                        scanner.bump();
                    } else {
                        break;
                    }
                }

                TokenKind::Ident(text)
            }
            c => {
                return Err(scanner.error(
                    line,
                    column,
                    &c.to_string(),
                    "unexpected character",
                ))
            }
        };

        tokens.push(Token { kind, line, column });
    }

    Ok(tokens)
}

fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    if digits.is_empty() {
        return None;
    }

    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source, "test")
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn statements_split_on_glued_semicolons() {
        assert_eq!(
            kinds("out add a b;"),
            vec![
                TokenKind::Ident("out".into()),
                TokenKind::Ident("add".into()),
                TokenKind::Ident("a".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn integers_decimal_hex_negative() {
        assert_eq!(
            kinds("5 -12 0x1f;"),
            vec![
                TokenKind::Int(5),
                TokenKind::Int(-12),
                TokenKind::Int(0x1f),
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("a # everything else\nb"),
            vec![TokenKind::Ident("a".into()), TokenKind::Ident("b".into())]
        );
    }

    #[test]
    fn dotted_identifiers_stay_single_tokens() {
        assert_eq!(kinds("unit.hp"), vec![TokenKind::Ident("unit.hp".into())]);
    }

    #[test]
    fn positions_are_one_indexed() {
        let tokens = lex("a\n  b", "test").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let err = lex("debug \"oops", "test").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        assert_eq!(err.parent, "test");
    }

    #[test]
    fn malformed_integer_is_rejected() {
        assert!(lex("12abc;", "test").is_err());
    }
}
