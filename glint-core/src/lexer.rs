use crate::ast::Span;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Val,
    Var,
    If,
    Else,
    Discard,
    Return,

    // Namespace keywords
    Global,
    Material,
    Vert,
    Frag,

    Identifier(String),
    /// Maximal run of operator characters (`+-*/=!<>&|`). The parser
    /// disambiguates runs by exact-string lookup against the operator
    /// table, so `!=` arrives as one two-character token.
    Symbol(String),
    /// Numeric literal text; the parser decides int vs float from the
    /// presence of `.` or an exponent.
    Number(String),

    LParen,
    RParen,
    LBrace,
    RBrace,
    Semi,
    Comma,
    Dot,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

fn is_symbol_char(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '=' | '!' | '<' | '>' | '&' | '|')
}

struct Lexer<'a> {
    chars: std::str::Chars<'a>,
    peeked: Option<char>,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars(),
            peeked: None,
            line: 1,
            column: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peeked.take().or_else(|| self.chars.next());
        match c {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => {}
        }
        c
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn run(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token()? {
                Some(token) => tokens.push(token),
                None => break,
            }
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: self.span(),
        });
        Ok(tokens)
    }

    /// Produce the next token, or None at end of input. Comments and
    /// whitespace are consumed without producing tokens.
    fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            let span = self.span();
            let c = match self.peek() {
                Some(c) => c,
                None => return Ok(None),
            };

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            // Comments start with a symbol character, so they are peeled
            // off before symbol-run accumulation.
            if c == '/' {
                let mut ahead = self.chars.clone();
                match ahead.next() {
                    Some('/') => {
                        self.skip_line_comment();
                        continue;
                    }
                    Some('*') => {
                        self.skip_block_comment(span)?;
                        continue;
                    }
                    _ => {}
                }
            }

            if c.is_ascii_alphabetic() || c == '_' {
                return Ok(Some(self.lex_word(span)));
            }
            if c.is_ascii_digit() {
                return Ok(Some(self.lex_number(span)));
            }
            if is_symbol_char(c) {
                return Ok(Some(self.lex_symbol_run(span)));
            }

            let kind = match c {
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                ';' => TokenKind::Semi,
                ',' => TokenKind::Comma,
                '.' => TokenKind::Dot,
                _ => {
                    crate::bail_lex_at!(span, "unrecognized character '{}'", c);
                }
            };
            self.bump();
            return Ok(Some(Token { kind, span }));
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self, start: Span) -> Result<()> {
        self.bump(); // '/'
        self.bump(); // '*'
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => {
                    crate::bail_lex_at!(start, "unterminated block comment");
                }
            }
        }
    }

    fn lex_word(&mut self, span: Span) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = match text.as_str() {
            "val" => TokenKind::Val,
            "var" => TokenKind::Var,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "discard" => TokenKind::Discard,
            "return" => TokenKind::Return,
            "global" => TokenKind::Global,
            "material" => TokenKind::Material,
            "vert" => TokenKind::Vert,
            "frag" => TokenKind::Frag,
            _ => TokenKind::Identifier(text),
        };
        Token { kind, span }
    }

    /// Greedy numeric state machine: digits, then an optional fraction
    /// (only if a digit follows the dot, so `1.xyz` stays a field access),
    /// then an optional exponent. No backtracking.
    fn lex_number(&mut self, span: Span) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') {
            let mut ahead = self.chars.clone();
            if ahead.next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                text.push('.');
                self.bump();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut ahead = self.chars.clone();
            let first = ahead.next();
            let exp_ok = match first {
                Some('+') | Some('-') => ahead.next().map(|c| c.is_ascii_digit()).unwrap_or(false),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exp_ok {
                text.push(self.bump().unwrap());
                if matches!(self.peek(), Some('+') | Some('-')) {
                    text.push(self.bump().unwrap());
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        Token {
            kind: TokenKind::Number(text),
            span,
        }
    }

    fn lex_symbol_run(&mut self, span: Span) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_symbol_char(c) {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Symbol(text),
            span,
        }
    }
}

/// Lex one shader fragment into a token stream ending with `Eof`.
pub fn lex(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_keywords() {
        assert_eq!(
            kinds("val var if else discard return"),
            vec![
                TokenKind::Val,
                TokenKind::Var,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Discard,
                TokenKind::Return,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_namespace_keywords() {
        assert_eq!(
            kinds("global material vert frag"),
            vec![
                TokenKind::Global,
                TokenKind::Material,
                TokenKind::Vert,
                TokenKind::Frag,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_identifiers() {
        assert_eq!(
            kinds("out colour _tmp x2"),
            vec![
                TokenKind::Identifier("out".to_string()),
                TokenKind::Identifier("colour".to_string()),
                TokenKind::Identifier("_tmp".to_string()),
                TokenKind::Identifier("x2".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_symbol_runs_are_maximal() {
        // `!=` must be a single two-character token, never `!` then `=`.
        assert_eq!(
            kinds("a != b"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Symbol("!=".to_string()),
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
        // Runs do not stop at operator boundaries; the parser rejects
        // unknown runs by exact-string lookup.
        assert_eq!(
            kinds("a=-b"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Symbol("=-".to_string()),
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_numbers() {
        assert_eq!(
            kinds("1 1.5 0.25 2e10 3.5e-2"),
            vec![
                TokenKind::Number("1".to_string()),
                TokenKind::Number("1.5".to_string()),
                TokenKind::Number("0.25".to_string()),
                TokenKind::Number("2e10".to_string()),
                TokenKind::Number("3.5e-2".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_then_field_access() {
        // The fraction is only consumed when a digit follows the dot.
        assert_eq!(
            kinds("1.x"),
            vec![
                TokenKind::Number("1".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_stripped() {
        assert_eq!(
            kinds("val x = 1; // trailing\n/* block\ncomment */ val y = 2;"),
            kinds("val x = 1;\nval y = 2;")
        );
    }

    #[test]
    fn test_locations_track_newlines_in_block_comments() {
        let tokens = lex("/* a\nb\nc */ val").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Val);
        assert_eq!(tokens[0].span, Span::new(3, 6));
    }

    #[test]
    fn test_locations() {
        let tokens = lex("val x =\n  1.5;").unwrap();
        assert_eq!(tokens[0].span, Span::new(1, 1)); // val
        assert_eq!(tokens[1].span, Span::new(1, 5)); // x
        assert_eq!(tokens[2].span, Span::new(1, 7)); // =
        assert_eq!(tokens[3].span, Span::new(2, 3)); // 1.5
        assert_eq!(tokens[4].span, Span::new(2, 6)); // ;
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = lex("val x = 1; /* oops").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
        assert_eq!(err.span(), Some(Span::new(1, 12)));
    }

    #[test]
    fn test_unrecognized_character() {
        let err = lex("val x = $1;").unwrap_err();
        assert!(err.to_string().contains("unrecognized"));
        assert_eq!(err.span(), Some(Span::new(1, 9)));
    }
}
