// ABOUTME: Source text to token stream, one line at a time

use crate::error::{LexError, LexErrorKind};
use crate::token::{keyword_kind, Token, TokenKind};
use log::trace;

pub struct Lexer {
    chars: Vec<char>,
    start: usize,
    current: usize,
    line: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            start: 0,
            current: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }
        trace!("lexer reached end of input at line {}", self.line);
        self.tokens.push(Token::new(TokenKind::EndOfFile, "", self.line));
        Ok(self.tokens)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.current + 1).copied()
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn add(&mut self, kind: TokenKind) {
        let lexeme: String = self.chars[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(kind, lexeme, self.line));
    }

    fn scan_token(&mut self) -> Result<(), LexError> {
        let c = self.advance();
        match c {
            ' ' | '\t' | '\r' => {}
            '\n' => {
                trace!("lexer crossed line boundary, now at line {}", self.line + 1);
                self.line += 1;
            }
            '(' => self.add(TokenKind::LParen),
            ')' => self.add(TokenKind::RParen),
            '{' => self.add(TokenKind::LBrace),
            '}' => self.add(TokenKind::RBrace),
            '[' => self.add(TokenKind::LeftSquare),
            ']' => self.add(TokenKind::RightSquare),
            ',' => self.add(TokenKind::Comma),
            '.' => self.add(TokenKind::Dot),
            ';' => self.add(TokenKind::Semicolon),
            '*' => {
                if self.matches('=') {
                    self.add(TokenKind::StarEqual)
                } else {
                    self.add(TokenKind::Star)
                }
            }
            '%' => self.add(TokenKind::Modulo),
            '+' => {
                if self.matches('+') {
                    self.add(TokenKind::PlusPlus)
                } else if self.matches('=') {
                    self.add(TokenKind::PlusEqual)
                } else {
                    self.add(TokenKind::Plus)
                }
            }
            '-' => {
                if self.matches('-') {
                    self.add(TokenKind::MinusMinus)
                } else if self.matches('=') {
                    self.add(TokenKind::MinusEqual)
                } else {
                    self.add(TokenKind::Minus)
                }
            }
            '/' => {
                if self.matches('/') {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.current += 1;
                    }
                } else if self.matches('=') {
                    self.add(TokenKind::SlashEqual)
                } else {
                    self.add(TokenKind::Slash)
                }
            }
            '!' => {
                if self.matches('=') {
                    self.add(TokenKind::BangEqual)
                } else {
                    self.add(TokenKind::Bang)
                }
            }
            '=' => {
                if self.matches('=') {
                    self.add(TokenKind::EqualEqual)
                } else {
                    self.add(TokenKind::Equal)
                }
            }
            '<' => {
                if self.matches('=') {
                    self.add(TokenKind::LessEqual)
                } else {
                    self.add(TokenKind::Less)
                }
            }
            '>' => {
                if self.matches('=') {
                    self.add(TokenKind::GreaterEqual)
                } else {
                    self.add(TokenKind::Greater)
                }
            }
            '&' => {
                if self.matches('&') {
                    self.add(TokenKind::AndAnd)
                } else {
                    return Err(LexError {
                        kind: LexErrorKind::LoneAmpersand,
                        line: self.line,
                    });
                }
            }
            '|' => {
                if self.matches('|') {
                    self.add(TokenKind::OrOr)
                } else {
                    return Err(LexError {
                        kind: LexErrorKind::LonePipe,
                        line: self.line,
                    });
                }
            }
            '"' => self.string()?,
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            other => {
                return Err(LexError {
                    kind: LexErrorKind::UnexpectedChar(other),
                    line: self.line,
                })
            }
        }
        Ok(())
    }

    fn string(&mut self) -> Result<(), LexError> {
        let line = self.line;
        while self.peek().is_some_and(|c| c != '"') {
            if self.peek() == Some('\n') {
                return Err(LexError {
                    kind: LexErrorKind::UnterminatedString,
                    line,
                });
            }
            self.current += 1;
        }
        if self.is_at_end() {
            return Err(LexError {
                kind: LexErrorKind::UnterminatedString,
                line,
            });
        }
        let content: String = self.chars[self.start + 1..self.current].iter().collect();
        self.current += 1; // closing quote
        self.tokens.push(Token::new(TokenKind::String, content, line));
        Ok(())
    }

    fn number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.current += 1;
        }
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.current += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.current += 1;
            }
        }
        self.add(TokenKind::Number);
    }

    fn identifier(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.current += 1;
        }
        let text: String = self.chars[self.start..self.current].iter().collect();
        match keyword_kind(&text) {
            Some(TokenKind::True) | Some(TokenKind::False) => {
                self.tokens.push(Token::new(TokenKind::Boolean, text, self.line))
            }
            Some(kind) => self.tokens.push(Token::new(kind, text, self.line)),
            None => self.tokens.push(Token::new(TokenKind::Identifier, text, self.line)),
        }
    }
}

/// Convenience entry point mirroring spec §4.1's "consumes full source text"
/// framing: the lexer tracks line boundaries internally rather than being
/// driven one line at a time by the caller.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    trace!("lexing {} bytes of source", source.len());
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_ends_with_single_eof_token() {
        let tokens = lex("let x = 1;").unwrap();
        assert_eq!(tokens.last().unwrap().kind, TokenKind::EndOfFile);
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::EndOfFile).count(), 1);
    }

    #[test]
    fn test_eof_line_is_one_past_last_source_line() {
        let tokens = lex("let x = 1;\nlet y = 2;").unwrap();
        assert_eq!(tokens.last().unwrap().line, 3);
    }

    #[test]
    fn test_maximal_munch_two_char_tokens() {
        assert_eq!(
            kinds("== != <= >= ++ -- += -= *= /="),
            vec![
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_comment_discards_rest_of_line() {
        let tokens = lex("let x = 1; // trailing\nlet y = 2;").unwrap();
        assert!(tokens.iter().all(|t| !t.lexeme.contains("trailing")));
    }

    #[test]
    fn test_lone_ampersand_and_pipe_are_lex_errors() {
        assert!(lex("&").is_err());
        assert!(lex("|").is_err());
        assert!(lex("&&").is_ok());
        assert!(lex("||").is_ok());
    }

    #[test]
    fn test_string_literal_strips_quotes_and_takes_content_verbatim() {
        let tokens = lex(r#""hello world""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "hello world");
    }

    #[test]
    fn test_unterminated_string_is_a_lex_error() {
        assert!(lex("\"no closing quote").is_err());
        assert!(lex("\"newline before close\n\"").is_err());
    }

    #[test]
    fn test_number_literal_with_and_without_fraction() {
        let tokens = lex("42 3.14").unwrap();
        assert_eq!(tokens[0].lexeme, "42");
        assert_eq!(tokens[1].lexeme, "3.14");
    }

    #[test]
    fn test_trailing_dot_without_digits_is_not_consumed_into_number() {
        // spec requires a digit after `.`; a bare trailing dot is its own token.
        let tokens = lex("42.").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "42");
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(kinds("if True False")[..3], [TokenKind::If, TokenKind::Boolean, TokenKind::Boolean]);
        assert_eq!(kinds("true false")[..2], [TokenKind::Identifier, TokenKind::Identifier]);
    }

    #[test]
    fn test_and_or_are_ordinary_identifiers() {
        assert_eq!(kinds("and or")[..2], [TokenKind::Identifier, TokenKind::Identifier]);
    }

    #[test]
    fn test_unexpected_character_is_a_lex_error() {
        let err = lex("@").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnexpectedChar('@'));
    }
}
