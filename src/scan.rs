use crate::{
    token::{self, Token},
    Position, ScanError,
};

/// Scanner reads characters from the source code and groups them in to
/// a sequence of tokens. Tokens are produced on demand, one per call to
/// [`Scanner::scan`].
#[derive(Debug)]
pub struct Scanner {
    src: Vec<char>,
    start: usize,
    current: usize,
    start_pos: Position,
    pos: Position,
}

impl Scanner {
    /// Create a new scanner
    pub fn new(src: &str) -> Self {
        let src = src.chars().collect();
        Self {
            src,
            start: 0,
            current: 0,
            start_pos: Position::default(),
            pos: Position::default(),
        }
    }

    /// Consume and return the next token from source. Once the end of the
    /// source is reached, every subsequent call returns an `Eof` token.
    pub fn scan(&mut self) -> Result<Token, ScanError> {
        self.skip_whitespace();
        self.start = self.current;
        self.start_pos = self.pos;
        if self.is_source_end() {
            return Ok(self.token(token::Type::Eof));
        }
        Ok(match self.advance() {
            '(' => self.token(token::Type::LParen),
            ')' => self.token(token::Type::RParen),
            '{' => self.token(token::Type::LBrace),
            '}' => self.token(token::Type::RBrace),
            ';' => self.token(token::Type::Semicolon),
            ',' => self.token(token::Type::Comma),
            '.' => self.token(token::Type::Dot),
            '-' => self.token(token::Type::Minus),
            '+' => self.token(token::Type::Plus),
            '/' => self.token(token::Type::Slash),
            '*' => self.token(token::Type::Star),
            '!' => self.either('=', token::Type::BangEqual, token::Type::Bang),
            '=' => self.either('=', token::Type::EqualEqual, token::Type::Equal),
            '<' => self.either('=', token::Type::LessEqual, token::Type::Less),
            '>' => self.either('=', token::Type::GreaterEqual, token::Type::Greater),
            '"' => self.string()?,
            n if is_digit(n) => self.number(),
            c if is_alpha(c) => self.identity(),
            c => {
                return Err(ScanError::UnexpectedCharacter(self.start_pos, c));
            }
        })
    }

    fn either(&mut self, expected: char, matched: token::Type, single: token::Type) -> Token {
        if self.consume(expected) {
            self.token(matched)
        } else {
            self.token(single)
        }
    }

    fn identity(&mut self) -> Token {
        while is_alpha(self.peek()) || is_digit(self.peek()) {
            self.advance();
        }
        let lexeme: String = self.src[self.start..self.current].iter().collect();
        let typ = token::Type::keyword(&lexeme).unwrap_or(token::Type::Ident);
        Token {
            typ,
            lexeme,
            pos: self.start_pos,
        }
    }

    fn number(&mut self) -> Token {
        while is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == '.' && is_digit(self.peek_next()) {
            self.advance();
            while is_digit(self.peek()) {
                self.advance();
            }
        }
        self.token(token::Type::Number)
    }

    fn string(&mut self) -> Result<Token, ScanError> {
        while self.peek() != '"' && !self.is_source_end() {
            self.advance();
        }

        if self.is_source_end() {
            return Err(ScanError::UnterminatedString(self.start_pos));
        }
        self.advance();
        Ok(self.token(token::Type::String))
    }

    fn token(&self, typ: token::Type) -> Token {
        Token {
            typ,
            lexeme: self.src[self.start..self.current].iter().collect(),
            pos: self.start_pos,
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\r' | '\t' | '\n' => {
                    self.advance();
                }
                '/' => {
                    if self.peek_next() == '/' {
                        while self.peek() != '\n' && !self.is_source_end() {
                            self.advance();
                        }
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn peek(&self) -> char {
        self.src.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.src.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.src[self.current];
        if c == '\n' {
            self.pos.next_line();
        } else {
            self.pos.next_column();
        }
        self.current += 1;
        c
    }

    fn consume(&mut self, expected: char) -> bool {
        if self.peek() != expected || self.is_source_end() {
            return false;
        }
        self.advance();
        true
    }

    fn is_source_end(&self) -> bool {
        self.current >= self.src.len()
    }
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}
