use std::fmt;

/// Lox token. The lexeme is copied out of the source so tokens can outlive
/// the scanner that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Lox token type
    pub typ: Type,
    /// The string segment in source that represents this token. For string
    /// literals this includes the surrounding quotes.
    pub lexeme: String,
    /// The position at which this token was found in source.
    pub pos: Position,
}

impl Token {
    /// Create a synthetic token that does not come from source, used to
    /// prime the parser before the first real token is scanned.
    pub fn synthetic(typ: Type) -> Self {
        Self {
            typ,
            lexeme: String::new(),
            pos: Position::default(),
        }
    }
}

/// Lox token types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Single character '('
    LParen,
    /// Single character ')'
    RParen,
    /// Single character '{'
    LBrace,
    /// Single character '}'
    RBrace,
    /// Single character ','
    Comma,
    /// Single character '.'
    Dot,
    /// Single character '-'
    Minus,
    /// Single character '+'
    Plus,
    /// Single character ';'
    Semicolon,
    /// Single character '/'
    Slash,
    /// Single character '*'
    Star,
    /// Single character '!'
    Bang,
    /// Double character '!='
    BangEqual,
    /// Single character '='
    Equal,
    /// Double character '=='
    EqualEqual,
    /// Single character '>'
    Greater,
    /// Double character '>='
    GreaterEqual,
    /// Single character '<'
    Less,
    /// Double character '<='
    LessEqual,
    /// Named entity
    Ident,
    /// String literal
    String,
    /// Number literal
    Number,
    /// Keyword 'and'
    And,
    /// Keyword 'class'
    Class,
    /// Keyword 'else'
    Else,
    /// Boolean literal 'false'
    False,
    /// Keyword 'for'
    For,
    /// Keyword 'fun'
    Fun,
    /// Keyword 'if'
    If,
    /// Nothing literal 'nil'
    Nil,
    /// Keyword 'or'
    Or,
    /// Keyword 'print'
    Print,
    /// Keyword 'return'
    Return,
    /// Keyword 'super'
    Super,
    /// Keyword 'this'
    This,
    /// Boolean literal 'true'
    True,
    /// Keyword 'var'
    Var,
    /// Keyword 'while'
    While,
    /// End of file
    Eof,
}

impl Type {
    /// Map a lexeme to its keyword type, if it is one of the reserved words.
    pub fn keyword(lexeme: &str) -> Option<Self> {
        let typ = match lexeme {
            "and" => Self::And,
            "class" => Self::Class,
            "else" => Self::Else,
            "false" => Self::False,
            "for" => Self::For,
            "fun" => Self::Fun,
            "if" => Self::If,
            "nil" => Self::Nil,
            "or" => Self::Or,
            "print" => Self::Print,
            "return" => Self::Return,
            "super" => Self::Super,
            "this" => Self::This,
            "true" => Self::True,
            "var" => Self::Var,
            "while" => Self::While,
            _ => return None,
        };
        Some(typ)
    }
}

/// Position of the token in source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Current line in source file
    pub line: usize,
    /// Current column in source file
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}]", self.line)
    }
}

impl Position {
    /// Increment the line count by one and reset the column count
    pub fn next_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    /// Increment the column count by one
    pub fn next_column(&mut self) {
        self.column += 1;
    }
}
