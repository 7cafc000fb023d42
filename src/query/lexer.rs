use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    Distinct,
    From,
    Where,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    As,
    And,
    Or,
    Not,
    In,
    Like,
    Is,
    Null,
    True,
    False,
    Count,

    // Operators
    Star,
    Slash,
    Minus,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Dot,

    // Literals
    Number(String),
    String(String),
    Identifier(String),
    /// Positional bind parameter, `$1` is `Parameter(1)`.
    Parameter(usize),

    Eof,
}

/// True when `text` lexes as exactly one non-keyword identifier.
pub fn is_identifier(text: &str) -> bool {
    matches!(
        Lexer::new(text).tokenize().as_deref(),
        Ok([Token::Identifier(ident), Token::Eof]) if ident == text
    )
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.position >= self.input.len() {
                break;
            }
            tokens.push(self.next_token()?);
        }

        tokens.push(Token::Eof);
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        let token = match ch {
            '*' => self.single(Token::Star),
            '/' => self.single(Token::Slash),
            '-' => self.single(Token::Minus),
            '=' => self.single(Token::Equal),
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            ',' => self.single(Token::Comma),
            '.' => self.single(Token::Dot),
            '<' => {
                self.advance();
                match self.current_char() {
                    '=' => self.single(Token::LessEqual),
                    '>' => self.single(Token::NotEqual),
                    _ => Token::Less,
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == '=' {
                    self.single(Token::GreaterEqual)
                } else {
                    Token::Greater
                }
            }
            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.single(Token::NotEqual)
                } else {
                    return Err(Error::QuerySyntax("Unexpected character '!'".to_string()));
                }
            }
            '$' => self.read_parameter()?,
            '\'' | '"' => self.read_string()?,
            _ if ch.is_ascii_digit() => self.read_number(),
            _ if ch.is_alphabetic() || ch == '_' => self.read_identifier(),
            _ => {
                return Err(Error::QuerySyntax(format!(
                    "Unexpected character: '{}'",
                    ch
                )));
            }
        };

        Ok(token)
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Quoted string; a doubled quote inside the literal stands for one quote.
    fn read_string(&mut self) -> Result<Token> {
        let quote = self.current_char();
        self.advance();

        let mut value = String::new();
        loop {
            if self.position >= self.input.len() {
                return Err(Error::QuerySyntax("Unterminated string".to_string()));
            }
            let ch = self.current_char();
            self.advance();
            if ch == quote {
                if self.current_char() == quote {
                    value.push(quote);
                    self.advance();
                } else {
                    break;
                }
            } else {
                value.push(ch);
            }
        }

        Ok(Token::String(value))
    }

    fn read_number(&mut self) -> Token {
        let mut number = String::new();

        while self.position < self.input.len()
            && (self.current_char().is_ascii_digit() || self.current_char() == '.')
        {
            number.push(self.current_char());
            self.advance();
        }

        Token::Number(number)
    }

    fn read_parameter(&mut self) -> Result<Token> {
        self.advance(); // Skip '$'

        let mut digits = String::new();
        while self.position < self.input.len() && self.current_char().is_ascii_digit() {
            digits.push(self.current_char());
            self.advance();
        }

        match digits.parse::<usize>() {
            Ok(index) if index > 0 => Ok(Token::Parameter(index)),
            _ => Err(Error::QuerySyntax(format!(
                "Invalid bind parameter '${}': parameters are numbered from $1",
                digits
            ))),
        }
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while self.position < self.input.len()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "SELECT" => Token::Select,
            "DISTINCT" => Token::Distinct,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "LIMIT" => Token::Limit,
            "AS" => Token::As,
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "IN" => Token::In,
            "LIKE" => Token::Like,
            "IS" => Token::Is,
            "NULL" => Token::Null,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "COUNT" => Token::Count,
            _ => Token::Identifier(ident),
        }
    }

    fn current_char(&self) -> char {
        if self.position < self.input.len() {
            self.input[self.position]
        } else {
            '\0'
        }
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.input.len() && self.current_char().is_whitespace() {
            self.advance();
        }
    }
}
