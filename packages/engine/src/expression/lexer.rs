//! Expression lexer.

/// Token types in template expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Character,
    Identifier,
    Keyword,
    String,
    Operator,
    Number,
    Error,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub index: usize,
    pub end: usize,
    pub token_type: TokenType,
    pub num_value: f64,
    pub str_value: String,
}

impl Token {
    pub fn new(
        index: usize,
        end: usize,
        token_type: TokenType,
        num_value: f64,
        str_value: String,
    ) -> Self {
        Token {
            index,
            end,
            token_type,
            num_value,
            str_value,
        }
    }

    pub fn is_character(&self, code: char) -> bool {
        self.token_type == TokenType::Character && self.str_value.chars().next() == Some(code)
    }

    pub fn is_identifier(&self) -> bool {
        self.token_type == TokenType::Identifier
    }

    pub fn is_number(&self) -> bool {
        self.token_type == TokenType::Number
    }

    pub fn is_string(&self) -> bool {
        self.token_type == TokenType::String
    }

    pub fn is_operator(&self, operator: &str) -> bool {
        self.token_type == TokenType::Operator && self.str_value == operator
    }

    pub fn is_any_operator(&self) -> bool {
        self.token_type == TokenType::Operator
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.token_type == TokenType::Keyword && self.str_value == word
    }

    pub fn is_error(&self) -> bool {
        self.token_type == TokenType::Error
    }
}

const KEYWORDS: &[&str] = &["null", "undefined", "true", "false", "in", "of", "typeof"];

/// Tokenizer entry point.
pub struct Lexer;

impl Lexer {
    pub fn new() -> Self {
        Lexer
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        Scanner::new(text).scan()
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Lexer::new()
    }
}

struct Scanner {
    input: Vec<char>,
    index: usize,
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

impl Scanner {
    fn new(input: &str) -> Self {
        Scanner {
            input: input.chars().collect(),
            index: 0,
        }
    }

    fn peek(&self) -> char {
        self.input.get(self.index).copied().unwrap_or('\0')
    }

    fn peek_at(&self, offset: usize) -> char {
        self.input.get(self.index + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn scan(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.scan_token() {
            let is_error = token.is_error();
            tokens.push(token);
            if is_error {
                break;
            }
        }
        tokens
    }

    fn scan_token(&mut self) -> Option<Token> {
        while self.index < self.input.len() && self.peek().is_whitespace() {
            self.advance();
        }
        if self.index >= self.input.len() {
            return None;
        }

        let start = self.index;
        let c = self.peek();

        if is_identifier_start(c) {
            return Some(self.scan_identifier(start));
        }
        if c.is_ascii_digit() {
            return Some(self.scan_number(start));
        }
        if c == '\'' || c == '"' {
            return Some(self.scan_string(start));
        }

        match c {
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | ':' | ';' => {
                self.advance();
                Some(Token::new(
                    start,
                    self.index,
                    TokenType::Character,
                    c as u32 as f64,
                    c.to_string(),
                ))
            }
            '.' => {
                // A leading digit after '.' makes this a number literal.
                if self.peek_at(1).is_ascii_digit() {
                    Some(self.scan_number(start))
                } else {
                    self.advance();
                    Some(Token::new(
                        start,
                        self.index,
                        TokenType::Character,
                        c as u32 as f64,
                        c.to_string(),
                    ))
                }
            }
            '?' => {
                self.advance();
                match self.peek() {
                    '?' => {
                        self.advance();
                        Some(self.operator(start, "??"))
                    }
                    '.' => {
                        self.advance();
                        Some(self.operator(start, "?."))
                    }
                    _ => Some(Token::new(
                        start,
                        self.index,
                        TokenType::Character,
                        '?' as u32 as f64,
                        "?".to_string(),
                    )),
                }
            }
            '=' | '!' => {
                self.advance();
                if self.peek() == '=' {
                    self.advance();
                    if self.peek() == '=' {
                        self.advance();
                        Some(self.operator(start, if c == '=' { "===" } else { "!==" }))
                    } else {
                        Some(self.operator(start, if c == '=' { "==" } else { "!=" }))
                    }
                } else {
                    Some(self.operator(start, if c == '=' { "=" } else { "!" }))
                }
            }
            '<' | '>' => {
                self.advance();
                if self.peek() == '=' {
                    self.advance();
                    Some(self.operator(start, if c == '<' { "<=" } else { ">=" }))
                } else {
                    Some(self.operator(start, if c == '<' { "<" } else { ">" }))
                }
            }
            '&' => {
                self.advance();
                if self.peek() == '&' {
                    self.advance();
                    Some(self.operator(start, "&&"))
                } else {
                    Some(self.error(start, "unexpected character '&'"))
                }
            }
            '|' => {
                self.advance();
                if self.peek() == '|' {
                    self.advance();
                    Some(self.operator(start, "||"))
                } else {
                    Some(self.error(start, "unexpected character '|'"))
                }
            }
            '+' | '-' | '*' | '/' | '%' => {
                self.advance();
                Some(self.operator(start, &c.to_string()))
            }
            other => {
                self.advance();
                Some(self.error(start, &format!("unexpected character '{other}'")))
            }
        }
    }

    fn operator(&self, start: usize, text: &str) -> Token {
        Token::new(start, self.index, TokenType::Operator, 0.0, text.to_string())
    }

    fn error(&self, start: usize, message: &str) -> Token {
        Token::new(
            start,
            self.index,
            TokenType::Error,
            0.0,
            message.to_string(),
        )
    }

    fn scan_identifier(&mut self, start: usize) -> Token {
        while self.index < self.input.len() && is_identifier_part(self.peek()) {
            self.advance();
        }
        let text: String = self.input[start..self.index].iter().collect();
        let token_type = if KEYWORDS.contains(&text.as_str()) {
            TokenType::Keyword
        } else {
            TokenType::Identifier
        };
        Token::new(start, self.index, token_type, 0.0, text)
    }

    fn scan_number(&mut self, start: usize) -> Token {
        let mut seen_dot = false;
        while self.index < self.input.len() {
            let c = self.peek();
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !seen_dot && self.peek_at(1).is_ascii_digit() {
                seen_dot = true;
                self.advance();
            } else if (c == 'e' || c == 'E')
                && (self.peek_at(1).is_ascii_digit()
                    || ((self.peek_at(1) == '+' || self.peek_at(1) == '-')
                        && self.peek_at(2).is_ascii_digit()))
            {
                self.advance();
                if self.peek() == '+' || self.peek() == '-' {
                    self.advance();
                }
            } else {
                break;
            }
        }
        let text: String = self.input[start..self.index].iter().collect();
        match text.parse::<f64>() {
            Ok(n) => Token::new(start, self.index, TokenType::Number, n, text),
            Err(_) => self.error(start, &format!("invalid number '{text}'")),
        }
    }

    fn scan_string(&mut self, start: usize) -> Token {
        let quote = self.peek();
        self.advance();
        let mut buffer = String::new();
        loop {
            if self.index >= self.input.len() {
                return self.error(start, "unterminated string literal");
            }
            let c = self.peek();
            if c == quote {
                self.advance();
                break;
            }
            if c == '\\' {
                self.advance();
                let escaped = self.peek();
                if self.index >= self.input.len() {
                    return self.error(start, "unterminated string literal");
                }
                match escaped {
                    'n' => buffer.push('\n'),
                    't' => buffer.push('\t'),
                    'r' => buffer.push('\r'),
                    'u' => {
                        let mut code = 0u32;
                        for i in 1..=4 {
                            match self.peek_at(i).to_digit(16) {
                                Some(d) => code = code * 16 + d,
                                None => return self.error(start, "invalid unicode escape"),
                            }
                        }
                        for _ in 0..4 {
                            self.advance();
                        }
                        buffer.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                    }
                    other => buffer.push(other),
                }
                self.advance();
            } else {
                buffer.push(c);
                self.advance();
            }
        }
        Token::new(start, self.index, TokenType::String, 0.0, buffer)
    }
}
