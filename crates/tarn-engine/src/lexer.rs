//! Hand-written lexer. Produces a flat token stream with line numbers
//! for error reporting.

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    Number(f64),
    Str(String),

    // keywords
    And,
    Break,
    Do,
    Else,
    Elseif,
    End,
    False,
    For,
    Function,
    If,
    Local,
    Nil,
    Not,
    Or,
    Return,
    Then,
    True,
    While,

    // symbols
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Hash,
    EqEq,
    NotEq,
    LessEq,
    GreaterEq,
    Less,
    Greater,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Concat,
    Semi,

    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Name(n) => format!("name '{}'", n),
            Token::Number(n) => format!("number '{}'", n),
            Token::Str(_) => "string literal".to_string(),
            Token::Eof => "end of input".to_string(),
            other => format!("'{}'", other.text()),
        }
    }

    fn text(&self) -> &'static str {
        match self {
            Token::And => "and",
            Token::Break => "break",
            Token::Do => "do",
            Token::Else => "else",
            Token::Elseif => "elseif",
            Token::End => "end",
            Token::False => "false",
            Token::For => "for",
            Token::Function => "function",
            Token::If => "if",
            Token::Local => "local",
            Token::Nil => "nil",
            Token::Not => "not",
            Token::Or => "or",
            Token::Return => "return",
            Token::Then => "then",
            Token::True => "true",
            Token::While => "while",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Hash => "#",
            Token::EqEq => "==",
            Token::NotEq => "~=",
            Token::LessEq => "<=",
            Token::GreaterEq => ">=",
            Token::Less => "<",
            Token::Greater => ">",
            Token::Assign => "=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Concat => "..",
            Token::Semi => ";",
            _ => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: u32,
}

pub fn tokenize(source: &str) -> EngineResult<Vec<SpannedToken>> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn run(mut self) -> EngineResult<Vec<SpannedToken>> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            match self.next_token()? {
                Some(token) => out.push(SpannedToken { token, line }),
                None => {
                    out.push(SpannedToken {
                        token: Token::Eof,
                        line,
                    });
                    return Ok(out);
                }
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> EngineResult<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'-') if self.peek2() == Some(b'-') => {
                    self.bump();
                    self.bump();
                    if self.peek() == Some(b'[') && self.peek2() == Some(b'[') {
                        self.skip_long_comment()?;
                    } else {
                        while let Some(c) = self.peek() {
                            if c == b'\n' {
                                break;
                            }
                            self.bump();
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_long_comment(&mut self) -> EngineResult<()> {
        let start = self.line;
        self.bump();
        self.bump();
        loop {
            match self.peek() {
                Some(b']') if self.peek2() == Some(b']') => {
                    self.bump();
                    self.bump();
                    return Ok(());
                }
                Some(_) => {
                    self.bump();
                }
                None => return Err(EngineError::parse(start, "unterminated comment")),
            }
        }
    }

    fn next_token(&mut self) -> EngineResult<Option<Token>> {
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };
        let token = match c {
            b'0'..=b'9' => self.number()?,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.name_or_keyword(),
            b'"' | b'\'' => self.string(c)?,
            b'+' => self.single(Token::Plus),
            b'-' => self.single(Token::Minus),
            b'*' => self.single(Token::Star),
            b'/' => self.single(Token::Slash),
            b'%' => self.single(Token::Percent),
            b'#' => self.single(Token::Hash),
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b'{' => self.single(Token::LBrace),
            b'}' => self.single(Token::RBrace),
            b'[' => self.single(Token::LBracket),
            b']' => self.single(Token::RBracket),
            b',' => self.single(Token::Comma),
            b';' => self.single(Token::Semi),
            b'=' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            b'~' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::NotEq
                } else {
                    return Err(EngineError::parse(self.line, "unexpected character '~'"));
                }
            }
            b'<' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::LessEq
                } else {
                    Token::Less
                }
            }
            b'>' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::GreaterEq
                } else {
                    Token::Greater
                }
            }
            b'.' => {
                self.bump();
                if self.peek() == Some(b'.') {
                    self.bump();
                    Token::Concat
                } else {
                    Token::Dot
                }
            }
            other => {
                return Err(EngineError::parse(
                    self.line,
                    format!("unexpected character '{}'", other as char),
                ))
            }
        };
        Ok(Some(token))
    }

    fn single(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn number(&mut self) -> EngineResult<Token> {
        let start = self.pos;
        let line = self.line;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        if self.peek() == Some(b'.') && matches!(self.peek2(), Some(b'0'..=b'9')) {
            self.bump();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.bump();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.bump();
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(EngineError::parse(line, "malformed number"));
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| EngineError::parse(line, "malformed number"))?;
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| EngineError::parse(line, "malformed number"))
    }

    fn name_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
        match text {
            "and" => Token::And,
            "break" => Token::Break,
            "do" => Token::Do,
            "else" => Token::Else,
            "elseif" => Token::Elseif,
            "end" => Token::End,
            "false" => Token::False,
            "for" => Token::For,
            "function" => Token::Function,
            "if" => Token::If,
            "local" => Token::Local,
            "nil" => Token::Nil,
            "not" => Token::Not,
            "or" => Token::Or,
            "return" => Token::Return,
            "then" => Token::Then,
            "true" => Token::True,
            "while" => Token::While,
            _ => Token::Name(text.to_string()),
        }
    }

    fn string(&mut self, quote: u8) -> EngineResult<Token> {
        let line = self.line;
        self.bump();
        // collect raw bytes; multi-byte UTF-8 sequences pass through intact
        let mut out: Vec<u8> = Vec::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    return String::from_utf8(out)
                        .map(Token::Str)
                        .map_err(|_| EngineError::parse(line, "invalid UTF-8 in string"))
                }
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(b'"') => out.push(b'"'),
                    Some(b'\'') => out.push(b'\''),
                    Some(b'0') => out.push(b'\0'),
                    Some(other) => {
                        return Err(EngineError::parse(
                            self.line,
                            format!("invalid escape '\\{}'", other as char),
                        ))
                    }
                    None => return Err(EngineError::parse(line, "unterminated string")),
                },
                Some(b'\n') | None => return Err(EngineError::parse(line, "unterminated string")),
                Some(c) => out.push(c),
            }
        }
    }
}
