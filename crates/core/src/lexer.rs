use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords, distinguished in the parser
    Word(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    /// Integer literal (decimal or `0x` hexadecimal)
    Int(i64),
    /// Decimal literal, kept as written
    Float(String),
    // Punctuation
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    // Comparison operators
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // Logical operators
    And,
    Or,
    Not,
    // Assignment and function body arrow
    Assign,
    Arrow,
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

pub fn lex(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line: u32 = 1;
    let mut line_start = 0usize;

    while pos < chars.len() {
        let c = chars[pos];
        let next = chars.get(pos + 1).copied();

        // Line comment
        if c == '/' && next == Some('/') {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && next == Some('*') {
            let (start_line, start_col) = (line, (pos - line_start) as u32 + 1);
            pos += 2;
            loop {
                if pos >= chars.len() {
                    return Err(ParseError::syntax(
                        start_line,
                        start_col,
                        "Unterminated block comment",
                    ));
                }
                if chars[pos] == '\n' {
                    line += 1;
                    line_start = pos + 1;
                }
                if chars[pos] == '*' && chars.get(pos + 1) == Some(&'/') {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        // Whitespace
        if c.is_whitespace() {
            if c == '\n' {
                line += 1;
                line_start = pos + 1;
            }
            pos += 1;
            continue;
        }

        let tok_line = line;
        let tok_col = (pos - line_start) as u32 + 1;
        let spanned = |token: Token| Spanned {
            token,
            line: tok_line,
            column: tok_col,
        };

        // String literal
        if c == '"' {
            pos += 1;
            let mut s = String::new();
            loop {
                let Some(&sc) = chars.get(pos) else {
                    return Err(ParseError::syntax(
                        tok_line,
                        tok_col,
                        "Unterminated string literal",
                    ));
                };
                if sc == '"' {
                    pos += 1;
                    break;
                }
                if sc == '\n' {
                    return Err(ParseError::syntax(
                        tok_line,
                        tok_col,
                        "Unterminated string literal",
                    ));
                }
                if sc == '\\' {
                    pos += 1;
                    match chars.get(pos) {
                        Some('"') => s.push('"'),
                        Some('\\') => s.push('\\'),
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some(other) => {
                            s.push('\\');
                            s.push(*other);
                        }
                        None => {
                            return Err(ParseError::syntax(
                                tok_line,
                                tok_col,
                                "Unterminated string literal",
                            ))
                        }
                    }
                    pos += 1;
                    continue;
                }
                s.push(sc);
                pos += 1;
            }
            tokens.push(spanned(Token::Str(s)));
            continue;
        }

        // Hexadecimal integer
        if c == '0' && matches!(next, Some('x') | Some('X')) {
            let start = pos + 2;
            pos = start;
            while pos < chars.len() && chars[pos].is_ascii_hexdigit() {
                pos += 1;
            }
            let s: String = chars[start..pos].iter().collect();
            let n = i64::from_str_radix(&s, 16).map_err(|_| {
                ParseError::syntax(tok_line, tok_col, format!("Invalid hex literal '0x{}'", s))
            })?;
            tokens.push(spanned(Token::Int(n)));
            continue;
        }

        // Number
        if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
                pos += 1; // consume '.'
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
                let s: String = chars[start..pos].iter().collect();
                tokens.push(spanned(Token::Float(s)));
            } else {
                let s: String = chars[start..pos].iter().collect();
                let n: i64 = s.parse().map_err(|_| {
                    ParseError::syntax(tok_line, tok_col, format!("Invalid integer '{}'", s))
                })?;
                tokens.push(spanned(Token::Int(n)));
            }
            continue;
        }

        // Identifier / keyword
        if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let s: String = chars[start..pos].iter().collect();
            tokens.push(spanned(Token::Word(s)));
            continue;
        }

        // Operators
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('=', Some('>')) => (Token::Arrow, 2),
            ('=', _) => (Token::Assign, 1),
            ('!', Some('=')) => (Token::Neq, 2),
            ('!', _) => (Token::Not, 1),
            ('<', Some('=')) => (Token::Lte, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', Some('=')) => (Token::Gte, 2),
            ('>', _) => (Token::Gt, 1),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (':', _) => (Token::Colon, 1),
            (',', _) => (Token::Comma, 1),
            _ => {
                return Err(ParseError::syntax(
                    tok_line,
                    tok_col,
                    format!("Unexpected character '{}'", c),
                ))
            }
        };
        tokens.push(spanned(token));
        pos += width;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
        column: (pos - line_start) as u32 + 1,
    });
    Ok(tokens)
}
