use crate::Result;
use crate::error::SyntaxError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Pipe,
    Dot,
    DotDot,
    Colon,
    Comma,
    OpenSquare,
    CloseSquare,
    OpenRound,
    CloseRound,
    Question,
    Dash,
    Equal,
    Comparison,
    String,
    Integer,
    Decimal,
    Id,
    EndOfString,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Pipe => "'|'",
            TokenKind::Dot => "'.'",
            TokenKind::DotDot => "'..'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::OpenSquare => "'['",
            TokenKind::CloseSquare => "']'",
            TokenKind::OpenRound => "'('",
            TokenKind::CloseRound => "')'",
            TokenKind::Question => "'?'",
            TokenKind::Dash => "'-'",
            TokenKind::Equal => "'='",
            TokenKind::Comparison => "comparison",
            TokenKind::String => "string",
            TokenKind::Integer => "integer",
            TokenKind::Decimal => "decimal",
            TokenKind::Id => "identifier",
            TokenKind::EndOfString => "end of markup",
        };
        f.write_str(name)
    }
}

/// A lexeme of tag or variable markup. String tokens carry their content without quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Tokenizes markup. The result always ends with a single `EndOfString` token.
pub fn tokenize(markup: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        src: markup,
        pos: 0,
    };
    let mut tokens = Vec::new();
    loop {
        lexer.skip_whitespace();
        if lexer.pos >= lexer.src.len() {
            tokens.push(Token::new(TokenKind::EndOfString, ""));
            return Ok(tokens);
        }
        tokens.push(lexer.next_token()?);
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn remaining(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn skip_whitespace(&mut self) {
        let remaining = self.remaining();
        self.pos += remaining.len() - remaining.trim_start().len();
    }

    fn take(&mut self, kind: TokenKind, len: usize) -> Token {
        let value = &self.src[self.pos..self.pos + len];
        self.pos += len;
        Token::new(kind, value)
    }

    fn next_token(&mut self) -> Result<Token> {
        if let Some(len) = self.scan_comparison() {
            return Ok(self.take(TokenKind::Comparison, len));
        }

        let remaining = self.remaining();
        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::EndOfString, ""));
        };

        if c == '\'' || c == '"' {
            let Some(end) = remaining[1..].find(c) else {
                return Err(SyntaxError::UnexpectedCharacter(c).into());
            };
            let value = &remaining[1..1 + end];
            self.pos += end + 2;
            return Ok(Token::new(TokenKind::String, value));
        }

        if let Some((kind, len)) = self.scan_number() {
            return Ok(self.take(kind, len));
        }

        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.take(TokenKind::Id, self.scan_identifier()));
        }

        if remaining.starts_with("..") {
            return Ok(self.take(TokenKind::DotDot, 2));
        }

        let kind = match c {
            '|' => TokenKind::Pipe,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '[' => TokenKind::OpenSquare,
            ']' => TokenKind::CloseSquare,
            '(' => TokenKind::OpenRound,
            ')' => TokenKind::CloseRound,
            '?' => TokenKind::Question,
            '-' => TokenKind::Dash,
            '=' => TokenKind::Equal,
            other => return Err(SyntaxError::UnexpectedCharacter(other).into()),
        };
        Ok(self.take(kind, c.len_utf8()))
    }

    fn scan_comparison(&self) -> Option<usize> {
        let remaining = self.remaining();
        for op in ["==", "!=", "<>", "<=", ">=", "<", ">"] {
            if remaining.starts_with(op) {
                return Some(op.len());
            }
        }
        // `contains` is only an operator when a separator follows it.
        let rest = remaining.strip_prefix("contains")?;
        rest.starts_with(char::is_whitespace).then_some("contains".len())
    }

    /// Scans `-?\d+(\.\d+)?`; the fractional part is dropped when it would start a range.
    fn scan_number(&self) -> Option<(TokenKind, usize)> {
        let bytes = self.remaining().as_bytes();
        let mut i = usize::from(bytes.first() == Some(&b'-'));
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            return None;
        }

        if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if bytes.get(j) != Some(&b'.') {
                return Some((TokenKind::Decimal, j));
            }
        }
        Some((TokenKind::Integer, i))
    }

    fn scan_identifier(&self) -> usize {
        let remaining = self.remaining();
        let mut len = remaining
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '-'))
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        if remaining[len..].starts_with('?') {
            len += 1;
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(markup: &str) -> Vec<TokenKind> {
        tokenize(markup).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn values(markup: &str) -> Vec<String> {
        tokenize(markup)
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn test_empty_markup() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfString]);
        assert_eq!(kinds("   "), vec![TokenKind::EndOfString]);
    }

    #[test]
    fn test_variable_with_filters() {
        use TokenKind::*;
        assert_eq!(
            kinds("product.title | truncate: 20, '...'"),
            vec![Id, Dot, Id, Pipe, Id, Colon, Integer, Comma, String, EndOfString]
        );
        assert_eq!(
            values("product.title | truncate: 20, '...'"),
            vec!["product", ".", "title", "|", "truncate", ":", "20", ",", "...", ""]
        );
    }

    #[test]
    fn test_numbers_and_ranges() {
        use TokenKind::*;
        assert_eq!(kinds("(1..5)"), vec![OpenRound, Integer, DotDot, Integer, CloseRound, EndOfString]);
        assert_eq!(kinds("2.5"), vec![Decimal, EndOfString]);
        assert_eq!(kinds("-3"), vec![Integer, EndOfString]);
        assert_eq!(values("-3.75"), vec!["-3.75", ""]);
        assert_eq!(kinds("1.5..3"), vec![Integer, Dot, Integer, DotDot, Integer, EndOfString]);
        assert_eq!(kinds("a[0]"), vec![Id, OpenSquare, Integer, CloseSquare, EndOfString]);
    }

    #[test]
    fn test_comparisons() {
        use TokenKind::*;
        assert_eq!(kinds("a <= b"), vec![Id, Comparison, Id, EndOfString]);
        assert_eq!(kinds("a <> b"), vec![Id, Comparison, Id, EndOfString]);
        assert_eq!(kinds("a contains 'x'"), vec![Id, Comparison, String, EndOfString]);
        assert_eq!(values("containsx"), vec!["containsx", ""]);
        assert_eq!(kinds("x = 1"), vec![Id, Equal, Integer, EndOfString]);
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(values("empty? my-var _x"), vec!["empty?", "my-var", "_x", ""]);
    }

    #[test]
    fn test_strings_keep_operators() {
        assert_eq!(values("'and' \"or\""), vec!["and", "or", ""]);
    }

    #[test]
    fn test_unexpected_character() {
        match tokenize("a ! b") {
            Err(crate::error::Error::Syntax(SyntaxError::UnexpectedCharacter('!'))) => {}
            other => panic!("Expected unexpected character, got {other:?}"),
        }
        assert!(tokenize("'unterminated").is_err());
    }
}
