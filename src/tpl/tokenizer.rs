/// A tag's markup split into its name and the remaining arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTag<'s> {
    pub name: &'s str,
    pub markup: Option<&'s str>,
}

impl<'s> RawTag<'s> {
    fn parse(markup: &'s str) -> Self {
        match markup.split_once(char::is_whitespace) {
            Some((name, rest)) => {
                let rest = rest.trim();
                RawTag {
                    name,
                    markup: (!rest.is_empty()).then_some(rest),
                }
            }
            None => RawTag {
                name: markup,
                markup: None,
            },
        }
    }
}

/// One structural piece of template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'s> {
    Text(&'s str),
    /// Trimmed markup between `{{` and `}}`.
    Variable(&'s str),
    Tag(RawTag<'s>),
}

/// Splits template source into text, variable and tag tokens.
///
/// Malformed markers (no closing delimiter, or nothing inside) are passed
/// through as text.
pub struct Tokenizer<'s> {
    template: &'s str,
    pos: usize,
}

impl<'s> Tokenizer<'s> {
    pub fn new(template: &'s str) -> Self {
        Self { template, pos: 0 }
    }

    fn remaining(&self) -> &'s str {
        &self.template[self.pos..]
    }

    /// Reads `{{ .. }}` or `{% .. %}` at the current position.
    fn read_markup(&mut self) -> Option<Token<'s>> {
        let remaining = self.remaining();
        let close = if remaining.starts_with("{{") {
            "}}"
        } else if remaining.starts_with("{%") {
            "%}"
        } else {
            return None;
        };

        let end = remaining[2..].find(close)?;
        let inner = remaining[2..2 + end].trim();
        if inner.is_empty() {
            return None;
        }

        self.pos += 2 + end + close.len();
        Some(if close == "}}" {
            Token::Variable(inner)
        } else {
            Token::Tag(RawTag::parse(inner))
        })
    }

    /// Reads literal text up to the next marker, consuming at least one marker's width
    /// when the marker itself could not be read.
    fn read_text(&mut self) -> Token<'s> {
        let remaining = self.remaining();
        let skip = if remaining.starts_with("{{") || remaining.starts_with("{%") {
            2
        } else {
            0
        };
        let next_marker = next_marker(&remaining[skip..])
            .map(|i| i + skip)
            .unwrap_or(remaining.len());

        self.pos += next_marker;
        Token::Text(&remaining[..next_marker])
    }
}

fn next_marker(s: &str) -> Option<usize> {
    match (s.find("{{"), s.find("{%")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl<'s> Iterator for Tokenizer<'s> {
    type Item = Token<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.template.len() {
            return None;
        }
        self.read_markup().or_else(|| Some(self.read_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(s: &str) -> Vec<Token<'_>> {
        Tokenizer::new(s).collect()
    }

    #[test]
    fn test_text_only() {
        assert_eq!(tokenize("hello world"), vec![Token::Text("hello world")]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_variable_and_tag() {
        let tokens = tokenize("Hi {{ name | upcase }}!{% if  a  ==  b %}x{%endif%}");
        assert_eq!(
            tokens,
            vec![
                Token::Text("Hi "),
                Token::Variable("name | upcase"),
                Token::Text("!"),
                Token::Tag(RawTag {
                    name: "if",
                    markup: Some("a  ==  b"),
                }),
                Token::Text("x"),
                Token::Tag(RawTag {
                    name: "endif",
                    markup: None,
                }),
            ]
        );
    }

    #[test]
    fn test_unterminated_markup_is_text() {
        assert_eq!(
            tokenize("a {{ unclosed"),
            vec![Token::Text("a "), Token::Text("{{ unclosed")]
        );
        assert_eq!(
            tokenize("{% if x"),
            vec![Token::Text("{% if x")]
        );
    }

    #[test]
    fn test_empty_markup_is_text() {
        assert_eq!(
            tokenize("{{}}{{ a }}"),
            vec![Token::Text("{{}}"), Token::Variable("a")]
        );
        assert_eq!(tokenize("{%  %}"), vec![Token::Text("{%  %}")]);
    }

    #[test]
    fn test_unicode_text() {
        assert_eq!(
            tokenize("héllo {{ x }} wörld"),
            vec![
                Token::Text("héllo "),
                Token::Variable("x"),
                Token::Text(" wörld"),
            ]
        );
    }
}
