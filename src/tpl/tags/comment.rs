use crate::Result;
use crate::error::SyntaxError;
use crate::tpl::tokenizer::{Token, Tokenizer};

/// Discards everything up to the matching `endcomment`, unparsed.
#[derive(Debug)]
pub struct Comment {
    name: String,
}

impl Comment {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn parse(&mut self, tokens: &mut Tokenizer<'_>) -> Result<()> {
        let end_tag = format!("end{}", self.name);
        let mut depth = 1usize;
        for token in tokens.by_ref() {
            if let Token::Tag(raw) = token {
                if raw.name == self.name {
                    depth += 1;
                } else if raw.name == end_tag {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
            }
        }
        Err(SyntaxError::UnclosedTag(self.name.clone()).into())
    }
}
