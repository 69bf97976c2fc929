use thiserror::Error;

/// Problems found while compiling template source into a node tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("Unknown tag: {0}")]
    UnknownTag(String),
    #[error("Tag was never closed: {0}")]
    UnclosedTag(String),
    #[error("Tag requires markup: {0}")]
    MissingMarkup(String),
    #[error("Unexpected character: {0}")]
    UnexpectedCharacter(char),
    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),
    #[error("Invalid syntax: {0}")]
    Invalid(String),
}

/// Problems raised while evaluating a compiled template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),
    #[error("Filter '{filter}' expects {expected} argument(s), received {received}")]
    InvalidArgCount {
        filter: String,
        expected: usize,
        received: usize,
    },
    #[error("Wrong type: {0}")]
    WrongType(String),
    #[error("File System Error: {0}")]
    FileSystem(String),
    #[error("Include depth exceeded while rendering '{0}'")]
    IncludeDepthExceeded(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Syntax Error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("Runtime Error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Value Conversion Error: {0}")]
    Conversion(String),
}

impl Error {
    pub(crate) fn unexpected_token(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::Syntax(SyntaxError::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
        })
    }
}

impl serde::ser::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::Conversion(msg.to_string())
    }
}
