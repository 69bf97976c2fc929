pub mod error;
pub mod file_system;
pub mod filters;
pub mod options;
pub mod tpl;
pub mod value;

pub use error::{Error, RuntimeError, SyntaxError};
pub use file_system::{BlankFileSystem, FileSystem, LocalFileSystem, MemoryFileSystem};
pub use filters::{FilterFunc, FilterRegistry};
pub use options::{DecimalEncoding, KeyEncoding, RenderOptions};
pub use tpl::node::{BlockBody, Node, ParseContext, Tag, TagBuilder, TagRegistry};
pub use tpl::render_context::{Context, Interrupt, Scope};
pub use tpl::tokenizer::Tokenizer;
pub use tpl::{Template, TemplateBuilder, TemplateConfig};
pub use value::{DropObject, ToValue, Value, to_value};

pub use uliquid_macros::ToValue;

pub type Result<T> = std::result::Result<T, Error>;
