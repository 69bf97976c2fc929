pub mod ast;
pub(crate) mod engine;
pub mod lexer;
pub mod node;
pub mod parser;
mod render;
pub mod render_context;
pub mod tags;
pub mod tokenizer;

pub use engine::{Template, TemplateBuilder, TemplateConfig};
pub use render::compare;
