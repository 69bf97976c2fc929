use crate::Result;
use crate::error::Error;
use crate::file_system::{BlankFileSystem, FileSystem};
use crate::filters::FilterRegistry;
use crate::options::{DecimalEncoding, KeyEncoding, RenderOptions};
use crate::tpl::node::{BlockBody, Node, ParseContext, TagRegistry, parse_document};
use crate::tpl::render_context::Context;
use crate::value::{ToValue, Value, to_value};
use dashmap::DashMap;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Everything a template consults besides its own source: tags, filters,
/// render options and where partials come from.
#[derive(Clone)]
pub struct TemplateConfig {
    pub tags: TagRegistry,
    pub filters: FilterRegistry,
    pub options: RenderOptions,
    pub file_system: Arc<dyn FileSystem>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            tags: TagRegistry::standard(),
            filters: FilterRegistry::standard(),
            options: RenderOptions::default(),
            file_system: Arc::new(BlankFileSystem),
        }
    }
}

impl fmt::Debug for TemplateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateConfig")
            .field("tags", &self.tags)
            .field("filters", &self.filters)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A parsed template, ready to be rendered any number of times.
///
/// Counters written by `increment` / `decrement` live in the template's
/// environment and carry over from one render to the next.
#[derive(Debug)]
pub struct Template {
    root: BlockBody,
    config: TemplateConfig,
    environment: DashMap<String, Value>,
    source_len: usize,
}

impl Template {
    /// Parses `source` with the standard tags and filters.
    pub fn parse(source: &str) -> Result<Self> {
        Self::builder(source).build()
    }

    pub fn builder(source: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder::new(source)
    }

    pub fn nodes(&self) -> &[Node] {
        self.root.nodes()
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Renders with `values` as the outermost scope.
    ///
    /// Counters update the shared environment in place, so they survive a failed
    /// render and are never lost between concurrent renders.
    pub fn render(&self, values: HashMap<String, Value>) -> Result<String> {
        let started = Instant::now();
        let mut ctx = Context::new(values, &self.environment, &self.config);
        let mut out = String::with_capacity(self.source_len);
        let result = self.root.render(&mut ctx, &mut out);
        ctx.clear_interrupts();

        match result {
            Ok(()) => {
                debug!(
                    "rendered template in {:?} ({} bytes)",
                    started.elapsed(),
                    out.len()
                );
                Ok(out)
            }
            Err(e) => {
                warn!("template render failed after {:?}: {}", started.elapsed(), e);
                Err(e)
            }
        }
    }

    /// Renders with any value that converts to a dictionary, such as a
    /// struct deriving `ToValue`.
    pub fn render_value<T: ToValue + ?Sized>(&self, data: &T) -> Result<String> {
        self.render(into_scope(data.to_value())?)
    }

    /// Renders with any serde-serializable map or struct.
    pub fn render_serialize<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        self.render(into_scope(to_value(data)?)?)
    }

    pub fn environment(&self, key: &str) -> Option<Value> {
        self.environment.get(key).map(|value| value.value().clone())
    }

    pub fn set_environment(&self, key: impl Into<String>, value: Value) {
        self.environment.insert(key.into(), value);
    }

    pub fn clear_environment(&self) {
        self.environment.clear();
    }
}

fn into_scope(value: Value) -> Result<HashMap<String, Value>> {
    match value {
        Value::Dictionary(values) => Ok(values),
        Value::Nil => Ok(HashMap::new()),
        other => Err(Error::Conversion(format!(
            "render data must be a dictionary, got {other:?}"
        ))),
    }
}

/// Configures and parses a [`Template`].
///
/// ```ignore
/// let template = Template::builder("{{ name | shout }}")
///     .filter("shout", |v, _, _, _| Ok(Value::String(format!("{v}!"))))
///     .build()?;
/// ```
pub struct TemplateBuilder {
    source: String,
    config: TemplateConfig,
}

impl TemplateBuilder {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            config: TemplateConfig::default(),
        }
    }

    pub fn file_system(mut self, file_system: impl FileSystem + 'static) -> Self {
        self.config.file_system = Arc::new(file_system);
        self
    }

    /// Shares one file system between several templates.
    pub fn shared_file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.config.file_system = file_system;
        self
    }

    pub fn filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&Value, &[Value], &HashMap<String, Value>, &RenderOptions) -> Result<Value>
            + Send
            + Sync
            + 'static,
    {
        self.config.filters.register(name, filter);
        self
    }

    pub fn tag<F>(mut self, name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&str, Option<&str>, &ParseContext<'_>) -> Result<Node> + Send + Sync + 'static,
    {
        self.config.tags.register(name, builder);
        self
    }

    pub fn options(mut self, options: RenderOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn decimal_encoding(mut self, encoding: DecimalEncoding) -> Self {
        self.config.options.decimal_encoding = encoding;
        self
    }

    pub fn key_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.config.options.key_encoding = encoding;
        self
    }

    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.config.options.max_include_depth = depth;
        self
    }

    pub fn build(self) -> Result<Template> {
        let started = Instant::now();
        let root = parse_document(&self.source, &ParseContext::new(&self.config.tags))?;
        debug!(
            "parsed template ({} bytes, {} top-level nodes) in {:?}",
            self.source.len(),
            root.nodes().len(),
            started.elapsed()
        );
        Ok(Template {
            root,
            config: self.config,
            environment: DashMap::new(),
            source_len: self.source.len(),
        })
    }
}
