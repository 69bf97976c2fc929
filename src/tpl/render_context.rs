use crate::Result;
use crate::error::RuntimeError;
use crate::file_system::FileSystem;
use crate::filters::FilterFunc;
use crate::options::RenderOptions;
use crate::tpl::engine::TemplateConfig;
use crate::tpl::node::ParseContext;
use crate::value::Value;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::Any;
use std::collections::HashMap;

/// A layer of variables. Writes skip immutable layers.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    values: HashMap<String, Value>,
    mutable: bool,
}

impl Scope {
    pub fn mutable(values: HashMap<String, Value>) -> Self {
        Self {
            values,
            mutable: true,
        }
    }

    pub fn immutable(values: HashMap<String, Value>) -> Self {
        Self {
            values,
            mutable: false,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

/// Pending control-flow signal raised by `break` / `continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Break,
    Continue,
}

/// Per-render evaluation state.
pub struct Context<'a> {
    config: &'a TemplateConfig,
    scopes: Vec<Scope>,
    environment: &'a DashMap<String, Value>,
    registers: HashMap<String, Box<dyn Any>>,
    interrupts: Vec<Interrupt>,
    include_depth: usize,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        values: HashMap<String, Value>,
        environment: &'a DashMap<String, Value>,
        config: &'a TemplateConfig,
    ) -> Self {
        Self {
            config,
            scopes: vec![Scope::mutable(values)],
            environment,
            registers: HashMap::new(),
            interrupts: Vec::new(),
            include_depth: 0,
        }
    }

    /// Pushes `scope` until the returned guard is dropped.
    pub fn scope(&mut self, scope: Scope) -> ScopeGuard<'_, 'a> {
        self.scopes.push(scope);
        ScopeGuard { ctx: self }
    }

    /// Innermost binding of `name`, or `Nil`.
    pub fn read(&self, name: &str) -> Value {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.values.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Binds `name` in the nearest mutable scope.
    pub fn write(&mut self, name: impl Into<String>, value: Value) {
        // The base scope is mutable and never popped.
        if let Some(scope) = self.scopes.iter_mut().rev().find(|s| s.mutable) {
            scope.values.insert(name.into(), value);
        }
    }

    pub fn environment(&self, key: &str) -> Option<Value> {
        self.environment.get(key).map(|value| value.value().clone())
    }

    pub fn set_environment(&self, key: impl Into<String>, value: Value) {
        self.environment.insert(key.into(), value);
    }

    /// Replaces `key` with `update(current)` under the entry lock.
    pub fn update_environment<F>(&self, key: impl Into<String>, update: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        match self.environment.entry(key.into()) {
            Entry::Occupied(mut entry) => {
                let next = update(Some(entry.get()));
                entry.insert(next.clone());
                next
            }
            Entry::Vacant(entry) => {
                let next = update(None);
                entry.insert(next.clone());
                next
            }
        }
    }

    pub fn register<T: Any>(&self, key: &str) -> Option<&T> {
        self.registers.get(key)?.downcast_ref::<T>()
    }

    pub fn set_register<T: Any>(&mut self, key: impl Into<String>, value: T) {
        self.registers.insert(key.into(), Box::new(value));
    }

    /// Removes and returns a register. A payload of another type is left in place.
    pub fn take_register<T: Any>(&mut self, key: &str) -> Option<T> {
        let boxed = self.registers.remove(key)?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.registers.insert(key.to_string(), other);
                None
            }
        }
    }

    pub fn push_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupts.push(interrupt);
    }

    pub fn pop_interrupt(&mut self) -> Option<Interrupt> {
        self.interrupts.pop()
    }

    pub fn has_interrupt(&self) -> bool {
        !self.interrupts.is_empty()
    }

    pub(crate) fn clear_interrupts(&mut self) {
        self.interrupts.clear();
    }

    pub fn filter(&self, name: &str) -> Option<&'a FilterFunc> {
        self.config.filters.get(name)
    }

    pub fn options(&self) -> &'a RenderOptions {
        &self.config.options
    }

    pub fn file_system(&self) -> &'a dyn FileSystem {
        self.config.file_system.as_ref()
    }

    pub fn parse_context(&self) -> ParseContext<'a> {
        ParseContext::new(&self.config.tags)
    }

    pub(crate) fn enter_include(&mut self, path: &str) -> Result<()> {
        if self.include_depth >= self.config.options.max_include_depth {
            return Err(RuntimeError::IncludeDepthExceeded(path.to_string()).into());
        }
        self.include_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_include(&mut self) {
        self.include_depth = self.include_depth.saturating_sub(1);
    }
}

/// Keeps a scope pushed for as long as it lives.
pub struct ScopeGuard<'c, 'a> {
    ctx: &'c mut Context<'a>,
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.ctx.scopes.pop();
    }
}

impl<'a> std::ops::Deref for ScopeGuard<'_, 'a> {
    type Target = Context<'a>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl std::ops::DerefMut for ScopeGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}
