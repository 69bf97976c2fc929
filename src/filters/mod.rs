mod standard;

use crate::Result;
use crate::options::RenderOptions;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A filter receives the piped value, its evaluated positional and named
/// arguments, and the render options in effect.
pub type FilterFunc = Arc<
    dyn Fn(&Value, &[Value], &HashMap<String, Value>, &RenderOptions) -> Result<Value>
        + Send
        + Sync,
>;

/// Filters available to a template, keyed by the name used after `|`.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFunc>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.filters.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

impl FilterRegistry {
    /// The standard filter library.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        standard::register_all(&mut registry);
        registry
    }

    /// Registers `filter` under `name`, replacing any filter already there.
    pub fn register<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value], &HashMap<String, Value>, &RenderOptions) -> Result<Value>
            + Send
            + Sync
            + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn insert(&mut self, name: impl Into<String>, filter: FilterFunc) {
        self.filters.insert(name.into(), filter);
    }

    pub fn get(&self, name: &str) -> Option<&FilterFunc> {
        self.filters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_overrides_standard() {
        let mut registry = FilterRegistry::standard();
        assert!(registry.contains("upcase"));
        registry.register("upcase", |value, _, _, _| Ok(Value::String(format!("<{value}>"))));

        let filter = registry.get("upcase").unwrap();
        let result = filter(
            &Value::String("a".into()),
            &[],
            &HashMap::new(),
            &RenderOptions::default(),
        )
        .unwrap();
        assert_eq!(result, Value::String("<a>".into()));
    }

    #[test]
    fn test_missing_filter() {
        assert!(FilterRegistry::default().get("upcase").is_none());
    }
}
