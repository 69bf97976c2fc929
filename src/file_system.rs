use crate::Result;
use crate::error::RuntimeError;
use dashmap::DashMap;
use glob::glob;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of partials for `include`.
pub trait FileSystem: Send + Sync {
    fn read(&self, path: &str) -> Result<String>;
}

/// Refuses every read. Templates use it unless another file system is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankFileSystem;

impl FileSystem for BlankFileSystem {
    fn read(&self, _path: &str) -> Result<String> {
        Err(RuntimeError::FileSystem("This liquid context does not allow includes.".to_string()).into())
    }
}

/// Reads partials from disk below `root`.
///
/// `products/item` resolves to `<root>/products/_item.liquid`.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a template path to its file, rejecting anything that could leave `root`.
    pub fn template_path(&self, path: &str) -> Result<PathBuf> {
        let mut components: Vec<&str> = path.split('/').collect();
        let invalid = path.starts_with('/')
            || components
                .iter()
                .any(|c| c.is_empty() || *c == "." || *c == ".." || c.contains('\\'));
        if invalid {
            return Err(RuntimeError::FileSystem(format!("Illegal template path '{path}'")).into());
        }

        let file_name = components.pop().map(|name| format!("_{name}.liquid"));
        let mut full = self.root.clone();
        full.extend(components);
        full.extend(file_name);
        Ok(full)
    }
}

impl FileSystem for LocalFileSystem {
    fn read(&self, path: &str) -> Result<String> {
        let full = self.template_path(path)?;
        debug!("reading template '{}' from {}", path, full.display());
        fs::read_to_string(&full).map_err(|e| {
            RuntimeError::FileSystem(format!("Failed to read '{}': {}", full.display(), e)).into()
        })
    }
}

/// Partials held in memory, keyed by the name used in `include`.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    templates: DashMap<String, String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    pub fn with(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.templates.remove(name).map(|(_, source)| source)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Loads every file matching the glob `pattern`.
    ///
    /// A file is registered under its stem without the leading underscore,
    /// so `partials/_header.liquid` becomes `header`. Returns how many files
    /// were loaded.
    pub fn load(&self, pattern: &str) -> Result<usize> {
        let paths = glob(pattern).map_err(|e| {
            RuntimeError::FileSystem(format!("Invalid glob pattern '{pattern}': {e}"))
        })?;

        let mut loaded = 0;
        for entry in paths {
            let path = entry.map_err(|e| {
                RuntimeError::FileSystem(format!("Failed to read path for '{pattern}': {e}"))
            })?;
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let name = stem.strip_prefix('_').unwrap_or(stem).to_string();
            let source = fs::read_to_string(&path).map_err(|e| {
                RuntimeError::FileSystem(format!("Failed to read '{}': {}", path.display(), e))
            })?;
            debug!("loaded template '{}' from {}", name, path.display());
            self.templates.insert(name, source);
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &str) -> Result<String> {
        self.templates
            .get(path)
            .map(|source| source.value().clone())
            .ok_or_else(|| RuntimeError::FileSystem(format!("Template '{path}' not found")).into())
    }
}
