//! External class providers and classpath resolution.
//!
//! A provider answers one question: given an internal class name, is there a
//! class, and what does it look like. Providers never cache; the
//! [`TypeCache`](crate::common::cache::TypeCache) in front of them does.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::common::bootstrap;
use crate::common::classfile_reader::read_binary_class;
use crate::common::model::BinaryClass;
use crate::error::Result;

/// Name-resolution capability for types not defined in the batch
pub trait ClassLookup: Send + Sync {
    /// `Ok(None)` when the provider does not know the class
    fn lookup(&self, internal_name: &str) -> Result<Option<BinaryClass>>;

    fn describe(&self) -> String;
}

impl<T: ClassLookup + ?Sized> ClassLookup for std::sync::Arc<T> {
    fn lookup(&self, internal_name: &str) -> Result<Option<BinaryClass>> {
        (**self).lookup(internal_name)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Built-in signatures of the core `java.lang`, `java.io` and `java.util` types
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapClassPath;

impl ClassLookup for BootstrapClassPath {
    fn lookup(&self, internal_name: &str) -> Result<Option<BinaryClass>> {
        Ok(bootstrap::lookup(internal_name).cloned())
    }

    fn describe(&self) -> String {
        "bootstrap".to_string()
    }
}

/// A directory of `.class` files laid out by package
#[derive(Debug, Clone)]
pub struct DirectoryClassPath {
    root: PathBuf,
}

impl DirectoryClassPath {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClassLookup for DirectoryClassPath {
    fn lookup(&self, internal_name: &str) -> Result<Option<BinaryClass>> {
        let path = self.root.join(format!("{}.class", internal_name));
        match fs::read(&path) {
            Ok(bytes) => {
                log::debug!("reading {}", path.display());
                read_binary_class(&bytes).map(Some)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Class bytes held in memory, typically the output of an earlier batch
#[derive(Debug, Clone, Default)]
pub struct MemoryClassPath {
    classes: HashMap<String, Vec<u8>>,
}

impl MemoryClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a batch result keyed by dotted binary names
    pub fn from_class_map<'a>(classes: impl IntoIterator<Item = (&'a String, &'a Vec<u8>)>) -> Self {
        let classes = classes
            .into_iter()
            .map(|(name, bytes)| (name.replace('.', "/"), bytes.clone()))
            .collect();
        Self { classes }
    }

    pub fn add(&mut self, internal_name: impl Into<String>, bytes: Vec<u8>) {
        self.classes.insert(internal_name.into(), bytes);
    }
}

impl ClassLookup for MemoryClassPath {
    fn lookup(&self, internal_name: &str) -> Result<Option<BinaryClass>> {
        match self.classes.get(internal_name) {
            Some(bytes) => read_binary_class(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        format!("memory ({} classes)", self.classes.len())
    }
}

/// Providers consulted in order; the first hit wins
#[derive(Default)]
pub struct ClassPathChain {
    entries: Vec<Box<dyn ClassLookup>>,
}

impl ClassPathChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bootstrap signatures followed by the directories of `classpath`
    pub fn from_classpath(classpath: &str) -> Self {
        let mut chain = Self::new().with(BootstrapClassPath);
        for entry in ClasspathResolver::parse_classpath_entries(classpath) {
            chain.push(DirectoryClassPath::new(entry));
        }
        chain
    }

    pub fn with(mut self, provider: impl ClassLookup + 'static) -> Self {
        self.push(provider);
        self
    }

    pub fn push(&mut self, provider: impl ClassLookup + 'static) {
        self.entries.push(Box::new(provider));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ClassLookup for ClassPathChain {
    fn lookup(&self, internal_name: &str) -> Result<Option<BinaryClass>> {
        for entry in &self.entries {
            if let Some(class) = entry.lookup(internal_name)? {
                return Ok(Some(class));
            }
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.entries.iter().map(|e| e.describe()).collect();
        parts.join(", ")
    }
}

/// Command-line classpath resolution
pub struct ClasspathResolver;

impl ClasspathResolver {
    /// `-cp` argument, then the `CLASSPATH` environment variable, then `.`
    pub fn resolve_classpath(cp_arg: Option<&str>) -> String {
        if let Some(cp) = cp_arg {
            log::debug!("classpath from -cp: {}", cp);
            return cp.to_string();
        }
        if let Ok(classpath_env) = env::var("CLASSPATH") {
            if !classpath_env.is_empty() {
                log::debug!("classpath from CLASSPATH: {}", classpath_env);
                return classpath_env;
            }
        }
        ".".to_string()
    }

    /// Split on the platform path separator, dropping empty entries
    pub fn parse_classpath_entries(classpath: &str) -> Vec<String> {
        let separator = if cfg!(windows) { ';' } else { ':' };
        classpath
            .split(separator)
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_classpath_wins() {
        assert_eq!(ClasspathResolver::resolve_classpath(Some("/path/cp")), "/path/cp");
    }

    #[test]
    fn parse_classpath_entries_skips_empty() {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let cp = format!("/path1{0}{0}/path2{0} ", separator);
        let entries = ClasspathResolver::parse_classpath_entries(&cp);
        assert_eq!(entries, vec!["/path1", "/path2"]);
    }

    #[test]
    fn chain_consults_entries_in_order() {
        let chain = ClassPathChain::from_classpath("");
        assert_eq!(chain.len(), 1);
        assert!(chain.lookup("java/lang/Object").unwrap().is_some());
        assert!(chain.lookup("com/example/Missing").unwrap().is_none());
    }

    #[test]
    fn missing_directory_entry_is_not_an_error() {
        let dir = DirectoryClassPath::new("/nonexistent/classes");
        assert!(dir.lookup("a/B").unwrap().is_none());
    }
}
