//! Unified plugin manager that wraps format-specific loading backends.
//!
//! This is the single entry-point the node factory talks to when it needs a
//! plugin instance for a descriptor.  The actual loading mechanics of each
//! format live behind [`FormatBackend`]; the manager only dispatches by
//! format name and keeps the catalog of known plugins.

use std::collections::HashMap;

use super::types::*;

/// The plugin-loading collaborator consumed by the node factory.
pub trait PluginLoader: Send {
    fn instantiate(
        &self,
        desc: &PluginDescription,
        sample_rate: f64,
        block_size: usize,
    ) -> Result<Box<dyn PluginInstance>, String>;
}

/// One plugin format (VST3, LV2, the host's internal set, ...).
pub trait FormatBackend: Send {
    /// Format name as it appears in descriptors.
    fn name(&self) -> &str;

    /// Descriptors this backend can currently instantiate.
    fn scan(&self) -> Vec<PluginDescription> {
        Vec::new()
    }

    fn create_instance(
        &self,
        desc: &PluginDescription,
        sample_rate: f64,
        block_size: usize,
    ) -> Result<Box<dyn PluginInstance>, String>;
}

/// Holds the registered format backends and the catalog of available
/// plugins (merged from every backend's scan).
#[derive(Default)]
pub struct PluginManager {
    backends: HashMap<String, Box<dyn FormatBackend>>,
    available_plugins: Vec<PluginDescription>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend and merge its scan results into the catalog.
    /// A backend with the same format name replaces the previous one.
    pub fn register_format(&mut self, backend: Box<dyn FormatBackend>) {
        let name = backend.name().to_string();
        let found = backend.scan();
        log::info!("Registered plugin format {} ({} plugins)", name, found.len());

        self.available_plugins.retain(|p| p.format_name != name);
        self.available_plugins.extend(found);
        self.sort_catalog();
        self.backends.insert(name, backend);
    }

    pub fn has_format(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    // ----- Catalog -----

    /// Sort the catalog alphabetically by name (case-insensitive).
    pub fn sort_catalog(&mut self) {
        self.available_plugins
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }

    pub fn available_plugins(&self) -> &[PluginDescription] {
        &self.available_plugins
    }

    pub fn find_plugin(&self, name: &str) -> Option<&PluginDescription> {
        self.available_plugins.iter().find(|p| p.name == name)
    }

    pub fn find_plugin_with_format(
        &self,
        name: &str,
        format_name: &str,
    ) -> Option<&PluginDescription> {
        self.available_plugins
            .iter()
            .find(|p| p.name == name && p.format_name == format_name)
    }
}

impl PluginLoader for PluginManager {
    fn instantiate(
        &self,
        desc: &PluginDescription,
        sample_rate: f64,
        block_size: usize,
    ) -> Result<Box<dyn PluginInstance>, String> {
        let backend = self
            .backends
            .get(&desc.format_name)
            .ok_or_else(|| format!("no loader registered for format '{}'", desc.format_name))?;
        backend.create_instance(desc, sample_rate, block_size)
    }
}
