use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use engine_logging::engine_debug;

use crate::Converter;

/// Lowercases an extension and makes sure it carries the leading dot.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Registry key for `path`, or `None` when the file has no extension.
pub fn extension_key(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
}

/// Maps extensions to the converter that owns them.
///
/// Built once during setup and read-only afterwards, so lookups take no lock.
/// Registering a second converter for an extension replaces the first.
#[derive(Default, Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        for ext in converter.supported_extensions() {
            let key = normalize_extension(ext);
            let previous = self.converters.insert(key.clone(), converter.clone());
            match previous {
                Some(previous) => engine_debug!(
                    "Replaced converter for {}: {} -> {}",
                    key,
                    previous.name(),
                    converter.name()
                ),
                None => engine_debug!("Registered converter for {}: {}", key, converter.name()),
            }
        }
    }

    /// Looks up the converter for an extension, case-insensitively.
    pub fn resolve(&self, extension: &str) -> Option<&Arc<dyn Converter>> {
        self.converters.get(&normalize_extension(extension))
    }

    pub fn resolve_path(&self, path: &Path) -> Option<&Arc<dyn Converter>> {
        extension_key(path).and_then(|key| self.converters.get(&key))
    }

    /// Registered extensions in ascending order.
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.converters.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    /// Extension to converter name, for grouping file types in a UI.
    pub fn converter_names(&self) -> BTreeMap<String, String> {
        self.converters
            .iter()
            .map(|(ext, converter)| (ext.clone(), converter.name().to_string()))
            .collect()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.converter_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extensions_are_lowercased_and_dotted() {
        assert_eq!(normalize_extension("DOCX"), ".docx");
        assert_eq!(normalize_extension(".Xlsx"), ".xlsx");
        assert_eq!(normalize_extension(" .pptx "), ".pptx");
    }

    #[test]
    fn extension_key_handles_missing_extension() {
        assert_eq!(
            extension_key(&PathBuf::from("/tmp/Report.XLSX")),
            Some(".xlsx".to_string())
        );
        assert_eq!(extension_key(&PathBuf::from("/tmp/README")), None);
    }
}
