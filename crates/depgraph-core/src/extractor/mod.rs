//! Language Extraction
//!
//! Three layers of extractors turn source text into component descriptors:
//!
//! - [`LanguageExtractor`] parses a file of one language
//! - [`FileExtractor`] answers file-level questions (component names,
//!   imports, called and callable symbols) and hands out per-component views
//! - [`ComponentExtractor`] yields a component's code text and the symbols it
//!   references
//!
//! [`ExtractorRegistry`] selects a language extractor by file extension.
//!
//! ## Usage
//!
//! ```ignore
//! use depgraph_core::extractor::ExtractorRegistry;
//!
//! let registry = ExtractorRegistry::with_defaults();
//! let extractor = registry.for_path("src/app.py").unwrap();
//! let file = extractor.extract("src/app.py", "def main():\n    run()\n")?;
//! for name in file.extract_component_names() {
//!     let component = file.component(&name).unwrap();
//!     println!("{} -> {:?}", name, component.extract_callable_objects()?);
//! }
//! ```

mod language;
mod syntax;

pub use language::{DefinitionRule, LanguageRules, NameRule, ScopeRule, SupportedLanguage};
pub use syntax::TreeSitterExtractor;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::model::{ComponentKind, Span};

/// Errors raised while extracting components.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Failed to set language
    #[error("Failed to set language: {0}")]
    LanguageSet(String),

    /// Failed to parse source code
    #[error("Failed to parse source code: {0}")]
    ParseFailed(String),

    /// Unknown component name
    #[error("Component not found in file: {0}")]
    ComponentNotFound(String),

    /// Span outside the formatted text or not on a character boundary
    #[error("Invalid span {start}..{end} for component {component}")]
    InvalidSpan {
        component: String,
        start: usize,
        end: usize,
    },

    /// No extractor registered for the file
    #[error("Unsupported language for file: {0}")]
    UnsupportedLanguage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Normalize source text before extraction. Line endings become `\n`.
pub fn normalize_source(source: &str) -> String {
    source.replace("\r\n", "\n")
}

// ============================================================================
// Traits
// ============================================================================

/// Parses source files of one language.
pub trait LanguageExtractor: Send + Sync {
    /// Language name, for logging
    fn name(&self) -> &str;

    /// Parse `source` (the file at `relative_path`) into a file extractor.
    fn extract(
        &self,
        relative_path: &str,
        source: &str,
    ) -> Result<Box<dyn FileExtractor>, ExtractError>;
}

/// File-level extraction results.
pub trait FileExtractor: Send + Sync {
    fn relative_path(&self) -> &str;

    /// Formatted (normalized) file text; component spans index into it.
    fn formatted_text(&self) -> &str;

    /// Qualified names of all components, residual last.
    fn extract_component_names(&self) -> Vec<String>;

    fn extract_imports(&self) -> Vec<String>;

    /// Raw callee names as written in the file.
    fn extract_called_components(&self) -> Vec<String>;

    /// Qualified names of callable components defined in the file.
    fn extract_callable_components(&self) -> Vec<String>;

    /// View of one component, by qualified name.
    fn component(&self, qualified_name: &str) -> Option<Box<dyn ComponentExtractor + '_>>;
}

/// Per-component extraction.
pub trait ComponentExtractor {
    fn qualified_name(&self) -> &str;

    fn kind(&self) -> ComponentKind;

    /// Qualified name of the enclosing component, if any
    fn parent(&self) -> Option<&str>;

    fn spans(&self) -> &[Span];

    fn extract_component_code(&self) -> Result<String, ExtractError>;

    /// Qualified names of the symbols this component references.
    fn extract_callable_objects(&self) -> Result<Vec<String>, ExtractError>;
}

// ============================================================================
// Parsed data
// ============================================================================

/// Plain extraction result for one file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub relative_path: String,
    pub module: String,
    pub text: String,
    pub imports: Vec<String>,
    pub called_symbols: Vec<String>,
    pub callable_symbols: Vec<String>,
    pub components: Vec<ParsedComponent>,
}

/// Plain extraction result for one component.
#[derive(Debug, Clone)]
pub struct ParsedComponent {
    pub qualified_name: String,
    pub kind: ComponentKind,
    pub parent: Option<String>,
    pub spans: Vec<Span>,
    pub referenced_symbols: Vec<String>,
}

impl ParsedFile {
    /// Concatenate the text of a component's spans.
    pub fn component_text(&self, component: &ParsedComponent) -> Result<String, ExtractError> {
        let mut code = String::new();
        for span in &component.spans {
            let slice =
                self.text
                    .get(span.start..span.end)
                    .ok_or_else(|| ExtractError::InvalidSpan {
                        component: component.qualified_name.clone(),
                        start: span.start,
                        end: span.end,
                    })?;
            code.push_str(slice);
        }
        Ok(code)
    }
}

impl FileExtractor for ParsedFile {
    fn relative_path(&self) -> &str {
        &self.relative_path
    }

    fn formatted_text(&self) -> &str {
        &self.text
    }

    fn extract_component_names(&self) -> Vec<String> {
        self.components
            .iter()
            .map(|c| c.qualified_name.clone())
            .collect()
    }

    fn extract_imports(&self) -> Vec<String> {
        self.imports.clone()
    }

    fn extract_called_components(&self) -> Vec<String> {
        self.called_symbols.clone()
    }

    fn extract_callable_components(&self) -> Vec<String> {
        self.callable_symbols.clone()
    }

    fn component(&self, qualified_name: &str) -> Option<Box<dyn ComponentExtractor + '_>> {
        self.components
            .iter()
            .find(|c| c.qualified_name == qualified_name)
            .map(|component| {
                Box::new(ComponentView {
                    file: self,
                    component,
                }) as Box<dyn ComponentExtractor + '_>
            })
    }
}

/// Borrowed view of one parsed component.
struct ComponentView<'a> {
    file: &'a ParsedFile,
    component: &'a ParsedComponent,
}

impl ComponentExtractor for ComponentView<'_> {
    fn qualified_name(&self) -> &str {
        &self.component.qualified_name
    }

    fn kind(&self) -> ComponentKind {
        self.component.kind
    }

    fn parent(&self) -> Option<&str> {
        self.component.parent.as_deref()
    }

    fn spans(&self) -> &[Span] {
        &self.component.spans
    }

    fn extract_component_code(&self) -> Result<String, ExtractError> {
        self.file.component_text(self.component)
    }

    fn extract_callable_objects(&self) -> Result<Vec<String>, ExtractError> {
        Ok(self.component.referenced_symbols.clone())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Maps file extensions to language extractors.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn LanguageExtractor>>,
}

impl ExtractorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with tree-sitter extractors for every supported language.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for language in SupportedLanguage::ALL {
            let extractor: Arc<dyn LanguageExtractor> =
                Arc::new(TreeSitterExtractor::new(language));
            for ext in language.extensions() {
                registry.register(ext, Arc::clone(&extractor));
            }
        }
        registry
    }

    /// Register an extractor for an extension (without the dot).
    pub fn register(&mut self, extension: &str, extractor: Arc<dyn LanguageExtractor>) {
        self.by_extension
            .insert(extension.to_lowercase(), extractor);
    }

    /// Extractor responsible for `path`, if any.
    pub fn for_path(&self, path: impl AsRef<Path>) -> Option<Arc<dyn LanguageExtractor>> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        self.by_extension.get(&ext).cloned()
    }

    pub fn supports(&self, path: impl AsRef<Path>) -> bool {
        self.for_path(path).is_some()
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}
