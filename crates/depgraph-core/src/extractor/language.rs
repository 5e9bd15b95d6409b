//! Language table for tree-sitter extraction.
//!
//! Each supported language maps file extensions to a grammar and to a set of
//! node-kind rules describing which syntax nodes define components, which
//! open naming scopes, which are calls and which are imports.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use tree_sitter::Language;

use crate::model::ComponentKind;

// ============================================================================
// Supported Languages
// ============================================================================

/// Supported programming languages for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedLanguage {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
    Go,
    C,
    Cpp,
    CSharp,
}

impl SupportedLanguage {
    /// All supported languages.
    pub const ALL: [SupportedLanguage; 9] = [
        SupportedLanguage::Python,
        SupportedLanguage::JavaScript,
        SupportedLanguage::TypeScript,
        SupportedLanguage::Tsx,
        SupportedLanguage::Rust,
        SupportedLanguage::Go,
        SupportedLanguage::C,
        SupportedLanguage::Cpp,
        SupportedLanguage::CSharp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedLanguage::Python => "python",
            SupportedLanguage::JavaScript => "javascript",
            SupportedLanguage::TypeScript => "typescript",
            SupportedLanguage::Tsx => "tsx",
            SupportedLanguage::Rust => "rust",
            SupportedLanguage::Go => "go",
            SupportedLanguage::C => "c",
            SupportedLanguage::Cpp => "cpp",
            SupportedLanguage::CSharp => "csharp",
        }
    }

    /// Get the tree-sitter Language for this language.
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            SupportedLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SupportedLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SupportedLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SupportedLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            SupportedLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
            SupportedLanguage::Go => tree_sitter_go::LANGUAGE.into(),
            SupportedLanguage::C => tree_sitter_c::LANGUAGE.into(),
            SupportedLanguage::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            SupportedLanguage::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
        }
    }

    /// Detect language from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        get_extension_map()
            .get(ext.to_lowercase().as_str())
            .copied()
    }

    /// Detect language from file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// File extensions handled by this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SupportedLanguage::Python => &["py"],
            SupportedLanguage::JavaScript => &["js", "mjs", "cjs", "jsx"],
            SupportedLanguage::TypeScript => &["ts"],
            SupportedLanguage::Tsx => &["tsx"],
            SupportedLanguage::Rust => &["rs"],
            SupportedLanguage::Go => &["go"],
            SupportedLanguage::C => &["c", "h"],
            SupportedLanguage::Cpp => &["cpp", "hpp", "cc", "cxx", "hh"],
            SupportedLanguage::CSharp => &["cs"],
        }
    }

    /// Node-kind rules for this language.
    pub fn rules(&self) -> &'static LanguageRules {
        match self {
            SupportedLanguage::Python => &PYTHON_RULES,
            SupportedLanguage::JavaScript => &JAVASCRIPT_RULES,
            SupportedLanguage::TypeScript | SupportedLanguage::Tsx => &TYPESCRIPT_RULES,
            SupportedLanguage::Rust => &RUST_RULES,
            SupportedLanguage::Go => &GO_RULES,
            SupportedLanguage::C => &C_RULES,
            SupportedLanguage::Cpp => &CPP_RULES,
            SupportedLanguage::CSharp => &CSHARP_RULES,
        }
    }

    /// Dotted module path of a file, used as the prefix of qualified names
    /// and as the name of the file's residual component.
    pub fn module_path(&self, relative_path: &str) -> String {
        let normalized = relative_path.replace('\\', "/");
        let without_ext = match normalized.rfind('.') {
            Some(dot) if dot > normalized.rfind('/').map_or(0, |s| s + 1) => &normalized[..dot],
            _ => normalized.as_str(),
        };
        let mut segments: Vec<&str> = without_ext.split('/').filter(|s| !s.is_empty()).collect();
        let stem = segments.last().copied().unwrap_or_default().to_string();

        match self {
            SupportedLanguage::Python => {
                if segments.len() > 1 && segments.last() == Some(&"__init__") {
                    segments.pop();
                }
            }
            SupportedLanguage::Rust => {
                if segments.first() == Some(&"src") && segments.len() > 1 {
                    segments.remove(0);
                }
                if segments.len() > 1 && matches!(segments.last(), Some(&"mod")) {
                    segments.pop();
                }
            }
            _ => {}
        }

        if segments.is_empty() {
            stem
        } else {
            segments.join(".")
        }
    }

    /// Prefix used for symbols declared in a file. Equal to the module path
    /// except for package-scoped languages, where it is the directory.
    pub fn symbol_prefix(&self, relative_path: &str) -> String {
        if self.rules().package_scoped {
            let normalized = relative_path.replace('\\', "/");
            if let Some((dir, _)) = normalized.rsplit_once('/') {
                let package = dir
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(".");
                if !package.is_empty() {
                    return package;
                }
            }
        }
        self.module_path(relative_path)
    }
}

impl std::fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static extension to language mapping.
static EXTENSION_MAP: OnceLock<HashMap<&'static str, SupportedLanguage>> = OnceLock::new();

fn get_extension_map() -> &'static HashMap<&'static str, SupportedLanguage> {
    EXTENSION_MAP.get_or_init(|| {
        let mut map = HashMap::new();
        for language in SupportedLanguage::ALL {
            for ext in language.extensions() {
                map.insert(*ext, language);
            }
        }
        map
    })
}

// ============================================================================
// Node-kind rules
// ============================================================================

/// How the name of a definition node is found.
#[derive(Debug, Clone, Copy)]
pub enum NameRule {
    /// Text of a named field
    Field(&'static str),
    /// Follow the C-family `declarator` chain down to the identifier
    Declarator,
    /// Like `Declarator`, but rejects function declarators (prototypes)
    VarDeclarator,
    /// Go method: receiver type plus the `name` field
    Receiver,
    /// First descendant of the given kind, then its `name` field
    Descendant(&'static str),
}

/// A syntax node that defines a component.
#[derive(Debug, Clone, Copy)]
pub struct DefinitionRule {
    pub node_kind: &'static str,
    pub kind: ComponentKind,
    pub name: NameRule,
    /// Only a definition when the node has a `body` field
    pub requires_body: bool,
    /// Only a definition directly inside a type body
    pub member_only: bool,
}

impl DefinitionRule {
    const fn new(node_kind: &'static str, kind: ComponentKind, name: NameRule) -> Self {
        Self {
            node_kind,
            kind,
            name,
            requires_body: false,
            member_only: false,
        }
    }

    const fn with_body(mut self) -> Self {
        self.requires_body = true;
        self
    }

    const fn member(mut self) -> Self {
        self.member_only = true;
        self
    }
}

/// A syntax node that extends the qualified-name prefix without being a component.
#[derive(Debug, Clone, Copy)]
pub struct ScopeRule {
    pub node_kind: &'static str,
    pub name: NameRule,
    /// Scope names a type (`impl` blocks), so nested functions are methods
    pub is_type: bool,
}

/// Per-language node-kind tables.
#[derive(Debug)]
pub struct LanguageRules {
    pub definitions: &'static [DefinitionRule],
    pub scopes: &'static [ScopeRule],
    /// Call node kind and the field holding the callee
    pub calls: &'static [(&'static str, &'static str)],
    pub imports: &'static [&'static str],
    /// Receiver keywords resolving to the enclosing type
    pub self_names: &'static [&'static str],
    /// Symbols are scoped to the directory (package), not the file
    pub package_scoped: bool,
    /// Names never rewritten to the package prefix
    pub builtins: &'static [&'static str],
}

impl LanguageRules {
    pub fn definition(&self, node_kind: &str) -> Option<&DefinitionRule> {
        self.definitions.iter().find(|d| d.node_kind == node_kind)
    }

    pub fn scope(&self, node_kind: &str) -> Option<&ScopeRule> {
        self.scopes.iter().find(|s| s.node_kind == node_kind)
    }

    pub fn call_field(&self, node_kind: &str) -> Option<&'static str> {
        self.calls
            .iter()
            .find(|(kind, _)| *kind == node_kind)
            .map(|(_, field)| *field)
    }

    pub fn is_import(&self, node_kind: &str) -> bool {
        self.imports.contains(&node_kind)
    }
}

use ComponentKind::{Class, Function, Variable};

static PYTHON_RULES: LanguageRules = LanguageRules {
    definitions: &[
        DefinitionRule::new("function_definition", Function, NameRule::Field("name")),
        DefinitionRule::new("class_definition", Class, NameRule::Field("name")),
        DefinitionRule::new("assignment", Variable, NameRule::Field("left")),
    ],
    scopes: &[],
    calls: &[("call", "function")],
    imports: &["import_statement", "import_from_statement"],
    self_names: &["self", "cls"],
    package_scoped: false,
    builtins: &[],
};

static JAVASCRIPT_RULES: LanguageRules = LanguageRules {
    definitions: &[
        DefinitionRule::new("function_declaration", Function, NameRule::Field("name")),
        DefinitionRule::new(
            "generator_function_declaration",
            Function,
            NameRule::Field("name"),
        ),
        DefinitionRule::new("class_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("method_definition", Function, NameRule::Field("name")),
        DefinitionRule::new("field_definition", Variable, NameRule::Field("property")).member(),
        DefinitionRule::new("variable_declarator", Variable, NameRule::Field("name")),
    ],
    scopes: &[],
    calls: &[("call_expression", "function"), ("new_expression", "constructor")],
    imports: &["import_statement"],
    self_names: &["this"],
    package_scoped: false,
    builtins: &[],
};

static TYPESCRIPT_RULES: LanguageRules = LanguageRules {
    definitions: &[
        DefinitionRule::new("function_declaration", Function, NameRule::Field("name")),
        DefinitionRule::new(
            "generator_function_declaration",
            Function,
            NameRule::Field("name"),
        ),
        DefinitionRule::new("class_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("abstract_class_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("interface_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("enum_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("method_definition", Function, NameRule::Field("name")),
        DefinitionRule::new("public_field_definition", Variable, NameRule::Field("name"))
            .member(),
        DefinitionRule::new("variable_declarator", Variable, NameRule::Field("name")),
    ],
    scopes: &[
        ScopeRule {
            node_kind: "internal_module",
            name: NameRule::Field("name"),
            is_type: false,
        },
    ],
    calls: &[("call_expression", "function"), ("new_expression", "constructor")],
    imports: &["import_statement"],
    self_names: &["this"],
    package_scoped: false,
    builtins: &[],
};

static RUST_RULES: LanguageRules = LanguageRules {
    definitions: &[
        DefinitionRule::new("function_item", Function, NameRule::Field("name")),
        DefinitionRule::new("struct_item", Class, NameRule::Field("name")),
        DefinitionRule::new("enum_item", Class, NameRule::Field("name")),
        DefinitionRule::new("union_item", Class, NameRule::Field("name")),
        DefinitionRule::new("trait_item", Class, NameRule::Field("name")),
        DefinitionRule::new("field_declaration", Variable, NameRule::Field("name")).member(),
        DefinitionRule::new("const_item", Variable, NameRule::Field("name")),
        DefinitionRule::new("static_item", Variable, NameRule::Field("name")),
    ],
    scopes: &[
        ScopeRule {
            node_kind: "impl_item",
            name: NameRule::Field("type"),
            is_type: true,
        },
        ScopeRule {
            node_kind: "mod_item",
            name: NameRule::Field("name"),
            is_type: false,
        },
    ],
    calls: &[("call_expression", "function")],
    imports: &["use_declaration"],
    self_names: &["self", "Self"],
    package_scoped: false,
    builtins: &[],
};

static GO_RULES: LanguageRules = LanguageRules {
    definitions: &[
        DefinitionRule::new("function_declaration", Function, NameRule::Field("name")),
        DefinitionRule::new("method_declaration", Function, NameRule::Receiver),
        DefinitionRule::new("type_spec", Class, NameRule::Field("name")),
        DefinitionRule::new("field_declaration", Variable, NameRule::Field("name")).member(),
        DefinitionRule::new("var_spec", Variable, NameRule::Field("name")),
        DefinitionRule::new("const_spec", Variable, NameRule::Field("name")),
    ],
    scopes: &[],
    calls: &[("call_expression", "function")],
    imports: &["import_declaration"],
    self_names: &[],
    package_scoped: true,
    builtins: &[
        "append", "cap", "clear", "close", "complex", "copy", "delete", "imag", "len", "make",
        "max", "min", "new", "panic", "print", "println", "real", "recover",
    ],
};

static C_RULES: LanguageRules = LanguageRules {
    definitions: &[
        DefinitionRule::new("function_definition", Function, NameRule::Declarator),
        DefinitionRule::new("struct_specifier", Class, NameRule::Field("name")).with_body(),
        DefinitionRule::new("union_specifier", Class, NameRule::Field("name")).with_body(),
        DefinitionRule::new("field_declaration", Variable, NameRule::VarDeclarator).member(),
        DefinitionRule::new("declaration", Variable, NameRule::VarDeclarator),
    ],
    scopes: &[],
    calls: &[("call_expression", "function")],
    imports: &["preproc_include"],
    self_names: &[],
    package_scoped: false,
    builtins: &[],
};

static CPP_RULES: LanguageRules = LanguageRules {
    definitions: &[
        DefinitionRule::new("function_definition", Function, NameRule::Declarator),
        DefinitionRule::new("class_specifier", Class, NameRule::Field("name")).with_body(),
        DefinitionRule::new("struct_specifier", Class, NameRule::Field("name")).with_body(),
        DefinitionRule::new("union_specifier", Class, NameRule::Field("name")).with_body(),
        DefinitionRule::new("field_declaration", Variable, NameRule::VarDeclarator).member(),
        DefinitionRule::new("declaration", Variable, NameRule::VarDeclarator),
    ],
    scopes: &[ScopeRule {
        node_kind: "namespace_definition",
        name: NameRule::Field("name"),
        is_type: false,
    }],
    calls: &[("call_expression", "function")],
    imports: &["preproc_include"],
    self_names: &["this"],
    package_scoped: false,
    builtins: &[],
};

static CSHARP_RULES: LanguageRules = LanguageRules {
    definitions: &[
        DefinitionRule::new("class_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("struct_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("interface_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("record_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("enum_declaration", Class, NameRule::Field("name")),
        DefinitionRule::new("method_declaration", Function, NameRule::Field("name")),
        DefinitionRule::new("constructor_declaration", Function, NameRule::Field("name")),
        DefinitionRule::new("property_declaration", Variable, NameRule::Field("name")).member(),
        DefinitionRule::new(
            "field_declaration",
            Variable,
            NameRule::Descendant("variable_declarator"),
        )
        .member(),
    ],
    scopes: &[
        ScopeRule {
            node_kind: "namespace_declaration",
            name: NameRule::Field("name"),
            is_type: false,
        },
        ScopeRule {
            node_kind: "file_scoped_namespace_declaration",
            name: NameRule::Field("name"),
            is_type: false,
        },
    ],
    calls: &[
        ("invocation_expression", "function"),
        ("object_creation_expression", "type"),
    ],
    imports: &["using_directive"],
    self_names: &["this"],
    package_scoped: false,
    builtins: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(
            SupportedLanguage::from_extension("py"),
            Some(SupportedLanguage::Python)
        );
        assert_eq!(
            SupportedLanguage::from_extension("TSX"),
            Some(SupportedLanguage::Tsx)
        );
        assert_eq!(
            SupportedLanguage::from_extension("hpp"),
            Some(SupportedLanguage::Cpp)
        );
        assert_eq!(SupportedLanguage::from_extension("md"), None);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(
            SupportedLanguage::from_path(Path::new("src/lib.rs")),
            Some(SupportedLanguage::Rust)
        );
        assert_eq!(SupportedLanguage::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_python_module_path() {
        let py = SupportedLanguage::Python;
        assert_eq!(py.module_path("a.py"), "a");
        assert_eq!(py.module_path("pkg/sub/mod.py"), "pkg.sub.mod");
        assert_eq!(py.module_path("pkg/__init__.py"), "pkg");
        assert_eq!(py.module_path("__init__.py"), "__init__");
    }

    #[test]
    fn test_rust_module_path() {
        let rs = SupportedLanguage::Rust;
        assert_eq!(rs.module_path("src/lib.rs"), "lib");
        assert_eq!(rs.module_path("src/store/mod.rs"), "store");
        assert_eq!(rs.module_path("src/store/json.rs"), "store.json");
    }

    #[test]
    fn test_go_symbol_prefix_is_package() {
        let go = SupportedLanguage::Go;
        assert_eq!(go.symbol_prefix("pkg/util/strings.go"), "pkg.util");
        assert_eq!(go.module_path("pkg/util/strings.go"), "pkg.util.strings");
        assert_eq!(go.symbol_prefix("main.go"), "main");
    }

    #[test]
    fn test_every_language_loads_grammar() {
        for language in SupportedLanguage::ALL {
            let mut parser = tree_sitter::Parser::new();
            parser
                .set_language(&language.tree_sitter_language())
                .expect("grammar should load");
        }
    }
}
