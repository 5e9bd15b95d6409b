//! Tree-sitter backed extraction.
//!
//! A single generic walker drives every language: it consults the
//! [`LanguageRules`] for the file's language to decide which nodes define
//! components, which extend the naming scope, which are calls and which are
//! imports. The walk produces plain data ([`ParsedFile`]) so that component
//! assembly can run on worker threads without holding a syntax tree.
//!
//! ## Ownership of bytes
//!
//! Every byte of the formatted text is owned by exactly one component:
//! - a definition owns its node range minus the ranges of the definitions
//!   nested directly inside it
//! - the residual component owns everything not covered by a top-level definition
//!
//! Definitions are not extracted inside callables or variable initializers,
//! so nested functions and lambdas stay part of their enclosing component.

use std::collections::{HashMap, HashSet};

use tree_sitter::{Node, Parser};

use super::language::{DefinitionRule, LanguageRules, NameRule, SupportedLanguage};
use super::{
    normalize_source, ExtractError, FileExtractor, LanguageExtractor, ParsedComponent, ParsedFile,
};
use crate::model::{ComponentKind, Span};

/// Initializer kinds that turn a variable definition into a function.
const FUNCTION_VALUE_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// Upper bound on declarator chain depth.
const MAX_DECLARATOR_DEPTH: usize = 16;

// ============================================================================
// Extractor
// ============================================================================

/// Language extractor backed by a tree-sitter grammar.
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterExtractor {
    language: SupportedLanguage,
}

impl TreeSitterExtractor {
    pub fn new(language: SupportedLanguage) -> Self {
        Self { language }
    }

    pub fn language(&self) -> SupportedLanguage {
        self.language
    }

    /// Parse a file into plain extraction data.
    pub fn parse(&self, relative_path: &str, source: &str) -> Result<ParsedFile, ExtractError> {
        let text = normalize_source(source);

        let mut parser = Parser::new();
        parser
            .set_language(&self.language.tree_sitter_language())
            .map_err(|e| ExtractError::LanguageSet(e.to_string()))?;
        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| ExtractError::ParseFailed(relative_path.to_string()))?;

        let mut walker = Walker::new(self.language, relative_path, &text);
        let root_scope = Scope::root(walker.prefix.clone());
        walker.visit_children(tree.root_node(), &root_scope);
        let parsed = walker.finish();

        Ok(parsed)
    }
}

impl LanguageExtractor for TreeSitterExtractor {
    fn name(&self) -> &str {
        self.language.as_str()
    }

    fn extract(
        &self,
        relative_path: &str,
        source: &str,
    ) -> Result<Box<dyn FileExtractor>, ExtractError> {
        Ok(Box::new(self.parse(relative_path, source)?))
    }
}

// ============================================================================
// Walker
// ============================================================================

/// A definition found during the walk, before spans are carved.
#[derive(Debug)]
struct Draft {
    qualified_name: String,
    kind: ComponentKind,
    parent: Option<usize>,
    range: Span,
    calls: Vec<String>,
    self_type: Option<String>,
    self_alias: Option<String>,
}

/// Lexical context of the node being visited.
#[derive(Debug, Clone)]
struct Scope {
    prefix: String,
    owner: Option<usize>,
    in_type: bool,
    /// No nested definitions are extracted below this point
    sealed: bool,
    self_type: Option<String>,
    self_alias: Option<String>,
}

impl Scope {
    fn root(prefix: String) -> Self {
        Self {
            prefix,
            owner: None,
            in_type: false,
            sealed: false,
            self_type: None,
            self_alias: None,
        }
    }
}

/// Name of a definition plus the receiver type for out-of-line methods.
struct DefinitionName {
    local: String,
    owner_type: Option<String>,
    self_alias: Option<String>,
}

struct Walker<'s> {
    language: SupportedLanguage,
    rules: &'static LanguageRules,
    source: &'s str,
    relative_path: String,
    module: String,
    prefix: String,
    drafts: Vec<Draft>,
    residual_calls: Vec<String>,
    seen: HashSet<String>,
    aliases: HashMap<String, String>,
    imports: Vec<String>,
}

impl<'s> Walker<'s> {
    fn new(language: SupportedLanguage, relative_path: &str, source: &'s str) -> Self {
        let module = language.module_path(relative_path);
        let prefix = language.symbol_prefix(relative_path);
        let mut seen = HashSet::new();
        seen.insert(module.clone());
        Self {
            language,
            rules: language.rules(),
            source,
            relative_path: relative_path.replace('\\', "/"),
            module,
            prefix,
            drafts: Vec::new(),
            residual_calls: Vec::new(),
            seen,
            aliases: HashMap::new(),
            imports: Vec::new(),
        }
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        self.source
            .get(node.start_byte()..node.end_byte())
            .unwrap_or_default()
    }

    fn visit_children(&mut self, node: Node<'_>, scope: &Scope) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child, scope);
        }
    }

    fn visit(&mut self, node: Node<'_>, scope: &Scope) {
        let kind = node.kind();

        if !scope.sealed {
            if let Some(rule) = self.rules.definition(kind) {
                if self.define(node, rule, scope) {
                    return;
                }
            }
            if let Some(rule) = self.rules.scope(kind) {
                if let Some(name) = self.rule_name(node, rule.name) {
                    let qualified = join(&scope.prefix, &name);
                    let inner = Scope {
                        prefix: qualified.clone(),
                        in_type: rule.is_type,
                        self_type: if rule.is_type {
                            Some(qualified)
                        } else {
                            scope.self_type.clone()
                        },
                        ..scope.clone()
                    };
                    self.visit_children(node, &inner);
                    return;
                }
            }
        }

        if self.rules.is_import(kind) {
            self.collect_import(node);
            return;
        }

        if let Some(field) = self.rules.call_field(kind) {
            if let Some(callee) = node.child_by_field_name(field) {
                if let Some(name) = normalize_symbol(self.text(callee)) {
                    self.record_call(scope, name);
                }
            }
        }

        self.visit_children(node, scope);
    }

    fn record_call(&mut self, scope: &Scope, callee: String) {
        match scope.owner {
            Some(index) => self.drafts[index].calls.push(callee),
            None => self.residual_calls.push(callee),
        }
    }

    /// Register a definition node. Returns false when the node does not
    /// qualify, in which case it is walked as ordinary syntax.
    fn define(&mut self, node: Node<'_>, rule: &DefinitionRule, scope: &Scope) -> bool {
        if rule.member_only && !scope.in_type {
            return false;
        }
        if rule.requires_body && node.child_by_field_name("body").is_none() {
            return false;
        }
        let Some(name) = self.definition_name(node, rule) else {
            return false;
        };

        let mut kind = rule.kind;
        if kind == ComponentKind::Variable
            && node
                .child_by_field_name("value")
                .is_some_and(|v| FUNCTION_VALUE_KINDS.contains(&v.kind()))
        {
            kind = ComponentKind::Function;
        }
        if scope.in_type || name.owner_type.is_some() {
            kind = match kind {
                ComponentKind::Function => ComponentKind::Method,
                ComponentKind::Variable => ComponentKind::Field,
                other => other,
            };
        }

        let qualified_name = join(&scope.prefix, &name.local);
        if !self.seen.insert(qualified_name.clone()) {
            // Redefinition: bytes stay with the current owner.
            let swallowed = Scope {
                sealed: true,
                ..scope.clone()
            };
            self.visit_children(node, &swallowed);
            return true;
        }

        let self_type = match kind {
            ComponentKind::Class => Some(qualified_name.clone()),
            _ => name
                .owner_type
                .as_ref()
                .map(|t| join(&scope.prefix, t))
                .or_else(|| scope.self_type.clone()),
        };
        let self_alias = name.self_alias.or_else(|| scope.self_alias.clone());

        let index = self.drafts.len();
        self.drafts.push(Draft {
            qualified_name: qualified_name.clone(),
            kind,
            parent: scope.owner,
            range: Span::new(node.start_byte(), node.end_byte()),
            calls: Vec::new(),
            self_type: self_type.clone(),
            self_alias: self_alias.clone(),
        });

        let inner = Scope {
            prefix: if kind == ComponentKind::Class {
                qualified_name
            } else {
                scope.prefix.clone()
            },
            owner: Some(index),
            in_type: kind == ComponentKind::Class,
            sealed: kind != ComponentKind::Class,
            self_type,
            self_alias,
        };
        self.visit_children(node, &inner);
        true
    }

    fn definition_name(&self, node: Node<'_>, rule: &DefinitionRule) -> Option<DefinitionName> {
        if let NameRule::Receiver = rule.name {
            return self.receiver_name(node);
        }

        let name_node = self.rule_name_node(node, rule.name)?;
        if rule.kind == ComponentKind::Variable && !is_identifier_kind(name_node.kind()) {
            return None;
        }
        let local = normalize_symbol(self.text(name_node))?;

        // Out-of-line definitions such as `void Foo::bar()`
        if let Some((owner, _)) = local.rsplit_once('.') {
            if rule.kind != ComponentKind::Function {
                return None;
            }
            return Some(DefinitionName {
                owner_type: Some(owner.to_string()),
                local,
                self_alias: None,
            });
        }

        Some(DefinitionName {
            local,
            owner_type: None,
            self_alias: None,
        })
    }

    fn rule_name(&self, node: Node<'_>, rule: NameRule) -> Option<String> {
        self.rule_name_node(node, rule)
            .and_then(|n| normalize_symbol(self.text(n)))
    }

    fn rule_name_node<'t>(&self, node: Node<'t>, rule: NameRule) -> Option<Node<'t>> {
        match rule {
            NameRule::Field(field) => node.child_by_field_name(field),
            NameRule::Declarator => declarator_name_node(node, false),
            NameRule::VarDeclarator => declarator_name_node(node, true),
            NameRule::Descendant(kind) => {
                let target = find_descendant(node, kind)?;
                target.child_by_field_name("name").or_else(|| {
                    let mut cursor = target.walk();
                    let found = target
                        .named_children(&mut cursor)
                        .find(|c| c.kind() == "identifier");
                    found
                })
            }
            NameRule::Receiver => None,
        }
    }

    /// Go method: `func (s *Server) Start()` is named `Server.Start`.
    fn receiver_name(&self, node: Node<'_>) -> Option<DefinitionName> {
        let method = normalize_symbol(self.text(node.child_by_field_name("name")?))?;
        let receiver = node.child_by_field_name("receiver")?;
        let param = find_descendant(receiver, "parameter_declaration")?;
        let type_node = param.child_by_field_name("type")?;
        let type_text = self.text(type_node).trim_start_matches('*');
        let type_name = type_text.split('[').next().unwrap_or(type_text).trim();
        let type_name = normalize_symbol(type_name)?;
        let self_alias = param
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());

        Some(DefinitionName {
            local: format!("{}.{}", type_name, method),
            owner_type: Some(type_name),
            self_alias,
        })
    }

    // ========================================================================
    // Imports
    // ========================================================================

    fn collect_import(&mut self, node: Node<'_>) {
        match self.language {
            SupportedLanguage::Python => self.python_import(node),
            SupportedLanguage::JavaScript
            | SupportedLanguage::TypeScript
            | SupportedLanguage::Tsx => self.js_import(node),
            SupportedLanguage::Go => self.go_import(node),
            SupportedLanguage::Rust => {
                if let Some(argument) = node.child_by_field_name("argument") {
                    self.rust_use(argument, "");
                }
            }
            SupportedLanguage::C | SupportedLanguage::Cpp => {
                if let Some(path) = node.child_by_field_name("path") {
                    let target = self
                        .text(path)
                        .trim_matches(|c| c == '"' || c == '<' || c == '>')
                        .to_string();
                    if !target.is_empty() {
                        self.imports.push(target);
                    }
                }
            }
            SupportedLanguage::CSharp => {
                let mut cursor = node.walk();
                let target = node
                    .named_children(&mut cursor)
                    .filter(|c| matches!(c.kind(), "identifier" | "qualified_name"))
                    .last()
                    .map(|c| self.text(c).to_string());
                if let Some(target) = target {
                    self.imports.push(target);
                }
            }
        }
    }

    fn python_import(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();

        if node.kind() == "import_statement" {
            for child in children {
                match child.kind() {
                    "dotted_name" => {
                        let target = self.text(child).to_string();
                        self.imports.push(target);
                    }
                    "aliased_import" => {
                        let (Some(name), Some(alias)) = (
                            child.child_by_field_name("name"),
                            child.child_by_field_name("alias"),
                        ) else {
                            continue;
                        };
                        let target = self.text(name).to_string();
                        let binding = self.text(alias).to_string();
                        self.aliases.insert(binding, target.clone());
                        self.imports.push(target);
                    }
                    _ => {}
                }
            }
            return;
        }

        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = self.resolve_python_module(self.text(module_node));

        for child in children {
            if child.id() == module_node.id() {
                continue;
            }
            match child.kind() {
                "dotted_name" => {
                    let name = self.text(child).to_string();
                    let target = join(&module, &name);
                    let binding = name.rsplit('.').next().unwrap_or(&name).to_string();
                    self.aliases.insert(binding, target.clone());
                    self.imports.push(target);
                }
                "aliased_import" => {
                    let (Some(name), Some(alias)) = (
                        child.child_by_field_name("name"),
                        child.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    let target = join(&module, self.text(name));
                    let binding = self.text(alias).to_string();
                    self.aliases.insert(binding, target.clone());
                    self.imports.push(target);
                }
                "wildcard_import" => self.imports.push(module.clone()),
                _ => {}
            }
        }
    }

    /// Resolve `.sibling` / `..parent.mod` against the current package.
    fn resolve_python_module(&self, spec: &str) -> String {
        let level = spec.chars().take_while(|c| *c == '.').count();
        if level == 0 {
            return spec.to_string();
        }
        let rest = &spec[level..];
        let is_package_init = self.relative_path.ends_with("__init__.py");
        let mut package: Vec<&str> = self.module.split('.').collect();
        if !is_package_init {
            package.pop();
        }
        for _ in 1..level {
            package.pop();
        }
        join(&package.join("."), rest)
    }

    fn js_import(&mut self, node: Node<'_>) {
        let Some(source) = node.child_by_field_name("source") else {
            return;
        };
        let spec = self.text(source).trim_matches(|c| c == '"' || c == '\'' || c == '`');
        let target = self.resolve_js_module(spec);
        self.imports.push(target.clone());

        let mut cursor = node.walk();
        let clauses: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "import_clause")
            .collect();
        for clause in clauses {
            let mut clause_cursor = clause.walk();
            let parts: Vec<Node<'_>> = clause.named_children(&mut clause_cursor).collect();
            for part in parts {
                match part.kind() {
                    "identifier" => {
                        let name = self.text(part).to_string();
                        self.aliases.insert(name.clone(), join(&target, &name));
                    }
                    "namespace_import" => {
                        if let Some(ident) = find_descendant(part, "identifier") {
                            let binding = self.text(ident).to_string();
                            self.aliases.insert(binding, target.clone());
                        }
                    }
                    "named_imports" => {
                        let mut spec_cursor = part.walk();
                        let specifiers: Vec<Node<'_>> = part
                            .named_children(&mut spec_cursor)
                            .filter(|s| s.kind() == "import_specifier")
                            .collect();
                        for specifier in specifiers {
                            let Some(name) = specifier.child_by_field_name("name") else {
                                continue;
                            };
                            let name = self.text(name).to_string();
                            let binding = specifier
                                .child_by_field_name("alias")
                                .map(|a| self.text(a).to_string())
                                .unwrap_or_else(|| name.clone());
                            self.aliases.insert(binding, join(&target, &name));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// `./b` from `src/a.js` resolves to `src.b`; bare specifiers are dotted.
    fn resolve_js_module(&self, spec: &str) -> String {
        if !spec.starts_with('.') {
            return spec.trim_start_matches('@').replace('/', ".");
        }
        let mut segments: Vec<&str> = self.relative_path.split('/').collect();
        segments.pop();
        for part in spec.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        let joined = segments.join("/");
        let stem = match joined.rfind('.') {
            Some(dot) if dot > joined.rfind('/').map_or(0, |s| s + 1) => &joined[..dot],
            _ => joined.as_str(),
        };
        stem.replace('/', ".")
    }

    fn go_import(&mut self, node: Node<'_>) {
        let mut specs = Vec::new();
        collect_descendants(node, "import_spec", &mut specs);
        for spec in specs {
            let Some(path) = spec.child_by_field_name("path") else {
                continue;
            };
            let path = self.text(path).trim_matches('"').to_string();
            let target = path.replace('/', ".");
            let binding = spec
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(&path).to_string());
            if binding != "_" && binding != "." {
                self.aliases.insert(binding, target);
            }
            self.imports.push(path);
        }
    }

    fn rust_use(&mut self, node: Node<'_>, base: &str) {
        match node.kind() {
            "use_as_clause" => {
                let (Some(path), Some(alias)) = (
                    node.child_by_field_name("path"),
                    node.child_by_field_name("alias"),
                ) else {
                    return;
                };
                if let Some(path) = normalize_symbol(self.text(path)) {
                    let target = rust_path(base, &path);
                    let binding = self.text(alias).to_string();
                    self.aliases.insert(binding, target.clone());
                    self.imports.push(target);
                }
            }
            "scoped_use_list" => {
                let nested_base = node
                    .child_by_field_name("path")
                    .and_then(|p| normalize_symbol(self.text(p)))
                    .map(|p| rust_path(base, &p))
                    .unwrap_or_else(|| base.to_string());
                if let Some(list) = node.child_by_field_name("list") {
                    self.rust_use(list, &nested_base);
                }
            }
            "use_list" => {
                let mut cursor = node.walk();
                let items: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
                for item in items {
                    self.rust_use(item, base);
                }
            }
            "use_wildcard" => {
                let mut cursor = node.walk();
                let path = node
                    .named_children(&mut cursor)
                    .next()
                    .and_then(|p| normalize_symbol(self.text(p)));
                let target = match path {
                    Some(path) => rust_path(base, &path),
                    None => base.to_string(),
                };
                self.imports.push(target);
            }
            _ => {
                let Some(path) = normalize_symbol(self.text(node)) else {
                    return;
                };
                if path == "self" {
                    return;
                }
                let target = rust_path(base, &path);
                let binding = path.rsplit('.').next().unwrap_or(&path).to_string();
                self.aliases.insert(binding, target.clone());
                self.imports.push(target);
            }
        }
    }

    // ========================================================================
    // Finish
    // ========================================================================

    fn finish(self) -> ParsedFile {
        let local_names: HashMap<String, String> = self
            .drafts
            .iter()
            .filter_map(|d| {
                d.qualified_name
                    .strip_prefix(&format!("{}.", self.prefix))
                    .map(|local| (local.to_string(), d.qualified_name.clone()))
            })
            .collect();
        let defined: HashSet<&str> = self
            .drafts
            .iter()
            .map(|d| d.qualified_name.as_str())
            .collect();

        let resolver = Resolver {
            rules: self.rules,
            prefix: &self.prefix,
            aliases: &self.aliases,
            local_names: &local_names,
            defined: &defined,
        };

        let mut components = Vec::with_capacity(self.drafts.len() + 1);
        for (index, draft) in self.drafts.iter().enumerate() {
            let mut holes: Vec<Span> = self
                .drafts
                .iter()
                .filter(|d| d.parent == Some(index))
                .map(|d| d.range)
                .collect();
            holes.sort();
            components.push(ParsedComponent {
                qualified_name: draft.qualified_name.clone(),
                kind: draft.kind,
                parent: draft
                    .parent
                    .map(|p| self.drafts[p].qualified_name.clone()),
                spans: draft.range.subtract(&holes),
                referenced_symbols: resolver.resolve_all(
                    &draft.calls,
                    draft.self_type.as_deref(),
                    draft.self_alias.as_deref(),
                ),
            });
        }

        let mut top_level: Vec<Span> = self
            .drafts
            .iter()
            .filter(|d| d.parent.is_none())
            .map(|d| d.range)
            .collect();
        top_level.sort();
        components.push(ParsedComponent {
            qualified_name: self.module.clone(),
            kind: ComponentKind::Residual,
            parent: None,
            spans: Span::new(0, self.source.len()).subtract(&top_level),
            referenced_symbols: resolver.resolve_all(&self.residual_calls, None, None),
        });

        let called_symbols = dedup(
            self.drafts
                .iter()
                .flat_map(|d| d.calls.iter())
                .chain(self.residual_calls.iter())
                .cloned(),
        );
        let callable_symbols = self
            .drafts
            .iter()
            .filter(|d| d.kind.is_callable())
            .map(|d| d.qualified_name.clone())
            .collect();

        ParsedFile {
            relative_path: self.relative_path,
            module: self.module,
            text: self.source.to_string(),
            imports: dedup(self.imports.into_iter()),
            called_symbols,
            callable_symbols,
            components,
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolves raw callee text to qualified names using file-local knowledge.
struct Resolver<'a> {
    rules: &'static LanguageRules,
    prefix: &'a str,
    aliases: &'a HashMap<String, String>,
    local_names: &'a HashMap<String, String>,
    defined: &'a HashSet<&'a str>,
}

impl Resolver<'_> {
    fn resolve_all(
        &self,
        calls: &[String],
        self_type: Option<&str>,
        self_alias: Option<&str>,
    ) -> Vec<String> {
        dedup(
            calls
                .iter()
                .map(|c| self.resolve(c, self_type, self_alias)),
        )
    }

    fn resolve(&self, callee: &str, self_type: Option<&str>, self_alias: Option<&str>) -> String {
        let (head, rest) = match callee.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (callee, None),
        };

        if let (Some(owner), Some(rest)) = (self_type, rest) {
            if self.rules.self_names.contains(&head) || self_alias == Some(head) {
                return join(owner, rest);
            }
        }

        if let Some(qualified) = self.local_names.get(callee) {
            return qualified.clone();
        }

        if let Some(owner) = self_type {
            let member = join(owner, callee);
            if self.defined.contains(member.as_str()) {
                return member;
            }
        }

        if let Some(rest) = rest {
            if let Some(qualified) = self.local_names.get(head) {
                return join(qualified, rest);
            }
        }

        if let Some(target) = self.aliases.get(head) {
            return match rest {
                Some(rest) => join(target, rest),
                None => target.clone(),
            };
        }

        if self.rules.package_scoped && rest.is_none() && !self.rules.builtins.contains(&callee) {
            return join(self.prefix, callee);
        }

        callee.to_string()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn join(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}.{}", prefix, name),
    }
}

fn rust_path(base: &str, path: &str) -> String {
    let joined = join(base, path);
    for root in ["crate.", "self.", "super."] {
        if let Some(stripped) = joined.strip_prefix(root) {
            return stripped.to_string();
        }
    }
    joined
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}

fn is_identifier_kind(kind: &str) -> bool {
    kind.ends_with("identifier") || kind == "name" || kind == "constant"
}

/// Normalize symbol text to a dotted name: `a::b`, `a->b` and `a?.b` become
/// `a.b`, generic arguments are dropped. Returns `None` for anything that is
/// not a plain (possibly dotted) name.
pub(crate) fn normalize_symbol(raw: &str) -> Option<String> {
    let replaced = raw.replace("->", ".").replace("?.", ".");

    let mut stripped = String::with_capacity(replaced.len());
    let mut depth = 0usize;
    for c in replaced.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            c if c.is_whitespace() => {}
            c => stripped.push(c),
        }
    }

    let dotted = stripped.replace("::", ".");
    let trimmed = dotted.trim_start_matches(['&', '*', '@']).trim_matches('.');
    let segments: Vec<&str> = trimmed.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }
    let valid = segments.iter().all(|segment| {
        segment
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '~')
    });
    if !valid || segments == ["super"] {
        return None;
    }
    Some(segments.join("."))
}

fn declarator_name_node(node: Node<'_>, reject_functions: bool) -> Option<Node<'_>> {
    let mut current = node.child_by_field_name("declarator")?;
    for _ in 0..MAX_DECLARATOR_DEPTH {
        match current.kind() {
            "function_declarator" if reject_functions => return None,
            "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name"
            | "type_identifier" | "operator_name" => return Some(current),
            _ => {
                current = current
                    .child_by_field_name("declarator")
                    .or_else(|| current.named_child(0))?;
            }
        }
    }
    None
}

fn find_descendant<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children {
        if child.kind() == kind {
            return Some(child);
        }
        if let Some(found) = find_descendant(child, kind) {
            return Some(found);
        }
    }
    None
}

fn collect_descendants<'t>(node: Node<'t>, kind: &str, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children {
        if child.kind() == kind {
            out.push(child);
        } else {
            collect_descendants(child, kind, out);
        }
    }
}
