//! Container attributes: a closed key enum plus a tagged union of values.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::model::{CodeGraph, Component, ExternalSymbolTable, File};
use crate::vcs::ChangeSet;

/// Name of a container attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrKey {
    Components,
    Files,
    ExternalSymbols,
    Changes,
    /// HEAD of the working tree; unset outside git
    CommitHash,
    /// Commit the stored graph was built at, if it was recorded
    PreviousCommitHash,
    Author,
    /// Whether the working tree was fetched by this run
    IsDownloaded,
    PersistedPath,
    /// Extension point for attributes defined outside this crate
    Extra(&'static str),
}

impl AttrKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKey::Components => "components",
            AttrKey::Files => "files",
            AttrKey::ExternalSymbols => "external_symbols",
            AttrKey::Changes => "changes",
            AttrKey::CommitHash => "commit_hash",
            AttrKey::PreviousCommitHash => "previous_commit_hash",
            AttrKey::Author => "author",
            AttrKey::IsDownloaded => "is_downloaded",
            AttrKey::PersistedPath => "persisted_path",
            AttrKey::Extra(name) => name,
        }
    }

    /// Value type stored under this key; `None` accepts any value.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            AttrKey::Components => Some(ValueType::Components),
            AttrKey::Files => Some(ValueType::Files),
            AttrKey::ExternalSymbols => Some(ValueType::ExternalSymbols),
            AttrKey::Changes => Some(ValueType::Changes),
            AttrKey::CommitHash | AttrKey::PreviousCommitHash | AttrKey::Author => {
                Some(ValueType::OptionalText)
            }
            AttrKey::IsDownloaded => Some(ValueType::Flag),
            AttrKey::PersistedPath => Some(ValueType::Path),
            AttrKey::Extra(_) => None,
        }
    }

    pub fn accepts(&self, value: &AttrValue) -> bool {
        self.value_type()
            .map_or(true, |expected| expected == value.value_type())
    }
}

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of [`AttrValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Components,
    Files,
    ExternalSymbols,
    Changes,
    Text,
    OptionalText,
    Flag,
    Path,
    Json,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Components => "components",
            ValueType::Files => "files",
            ValueType::ExternalSymbols => "external symbols",
            ValueType::Changes => "changes",
            ValueType::Text => "text",
            ValueType::OptionalText => "optional text",
            ValueType::Flag => "flag",
            ValueType::Path => "path",
            ValueType::Json => "json",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a container attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Components(Vec<Component>),
    Files(Vec<File>),
    ExternalSymbols(ExternalSymbolTable),
    Changes(ChangeSet),
    Text(String),
    OptionalText(Option<String>),
    Flag(bool),
    Path(PathBuf),
    Json(serde_json::Value),
}

impl AttrValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            AttrValue::Components(_) => ValueType::Components,
            AttrValue::Files(_) => ValueType::Files,
            AttrValue::ExternalSymbols(_) => ValueType::ExternalSymbols,
            AttrValue::Changes(_) => ValueType::Changes,
            AttrValue::Text(_) => ValueType::Text,
            AttrValue::OptionalText(_) => ValueType::OptionalText,
            AttrValue::Flag(_) => ValueType::Flag,
            AttrValue::Path(_) => ValueType::Path,
            AttrValue::Json(_) => ValueType::Json,
        }
    }
}

/// Attribute writes returned by a stage and applied by the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeUpdates {
    entries: BTreeMap<AttrKey, AttrValue>,
}

impl AttributeUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, key: AttrKey, value: AttrValue) -> Self {
        self.entries.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: AttrKey, value: AttrValue) {
        self.entries.insert(key, value);
    }

    /// Updates writing the three graph attributes.
    pub fn from_graph(graph: CodeGraph) -> Self {
        Self::new()
            .set(AttrKey::Components, AttrValue::Components(graph.components))
            .set(AttrKey::Files, AttrValue::Files(graph.files))
            .set(
                AttrKey::ExternalSymbols,
                AttrValue::ExternalSymbols(graph.external_symbols),
            )
    }

    pub fn get(&self, key: AttrKey) -> Option<&AttrValue> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: AttrKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = AttrKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for AttributeUpdates {
    type Item = (AttrKey, AttrValue);
    type IntoIter = std::collections::btree_map::IntoIter<AttrKey, AttrValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
