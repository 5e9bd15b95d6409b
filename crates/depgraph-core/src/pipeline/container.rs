//! The analysis container threaded through a pipeline run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::attribute::{AttrKey, AttrValue, AttributeUpdates, ValueType};
use crate::model::{CodeGraph, Component, ExternalSymbolTable, File};
use crate::vcs::ChangeSet;

/// Errors reading container attributes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttributeError {
    #[error("attribute `{0}` is not set")]
    Missing(AttrKey),

    #[error("attribute `{key}` holds {found}, expected {expected}")]
    WrongType {
        key: AttrKey,
        expected: ValueType,
        found: ValueType,
    },
}

/// Where a repository comes from and where its graph goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    pub name: String,
    /// Working tree
    pub path: PathBuf,
    /// Graph destination
    pub persist_path: PathBuf,
    /// Remote to clone from, if the working tree is fetched
    pub url: Option<String>,
}

impl RepoIdentity {
    /// Identity of an existing local working tree, named after its directory.
    pub fn local(path: impl Into<PathBuf>, persist_path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            path,
            persist_path: persist_path.into(),
            url: None,
        }
    }

    /// Identity of a remote repository cloned into `path`.
    pub fn remote(
        url: impl Into<String>,
        path: impl Into<PathBuf>,
        persist_path: impl Into<PathBuf>,
    ) -> Self {
        let url = url.into();
        let name = repo_name_from_url(&url);
        Self {
            name,
            path: path.into(),
            persist_path: persist_path.into(),
            url: Some(url),
        }
    }
}

/// Last path segment of a clone URL without `.git`.
pub fn repo_name_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed);
    last.trim_end_matches(".git").to_string()
}

/// Shared state of one pipeline run.
///
/// Stages read it through `&Container` and return [`AttributeUpdates`]; only
/// the pipeline applies them.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    repo: RepoIdentity,
    attrs: BTreeMap<AttrKey, AttrValue>,
}

impl Container {
    pub fn new(repo: RepoIdentity) -> Self {
        Self {
            repo,
            attrs: BTreeMap::new(),
        }
    }

    /// Seed an attribute before the run starts.
    pub fn with_attribute(mut self, key: AttrKey, value: AttrValue) -> Self {
        self.attrs.insert(key, value);
        self
    }

    pub fn repo(&self) -> &RepoIdentity {
        &self.repo
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo.path
    }

    pub fn has(&self, key: AttrKey) -> bool {
        self.attrs.contains_key(&key)
    }

    pub fn get(&self, key: AttrKey) -> Option<&AttrValue> {
        self.attrs.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = AttrKey> + '_ {
        self.attrs.keys().copied()
    }

    pub(crate) fn apply(&mut self, updates: AttributeUpdates) {
        for (key, value) in updates {
            self.attrs.insert(key, value);
        }
    }

    fn require(&self, key: AttrKey) -> Result<&AttrValue, AttributeError> {
        self.attrs.get(&key).ok_or(AttributeError::Missing(key))
    }

    fn wrong_type(key: AttrKey, expected: ValueType, found: &AttrValue) -> AttributeError {
        AttributeError::WrongType {
            key,
            expected,
            found: found.value_type(),
        }
    }

    pub fn components(&self) -> Result<&[Component], AttributeError> {
        match self.require(AttrKey::Components)? {
            AttrValue::Components(components) => Ok(components),
            other => Err(Self::wrong_type(AttrKey::Components, ValueType::Components, other)),
        }
    }

    pub fn files(&self) -> Result<&[File], AttributeError> {
        match self.require(AttrKey::Files)? {
            AttrValue::Files(files) => Ok(files),
            other => Err(Self::wrong_type(AttrKey::Files, ValueType::Files, other)),
        }
    }

    pub fn external_symbols(&self) -> Result<&ExternalSymbolTable, AttributeError> {
        match self.require(AttrKey::ExternalSymbols)? {
            AttrValue::ExternalSymbols(table) => Ok(table),
            other => Err(Self::wrong_type(
                AttrKey::ExternalSymbols,
                ValueType::ExternalSymbols,
                other,
            )),
        }
    }

    pub fn changes(&self) -> Result<&ChangeSet, AttributeError> {
        match self.require(AttrKey::Changes)? {
            AttrValue::Changes(changes) => Ok(changes),
            other => Err(Self::wrong_type(AttrKey::Changes, ValueType::Changes, other)),
        }
    }

    pub fn text(&self, key: AttrKey) -> Result<&str, AttributeError> {
        match self.require(key)? {
            AttrValue::Text(text) => Ok(text),
            other => Err(Self::wrong_type(key, ValueType::Text, other)),
        }
    }

    pub fn optional_text(&self, key: AttrKey) -> Result<Option<&str>, AttributeError> {
        match self.require(key)? {
            AttrValue::OptionalText(text) => Ok(text.as_deref()),
            AttrValue::Text(text) => Ok(Some(text)),
            other => Err(Self::wrong_type(key, ValueType::OptionalText, other)),
        }
    }

    pub fn flag(&self, key: AttrKey) -> Result<bool, AttributeError> {
        match self.require(key)? {
            AttrValue::Flag(flag) => Ok(*flag),
            other => Err(Self::wrong_type(key, ValueType::Flag, other)),
        }
    }

    pub fn path(&self, key: AttrKey) -> Result<&Path, AttributeError> {
        match self.require(key)? {
            AttrValue::Path(path) => Ok(path),
            other => Err(Self::wrong_type(key, ValueType::Path, other)),
        }
    }

    /// Copy of the graph held in the components, files and external symbol
    /// attributes.
    pub fn code_graph(&self) -> Result<CodeGraph, AttributeError> {
        Ok(CodeGraph::new(
            self.components()?.to_vec(),
            self.files()?.to_vec(),
            self.external_symbols()?.clone(),
        ))
    }
}
