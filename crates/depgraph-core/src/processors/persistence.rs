//! Stages that load and save the graph at the repository's persistence path.

use crate::pipeline::{
    AttrKey, AttrValue, AttributeUpdates, Container, Processor, ProcessorSchema, StageError,
};
use crate::store::{GraphDocument, GraphFormat, GraphStore};

fn store_for(container: &Container, format: Option<GraphFormat>) -> GraphStore {
    let path = container.repo().persist_path.clone();
    match format {
        Some(format) => GraphStore::new(path, format),
        None => GraphStore::from_path(path),
    }
}

/// Loads the stored graph and the commit it was built at.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadGraph {
    format: Option<GraphFormat>,
}

impl LoadGraph {
    pub const SCHEMA: ProcessorSchema = ProcessorSchema::new(
        "LoadGraph",
        &[],
        &[
            AttrKey::Components,
            AttrKey::Files,
            AttrKey::ExternalSymbols,
            AttrKey::PreviousCommitHash,
        ],
    );

    /// Format inferred from the persistence path's extension.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(format: GraphFormat) -> Self {
        Self {
            format: Some(format),
        }
    }
}

impl Processor for LoadGraph {
    fn schema(&self) -> ProcessorSchema {
        Self::SCHEMA
    }

    fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
        let document = store_for(container, self.format).load()?;
        let commit = document.commit_hash.clone();
        Ok(AttributeUpdates::from_graph(document.into_graph())
            .set(AttrKey::PreviousCommitHash, AttrValue::OptionalText(commit)))
    }
}

/// Saves the graph, recording the HEAD commit when it is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveGraph {
    format: Option<GraphFormat>,
}

impl SaveGraph {
    pub const SCHEMA: ProcessorSchema = ProcessorSchema::new(
        "SaveGraph",
        &[AttrKey::Components, AttrKey::Files, AttrKey::ExternalSymbols],
        &[AttrKey::PersistedPath],
    )
    .with_optional(&[AttrKey::CommitHash]);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(format: GraphFormat) -> Self {
        Self {
            format: Some(format),
        }
    }
}

impl Processor for SaveGraph {
    fn schema(&self) -> ProcessorSchema {
        Self::SCHEMA
    }

    fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
        let commit = if container.has(AttrKey::CommitHash) {
            container
                .optional_text(AttrKey::CommitHash)?
                .map(str::to_string)
        } else {
            None
        };
        let repo = container.repo();
        let repository = repo.url.clone().unwrap_or_else(|| repo.name.clone());

        let document = GraphDocument::new(container.code_graph()?)
            .with_repository(repository)
            .with_commit_hash(commit);
        let store = store_for(container, self.format);
        store.save(&document)?;

        Ok(AttributeUpdates::new().set(
            AttrKey::PersistedPath,
            AttrValue::Path(store.path().to_path_buf()),
        ))
    }
}
