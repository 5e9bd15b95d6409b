//! Component Identity Assignment
//!
//! Identity is assigned in two phases. While files are being extracted every
//! component receives a random provisional id, which lets parent references
//! be recorded before any code text is known. Once each component's code text
//! has been assembled, the provisional id is replaced by the content hash of
//! `qualified_name` and `code_text`, and every reference to the provisional
//! id (parent links and the name table) is rewritten to the final id.
//!
//! Components that end up with the same final id are exact duplicates (same
//! name, same code) and are kept once.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use tracing::debug;

use crate::model::{Component, ComponentId, ComponentKind, FileId, Span};

/// A component descriptor carrying its provisional id.
#[derive(Debug, Clone)]
pub struct ProvisionalComponent {
    pub id: ComponentId,
    /// Index into the file list of the current build pass
    pub file_index: usize,
    pub qualified_name: String,
    pub kind: ComponentKind,
    /// Qualified name of the enclosing component in the same file
    pub parent: Option<String>,
}

/// A provisional component whose code and references have been extracted.
#[derive(Debug, Clone)]
pub struct AssembledComponent {
    pub provisional: ProvisionalComponent,
    pub code_text: String,
    pub spans: Vec<Span>,
    pub referenced_symbols: Vec<String>,
}

/// Result of finalizing identities for one build pass.
#[derive(Debug, Default)]
pub struct FinalizedComponents {
    pub components: Vec<Component>,
    /// Qualified name to final id; later definitions win
    pub name_table: HashMap<String, ComponentId>,
    /// Exact duplicates dropped
    pub duplicates: usize,
}

/// Hands out provisional ids and converts them to content-addressed ids.
#[derive(Debug, Default)]
pub struct IdentityAssigner {
    by_file_and_name: HashMap<(usize, String), ComponentId>,
}

impl IdentityAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component and mint its provisional id.
    pub fn provisional(
        &mut self,
        file_index: usize,
        qualified_name: impl Into<String>,
        kind: ComponentKind,
        parent: Option<String>,
    ) -> ProvisionalComponent {
        let qualified_name = qualified_name.into();
        let id = ComponentId::provisional();
        self.by_file_and_name
            .insert((file_index, qualified_name.clone()), id.clone());
        ProvisionalComponent {
            id,
            file_index,
            qualified_name,
            kind,
            parent,
        }
    }

    /// Number of provisional ids handed out.
    pub fn len(&self) -> usize {
        self.by_file_and_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file_and_name.is_empty()
    }

    /// Replace provisional ids with content hashes and build final components.
    ///
    /// `file_ids[i]` is the id of the file with index `i`. Components whose
    /// file index is out of range are dropped. Parents that were never
    /// assembled (their extraction failed) leave `parent_id` unset.
    pub fn finalize(
        self,
        assembled: Vec<AssembledComponent>,
        file_ids: &[FileId],
    ) -> FinalizedComponents {
        let final_ids: Vec<ComponentId> = assembled
            .par_iter()
            .map(|a| ComponentId::from_content(&a.provisional.qualified_name, &a.code_text))
            .collect();

        let remap: HashMap<&ComponentId, &ComponentId> = assembled
            .iter()
            .zip(final_ids.iter())
            .map(|(a, id)| (&a.provisional.id, id))
            .collect();

        let mut result = FinalizedComponents::default();
        let mut seen: HashSet<ComponentId> = HashSet::new();

        for (component, id) in assembled.iter().zip(final_ids.iter()) {
            let provisional = &component.provisional;
            let Some(file_id) = file_ids.get(provisional.file_index) else {
                debug!(
                    "Dropping {}: unknown file index {}",
                    provisional.qualified_name, provisional.file_index
                );
                continue;
            };

            let parent_id = provisional
                .parent
                .as_ref()
                .and_then(|name| {
                    self.by_file_and_name
                        .get(&(provisional.file_index, name.clone()))
                })
                .and_then(|pid| remap.get(pid))
                .map(|id| (*id).clone());

            result
                .name_table
                .insert(provisional.qualified_name.clone(), id.clone());

            if !seen.insert(id.clone()) {
                debug!("Duplicate component {} ({})", provisional.qualified_name, id);
                result.duplicates += 1;
                continue;
            }

            result.components.push(Component {
                id: id.clone(),
                qualified_name: provisional.qualified_name.clone(),
                code_text: component.code_text.clone(),
                kind: provisional.kind,
                file_id: file_id.clone(),
                parent_id,
                spans: component.spans.clone(),
                linked_component_ids: Vec::new(),
                external_component_ids: Vec::new(),
                referenced_symbols: component.referenced_symbols.clone(),
            });
        }

        result
    }
}
