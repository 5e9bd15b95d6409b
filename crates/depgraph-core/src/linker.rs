//! Internal/External Linker
//!
//! Resolves each component's referenced symbols against the table of known
//! qualified names. A hit becomes an internal link; a miss becomes an edge to
//! the external symbol table, minting a new external id only for names the
//! table has not seen before.
//!
//! Resolution is exact string matching on qualified names. A component never
//! links to itself.

use std::collections::HashMap;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::model::{Component, ComponentId, ExternalSymbolTable};

/// Link counts for one linking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub internal_links: usize,
    pub external_links: usize,
    /// External names that were not in the table before this pass
    pub new_external_symbols: usize,
}

impl AddAssign for LinkStats {
    fn add_assign(&mut self, other: Self) {
        self.internal_links += other.internal_links;
        self.external_links += other.external_links;
        self.new_external_symbols += other.new_external_symbols;
    }
}

/// Links components using a qualified-name table.
#[derive(Debug, Clone, Copy)]
pub struct Linker<'a> {
    known: &'a HashMap<String, ComponentId>,
}

impl<'a> Linker<'a> {
    pub fn new(known: &'a HashMap<String, ComponentId>) -> Self {
        Self { known }
    }

    /// Recompute the links of one component from its referenced symbols.
    pub fn link(&self, component: &mut Component, table: &mut ExternalSymbolTable) -> LinkStats {
        let mut stats = LinkStats::default();
        component.linked_component_ids.clear();
        component.external_component_ids.clear();

        for symbol in &component.referenced_symbols {
            match self.known.get(symbol) {
                Some(target) if *target == component.id => {}
                Some(target) => {
                    if !component.linked_component_ids.contains(target) {
                        component.linked_component_ids.push(target.clone());
                        stats.internal_links += 1;
                    }
                }
                None => {
                    if !table.contains(symbol) {
                        stats.new_external_symbols += 1;
                    }
                    let external = table.get_or_mint(symbol);
                    if !component.external_component_ids.contains(&external) {
                        component.external_component_ids.push(external);
                        stats.external_links += 1;
                    }
                }
            }
        }

        stats
    }

    /// Link every component in order.
    pub fn link_all(
        &self,
        components: &mut [Component],
        table: &mut ExternalSymbolTable,
    ) -> LinkStats {
        let mut stats = LinkStats::default();
        for component in components.iter_mut() {
            stats += self.link(component, table);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComponentKind, FileId};

    fn component(name: &str, refs: &[&str]) -> Component {
        Component {
            id: ComponentId::from_content(name, ""),
            qualified_name: name.to_string(),
            code_text: String::new(),
            kind: ComponentKind::Function,
            file_id: FileId::new("f"),
            parent_id: None,
            spans: vec![],
            linked_component_ids: vec![],
            external_component_ids: vec![],
            referenced_symbols: refs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_internal_and_external_links() {
        let mut components = vec![
            component("a.foo", &["b.bar", "print"]),
            component("b.bar", &["print"]),
        ];
        let known: HashMap<String, ComponentId> = components
            .iter()
            .map(|c| (c.qualified_name.clone(), c.id.clone()))
            .collect();
        let mut table = ExternalSymbolTable::new();

        let stats = Linker::new(&known).link_all(&mut components, &mut table);

        assert_eq!(components[0].linked_component_ids, vec![components[1].id.clone()]);
        assert_eq!(table.len(), 1);
        let print = table.get("print").unwrap().clone();
        assert_eq!(components[0].external_component_ids, vec![print.clone()]);
        assert_eq!(components[1].external_component_ids, vec![print]);
        assert_eq!(
            stats,
            LinkStats {
                internal_links: 1,
                external_links: 2,
                new_external_symbols: 1,
            }
        );
    }

    #[test]
    fn test_never_links_to_self() {
        let mut components = vec![component("m.rec", &["m.rec"])];
        let known: HashMap<String, ComponentId> =
            [("m.rec".to_string(), components[0].id.clone())].into();
        let mut table = ExternalSymbolTable::new();

        Linker::new(&known).link_all(&mut components, &mut table);

        assert!(components[0].linked_component_ids.is_empty());
        assert!(components[0].external_component_ids.is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_existing_external_ids_are_reused() {
        let mut table = ExternalSymbolTable::new();
        let existing = table.get_or_mint("os.path.join");

        let mut components = vec![component("m.f", &["os.path.join", "os.path.join"])];
        let known = HashMap::new();
        let stats = Linker::new(&known).link_all(&mut components, &mut table);

        assert_eq!(components[0].external_component_ids, vec![existing]);
        assert_eq!(stats.new_external_symbols, 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_relink_replaces_stale_links() {
        let mut c = component("m.f", &["m.g"]);
        c.linked_component_ids.push(ComponentId::new("gone"));
        let known: HashMap<String, ComponentId> =
            [("m.g".to_string(), ComponentId::new("g"))].into();
        let mut table = ExternalSymbolTable::new();

        Linker::new(&known).link(&mut c, &mut table);
        assert_eq!(c.linked_component_ids, vec![ComponentId::new("g")]);
    }
}
