//! Attribute → producer registry used for missing-attribute diagnostics.

use std::collections::BTreeMap;

use super::attribute::AttrKey;
use super::processor::ProcessorSchema;
use crate::processors::BUILTIN_SCHEMAS;

/// Which processors are known to produce each attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeRegistry {
    producers: BTreeMap<AttrKey, Vec<&'static str>>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in processors.
    pub fn with_builtin_processors() -> Self {
        let mut registry = Self::new();
        for schema in BUILTIN_SCHEMAS {
            registry.register(schema);
        }
        registry
    }

    pub fn register(&mut self, schema: &ProcessorSchema) {
        for key in schema.produces {
            let producers = self.producers.entry(*key).or_default();
            if !producers.contains(&schema.name) {
                producers.push(schema.name);
                producers.sort_unstable();
            }
        }
    }

    /// Processor names producing `key`, sorted.
    pub fn producers_of(&self, key: AttrKey) -> &[&'static str] {
        self.producers
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}
