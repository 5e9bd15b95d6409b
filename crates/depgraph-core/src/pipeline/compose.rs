//! Sequential composition of pipeline stages.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::attribute::{AttrKey, AttributeUpdates};
use super::container::Container;
use super::processor::{AsyncProcessor, Processor, ProcessorSchema, StageError};
use super::registry::AttributeRegistry;

/// A required attribute that is absent, with the processors known to
/// produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAttribute {
    pub key: AttrKey,
    pub producers: Vec<&'static str>,
}

impl fmt::Display for MissingAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.producers.is_empty() {
            write!(f, "{} (no known producer)", self.key)
        } else {
            write!(f, "{} (produced by {})", self.key, self.producers.join(", "))
        }
    }
}

fn join_missing(missing: &[MissingAttribute]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stage `{stage}` is missing attributes: {}", join_missing(.missing))]
    MissingAttributes {
        stage: &'static str,
        missing: Vec<MissingAttribute>,
    },

    #[error("stage `{stage}` violated its contract: {reason}")]
    ContractViolation { stage: &'static str, reason: String },

    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: StageError,
    },

    #[error("stage `{stage}` did not complete: {reason}")]
    Join { stage: &'static str, reason: String },

    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Lifecycle of a [`Compose`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeState {
    Pending,
    /// Index of the stage currently running
    Running(usize),
    Done,
    /// Index of the stage that failed
    Failed(usize),
}

#[derive(Clone)]
enum Stage {
    Sync(Arc<dyn Processor>),
    Async(Arc<dyn AsyncProcessor>),
}

impl Stage {
    fn schema(&self) -> ProcessorSchema {
        match self {
            Stage::Sync(p) => p.schema(),
            Stage::Async(p) => p.schema(),
        }
    }
}

/// Runs an ordered list of processors against one container.
///
/// Stages run strictly one after another. Before each stage its required
/// attributes are checked; after it returns, its updates are checked against
/// its declared outputs and only then applied.
///
/// ## Usage
///
/// ```ignore
/// let mut pipeline = Compose::new()
///     .then(LocalRepository)
///     .then(BuildGraph::new(GraphBuilder::new()))
///     .then(SaveGraph::new(store));
/// pipeline.check(&[])?;
/// let container = pipeline.run(Container::new(repo)).await?;
/// ```
#[derive(Clone)]
pub struct Compose {
    stages: Vec<Stage>,
    registry: AttributeRegistry,
    state: ComposeState,
}

impl Default for Compose {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Compose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compose")
            .field("stages", &self.stage_names())
            .field("state", &self.state)
            .finish()
    }
}

impl Compose {
    /// Empty pipeline whose registry knows the built-in processors.
    pub fn new() -> Self {
        Self::with_registry(AttributeRegistry::with_builtin_processors())
    }

    pub fn with_registry(registry: AttributeRegistry) -> Self {
        Self {
            stages: Vec::new(),
            registry,
            state: ComposeState::Pending,
        }
    }

    /// Append a synchronous stage.
    pub fn then(mut self, processor: impl Processor + 'static) -> Self {
        self.registry.register(&processor.schema());
        self.stages.push(Stage::Sync(Arc::new(processor)));
        self
    }

    /// Append an asynchronous stage.
    pub fn then_async(mut self, processor: impl AsyncProcessor + 'static) -> Self {
        self.registry.register(&processor.schema());
        self.stages.push(Stage::Async(Arc::new(processor)));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.schema().name).collect()
    }

    pub fn state(&self) -> ComposeState {
        self.state
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// Check the declared data flow without running anything.
    ///
    /// `initial` lists the attributes the container will hold when the run
    /// starts.
    pub fn check(&self, initial: &[AttrKey]) -> Result<(), PipelineError> {
        let mut available: BTreeSet<AttrKey> = initial.iter().copied().collect();
        for stage in &self.stages {
            let schema = stage.schema();
            let missing = self.missing(&schema, |key| available.contains(&key));
            if !missing.is_empty() {
                return Err(PipelineError::MissingAttributes {
                    stage: schema.name,
                    missing,
                });
            }
            available.extend(schema.produces.iter().copied());
        }
        Ok(())
    }

    fn missing(
        &self,
        schema: &ProcessorSchema,
        present: impl Fn(AttrKey) -> bool,
    ) -> Vec<MissingAttribute> {
        schema
            .needs
            .iter()
            .filter(|key| !present(**key))
            .map(|key| MissingAttribute {
                key: *key,
                producers: self.registry.producers_of(*key).to_vec(),
            })
            .collect()
    }

    /// Run every stage in order, returning the final container.
    pub async fn run(&mut self, mut container: Container) -> Result<Container, PipelineError> {
        for (index, stage) in self.stages.clone().into_iter().enumerate() {
            self.state = ComposeState::Running(index);
            let schema = stage.schema();

            let missing = self.missing(&schema, |key| container.has(key));
            if !missing.is_empty() {
                self.state = ComposeState::Failed(index);
                return Err(PipelineError::MissingAttributes {
                    stage: schema.name,
                    missing,
                });
            }

            info!("Running stage {} ({}/{})", schema.name, index + 1, self.stages.len());

            let (returned, result) = match stage {
                Stage::Sync(processor) => {
                    let handle = tokio::task::spawn_blocking(move || {
                        let result = processor.apply(&container);
                        (container, result)
                    });
                    match handle.await {
                        Ok(pair) => pair,
                        Err(e) => {
                            self.state = ComposeState::Failed(index);
                            return Err(PipelineError::Join {
                                stage: schema.name,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                Stage::Async(processor) => {
                    let result = processor.apply(&container).await;
                    (container, result)
                }
            };
            container = returned;

            let updates = match result {
                Ok(updates) => updates,
                Err(source) => {
                    warn!("Stage {} failed: {}", schema.name, source);
                    self.state = ComposeState::Failed(index);
                    return Err(PipelineError::Stage {
                        stage: schema.name,
                        source,
                    });
                }
            };

            if let Err(e) = verify_updates(&schema, &updates) {
                self.state = ComposeState::Failed(index);
                return Err(e);
            }

            debug!(
                "Stage {} produced {:?}",
                schema.name,
                updates.keys().map(|k| k.as_str()).collect::<Vec<_>>()
            );
            container.apply(updates);
        }

        self.state = ComposeState::Done;
        Ok(container)
    }

    /// Run on a private current-thread runtime.
    pub fn run_blocking(&mut self, container: Container) -> Result<Container, PipelineError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(container))
    }
}

/// Updates must write exactly the declared outputs with matching value types.
fn verify_updates(
    schema: &ProcessorSchema,
    updates: &AttributeUpdates,
) -> Result<(), PipelineError> {
    for key in updates.keys() {
        if !schema.produces_key(key) {
            return Err(PipelineError::ContractViolation {
                stage: schema.name,
                reason: format!("returned undeclared attribute `{}`", key),
            });
        }
        if let Some(value) = updates.get(key) {
            if !key.accepts(value) {
                return Err(PipelineError::ContractViolation {
                    stage: schema.name,
                    reason: format!(
                        "attribute `{}` set to {} value",
                        key,
                        value.value_type()
                    ),
                });
            }
        }
    }
    for key in schema.produces {
        if !updates.contains(*key) {
            return Err(PipelineError::ContractViolation {
                stage: schema.name,
                reason: format!("declared attribute `{}` was not returned", key),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::attribute::AttrValue;
    use crate::pipeline::container::RepoIdentity;
    use async_trait::async_trait;

    const TAGS: AttrKey = AttrKey::Extra("tags");
    const COUNT: AttrKey = AttrKey::Extra("count");

    struct Tagger;

    impl Processor for Tagger {
        fn schema(&self) -> ProcessorSchema {
            ProcessorSchema::new("Tagger", &[], &[TAGS])
        }

        fn apply(&self, _container: &Container) -> Result<AttributeUpdates, StageError> {
            Ok(AttributeUpdates::new().set(TAGS, AttrValue::Json(serde_json::json!(["a", "b"]))))
        }
    }

    struct Counter;

    #[async_trait]
    impl AsyncProcessor for Counter {
        fn schema(&self) -> ProcessorSchema {
            ProcessorSchema::new("Counter", &[TAGS], &[COUNT])
        }

        async fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
            tokio::task::yield_now().await;
            let count = match container.get(TAGS) {
                Some(AttrValue::Json(serde_json::Value::Array(items))) => items.len(),
                _ => 0,
            };
            Ok(AttributeUpdates::new().set(COUNT, AttrValue::Json(count.into())))
        }
    }

    /// Returns nothing although it declares an output.
    struct Lazy;

    impl Processor for Lazy {
        fn schema(&self) -> ProcessorSchema {
            ProcessorSchema::new("Lazy", &[], &[TAGS])
        }

        fn apply(&self, _container: &Container) -> Result<AttributeUpdates, StageError> {
            Ok(AttributeUpdates::new())
        }
    }

    /// Writes an attribute it never declared.
    struct Sneaky;

    impl Processor for Sneaky {
        fn schema(&self) -> ProcessorSchema {
            ProcessorSchema::new("Sneaky", &[], &[])
        }

        fn apply(&self, _container: &Container) -> Result<AttributeUpdates, StageError> {
            Ok(AttributeUpdates::new().set(AttrKey::CommitHash, AttrValue::Text("x".into())))
        }
    }

    /// Declares a typed output and returns the wrong value type.
    struct Mistyped;

    impl Processor for Mistyped {
        fn schema(&self) -> ProcessorSchema {
            ProcessorSchema::new("Mistyped", &[], &[AttrKey::IsDownloaded])
        }

        fn apply(&self, _container: &Container) -> Result<AttributeUpdates, StageError> {
            Ok(AttributeUpdates::new().set(AttrKey::IsDownloaded, AttrValue::Text("yes".into())))
        }
    }

    struct Failing;

    impl Processor for Failing {
        fn schema(&self) -> ProcessorSchema {
            ProcessorSchema::new("Failing", &[], &[])
        }

        fn apply(&self, _container: &Container) -> Result<AttributeUpdates, StageError> {
            Err(StageError::Invalid("boom".into()))
        }
    }

    fn container() -> Container {
        Container::new(RepoIdentity::local("/tmp/repo", "/tmp/graph.json"))
    }

    #[tokio::test]
    async fn test_stages_thread_container() {
        let mut pipeline = Compose::new().then(Tagger).then_async(Counter);
        let out = pipeline.run(container()).await.unwrap();

        assert_eq!(out.get(COUNT), Some(&AttrValue::Json(2.into())));
        assert_eq!(pipeline.state(), ComposeState::Done);
    }

    #[tokio::test]
    async fn test_missing_attribute_names_producer() {
        let mut pipeline = Compose::new().then_async(Counter).then(Tagger);
        let err = pipeline.run(container()).await.unwrap_err();

        match err {
            PipelineError::MissingAttributes { stage, missing } => {
                assert_eq!(stage, "Counter");
                assert_eq!(
                    missing,
                    vec![MissingAttribute {
                        key: TAGS,
                        producers: vec!["Tagger"],
                    }]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pipeline.state(), ComposeState::Failed(0));
    }

    #[test]
    fn test_check_reports_files_producers() {
        let pipeline = Compose::new().then(crate::processors::FilterComponents::new(
            regex::Regex::new(".*").unwrap(),
        ));
        assert!(pipeline.check(&[AttrKey::Components]).is_ok());

        let err = pipeline.check(&[]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("FilterComponents"));
        assert!(message.contains("components (produced by BuildGraph"));
    }

    #[tokio::test]
    async fn test_contract_violations() {
        for (mut pipeline, stage) in [
            (Compose::new().then(Lazy), "Lazy"),
            (Compose::new().then(Sneaky), "Sneaky"),
            (Compose::new().then(Mistyped), "Mistyped"),
        ] {
            match pipeline.run(container()).await {
                Err(PipelineError::ContractViolation { stage: s, .. }) => assert_eq!(s, stage),
                other => panic!("expected contract violation, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_stage_failure_stops_pipeline() {
        let mut pipeline = Compose::new().then(Failing).then(Tagger);
        let err = pipeline.run(container()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Stage { stage: "Failing", .. }));
        assert_eq!(pipeline.state(), ComposeState::Failed(0));
    }

    #[test]
    fn test_run_blocking() {
        let mut pipeline = Compose::new().then(Tagger);
        let out = pipeline.run_blocking(container()).unwrap();
        assert!(out.has(TAGS));
    }
}
