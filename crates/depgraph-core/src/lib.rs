//! depgraph core - repository dependency graphs with incremental updates
//!
//! This crate provides the graph construction engine:
//! - Tree-sitter based component extraction for multiple languages
//! - Content-addressed component identity
//! - Internal/external symbol linking
//! - Full builds and diff-driven incremental updates
//! - JSON and SQLite persistence, plus a petgraph query view
//! - A pipeline framework of declared-contract processing stages

pub mod builder;
pub mod extractor;
pub mod graph;
pub mod identity;
pub mod incremental;
pub mod linker;
pub mod model;
pub mod pipeline;
pub mod processors;
pub mod store;
pub mod vcs;

// Data model re-exports
pub use model::{
    content_hash, CodeGraph, Component, ComponentId, ComponentKind, ExternalId,
    ExternalSymbolTable, File, FileId, Span, GRAPH_SCHEMA_VERSION,
};

// Extraction re-exports
pub use extractor::{
    ComponentExtractor, ExtractError, ExtractorRegistry, FileExtractor, LanguageExtractor,
    SupportedLanguage, TreeSitterExtractor,
};

// Builder re-exports
pub use builder::{BuildOutput, BuildStats, BuilderConfig, BuilderError, GraphBuilder, LinkSeed};
pub use identity::IdentityAssigner;
pub use linker::{LinkStats, Linker};

// Incremental updater re-exports
pub use incremental::{
    classify, FileBucket, GraphUpdater, UpdateResult, UpdateStats, UpdaterConfig, UpdaterError,
};

// Version control re-exports
pub use vcs::{detect_snapshot_changes, ChangeSet, ChangeStatus, FileChange, GitRepository, VcsError};

// Persistence and query re-exports
pub use graph::{validate, GraphStats, PetDependencyGraph, ValidationIssue};
pub use store::{GraphDocument, GraphFormat, GraphStore, StoreError};

// Pipeline re-exports
pub use pipeline::{
    AsyncProcessor, AttrKey, AttrValue, AttributeRegistry, AttributeUpdates, Compose,
    ComposeState, Container, PipelineError, Processor, ProcessorSchema, RepoIdentity, StageError,
};
