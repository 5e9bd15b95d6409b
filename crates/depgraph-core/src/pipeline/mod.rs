//! Pipeline Framework
//!
//! An analysis run threads one [`Container`] through an ordered list of
//! stages. Each stage declares the attributes it needs and produces in a
//! [`ProcessorSchema`]; [`Compose`] enforces both sides of that contract:
//!
//! - before a stage runs, every needed attribute must be present, otherwise
//!   the run fails with the processors known to produce the missing ones;
//! - a stage reads the container by shared reference and returns
//!   [`AttributeUpdates`], which must contain exactly its declared outputs.
//!
//! Stages run sequentially. Asynchronous stages are awaited to completion
//! before the next stage starts.

pub mod attribute;
pub mod compose;
pub mod container;
pub mod processor;
pub mod registry;

pub use attribute::{AttrKey, AttrValue, AttributeUpdates, ValueType};
pub use compose::{Compose, ComposeState, MissingAttribute, PipelineError};
pub use container::{repo_name_from_url, AttributeError, Container, RepoIdentity};
pub use processor::{AsyncProcessor, Processor, ProcessorSchema, StageError};
pub use registry::AttributeRegistry;
