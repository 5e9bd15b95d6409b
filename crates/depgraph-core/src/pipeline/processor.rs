//! Processor traits and their declared data-flow schemas.

use async_trait::async_trait;
use thiserror::Error;

use super::attribute::{AttrKey, AttributeUpdates};
use super::container::{AttributeError, Container};
use crate::builder::BuilderError;
use crate::incremental::UpdaterError;
use crate::store::StoreError;
use crate::vcs::VcsError;

/// Inputs and outputs a processor declares ahead of execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSchema {
    pub name: &'static str,
    /// Attributes that must be present before the stage runs
    pub needs: &'static [AttrKey],
    /// Attributes read only when present
    pub optional: &'static [AttrKey],
    /// Attributes the stage returns, every one of them on success
    pub produces: &'static [AttrKey],
}

impl ProcessorSchema {
    pub const fn new(
        name: &'static str,
        needs: &'static [AttrKey],
        produces: &'static [AttrKey],
    ) -> Self {
        Self {
            name,
            needs,
            optional: &[],
            produces,
        }
    }

    pub const fn with_optional(mut self, optional: &'static [AttrKey]) -> Self {
        self.optional = optional;
        self
    }

    pub fn produces_key(&self, key: AttrKey) -> bool {
        self.produces.contains(&key)
    }
}

/// Errors raised inside a stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error("build failed: {0}")]
    Builder(#[from] BuilderError),

    #[error("update failed: {0}")]
    Updater(#[from] UpdaterError),

    #[error("version control failed: {0}")]
    Vcs(#[from] VcsError),

    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),
}

/// A synchronous pipeline stage.
///
/// `apply` reads the container and returns the attributes it produces; it
/// never writes to the container itself.
pub trait Processor: Send + Sync {
    fn schema(&self) -> ProcessorSchema;

    fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError>;
}

/// A pipeline stage that suspends, e.g. on network or subprocess IO.
#[async_trait]
pub trait AsyncProcessor: Send + Sync {
    fn schema(&self) -> ProcessorSchema;

    async fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError>;
}
