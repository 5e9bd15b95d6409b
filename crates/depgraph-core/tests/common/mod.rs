//! Shared test utilities for depgraph-core integration tests.

#![allow(dead_code)]

pub mod graph_validator;
pub mod test_repos;

pub use graph_validator::*;
pub use test_repos::*;
