//! CLI command implementations.

pub mod export;
pub mod loaders;
pub mod probe;
pub mod processors;
