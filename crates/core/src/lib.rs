//! Duofolio core: shared-finance records, their sync coordination, and the
//! partition's shared configuration.

pub mod config;
pub mod context;
pub mod errors;
pub mod limits;
pub mod records;
pub mod settings;
pub mod storage;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
