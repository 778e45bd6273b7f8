//! Shared configuration for the partition.

mod model;
mod store;

pub use model::*;
pub use store::*;
