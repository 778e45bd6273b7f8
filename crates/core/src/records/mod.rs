//! Record domain models.

mod domains;
mod model;

pub use domains::*;
pub use model::*;
