//! Record sync: change-feed models, reconciliation, and the per-collection coordinator.

mod coordinator;
mod model;
mod ports;
mod reconcile;

pub use coordinator::*;
pub use model::*;
pub use ports::*;
pub use reconcile::*;
