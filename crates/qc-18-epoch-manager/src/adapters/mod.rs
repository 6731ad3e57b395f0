//! Adapters layer (Hexagonal Architecture)

mod event_bus;
mod height_events;
mod transaction_pools;

pub use event_bus::*;
pub use height_events::*;
pub use transaction_pools::*;
