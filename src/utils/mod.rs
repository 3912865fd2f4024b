//! Utility helpers: the generational arena and pass timers for logging.

pub mod allocator;
pub mod logging;

pub use allocator::{Arena, ArenaKey, EntityId, GenerationalId};
