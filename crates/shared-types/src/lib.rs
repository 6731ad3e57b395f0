//! # Shared Types Crate
//!
//! Domain entities shared by every subsystem of the node.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: cross-subsystem types are defined here.
//! - **Read-only descriptors**: epoch descriptors are produced by the protocol
//!   state and never mutated by their consumers.

pub mod entities;
pub mod epoch;

pub use entities::*;
pub use epoch::*;
