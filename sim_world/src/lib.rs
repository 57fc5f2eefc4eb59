//! # Sim World
//!
//! The world snapshot contract consumed by the mind core. This crate holds
//! agents, their bodies and traits, the map, the event log, the relationship
//! graph and scene controls. It contains no inference logic.
//!
//! Every field is optional in spirit: a snapshot with no map, no events or no
//! relationships is valid and simply produces fewer facts downstream.

pub mod entities;
pub mod error;
pub mod mechanics;
pub mod world_state;

pub use entities::*;
pub use error::*;
pub use mechanics::*;
pub use world_state::*;
