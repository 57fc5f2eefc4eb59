//! Atom model - the universal unit of fact and signal.
//!
//! - **key**: structured, colon-delimited atom ids
//! - **atom**: the atom itself, its origin, kind and provenance trace
//! - **set**: id-indexed collections with fallback lookups
//! - **merge**: stage-barrier and precedence merges
//! - **validate**: invariant checks and repairs

mod atom;
mod key;
mod merge;
mod set;
mod validate;

pub use atom::*;
pub use key::*;
pub use merge::*;
pub use set::*;
pub use validate::*;
