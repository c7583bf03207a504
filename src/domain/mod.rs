//! Domain layer for binding conformance
//!
//! CDD Principle: Domain Model - Pure logic for describing binding classes and their violations
//! - `inventory` models the class registry the checks walk over
//! - `violations` models what a run produces
//! - Independent of how the inventory was loaded or how reports are rendered

pub mod inventory;
pub mod violations;

// Re-export main domain types for convenience
pub use inventory::*;
pub use violations::*;
