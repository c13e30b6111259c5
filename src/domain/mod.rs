//! Domain layer types and invariants.

pub mod content;
pub mod error;
pub mod feedback;
pub mod manifest;
pub mod variant;
