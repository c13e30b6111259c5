//! Application services: variant resolution, content routing, feedback, and the edge pipeline.

pub mod collaborators;
pub mod content;
pub mod edge;
pub mod error;
pub mod feedback;
pub mod personalize;
pub mod variant;
