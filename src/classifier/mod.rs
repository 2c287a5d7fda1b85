//! Response classification.
//!
//! - `marker`: trailing `._<tag>` markers and their typed arguments
//! - `response`: classification of a full reply into content and widget

pub mod marker;
pub mod response;

pub use marker::{Marker, MarkerMatch, MarkerParser};
pub use response::{ClassifiedResponse, ResponseClassifier};
