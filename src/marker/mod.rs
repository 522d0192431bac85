//! Marker generation.
//!
//! Every marker image gets a pattern grid from the in-process codec
//! ([`pattern`]). When a natural-feature descriptor tool is configured and
//! reachable, it also runs first ([`descriptor`]); its output augments the
//! pattern, never replaces it.

pub mod descriptor;
pub mod pattern;

pub use descriptor::DescriptorTool;
pub use pattern::{encode, Pattern, GRID_SIZE, PATTERN_BLOCKS};
