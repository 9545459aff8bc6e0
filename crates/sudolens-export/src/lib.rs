//! sudolens-export: Pure serializers for solved boards (sans-IO).
//!
//! Renders the solver's answer as an SVG overlay sized to the
//! rectified grid.

pub mod svg;

pub use svg::{SvgMetadata, to_svg};
