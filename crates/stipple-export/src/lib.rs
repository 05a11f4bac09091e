//! stipple-export: Pure format serializers (sans-IO)
//!
//! Converts stipple paths into output formats. Currently supports SVG.

pub mod svg;

pub use svg::{SvgMetadata, SvgStyle, build_path_data, to_svg};
