//! Classical geometric primitives the path solver builds candidates from.
//!
//! Each function takes a slice of positions and returns indices into it,
//! so the solver can map the result back onto its own point type.

mod delaunay;
mod tour;

pub use delaunay::triangulate;
pub use tour::{christofides, nearest_neighbor};
