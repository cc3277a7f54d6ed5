//! Seasonal decomposition.

mod stl;

pub use stl::{STLResult, STL};
