//! Document-structure builders: destinations, outlines, name trees.

pub mod destination;
pub mod names;
pub mod outline;

pub use destination::{Destination, FitStyle};
pub use outline::OutlineStyle;
