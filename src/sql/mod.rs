//! Safe SQL layer: filter specification, filter compiler, page counter, query execution.
//! Identifiers come from static definitions only; values are always parameters.

mod builder;
mod executor;
pub mod filter;
mod pagination;
pub mod params;
pub use builder::*;
pub use executor::*;
pub use filter::*;
pub use pagination::*;
pub use params::*;
