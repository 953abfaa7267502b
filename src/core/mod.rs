pub mod aggregator;
pub mod catalog;
pub mod constants;
pub mod filter;
pub mod model;
pub mod session;

pub use aggregator::{AggregatedPage, Aggregator};
pub use constants::*;
pub use filter::VersionFilters;
pub use model::*;
pub use session::*;
