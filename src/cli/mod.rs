pub mod browse;
pub mod commands;
pub mod handlers;
pub mod output;

pub use browse::BrowseRepl;
pub use commands::*;
pub use handlers::*;
pub use output::*;
