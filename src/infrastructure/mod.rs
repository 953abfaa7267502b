pub mod auth;
pub mod config;
pub mod logging;
pub mod remote;
pub mod store;

pub use auth::{Authorizer, ConfigAuthorizer};
pub use config::*;
pub use remote::*;
pub use store::{DaemonFileStore, DestinationStore, StoreError};
