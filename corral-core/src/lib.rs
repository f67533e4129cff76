//! Corral Core
//!
//! Shared types for the corral offline cache & sync layer: request
//! descriptors, response snapshots, the network seam, and error types.

pub mod error;
pub mod fetcher;
pub mod request;
pub mod response;

pub use error::{CorralError, CorralResult};
pub use fetcher::Fetcher;
pub use request::{Method, RequestDescriptor, RequestKey};
pub use response::ResponseSnapshot;
