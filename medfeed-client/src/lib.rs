//! medfeed-client library interface
//!
//! Backend API client, the feed enrichment pipeline and the feed session
//! that ties them together. The `medfeed` binary is a thin CLI over this.

pub mod enrichment;
pub mod error;
pub mod services;
pub mod session;

pub use crate::error::{ClientError, ClientResult};
pub use crate::services::ApiClient;
pub use crate::session::{FeedBackend, FeedSession, LoadedFeed};
