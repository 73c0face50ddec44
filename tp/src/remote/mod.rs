//! Travel server client module
//!
//! Provides the TravelApi trait, its HTTP implementation, and session
//! handling for authenticated requests.

use std::sync::Arc;

use tracing::debug;

pub mod api;
mod error;
mod http;
mod session;

pub use api::{ChatReply, CreatedItinerary, TravelApi, UpdatedItinerary};
pub use error::RemoteError;
pub use http::{HttpTravelApi, login};
pub use session::{AuthSession, SessionContext, UserProfile};

use crate::config::RemoteConfig;

/// Create an authenticated API client from configuration
pub fn create_api(config: &RemoteConfig, session: SessionContext) -> Result<Arc<dyn TravelApi>, RemoteError> {
    debug!(base_url = %config.base_url, "create_api: called");
    Ok(Arc::new(HttpTravelApi::from_config(config, session)?))
}
