//! Client for the remote work tracker and its OAuth2 token broker.
//!
//! The tracker is consumed as an opaque JSON asset service: kind-scoped
//! queries with equality and OR-joined filters, field selection, object
//! creation, and buffered field updates that only take effect on commit.

mod tracker_error;
mod tracker_oauth;
mod tracker_session;

pub use tracker_error::TrackerError;
pub use tracker_oauth::{OauthBroker, OauthBrokerConfig, TokenGrant};
pub use tracker_session::{Asset, AssetQuery, Filter, TrackerAuth, TrackerSession};
