//! Client-side feeds that keep a local, viewer-aware copy of remote content.
//!
//! Each feed fetches the full list from a [`ContentStore`], merges the
//! viewer's like/save flags into it and exposes toggles that write to the
//! store and then patch local state optimistically. Remote failures are
//! logged and never rolled back; the next fetch reconciles.
//!
//! [`ContentStore`]: crate::infra::store::ContentStore

mod affirmations;
mod auth;
mod client;
mod posts;
mod session;
mod state;

pub use affirmations::AffirmationFeed;
pub use auth::AuthClient;
pub use client::{ApiClient, ApiError};
pub use posts::PostFeed;
pub use session::{Session, SessionChanges, SessionTokens, Viewer};

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}
