use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::affirmation::{Affirmation, NewAffirmation};
use crate::domain::engagement::LikeOutcome;
use crate::domain::post::{NewPost, Post};
use crate::domain::profile::{Profile, ProfileStats, ProfileUpdate};

/// Table-style access to feed content.
///
/// Listing calls return records without viewer flags; callers merge those
/// from the membership queries. `set_*` calls are atomic: the join record
/// and the denormalized counter move together or not at all.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// All affirmations, newest first, with author display data joined.
    async fn list_affirmations(&self) -> Result<Vec<Affirmation>>;

    /// The subset of `ids` liked by `user_id`.
    async fn liked_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>>;

    /// The subset of `ids` saved by `user_id`.
    async fn saved_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>>;

    /// Returns `None` when the affirmation does not exist.
    async fn set_affirmation_like(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>>;

    /// Returns whether the saved relation changed, `None` when the
    /// affirmation does not exist.
    async fn set_affirmation_saved(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        saved: bool,
    ) -> Result<Option<bool>>;

    async fn insert_affirmation(&self, new: NewAffirmation) -> Result<Affirmation>;

    /// Affirmations saved by `user_id`, most recently saved first.
    async fn list_saved_affirmations(&self, user_id: Uuid) -> Result<Vec<Affirmation>>;

    async fn list_posts(&self) -> Result<Vec<Post>>;

    async fn liked_post_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>>;

    async fn set_post_like(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>>;

    async fn insert_post(&self, new: NewPost) -> Result<Post>;
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: Uuid,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

/// Identifies a stored refresh token by the claims it was issued with.
#[derive(Debug, Clone)]
pub struct RefreshTokenKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
}

/// Identity, profiles and refresh tokens.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Returns `None` when the email is already registered.
    async fn create_account(&self, account: NewAccount) -> Result<Option<Profile>>;

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>>;

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate)
        -> Result<Option<Profile>>;

    async fn profile_stats(&self, user_id: Uuid) -> Result<Option<ProfileStats>>;

    async fn insert_refresh_token(&self, token: RefreshTokenRecord) -> Result<()>;

    /// Revokes `current` and stores `next` in one step. Returns false when
    /// `current` is unknown, revoked or expired.
    async fn rotate_refresh_token(
        &self,
        current: &RefreshTokenKey,
        next: RefreshTokenRecord,
    ) -> Result<bool>;

    async fn revoke_refresh_token(&self, token: &RefreshTokenKey) -> Result<bool>;
}

pub type SharedContentStore = Arc<dyn ContentStore>;
pub type SharedAccountStore = Arc<dyn AccountStore>;
