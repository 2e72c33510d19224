use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::app::auth::TokenPair;
use crate::domain::affirmation::{pick_daily, Affirmation, Category, NewAffirmation, CATEGORIES};
use crate::domain::engagement::LikeOutcome;
use crate::domain::post::{normalize_tags, NewPost, Post};
use crate::domain::profile::{Profile, ProfileStats, ProfileUpdate, PublicProfile};
use crate::domain::resource::{self, Resource, ResourceKind};
use crate::http::{AppError, AuthUser};
use crate::AppState;

const MAX_FULL_NAME_LEN: usize = 100;
const MAX_BIO_LEN: usize = 500;
const MAX_LOCATION_LEN: usize = 100;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_MEMBERSHIP_IDS: usize = 500;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

#[derive(Deserialize)]
pub struct IdsQuery {
    pub ids: Option<String>,
}

#[derive(Serialize)]
pub struct IdsResponse {
    pub ids: Vec<Uuid>,
}

fn parse_ids(query: IdsQuery) -> Result<Vec<Uuid>, AppError> {
    let Some(raw) = query.ids else {
        return Ok(Vec::new());
    };

    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Uuid::parse_str(part).map_err(|_| AppError::bad_request("invalid ids")))
        .collect::<Result<Vec<_>, _>>()?;

    if ids.len() > MAX_MEMBERSHIP_IDS {
        return Err(AppError::bad_request("at most 500 ids per request"));
    }
    Ok(ids)
}

fn require_text(value: &str, field: &str, max_len: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{} is required", field)));
    }
    if value.chars().count() > max_len {
        return Err(AppError::bad_request(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(value.to_string())
}

fn optional_text(
    value: Option<String>,
    field: &str,
    max_len: usize,
) -> Result<Option<String>, AppError> {
    match value {
        Some(value) => require_text(&value, field, max_len).map(Some),
        None => Ok(None),
    }
}

/// Blank means "no image".
fn parse_image_url(value: Option<String>) -> Result<Option<String>, AppError> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let url = Url::parse(&value).map_err(|_| AppError::bad_request("invalid image_url"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AppError::bad_request("image_url must be an http(s) URL"));
    }
    Ok(Some(value))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let content = state.content.ping().await.is_ok();
    let accounts = state.accounts.ping().await.is_ok();
    let status = if content && accounts { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<TokenPair> for AuthTokenResponse {
    fn from(tokens: TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub profile: Profile,
    #[serde(flatten)]
    pub tokens: AuthTokenResponse,
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }
    Ok(())
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate_credentials(&payload.email, &payload.password)?;
    if !payload.email.contains('@') {
        return Err(AppError::bad_request("invalid email"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    let full_name = require_text(&payload.full_name, "full_name", MAX_FULL_NAME_LEN)?;

    let created = state
        .auth_service()
        .sign_up(&payload.email, &payload.password, &full_name)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to sign up");
            AppError::internal("failed to sign up")
        })?;

    match created {
        Some((profile, tokens)) => {
            tracing::info!(user_id = %profile.id, "account created");
            Ok(Json(AuthResponse {
                profile,
                tokens: tokens.into(),
            }))
        }
        None => Err(AppError::conflict("email already registered")),
    }
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate_credentials(&payload.email, &payload.password)?;

    let signed_in = state
        .auth_service()
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to sign in");
            AppError::internal("failed to sign in")
        })?;

    match signed_in {
        Some((profile, tokens)) => Ok(Json(AuthResponse {
            profile,
            tokens: tokens.into(),
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = state
        .auth_service()
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn sign_out(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let revoked = state
        .auth_service()
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to sign out")
        })?;

    if revoked {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::unauthorized("invalid refresh token"))
    }
}

pub async fn get_current_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .accounts
        .get_profile(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current profile");
            AppError::internal("failed to fetch profile")
        })?;

    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err(AppError::not_found("profile not found")),
    }
}

// ---------------------------------------------------------------------------
// Affirmations
// ---------------------------------------------------------------------------

pub async fn list_affirmations(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Affirmation>>, AppError> {
    let items = state.content.list_affirmations().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list affirmations");
        AppError::internal("failed to list affirmations")
    })?;

    Ok(Json(ListResponse { items }))
}

#[derive(Deserialize)]
pub struct CreateAffirmationRequest {
    pub content: String,
    pub category: String,
    pub image_url: Option<String>,
}

pub async fn create_affirmation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAffirmationRequest>,
) -> Result<Json<Affirmation>, AppError> {
    let draft = NewAffirmation {
        user_id: auth.user_id,
        content: payload.content.trim().to_string(),
        category: payload.category.trim().to_string(),
        image_url: parse_image_url(payload.image_url)?,
    };
    draft.validate().map_err(AppError::bad_request)?;

    let affirmation = state
        .content
        .insert_affirmation(draft)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create affirmation");
            AppError::internal("failed to create affirmation")
        })?;

    Ok(Json(affirmation))
}

pub async fn list_categories() -> Json<ListResponse<Category>> {
    Json(ListResponse {
        items: CATEGORIES.to_vec(),
    })
}

pub async fn daily_affirmation(
    State(state): State<AppState>,
) -> Result<Json<Affirmation>, AppError> {
    let all = state.content.list_affirmations().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list affirmations");
        AppError::internal("failed to fetch daily affirmation")
    })?;

    let today = OffsetDateTime::now_utc().ordinal();
    match pick_daily(&all, today) {
        Some(affirmation) => Ok(Json(affirmation.clone())),
        None => Err(AppError::not_found("no affirmations yet")),
    }
}

pub async fn liked_affirmation_ids(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<IdsResponse>, AppError> {
    let ids = parse_ids(query)?;
    let ids = state
        .content
        .liked_affirmation_ids(auth.user_id, &ids)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to check affirmation likes");
            AppError::internal("failed to check likes")
        })?;

    Ok(Json(IdsResponse { ids }))
}

pub async fn saved_affirmation_ids(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<IdsResponse>, AppError> {
    let ids = parse_ids(query)?;
    let ids = state
        .content
        .saved_affirmation_ids(auth.user_id, &ids)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to check saved affirmations");
            AppError::internal("failed to check saved affirmations")
        })?;

    Ok(Json(IdsResponse { ids }))
}

async fn set_affirmation_like(
    state: &AppState,
    user_id: Uuid,
    affirmation_id: Uuid,
    liked: bool,
) -> Result<Json<LikeOutcome>, AppError> {
    let outcome = state
        .content
        .set_affirmation_like(user_id, affirmation_id, liked)
        .await
        .map_err(|err| {
            tracing::error!(
                error = ?err,
                user_id = %user_id,
                affirmation_id = %affirmation_id,
                liked,
                "failed to set affirmation like"
            );
            AppError::internal("failed to update like")
        })?;

    match outcome {
        Some(outcome) => Ok(Json(outcome)),
        None => Err(AppError::not_found("affirmation not found")),
    }
}

pub async fn like_affirmation(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeOutcome>, AppError> {
    set_affirmation_like(&state, auth.user_id, id, true).await
}

pub async fn unlike_affirmation(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeOutcome>, AppError> {
    set_affirmation_like(&state, auth.user_id, id, false).await
}

#[derive(Serialize, Deserialize)]
pub struct SaveResponse {
    pub saved: bool,
    pub changed: bool,
}

async fn set_affirmation_saved(
    state: &AppState,
    user_id: Uuid,
    affirmation_id: Uuid,
    saved: bool,
) -> Result<Json<SaveResponse>, AppError> {
    let changed = state
        .content
        .set_affirmation_saved(user_id, affirmation_id, saved)
        .await
        .map_err(|err| {
            tracing::error!(
                error = ?err,
                user_id = %user_id,
                affirmation_id = %affirmation_id,
                saved,
                "failed to set affirmation saved"
            );
            AppError::internal("failed to update saved affirmation")
        })?;

    match changed {
        Some(changed) => Ok(Json(SaveResponse { saved, changed })),
        None => Err(AppError::not_found("affirmation not found")),
    }
}

pub async fn save_affirmation(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SaveResponse>, AppError> {
    set_affirmation_saved(&state, auth.user_id, id, true).await
}

pub async fn unsave_affirmation(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SaveResponse>, AppError> {
    set_affirmation_saved(&state, auth.user_id, id, false).await
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

pub async fn list_posts(State(state): State<AppState>) -> Result<Json<ListResponse<Post>>, AppError> {
    let items = state.content.list_posts().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list posts");
        AppError::internal("failed to list posts")
    })?;

    Ok(Json(ListResponse { items }))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let draft = NewPost {
        user_id: auth.user_id,
        content: payload.content.trim().to_string(),
        image_url: parse_image_url(payload.image_url)?,
        tags: normalize_tags(&payload.tags),
    };
    draft.validate().map_err(AppError::bad_request)?;

    let post = state
        .content
        .insert_post(draft)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok(Json(post))
}

pub async fn liked_post_ids(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<IdsResponse>, AppError> {
    let ids = parse_ids(query)?;
    let ids = state
        .content
        .liked_post_ids(auth.user_id, &ids)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to check post likes");
            AppError::internal("failed to check likes")
        })?;

    Ok(Json(IdsResponse { ids }))
}

async fn set_post_like(
    state: &AppState,
    user_id: Uuid,
    post_id: Uuid,
    liked: bool,
) -> Result<Json<LikeOutcome>, AppError> {
    let outcome = state
        .content
        .set_post_like(user_id, post_id, liked)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, post_id = %post_id, liked, "failed to set post like");
            AppError::internal("failed to update like")
        })?;

    match outcome {
        Some(outcome) => Ok(Json(outcome)),
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn like_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeOutcome>, AppError> {
    set_post_like(&state, auth.user_id, id, true).await
}

pub async fn unlike_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeOutcome>, AppError> {
    set_post_like(&state, auth.user_id, id, false).await
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

pub async fn get_profile(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PublicProfile>, AppError> {
    let profile = state.accounts.get_profile(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch profile");
        AppError::internal("failed to fetch profile")
    })?;

    match profile {
        Some(profile) => Ok(Json(profile.into())),
        None => Err(AppError::not_found("profile not found")),
    }
}

pub async fn get_profile_stats(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ProfileStats>, AppError> {
    let stats = state.accounts.profile_stats(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch profile stats");
        AppError::internal("failed to fetch profile stats")
    })?;

    match stats {
        Some(stats) => Ok(Json(stats)),
        None => Err(AppError::not_found("profile not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    let update = ProfileUpdate {
        full_name: optional_text(payload.full_name, "full_name", MAX_FULL_NAME_LEN)?,
        avatar_url: parse_image_url(payload.avatar_url)?,
        bio: optional_text(payload.bio, "bio", MAX_BIO_LEN)?,
        location: optional_text(payload.location, "location", MAX_LOCATION_LEN)?,
    };

    let profile = state
        .accounts
        .update_profile(auth.user_id, update)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err(AppError::not_found("profile not found")),
    }
}

pub async fn list_saved_affirmations(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Affirmation>>, AppError> {
    let mut items = state
        .content
        .list_saved_affirmations(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list saved affirmations");
            AppError::internal("failed to list saved affirmations")
        })?;

    for item in &mut items {
        item.is_saved = Some(true);
    }

    Ok(Json(ListResponse { items }))
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ResourceQuery {
    pub kind: Option<String>,
    pub q: Option<String>,
}

pub async fn list_resources(
    Query(query): Query<ResourceQuery>,
) -> Result<Json<ListResponse<&'static Resource>>, AppError> {
    let kind = ResourceKind::parse_filter(query.kind.as_deref().unwrap_or(""))
        .map_err(AppError::bad_request)?;
    let items = resource::filter(kind, query.q.as_deref().unwrap_or(""));

    Ok(Json(ListResponse { items }))
}
