use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::domain::affirmation::{Affirmation, NewAffirmation};
use crate::domain::engagement::LikeOutcome;
use crate::domain::post::{NewPost, Post};
use crate::infra::store::ContentStore;
use crate::sync::session::{Session, SessionTokens};

/// Server-side cap on ids per membership query.
const MAX_IDS_PER_REQUEST: usize = 500;

/// A non-success response from the API.
#[derive(Debug, thiserror::Error)]
#[error("api returned {status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct HealthBody {
    status: String,
}

#[derive(Deserialize)]
struct ListBody<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct IdsBody {
    ids: Vec<Uuid>,
}

#[derive(Deserialize)]
struct SaveBody {
    changed: bool,
}

#[derive(Serialize)]
pub(crate) struct RefreshBody<'a> {
    pub refresh_token: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct TokensBody {
    access_token: String,
    refresh_token: String,
}

impl From<TokensBody> for SessionTokens {
    fn from(body: TokensBody) -> Self {
        Self {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        }
    }
}

#[derive(Serialize)]
struct CreateAffirmationBody<'a> {
    content: &'a str,
    category: &'a str,
    image_url: Option<&'a str>,
}

#[derive(Serialize)]
struct CreatePostBody<'a> {
    content: &'a str,
    image_url: Option<&'a str>,
    tags: &'a [String],
}

/// HTTP client for the `/v1` API, authenticated from a [`Session`].
///
/// Implements [`ContentStore`] so the feeds can run against a remote server.
/// Calls that act for a user require that user to be the session's viewer.
///
/// An authenticated call rejected with 401 rotates the session's tokens once
/// and is retried. Clones share one refresh lock, so concurrent rejections
/// spend the refresh token only once.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    session: Session,
    refresh_lock: Arc<Mutex<()>>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: Session) -> Self {
        let mut base = config.api_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            base,
            http: reqwest::Client::new(),
            session,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Builds a client from `EMBRACE_API_URL`.
    pub fn from_env(session: Session) -> Result<Self> {
        Ok(Self::new(&ClientConfig::from_env()?, session))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> Result<Url> {
        let path = format!("v1/{}", path.trim_start_matches('/'));
        self.base
            .join(&path)
            .map_err(|err| anyhow!("invalid api path {}: {}", path, err))
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self.http.request(method, self.url(path)?))
    }

    /// Sends `build(request)` with the viewer's access token, refreshing and
    /// retrying once if the token is rejected.
    async fn send_authed<T, F>(&self, method: Method, path: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let token = self
            .session
            .access_token()
            .ok_or_else(|| anyhow!("not authenticated"))?;
        let request = build(self.request(method.clone(), path)?.bearer_auth(&token));
        match self.send(request).await {
            Err(err) if status_of(&err) == Some(StatusCode::UNAUTHORIZED) => {
                tracing::debug!(path, "access token rejected, refreshing");
                let token = match self.refresh_rejected(&token).await {
                    Ok(token) => token,
                    Err(refresh_err) => {
                        tracing::warn!(error = ?refresh_err, "failed to refresh access token");
                        return Err(err);
                    }
                };
                self.send(build(self.request(method, path)?.bearer_auth(token)))
                    .await
            }
            other => other,
        }
    }

    /// Rotates the session's tokens unless another call already replaced
    /// `rejected`. Returns the access token to retry with.
    async fn refresh_rejected(&self, rejected: &str) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;
        match self.session.access_token() {
            Some(current) if current != rejected => Ok(current),
            _ => self.rotate_tokens().await,
        }
    }

    /// Exchanges the session's refresh token for a new pair.
    pub(crate) async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.rotate_tokens().await.map(|_| ())
    }

    async fn rotate_tokens(&self) -> Result<String> {
        let refresh_token = self
            .session
            .refresh_token()
            .ok_or_else(|| anyhow!("not authenticated"))?;
        let request = self
            .request(Method::POST, "auth/refresh")?
            .json(&RefreshBody {
                refresh_token: &refresh_token,
            });
        let body: TokensBody = self.send(request).await?;
        let access_token = body.access_token.clone();
        self.session.update_tokens(body.into());
        Ok(access_token)
    }

    fn ensure_viewer(&self, user_id: Uuid) -> Result<()> {
        match self.session.viewer() {
            Some(viewer) if viewer.id == user_id => Ok(()),
            Some(_) => Err(anyhow!("user {} is not the signed-in viewer", user_id)),
            None => Err(anyhow!("not authenticated")),
        }
    }

    pub(crate) async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ApiError { status, message }.into());
        }
        Ok(response.json::<T>().await?)
    }

    /// Like `send`, but 204 responses carry no body.
    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<()> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        Err(ApiError { status, message }.into())
    }

    async fn member_ids(&self, path: &str, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.ensure_viewer(user_id)?;
        let mut found = Vec::new();
        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let joined = chunk
                .iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let body: IdsBody = self
                .send_authed(Method::GET, path, |request| {
                    request.query(&[("ids", joined.as_str())])
                })
                .await?;
            found.extend(body.ids);
        }
        Ok(found)
    }

    async fn set_like(&self, path: &str, user_id: Uuid, liked: bool) -> Result<Option<LikeOutcome>> {
        self.ensure_viewer(user_id)?;
        let method = if liked { Method::POST } else { Method::DELETE };
        not_found_as_none(self.send_authed(method, path, |request| request).await)
    }
}

fn status_of(err: &anyhow::Error) -> Option<StatusCode> {
    err.downcast_ref::<ApiError>().map(|api| api.status)
}

fn not_found_as_none<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(body) => Ok(Some(body)),
        Err(err) if status_of(&err) == Some(StatusCode::NOT_FOUND) => Ok(None),
        Err(err) => Err(err),
    }
}

#[async_trait]
impl ContentStore for ApiClient {
    async fn ping(&self) -> Result<()> {
        let body: HealthBody = self.send(self.request(Method::GET, "health")?).await?;
        if body.status != "ok" {
            return Err(anyhow!("api is {}", body.status));
        }
        Ok(())
    }

    async fn list_affirmations(&self) -> Result<Vec<Affirmation>> {
        let body: ListBody<Affirmation> =
            self.send(self.request(Method::GET, "affirmations")?).await?;
        Ok(body.items)
    }

    async fn liked_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.member_ids("affirmations/liked", user_id, ids).await
    }

    async fn saved_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.member_ids("affirmations/saved", user_id, ids).await
    }

    async fn set_affirmation_like(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>> {
        self.set_like(&format!("affirmations/{}/like", affirmation_id), user_id, liked)
            .await
    }

    async fn set_affirmation_saved(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        saved: bool,
    ) -> Result<Option<bool>> {
        self.ensure_viewer(user_id)?;
        let method = if saved { Method::POST } else { Method::DELETE };
        let path = format!("affirmations/{}/save", affirmation_id);
        let body: Option<SaveBody> =
            not_found_as_none(self.send_authed(method, &path, |request| request).await)?;
        Ok(body.map(|body| body.changed))
    }

    async fn insert_affirmation(&self, new: NewAffirmation) -> Result<Affirmation> {
        self.ensure_viewer(new.user_id)?;
        let body = CreateAffirmationBody {
            content: &new.content,
            category: &new.category,
            image_url: new.image_url.as_deref(),
        };
        self.send_authed(Method::POST, "affirmations", |request| request.json(&body))
            .await
    }

    async fn list_saved_affirmations(&self, user_id: Uuid) -> Result<Vec<Affirmation>> {
        self.ensure_viewer(user_id)?;
        let body: ListBody<Affirmation> = self
            .send_authed(Method::GET, "profile/saved", |request| request)
            .await?;
        Ok(body.items)
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let body: ListBody<Post> = self.send(self.request(Method::GET, "posts")?).await?;
        Ok(body.items)
    }

    async fn liked_post_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.member_ids("posts/liked", user_id, ids).await
    }

    async fn set_post_like(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>> {
        self.set_like(&format!("posts/{}/like", post_id), user_id, liked)
            .await
    }

    async fn insert_post(&self, new: NewPost) -> Result<Post> {
        self.ensure_viewer(new.user_id)?;
        let body = CreatePostBody {
            content: &new.content,
            image_url: new.image_url.as_deref(),
            tags: &new.tags,
        };
        self.send_authed(Method::POST, "posts", |request| request.json(&body))
            .await
    }
}
