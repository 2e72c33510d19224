#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use embrace::domain::affirmation::{Affirmation, NewAffirmation};
use embrace::domain::engagement::LikeOutcome;
use embrace::domain::post::{NewPost, Post};
use embrace::domain::profile::Profile;
use embrace::infra::memory::MemoryStore;
use embrace::infra::store::{AccountStore, ContentStore, NewAccount};
use embrace::sync::Viewer;
use embrace::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// 32 bytes base64-encoded (test-only keys)
// "0123456789abcdef0123456789abcdef" (32 bytes)
const TEST_PASETO_ACCESS_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
// "fedcba9876543210fedcba9876543210" (32 bytes)
const TEST_PASETO_REFRESH_KEY: &str = "ZmVkY2JhOTg3NjU0MzIxMGZlZGNiYTk4NzY1NDMyMTA=";
pub const DEFAULT_PASSWORD: &str = "testpassword123";

fn decode_key(encoded: &str) -> [u8; 32] {
    STANDARD
        .decode(encoded)
        .expect("test key is base64")
        .try_into()
        .expect("test key is 32 bytes")
}

// ---------------------------------------------------------------------------
// TestApp: one isolated in-memory store per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn app() -> TestApp {
    TestApp::with_store(MemoryStore::new())
}

impl TestApp {
    pub fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let state = AppState {
            content: store.clone(),
            accounts: store.clone(),
            paseto_access_key: decode_key(TEST_PASETO_ACCESS_KEY),
            paseto_refresh_key: decode_key(TEST_PASETO_REFRESH_KEY),
            access_ttl_minutes: 15,
            refresh_ttl_days: 30,
        };
        let router = embrace::http::router(state.clone());

        TestApp {
            router,
            state,
            store,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, path, Some(body), token).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, path, None, token).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::PATCH, path, Some(body), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, None, token).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Signs a user up through the API.
    pub async fn create_user(&self, suffix: &str) -> TestUser {
        let email = format!("test_{}@example.com", suffix);
        let full_name = format!("Test User {}", suffix);

        let resp = self
            .post_json(
                "/v1/auth/signup",
                json!({ "email": email, "password": DEFAULT_PASSWORD, "full_name": full_name }),
                None,
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "signup failed: {:?}", resp.json());

        let body = resp.json();
        TestUser {
            id: body["profile"]["id"].as_str().unwrap().parse().unwrap(),
            email,
            full_name,
            access_token: body["access_token"].as_str().unwrap().to_string(),
            refresh_token: body["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Inserts an affirmation created `minutes_ago` with the given counter.
    pub async fn seed_affirmation(
        &self,
        content: &str,
        is_featured: bool,
        likes_count: i64,
        minutes_ago: i64,
    ) -> Uuid {
        let affirmation = affirmation(content, is_featured, likes_count, minutes_ago);
        let id = affirmation.id;
        self.store.seed_affirmation(affirmation).await;
        id
    }

    pub async fn seed_post(&self, author: Uuid, content: &str, likes_count: i64, minutes_ago: i64) -> Uuid {
        let post = post(author, content, likes_count, minutes_ago);
        let id = post.id;
        self.store.seed_post(post).await;
        id
    }
}

pub fn affirmation(content: &str, is_featured: bool, likes_count: i64, minutes_ago: i64) -> Affirmation {
    Affirmation {
        id: Uuid::new_v4(),
        content: content.to_string(),
        category: "self-worth".to_string(),
        image_url: None,
        is_featured,
        likes_count,
        created_at: OffsetDateTime::now_utc() - Duration::minutes(minutes_ago),
        user_id: None,
        author: None,
        is_liked: None,
        is_saved: None,
    }
}

pub fn post(author: Uuid, content: &str, likes_count: i64, minutes_ago: i64) -> Post {
    Post {
        id: Uuid::new_v4(),
        content: content.to_string(),
        image_url: None,
        likes_count,
        comments_count: 0,
        tags: Vec::new(),
        created_at: OffsetDateTime::now_utc() - Duration::minutes(minutes_ago),
        user_id: author,
        author: None,
        is_liked: None,
    }
}

// ---------------------------------------------------------------------------
// Feed helpers
// ---------------------------------------------------------------------------

/// Registers an account directly in the store and returns it as a viewer.
pub async fn viewer(store: &MemoryStore, name: &str) -> Viewer {
    let profile: Profile = store
        .create_account(NewAccount {
            email: format!("{}@example.com", name),
            password_hash: String::new(),
            full_name: name.to_string(),
        })
        .await
        .unwrap()
        .expect("email is free");
    Viewer::from(profile)
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}

/// Wraps a `MemoryStore` and fails selected calls on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    pub fail_lists: AtomicBool,
    pub fail_membership: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(anyhow!("injected {} failure", what));
        }
        Ok(())
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for FlakyStore {
    async fn ping(&self) -> Result<()> {
        ContentStore::ping(self.inner.as_ref()).await
    }

    async fn list_affirmations(&self) -> Result<Vec<Affirmation>> {
        Self::check(&self.fail_lists, "list")?;
        self.inner.list_affirmations().await
    }

    async fn liked_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        Self::check(&self.fail_membership, "membership")?;
        self.inner.liked_affirmation_ids(user_id, ids).await
    }

    async fn saved_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        Self::check(&self.fail_membership, "membership")?;
        self.inner.saved_affirmation_ids(user_id, ids).await
    }

    async fn set_affirmation_like(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>> {
        Self::check(&self.fail_writes, "write")?;
        self.inner
            .set_affirmation_like(user_id, affirmation_id, liked)
            .await
    }

    async fn set_affirmation_saved(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        saved: bool,
    ) -> Result<Option<bool>> {
        Self::check(&self.fail_writes, "write")?;
        self.inner
            .set_affirmation_saved(user_id, affirmation_id, saved)
            .await
    }

    async fn insert_affirmation(&self, new: NewAffirmation) -> Result<Affirmation> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.insert_affirmation(new).await
    }

    async fn list_saved_affirmations(&self, user_id: Uuid) -> Result<Vec<Affirmation>> {
        Self::check(&self.fail_lists, "list")?;
        self.inner.list_saved_affirmations(user_id).await
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        Self::check(&self.fail_lists, "list")?;
        self.inner.list_posts().await
    }

    async fn liked_post_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        Self::check(&self.fail_membership, "membership")?;
        self.inner.liked_post_ids(user_id, ids).await
    }

    async fn set_post_like(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.set_post_like(user_id, post_id, liked).await
    }

    async fn insert_post(&self, new: NewPost) -> Result<Post> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.insert_post(new).await
    }
}
