use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::engagement::Likeable;
use crate::domain::post::{normalize_tags, NewPost, Post};
use crate::infra::store::SharedContentStore;
use crate::sync::session::{Session, Viewer};
use crate::sync::state::{membership, FeedState};
use crate::sync::CreateError;

/// The community post feed as seen by the current viewer.
#[derive(Clone)]
pub struct PostFeed {
    remote: SharedContentStore,
    session: Session,
    state: Arc<RwLock<FeedState<Post>>>,
}

impl PostFeed {
    pub fn new(remote: SharedContentStore, session: Session) -> Self {
        Self {
            remote,
            session,
            state: Arc::new(RwLock::new(FeedState::new())),
        }
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.state.read().await.items()
    }

    pub async fn loading(&self) -> bool {
        self.state.read().await.loading()
    }

    pub fn can_interact(&self) -> bool {
        self.session.viewer().is_some()
    }

    pub async fn fetch_all(&self) {
        let viewer = self.session.viewer();
        match self.load(viewer.as_ref()).await {
            Ok(items) => self.state.write().await.replace(items),
            Err(err) => tracing::error!(error = ?err, "failed to fetch posts"),
        }
        self.state.write().await.finish_loading();
    }

    pub async fn refetch(&self) {
        self.fetch_all().await
    }

    async fn load(&self, viewer: Option<&Viewer>) -> anyhow::Result<Vec<Post>> {
        let mut items = self.remote.list_posts().await?;

        match viewer {
            Some(viewer) => {
                let ids: Vec<Uuid> = items.iter().map(|p| p.id).collect();
                let liked = membership(
                    self.remote.liked_post_ids(viewer.id, &ids).await,
                    "likes",
                );
                for item in &mut items {
                    item.is_liked = Some(liked.contains(&item.id));
                }
            }
            None => {
                for item in &mut items {
                    item.is_liked = None;
                }
            }
        }
        Ok(items)
    }

    pub async fn toggle_like(&self, id: Uuid) {
        let Some(viewer) = self.session.viewer() else {
            return;
        };
        let Some(liked) = self.state.read().await.get(id).map(|p| p.liked()) else {
            return;
        };

        match self.remote.set_post_like(viewer.id, id, !liked).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(post_id = %id, "post no longer exists"),
            Err(err) => tracing::error!(error = ?err, post_id = %id, "failed to toggle post like"),
        }

        self.state.write().await.update(id, |p| p.flip_like());
    }

    /// Creates a post attributed to the viewer, then reloads the feed.
    pub async fn create_post<I, S>(
        &self,
        content: &str,
        image_url: Option<&str>,
        tags: I,
    ) -> Result<Post, CreateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let viewer = self.session.viewer().ok_or(CreateError::NotAuthenticated)?;

        let draft = NewPost {
            user_id: viewer.id,
            content: content.trim().to_string(),
            image_url: image_url.map(str::to_string),
            tags: normalize_tags(tags),
        };
        draft.validate().map_err(CreateError::Invalid)?;

        let created = self
            .remote
            .insert_post(draft)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %viewer.id, "failed to create post");
                CreateError::Remote(err)
            })?;

        self.fetch_all().await;
        Ok(created)
    }

    /// See [`AffirmationFeed::spawn_sync`](crate::sync::AffirmationFeed::spawn_sync).
    pub fn spawn_sync(&self) -> JoinHandle<()> {
        let feed = self.clone();
        let mut changes = self.session.subscribe();
        tokio::spawn(async move {
            feed.fetch_all().await;
            while changes.changed().await {
                feed.fetch_all().await;
            }
        })
    }
}
