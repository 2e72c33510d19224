use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::affirmation::{Affirmation, NewAffirmation};
use crate::domain::engagement::Likeable;
use crate::infra::store::SharedContentStore;
use crate::sync::session::{Session, Viewer};
use crate::sync::state::{membership, FeedState};
use crate::sync::CreateError;

/// The affirmation feed as seen by the current viewer.
#[derive(Clone)]
pub struct AffirmationFeed {
    remote: SharedContentStore,
    session: Session,
    state: Arc<RwLock<FeedState<Affirmation>>>,
}

impl AffirmationFeed {
    pub fn new(remote: SharedContentStore, session: Session) -> Self {
        Self {
            remote,
            session,
            state: Arc::new(RwLock::new(FeedState::new())),
        }
    }

    /// Snapshot of the local list, newest first.
    pub async fn affirmations(&self) -> Vec<Affirmation> {
        self.state.read().await.items()
    }

    pub async fn loading(&self) -> bool {
        self.state.read().await.loading()
    }

    /// Like and save controls should be disabled when this is false.
    pub fn can_interact(&self) -> bool {
        self.session.viewer().is_some()
    }

    /// Replaces local state with a fresh remote read.
    pub async fn fetch_all(&self) {
        let viewer = self.session.viewer();
        match self.load(viewer.as_ref()).await {
            Ok(items) => self.state.write().await.replace(items),
            Err(err) => tracing::error!(error = ?err, "failed to fetch affirmations"),
        }
        self.state.write().await.finish_loading();
    }

    pub async fn refetch(&self) {
        self.fetch_all().await
    }

    async fn load(&self, viewer: Option<&Viewer>) -> anyhow::Result<Vec<Affirmation>> {
        let mut items = self.remote.list_affirmations().await?;

        let Some(viewer) = viewer else {
            for item in &mut items {
                item.is_liked = None;
                item.is_saved = None;
            }
            return Ok(items);
        };

        let ids: Vec<Uuid> = items.iter().map(|a| a.id).collect();
        let (liked, saved) = futures::join!(
            self.remote.liked_affirmation_ids(viewer.id, &ids),
            self.remote.saved_affirmation_ids(viewer.id, &ids),
        );
        let liked = membership(liked, "likes");
        let saved = membership(saved, "saved_affirmations");

        for item in &mut items {
            item.is_liked = Some(liked.contains(&item.id));
            item.is_saved = Some(saved.contains(&item.id));
        }
        Ok(items)
    }

    /// Flips the viewer's like on `id`.
    ///
    /// Local state flips even when the remote write fails.
    pub async fn toggle_like(&self, id: Uuid) {
        let Some(viewer) = self.session.viewer() else {
            return;
        };
        let Some(liked) = self.state.read().await.get(id).map(|a| a.liked()) else {
            return;
        };

        match self.remote.set_affirmation_like(viewer.id, id, !liked).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(affirmation_id = %id, "affirmation no longer exists"),
            Err(err) => {
                tracing::error!(error = ?err, affirmation_id = %id, "failed to toggle affirmation like")
            }
        }

        self.state.write().await.update(id, |a| a.flip_like());
    }

    /// Flips the viewer's save on `id`. Never touches `likes_count`.
    pub async fn toggle_save(&self, id: Uuid) {
        let Some(viewer) = self.session.viewer() else {
            return;
        };
        let Some(saved) = self
            .state
            .read()
            .await
            .get(id)
            .map(|a| a.is_saved.unwrap_or(false))
        else {
            return;
        };

        match self.remote.set_affirmation_saved(viewer.id, id, !saved).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(affirmation_id = %id, "affirmation no longer exists"),
            Err(err) => {
                tracing::error!(error = ?err, affirmation_id = %id, "failed to toggle affirmation save")
            }
        }

        self.state.write().await.update(id, |a| {
            a.is_saved = Some(!a.is_saved.unwrap_or(false));
        });
    }

    /// Creates an affirmation attributed to the viewer, then reloads the feed.
    pub async fn create_affirmation(
        &self,
        content: &str,
        category: &str,
        image_url: Option<&str>,
    ) -> Result<Affirmation, CreateError> {
        let viewer = self.session.viewer().ok_or(CreateError::NotAuthenticated)?;

        let draft = NewAffirmation {
            user_id: viewer.id,
            content: content.trim().to_string(),
            category: category.trim().to_string(),
            image_url: image_url.map(str::to_string),
        };
        draft.validate().map_err(CreateError::Invalid)?;

        let created = self
            .remote
            .insert_affirmation(draft)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %viewer.id, "failed to create affirmation");
                CreateError::Remote(err)
            })?;

        self.fetch_all().await;
        Ok(created)
    }

    /// Loads now and again on every viewer identity change.
    ///
    /// The task holds a session handle of its own, so it runs until the
    /// returned handle is aborted.
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
