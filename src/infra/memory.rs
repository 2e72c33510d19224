use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::affirmation::{Affirmation, NewAffirmation};
use crate::domain::engagement::{Like, LikeOutcome, LikeTarget, Saved};
use crate::domain::post::{NewPost, Post};
use crate::domain::profile::{days_active, Profile, ProfileStats, ProfileUpdate};
use crate::infra::store::{
    AccountStore, ContentStore, Credentials, NewAccount, RefreshTokenKey, RefreshTokenRecord,
};

#[derive(Default)]
struct Tables {
    passwords: HashMap<Uuid, String>,
    emails: HashMap<String, Uuid>,
    profiles: HashMap<Uuid, Profile>,
    /// Live tokens only; revoking or rotating removes the entry.
    refresh_tokens: HashMap<Uuid, RefreshTokenRecord>,
    affirmations: Vec<Affirmation>,
    posts: Vec<Post>,
    likes: HashSet<Like>,
    /// Value is the save sequence number, higher is more recent.
    saved: HashMap<Saved, u64>,
    saved_seq: u64,
}

impl Tables {
    fn with_author(&self, mut affirmation: Affirmation) -> Affirmation {
        affirmation.author = affirmation
            .user_id
            .and_then(|id| self.profiles.get(&id))
            .map(Profile::author);
        affirmation
    }

    fn with_post_author(&self, mut post: Post) -> Post {
        post.author = self.profiles.get(&post.user_id).map(Profile::author);
        post
    }

    fn prune_expired_tokens(&mut self, now: OffsetDateTime) {
        self.refresh_tokens.retain(|_, token| token.expires_at > now);
    }

    fn set_like(&mut self, like: Like, liked: bool) -> bool {
        if liked {
            self.likes.insert(like)
        } else {
            self.likes.remove(&like)
        }
    }
}

/// Newest first; among equal timestamps the later insert wins.
fn newest_first<T, F>(items: &[T], created_at: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> OffsetDateTime,
{
    let mut out: Vec<T> = items.iter().rev().cloned().collect();
    out.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    out
}

fn apply_delta(count: &mut i64, liked: bool) {
    *count = if liked { *count + 1 } else { (*count - 1).max(0) };
}

/// In-process store used for local development and tests.
///
/// Every write happens under one lock, so the like toggle is as atomic here
/// as the transactional version in PostgreSQL.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with featured starter affirmations.
    pub fn with_demo_content() -> Self {
        const STARTERS: &[(&str, &str, i64)] = &[
            ("I am worthy of love and respect exactly as I am.", "self-worth", 234),
            ("My body is my home, and I treat it with kindness and compassion.", "body", 189),
            ("I celebrate my unique beauty and embrace what makes me different.", "confidence", 156),
            ("I am healing and growing stronger every day.", "healing", 298),
            ("My worth is not determined by my appearance - I am valuable beyond measure.", "self-worth", 267),
            ("I choose to speak to myself with the same kindness I show my best friend.", "healing", 178),
        ];

        let now = OffsetDateTime::now_utc();
        let affirmations = STARTERS
            .iter()
            .enumerate()
            .map(|(index, (content, category, likes))| Affirmation {
                id: Uuid::new_v4(),
                content: content.to_string(),
                category: category.to_string(),
                image_url: None,
                is_featured: true,
                likes_count: *likes,
                created_at: now - Duration::minutes((STARTERS.len() - index) as i64),
                user_id: None,
                author: None,
                is_liked: None,
                is_saved: None,
            })
            .collect();

        Self {
            tables: RwLock::new(Tables {
                affirmations,
                ..Tables::default()
            }),
        }
    }

    /// Inserts a fully formed record, bypassing the defaults `insert_affirmation`
    /// applies.
    pub async fn seed_affirmation(&self, affirmation: Affirmation) {
        self.tables.write().await.affirmations.push(affirmation);
    }

    pub async fn seed_post(&self, post: Post) {
        self.tables.write().await.posts.push(post);
    }

    /// Overwrites a stored counter without touching the join records.
    pub async fn force_likes_count(&self, target: LikeTarget, likes_count: i64) {
        let mut tables = self.tables.write().await;
        match target {
            LikeTarget::Affirmation(id) => {
                if let Some(a) = tables.affirmations.iter_mut().find(|a| a.id == id) {
                    a.likes_count = likes_count;
                }
            }
            LikeTarget::Post(id) => {
                if let Some(p) = tables.posts.iter_mut().find(|p| p.id == id) {
                    p.likes_count = likes_count;
                }
            }
        }
    }

    pub async fn like_count(&self, target: LikeTarget) -> usize {
        let tables = self.tables.read().await;
        tables.likes.iter().filter(|like| like.target == target).count()
    }

    /// Refresh tokens of `user_id` that can still be used.
    pub async fn refresh_token_count(&self, user_id: Uuid) -> usize {
        let tables = self.tables.read().await;
        tables
            .refresh_tokens
            .values()
            .filter(|token| token.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_affirmations(&self) -> Result<Vec<Affirmation>> {
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.affirmations, |a| a.created_at)
            .into_iter()
            .map(|a| tables.with_author(a))
            .collect())
    }

    async fn liked_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| {
                tables.likes.contains(&Like {
                    user_id,
                    target: LikeTarget::Affirmation(*id),
                })
            })
            .collect())
    }

    async fn saved_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| {
                tables.saved.contains_key(&Saved {
                    user_id,
                    affirmation_id: *id,
                })
            })
            .collect())
    }

    async fn set_affirmation_like(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.affirmations.iter().position(|a| a.id == affirmation_id) else {
            return Ok(None);
        };

        let changed = tables.set_like(
            Like {
                user_id,
                target: LikeTarget::Affirmation(affirmation_id),
            },
            liked,
        );
        let affirmation = &mut tables.affirmations[index];
        if changed {
            apply_delta(&mut affirmation.likes_count, liked);
        }

        Ok(Some(LikeOutcome {
            likes_count: affirmation.likes_count,
            changed,
        }))
    }

    async fn set_affirmation_saved(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        saved: bool,
    ) -> Result<Option<bool>> {
        let mut tables = self.tables.write().await;
        if !tables.affirmations.iter().any(|a| a.id == affirmation_id) {
            return Ok(None);
        }

        let record = Saved {
            user_id,
            affirmation_id,
        };
        let present = tables.saved.contains_key(&record);
        let changed = match (saved, present) {
            (true, false) => {
                tables.saved_seq += 1;
                let seq = tables.saved_seq;
                tables.saved.insert(record, seq);
                true
            }
            (false, true) => {
                tables.saved.remove(&record);
                true
            }
            _ => false,
        };

        Ok(Some(changed))
    }

    async fn insert_affirmation(&self, new: NewAffirmation) -> Result<Affirmation> {
        let mut tables = self.tables.write().await;
        let affirmation = Affirmation {
            id: Uuid::new_v4(),
            content: new.content,
            category: new.category,
            image_url: new.image_url,
            is_featured: false,
            likes_count: 0,
            created_at: OffsetDateTime::now_utc(),
            user_id: Some(new.user_id),
            author: None,
            is_liked: None,
            is_saved: None,
        };
        tables.affirmations.push(affirmation.clone());
        Ok(tables.with_author(affirmation))
    }

    async fn list_saved_affirmations(&self, user_id: Uuid) -> Result<Vec<Affirmation>> {
        let tables = self.tables.read().await;
        let mut saved: Vec<(&Saved, u64)> = tables
            .saved
            .iter()
            .filter(|(s, _)| s.user_id == user_id)
            .map(|(s, seq)| (s, *seq))
            .collect();
        saved.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(saved
            .into_iter()
            .filter_map(|(s, _)| {
                tables
                    .affirmations
                    .iter()
                    .find(|a| a.id == s.affirmation_id)
                    .cloned()
            })
            .map(|a| tables.with_author(a))
            .collect())
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.posts, |p| p.created_at)
            .into_iter()
            .map(|p| tables.with_post_author(p))
            .collect())
    }

    async fn liked_post_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| {
                tables.likes.contains(&Like {
                    user_id,
                    target: LikeTarget::Post(*id),
                })
            })
            .collect())
    }

    async fn set_post_like(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.posts.iter().position(|p| p.id == post_id) else {
            return Ok(None);
        };

        let changed = tables.set_like(
            Like {
                user_id,
                target: LikeTarget::Post(post_id),
            },
            liked,
        );
        let post = &mut tables.posts[index];
        if changed {
            apply_delta(&mut post.likes_count, liked);
        }

        Ok(Some(LikeOutcome {
            likes_count: post.likes_count,
            changed,
        }))
    }

    async fn insert_post(&self, new: NewPost) -> Result<Post> {
        let mut tables = self.tables.write().await;
        let post = Post {
            id: Uuid::new_v4(),
            content: new.content,
            image_url: new.image_url,
            likes_count: 0,
            comments_count: 0,
            tags: new.tags,
            created_at: OffsetDateTime::now_utc(),
            user_id: new.user_id,
            author: None,
            is_liked: None,
        };
        tables.posts.push(post.clone());
        Ok(tables.with_post_author(post))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn create_account(&self, account: NewAccount) -> Result<Option<Profile>> {
        let mut tables = self.tables.write().await;
        if tables.emails.contains_key(&account.email) {
            return Ok(None);
        }

        let profile = Profile {
            id: Uuid::new_v4(),
            email: account.email.clone(),
            full_name: account.full_name,
            avatar_url: None,
            bio: None,
            location: None,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.emails.insert(account.email, profile.id);
        tables.passwords.insert(profile.id, account.password_hash);
        tables.profiles.insert(profile.id, profile.clone());
        Ok(Some(profile))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        let tables = self.tables.read().await;
        Ok(tables.emails.get(email).and_then(|user_id| {
            tables.passwords.get(user_id).map(|hash| Credentials {
                user_id: *user_id,
                password_hash: hash.clone(),
            })
        }))
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<Profile>> {
        let mut tables = self.tables.write().await;
        let Some(profile) = tables.profiles.get_mut(&user_id) else {
            return Ok(None);
        };

        if let Some(full_name) = update.full_name {
            profile.full_name = full_name;
        }
        if let Some(avatar_url) = update.avatar_url {
            profile.avatar_url = Some(avatar_url);
        }
        if let Some(bio) = update.bio {
            profile.bio = Some(bio);
        }
        if let Some(location) = update.location {
            profile.location = Some(location);
        }

        Ok(Some(profile.clone()))
    }

    async fn profile_stats(&self, user_id: Uuid) -> Result<Option<ProfileStats>> {
        let tables = self.tables.read().await;
        let Some(profile) = tables.profiles.get(&user_id) else {
            return Ok(None);
        };

        let posts_shared = tables.posts.iter().filter(|p| p.user_id == user_id).count();
        let affirmations_liked = tables
            .likes
            .iter()
            .filter(|l| l.user_id == user_id && matches!(l.target, LikeTarget::Affirmation(_)))
            .count();
        let affirmations_saved = tables.saved.keys().filter(|s| s.user_id == user_id).count();

        Ok(Some(ProfileStats {
            posts_shared: posts_shared as i64,
            affirmations_liked: affirmations_liked as i64,
            affirmations_saved: affirmations_saved as i64,
            days_active: days_active(profile.created_at, OffsetDateTime::now_utc()),
        }))
    }

    async fn insert_refresh_token(&self, token: RefreshTokenRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.prune_expired_tokens(OffsetDateTime::now_utc());
        tables.refresh_tokens.insert(token.id, token);
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        current: &RefreshTokenKey,
        next: RefreshTokenRecord,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        tables.prune_expired_tokens(OffsetDateTime::now_utc());
        if !tables.refresh_tokens.get(&current.id).is_some_and(|t| matches_key(t, current)) {
            return Ok(false);
        }

        tables.refresh_tokens.remove(&current.id);
        tables.refresh_tokens.insert(next.id, next);
        Ok(true)
    }

    async fn revoke_refresh_token(&self, token: &RefreshTokenKey) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.refresh_tokens.get(&token.id).is_some_and(|t| matches_key(t, token)) {
            return Ok(false);
        }
        tables.refresh_tokens.remove(&token.id);
        Ok(true)
    }
}

fn matches_key(stored: &RefreshTokenRecord, key: &RefreshTokenKey) -> bool {
    stored.user_id == key.user_id && stored.token_hash == key.token_hash
}
