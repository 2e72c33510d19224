use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::affirmation::{Affirmation, NewAffirmation};
use crate::domain::engagement::LikeOutcome;
use crate::domain::post::{NewPost, Post};
use crate::domain::profile::{days_active, Author, Profile, ProfileStats, ProfileUpdate};
use crate::infra::db::Db;
use crate::infra::store::{
    AccountStore, ContentStore, Credentials, NewAccount, RefreshTokenKey, RefreshTokenRecord,
};

const AFFIRMATION_COLUMNS: &str = "a.id, a.content, a.category, a.image_url, a.is_featured, \
     a.likes_count, a.created_at, a.user_id, \
     p.full_name AS author_full_name, p.avatar_url AS author_avatar_url";

const POST_COLUMNS: &str = "t.id, t.content, t.image_url, t.likes_count, t.comments_count, \
     t.tags, t.created_at, t.user_id, \
     p.full_name AS author_full_name, p.avatar_url AS author_avatar_url";

const PROFILE_COLUMNS: &str =
    "p.id, u.email, p.full_name, p.avatar_url, p.bio, p.location, p.created_at";

/// Parent table and join column for a like relation.
struct LikeRelation {
    parent: &'static str,
    column: &'static str,
}

const AFFIRMATION_LIKES: LikeRelation = LikeRelation {
    parent: "affirmations",
    column: "affirmation_id",
};

const POST_LIKES: LikeRelation = LikeRelation {
    parent: "posts",
    column: "post_id",
};

fn author_from_row(row: &PgRow) -> Option<Author> {
    let full_name: Option<String> = row.get("author_full_name");
    full_name.map(|full_name| Author {
        full_name,
        avatar_url: row.get("author_avatar_url"),
    })
}

fn affirmation_from_row(row: &PgRow) -> Affirmation {
    Affirmation {
        id: row.get("id"),
        content: row.get("content"),
        category: row.get("category"),
        image_url: row.get("image_url"),
        is_featured: row.get("is_featured"),
        likes_count: row.get("likes_count"),
        created_at: row.get("created_at"),
        user_id: row.get("user_id"),
        author: author_from_row(row),
        is_liked: None,
        is_saved: None,
    }
}

fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        content: row.get("content"),
        image_url: row.get("image_url"),
        likes_count: row.get("likes_count"),
        comments_count: row.get("comments_count"),
        tags: row.get("tags"),
        created_at: row.get("created_at"),
        user_id: row.get("user_id"),
        author: author_from_row(row),
        is_liked: None,
    }
}

fn profile_from_row(row: &PgRow) -> Profile {
    Profile {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        avatar_url: row.get("avatar_url"),
        bio: row.get("bio"),
        location: row.get("location"),
        created_at: row.get("created_at"),
    }
}

impl Db {
    async fn member_ids(
        &self,
        table: &'static str,
        column: &'static str,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {column} FROM {table} WHERE user_id = $1 AND {column} = ANY($2)",
        );
        let found: Vec<Uuid> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(ids)
            .fetch_all(self.pool())
            .await?;
        Ok(found)
    }

    /// Join-record write and counter write in one transaction, with the
    /// parent row locked so concurrent toggles serialize.
    async fn set_like(
        &self,
        relation: &LikeRelation,
        user_id: Uuid,
        target_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>> {
        let LikeRelation { parent, column } = relation;
        let mut tx = self.pool().begin().await?;

        let current: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT likes_count FROM {parent} WHERE id = $1 FOR UPDATE",
        ))
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        let result = if liked {
            sqlx::query(&format!(
                "INSERT INTO likes (user_id, {column}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            ))
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?
        } else {
            sqlx::query(&format!(
                "DELETE FROM likes WHERE user_id = $1 AND {column} = $2",
            ))
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?
        };
        let changed = result.rows_affected() > 0;

        let likes_count = if changed {
            let delta: i64 = if liked { 1 } else { -1 };
            sqlx::query_scalar(&format!(
                "UPDATE {parent} SET likes_count = GREATEST(likes_count + $2, 0) \
                 WHERE id = $1 RETURNING likes_count",
            ))
            .bind(target_id)
            .bind(delta)
            .fetch_one(&mut *tx)
            .await?
        } else {
            current
        };

        tx.commit().await?;
        Ok(Some(LikeOutcome {
            likes_count,
            changed,
        }))
    }
}

#[async_trait]
impl ContentStore for Db {
    async fn ping(&self) -> Result<()> {
        Db::ping(self).await
    }

    async fn list_affirmations(&self) -> Result<Vec<Affirmation>> {
        let rows = sqlx::query(&format!(
            "SELECT {AFFIRMATION_COLUMNS} \
             FROM affirmations a \
             LEFT JOIN profiles p ON p.id = a.user_id \
             ORDER BY a.created_at DESC, a.id DESC",
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(affirmation_from_row).collect())
    }

    async fn liked_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.member_ids("likes", "affirmation_id", user_id, ids).await
    }

    async fn saved_affirmation_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.member_ids("saved_affirmations", "affirmation_id", user_id, ids)
            .await
    }

    async fn set_affirmation_like(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>> {
        self.set_like(&AFFIRMATION_LIKES, user_id, affirmation_id, liked)
            .await
    }

    async fn set_affirmation_saved(
        &self,
        user_id: Uuid,
        affirmation_id: Uuid,
        saved: bool,
    ) -> Result<Option<bool>> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM affirmations WHERE id = $1)")
                .bind(affirmation_id)
                .fetch_one(self.pool())
                .await?;
        if !exists {
            return Ok(None);
        }

        let result = if saved {
            sqlx::query(
                "INSERT INTO saved_affirmations (user_id, affirmation_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(affirmation_id)
            .execute(self.pool())
            .await?
        } else {
            sqlx::query("DELETE FROM saved_affirmations WHERE user_id = $1 AND affirmation_id = $2")
                .bind(user_id)
                .bind(affirmation_id)
                .execute(self.pool())
                .await?
        };

        Ok(Some(result.rows_affected() > 0))
    }

    async fn insert_affirmation(&self, new: NewAffirmation) -> Result<Affirmation> {
        let row = sqlx::query(&format!(
            "WITH a AS ( \
                INSERT INTO affirmations (content, category, image_url, user_id) \
                VALUES ($1, $2, $3, $4) \
                RETURNING * \
             ) \
             SELECT {AFFIRMATION_COLUMNS} \
             FROM a \
             LEFT JOIN profiles p ON p.id = a.user_id",
        ))
        .bind(new.content)
        .bind(new.category)
        .bind(new.image_url)
        .bind(new.user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(affirmation_from_row(&row))
    }

    async fn list_saved_affirmations(&self, user_id: Uuid) -> Result<Vec<Affirmation>> {
        let rows = sqlx::query(&format!(
            "SELECT {AFFIRMATION_COLUMNS} \
             FROM saved_affirmations s \
             JOIN affirmations a ON a.id = s.affirmation_id \
             LEFT JOIN profiles p ON p.id = a.user_id \
             WHERE s.user_id = $1 \
             ORDER BY s.created_at DESC, a.id DESC",
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(affirmation_from_row).collect())
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} \
             FROM posts t \
             LEFT JOIN profiles p ON p.id = t.user_id \
             ORDER BY t.created_at DESC, t.id DESC",
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn liked_post_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.member_ids("likes", "post_id", user_id, ids).await
    }

    async fn set_post_like(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        liked: bool,
    ) -> Result<Option<LikeOutcome>> {
        self.set_like(&POST_LIKES, user_id, post_id, liked).await
    }

    async fn insert_post(&self, new: NewPost) -> Result<Post> {
        let row = sqlx::query(&format!(
            "WITH t AS ( \
                INSERT INTO posts (content, image_url, tags, user_id) \
                VALUES ($1, $2, $3, $4) \
                RETURNING * \
             ) \
             SELECT {POST_COLUMNS} \
             FROM t \
             LEFT JOIN profiles p ON p.id = t.user_id",
        ))
        .bind(new.content)
        .bind(new.image_url)
        .bind(new.tags)
        .bind(new.user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(post_from_row(&row))
    }
}

#[async_trait]
impl AccountStore for Db {
    async fn ping(&self) -> Result<()> {
        Db::ping(self).await
    }

    async fn create_account(&self, account: NewAccount) -> Result<Option<Profile>> {
        let mut tx = self.pool().begin().await?;

        let user_id: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING id",
        )
        .bind(&account.email)
        .bind(&account.password_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            tx.rollback().await?;
            return Ok(None);
        };

        let row = sqlx::query(
            "INSERT INTO profiles (id, full_name) VALUES ($1, $2) \
             RETURNING id, full_name, avatar_url, bio, location, created_at",
        )
        .bind(user_id)
        .bind(&account.full_name)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(Profile {
            id: row.get("id"),
            email: account.email,
            full_name: row.get("full_name"),
            avatar_url: row.get("avatar_url"),
            bio: row.get("bio"),
            location: row.get("location"),
            created_at: row.get("created_at"),
        }))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|row| Credentials {
            user_id: row.get("id"),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} \
             FROM profiles p \
             JOIN users u ON u.id = p.id \
             WHERE p.id = $1",
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<Profile>> {
        let row = sqlx::query(&format!(
            "WITH p AS ( \
                UPDATE profiles \
                SET full_name = COALESCE($2, full_name), \
                    avatar_url = COALESCE($3, avatar_url), \
                    bio = COALESCE($4, bio), \
                    location = COALESCE($5, location) \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT {PROFILE_COLUMNS} \
             FROM p \
             JOIN users u ON u.id = p.id",
        ))
        .bind(user_id)
        .bind(update.full_name)
        .bind(update.avatar_url)
        .bind(update.bio)
        .bind(update.location)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    async fn profile_stats(&self, user_id: Uuid) -> Result<Option<ProfileStats>> {
        let row = sqlx::query(
            "SELECT p.created_at, \
                    (SELECT COUNT(*) FROM posts WHERE user_id = p.id) AS posts_shared, \
                    (SELECT COUNT(*) FROM likes \
                     WHERE user_id = p.id AND affirmation_id IS NOT NULL) AS affirmations_liked, \
                    (SELECT COUNT(*) FROM saved_affirmations WHERE user_id = p.id) AS affirmations_saved \
             FROM profiles p \
             WHERE p.id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| {
            let created_at: OffsetDateTime = row.get("created_at");
            ProfileStats {
                posts_shared: row.get("posts_shared"),
                affirmations_liked: row.get("affirmations_liked"),
                affirmations_saved: row.get("affirmations_saved"),
                days_active: days_active(created_at, OffsetDateTime::now_utc()),
            }
        }))
    }

    async fn insert_refresh_token(&self, token: RefreshTokenRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(token.token_hash)
        .bind(token.expires_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        current: &RefreshTokenKey,
        next: RefreshTokenRecord,
    ) -> Result<bool> {
        let mut tx = self.pool().begin().await?;

        let revoked = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now(), replaced_by = $4 \
             WHERE id = $1 \
               AND user_id = $2 \
               AND token_hash = $3 \
               AND revoked_at IS NULL \
               AND expires_at > now()",
        )
        .bind(current.id)
        .bind(current.user_id)
        .bind(&current.token_hash)
        .bind(next.id)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(next.id)
        .bind(next.user_id)
        .bind(next.token_hash)
        .bind(next.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_refresh_token(&self, token: &RefreshTokenKey) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
