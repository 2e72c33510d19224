use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::affirmation::MAX_CONTENT_LEN;
use crate::domain::engagement::Likeable;
use crate::domain::profile::Author;

pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
}

impl Likeable for Post {
    fn id(&self) -> Uuid {
        self.id
    }

    fn liked(&self) -> bool {
        self.is_liked.unwrap_or(false)
    }

    fn likes_count_mut(&mut self) -> &mut i64 {
        &mut self.likes_count
    }

    fn set_liked(&mut self, liked: bool) {
        self.is_liked = Some(liked);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub user_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewPost {
    /// Expects trimmed content and tags already run through [`normalize_tags`].
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.content.is_empty() {
            return Err("content is required");
        }
        if self.content.chars().count() > MAX_CONTENT_LEN {
            return Err("content must be at most 2000 characters");
        }
        if self.tags.len() > MAX_TAGS {
            return Err("at most 10 tags per post");
        }
        if self.tags.iter().any(|tag| tag.chars().count() > MAX_TAG_LEN) {
            return Err("tags must be at most 32 characters");
        }
        Ok(())
    }
}

/// Trims tags, drops blank ones and removes duplicates keeping the first
/// occurrence.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || out.iter().any(|seen| seen == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}
