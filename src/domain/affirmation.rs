use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::engagement::Likeable;
use crate::domain::profile::Author;

pub const MAX_CONTENT_LEN: usize = 2000;
pub const MAX_CATEGORY_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affirmation {
    pub id: Uuid,
    pub content: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_featured: bool,
    pub likes_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    /// Relative to the current viewer; absent when nobody is signed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_saved: Option<bool>,
}

impl Likeable for Affirmation {
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
pub struct NewAffirmation {
    pub user_id: Uuid,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewAffirmation {
    /// Checks trimmed content and category against the stored limits.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.content.is_empty() {
            return Err("content is required");
        }
        if self.content.chars().count() > MAX_CONTENT_LEN {
            return Err("content must be at most 2000 characters");
        }
        if self.category.is_empty() {
            return Err("category is required");
        }
        if self.category.chars().count() > MAX_CATEGORY_LEN {
            return Err("category must be at most 64 characters");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category {
        id: "body",
        name: "Body Love",
    },
    Category {
        id: "confidence",
        name: "Confidence",
    },
    Category {
        id: "self-worth",
        name: "Self-Worth",
    },
    Category {
        id: "healing",
        name: "Healing",
    },
];

/// Picks the affirmation of the day from `affirmations`.
///
/// Featured entries win when there are any. Candidates are ordered oldest
/// first so a new affirmation does not reshuffle the rotation.
pub fn pick_daily(affirmations: &[Affirmation], day_of_year: u16) -> Option<&Affirmation> {
    let mut candidates: Vec<&Affirmation> =
        affirmations.iter().filter(|a| a.is_featured).collect();
    if candidates.is_empty() {
        candidates = affirmations.iter().collect();
    }
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let index = usize::from(day_of_year) % candidates.len();
    Some(candidates[index])
}
