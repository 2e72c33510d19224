use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum LikeTarget {
    Affirmation(Uuid),
    Post(Uuid),
}

/// Presence means "liked". Unique per (user, target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Like {
    pub user_id: Uuid,
    pub target: LikeTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Saved {
    pub user_id: Uuid,
    pub affirmation_id: Uuid,
}

/// Result of an atomic like toggle on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub likes_count: i64,
    /// False when the join record was already in the requested state.
    pub changed: bool,
}

/// A record with a viewer-relative like flag and a denormalized counter.
pub trait Likeable {
    fn id(&self) -> Uuid;
    fn liked(&self) -> bool;
    fn likes_count_mut(&mut self) -> &mut i64;
    fn set_liked(&mut self, liked: bool);

    /// Flips the like flag and moves the counter one step the same way.
    fn flip_like(&mut self) {
        let liked = !self.liked();
        let count = self.likes_count_mut();
        *count = if liked { *count + 1 } else { (*count - 1).max(0) };
        self.set_liked(liked);
    }
}
