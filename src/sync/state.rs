use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::engagement::Likeable;

/// Local state of one feed.
pub(crate) struct FeedState<T> {
    items: Vec<T>,
    loading: bool,
}

impl<T: Likeable + Clone> FeedState<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
        }
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.items.clone()
    }

    pub(crate) fn loading(&self) -> bool {
        self.loading
    }

    pub(crate) fn replace(&mut self, items: Vec<T>) {
        self.items = items;
    }

    pub(crate) fn finish_loading(&mut self) {
        self.loading = false;
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Applies `f` to the item with `id`. Returns false when it is absent.
    pub(crate) fn update<F>(&mut self, id: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        match self.items.iter_mut().find(|item| item.id() == id) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }
}

/// Turns a membership query into a set. A failed query counts as empty.
pub(crate) fn membership(result: anyhow::Result<Vec<Uuid>>, relation: &str) -> HashSet<Uuid> {
    match result {
        Ok(ids) => ids.into_iter().collect(),
        Err(err) => {
            tracing::warn!(error = ?err, relation, "membership query failed, treating as empty");
            HashSet::new()
        }
    }
}
