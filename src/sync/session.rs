use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::profile::Profile;

/// The signed-in identity, as the feeds see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

impl From<Profile> for Viewer {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            avatar_url: profile.avatar_url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
struct SignedIn {
    viewer: Viewer,
    tokens: Option<SessionTokens>,
}

/// Shared handle on the current viewer.
///
/// Clones share state. Subscribers are woken only when the identity changes
/// (sign-in, sign-out, switching user); token refreshes are silent.
#[derive(Clone)]
pub struct Session {
    state: Arc<watch::Sender<Option<SignedIn>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn viewer(&self) -> Option<Viewer> {
        self.state.borrow().as_ref().map(|s| s.viewer.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .borrow()
            .as_ref()
            .and_then(|s| s.tokens.as_ref())
            .map(|t| t.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state
            .borrow()
            .as_ref()
            .and_then(|s| s.tokens.as_ref())
            .map(|t| t.refresh_token.clone())
    }

    pub fn sign_in_as(&self, viewer: Viewer, tokens: Option<SessionTokens>) {
        self.state.send_if_modified(move |current| {
            let changed = current.as_ref().map(|s| s.viewer.id) != Some(viewer.id);
            *current = Some(SignedIn { viewer, tokens });
            changed
        });
    }

    /// Replaces the tokens of the current viewer. No-op when signed out.
    pub fn update_tokens(&self, tokens: SessionTokens) {
        self.state.send_if_modified(move |current| {
            if let Some(signed_in) = current {
                signed_in.tokens = Some(tokens);
            }
            false
        });
    }

    pub fn sign_out(&self) {
        self.state.send_if_modified(|current| current.take().is_some());
    }

    pub fn subscribe(&self) -> SessionChanges {
        SessionChanges {
            rx: self.state.subscribe(),
        }
    }
}

/// Stream of identity transitions.
pub struct SessionChanges {
    rx: watch::Receiver<Option<SignedIn>>,
}

impl SessionChanges {
    /// Waits for the next identity transition. Returns false once every
    /// `Session` handle is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
