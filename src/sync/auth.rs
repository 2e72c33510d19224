use anyhow::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::domain::profile::Profile;
use crate::sync::client::{ApiClient, RefreshBody, TokensBody};
use crate::sync::session::{Session, Viewer};

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    full_name: &'a str,
}

#[derive(Serialize)]
struct SignInBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthBody {
    profile: Profile,
    #[serde(flatten)]
    tokens: TokensBody,
}

/// Signs a [`Session`] in and out against the API.
#[derive(Clone)]
pub struct AuthClient {
    api: ApiClient,
}

impl AuthClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn session(&self) -> &Session {
        self.api.session()
    }

    pub async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<Viewer> {
        let request = self
            .api
            .request(Method::POST, "auth/signup")?
            .json(&SignUpBody {
                email,
                password,
                full_name,
            });
        let body: AuthBody = self.api.send(request).await?;
        Ok(self.establish(body))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Viewer> {
        let request = self
            .api
            .request(Method::POST, "auth/signin")?
            .json(&SignInBody { email, password });
        let body: AuthBody = self.api.send(request).await?;
        Ok(self.establish(body))
    }

    /// Rotates the refresh token. Subscribers are not notified.
    ///
    /// [`ApiClient`] already does this when the server rejects an access
    /// token, so callers only need it to refresh ahead of expiry.
    pub async fn refresh(&self) -> Result<()> {
        self.api.refresh().await
    }

    /// Revokes the refresh token and clears the session. The session is
    /// cleared even when revocation fails.
    pub async fn sign_out(&self) -> Result<()> {
        let revoked = match self.session().refresh_token() {
            Some(refresh_token) => self.revoke(&refresh_token).await,
            None => Ok(()),
        };

        self.session().sign_out();
        if let Err(err) = &revoked {
            tracing::warn!(error = ?err, "failed to revoke refresh token");
        }
        revoked
    }

    async fn revoke(&self, refresh_token: &str) -> Result<()> {
        let request = self
            .api
            .request(Method::POST, "auth/signout")?
            .json(&RefreshBody { refresh_token });
        self.api.send_empty(request).await
    }

    fn establish(&self, body: AuthBody) -> Viewer {
        let viewer = Viewer::from(body.profile);
        tracing::info!(user_id = %viewer.id, "signed in");
        self.session()
            .sign_in_as(viewer.clone(), Some(body.tokens.into()));
        viewer
    }
}
