use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::profile::Profile;
use crate::infra::store::{NewAccount, RefreshTokenKey, RefreshTokenRecord, SharedAccountStore};

const TOKEN_ISSUER: &str = "embrace";

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    accounts: SharedAccountStore,
    access_key: [u8; 32],
    refresh_key: [u8; 32],
    access_ttl_minutes: u64,
    refresh_ttl_days: u64,
}

impl AuthService {
    pub fn new(
        accounts: SharedAccountStore,
        access_key: [u8; 32],
        refresh_key: [u8; 32],
        access_ttl_minutes: u64,
        refresh_ttl_days: u64,
    ) -> Self {
        Self {
            accounts,
            access_key,
            refresh_key,
            access_ttl_minutes,
            refresh_ttl_days,
        }
    }

    /// Creates the account and its profile. `None` when the email is taken.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Option<(Profile, TokenPair)>> {
        let password_hash = hash_password(password)?;
        let profile = self
            .accounts
            .create_account(NewAccount {
                email: normalize_email(email),
                password_hash,
                full_name: full_name.trim().to_string(),
            })
            .await?;

        let Some(profile) = profile else {
            return Ok(None);
        };

        let tokens = self.issue_token_pair(profile.id).await?;
        Ok(Some((profile, tokens)))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Option<(Profile, TokenPair)>> {
        let credentials = match self
            .accounts
            .find_credentials(&normalize_email(email))
            .await?
        {
            Some(credentials) => credentials,
            None => return Ok(None),
        };

        if credentials.password_hash.is_empty()
            || !verify_password(password, &credentials.password_hash)?
        {
            return Ok(None);
        }

        let profile = self
            .accounts
            .get_profile(credentials.user_id)
            .await?
            .ok_or_else(|| anyhow!("profile missing for user {}", credentials.user_id))?;

        let tokens = self.issue_token_pair(credentials.user_id).await?;
        Ok(Some((profile, tokens)))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<TokenPair>> {
        let current = match self.verify_refresh_token(refresh_token) {
            Ok(current) => current,
            Err(_) => return Ok(None),
        };

        let (record, pair) = self.build_token_pair(current.user_id)?;
        if !self.accounts.rotate_refresh_token(&current, record).await? {
            return Ok(None);
        }
        Ok(Some(pair))
    }

    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<bool> {
        let current = match self.verify_refresh_token(refresh_token) {
            Ok(current) => current,
            Err(_) => return Ok(false),
        };
        self.accounts.revoke_refresh_token(&current).await
    }

    pub fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token, self.access_key)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }
        let user_id = claim_uuid(&claims, "sub")?;
        Ok(Some(AuthSession { user_id }))
    }

    fn decrypt_claims(&self, token: &str, key_bytes: [u8; 32]) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&key_bytes)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }

    fn build_access_claims(&self, user_id: Uuid) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "access")?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(self.access_ttl_minutes as i64);
        Ok((claims, expires_at))
    }

    fn build_refresh_claims(
        &self,
        user_id: Uuid,
        refresh_id: Uuid,
    ) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.refresh_ttl_days * 24 * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.token_identifier(&refresh_id.to_string())?;
        claims.add_additional("typ", "refresh")?;
        let expires_at = OffsetDateTime::now_utc() + Duration::days(self.refresh_ttl_days as i64);
        Ok((claims, expires_at))
    }

    fn build_token_pair(&self, user_id: Uuid) -> Result<(RefreshTokenRecord, TokenPair)> {
        let (access_claims, access_expires_at) = self.build_access_claims(user_id)?;
        let access_key = SymmetricKey::<V4>::from(&self.access_key)?;
        let access_token = local::encrypt(&access_key, &access_claims, None, None)?;

        let refresh_id = Uuid::new_v4();
        let (refresh_claims, refresh_expires_at) = self.build_refresh_claims(user_id, refresh_id)?;
        let refresh_key = SymmetricKey::<V4>::from(&self.refresh_key)?;
        let refresh_token = local::encrypt(&refresh_key, &refresh_claims, None, None)?;

        let record = RefreshTokenRecord {
            id: refresh_id,
            user_id,
            token_hash: hash_token(&refresh_token),
            expires_at: refresh_expires_at,
        };
        let pair = TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        };
        Ok((record, pair))
    }

    async fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let (record, pair) = self.build_token_pair(user_id)?;
        self.accounts.insert_refresh_token(record).await?;
        Ok(pair)
    }

    fn verify_refresh_token(&self, token: &str) -> Result<RefreshTokenKey> {
        let claims = match self.decrypt_claims(token, self.refresh_key)? {
            Some(claims) => claims,
            None => return Err(anyhow!("invalid refresh token")),
        };
        if !has_token_type(&claims, "refresh") {
            return Err(anyhow!("invalid refresh token"));
        }
        Ok(RefreshTokenKey {
            id: claim_uuid(&claims, "jti")?,
            user_id: claim_uuid(&claims, "sub")?,
            token_hash: hash_token(token),
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
