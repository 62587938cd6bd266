//! Principal resolution.
//!
//! The identity service is external: this crate only asks it "who holds
//! this token". [`StaticTokenAuthenticator`] is the development stand-in,
//! fed from `AUTH_TOKENS`.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use thiserror::Error;

use booking::model::HolderId;

use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub holder_id: HolderId,
    pub is_admin: bool,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `None` when the token is unknown or revoked.
    async fn resolve(&self, token: &str) -> Option<Principal>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthConfigError {
    #[error("malformed token entry '{0}', expected token:holder_id[:admin]")]
    Malformed(String),

    #[error("invalid holder id in entry '{0}'")]
    InvalidHolder(String),

    #[error("token listed twice: '{0}'")]
    DuplicateToken(String),
}

/// Fixed token table.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    /// Parse `token:holder_id[:admin]` entries separated by commas.
    /// Blank entries are skipped.
    pub fn parse(entries: &str) -> Result<Self, AuthConfigError> {
        let mut tokens = HashMap::new();

        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();

            let (token, holder, is_admin) = match parts.as_slice() {
                [token, holder] => (*token, *holder, false),
                [token, holder, "admin"] => (*token, *holder, true),
                _ => return Err(AuthConfigError::Malformed(entry.to_string())),
            };

            if token.is_empty() {
                return Err(AuthConfigError::Malformed(entry.to_string()));
            }

            let holder_id: HolderId = holder
                .parse()
                .map_err(|_| AuthConfigError::InvalidHolder(entry.to_string()))?;

            let principal = Principal {
                holder_id,
                is_admin,
            };

            if tokens.insert(token.to_string(), principal).is_some() {
                return Err(AuthConfigError::DuplicateToken(token.to_string()));
            }
        }

        Ok(Self { tokens })
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn resolve(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).copied()
    }
}

/// Credential from `Authorization: Bearer <t>` or `Authorization: Token <t>`.
fn credential(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;

    if !(scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token")) {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Any authenticated caller. Rejects with 401 "Please login".
#[derive(Debug, Clone, Copy)]
pub struct CurrentPrincipal(pub Principal);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = credential(&parts.headers).ok_or_else(ApiError::login_required)?;

        state
            .auth
            .resolve(token)
            .await
            .map(Self)
            .ok_or_else(ApiError::login_required)
    }
}

/// Authenticated admin. Non-admins get 401, not 403.
#[derive(Debug, Clone, Copy)]
pub struct AdminPrincipal(pub Principal);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentPrincipal(p) = CurrentPrincipal::from_request_parts(parts, state).await?;

        if !p.is_admin {
            return Err(ApiError::not_admin());
        }

        Ok(Self(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_users_and_admins() {
        let auth = StaticTokenAuthenticator::parse(" alice:1 , root:99:admin,, ").unwrap();
        assert_eq!(auth.len(), 2);
        assert_eq!(
            auth.tokens.get("alice"),
            Some(&Principal {
                holder_id: 1,
                is_admin: false
            })
        );
        assert!(auth.tokens["root"].is_admin);
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(matches!(
            StaticTokenAuthenticator::parse("alice"),
            Err(AuthConfigError::Malformed(_))
        ));
        assert!(matches!(
            StaticTokenAuthenticator::parse("alice:1:superuser"),
            Err(AuthConfigError::Malformed(_))
        ));
        assert!(matches!(
            StaticTokenAuthenticator::parse("alice:one"),
            Err(AuthConfigError::InvalidHolder(_))
        ));
        assert!(matches!(
            StaticTokenAuthenticator::parse("a:1,a:2"),
            Err(AuthConfigError::DuplicateToken(_))
        ));
    }

    #[test]
    fn empty_list_is_empty_table() {
        assert!(StaticTokenAuthenticator::parse("").unwrap().is_empty());
    }

    #[test]
    fn credential_accepts_bearer_and_token_schemes() {
        let mut h = HeaderMap::new();
        assert_eq!(credential(&h), None);

        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(credential(&h), Some("abc"));

        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Token xyz"));
        assert_eq!(credential(&h), Some("xyz"));

        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(credential(&h), None);

        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(credential(&h), None);
    }

    #[tokio::test]
    async fn resolves_known_tokens_only() {
        let auth = StaticTokenAuthenticator::default().with_token(
            "t",
            Principal {
                holder_id: 5,
                is_admin: false,
            },
        );
        assert_eq!(auth.resolve("t").await.map(|p| p.holder_id), Some(5));
        assert!(auth.resolve("nope").await.is_none());
    }
}
