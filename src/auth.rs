use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::{AppState, error::ApiError};

const TOKEN_COOKIE: &str = "api_token";

/// A caller holding one of the configured API tokens.
#[derive(Clone, Copy, Debug)]
pub struct ApiUser;

/// A caller holding the admin token.
#[derive(Clone, Copy, Debug)]
pub struct AdminUser;

/// Network origin of the request, used to tell raters apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `Authorization: Bearer <token>` (or `Token <token>`), falling back to the `api_token` cookie.
fn presented_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("Token ")))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    from_header.or_else(|| {
        CookieJar::from_headers(headers)
            .get(TOKEN_COOKIE)
            .map(|c| c.value().trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

fn check_token<'a>(
    presented: Option<String>,
    accepted: impl IntoIterator<Item = &'a String>,
) -> Result<(), ApiError> {
    let presented = presented.ok_or(ApiError::Unauthenticated)?;
    if accepted.into_iter().any(|t| *t == presented) { Ok(()) } else { Err(ApiError::Forbidden) }
}

/// First `X-Forwarded-For` entry when present, else the socket peer.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    forwarded.or_else(|| peer.map(|addr| addr.ip().to_string()))
}

impl FromRequestParts<Arc<AppState>> for ApiUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        check_token(presented_token(&parts.headers), &state.config.api_tokens)?;
        Ok(ApiUser)
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(admin_token) = &state.config.admin_token else {
            return Err(ApiError::Forbidden);
        };
        check_token(presented_token(&parts.headers), [admin_token])?;
        Ok(AdminUser)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
        client_identity(&parts.headers, peer).map(ClientIdentity).ok_or(ApiError::UnknownClient)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
        Ok(client_identity(&parts.headers, peer).map(ClientIdentity))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        let peer: SocketAddr = "192.168.1.2:5555".parse().unwrap();
        assert_eq!(client_identity(&headers, Some(peer)).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn peer_address_without_forwarding() {
        let peer: SocketAddr = "192.168.1.2:5555".parse().unwrap();
        assert_eq!(client_identity(&HeaderMap::new(), Some(peer)).as_deref(), Some("192.168.1.2"));

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_identity(&headers, Some(peer)).as_deref(), Some("192.168.1.2"));
        assert_eq!(client_identity(&HeaderMap::new(), None), None);
    }

    #[test]
    fn token_from_header_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(presented_token(&headers).as_deref(), Some("s3cret"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; api_token=abc"));
        assert_eq!(presented_token(&headers).as_deref(), Some("abc"));

        assert_eq!(presented_token(&HeaderMap::new()), None);
    }

    #[test]
    fn unknown_tokens_are_forbidden() {
        let accepted = vec!["good".to_string()];
        assert!(check_token(Some("good".to_string()), &accepted).is_ok());
        assert!(matches!(check_token(Some("bad".to_string()), &accepted), Err(ApiError::Forbidden)));
        assert!(matches!(check_token(None, &accepted), Err(ApiError::Unauthenticated)));
    }
}
