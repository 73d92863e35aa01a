use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Authenticated identity taken from a `Bearer` session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing token".into()))?;

        let mut split = header.splitn(2, ' ');
        let scheme = split.next().unwrap_or_default();
        let token = split.next().map(str::trim).unwrap_or_default();

        if token.is_empty() {
            return Err(AppError::Unauthorized("missing token".into()));
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AppError::InvalidToken("invalid token".into()));
        }

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::InvalidToken("invalid token".into())
        })?;

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::http::Request;

    #[derive(Clone)]
    struct KeysOnly(JwtKeys);

    impl FromRef<KeysOnly> for JwtKeys {
        fn from_ref(s: &KeysOnly) -> Self {
            s.0.clone()
        }
    }

    fn state() -> KeysOnly {
        KeysOnly(JwtKeys::from(&JwtConfig {
            secret: "guard-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 10,
        }))
    }

    async fn run(header: Option<&str>, st: &KeysOnly) -> Result<AuthUser, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, st).await
    }

    #[tokio::test]
    async fn accepts_valid_bearer_token() {
        let st = state();
        let user_id = Uuid::new_v4();
        let token = st.0.sign(user_id).unwrap();
        let user = run(Some(&format!("Bearer {token}")), &st).await.unwrap();
        assert_eq!(user, AuthUser(user_id));
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let err = run(None, &state()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "missing token"));
    }

    #[tokio::test]
    async fn rejects_bearer_without_token() {
        let err = run(Some("Bearer "), &state()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let err = run(Some("Bearer not.a.jwt"), &state()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken(ref m) if m == "invalid token"));
    }

    #[tokio::test]
    async fn rejects_other_scheme() {
        let st = state();
        let token = st.0.sign(Uuid::new_v4()).unwrap();
        let err = run(Some(&format!("Basic {token}")), &st).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken(_)));
    }
}
