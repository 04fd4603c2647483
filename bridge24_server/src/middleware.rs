use crate::auth::SessionAuth;
use crate::error::ApiError;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::{body::Body, http::Request};
use bridge24_core::models::User;
use bridge24_core::Error as CoreError;
use std::sync::Arc;
use uuid::Uuid;

/// Auth provider made available to the middleware via request extensions.
#[derive(Clone)]
pub struct AuthProviderExt(pub Arc<SessionAuth>);

/// The authenticated account, inserted for downstream handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Id of the session token the request authenticated with (logout revokes it).
#[derive(Debug, Copy, Clone)]
pub struct CurrentTokenId(pub Uuid);

/// Require a valid bearer token; on success the request continues with
/// `CurrentUser` / `CurrentTokenId` attached.
pub async fn require_auth(mut req: Request<Body>, next: Next) -> Response {
    let Some(provider) = req.extensions().get::<AuthProviderExt>().cloned() else {
        return ApiError::Core(CoreError::Unauthorized(
            "auth provider not configured".to_string(),
        ))
        .into_response();
    };

    match provider.0.authenticate(req.headers()).await {
        Ok(Some((user, token_id))) => {
            req.extensions_mut().insert(CurrentUser(user));
            req.extensions_mut().insert(CurrentTokenId(token_id));
            next.run(req).await
        }
        Ok(None) => {
            ApiError::Core(CoreError::Unauthorized("missing credentials".to_string()))
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}
