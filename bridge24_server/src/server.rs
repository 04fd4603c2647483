use crate::auth::SessionAuth;
use crate::middleware::AuthProviderExt;
use crate::routes;
use axum::{Extension, Router};
use bridge24_core::forward::ContactForwarder;
use bridge24_core::store::traits::{ContactStore, UserStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub contacts: Arc<dyn ContactStore>,
    pub users: Arc<dyn UserStore>,
    pub forwarder: Arc<ContactForwarder>,
    pub auth: Arc<SessionAuth>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        users: Arc<dyn UserStore>,
        forwarder: Arc<ContactForwarder>,
    ) -> Self {
        let auth = Arc::new(SessionAuth::new(users.clone()));
        Self {
            contacts,
            users,
            forwarder,
            auth,
            started_at: Instant::now(),
        }
    }
}

#[tracing::instrument(level = "debug", skip_all)]
pub fn router(state: AppState) -> Router {
    let state = Arc::new(state);
    let auth_provider = AuthProviderExt(state.auth.clone());

    Router::new()
        .merge(routes::router())
        .layer(Extension(state))
        .layer(Extension(auth_provider))
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            MakeRequestUuid,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tracing::instrument(level = "info", skip_all)]
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use bridge24_core::forward::ContactSink;
    use bridge24_core::models::Contact;
    use bridge24_core::store::sqlite::SqliteStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct NullSink;

    #[async_trait::async_trait]
    impl ContactSink for NullSink {
        async fn push_contact(&self, _contact: &Contact) -> bridge24_core::Result<()> {
            Ok(())
        }
    }

    async fn test_app() -> Router {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("test.db")).await.unwrap());
        // Leak the tempdir so the database outlives this function.
        std::mem::forget(dir);

        let forwarder = Arc::new(ContactForwarder::new(store.clone(), Arc::new(NullSink)));
        router(AppState::new(store.clone(), store, forwarder))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn register_and_token(app: &Router, email: &str) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/users",
                json!({
                    "email": email,
                    "password": "hunter22",
                    "password_confirm": "hunter22",
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_then_login() {
        let app = test_app().await;
        register_and_token(&app, "ada@example.com").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/users/login",
                json!({"email": "Ada@Example.com", "password": "hunter22"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["token"].as_str().unwrap().starts_with("b24_"));
        assert_eq!(body["user"]["email"], "ada@example.com");

        let response = app
            .oneshot(post_json(
                "/api/v1/users/login",
                json!({"email": "ada@example.com", "password": "wrong"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_field_error() {
        let app = test_app().await;
        register_and_token(&app, "dup@example.com").await;

        let response = app
            .oneshot(post_json(
                "/api/v1/users",
                json!({
                    "email": "DUP@example.com",
                    "password": "hunter22",
                    "password_confirm": "hunter22",
                    "first_name": "A",
                    "last_name": "B",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["field"], "email");
    }

    #[tokio::test]
    async fn contacts_require_a_token() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/contacts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn contact_create_and_list() {
        let app = test_app().await;
        let token = register_and_token(&app, "crm@example.com").await;

        let mut request = post_json(
            "/api/v1/contacts",
            json!({"name": "Grace", "last_name": "Hopper", "email": " Grace@Navy.mil "}),
        );
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["email"], "grace@navy.mil");
        assert_eq!(body["full_name"], "Grace Hopper");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/contacts")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_contact_is_a_field_error() {
        let app = test_app().await;
        let token = register_and_token(&app, "crm2@example.com").await;

        for expected in [StatusCode::CREATED, StatusCode::BAD_REQUEST] {
            let mut request =
                post_json("/api/v1/contacts", json!({"email": "same@example.com"}));
            request.headers_mut().insert(
                header::AUTHORIZATION,
                format!("Bearer {token}").parse().unwrap(),
            );
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn contact_mutations_are_denied() {
        let app = test_app().await;
        let token = register_and_token(&app, "crm3@example.com").await;

        for method in ["PUT", "PATCH", "DELETE"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(format!("/api/v1/contacts/{}", uuid::Uuid::new_v4()))
                        .header(header::AUTHORIZATION, format!("Bearer {token}"))
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            let body = body_json(response).await;
            assert_eq!(body["error"], "not allowed: contacts are managed in the CRM");
        }
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let app = test_app().await;
        let token = register_and_token(&app, "bye@example.com").await;

        let mut request = Request::builder()
            .method("POST")
            .uri("/api/v1/users/logout")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        request = Request::builder()
            .uri("/api/v1/users/profile")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_update_round_trips() {
        let app = test_app().await;
        let token = register_and_token(&app, "prof@example.com").await;

        let mut request = post_json(
            "/api/v1/users/profile",
            json!({"bio": "engineer", "phone": "+1-555-0100"}),
        );
        *request.method_mut() = axum::http::Method::PATCH;
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/users/profile")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["profile"]["bio"], "engineer");
        assert_eq!(body["profile"]["phone"], "+1-555-0100");
    }
}
