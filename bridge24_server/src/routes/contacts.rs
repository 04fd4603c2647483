use crate::error::ApiError;
use crate::policy::{Action, CONTACTS};
use crate::server::AppState;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Extension, Json};
use bridge24_core::models::{Contact, ContactDraft};
use bridge24_core::store::traits::ListQuery;
use bridge24_core::Error as CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactView {
    pub id: Uuid,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Contact> for ContactView {
    fn from(c: &Contact) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            last_name: c.last_name.clone(),
            email: c.email.clone(),
            phone: c.phone.clone(),
            full_name: c.full_name(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route(
            "/contacts/{id}",
            put(denied_update).patch(denied_update).delete(denied_delete),
        )
}

#[tracing::instrument(level = "debug", skip_all)]
pub async fn list_contacts(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ContactView>>, ApiError> {
    let defaults = ListQuery::default();
    let query = ListQuery {
        limit: params.limit.unwrap_or(defaults.limit),
        offset: params.offset.unwrap_or(defaults.offset),
    };
    let contacts = state.contacts.list_contacts(query).await?;
    Ok(Json(contacts.iter().map(ContactView::from).collect()))
}

#[tracing::instrument(level = "debug", skip_all)]
pub async fn create_contact(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactView>), ApiError> {
    CONTACTS.check(Action::Create)?;

    let draft = ContactDraft {
        name: req.name,
        last_name: req.last_name,
        email: req.email,
        phone: req.phone,
    };

    let contact = match state.forwarder.create_and_forward(draft).await {
        Ok(c) => c,
        // Duplicate or bad email surfaces as a field-level validation error.
        Err(CoreError::Conflict(msg)) | Err(CoreError::InvalidInput(msg)) => {
            return Err(ApiError::Validation {
                field: "email".into(),
                message: msg,
            });
        }
        Err(e) => return Err(e.into()),
    };

    Ok((StatusCode::CREATED, Json(ContactView::from(&contact))))
}

/// Update and delete are permanently disabled for contacts; the paths still
/// exist so clients get the fixed policy answer instead of a 404. Each
/// handler consults the policy table for its own action.
pub async fn denied_update(
    axum::extract::Path(_id): axum::extract::Path<String>,
) -> Result<StatusCode, ApiError> {
    CONTACTS.check(Action::Update)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn denied_delete(
    axum::extract::Path(_id): axum::extract::Path<String>,
) -> Result<StatusCode, ApiError> {
    CONTACTS.check(Action::Delete)?;
    Ok(StatusCode::NO_CONTENT)
}
