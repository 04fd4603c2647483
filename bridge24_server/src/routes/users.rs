use crate::error::ApiError;
use crate::middleware::{CurrentTokenId, CurrentUser};
use crate::server::AppState;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json};
use bridge24_core::models::{User, UserProfile};
use bridge24_core::Error as CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// User as shown to API clients. Never includes the password hash.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub profile: UserProfile,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.user_id,
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            date_joined: u.date_joined,
            last_login: u.last_login,
            profile: u.profile.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserView,
}

/// Routes reachable without a token.
pub fn public_router() -> axum::Router {
    axum::Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
}

/// Routes behind the auth middleware.
pub fn protected_router() -> axum::Router {
    axum::Router::new()
        .route("/users/logout", post(logout))
        .route("/users/profile", get(get_profile).patch(update_profile))
        .route("/users/change-password", put(change_password))
}

fn validate_passwords(password: &str, confirm: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::Validation {
            field: "password".into(),
            message: "password must not be empty".into(),
        });
    }
    if password != confirm {
        return Err(ApiError::Validation {
            field: "password_confirm".into(),
            message: "passwords do not match".into(),
        });
    }
    Ok(())
}

#[tracing::instrument(level = "debug", skip_all)]
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::Validation {
            field: "email".into(),
            message: "email must not be empty".into(),
        });
    }
    validate_passwords(&req.password, &req.password_confirm)?;

    let user = User {
        user_id: Uuid::new_v4(),
        email,
        password_hash: crate::auth::SessionAuth::hash_password(&req.password)?,
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        date_joined: Utc::now(),
        last_login: None,
        profile: UserProfile::default(),
    };

    match state.users.create_user(&user).await {
        Ok(()) => {}
        Err(CoreError::Conflict(_)) => {
            return Err(ApiError::Validation {
                field: "email".into(),
                message: "a user with this email already exists".into(),
            });
        }
        Err(e) => return Err(e.into()),
    }

    let token = state.auth.issue_token(user.user_id).await?;
    tracing::info!(user_id = %user.user_id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: UserView::from(&user),
        }),
    ))
}

#[tracing::instrument(level = "debug", skip_all)]
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    // Unknown email and wrong password answer identically.
    let invalid = || ApiError::Core(CoreError::Unauthorized("invalid credentials".into()));

    let Some(mut user) = state.users.find_user_by_email(&email).await? else {
        return Err(invalid());
    };
    if !crate::auth::SessionAuth::verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }

    let now = Utc::now();
    state.users.touch_last_login(user.user_id, now).await?;
    user.last_login = Some(now);

    let token = state.auth.issue_token(user.user_id).await?;
    tracing::debug!(user_id = %user.user_id, "login");

    Ok(Json(SessionResponse {
        token,
        user: UserView::from(&user),
    }))
}

#[tracing::instrument(level = "debug", skip_all)]
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentTokenId(token_id)): Extension<CurrentTokenId>,
) -> Result<StatusCode, ApiError> {
    state.auth.revoke_token(token_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_profile(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<UserView> {
    Json(UserView::from(&user))
}

#[tracing::instrument(level = "debug", skip_all)]
pub async fn update_profile(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserView>, ApiError> {
    let mut user = user;
    if let Some(first_name) = req.first_name {
        user.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = req.last_name {
        user.last_name = last_name.trim().to_string();
    }
    if let Some(bio) = req.bio {
        user.profile.bio = Some(bio);
    }
    if let Some(phone) = req.phone {
        user.profile.phone = Some(phone);
    }
    if let Some(birth_date) = req.birth_date {
        user.profile.birth_date = Some(birth_date);
    }

    state.users.update_user(&user).await?;
    Ok(Json(UserView::from(&user)))
}

#[tracing::instrument(level = "debug", skip_all)]
pub async fn change_password(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if !crate::auth::SessionAuth::verify_password(&req.old_password, &user.password_hash) {
        return Err(ApiError::Validation {
            field: "old_password".into(),
            message: "old password is incorrect".into(),
        });
    }
    validate_passwords(&req.new_password, &req.new_password_confirm)?;

    let mut user = user;
    user.password_hash = crate::auth::SessionAuth::hash_password(&req.new_password)?;
    state.users.update_user(&user).await?;
    tracing::info!(user_id = %user.user_id, "password changed");

    Ok(StatusCode::NO_CONTENT)
}
