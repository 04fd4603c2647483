use crate::config::EmailMatching;
use crate::models::{Contact, ContactDraft, SessionToken, User};
use crate::reconcile::models::SyncPlan;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Pagination for list operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

/// Durable storage for contacts.
///
/// `apply_plan` is the only batched write path and must be atomic: either
/// every planned create/update lands or none do.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn list_contacts(&self, query: ListQuery) -> Result<Vec<Contact>>;

    async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>>;

    /// Look up a contact by email under the given matching policy.
    async fn find_contact_by_email(
        &self,
        email: &str,
        matching: EmailMatching,
    ) -> Result<Option<Contact>>;

    /// Insert one contact. Fails with `Error::Conflict` when the email is
    /// already taken (case-insensitively).
    async fn insert_contact(&self, draft: &ContactDraft) -> Result<Contact>;

    /// Apply a reconciliation plan inside a single transaction.
    async fn apply_plan(&self, plan: &SyncPlan) -> Result<()>;
}

/// Durable storage for accounts and their session tokens.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `Error::Conflict` when the email is
    /// already registered (case-insensitively).
    async fn create_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Replace all mutable fields of an existing user row.
    async fn update_user(&self, user: &User) -> Result<()>;

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn insert_token(&self, token: &SessionToken) -> Result<()>;

    async fn get_token(&self, token_id: Uuid) -> Result<Option<SessionToken>>;

    async fn delete_token(&self, token_id: Uuid) -> Result<()>;

    async fn touch_token_last_used(&self, token_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}
