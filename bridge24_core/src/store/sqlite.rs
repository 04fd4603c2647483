//! SQLite-backed contact and user store.
//!
//! Persists contacts, accounts, and session tokens across restarts. Single
//! WAL-mode SQLite file; schema migration runs on open.
//!
//! Usage:
//! ```ignore
//! let store = SqliteStore::open("/path/to/bridge24.db").await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::config::EmailMatching;
use crate::error::{Error as CoreError, Result as CoreResult};
use crate::models::{Contact, ContactDraft, SessionToken, User, UserProfile};
use crate::reconcile::models::{PlannedWrite, SyncPlan};
use crate::store::traits::{ContactStore, ListQuery, UserStore};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// A durable, file-backed store for single-node deployments.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create (or open) the store at the given file path.
    ///
    /// Creates the file and parent directories if they don't exist and
    /// applies the internal schema.
    pub async fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::backend("sqlite_store", e))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path.display()))
            .map_err(|e| CoreError::backend("sqlite_store", e))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| CoreError::backend("sqlite_store", e))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> CoreResult<()> {
        for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| CoreError::backend("sqlite_store_migration", e))?;
        }
        Ok(())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS contacts (
    id TEXT PRIMARY KEY,
    name TEXT,
    last_name TEXT,
    email TEXT NOT NULL,
    phone TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS contacts_email_ci_idx ON contacts(lower(email));

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    bio TEXT,
    phone TEXT,
    birth_date TEXT,
    date_joined TEXT NOT NULL,
    last_login TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS users_email_ci_idx ON users(lower(email));

CREATE TABLE IF NOT EXISTS session_tokens (
    token_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    secret_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    last_used_at TEXT
);

CREATE INDEX IF NOT EXISTS session_tokens_user_idx ON session_tokens(user_id);
"#;

// ── Helpers ─────────────────────────────────────────────────────

fn db_err(e: sqlx::Error) -> CoreError {
    CoreError::backend("sqlite_store", e)
}

fn unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// Corrupt key or timestamp columns surface as backend errors rather than
// being coerced to placeholder values.
fn parse_uuid(s: &str) -> CoreResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| CoreError::backend("sqlite_store", e))
}

fn parse_dt(s: &str) -> CoreResult<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .map_err(|e| CoreError::backend("sqlite_store", e))
}

fn row_to_contact(r: &SqliteRow) -> CoreResult<Contact> {
    let id: String = r.get("id");
    let created_at: String = r.get("created_at");
    let updated_at: String = r.get("updated_at");
    Ok(Contact {
        id: parse_uuid(&id)?,
        name: r.get("name"),
        last_name: r.get("last_name"),
        email: r.get("email"),
        phone: r.get("phone"),
        created_at: parse_dt(&created_at)?,
        updated_at: parse_dt(&updated_at)?,
    })
}

fn row_to_user(r: &SqliteRow) -> CoreResult<User> {
    let user_id: String = r.get("user_id");
    let birth_date: Option<String> = r.get("birth_date");
    let date_joined: String = r.get("date_joined");
    let last_login: Option<String> = r.get("last_login");
    Ok(User {
        user_id: parse_uuid(&user_id)?,
        email: r.get("email"),
        password_hash: r.get("password_hash"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        date_joined: parse_dt(&date_joined)?,
        last_login: last_login.as_deref().map(parse_dt).transpose()?,
        profile: UserProfile {
            bio: r.get("bio"),
            phone: r.get("phone"),
            birth_date: birth_date.and_then(|s| NaiveDate::from_str(&s).ok()),
        },
    })
}

async fn insert_contact_stmt<'e, E>(executor: E, contact: &Contact) -> CoreResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO contacts (id, name, last_name, email, phone, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(contact.id.to_string())
    .bind(&contact.name)
    .bind(&contact.last_name)
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(contact.created_at.to_rfc3339())
    .bind(contact.updated_at.to_rfc3339())
    .execute(executor)
    .await
    .map_err(|e| {
        if unique_violation(&e) {
            CoreError::Conflict(format!(
                "contact with email '{}' already exists",
                contact.email
            ))
        } else {
            db_err(e)
        }
    })?;
    Ok(())
}

fn contact_from_draft(draft: &ContactDraft) -> Contact {
    let now = Utc::now();
    Contact {
        id: Uuid::new_v4(),
        name: draft.name.clone(),
        last_name: draft.last_name.clone(),
        email: draft.email.clone(),
        phone: draft.phone.clone(),
        created_at: now,
        updated_at: now,
    }
}

// ── ContactStore impl ──────────────────────────────────────────

#[async_trait]
impl ContactStore for SqliteStore {
    async fn list_contacts(&self, query: ListQuery) -> CoreResult<Vec<Contact>> {
        let rows = sqlx::query(
            "SELECT id, name, last_name, email, phone, created_at, updated_at
             FROM contacts
             ORDER BY last_name, name, email
             LIMIT ?1 OFFSET ?2",
        )
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_contact).collect()
    }

    async fn get_contact(&self, id: Uuid) -> CoreResult<Option<Contact>> {
        let row = sqlx::query(
            "SELECT id, name, last_name, email, phone, created_at, updated_at
             FROM contacts WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| row_to_contact(&r)).transpose()
    }

    async fn find_contact_by_email(
        &self,
        email: &str,
        matching: EmailMatching,
    ) -> CoreResult<Option<Contact>> {
        let sql = match matching {
            EmailMatching::Exact => {
                "SELECT id, name, last_name, email, phone, created_at, updated_at
                 FROM contacts WHERE email = ?1"
            }
            EmailMatching::CaseInsensitive => {
                "SELECT id, name, last_name, email, phone, created_at, updated_at
                 FROM contacts WHERE lower(email) = lower(?1)"
            }
        };

        let row = sqlx::query(sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|r| row_to_contact(&r)).transpose()
    }

    async fn insert_contact(&self, draft: &ContactDraft) -> CoreResult<Contact> {
        let contact = contact_from_draft(draft);
        insert_contact_stmt(&self.pool, &contact).await?;
        Ok(contact)
    }

    async fn apply_plan(&self, plan: &SyncPlan) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for write in &plan.writes {
            match write {
                PlannedWrite::Create(draft) => {
                    let contact = contact_from_draft(draft);
                    // Any failure (unique violation included) drops the
                    // transaction and rolls back the whole batch.
                    insert_contact_stmt(&mut *tx, &contact).await?;
                }
                PlannedWrite::Update {
                    id,
                    name,
                    last_name,
                } => {
                    let res = sqlx::query(
                        "UPDATE contacts SET name = ?2, last_name = ?3, updated_at = ?4
                         WHERE id = ?1",
                    )
                    .bind(id.to_string())
                    .bind(name)
                    .bind(last_name)
                    .bind(Utc::now().to_rfc3339())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                    // A vanished target row aborts the batch instead of
                    // committing a silent no-op.
                    if res.rows_affected() == 0 {
                        return Err(CoreError::NotFound(format!("contact {id}")));
                    }
                }
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

// ── UserStore impl ─────────────────────────────────────────────

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, user: &User) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO users
               (user_id, email, password_hash, first_name, last_name,
                bio, phone, birth_date, date_joined, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(user.user_id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.profile.bio)
        .bind(&user.profile.phone)
        .bind(user.profile.birth_date.map(|d| d.to_string()))
        .bind(user.date_joined.to_rfc3339())
        .bind(user.last_login.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                CoreError::Conflict(format!("user with email '{}' already exists", user.email))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> CoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, email, password_hash, first_name, last_name,
                    bio, phone, birth_date, date_joined, last_login
             FROM users WHERE user_id = ?1",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, email, password_hash, first_name, last_name,
                    bio, phone, birth_date, date_joined, last_login
             FROM users WHERE lower(email) = lower(?1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn update_user(&self, user: &User) -> CoreResult<()> {
        let res = sqlx::query(
            "UPDATE users SET
               email = ?2, password_hash = ?3, first_name = ?4, last_name = ?5,
               bio = ?6, phone = ?7, birth_date = ?8, last_login = ?9
             WHERE user_id = ?1",
        )
        .bind(user.user_id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.profile.bio)
        .bind(&user.profile.phone)
        .bind(user.profile.birth_date.map(|d| d.to_string()))
        .bind(user.last_login.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("user {}", user.user_id)));
        }
        Ok(())
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> CoreResult<()> {
        sqlx::query("UPDATE users SET last_login = ?2 WHERE user_id = ?1")
            .bind(user_id.to_string())
            .bind(at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_token(&self, token: &SessionToken) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO session_tokens
               (token_id, user_id, secret_hash, created_at, expires_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(token.token_id.to_string())
        .bind(token.user_id.to_string())
        .bind(&token.secret_hash)
        .bind(token.created_at.to_rfc3339())
        .bind(token.expires_at.map(|dt| dt.to_rfc3339()))
        .bind(token.last_used_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_token(&self, token_id: Uuid) -> CoreResult<Option<SessionToken>> {
        let row = sqlx::query(
            "SELECT token_id, user_id, secret_hash, created_at, expires_at, last_used_at
             FROM session_tokens WHERE token_id = ?1",
        )
        .bind(token_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| {
            let token_id: String = r.get("token_id");
            let user_id: String = r.get("user_id");
            let created_at: String = r.get("created_at");
            let expires_at: Option<String> = r.get("expires_at");
            let last_used_at: Option<String> = r.get("last_used_at");
            Ok(SessionToken {
                token_id: parse_uuid(&token_id)?,
                user_id: parse_uuid(&user_id)?,
                secret_hash: r.get("secret_hash"),
                created_at: parse_dt(&created_at)?,
                expires_at: expires_at.as_deref().map(parse_dt).transpose()?,
                last_used_at: last_used_at.as_deref().map(parse_dt).transpose()?,
            })
        })
        .transpose()
    }

    async fn delete_token(&self, token_id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM session_tokens WHERE token_id = ?1")
            .bind(token_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn touch_token_last_used(&self, token_id: Uuid, at: DateTime<Utc>) -> CoreResult<()> {
        sqlx::query("UPDATE session_tokens SET last_used_at = ?2 WHERE token_id = ?1")
            .bind(token_id.to_string())
            .bind(at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
