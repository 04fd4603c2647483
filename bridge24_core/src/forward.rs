//! Single-contact forwarding: persist a new local contact, then push it to
//! the remote CRM exactly once, best-effort.

use crate::config::EmailMatching;
use crate::models::{Contact, ContactDraft};
use crate::store::traits::ContactStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Where newly created contacts get pushed. Implemented by the Bitrix24
/// client; tests swap in an in-process sink.
#[async_trait]
pub trait ContactSink: Send + Sync {
    /// Push one contact to the remote CRM. A transport failure or an
    /// `error` field in the response surfaces as an error; the caller
    /// decides whether that is fatal.
    async fn push_contact(&self, contact: &Contact) -> Result<()>;
}

/// The Single-Contact Forwarder.
///
/// Local persistence is authoritative: once validation passes and the row is
/// committed, a failed remote push is logged and swallowed. At-most-once,
/// no retry, no rollback.
pub struct ContactForwarder {
    store: Arc<dyn ContactStore>,
    sink: Arc<dyn ContactSink>,
}

impl ContactForwarder {
    pub fn new(store: Arc<dyn ContactStore>, sink: Arc<dyn ContactSink>) -> Self {
        Self { store, sink }
    }

    /// Validate, persist, then best-effort push.
    ///
    /// The email is trimmed and lower-cased before the duplicate check and
    /// the insert, so the stored key is always normalized on this path.
    #[tracing::instrument(level = "info", skip(self, draft), fields(email))]
    pub async fn create_and_forward(&self, draft: ContactDraft) -> Result<Contact> {
        let email = draft.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(Error::InvalidInput("email is required".to_string()));
        }
        tracing::Span::current().record("email", email.as_str());

        if self
            .store
            .find_contact_by_email(&email, EmailMatching::CaseInsensitive)
            .await?
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "contact with email '{email}' already exists"
            )));
        }

        let contact = self
            .store
            .insert_contact(&ContactDraft { email, ..draft })
            .await?;

        if let Err(e) = self.sink.push_contact(&contact).await {
            tracing::warn!(
                error = %e,
                contact_id = %contact.id,
                "remote push failed; local contact kept (manage in CRM)"
            );
        }

        Ok(contact)
    }
}
