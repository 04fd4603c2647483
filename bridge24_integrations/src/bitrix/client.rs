use crate::bitrix::wire::{
    AddContactRequest, AddContactResponse, ContactListResponse,
};
use async_trait::async_trait;
use bridge24_core::config::BitrixConfig;
use bridge24_core::forward::ContactSink;
use bridge24_core::models::Contact;
use bridge24_core::reconcile::engine::ContactSource;
use bridge24_core::reconcile::models::RemoteContact;
use bridge24_core::{Error, Result};
use reqwest::Client;
use tracing::instrument;

/// HTTP client for the Bitrix24 webhook REST endpoints.
///
/// Implements both sync directions: `ContactSource` (bulk list for the
/// reconciler) and `ContactSink` (single add for the forwarder). Both calls
/// share the configured timeout.
#[derive(Clone)]
pub struct BitrixClient {
    client: Client,
    config: BitrixConfig,
}

impl BitrixClient {
    pub fn new(config: BitrixConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::backend_reqwest)?;
        Ok(Self { client, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}.json", self.config.base_url)
    }

    /// GET `crm.contact.list`, filtered server-side by creation date and
    /// narrowed to the name/email fields.
    #[instrument(level = "info", skip(self))]
    pub async fn list_contacts(&self) -> Result<Vec<RemoteContact>> {
        let date = self.config.created_since.to_string();
        let resp = self
            .client
            .get(self.method_url("crm.contact.list"))
            .query(&[
                ("FILTER[>DATE_CREATE]", date.as_str()),
                ("SELECT[]", "NAME"),
                ("SELECT[]", "LAST_NAME"),
                ("SELECT[]", "EMAIL"),
            ])
            .send()
            .await
            .map_err(Error::backend_reqwest)?
            .error_for_status()
            .map_err(Error::backend_reqwest)?;

        let body: ContactListResponse = resp.json().await.map_err(Error::backend_reqwest)?;
        let entries = body.result.ok_or_else(|| {
            Error::BackendMessage("bitrix list response missing 'result'".to_string())
        })?;

        Ok(entries.into_iter().map(|e| e.into_remote()).collect())
    }

    /// POST `crm.contact.add`. Success is any 2xx response whose body
    /// carries no `error` field.
    #[instrument(level = "info", skip(self, contact), fields(contact_id = %contact.id))]
    pub async fn add_contact(&self, contact: &Contact) -> Result<()> {
        let resp = self
            .client
            .post(self.method_url("crm.contact.add"))
            .json(&AddContactRequest::from(contact))
            .send()
            .await
            .map_err(Error::backend_reqwest)?
            .error_for_status()
            .map_err(Error::backend_reqwest)?;

        let body: AddContactResponse = resp.json().await.map_err(Error::backend_reqwest)?;
        if let Some(code) = body.error {
            return Err(Error::BackendMessage(format!(
                "bitrix add rejected: {code}: {}",
                body.error_description.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContactSource for BitrixClient {
    async fn fetch_contacts(&self) -> Result<Vec<RemoteContact>> {
        self.list_contacts().await
    }
}

#[async_trait]
impl ContactSink for BitrixClient {
    async fn push_contact(&self, contact: &Contact) -> Result<()> {
        self.add_contact(contact).await
    }
}
