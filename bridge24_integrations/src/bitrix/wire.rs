//! Typed wire schema for the Bitrix24 contact endpoints.

use bridge24_core::models::Contact;
use bridge24_core::reconcile::models::RemoteContact;
use serde::{Deserialize, Serialize};

/// One entry of a multi-value field (`EMAIL`, `PHONE`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedValue {
    #[serde(rename = "VALUE")]
    pub value: String,
    #[serde(rename = "VALUE_TYPE", default = "work_type")]
    pub value_type: String,
}

impl TaggedValue {
    pub fn work(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            value_type: work_type(),
        }
    }
}

fn work_type() -> String {
    "WORK".to_string()
}

/// Response of `crm.contact.list`. A response without `result` is malformed
/// and aborts the caller.
#[derive(Debug, Deserialize)]
pub struct ContactListResponse {
    #[serde(default)]
    pub result: Option<Vec<ContactEntry>>,
}

/// One remote contact as listed by the CRM.
///
/// `EMAIL` is kept as a raw JSON value: the API omits it, and third-party
/// data occasionally carries a non-array shape. Anything that is not an
/// array of tagged records maps to "no emails" (the caller skips the entry)
/// instead of failing the whole response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactEntry {
    #[serde(rename = "NAME")]
    pub name: Option<String>,
    #[serde(rename = "LAST_NAME")]
    pub last_name: Option<String>,
    #[serde(rename = "EMAIL", default)]
    pub email: serde_json::Value,
}

impl ContactEntry {
    pub fn into_remote(self) -> RemoteContact {
        let emails = match self.email {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|item| item.get("VALUE").and_then(|v| v.as_str()))
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        RemoteContact {
            name: self.name,
            last_name: self.last_name,
            emails,
        }
    }
}

/// Request body of `crm.contact.add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddContactRequest {
    pub fields: ContactFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactFields {
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "LAST_NAME")]
    pub last_name: String,
    #[serde(rename = "EMAIL")]
    pub email: Vec<TaggedValue>,
    #[serde(rename = "PHONE", skip_serializing_if = "Option::is_none")]
    pub phone: Option<Vec<TaggedValue>>,
}

impl From<&Contact> for AddContactRequest {
    fn from(contact: &Contact) -> Self {
        Self {
            fields: ContactFields {
                name: contact.name.clone().unwrap_or_default(),
                last_name: contact.last_name.clone().unwrap_or_default(),
                email: vec![TaggedValue::work(contact.email.clone())],
                phone: contact
                    .phone
                    .clone()
                    .map(|p| vec![TaggedValue::work(p)]),
            },
        }
    }
}

/// Response of `crm.contact.add`. Success is any body without `error`.
#[derive(Debug, Deserialize)]
pub struct AddContactResponse {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}
